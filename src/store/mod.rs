pub mod sheets;

pub use sheets::SheetStore;
