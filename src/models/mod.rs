pub mod feature;
pub mod vote;

pub use feature::Feature;
pub use vote::Vote;
