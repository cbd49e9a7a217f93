use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    /// OAuth client credentials for the sheet API. Optional at startup so
    /// read-only deployments can run without them; write paths fail with a
    /// configuration error if they are missing.
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    /// Redirect target registered with the provider for the callback route.
    pub oauth_redirect_uri: String,
    /// Spreadsheet holding the Features and Votes ranges.
    pub spreadsheet_id: String,
    /// Provider endpoints. Defaults point at Google; overridable so tests
    /// can aim them at a mock server.
    pub oauth_auth_url: String,
    pub oauth_token_url: String,
    pub sheets_api_base: String,
    pub sheets_csv_base: String,
}

impl Config {
    /// Returns (client_id, client_secret) or an error if either is unset.
    pub fn client_credentials(&self) -> anyhow::Result<(&str, &str)> {
        match (&self.google_client_id, &self.google_client_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => anyhow::bail!(
                "GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET are not set; \
                 writes to the backing sheet are disabled"
            ),
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: std::env::var("ROADMAP_PORT")
            .unwrap_or_else(|_| "8788".into())
            .parse()
            .unwrap_or(8788),
        redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
        google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
        google_client_secret: std::env::var("GOOGLE_CLIENT_SECRET").ok(),
        oauth_redirect_uri: std::env::var("OAUTH_REDIRECT_URI")
            .unwrap_or_else(|_| "http://localhost:8788/oauth/callback".into()),
        spreadsheet_id: std::env::var("ROADMAP_SPREADSHEET_ID").unwrap_or_default(),
        oauth_auth_url: std::env::var("OAUTH_AUTH_URL")
            .unwrap_or_else(|_| "https://accounts.google.com/o/oauth2/v2/auth".into()),
        oauth_token_url: std::env::var("OAUTH_TOKEN_URL")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".into()),
        sheets_api_base: std::env::var("SHEETS_API_BASE")
            .unwrap_or_else(|_| "https://sheets.googleapis.com".into()),
        sheets_csv_base: std::env::var("SHEETS_CSV_BASE")
            .unwrap_or_else(|_| "https://docs.google.com".into()),
    })
}
