//! Sheet-backed persistence.
//!
//! The record of truth is a shared spreadsheet: features and votes are
//! appended as rows through the authorized values API, and the feature
//! list is read back through the public CSV export (no auth needed for
//! reads). Rows are append-only; status flags are edited by a curator
//! directly in the sheet.

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::errors::AppError;
use crate::models::{Feature, Vote};

const FEATURES_RANGE: &str = "Features!A:H";
const VOTES_RANGE: &str = "Votes!A:D";
const FEATURES_SHEET: &str = "Features";

pub struct SheetStore {
    client: ClientWithMiddleware,
    api_base: String,
    csv_base: String,
    spreadsheet_id: String,
}

impl SheetStore {
    pub fn new(api_base: String, csv_base: String, spreadsheet_id: String) -> Self {
        let reqwest_client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            api_base,
            csv_base,
            spreadsheet_id,
        }
    }

    pub async fn append_feature(&self, feature: &Feature, token: &str) -> Result<(), AppError> {
        self.append_row(FEATURES_RANGE, feature.to_row(), token)
            .await
    }

    pub async fn append_vote(&self, vote: &Vote, token: &str) -> Result<(), AppError> {
        self.append_row(VOTES_RANGE, vote.to_row(), token).await
    }

    async fn append_row(
        &self,
        range: &str,
        row: Vec<String>,
        token: &str,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=RAW",
            self.api_base, self.spreadsheet_id, range
        );
        let body = serde_json::json!({ "values": [row] });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("sheet append failed after retries: {}", e);
                AppError::Persistence(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, "sheet API rejected append: {}", detail);
            return Err(AppError::Persistence(format!(
                "sheet API returned {}",
                status
            )));
        }
        Ok(())
    }

    /// Read the full feature list from the public CSV export. Rows with
    /// an unparseable uuid (including any stray header rows) are skipped.
    pub async fn fetch_features(&self) -> Result<Vec<Feature>, AppError> {
        let url = format!(
            "{}/spreadsheets/d/{}/gviz/tq?tqx=out:csv&sheet={}",
            self.csv_base, self.spreadsheet_id, FEATURES_SHEET
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("sheet fetch failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Persistence(format!(
                "sheet export returned {}",
                status
            )));
        }

        let csv = resp
            .text()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        Ok(parse_csv(&csv)
            .iter()
            .filter_map(|row| Feature::from_row(row))
            .collect())
    }
}

/// Quote-aware CSV split; the gviz export wraps every cell in quotes and
/// escapes embedded quotes by doubling them.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_csv_line)
        .collect()
}

fn parse_csv_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    values.push(current);
    values
}
