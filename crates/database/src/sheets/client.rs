use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::auth::SheetsAuth;

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// A single-cell write addressed in A1 notation
#[derive(Debug, Clone, PartialEq)]
pub struct CellUpdate {
    pub range: String,
    pub value: String,
}

/// Thin client over the spreadsheet values API
pub struct SheetsClient {
    http_client: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    auth: SheetsAuth,
}

impl SheetsClient {
    pub fn new(config: &config::SheetsConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.api_base_url.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            auth: SheetsAuth::from_config(config)?,
        })
    }

    async fn bearer_token(&self) -> anyhow::Result<String> {
        self.auth.bearer_token(&self.http_client).await
    }

    fn url(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sheets API base URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn check(response: reqwest::Response, action: &str) -> anyhow::Result<reqwest::Response> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Sheets {} failed with status {}: {}", action, status, body);
        }
        Ok(response)
    }

    /// Worksheet titles present in the spreadsheet
    pub async fn sheet_titles(&self) -> anyhow::Result<Vec<String>> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.bearer_token().await?)
            .send()
            .await?;
        let body: SpreadsheetResponse = Self::check(response, "metadata read").await?.json().await?;

        Ok(body
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.title)
            .collect())
    }

    pub async fn add_sheet(&self, title: &str) -> anyhow::Result<()> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sheets API base URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                format!("{}:batchUpdate", self.spreadsheet_id).as_str(),
            ]);

        let response = self
            .http_client
            .post(url)
            .bearer_auth(self.bearer_token().await?)
            .json(&serde_json::json!({
                "requests": [{ "addSheet": { "properties": { "title": title } } }]
            }))
            .send()
            .await?;
        Self::check(response, "addSheet").await?;

        tracing::info!("Created worksheet '{}'", title);
        Ok(())
    }

    /// All cells of a worksheet as text, row-major, starting at A1
    pub async fn get_values(&self, sheet: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let url = self.url(&["values", sheet])?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.bearer_token().await?)
            .send()
            .await?;
        let body: ValueRangeResponse = Self::check(response, "values read").await?.json().await?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    pub async fn append_row(&self, sheet: &str, row: Vec<String>) -> anyhow::Result<()> {
        let mut url = self.url(&["values", &format!("{sheet}:append")])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .http_client
            .post(url)
            .bearer_auth(self.bearer_token().await?)
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await?;
        Self::check(response, "append").await?;
        Ok(())
    }

    /// Write several single cells in one request
    pub async fn update_cells(&self, updates: &[CellUpdate]) -> anyhow::Result<()> {
        let url = self.url(&["values:batchUpdate"])?;
        let data: Vec<serde_json::Value> = updates
            .iter()
            .map(|update| {
                serde_json::json!({
                    "range": update.range,
                    "values": [[update.value]],
                })
            })
            .collect();

        let response = self
            .http_client
            .post(url)
            .bearer_auth(self.bearer_token().await?)
            .json(&serde_json::json!({
                "valueInputOption": "RAW",
                "data": data,
            }))
            .send()
            .await?;
        Self::check(response, "batchUpdate").await?;
        Ok(())
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
