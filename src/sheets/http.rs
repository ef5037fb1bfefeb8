use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{SheetError, SheetStore};
use crate::core::TtlCache;

/// Seconds shaved off a token's lifetime so it is never used at the edge
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

const TOKEN_KEY: &str = "access_token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Fetches bearer tokens from the OAuth proxy and keeps them until shortly
/// before they expire
#[derive(Debug)]
pub struct TokenSource {
    url: String,
    client: Client,
    cache: TtlCache<&'static str, String>,
}

impl TokenSource {
    pub fn new(url: impl Into<String>, cache: TtlCache<&'static str, String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            cache,
        }
    }

    /// Current access token; `None` when the proxy reports no session
    pub fn token(&mut self) -> Result<Option<String>, SheetError> {
        if let Some(token) = self.cache.get(&TOKEN_KEY) {
            return Ok(Some(token));
        }

        debug!(url = %self.url, "requesting access token");
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| SheetError::Remote(e.to_string()))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("token endpoint reports no authenticated session");
            return Ok(None);
        }
        let response = check_status(response)?;
        let body: TokenResponse = response
            .json()
            .map_err(|e| SheetError::Remote(e.to_string()))?;

        match body.expires_in {
            Some(secs) => {
                let ttl = Duration::from_secs(secs.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS));
                self.cache
                    .insert_with_ttl(TOKEN_KEY, body.access_token.clone(), ttl);
            }
            None => self.cache.insert(TOKEN_KEY, body.access_token.clone()),
        }
        Ok(Some(body.access_token))
    }

    /// Forget the cached token, e.g. after the proxy revoked it
    pub fn invalidate(&mut self) {
        self.cache.invalidate(&TOKEN_KEY);
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Blocking client for the spreadsheet values API
#[derive(Debug)]
pub struct SheetsApiStore {
    base: String,
    spreadsheet_id: String,
    api_key: Option<String>,
    tokens: Option<TokenSource>,
    client: Client,
}

impl SheetsApiStore {
    pub fn new(base: impl Into<String>, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            spreadsheet_id: spreadsheet_id.into(),
            api_key: None,
            tokens: None,
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_token_source(mut self, tokens: TokenSource) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// `{base}/{spreadsheet}/values/{range}` with the range percent-encoded
    pub fn values_url(&self, range: &str) -> Result<Url, SheetError> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| SheetError::NotConfigured(format!("api_base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SheetError::NotConfigured(format!("api_base: {}", self.base)))?
            .pop_if_empty()
            .push(&self.spreadsheet_id)
            .push("values")
            .push(range);
        Ok(url)
    }

    /// `Tab!A{row}:{last}{row}` covering one full row
    pub fn row_range(tab: &str, row: usize, width: usize) -> String {
        let last = crate::core::entity::column_letter(width.saturating_sub(1));
        format!("{}!A{}:{}{}", tab, row, last, row)
    }

    fn authorize(&mut self, request: RequestBuilder) -> Result<RequestBuilder, SheetError> {
        let token = match self.tokens.as_mut() {
            Some(tokens) => tokens.token()?,
            None => None,
        };
        Ok(match (token, &self.api_key) {
            (Some(token), _) => request.bearer_auth(token),
            (None, Some(key)) => request.query(&[("key", key.as_str())]),
            (None, None) => request,
        })
    }

    fn send(&mut self, request: RequestBuilder) -> Result<Response, SheetError> {
        let request = self.authorize(request)?;
        let response = request
            .send()
            .map_err(|e| SheetError::Remote(e.to_string()))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.drop_token();
        }
        check_status(response)
    }

    /// A rejected token is not offered again; the next call asks the proxy
    fn drop_token(&mut self) {
        if let Some(tokens) = self.tokens.as_mut() {
            warn!("spreadsheet API rejected the access token");
            tokens.invalidate();
        }
    }
}

impl SheetStore for SheetsApiStore {
    fn read(&mut self, tab: &str) -> Result<Vec<Vec<String>>, SheetError> {
        let url = self.values_url(tab)?;
        debug!(%url, "reading sheet tab");
        let request = self.client.get(url);
        let body: ValueRange = self
            .send(request)?
            .json()
            .map_err(|e| SheetError::Remote(e.to_string()))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    fn update_row(&mut self, tab: &str, row: usize, values: &[String]) -> Result<(), SheetError> {
        let range = Self::row_range(tab, row, values.len());
        let url = self.values_url(&range)?;
        debug!(%range, "overwriting row");
        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&serde_json::json!({ "values": [values] }));
        self.send(request)?;
        Ok(())
    }

    fn append_row(&mut self, tab: &str, values: &[String]) -> Result<(), SheetError> {
        let url = self.values_url(&format!("{}:append", tab))?;
        debug!(tab, "appending row");
        let request = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&serde_json::json!({ "values": [values] }));
        self.send(request)?;
        Ok(())
    }
}

/// Pass success through; otherwise surface the API's own message
fn check_status(response: Response) -> Result<Response, SheetError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(SheetError::Remote(error_message(status, &body)))
}

/// `error.message` from a JSON error body, else the status reason
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_range() {
        assert_eq!(
            SheetsApiStore::row_range("Risk Register", 5, 12),
            "Risk Register!A5:L5"
        );
        assert_eq!(SheetsApiStore::row_range("QMS Records", 2, 18), "QMS Records!A2:R2");
    }

    #[test]
    fn test_values_url_encodes_range() {
        let store = SheetsApiStore::new("https://sheets.example.com/v4/spreadsheets", "abc123");
        let url = store.values_url("CAPA Register!A3:O3").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/abc123/values/CAPA%20Register!A3:O3"
        );
    }

    #[test]
    fn test_error_message_prefers_api_message() {
        let body = r#"{"error": {"code": 403, "message": "The caller does not have permission"}}"#;
        assert_eq!(
            error_message(StatusCode::FORBIDDEN, body),
            "The caller does not have permission"
        );
        assert_eq!(error_message(StatusCode::NOT_FOUND, "<html>"), "Not Found");
    }

    #[test]
    fn test_rejected_token_is_dropped() {
        let mut cache = TtlCache::new(Duration::from_secs(600));
        cache.insert(TOKEN_KEY, "cached-token".to_string());
        let tokens = TokenSource::new("http://127.0.0.1:9/token", cache);
        let mut store = SheetsApiStore::new("https://sheets.example.com/v4/spreadsheets", "abc")
            .with_token_source(tokens);

        let source = store.tokens.as_mut().unwrap();
        assert_eq!(source.token().unwrap().as_deref(), Some("cached-token"));

        store.drop_token();
        let source = store.tokens.as_mut().unwrap();
        assert_eq!(source.cache.get(&TOKEN_KEY), None);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(serde_json::json!("x")), "x");
        assert_eq!(cell_text(serde_json::json!(12)), "12");
        assert_eq!(cell_text(serde_json::Value::Null), "");
    }
}
