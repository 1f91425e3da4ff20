use super::{sort_rows, BillStore};
use crate::data_structures::{Bill, BillPatch, MonthKey};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_TABLE: &str = "monthly_bills";

/// Connection settings for a PostgREST-style table endpoint (e.g. Supabase).
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Sent as both `apikey` and bearer token
    pub api_key: Option<String>,
    pub table: String,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            table: DEFAULT_TABLE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table)
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

const UNIQUE_VIOLATION: &str = "23505";

/// Maps an error response to a [`StoreError`]; unique violations become
/// [`StoreError::Conflict`].
pub(crate) fn error_from_response(status: u16, body: &str) -> StoreError {
    let parsed: Option<PostgrestError> = serde_json::from_str(body).ok();

    let message = parsed
        .as_ref()
        .map(|err| {
            let mut message = err.message.clone().unwrap_or_default();
            if let Some(details) = &err.details {
                message = format!("{} ({})", message, details);
            }
            message
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    let unique_violation = parsed
        .as_ref()
        .and_then(|err| err.code.as_deref())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false);

    if status == 409 || unique_violation {
        StoreError::Conflict(message)
    } else if status == 408 || status == 504 {
        StoreError::Timeout(message)
    } else {
        StoreError::Backend { status, message }
    }
}

fn month_filter(months: &[MonthKey]) -> String {
    let keys: Vec<String> = months.iter().map(|m| m.to_string()).collect();
    format!("in.({})", keys.join(","))
}

pub struct RestStore {
    config: RestConfig,
    client: Client,
}

impl RestStore {
    pub fn new(config: RestConfig) -> StoreResult<Self> {
        if config.url.trim().is_empty() {
            return Err(StoreError::Config("backend URL is empty".to_string()));
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, self.config.endpoint())
            .header("Content-Type", "application/json");

        if let Some(key) = &self.config.api_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }

        request
    }

    fn select_request(&self, months: &[MonthKey]) -> RequestBuilder {
        let filter = match months {
            [month] => format!("eq.{}", month),
            _ => month_filter(months),
        };

        self.request(Method::GET).query(&[
            ("select", "*".to_string()),
            ("month_key", filter),
            ("order", "month_key.asc,room_id.asc".to_string()),
        ])
    }

    fn insert_request(&self, drafts: &[Bill]) -> RequestBuilder {
        self.request(Method::POST)
            .header("Prefer", "return=representation")
            .json(drafts)
    }

    fn update_request(&self, filter: (&str, String), patch: &BillPatch) -> RequestBuilder {
        self.request(Method::PATCH)
            .header("Prefer", "return=representation")
            .query(&[(filter.0, filter.1)])
            .json(patch)
    }

    async fn ensure_success(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(error_from_response(status.as_u16(), &body))
    }

    async fn fetch_rows(&self, request: RequestBuilder) -> StoreResult<Vec<Bill>> {
        let response = Self::ensure_success(request.send().await?).await?;
        let mut rows: Vec<Bill> = response.json().await?;
        sort_rows(&mut rows);
        Ok(rows)
    }
}

#[async_trait]
impl BillStore for RestStore {
    #[tracing::instrument(skip(self, month), fields(month = %month), err)]
    async fn select_month(&self, month: MonthKey) -> StoreResult<Vec<Bill>> {
        self.fetch_rows(self.select_request(&[month])).await
    }

    #[tracing::instrument(skip(self, months), fields(months = months.len()), err)]
    async fn select_months(&self, months: &[MonthKey]) -> StoreResult<Vec<Bill>> {
        if months.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_rows(self.select_request(months)).await
    }

    #[tracing::instrument(skip(self, drafts), fields(rows = drafts.len()), err)]
    async fn insert(&self, drafts: &[Bill]) -> StoreResult<Vec<Bill>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.fetch_rows(self.insert_request(drafts)).await?;
        tracing::debug!("Inserted {} bills", rows.len());
        Ok(rows)
    }

    #[tracing::instrument(skip(self, patch), err)]
    async fn update_by_id(&self, id: i64, patch: &BillPatch) -> StoreResult<()> {
        let rows = self
            .fetch_rows(self.update_request(("id", format!("eq.{}", id)), patch))
            .await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, month, patch), fields(month = %month), err)]
    async fn update_month(&self, month: MonthKey, patch: &BillPatch) -> StoreResult<()> {
        self.fetch_rows(self.update_request(("month_key", format!("eq.{}", month)), patch))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(key: &str) -> MonthKey {
        MonthKey::parse(key).unwrap()
    }

    fn store() -> RestStore {
        RestStore::new(RestConfig::new("https://example.supabase.co/").with_api_key("anon-key"))
            .unwrap()
    }

    #[test]
    fn test_endpoint() {
        let config = RestConfig::new("https://example.supabase.co/");
        assert_eq!(
            config.endpoint(),
            "https://example.supabase.co/rest/v1/monthly_bills"
        );
        assert_eq!(
            config.with_table("bills").endpoint(),
            "https://example.supabase.co/rest/v1/bills"
        );
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let err = RestStore::new(RestConfig::new("  ")).err().unwrap();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_select_month_request() {
        let request = store().select_request(&[month("2025-12")]).build().unwrap();

        assert_eq!(request.method(), Method::GET);
        let query: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert!(query.contains(&("month_key".to_string(), "eq.2025-12".to_string())));
        assert!(query.contains(&("order".to_string(), "month_key.asc,room_id.asc".to_string())));
        assert_eq!(request.headers()["apikey"], "anon-key");
        assert_eq!(request.headers()["Authorization"], "Bearer anon-key");
    }

    #[test]
    fn test_select_months_uses_in_filter() {
        let request = store()
            .select_request(&[month("2025-11"), month("2025-12")])
            .build()
            .unwrap();

        let query: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert!(query.contains(&(
            "month_key".to_string(),
            "in.(2025-11,2025-12)".to_string()
        )));
    }

    #[test]
    fn test_insert_request_asks_for_rows_back() {
        let request = store()
            .insert_request(&[Bill::draft(1, month("2025-01"))])
            .build()
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.headers()["Prefer"], "return=representation");

        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json[0]["room_id"], 1);
        assert!(json[0].get("id").is_none());
    }

    #[test]
    fn test_update_request_is_sparse() {
        let request = store()
            .update_request(("id", "eq.7".to_string()), &BillPatch::paid(true))
            .build()
            .unwrap();

        assert_eq!(request.method(), Method::PATCH);
        assert_eq!(request.url().query(), Some("id=eq.7"));
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, br#"{"is_paid":true}"#);
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"monthly_bills_room_month_key\"","details":"Key (room_id, month_key)=(1, 2025-01) already exists.","hint":null}"#;

        let err = error_from_response(409, body);
        assert!(err.is_conflict());
        assert!(err.to_string().contains("already exists"));

        assert!(error_from_response(400, body).is_conflict());
    }

    #[test]
    fn test_other_errors_keep_status() {
        let err = error_from_response(401, r#"{"message":"Invalid API key"}"#);
        match err {
            StoreError::Backend { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = error_from_response(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "Backend returned 502: Bad Gateway");
        assert!(error_from_response(504, "").is_ambiguous());
    }
}
