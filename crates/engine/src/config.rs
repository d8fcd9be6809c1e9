use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_ID_HEADER: &str = "FormResponseID";
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Engine and façade settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Header of the column holding correlation ids.
    pub id_header: String,
    /// Sheet assumed when an ingested batch names none.
    pub default_sheet_name: String,
    pub processed_header: String,
    pub validated_header: String,
    pub refusal_reason_header: String,
    /// Shared secret expected from the ingestion webhook. Empty rejects all.
    pub webhook_secret: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id_header: DEFAULT_ID_HEADER.to_string(),
            default_sheet_name: DEFAULT_SHEET_NAME.to_string(),
            processed_header: "Processed".to_string(),
            validated_header: "Validated".to_string(),
            refusal_reason_header: "RefusalReason".to_string(),
            webhook_secret: String::new(),
            default_page_size: 100,
            max_page_size: 500,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `SHEETMIRROR_*` keys, falling back to defaults for keys the
    /// lookup does not know or cannot parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let text = |key: &str, slot: &mut String| {
            if let Some(v) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = v.trim().to_string();
            }
        };
        text("SHEETMIRROR_ID_HEADER", &mut config.id_header);
        text("SHEETMIRROR_DEFAULT_SHEET", &mut config.default_sheet_name);
        text("SHEETMIRROR_PROCESSED_HEADER", &mut config.processed_header);
        text("SHEETMIRROR_VALIDATED_HEADER", &mut config.validated_header);
        text("SHEETMIRROR_REASON_HEADER", &mut config.refusal_reason_header);
        if let Some(secret) = lookup("WEBHOOK_SECRET") {
            config.webhook_secret = secret;
        }
        if let Some(n) = lookup("SHEETMIRROR_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            config.default_page_size = n;
        }
        if let Some(n) = lookup("SHEETMIRROR_MAX_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            config.max_page_size = n;
        }
        config
    }

    /// Clamp a requested page size: 0 or absent means the default.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(0) | None => self.default_page_size,
            Some(n) => n,
        }
        .min(self.max_page_size)
    }
}

/// Connection settings for [`crate::http::HttpSheetsClient`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SheetsClientConfig {
    pub base_url: String,
    pub access_token: String,
    pub timeout_secs: u64,
}

impl Default for SheetsClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SHEETS_API_BASE.to_string(),
            access_token: String::new(),
            timeout_secs: 30,
        }
    }
}

impl SheetsClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(base) = lookup("SHEETS_API_BASE").filter(|v| !v.is_empty()) {
            config.base_url = base.trim_end_matches('/').to_string();
        }
        if let Some(token) = lookup("SHEETS_ACCESS_TOKEN") {
            config.access_token = token;
        }
        if let Some(secs) = lookup("SHEETS_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.timeout_secs = secs;
        }
        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
