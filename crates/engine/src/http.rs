//! Blocking HTTP client for the Sheets v4 values API.
//!
//! Construct one per process and share it (it is `Send + Sync`); dropping
//! it closes the connection pool. Obtaining the access token is left to a
//! [`TokenSource`].

use reqwest::blocking::{Client, Response};
use reqwest::Url;

use crate::config::SheetsClientConfig;
use crate::remote::{
    BatchUpdateRequest, BatchUpdateResponse, MajorDimension, RemoteError, SheetsApi, ValueRange,
};

pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Result<String, RemoteError>;
}

/// A fixed bearer token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Result<String, RemoteError> {
        if self.0.is_empty() {
            return Err(RemoteError::PermissionDenied("no access token configured".into()));
        }
        Ok(self.0.clone())
    }
}

pub struct HttpSheetsClient {
    client: Client,
    base_url: Url,
    tokens: Box<dyn TokenSource>,
}

impl HttpSheetsClient {
    pub fn new(config: &SheetsClientConfig, tokens: Box<dyn TokenSource>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(transport)?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| RemoteError::Transport(format!("invalid base url {:?}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Transport(format!(
                "base url {:?} cannot carry a path",
                config.base_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    /// Client using the static token from `config.access_token`.
    pub fn from_config(config: &SheetsClientConfig) -> Result<Self, RemoteError> {
        Self::new(config, Box::new(StaticToken::new(config.access_token.clone())))
    }

    fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RemoteError::Transport("base url cannot carry a path".into()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(RemoteError::from_status(status.as_u16(), body))
}

impl SheetsApi for HttpSheetsClient {
    fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        major_dimension: MajorDimension,
    ) -> Result<ValueRange, RemoteError> {
        let url = self.url(&[spreadsheet_id, "values", range])?;
        let response = self
            .client
            .get(url)
            .bearer_auth(self.tokens.access_token()?)
            .query(&[("majorDimension", major_dimension.as_str())])
            .send()
            .map_err(transport)?;
        check_status(response)?
            .json::<ValueRange>()
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        request: &BatchUpdateRequest,
    ) -> Result<BatchUpdateResponse, RemoteError> {
        let url = self.url(&[spreadsheet_id, "values:batchUpdate"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.tokens.access_token()?)
            .json(request)
            .send()
            .map_err(transport)?;
        check_status(response)?
            .json::<BatchUpdateResponse>()
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}
