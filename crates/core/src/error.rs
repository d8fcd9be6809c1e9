use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid column: {0}")]
    InvalidColumn(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
