use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// How to find the physical row of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLocator", into = "RawLocator")]
pub enum RowLocator {
    RowNumber(NonZeroU32),
    CorrelationId(String),
}

impl RowLocator {
    pub fn row(row_number: u32) -> Result<Self, CoreError> {
        NonZeroU32::new(row_number)
            .map(Self::RowNumber)
            .ok_or_else(|| CoreError::InvalidLocator("row number must be positive".into()))
    }

    pub fn correlation(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::InvalidLocator("correlation id is empty".into()));
        }
        Ok(Self::CorrelationId(id))
    }

    /// Build from the two optional wire fields; exactly one must be set.
    pub fn from_parts(
        row_number: Option<u32>,
        correlation_id: Option<String>,
    ) -> Result<Self, CoreError> {
        match (row_number, correlation_id) {
            (Some(row), None) => Self::row(row),
            (None, Some(id)) => Self::correlation(id),
            (Some(_), Some(_)) => Err(CoreError::InvalidLocator(
                "rowNumber and correlationId are mutually exclusive".into(),
            )),
            (None, None) => Err(CoreError::InvalidLocator(
                "one of rowNumber or correlationId is required".into(),
            )),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    row_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl TryFrom<RawLocator> for RowLocator {
    type Error = CoreError;

    fn try_from(raw: RawLocator) -> Result<Self, Self::Error> {
        Self::from_parts(raw.row_number, raw.correlation_id)
    }
}

impl From<RowLocator> for RawLocator {
    fn from(locator: RowLocator) -> Self {
        match locator {
            RowLocator::RowNumber(n) => RawLocator {
                row_number: Some(n.get()),
                correlation_id: None,
            },
            RowLocator::CorrelationId(id) => RawLocator {
                row_number: None,
                correlation_id: Some(id),
            },
        }
    }
}
