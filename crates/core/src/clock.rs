use std::time::{SystemTime, UNIX_EPOCH};

use crate::CoreError;

/// Wall-clock milliseconds, as stamped on `createdAt` / `updatedAt`.
pub fn physical_now() -> Result<u64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}
