use log::info;
use serde::{Deserialize, Serialize};

use sheetmirror_storage::{DocumentStore, UserParamsPatch};

use crate::error::EngineError;
use crate::remote::SheetsApi;
use crate::service::MirrorService;

/// The authenticated caller, as established by the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub sub: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamsView {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub default_spreadsheet_id: String,
}

/// Partial update. `Some("")` clears a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamsUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub default_spreadsheet_id: Option<String>,
}

/// Trimmed username of 3 to 32 characters from `[A-Za-z0-9._-]`, or empty.
pub fn sanitize_username(raw: &str) -> Result<String, EngineError> {
    let name = raw.trim();
    if name.is_empty() {
        return Ok(String::new());
    }
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !allowed || !(3..=32).contains(&name.len()) {
        return Err(EngineError::Validation(format!("invalid username {name:?}")));
    }
    Ok(name.to_string())
}

/// Spreadsheet ids are at least 20 characters from `[A-Za-z0-9_-]`.
pub fn sanitize_sheet_id(raw: &str) -> Result<String, EngineError> {
    let id = raw.trim();
    if id.is_empty() {
        return Ok(String::new());
    }
    let allowed = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
    if !allowed || id.len() < 20 {
        return Err(EngineError::Validation(format!("invalid spreadsheet id {id:?}")));
    }
    Ok(id.to_string())
}

impl<S: DocumentStore, C: SheetsApi> MirrorService<S, C> {
    pub fn get_params(&self, user: &UserIdentity) -> Result<ParamsView, EngineError> {
        let stored = self.with_store(|store| store.get_user_params(&user.sub))?;
        let (username, default_spreadsheet_id) = stored
            .map(|p| (p.username, p.default_spreadsheet_id))
            .unwrap_or_default();
        Ok(ParamsView {
            user_id: user.sub.clone(),
            email: user.email.clone().unwrap_or_default(),
            username,
            default_spreadsheet_id,
        })
    }

    pub fn update_params(
        &self,
        user: &UserIdentity,
        update: &ParamsUpdate,
    ) -> Result<ParamsView, EngineError> {
        if user.sub.is_empty() {
            return Err(EngineError::Unauthorized);
        }
        if update.username.is_none() && update.default_spreadsheet_id.is_none() {
            return Err(EngineError::Validation("nothing to update".into()));
        }
        let patch = UserParamsPatch {
            username: update.username.as_deref().map(sanitize_username).transpose()?,
            default_spreadsheet_id: update
                .default_spreadsheet_id
                .as_deref()
                .map(sanitize_sheet_id)
                .transpose()?,
            now: self.now()?,
        };
        let stored = self.with_store(|store| store.merge_user_params(&user.sub, &patch))?;
        info!("updated params for user {}", user.sub);
        Ok(ParamsView {
            user_id: stored.user_id,
            email: user.email.clone().unwrap_or_default(),
            username: stored.username,
            default_spreadsheet_id: stored.default_spreadsheet_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert_eq!(sanitize_username("  ada.l-ove_ ").unwrap(), "ada.l-ove_");
        assert_eq!(sanitize_username("").unwrap(), "");
        assert!(sanitize_username("ab").is_err());
        assert!(sanitize_username("has space").is_err());
        assert!(sanitize_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn sheet_ids() {
        let id = "1AbC_def-ghijklmnopqrstu";
        assert_eq!(sanitize_sheet_id(id).unwrap(), id);
        assert!(sanitize_sheet_id("short").is_err());
        assert!(sanitize_sheet_id("1AbC.def/ghijklmnopqrstu").is_err());
        assert_eq!(sanitize_sheet_id(" ").unwrap(), "");
    }
}
