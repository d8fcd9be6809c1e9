use rusqlite::{Connection, OptionalExtension};

use sheetmirror_core::{field_value::FieldMap, ids::RecordId};

use crate::error::StorageError;
use crate::traits::{
    DocumentStore, EntryPatch, EntryQuery, MirroredRecord, SheetRef, UserParams, UserParamsPatch,
};

const ENTRY_COLUMNS: &str = "id, sheet_id, sheet_name, row_index, correlation_id, row_fields, processed, validated, refusal_reason, created_at, updated_at";

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn entry_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Column values of one `entries` row before the field map is decoded.
struct RawEntry {
    id: String,
    sheet_id: String,
    sheet_name: String,
    row_index: i64,
    correlation_id: Option<String>,
    row_fields: Vec<u8>,
    processed: bool,
    validated: bool,
    refusal_reason: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sheet_id: row.get(1)?,
            sheet_name: row.get(2)?,
            row_index: row.get(3)?,
            correlation_id: row.get(4)?,
            row_fields: row.get(5)?,
            processed: row.get(6)?,
            validated: row.get(7)?,
            refusal_reason: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_record(self) -> Result<MirroredRecord, StorageError> {
        let row: FieldMap = rmp_serde::from_slice(&self.row_fields)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let row_index = u32::try_from(self.row_index)
            .map_err(|_| StorageError::Serialization(format!("invalid row_index {}", self.row_index)))?;
        Ok(MirroredRecord {
            id: RecordId::new(self.id),
            sheet_id: self.sheet_id,
            sheet_name: self.sheet_name,
            row_index,
            correlation_id: self.correlation_id,
            row,
            processed: self.processed,
            validated: self.validated,
            refusal_reason: self.refusal_reason,
            created_at: self.created_at as u64,
            updated_at: self.updated_at as u64,
        })
    }
}

fn load_entry(conn: &Connection, id: &RecordId) -> Result<Option<MirroredRecord>, StorageError> {
    let raw = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
            rusqlite::params![id.as_str()],
            RawEntry::from_row,
        )
        .optional()?;
    raw.map(RawEntry::into_record).transpose()
}

fn upsert_entry(conn: &Connection, record: &MirroredRecord) -> Result<(), StorageError> {
    let row_fields =
        rmp_serde::to_vec(&record.row).map_err(|e| StorageError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT INTO entries (id, sheet_id, sheet_name, row_index, correlation_id, row_fields, processed, validated, refusal_reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET sheet_id = excluded.sheet_id, sheet_name = excluded.sheet_name, row_index = excluded.row_index,
             correlation_id = excluded.correlation_id, row_fields = excluded.row_fields, processed = excluded.processed,
             validated = excluded.validated, refusal_reason = excluded.refusal_reason, created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        rusqlite::params![
            record.id.as_str(),
            record.sheet_id,
            record.sheet_name,
            record.row_index as i64,
            record.correlation_id,
            row_fields,
            record.processed,
            record.validated,
            record.refusal_reason,
            record.created_at as i64,
            record.updated_at as i64,
        ],
    )?;
    Ok(())
}

fn merge_into(
    conn: &Connection,
    id: &RecordId,
    patch: &EntryPatch,
) -> Result<MirroredRecord, StorageError> {
    let mut record =
        load_entry(conn, id)?.unwrap_or_else(|| MirroredRecord::empty(id.clone()));
    record.apply(patch);
    upsert_entry(conn, &record)?;
    Ok(record)
}

fn load_user_params(conn: &Connection, user_id: &str) -> Result<Option<UserParams>, StorageError> {
    let params = conn
        .query_row(
            "SELECT user_id, username, default_spreadsheet_id, created_at, updated_at FROM user_params WHERE user_id = ?1",
            rusqlite::params![user_id],
            |row| {
                Ok(UserParams {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    default_spreadsheet_id: row.get(2)?,
                    created_at: row.get::<_, i64>(3)? as u64,
                    updated_at: row.get::<_, i64>(4)? as u64,
                })
            },
        )
        .optional()?;
    Ok(params)
}

impl DocumentStore for SqliteStorage {
    fn get_entry(&self, id: &RecordId) -> Result<Option<MirroredRecord>, StorageError> {
        load_entry(&self.conn, id)
    }

    fn merge_entry(
        &mut self,
        id: &RecordId,
        patch: &EntryPatch,
    ) -> Result<MirroredRecord, StorageError> {
        let tx = self.conn.transaction()?;
        let record = merge_into(&tx, id, patch)?;
        tx.commit()?;
        Ok(record)
    }

    fn commit_entries(&mut self, writes: &[(RecordId, EntryPatch)]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for (id, patch) in writes {
            merge_into(&tx, id, patch)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn query_entries(&self, query: &EntryQuery) -> Result<Vec<MirroredRecord>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE sheet_id = ?1
               AND (?2 IS NULL OR processed = ?2)
               AND (?3 IS NULL OR validated = ?3)
               AND (?4 IS NULL OR row_index > ?4)
             ORDER BY row_index, id
             LIMIT ?5"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![
                query.sheet_id,
                query.processed,
                query.validated,
                query.after.map(i64::from),
                i64::from(query.limit),
            ],
            RawEntry::from_row,
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_record()?);
        }
        Ok(result)
    }

    fn sheet_refs(&self) -> Result<Vec<SheetRef>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT sheet_id, sheet_name FROM entries ORDER BY sheet_id, sheet_name",
        )?;
        let refs = stmt
            .query_map([], |row| {
                Ok(SheetRef {
                    sheet_id: row.get(0)?,
                    sheet_name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(refs)
    }

    fn get_user_params(&self, user_id: &str) -> Result<Option<UserParams>, StorageError> {
        load_user_params(&self.conn, user_id)
    }

    fn merge_user_params(
        &mut self,
        user_id: &str,
        patch: &UserParamsPatch,
    ) -> Result<UserParams, StorageError> {
        let tx = self.conn.transaction()?;
        let mut params = load_user_params(&tx, user_id)?.unwrap_or_else(|| UserParams {
            user_id: user_id.to_string(),
            created_at: patch.now,
            ..Default::default()
        });
        if let Some(username) = &patch.username {
            params.username = username.clone();
        }
        if let Some(sheet_id) = &patch.default_spreadsheet_id {
            params.default_spreadsheet_id = sheet_id.clone();
        }
        params.updated_at = patch.now;

        tx.execute(
            "INSERT INTO user_params (user_id, username, default_spreadsheet_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET username = excluded.username, default_spreadsheet_id = excluded.default_spreadsheet_id, updated_at = excluded.updated_at",
            rusqlite::params![
                params.user_id,
                params.username,
                params.default_spreadsheet_id,
                params.created_at as i64,
                params.updated_at as i64,
            ],
        )?;
        tx.commit()?;
        Ok(params)
    }
}
