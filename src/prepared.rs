//! Prepared statement lifecycle: wire encode/decode for
//! `COM_STMT_PREPARE`/`COM_STMT_CLOSE`/`COM_STMT_RESET`, plus the
//! `(database, sql) -> PreparedHandle` cache.

use std::collections::HashMap;

use crate::binary::{Reader, write_int_1, write_int_4};
use crate::constant::CommandByte;
use crate::error::{Error, Result};

/// Server's response to `COM_STMT_PREPARE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedHandle {
    pub statement_id: u32,
    pub columns_num: u16,
    pub params_num: u16,
}

pub fn write_prepare(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::StmtPrepare as u8);
    out.extend_from_slice(sql.as_bytes());
}

/// Parse the fixed 12-byte `COM_STMT_PREPARE_OK` header (not including the
/// parameter/column definition packets that follow it).
pub fn read_prepare_ok(payload: &[u8]) -> Result<PreparedHandle> {
    let mut r = Reader::new(payload);
    let status = r.read_int_1()?;
    if status != 0x00 {
        return Err(Error::protocol(format!(
            "expected COM_STMT_PREPARE_OK status 0x00, got {status:#x}"
        )));
    }
    let statement_id = r.read_int_4()?;
    let columns_num = r.read_int_2()?;
    let params_num = r.read_int_2()?;
    let _reserved = r.read_int_1()?;
    let _warning_count = r.read_int_2()?;

    Ok(PreparedHandle {
        statement_id,
        columns_num,
        params_num,
    })
}

pub fn write_close_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtClose as u8);
    write_int_4(out, statement_id);
}

pub fn write_reset_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtReset as u8);
    write_int_4(out, statement_id);
}

/// Keyed by `(database, sql)` unconditionally: a statement prepared while
/// `USE a` is in effect is never reused after `USE b`, even if the SQL text
/// is identical and would still be valid under `b`.
#[derive(Debug, Default)]
pub struct PreparedCache {
    entries: HashMap<(String, String), PreparedHandle>,
}

impl PreparedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, database: &str, sql: &str) -> Option<PreparedHandle> {
        self.entries.get(&(database.to_string(), sql.to_string())).copied()
    }

    pub fn insert(&mut self, database: &str, sql: &str, handle: PreparedHandle) {
        self.entries.insert((database.to_string(), sql.to_string()), handle);
    }

    /// Called by the engine on disconnect: every statement id is invalid
    /// once the session that prepared it is gone.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prepare_ok() {
        let mut payload = vec![0x00u8];
        payload.extend_from_slice(&7u32.to_le_bytes());
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.push(0);
        payload.extend_from_slice(&0u16.to_le_bytes());

        let ok = read_prepare_ok(&payload).unwrap();
        assert_eq!(ok.statement_id, 7);
        assert_eq!(ok.columns_num, 2);
        assert_eq!(ok.params_num, 1);
    }

    #[test]
    fn rejects_bad_status_byte() {
        let payload = vec![0xFFu8; 12];
        assert!(read_prepare_ok(&payload).is_err());
    }

    #[test]
    fn cache_is_keyed_by_database_and_sql() {
        let mut cache = PreparedCache::new();
        let handle = PreparedHandle { statement_id: 1, columns_num: 0, params_num: 0 };
        cache.insert("app", "SELECT 1", handle);

        assert_eq!(cache.get("app", "SELECT 1"), Some(handle));
        assert_eq!(cache.get("other_db", "SELECT 1"), None);

        cache.clear();
        assert!(cache.is_empty());
    }
}
