//! Column definition packets (`Protocol::ColumnDefinition41`).

use crate::binary::Reader;
use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result};

/// A decoded column definition, owned (the packet buffer it came from is
/// reused as soon as the caller has these).
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl ColumnDescriptor {
    /// Columns this crate is willing to stream into an `on_long_data` sink
    /// rather than materialize in the row matrix.
    pub fn variable_length(&self) -> bool {
        self.column_type.is_variable_length()
    }
}

pub fn read_column_definition(payload: &[u8]) -> Result<ColumnDescriptor> {
    let mut r = Reader::new(payload);

    let catalog = r.read_string_lenenc()?;
    let schema = r.read_string_lenenc()?;
    let table = r.read_string_lenenc()?;
    let org_table = r.read_string_lenenc()?;
    let name = r.read_string_lenenc()?;
    let org_name = r.read_string_lenenc()?;

    let fixed_len = r.read_int_lenenc()?;
    if fixed_len != 0x0c {
        return Err(Error::protocol(format!(
            "column definition fixed-length marker was {fixed_len}, expected 12"
        )));
    }

    let charset = r.read_int_2()?;
    let column_length = r.read_int_4()?;
    let type_byte = r.read_int_1()?;
    let column_type = ColumnType::from_u8(type_byte)
        .ok_or_else(|| Error::protocol(format!("unknown column type {type_byte:#x}")))?;
    let flags = ColumnFlags::from_bits_truncate(r.read_int_2()?);
    let decimals = r.read_int_1()?;

    Ok(ColumnDescriptor {
        catalog,
        schema,
        table,
        org_table,
        name,
        org_name,
        charset,
        column_length,
        column_type,
        flags,
        decimals,
    })
}

/// Number of columns in the result set, from the result-set header packet.
pub fn read_column_count(payload: &[u8]) -> Result<u64> {
    Reader::new(payload).read_int_lenenc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Vec<u8> {
        let mut packet = Vec::new();
        for field in ["def", "test", "users", "users", "id", "id"] {
            packet.push(field.len() as u8);
            packet.extend_from_slice(field.as_bytes());
        }
        packet.push(0x0c);
        packet.extend_from_slice(&[
            0x21, 0x00, // charset = 33
            0x0B, 0x00, 0x00, 0x00, // column_length = 11
            0x03, // LONG
            0x03, 0x00, // NOT_NULL | PRI_KEY
            0x00, // decimals
            0x00, 0x00, // reserved
        ]);
        packet
    }

    #[test]
    fn parses_column_definition() {
        let col = read_column_definition(&sample_packet()).unwrap();
        assert_eq!(col.name, "id");
        assert_eq!(col.column_length, 11);
        assert_eq!(col.column_type, ColumnType::MYSQL_TYPE_LONG);
        assert!(col.flags.contains(ColumnFlags::PRI_KEY_FLAG));
        assert!(!col.variable_length());
    }

    #[test]
    fn rejects_bad_fixed_length_marker() {
        let mut packet = sample_packet();
        let fixed_len_offset = packet.len() - 12 - 1;
        packet[fixed_len_offset] = 0x0d; // corrupt the fixed-length indicator byte
        assert!(read_column_definition(&packet).is_err());
    }
}
