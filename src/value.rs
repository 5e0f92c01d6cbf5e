//! The typed value codec: `Param` for encoding outbound parameters and
//! `Value`/`decode_value` for decoding binary protocol result columns.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};

use crate::binary::{
    Reader, write_bytes_lenenc, write_int_1, write_int_2, write_int_4, write_int_8,
    write_string_lenenc,
};
use crate::col::ColumnDescriptor;
use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result};

/// A single bound parameter for `COM_STMT_EXECUTE`.
///
/// Unlike the teacher's per-type `Param` trait, this is an enum: the
/// `Stream` variant needs to be drained into `COM_STMT_SEND_LONG_DATA`
/// frames by the engine *before* EXECUTE is written, which a synchronous
/// `write_value(&self, &mut Vec<u8>)` method cannot express. Everything
/// else still follows the teacher's type -> wire-type mapping exactly.
pub enum Param {
    Null,
    SignedInt(i64),
    UnsignedInt(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Str(String),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Json(serde_json::Value),
    /// Drained via `COM_STMT_SEND_LONG_DATA` ahead of EXECUTE; see `long_data.rs`.
    Stream(std::pin::Pin<Box<dyn tokio::io::AsyncRead + Send + Unpin>>),
}

impl Param {
    pub fn is_null(&self) -> bool {
        matches!(self, Param::Null)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Param::Stream(_))
    }

    /// 2-byte type header: MySQL type code + unsigned flag.
    pub fn write_type(&self, out: &mut Vec<u8>) {
        let (ty, unsigned) = match self {
            Param::Null => (ColumnType::MYSQL_TYPE_VAR_STRING, false),
            Param::SignedInt(v) => (signed_width_type(*v).0, false),
            Param::UnsignedInt(v) => (unsigned_width_type(*v).0, true),
            Param::Float(_) => (ColumnType::MYSQL_TYPE_FLOAT, false),
            Param::Double(_) => (ColumnType::MYSQL_TYPE_DOUBLE, false),
            Param::Bytes(_) | Param::Stream(_) => (ColumnType::MYSQL_TYPE_LONG_BLOB, false),
            Param::Str(_) | Param::DateTime(_) | Param::Date(_) | Param::Json(_) => {
                (ColumnType::MYSQL_TYPE_VAR_STRING, false)
            }
        };
        out.push(ty as u8);
        out.push(if unsigned { 0x80 } else { 0x00 });
    }

    /// Encode the inline value. Must not be called for `Stream` — the
    /// engine drains those separately and writes nothing in their slot.
    pub fn write_value(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Param::Null => Ok(()),
            Param::SignedInt(v) => {
                match signed_width_type(*v).1 {
                    1 => write_int_1(out, *v as i8 as u8),
                    2 => write_int_2(out, *v as i16 as u16),
                    4 => write_int_4(out, *v as i32 as u32),
                    _ => write_int_8(out, *v as u64),
                }
                Ok(())
            }
            Param::UnsignedInt(v) => {
                match unsigned_width_type(*v).1 {
                    1 => write_int_1(out, *v as u8),
                    2 => write_int_2(out, *v as u16),
                    4 => write_int_4(out, *v as u32),
                    _ => write_int_8(out, *v),
                }
                Ok(())
            }
            Param::Float(v) => {
                write_int_4(out, v.to_bits());
                Ok(())
            }
            Param::Double(v) => {
                write_int_8(out, v.to_bits());
                Ok(())
            }
            Param::Bytes(b) => {
                write_bytes_lenenc(out, b);
                Ok(())
            }
            Param::Str(s) => {
                write_string_lenenc(out, s);
                Ok(())
            }
            Param::DateTime(dt) => {
                write_string_lenenc(out, &dt.format("%Y-%m-%d %H:%M:%S").to_string());
                Ok(())
            }
            Param::Date(d) => {
                write_string_lenenc(out, &d.format("%Y-%m-%d").to_string());
                Ok(())
            }
            Param::Json(v) => {
                write_string_lenenc(out, &v.to_string());
                Ok(())
            }
            Param::Stream(_) => Err(Error::from_debug(
                "write_value called on a Stream parameter; engine must drain it separately",
            )),
        }
    }
}

/// Smallest signed wire width that fits `v`: {1,2,4,8} bytes. MySQL has no
/// 3-byte integer type code, so a value needing 3 bytes is promoted to 4.
fn signed_width_type(v: i64) -> (ColumnType, u8) {
    if (i64::from(i8::MIN)..=i64::from(i8::MAX)).contains(&v) {
        (ColumnType::MYSQL_TYPE_TINY, 1)
    } else if (i64::from(i16::MIN)..=i64::from(i16::MAX)).contains(&v) {
        (ColumnType::MYSQL_TYPE_SHORT, 2)
    } else if (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(&v) {
        (ColumnType::MYSQL_TYPE_LONG, 4)
    } else {
        (ColumnType::MYSQL_TYPE_LONGLONG, 8)
    }
}

/// Smallest unsigned wire width that fits `v`: {1,2,4,8} bytes.
fn unsigned_width_type(v: u64) -> (ColumnType, u8) {
    if v <= u64::from(u8::MAX) {
        (ColumnType::MYSQL_TYPE_TINY, 1)
    } else if v <= u64::from(u16::MAX) {
        (ColumnType::MYSQL_TYPE_SHORT, 2)
    } else if v <= u64::from(u32::MAX) {
        (ColumnType::MYSQL_TYPE_LONG, 4)
    } else {
        (ColumnType::MYSQL_TYPE_LONGLONG, 8)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::SignedInt(v)
    }
}
impl From<u64> for Param {
    fn from(v: u64) -> Self {
        Param::UnsignedInt(v)
    }
}
impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Double(v)
    }
}
impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Str(v.to_string())
    }
}
impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Str(v)
    }
}
impl From<Vec<u8>> for Param {
    fn from(v: Vec<u8>) -> Self {
        Param::Bytes(v)
    }
}
impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Param::Null,
        }
    }
}

/// Encode an `i128` as the smallest signed/unsigned wire integer that fits.
/// Rejected rather than silently stringified, per caller-side mismatch
/// handling for oversized integers.
pub fn integer_param_from_i128(v: i128) -> Result<Param> {
    if let Ok(signed) = i64::try_from(v) {
        Ok(Param::SignedInt(signed))
    } else if let Ok(unsigned) = u64::try_from(v) {
        Ok(Param::UnsignedInt(unsigned))
    } else {
        Err(Error::UnsupportedParam(format!(
            "integer {v} does not fit in 64 bits"
        )))
    }
}

/// A decoded binary-protocol column value, owned.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time {
        negative: bool,
        days: u32,
        hours: u8,
        minutes: u8,
        seconds: u8,
        micros: u32,
    },
    /// `DATETIME`/`TIMESTAMP` rendered as epoch milliseconds, when
    /// `Opts::convert_to_timestamp` is set.
    TimestampMillis(i64),
    /// Placeholder left behind for a column whose bytes were routed to an
    /// `on_long_data` sink instead of being materialized here.
    Streamed { type_name: String, length: u64 },
}

/// Decode one column value from `data`, returning it and the unconsumed tail.
pub fn decode_value<'a>(
    column: &ColumnDescriptor,
    data: &'a [u8],
    convert_to_timestamp: bool,
) -> Result<(Value, &'a [u8])> {
    let is_unsigned = column.flags.contains(ColumnFlags::UNSIGNED_FLAG);
    let mut r = Reader::new(data);

    let value = match column.column_type {
        ColumnType::MYSQL_TYPE_NULL => Value::Null,

        ColumnType::MYSQL_TYPE_TINY => {
            let v = r.read_int_1()?;
            if is_unsigned { Value::UInt(v as u64) } else { Value::Int(v as i8 as i64) }
        }
        ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
            let v = r.read_int_2()?;
            if is_unsigned { Value::UInt(v as u64) } else { Value::Int(v as i16 as i64) }
        }
        ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG => {
            let v = r.read_int_4()?;
            if is_unsigned { Value::UInt(v as u64) } else { Value::Int(v as i32 as i64) }
        }
        ColumnType::MYSQL_TYPE_LONGLONG => {
            let v = r.read_int_8()?;
            if is_unsigned { Value::UInt(v) } else { Value::Int(v as i64) }
        }

        ColumnType::MYSQL_TYPE_FLOAT => Value::Float(f32::from_bits(r.read_int_4()?)),
        ColumnType::MYSQL_TYPE_DOUBLE => Value::Double(f64::from_bits(r.read_int_8()?)),

        ColumnType::MYSQL_TYPE_DATE
        | ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_TIMESTAMP2
        | ColumnType::MYSQL_TYPE_DATETIME2
        | ColumnType::MYSQL_TYPE_NEWDATE => {
            let len = r.read_int_1()?;
            let (date, time) = match len {
                0 => (NaiveDate::from_ymd_opt(0, 1, 1).unwrap(), NaiveTime::default()),
                4 => {
                    let bytes = r.read_bytes_fix(4)?;
                    let ts = Timestamp4::ref_from_bytes(bytes).map_err(Error::from_debug)?;
                    (date_from_ymd(ts.year(), ts.month, ts.day)?, NaiveTime::default())
                }
                7 => {
                    let bytes = r.read_bytes_fix(7)?;
                    let ts = Timestamp7::ref_from_bytes(bytes).map_err(Error::from_debug)?;
                    (
                        date_from_ymd(ts.year(), ts.month, ts.day)?,
                        NaiveTime::from_hms_opt(ts.hour as u32, ts.minute as u32, ts.second as u32)
                            .ok_or_else(|| Error::protocol("invalid time-of-day in timestamp"))?,
                    )
                }
                11 => {
                    let bytes = r.read_bytes_fix(11)?;
                    let ts = Timestamp11::ref_from_bytes(bytes).map_err(Error::from_debug)?;
                    (
                        date_from_ymd(ts.year(), ts.month, ts.day)?,
                        NaiveTime::from_hms_micro_opt(
                            ts.hour as u32,
                            ts.minute as u32,
                            ts.second as u32,
                            ts.microsecond(),
                        )
                        .ok_or_else(|| Error::protocol("invalid time-of-day in timestamp"))?,
                    )
                }
                other => return Err(Error::protocol(format!("invalid timestamp length {other}"))),
            };

            if column.column_type == ColumnType::MYSQL_TYPE_DATE
                || column.column_type == ColumnType::MYSQL_TYPE_NEWDATE
            {
                Value::Date(date)
            } else {
                let dt = NaiveDateTime::new(date, time);
                if convert_to_timestamp {
                    Value::TimestampMillis(dt.and_utc().timestamp_millis())
                } else {
                    Value::DateTime(dt)
                }
            }
        }

        ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => {
            let len = r.read_int_1()?;
            match len {
                0 => Value::Time { negative: false, days: 0, hours: 0, minutes: 0, seconds: 0, micros: 0 },
                8 => {
                    let bytes = r.read_bytes_fix(8)?;
                    let t = Time8::ref_from_bytes(bytes).map_err(Error::from_debug)?;
                    Value::Time {
                        negative: t.is_negative(),
                        days: t.days(),
                        hours: t.hour,
                        minutes: t.minute,
                        seconds: t.second,
                        micros: 0,
                    }
                }
                12 => {
                    let bytes = r.read_bytes_fix(12)?;
                    let t = Time12::ref_from_bytes(bytes).map_err(Error::from_debug)?;
                    Value::Time {
                        negative: t.is_negative(),
                        days: t.days(),
                        hours: t.hour,
                        minutes: t.minute,
                        seconds: t.second,
                        micros: t.microsecond(),
                    }
                }
                other => return Err(Error::protocol(format!("invalid time length {other}"))),
            }
        }

        ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_STRING
        | ColumnType::MYSQL_TYPE_BLOB
        | ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_GEOMETRY
        | ColumnType::MYSQL_TYPE_JSON
        | ColumnType::MYSQL_TYPE_DECIMAL
        | ColumnType::MYSQL_TYPE_NEWDECIMAL
        | ColumnType::MYSQL_TYPE_ENUM
        | ColumnType::MYSQL_TYPE_SET
        | ColumnType::MYSQL_TYPE_BIT
        | ColumnType::MYSQL_TYPE_TYPED_ARRAY => {
            let bytes = r.read_bytes_lenenc()?;
            if column.flags.contains(ColumnFlags::BINARY_FLAG) {
                Value::Bytes(bytes.to_vec())
            } else {
                Value::Str(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    };

    Ok((value, r.rest()))
}

fn date_from_ymd(year: u16, month: u8, day: u8) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year as i32, month.max(1) as u32, day.max(1) as u32)
        .ok_or_else(|| Error::protocol(format!("invalid date {year}-{month}-{day}")))
}

/// Static wire width of a column whose size never depends on its own
/// content. `None` for temporal types (which carry a leading length byte)
/// and variable-length types (lenenc-prefixed); used by the row decoder to
/// read exactly the right number of bytes off the wire without buffering a
/// whole row first.
pub fn fixed_width(column_type: ColumnType) -> Option<usize> {
    use ColumnType::*;
    match column_type {
        MYSQL_TYPE_NULL => Some(0),
        MYSQL_TYPE_TINY => Some(1),
        MYSQL_TYPE_SHORT | MYSQL_TYPE_YEAR => Some(2),
        MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG | MYSQL_TYPE_FLOAT => Some(4),
        MYSQL_TYPE_LONGLONG | MYSQL_TYPE_DOUBLE => Some(8),
        _ => None,
    }
}

/// Bytes remaining after a temporal column's leading length byte, mirroring
/// the length codes `decode_value` switches on for DATE/DATETIME/TIMESTAMP
/// (0/4/7/11) and TIME (0/8/12).
pub fn temporal_payload_len(column_type: ColumnType, length_byte: u8) -> Result<usize> {
    let is_date_like = matches!(
        column_type,
        ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIMESTAMP2
            | ColumnType::MYSQL_TYPE_DATETIME2
            | ColumnType::MYSQL_TYPE_NEWDATE
    );
    if is_date_like {
        match length_byte {
            0 | 4 | 7 | 11 => Ok(length_byte as usize),
            other => Err(Error::protocol(format!("invalid timestamp length {other}"))),
        }
    } else {
        match length_byte {
            0 | 8 | 12 => Ok(length_byte as usize),
            other => Err(Error::protocol(format!("invalid time length {other}"))),
        }
    }
}

/// Turn an already-lenenc-length-stripped byte run into the `Str`/`Bytes`
/// value it decodes to, per the same `BINARY_FLAG` rule `decode_value` uses.
pub fn bytes_to_value(column: &ColumnDescriptor, bytes: Vec<u8>) -> Value {
    if column.flags.contains(ColumnFlags::BINARY_FLAG) {
        Value::Bytes(bytes)
    } else {
        Value::Str(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ============================================================================
// Fixed-size temporal wire structs (zero-copy casts)
// ============================================================================

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
struct Timestamp4 {
    year: U16LE,
    month: u8,
    day: u8,
}
impl Timestamp4 {
    fn year(&self) -> u16 {
        self.year.get()
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
struct Timestamp7 {
    year: U16LE,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}
impl Timestamp7 {
    fn year(&self) -> u16 {
        self.year.get()
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
struct Timestamp11 {
    year: U16LE,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    microsecond: U32LE,
}
impl Timestamp11 {
    fn year(&self) -> u16 {
        self.year.get()
    }
    fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
struct Time8 {
    is_negative: u8,
    days: U32LE,
    hour: u8,
    minute: u8,
    second: u8,
}
impl Time8 {
    fn is_negative(&self) -> bool {
        self.is_negative != 0
    }
    fn days(&self) -> u32 {
        self.days.get()
    }
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, zerocopy::KnownLayout, zerocopy::Immutable)]
struct Time12 {
    is_negative: u8,
    days: U32LE,
    hour: u8,
    minute: u8,
    second: u8,
    microsecond: U32LE,
}
impl Time12 {
    fn is_negative(&self) -> bool {
        self.is_negative != 0
    }
    fn days(&self) -> u32 {
        self.days.get()
    }
    fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

// ============================================================================
// NULL bitmap
// ============================================================================

/// NULL bitmap for binary protocol rows/params. Result-set rows have an
/// offset of 2 bits; parameter bitmaps have an offset of 0.
#[derive(Debug, Clone, Copy)]
pub struct NullBitmap<'a> {
    bitmap: &'a [u8],
    offset: usize,
}

impl<'a> NullBitmap<'a> {
    pub fn for_result_set(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 2 }
    }

    pub fn for_parameters(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 0 }
    }

    pub fn is_null(&self, idx: usize) -> bool {
        let bit_pos = idx + self.offset;
        let byte_pos = bit_pos >> 3;
        let bit_offset = bit_pos & 7;
        byte_pos < self.bitmap.len() && (self.bitmap[byte_pos] & (1 << bit_offset)) != 0
    }
}

pub fn null_bitmap_len(num_fields: usize, offset: usize) -> usize {
    (num_fields + offset + 7) / 8
}

/// Write the parameter NULL bitmap for a `COM_STMT_EXECUTE` payload.
pub fn write_param_null_bitmap(out: &mut Vec<u8>, params: &[Param]) {
    let len = null_bitmap_len(params.len(), 0);
    let mut bitmap = vec![0u8; len];
    for (i, p) in params.iter().enumerate() {
        if p.is_null() {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    out.extend_from_slice(&bitmap);
}

/// Write the `(type, unsigned_flag)` pair for every parameter.
pub fn write_param_types(out: &mut Vec<u8>, params: &[Param]) {
    for p in params {
        p.write_type(out);
    }
}

/// Write inline values for every non-null, non-stream parameter, in order.
/// `Stream` parameters must already have been drained via
/// `COM_STMT_SEND_LONG_DATA`; their slot contributes no bytes here.
pub fn write_param_values(out: &mut Vec<u8>, params: &[Param]) -> Result<()> {
    for p in params {
        if p.is_null() || p.is_stream() {
            continue;
        }
        p.write_value(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(ty: ColumnType, flags: ColumnFlags) -> ColumnDescriptor {
        ColumnDescriptor {
            catalog: "def".into(),
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: String::new(),
            org_name: String::new(),
            charset: 33,
            column_length: 0,
            column_type: ty,
            flags,
            decimals: 0,
        }
    }

    #[test]
    fn decodes_signed_and_unsigned_tiny() {
        let c = col(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::empty());
        let (v, rest) = decode_value(&c, &[214u8], false).unwrap();
        assert_eq!(v, Value::Int(-42));
        assert!(rest.is_empty());

        let c = col(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::UNSIGNED_FLAG);
        let (v, _) = decode_value(&c, &[200u8], false).unwrap();
        assert_eq!(v, Value::UInt(200));
    }

    #[test]
    fn decodes_datetime_and_converts_to_timestamp() {
        let c = col(ColumnType::MYSQL_TYPE_DATETIME, ColumnFlags::empty());
        let mut data = vec![7u8];
        data.extend_from_slice(&2024u16.to_le_bytes());
        data.extend_from_slice(&[12, 25, 15, 30, 45]);

        let (v, _) = decode_value(&c, &data, false).unwrap();
        assert_eq!(
            v,
            Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 12, 25)
                    .unwrap()
                    .and_hms_opt(15, 30, 45)
                    .unwrap()
            )
        );

        let (v, _) = decode_value(&c, &data, true).unwrap();
        assert!(matches!(v, Value::TimestampMillis(_)));
    }

    #[test]
    fn decodes_var_string_as_utf8() {
        let c = col(ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty());
        let mut data = vec![5u8];
        data.extend_from_slice(b"Hello");
        let (v, rest) = decode_value(&c, &data, false).unwrap();
        assert_eq!(v, Value::Str("Hello".to_string()));
        assert!(rest.is_empty());
    }

    #[test]
    fn null_bitmap_offsets() {
        let bitmap = [0b0000_0100u8, 0b0001_0000];
        let nb = NullBitmap::for_result_set(&bitmap);
        assert!(nb.is_null(0));
        assert!(!nb.is_null(1));
        assert!(nb.is_null(10));

        let bitmap = [0b0000_0101u8];
        let nb = NullBitmap::for_parameters(&bitmap);
        assert!(nb.is_null(0));
        assert!(nb.is_null(2));
        assert!(!nb.is_null(1));
    }

    #[test]
    fn integer_param_rejects_overflow() {
        assert!(integer_param_from_i128(i128::MAX).is_err());
        assert!(matches!(
            integer_param_from_i128(42).unwrap(),
            Param::SignedInt(42)
        ));
    }

    #[test]
    fn signed_param_picks_narrowest_width() {
        let cases: &[(i64, ColumnType, usize)] = &[
            (42, ColumnType::MYSQL_TYPE_TINY, 1),
            (-42, ColumnType::MYSQL_TYPE_TINY, 1),
            (1000, ColumnType::MYSQL_TYPE_SHORT, 2),
            (100_000, ColumnType::MYSQL_TYPE_LONG, 4),
            (i64::MAX, ColumnType::MYSQL_TYPE_LONGLONG, 8),
        ];
        for (v, expected_ty, expected_width) in cases.iter().copied() {
            let param = Param::SignedInt(v);
            let mut ty_out = Vec::new();
            param.write_type(&mut ty_out);
            assert_eq!(ty_out[0], expected_ty as u8, "value {v}");
            assert_eq!(ty_out[1], 0x00, "signed params are never unsigned-flagged");

            let mut value_out = Vec::new();
            param.write_value(&mut value_out).unwrap();
            assert_eq!(value_out.len(), expected_width, "value {v}");
        }
    }

    #[test]
    fn unsigned_param_picks_narrowest_width_and_sets_flag() {
        let cases: &[(u64, ColumnType, usize)] = &[
            (200, ColumnType::MYSQL_TYPE_TINY, 1),
            (60_000, ColumnType::MYSQL_TYPE_SHORT, 2),
            (u64::from(u32::MAX), ColumnType::MYSQL_TYPE_LONG, 4),
            (u64::MAX, ColumnType::MYSQL_TYPE_LONGLONG, 8),
        ];
        for (v, expected_ty, expected_width) in cases.iter().copied() {
            let param = Param::UnsignedInt(v);
            let mut ty_out = Vec::new();
            param.write_type(&mut ty_out);
            assert_eq!(ty_out[0], expected_ty as u8, "value {v}");
            assert_eq!(ty_out[1], 0x80, "unsigned params set the unsigned flag");

            let mut value_out = Vec::new();
            param.write_value(&mut value_out).unwrap();
            assert_eq!(value_out.len(), expected_width, "value {v}");
        }
    }
}
