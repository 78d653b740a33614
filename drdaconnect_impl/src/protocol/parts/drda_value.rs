use crate::{
    protocol::{
        codepoint::NULLDATA,
        frame_buffer::FrameBuffer,
        parts::type_table::{
            decimal_precision_and_scale, ValueShape, WireType, DRDA_TYPE_CLOBLOC, DRDA_TYPE_DATE,
            DRDA_TYPE_DECIMAL, DRDA_TYPE_FLOAT4, DRDA_TYPE_FLOAT8, DRDA_TYPE_INTEGER,
            DRDA_TYPE_INTEGER8, DRDA_TYPE_LOBBYTES, DRDA_TYPE_LOBCMIXED, DRDA_TYPE_LOBLOC,
            DRDA_TYPE_LONGMIX, DRDA_TYPE_LONGVARBYTE, DRDA_TYPE_SMALL, DRDA_TYPE_TIME,
            DRDA_TYPE_TIMESTAMP, DRDA_TYPE_VARBYTE, DRDA_TYPE_VARMIX, UNKNOWN_LENGTH_MARKER,
            UNKNOWN_LENGTH_PLACEHOLDER,
        },
    },
    types_impl::{datetime, packed_decimal},
    DrdaError, DrdaResult,
};
use bigdecimal::BigDecimal;
use std::{
    io::Read,
    sync::{Arc, Mutex},
};
use time::{Date, PrimitiveDateTime, Time};

/// Indicator written in front of a non-null value of a nullable type.
pub(crate) const INDICATOR_NOT_NULL: u8 = 0x00;

/// Enum for all supported database values.
///
/// Values received in rows use the variant matching the column's wire type;
/// large objects are received completely and are represented as `CLOB` or `BLOB`.
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
pub enum DrdaValue {
    /// Representation of a database NULL value.
    NULL,
    /// BOOLEAN.
    BOOLEAN(bool),
    /// Stores a 16-bit signed integer.
    SMALLINT(i16),
    /// Stores a 32-bit signed integer.
    INTEGER(i32),
    /// Stores a 64-bit signed integer.
    BIGINT(i64),
    /// Stores a single-precision 32-bit floating-point number.
    REAL(f32),
    /// Stores a double-precision 64-bit floating-point number.
    DOUBLE(f64),
    /// Fixed-point decimal value with up to 31 digits.
    DECIMAL(BigDecimal),
    /// Character data.
    STRING(String),
    /// Binary data.
    BINARY(Vec<u8>),
    /// DATE.
    DATE(Date),
    /// TIME, with second precision.
    TIME(Time),
    /// TIMESTAMP, with microsecond precision on the wire.
    TIMESTAMP(PrimitiveDateTime),
    /// A character large object.
    CLOB(String),
    /// A binary large object.
    BLOB(Vec<u8>),
    /// A large object that is streamed to the database from a reader,
    /// with the byte length if it is known in advance.
    ///
    /// Without a known length, the value is sent with unknown-length streaming,
    /// or is buffered completely if the configuration disables that.
    LOBSTREAM(Option<u64>, Arc<Mutex<dyn Read + Send>>),
    /// A server-side large-object locator.
    LOCATOR(i32),
}

impl DrdaValue {
    /// Returns true if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::NULL)
    }

    /// Convenience constructor for streamed large objects.
    pub fn lob_stream<R: Read + Send + 'static>(length: Option<u64>, reader: R) -> Self {
        Self::LOBSTREAM(length, Arc::new(Mutex::new(reader)))
    }

    pub(crate) fn shape(&self) -> DrdaResult<ValueShape> {
        Ok(match self {
            Self::NULL => ValueShape::Null,
            Self::STRING(s) | Self::CLOB(s) => ValueShape::Chars {
                chars: s.chars().count(),
                bytes: s.len(),
            },
            Self::BINARY(b) | Self::BLOB(b) => ValueShape::Bytes(b.len()),
            Self::DECIMAL(d) => {
                let (precision, scale) = packed_decimal::precision_and_scale(d)?;
                ValueShape::Decimal { precision, scale }
            }
            Self::LOBSTREAM(length, _) => ValueShape::Stream(*length),
            Self::LOCATOR(_) => ValueShape::Locator,
            Self::BOOLEAN(_)
            | Self::SMALLINT(_)
            | Self::INTEGER(_)
            | Self::BIGINT(_)
            | Self::REAL(_)
            | Self::DOUBLE(_)
            | Self::DATE(_)
            | Self::TIME(_)
            | Self::TIMESTAMP(_) => ValueShape::Scalar,
        })
    }

    /// Converts the value into its FDODTA representation for the given wire type.
    ///
    /// Conversion happens before anything is written, so that a value that does not
    /// fit its declared type fails the request without side effects.
    /// For large objects, only the length is part of FDODTA; `lob_length` is the
    /// byte length of the value, or `None` if it is unknown.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn encode(&self, wire: WireType, lob_length: Option<u64>) -> DrdaResult<Encoded<'_>> {
        if self.is_null() {
            return Ok(Encoded::Null);
        }
        Ok(match (wire.drda_type & !1, self) {
            (DRDA_TYPE_LOBBYTES | DRDA_TYPE_LOBCMIXED, _) => {
                Encoded::LobLength(lob_length_bytes(wire.length, lob_length)?)
            }
            (DRDA_TYPE_SMALL, Self::BOOLEAN(b)) => Encoded::I16(i16::from(*b)),
            (DRDA_TYPE_SMALL, _) => {
                let i = self.as_i64(wire)?;
                Encoded::I16(i16::try_from(i).map_err(|_| out_of_range(i, "SMALLINT"))?)
            }
            (DRDA_TYPE_INTEGER, _) => {
                let i = self.as_i64(wire)?;
                Encoded::I32(i32::try_from(i).map_err(|_| out_of_range(i, "INTEGER"))?)
            }
            (DRDA_TYPE_INTEGER8, _) => Encoded::I64(self.as_i64(wire)?),
            (DRDA_TYPE_FLOAT4, _) => Encoded::F32(self.as_f64(wire)? as f32),
            (DRDA_TYPE_FLOAT8, _) => Encoded::F64(self.as_f64(wire)?),
            (DRDA_TYPE_DECIMAL, _) => {
                let d = match self {
                    Self::DECIMAL(d) => d.clone(),
                    Self::SMALLINT(_) | Self::INTEGER(_) | Self::BIGINT(_) => {
                        BigDecimal::from(self.as_i64(wire)?)
                    }
                    _ => return Err(mismatch(self, wire)),
                };
                let (precision, scale) = decimal_precision_and_scale(wire.length);
                Encoded::Fixed(packed_decimal::to_packed(&d, precision, scale)?)
            }
            (DRDA_TYPE_VARMIX | DRDA_TYPE_LONGMIX, Self::STRING(s) | Self::CLOB(s)) => {
                Encoded::Ld(s.as_bytes())
            }
            (DRDA_TYPE_VARBYTE | DRDA_TYPE_LONGVARBYTE, Self::BINARY(b) | Self::BLOB(b)) => {
                Encoded::Ld(b)
            }
            (DRDA_TYPE_DATE, Self::DATE(d)) => {
                Encoded::Fixed(datetime::date_to_string(*d)?.into_bytes())
            }
            (DRDA_TYPE_DATE, Self::TIMESTAMP(ts)) => {
                Encoded::Fixed(datetime::date_to_string(ts.date())?.into_bytes())
            }
            (DRDA_TYPE_TIME, Self::TIME(t)) => {
                Encoded::Fixed(datetime::time_to_string(*t)?.into_bytes())
            }
            (DRDA_TYPE_TIME, Self::TIMESTAMP(ts)) => {
                Encoded::Fixed(datetime::time_to_string(ts.time())?.into_bytes())
            }
            (DRDA_TYPE_TIMESTAMP, Self::TIMESTAMP(ts)) => {
                Encoded::Fixed(datetime::timestamp_to_string(*ts)?.into_bytes())
            }
            (DRDA_TYPE_TIMESTAMP, Self::DATE(d)) => Encoded::Fixed(
                datetime::timestamp_to_string(d.with_time(Time::MIDNIGHT))?.into_bytes(),
            ),
            (DRDA_TYPE_LOBLOC | DRDA_TYPE_CLOBLOC, Self::LOCATOR(l)) => Encoded::I32(*l),
            _ => return Err(mismatch(self, wire)),
        })
    }

    fn as_i64(&self, wire: WireType) -> DrdaResult<i64> {
        match self {
            Self::BOOLEAN(b) => Ok(i64::from(*b)),
            Self::SMALLINT(i) => Ok(i64::from(*i)),
            Self::INTEGER(i) => Ok(i64::from(*i)),
            Self::BIGINT(i) => Ok(*i),
            _ => Err(mismatch(self, wire)),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(&self, wire: WireType) -> DrdaResult<f64> {
        match self {
            Self::REAL(f) => Ok(f64::from(*f)),
            Self::DOUBLE(f) => Ok(*f),
            Self::SMALLINT(_) | Self::INTEGER(_) | Self::BIGINT(_) => Ok(self.as_i64(wire)? as f64),
            _ => Err(mismatch(self, wire)),
        }
    }
}

/// A parameter value, converted for FDODTA.
#[derive(Debug)]
pub(crate) enum Encoded<'a> {
    Null,
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Fixed(Vec<u8>),
    Ld(&'a [u8]),
    LobLength(Vec<u8>),
}
impl<'a> Encoded<'a> {
    /// Writes the null indicator and the data.
    pub(crate) fn write(&self, fb: &mut FrameBuffer) -> DrdaResult<()> {
        if let Self::Null = self {
            fb.write_u8(NULLDATA);
            return Ok(());
        }
        fb.write_u8(INDICATOR_NOT_NULL);
        match self {
            Self::Null => {}
            Self::I16(i) => fb.write_i16(*i),
            Self::I32(i) => fb.write_i32(*i),
            Self::I64(i) => fb.write_i64(*i),
            Self::F32(f) => fb.write_f32(*f),
            Self::F64(f) => fb.write_f64(*f),
            Self::Fixed(bytes) | Self::LobLength(bytes) => fb.write_bytes(bytes),
            Self::Ld(bytes) => fb.write_ld_bytes(bytes)?,
        }
        Ok(())
    }
}

fn mismatch(value: &DrdaValue, wire: WireType) -> DrdaError {
    DrdaError::UsageDetailed(format!(
        "value {value} cannot be sent with wire type 0x{:02X}",
        wire.drda_type
    ))
}

fn out_of_range(value: i64, sql_type: &str) -> DrdaError {
    DrdaError::UsageDetailed(format!("value {value} is out of range for {sql_type}"))
}

// The data of a large object in FDODTA is its length, in as many bytes
// as the low bits of the placeholder length say.
fn lob_length_bytes(placeholder: u16, lob_length: Option<u64>) -> DrdaResult<Vec<u8>> {
    match lob_length {
        None if placeholder == UNKNOWN_LENGTH_PLACEHOLDER => {
            Ok(UNKNOWN_LENGTH_MARKER.to_be_bytes().to_vec())
        }
        None => Err(impl_err!("unknown LOB length with placeholder 0x{placeholder:04X}")),
        Some(length) => {
            let n = usize::from(placeholder & 0x7FFF);
            Ok(length.to_be_bytes()[8 - n..].to_vec())
        }
    }
}

impl std::fmt::Display for DrdaValue {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::NULL => write!(fmt, "<NULL>"),
            Self::BOOLEAN(value) => write!(fmt, "{value}"),
            Self::SMALLINT(value) => write!(fmt, "{value}"),
            Self::INTEGER(value) => write!(fmt, "{value}"),
            Self::BIGINT(value) => write!(fmt, "{value}"),
            Self::REAL(value) => write!(fmt, "{value}"),
            Self::DOUBLE(value) => write!(fmt, "{value}"),
            Self::DECIMAL(value) => write!(fmt, "{value}"),
            Self::STRING(value) => {
                if value.len() < 10_000 {
                    write!(fmt, "{value}")
                } else {
                    write!(fmt, "<STRING length = {}>", value.len())
                }
            }
            Self::BINARY(vec) => write!(fmt, "<BINARY length = {}>", vec.len()),
            Self::DATE(value) => write!(fmt, "{value}"),
            Self::TIME(value) => write!(fmt, "{value}"),
            Self::TIMESTAMP(value) => write!(fmt, "{value}"),
            Self::CLOB(value) => write!(fmt, "<CLOB length = {}>", value.len()),
            Self::BLOB(value) => write!(fmt, "<BLOB length = {}>", value.len()),
            Self::LOBSTREAM(Some(length), _) => write!(fmt, "<LOBSTREAM length = {length}>"),
            Self::LOBSTREAM(None, _) => write!(fmt, "<LOBSTREAM>"),
            Self::LOCATOR(value) => write!(fmt, "<LOCATOR {value}>"),
        }
    }
}

impl std::fmt::Debug for DrdaValue {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::STRING(value) => write!(fmt, "STRING({value:?})"),
            Self::BINARY(value) => write!(fmt, "BINARY({})", hex::encode(value)),
            _ => write!(fmt, "{self}"),
        }
    }
}

impl PartialEq for DrdaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NULL, Self::NULL) => true,
            (Self::BOOLEAN(a), Self::BOOLEAN(b)) => a == b,
            (Self::SMALLINT(a), Self::SMALLINT(b)) => a == b,
            (Self::INTEGER(a), Self::INTEGER(b)) | (Self::LOCATOR(a), Self::LOCATOR(b)) => a == b,
            (Self::BIGINT(a), Self::BIGINT(b)) => a == b,
            (Self::REAL(a), Self::REAL(b)) => a == b,
            (Self::DOUBLE(a), Self::DOUBLE(b)) => a == b,
            (Self::DECIMAL(a), Self::DECIMAL(b)) => a == b,
            (Self::STRING(a), Self::STRING(b)) | (Self::CLOB(a), Self::CLOB(b)) => a == b,
            (Self::BINARY(a), Self::BINARY(b)) | (Self::BLOB(a), Self::BLOB(b)) => a == b,
            (Self::DATE(a), Self::DATE(b)) => a == b,
            (Self::TIME(a), Self::TIME(b)) => a == b,
            (Self::TIMESTAMP(a), Self::TIMESTAMP(b)) => a == b,
            _ => false,
        }
    }
}

macro_rules! impl_from {
    ($t:ty, $variant:ident) => {
        impl From<$t> for DrdaValue {
            fn from(value: $t) -> Self {
                Self::$variant(value)
            }
        }
    };
}
impl_from!(bool, BOOLEAN);
impl_from!(i16, SMALLINT);
impl_from!(i32, INTEGER);
impl_from!(i64, BIGINT);
impl_from!(f32, REAL);
impl_from!(f64, DOUBLE);
impl_from!(BigDecimal, DECIMAL);
impl_from!(String, STRING);
impl_from!(Vec<u8>, BINARY);
impl_from!(Date, DATE);
impl_from!(Time, TIME);
impl_from!(PrimitiveDateTime, TIMESTAMP);

impl From<&str> for DrdaValue {
    fn from(value: &str) -> Self {
        Self::STRING(value.to_string())
    }
}

impl<T: Into<DrdaValue>> From<Option<T>> for DrdaValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NULL, Into::into)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::parts::type_table::{
        DRDA_TYPE_NDECIMAL, DRDA_TYPE_NFLOAT8, DRDA_TYPE_NINTEGER, DRDA_TYPE_NLOBBYTES,
        DRDA_TYPE_NSMALL, DRDA_TYPE_NTIMESTAMP, DRDA_TYPE_NVARMIX,
    };
    use std::str::FromStr;
    use time::macros::datetime;

    fn emitted(value: &DrdaValue, wire: WireType, lob_length: Option<u64>) -> Vec<u8> {
        let mut fb = FrameBuffer::new(64, 1024);
        value.encode(wire, lob_length).unwrap().write(&mut fb).unwrap();
        fb.as_slice().to_vec()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(
            emitted(&DrdaValue::INTEGER(-2), WireType::new(DRDA_TYPE_NINTEGER, 4), None),
            vec![0x00, 0xFF, 0xFF, 0xFF, 0xFE]
        );
        assert_eq!(
            emitted(&DrdaValue::NULL, WireType::new(DRDA_TYPE_NINTEGER, 4), None),
            vec![0xFF]
        );
        assert_eq!(
            emitted(&DrdaValue::BOOLEAN(true), WireType::new(DRDA_TYPE_NSMALL, 2), None),
            vec![0x00, 0x00, 0x01]
        );
        assert_eq!(
            emitted(&"hé".into(), WireType::new(DRDA_TYPE_NVARMIX, 32_767), None),
            vec![0x00, 0x00, 0x03, b'h', 0xC3, 0xA9]
        );
        let ts = emitted(
            &datetime!(2001-02-03 04:05:06.7).into(),
            WireType::new(DRDA_TYPE_NTIMESTAMP, 26),
            None,
        );
        assert_eq!(&ts[1..], b"2001-02-03-04.05.06.700000");
    }

    #[test]
    fn test_decimal_uses_declared_precision() {
        let d = DrdaValue::DECIMAL(BigDecimal::from_str("1.5").unwrap());
        assert_eq!(
            emitted(&d, WireType::new(DRDA_TYPE_NDECIMAL, 0x0301), None),
            vec![0x00, 0x01, 0x5C]
        );
    }

    #[test]
    fn test_lob_lengths() {
        let blob = DrdaValue::BLOB(vec![1; 70_000]);
        assert_eq!(
            emitted(&blob, WireType::new(DRDA_TYPE_NLOBBYTES, 0x8004), Some(70_000)),
            vec![0x00, 0x00, 0x01, 0x11, 0x70]
        );
        let stream = DrdaValue::lob_stream(None, std::io::empty());
        assert_eq!(
            emitted(&stream, WireType::new(DRDA_TYPE_NLOBBYTES, 0x8002), None),
            vec![0x00, 0x80, 0x00]
        );
    }

    #[test]
    fn test_conversions_and_mismatches() {
        let e = DrdaValue::BIGINT(1 << 40)
            .encode(WireType::new(DRDA_TYPE_NINTEGER, 4), None)
            .unwrap_err();
        assert!(!e.is_chain_breaking());
        assert!(DrdaValue::from("1")
            .encode(WireType::new(DRDA_TYPE_NINTEGER, 4), None)
            .is_err());
        assert_eq!(
            emitted(&DrdaValue::INTEGER(3), WireType::new(DRDA_TYPE_NFLOAT8, 8), None),
            vec![0x00, 0x40, 0x08, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            emitted(&DrdaValue::INTEGER(12), WireType::new(DRDA_TYPE_NDECIMAL, 0x0200), None),
            vec![0x00, 0x01, 0x2C]
        );
    }
}
