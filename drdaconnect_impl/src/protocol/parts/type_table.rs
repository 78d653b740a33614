use crate::{DrdaError, DrdaResult};

// DRDA (FD:OCA) data types; the nullable variant of a type is the next odd number.
pub(crate) const DRDA_TYPE_INTEGER: u8 = 0x02;
pub(crate) const DRDA_TYPE_SMALL: u8 = 0x04;
pub(crate) const DRDA_TYPE_FLOAT8: u8 = 0x0A;
pub(crate) const DRDA_TYPE_FLOAT4: u8 = 0x0C;
pub(crate) const DRDA_TYPE_DECIMAL: u8 = 0x0E;
pub(crate) const DRDA_TYPE_INTEGER8: u8 = 0x16;
pub(crate) const DRDA_TYPE_LOBLOC: u8 = 0x18;
pub(crate) const DRDA_TYPE_CLOBLOC: u8 = 0x1A;
pub(crate) const DRDA_TYPE_ROWID: u8 = 0x1E;
pub(crate) const DRDA_TYPE_DATE: u8 = 0x20;
pub(crate) const DRDA_TYPE_TIME: u8 = 0x22;
pub(crate) const DRDA_TYPE_TIMESTAMP: u8 = 0x24;
pub(crate) const DRDA_TYPE_FIXBYTE: u8 = 0x26;
pub(crate) const DRDA_TYPE_VARBYTE: u8 = 0x28;
pub(crate) const DRDA_TYPE_LONGVARBYTE: u8 = 0x2A;
pub(crate) const DRDA_TYPE_CHAR: u8 = 0x30;
pub(crate) const DRDA_TYPE_VARCHAR: u8 = 0x32;
pub(crate) const DRDA_TYPE_LONG: u8 = 0x34;
pub(crate) const DRDA_TYPE_MIX: u8 = 0x3C;
pub(crate) const DRDA_TYPE_VARMIX: u8 = 0x3E;
pub(crate) const DRDA_TYPE_LONGMIX: u8 = 0x40;
pub(crate) const DRDA_TYPE_BOOLEAN: u8 = 0xBE;
pub(crate) const DRDA_TYPE_LOBBYTES: u8 = 0xC8;
pub(crate) const DRDA_TYPE_LOBCSBCS: u8 = 0xCA;
pub(crate) const DRDA_TYPE_LOBCDBCS: u8 = 0xCC;
pub(crate) const DRDA_TYPE_LOBCMIXED: u8 = 0xCE;

pub(crate) const DRDA_TYPE_NINTEGER: u8 = DRDA_TYPE_INTEGER | 1;
pub(crate) const DRDA_TYPE_NSMALL: u8 = DRDA_TYPE_SMALL | 1;
pub(crate) const DRDA_TYPE_NFLOAT8: u8 = DRDA_TYPE_FLOAT8 | 1;
pub(crate) const DRDA_TYPE_NFLOAT4: u8 = DRDA_TYPE_FLOAT4 | 1;
pub(crate) const DRDA_TYPE_NDECIMAL: u8 = DRDA_TYPE_DECIMAL | 1;
pub(crate) const DRDA_TYPE_NINTEGER8: u8 = DRDA_TYPE_INTEGER8 | 1;
pub(crate) const DRDA_TYPE_NLOBLOC: u8 = DRDA_TYPE_LOBLOC | 1;
pub(crate) const DRDA_TYPE_NCLOBLOC: u8 = DRDA_TYPE_CLOBLOC | 1;
pub(crate) const DRDA_TYPE_NDATE: u8 = DRDA_TYPE_DATE | 1;
pub(crate) const DRDA_TYPE_NTIME: u8 = DRDA_TYPE_TIME | 1;
pub(crate) const DRDA_TYPE_NTIMESTAMP: u8 = DRDA_TYPE_TIMESTAMP | 1;
pub(crate) const DRDA_TYPE_NVARBYTE: u8 = DRDA_TYPE_VARBYTE | 1;
pub(crate) const DRDA_TYPE_NLONGVARBYTE: u8 = DRDA_TYPE_LONGVARBYTE | 1;
pub(crate) const DRDA_TYPE_NVARMIX: u8 = DRDA_TYPE_VARMIX | 1;
pub(crate) const DRDA_TYPE_NLONGMIX: u8 = DRDA_TYPE_LONGMIX | 1;
pub(crate) const DRDA_TYPE_NLOBBYTES: u8 = DRDA_TYPE_LOBBYTES | 1;
pub(crate) const DRDA_TYPE_NLOBCMIXED: u8 = DRDA_TYPE_LOBCMIXED | 1;

/// Maximum length of a variable-length value that is sent inline.
pub(crate) const MAX_INLINE_LENGTH: u16 = 32_767;

/// Placeholder length with which large objects of unknown length are described.
pub(crate) const UNKNOWN_LENGTH_PLACEHOLDER: u16 = 0x8002;

/// Value written into the data of a large object whose length is unknown.
pub(crate) const UNKNOWN_LENGTH_MARKER: u16 = 0x8000;

/// The SQL type of a parameter or a column, identified by its JDBC type code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub enum SqlType {
    /// BIT; sent as SMALLINT.
    BIT = -7,
    /// TINYINT; sent as SMALLINT.
    TINYINT = -6,
    /// SMALLINT.
    SMALLINT = 5,
    /// INTEGER.
    INTEGER = 4,
    /// BIGINT.
    BIGINT = -5,
    /// FLOAT, which is a double precision value.
    FLOAT = 6,
    /// REAL.
    REAL = 7,
    /// DOUBLE.
    DOUBLE = 8,
    /// NUMERIC.
    NUMERIC = 2,
    /// DECIMAL.
    DECIMAL = 3,
    /// CHAR.
    CHAR = 1,
    /// VARCHAR.
    VARCHAR = 12,
    /// LONG VARCHAR.
    LONGVARCHAR = -1,
    /// DATE.
    DATE = 91,
    /// TIME.
    TIME = 92,
    /// TIMESTAMP.
    TIMESTAMP = 93,
    /// BINARY, i.e. CHAR FOR BIT DATA.
    BINARY = -2,
    /// VARBINARY, i.e. VARCHAR FOR BIT DATA.
    VARBINARY = -3,
    /// LONG VARCHAR FOR BIT DATA.
    LONGVARBINARY = -4,
    /// BOOLEAN; sent as SMALLINT.
    BOOLEAN = 16,
    /// ROWID.
    ROWID = -8,
    /// BLOB.
    BLOB = 2004,
    /// CLOB.
    CLOB = 2005,
}

impl SqlType {
    /// Returns the `SqlType` for a JDBC type code.
    ///
    /// # Errors
    ///
    /// `DrdaError::UsageDetailed` for 0 and for unknown codes.
    pub fn try_new(code: i32) -> DrdaResult<Self> {
        Ok(match code {
            -7 => Self::BIT,
            -6 => Self::TINYINT,
            5 => Self::SMALLINT,
            4 => Self::INTEGER,
            -5 => Self::BIGINT,
            6 => Self::FLOAT,
            7 => Self::REAL,
            8 => Self::DOUBLE,
            2 => Self::NUMERIC,
            3 => Self::DECIMAL,
            1 => Self::CHAR,
            12 => Self::VARCHAR,
            -1 => Self::LONGVARCHAR,
            91 => Self::DATE,
            92 => Self::TIME,
            93 => Self::TIMESTAMP,
            -2 => Self::BINARY,
            -3 => Self::VARBINARY,
            -4 => Self::LONGVARBINARY,
            16 => Self::BOOLEAN,
            -8 => Self::ROWID,
            2004 => Self::BLOB,
            2005 => Self::CLOB,
            0 => return Err(usage_err!("parameter type is not set (type code 0)")),
            c => return Err(usage_err!("parameter type code {c} is not supported")),
        })
    }

    /// The JDBC type code.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Maps a DB2-style SQLTYPE, as sent in SQLDARD, to the `SqlType`.
    ///
    /// Character types with CCSID 0 carry binary data.
    pub(crate) fn from_sqltype(sqltype: i16, length: i64, ccsid: u16) -> Option<Self> {
        // the low bit only flags nullability
        Some(match sqltype & !1 {
            2436 => Self::BOOLEAN,
            500 => Self::SMALLINT,
            496 => Self::INTEGER,
            492 => Self::BIGINT,
            480 if length == 4 => Self::REAL,
            480 => Self::DOUBLE,
            484 => Self::DECIMAL,
            504 => Self::NUMERIC,
            384 => Self::DATE,
            388 => Self::TIME,
            392 => Self::TIMESTAMP,
            452 if ccsid == 0 => Self::BINARY,
            452 => Self::CHAR,
            448 | 460 if ccsid == 0 => Self::VARBINARY,
            448 | 460 => Self::VARCHAR,
            456 if ccsid == 0 => Self::LONGVARBINARY,
            456 => Self::LONGVARCHAR,
            908 => Self::VARBINARY,
            912 => Self::BINARY,
            904 => Self::ROWID,
            404 => Self::BLOB,
            408 => Self::CLOB,
            _ => return None,
        })
    }

    pub(crate) fn is_character(self) -> bool {
        matches!(
            self,
            Self::CHAR | Self::VARCHAR | Self::LONGVARCHAR | Self::CLOB
        )
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// How a value of a wire type is laid out in FD:OCA data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum LengthPolicy {
    /// Fixed number of bytes, given by the descriptor length.
    Fixed,
    /// Two-byte length followed by the bytes.
    TwoByteLength,
    /// Packed decimal, the byte count follows from the precision.
    Decimal,
    /// The data is the length of a large object that flows as EXTDTA;
    /// the descriptor length is a placeholder with the byte count in its low bits.
    Lob,
}

/// Returns the length policy for a DRDA type, ignoring the nullability bit.
pub(crate) fn length_policy(drda_type: u8) -> Option<LengthPolicy> {
    Some(match drda_type & !1 {
        DRDA_TYPE_INTEGER | DRDA_TYPE_SMALL | DRDA_TYPE_FLOAT8 | DRDA_TYPE_FLOAT4
        | DRDA_TYPE_INTEGER8 | DRDA_TYPE_LOBLOC | DRDA_TYPE_CLOBLOC | DRDA_TYPE_DATE
        | DRDA_TYPE_TIME | DRDA_TYPE_TIMESTAMP | DRDA_TYPE_FIXBYTE | DRDA_TYPE_CHAR
        | DRDA_TYPE_MIX | DRDA_TYPE_BOOLEAN => LengthPolicy::Fixed,
        DRDA_TYPE_VARBYTE | DRDA_TYPE_LONGVARBYTE | DRDA_TYPE_VARCHAR | DRDA_TYPE_LONG
        | DRDA_TYPE_VARMIX | DRDA_TYPE_LONGMIX | DRDA_TYPE_ROWID => LengthPolicy::TwoByteLength,
        DRDA_TYPE_DECIMAL => LengthPolicy::Decimal,
        DRDA_TYPE_LOBBYTES | DRDA_TYPE_LOBCSBCS | DRDA_TYPE_LOBCDBCS | DRDA_TYPE_LOBCMIXED => {
            LengthPolicy::Lob
        }
        _ => return None,
    })
}

pub(crate) fn is_nullable(drda_type: u8) -> bool {
    drda_type & 1 == 1
}

/// The placeholder descriptor length for a large object of the given length.
pub(crate) fn placeholder_length(total_length: u64) -> u16 {
    if total_length < 0x7FFF {
        0x8002
    } else if total_length < 0x7FFF_FFFF {
        0x8004
    } else if total_length < 0x7FFF_FFFF_FFFF {
        0x8006
    } else {
        0x8008
    }
}

/// Precision and scale of a decimal descriptor length.
pub(crate) fn decimal_precision_and_scale(length: u16) -> (u8, u8) {
    let [precision, scale] = length.to_be_bytes();
    (precision, scale)
}

/// Number of bytes of a packed decimal with the given precision.
pub(crate) fn packed_decimal_len(precision: u8) -> usize {
    usize::from(precision) / 2 + 1
}

/// The wire representation chosen for one input parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct WireType {
    pub drda_type: u8,
    pub length: u16,
}
impl WireType {
    pub(crate) fn new(drda_type: u8, length: u16) -> Self {
        Self { drda_type, length }
    }
}

/// Characteristics of a parameter value that determine its wire type.
#[derive(Clone, Copy, Debug)]
pub(crate) enum ValueShape {
    Null,
    /// Number of characters and of UTF-8 bytes of a string.
    Chars { chars: usize, bytes: usize },
    /// Number of bytes of a binary value.
    Bytes(usize),
    /// Precision and scale of a decimal.
    Decimal { precision: u8, scale: u8 },
    /// A streamed large object; `None` if the length is unknown.
    Stream(Option<u64>),
    /// A large object locator.
    Locator,
    Scalar,
}

/// Maps a declared SQL type and the shape of its value to the wire type.
///
/// Values that are too large for their declared type are promoted to the
/// corresponding large-object type; this changes only type and length.
pub(crate) fn wire_type(sql_type: SqlType, shape: ValueShape) -> WireType {
    const MAX_CHARS: usize = MAX_INLINE_LENGTH as usize / 3;
    match sql_type {
        SqlType::CHAR | SqlType::VARCHAR | SqlType::LONGVARCHAR => match shape {
            ValueShape::Chars { chars, bytes } if chars > MAX_CHARS => WireType::new(
                DRDA_TYPE_NLOBCMIXED,
                placeholder_length(bytes as u64),
            ),
            ValueShape::Stream(length) => lob_wire_type(DRDA_TYPE_NLOBCMIXED, length),
            _ if sql_type == SqlType::LONGVARCHAR => {
                WireType::new(DRDA_TYPE_NLONGMIX, MAX_INLINE_LENGTH)
            }
            _ => WireType::new(DRDA_TYPE_NVARMIX, MAX_INLINE_LENGTH),
        },
        SqlType::INTEGER => WireType::new(DRDA_TYPE_NINTEGER, 4),
        SqlType::BOOLEAN | SqlType::SMALLINT | SqlType::TINYINT | SqlType::BIT => {
            WireType::new(DRDA_TYPE_NSMALL, 2)
        }
        SqlType::REAL => WireType::new(DRDA_TYPE_NFLOAT4, 4),
        SqlType::DOUBLE | SqlType::FLOAT => WireType::new(DRDA_TYPE_NFLOAT8, 8),
        SqlType::DECIMAL | SqlType::NUMERIC => {
            let (precision, scale) = match shape {
                ValueShape::Decimal { precision, scale } => (precision, scale),
                // integers are converted, with up to 19 digits
                ValueShape::Scalar => (19, 0),
                _ => (1, 0),
            };
            WireType::new(
                DRDA_TYPE_NDECIMAL,
                (u16::from(precision) << 8) | u16::from(scale),
            )
        }
        SqlType::DATE => WireType::new(DRDA_TYPE_NDATE, 10),
        SqlType::TIME => WireType::new(DRDA_TYPE_NTIME, 8),
        SqlType::TIMESTAMP => WireType::new(DRDA_TYPE_NTIMESTAMP, 26),
        SqlType::BIGINT => WireType::new(DRDA_TYPE_NINTEGER8, 8),
        SqlType::BINARY | SqlType::VARBINARY | SqlType::LONGVARBINARY | SqlType::ROWID => {
            match shape {
                ValueShape::Bytes(n) if n > usize::from(MAX_INLINE_LENGTH) => {
                    WireType::new(DRDA_TYPE_NLOBBYTES, placeholder_length(n as u64))
                }
                ValueShape::Stream(length) => lob_wire_type(DRDA_TYPE_NLOBBYTES, length),
                _ if sql_type == SqlType::LONGVARBINARY => {
                    WireType::new(DRDA_TYPE_NLONGVARBYTE, MAX_INLINE_LENGTH)
                }
                _ => WireType::new(DRDA_TYPE_NVARBYTE, MAX_INLINE_LENGTH),
            }
        }
        SqlType::BLOB => match shape {
            ValueShape::Locator => WireType::new(DRDA_TYPE_NLOBLOC, 4),
            ValueShape::Bytes(n) => WireType::new(DRDA_TYPE_NLOBBYTES, placeholder_length(n as u64)),
            ValueShape::Stream(length) => lob_wire_type(DRDA_TYPE_NLOBBYTES, length),
            _ => WireType::new(DRDA_TYPE_NLOBBYTES, placeholder_length(0)),
        },
        SqlType::CLOB => match shape {
            ValueShape::Locator => WireType::new(DRDA_TYPE_NCLOBLOC, 4),
            ValueShape::Chars { bytes, .. } => {
                WireType::new(DRDA_TYPE_NLOBCMIXED, placeholder_length(bytes as u64))
            }
            ValueShape::Stream(length) => lob_wire_type(DRDA_TYPE_NLOBCMIXED, length),
            _ => WireType::new(DRDA_TYPE_NLOBCMIXED, placeholder_length(0)),
        },
    }
}

fn lob_wire_type(drda_type: u8, length: Option<u64>) -> WireType {
    match length {
        Some(length) => WireType::new(drda_type, placeholder_length(length)),
        None => WireType::new(drda_type, UNKNOWN_LENGTH_PLACEHOLDER),
    }
}

/// Fails if a value of the given shape cannot be sent for the declared type.
pub(crate) fn check_compatible(sql_type: SqlType, shape: ValueShape) -> DrdaResult<()> {
    let ok = match shape {
        ValueShape::Null => true,
        ValueShape::Chars { .. } => sql_type.is_character(),
        ValueShape::Bytes(_) => matches!(
            sql_type,
            SqlType::BINARY
                | SqlType::VARBINARY
                | SqlType::LONGVARBINARY
                | SqlType::ROWID
                | SqlType::BLOB
        ),
        ValueShape::Decimal { .. } => matches!(sql_type, SqlType::DECIMAL | SqlType::NUMERIC),
        ValueShape::Stream(_) => matches!(
            wire_type(sql_type, shape).drda_type & !1,
            DRDA_TYPE_LOBBYTES | DRDA_TYPE_LOBCMIXED
        ),
        ValueShape::Locator => matches!(sql_type, SqlType::BLOB | SqlType::CLOB),
        // checked in detail when the value is encoded
        ValueShape::Scalar => !matches!(sql_type, SqlType::BLOB | SqlType::CLOB),
    };
    if ok {
        Ok(())
    } else {
        Err(DrdaError::UsageDetailed(format!(
            "a value of shape {shape:?} cannot be sent as {sql_type}"
        )))
    }
}
