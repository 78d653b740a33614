use crate::{
    protocol::parts::{
        column_metadata::{ColumnDescriptor, ColumnMetadata},
        diagnostics::{parse_sqlcagrp, Diagnostics},
        drda_value::DrdaValue,
        fdoca::{is_truncation, utf8, FdocaReader},
        type_table::{
            decimal_precision_and_scale, length_policy, packed_decimal_len, LengthPolicy, SqlType,
            DRDA_TYPE_BOOLEAN, DRDA_TYPE_CHAR, DRDA_TYPE_CLOBLOC, DRDA_TYPE_DATE,
            DRDA_TYPE_FIXBYTE, DRDA_TYPE_FLOAT4, DRDA_TYPE_FLOAT8,
            DRDA_TYPE_INTEGER, DRDA_TYPE_INTEGER8, DRDA_TYPE_LOBBYTES, DRDA_TYPE_LOBLOC,
            DRDA_TYPE_LONG, DRDA_TYPE_LONGMIX, DRDA_TYPE_MIX, DRDA_TYPE_SMALL, DRDA_TYPE_TIME,
            DRDA_TYPE_TIMESTAMP, DRDA_TYPE_VARCHAR, DRDA_TYPE_VARMIX,
        },
    },
    types_impl::{datetime, packed_decimal},
    DrdaError, DrdaResult,
};
use std::{collections::VecDeque, sync::Arc};

/// A single row of a query result, consisting of the contained `DrdaValue`s and
/// a reference to the metadata.
///
/// You can access individual values with `row[idx]`, or iterate over the values (with
/// `for value in row {...}`).
#[derive(Debug)]
pub struct Row {
    metadata: Arc<ColumnMetadata>,
    value_iter: <Vec<DrdaValue> as IntoIterator>::IntoIter,
}

impl Row {
    pub(crate) fn new(metadata: Arc<ColumnMetadata>, values: Vec<DrdaValue>) -> Self {
        Self {
            metadata,
            value_iter: values.into_iter(),
        }
    }

    /// Removes and returns the next value.
    pub fn next_value(&mut self) -> Option<DrdaValue> {
        self.value_iter.next()
    }

    /// Returns the length of the row.
    pub fn len(&self) -> usize {
        self.value_iter.len()
    }

    /// Returns true if the row contains no value.
    pub fn is_empty(&self) -> bool {
        self.value_iter.as_slice().is_empty()
    }

    /// Converts itself in the single contained value.
    ///
    /// # Errors
    ///
    /// `DrdaError::Usage` if the row is empty or has more than one value.
    pub fn into_single_value(mut self) -> DrdaResult<DrdaValue> {
        if self.len() > 1 {
            Err(DrdaError::Usage("Row has more than one field"))
        } else {
            self.next_value().ok_or(DrdaError::Usage("Row is empty"))
        }
    }

    /// The value of the column with the given name or label.
    pub fn get_by_name(&self, name: &str) -> Option<&DrdaValue> {
        let offset = self.metadata.len() - self.len();
        self.metadata
            .index_of(name)
            .and_then(|idx| idx.checked_sub(offset))
            .and_then(|idx| self.value_iter.as_slice().get(idx))
    }

    /// Returns the metadata.
    pub fn metadata(&self) -> &ColumnMetadata {
        &self.metadata
    }
}

/// Support indexing.
impl std::ops::Index<usize> for Row {
    type Output = DrdaValue;
    fn index(&self, idx: usize) -> &DrdaValue {
        &self.value_iter.as_slice()[idx]
    }
}

/// Row is an iterator with item `DrdaValue`.
impl Iterator for Row {
    type Item = DrdaValue;
    fn next(&mut self) -> Option<DrdaValue> {
        self.next_value()
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        for v in self.value_iter.as_slice() {
            write!(fmt, "{v}, ")?;
        }
        Ok(())
    }
}

// A column value as found in QRYDTA; large objects still wait for their EXTDTA.
enum Decoded {
    Value(DrdaValue),
    External { character: bool, length: Option<u64> },
}

/// Decodes the rows of one query from QRYDTA and EXTDTA objects.
///
/// QRYDTA blocks can end within a row, and the EXTDTA objects of a row's large objects
/// can arrive with a later reply; such a partial row is kept until its data are complete.
#[derive(Debug)]
pub(crate) struct RowDecoder {
    metadata: Arc<ColumnMetadata>,
    sqlam: u16,
    pending: Vec<u8>,
    externals: VecDeque<Vec<u8>>,
    end: Option<Diagnostics>,
    warning: Option<Diagnostics>,
}

impl RowDecoder {
    pub(crate) fn new(metadata: Arc<ColumnMetadata>, sqlam: u16) -> Self {
        Self {
            metadata,
            sqlam,
            pending: Vec::new(),
            externals: VecDeque::new(),
            end: None,
            warning: None,
        }
    }

    pub(crate) fn metadata(&self) -> &Arc<ColumnMetadata> {
        &self.metadata
    }

    pub(crate) fn add_qrydta(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Adds the data of an EXTDTA object; EXTDTA objects are consumed in column order.
    pub(crate) fn add_extdta(&mut self, bytes: Vec<u8>) {
        self.externals.push_back(bytes);
    }

    /// The diagnostics that ended the query.
    pub(crate) fn end_diagnostics(&self) -> Option<&Diagnostics> {
        self.end.as_ref()
    }

    /// The latest warning that came with a decoded row.
    pub(crate) fn take_warning(&mut self) -> Option<Diagnostics> {
        self.warning.take()
    }

    /// True if bytes of an incomplete row are kept.
    pub(crate) fn has_partial_row(&self) -> bool {
        !self.pending.is_empty() && self.end.is_none()
    }

    /// Decodes all complete rows.
    ///
    /// Decoding stops at the first partial row, and at a row SQLCA that reports
    /// the end of data or an error; such diagnostics are kept as data, see `end_diagnostics`.
    pub(crate) fn decode_rows(&mut self) -> DrdaResult<Vec<Row>> {
        let metadata = Arc::clone(&self.metadata);
        let mut rows = Vec::new();
        let mut consumed = 0;
        while self.end.is_none() && consumed < self.pending.len() {
            let mut rdr = FdocaReader::new(&self.pending[consumed..]);
            let decoded = match decode_row(&mut rdr, &metadata, self.sqlam) {
                Ok(decoded) => decoded,
                Err(e) if is_truncation(&e) => {
                    trace!("partial row of {} bytes kept", rdr.position());
                    break;
                }
                Err(e) => return Err(e),
            };
            let row_len = rdr.position();
            match decoded {
                RowContent::End(diagnostics) => {
                    debug!("row decoding ended: {diagnostics}");
                    self.end = Some(diagnostics);
                    consumed += row_len;
                }
                RowContent::NoRow => consumed += row_len,
                RowContent::Values(values, warning) => {
                    let needed = values
                        .iter()
                        .filter(|v| matches!(v, Decoded::External { .. }))
                        .count();
                    if needed > self.externals.len() {
                        trace!("row waits for {needed} EXTDTA objects");
                        break;
                    }
                    consumed += row_len;
                    if warning.is_some() {
                        self.warning = warning;
                    }
                    let values = values
                        .into_iter()
                        .zip(metadata.iter())
                        .map(|(value, column)| self.resolve(value, column))
                        .collect::<DrdaResult<Vec<_>>>()?;
                    rows.push(Row::new(Arc::clone(&metadata), values));
                }
            }
        }
        self.pending.drain(..consumed);
        if self.end.is_some() && !self.pending.is_empty() {
            warn!("{} bytes of row data after the end of the query ignored", self.pending.len());
            self.pending.clear();
        }
        Ok(rows)
    }

    fn resolve(&mut self, value: Decoded, column: &ColumnDescriptor) -> DrdaResult<DrdaValue> {
        let (character, length) = match value {
            Decoded::Value(value) => return Ok(value),
            Decoded::External { character, length } => (character, length),
        };
        let mut bytes = self
            .externals
            .pop_front()
            .ok_or(DrdaError::Impl("missing EXTDTA"))?;
        if column.nullable {
            if bytes.first() == Some(&0xFF) {
                return Ok(DrdaValue::NULL);
            }
            if bytes.is_empty() {
                return Err(impl_err!("EXTDTA without null indicator"));
            }
            bytes.remove(0);
        }
        if let Some(length) = length {
            if length != bytes.len() as u64 {
                return Err(impl_err!(
                    "EXTDTA with {} bytes for a large object of length {length}",
                    bytes.len()
                ));
            }
        }
        Ok(if character {
            DrdaValue::CLOB(utf8(bytes)?)
        } else {
            DrdaValue::BLOB(bytes)
        })
    }
}

enum RowContent {
    Values(Vec<Decoded>, Option<Diagnostics>),
    NoRow,
    End(Diagnostics),
}

// SQLCAGRP, the SQLDTAGRP null indicator, and the column values
fn decode_row(
    rdr: &mut FdocaReader,
    metadata: &ColumnMetadata,
    sqlam: u16,
) -> DrdaResult<RowContent> {
    let diagnostics = parse_sqlcagrp(rdr, sqlam)?;
    let no_row = rdr.is_null()?;
    let mut warning = None;
    if let Some(diagnostics) = diagnostics {
        if diagnostics.sqlcode() < 0 || diagnostics.is_end_of_data() {
            if !no_row {
                return Err(impl_err!("row data after SQLCA {diagnostics}"));
            }
            return Ok(RowContent::End(diagnostics));
        }
        if diagnostics.sqlcode() > 0 {
            debug!("row warning: {diagnostics}");
            warning = Some(diagnostics);
        }
    }
    if no_row {
        return Ok(RowContent::NoRow);
    }
    let mut values = Vec::with_capacity(metadata.len());
    for column in metadata {
        values.push(decode_value(rdr, column)?);
    }
    Ok(RowContent::Values(values, warning))
}

fn decode_value(rdr: &mut FdocaReader, column: &ColumnDescriptor) -> DrdaResult<Decoded> {
    if column.nullable && rdr.u8()? & 0x80 == 0x80 {
        return Ok(Decoded::Value(DrdaValue::NULL));
    }
    let drda_type = column.drda_type & !1;
    let policy = length_policy(drda_type)
        .ok_or_else(|| impl_err!("no length policy for DRDA type 0x{drda_type:02X}"))?;
    let length = usize::from(column.wire_length);
    Ok(Decoded::Value(match policy {
        LengthPolicy::Lob => {
            let n = usize::from(column.wire_length & 0x7FFF);
            let bytes = rdr.bytes(n)?;
            let unknown = bytes.first().map_or(false, |b| b & 0x80 == 0x80);
            let lob_length = bytes.iter().fold(0_u64, |acc, b| (acc << 8) | u64::from(*b));
            let character = drda_type != DRDA_TYPE_LOBBYTES;
            if unknown {
                return Ok(Decoded::External {
                    character,
                    length: None,
                });
            }
            if lob_length > 0 {
                return Ok(Decoded::External {
                    character,
                    length: Some(lob_length),
                });
            }
            if character {
                DrdaValue::CLOB(String::new())
            } else {
                DrdaValue::BLOB(Vec::new())
            }
        }
        LengthPolicy::Decimal => {
            let (precision, scale) = decimal_precision_and_scale(column.wire_length);
            let bytes = rdr.bytes(packed_decimal_len(precision))?;
            DrdaValue::DECIMAL(packed_decimal::from_packed(bytes, scale)?)
        }
        LengthPolicy::TwoByteLength => {
            let len = usize::from(rdr.u16()?);
            match drda_type {
                DRDA_TYPE_VARCHAR | DRDA_TYPE_LONG | DRDA_TYPE_VARMIX | DRDA_TYPE_LONGMIX => {
                    DrdaValue::STRING(rdr.string(len)?)
                }
                _ => DrdaValue::BINARY(rdr.bytes(len)?.to_vec()),
            }
        }
        LengthPolicy::Fixed => match drda_type {
            DRDA_TYPE_SMALL if column.sql_type == Some(SqlType::BOOLEAN) => {
                DrdaValue::BOOLEAN(rdr.i16()? != 0)
            }
            DRDA_TYPE_SMALL => DrdaValue::SMALLINT(rdr.i16()?),
            DRDA_TYPE_INTEGER => DrdaValue::INTEGER(rdr.i32()?),
            DRDA_TYPE_INTEGER8 => DrdaValue::BIGINT(rdr.i64()?),
            DRDA_TYPE_FLOAT4 => DrdaValue::REAL(rdr.f32()?),
            DRDA_TYPE_FLOAT8 => DrdaValue::DOUBLE(rdr.f64()?),
            DRDA_TYPE_BOOLEAN => DrdaValue::BOOLEAN(rdr.u8()? != 0),
            DRDA_TYPE_DATE => DrdaValue::DATE(datetime::parse_date(&rdr.string(length)?)?),
            DRDA_TYPE_TIME => DrdaValue::TIME(datetime::parse_time(&rdr.string(length)?)?),
            DRDA_TYPE_TIMESTAMP => {
                DrdaValue::TIMESTAMP(datetime::parse_timestamp(&rdr.string(length)?)?)
            }
            DRDA_TYPE_LOBLOC | DRDA_TYPE_CLOBLOC => DrdaValue::LOCATOR(rdr.i32()?),
            DRDA_TYPE_CHAR | DRDA_TYPE_MIX => DrdaValue::STRING(rdr.string(length)?),
            DRDA_TYPE_FIXBYTE => DrdaValue::BINARY(rdr.bytes(length)?.to_vec()),
            t => return Err(impl_err!("cannot decode fixed DRDA type 0x{t:02X}")),
        },
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::{
        frame_buffer::FrameBuffer,
        parts::{
            diagnostics::test::sqlcagrp,
            type_table::{
                WireType, DRDA_TYPE_NDATE, DRDA_TYPE_NDECIMAL, DRDA_TYPE_NFLOAT4,
                DRDA_TYPE_NFLOAT8, DRDA_TYPE_NINTEGER, DRDA_TYPE_NINTEGER8, DRDA_TYPE_NLOBBYTES,
                DRDA_TYPE_NLOBCMIXED, DRDA_TYPE_NSMALL, DRDA_TYPE_NTIME, DRDA_TYPE_NTIMESTAMP,
                DRDA_TYPE_NVARBYTE, DRDA_TYPE_NVARMIX,
            },
        },
    };
    use bigdecimal::BigDecimal;
    use std::str::FromStr;
    use time::macros::{date, datetime, time};

    fn metadata(columns: &[(u8, u16)]) -> Arc<ColumnMetadata> {
        Arc::new(ColumnMetadata::new(
            columns
                .iter()
                .map(|(t, l)| ColumnDescriptor::from_wire(*t, *l, None))
                .collect(),
            None,
        ))
    }

    // null SQLCA, row data follow
    fn row_start() -> Vec<u8> {
        vec![0xFF, 0x00]
    }

    #[test]
    fn test_values_and_nulls() {
        let md = metadata(&[
            (DRDA_TYPE_NINTEGER, 4),
            (DRDA_TYPE_NVARMIX, 32),
            (DRDA_TYPE_NDECIMAL, 0x0502),
            (DRDA_TYPE_DATE, 10),
        ]);
        let mut bytes = row_start();
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x2A]);
        bytes.extend_from_slice(&[0x00, 0x00, 0x02, b'h', b'i']);
        bytes.extend_from_slice(&[0x00, 0x12, 0x34, 0x5C]);
        bytes.extend_from_slice(b"2024-02-29");
        bytes.extend(row_start());
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        bytes.extend_from_slice(b"1999-12-31");
        bytes.extend(sqlcagrp(100, "02000", 2, &[]));
        bytes.push(0xFF);

        let mut decoder = RowDecoder::new(md, 7);
        decoder.add_qrydta(&bytes);
        let mut rows = decoder.decode_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(decoder.end_diagnostics().unwrap().row_count(), 2);

        let first = &rows[0];
        assert_eq!(first[0], DrdaValue::INTEGER(42));
        assert_eq!(first[1], DrdaValue::STRING("hi".to_string()));
        assert_eq!(
            first[2],
            DrdaValue::DECIMAL(BigDecimal::from_str("123.45").unwrap())
        );
        let second = rows.pop().unwrap();
        let values: Vec<DrdaValue> = second.collect();
        assert!(values[0].is_null() && values[1].is_null() && values[2].is_null());
    }

    #[test]
    fn test_encoded_values_decode_to_the_same_values() {
        let decimal = |s: &str| DrdaValue::DECIMAL(BigDecimal::from_str(s).unwrap());
        let cases: Vec<(DrdaValue, u8, u16)> = vec![
            (DrdaValue::SMALLINT(i16::MIN), DRDA_TYPE_NSMALL, 2),
            (DrdaValue::INTEGER(i32::MIN), DRDA_TYPE_NINTEGER, 4),
            (DrdaValue::BIGINT(i64::MAX), DRDA_TYPE_NINTEGER8, 8),
            (DrdaValue::REAL(-1.25), DRDA_TYPE_NFLOAT4, 4),
            (DrdaValue::DOUBLE(6.022e23), DRDA_TYPE_NFLOAT8, 8),
            (decimal("-123.45"), DRDA_TYPE_NDECIMAL, 0x0502),
            (decimal("0.00"), DRDA_TYPE_NDECIMAL, 0x0502),
            (
                decimal("1234567890123456789012345678901"),
                DRDA_TYPE_NDECIMAL,
                0x1F00,
            ),
            (DrdaValue::DATE(date!(2024 - 02 - 29)), DRDA_TYPE_NDATE, 10),
            (DrdaValue::TIME(time!(23:59:58)), DRDA_TYPE_NTIME, 8),
            (
                DrdaValue::TIMESTAMP(datetime!(1999-12-31 23:59:58.123456)),
                DRDA_TYPE_NTIMESTAMP,
                26,
            ),
            (DrdaValue::NULL, DRDA_TYPE_NINTEGER, 4),
            (DrdaValue::STRING("hé".to_string()), DRDA_TYPE_NVARMIX, 32_767),
            (DrdaValue::BINARY(vec![0, 0xFF, 7]), DRDA_TYPE_NVARBYTE, 32_767),
        ];

        let md = metadata(&cases.iter().map(|(_, t, l)| (*t, *l)).collect::<Vec<_>>());
        let mut fb = FrameBuffer::new(256, 4096);
        for (value, drda_type, length) in &cases {
            value
                .encode(WireType::new(*drda_type, *length), None)
                .unwrap()
                .write(&mut fb)
                .unwrap();
        }
        let mut bytes = row_start();
        bytes.extend_from_slice(fb.as_slice());

        let mut decoder = RowDecoder::new(md, 7);
        decoder.add_qrydta(&bytes);
        let rows = decoder.decode_rows().unwrap();
        assert_eq!(rows.len(), 1);
        for (i, (value, _, _)) in cases.iter().enumerate() {
            assert_eq!(&rows[0][i], value, "column {i}");
        }
        assert!(!decoder.has_partial_row());
    }

    #[test]
    fn test_partial_row_is_carried_over() {
        let md = metadata(&[(DRDA_TYPE_NINTEGER, 4), (DRDA_TYPE_NINTEGER, 4)]);
        let mut decoder = RowDecoder::new(md, 7);
        decoder.add_qrydta(&[0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00]);
        assert!(decoder.decode_rows().unwrap().is_empty());
        assert!(decoder.has_partial_row());
        decoder.add_qrydta(&[0x00, 0x00, 0x02]);
        let rows = decoder.decode_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], DrdaValue::INTEGER(2));
        assert!(!decoder.has_partial_row());
    }

    #[test]
    fn test_large_objects_wait_for_extdta() {
        let md = metadata(&[(DRDA_TYPE_NLOBCMIXED, 0x8004), (DRDA_TYPE_NLOBBYTES, 0x8004)]);
        let mut decoder = RowDecoder::new(md, 7);
        let mut bytes = row_start();
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x05]);
        bytes.extend_from_slice(&[0x00, 0x80, 0x00, 0x00, 0x00]); // unknown length
        decoder.add_qrydta(&bytes);
        decoder.add_extdta(b"\x00hello".to_vec());
        assert!(decoder.decode_rows().unwrap().is_empty());

        decoder.add_extdta(vec![0x00, 1, 2, 3]);
        let rows = decoder.decode_rows().unwrap();
        assert_eq!(rows[0][0], DrdaValue::CLOB("hello".to_string()));
        assert_eq!(rows[0][1], DrdaValue::BLOB(vec![1, 2, 3]));
    }

    #[test]
    fn test_empty_large_object_has_no_extdta() {
        let md = metadata(&[(DRDA_TYPE_NLOBBYTES, 0x8002)]);
        let mut decoder = RowDecoder::new(md, 7);
        decoder.add_qrydta(&[0xFF, 0x00, 0x00, 0x00, 0x00]);
        let rows = decoder.decode_rows().unwrap();
        assert_eq!(rows[0][0], DrdaValue::BLOB(Vec::new()));
    }

    #[test]
    fn test_row_error_is_returned_as_data() {
        let md = metadata(&[(DRDA_TYPE_NINTEGER, 4)]);
        let mut decoder = RowDecoder::new(md, 7);
        let mut bytes = sqlcagrp(-802, "22003", 0, &[]);
        bytes.push(0xFF);
        decoder.add_qrydta(&bytes);
        assert!(decoder.decode_rows().unwrap().is_empty());
        assert_eq!(decoder.end_diagnostics().unwrap().sqlcode(), -802);
    }

    #[test]
    fn test_row_by_name() {
        let md = Arc::new(ColumnMetadata::new(
            vec![ColumnDescriptor {
                name: Some("ID".to_string()),
                ..ColumnDescriptor::from_wire(DRDA_TYPE_NINTEGER, 4, None)
            }],
            None,
        ));
        let row = Row::new(md, vec![DrdaValue::INTEGER(7)]);
        assert_eq!(row.get_by_name("ID"), Some(&DrdaValue::INTEGER(7)));
        assert_eq!(row.into_single_value().unwrap(), DrdaValue::INTEGER(7));
    }
}
