use crate::{
    protocol::{
        codepoint::{SQLCINRD, SQLDARD, SQLRSLRD},
        parts::{
            column_metadata::{ColumnDescriptor, ColumnMetadata, DescribeHeader},
            diagnostics::{parse_sqlcagrp, Diagnostics},
            fdoca::{truncated, FdocaReader},
            type_table::SqlType,
        },
        reply::ReplyCursor,
    },
    DrdaError, DrdaResult,
};

/// A result set that a procedure call returned, as announced in SQLRSLRD.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultSetInfo {
    locator: i32,
    name: Option<String>,
    row_count: i32,
}
impl ResultSetInfo {
    /// The server's locator of the result set, used to correlate the following OPNQRYRM.
    pub fn locator(&self) -> i32 {
        self.locator
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    /// Number of rows, if the server knows it; -1 otherwise.
    pub fn row_count(&self) -> i32 {
        self.row_count
    }
}

/// Reads an SQLDARD object: the diagnostics of the describe and the described columns.
pub(crate) fn parse_sqldard(
    cursor: &mut ReplyCursor,
    sqlam: u16,
) -> DrdaResult<(Diagnostics, ColumnMetadata)> {
    let len = cursor.parse_length_and_match(SQLDARD)?;
    let mut rdr = FdocaReader::new(cursor.take(len)?);
    let diagnostics = parse_sqlcagrp(&mut rdr, sqlam)?.unwrap_or_else(Diagnostics::success);
    let metadata = parse_described_columns(&mut rdr)?;
    check_consumed(&rdr)?;
    debug!(
        "parse_sqldard(): {} described columns, {diagnostics}",
        metadata.len()
    );
    Ok((diagnostics, metadata))
}

/// Reads an SQLCINRD object, which describes the columns of a result set of a procedure call.
pub(crate) fn parse_sqlcinrd(cursor: &mut ReplyCursor) -> DrdaResult<ColumnMetadata> {
    let len = cursor.parse_length_and_match(SQLCINRD)?;
    let mut rdr = FdocaReader::new(cursor.take(len)?);
    let metadata = parse_described_columns(&mut rdr)?;
    check_consumed(&rdr)?;
    Ok(metadata)
}

/// Reads an SQLRSLRD object, the list of result sets a procedure call returned.
pub(crate) fn parse_sqlrslrd(cursor: &mut ReplyCursor) -> DrdaResult<Vec<ResultSetInfo>> {
    let len = cursor.parse_length_and_match(SQLRSLRD)?;
    let mut rdr = FdocaReader::new(cursor.take(len)?);
    let count = rdr.u16()?;
    let mut result_sets = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        result_sets.push(ResultSetInfo {
            locator: rdr.i32()?,
            name: rdr.vcm_or_vcs()?,
            row_count: rdr.i32()?,
        });
    }
    check_consumed(&rdr)?;
    debug!("parse_sqlrslrd(): {} result sets", result_sets.len());
    Ok(result_sets)
}

fn check_consumed(rdr: &FdocaReader) -> DrdaResult<()> {
    if rdr.is_at_end() {
        Ok(())
    } else {
        Err(truncated())
    }
}

// SQLDHROW, SQLNUMROW, SQLDAROW*
fn parse_described_columns(rdr: &mut FdocaReader) -> DrdaResult<ColumnMetadata> {
    let header = parse_sqldhgrp(rdr)?;
    let count = rdr.u16()?;
    let mut columns = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        columns.push(parse_sqldagrp(rdr, header.as_ref())?);
    }
    Ok(ColumnMetadata::new(columns, header))
}

fn parse_sqldhgrp(rdr: &mut FdocaReader) -> DrdaResult<Option<DescribeHeader>> {
    if rdr.is_null()? {
        return Ok(None);
    }
    Ok(Some(DescribeHeader {
        holdability: rdr.i16()?,
        return_type: rdr.i16()?,
        scrollable: rdr.i16()?,
        sensitivity: rdr.i16()?,
        fetch_function: rdr.i16()?,
        key_type: rdr.i16()?,
        rdb_name: Some(rdr.vcs()?).filter(|s| !s.is_empty()),
        schema_name: rdr.vcm_or_vcs()?,
    }))
}

fn parse_sqldagrp(
    rdr: &mut FdocaReader,
    header: Option<&DescribeHeader>,
) -> DrdaResult<ColumnDescriptor> {
    let precision = rdr.i16()?;
    let scale = rdr.i16()?;
    let length = rdr.i64()?;
    let sqltype_code = rdr.i16()?;
    // SQLCCSID is a fixed byte field, always big-endian
    let ccsid = rdr.u16()?;
    let sql_type = SqlType::from_sqltype(sqltype_code, length, ccsid);
    if sql_type.is_none() {
        warn!("described column with unknown SQLTYPE {sqltype_code}");
    }
    let mut column = ColumnDescriptor {
        sql_type,
        sqltype_code,
        precision,
        scale,
        length,
        nullable: sqltype_code & 1 == 1,
        ccsid: Some(u32::from(ccsid)).filter(|c| *c != 0),
        ..ColumnDescriptor::default()
    };
    parse_sqldoptgrp(rdr, &mut column, header)?;
    Ok(column)
}

fn parse_sqldoptgrp(
    rdr: &mut FdocaReader,
    column: &mut ColumnDescriptor,
    header: Option<&DescribeHeader>,
) -> DrdaResult<()> {
    if rdr.is_null()? {
        return Ok(());
    }
    let _unnamed = rdr.i16()?;
    column.name = rdr.vcm_or_vcs()?;
    column.label = rdr.vcm_or_vcs()?;
    column.comments = rdr.vcm_or_vcs()?;
    // SQLUDTGRP
    if !rdr.is_null()? {
        return Err(DrdaError::Impl("user-defined type descriptions are not supported"));
    }
    parse_sqldxgrp(rdr, column, header)
}

fn parse_sqldxgrp(
    rdr: &mut FdocaReader,
    column: &mut ColumnDescriptor,
    header: Option<&DescribeHeader>,
) -> DrdaResult<()> {
    if rdr.is_null()? {
        return Ok(());
    }
    column.key_member = rdr.i16()?;
    column.updatable = rdr.i16()? != 0;
    column.generated = rdr.i16()? != 0;
    column.parameter_mode = rdr.i16()?;
    let _rdb_name = rdr.vcs()?;
    column.correlation_name = rdr.vcm_or_vcs()?;
    column.table_name = rdr.vcm_or_vcs()?;
    column.schema_name = rdr
        .vcm_or_vcs()?
        .or_else(|| header.and_then(|h| h.schema_name.clone()));
    column.base_column_name = rdr.vcm_or_vcs()?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::protocol::{
        parts::{diagnostics::test::sqlcagrp, fdoca::is_truncation},
        reply::test::{dss, scalar},
    };

    // an empty VCM followed by the VCS
    fn vcs(s: &str) -> Vec<u8> {
        let mut v = vec![0x00, 0x00];
        v.extend_from_slice(&u16::try_from(s.len()).unwrap().to_be_bytes());
        v.extend_from_slice(s.as_bytes());
        v
    }

    const NO_NAME: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

    /// A described column with name and base table.
    pub(crate) fn sqldagrp(name: &str, sqltype: i16, length: i64, precision: i16, scale: i16) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&precision.to_be_bytes());
        v.extend_from_slice(&scale.to_be_bytes());
        v.extend_from_slice(&length.to_be_bytes());
        v.extend_from_slice(&sqltype.to_be_bytes());
        v.extend_from_slice(&1208_u16.to_be_bytes());
        v.push(0x00); // SQLDOPTGRP
        v.extend_from_slice(&0_i16.to_be_bytes());
        v.extend(vcs(name));
        v.extend_from_slice(&NO_NAME); // label
        v.extend_from_slice(&NO_NAME); // comments
        v.push(0xFF); // SQLUDTGRP
        v.push(0x00); // SQLDXGRP
        v.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0]);
        v.extend_from_slice(&[0x00, 0x00]); // rdb name
        v.extend_from_slice(&NO_NAME); // correlation name
        v.extend(vcs("EMPLOYEE"));
        v.extend_from_slice(&NO_NAME); // schema
        v.extend(vcs(name));
        v
    }

    fn sqldhgrp() -> Vec<u8> {
        let mut v = vec![0x00];
        for value in [1_i16, 0, 0, 0, 0, 0] {
            v.extend_from_slice(&value.to_be_bytes());
        }
        v.extend_from_slice(&[0x00, 0x06]);
        v.extend_from_slice(b"SAMPLE");
        v.extend(vcs("APP"));
        v
    }

    #[test]
    fn test_sqldard() {
        let mut body = sqlcagrp(0, "00000", 0, &[]);
        body.extend(sqldhgrp());
        body.extend_from_slice(&2_u16.to_be_bytes());
        body.extend(sqldagrp("ID", 497, 4, 10, 0));
        body.extend(sqldagrp("SALARY", 484, 0x0902, 9, 2));
        let mut cursor = ReplyCursor::new(vec![dss(scalar(SQLDARD, &body), false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        let (diagnostics, md) = parse_sqldard(&mut cursor, 7).unwrap();
        cursor.end_of_chain().unwrap();

        assert_eq!(diagnostics.sqlcode(), 0);
        assert_eq!(md.len(), 2);
        let id = md.get(0).unwrap();
        assert_eq!(id.sql_type(), Some(SqlType::INTEGER));
        assert!(id.is_nullable());
        assert!(id.is_updatable());
        assert_eq!(id.table_name(), Some("EMPLOYEE"));
        assert_eq!(id.schema_name(), Some("APP"));
        let salary = md.get(1).unwrap();
        assert_eq!(salary.sql_type(), Some(SqlType::DECIMAL));
        assert!(!salary.is_nullable());
        assert_eq!((salary.precision(), salary.scale()), (9, 2));
        assert_eq!(md.index_of("SALARY"), Some(1));
        let header = md.header().unwrap();
        assert_eq!(header.holdability(), 1);
        assert_eq!(header.rdb_name(), Some("SAMPLE"));
    }

    #[test]
    fn test_sqlcinrd_without_header() {
        let mut body = vec![0xFF];
        body.extend_from_slice(&1_u16.to_be_bytes());
        body.extend(sqldagrp("NAME", 449, 40, 0, 0));
        let mut cursor = ReplyCursor::new(vec![dss(scalar(SQLCINRD, &body), false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        let md = parse_sqlcinrd(&mut cursor).unwrap();
        assert_eq!(md.get(0).unwrap().sql_type(), Some(SqlType::VARCHAR));
        assert_eq!(md.get(0).unwrap().schema_name(), None);
        assert!(md.header().is_none());
    }

    #[test]
    fn test_sqlrslrd() {
        let mut body = 2_u16.to_be_bytes().to_vec();
        for (locator, name) in [(1_i32, "SQLCUR1"), (2, "SQLCUR2")] {
            body.extend_from_slice(&locator.to_be_bytes());
            body.extend(vcs(name));
            body.extend_from_slice(&(-1_i32).to_be_bytes());
        }
        let mut cursor = ReplyCursor::new(vec![dss(scalar(SQLRSLRD, &body), false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        let result_sets = parse_sqlrslrd(&mut cursor).unwrap();
        assert_eq!(result_sets.len(), 2);
        assert_eq!(result_sets[1].locator(), 2);
        assert_eq!(result_sets[1].name(), Some("SQLCUR2"));
        assert_eq!(result_sets[0].row_count(), -1);
    }

    #[test]
    fn test_mixed_name_in_result_set_list() {
        let mut body = 1_u16.to_be_bytes().to_vec();
        body.extend_from_slice(&1_i32.to_be_bytes());
        body.extend_from_slice(&[0x00, 0x07]);
        body.extend_from_slice(b"SQLCUR1");
        body.extend_from_slice(&[0x00, 0x00]);
        body.extend_from_slice(&(-1_i32).to_be_bytes());
        let mut cursor = ReplyCursor::new(vec![dss(scalar(SQLRSLRD, &body), false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        let result_sets = parse_sqlrslrd(&mut cursor).unwrap();
        assert_eq!(result_sets[0].name(), Some("SQLCUR1"));
        cursor.end_of_chain().unwrap();
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut body = 0_u16.to_be_bytes().to_vec();
        body.push(0x00);
        let mut cursor = ReplyCursor::new(vec![dss(scalar(SQLRSLRD, &body), false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        let e = parse_sqlrslrd(&mut cursor).unwrap_err();
        assert!(is_truncation(&e), "{e:?}");
    }
}
