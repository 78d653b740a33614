use crate::protocol::parts::type_table::{
    decimal_precision_and_scale, is_nullable, length_policy, LengthPolicy, SqlType,
    DRDA_TYPE_DECIMAL,
};

/// Describes one column of a result set, or one parameter of a statement.
///
/// The wire layout (DRDA type and length) comes from the query descriptor (QRYDSC);
/// the SQL-level facts (SQL type, names) come from a describe (SQLDARD).
/// Either part can be missing, depending on what the server has sent.
#[derive(Clone, Debug, Default)]
pub struct ColumnDescriptor {
    pub(crate) drda_type: u8,
    pub(crate) wire_length: u16,
    pub(crate) ccsid: Option<u32>,
    pub(crate) sql_type: Option<SqlType>,
    pub(crate) sqltype_code: i16,
    pub(crate) precision: i16,
    pub(crate) scale: i16,
    pub(crate) length: i64,
    pub(crate) nullable: bool,
    pub(crate) name: Option<String>,
    pub(crate) label: Option<String>,
    pub(crate) comments: Option<String>,
    pub(crate) schema_name: Option<String>,
    pub(crate) table_name: Option<String>,
    pub(crate) base_column_name: Option<String>,
    pub(crate) correlation_name: Option<String>,
    pub(crate) updatable: bool,
    pub(crate) generated: bool,
    pub(crate) key_member: i16,
    pub(crate) parameter_mode: i16,
}

impl ColumnDescriptor {
    pub(crate) fn from_wire(drda_type: u8, wire_length: u16, ccsid: Option<u32>) -> Self {
        let mut cd = Self {
            drda_type,
            wire_length,
            ccsid,
            nullable: is_nullable(drda_type),
            ..Self::default()
        };
        if drda_type & !1 == DRDA_TYPE_DECIMAL {
            let (precision, scale) = decimal_precision_and_scale(wire_length);
            cd.precision = i16::from(precision);
            cd.scale = i16::from(scale);
        }
        cd
    }

    /// The DRDA (FD:OCA) type with which values of this column are transported.
    pub fn drda_type(&self) -> u8 {
        self.drda_type
    }

    /// True if values of this column are large objects whose data flow as EXTDTA.
    pub(crate) fn length_is_streamed(&self) -> bool {
        length_policy(self.drda_type & !1) == Some(LengthPolicy::Lob)
    }

    /// The length from the query descriptor; for decimals, precision and scale are packed in it.
    pub fn wire_length(&self) -> u16 {
        self.wire_length
    }

    /// Coded character set id, if the server has overridden the default.
    pub fn ccsid(&self) -> Option<u32> {
        self.ccsid
    }

    /// The SQL type, if the column was described.
    pub fn sql_type(&self) -> Option<SqlType> {
        self.sql_type
    }

    pub fn precision(&self) -> i16 {
        self.precision
    }

    pub fn scale(&self) -> i16 {
        self.scale
    }

    /// Maximal length of a value, as described by the server.
    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The column name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The column label; falls back to the name.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref().or(self.name.as_deref())
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    /// Name of the underlying base table.
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn base_column_name(&self) -> Option<&str> {
        self.base_column_name.as_deref()
    }

    pub fn correlation_name(&self) -> Option<&str> {
        self.correlation_name.as_deref()
    }

    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn key_member(&self) -> i16 {
        self.key_member
    }

    /// Parameter mode of a procedure parameter (1 in, 2 in/out, 4 out); 0 for columns.
    pub fn parameter_mode(&self) -> i16 {
        self.parameter_mode
    }

    fn take_described(&mut self, described: &ColumnDescriptor) {
        self.sql_type = described.sql_type;
        self.sqltype_code = described.sqltype_code;
        self.precision = described.precision;
        self.scale = described.scale;
        self.length = described.length;
        self.name.clone_from(&described.name);
        self.label.clone_from(&described.label);
        self.comments.clone_from(&described.comments);
        self.schema_name.clone_from(&described.schema_name);
        self.table_name.clone_from(&described.table_name);
        self.base_column_name.clone_from(&described.base_column_name);
        self.correlation_name.clone_from(&described.correlation_name);
        self.updatable = described.updatable;
        self.generated = described.generated;
        self.key_member = described.key_member;
        self.parameter_mode = described.parameter_mode;
    }
}

/// Statement-level facts of a describe (SQLDHGRP).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DescribeHeader {
    pub(crate) holdability: i16,
    pub(crate) return_type: i16,
    pub(crate) scrollable: i16,
    pub(crate) sensitivity: i16,
    pub(crate) fetch_function: i16,
    pub(crate) key_type: i16,
    pub(crate) rdb_name: Option<String>,
    pub(crate) schema_name: Option<String>,
}
impl DescribeHeader {
    pub fn holdability(&self) -> i16 {
        self.holdability
    }
    pub fn return_type(&self) -> i16 {
        self.return_type
    }
    pub fn is_scrollable(&self) -> bool {
        self.scrollable != 0
    }
    pub fn sensitivity(&self) -> i16 {
        self.sensitivity
    }
    pub fn fetch_function(&self) -> i16 {
        self.fetch_function
    }
    pub fn key_type(&self) -> i16 {
        self.key_type
    }
    pub fn rdb_name(&self) -> Option<&str> {
        self.rdb_name.as_deref()
    }
    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }
}

/// Ordered column descriptors of one result shape, or of the parameters of a statement.
///
/// Produced once per shape and reused to decode every row of that shape.
#[derive(Clone, Debug, Default)]
pub struct ColumnMetadata {
    columns: Vec<ColumnDescriptor>,
    header: Option<DescribeHeader>,
}

impl ColumnMetadata {
    pub(crate) fn new(columns: Vec<ColumnDescriptor>, header: Option<DescribeHeader>) -> Self {
        Self { columns, header }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The descriptor of the column at the zero-based index.
    pub fn get(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDescriptor> {
        self.columns.iter()
    }

    /// The describe header, if the metadata were produced by a describe.
    pub fn header(&self) -> Option<&DescribeHeader> {
        self.header.as_ref()
    }

    /// Zero-based index of the first column with the given name or label.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == Some(name) || c.label.as_deref() == Some(name))
    }

    /// Adds the SQL-level facts of a describe to the wire layout of a query descriptor.
    ///
    /// Nothing is taken over if the column counts differ.
    pub(crate) fn merge_described(&mut self, described: &ColumnMetadata) {
        if described.columns.len() != self.columns.len() {
            warn!(
                "described column count {} does not match query descriptor column count {}",
                described.columns.len(),
                self.columns.len()
            );
            return;
        }
        for (column, described_column) in self.columns.iter_mut().zip(&described.columns) {
            column.take_described(described_column);
        }
        self.header.clone_from(&described.header);
    }
}

impl<'a> IntoIterator for &'a ColumnMetadata {
    type Item = &'a ColumnDescriptor;
    type IntoIter = std::slice::Iter<'a, ColumnDescriptor>;
    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

impl std::fmt::Display for ColumnMetadata {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(fmt)?;
        for column in &self.columns {
            let name = column.label().unwrap_or("?");
            let sql_type = column.sql_type.map_or_else(
                || format!("0x{:02X}", column.drda_type),
                |t| t.to_string(),
            );
            writeln!(
                fmt,
                "{name} {sql_type} ({}){}",
                column.wire_length,
                if column.nullable { " nullable" } else { "" }
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::parts::type_table::{
        DRDA_TYPE_NDECIMAL, DRDA_TYPE_NINTEGER, DRDA_TYPE_NLOBCMIXED,
    };

    #[test]
    fn test_merge() {
        let mut layout = ColumnMetadata::new(
            vec![
                ColumnDescriptor::from_wire(DRDA_TYPE_NINTEGER, 4, None),
                ColumnDescriptor::from_wire(DRDA_TYPE_NDECIMAL, 0x0502, None),
            ],
            None,
        );
        assert_eq!(layout.get(1).unwrap().precision(), 5);
        assert_eq!(layout.get(1).unwrap().scale(), 2);
        assert!(!layout.get(1).unwrap().length_is_streamed());
        let clob = ColumnDescriptor::from_wire(DRDA_TYPE_NLOBCMIXED, 0x8004, None);
        assert!(clob.length_is_streamed());

        let described = ColumnMetadata::new(
            vec![
                ColumnDescriptor {
                    name: Some("ID".to_string()),
                    sql_type: Some(SqlType::INTEGER),
                    ..ColumnDescriptor::default()
                },
                ColumnDescriptor {
                    name: Some("PRICE".to_string()),
                    label: Some("Price".to_string()),
                    sql_type: Some(SqlType::DECIMAL),
                    precision: 5,
                    scale: 2,
                    ..ColumnDescriptor::default()
                },
            ],
            Some(DescribeHeader::default()),
        );
        layout.merge_described(&described);
        assert_eq!(layout.index_of("PRICE"), Some(1));
        assert_eq!(layout.index_of("Price"), Some(1));
        assert_eq!(layout.get(0).unwrap().label(), Some("ID"));
        assert_eq!(layout.get(0).unwrap().drda_type(), DRDA_TYPE_NINTEGER);
        assert!(layout.header().is_some());
    }
}
