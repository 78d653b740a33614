mod column_metadata;
mod diagnostics;
mod drda_value;
pub(crate) mod fdoca;
mod parameters;
mod query_descriptor;
mod reply_message;
mod row;
mod sqldard;
pub(crate) mod type_table;

pub(crate) use self::{
    diagnostics::parse_sqlcard,
    parameters::ParameterLayout,
    query_descriptor::parse_column_descriptors,
    row::RowDecoder,
    sqldard::{parse_sqlcinrd, parse_sqldard, parse_sqlrslrd},
};

pub use self::{
    column_metadata::{ColumnDescriptor, ColumnMetadata, DescribeHeader},
    diagnostics::{
        Condition, ConnectionDiagnostic, Diagnostics, ExtendedDiagnostics, Severity,
        StatementDiagnostics,
    },
    drda_value::DrdaValue,
    parameters::Parameter,
    reply_message::{ReplyMessage, Svrcod},
    row::Row,
    sqldard::ResultSetInfo,
    type_table::SqlType,
};
