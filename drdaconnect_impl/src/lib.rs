//! Do not use this crate directly.
//!
//! This is the implementation crate for `drdaconnect`, which should be used instead.
//!

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
extern crate log;

#[macro_use]
mod base;
mod conn;
mod protocol;
mod types_impl;

pub use crate::base::{DrdaError, DrdaResult, SecurityCheckReason};

pub use crate::conn::{
    AccessResult, ConnectParams, ConnectParamsBuilder, ConnectionConfiguration,
    ConnectionStatistics, ManagerLevels, Prepared, Query, QueryOutcome, SecurityMechanism,
    ServerAttributes, Session, SessionState, StatementOutcome, Transport,
};

pub use crate::protocol::{
    codepoint,
    parts::{
        ColumnDescriptor, ColumnMetadata, Condition, ConnectionDiagnostic, DescribeHeader,
        Diagnostics, DrdaValue, ExtendedDiagnostics, Parameter, ReplyMessage, ResultSetInfo, Row,
        Severity, SqlType, StatementDiagnostics, Svrcod,
    },
    section::Section,
};
