//! Synchronous native rust client for databases that speak DRDA (Apache Derby, Db2).
//!
//! `drdaconnect` implements the client side of the Distributed Relational Database
//! Architecture wire protocol: the framing of requests and replies, the handshake with
//! its security mechanisms, and the decoding of rows and diagnostics.
//!
//! A [`Session`] runs on any byte stream that implements [`Transport`];
//! [`Session::connect_tcp`] opens one on a TCP stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use drdaconnect::{
//!     AccessResult, ConnectParams, ConnectionConfiguration, DrdaResult, Session,
//! };
//!
//! # fn main() -> DrdaResult<()> {
//! let params = ConnectParams::builder()
//!     .hostname("localhost")
//!     .dbname("SAMPLE")
//!     .dbuser("U1")
//!     .password("P1")
//!     .build()?;
//! let mut session = Session::connect_tcp(params, ConnectionConfiguration::default())?;
//! if session.open()? == AccessResult::NoSession {
//!     return Ok(());
//! }
//!
//! let prepared = session.prepare("SELECT NAME FROM APP.PERSONS", None)?;
//! let (diagnostics, mut rows, query) = session.open_query(&prepared, &[], None)?.into_parts();
//! diagnostics.into_result()?;
//! if let Some(mut query) = query {
//!     loop {
//!         let more = session.fetch(&mut query)?;
//!         if more.is_empty() {
//!             break;
//!         }
//!         rows.extend(more);
//!     }
//!     session.close_query(query)?;
//! }
//! session.close_statement(prepared);
//! session.commit()?;
//! # Ok(())
//! # }
//! ```
//!
//! SQL errors are returned as [`Diagnostics`], not as errors;
//! use [`Diagnostics::into_result`] to turn them into a [`DrdaError`].
//! Errors that leave the byte stream unusable move the session to
//! [`SessionState::Broken`], see [`DrdaError::is_chain_breaking`].

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

/// Provides some statistics about the use of a concrete session.
///
/// A snapshot of the statistics can be obtained from [`Session::statistics`].
/// It is possible to reset the statistics using [`Session::reset_statistics`].
pub use drdaconnect_impl::ConnectionStatistics;

/// A collection of settings that influence the runtime behavior of a session.
///
/// # Example
///
/// ```rust
/// use drdaconnect::{ConnectionConfiguration, SecurityMechanism};
///
/// let config = ConnectionConfiguration::default()
///     .with_security_mechanism(SecurityMechanism::PasswordSubstitute)
///     .with_query_block_size(65_535)
///     .with_max_buffer_size(1_000_000);
/// assert_eq!(config.query_block_size(), 65_535);
/// ```
pub use drdaconnect_impl::ConnectionConfiguration;

pub use drdaconnect_impl::{
    codepoint, AccessResult, ColumnDescriptor, ColumnMetadata, Condition, ConnectParams,
    ConnectParamsBuilder, ConnectionDiagnostic, DescribeHeader, Diagnostics, DrdaError,
    DrdaResult, DrdaValue, ExtendedDiagnostics, ManagerLevels, Parameter, Prepared, Query,
    QueryOutcome, ReplyMessage, ResultSetInfo, Row, SecurityCheckReason, SecurityMechanism,
    Section, ServerAttributes, Session, SessionState, Severity, SqlType, StatementDiagnostics,
    StatementOutcome, Svrcod, Transport,
};
