// The session, the parameters for opening one, the handshake and authentication.

mod authentication;
mod connection_configuration;
mod connection_statistics;
mod handshake;
mod logging_reader;
mod logging_writer;
mod manager_levels;
mod params;
mod session;
mod statement;
mod transport;

pub use self::{
    authentication::SecurityMechanism,
    connection_configuration::ConnectionConfiguration,
    connection_statistics::ConnectionStatistics,
    handshake::{AccessResult, ServerAttributes},
    manager_levels::ManagerLevels,
    params::{connect_params::ConnectParams, connect_params_builder::ConnectParamsBuilder},
    session::{Session, SessionState},
    statement::{Prepared, Query, QueryOutcome, StatementOutcome},
    transport::Transport,
};
