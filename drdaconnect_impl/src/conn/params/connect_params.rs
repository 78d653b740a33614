//! Connection parameters
use crate::ConnectParamsBuilder;
use secstr::SecUtf8;

/// An immutable struct with all information necessary to open a new session
/// with a database.
///
/// ```rust,no_run
/// use drdaconnect::ConnectParams;
/// let connect_params = ConnectParams::builder()
///    .hostname("the_host")
///    .port(1527)
///    .dbname("SAMPLE")
///    .dbuser("my_user")
///    .password("my_passwd")
///    .build()
///    .unwrap();
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectParams {
    host: String,
    addr: String,
    dbname: String,
    dbuser: String,
    password: Option<SecUtf8>,
}

impl ConnectParams {
    pub(crate) fn new(
        host: String,
        port: u16,
        dbname: String,
        dbuser: String,
        password: Option<SecUtf8>,
    ) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            host,
            dbname,
            dbuser,
            password,
        }
    }

    /// Returns a new builder for `ConnectParams`.
    pub fn builder() -> ConnectParamsBuilder {
        ConnectParamsBuilder::new()
    }

    /// The host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The socket address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The name of the relational database (RDBNAM).
    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    /// The database user.
    pub fn dbuser(&self) -> &str {
        &self.dbuser
    }

    /// The password, if one is given.
    pub fn password(&self) -> Option<&SecUtf8> {
        self.password.as_ref()
    }
}
