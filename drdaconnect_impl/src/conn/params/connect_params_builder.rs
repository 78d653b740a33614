use crate::{ConnectParams, DrdaError, DrdaResult};
use secstr::SecUtf8;

/// A builder for `ConnectParams`.
///
/// ```rust
/// use drdaconnect::ConnectParams;
///
/// let connect_params = ConnectParams::builder()
///     .hostname("abcd123")
///     .port(1527)
///     .dbname("SAMPLE")
///     .dbuser("MEIER")
///     .password("schlau")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectParamsBuilder {
    hostname: Option<String>,
    port: Option<u16>,
    dbname: Option<String>,
    dbuser: Option<String>,
    password: Option<SecUtf8>,
}

impl ConnectParamsBuilder {
    /// Port on which Derby's network server listens by default.
    pub const DEFAULT_PORT: u16 = 1527;

    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hostname; defaults to "localhost".
    pub fn hostname<H: AsRef<str>>(&mut self, hostname: H) -> &mut Self {
        self.hostname = Some(hostname.as_ref().to_owned());
        self
    }

    /// Sets the port; defaults to [`ConnectParamsBuilder::DEFAULT_PORT`].
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    /// Sets the name of the relational database.
    pub fn dbname<D: AsRef<str>>(&mut self, dbname: D) -> &mut Self {
        self.dbname = Some(dbname.as_ref().to_owned());
        self
    }

    /// Sets the database user.
    pub fn dbuser<D: AsRef<str>>(&mut self, dbuser: D) -> &mut Self {
        self.dbuser = Some(dbuser.as_ref().to_owned());
        self
    }

    /// Sets the password.
    pub fn password<P: AsRef<str>>(&mut self, pw: P) -> &mut Self {
        self.password = Some(SecUtf8::from(pw.as_ref()));
        self
    }

    /// Unsets the password.
    pub fn unset_password(&mut self) -> &mut Self {
        self.password = None;
        self
    }

    /// Constructs a `ConnectParams` from the builder.
    ///
    /// # Errors
    /// `DrdaError::Usage` if database name or user are missing.
    pub fn build(&self) -> DrdaResult<ConnectParams> {
        let dbname = self
            .dbname
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or(DrdaError::Usage("dbname is missing"))?;
        let dbuser = self
            .dbuser
            .clone()
            .filter(|user| !user.is_empty())
            .ok_or(DrdaError::Usage("dbuser is missing"))?;
        Ok(ConnectParams::new(
            self.hostname
                .clone()
                .unwrap_or_else(|| "localhost".to_string()),
            self.port.unwrap_or(Self::DEFAULT_PORT),
            dbname,
            dbuser,
            self.password.clone(),
        ))
    }
}
