use crate::{
    conn::{
        authentication::DataCipher, handshake, logging_reader::LoggingReader,
        logging_writer::LoggingWriter, AccessResult, ConnectParams, ConnectionConfiguration,
        ConnectionStatistics, ManagerLevels, ServerAttributes, Transport,
    },
    protocol::{
        dss::DssReader,
        frame_buffer::FrameBuffer,
        operation::OperationContext,
        reply::ReplyCursor,
        request::{Encryptor, RequestWriter},
        section::SectionManager,
    },
    DrdaError, DrdaResult,
};
use debug_ignore::DebugIgnore;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const CORRELATION_TOKEN_LENGTH: usize = 19;
const PRODUCT_DATA_LENGTH: usize = 56;
const PLATFORM: &str = "RUST";

/// The states of a [`Session`].
///
/// The handshake moves a session from `Unestablished` to `Open`;
/// `KeyOrSeedExchanged` is only passed with mechanisms that exchange a key or seed.
/// `Broken` is reachable from every state and final.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing was sent yet.
    Unestablished,
    /// EXCSAT was answered, the manager levels are negotiated.
    AttributesExchanged,
    /// ACCSEC was answered, the security mechanism is agreed upon.
    SecurityNegotiated,
    /// The client's and the server's key or seed are exchanged.
    KeyOrSeedExchanged,
    /// SECCHK was answered positively.
    SecurityChecked,
    /// ACCRDB was answered positively.
    DatabaseAccessed,
    /// The session is usable for SQL operations.
    Open,
    /// The byte stream can no longer be trusted; the session must be discarded.
    Broken,
    /// The session was closed, or the server did not grant one.
    Closed,
}
impl SessionState {
    /// True while the handshake is running.
    pub fn is_handshaking(self) -> bool {
        matches!(
            self,
            Self::AttributesExchanged
                | Self::SecurityNegotiated
                | Self::KeyOrSeedExchanged
                | Self::SecurityChecked
                | Self::DatabaseAccessed
        )
    }
}
impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// One session with a database, on one transport.
///
/// A session serves one caller at a time: a request chain is sent, and its reply chain
/// is completely consumed, before the next request can be sent.
/// Protocol errors leave the session [`SessionState::Broken`].
///
/// ```rust,no_run
/// use drdaconnect::{AccessResult, ConnectParams, ConnectionConfiguration, Session};
///
/// let params = ConnectParams::builder()
///     .hostname("localhost")
///     .dbname("SAMPLE")
///     .dbuser("U1")
///     .password("P1")
///     .build()
///     .unwrap();
/// let mut session = Session::connect_tcp(params, ConnectionConfiguration::default()).unwrap();
/// assert_eq!(session.open().unwrap(), AccessResult::Success);
/// ```
#[derive(Debug)]
pub struct Session {
    transport: DebugIgnore<Box<dyn Transport>>,
    params: ConnectParams,
    config: ConnectionConfiguration,
    state: SessionState,
    frame_buffer: FrameBuffer,
    dss_reader: DssReader,
    manager_levels: ManagerLevels,
    server_attributes: ServerAttributes,
    correlation_token: Vec<u8>,
    product_data: Vec<u8>,
    data_cipher: Option<DataCipher>,
    pub(super) sections: SectionManager,
    statistics: ConnectionStatistics,
}

impl Session {
    /// Creates a session on the given transport; nothing is sent before [`Session::open`].
    ///
    /// The correlation token and the product data are computed here, once,
    /// and are sent unchanged with every handshake on this transport.
    pub fn new<T: Transport + 'static>(
        transport: T,
        params: ConnectParams,
        config: ConnectionConfiguration,
    ) -> Self {
        let correlation_token = correlation_token(transport.local_addr());
        let product_data = product_data(
            config.product_id(),
            config.external_name(),
            params.dbuser(),
        );
        debug!(
            "new session for {} at {}, correlation token {}",
            params.dbname(),
            params.addr(),
            String::from_utf8_lossy(&correlation_token)
        );
        Self {
            transport: DebugIgnore(Box::new(transport)),
            frame_buffer: FrameBuffer::new(
                ConnectionConfiguration::MIN_BUFFER_SIZE,
                config.max_buffer_size(),
            ),
            dss_reader: DssReader::new(1),
            manager_levels: config.manager_levels().clone(),
            server_attributes: ServerAttributes::default(),
            correlation_token,
            product_data,
            data_cipher: None,
            sections: SectionManager::new(),
            statistics: ConnectionStatistics::new(),
            state: SessionState::Unestablished,
            params,
            config,
        }
    }

    /// Connects a TCP stream to the address of the connect parameters,
    /// and creates a session on it.
    pub fn connect_tcp(params: ConnectParams, config: ConnectionConfiguration) -> DrdaResult<Self> {
        trace!("connecting to {}", params.addr());
        let tcp_stream = std::net::TcpStream::connect(params.addr())?;
        tcp_stream.set_nodelay(true)?;
        Ok(Self::new(tcp_stream, params, config))
    }

    /// Runs the handshake.
    ///
    /// Returns [`AccessResult::NoSession`] if the server refuses the session without
    /// diagnostics; the session is then `Closed`, which is not an error.
    pub fn open(&mut self) -> DrdaResult<AccessResult> {
        match self.state {
            SessionState::Unestablished => handshake::run(self),
            SessionState::Broken => Err(DrdaError::ConnectionBroken { source: None }),
            _ => Err(DrdaError::Usage("session was already opened")),
        }
    }

    /// Starts a new logical session on the same transport.
    ///
    /// The handshake runs again with the stored credentials, and with a fresh key or seed;
    /// correlation token and product data are replayed unchanged.
    /// Sections of the previous session are invalid afterwards.
    pub fn reset_session(&mut self) -> DrdaResult<AccessResult> {
        match self.state {
            SessionState::Open | SessionState::Closed => {}
            SessionState::Broken => return Err(DrdaError::ConnectionBroken { source: None }),
            _ => return Err(DrdaError::Usage("session cannot be reset in this state")),
        }
        debug!("resetting session");
        self.statistics.add_session_reset();
        self.sections = SectionManager::new();
        self.data_cipher = None;
        self.dss_reader = DssReader::new(1);
        self.manager_levels = self.config.manager_levels().clone();
        self.server_attributes = ServerAttributes::default();
        self.state = SessionState::Unestablished;
        handshake::run(self)
    }

    /// Closes the session; the transport is dropped with the session.
    pub fn close(&mut self) {
        if self.state != SessionState::Broken {
            self.set_state(SessionState::Closed);
        }
    }

    /// The current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True if the session can be used for SQL operations.
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// The negotiated manager levels; before the handshake, the configured ceilings.
    pub fn manager_levels(&self) -> &ManagerLevels {
        &self.manager_levels
    }

    /// What the server reported about itself during the handshake.
    pub fn server_attributes(&self) -> &ServerAttributes {
        &self.server_attributes
    }

    /// The correlation token (CRRTKN) of this session.
    pub fn correlation_token(&self) -> &[u8] {
        &self.correlation_token
    }

    /// The connect parameters.
    pub fn connect_params(&self) -> &ConnectParams {
        &self.params
    }

    /// The configuration.
    pub fn configuration(&self) -> &ConnectionConfiguration {
        &self.config
    }

    /// The statistics of this session.
    pub fn statistics(&self) -> &ConnectionStatistics {
        &self.statistics
    }

    /// Sets the statistics back to zero.
    pub fn reset_statistics(&mut self) {
        self.statistics.reset();
    }

    pub(super) fn set_state(&mut self, state: SessionState) {
        debug!("session state: {} -> {}", self.state, state);
        self.state = state;
    }

    pub(super) fn product_data(&self) -> &[u8] {
        &self.product_data
    }

    pub(super) fn set_manager_levels(&mut self, manager_levels: ManagerLevels) {
        self.manager_levels = manager_levels;
    }

    pub(super) fn server_attributes_mut(&mut self) -> &mut ServerAttributes {
        &mut self.server_attributes
    }

    pub(super) fn set_data_cipher(&mut self, data_cipher: Option<DataCipher>) {
        if data_cipher.is_some() {
            debug!("command and reply data are encrypted");
        }
        self.data_cipher = data_cipher;
    }

    pub(super) fn check_open(&self) -> DrdaResult<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Broken => Err(DrdaError::ConnectionBroken { source: None }),
            _ => Err(DrdaError::Usage("session is not open")),
        }
    }

    pub(super) fn operation_context<'a>(&self, rdb_name: &'a str) -> OperationContext<'a> {
        OperationContext {
            rdb_name,
            sqlam: self.manager_levels.sqlam(),
            query_block_size: self.config.query_block_size(),
            max_block_extents: self.config.max_block_extents(),
            unknown_length_streaming: self.config.is_lob_layer_b_streaming(),
        }
    }

    /// Moves a session to `Broken` if the error leaves the byte stream unusable.
    pub(super) fn fail(&mut self, error: DrdaError) -> DrdaError {
        if error.is_chain_breaking() && self.state != SessionState::Broken {
            warn!("session is broken: {error}");
            self.set_state(SessionState::Broken);
        }
        error
    }

    /// Sends one request chain and reads the complete reply chain.
    ///
    /// With `encrypted`, command data are encrypted and reply data decrypted,
    /// if the security mechanism negotiated a data cipher.
    pub(super) fn roundtrip(
        &mut self,
        encrypted: bool,
        write: impl FnOnce(&mut RequestWriter) -> DrdaResult<()>,
    ) -> DrdaResult<ReplyCursor> {
        match self.try_roundtrip(encrypted, write) {
            Ok(cursor) => Ok(cursor),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn try_roundtrip(
        &mut self,
        encrypted: bool,
        write: impl FnOnce(&mut RequestWriter) -> DrdaResult<()>,
    ) -> DrdaResult<ReplyCursor> {
        let cipher = if encrypted {
            self.data_cipher.clone()
        } else {
            None
        };
        let encrypt = |plain: &[u8]| match cipher {
            Some(ref cipher) => cipher.encrypt(plain),
            None => Ok(plain.to_vec()),
        };
        let encryptor: Option<Encryptor> = if cipher.is_some() {
            Some(&encrypt)
        } else {
            None
        };

        let sent = {
            let mut writer = LoggingWriter::new(&mut *self.transport);
            let mut rw =
                RequestWriter::new(&mut self.frame_buffer, &mut writer).with_encryptor(encryptor);
            match write(&mut rw) {
                Ok(()) => rw.flush(),
                Err(e) => Err(e),
            }
        };
        let sent = match sent {
            Ok(sent) => sent,
            Err(e) => {
                self.frame_buffer.clear();
                return Err(e);
            }
        };
        self.statistics.add_request(&sent);
        for (position, outcome) in &sent.degraded {
            warn!("large object parameter {position} was sent degraded: {outcome:?}");
        }

        let continuations_before = self.dss_reader.continuation_segments();
        let (frames, bytes) = {
            let mut reader = LoggingReader::new(&mut *self.transport);
            let frames = self.dss_reader.read_chain(&mut reader)?;
            (frames, reader.given_out())
        };
        self.statistics.add_reply(
            frames.len(),
            self.dss_reader.continuation_segments() - continuations_before,
            bytes,
        );
        trace!(
            "received reply chain with {} frames, {bytes} bytes",
            frames.len()
        );

        let mut cursor = ReplyCursor::new(frames);
        if let Some(cipher) = cipher {
            cursor.set_decryptor(Box::new(move |bytes: &[u8]| cipher.decrypt(bytes)));
        }
        Ok(cursor)
    }
}

/// CRRTKN: the local IPv4 address as 8 hex digits, '.', the local port as 4 hex digits,
/// and 6 bytes of the current time in milliseconds.
///
/// A leading decimal digit of the address or port is replaced by a letter from G to P.
fn correlation_token(local_addr: Option<SocketAddr>) -> Vec<u8> {
    let (ip, port) = match local_addr {
        Some(addr) => (ipv4_of(addr.ip()), addr.port()),
        None => (Ipv4Addr::LOCALHOST, 0),
    };
    let mut token = Vec::with_capacity(CORRELATION_TOKEN_LENGTH);
    token.extend(letter_first(hex::encode_upper(ip.octets())));
    token.push(b'.');
    token.extend(letter_first(hex::encode_upper(port.to_be_bytes())));
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    #[allow(clippy::cast_possible_truncation)]
    token.extend_from_slice(&(millis as i64).to_be_bytes()[2..]);
    token
}

fn ipv4_of(ip: IpAddr) -> Ipv4Addr {
    match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => v6.to_ipv4_mapped().unwrap_or_else(|| {
            let o = v6.octets();
            Ipv4Addr::new(o[12], o[13], o[14], o[15])
        }),
    }
}

fn letter_first(hex: String) -> Vec<u8> {
    let mut bytes = hex.into_bytes();
    if let Some(first) = bytes.first_mut() {
        if first.is_ascii_digit() {
            *first = *first - b'0' + b'G';
        }
    }
    bytes
}

/// PRDDTA: a length byte, the product id, the platform, the external name, the user,
/// and an empty accounting suffix; fields are blank-padded.
fn product_data(product_id: &str, external_name: &str, user: &str) -> Vec<u8> {
    let mut data = vec![b' '; PRODUCT_DATA_LENGTH];
    #[allow(clippy::cast_possible_truncation)]
    {
        data[0] = (PRODUCT_DATA_LENGTH - 1) as u8;
    }
    let mut put = |offset: usize, length: usize, value: &str| {
        for (target, source) in data[offset..offset + length].iter_mut().zip(value.bytes()) {
            *target = source;
        }
    };
    put(1, 8, product_id);
    put(9, 18, PLATFORM);
    put(27, 20, external_name);
    put(47, 8, user);
    data[PRODUCT_DATA_LENGTH - 1] = 0;
    data
}

#[cfg(test)]
mod test {
    use super::{correlation_token, product_data, CORRELATION_TOKEN_LENGTH};
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    #[test]
    fn test_correlation_token() {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 0x1A2B));
        let token = correlation_token(Some(addr));
        assert_eq!(token.len(), CORRELATION_TOKEN_LENGTH);
        // 0A000001 with the leading 0 turned into G; 1A2B with the leading 1 turned into H
        assert_eq!(&token[..13], b"GA000001.HA2B");

        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 2), 0xC000));
        assert_eq!(&correlation_token(Some(addr))[..13], b"C0A80102.C000");

        let token = correlation_token(None);
        assert_eq!(&token[..13], b"NF000001.G000");
    }

    #[test]
    fn test_product_data() {
        let data = product_data("DNC10110", "drdaconnect", "U1");
        assert_eq!(data.len(), 56);
        assert_eq!(data[0], 55);
        assert_eq!(&data[1..9], b"DNC10110");
        assert_eq!(&data[9..27], b"RUST              ");
        assert_eq!(&data[27..47], b"drdaconnect         ");
        assert_eq!(&data[47..55], b"U1      ");
        assert_eq!(data[55], 0);

        let data = product_data("DNC10110", "an external name of more than twenty bytes", "U1");
        assert_eq!(&data[27..47], b"an external name of ");
    }
}
