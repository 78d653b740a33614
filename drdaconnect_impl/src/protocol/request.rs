//! Serialization of request chains.
//!
//! A request chain consists of one or more commands; each command is a request frame,
//! optionally followed by object frames with command data (SQLSTT, SQLDTA, EXTDTA)
//! that share its correlation id. Commands are numbered from 1 within a chain.
use crate::{
    protocol::{
        codepoint::{
            ACCRDB, ACCSEC, CCSIDDBC, CCSIDMBC, CCSIDSBC, CRRTKN, EXCSAT, EXTNAM, MGRLVLLS,
            PASSWORD, PRDDTA, PRDID, RDBACCCL, RDBNAM, SECCHK, SECMEC, SECTKN, SQLAM, SQLATTR,
            SQLSTT, SRVCLSNM, SRVNAM, SRVRLSLV, TYPDEFNAM, TYPDEFOVR, USRID,
        },
        dss::{Chaining, DssType},
        frame_buffer::{FrameBuffer, FrameId, Flushed, StreamOutcome},
        parts::ParameterLayout,
    },
    DrdaResult,
};
use std::io::Write;

/// Minimal length of a database name on the wire; shorter names are padded with blanks.
pub(crate) const RDBNAM_MIN_LENGTH: usize = 18;
const CLIENT_SERVER_CLASS: &str = "QDRDA/RUST";

pub(crate) type Encryptor<'a> = &'a dyn Fn(&[u8]) -> DrdaResult<Vec<u8>>;

/// Result of sending a request chain.
#[derive(Debug, Default)]
pub(crate) struct Sent {
    pub flushed: Flushed,
    /// Large-object parameters whose source failed or misreported its length,
    /// as (parameter position, outcome).
    pub degraded: Vec<(usize, StreamOutcome)>,
}

/// Writes the frames of one request chain into a `FrameBuffer`.
///
/// Chaining flags are maintained here: when a command begins, the preceding frame is
/// chained with a different correlator; when command data follow, with the same correlator.
/// The last frame of the chain stays unchained.
pub(crate) struct RequestWriter<'a> {
    fb: &'a mut FrameBuffer,
    w: &'a mut dyn Write,
    correlation_id: u16,
    last_frame: Option<FrameId>,
    last_operation: bool,
    encryptor: Option<Encryptor<'a>>,
    degraded: Vec<(usize, StreamOutcome)>,
}

impl<'a> std::fmt::Debug for RequestWriter<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("RequestWriter")
            .field("correlation_id", &self.correlation_id)
            .field("encrypted", &self.encryptor.is_some())
            .finish()
    }
}

impl<'a> RequestWriter<'a> {
    pub(crate) fn new(fb: &'a mut FrameBuffer, w: &'a mut dyn Write) -> Self {
        Self {
            fb,
            w,
            correlation_id: 0,
            last_frame: None,
            last_operation: true,
            encryptor: None,
            degraded: Vec::new(),
        }
    }

    /// Command data are sent in encrypted object frames.
    pub(crate) fn with_encryptor(mut self, encryptor: Option<Encryptor<'a>>) -> Self {
        self.encryptor = encryptor;
        self
    }

    /// Announces whether another command follows the operation that is written next.
    ///
    /// This matters only for large-object data, which can be sent before the chain is complete.
    pub(crate) fn begin_operation(&mut self, last: bool) {
        self.last_operation = last;
    }

    fn chain_previous(&mut self, chaining: Chaining) {
        if let Some(frame) = self.last_frame.take() {
            self.fb.set_chaining(frame, chaining);
        }
    }

    /// Writes a request frame with the command collection `codepoint`.
    pub(crate) fn command(
        &mut self,
        codepoint: u16,
        body: impl FnOnce(&mut FrameBuffer) -> DrdaResult<()>,
    ) -> DrdaResult<()> {
        self.chain_previous(Chaining::DifferentCorrelator);
        self.correlation_id += 1;
        let frame = self
            .fb
            .begin_frame(DssType::Request, self.correlation_id, Chaining::Unchained)?;
        self.last_frame = Some(frame);
        let mark = self.fb.mark_length(codepoint);
        body(self.fb)?;
        self.fb.patch_length(mark)
    }

    /// Writes an object frame with command data for the current command.
    pub(crate) fn command_data(
        &mut self,
        body: impl FnOnce(&mut FrameBuffer) -> DrdaResult<()>,
    ) -> DrdaResult<()> {
        self.chain_previous(Chaining::SameCorrelator);
        let dss_type = if self.encryptor.is_some() {
            DssType::EncryptedObject
        } else {
            DssType::Object
        };
        let frame = self
            .fb
            .begin_frame(dss_type, self.correlation_id, Chaining::Unchained)?;
        self.last_frame = Some(frame);
        body(self.fb)?;
        if let Some(encrypt) = self.encryptor {
            self.fb.transform_frame_objects(encrypt)?;
        }
        Ok(())
    }

    /// Writes the SQLDTA command data, and the EXTDTA frames of large-object parameters.
    pub(crate) fn parameters(&mut self, layout: &ParameterLayout) -> DrdaResult<()> {
        self.command_data(|fb| layout.write_sqldta(fb))?;
        if !layout.has_externals() {
            return Ok(());
        }
        self.chain_previous(Chaining::SameCorrelator);
        let last_chaining = if self.last_operation {
            Chaining::Unchained
        } else {
            Chaining::DifferentCorrelator
        };
        let degraded = layout.write_externals(
            self.fb,
            self.w,
            self.correlation_id,
            last_chaining,
            self.encryptor,
        )?;
        self.degraded.extend(degraded);
        Ok(())
    }

    /// Writes an SQLSTT object.
    pub(crate) fn sql_statement(&mut self, sql: &str) -> DrdaResult<()> {
        self.command_data(|fb| write_nocm_nocs(fb, SQLSTT, sql))
    }

    /// Writes an SQLATTR object with cursor attributes.
    pub(crate) fn sql_attributes(&mut self, attributes: &str) -> DrdaResult<()> {
        self.command_data(|fb| write_nocm_nocs(fb, SQLATTR, attributes))
    }

    /// Sends the request chain.
    pub(crate) fn flush(self) -> DrdaResult<Sent> {
        let flushed = self.fb.flush(self.w)?;
        debug!(
            "sent request chain with {} commands, {} frames, {} bytes",
            self.correlation_id, flushed.frames, flushed.bytes
        );
        Ok(Sent {
            flushed,
            degraded: self.degraded,
        })
    }
}

// A mixed-byte string (NOCM) followed by a null single-byte string (NOCS).
fn write_nocm_nocs(fb: &mut FrameBuffer, codepoint: u16, s: &str) -> DrdaResult<()> {
    let mark = fb.mark_length(codepoint);
    fb.write_u8(0x00);
    fb.write_i32(
        i32::try_from(s.len()).map_err(|_| usage_err!("statement of {} bytes is too long", s.len()))?,
    );
    fb.write_bytes(s.as_bytes());
    fb.write_u8(0xFF);
    fb.patch_length(mark)
}

/// Writes RDBNAM, padded to the minimal length.
pub(crate) fn write_rdbnam(fb: &mut FrameBuffer, rdb_name: &str) {
    fb.write_scalar_padded(RDBNAM, rdb_name, RDBNAM_MIN_LENGTH);
}

/// EXCSAT: declares the client and its manager level ceilings.
pub(crate) fn write_excsat(
    rw: &mut RequestWriter,
    external_name: &str,
    server_name: &str,
    product_id: &str,
    manager_levels: &[(u16, u16)],
) -> DrdaResult<()> {
    rw.command(EXCSAT, |fb| {
        fb.write_scalar_string(EXTNAM, external_name)?;
        let mark = fb.mark_length(MGRLVLLS);
        for (manager, level) in manager_levels {
            fb.write_u16(*manager);
            fb.write_u16(*level);
        }
        fb.patch_length(mark)?;
        fb.write_scalar_string(SRVCLSNM, CLIENT_SERVER_CLASS)?;
        fb.write_scalar_string(SRVNAM, server_name)?;
        fb.write_scalar_string(SRVRLSLV, product_id)
    })
}

/// ACCSEC: requests a security mechanism, optionally with the client's key or seed.
pub(crate) fn write_accsec(
    rw: &mut RequestWriter,
    secmec: u16,
    rdb_name: &str,
    token: Option<&[u8]>,
) -> DrdaResult<()> {
    rw.command(ACCSEC, |fb| {
        fb.write_scalar_u16(SECMEC, secmec);
        write_rdbnam(fb, rdb_name);
        if let Some(token) = token {
            fb.write_scalar_bytes(SECTKN, token)?;
        }
        Ok(())
    })
}

/// The credential parts of a SECCHK; which of them are present depends on the mechanism.
#[derive(Debug, Default)]
pub(crate) struct Credentials<'a> {
    pub user: Option<&'a str>,
    /// Cleartext password, or the password substitute.
    pub password: Option<&'a [u8]>,
    /// Encrypted user id and encrypted password, in this order.
    pub tokens: Vec<&'a [u8]>,
}

/// SECCHK: carries the credential in the form the mechanism requires.
pub(crate) fn write_secchk(
    rw: &mut RequestWriter,
    secmec: u16,
    rdb_name: &str,
    credentials: &Credentials,
) -> DrdaResult<()> {
    rw.command(SECCHK, |fb| {
        fb.write_scalar_u16(SECMEC, secmec);
        write_rdbnam(fb, rdb_name);
        if let Some(user) = credentials.user {
            fb.write_scalar_string(USRID, user)?;
        }
        if let Some(password) = credentials.password {
            fb.write_scalar_secret(PASSWORD, password)?;
        }
        for token in &credentials.tokens {
            fb.write_scalar_secret(SECTKN, token)?;
        }
        Ok(())
    })
}

/// The facts an ACCRDB carries besides the database name.
#[derive(Debug)]
pub(crate) struct AccessRdb<'a> {
    pub product_id: &'a str,
    pub product_data: &'a [u8],
    pub typdefnam: &'a str,
    pub correlation_token: &'a [u8],
    pub ccsids: (u16, u16, u16),
}

/// ACCRDB: opens the database for the session.
pub(crate) fn write_accrdb(
    rw: &mut RequestWriter,
    rdb_name: &str,
    access: &AccessRdb,
) -> DrdaResult<()> {
    rw.command(ACCRDB, |fb| {
        write_rdbnam(fb, rdb_name);
        fb.write_scalar_u16(RDBACCCL, SQLAM);
        fb.write_scalar_string(PRDID, access.product_id)?;
        fb.write_scalar_bytes(PRDDTA, access.product_data)?;
        fb.write_scalar_string(TYPDEFNAM, access.typdefnam)?;
        fb.write_scalar_bytes(CRRTKN, access.correlation_token)?;
        let mark = fb.mark_length(TYPDEFOVR);
        fb.write_scalar_u16(CCSIDSBC, access.ccsids.0);
        fb.write_scalar_u16(CCSIDDBC, access.ccsids.1);
        fb.write_scalar_u16(CCSIDMBC, access.ccsids.2);
        fb.patch_length(mark)
    })
}
