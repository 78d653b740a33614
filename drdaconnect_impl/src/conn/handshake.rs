use crate::{
    conn::{
        authentication::{authenticator_for, SecurityMechanism, TOKEN_LENGTH},
        Session, SessionState,
    },
    protocol::{
        codepoint::{
            ACCRDBRM, ACCSECRD, CCSIDDBC, CCSIDMBC, CCSIDSBC, CRRTKN, EXCSATRD, EXTNAM, MGRLVLLS,
            PKGDFTCST, PRDID, RDBAFLRM, RDBINTTKN, SECCHKCD, SECCHKRM, SECMEC, SECTKN, SQLCARD,
            SRVCLSNM, SRVDGN, SRVLST, SRVNAM, SRVRLSLV, SVRCOD, SYNERRCD_OBJ_LEN_NOT_ALLOWED,
            TYPDEFNAM, TYPDEFOVR, USRID,
        },
        operation::{peek, skip_typdefs},
        parts::{parse_sqlcard, ReplyMessage, Severity, Svrcod},
        reply::{FoundObjects, ReplyCursor},
        request::{write_accrdb, write_accsec, write_excsat, write_secchk, AccessRdb},
    },
    DrdaError, DrdaResult, SecurityCheckReason,
};

const MAX_NAME_LENGTH: usize = 255;

/// The outcome of a successful handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessResult {
    /// The session is open.
    Success,
    /// The server denied the database access without giving diagnostics.
    ///
    /// This is not an error; the caller has no session and must not report a failure.
    NoSession,
}

/// What the server reported about itself during the handshake.
#[derive(Clone, Debug, Default)]
pub struct ServerAttributes {
    external_name: String,
    server_name: String,
    server_class: String,
    release_level: String,
    product_id: String,
    typdefnam: String,
    ccsids: (u16, u16, u16),
    user: Option<String>,
    correlation_token: Option<Vec<u8>>,
}
impl ServerAttributes {
    /// The server's external name (EXTNAM).
    pub fn external_name(&self) -> &str {
        &self.external_name
    }
    /// The server's name (SRVNAM).
    pub fn server_name(&self) -> &str {
        &self.server_name
    }
    /// The server's class name (SRVCLSNM).
    pub fn server_class(&self) -> &str {
        &self.server_class
    }
    /// The server's product release level (SRVRLSLV).
    pub fn release_level(&self) -> &str {
        &self.release_level
    }
    /// The product id of the database server (PRDID).
    pub fn product_id(&self) -> &str {
        &self.product_id
    }
    /// The data type definition name the server uses for its replies.
    pub fn typdefnam(&self) -> &str {
        &self.typdefnam
    }
    /// The server's CCSIDs for single-byte, double-byte and mixed-byte data.
    pub fn ccsids(&self) -> (u16, u16, u16) {
        self.ccsids
    }
    /// The user id as the server knows it, if reported.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
    /// A correlation token the server returned, if any.
    pub fn correlation_token(&self) -> Option<&[u8]> {
        self.correlation_token.as_deref()
    }
}

// The content of EXCSATRD.
#[derive(Debug, Default)]
struct ExchangedAttributes {
    external_name: String,
    server_name: String,
    server_class: String,
    release_level: String,
    manager_levels: Option<Vec<(u16, u16)>>,
}

/// Runs the handshake on a session in state `Unestablished`.
///
/// Every failure leaves the session `Broken`, with one exception:
/// a missing password is detected before anything is sent.
pub(super) fn run(session: &mut Session) -> DrdaResult<AccessResult> {
    let mechanism = session.configuration().security_mechanism();
    if mechanism.needs_password() && session.connect_params().password().is_none() {
        return Err(DrdaError::Usage("password is missing"));
    }
    debug!(
        "opening session on {} with {mechanism}",
        session.connect_params().dbname()
    );
    match handshake(session, mechanism) {
        Ok(result) => Ok(result),
        Err(e) => {
            if session.state() != SessionState::Broken {
                warn!("handshake failed: {e}");
                session.set_state(SessionState::Broken);
            }
            Err(e)
        }
    }
}

fn handshake(session: &mut Session, mechanism: SecurityMechanism) -> DrdaResult<AccessResult> {
    let config = session.configuration().clone();
    let rdb_name = session.connect_params().dbname().to_string();
    let server_name = session.connect_params().host().to_string();
    let ceilings = session.manager_levels().clone();
    let mgrlvlls = ceilings.to_mgrlvlls();
    let mut authenticator = authenticator_for(mechanism);
    debug!("handshake with {}", authenticator.mechanism());

    // without a token to exchange, ACCSEC is chained to EXCSAT
    let chained_accsec = !mechanism.exchanges_token();
    let mut cursor = session.roundtrip(false, |rw| {
        write_excsat(
            rw,
            config.external_name(),
            &server_name,
            config.product_id(),
            &mgrlvlls,
        )?;
        if chained_accsec {
            write_accsec(rw, mechanism.code(), &rdb_name, None)?;
        }
        Ok(())
    })?;

    let exchanged = parse_excsatrd(&mut cursor, ceilings.sqlam())?;
    let levels = match exchanged.manager_levels {
        Some(ref returned) => ceilings.negotiate(returned)?,
        None => {
            debug!("EXCSATRD without MGRLVLLS, ceilings apply");
            ceilings
        }
    };
    let sqlam = levels.sqlam();
    session.set_manager_levels(levels);
    {
        let attributes = session.server_attributes_mut();
        attributes.external_name = exchanged.external_name;
        attributes.server_name = exchanged.server_name;
        attributes.server_class = exchanged.server_class;
        attributes.release_level = exchanged.release_level;
    }
    session.set_state(SessionState::AttributesExchanged);

    if chained_accsec {
        parse_accsecrd(&mut cursor, mechanism, sqlam)?;
        cursor.end_of_chain()?;
        session.set_state(SessionState::SecurityNegotiated);
    } else {
        cursor.end_of_chain()?;
        let client_token = authenticator.client_token().map(<[u8]>::to_vec);
        let mut cursor = session.roundtrip(false, |rw| {
            write_accsec(rw, mechanism.code(), &rdb_name, client_token.as_deref())
        })?;
        let server_token = parse_accsecrd(&mut cursor, mechanism, sqlam)?
            .ok_or(DrdaError::MissingSecurityToken)?;
        cursor.end_of_chain()?;
        session.set_state(SessionState::SecurityNegotiated);
        authenticator.accept_server_token(&server_token)?;
        session.set_state(SessionState::KeyOrSeedExchanged);
    }

    let check_data = authenticator.security_check_data(
        session.connect_params().dbuser(),
        session.connect_params().password(),
    )?;
    session.set_data_cipher(authenticator.data_cipher()?);
    let product_data = session.product_data().to_vec();
    let correlation_token = session.correlation_token().to_vec();
    let mut cursor = session.roundtrip(false, |rw| {
        write_secchk(rw, mechanism.code(), &rdb_name, &check_data.credentials())?;
        write_accrdb(
            rw,
            &rdb_name,
            &AccessRdb {
                product_id: config.product_id(),
                product_data: &product_data,
                typdefnam: config.typdefnam(),
                correlation_token: &correlation_token,
                ccsids: config.ccsids(),
            },
        )
    })?;
    drop(check_data);

    parse_secchkrm(&mut cursor, sqlam)?;
    session.set_state(SessionState::SecurityChecked);

    let result = parse_accrdb_reply(&mut cursor, sqlam, session.server_attributes_mut())?;
    cursor.end_of_chain()?;
    match result {
        AccessResult::Success => {
            session.set_state(SessionState::DatabaseAccessed);
            session.set_state(SessionState::Open);
        }
        AccessResult::NoSession => {
            info!("server returned no session for {rdb_name}");
            session.set_state(SessionState::Closed);
        }
    }
    Ok(result)
}

// A reply message in place of the expected reply, with the SQLCARD that may follow it.
fn parse_reply_message(
    cursor: &mut ReplyCursor,
    codepoint: u16,
    sqlam: u16,
) -> DrdaResult<ReplyMessage> {
    if !ReplyMessage::is_reply_message(codepoint) {
        return Err(DrdaError::ObjectNotSupported { codepoint });
    }
    let mut rm = ReplyMessage::parse(cursor, codepoint)?;
    if skip_typdefs(cursor)? == Some(SQLCARD) {
        rm.set_diagnostics(parse_sqlcard(cursor, sqlam)?);
    }
    Ok(rm)
}

fn unexpected_reply(cursor: &mut ReplyCursor, codepoint: u16, sqlam: u16) -> DrdaError {
    match parse_reply_message(cursor, codepoint, sqlam) {
        Ok(rm) => {
            debug!("handshake rejected: {rm}");
            DrdaError::Reply(rm)
        }
        Err(e) => e,
    }
}

// Starts the next reply; it must be `expected`, otherwise the reply message is the error.
fn expect_reply(cursor: &mut ReplyCursor, expected: u16, sqlam: u16) -> DrdaResult<()> {
    cursor.start_same_id_chain_parse()?;
    match peek(cursor)? {
        Some(cp) if cp == expected => Ok(()),
        Some(cp) => Err(unexpected_reply(cursor, cp, sqlam)),
        None => Err(DrdaError::RequiredObjectNotFound {
            codepoint: expected,
        }),
    }
}

fn skip_object(cursor: &mut ReplyCursor, codepoint: u16) -> DrdaResult<()> {
    let len = cursor.parse_length_and_match(codepoint)?;
    cursor.skip_bytes(len)
}

// EXCSATRD: EXTNAM, MGRLVLLS, SRVCLSNM, SRVNAM, SRVRLSLV, all optional
fn parse_excsatrd(cursor: &mut ReplyCursor, sqlam: u16) -> DrdaResult<ExchangedAttributes> {
    expect_reply(cursor, EXCSATRD, sqlam)?;
    let mut exchanged = ExchangedAttributes::default();
    let mut found = FoundObjects::default();
    cursor.enter_collection(EXCSATRD)?;
    cursor.do_until_collection_end(|c, cp| {
        match cp {
            EXTNAM => {
                found.found(cp)?;
                exchanged.external_name = c.parse_string(cp, MAX_NAME_LENGTH)?;
            }
            SRVCLSNM => {
                found.found(cp)?;
                exchanged.server_class = c.parse_string(cp, MAX_NAME_LENGTH)?;
            }
            SRVNAM => {
                found.found(cp)?;
                exchanged.server_name = c.parse_string(cp, MAX_NAME_LENGTH)?;
            }
            SRVRLSLV => {
                found.found(cp)?;
                exchanged.release_level = c.parse_string(cp, MAX_NAME_LENGTH)?;
            }
            MGRLVLLS => {
                found.found(cp)?;
                let len = c.parse_length_and_match(cp)?;
                if len % 4 != 0 {
                    return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_NOT_ALLOWED));
                }
                let mut levels = Vec::with_capacity(len / 4);
                for _ in 0..len / 4 {
                    levels.push((c.read_u16()?, c.read_u16()?));
                }
                exchanged.manager_levels = Some(levels);
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    cursor.end_of_same_id_chain_data()?;
    debug!(
        "server {} ({}), release {}",
        exchanged.server_name, exchanged.server_class, exchanged.release_level
    );
    Ok(exchanged)
}

// ACCSECRD: SECMEC, [SECTKN], [SECCHKCD]; returns the server's key or seed
fn parse_accsecrd(
    cursor: &mut ReplyCursor,
    mechanism: SecurityMechanism,
    sqlam: u16,
) -> DrdaResult<Option<Vec<u8>>> {
    expect_reply(cursor, ACCSECRD, sqlam)?;
    let mut offered = Vec::new();
    let mut secchkcd = None;
    let mut server_token = None;
    let mut found = FoundObjects::default();
    cursor.enter_collection(ACCSECRD)?;
    cursor.do_until_collection_end(|c, cp| {
        match cp {
            SECMEC => {
                found.found(cp)?;
                let len = c.parse_length_and_match(cp)?;
                if len == 0 || len % 2 != 0 {
                    return Err(DrdaError::syntax(SYNERRCD_OBJ_LEN_NOT_ALLOWED));
                }
                for _ in 0..len / 2 {
                    offered.push(c.read_u16()?);
                }
            }
            SECCHKCD => {
                found.found(cp)?;
                secchkcd = Some(c.parse_u8(cp)?);
            }
            SECTKN => {
                found.found(cp)?;
                server_token = Some(c.parse_bytes(cp, 1, TOKEN_LENGTH)?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    found.require(&[SECMEC])?;
    cursor.end_of_same_id_chain_data()?;

    if offered != [mechanism.code()] {
        for code in &offered {
            match SecurityMechanism::from_code(*code) {
                Ok(offer) => debug!("server offers {offer}"),
                Err(_) => debug!("server offers unknown mechanism {code}"),
            }
        }
        return Err(DrdaError::SecurityMechanismNotSupported {
            requested: mechanism.code(),
            offered,
        });
    }
    if let Some(code) = secchkcd.filter(|code| *code != 0) {
        return Err(DrdaError::SecurityCheck {
            reason: SecurityCheckReason::from_secchkcd(code),
        });
    }
    if mechanism.exchanges_token() && server_token.is_none() {
        return Err(DrdaError::MissingSecurityToken);
    }
    if !mechanism.exchanges_token() && server_token.is_some() {
        debug!("ignoring security token in ACCSECRD");
        server_token = None;
    }
    Ok(server_token)
}

// SECCHKRM: SVRCOD, SECCHKCD, [SECTKN], [SRVDGN]
fn parse_secchkrm(cursor: &mut ReplyCursor, sqlam: u16) -> DrdaResult<()> {
    expect_reply(cursor, SECCHKRM, sqlam)?;
    let mut svrcod = Svrcod::Info;
    let mut secchkcd = 0;
    let mut found = FoundObjects::default();
    cursor.enter_collection(SECCHKRM)?;
    cursor.do_until_collection_end(|c, cp| {
        match cp {
            SVRCOD => {
                found.found(cp)?;
                svrcod = Svrcod::from_u16(c.parse_u16(cp)?)?;
            }
            SECCHKCD => {
                found.found(cp)?;
                secchkcd = c.parse_u8(cp)?;
            }
            SECTKN | SRVDGN => {
                found.found(cp)?;
                skip_object(c, cp)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    found.require(&[SVRCOD, SECCHKCD])?;
    cursor.end_of_same_id_chain_data()?;
    trace!("SECCHKRM: {svrcod:?}, SECCHKCD 0x{secchkcd:02X}");
    if secchkcd == 0 {
        Ok(())
    } else {
        Err(DrdaError::SecurityCheck {
            reason: SecurityCheckReason::from_secchkcd(secchkcd),
        })
    }
}

// ACCRDBRM [TYPDEFs] [SQLCARD], or RDBAFLRM [SQLCARD], or an error reply message
fn parse_accrdb_reply(
    cursor: &mut ReplyCursor,
    sqlam: u16,
    attributes: &mut ServerAttributes,
) -> DrdaResult<AccessResult> {
    cursor.start_same_id_chain_parse()?;
    match peek(cursor)? {
        Some(ACCRDBRM) => {}
        Some(RDBAFLRM) => {
            let rm = parse_reply_message(cursor, RDBAFLRM, sqlam)?;
            // without message tokens the server merely declined to open a session
            let no_session = rm
                .diagnostics()
                .map_or(true, |d| d.message_tokens().is_empty());
            if no_session {
                cursor.end_of_same_id_chain_data()?;
                return Ok(AccessResult::NoSession);
            }
            return Err(DrdaError::Reply(rm));
        }
        Some(cp) => return Err(unexpected_reply(cursor, cp, sqlam)),
        None => {
            return Err(DrdaError::RequiredObjectNotFound {
                codepoint: ACCRDBRM,
            })
        }
    }

    let mut found = FoundObjects::default();
    cursor.enter_collection(ACCRDBRM)?;
    cursor.do_until_collection_end(|c, cp| {
        match cp {
            SVRCOD => {
                found.found(cp)?;
                Svrcod::from_u16(c.parse_u16(cp)?)?;
            }
            PRDID => {
                found.found(cp)?;
                attributes.product_id = c.parse_string(cp, MAX_NAME_LENGTH)?;
            }
            TYPDEFNAM => {
                found.found(cp)?;
                attributes.typdefnam = c.parse_string(cp, MAX_NAME_LENGTH)?;
            }
            TYPDEFOVR => {
                found.found(cp)?;
                c.enter_collection(cp)?;
                c.do_until_collection_end(|c, cp| {
                    match cp {
                        CCSIDSBC => attributes.ccsids.0 = c.parse_u16(cp)?,
                        CCSIDDBC => attributes.ccsids.1 = c.parse_u16(cp)?,
                        CCSIDMBC => attributes.ccsids.2 = c.parse_u16(cp)?,
                        _ => return Ok(false),
                    }
                    Ok(true)
                })?;
            }
            USRID => {
                found.found(cp)?;
                attributes.user = Some(c.parse_string(cp, MAX_NAME_LENGTH)?);
            }
            CRRTKN => {
                found.found(cp)?;
                attributes.correlation_token = Some(c.parse_bytes(cp, 0, MAX_NAME_LENGTH)?);
            }
            RDBINTTKN | SRVLST | PKGDFTCST | SRVDGN => {
                found.found(cp)?;
                skip_object(c, cp)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    found.require(&[SVRCOD, PRDID, TYPDEFNAM, TYPDEFOVR])?;

    if skip_typdefs(cursor)? == Some(SQLCARD) {
        let diagnostics = parse_sqlcard(cursor, sqlam)?;
        match diagnostics.severity() {
            Severity::Success => {}
            Severity::Warning => info!("database access: {diagnostics}"),
            Severity::Error => return Err(DrdaError::Sql { source: diagnostics }),
        }
    }
    cursor.end_of_same_id_chain_data()?;
    debug!(
        "database accessed: product {}, typdefnam {}, ccsids {:?}",
        attributes.product_id, attributes.typdefnam, attributes.ccsids
    );
    Ok(AccessResult::Success)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::{
        codepoint::{AGENT, CMDCHKRM, MGRLVLRM, RDBNAM, SQLAM},
        parts::test::{reply_message, sqlcagrp, sqlcard},
        reply::test::{dss, scalar},
    };

    fn cursor(payload: Vec<u8>) -> ReplyCursor {
        ReplyCursor::new(vec![dss(payload, false, false)])
    }

    fn accsecrd(secmec: u16, extra: &[Vec<u8>]) -> Vec<u8> {
        let mut body = scalar(SECMEC, &secmec.to_be_bytes());
        for e in extra {
            body.extend_from_slice(e);
        }
        scalar(ACCSECRD, &body)
    }

    fn accrdbrm(extra: &[Vec<u8>]) -> Vec<u8> {
        let typdefovr = [
            scalar(CCSIDSBC, &1208_u16.to_be_bytes()),
            scalar(CCSIDMBC, &1208_u16.to_be_bytes()),
        ]
        .concat();
        let mut inner = vec![
            scalar(PRDID, b"DSN11015"),
            scalar(TYPDEFNAM, b"QTDSQLASC"),
            scalar(TYPDEFOVR, &typdefovr),
        ];
        inner.extend_from_slice(extra);
        reply_message(ACCRDBRM, 0, &inner)
    }

    #[test]
    fn test_excsatrd() {
        let levels = [AGENT, 5, SQLAM, 6]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect::<Vec<u8>>();
        let body = [
            scalar(EXTNAM, b"db2sysc 0A"),
            scalar(MGRLVLLS, &levels),
            scalar(SRVCLSNM, b"QDB2/LINUXX8664"),
            scalar(SRVNAM, b"srv1"),
            scalar(SRVRLSLV, b"SQL11050"),
        ]
        .concat();
        let exchanged = parse_excsatrd(&mut cursor(scalar(EXCSATRD, &body)), 7).unwrap();
        assert_eq!(exchanged.server_name, "srv1");
        assert_eq!(exchanged.release_level, "SQL11050");
        assert_eq!(exchanged.manager_levels, Some(vec![(AGENT, 5), (SQLAM, 6)]));

        let odd = scalar(EXCSATRD, &scalar(MGRLVLLS, &[0x14, 0x03, 0x00]));
        assert!(matches!(
            parse_excsatrd(&mut cursor(odd), 7),
            Err(DrdaError::Syntax { code: SYNERRCD_OBJ_LEN_NOT_ALLOWED })
        ));
    }

    #[test]
    fn test_excsat_answered_by_reply_message() {
        let mgrlvlrm = reply_message(MGRLVLRM, 8, &[scalar(MGRLVLLS, &[0x14, 0x74, 0, 2])]);
        match parse_excsatrd(&mut cursor(mgrlvlrm), 7) {
            Err(DrdaError::Reply(rm)) => assert_eq!(rm.codepoint(), MGRLVLRM),
            other => panic!("unexpected {other:?}"),
        }
        // not a reply message at all
        assert!(matches!(
            parse_excsatrd(&mut cursor(scalar(0x1234, &[])), 7),
            Err(DrdaError::ObjectNotSupported { codepoint: 0x1234 })
        ));
    }

    #[test]
    fn test_accsecrd_mechanism_mismatch() {
        let reply = scalar(ACCSECRD, &scalar(SECMEC, &[0, 3, 0, 9]));
        match parse_accsecrd(&mut cursor(reply), SecurityMechanism::EncryptedPassword, 7) {
            Err(DrdaError::SecurityMechanismNotSupported { requested, offered }) => {
                assert_eq!(requested, 7);
                assert_eq!(offered, vec![3, 9]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_accsecrd_tokens() {
        let mechanism = SecurityMechanism::PasswordSubstitute;
        let missing = accsecrd(8, &[]);
        assert!(matches!(
            parse_accsecrd(&mut cursor(missing), mechanism, 7),
            Err(DrdaError::MissingSecurityToken)
        ));

        let with_seed = accsecrd(8, &[scalar(SECTKN, b"abcdefgh")]);
        assert_eq!(
            parse_accsecrd(&mut cursor(with_seed), mechanism, 7).unwrap(),
            Some(b"abcdefgh".to_vec())
        );

        let too_long = accsecrd(9, &[scalar(SECTKN, &[1_u8; 33])]);
        assert!(matches!(
            parse_accsecrd(
                &mut cursor(too_long),
                SecurityMechanism::EncryptedUserIdPassword,
                7
            ),
            Err(DrdaError::Syntax { code: SYNERRCD_OBJ_LEN_NOT_ALLOWED })
        ));

        let clear = accsecrd(3, &[]);
        assert_eq!(
            parse_accsecrd(&mut cursor(clear), SecurityMechanism::UserIdPassword, 7).unwrap(),
            None
        );
    }

    #[test]
    fn test_accsecrd_with_security_check_code() {
        let reply = accsecrd(3, &[scalar(SECCHKCD, &[0x01])]);
        assert!(matches!(
            parse_accsecrd(&mut cursor(reply), SecurityMechanism::UserIdPassword, 7),
            Err(DrdaError::SecurityCheck {
                reason: SecurityCheckReason::MechanismNotSupported
            })
        ));
    }

    #[test]
    fn test_secchkrm() {
        let ok = reply_message(SECCHKRM, 0, &[scalar(SECCHKCD, &[0x00])]);
        parse_secchkrm(&mut cursor(ok), 7).unwrap();

        let bad_password = reply_message(SECCHKRM, 8, &[scalar(SECCHKCD, &[0x0F])]);
        assert!(matches!(
            parse_secchkrm(&mut cursor(bad_password), 7),
            Err(DrdaError::SecurityCheck {
                reason: SecurityCheckReason::PasswordInvalid
            })
        ));

        let without_code = reply_message(SECCHKRM, 0, &[]);
        assert!(matches!(
            parse_secchkrm(&mut cursor(without_code), 7),
            Err(DrdaError::RequiredObjectNotFound { codepoint: SECCHKCD })
        ));
    }

    #[test]
    fn test_accrdbrm() {
        let reply = [
            accrdbrm(&[scalar(CRRTKN, b"GA000001.HA2Babcdef")]),
            sqlcard(0, "00000", 0),
        ]
        .concat();
        let mut attributes = ServerAttributes::default();
        let result = parse_accrdb_reply(&mut cursor(reply), 7, &mut attributes).unwrap();
        assert_eq!(result, AccessResult::Success);
        assert_eq!(attributes.product_id(), "DSN11015");
        assert_eq!(attributes.ccsids(), (1208, 0, 1208));
        assert_eq!(
            attributes.correlation_token(),
            Some(&b"GA000001.HA2Babcdef"[..])
        );
    }

    #[test]
    fn test_accrdbrm_without_typdefovr() {
        let reply = reply_message(
            ACCRDBRM,
            0,
            &[scalar(PRDID, b"DSN11015"), scalar(TYPDEFNAM, b"QTDSQLASC")],
        );
        assert!(matches!(
            parse_accrdb_reply(&mut cursor(reply), 7, &mut ServerAttributes::default()),
            Err(DrdaError::RequiredObjectNotFound { codepoint: TYPDEFOVR })
        ));
    }

    #[test]
    fn test_rdbaflrm_with_null_sqlca_is_no_session() {
        let reply = [
            reply_message(RDBAFLRM, 8, &[scalar(RDBNAM, b"SAMPLE")]),
            scalar(SQLCARD, &[0xFF]),
        ]
        .concat();
        let result =
            parse_accrdb_reply(&mut cursor(reply), 7, &mut ServerAttributes::default()).unwrap();
        assert_eq!(result, AccessResult::NoSession);

        let without_tokens = [
            reply_message(RDBAFLRM, 8, &[scalar(RDBNAM, b"SAMPLE")]),
            sqlcard(-30061, "08004", 0),
        ]
        .concat();
        let result =
            parse_accrdb_reply(&mut cursor(without_tokens), 7, &mut ServerAttributes::default())
                .unwrap();
        assert_eq!(result, AccessResult::NoSession);

        let without_sqlcard = reply_message(RDBAFLRM, 8, &[scalar(RDBNAM, b"SAMPLE")]);
        let result =
            parse_accrdb_reply(&mut cursor(without_sqlcard), 7, &mut ServerAttributes::default())
                .unwrap();
        assert_eq!(result, AccessResult::NoSession);
    }

    #[test]
    fn test_rdbaflrm_with_message_tokens_is_an_error() {
        let reply = [
            reply_message(RDBAFLRM, 8, &[scalar(RDBNAM, b"SAMPLE")]),
            scalar(SQLCARD, &sqlcagrp(-30061, "08004", 0, &["SAMPLE"])),
        ]
        .concat();
        match parse_accrdb_reply(&mut cursor(reply), 7, &mut ServerAttributes::default()) {
            Err(DrdaError::Reply(rm)) => {
                assert_eq!(rm.codepoint(), RDBAFLRM);
                assert_eq!(rm.diagnostics().map(|d| d.sqlcode()), Some(-30061));
                assert_eq!(
                    rm.diagnostics().map(|d| d.message_tokens().to_vec()),
                    Some(vec!["SAMPLE".to_string()])
                );
            }
            other => panic!("unexpected {other:?}"),
        }

        let cmdchkrm = reply_message(CMDCHKRM, 8, &[]);
        assert!(matches!(
            parse_accrdb_reply(&mut cursor(cmdchkrm), 7, &mut ServerAttributes::default()),
            Err(DrdaError::Reply(_))
        ));
    }
}
