mod test_utils;

use drdaconnect::{
    codepoint::*, AccessResult, ConnectParams, ConnectionConfiguration, DrdaError, DrdaResult,
    SecurityCheckReason, SecurityMechanism, Session, SessionState,
};
use log::info;
use test_utils::*;

// cargo test --test test_012_access_failures -- --nocapture
#[test]
fn test_012_access_failures() -> DrdaResult<()> {
    let mut _log_handle = test_utils::init_logger();

    missing_password()?;
    no_session()?;
    access_refused_with_diagnostics()?;
    mechanism_not_offered()?;
    security_check_failed()?;
    manager_level_conflict()?;
    transport_closed()?;
    Ok(())
}

fn params(with_password: bool) -> DrdaResult<ConnectParams> {
    let mut builder = ConnectParams::builder();
    builder.dbname("SAMPLE").dbuser("U1");
    if with_password {
        builder.password("P1");
    }
    builder.build()
}

fn missing_password() -> DrdaResult<()> {
    info!("a missing password is detected before anything is sent");
    for mechanism in [
        SecurityMechanism::UserIdPassword,
        SecurityMechanism::EncryptedPassword,
        SecurityMechanism::PasswordSubstitute,
    ] {
        let (server, received) = ScriptedServer::new(&[]);
        let config = ConnectionConfiguration::default().with_security_mechanism(mechanism);
        let mut session = Session::new(server, params(false)?, config);
        let err = session.open().unwrap_err();
        assert!(matches!(err, DrdaError::Usage(_)), "{err:?}");
        assert_eq!(session.state(), SessionState::Unestablished);
        assert!(received.lock().unwrap().is_empty());
    }
    Ok(())
}

fn no_session() -> DrdaResult<()> {
    info!("RDBAFLRM without message tokens: no session, not an error");
    for card in [null_sqlcard(), sqlcard(-30061, "08004", 0)] {
        let (server, _received) = ScriptedServer::new(&[
            attributes_and_security(3),
            chain(&[
                vec![secchkrm(0)],
                vec![
                    reply_message(RDBAFLRM, 8, &[scalar(RDBNAM, b"SAMPLE")]),
                    card,
                ],
            ]),
        ]);
        let mut session = Session::new(server, params(true)?, ConnectionConfiguration::default());
        assert_eq!(session.open()?, AccessResult::NoSession);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.is_open());
        assert!(session.commit().is_err());
    }
    Ok(())
}

fn access_refused_with_diagnostics() -> DrdaResult<()> {
    info!("RDBAFLRM with message tokens is an error");
    let (server, _received) = ScriptedServer::new(&[
        attributes_and_security(3),
        chain(&[
            vec![secchkrm(0)],
            vec![
                reply_message(RDBAFLRM, 8, &[scalar(RDBNAM, b"SAMPLE")]),
                sqlcard_with_tokens(-30061, "08004", &["SAMPLE"]),
            ],
        ]),
    ]);
    let mut session = Session::new(server, params(true)?, ConnectionConfiguration::default());
    match session.open() {
        Err(DrdaError::Reply(rm)) => {
            assert_eq!(rm.codepoint(), RDBAFLRM);
            assert_eq!(rm.diagnostics().map(|d| d.sqlcode()), Some(-30061));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Broken);
    Ok(())
}

fn mechanism_not_offered() -> DrdaResult<()> {
    info!("the server offers other mechanisms");
    let (server, received) = ScriptedServer::new(&[chain(&[
        vec![excsatrd(&derby_levels())],
        vec![collection(
            ACCSECRD,
            &[scalar(SECMEC, &[0x00, 0x09, 0x00, 0x08])],
        )],
    ])]);
    let mut session = Session::new(server, params(true)?, ConnectionConfiguration::default());
    match session.open() {
        Err(DrdaError::SecurityMechanismNotSupported { requested, offered }) => {
            assert_eq!(requested, 3);
            assert_eq!(offered, vec![9, 8]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Broken);
    // SECCHK was never sent
    assert_eq!(commands(&received), vec![EXCSAT, ACCSEC]);
    assert!(matches!(
        session.open(),
        Err(DrdaError::ConnectionBroken { .. })
    ));
    Ok(())
}

fn security_check_failed() -> DrdaResult<()> {
    info!("SECCHKRM with a nonzero SECCHKCD");
    let (server, _received) =
        ScriptedServer::new(&[attributes_and_security(3), chain(&[vec![secchkrm(0x0F)]])]);
    let mut session = Session::new(server, params(true)?, ConnectionConfiguration::default());
    match session.open() {
        Err(DrdaError::SecurityCheck { reason }) => {
            assert!(matches!(reason, SecurityCheckReason::PasswordInvalid));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Broken);
    Ok(())
}

fn manager_level_conflict() -> DrdaResult<()> {
    info!("the server returns a level above the ceiling");
    let (server, _received) = ScriptedServer::new(&[chain(&[
        vec![excsatrd(&[(AGENT, 7), (SQLAM, 8)])],
        vec![accsecrd(3, None)],
    ])]);
    let mut session = Session::new(server, params(true)?, ConnectionConfiguration::default());
    assert!(matches!(
        session.open(),
        Err(DrdaError::ManagerLevelConflict {
            manager: SQLAM,
            level: 8
        })
    ));
    assert_eq!(session.state(), SessionState::Broken);
    Ok(())
}

fn transport_closed() -> DrdaResult<()> {
    info!("the server closes the transport in the middle of the handshake");
    let (server, _received) = ScriptedServer::new(&[attributes_and_security(3)]);
    let mut session = Session::new(server, params(true)?, ConnectionConfiguration::default());
    let err = session.open().unwrap_err();
    assert!(err.is_chain_breaking(), "{err:?}");
    assert_eq!(session.state(), SessionState::Broken);
    Ok(())
}
