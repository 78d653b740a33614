mod test_utils;

use drdaconnect::{
    codepoint::*, AccessResult, ConnectParams, ConnectionConfiguration, DrdaResult, Session,
    SessionState,
};
use log::{debug, info};
use test_utils::*;

// cargo test --test test_010_handshake -- --nocapture
#[test]
fn test_010_handshake() -> DrdaResult<()> {
    let mut _log_handle = test_utils::init_logger();

    open_with_user_and_password()?;
    open_twice_is_refused()?;
    statistics_count_the_exchanges()?;
    Ok(())
}

fn params() -> DrdaResult<ConnectParams> {
    ConnectParams::builder()
        .hostname("dbhost")
        .dbname("SAMPLE")
        .dbuser("U1")
        .password("P1")
        .build()
}

fn open_with_user_and_password() -> DrdaResult<()> {
    info!("USRIDPWD: EXCSAT+ACCSEC, then SECCHK+ACCRDB");
    let (server, received) =
        ScriptedServer::new(&[attributes_and_security(3), checked_and_accessed()]);
    let mut session = Session::new(server, params()?, ConnectionConfiguration::default());
    assert_eq!(session.state(), SessionState::Unestablished);

    assert_eq!(session.open()?, AccessResult::Success);
    assert_eq!(session.state(), SessionState::Open);
    assert!(session.is_open());
    assert_eq!(commands(&received), vec![EXCSAT, ACCSEC, SECCHK, ACCRDB]);

    let secchk = command_parameters(&received, SECCHK);
    debug!("SECCHK parameters: {secchk:?}");
    assert!(secchk.contains(&(SECMEC, vec![0x00, 0x03])));
    assert!(secchk.contains(&(RDBNAM, format!("{:<18}", "SAMPLE").into_bytes())));
    assert!(secchk.contains(&(USRID, b"U1".to_vec())));
    assert!(secchk.contains(&(PASSWORD, b"P1".to_vec())));

    // the correlation token is derived from the local address 10.0.0.1:6700
    let accrdb = command_parameters(&received, ACCRDB);
    let (_, crrtkn) = accrdb.iter().find(|(cp, _)| *cp == CRRTKN).unwrap();
    assert_eq!(crrtkn.len(), 19);
    assert!(crrtkn.starts_with(b"GA000001.HA2C"));
    assert_eq!(crrtkn.as_slice(), session.correlation_token());
    assert!(accrdb.iter().any(|(cp, _)| *cp == PRDDTA));

    let levels = session.manager_levels();
    assert_eq!((levels.sqlam(), levels.rdb(), levels.agent()), (7, 7, 7));
    assert_eq!(levels.unicodemgr(), 1208);

    let attributes = session.server_attributes();
    assert_eq!(attributes.server_class(), "QDERBY/JVM");
    assert_eq!(attributes.release_level(), "CSS10170");
    assert_eq!(attributes.product_id(), "CSS10170");
    assert_eq!(attributes.typdefnam(), "QTDSQLJVM");
    assert_eq!(attributes.ccsids(), (1208, 1200, 1208));
    Ok(())
}

fn open_twice_is_refused() -> DrdaResult<()> {
    info!("a second open is a usage error");
    let (server, _received) =
        ScriptedServer::new(&[attributes_and_security(3), checked_and_accessed()]);
    let mut session = Session::new(server, params()?, ConnectionConfiguration::default());
    session.open()?;
    assert!(session.open().is_err());
    assert_eq!(session.state(), SessionState::Open);
    Ok(())
}

fn statistics_count_the_exchanges() -> DrdaResult<()> {
    info!("statistics after the handshake");
    let (server, _received) =
        ScriptedServer::new(&[attributes_and_security(3), checked_and_accessed()]);
    let mut session = Session::new(server, params()?, ConnectionConfiguration::default());
    session.open()?;

    let statistics = session.statistics();
    debug!("{statistics}");
    assert_eq!(statistics.exchanges(), 2);
    // requests: EXCSAT, ACCSEC, SECCHK, ACCRDB; replies: four replies and an SQLCARD
    assert_eq!(statistics.frames(), (4, 5));
    assert_eq!(statistics.continuations(), (0, 0));
    assert_eq!(statistics.session_resets(), 0);

    session.reset_statistics();
    assert_eq!(session.statistics().exchanges(), 0);
    Ok(())
}
