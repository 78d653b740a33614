mod test_utils;

use drdaconnect::{
    codepoint::*, AccessResult, ConnectParams, ConnectionConfiguration, DrdaError, DrdaResult,
    SecurityMechanism, Session, SessionState,
};
use log::{debug, info};
use test_utils::*;

// cargo test --test test_013_session_reset -- --nocapture
#[test]
fn test_013_session_reset() -> DrdaResult<()> {
    let mut _log_handle = test_utils::init_logger();

    reset_before_open_is_refused()?;
    reset_runs_a_fresh_handshake()?;
    Ok(())
}

fn params() -> DrdaResult<ConnectParams> {
    ConnectParams::builder()
        .dbname("SAMPLE")
        .dbuser("U1")
        .password("P1")
        .build()
}

fn reset_before_open_is_refused() -> DrdaResult<()> {
    info!("reset is only possible on an opened session");
    let (server, received) = ScriptedServer::new(&[]);
    let mut session = Session::new(server, params()?, ConnectionConfiguration::default());
    assert!(matches!(session.reset_session(), Err(DrdaError::Usage(_))));
    assert_eq!(session.state(), SessionState::Unestablished);
    assert!(received.lock().unwrap().is_empty());
    Ok(())
}

fn handshake_chains() -> Vec<Vec<u8>> {
    vec![
        chain(&[vec![excsatrd(&derby_levels())]]),
        chain(&[vec![accsecrd(8, Some(b"ServSeed"))]]),
        checked_and_accessed(),
    ]
}

fn reset_runs_a_fresh_handshake() -> DrdaResult<()> {
    info!("a reset repeats the handshake with new seeds and the same correlation token");
    let mut chains = handshake_chains();
    chains.extend(handshake_chains());
    let (server, received) = ScriptedServer::new(&chains);
    let config = ConnectionConfiguration::default()
        .with_security_mechanism(SecurityMechanism::PasswordSubstitute);
    let mut session = Session::new(server, params()?, config);

    assert_eq!(session.open()?, AccessResult::Success);
    let first_seed = client_seed(&received);
    let first_token = session.correlation_token().to_vec();
    received.lock().unwrap().clear();

    assert_eq!(session.reset_session()?, AccessResult::Success);
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(commands(&received), vec![EXCSAT, ACCSEC, SECCHK, ACCRDB]);
    let second_seed = client_seed(&received);
    debug!(
        "seeds: {} {}",
        hex::encode(&first_seed),
        hex::encode(&second_seed)
    );
    assert_ne!(first_seed, second_seed);
    assert_eq!(session.correlation_token(), first_token.as_slice());

    let accrdb = command_parameters(&received, ACCRDB);
    assert!(accrdb.contains(&(CRRTKN, first_token)));

    let statistics = session.statistics();
    assert_eq!(statistics.session_resets(), 1);
    assert_eq!(statistics.exchanges(), 6);
    Ok(())
}

fn client_seed(received: &std::sync::Arc<std::sync::Mutex<Vec<u8>>>) -> Vec<u8> {
    command_parameters(received, ACCSEC)
        .into_iter()
        .find(|(cp, _)| *cp == SECTKN)
        .map(|(_, seed)| seed)
        .unwrap()
}
