#![allow(dead_code)]

use drdaconnect::{codepoint::*, Transport};
use flexi_logger::{opt_format, Logger, LoggerHandle};
use std::{
    io::{Cursor, Read, Write},
    net::SocketAddr,
    sync::{Arc, Mutex},
};

/// Use env variable `RUST_LOG` to influence the log level; default is "info".
pub fn init_logger() -> LoggerHandle {
    Logger::try_with_env_or_str("info")
        .unwrap()
        .format(opt_format)
        .start()
        .unwrap_or_else(|e| panic!("Logger initialization failed with {e}"))
}

/// A server stand-in that answers with prepared reply chains and records what it receives.
///
/// The replies of all exchanges are concatenated; the session reads exactly one chain
/// per exchange, so the order of the chains must match the order of the requests.
pub struct ScriptedServer {
    replies: Cursor<Vec<u8>>,
    received: Arc<Mutex<Vec<u8>>>,
}
impl ScriptedServer {
    pub fn new(chains: &[Vec<u8>]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                replies: Cursor::new(chains.concat()),
                received: Arc::clone(&received),
            },
            received,
        )
    }
}
impl Read for ScriptedServer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.replies.read(buf)
    }
}
impl Write for ScriptedServer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.received.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
impl Transport for ScriptedServer {
    fn local_addr(&self) -> Option<SocketAddr> {
        Some("10.0.0.1:6700".parse().unwrap())
    }
}

/// A DDM object with a scalar body.
pub fn scalar(cp: u16, data: &[u8]) -> Vec<u8> {
    let mut v = u16::try_from(data.len() + 4).unwrap().to_be_bytes().to_vec();
    v.extend_from_slice(&cp.to_be_bytes());
    v.extend_from_slice(data);
    v
}

pub fn collection(cp: u16, parts: &[Vec<u8>]) -> Vec<u8> {
    scalar(cp, &parts.concat())
}

pub fn reply_message(rm: u16, svrcod: u16, inner: &[Vec<u8>]) -> Vec<u8> {
    let mut parts = vec![scalar(SVRCOD, &svrcod.to_be_bytes())];
    parts.extend_from_slice(inner);
    collection(rm, &parts)
}

/// One reply chain: per command a list of DDM objects, each in its own frame.
///
/// The first frame of a reply is a reply frame, the others are object frames
/// with the same correlation id.
pub fn chain(replies: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let mut v = Vec::new();
    for (i, reply) in replies.iter().enumerate() {
        let correlation_id = u16::try_from(i + 1).unwrap();
        for (j, object) in reply.iter().enumerate() {
            let last_of_reply = j + 1 == reply.len();
            let last = last_of_reply && i + 1 == replies.len();
            let mut format = if j == 0 { 0x02 } else { 0x03 };
            if !last {
                format |= 0x40;
            }
            if !last_of_reply {
                format |= 0x10;
            }
            v.extend_from_slice(&u16::try_from(object.len() + 6).unwrap().to_be_bytes());
            v.push(0xD0);
            v.push(format);
            v.extend_from_slice(&correlation_id.to_be_bytes());
            v.extend_from_slice(object);
        }
    }
    v
}

pub fn excsatrd(levels: &[(u16, u16)]) -> Vec<u8> {
    let mut mgrlvlls = Vec::new();
    for (manager, level) in levels {
        mgrlvlls.extend_from_slice(&manager.to_be_bytes());
        mgrlvlls.extend_from_slice(&level.to_be_bytes());
    }
    collection(
        EXCSATRD,
        &[
            scalar(EXTNAM, b"NetworkServerControl"),
            scalar(MGRLVLLS, &mgrlvlls),
            scalar(SRVCLSNM, b"QDERBY/JVM"),
            scalar(SRVNAM, b"dbhost"),
            scalar(SRVRLSLV, b"CSS10170"),
        ],
    )
}

/// The levels a Derby server returns.
pub fn derby_levels() -> Vec<(u16, u16)> {
    vec![
        (AGENT, 7),
        (SECMGR, 7),
        (CMNTCPIP, 5),
        (RDB, 7),
        (SQLAM, 7),
        (XAMGR, 7),
        (UNICODEMGR, 1208),
    ]
}

pub fn accsecrd(secmec: u16, token: Option<&[u8]>) -> Vec<u8> {
    let mut parts = vec![scalar(SECMEC, &secmec.to_be_bytes())];
    if let Some(token) = token {
        parts.push(scalar(SECTKN, token));
    }
    collection(ACCSECRD, &parts)
}

pub fn secchkrm(secchkcd: u8) -> Vec<u8> {
    reply_message(SECCHKRM, 0, &[scalar(SECCHKCD, &[secchkcd])])
}

pub fn accrdbrm() -> Vec<u8> {
    reply_message(
        ACCRDBRM,
        0,
        &[
            scalar(PRDID, b"CSS10170"),
            scalar(TYPDEFNAM, b"QTDSQLJVM"),
            collection(
                TYPDEFOVR,
                &[
                    scalar(CCSIDSBC, &1208_u16.to_be_bytes()),
                    scalar(CCSIDDBC, &1200_u16.to_be_bytes()),
                    scalar(CCSIDMBC, &1208_u16.to_be_bytes()),
                ],
            ),
        ],
    )
}

pub fn null_sqlcard() -> Vec<u8> {
    scalar(SQLCARD, &[0xFF])
}

/// An SQLCA group at SQLAM 7, with a null diagnostics group.
pub fn sqlcagrp(sqlcode: i32, sqlstate: &str, row_count: i32) -> Vec<u8> {
    sqlcagrp_with_tokens(sqlcode, sqlstate, row_count, &[])
}

pub fn sqlcagrp_with_tokens(sqlcode: i32, sqlstate: &str, row_count: i32, tokens: &[&str]) -> Vec<u8> {
    let mut v = vec![0x00];
    v.extend_from_slice(&sqlcode.to_be_bytes());
    v.extend_from_slice(sqlstate.as_bytes());
    v.extend_from_slice(b"SQLEXEC ");
    v.push(0x00);
    for i in 0..6 {
        v.extend_from_slice(&(if i == 2 { row_count } else { 0 }).to_be_bytes());
    }
    v.extend_from_slice(b"           ");
    v.extend_from_slice(&[0x00, 0x06]);
    v.extend_from_slice(b"SAMPLE");
    let sqlerrmc = tokens.join("\u{14}");
    v.extend_from_slice(&u16::try_from(sqlerrmc.len()).unwrap().to_be_bytes());
    v.extend_from_slice(sqlerrmc.as_bytes());
    v.extend_from_slice(&[0x00, 0x00]);
    v.push(0xFF);
    v
}

pub fn sqlcard(sqlcode: i32, sqlstate: &str, row_count: i32) -> Vec<u8> {
    scalar(SQLCARD, &sqlcagrp(sqlcode, sqlstate, row_count))
}

pub fn sqlcard_with_tokens(sqlcode: i32, sqlstate: &str, tokens: &[&str]) -> Vec<u8> {
    scalar(SQLCARD, &sqlcagrp_with_tokens(sqlcode, sqlstate, 0, tokens))
}

/// The reply chain of EXCSAT + ACCSEC for a mechanism without token exchange.
pub fn attributes_and_security(secmec: u16) -> Vec<u8> {
    chain(&[vec![excsatrd(&derby_levels())], vec![accsecrd(secmec, None)]])
}

/// The reply chain of SECCHK + ACCRDB for a successful access.
pub fn checked_and_accessed() -> Vec<u8> {
    chain(&[vec![secchkrm(0)], vec![accrdbrm(), null_sqlcard()]])
}

pub fn opnqryrm(qryinsid: u64) -> Vec<u8> {
    reply_message(
        OPNQRYRM,
        0,
        &[
            scalar(QRYPRCTYP, &LMTBLKPRC.to_be_bytes()),
            scalar(SQLCSRHLD, &[TRUE]),
            scalar(QRYINSID, &qryinsid.to_be_bytes()),
        ],
    )
}

/// A query descriptor for nullable columns, given by DRDA type and length.
pub fn qrydsc(columns: &[(u8, u16)]) -> Vec<u8> {
    let mut v = vec![u8::try_from(3 * columns.len() + 3).unwrap(), 0x76, 0xD0];
    for (drda_type, length) in columns {
        v.push(*drda_type);
        v.extend_from_slice(&length.to_be_bytes());
    }
    v.extend_from_slice(&[0x09, 0x71, 0xE0, 0x54, 0x00, 0x01, 0xD0, 0x00, 0x01]);
    v.extend_from_slice(&[0x06, 0x71, 0xF0, 0xE0, 0x00, 0x00]);
    scalar(QRYDSC, &v)
}

pub const NINTEGER: u8 = 0x03;
pub const NVARMIX: u8 = 0x3F;
pub const NLOBCMIXED: u8 = 0xCF;

// an empty VCM followed by the VCS
fn vcs(s: &str) -> Vec<u8> {
    let mut v = vec![0x00, 0x00];
    v.extend_from_slice(&u16::try_from(s.len()).unwrap().to_be_bytes());
    v.extend_from_slice(s.as_bytes());
    v
}

fn sqldagrp(name: &str, sqltype: i16, length: i64) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&0_i16.to_be_bytes());
    v.extend_from_slice(&0_i16.to_be_bytes());
    v.extend_from_slice(&length.to_be_bytes());
    v.extend_from_slice(&sqltype.to_be_bytes());
    v.extend_from_slice(&1208_u16.to_be_bytes());
    v.push(0x00);
    v.extend_from_slice(&0_i16.to_be_bytes());
    v.extend(vcs(name));
    v.extend_from_slice(&[0x00; 8]);
    v.push(0xFF);
    v.push(0x00);
    v.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0]);
    v.extend_from_slice(&[0x00; 6]);
    v.extend(vcs("PERSONS"));
    v.extend_from_slice(&[0x00; 4]);
    v.extend(vcs(name));
    v
}

/// An SQLDARD without header, for columns given by name, SQL type and length.
pub fn sqldard(columns: &[(&str, i16, i64)]) -> Vec<u8> {
    let mut body = sqlcagrp(0, "00000", 0);
    body.push(0xFF);
    body.extend_from_slice(&u16::try_from(columns.len()).unwrap().to_be_bytes());
    for (name, sqltype, length) in columns {
        body.extend(sqldagrp(name, *sqltype, *length));
    }
    scalar(SQLDARD, &body)
}

/// The codepoints of the commands in the recorded request frames, in order.
pub fn commands(received: &Arc<Mutex<Vec<u8>>>) -> Vec<u16> {
    frames(&received.lock().unwrap())
        .into_iter()
        .filter(|frame| frame[3] & 0x0F == 0x01)
        .map(|frame| u16::from_be_bytes([frame[8], frame[9]]))
        .collect()
}

/// The scalars of the first recorded command with the given codepoint.
pub fn command_parameters(received: &Arc<Mutex<Vec<u8>>>, command: u16) -> Vec<(u16, Vec<u8>)> {
    let bytes = received.lock().unwrap();
    let frame = frames(&bytes)
        .into_iter()
        .find(|frame| frame[3] & 0x0F == 0x01 && u16::from_be_bytes([frame[8], frame[9]]) == command)
        .unwrap_or_else(|| panic!("command 0x{command:04X} was not sent"));
    let mut pos = 10;
    let mut parameters = Vec::new();
    while pos < frame.len() {
        let len = usize::from(u16::from_be_bytes([frame[pos], frame[pos + 1]]));
        let cp = u16::from_be_bytes([frame[pos + 2], frame[pos + 3]]);
        parameters.push((cp, frame[pos + 4..pos + len].to_vec()));
        pos += len;
    }
    parameters
}

fn frames(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut result = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let len = usize::from(u16::from_be_bytes([bytes[pos], bytes[pos + 1]]));
        result.push(bytes[pos..pos + len].to_vec());
        pos += len;
    }
    result
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
