use crate::{
    protocol::{codepoint::SQLCARD, parts::fdoca::{utf8, FdocaReader}, reply::ReplyCursor},
    DrdaError, DrdaResult,
};

/// First SQL access manager level that sends SQLDIAGGRP and a VCS database name in SQLCAXGRP.
pub(crate) const SQLAM_WITH_DIAGNOSTICS: u16 = 7;

/// Separator of the message tokens in SQLERRMC.
const TOKEN_SEPARATOR: u8 = 0x14;

/// Severity of a [`Diagnostics`], derived from the sign of its SQL code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    /// The operation succeeded.
    Success,
    /// The operation succeeded with a warning, e.g. "no data" (SQL code 100).
    Warning,
    /// The operation failed.
    Error,
}
impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Self::Success => write!(f, "Success"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// The decoded SQL communications area that terminates the reply of every operation.
///
/// A non-zero SQL code is not an error of the protocol layer; it is returned as data,
/// and callers that want to treat it as an error use [`Diagnostics::into_result`].
#[derive(Clone, PartialEq, Eq)]
pub struct Diagnostics {
    sqlcode: i32,
    sqlstate: String,
    sqlerrproc: String,
    extended: Option<ExtendedDiagnostics>,
    statement: Option<StatementDiagnostics>,
}

/// Content of the SQLCAXGRP.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedDiagnostics {
    sqlerrd: [i32; 6],
    sqlwarn: [u8; 11],
    rdb_name: Option<String>,
    message_tokens: Vec<String>,
}
impl ExtendedDiagnostics {
    /// The six diagnostic counters; index 2 is the number of affected rows.
    #[must_use]
    pub fn sqlerrd(&self) -> &[i32; 6] {
        &self.sqlerrd
    }
    /// The eleven warning flags, blank if not set.
    #[must_use]
    pub fn sqlwarn(&self) -> &[u8; 11] {
        &self.sqlwarn
    }
    /// The name of the database that produced the diagnostics.
    #[must_use]
    pub fn rdb_name(&self) -> Option<&str> {
        self.rdb_name.as_deref()
    }
    /// The message tokens that are to be inserted into the message text.
    #[must_use]
    pub fn message_tokens(&self) -> &[String] {
        &self.message_tokens
    }
}

/// Content of the SQLDIAGGRP.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatementDiagnostics {
    row_count: i64,
    conditions: Vec<Condition>,
    connections: Vec<ConnectionDiagnostic>,
}
impl StatementDiagnostics {
    /// The row count reported in the statement group.
    #[must_use]
    pub fn row_count(&self) -> i64 {
        self.row_count
    }
    /// The conditions reported by the server.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
    /// The connections reported by the server.
    #[must_use]
    pub fn connections(&self) -> &[ConnectionDiagnostic] {
        &self.connections
    }
}

/// One entry of the condition-information list (SQLDCGRP).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    /// The condition's SQL code.
    pub sqlcode: i32,
    /// The condition's SQL state.
    pub sqlstate: String,
    /// Reason code.
    pub reason: i32,
    /// Line number within the statement or routine.
    pub line: i32,
    /// The row of a rowset the condition refers to.
    pub row_number: i64,
    /// The database that produced the condition.
    pub rdb_name: String,
    /// Message tokens.
    pub tokens: Vec<String>,
    /// The message text, if the server provided one.
    pub message: Option<String>,
}

/// One entry of the connection list (SQLCNGRP).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionDiagnostic {
    /// The database name.
    pub rdb_name: String,
    /// The class name of the connection.
    pub class_name: String,
    /// The authorization id.
    pub auth_id: String,
}

impl Diagnostics {
    /// The diagnostics of a successful operation; this is what a null SQLCA stands for.
    #[must_use]
    pub fn success() -> Self {
        Self {
            sqlcode: 0,
            sqlstate: "00000".to_string(),
            sqlerrproc: String::new(),
            extended: None,
            statement: None,
        }
    }

    /// The SQL code: 0 is success, positive values are warnings, negative values errors.
    #[must_use]
    pub fn sqlcode(&self) -> i32 {
        self.sqlcode
    }
    /// The five-character SQL state.
    #[must_use]
    pub fn sqlstate(&self) -> &str {
        &self.sqlstate
    }
    /// The id of the server component that produced the diagnostics.
    #[must_use]
    pub fn sqlerrproc(&self) -> &str {
        &self.sqlerrproc
    }
    /// The extended diagnostics, if the server sent them.
    #[must_use]
    pub fn extended(&self) -> Option<&ExtendedDiagnostics> {
        self.extended.as_ref()
    }
    /// The statement diagnostics, if the server sent them.
    #[must_use]
    pub fn statement(&self) -> Option<&StatementDiagnostics> {
        self.statement.as_ref()
    }

    /// The severity.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self.sqlcode {
            0 => Severity::Success,
            c if c > 0 => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Number of rows affected by the operation, as reported in SQLERRD(3).
    #[must_use]
    pub fn row_count(&self) -> i64 {
        self.extended
            .as_ref()
            .map_or(0, |x| i64::from(x.sqlerrd[2]))
    }

    /// True for SQL code 100, which ends a query.
    #[must_use]
    pub fn is_end_of_data(&self) -> bool {
        self.sqlcode == 100
    }

    /// The message tokens, or an empty slice.
    #[must_use]
    pub fn message_tokens(&self) -> &[String] {
        self.extended.as_ref().map_or(&[], |x| &x.message_tokens)
    }

    /// Converts error diagnostics into [`DrdaError::Sql`].
    ///
    /// # Errors
    ///
    /// `DrdaError::Sql` if the SQL code is negative.
    pub fn into_result(self) -> DrdaResult<Self> {
        if self.severity() == Severity::Error {
            Err(DrdaError::Sql { source: self })
        } else {
            Ok(self)
        }
    }
}

impl std::error::Error for Diagnostics {}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            fmt,
            "{} [SQLCODE: {}, SQLSTATE: {}]",
            self.severity(),
            self.sqlcode,
            self.sqlstate
        )?;
        let tokens = self.message_tokens();
        if !tokens.is_empty() {
            write!(fmt, ", tokens: {tokens:?}")?;
        }
        if let Some(message) = self
            .statement
            .as_ref()
            .and_then(|s| s.conditions.first())
            .and_then(|c| c.message.as_deref())
        {
            write!(fmt, r#": "{message}""#)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{self}")
    }
}

/// Reads an SQLCARD object; a null SQLCA means success.
pub(crate) fn parse_sqlcard(cursor: &mut ReplyCursor, sqlam: u16) -> DrdaResult<Diagnostics> {
    let len = cursor.parse_length_and_match(SQLCARD)?;
    let mut rdr = FdocaReader::new(cursor.take(len)?);
    let diagnostics = parse_sqlcagrp(&mut rdr, sqlam)?.unwrap_or_else(Diagnostics::success);
    if !rdr.is_at_end() {
        return Err(super::fdoca::truncated());
    }
    debug!("parse_sqlcard(): {diagnostics}");
    Ok(diagnostics)
}

/// Reads an SQLCAGRP; returns `None` if it is null.
pub(crate) fn parse_sqlcagrp(
    rdr: &mut FdocaReader,
    sqlam: u16,
) -> DrdaResult<Option<Diagnostics>> {
    if rdr.is_null()? {
        return Ok(None);
    }
    let sqlcode = rdr.i32()?;
    let sqlstate = rdr.string(5)?;
    let sqlerrproc = rdr.string(8)?.trim_end().to_string();
    let extended = parse_sqlcaxgrp(rdr, sqlam)?;
    let statement = if sqlam >= SQLAM_WITH_DIAGNOSTICS {
        parse_sqldiaggrp(rdr)?
    } else {
        None
    };
    Ok(Some(Diagnostics {
        sqlcode,
        sqlstate,
        sqlerrproc,
        extended,
        statement,
    }))
}

fn parse_sqlcaxgrp(rdr: &mut FdocaReader, sqlam: u16) -> DrdaResult<Option<ExtendedDiagnostics>> {
    if rdr.is_null()? {
        return Ok(None);
    }
    let mut rdb_name = None;
    if sqlam < SQLAM_WITH_DIAGNOSTICS {
        rdb_name = Some(rdr.string(18)?.trim_end().to_string());
    }
    let mut sqlerrd = [0_i32; 6];
    for e in &mut sqlerrd {
        *e = rdr.i32()?;
    }
    let mut sqlwarn = [0_u8; 11];
    sqlwarn.copy_from_slice(rdr.bytes(11)?);
    if sqlam >= SQLAM_WITH_DIAGNOSTICS {
        rdb_name = Some(rdr.vcs()?).filter(|s| !s.is_empty());
    }
    // mixed and single-byte variant, at most one of them is non-empty
    let sqlerrmc = match rdr.ld_bytes()? {
        Some(bytes) => {
            rdr.skip(2)?;
            Some(bytes)
        }
        None => rdr.ld_bytes()?,
    };
    let message_tokens = match sqlerrmc {
        Some(bytes) => bytes
            .split(|b| *b == TOKEN_SEPARATOR)
            .map(|t| utf8(t.to_vec()))
            .collect::<DrdaResult<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok(Some(ExtendedDiagnostics {
        sqlerrd,
        sqlwarn,
        rdb_name,
        message_tokens,
    }))
}

fn parse_sqldiaggrp(rdr: &mut FdocaReader) -> DrdaResult<Option<StatementDiagnostics>> {
    if rdr.is_null()? {
        return Ok(None);
    }
    let mut statement = StatementDiagnostics::default();

    // SQLDIAGSTT
    if !rdr.is_null()? {
        let _function_code = rdr.i32()?;
        let _cost_estimate = rdr.i32()?;
        let _last_row = rdr.i32()?;
        rdr.skip(16)?;
        statement.row_count = rdr.i64()?;
        rdr.skip(24)?;
    }

    // SQLDIAGCI
    if !rdr.is_null()? {
        let count = rdr.i16()?;
        for _ in 0..count {
            statement.conditions.push(parse_sqldcgrp(rdr)?);
        }
    }

    // SQLDIAGCN
    if !rdr.is_null()? {
        let count = rdr.i16()?;
        for _ in 0..count {
            rdr.skip(18)?;
            statement.connections.push(ConnectionDiagnostic {
                rdb_name: rdr.vcs()?,
                class_name: rdr.vcs()?,
                auth_id: rdr.vcs()?,
            });
        }
    }
    Ok(Some(statement))
}

fn parse_sqldcgrp(rdr: &mut FdocaReader) -> DrdaResult<Condition> {
    let sqlcode = rdr.i32()?;
    let sqlstate = rdr.string(5)?;
    let reason = rdr.i32()?;
    let line = rdr.i32()?;
    let row_number = rdr.i64()?;
    rdr.skip(47)?;
    let rdb_name = rdr.vcs()?;

    // SQLDCTOKS
    let mut tokens = Vec::new();
    if !rdr.is_null()? {
        let count = rdr.i16()?;
        for _ in 0..count {
            if let Some(token) = rdr.nvcm_or_nvcs()? {
                tokens.push(token);
            }
        }
    }
    let message = rdr.nvcm_or_nvcs()?;
    // column name, parameter name, extended names
    for _ in 0..3 {
        rdr.nvcm_or_nvcs()?;
    }

    // SQLDCXGRP: object, constraint, routine and trigger names
    if !rdr.is_null()? {
        for _ in 0..4 {
            rdr.nvcm_or_nvcs()?;
        }
        for _ in 0..3 {
            rdr.vcs()?;
            rdr.nvcm_or_nvcs()?;
            rdr.nvcm_or_nvcs()?;
        }
    }

    Ok(Condition {
        sqlcode,
        sqlstate,
        reason,
        line,
        row_number,
        rdb_name,
        tokens,
        message,
    })
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::protocol::reply::test::{dss, scalar};

    // an SQLCAGRP with SQLCAXGRP at the given SQLAM level and a null SQLDIAGGRP
    pub(crate) fn sqlcagrp(sqlcode: i32, sqlstate: &str, row_count: i32, tokens: &[&str]) -> Vec<u8> {
        let mut v = vec![0x00];
        v.extend_from_slice(&sqlcode.to_be_bytes());
        v.extend_from_slice(sqlstate.as_bytes());
        v.extend_from_slice(b"SQLEXEC ");
        v.push(0x00); // SQLCAXGRP
        for i in 0..6 {
            v.extend_from_slice(&(if i == 2 { row_count } else { 0 }).to_be_bytes());
        }
        v.extend_from_slice(b"           ");
        v.extend_from_slice(&[0x00, 0x06]);
        v.extend_from_slice(b"SAMPLE");
        let sqlerrmc = tokens.join("\u{14}");
        v.extend_from_slice(&u16::try_from(sqlerrmc.len()).unwrap().to_be_bytes());
        v.extend_from_slice(sqlerrmc.as_bytes());
        v.extend_from_slice(&[0x00, 0x00]); // empty single-byte variant
        v.push(0xFF); // SQLDIAGGRP
        v
    }

    pub(crate) fn sqlcard(sqlcode: i32, sqlstate: &str, row_count: i32) -> Vec<u8> {
        scalar(SQLCARD, &sqlcagrp(sqlcode, sqlstate, row_count, &[]))
    }

    #[test]
    fn test_null_sqlca_is_success() {
        let mut cursor = ReplyCursor::new(vec![dss(scalar(SQLCARD, &[0xFF]), false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        let diagnostics = parse_sqlcard(&mut cursor, 7).unwrap();
        assert_eq!(diagnostics.severity(), Severity::Success);
        assert_eq!(diagnostics.sqlstate(), "00000");
        cursor.end_of_chain().unwrap();
    }

    #[test]
    fn test_error_with_tokens() {
        let bytes = scalar(SQLCARD, &sqlcagrp(-204, "42X05", 0, &["APP", "T1"]));
        let mut cursor = ReplyCursor::new(vec![dss(bytes, false, false)]);
        cursor.start_same_id_chain_parse().unwrap();
        let diagnostics = parse_sqlcard(&mut cursor, 7).unwrap();
        assert_eq!(diagnostics.sqlcode(), -204);
        assert_eq!(diagnostics.sqlstate(), "42X05");
        assert_eq!(diagnostics.sqlerrproc(), "SQLEXEC");
        assert_eq!(diagnostics.message_tokens(), &["APP", "T1"]);
        assert_eq!(diagnostics.extended().unwrap().rdb_name(), Some("SAMPLE"));
        let e = diagnostics.into_result().unwrap_err();
        assert!(!e.is_chain_breaking());
        assert_eq!(e.sqlstate(), "42X05");
    }

    #[test]
    fn test_row_count_and_end_of_data() {
        let mut cursor = ReplyCursor::new(vec![
            dss(sqlcard(0, "00000", 3), true, false),
            dss(sqlcard(100, "02000", 0), false, false),
        ]);
        cursor.start_same_id_chain_parse().unwrap();
        let d = parse_sqlcard(&mut cursor, 7).unwrap();
        assert_eq!(d.row_count(), 3);
        assert!(!d.is_end_of_data());
        cursor.start_same_id_chain_parse().unwrap();
        let d = parse_sqlcard(&mut cursor, 7).unwrap();
        assert!(d.is_end_of_data());
        assert_eq!(d.severity(), Severity::Warning);
        assert!(d.into_result().is_ok());
    }

    #[test]
    fn test_old_sqlam_has_fixed_rdb_name() {
        let mut v = vec![0x00];
        v.extend_from_slice(&(-1_i32).to_be_bytes());
        v.extend_from_slice(b"58009");
        v.extend_from_slice(b"PROC0001");
        v.push(0x00);
        v.extend_from_slice(b"OLDDB             ");
        v.extend_from_slice(&[0; 24]);
        v.extend_from_slice(&[b' '; 11]);
        v.extend_from_slice(&[0, 0, 0, 0]); // both SQLERRMC variants empty
        let d = parse_sqlcagrp(&mut FdocaReader::new(&v), 6)
            .unwrap()
            .unwrap();
        assert_eq!(d.extended().unwrap().rdb_name(), Some("OLDDB"));
        assert!(d.statement().is_none());
    }

    #[test]
    fn test_statement_diagnostics() {
        let mut v = sqlcagrp(-1, "23505", 0, &[]);
        v.pop();
        v.push(0x00); // SQLDIAGGRP
        v.push(0x00); // SQLDIAGSTT
        v.extend_from_slice(&[0; 12]);
        v.extend_from_slice(&[0; 16]);
        v.extend_from_slice(&5_i64.to_be_bytes());
        v.extend_from_slice(&[0; 24]);
        v.push(0x00); // SQLDIAGCI
        v.extend_from_slice(&1_i16.to_be_bytes());
        v.extend_from_slice(&(-1_i32).to_be_bytes());
        v.extend_from_slice(b"23505");
        v.extend_from_slice(&[0; 16]);
        v.extend_from_slice(&[0; 47]);
        v.extend_from_slice(&[0x00, 0x02, b'D', b'B']);
        v.push(0xFF); // SQLDCTOKS
        v.extend_from_slice(&[0x00, 0x00, 0x03, b'd', b'u', b'p', 0xFF]); // message
        v.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        v.push(0xFF); // SQLDCXGRP
        v.push(0xFF); // SQLDIAGCN
        let mut rdr = FdocaReader::new(&v);
        let d = parse_sqlcagrp(&mut rdr, 7).unwrap().unwrap();
        assert!(rdr.is_at_end());
        let statement = d.statement().unwrap();
        assert_eq!(statement.row_count(), 5);
        assert_eq!(statement.conditions()[0].message.as_deref(), Some("dup"));
        assert_eq!(statement.conditions()[0].rdb_name, "DB");
        assert!(d.to_string().ends_with(r#": "dup""#));
    }
}
