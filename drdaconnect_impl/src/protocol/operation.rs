//! The SQL operations of an open session, as one tagged union.
//!
//! Every operation knows how to write its command (with fixed and optional parameters
//! in architected order, followed by its command data) and how to decode its part of
//! the reply chain. Several operations can be written into one request chain;
//! their replies are then decoded in the same order.
use crate::{
    protocol::{
        codepoint::{
            ABNUOWRM, CLSQRY, CNTQRY, DSCSQLSTT, ENDQRYRM, ENDUOWRM, EXCSQLIMM, EXCSQLSET,
            EXCSQLSTT, EXTDTA, FDODSC, FDODTA, MAXBLKEXT, MAXRSLCNT, MAXRSLCNT_NOLIMIT, OPNQFLRM,
            OPNQRY, OPNQRYRM, OUTEXP, PKGNAMCSN, PKGSNLST, PRCNAM, PRPSQLSTT, QRYATTSCR,
            QRYATTSET, QRYATTSNS, QRYATTUPD, QRYBLKSZ, QRYCLSIMP, QRYCLSIMP_YES, QRYDSC, QRYDTA,
            QRYINSID, QRYPRCTYP, QRYROWSET, RDBCMM, RDBCMTOK, RDBRLLBCK, RDBUPDRM, RSLSETFLG,
            RSLSETFLG_EXTENDED_SQLDA, RSLSETRM, RTNEXTALL, RTNEXTDTA, RTNSQLDA, SQLCARD,
            SQLCINRD, SQLCSRHLD, SQLDARD, SQLDTARD, SQLERRRM, SRVDGN, SVRCOD, TRUE,
            TYPDEFNAM, TYPDEFOVR, TYPSQLDA, TYPSQLDA_X_INPUT, TYPSQLDA_X_OUTPUT,
        },
        parts::{
            parse_column_descriptors, parse_sqlcard, parse_sqlcinrd, parse_sqldard,
            parse_sqlrslrd, ColumnMetadata, Diagnostics, Parameter, ParameterLayout,
            ReplyMessage, ResultSetInfo, Row, RowDecoder,
        },
        reply::{FoundObjects, Peek, ReplyCursor},
        request::RequestWriter,
        section::Section,
    },
    DrdaError, DrdaResult,
};
use std::sync::Arc;

/// Number of rows requested per block if the caller does not ask for a fetch size.
pub(crate) const DEFAULT_FETCH_SIZE: i32 = 64;
const MAX_PROCEDURE_NAME_LENGTH: usize = 255;
const SQLAM_WITH_QRYCLSIMP: u16 = 7;

/// Session values that shape how operations are written and decoded.
#[derive(Clone, Debug)]
pub(crate) struct OperationContext<'a> {
    pub rdb_name: &'a str,
    pub sqlam: u16,
    pub query_block_size: i32,
    pub max_block_extents: i16,
    pub unknown_length_streaming: bool,
}

/// One logical operation on an open session.
#[derive(Debug)]
pub(crate) enum Operation<'a> {
    /// EXCSQLIMM: executes a statement without parameters and without result.
    ExecuteImmediate { section: &'a Section, sql: &'a str },
    /// PRPSQLSTT: prepares a statement, optionally describing its result columns.
    Prepare {
        section: &'a Section,
        sql: &'a str,
        describe_output: bool,
        cursor_attributes: Option<&'a str>,
    },
    /// DSCSQLSTT for the parameters of a prepared statement.
    DescribeInput { section: &'a Section },
    /// DSCSQLSTT for the result columns of a prepared statement.
    DescribeOutput { section: &'a Section },
    /// EXCSQLSTT: executes a prepared statement.
    Execute {
        section: &'a Section,
        parameters: &'a [Parameter],
        output_expected: bool,
    },
    /// EXCSQLSTT for a stored procedure, which can return result sets.
    ExecuteCall {
        section: &'a Section,
        procedure_name: Option<&'a str>,
        parameters: &'a [Parameter],
        fetch_size: Option<i32>,
    },
    /// OPNQRY: opens a cursor on a prepared query.
    OpenQuery {
        section: &'a Section,
        parameters: &'a [Parameter],
        fetch_size: Option<i32>,
        described: Option<&'a ColumnMetadata>,
    },
    /// CNTQRY: fetches the next block of rows into the query's decoder.
    ContinueQuery {
        section: &'a Section,
        query_instance_id: u64,
        fetch_size: Option<i32>,
        decoder: &'a mut RowDecoder,
    },
    /// CLSQRY
    CloseQuery {
        section: &'a Section,
        query_instance_id: u64,
    },
    /// EXCSQLSET: sets special registers.
    SetSpecialRegisters {
        section: &'a Section,
        statements: &'a [&'a str],
    },
    Commit,
    Rollback,
}

/// Attributes of an open query, from OPNQRYRM.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct QueryAttributes {
    pub protocol_type: u16,
    pub query_instance_id: u64,
    pub holdable: bool,
    pub scrollable: bool,
    pub sensitivity: u8,
    pub updatable: u8,
    pub rowset: bool,
}

/// An opened query with the rows that came with its first reply.
#[derive(Debug)]
pub(crate) struct OpenedQuery {
    /// The section of a result set returned by a procedure.
    pub section: Option<Section>,
    pub attributes: QueryAttributes,
    pub diagnostics: Diagnostics,
    pub decoder: RowDecoder,
    pub rows: Vec<Row>,
    /// Set if the server closed the query already, with ENDQRYRM.
    pub end: Option<Diagnostics>,
}

/// The decoded reply of one operation.
#[derive(Debug)]
pub(crate) enum OperationReply {
    Done(Diagnostics),
    Described {
        diagnostics: Diagnostics,
        metadata: Option<ColumnMetadata>,
    },
    Opened {
        diagnostics: Diagnostics,
        query: Option<OpenedQuery>,
    },
    Fetched {
        rows: Vec<Row>,
        end: Option<Diagnostics>,
        closed: bool,
    },
    Executed {
        diagnostics: Diagnostics,
        output: Option<Row>,
        result_sets: Vec<(ResultSetInfo, OpenedQuery)>,
    },
}

impl OperationReply {
    /// The diagnostics of the operation.
    pub(crate) fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::Done(diagnostics)
            | Self::Described { diagnostics, .. }
            | Self::Opened { diagnostics, .. }
            | Self::Executed { diagnostics, .. } => Some(diagnostics),
            Self::Fetched { end, .. } => end.as_ref(),
        }
    }
}

impl<'a> Operation<'a> {
    fn name(&self) -> &'static str {
        match self {
            Self::ExecuteImmediate { .. } => "EXCSQLIMM",
            Self::Prepare { .. } => "PRPSQLSTT",
            Self::DescribeInput { .. } | Self::DescribeOutput { .. } => "DSCSQLSTT",
            Self::Execute { .. } | Self::ExecuteCall { .. } => "EXCSQLSTT",
            Self::OpenQuery { .. } => "OPNQRY",
            Self::ContinueQuery { .. } => "CNTQRY",
            Self::CloseQuery { .. } => "CLSQRY",
            Self::SetSpecialRegisters { .. } => "EXCSQLSET",
            Self::Commit => "RDBCMM",
            Self::Rollback => "RDBRLLBCK",
        }
    }

    // Parameters are checked and laid out before anything is written.
    fn parameter_layout(&self, ctx: &OperationContext) -> DrdaResult<Option<ParameterLayout<'a>>> {
        let parameters: &'a [Parameter] = match *self {
            Self::Execute { parameters, .. }
            | Self::ExecuteCall { parameters, .. }
            | Self::OpenQuery { parameters, .. } => parameters,
            _ => return Ok(None),
        };
        if parameters.is_empty() {
            return Ok(None);
        }
        ParameterLayout::new(parameters, ctx.unknown_length_streaming).map(Some)
    }

    fn write(
        &self,
        rw: &mut RequestWriter,
        layout: Option<&ParameterLayout>,
        ctx: &OperationContext,
    ) -> DrdaResult<()> {
        trace!("writing {}", self.name());
        match *self {
            Self::ExecuteImmediate { section, sql } => {
                rw.command(EXCSQLIMM, |fb| {
                    section.write_pkgnamcsn(fb, ctx.rdb_name)?;
                    fb.write_scalar_u8(RDBCMTOK, TRUE);
                    Ok(())
                })?;
                rw.sql_statement(sql)
            }
            Self::Prepare {
                section,
                sql,
                describe_output,
                cursor_attributes,
            } => {
                rw.command(PRPSQLSTT, |fb| {
                    section.write_pkgnamcsn(fb, ctx.rdb_name)?;
                    if describe_output {
                        fb.write_scalar_u8(RTNSQLDA, TRUE);
                        fb.write_scalar_u8(TYPSQLDA, TYPSQLDA_X_OUTPUT);
                    }
                    Ok(())
                })?;
                if let Some(attributes) = cursor_attributes {
                    rw.sql_attributes(attributes)?;
                }
                rw.sql_statement(sql)
            }
            Self::DescribeInput { section } => write_dscsqlstt(rw, section, TYPSQLDA_X_INPUT, ctx),
            Self::DescribeOutput { section } => {
                write_dscsqlstt(rw, section, TYPSQLDA_X_OUTPUT, ctx)
            }
            Self::Execute {
                section,
                output_expected,
                ..
            } => {
                rw.command(EXCSQLSTT, |fb| {
                    section.write_pkgnamcsn(fb, ctx.rdb_name)?;
                    fb.write_scalar_u8(RDBCMTOK, TRUE);
                    if output_expected {
                        fb.write_scalar_u8(OUTEXP, TRUE);
                    }
                    Ok(())
                })?;
                write_parameters(rw, layout)
            }
            Self::ExecuteCall {
                section,
                procedure_name,
                fetch_size,
                parameters,
            } => {
                if let Some(name) = procedure_name {
                    if name.is_empty() || name.len() > MAX_PROCEDURE_NAME_LENGTH {
                        return Err(usage_err!(
                            "procedure name must have 1 to {MAX_PROCEDURE_NAME_LENGTH} bytes"
                        ));
                    }
                }
                rw.command(EXCSQLSTT, |fb| {
                    section.write_pkgnamcsn(fb, ctx.rdb_name)?;
                    fb.write_scalar_u8(RDBCMTOK, TRUE);
                    if !parameters.is_empty() {
                        fb.write_scalar_u8(OUTEXP, TRUE);
                    }
                    fb.write_scalar_i32(QRYBLKSZ, ctx.query_block_size);
                    fb.write_scalar_i16(MAXBLKEXT, ctx.max_block_extents);
                    fb.write_scalar_i16(MAXRSLCNT, MAXRSLCNT_NOLIMIT);
                    fb.write_scalar_u8(RSLSETFLG, RSLSETFLG_EXTENDED_SQLDA);
                    fb.write_scalar_i32(QRYROWSET, fetch_size.unwrap_or(DEFAULT_FETCH_SIZE));
                    if let Some(name) = procedure_name {
                        fb.write_scalar_string(PRCNAM, name)?;
                    }
                    Ok(())
                })?;
                write_parameters(rw, layout)
            }
            Self::OpenQuery {
                section,
                fetch_size,
                ..
            } => {
                rw.command(OPNQRY, |fb| {
                    section.write_pkgnamcsn(fb, ctx.rdb_name)?;
                    fb.write_scalar_i32(QRYBLKSZ, ctx.query_block_size);
                    if let Some(fetch_size) = fetch_size {
                        fb.write_scalar_i16(MAXBLKEXT, ctx.max_block_extents);
                        fb.write_scalar_i32(QRYROWSET, fetch_size);
                    }
                    if ctx.sqlam >= SQLAM_WITH_QRYCLSIMP {
                        fb.write_scalar_u8(QRYCLSIMP, QRYCLSIMP_YES);
                    }
                    Ok(())
                })?;
                write_parameters(rw, layout)
            }
            Self::ContinueQuery {
                section,
                query_instance_id,
                fetch_size,
                ref decoder,
            } => {
                let has_lobs = decoder.metadata().iter().any(|c| c.length_is_streamed());
                rw.command(CNTQRY, |fb| {
                    section.write_pkgnamcsn(fb, ctx.rdb_name)?;
                    fb.write_scalar_i32(QRYBLKSZ, ctx.query_block_size);
                    if ctx.max_block_extents != 0 {
                        fb.write_scalar_i16(MAXBLKEXT, ctx.max_block_extents);
                    }
                    if has_lobs {
                        fb.write_scalar_u8(RTNEXTDTA, RTNEXTALL);
                    }
                    fb.write_scalar_i64(QRYINSID, i64::from_be_bytes(query_instance_id.to_be_bytes()));
                    if let Some(fetch_size) = fetch_size {
                        fb.write_scalar_i32(QRYROWSET, fetch_size);
                    }
                    Ok(())
                })
            }
            Self::CloseQuery {
                section,
                query_instance_id,
            } => rw.command(CLSQRY, |fb| {
                section.write_pkgnamcsn(fb, ctx.rdb_name)?;
                fb.write_scalar_i64(QRYINSID, i64::from_be_bytes(query_instance_id.to_be_bytes()));
                Ok(())
            }),
            Self::SetSpecialRegisters {
                section,
                statements,
            } => {
                rw.command(EXCSQLSET, |fb| section.write_pkgnamcsn(fb, ctx.rdb_name))?;
                for statement in statements {
                    rw.sql_statement(statement)?;
                }
                Ok(())
            }
            Self::Commit => rw.command(RDBCMM, |_| Ok(())),
            Self::Rollback => rw.command(RDBRLLBCK, |_| Ok(())),
        }
    }

    /// Decodes the reply of this operation, which starts with a new same-id chain.
    fn parse_reply(
        &mut self,
        cursor: &mut ReplyCursor,
        ctx: &OperationContext,
    ) -> DrdaResult<OperationReply> {
        cursor.start_same_id_chain_parse()?;
        let reply = match self {
            Self::ExecuteImmediate { .. } | Self::SetSpecialRegisters { .. } => {
                skip_informational(cursor, &[RDBUPDRM, ENDUOWRM])?;
                OperationReply::Done(parse_sqlcard_or_error(cursor, ctx)?)
            }
            Self::Commit | Self::Rollback | Self::CloseQuery { .. } => {
                skip_informational(cursor, &[ENDUOWRM, RDBUPDRM])?;
                skip_typdefs(cursor)?;
                OperationReply::Done(parse_sqlcard_or_error(cursor, ctx)?)
            }
            Self::Prepare { .. } | Self::DescribeInput { .. } | Self::DescribeOutput { .. } => {
                parse_described(cursor, ctx)?
            }
            Self::Execute { .. } | Self::ExecuteCall { .. } => parse_executed(cursor, ctx)?,
            Self::OpenQuery { described, .. } => {
                let mut updated = skip_informational(cursor, &[RDBUPDRM])?;
                match expect_codepoint(cursor, OPNQRYRM)? {
                    OPNQRYRM => {
                        let query = parse_open_query(cursor, ctx, *described, None)?;
                        if !updated {
                            updated = skip_informational(cursor, &[RDBUPDRM])?;
                        }
                        trace!("query opened, update reported: {updated}");
                        OperationReply::Opened {
                            diagnostics: query.diagnostics.clone(),
                            query: Some(query),
                        }
                    }
                    cp => OperationReply::Opened {
                        diagnostics: parse_error_reply(cursor, cp, ctx)?,
                        query: None,
                    },
                }
            }
            Self::ContinueQuery { decoder, .. } => parse_continued(cursor, ctx, decoder)?,
        };
        cursor.end_of_same_id_chain_data()?;
        if let Some(diagnostics) = reply.diagnostics() {
            debug!("{} reply: {diagnostics}", self.name());
        }
        Ok(reply)
    }
}

/// Writes the operations as one request chain.
///
/// Large-object parameters can be sent while the chain is written,
/// so that all parameter layouts are computed first.
pub(crate) fn write_operations(
    rw: &mut RequestWriter,
    operations: &[Operation],
    ctx: &OperationContext,
) -> DrdaResult<()> {
    let layouts = operations
        .iter()
        .map(|op| op.parameter_layout(ctx))
        .collect::<DrdaResult<Vec<_>>>()?;
    let count = operations.len();
    for (i, (operation, layout)) in operations.iter().zip(&layouts).enumerate() {
        rw.begin_operation(i + 1 == count);
        operation.write(rw, layout.as_ref(), ctx)?;
    }
    Ok(())
}

/// Decodes the replies of the operations, in the order in which they were written.
pub(crate) fn parse_replies(
    cursor: &mut ReplyCursor,
    operations: &mut [Operation],
    ctx: &OperationContext,
) -> DrdaResult<Vec<OperationReply>> {
    let replies = operations
        .iter_mut()
        .map(|op| op.parse_reply(cursor, ctx))
        .collect::<DrdaResult<Vec<_>>>()?;
    cursor.end_of_chain()?;
    Ok(replies)
}

fn write_dscsqlstt(
    rw: &mut RequestWriter,
    section: &Section,
    typsqlda: u8,
    ctx: &OperationContext,
) -> DrdaResult<()> {
    rw.command(DSCSQLSTT, |fb| {
        section.write_pkgnamcsn(fb, ctx.rdb_name)?;
        fb.write_scalar_u8(TYPSQLDA, typsqlda);
        Ok(())
    })
}

fn write_parameters(rw: &mut RequestWriter, layout: Option<&ParameterLayout>) -> DrdaResult<()> {
    match layout {
        Some(layout) => rw.parameters(layout),
        None => Ok(()),
    }
}

// The next codepoint of the current same-id chain, if any.
pub(crate) fn peek(cursor: &mut ReplyCursor) -> DrdaResult<Option<u16>> {
    match cursor.peek_code_point()? {
        Peek::CodePoint(cp) => Ok(Some(cp)),
        Peek::EndOfSameIdChain => Ok(None),
        Peek::EndOfCollection => Err(DrdaError::Impl("unexpected open collection")),
    }
}

// The next codepoint, which must exist.
fn expect_codepoint(cursor: &mut ReplyCursor, expected: u16) -> DrdaResult<u16> {
    peek(cursor)?.ok_or(DrdaError::RequiredObjectNotFound {
        codepoint: expected,
    })
}

// Parses and logs the given informational reply messages; returns true if any was found.
fn skip_informational(cursor: &mut ReplyCursor, codepoints: &[u16]) -> DrdaResult<bool> {
    let mut found = false;
    while let Some(cp) = peek(cursor)? {
        if !codepoints.contains(&cp) {
            break;
        }
        let rm = ReplyMessage::parse(cursor, cp)?;
        debug!("informational reply: {rm}");
        found = true;
    }
    Ok(found)
}

// TYPDEFNAM and TYPDEFOVR can precede reply data objects; their values are not needed,
// since the session works with the representation it asked for.
pub(crate) fn skip_typdefs(cursor: &mut ReplyCursor) -> DrdaResult<Option<u16>> {
    loop {
        match peek(cursor)? {
            Some(cp @ TYPDEFNAM) => {
                let name = cursor.parse_string(cp, 255)?;
                trace!("ignoring TYPDEFNAM {name}");
            }
            Some(cp @ TYPDEFOVR) => {
                let len = cursor.parse_length_and_match(cp)?;
                trace!("ignoring TYPDEFOVR of {len} bytes");
                cursor.skip_bytes(len)?;
            }
            other => return Ok(other),
        }
    }
}

// SQLCARD, or a reply message that stands for an error.
fn parse_sqlcard_or_error(
    cursor: &mut ReplyCursor,
    ctx: &OperationContext,
) -> DrdaResult<Diagnostics> {
    match expect_codepoint(cursor, SQLCARD)? {
        SQLCARD => parse_sqlcard(cursor, ctx.sqlam),
        cp => parse_error_reply(cursor, cp, ctx),
    }
}

/// Handles a reply message in place of the expected reply data.
///
/// ABNUOWRM, SQLERRRM and OPNQFLRM are followed by an SQLCARD and are returned as data;
/// the session remains usable. All other reply messages break the chain.
fn parse_error_reply(
    cursor: &mut ReplyCursor,
    cp: u16,
    ctx: &OperationContext,
) -> DrdaResult<Diagnostics> {
    if !ReplyMessage::is_reply_message(cp) {
        return Err(DrdaError::ObjectNotSupported { codepoint: cp });
    }
    let mut rm = ReplyMessage::parse(cursor, cp)?;
    if matches!(cp, ABNUOWRM | SQLERRRM | OPNQFLRM) {
        skip_typdefs(cursor)?;
        let diagnostics = parse_sqlcard(cursor, ctx.sqlam)?;
        debug!("{} with {diagnostics}", rm.name());
        return Ok(diagnostics);
    }
    if skip_typdefs(cursor)? == Some(SQLCARD) {
        rm.set_diagnostics(parse_sqlcard(cursor, ctx.sqlam)?);
    }
    Err(DrdaError::Reply(rm))
}

// PRPSQLSTT, DSCSQLSTT: [TYPDEFs] SQLDARD or SQLCARD
fn parse_described(cursor: &mut ReplyCursor, ctx: &OperationContext) -> DrdaResult<OperationReply> {
    match skip_typdefs(cursor)? {
        Some(SQLDARD) => {
            let (diagnostics, metadata) = parse_sqldard(cursor, ctx.sqlam)?;
            Ok(OperationReply::Described {
                diagnostics,
                metadata: Some(metadata),
            })
        }
        Some(SQLCARD) => Ok(OperationReply::Described {
            diagnostics: parse_sqlcard(cursor, ctx.sqlam)?,
            metadata: None,
        }),
        Some(cp) => Ok(OperationReply::Described {
            diagnostics: parse_error_reply(cursor, cp, ctx)?,
            metadata: None,
        }),
        None => Err(DrdaError::RequiredObjectNotFound { codepoint: SQLDARD }),
    }
}

// EXCSQLSTT: [RDBUPDRM] [ENDUOWRM], then SQLCARD, SQLDTARD + EXTDTA*,
// or RSLSETRM with the result sets of a procedure call
fn parse_executed(cursor: &mut ReplyCursor, ctx: &OperationContext) -> DrdaResult<OperationReply> {
    skip_informational(cursor, &[RDBUPDRM, ENDUOWRM])?;
    let reply = match skip_typdefs(cursor)? {
        Some(SQLCARD) => OperationReply::Executed {
            diagnostics: parse_sqlcard(cursor, ctx.sqlam)?,
            output: None,
            result_sets: Vec::new(),
        },
        Some(SQLDTARD) => {
            let mut output = parse_sqldtard(cursor, ctx.sqlam)?;
            read_extdta(cursor, &mut output)?;
            let (diagnostics, output) = finish_output(output)?;
            OperationReply::Executed {
                diagnostics,
                output,
                result_sets: Vec::new(),
            }
        }
        Some(RSLSETRM) => parse_procedure_results(cursor, ctx)?,
        Some(cp) => OperationReply::Executed {
            diagnostics: parse_error_reply(cursor, cp, ctx)?,
            output: None,
            result_sets: Vec::new(),
        },
        None => return Err(DrdaError::RequiredObjectNotFound { codepoint: SQLCARD }),
    };
    skip_informational(cursor, &[RDBUPDRM, ENDUOWRM])?;
    Ok(reply)
}

// RSLSETRM, SQLCARD or SQLDTARD, SQLRSLRD, then per result set:
// OPNQRYRM [SQLCARD] [SQLCINRD] QRYDSC QRYDTA* [ENDQRYRM SQLCARD]; EXTDTA* of the output
fn parse_procedure_results(
    cursor: &mut ReplyCursor,
    ctx: &OperationContext,
) -> DrdaResult<OperationReply> {
    let sections = parse_rslsetrm(cursor)?;
    let (mut diagnostics, mut output) = match skip_typdefs(cursor)? {
        Some(SQLCARD) => (Some(parse_sqlcard(cursor, ctx.sqlam)?), None),
        Some(SQLDTARD) => (None, Some(parse_sqldtard(cursor, ctx.sqlam)?)),
        Some(cp) => {
            return Err(DrdaError::UnexpectedCodepoint {
                actual: cp,
                expected: SQLCARD,
            })
        }
        None => return Err(DrdaError::RequiredObjectNotFound { codepoint: SQLCARD }),
    };
    skip_typdefs(cursor)?;
    let infos = parse_sqlrslrd(cursor)?;
    if infos.len() != sections.len() {
        warn!(
            "{} result sets announced, but {} sections sent",
            infos.len(),
            sections.len()
        );
    }

    let mut result_sets = Vec::with_capacity(infos.len());
    let mut sections = sections.into_iter();
    for info in infos {
        skip_typdefs(cursor)?;
        match expect_codepoint(cursor, OPNQRYRM)? {
            OPNQRYRM => {
                let query = parse_open_query(cursor, ctx, None, sections.next())?;
                result_sets.push((info, query));
            }
            cp => {
                return Err(DrdaError::UnexpectedCodepoint {
                    actual: cp,
                    expected: OPNQRYRM,
                })
            }
        }
    }

    let mut output_row = None;
    if let Some(ref mut decoder) = output {
        read_extdta(cursor, decoder)?;
    }
    if let Some(decoder) = output.take() {
        let (output_diagnostics, row) = finish_output(decoder)?;
        diagnostics = Some(output_diagnostics);
        output_row = row;
    }
    Ok(OperationReply::Executed {
        diagnostics: diagnostics.unwrap_or_else(Diagnostics::success),
        output: output_row,
        result_sets,
    })
}

// RSLSETRM: SVRCOD, PKGSNLST with the sections of the returned result sets, SRVDGN
fn parse_rslsetrm(cursor: &mut ReplyCursor) -> DrdaResult<Vec<Section>> {
    let mut sections = Vec::new();
    let mut found = FoundObjects::default();
    cursor.enter_collection(RSLSETRM)?;
    cursor.do_until_collection_end(|c, cp| {
        match cp {
            SVRCOD => {
                found.found(cp)?;
                c.parse_u16(cp)?;
            }
            PKGSNLST => {
                found.found(cp)?;
                c.enter_collection(cp)?;
                c.do_until_collection_end(|c, cp| {
                    if cp != PKGNAMCSN {
                        return Ok(false);
                    }
                    sections.push(Section::parse_pkgnamcsn(c)?);
                    Ok(true)
                })?;
            }
            SRVDGN => {
                found.found(cp)?;
                let len = c.parse_length_and_match(cp)?;
                c.skip_bytes(len)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    found.require(&[SVRCOD, PKGSNLST])?;
    debug!("procedure returned result sets in {} sections", sections.len());
    Ok(sections)
}

// OPNQRYRM [TYPDEFs] [SQLDARD] [SQLCARD] [SQLCINRD] QRYDSC+ QRYDTA* EXTDTA* [SQLCARD]
// [ENDQRYRM [TYPDEFs] SQLCARD]
fn parse_open_query(
    cursor: &mut ReplyCursor,
    ctx: &OperationContext,
    described: Option<&ColumnMetadata>,
    section: Option<Section>,
) -> DrdaResult<OpenedQuery> {
    let attributes = parse_opnqryrm(cursor)?;
    let mut diagnostics = Diagnostics::success();
    let mut described = described.cloned();

    let mut next = peek(cursor)?;
    if next != Some(QRYDSC) {
        next = skip_typdefs(cursor)?;
        if next == Some(SQLDARD) {
            let (_, metadata) = parse_sqldard(cursor, ctx.sqlam)?;
            described = Some(metadata);
            next = skip_typdefs(cursor)?;
        }
        if next == Some(SQLCARD) {
            diagnostics = parse_sqlcard(cursor, ctx.sqlam)?;
            next = skip_typdefs(cursor)?;
        }
        if next == Some(SQLCINRD) {
            described = Some(parse_sqlcinrd(cursor)?);
            next = peek(cursor)?;
        }
    }

    let mut descriptor = Vec::new();
    while next == Some(QRYDSC) {
        let len = cursor.parse_length_and_match(QRYDSC)?;
        descriptor.extend_from_slice(cursor.take(len)?);
        next = peek(cursor)?;
    }
    if descriptor.is_empty() {
        return Err(DrdaError::RequiredObjectNotFound { codepoint: QRYDSC });
    }
    let mut metadata = parse_column_descriptors(&descriptor)?;
    if let Some(ref described) = described {
        metadata.merge_described(described);
    }

    let mut decoder = RowDecoder::new(Arc::new(metadata), ctx.sqlam);
    read_query_data(cursor, &mut decoder)?;
    if peek(cursor)? == Some(SQLCARD) {
        diagnostics = parse_sqlcard(cursor, ctx.sqlam)?;
    }
    let end = if peek(cursor)? == Some(ENDQRYRM) {
        Some(parse_end_query(cursor, ctx)?)
    } else {
        None
    };
    let rows = decoder.decode_rows()?;
    debug!(
        "query {:016X} opened with {} columns, {} rows",
        attributes.query_instance_id,
        decoder.metadata().len(),
        rows.len()
    );
    Ok(OpenedQuery {
        section,
        attributes,
        diagnostics,
        decoder,
        rows,
        end,
    })
}

fn parse_opnqryrm(cursor: &mut ReplyCursor) -> DrdaResult<QueryAttributes> {
    let mut attributes = QueryAttributes {
        protocol_type: 0,
        query_instance_id: 0,
        holdable: false,
        scrollable: false,
        sensitivity: 0,
        updatable: 0,
        rowset: false,
    };
    let mut found = FoundObjects::default();
    cursor.enter_collection(OPNQRYRM)?;
    cursor.do_until_collection_end(|c, cp| {
        match cp {
            SVRCOD => {
                found.found(cp)?;
                c.parse_u16(cp)?;
            }
            QRYPRCTYP => {
                found.found(cp)?;
                attributes.protocol_type = c.parse_u16(cp)?;
            }
            SQLCSRHLD => {
                found.found(cp)?;
                attributes.holdable = c.parse_u8(cp)? == TRUE;
            }
            QRYATTSCR => {
                found.found(cp)?;
                attributes.scrollable = c.parse_u8(cp)? == TRUE;
            }
            QRYATTSNS => {
                found.found(cp)?;
                attributes.sensitivity = c.parse_u8(cp)?;
            }
            QRYATTUPD => {
                found.found(cp)?;
                attributes.updatable = c.parse_u8(cp)?;
            }
            QRYINSID => {
                found.found(cp)?;
                attributes.query_instance_id =
                    u64::from_be_bytes(c.parse_i64(cp)?.to_be_bytes());
            }
            QRYATTSET => {
                found.found(cp)?;
                attributes.rowset = c.parse_u8(cp)? == TRUE;
            }
            SRVDGN => {
                found.found(cp)?;
                let len = c.parse_length_and_match(cp)?;
                c.skip_bytes(len)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    })?;
    found.require(&[SVRCOD, QRYPRCTYP, QRYINSID])?;
    trace!("OPNQRYRM: {attributes:?}");
    Ok(attributes)
}

// ENDQRYRM [TYPDEFs] SQLCARD
fn parse_end_query(cursor: &mut ReplyCursor, ctx: &OperationContext) -> DrdaResult<Diagnostics> {
    let rm = ReplyMessage::parse(cursor, ENDQRYRM)?;
    skip_typdefs(cursor)?;
    let diagnostics = parse_sqlcard(cursor, ctx.sqlam)?;
    debug!("{rm}: query closed by the server, {diagnostics}");
    Ok(diagnostics)
}

// QRYDTA and EXTDTA objects, in any order
fn read_query_data(cursor: &mut ReplyCursor, decoder: &mut RowDecoder) -> DrdaResult<()> {
    loop {
        match peek(cursor)? {
            Some(QRYDTA) => {
                let len = cursor.parse_length_and_match(QRYDTA)?;
                decoder.add_qrydta(cursor.take(len)?);
            }
            Some(EXTDTA) => {
                let len = cursor.parse_length_and_match(EXTDTA)?;
                decoder.add_extdta(cursor.read_bytes(len)?);
            }
            _ => return Ok(()),
        }
    }
}

fn read_extdta(cursor: &mut ReplyCursor, decoder: &mut RowDecoder) -> DrdaResult<()> {
    while peek(cursor)? == Some(EXTDTA) {
        let len = cursor.parse_length_and_match(EXTDTA)?;
        decoder.add_extdta(cursor.read_bytes(len)?);
    }
    Ok(())
}

// CNTQRY: [RDBUPDRM] QRYDTA* EXTDTA* [SQLCARD] [ENDQRYRM SQLCARD]
fn parse_continued(
    cursor: &mut ReplyCursor,
    ctx: &OperationContext,
    decoder: &mut RowDecoder,
) -> DrdaResult<OperationReply> {
    skip_informational(cursor, &[RDBUPDRM])?;
    let mut end = None;
    let mut closed = false;
    read_query_data(cursor, decoder)?;
    match skip_typdefs(cursor)? {
        Some(SQLCARD) => {
            let diagnostics = parse_sqlcard(cursor, ctx.sqlam)?;
            if diagnostics.sqlcode() != 0 {
                end = Some(diagnostics);
            }
        }
        Some(ENDQRYRM) | None => {}
        Some(cp) => {
            end = Some(parse_error_reply(cursor, cp, ctx)?);
            closed = true;
        }
    }
    if peek(cursor)? == Some(ENDQRYRM) {
        end = Some(parse_end_query(cursor, ctx)?);
        closed = true;
    }
    let rows = decoder.decode_rows()?;
    if end.is_none() {
        end = decoder.end_diagnostics().cloned();
    }
    Ok(OperationReply::Fetched { rows, end, closed })
}

// SQLDTARD: FDODSC with the descriptor, FDODTA with the row
fn parse_sqldtard(cursor: &mut ReplyCursor, sqlam: u16) -> DrdaResult<RowDecoder> {
    cursor.enter_collection(SQLDTARD)?;
    let len = cursor.parse_length_and_match(FDODSC)?;
    let metadata = parse_column_descriptors(cursor.take(len)?)?;
    let mut decoder = RowDecoder::new(Arc::new(metadata), sqlam);
    let len = cursor.parse_length_and_match(FDODTA)?;
    decoder.add_qrydta(cursor.take(len)?);
    cursor.leave_collection()?;
    Ok(decoder)
}

// The output row of a procedure call and the diagnostics from its SQLCA.
fn finish_output(mut decoder: RowDecoder) -> DrdaResult<(Diagnostics, Option<Row>)> {
    let row = decoder.decode_rows()?.into_iter().next();
    let diagnostics = match decoder.end_diagnostics() {
        Some(diagnostics) => diagnostics.clone(),
        None => decoder.take_warning().unwrap_or_else(Diagnostics::success),
    };
    if row.is_none() && decoder.has_partial_row() {
        return Err(impl_err!("output row is incomplete"));
    }
    Ok((diagnostics, row))
}
