use crate::{
    conn::Session,
    protocol::{
        operation::{
            parse_replies, write_operations, OpenedQuery, Operation, OperationReply,
            QueryAttributes,
        },
        parts::{ColumnMetadata, Diagnostics, Parameter, ResultSetInfo, Row, RowDecoder},
        section::{Section, SectionManager},
    },
    DrdaError, DrdaResult,
};

/// A statement that was prepared on the server, in its own section.
///
/// If the server rejected the statement, the section is already released,
/// and [`Prepared::diagnostics`] tells why.
#[derive(Debug)]
pub struct Prepared {
    section: Option<Section>,
    sql: String,
    diagnostics: Diagnostics,
    parameter_metadata: Option<ColumnMetadata>,
    result_metadata: Option<ColumnMetadata>,
}
impl Prepared {
    /// The statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }
    /// True if the server accepted the statement.
    pub fn is_valid(&self) -> bool {
        self.section.is_some()
    }
    /// The diagnostics of the preparation.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
    /// The section of the statement.
    pub fn section(&self) -> Option<&Section> {
        self.section.as_ref()
    }
    /// Description of the input parameters, if the statement has some.
    pub fn parameter_metadata(&self) -> Option<&ColumnMetadata> {
        self.parameter_metadata.as_ref()
    }
    /// Description of the result columns, if the statement is a query.
    pub fn result_metadata(&self) -> Option<&ColumnMetadata> {
        self.result_metadata.as_ref()
    }

    fn valid_section(&self) -> DrdaResult<&Section> {
        self.section
            .as_ref()
            .ok_or(DrdaError::Usage("statement was not prepared successfully"))
    }
}

/// An open cursor on the server.
///
/// Further rows are fetched with [`Session::fetch`]; a query that is not at its end
/// should be closed with [`Session::close_query`].
#[derive(Debug)]
pub struct Query {
    section: Section,
    attributes: QueryAttributes,
    decoder: RowDecoder,
    fetch_size: Option<i32>,
    end: Option<Diagnostics>,
    closed: bool,
}
impl Query {
    fn new(
        default_section: &Section,
        opened: OpenedQuery,
        fetch_size: Option<i32>,
    ) -> (Self, Vec<Row>, Diagnostics) {
        let OpenedQuery {
            section,
            attributes,
            diagnostics,
            decoder,
            rows,
            end,
        } = opened;
        let closed = end.is_some();
        let end = end.or_else(|| decoder.end_diagnostics().cloned());
        let query = Self {
            section: section.unwrap_or_else(|| default_section.clone()),
            attributes,
            decoder,
            fetch_size,
            end,
            closed,
        };
        (query, rows, diagnostics)
    }

    /// The server's id of the query instance.
    pub fn query_instance_id(&self) -> u64 {
        self.attributes.query_instance_id
    }
    /// The description of the columns.
    pub fn metadata(&self) -> &ColumnMetadata {
        self.decoder.metadata()
    }
    /// The section the query runs in.
    pub fn section(&self) -> &Section {
        &self.section
    }
    /// True if the cursor survives a commit.
    pub fn is_holdable(&self) -> bool {
        self.attributes.holdable
    }
    /// True for a scrollable cursor.
    pub fn is_scrollable(&self) -> bool {
        self.attributes.scrollable
    }
    /// True if all rows were delivered, or the query ended with an error.
    pub fn is_at_end(&self) -> bool {
        self.end.is_some()
    }
    /// True if the server closed the query.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
    /// The diagnostics that ended the query.
    pub fn end_diagnostics(&self) -> Option<&Diagnostics> {
        self.end.as_ref()
    }
}

/// The result of opening a query: the first rows, and the query for fetching more.
#[derive(Debug)]
pub struct QueryOutcome {
    diagnostics: Diagnostics,
    rows: Vec<Row>,
    query: Option<Query>,
}
impl QueryOutcome {
    /// The diagnostics of the open; an error means that no query exists.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
    /// The rows that came with the open.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
    /// The open query.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }
    /// Diagnostics, rows, and the query.
    pub fn into_parts(self) -> (Diagnostics, Vec<Row>, Option<Query>) {
        (self.diagnostics, self.rows, self.query)
    }
}

/// The result of executing a prepared statement or a procedure call.
#[derive(Debug)]
pub struct StatementOutcome {
    diagnostics: Diagnostics,
    output: Option<Row>,
    result_sets: Vec<(ResultSetInfo, QueryOutcome)>,
}
impl StatementOutcome {
    /// The diagnostics of the execution.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
    /// The number of affected rows.
    pub fn row_count(&self) -> i64 {
        self.diagnostics.row_count()
    }
    /// The output parameters of a procedure call.
    pub fn output(&self) -> Option<&Row> {
        self.output.as_ref()
    }
    /// The result sets a procedure returned.
    pub fn result_sets(&self) -> &[(ResultSetInfo, QueryOutcome)] {
        &self.result_sets
    }
    /// Diagnostics, output parameters, and result sets.
    pub fn into_parts(self) -> (Diagnostics, Option<Row>, Vec<(ResultSetInfo, QueryOutcome)>) {
        (self.diagnostics, self.output, self.result_sets)
    }
}

impl Session {
    /// Executes a statement without parameters and without result set.
    ///
    /// SQL errors are returned as diagnostics; see [`Diagnostics::into_result`].
    pub fn execute_immediate(&mut self, sql: &str) -> DrdaResult<Diagnostics> {
        let section = SectionManager::immediate_section(false);
        let mut operations = [Operation::ExecuteImmediate {
            section: &section,
            sql,
        }];
        done(self.run_operations(&mut operations)?)
    }

    /// Prepares a statement and describes its parameters and result columns.
    ///
    /// `cursor_attributes` (e.g. `"FOR READ ONLY"`) are sent as SQLATTR.
    pub fn prepare(&mut self, sql: &str, cursor_attributes: Option<&str>) -> DrdaResult<Prepared> {
        self.check_open()?;
        let section = self.sections.allocate(false)?;
        let mut operations = [
            Operation::Prepare {
                section: &section,
                sql,
                describe_output: true,
                cursor_attributes,
            },
            Operation::DescribeInput { section: &section },
        ];
        let replies = match self.run_operations(&mut operations) {
            Ok(replies) => replies,
            Err(e) => {
                self.sections.free(&section);
                return Err(e);
            }
        };
        let mut replies = replies.into_iter();
        let (diagnostics, result_metadata) = described(replies.next())?;
        let (input_diagnostics, parameter_metadata) = described(replies.next())?;

        if diagnostics.sqlcode() < 0 {
            debug!("statement rejected: {diagnostics}");
            self.sections.free(&section);
            return Ok(Prepared {
                section: None,
                sql: sql.to_string(),
                diagnostics,
                parameter_metadata: None,
                result_metadata: None,
            });
        }
        if input_diagnostics.sqlcode() != 0 {
            debug!("describe input: {input_diagnostics}");
        }
        trace!("prepared in section {section}");
        Ok(Prepared {
            section: Some(section),
            sql: sql.to_string(),
            diagnostics,
            parameter_metadata: parameter_metadata.filter(|m| !m.is_empty()),
            result_metadata: result_metadata.filter(|m| !m.is_empty()),
        })
    }

    /// Describes the result columns of a prepared statement again.
    pub fn describe_output(&mut self, prepared: &mut Prepared) -> DrdaResult<Diagnostics> {
        let section = prepared.valid_section()?.clone();
        let mut operations = [Operation::DescribeOutput { section: &section }];
        let replies = self.run_operations(&mut operations)?;
        let (diagnostics, metadata) = described(replies.into_iter().next())?;
        if metadata.is_some() {
            prepared.result_metadata = metadata.filter(|m| !m.is_empty());
        }
        Ok(diagnostics)
    }

    /// Describes the input parameters of a prepared statement again.
    pub fn describe_input(&mut self, prepared: &mut Prepared) -> DrdaResult<Diagnostics> {
        let section = prepared.valid_section()?.clone();
        let mut operations = [Operation::DescribeInput { section: &section }];
        let replies = self.run_operations(&mut operations)?;
        let (diagnostics, metadata) = described(replies.into_iter().next())?;
        if metadata.is_some() {
            prepared.parameter_metadata = metadata.filter(|m| !m.is_empty());
        }
        Ok(diagnostics)
    }

    /// Executes a prepared statement that is not a query.
    pub fn execute(
        &mut self,
        prepared: &Prepared,
        parameters: &[Parameter],
    ) -> DrdaResult<StatementOutcome> {
        let section = prepared.valid_section()?;
        let mut operations = [Operation::Execute {
            section,
            parameters,
            output_expected: false,
        }];
        let replies = self.run_operations(&mut operations)?;
        executed(section, replies, None)
    }

    /// Executes a prepared procedure call, which can return output parameters and result sets.
    pub fn execute_call(
        &mut self,
        prepared: &Prepared,
        procedure_name: Option<&str>,
        parameters: &[Parameter],
        fetch_size: Option<i32>,
    ) -> DrdaResult<StatementOutcome> {
        let section = prepared.valid_section()?;
        let mut operations = [Operation::ExecuteCall {
            section,
            procedure_name,
            parameters,
            fetch_size,
        }];
        let replies = self.run_operations(&mut operations)?;
        executed(section, replies, fetch_size)
    }

    /// Opens a cursor on a prepared query.
    ///
    /// `fetch_size` is the number of rows the server sends per reply; without it,
    /// the server fills whole query blocks.
    pub fn open_query(
        &mut self,
        prepared: &Prepared,
        parameters: &[Parameter],
        fetch_size: Option<i32>,
    ) -> DrdaResult<QueryOutcome> {
        let section = prepared.valid_section()?;
        let mut operations = [Operation::OpenQuery {
            section,
            parameters,
            fetch_size,
            described: prepared.result_metadata(),
        }];
        let replies = self.run_operations(&mut operations)?;
        match replies.into_iter().next() {
            Some(OperationReply::Opened {
                diagnostics,
                query: None,
            }) => Ok(QueryOutcome {
                diagnostics,
                rows: Vec::new(),
                query: None,
            }),
            Some(OperationReply::Opened {
                query: Some(opened),
                ..
            }) => {
                let (query, rows, diagnostics) = Query::new(section, opened, fetch_size);
                Ok(QueryOutcome {
                    diagnostics,
                    rows,
                    query: Some(query),
                })
            }
            _ => Err(DrdaError::Impl("unexpected reply to OPNQRY")),
        }
    }

    /// Fetches the next rows of a query; returns an empty list at the end of the query.
    pub fn fetch(&mut self, query: &mut Query) -> DrdaResult<Vec<Row>> {
        if query.end.is_some() || query.closed {
            return Ok(Vec::new());
        }
        let mut operations = [Operation::ContinueQuery {
            section: &query.section,
            query_instance_id: query.attributes.query_instance_id,
            fetch_size: query.fetch_size,
            decoder: &mut query.decoder,
        }];
        match self.run_operations(&mut operations)?.into_iter().next() {
            Some(OperationReply::Fetched { rows, end, closed }) => {
                query.end = end;
                query.closed |= closed;
                Ok(rows)
            }
            _ => Err(DrdaError::Impl("unexpected reply to CNTQRY")),
        }
    }

    /// Closes a query; nothing is sent if the server closed it already.
    pub fn close_query(&mut self, query: Query) -> DrdaResult<Diagnostics> {
        if query.closed {
            return Ok(query.end.unwrap_or_else(Diagnostics::success));
        }
        let mut operations = [Operation::CloseQuery {
            section: &query.section,
            query_instance_id: query.attributes.query_instance_id,
        }];
        done(self.run_operations(&mut operations)?)
    }

    /// Releases the section of a prepared statement for reuse.
    pub fn close_statement(&mut self, prepared: Prepared) {
        if let Some(ref section) = prepared.section {
            self.sections.free(section);
        }
    }

    /// Sets special registers, e.g. `SET CURRENT SCHEMA = APP`.
    pub fn set_special_registers(&mut self, statements: &[&str]) -> DrdaResult<Diagnostics> {
        let section = SectionManager::immediate_section(false);
        let mut operations = [Operation::SetSpecialRegisters {
            section: &section,
            statements,
        }];
        done(self.run_operations(&mut operations)?)
    }

    /// Commits the current unit of work.
    pub fn commit(&mut self) -> DrdaResult<Diagnostics> {
        done(self.run_operations(&mut [Operation::Commit])?)
    }

    /// Rolls back the current unit of work.
    pub fn rollback(&mut self) -> DrdaResult<Diagnostics> {
        done(self.run_operations(&mut [Operation::Rollback])?)
    }

    // Sends the operations as one request chain, and decodes their replies.
    fn run_operations(&mut self, operations: &mut [Operation]) -> DrdaResult<Vec<OperationReply>> {
        self.check_open()?;
        let rdb_name = self.connect_params().dbname().to_string();
        let ctx = self.operation_context(&rdb_name);
        let mut cursor = self.roundtrip(true, |rw| write_operations(rw, operations, &ctx))?;
        parse_replies(&mut cursor, operations, &ctx).map_err(|e| self.fail(e))
    }
}

fn done(replies: Vec<OperationReply>) -> DrdaResult<Diagnostics> {
    match replies.into_iter().next() {
        Some(OperationReply::Done(diagnostics)) => Ok(diagnostics),
        _ => Err(DrdaError::Impl("unexpected operation reply")),
    }
}

fn described(
    reply: Option<OperationReply>,
) -> DrdaResult<(Diagnostics, Option<ColumnMetadata>)> {
    match reply {
        Some(OperationReply::Described {
            diagnostics,
            metadata,
        }) => Ok((diagnostics, metadata)),
        _ => Err(DrdaError::Impl("unexpected reply to a describe")),
    }
}

fn executed(
    section: &Section,
    replies: Vec<OperationReply>,
    fetch_size: Option<i32>,
) -> DrdaResult<StatementOutcome> {
    match replies.into_iter().next() {
        Some(OperationReply::Executed {
            diagnostics,
            output,
            result_sets,
        }) => Ok(StatementOutcome {
            diagnostics,
            output,
            result_sets: result_sets
                .into_iter()
                .map(|(info, opened)| {
                    let (query, rows, diagnostics) = Query::new(section, opened, fetch_size);
                    (
                        info,
                        QueryOutcome {
                            diagnostics,
                            rows,
                            query: Some(query),
                        },
                    )
                })
                .collect(),
        }),
        _ => Err(DrdaError::Impl("unexpected reply to EXCSQLSTT")),
    }
}
