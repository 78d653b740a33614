use crate::{
    protocol::{
        codepoint::{
            self, ABNUOWRM, CMDCHKRM, CMDNSPRM, CODPNT, DTAMCHRM, ENDQRYRM, ENDUOWRM, MGRLVLLS,
            MGRLVLRM, OBJNSPRM, OPNQFLRM, PKGNAMCSN, PRCCNVCD, PRCCNVRM, QRYNOPRM, QRYPOPRM,
            RDBACCRM, RDBAFLRM, RDBATHRM, RDBNACRM, RDBNAM, RDBNFNRM, RDBUPDRM, SQLERRRM, SRVDGN,
            SVRCOD, SYNERRCD, SYNTAXRM, UOWDSP, VALNSPRM,
        },
        parts::Diagnostics,
        reply::{FoundObjects, ReplyCursor},
    },
    DrdaError, DrdaResult,
};

/// Severity code of a reply message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Svrcod {
    /// Information only.
    Info,
    /// The command was processed, but with a warning.
    Warning,
    /// The command was not processed.
    Error,
    /// Severe error; the state of the conversation is uncertain.
    Severe,
    /// Damage to the accessed resource.
    AccessDamage,
    /// Permanent damage to the accessed resource.
    PermanentDamage,
    /// The session is damaged and must be terminated.
    SessionDamage,
}
impl Svrcod {
    pub(crate) fn from_u16(value: u16) -> DrdaResult<Self> {
        Ok(match value {
            0 => Self::Info,
            4 => Self::Warning,
            8 => Self::Error,
            16 => Self::Severe,
            20 => Self::AccessDamage,
            24 => Self::PermanentDamage,
            28 => Self::SessionDamage,
            v => {
                return Err(DrdaError::ValueNotSupported {
                    codepoint: SVRCOD,
                    value: u32::from(v),
                })
            }
        })
    }

    /// Returns the numeric encoding.
    #[must_use]
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Info => 0,
            Self::Warning => 4,
            Self::Error => 8,
            Self::Severe => 16,
            Self::AccessDamage => 20,
            Self::PermanentDamage => 24,
            Self::SessionDamage => 28,
        }
    }

    // The severities a reply message may carry.
    fn allowed_range(reply_codepoint: u16) -> (Self, Self) {
        match reply_codepoint {
            ENDUOWRM => (Self::Warning, Self::Warning),
            CMDCHKRM => (Self::Info, Self::SessionDamage),
            PRCCNVRM => (Self::Error, Self::SessionDamage),
            OBJNSPRM => (Self::Error, Self::Severe),
            CMDNSPRM | ENDQRYRM => (Self::Warning, Self::Error),
            RDBUPDRM => (Self::Info, Self::Info),
            SQLERRRM => (Self::Error, Self::SessionDamage),
            _ => (Self::Error, Self::Error),
        }
    }
}
impl std::fmt::Display for Svrcod {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.to_u16())
    }
}

/// A DDM reply message, as sent by the server to report on the processing of a command.
///
/// Most reply messages end the current reply chain and are returned as
/// [`DrdaError::Reply`]; some (like ENDUOWRM or RDBUPDRM) are informational.
#[derive(Clone)]
pub struct ReplyMessage {
    codepoint: u16,
    svrcod: Svrcod,
    rdbnam: Option<String>,
    srvdgn: Option<Vec<u8>>,
    codpnt: Option<u16>,
    synerrcd: Option<u8>,
    prccnvcd: Option<u8>,
    uowdsp: Option<u8>,
    manager_levels: Vec<(u16, u16)>,
    diagnostics: Option<Diagnostics>,
}

impl ReplyMessage {
    /// The codepoint of the reply message.
    #[must_use]
    pub fn codepoint(&self) -> u16 {
        self.codepoint
    }
    /// The name of the reply message.
    #[must_use]
    pub fn name(&self) -> &'static str {
        codepoint::name(self.codepoint)
    }
    /// The severity code.
    #[must_use]
    pub fn svrcod(&self) -> Svrcod {
        self.svrcod
    }
    /// The database name, if the server sent one.
    #[must_use]
    pub fn rdbnam(&self) -> Option<&str> {
        self.rdbnam.as_deref()
    }
    /// The codepoint the message refers to (CMDNSPRM, OBJNSPRM, VALNSPRM, SYNTAXRM).
    #[must_use]
    pub fn codpnt(&self) -> Option<u16> {
        self.codpnt
    }
    /// The syntax error code of a SYNTAXRM.
    #[must_use]
    pub fn synerrcd(&self) -> Option<u8> {
        self.synerrcd
    }
    /// The conversational protocol error code of a PRCCNVRM.
    #[must_use]
    pub fn prccnvcd(&self) -> Option<u8> {
        self.prccnvcd
    }
    /// The unit-of-work disposition of an ENDUOWRM: 1 is commit, 2 is rollback.
    #[must_use]
    pub fn uowdsp(&self) -> Option<u8> {
        self.uowdsp
    }
    /// The manager levels the server reports in a MGRLVLRM.
    #[must_use]
    pub fn manager_levels(&self) -> &[(u16, u16)] {
        &self.manager_levels
    }
    /// The diagnostics that the server sent together with the reply message.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        self.diagnostics.as_ref()
    }

    pub(crate) fn set_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.diagnostics = Some(diagnostics);
    }

    /// The SQL state under which the message is reported.
    #[must_use]
    pub fn sqlstate(&self) -> &str {
        if let Some(ref diagnostics) = self.diagnostics {
            if self.codepoint == SQLERRRM {
                return diagnostics.sqlstate();
            }
        }
        match self.codepoint {
            CMDNSPRM => "58014",
            OBJNSPRM => "58015",
            VALNSPRM => "58017",
            MGRLVLRM => "58010",
            RDBNFNRM | RDBATHRM | RDBAFLRM => "08004",
            ENDUOWRM | RDBUPDRM => "00000",
            _ => "58009",
        }
    }

    /// True if `cp` is a reply message that this type can decode.
    pub(crate) fn is_reply_message(cp: u16) -> bool {
        matches!(
            cp,
            ABNUOWRM
                | CMDCHKRM
                | CMDNSPRM
                | DTAMCHRM
                | ENDQRYRM
                | ENDUOWRM
                | MGRLVLRM
                | OBJNSPRM
                | OPNQFLRM
                | PRCCNVRM
                | QRYNOPRM
                | QRYPOPRM
                | RDBACCRM
                | RDBAFLRM
                | RDBATHRM
                | RDBNACRM
                | RDBNFNRM
                | RDBUPDRM
                | SQLERRRM
                | SYNTAXRM
                | VALNSPRM
        )
    }

    /// Parses the reply message with the given codepoint.
    pub(crate) fn parse(cursor: &mut ReplyCursor, rm_codepoint: u16) -> DrdaResult<Self> {
        let mut rm = Self {
            codepoint: rm_codepoint,
            svrcod: Svrcod::Info,
            rdbnam: None,
            srvdgn: None,
            codpnt: None,
            synerrcd: None,
            prccnvcd: None,
            uowdsp: None,
            manager_levels: Vec::new(),
            diagnostics: None,
        };
        let mut found = FoundObjects::default();
        cursor.enter_collection(rm_codepoint)?;
        cursor.do_until_collection_end(|c, cp| {
            match cp {
                SVRCOD => {
                    found.found(cp)?;
                    rm.svrcod = parse_svrcod(c, rm_codepoint)?;
                }
                RDBNAM => {
                    found.found(cp)?;
                    rm.rdbnam = Some(c.parse_string(cp, 255)?);
                }
                SRVDGN => {
                    found.found(cp)?;
                    rm.srvdgn = Some(c.parse_bytes(cp, 0, 32_763)?);
                }
                CODPNT => {
                    found.found(cp)?;
                    rm.codpnt = Some(c.parse_u16(cp)?);
                }
                SYNERRCD => {
                    found.found(cp)?;
                    rm.synerrcd = Some(c.parse_u8(cp)?);
                }
                PRCCNVCD => {
                    found.found(cp)?;
                    rm.prccnvcd = Some(c.parse_u8(cp)?);
                }
                UOWDSP => {
                    found.found(cp)?;
                    rm.uowdsp = Some(c.parse_u8(cp)?);
                }
                PKGNAMCSN => {
                    // the section of a query that is already open
                    found.found(cp)?;
                    let len = c.parse_length_and_match(cp)?;
                    c.skip_bytes(len)?;
                }
                MGRLVLLS => {
                    found.found(cp)?;
                    let len = c.parse_length_and_match(cp)?;
                    if len == 0 || len % 4 != 0 {
                        return Err(DrdaError::syntax(codepoint::SYNERRCD_OBJ_LEN_NOT_ALLOWED));
                    }
                    for _ in 0..len / 4 {
                        let manager = c.read_u16()?;
                        let level = c.read_u16()?;
                        rm.manager_levels.push((manager, level));
                    }
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        found.require(&required_objects(rm_codepoint))?;
        debug!("ReplyMessage::parse(): {rm}");
        Ok(rm)
    }
}

fn parse_svrcod(cursor: &mut ReplyCursor, rm_codepoint: u16) -> DrdaResult<Svrcod> {
    let value = cursor.parse_u16(SVRCOD)?;
    let svrcod = Svrcod::from_u16(value)?;
    let (min, max) = Svrcod::allowed_range(rm_codepoint);
    if svrcod < min || svrcod > max {
        return Err(DrdaError::ValueNotSupported {
            codepoint: SVRCOD,
            value: u32::from(value),
        });
    }
    Ok(svrcod)
}

fn required_objects(rm_codepoint: u16) -> Vec<u16> {
    match rm_codepoint {
        CMDNSPRM | OBJNSPRM | VALNSPRM => vec![SVRCOD, CODPNT],
        PRCCNVRM => vec![SVRCOD, PRCCNVCD],
        SYNTAXRM => vec![SVRCOD, SYNERRCD],
        MGRLVLRM => vec![SVRCOD, MGRLVLLS],
        ENDUOWRM => vec![SVRCOD, UOWDSP],
        RDBNACRM | RDBNFNRM | RDBATHRM | RDBAFLRM | ABNUOWRM | OPNQFLRM => vec![SVRCOD, RDBNAM],
        _ => vec![SVRCOD],
    }
}

impl std::fmt::Display for ReplyMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} (severity {})", self.name(), self.svrcod)?;
        if let Some(cp) = self.codpnt {
            write!(f, ", codepoint {} (0x{cp:04X})", codepoint::name(cp))?;
        }
        if let Some(code) = self.synerrcd {
            write!(f, ", SYNERRCD 0x{code:02X}")?;
        }
        if let Some(code) = self.prccnvcd {
            write!(f, ", PRCCNVCD 0x{code:02X}")?;
        }
        if let Some(ref rdbnam) = self.rdbnam {
            write!(f, ", database {rdbnam}")?;
        }
        if let Some(ref diagnostics) = self.diagnostics {
            write!(f, ", {diagnostics}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReplyMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{self}")?;
        if let Some(ref srvdgn) = self.srvdgn {
            write!(f, ", SRVDGN {}", hex::encode(srvdgn))?;
        }
        Ok(())
    }
}
