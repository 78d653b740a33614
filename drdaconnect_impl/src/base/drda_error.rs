use crate::protocol::{
    codepoint,
    parts::{Diagnostics, ReplyMessage},
};
use thiserror::Error;

/// A list specifying categories of [`DrdaError`](crate::DrdaError).
///
/// The variants fall into three groups:
/// protocol violations (the byte stream can no longer be trusted, the session is unusable),
/// negotiation failures (the session could not be established),
/// and operation-level errors (the session stays usable).
/// Use [`DrdaError::is_chain_breaking`] to distinguish them.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DrdaError {
    /// The data stream received from the server is not well-formed.
    #[error("Data stream syntax error (SYNERRCD 0x{code:02X}): {}", syntax_error_text(.code))]
    Syntax {
        /// The DDM syntax error code.
        code: u8,
    },

    /// A codepoint other than the expected one was found.
    #[error(
        "Unexpected codepoint {} (0x{actual:04X}), expected {} (0x{expected:04X})",
        cp_name(.actual),
        cp_name(.expected)
    )]
    UnexpectedCodepoint {
        /// The codepoint that was found.
        actual: u16,
        /// The codepoint that was expected.
        expected: u16,
    },

    /// A parameter within a reply collection is not supported.
    #[error("Parameter {} (0x{codepoint:04X}) is not supported", cp_name(.codepoint))]
    ParameterNotSupported {
        /// The unrecognized codepoint.
        codepoint: u16,
    },

    /// A reply object is not supported.
    #[error("Object {} (0x{codepoint:04X}) is not supported", cp_name(.codepoint))]
    ObjectNotSupported {
        /// The unrecognized codepoint.
        codepoint: u16,
    },

    /// A parameter carries a value that is not supported.
    #[error("Value {value} of parameter {} (0x{codepoint:04X}) is not supported", cp_name(.codepoint))]
    ValueNotSupported {
        /// The codepoint of the parameter.
        codepoint: u16,
        /// The unsupported value.
        value: u32,
    },

    /// A required object is missing in a reply collection.
    #[error("Required object {} (0x{codepoint:04X}) not found", cp_name(.codepoint))]
    RequiredObjectNotFound {
        /// The codepoint of the missing object.
        codepoint: u16,
    },

    /// A reply chain ended in an inconsistent state.
    #[error("Reply chain ended inconsistently: {}", _0)]
    ChainEnd(&'static str),

    /// A column descriptor violates the allowed triplet sequence.
    #[error("Malformed descriptor: triplet type 0x{triplet_type:02X} with id 0x{triplet_id:02X} not allowed here")]
    MalformedDescriptor {
        /// Type of the offending triplet.
        triplet_type: u8,
        /// Id of the offending triplet.
        triplet_id: u8,
    },

    /// The server returned a manager level outside of the acceptable range.
    #[error(
        "Manager level conflict: server returned level {level} for manager {} (0x{manager:04X})",
        cp_name(.manager)
    )]
    ManagerLevelConflict {
        /// The manager's codepoint.
        manager: u16,
        /// The level returned by the server.
        level: u16,
    },

    /// The server does not support the requested security mechanism.
    #[error("Security mechanism 0x{requested:02X} is not supported, server offers {offered:02X?}")]
    SecurityMechanismNotSupported {
        /// The requested mechanism code.
        requested: u16,
        /// The mechanism codes the server offers instead.
        offered: Vec<u16>,
    },

    /// The security check failed.
    #[error("Security check failed: {reason}")]
    SecurityCheck {
        /// The reason reported by the server.
        reason: SecurityCheckReason,
    },

    /// The server did not return the key or seed the security mechanism needs.
    #[error("Security token missing or invalid in server reply")]
    MissingSecurityToken,

    /// The server answered with a reply message that terminates the current reply chain.
    #[error("Server responded with {}", _0)]
    Reply(ReplyMessage),

    /// An operation failed on the server; the diagnostics describe the concrete reason.
    #[error("Database server responded with an error")]
    Sql {
        /// The causing diagnostics.
        #[from]
        source: Diagnostics,
    },

    /// Encryption or decryption of security material failed.
    #[error("Encryption failure: {}", _0)]
    Encryption(&'static str),

    /// Implementation error.
    #[error("Implementation error: {}", _0)]
    Impl(&'static str),

    /// Implementation error.
    #[error("Implementation error: {}", _0)]
    ImplDetailed(String),

    /// Error occured in communication with the database.
    #[error(transparent)]
    Io {
        /// The causing Error.
        #[from]
        source: std::io::Error,
    },

    /// Error caused by wrong usage.
    #[error("Wrong usage: {}", _0)]
    Usage(&'static str),

    /// Error caused by wrong usage.
    #[error("Wrong usage: {}", _0)]
    UsageDetailed(String),

    /// Connection is dead
    #[error("Connection is broken")]
    ConnectionBroken {
        /// The error that broke the connection, if known.
        source: Option<Box<DrdaError>>,
    },
}

/// Abbreviation of `Result<T, DrdaError>`.
pub type DrdaResult<T> = std::result::Result<T, DrdaError>;

impl DrdaError {
    /// Returns the contained `Diagnostics`, if any.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::Sql { source } => Some(source),
            Self::Reply(reply_message) => reply_message.diagnostics(),
            _ => None,
        }
    }

    /// Reveal the inner error
    #[must_use]
    pub fn inner(&self) -> Option<&dyn std::error::Error> {
        match self {
            Self::Sql { source } => Some(source),
            Self::Io { source } => Some(source),
            Self::ConnectionBroken {
                source: Some(source),
            } => Some(&**source),
            _ => None,
        }
    }

    /// Returns a decently formed and hopefully helpful error description.
    #[must_use]
    pub fn display_with_inner(&self) -> String {
        if let Some(e) = self.inner() {
            format!("{}, caused by {:?}", &self, e)
        } else {
            format!("{}", &self)
        }
    }

    /// Returns true if the error leaves the current reply chain unreadable.
    ///
    /// The session must be discarded after such an error.
    #[must_use]
    pub fn is_chain_breaking(&self) -> bool {
        !matches!(
            self,
            Self::Sql { .. } | Self::Usage(_) | Self::UsageDetailed(_)
        )
    }

    /// The SQL state under which the error is reported.
    #[must_use]
    pub fn sqlstate(&self) -> &str {
        match self {
            Self::Syntax { .. }
            | Self::UnexpectedCodepoint { .. }
            | Self::RequiredObjectNotFound { .. }
            | Self::ChainEnd(_)
            | Self::MalformedDescriptor { .. } => "58009",
            Self::ManagerLevelConflict { .. } => "58010",
            Self::ObjectNotSupported { .. } => "58015",
            Self::ParameterNotSupported { .. } => "58016",
            Self::ValueNotSupported { .. } => "58017",
            Self::SecurityMechanismNotSupported { .. }
            | Self::SecurityCheck { .. }
            | Self::MissingSecurityToken
            | Self::Encryption(_) => "08001",
            Self::Reply(reply_message) => reply_message.sqlstate(),
            Self::Sql { source } => source.sqlstate(),
            Self::Io { .. } | Self::ConnectionBroken { .. } => "08006",
            Self::Usage(_) | Self::UsageDetailed(_) => "XJ000",
            Self::Impl(_) | Self::ImplDetailed(_) => "XJ001",
        }
    }

    /// The SQL code under which the error is reported.
    #[must_use]
    pub fn sqlcode(&self) -> i32 {
        match self {
            Self::Sql { source } => source.sqlcode(),
            Self::SecurityMechanismNotSupported { .. }
            | Self::SecurityCheck { .. }
            | Self::MissingSecurityToken => -30082,
            _ => -4499,
        }
    }

    pub(crate) fn syntax(code: u8) -> Self {
        Self::Syntax { code }
    }
}

impl From<crypto_common::InvalidLength> for DrdaError {
    fn from(_error: crypto_common::InvalidLength) -> Self {
        Self::Encryption("invalid key length")
    }
}

/// Reason for a failed security check, as reported by the server.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecurityCheckReason {
    /// The security mechanism is not supported.
    MechanismNotSupported,
    /// The local security service reported a non-retryable error.
    LocalSecurityNonRetryable,
    /// The security token is missing or invalid.
    SecurityTokenInvalid,
    /// The password has expired.
    PasswordExpired,
    /// The password is invalid.
    PasswordInvalid,
    /// The password is missing.
    PasswordMissing,
    /// The user id is missing.
    UseridMissing,
    /// The user id is invalid.
    UseridInvalid,
    /// The user id is revoked.
    UseridRevoked,
    /// The new password is invalid.
    NewPasswordInvalid,
    /// Some other, not further specified reason.
    NotSpecified(u8),
}
impl SecurityCheckReason {
    pub(crate) fn from_secchkcd(secchkcd: u8) -> Self {
        match secchkcd {
            0x01 => Self::MechanismNotSupported,
            0x0A => Self::LocalSecurityNonRetryable,
            0x0B => Self::SecurityTokenInvalid,
            0x0E => Self::PasswordExpired,
            0x0F => Self::PasswordInvalid,
            0x10 => Self::PasswordMissing,
            0x12 => Self::UseridMissing,
            0x13 => Self::UseridInvalid,
            0x14 => Self::UseridRevoked,
            0x15 => Self::NewPasswordInvalid,
            c => Self::NotSpecified(c),
        }
    }
}
impl std::fmt::Display for SecurityCheckReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Self::MechanismNotSupported => write!(f, "security mechanism not supported"),
            Self::LocalSecurityNonRetryable => {
                write!(f, "local security service non-retryable error")
            }
            Self::SecurityTokenInvalid => write!(f, "SECTKN missing or invalid"),
            Self::PasswordExpired => write!(f, "password expired"),
            Self::PasswordInvalid => write!(f, "password invalid"),
            Self::PasswordMissing => write!(f, "password missing"),
            Self::UseridMissing => write!(f, "userid missing"),
            Self::UseridInvalid => write!(f, "userid invalid"),
            Self::UseridRevoked => write!(f, "userid revoked"),
            Self::NewPasswordInvalid => write!(f, "new password invalid"),
            Self::NotSpecified(c) => write!(f, "not specified (SECCHKCD 0x{c:02X})"),
        }
    }
}

fn cp_name(cp: &u16) -> &'static str {
    codepoint::name(*cp)
}

fn syntax_error_text(code: &u8) -> &'static str {
    match *code {
        0x01 => "DSS header length less than 6",
        0x02 => "DSS header length does not match the number of bytes of data found",
        0x03 => "DSS header C-byte not D0",
        0x04 => "DSS header f-bytes either not recognized or not supported",
        0x05 => "DSS continuation specified but not found",
        0x06 => "DSS chaining specified but no DSS found",
        0x07 => "object length less than four",
        0x08 => "object length does not match the number of bytes of data found",
        0x09 => "object length greater than maximum allowed",
        0x0A => "object length less than minimum required",
        0x0B => "object length not allowed",
        0x0C => "incorrect large object extended length field",
        0x0D => "object codepoint index not supported",
        0x0E => "required object not found",
        0x0F => "too many command data objects sent",
        0x10 => "mutually exclusive objects present",
        0x11 => "too few command data objects sent",
        0x12 => "duplicate object present",
        0x13 => "invalid request correlator specified",
        0x14 => "required value not found",
        0x15 => "reserved value not allowed",
        0x16 => "DSS continuation less than or equal to two",
        0x17 => "objects not in required order",
        0x18 => "DSS chaining bit not set, but DSSFMT bit 3 set",
        0x19 => "previous DSS indicated same request correlator, but correlators differ",
        0x1A => "DSS chaining bit not set, but error continuation requested",
        0x1B => "mutually exclusive parameter values specified",
        0x1D => "codepoint not a valid command",
        _ => "unknown syntax error",
    }
}

/// Creates a [`DrdaError::ImplDetailed`] from a format string.
macro_rules! impl_err {
    ($($arg:tt)*) => {{
        $crate::DrdaError::ImplDetailed(format!($($arg)*))
    }};
}

/// Creates a [`DrdaError::UsageDetailed`] from a format string.
macro_rules! usage_err {
    ($($arg:tt)*) => {{
        $crate::DrdaError::UsageDetailed(format!($($arg)*))
    }};
}
