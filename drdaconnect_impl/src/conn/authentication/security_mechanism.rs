use crate::{DrdaError, DrdaResult};

/// The security mechanisms (SECMEC) with which a session can authenticate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SecurityMechanism {
    /// User id and password, both in clear text.
    #[default]
    UserIdPassword,
    /// User id only.
    UserIdOnly,
    /// User id in clear text, password encrypted with a key from a Diffie-Hellman exchange.
    EncryptedPassword,
    /// User id in clear text, and a strong password substitute computed from two seeds.
    PasswordSubstitute,
    /// User id and password, both encrypted.
    EncryptedUserIdPassword,
    /// Encrypted user id, and encrypted command and reply data.
    EncryptedUserIdData,
    /// Encrypted user id and password, and encrypted command and reply data.
    EncryptedUserIdPasswordData,
}

impl SecurityMechanism {
    /// The SECMEC code.
    pub fn code(self) -> u16 {
        match self {
            Self::UserIdPassword => 3,
            Self::UserIdOnly => 4,
            Self::EncryptedPassword => 7,
            Self::PasswordSubstitute => 8,
            Self::EncryptedUserIdPassword => 9,
            Self::EncryptedUserIdData => 12,
            Self::EncryptedUserIdPasswordData => 13,
        }
    }

    pub(crate) fn from_code(code: u16) -> DrdaResult<Self> {
        Ok(match code {
            3 => Self::UserIdPassword,
            4 => Self::UserIdOnly,
            7 => Self::EncryptedPassword,
            8 => Self::PasswordSubstitute,
            9 => Self::EncryptedUserIdPassword,
            12 => Self::EncryptedUserIdData,
            13 => Self::EncryptedUserIdPasswordData,
            c => {
                return Err(DrdaError::ValueNotSupported {
                    codepoint: crate::protocol::codepoint::SECMEC,
                    value: u32::from(c),
                })
            }
        })
    }

    /// Whether a key or seed is exchanged with ACCSEC before the credentials flow.
    pub fn exchanges_token(self) -> bool {
        !matches!(self, Self::UserIdPassword | Self::UserIdOnly)
    }

    /// Whether command and reply data are encrypted.
    pub fn encrypts_data(self) -> bool {
        matches!(
            self,
            Self::EncryptedUserIdData | Self::EncryptedUserIdPasswordData
        )
    }

    /// Whether the mechanism needs a password.
    pub fn needs_password(self) -> bool {
        !matches!(self, Self::UserIdOnly | Self::EncryptedUserIdData)
    }
}

impl std::fmt::Display for SecurityMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::UserIdPassword => "USRIDPWD",
            Self::UserIdOnly => "USRIDONL",
            Self::EncryptedPassword => "USRENCPWD",
            Self::PasswordSubstitute => "USRSSBPWD",
            Self::EncryptedUserIdPassword => "EUSRIDPWD",
            Self::EncryptedUserIdData => "EUSRIDDTA",
            Self::EncryptedUserIdPasswordData => "EUSRPWDDTA",
        };
        write!(f, "{name} ({})", self.code())
    }
}

#[cfg(test)]
mod test {
    use super::SecurityMechanism;

    #[test]
    fn test_codes() {
        for code in [3, 4, 7, 8, 9, 12, 13] {
            assert_eq!(SecurityMechanism::from_code(code).unwrap().code(), code);
        }
        assert!(SecurityMechanism::from_code(5).is_err());
        assert!(!SecurityMechanism::UserIdPassword.exchanges_token());
        assert!(SecurityMechanism::PasswordSubstitute.exchanges_token());
        assert!(SecurityMechanism::EncryptedUserIdData.encrypts_data());
        assert!(!SecurityMechanism::EncryptedUserIdData.needs_password());
    }
}
