mod authenticator;
mod clear_text;
mod crypto_util;
mod encrypted;
mod password_substitute;
mod security_mechanism;

pub use self::security_mechanism::SecurityMechanism;

pub(crate) use self::{
    authenticator::{authenticator_for, Authenticator, DataCipher},
    crypto_util::TOKEN_LENGTH,
};
