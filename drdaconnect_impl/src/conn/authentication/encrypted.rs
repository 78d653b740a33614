use super::{
    authenticator::{required_password, DataCipher, SecurityCheckData},
    crypto_util::{self, KeyPair},
    Authenticator, SecurityMechanism,
};
use crate::{DrdaError, DrdaResult};
use secstr::{SecUtf8, SecVec};

// USRENCPWD, EUSRIDPWD, EUSRIDDTA, EUSRPWDDTA: a Diffie-Hellman exchange with ACCSEC
// provides the DES key; credentials (and for the DTA mechanisms all data) are encrypted.
pub(crate) struct Encrypted {
    mechanism: SecurityMechanism,
    key_pair: KeyPair,
    session_key: Option<(SecVec<u8>, [u8; 8])>,
}
impl Encrypted {
    pub(crate) fn boxed_authenticator(
        mechanism: SecurityMechanism,
    ) -> Box<dyn Authenticator + Send + Sync> {
        let key_pair = KeyPair::generate();
        trace!("generated {key_pair:?} for {mechanism}");
        Box::new(Self {
            mechanism,
            key_pair,
            session_key: None,
        })
    }

    fn key_and_iv(&self) -> DrdaResult<([u8; 8], [u8; 8])> {
        let (key, iv) = self
            .session_key
            .as_ref()
            .ok_or(DrdaError::MissingSecurityToken)?;
        let key = key
            .unsecure()
            .try_into()
            .map_err(|_| DrdaError::Encryption("invalid key length"))?;
        Ok((key, *iv))
    }
}

// With USRENCPWD, the clear user id, blank-padded to 8 bytes, serves as IV.
fn user_iv(user: &str) -> [u8; 8] {
    let mut iv = [b' '; 8];
    for (target, source) in iv.iter_mut().zip(user.as_bytes()) {
        *target = *source;
    }
    iv
}

impl Authenticator for Encrypted {
    fn mechanism(&self) -> SecurityMechanism {
        self.mechanism
    }

    fn client_token(&self) -> Option<&[u8]> {
        Some(self.key_pair.public_key())
    }

    fn accept_server_token(&mut self, server_token: &[u8]) -> DrdaResult<()> {
        let shared = self.key_pair.shared_secret(server_token)?;
        let key = crypto_util::des_key(shared.unsecure())?;
        let iv = crypto_util::middle_eight(server_token)?;
        self.session_key = Some((SecVec::from(key.to_vec()), iv));
        Ok(())
    }

    fn security_check_data(
        &self,
        user: &str,
        password: Option<&SecUtf8>,
    ) -> DrdaResult<SecurityCheckData> {
        let (key, iv) = self.key_and_iv()?;
        let encrypt = |plain: &[u8], iv: &[u8; 8]| {
            crypto_util::des_cbc_encrypt(&key, iv, plain).map(SecVec::from)
        };
        Ok(match self.mechanism {
            SecurityMechanism::EncryptedPassword => SecurityCheckData {
                user: Some(user.to_string()),
                password: None,
                tokens: vec![encrypt(required_password(password)?, &user_iv(user))?],
            },
            SecurityMechanism::EncryptedUserIdData => SecurityCheckData {
                user: None,
                password: None,
                tokens: vec![encrypt(user.as_bytes(), &iv)?],
            },
            _ => SecurityCheckData {
                user: None,
                password: None,
                tokens: vec![
                    encrypt(user.as_bytes(), &iv)?,
                    encrypt(required_password(password)?, &iv)?,
                ],
            },
        })
    }

    fn data_cipher(&self) -> DrdaResult<Option<DataCipher>> {
        if !self.mechanism.encrypts_data() {
            return Ok(None);
        }
        let (key, iv) = self.key_and_iv()?;
        Ok(Some(DataCipher::new(key, iv)))
    }
}
