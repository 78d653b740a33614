use super::{
    clear_text::ClearText, crypto_util, encrypted::Encrypted,
    password_substitute::PasswordSubstitute, SecurityMechanism,
};
use crate::{protocol::request::Credentials, DrdaError, DrdaResult};
use secstr::{SecUtf8, SecVec};

// One authenticator serves one run of the handshake; a session reset creates a new one,
// so that keys and seeds are never reused.
pub(crate) trait Authenticator: Send + Sync {
    fn mechanism(&self) -> SecurityMechanism;

    /// The public key or seed that is sent with ACCSEC.
    fn client_token(&self) -> Option<&[u8]>;

    /// Takes the server's public key or seed from ACCSECRD.
    fn accept_server_token(&mut self, server_token: &[u8]) -> DrdaResult<()>;

    /// The credentials for SECCHK, in the form the mechanism requires.
    fn security_check_data(
        &self,
        user: &str,
        password: Option<&SecUtf8>,
    ) -> DrdaResult<SecurityCheckData>;

    /// The cipher for command and reply data, if the mechanism encrypts data.
    fn data_cipher(&self) -> DrdaResult<Option<DataCipher>> {
        Ok(None)
    }
}

pub(crate) fn authenticator_for(
    mechanism: SecurityMechanism,
) -> Box<dyn Authenticator + Send + Sync> {
    match mechanism {
        SecurityMechanism::UserIdPassword | SecurityMechanism::UserIdOnly => {
            ClearText::boxed_authenticator(mechanism)
        }
        SecurityMechanism::PasswordSubstitute => PasswordSubstitute::boxed_authenticator(),
        SecurityMechanism::EncryptedPassword
        | SecurityMechanism::EncryptedUserIdPassword
        | SecurityMechanism::EncryptedUserIdData
        | SecurityMechanism::EncryptedUserIdPasswordData => {
            Encrypted::boxed_authenticator(mechanism)
        }
    }
}

pub(super) fn required_password(password: Option<&SecUtf8>) -> DrdaResult<&[u8]> {
    password
        .map(|pw| pw.unsecure().as_bytes())
        .ok_or(DrdaError::Usage("password is missing"))
}

/// The credential parts of a SECCHK, owned and zeroed when dropped.
#[derive(Debug, Default)]
pub(crate) struct SecurityCheckData {
    pub user: Option<String>,
    pub password: Option<SecVec<u8>>,
    pub tokens: Vec<SecVec<u8>>,
}
impl SecurityCheckData {
    pub(crate) fn credentials(&self) -> Credentials<'_> {
        Credentials {
            user: self.user.as_deref(),
            password: self.password.as_ref().map(SecVec::unsecure),
            tokens: self.tokens.iter().map(SecVec::unsecure).collect(),
        }
    }
}

/// Enciphers and deciphers command and reply data with the negotiated DES key.
#[derive(Clone)]
pub(crate) struct DataCipher {
    key: SecVec<u8>,
    iv: [u8; 8],
}
impl DataCipher {
    pub(super) fn new(key: [u8; 8], iv: [u8; 8]) -> Self {
        Self {
            key: SecVec::from(key.to_vec()),
            iv,
        }
    }

    fn key(&self) -> DrdaResult<[u8; 8]> {
        self.key
            .unsecure()
            .try_into()
            .map_err(|_| DrdaError::Encryption("invalid key length"))
    }

    pub(crate) fn encrypt(&self, plain: &[u8]) -> DrdaResult<Vec<u8>> {
        crypto_util::des_cbc_encrypt(&self.key()?, &self.iv, plain)
    }

    pub(crate) fn decrypt(&self, cipher: &[u8]) -> DrdaResult<Vec<u8>> {
        crypto_util::des_cbc_decrypt(&self.key()?, &self.iv, cipher)
    }
}
impl std::fmt::Debug for DataCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "DataCipher(DES/CBC)")
    }
}

#[cfg(test)]
mod test {
    use super::{authenticator_for, SecurityMechanism};
    use crate::conn::authentication::crypto_util::{self, KeyPair, SEED_LENGTH};
    use secstr::SecUtf8;

    fn password() -> SecUtf8 {
        SecUtf8::from("P1")
    }

    #[test]
    fn test_clear_text() {
        let auth = authenticator_for(SecurityMechanism::UserIdPassword);
        assert!(auth.client_token().is_none());
        let data = auth.security_check_data("U1", Some(&password())).unwrap();
        assert_eq!(data.user.as_deref(), Some("U1"));
        assert_eq!(data.password.unwrap().unsecure(), b"P1");
        assert!(data.tokens.is_empty());
        assert!(auth.security_check_data("U1", None).is_err());

        let auth = authenticator_for(SecurityMechanism::UserIdOnly);
        let data = auth.security_check_data("U1", Some(&password())).unwrap();
        assert!(data.password.is_none());
    }

    // The server's view: decrypts what the client sent with its own half of the exchange.
    #[test]
    fn test_encrypted_user_and_password() {
        let mut auth = authenticator_for(SecurityMechanism::EncryptedUserIdPassword);
        let client_public = auth.client_token().unwrap().to_vec();
        let server = KeyPair::generate();
        auth.accept_server_token(server.public_key()).unwrap();
        let data = auth.security_check_data("U1", Some(&password())).unwrap();
        assert!(data.user.is_none());
        assert!(data.password.is_none());
        assert_eq!(data.tokens.len(), 2);

        let shared = server.shared_secret(&client_public).unwrap();
        let key = crypto_util::des_key(shared.unsecure()).unwrap();
        let iv = crypto_util::middle_eight(server.public_key()).unwrap();
        let user = crypto_util::des_cbc_decrypt(&key, &iv, data.tokens[0].unsecure()).unwrap();
        let pw = crypto_util::des_cbc_decrypt(&key, &iv, data.tokens[1].unsecure()).unwrap();
        assert_eq!(user, b"U1");
        assert_eq!(pw, b"P1");
        assert!(auth.data_cipher().unwrap().is_none());
    }

    #[test]
    fn test_encrypted_password_only() {
        let mut auth = authenticator_for(SecurityMechanism::EncryptedPassword);
        let client_public = auth.client_token().unwrap().to_vec();
        let server = KeyPair::generate();
        auth.accept_server_token(server.public_key()).unwrap();
        let data = auth.security_check_data("U1", Some(&password())).unwrap();
        assert_eq!(data.user.as_deref(), Some("U1"));
        assert_eq!(data.tokens.len(), 1);

        let shared = server.shared_secret(&client_public).unwrap();
        let key = crypto_util::des_key(shared.unsecure()).unwrap();
        let pw = crypto_util::des_cbc_decrypt(&key, b"U1      ", data.tokens[0].unsecure())
            .unwrap();
        assert_eq!(pw, b"P1");
    }

    #[test]
    fn test_encrypted_data() {
        let mut auth = authenticator_for(SecurityMechanism::EncryptedUserIdData);
        let server = KeyPair::generate();
        auth.accept_server_token(server.public_key()).unwrap();
        let data = auth.security_check_data("U1", None).unwrap();
        assert_eq!(data.tokens.len(), 1);
        let cipher = auth.data_cipher().unwrap().unwrap();
        let sqlstt = b"SELECT * FROM T";
        assert_eq!(cipher.decrypt(&cipher.encrypt(sqlstt).unwrap()).unwrap(), sqlstt);
    }

    #[test]
    fn test_missing_server_token() {
        let mut auth = authenticator_for(SecurityMechanism::EncryptedUserIdPassword);
        assert!(auth.security_check_data("U1", Some(&password())).is_err());
        assert!(auth.accept_server_token(&[0_u8; 8]).is_err());
    }

    #[test]
    fn test_password_substitute() {
        let mut a1 = authenticator_for(SecurityMechanism::PasswordSubstitute);
        let a2 = authenticator_for(SecurityMechanism::PasswordSubstitute);
        let seed = a1.client_token().unwrap().to_vec();
        assert_eq!(seed.len(), SEED_LENGTH);
        assert_ne!(Some(&seed[..]), a2.client_token());

        a1.accept_server_token(b"SRVSEED1").unwrap();
        let data = a1.security_check_data("U1", Some(&password())).unwrap();
        assert_eq!(data.user.as_deref(), Some("U1"));
        let substitute = data.password.unwrap();
        assert_ne!(substitute.unsecure(), b"P1");
        let expected = crypto_util::password_substitute("U1", b"P1", &seed, b"SRVSEED1").unwrap();
        assert_eq!(substitute.unsecure(), expected.unsecure());
    }
}
