use crate::{DrdaError, DrdaResult};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use rand::{thread_rng, RngCore};
use secstr::SecVec;
use sha2::{Digest, Sha256};

/// Length of a public key in the Diffie-Hellman exchange.
pub(crate) const TOKEN_LENGTH: usize = 32;
/// Length of the seeds of the password substitute mechanism.
pub(crate) const SEED_LENGTH: usize = 8;

// The 256-bit group of the DRDA Diffie-Hellman exchange
const PRIME: [u8; TOKEN_LENGTH] = [
    0xC6, 0x21, 0x12, 0xD7, 0x3E, 0xE6, 0x13, 0xF0, 0x94, 0x7A, 0xB3, 0x1F, 0x0F, 0x68, 0x46, 0xA1,
    0xBF, 0xF5, 0xB3, 0xA4, 0xCA, 0x0D, 0x60, 0xBC, 0x1E, 0x4C, 0x7A, 0x0D, 0x8C, 0x16, 0xB3, 0xE3,
];
const GENERATOR: [u8; TOKEN_LENGTH] = [
    0x46, 0x90, 0xFA, 0x1F, 0x7B, 0x9E, 0x1D, 0x44, 0x42, 0xC8, 0x6C, 0x91, 0x14, 0x60, 0x3F, 0xDE,
    0xCF, 0x07, 0x1E, 0xDC, 0xEC, 0x5F, 0x62, 0x6E, 0x21, 0xE2, 0x56, 0xAE, 0xD9, 0xEA, 0x34, 0xE4,
];

type DesCbcEnc = cbc::Encryptor<des::Des>;
type DesCbcDec = cbc::Decryptor<des::Des>;

/// The client's side of a Diffie-Hellman exchange.
pub(crate) struct KeyPair {
    private: SecVec<u8>,
    public: [u8; TOKEN_LENGTH],
}

impl KeyPair {
    pub(crate) fn generate() -> Self {
        let mut private = [0_u8; TOKEN_LENGTH];
        thread_rng().fill_bytes(&mut private);
        private[0] &= 0x7F;
        let public = normalize(
            &BigUint::from_bytes_be(&GENERATOR).modpow(
                &BigUint::from_bytes_be(&private),
                &BigUint::from_bytes_be(&PRIME),
            ),
        );
        let private = SecVec::from(private.to_vec());
        Self { private, public }
    }

    pub(crate) fn public_key(&self) -> &[u8] {
        &self.public
    }

    /// The shared secret, from the server's public key.
    pub(crate) fn shared_secret(&self, server_public: &[u8]) -> DrdaResult<SecVec<u8>> {
        if server_public.len() != TOKEN_LENGTH {
            return Err(DrdaError::MissingSecurityToken);
        }
        let shared = BigUint::from_bytes_be(server_public).modpow(
            &BigUint::from_bytes_be(self.private.unsecure()),
            &BigUint::from_bytes_be(&PRIME),
        );
        Ok(SecVec::from(normalize(&shared).to_vec()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "KeyPair {{ public: {} }}", hex::encode(self.public))
    }
}

// Exactly 32 bytes, big endian.
fn normalize(value: &BigUint) -> [u8; TOKEN_LENGTH] {
    let bytes = value.to_bytes_be();
    let mut result = [0_u8; TOKEN_LENGTH];
    if bytes.len() <= TOKEN_LENGTH {
        result[TOKEN_LENGTH - bytes.len()..].copy_from_slice(&bytes);
    } else {
        result.copy_from_slice(&bytes[bytes.len() - TOKEN_LENGTH..]);
    }
    result
}

/// The DES key is taken from the middle of the shared secret.
pub(crate) fn des_key(shared_secret: &[u8]) -> DrdaResult<[u8; 8]> {
    middle_eight(shared_secret)
}

/// Bytes 12 to 19 of a 32-byte token.
pub(crate) fn middle_eight(token: &[u8]) -> DrdaResult<[u8; 8]> {
    token
        .get(12..20)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(DrdaError::MissingSecurityToken)
}

/// DES in CBC mode with PKCS#5 padding.
pub(crate) fn des_cbc_encrypt(key: &[u8; 8], iv: &[u8; 8], plain: &[u8]) -> DrdaResult<Vec<u8>> {
    Ok(DesCbcEnc::new_from_slices(key, iv)?.encrypt_padded_vec_mut::<Pkcs7>(plain))
}

pub(crate) fn des_cbc_decrypt(key: &[u8; 8], iv: &[u8; 8], cipher: &[u8]) -> DrdaResult<Vec<u8>> {
    DesCbcDec::new_from_slices(key, iv)?
        .decrypt_padded_vec_mut::<Pkcs7>(cipher)
        .map_err(|_| DrdaError::Encryption("DES decryption failed, bad padding"))
}

pub(crate) fn random_seed() -> [u8; SEED_LENGTH] {
    let mut seed = [0_u8; SEED_LENGTH];
    thread_rng().fill_bytes(&mut seed);
    seed
}

/// The strong password substitute.
///
/// A digest of user and password is used as key for an HMAC over both seeds and the user,
/// so that the password never flows, and a captured substitute is useless with other seeds.
pub(crate) fn password_substitute(
    user: &str,
    password: &[u8],
    client_seed: &[u8],
    server_seed: &[u8],
) -> DrdaResult<SecVec<u8>> {
    let mut hasher = Sha256::new();
    hasher.update(user.as_bytes());
    hasher.update(password);
    let digest = SecVec::from(hasher.finalize().to_vec());

    let mut mac = Hmac::<Sha256>::new_from_slice(digest.unsecure())?;
    mac.update(client_seed);
    mac.update(server_seed);
    mac.update(user.as_bytes());
    Ok(SecVec::from(mac.finalize().into_bytes().to_vec()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_agreement() {
        let client = KeyPair::generate();
        let server = KeyPair::generate();
        let s1 = client.shared_secret(server.public_key()).unwrap();
        let s2 = server.shared_secret(client.public_key()).unwrap();
        assert_eq!(s1.unsecure(), s2.unsecure());
        assert_eq!(s1.unsecure().len(), TOKEN_LENGTH);
        assert!(client.shared_secret(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_des_round_trip() {
        let key = *b"\x01\x23\x45\x67\x89\xAB\xCD\xEF";
        let iv = [7_u8; 8];
        for plain in [&b""[..], &b"P1"[..], &b"exactly8"[..], &b"a long password"[..]] {
            let cipher = des_cbc_encrypt(&key, &iv, plain).unwrap();
            assert_eq!(cipher.len() % 8, 0);
            assert!(cipher.len() > plain.len());
            assert_eq!(des_cbc_decrypt(&key, &iv, &cipher).unwrap(), plain);
        }
        assert!(des_cbc_decrypt(&key, &iv, &[0_u8; 7]).is_err());
    }

    #[test]
    fn test_password_substitute() {
        let a = password_substitute("U1", b"P1", b"12345678", b"abcdefgh").unwrap();
        let b = password_substitute("U1", b"P1", b"12345678", b"abcdefgh").unwrap();
        let c = password_substitute("U1", b"P1", b"87654321", b"abcdefgh").unwrap();
        assert_eq!(a.unsecure(), b.unsecure());
        assert_ne!(a.unsecure(), c.unsecure());
        assert_eq!(a.unsecure().len(), 32);
    }
}
