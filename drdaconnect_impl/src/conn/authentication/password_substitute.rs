use super::{
    authenticator::{required_password, SecurityCheckData},
    crypto_util::{self, SEED_LENGTH},
    Authenticator, SecurityMechanism,
};
use crate::{DrdaError, DrdaResult};
use secstr::SecUtf8;

// USRSSBPWD: client and server exchange random seeds, the password itself never flows.
pub(crate) struct PasswordSubstitute {
    client_seed: [u8; SEED_LENGTH],
    server_seed: Option<[u8; SEED_LENGTH]>,
}
impl PasswordSubstitute {
    pub(crate) fn boxed_authenticator() -> Box<dyn Authenticator + Send + Sync> {
        Box::new(Self {
            client_seed: crypto_util::random_seed(),
            server_seed: None,
        })
    }
}

impl Authenticator for PasswordSubstitute {
    fn mechanism(&self) -> SecurityMechanism {
        SecurityMechanism::PasswordSubstitute
    }

    fn client_token(&self) -> Option<&[u8]> {
        Some(&self.client_seed)
    }

    fn accept_server_token(&mut self, server_token: &[u8]) -> DrdaResult<()> {
        let seed: [u8; SEED_LENGTH] = server_token
            .try_into()
            .map_err(|_| DrdaError::MissingSecurityToken)?;
        self.server_seed = Some(seed);
        Ok(())
    }

    fn security_check_data(
        &self,
        user: &str,
        password: Option<&SecUtf8>,
    ) -> DrdaResult<SecurityCheckData> {
        let server_seed = self.server_seed.ok_or(DrdaError::MissingSecurityToken)?;
        let substitute = crypto_util::password_substitute(
            user,
            required_password(password)?,
            &self.client_seed,
            &server_seed,
        )?;
        Ok(SecurityCheckData {
            user: Some(user.to_string()),
            password: Some(substitute),
            tokens: Vec::new(),
        })
    }
}
