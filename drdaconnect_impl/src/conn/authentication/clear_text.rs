use super::{
    authenticator::{required_password, SecurityCheckData},
    Authenticator, SecurityMechanism,
};
use crate::DrdaResult;
use secstr::{SecUtf8, SecVec};

// USRIDPWD and USRIDONL: nothing is exchanged before SECCHK.
pub(crate) struct ClearText {
    mechanism: SecurityMechanism,
}
impl ClearText {
    pub(crate) fn boxed_authenticator(
        mechanism: SecurityMechanism,
    ) -> Box<dyn Authenticator + Send + Sync> {
        Box::new(Self { mechanism })
    }
}

impl Authenticator for ClearText {
    fn mechanism(&self) -> SecurityMechanism {
        self.mechanism
    }

    fn client_token(&self) -> Option<&[u8]> {
        None
    }

    fn accept_server_token(&mut self, _server_token: &[u8]) -> DrdaResult<()> {
        warn!("ignoring security token for {}", self.mechanism);
        Ok(())
    }

    fn security_check_data(
        &self,
        user: &str,
        password: Option<&SecUtf8>,
    ) -> DrdaResult<SecurityCheckData> {
        let password = if self.mechanism.needs_password() {
            Some(SecVec::from(required_password(password)?.to_vec()))
        } else {
            None
        };
        Ok(SecurityCheckData {
            user: Some(user.to_string()),
            password,
            tokens: Vec::new(),
        })
    }
}
