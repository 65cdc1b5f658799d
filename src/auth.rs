// The `login` and `logout` commands. Login caches credentials and keeps
// nothing else; logout probes the cache without prompting, so running it
// twice (or before ever logging in) is not an error.

use crate::api::{AuthError, FlowServiceClient, LoginPolicy, RevokeTokens};
use crate::config::ServiceConfig;
use anyhow::Result;
use log::debug;

pub fn run_login(config: &ServiceConfig, force: bool, no_browser: bool) -> Result<()> {
    println!("Checking your credentials with the flow service...");
    FlowServiceClient::connect(config, LoginPolicy::Interactive { force, no_browser })?;
    println!("Login successful. Your tokens are cached for future commands.");
    Ok(())
}

pub fn run_logout(config: &ServiceConfig) -> Result<()> {
    logout_with(|| FlowServiceClient::connect(config, LoginPolicy::CachedOnly))?;
    println!("You are logged out.");
    Ok(())
}

/// The logout core over a connect seam. A successful probe means there are
/// credentials to revoke; a `NoValidCredentials` miss means the user is
/// already logged out and is absorbed; anything else is a genuine failure.
pub fn logout_with<C, F>(connect: F) -> Result<(), AuthError>
where
    C: RevokeTokens,
    F: FnOnce() -> Result<C, AuthError>,
{
    match connect() {
        Ok(client) => {
            debug!("valid credentials found; revoking");
            client.revoke_tokens()?;
        }
        Err(AuthError::NoValidCredentials) => {
            debug!("no valid credentials cached; nothing to revoke");
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FakeCredentials(Rc<Cell<bool>>);

    impl RevokeTokens for FakeCredentials {
        fn revoke_tokens(self) -> Result<(), AuthError> {
            self.0.set(true);
            Ok(())
        }
    }

    #[test]
    fn cached_credentials_get_revoked() {
        let revoked = Rc::new(Cell::new(false));
        let flag = revoked.clone();
        logout_with(move || Ok(FakeCredentials(flag))).unwrap();
        assert!(revoked.get());
    }

    #[test]
    fn a_probe_miss_means_already_logged_out() {
        let result = logout_with(|| Err::<FakeCredentials, _>(AuthError::NoValidCredentials));
        assert!(result.is_ok());
    }

    #[test]
    fn logging_out_twice_in_a_row_stays_quiet() {
        for _ in 0..2 {
            let result = logout_with(|| Err::<FakeCredentials, _>(AuthError::NoValidCredentials));
            assert!(result.is_ok());
        }
    }

    #[test]
    fn genuine_probe_failures_propagate() {
        let result = logout_with(|| {
            Err::<FakeCredentials, _>(AuthError::TokenEndpoint("boom".into()))
        });
        assert!(matches!(result, Err(AuthError::TokenEndpoint(_))));
    }
}
