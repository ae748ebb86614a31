use std::io;
use std::io::Write;

use async_trait::async_trait;

#[async_trait]
pub trait ReadMfaToken {
    async fn read_mfa_token(&self, mfa_serial: &str) -> anyhow::Result<String>;
}

// prompt on stderr, stdout is for eval
pub struct StdinMfaTokenReader;

#[async_trait]
impl ReadMfaToken for StdinMfaTokenReader {
    async fn read_mfa_token(&self, mfa_serial: &str) -> anyhow::Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "Enter MFA code for {}: ", mfa_serial)?;
        stderr.flush()?;

        let mut code = String::new();
        if io::stdin().read_line(&mut code)? == 0 {
            anyhow::bail!("MFA prompt closed before a code was entered");
        }
        Ok(code.trim().to_string())
    }
}

pub struct StaticMfaTokenReader {
    token: String,
}

impl<S: Into<String>> From<S> for StaticMfaTokenReader {
    fn from(s: S) -> Self {
        StaticMfaTokenReader { token: s.into() }
    }
}

#[async_trait]
impl ReadMfaToken for StaticMfaTokenReader {
    async fn read_mfa_token(&self, _mfa_serial: &str) -> anyhow::Result<String> {
        Ok(self.token.clone())
    }
}
