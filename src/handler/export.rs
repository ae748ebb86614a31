use std::io::{self, Write};

use crate::credentials::Credentials;
use crate::handler::{into_variables, HandleCredentials, Variable};

/// Renders credentials as `export NAME=VALUE` lines, without a trailing newline.
pub fn format_exports(credentials: &Credentials) -> String {
    into_variables(credentials)
        .iter()
        .map(|Variable { name, value }| format!("export {}={}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ExportCredentialsHandler;

impl HandleCredentials for ExportCredentialsHandler {
    fn handle_credentials(&self, credentials: &Credentials) -> anyhow::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", format_exports(credentials))?;
        stdout.flush()?;
        Ok(())
    }
}
