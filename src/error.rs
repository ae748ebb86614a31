use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssumeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("authorization error: {code}: {message}{}", hint(.message))]
    Authorization { code: String, message: String },

    #[error("token exchange failed")]
    Exchange(#[source] anyhow::Error),
}

fn hint(message: &str) -> &'static str {
    if message.contains("DurationSeconds") {
        " (pass a shorter --duration)"
    } else {
        ""
    }
}

impl AssumeError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AssumeError::Configuration(message.into())
    }

    pub fn authentication<S: Into<String>>(message: S) -> Self {
        AssumeError::Authentication(message.into())
    }

    pub fn authorization<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        AssumeError::Authorization {
            code: code.into(),
            message: message.into(),
        }
    }
}
