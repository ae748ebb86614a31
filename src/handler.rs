use crate::credentials::Credentials;

pub mod export;

pub trait HandleCredentials {
    fn handle_credentials(&self, credentials: &Credentials) -> anyhow::Result<()>;
}

struct Variable<'a> {
    name: &'a str,
    value: &'a str,
}

fn into_variables(credentials: &Credentials) -> [Variable<'_>; 3] {
    fn v<'a>(name: &'a str, value: &'a str) -> Variable<'a> {
        Variable { name, value }
    }

    // order is part of the output format
    [
        v("AWS_ACCESS_KEY_ID", credentials.access_key_id()),
        v("AWS_SECRET_ACCESS_KEY", credentials.secret_access_key()),
        v("AWS_SESSION_TOKEN", credentials.session_token()),
    ]
}
