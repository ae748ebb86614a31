use nix::unistd::{gethostname, Uid, User};
use tracing::debug;

const UNKNOWN: &str = "unknown";

/// `<user>@<host>` where the host name is cut at its first `.`.
pub fn session_name_for(user: &str, host: &str) -> String {
    let host = host.split('.').next().unwrap_or(host);
    format!("{}@{}", user, host)
}

pub fn default_session_name() -> String {
    let user = match User::from_uid(Uid::current()) {
        Ok(Some(user)) => user.name,
        Ok(None) => UNKNOWN.to_string(),
        Err(e) => {
            debug!("failed to look up current user: {}", e);
            UNKNOWN.to_string()
        }
    };

    let host = match gethostname() {
        Ok(host) => host.to_string_lossy().into_owned(),
        Err(e) => {
            debug!("failed to look up host name: {}", e);
            UNKNOWN.to_string()
        }
    };

    session_name_for(&user, &host)
}
