use chrono::{Local, Utc};
use tracing::{debug, info, warn};

use crate::assume_role::{AssumeRole, AssumeRoleRequest};
use crate::cache::DurationCache;
use crate::credentials::Credentials;
use crate::error::AssumeError;
use crate::handler::HandleCredentials;
use crate::mfa::ReadMfaToken;
use crate::profile::load::LoadProfiles;
use crate::profile::AssumableProfile;
use crate::session::default_session_name;
use crate::settings::Settings;

// STS takes DurationSeconds as a 32-bit signed integer
pub const MAX_DURATION_SECONDS: u32 = i32::MAX as u32;

pub struct RoleAssumer<L, R, A> {
    loader: L,
    mfa_reader: R,
    assume_role: A,
    cache: DurationCache,
}

impl<L, R, A> RoleAssumer<L, R, A>
where
    L: LoadProfiles + Send + Sync,
    R: ReadMfaToken + Send + Sync,
    A: AssumeRole + Send + Sync,
{
    pub fn new(settings: &Settings, loader: L, mfa_reader: R, assume_role: A) -> Self {
        Self {
            loader,
            mfa_reader,
            assume_role,
            cache: DurationCache::new(settings.cache_file.clone()),
        }
    }

    pub fn cache(&self) -> &DurationCache {
        &self.cache
    }

    /// Without a non-zero `duration` the cached hint is used, or STS picks.
    pub async fn assume(
        &self,
        profile_name: &str,
        session_name: Option<&str>,
        duration: Option<u32>,
    ) -> Result<Credentials, AssumeError> {
        let profiles = self.loader.load_profiles().await.map_err(|e| {
            AssumeError::configuration(format!("failed to load profiles: {:#}", e))
        })?;
        let AssumableProfile { profile, role_arn } = profiles.resolve(profile_name)?;
        debug!("target profile:{}", profile.name());

        let role_session_name = session_name
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(default_session_name);

        let duration_seconds = self.duration_for(role_arn, duration)?;

        let (serial_number, token_code) = match profile.mfa_serial() {
            Some(mfa_serial) => {
                let code = self.read_mfa_token(mfa_serial).await?;
                (Some(mfa_serial.to_string()), Some(code))
            }
            None => (None, None),
        };

        let request = AssumeRoleRequest {
            role_arn: role_arn.to_string(),
            role_session_name,
            duration_seconds,
            external_id: profile.external_id().map(|s| s.to_string()),
            serial_number,
            token_code,
            source_profile: profile.source_profile_name().map(|s| s.to_string()),
            region: profile.region_name().map(|s| s.to_string()),
        };
        if let Ok(json) = serde_json::to_string_pretty(&request) {
            debug!("auth request:\n{}", json);
        }
        info!(
            "using source profile: {}",
            request.source_profile.as_deref().unwrap_or("(default)")
        );

        let credentials = self.assume_role.assume_role(&request).await?;

        if let Some(duration_seconds) = duration_seconds {
            match self.cache.record_success(role_arn, duration_seconds) {
                Ok(true) => debug!("cached {}s as max duration for {}", duration_seconds, role_arn),
                Ok(false) => {}
                Err(e) => warn!("failed to update the duration cache: {:#}", e),
            }
        }

        let remaining = credentials.expiration() - Utc::now();
        info!(
            "the token will expire after {} on {}",
            natural_duration(remaining),
            credentials.expiration().with_timezone(&Local)
        );

        Ok(credentials)
    }

    pub async fn run<H: HandleCredentials>(
        &self,
        profile_name: &str,
        session_name: Option<&str>,
        duration: Option<u32>,
        handler: &H,
    ) -> anyhow::Result<()> {
        let credentials = self.assume(profile_name, session_name, duration).await?;
        handler.handle_credentials(&credentials)?;
        Ok(())
    }

    fn duration_for(
        &self,
        role_arn: &str,
        duration: Option<u32>,
    ) -> Result<Option<u32>, AssumeError> {
        if let Some(duration) = duration.filter(|&d| d > 0) {
            if duration > MAX_DURATION_SECONDS {
                return Err(AssumeError::configuration(format!(
                    "session duration {}s is out of range",
                    duration
                )));
            }
            return Ok(Some(duration));
        }

        match self.cache.max_duration(role_arn) {
            Some(best) if best <= MAX_DURATION_SECONDS => {
                debug!(
                    "using duration of {} based on cache.",
                    natural_duration(chrono::Duration::seconds(i64::from(best)))
                );
                Ok(Some(best))
            }
            Some(best) => {
                warn!("ignoring out of range cached duration {}s for {}", best, role_arn);
                Ok(None)
            }
            None => {
                debug!("no session duration specified, letting AWS choose a default.");
                Ok(None)
            }
        }
    }

    async fn read_mfa_token(&self, mfa_serial: &str) -> Result<String, AssumeError> {
        let code = self
            .mfa_reader
            .read_mfa_token(mfa_serial)
            .await
            .map_err(|e| AssumeError::authentication(format!("{:#}", e)))?;
        if code.is_empty() {
            return Err(AssumeError::authentication("no MFA code entered"));
        }
        Ok(code)
    }
}

// "45 minutes", "1 hour 30 minutes", "2 days"
fn natural_duration(d: chrono::Duration) -> String {
    const UNITS: [(i64, &str); 4] = [
        (24 * 60 * 60, "day"),
        (60 * 60, "hour"),
        (60, "minute"),
        (1, "second"),
    ];

    fn part(n: i64, unit: &str) -> String {
        if n == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", n, unit)
        }
    }

    let secs = d.num_seconds().max(0);
    let Some(i) = UNITS.iter().position(|&(size, _)| secs >= size) else {
        return part(0, "second");
    };

    let (size, unit) = UNITS[i];
    let mut text = part(secs / size, unit);
    if let Some(&(next_size, next_unit)) = UNITS.get(i + 1) {
        let rest = secs % size / next_size;
        if rest > 0 {
            text.push(' ');
            text.push_str(&part(rest, next_unit));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::mfa::StaticMfaTokenReader;
    use crate::profile::load::StaticProfileLoader;
    use crate::profile::{Profile, ProfileSet};

    const DEV: &str = "arn:aws:iam::123:role/Dev";
    const OPS: &str = "arn:aws:iam::123:role/Ops";
    const MFA: &str = "arn:aws:iam::123:mfa/alice";

    /// Grants anything up to `max_duration` and remembers what it was asked.
    struct FakeSts {
        max_duration: u32,
        requests: Mutex<Vec<AssumeRoleRequest>>,
    }

    impl FakeSts {
        fn granting(max_duration: u32) -> Self {
            FakeSts {
                max_duration,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AssumeRole for FakeSts {
        async fn assume_role(
            &self,
            request: &AssumeRoleRequest,
        ) -> Result<Credentials, AssumeError> {
            self.requests.lock().unwrap().push(request.clone());

            if request.token_code.as_deref() == Some("000000") {
                return Err(AssumeError::authentication(
                    "MultiFactorAuthentication failed with invalid MFA one time pass code.",
                ));
            }
            let duration = request.duration_seconds.unwrap_or(3600);
            if duration > self.max_duration {
                return Err(AssumeError::authorization(
                    "ValidationError",
                    "The requested DurationSeconds exceeds the MaxSessionDuration set for this role.",
                ));
            }

            Ok(Credentials {
                access_key_id: "AKIA1".to_string(),
                secret_access_key: "secret1".to_string(),
                session_token: "tok1".to_string(),
                expiration: Utc::now() + Duration::seconds(i64::from(duration)),
            })
        }
    }

    struct DecliningMfaReader;

    #[async_trait]
    impl ReadMfaToken for DecliningMfaReader {
        async fn read_mfa_token(&self, _mfa_serial: &str) -> anyhow::Result<String> {
            anyhow::bail!("prompt aborted")
        }
    }

    fn profiles() -> ProfileSet {
        vec![
            Profile {
                name: "default".to_string(),
                ..Profile::default()
            },
            Profile {
                name: "dev".to_string(),
                role_arn: Some(DEV.to_string()),
                ..Profile::default()
            },
            Profile {
                name: "ops".to_string(),
                role_arn: Some(OPS.to_string()),
                source_profile_name: Some("default".to_string()),
                mfa_serial: Some(MFA.to_string()),
                region_name: Some("eu-west-1".to_string()),
                external_id: Some("ext-1".to_string()),
            },
            Profile {
                name: "norole".to_string(),
                mfa_serial: Some(MFA.to_string()),
                ..Profile::default()
            },
        ]
        .into_iter()
        .collect()
    }

    fn assumer_with<R: ReadMfaToken + Send + Sync>(
        dir: &TempDir,
        mfa_reader: R,
        sts: FakeSts,
    ) -> RoleAssumer<StaticProfileLoader, R, FakeSts> {
        let settings = Settings {
            cache_file: dir.path().join("cache.json"),
            verbosity: 0,
        };
        RoleAssumer::new(
            &settings,
            StaticProfileLoader::from(profiles()),
            mfa_reader,
            sts,
        )
    }

    fn assumer(dir: &TempDir) -> RoleAssumer<StaticProfileLoader, StaticMfaTokenReader, FakeSts> {
        assumer_with(dir, StaticMfaTokenReader::from("123456"), FakeSts::granting(43200))
    }

    fn requests<L, R>(assumer: &RoleAssumer<L, R, FakeSts>) -> Vec<AssumeRoleRequest> {
        assumer.assume_role.requests.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn missing_role_fails_before_exchange() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer_with(&dir, DecliningMfaReader, FakeSts::granting(43200));

        for name in ["norole", "missing"] {
            let err = assumer.assume(name, None, Some(3600)).await.unwrap_err();
            assert!(matches!(err, AssumeError::Configuration(_)), "{:?}", err);
        }
        assert!(requests(&assumer).is_empty());
        assert!(!assumer.cache().path().exists());
    }

    #[tokio::test]
    async fn uncached_role_leaves_duration_to_sts() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer(&dir);

        assumer.assume("dev", None, None).await.unwrap();
        assumer.assume("dev", None, Some(0)).await.unwrap();

        for request in requests(&assumer) {
            assert_eq!(request.duration_seconds, None);
        }
        assert!(!assumer.cache().path().exists());
    }

    #[tokio::test]
    async fn explicit_duration_is_cached() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer(&dir);

        let credentials = assumer.assume("dev", None, Some(3600)).await.unwrap();
        assert_eq!(credentials.access_key_id(), "AKIA1");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(assumer.cache().path()).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "MaxSessionDuration": { "arn:aws:iam::123:role/Dev": 3600 } })
        );
    }

    #[tokio::test]
    async fn shorter_duration_does_not_downgrade() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer(&dir);

        assumer.assume("dev", None, Some(3600)).await.unwrap();
        assumer.assume("dev", None, Some(1800)).await.unwrap();

        assert_eq!(requests(&assumer)[1].duration_seconds, Some(1800));
        assert_eq!(assumer.cache().max_duration(DEV), Some(3600));
    }

    #[tokio::test]
    async fn cache_tracks_the_largest_granted_duration() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer(&dir);

        let mut largest = 0;
        for d in [900, 7200, 3600, 43200, 1800] {
            assumer.assume("dev", None, Some(d)).await.unwrap();
            largest = largest.max(d);
            assert_eq!(assumer.cache().max_duration(DEV), Some(largest));
        }
    }

    #[tokio::test]
    async fn cached_hint_is_requested() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer(&dir);

        assumer.assume("dev", None, Some(7200)).await.unwrap();
        assumer.assume("dev", None, None).await.unwrap();

        assert_eq!(requests(&assumer)[1].duration_seconds, Some(7200));
        assert_eq!(assumer.cache().max_duration(DEV), Some(7200));
    }

    #[tokio::test]
    async fn out_of_range_duration_fails_before_prompt() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer_with(&dir, DecliningMfaReader, FakeSts::granting(u32::MAX));

        let err = assumer
            .assume("ops", None, Some(MAX_DURATION_SECONDS + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AssumeError::Configuration(_)), "{:?}", err);
        assert!(requests(&assumer).is_empty());
    }

    #[tokio::test]
    async fn out_of_range_cached_hint_is_ignored() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer(&dir);
        fs::write(
            assumer.cache().path(),
            format!(r#"{{"MaxSessionDuration": {{"{}": {}}}}}"#, DEV, u32::MAX),
        )
        .unwrap();

        assumer.assume("dev", None, None).await.unwrap();
        assert_eq!(requests(&assumer)[0].duration_seconds, None);
    }

    #[tokio::test]
    async fn mfa_and_source_profile_are_forwarded() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer(&dir);

        assumer.assume("ops", Some("ci-run"), None).await.unwrap();

        let request = requests(&assumer).remove(0);
        assert_eq!(request.role_arn, OPS);
        assert_eq!(request.role_session_name, "ci-run");
        assert_eq!(request.serial_number.as_deref(), Some(MFA));
        assert_eq!(request.token_code.as_deref(), Some("123456"));
        assert_eq!(request.source_profile.as_deref(), Some("default"));
        assert_eq!(request.region.as_deref(), Some("eu-west-1"));
        assert_eq!(request.external_id.as_deref(), Some("ext-1"));
    }

    #[tokio::test]
    async fn default_session_name_and_identity() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer(&dir);

        assumer.assume("dev", Some(""), None).await.unwrap();

        let request = requests(&assumer).remove(0);
        assert_eq!(request.role_session_name, default_session_name());
        assert_eq!(request.serial_number, None);
        assert_eq!(request.token_code, None);
        assert_eq!(request.source_profile, None);
    }

    #[tokio::test]
    async fn declined_mfa_is_authentication_error() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer_with(&dir, DecliningMfaReader, FakeSts::granting(43200));

        let err = assumer.assume("ops", None, Some(3600)).await.unwrap_err();
        assert!(matches!(err, AssumeError::Authentication(_)), "{:?}", err);
        assert!(requests(&assumer).is_empty());
    }

    #[tokio::test]
    async fn empty_mfa_code_is_authentication_error() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer_with(&dir, StaticMfaTokenReader::from(""), FakeSts::granting(43200));

        let err = assumer.assume("ops", None, None).await.unwrap_err();
        assert!(matches!(err, AssumeError::Authentication(_)), "{:?}", err);
        assert!(requests(&assumer).is_empty());
    }

    #[tokio::test]
    async fn rejected_mfa_code_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let assumer =
            assumer_with(&dir, StaticMfaTokenReader::from("000000"), FakeSts::granting(43200));

        let err = assumer.assume("ops", None, Some(3600)).await.unwrap_err();
        assert!(matches!(err, AssumeError::Authentication(_)), "{:?}", err);
        assert_eq!(assumer.cache().max_duration(OPS), None);
    }

    #[tokio::test]
    async fn denied_duration_is_surfaced_and_not_cached() {
        let dir = TempDir::new().unwrap();
        let assumer = assumer_with(
            &dir,
            StaticMfaTokenReader::from("123456"),
            FakeSts::granting(3600),
        );

        assumer.assume("dev", None, Some(1800)).await.unwrap();
        let err = assumer.assume("dev", None, Some(7200)).await.unwrap_err();

        assert!(matches!(err, AssumeError::Authorization { .. }), "{:?}", err);
        assert_eq!(assumer.cache().max_duration(DEV), Some(1800));
    }

    #[tokio::test]
    async fn run_hands_credentials_to_handler() {
        struct Collect(Mutex<Vec<Credentials>>);

        impl HandleCredentials for Collect {
            fn handle_credentials(&self, credentials: &Credentials) -> anyhow::Result<()> {
                self.0.lock().unwrap().push(credentials.clone());
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let assumer = assumer(&dir);
        let handler = Collect(Mutex::new(Vec::new()));

        assumer.run("dev", None, None, &handler).await.unwrap();
        assert!(assumer.run("norole", None, None, &handler).await.is_err());

        let handled = handler.0.into_inner().unwrap();
        assert_eq!(handled.len(), 1);
        assert_eq!(handled[0].session_token(), "tok1");
    }

    #[test]
    fn durations_read_naturally() {
        assert_eq!(natural_duration(Duration::seconds(-5)), "0 seconds");
        assert_eq!(natural_duration(Duration::seconds(1)), "1 second");
        assert_eq!(natural_duration(Duration::minutes(45)), "45 minutes");
        assert_eq!(natural_duration(Duration::hours(1)), "1 hour");
        assert_eq!(natural_duration(Duration::hours(12)), "12 hours");
        assert_eq!(natural_duration(Duration::minutes(90)), "1 hour 30 minutes");
        assert_eq!(natural_duration(Duration::seconds(61)), "1 minute 1 second");
        assert_eq!(natural_duration(Duration::hours(36)), "1 day 12 hours");
        assert_eq!(natural_duration(Duration::days(2) + Duration::seconds(59)), "2 days");
        assert_eq!(natural_duration(Duration::days(2)), "2 days");
    }
}
