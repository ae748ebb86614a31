use std::path::PathBuf;

use async_trait::async_trait;
use clap::{ArgAction, Parser};

use crate::assume_role::aws_sdk::AwsSdkAssumeRole;
use crate::handler::export::ExportCredentialsHandler;
use crate::mfa::{ReadMfaToken, StaticMfaTokenReader, StdinMfaTokenReader};
use crate::profile::load::aws_sdk::AwsSdkProfileLoader;
use crate::profile::load::LoadProfiles;
use crate::run::{RoleAssumer, MAX_DURATION_SECONDS};
use crate::settings::Settings;

/// Assume the role of an AWS profile and print its temporary credentials as
/// shell exports. Use it as `eval "$(assume PROFILE)"`.
#[derive(Parser, Debug)]
#[command(name = "assume", version)]
pub struct Args {
    /// Profile whose role to assume.
    #[arg(required_unless_present = "list")]
    pub profile: Option<String>,

    /// Session name (defaults to user@host).
    #[arg(short, long, value_name = "NAME")]
    pub session: Option<String>,

    /// Session duration in seconds. Without it, the longest duration that
    /// worked for the role before is used. Asking for more than the role
    /// allows is denied by AWS.
    #[arg(
        short,
        long,
        value_name = "SECS",
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_DURATION_SECONDS))
    )]
    pub duration: Option<u32>,

    /// MFA code, instead of being prompted for it.
    #[arg(short, long, value_name = "CODE")]
    pub token: Option<String>,

    /// Where the session duration cache is kept.
    #[arg(long, env = "ASSUMEROLE_CACHE_FILE", value_name = "PATH")]
    pub cache_file: Option<PathBuf>,

    /// More log output on stderr (-v, -vv).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Show the profiles that can be assumed.
    #[arg(short, long, conflicts_with_all = ["profile", "session", "duration", "token"])]
    pub list: bool,
}

impl Args {
    pub fn settings(&self) -> anyhow::Result<Settings> {
        Settings::new(self.cache_file.clone(), self.verbose)
    }
}

enum MfaReader {
    Stdin(StdinMfaTokenReader),
    Static(StaticMfaTokenReader),
}

#[async_trait]
impl ReadMfaToken for MfaReader {
    async fn read_mfa_token(&self, mfa_serial: &str) -> anyhow::Result<String> {
        use MfaReader::*;
        match self {
            Stdin(r) => r.read_mfa_token(mfa_serial).await,
            Static(r) => r.read_mfa_token(mfa_serial).await,
        }
    }
}

fn mfa_reader_from(assume_role: &AssumeRole) -> MfaReader {
    if let Some(token) = assume_role.token.as_ref() {
        MfaReader::Static(StaticMfaTokenReader::from(token))
    } else {
        MfaReader::Stdin(StdinMfaTokenReader)
    }
}

#[derive(Debug)]
pub struct AssumeRole {
    profile: String,
    session: Option<String>,
    duration: Option<u32>,
    token: Option<String>,
}

#[derive(Debug)]
pub struct ListProfiles;

#[derive(Debug)]
pub enum App {
    AssumeRole(AssumeRole),
    ListProfiles(ListProfiles),
}

impl TryFrom<Args> for App {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if args.list {
            return Ok(App::ListProfiles(ListProfiles));
        }

        let profile = args
            .profile
            .ok_or_else(|| anyhow::anyhow!("a profile name is required"))?;
        Ok(App::AssumeRole(AssumeRole {
            profile,
            session: args.session,
            duration: args.duration,
            token: args.token,
        }))
    }
}

impl App {
    pub async fn run(self, settings: &Settings) -> anyhow::Result<()> {
        match self {
            App::AssumeRole(assume_role) => Self::assume_role(assume_role, settings).await,
            App::ListProfiles(list_profiles) => Self::list_profiles(list_profiles).await,
        }
    }

    async fn assume_role(assume_role: AssumeRole, settings: &Settings) -> anyhow::Result<()> {
        let mfa_reader = mfa_reader_from(&assume_role);
        let assumer = RoleAssumer::new(
            settings,
            AwsSdkProfileLoader::default(),
            mfa_reader,
            AwsSdkAssumeRole,
        );
        assumer
            .run(
                &assume_role.profile,
                assume_role.session.as_deref(),
                assume_role.duration,
                &ExportCredentialsHandler,
            )
            .await
    }

    async fn list_profiles(_list_profiles: ListProfiles) -> anyhow::Result<()> {
        let profiles = AwsSdkProfileLoader::default().load_profiles().await?;
        for name in profiles.assumable_names() {
            println!("{}", name);
        }

        Ok(())
    }
}
