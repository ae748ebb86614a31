use std::collections::BTreeMap;
use std::convert::TryFrom;

use async_trait::async_trait;
use aws_config::profile::load;
use aws_runtime::env_config::file::EnvConfigFiles;
use aws_runtime::env_config::section::{EnvConfigSections, Profile as EnvProfile};
use aws_types::os_shim_internal::{Env, Fs};
use tracing::debug;

use crate::profile::load::LoadProfiles;
use crate::profile::{Profile, ProfileSet};

fn profile_from(name: &str, value: &EnvProfile) -> Profile {
    fn maybe_s<S: Into<String>>(s: Option<S>) -> Option<String> {
        s.map(|x| x.into())
    }

    Profile {
        name: name.to_string(),
        source_profile_name: maybe_s(value.get("source_profile")),
        region_name: maybe_s(value.get("region")),
        role_arn: maybe_s(value.get("role_arn")),
        external_id: maybe_s(value.get("external_id")),
        mfa_serial: maybe_s(value.get("mfa_serial")),
    }
}

impl TryFrom<EnvConfigSections> for ProfileSet {
    type Error = anyhow::Error;

    fn try_from(value: EnvConfigSections) -> Result<Self, Self::Error> {
        let profiles = value
            .profiles()
            .map(|n| {
                value
                    .get_profile(n)
                    .map(|p| (n.to_string(), profile_from(n, p)))
                    .ok_or_else(|| anyhow::anyhow!("profile disappeared while loading. profile:{}", n))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(ProfileSet { profiles })
    }
}

#[derive(Debug, Default)]
pub struct AwsSdkProfileLoader {
    profile_files: EnvConfigFiles,
    fs: Fs,
    env: Env,
}

impl AwsSdkProfileLoader {
    pub fn new(fs: Fs, env: Env) -> Self {
        AwsSdkProfileLoader {
            profile_files: EnvConfigFiles::default(),
            fs,
            env,
        }
    }
}

#[async_trait]
impl LoadProfiles for AwsSdkProfileLoader {
    async fn load_profiles(&self) -> anyhow::Result<ProfileSet> {
        let profiles = load(&self.fs, &self.env, &self.profile_files, None).await?;
        let profiles = ProfileSet::try_from(profiles)?;
        debug!("loaded {} profiles", profiles.profiles.len());
        Ok(profiles)
    }
}
