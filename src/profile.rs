use std::collections::BTreeMap;

use crate::error::AssumeError;

pub mod load;

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: String,
    pub source_profile_name: Option<String>,
    pub region_name: Option<String>,
    pub role_arn: Option<String>,
    pub external_id: Option<String>,
    pub mfa_serial: Option<String>,
}

impl Profile {
    pub fn has_role_arn(&self) -> bool {
        self.role_arn.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_profile_name(&self) -> Option<&str> {
        self.source_profile_name.as_deref()
    }

    pub fn region_name(&self) -> Option<&str> {
        self.region_name.as_deref()
    }

    pub fn role_arn(&self) -> Option<&str> {
        self.role_arn.as_deref()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn mfa_serial(&self) -> Option<&str> {
        self.mfa_serial.as_deref()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssumableProfile<'a> {
    pub profile: &'a Profile,
    pub role_arn: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    pub profiles: BTreeMap<String, Profile>,
}

impl FromIterator<Profile> for ProfileSet {
    fn from_iter<I: IntoIterator<Item = Profile>>(iter: I) -> Self {
        let profiles = iter.into_iter().map(|p| (p.name.clone(), p)).collect();
        ProfileSet { profiles }
    }
}

impl ProfileSet {
    pub fn get_profile(&self, profile_name: &str) -> Option<&Profile> {
        self.profiles.get(profile_name)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn assumable_names(&self) -> impl Iterator<Item = &str> {
        self.profiles()
            .filter(|p| p.has_role_arn())
            .map(|p| p.name())
    }

    /// Looks up `profile_name` and checks that it describes a role that can be assumed.
    pub fn resolve(&self, profile_name: &str) -> Result<AssumableProfile<'_>, AssumeError> {
        let profile = self.get_profile(profile_name).ok_or_else(|| {
            AssumeError::configuration(format!("no profile found. profile:{}", profile_name))
        })?;

        let role_arn = profile.role_arn().ok_or_else(|| {
            AssumeError::configuration(format!(
                "the profile \"{}\" does not have role_arn",
                profile_name
            ))
        })?;
        if !is_role_arn(role_arn) {
            return Err(AssumeError::configuration(format!(
                "the profile \"{}\" has a malformed role_arn: {}",
                profile_name, role_arn
            )));
        }

        if let Some(source) = profile.source_profile_name() {
            if self.get_profile(source).is_none() {
                return Err(AssumeError::configuration(format!(
                    "the source_profile \"{}\" of \"{}\" does not exist",
                    source, profile_name
                )));
            }
        }

        Ok(AssumableProfile { profile, role_arn })
    }
}

// arn:<partition>:iam::<account>:role/<name>
fn is_role_arn(arn: &str) -> bool {
    let parts = arn.splitn(6, ':').collect::<Vec<_>>();
    matches!(
        parts.as_slice(),
        ["arn", partition, "iam", "", account, resource]
            if !partition.is_empty()
                && !account.is_empty()
                && resource.strip_prefix("role/").map_or(false, |n| !n.is_empty())
    )
}
