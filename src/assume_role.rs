use async_trait::async_trait;
use serde::Serialize;

use crate::credentials::Credentials;
use crate::error::AssumeError;

pub mod aws_sdk;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    // kept out of logs
    #[serde(skip)]
    pub token_code: Option<String>,

    /// Profile whose credentials sign the call. `None` uses the SDK's default chain.
    #[serde(skip)]
    pub source_profile: Option<String>,

    #[serde(skip)]
    pub region: Option<String>,
}

#[async_trait]
pub trait AssumeRole {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credentials, AssumeError>;
}
