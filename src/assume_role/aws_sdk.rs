use std::fmt::Debug;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sts::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sts::operation::assume_role::AssumeRoleError;
use aws_types::region::Region;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::assume_role::{AssumeRole, AssumeRoleRequest};
use crate::credentials::Credentials;
use crate::error::AssumeError;

const FALLBACK_REGION: &str = "us-east-1";

pub struct AwsSdkAssumeRole;

impl AwsSdkAssumeRole {
    async fn client(&self, request: &AssumeRoleRequest) -> aws_sdk_sts::Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = request.region.as_ref() {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(source_profile_name) = request.source_profile.as_ref() {
            loader = loader.profile_name(source_profile_name);
        }

        let config = loader.load().await;
        let mut builder = aws_sdk_sts::config::Builder::from(&config);
        if config.region().is_none() {
            debug!("no region configured, using {}", FALLBACK_REGION);
            builder = builder.region(Region::new(FALLBACK_REGION));
        }
        aws_sdk_sts::Client::from_conf(builder.build())
    }
}

#[async_trait]
impl AssumeRole for AwsSdkAssumeRole {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<Credentials, AssumeError> {
        let duration_seconds = request
            .duration_seconds
            .map(i32::try_from)
            .transpose()
            .map_err(|_| AssumeError::configuration("session duration is out of range"))?;

        let client = self.client(request).await;
        let output = client
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&request.role_session_name)
            .set_duration_seconds(duration_seconds)
            .set_external_id(request.external_id.clone())
            .set_serial_number(request.serial_number.clone())
            .set_token_code(request.token_code.clone())
            .send()
            .await
            .map_err(|e| classify(e, request.token_code.is_some()))?;

        let creds = output.credentials.ok_or_else(|| {
            AssumeError::Exchange(anyhow::anyhow!("assume-role didn't return a credential"))
        })?;
        let expiration = expiration_from(creds.expiration.secs(), creds.expiration.subsec_nanos())?;

        Ok(Credentials {
            access_key_id: creds.access_key_id,
            secret_access_key: creds.secret_access_key,
            session_token: creds.session_token,
            expiration,
        })
    }
}

fn expiration_from(secs: i64, nanos: u32) -> Result<DateTime<Utc>, AssumeError> {
    DateTime::<Utc>::from_timestamp(secs, nanos).ok_or_else(|| {
        AssumeError::Exchange(anyhow::anyhow!(
            "credential expiration is out of range. secs:{}",
            secs
        ))
    })
}

fn classify<R>(err: SdkError<AssumeRoleError, R>, with_mfa: bool) -> AssumeError
where
    R: Debug + Send + Sync + 'static,
{
    match err {
        SdkError::ServiceError(context) => {
            let err = context.err();
            let code = err.code().unwrap_or("Unknown").to_string();
            let message = err.message().unwrap_or_default().to_string();
            debug!("sts rejected the request. code:{}, message:{}", code, message);

            if with_mfa && message.contains("MultiFactorAuthentication") {
                AssumeError::authentication(message)
            } else {
                AssumeError::authorization(code, message)
            }
        }
        other => AssumeError::Exchange(other.into()),
    }
}
