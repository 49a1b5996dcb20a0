//! AWS Secrets Manager implementation of [`SecretStore`].

use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use super::{SecretStore, SecretStoreError};
use crate::backend::BackendFuture;

/// Secret store backed by an `aws-sdk-secretsmanager` client.
#[derive(Clone, Debug)]
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    /// Wraps an already configured client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

impl SecretStore for SecretsManagerStore {
    fn secret_string<'a>(
        &'a self,
        secret_id: &'a str,
        version_stage: &'a str,
    ) -> BackendFuture<'a, String, SecretStoreError> {
        Box::pin(async move {
            let response = self
                .client
                .get_secret_value()
                .secret_id(secret_id)
                .version_stage(version_stage)
                .send()
                .await
                .map_err(|err| classify(&err))?;
            response
                .secret_string()
                .filter(|payload| !payload.trim().is_empty())
                .map(str::to_owned)
                .ok_or(SecretStoreError::EmptyPayload)
        })
    }
}

fn classify<E, R>(err: &SdkError<E, R>) -> SecretStoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::ServiceError(service) => {
            let inner = service.err();
            classify_code(
                inner.code().unwrap_or("Unknown"),
                inner.message().unwrap_or_default(),
            )
        }
        other => SecretStoreError::Unreachable {
            message: DisplayErrorContext(other).to_string(),
        },
    }
}

pub(super) fn classify_code(code: &str, message: &str) -> SecretStoreError {
    match code {
        "ResourceNotFoundException" => SecretStoreError::NotFound,
        "AccessDeniedException" | "AccessDenied" => SecretStoreError::AccessDenied {
            message: message.to_owned(),
        },
        _ => SecretStoreError::Service {
            code: code.to_owned(),
            message: message.to_owned(),
        },
    }
}
