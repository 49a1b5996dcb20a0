//! Mapping of RDS SDK failures onto [`ApiError`].

use aws_sdk_rds::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::backend::ApiError;

const NOT_FOUND_CODE: &str = "DBInstanceNotFound";
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Classifies an SDK failure for the instance named `identifier`.
pub(super) fn classify<E, R>(err: &SdkError<E, R>, identifier: &str) -> ApiError
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
                identifier,
            )
        }
        other => ApiError::Transport {
            message: DisplayErrorContext(other).to_string(),
        },
    }
}

/// Classifies a provider error code.
pub(super) fn classify_code(code: &str, message: &str, identifier: &str) -> ApiError {
    if code == NOT_FOUND_CODE {
        return ApiError::NotFound {
            identifier: identifier.to_owned(),
        };
    }
    if THROTTLING_CODES.contains(&code) {
        return ApiError::Throttled {
            message: message.to_owned(),
        };
    }
    ApiError::Rejected {
        code: code.to_owned(),
        message: message.to_owned(),
    }
}
