use super::http_types::{ErrorBody, ErrorCode};
use crate::application::{CatalogError, ContentError, IdentityError};
use crate::infrastructure::RepositoryError;
use tracing::error;

const INTERNAL_MESSAGE: &str = "Internal server error";

fn internal(context: &str, err: &dyn std::fmt::Display) -> ErrorBody {
    error!(error = %err, "{}", context);
    ErrorBody::new(ErrorCode::InternalError, INTERNAL_MESSAGE)
}

pub(super) fn map_identity_error(err: &IdentityError) -> ErrorBody {
    match err {
        IdentityError::Validation(errors) => {
            ErrorBody::new(ErrorCode::ValidationError, errors.to_string())
        }
        IdentityError::Conflict => ErrorBody::new(
            ErrorCode::Conflict,
            "An account with this email already exists",
        ),
        IdentityError::Unauthorized => {
            ErrorBody::new(ErrorCode::Unauthorized, "Invalid credentials")
        }
        IdentityError::Repository(RepositoryError::NotFound(_)) => {
            ErrorBody::new(ErrorCode::NotFound, "User not found")
        }
        _ => internal("Identity operation failed", err),
    }
}

pub(super) fn map_content_error(err: &ContentError) -> ErrorBody {
    match err {
        ContentError::UserNotFound(_) => ErrorBody::new(ErrorCode::NotFound, "User not found"),
        ContentError::ContentNotFound(_) => {
            ErrorBody::new(ErrorCode::NotFound, "Content not found")
        }
        ContentError::InsufficientCredits { required } => ErrorBody::new(
            ErrorCode::InsufficientCredits,
            format!("Insufficient credits: {} required", required),
        ),
        ContentError::GenerationFailed(e) => {
            error!(error = %e, "Content generation failed");
            ErrorBody::new(ErrorCode::GenerationFailed, "Content generation failed")
        }
        ContentError::Repository(_) => internal("Content workflow failed", err),
    }
}

pub(super) fn map_catalog_error(err: &CatalogError) -> ErrorBody {
    internal("Plan catalog failed", err)
}

pub(super) fn missing_token() -> ErrorBody {
    ErrorBody::new(ErrorCode::Unauthorized, "Missing or invalid authorization token")
}
