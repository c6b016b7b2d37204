use crate::domain::{ContentRequest, GeneratedContent, SubscriptionPlan, User};
use crate::infrastructure::DEFAULT_TEXT_MODEL;
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Every response body is one of these two shapes, tagged by `status`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(super) enum ApiResponse<T> {
    Success { data: T },
    Error { error: ErrorBody },
}

pub(super) type ApiReply<T> = (StatusCode, Json<ApiResponse<T>>);

pub(super) fn reply<T>(status: StatusCode, data: T) -> ApiReply<T> {
    (status, Json(ApiResponse::Success { data }))
}

pub(super) fn reject<T>(status: StatusCode, error: ErrorBody) -> ApiReply<T> {
    (status, Json(ApiResponse::Error { error }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub(super) enum ErrorCode {
    ValidationError,
    Unauthorized,
    Conflict,
    NotFound,
    InsufficientCredits,
    GenerationFailed,
    InternalError,
}

impl ErrorCode {
    pub(super) fn status(self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            ErrorCode::GenerationFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub(super) struct ErrorBody {
    pub(super) code: ErrorCode,
    pub(super) message: String,
}

impl ErrorBody {
    pub(super) fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(super) fn into_reply<T>(self) -> ApiReply<T> {
        reject(self.code.status(), self)
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct HealthResponse {
    pub(super) status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct RegisterRequest {
    #[schema(example = "Ada")]
    pub(super) name: String,
    #[schema(example = "ada@example.com")]
    pub(super) email: String,
    #[schema(example = "correct horse")]
    pub(super) password: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub(super) email: String,
    pub(super) password: String,
}

#[derive(Deserialize, ToSchema)]
pub(super) struct GenerateRequest {
    #[serde(default = "default_model")]
    #[schema(example = "mistral-7b")]
    pub(super) model: String,
    #[schema(example = "write a tagline for a bakery")]
    pub(super) prompt: String,
}

fn default_model() -> String {
    DEFAULT_TEXT_MODEL.to_string()
}

#[derive(Deserialize, ToSchema)]
pub(super) struct GenerateImageRequest {
    #[schema(example = "a sunrise over a small bakery")]
    pub(super) prompt: String,
}

#[derive(Serialize, ToSchema)]
pub(super) struct UserSummary {
    pub(super) id: String,
    pub(super) name: String,
    pub(super) email: String,
    pub(super) subscription_tier: String,
    pub(super) remaining_credits: i64,
    pub(super) created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            subscription_tier: user.subscription_tier.to_string(),
            remaining_credits: user.remaining_credits,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct AuthResponse {
    pub(super) user: UserSummary,
    pub(super) token: String,
}

#[derive(Serialize, ToSchema)]
pub(super) struct PlanResponse {
    pub(super) id: String,
    pub(super) tier: String,
    pub(super) name: String,
    pub(super) price_cents: i64,
    /// `-1` means unlimited.
    pub(super) tokens_per_month: i64,
    pub(super) models_available: Vec<String>,
}

impl From<SubscriptionPlan> for PlanResponse {
    fn from(plan: SubscriptionPlan) -> Self {
        Self {
            id: plan.id,
            tier: plan.tier.to_string(),
            name: plan.name,
            price_cents: plan.price_cents,
            tokens_per_month: plan.tokens_per_month,
            models_available: plan.models_available,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct CurrentUserResponse {
    pub(super) user: UserSummary,
    pub(super) plan: Option<PlanResponse>,
}

#[derive(Serialize, ToSchema)]
pub(super) struct ContentResponse {
    pub(super) id: String,
    pub(super) request_id: String,
    pub(super) output: String,
    pub(super) version: i32,
    pub(super) cache_key: Option<String>,
    pub(super) created_at: chrono::DateTime<chrono::Utc>,
}

impl From<GeneratedContent> for ContentResponse {
    fn from(content: GeneratedContent) -> Self {
        Self {
            id: content.id,
            request_id: content.request_id,
            output: content.output,
            version: content.version,
            cache_key: content.cache_key,
            created_at: content.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub(super) struct RequestResponse {
    pub(super) id: String,
    pub(super) model: String,
    pub(super) kind: String,
    pub(super) prompt: String,
    pub(super) status: String,
    pub(super) created_at: chrono::DateTime<chrono::Utc>,
    pub(super) updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ContentRequest> for RequestResponse {
    fn from(request: ContentRequest) -> Self {
        Self {
            id: request.id,
            model: request.model,
            kind: request.kind.to_string(),
            prompt: request.prompt,
            status: request.status.to_string(),
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}
