use super::http_auth::authenticate;
use super::http_errors::{map_catalog_error, map_content_error, map_identity_error};
use super::http_types::{
    reply, ApiReply, AuthResponse, ContentResponse, CurrentUserResponse, ErrorBody, ErrorCode,
    GenerateImageRequest, GenerateRequest, HealthResponse, LoginRequest, PlanResponse,
    RegisterRequest, RequestResponse, UserSummary,
};
use super::state::AppState;
use crate::application::Registration;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, header::HeaderMap, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.frontend_url.as_deref());

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/users/me", get(current_user))
        .route("/generate", post(generate))
        .route("/generate/image", post(generate_image))
        .route("/content", get(list_content))
        .route("/content/:id", get(get_content))
        .route("/requests", get(list_requests))
        .route("/subscription-plans", get(list_plans));

    let app = Router::new()
        .nest("/api/v1", api)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn cors_layer(frontend_url: Option<&str>) -> Option<CorsLayer> {
    let origin = frontend_url.filter(|u| !u.is_empty())?;

    match HeaderValue::from_str(origin) {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        ),
        Err(e) => {
            warn!(error = %e, frontend_url = origin, "Ignoring unusable frontend_url for CORS");
            None
        }
    }
}

/// Unwraps a JSON body or turns the rejection into a `validation_error` reply.
macro_rules! json_body {
    ($payload:expr) => {
        match $payload {
            Ok(Json(body)) => body,
            Err(rejection) => {
                return ErrorBody::new(ErrorCode::ValidationError, rejection.body_text())
                    .into_reply();
            }
        }
    };
}

/// Resolves the caller or returns an `unauthorized` reply.
macro_rules! caller {
    ($state:expr, $headers:expr) => {
        match authenticate(&$headers, |token| $state.identity.validate_token(token).ok()) {
            Ok(user_id) => user_id,
            Err(body) => return body.into_reply(),
        }
    };
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        register,
        login,
        current_user,
        generate,
        generate_image,
        list_content,
        get_content,
        list_requests,
        list_plans,
    ),
    components(
        schemas(
            HealthResponse,
            RegisterRequest,
            LoginRequest,
            GenerateRequest,
            GenerateImageRequest,
            UserSummary,
            AuthResponse,
            CurrentUserResponse,
            PlanResponse,
            ContentResponse,
            RequestResponse,
            ErrorBody,
            ErrorCode,
        )
    ),
    modifiers(&BearerAuthAddon),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Registration and login"),
        (name = "Users", description = "Current user"),
        (name = "Content", description = "Credit-metered content generation"),
        (name = "Plans", description = "Subscription plans"),
    ),
    info(
        title = "Content Studio API",
        version = "0.1.0",
        description = "Credit-metered AI text and image generation. Successful bodies are \
                       wrapped as {\"status\":\"success\",\"data\":...}, failures as \
                       {\"status\":\"error\",\"error\":{\"code\",\"message\"}}.",
        license(name = "MIT")
    )
)]
struct ApiDoc;

struct BearerAuthAddon;

impl Modify for BearerAuthAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Health check endpoint
///
/// Verifies database connectivity and returns service health status.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Health check failed: DB connectivity issue");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    error: Some("Database connectivity failed".to_string()),
                }),
            )
        }
    }
}

/// Register a new account with the starting credit grant
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiReply<AuthResponse> {
    let req = json_body!(payload);

    let registration = Registration {
        name: req.name,
        email: req.email,
        password: req.password,
    };

    match state.identity.register(registration).await {
        Ok(session) => reply(
            StatusCode::CREATED,
            AuthResponse {
                user: session.user.into(),
                token: session.token,
            },
        ),
        Err(e) => map_identity_error(&e).into_reply(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiReply<AuthResponse> {
    let req = json_body!(payload);

    match state.identity.login(&req.email, &req.password).await {
        Ok(session) => {
            info!(user_id = %session.user.id, "User logged in");
            reply(
                StatusCode::OK,
                AuthResponse {
                    user: session.user.into(),
                    token: session.token,
                },
            )
        }
        Err(e) => map_identity_error(&e).into_reply(),
    }
}

/// Current user with the plan of their tier
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = CurrentUserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiReply<CurrentUserResponse> {
    let user_id = caller!(state, headers);

    let user = match state.identity.current_user(&user_id).await {
        Ok(user) => user,
        Err(e) => return map_identity_error(&e).into_reply(),
    };

    let plan = match state.catalog.plan_for_tier(user.subscription_tier).await {
        Ok(plan) => plan.map(PlanResponse::from),
        Err(e) => return map_catalog_error(&e).into_reply(),
    };

    reply(
        StatusCode::OK,
        CurrentUserResponse {
            user: user.into(),
            plan,
        },
    )
}

/// Generate text, charging the generation cost
#[utoipa::path(
    post,
    path = "/api/v1/generate",
    tag = "Content",
    security(("bearer" = [])),
    request_body = GenerateRequest,
    responses(
        (status = 201, description = "Content generated", body = ContentResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 402, description = "Insufficient credits", body = ErrorBody),
        (status = 502, description = "AI provider failed", body = ErrorBody)
    )
)]
async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiReply<ContentResponse> {
    let user_id = caller!(state, headers);
    let req = json_body!(payload);

    if req.prompt.trim().is_empty() {
        return ErrorBody::new(ErrorCode::ValidationError, "prompt is required").into_reply();
    }

    match state.content.generate(&user_id, &req.model, &req.prompt).await {
        Ok(content) => reply(StatusCode::CREATED, content.into()),
        Err(e) => map_content_error(&e).into_reply(),
    }
}

/// Generate an image, charging the generation cost
#[utoipa::path(
    post,
    path = "/api/v1/generate/image",
    tag = "Content",
    security(("bearer" = [])),
    request_body = GenerateImageRequest,
    responses(
        (
            status = 201,
            description = "Image generated; output is its public URL",
            body = ContentResponse
        ),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 402, description = "Insufficient credits", body = ErrorBody),
        (status = 502, description = "AI provider or storage failed", body = ErrorBody)
    )
)]
async fn generate_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateImageRequest>, JsonRejection>,
) -> ApiReply<ContentResponse> {
    let user_id = caller!(state, headers);
    let req = json_body!(payload);

    if req.prompt.trim().is_empty() {
        return ErrorBody::new(ErrorCode::ValidationError, "prompt is required").into_reply();
    }

    match state.content.generate_image(&user_id, &req.prompt).await {
        Ok(content) => reply(StatusCode::CREATED, content.into()),
        Err(e) => map_content_error(&e).into_reply(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/content",
    tag = "Content",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's content, oldest first", body = [ContentResponse]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
async fn list_content(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiReply<Vec<ContentResponse>> {
    let user_id = caller!(state, headers);

    match state.content.get_user_content(&user_id).await {
        Ok(contents) => reply(
            StatusCode::OK,
            contents.into_iter().map(Into::into).collect(),
        ),
        Err(e) => map_content_error(&e).into_reply(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/content/{id}",
    tag = "Content",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "Content ID")),
    responses(
        (status = 200, description = "Content found", body = ContentResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "No such content owned by the caller", body = ErrorBody)
    )
)]
async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiReply<ContentResponse> {
    let user_id = caller!(state, headers);

    match state.content.get_content_by_id(&user_id, &id).await {
        Ok(content) => reply(StatusCode::OK, content.into()),
        Err(e) => map_content_error(&e).into_reply(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/requests",
    tag = "Content",
    security(("bearer" = [])),
    responses(
        (
            status = 200,
            description = "Caller's generation requests, oldest first",
            body = [RequestResponse]
        ),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiReply<Vec<RequestResponse>> {
    let user_id = caller!(state, headers);

    match state.content.list_user_requests(&user_id).await {
        Ok(requests) => reply(
            StatusCode::OK,
            requests.into_iter().map(Into::into).collect(),
        ),
        Err(e) => map_content_error(&e).into_reply(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/subscription-plans",
    tag = "Plans",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All plans ordered by price", body = [PlanResponse]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
async fn list_plans(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiReply<Vec<PlanResponse>> {
    let _user_id = caller!(state, headers);

    match state.catalog.list_plans().await {
        Ok(plans) => reply(StatusCode::OK, plans.into_iter().map(Into::into).collect()),
        Err(e) => map_catalog_error(&e).into_reply(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_requires_a_configured_origin() {
        assert!(cors_layer(None).is_none());
        assert!(cors_layer(Some("")).is_none());
        assert!(cors_layer(Some("https://studio.example.com")).is_some());
    }

    #[test]
    fn cors_ignores_unusable_origin() {
        assert!(cors_layer(Some("bad\norigin")).is_none());
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/health",
            "/api/v1/auth/register",
            "/api/v1/auth/login",
            "/api/v1/users/me",
            "/api/v1/generate",
            "/api/v1/generate/image",
            "/api/v1/content",
            "/api/v1/content/{id}",
            "/api/v1/requests",
            "/api/v1/subscription-plans",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
