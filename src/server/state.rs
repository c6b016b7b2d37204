use crate::application::{ContentWorkflow, IdentityService, PlanCatalog};
use crate::infrastructure::{
    AppConfig, CloudflareAiClient, PostgresContentRepository, PostgresPlanRepository,
    PostgresUserRepository, S3BlobStore,
};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

pub type IdentityServiceType = IdentityService<PostgresUserRepository>;

pub type PlanCatalogType = PlanCatalog<PostgresPlanRepository>;

pub type ContentWorkflowType =
    ContentWorkflow<PostgresUserRepository, PostgresContentRepository, CloudflareAiClient>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub identity: Arc<IdentityServiceType>,
    pub catalog: Arc<PlanCatalogType>,
    pub content: Arc<ContentWorkflowType>,
    pub frontend_url: Option<String>,
}

/// Build full state from config + an existing pool.
///
/// Intended for embedding into a larger service that already manages a `PgPool`.
/// Default subscription plans are seeded before the state is returned.
pub async fn build_state_with_pool(
    config: AppConfig,
    pool: PgPool,
    run_migrations: bool,
) -> anyhow::Result<AppState> {
    if run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("run migrations")?;
    }

    let auth_settings = config.auth_settings();
    if auth_settings.uses_insecure_default() {
        warn!(
            "STUDIO_JWT_SECRET is not set; falling back to the built-in development secret. \
             Tokens signed with it are forgeable, never run like this in production."
        );
    }

    let blob_store = Arc::new(
        S3BlobStore::from_region(config.s3_bucket.clone(), config.aws_region.clone()).await,
    );

    let ai_client = Arc::new(
        CloudflareAiClient::new(
            config.cloudflare_base_url.clone(),
            config.cloudflare_account_id.clone(),
            config.cloudflare_api_token.clone(),
            config.ai_timeout(),
            blob_store,
        )
        .context("init Cloudflare AI client")?,
    );

    let user_repo = Arc::new(PostgresUserRepository::new(pool.clone()));
    let plan_repo = Arc::new(PostgresPlanRepository::new(pool.clone()));
    let content_repo = Arc::new(PostgresContentRepository::new(pool.clone()));

    let catalog = Arc::new(PlanCatalog::new(plan_repo));
    let seeded = catalog.seed().await.context("seed subscription plans")?;
    info!(seeded, "Subscription plans ready");

    let identity = Arc::new(IdentityService::new(user_repo.clone(), auth_settings));

    let content = Arc::new(ContentWorkflow::new(
        user_repo,
        content_repo,
        ai_client,
        config.generation_cost,
    ));

    Ok(AppState {
        pool,
        identity,
        catalog,
        content,
        frontend_url: config.frontend_url,
    })
}

/// Build state for the standalone server.
///
/// Creates the `PgPool`, runs migrations, and wires repositories/services.
pub async fn build_state_from_env(config: AppConfig) -> anyhow::Result<AppState> {
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("connect database")?;
    build_state_with_pool(config, pool, true).await
}
