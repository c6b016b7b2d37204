use crate::domain::{
    ContentKind, ContentRequest, GeneratedContent, RequestStatus, StoredSubscriptionPlan,
    SubscriptionTier, User,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already taken.
    #[must_use]
    async fn create(&self, user: &User) -> Result<(), RepositoryError>;
    #[must_use]
    async fn get_by_id(&self, id: &str) -> Result<User, RepositoryError>;
    #[must_use]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    /// Atomically take `amount` credits if the balance covers it.
    /// Returns the new balance, or `None` when the balance is too low.
    #[must_use]
    async fn reserve_credits(&self, id: &str, amount: i64)
        -> Result<Option<i64>, RepositoryError>;
    /// Give back credits taken by `reserve_credits` for a generation that did not complete.
    #[must_use]
    async fn refund_credits(&self, id: &str, amount: i64) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Insert unless a plan for the same tier exists. Returns whether a row was written.
    #[must_use]
    async fn insert_if_absent(&self, plan: &StoredSubscriptionPlan)
        -> Result<bool, RepositoryError>;
    #[must_use]
    async fn get_by_tier(
        &self,
        tier: SubscriptionTier,
    ) -> Result<Option<StoredSubscriptionPlan>, RepositoryError>;
    #[must_use]
    async fn list(&self) -> Result<Vec<StoredSubscriptionPlan>, RepositoryError>;
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    #[must_use]
    async fn create_request(&self, request: &ContentRequest) -> Result<(), RepositoryError>;
    #[must_use]
    async fn get_request(&self, request_id: &str) -> Result<ContentRequest, RepositoryError>;
    /// Store `content` and move its request from pending to completed in one transaction.
    #[must_use]
    async fn complete_request(
        &self,
        request_id: &str,
        content: &GeneratedContent,
    ) -> Result<(), RepositoryError>;
    /// Move a pending request to failed. Terminal requests are left alone.
    #[must_use]
    async fn fail_request(&self, request_id: &str) -> Result<(), RepositoryError>;
    #[must_use]
    async fn list_requests_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ContentRequest>, RepositoryError>;
    #[must_use]
    async fn list_content_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<GeneratedContent>, RepositoryError>;
    /// Only matches content whose parent request belongs to `user_id`.
    #[must_use]
    async fn get_content_for_user(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> Result<GeneratedContent, RepositoryError>;
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, subscription_tier,
                               remaining_credits, billing_customer_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.subscription_tier.to_string())
        .bind(user.remaining_credits)
        .bind(&user.billing_customer_id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(format!("User with email {}", user.email))
            } else {
                RepositoryError::DatabaseError(e)
            }
        })?;

        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<User, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, subscription_tier,
                   remaining_credits, billing_customer_id, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(format!("User {}", id)),
            _ => RepositoryError::DatabaseError(e),
        })?;

        row_to_user(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, subscription_tier,
                   remaining_credits, billing_customer_id, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn reserve_credits(
        &self,
        id: &str,
        amount: i64,
    ) -> Result<Option<i64>, RepositoryError> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET remaining_credits = remaining_credits - $1, updated_at = $2
            WHERE id = $3 AND remaining_credits >= $1
            RETURNING remaining_credits
            "#,
        )
        .bind(amount)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(remaining)
    }

    async fn refund_credits(&self, id: &str, amount: i64) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE users
            SET remaining_credits = remaining_credits + $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(amount)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<User, RepositoryError> {
    let tier_str: String = row.try_get("subscription_tier")?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        subscription_tier: SubscriptionTier::from_str(&tier_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown tier: {}", tier_str)))?,
        remaining_credits: row.try_get("remaining_credits")?,
        billing_customer_id: row.try_get("billing_customer_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PostgresPlanRepository {
    pool: PgPool,
}

impl PostgresPlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanRepository for PostgresPlanRepository {
    async fn insert_if_absent(
        &self,
        plan: &StoredSubscriptionPlan,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscription_plans (id, tier, name, price_cents, tokens_per_month,
                                            models_available, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (tier) DO NOTHING
            "#,
        )
        .bind(&plan.id)
        .bind(plan.tier.to_string())
        .bind(&plan.name)
        .bind(plan.price_cents)
        .bind(plan.tokens_per_month)
        .bind(&plan.models_available)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_by_tier(
        &self,
        tier: SubscriptionTier,
    ) -> Result<Option<StoredSubscriptionPlan>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, tier, name, price_cents, tokens_per_month, models_available
            FROM subscription_plans
            WHERE tier = $1
            "#,
        )
        .bind(tier.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_plan).transpose()
    }

    async fn list(&self) -> Result<Vec<StoredSubscriptionPlan>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tier, name, price_cents, tokens_per_month, models_available
            FROM subscription_plans
            ORDER BY price_cents ASC, tier ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_plan).collect()
    }
}

fn row_to_plan(row: &sqlx::postgres::PgRow) -> Result<StoredSubscriptionPlan, RepositoryError> {
    let tier_str: String = row.try_get("tier")?;

    Ok(StoredSubscriptionPlan {
        id: row.try_get("id")?,
        tier: SubscriptionTier::from_str(&tier_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown tier: {}", tier_str)))?,
        name: row.try_get("name")?,
        price_cents: row.try_get("price_cents")?,
        tokens_per_month: row.try_get("tokens_per_month")?,
        models_available: row.try_get("models_available")?,
    })
}

pub struct PostgresContentRepository {
    pool: PgPool,
}

impl PostgresContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentRepository for PostgresContentRepository {
    async fn create_request(&self, request: &ContentRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO content_requests (id, user_id, model, kind, prompt, status,
                                          created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&request.id)
        .bind(&request.user_id)
        .bind(&request.model)
        .bind(request.kind.to_string())
        .bind(&request.prompt)
        .bind(request.status.to_string())
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_request(&self, request_id: &str) -> Result<ContentRequest, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, model, kind, prompt, status, created_at, updated_at
            FROM content_requests
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                RepositoryError::NotFound(format!("Content request {}", request_id))
            }
            _ => RepositoryError::DatabaseError(e),
        })?;

        row_to_request(&row)
    }

    async fn complete_request(
        &self,
        request_id: &str,
        content: &GeneratedContent,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE content_requests
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(RequestStatus::Completed.to_string())
        .bind(Utc::now())
        .bind(request_id)
        .bind(RequestStatus::Pending.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(RepositoryError::InvalidData(format!(
                "Content request {} is not pending",
                request_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO generated_contents (id, request_id, output, version, cache_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&content.id)
        .bind(request_id)
        .bind(&content.output)
        .bind(content.version)
        .bind(&content.cache_key)
        .bind(content.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fail_request(&self, request_id: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE content_requests
            SET status = $1, updated_at = $2
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(RequestStatus::Failed.to_string())
        .bind(Utc::now())
        .bind(request_id)
        .bind(RequestStatus::Pending.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_requests_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ContentRequest>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, model, kind, prompt, status, created_at, updated_at
            FROM content_requests
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect()
    }

    async fn list_content_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<GeneratedContent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT g.id, g.request_id, g.output, g.version, g.cache_key, g.created_at
            FROM generated_contents g
            JOIN content_requests r ON r.id = g.request_id
            WHERE r.user_id = $1
            ORDER BY g.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_content).collect()
    }

    async fn get_content_for_user(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> Result<GeneratedContent, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT g.id, g.request_id, g.output, g.version, g.cache_key, g.created_at
            FROM generated_contents g
            JOIN content_requests r ON r.id = g.request_id
            WHERE r.user_id = $1 AND g.id = $2
            "#,
        )
        .bind(user_id)
        .bind(content_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                RepositoryError::NotFound(format!("Content {}", content_id))
            }
            _ => RepositoryError::DatabaseError(e),
        })?;

        row_to_content(&row)
    }
}

fn row_to_request(row: &sqlx::postgres::PgRow) -> Result<ContentRequest, RepositoryError> {
    let kind_str: String = row.try_get("kind")?;
    let status_str: String = row.try_get("status")?;

    Ok(ContentRequest {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        model: row.try_get("model")?,
        kind: ContentKind::from_str(&kind_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown kind: {}", kind_str)))?,
        prompt: row.try_get("prompt")?,
        status: RequestStatus::from_str(&status_str)
            .map_err(|_| RepositoryError::InvalidData(format!("Unknown status: {}", status_str)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_content(row: &sqlx::postgres::PgRow) -> Result<GeneratedContent, RepositoryError> {
    Ok(GeneratedContent {
        id: row.try_get("id")?,
        request_id: row.try_get("request_id")?,
        output: row.try_get("output")?,
        version: row.try_get("version")?,
        cache_key: row.try_get("cache_key")?,
        created_at: row.try_get("created_at")?,
    })
}
