use crate::domain::{StoredSubscriptionPlan, SubscriptionPlan, SubscriptionTier};
use crate::infrastructure::{PlanRepository, RepositoryError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Stored model list for plan {plan_id} is corrupt: {reason}")]
    CorruptModelList { plan_id: String, reason: String },
    #[error("Plan encoding failed: {0}")]
    Encoding(String),
}

pub struct PlanCatalog<P>
where
    P: PlanRepository,
{
    plan_repo: Arc<P>,
}

impl<P> PlanCatalog<P>
where
    P: PlanRepository,
{
    pub fn new(plan_repo: Arc<P>) -> Self {
        Self { plan_repo }
    }

    /// Insert the built-in plan for every tier that has none. Existing rows are never touched.
    pub async fn seed(&self) -> Result<usize, CatalogError> {
        let mut inserted = 0;

        for plan in SubscriptionPlan::defaults() {
            let stored = plan
                .encode()
                .map_err(|e| CatalogError::Encoding(e.to_string()))?;

            if self.plan_repo.insert_if_absent(&stored).await? {
                info!(tier = %plan.tier, plan_id = %plan.id, "Seeded subscription plan");
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    pub async fn list_plans(&self) -> Result<Vec<SubscriptionPlan>, CatalogError> {
        self.plan_repo
            .list()
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn plan_for_tier(
        &self,
        tier: SubscriptionTier,
    ) -> Result<Option<SubscriptionPlan>, CatalogError> {
        self.plan_repo
            .get_by_tier(tier)
            .await?
            .map(decode)
            .transpose()
    }
}

fn decode(stored: StoredSubscriptionPlan) -> Result<SubscriptionPlan, CatalogError> {
    let plan_id = stored.id.clone();
    SubscriptionPlan::try_from(stored).map_err(|e| CatalogError::CorruptModelList {
        plan_id,
        reason: e.to_string(),
    })
}
