use super::SubscriptionTier;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel stored in `tokens_per_month` for plans without a monthly cap.
pub const UNLIMITED_TOKENS: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionPlan {
    pub id: String,
    pub tier: SubscriptionTier,
    pub name: String,
    pub price_cents: i64,
    pub tokens_per_month: i64,
    pub models_available: Vec<String>,
}

/// Row shape of `subscription_plans`: the model list is kept as a JSON text column.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSubscriptionPlan {
    pub id: String,
    pub tier: SubscriptionTier,
    pub name: String,
    pub price_cents: i64,
    pub tokens_per_month: i64,
    pub models_available: String,
}

impl SubscriptionPlan {
    pub fn is_unlimited(&self) -> bool {
        self.tokens_per_month == UNLIMITED_TOKENS
    }

    pub fn allows_model(&self, model: &str) -> bool {
        self.models_available.iter().any(|m| m == model)
    }

    /// Built-in plan for a tier, as seeded into an empty catalog.
    pub fn default_for(tier: SubscriptionTier) -> Self {
        let (name, price_cents, tokens_per_month, models) = match tier {
            SubscriptionTier::Free => ("Free", 0, 10_000, vec!["llama2-7b"]),
            SubscriptionTier::Pro => ("Pro", 2_999, 500_000, vec!["llama2-7b", "mistral-7b"]),
            SubscriptionTier::Enterprise => (
                "Enterprise",
                99_999,
                UNLIMITED_TOKENS,
                vec!["llama2-7b", "mistral-7b"],
            ),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            tier,
            name: name.to_string(),
            price_cents,
            tokens_per_month,
            models_available: models.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        SubscriptionTier::ALL
            .into_iter()
            .map(Self::default_for)
            .collect()
    }

    pub fn encode(&self) -> Result<StoredSubscriptionPlan, serde_json::Error> {
        Ok(StoredSubscriptionPlan {
            id: self.id.clone(),
            tier: self.tier,
            name: self.name.clone(),
            price_cents: self.price_cents,
            tokens_per_month: self.tokens_per_month,
            models_available: serde_json::to_string(&self.models_available)?,
        })
    }
}

impl TryFrom<StoredSubscriptionPlan> for SubscriptionPlan {
    type Error = serde_json::Error;

    fn try_from(stored: StoredSubscriptionPlan) -> Result<Self, Self::Error> {
        let models_available: Vec<String> = serde_json::from_str(&stored.models_available)?;

        Ok(Self {
            id: stored.id,
            tier: stored.tier,
            name: stored.name,
            price_cents: stored.price_cents,
            tokens_per_month: stored.tokens_per_month,
            models_available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_tier_once() {
        let plans = SubscriptionPlan::defaults();
        assert_eq!(plans.len(), 3);
        for tier in SubscriptionTier::ALL {
            assert_eq!(plans.iter().filter(|p| p.tier == tier).count(), 1);
        }
    }

    #[test]
    fn enterprise_is_unlimited_and_free_is_not() {
        assert!(SubscriptionPlan::default_for(SubscriptionTier::Enterprise).is_unlimited());
        assert!(!SubscriptionPlan::default_for(SubscriptionTier::Free).is_unlimited());
    }

    #[test]
    fn model_list_is_stored_as_json_and_keeps_order() {
        let plan = SubscriptionPlan::default_for(SubscriptionTier::Pro);
        let stored = plan.encode().unwrap();
        assert_eq!(stored.models_available, r#"["llama2-7b","mistral-7b"]"#);

        let decoded = SubscriptionPlan::try_from(stored).unwrap();
        assert_eq!(decoded, plan);
        assert!(decoded.allows_model("mistral-7b"));
    }

    #[test]
    fn corrupt_model_list_fails_to_decode() {
        let mut stored = SubscriptionPlan::default_for(SubscriptionTier::Free)
            .encode()
            .unwrap();
        stored.models_available = "llama2-7b".to_string();

        assert!(SubscriptionPlan::try_from(stored).is_err());
    }
}
