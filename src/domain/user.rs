use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub subscription_tier: SubscriptionTier,
    pub remaining_credits: i64,
    pub billing_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Pro,
    Enterprise,
}

impl SubscriptionTier {
    pub const ALL: [SubscriptionTier; 3] = [
        SubscriptionTier::Free,
        SubscriptionTier::Pro,
        SubscriptionTier::Enterprise,
    ];
}

impl User {
    /// New users always start on the free tier with `starting_credits`.
    pub fn new(name: String, email: String, password_hash: String, starting_credits: i64) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().simple().to_string(),
            name,
            email,
            password_hash,
            subscription_tier: SubscriptionTier::Free,
            remaining_credits: starting_credits,
            billing_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_afford(&self, cost: i64) -> bool {
        self.remaining_credits > 0 && self.remaining_credits >= cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn new_user_starts_on_free_tier_with_grant() {
        let user = User::new(
            "Ada".to_string(),
            "ada@x.com".to_string(),
            "hash".to_string(),
            200,
        );

        assert_eq!(user.subscription_tier, SubscriptionTier::Free);
        assert_eq!(user.remaining_credits, 200);
        assert_eq!(user.id.len(), 32);
        assert!(!user.id.contains('-'));
    }

    #[test]
    fn can_afford_requires_positive_balance_covering_cost() {
        let mut user = User::new("a".into(), "a@b.c".into(), "h".into(), 10);
        assert!(user.can_afford(10));

        user.remaining_credits = 9;
        assert!(!user.can_afford(10));

        user.remaining_credits = 0;
        assert!(!user.can_afford(0));
    }

    #[test]
    fn tier_round_trips_through_strings() {
        for tier in SubscriptionTier::ALL {
            assert_eq!(SubscriptionTier::from_str(&tier.to_string()).unwrap(), tier);
        }
        assert_eq!(SubscriptionTier::Enterprise.to_string(), "enterprise");
        assert!(SubscriptionTier::from_str("basic").is_err());
    }
}
