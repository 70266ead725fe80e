use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_scalar, FromRow, PgPool, Type};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "subscription_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Expired,
}

/// Subscriptions are written by the billing side; this service only reads
/// them to decide premium access.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn grants_premium_at(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        ) && self.current_period_end > now
    }

    pub async fn has_active_premium(pool: &PgPool, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let active = query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM subscriptions
                WHERE user_id = $1
                AND status IN ('active', 'trialing')
                AND current_period_end > $2
            )
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(active)
    }
}
