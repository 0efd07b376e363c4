// src/profile.rs
use chrono::NaiveDate;
use tracing::info;

use crate::remote::{DataSource, FetchError, OnboardingProfile, Subscription};

const FALLBACK_NAME: &str = "User";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSummary {
    pub display_name: String,
    pub plan: String,
    pub valid_until: Option<NaiveDate>,
}

impl ProfileSummary {
    pub fn from_records(onboarding: &OnboardingProfile, subscription: &Subscription) -> Self {
        let display_name = onboarding
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_NAME)
            .to_string();
        Self {
            display_name,
            plan: subscription.plan().to_string(),
            valid_until: if subscription.is_free() {
                None
            } else {
                subscription.end_date.map(|d| d.date_naive())
            },
        }
    }

    /// Second line of the plan card, e.g. "Valid until 2024-06-30".
    pub fn plan_status(&self) -> String {
        match self.valid_until {
            Some(date) => format!("Valid until {}", date.format("%Y-%m-%d")),
            None => "Basic features".to_string(),
        }
    }
}

/// Fetches the onboarding answers and the subscription of `user_id`.
pub async fn load_profile<S: DataSource>(
    source: &S,
    user_id: &str,
) -> Result<ProfileSummary, FetchError> {
    let onboarding = source.get_onboarding_profile(user_id).await?;
    let subscription = source.get_subscription(user_id).await?;
    info!("Loaded profile for user {}", user_id);
    Ok(ProfileSummary::from_records(&onboarding, &subscription))
}
