// src/remote.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to the backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Backend returned {status} for '{table}': {body}")]
    Status {
        table: &'static str,
        status: u16,
        body: String,
    },
    #[error("Malformed '{table}' record: {reason}")]
    MalformedRecord { table: &'static str, reason: String },
    #[error("No '{table}' record found for {key}")]
    NotFound { table: &'static str, key: String },
}

/// A row type read from the backend, checked before it leaves the fetch layer.
pub trait Record: DeserializeOwned {
    const TABLE: &'static str;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("field '{field}' is empty"))
    } else {
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MuscleGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for MuscleGroup {
    const TABLE: &'static str = "muscle_groups";

    fn validate(&self) -> Result<(), String> {
        require("id", &self.id)?;
        require("name", &self.name)
    }
}

/// Exercise as stored in the backend catalog (no prescription attached).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CatalogExercise {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video_url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub muscle_group_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for CatalogExercise {
    const TABLE: &'static str = "exercises";

    fn validate(&self) -> Result<(), String> {
        require("id", &self.id)?;
        require("title", &self.title)?;
        require("muscle_group_id", &self.muscle_group_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OnboardingProfile {
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

impl Record for OnboardingProfile {
    const TABLE: &'static str = "onboarding_responses";

    fn validate(&self) -> Result<(), String> {
        require("user_id", &self.user_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub user_id: String,
    #[serde(default)]
    pub subscription_type: Option<String>,
    /// Timestamp or plain date column; a plain date means midnight UTC.
    #[serde(default, deserialize_with = "deserialize_end_date")]
    pub end_date: Option<DateTime<Utc>>,
}

fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_end_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_end_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid end_date '{raw}'"))),
    }
}

impl Subscription {
    pub const FREE_PLAN: &'static str = "Free";

    /// Plan name; rows without a type are on the free plan.
    pub fn plan(&self) -> &str {
        self.subscription_type
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(Self::FREE_PLAN)
    }

    pub fn is_free(&self) -> bool {
        self.plan() == Self::FREE_PLAN
    }
}

impl Record for Subscription {
    const TABLE: &'static str = "user_subscriptions";

    fn validate(&self) -> Result<(), String> {
        require("user_id", &self.user_id)?;
        if !self.is_free() && self.end_date.is_none() {
            return Err(format!("paid plan '{}' has no end_date", self.plan()));
        }
        Ok(())
    }
}

/// Decodes and validates one row.
pub fn parse_record<T: Record>(index: usize, value: Value) -> Result<T, FetchError> {
    let malformed = |reason: String| FetchError::MalformedRecord {
        table: T::TABLE,
        reason: format!("row {index}: {reason}"),
    };
    let record: T = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    record.validate().map_err(malformed)?;
    Ok(record)
}

pub fn parse_records<T: Record>(rows: Vec<Value>) -> Result<Vec<T>, FetchError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, value)| parse_record(index, value))
        .collect()
}

/// Reads (and the one completion write) the app needs from the remote database.
#[allow(async_fn_in_trait)]
pub trait DataSource {
    async fn get_onboarding_profile(&self, user_id: &str) -> Result<OnboardingProfile, FetchError>;
    async fn get_subscription(&self, user_id: &str) -> Result<Subscription, FetchError>;
    /// Muscle groups ordered by name.
    async fn list_muscle_groups(&self) -> Result<Vec<MuscleGroup>, FetchError>;
    /// Exercises ordered by title, optionally limited to one muscle group.
    async fn list_exercises(
        &self,
        muscle_group_id: Option<&str>,
    ) -> Result<Vec<CatalogExercise>, FetchError>;
    async fn record_completion(&self, user_id: &str, date: NaiveDate) -> Result<(), FetchError>;
}

const COMPLETIONS_TABLE: &str = "training_completions";

/// `DataSource` over the backend's REST interface (`/rest/v1/<table>`).
#[derive(Debug)]
pub struct RestClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    /// Replaces the HTTP client with one that gives up after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, FetchError> {
        self.http_client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url.trim_end_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.api_key);
        request.header("apikey", &self.api_key).bearer_auth(token)
    }

    async fn check_status(
        table: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error body".to_string());
        error!(
            "Request for '{}' failed with status: {}. Body: {}",
            table, status, body
        );
        Err(FetchError::Status {
            table,
            status: status.as_u16(),
            body,
        })
    }

    async fn select<T: Record>(&self, query: &[(&str, String)]) -> Result<Vec<T>, FetchError> {
        let url = self.table_url(T::TABLE);
        debug!("GET {} {:?}", url, query);

        let response = self
            .authorized(self.http_client.get(&url))
            .query(&[("select", "*")])
            .query(query)
            .send()
            .await?;
        let response = Self::check_status(T::TABLE, response).await?;

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedRecord {
                table: T::TABLE,
                reason: format!("response is not a list of rows: {e}"),
            })?;
        info!("Fetched {} row(s) from '{}'", rows.len(), T::TABLE);
        parse_records(rows)
    }

    async fn select_for_user<T: Record>(&self, user_id: &str) -> Result<T, FetchError> {
        let rows: Vec<T> = self
            .select(&[
                ("user_id", format!("eq.{user_id}")),
                ("limit", "1".to_string()),
            ])
            .await?;
        rows.into_iter().next().ok_or_else(|| FetchError::NotFound {
            table: T::TABLE,
            key: format!("user {user_id}"),
        })
    }
}

impl DataSource for RestClient {
    async fn get_onboarding_profile(&self, user_id: &str) -> Result<OnboardingProfile, FetchError> {
        self.select_for_user(user_id).await
    }

    async fn get_subscription(&self, user_id: &str) -> Result<Subscription, FetchError> {
        self.select_for_user(user_id).await
    }

    async fn list_muscle_groups(&self) -> Result<Vec<MuscleGroup>, FetchError> {
        self.select(&[("order", "name".to_string())]).await
    }

    async fn list_exercises(
        &self,
        muscle_group_id: Option<&str>,
    ) -> Result<Vec<CatalogExercise>, FetchError> {
        let mut query = vec![("order", "title".to_string())];
        if let Some(id) = muscle_group_id {
            query.push(("muscle_group_id", format!("eq.{id}")));
        }
        self.select(&query).await
    }

    async fn record_completion(&self, user_id: &str, date: NaiveDate) -> Result<(), FetchError> {
        let url = self.table_url(COMPLETIONS_TABLE);
        info!("Recording completion of {} for user {}", date, user_id);

        let response = self
            .authorized(self.http_client.post(&url))
            // Same day twice is not an error.
            .header("Prefer", "resolution=ignore-duplicates")
            .json(&json!({ "user_id": user_id, "completed_on": date }))
            .send()
            .await?;
        Self::check_status(COMPLETIONS_TABLE, response).await?;
        Ok(())
    }
}
