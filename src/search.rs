// src/search.rs
//! Browsing the backend exercise catalog by muscle group and free-text query.
use thiserror::Error;
use tracing::{info, warn};

use crate::remote::{CatalogExercise, DataSource, FetchError, MuscleGroup};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Unknown muscle group: {0}")]
    UnknownMuscleGroup(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loading,
    Ready,
    /// Message shown to the user in place of results.
    Failed(String),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SearchResults<'a> {
    pub muscle_groups: Vec<&'a MuscleGroup>,
    pub exercises: Vec<&'a CatalogExercise>,
}

#[derive(Debug, Default)]
pub struct ExerciseSearch {
    query: String,
    selected_group: Option<MuscleGroup>,
    muscle_groups: Vec<MuscleGroup>,
    all_exercises: Vec<CatalogExercise>,
    group_exercises: Vec<CatalogExercise>,
    status: LoadState,
}

fn matches_query(text: &str, query: &str) -> bool {
    text.to_lowercase().contains(query)
}

impl ExerciseSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn status(&self) -> &LoadState {
        &self.status
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub const fn selected_group(&self) -> Option<&MuscleGroup> {
        self.selected_group.as_ref()
    }

    pub fn muscle_groups(&self) -> &[MuscleGroup] {
        &self.muscle_groups
    }

    fn fail(&mut self, err: FetchError) -> FetchError {
        warn!("Exercise search fetch failed: {}", err);
        self.status = LoadState::Failed(err.to_string());
        err
    }

    /// Loads all muscle groups and all exercises. Call once before searching.
    pub async fn initialize<S: DataSource>(&mut self, source: &S) -> Result<(), FetchError> {
        self.status = LoadState::Loading;
        let muscle_groups = match source.list_muscle_groups().await {
            Ok(groups) => groups,
            Err(err) => return Err(self.fail(err)),
        };
        let exercises = match source.list_exercises(None).await {
            Ok(exercises) => exercises,
            Err(err) => return Err(self.fail(err)),
        };
        info!(
            "Loaded {} muscle group(s) and {} exercise(s)",
            muscle_groups.len(),
            exercises.len()
        );
        self.muscle_groups = muscle_groups;
        self.all_exercises = exercises;
        self.status = LoadState::Ready;
        Ok(())
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    /// Opens a muscle group by name and loads its exercises. Clears the query once loaded;
    /// on a failed fetch the query and the current view are kept.
    pub async fn select_muscle_group<S: DataSource>(
        &mut self,
        name: &str,
        source: &S,
    ) -> Result<(), SearchError> {
        let group = self
            .muscle_groups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
            .ok_or_else(|| SearchError::UnknownMuscleGroup(name.to_string()))?;

        self.status = LoadState::Loading;
        let exercises = match source.list_exercises(Some(&group.id)).await {
            Ok(exercises) => exercises,
            Err(err) => return Err(self.fail(err).into()),
        };
        self.group_exercises = exercises;
        self.selected_group = Some(group);
        self.query.clear();
        self.status = LoadState::Ready;
        Ok(())
    }

    /// Leaves the open muscle group and clears the query.
    pub fn back_to_groups(&mut self) {
        self.selected_group = None;
        self.group_exercises.clear();
        self.query.clear();
    }

    /// Case-insensitive substring filter over the loaded data.
    ///
    /// On the overview, groups are filtered and exercises only appear once a query is typed.
    /// Inside a group, only that group's exercises are listed.
    pub fn results(&self) -> SearchResults<'_> {
        let query = self.query.trim().to_lowercase();
        if self.selected_group.is_some() {
            return SearchResults {
                muscle_groups: Vec::new(),
                exercises: self
                    .group_exercises
                    .iter()
                    .filter(|e| matches_query(&e.title, &query))
                    .collect(),
            };
        }

        let exercises = if query.is_empty() {
            Vec::new()
        } else {
            self.all_exercises
                .iter()
                .filter(|e| matches_query(&e.title, &query))
                .collect()
        };
        SearchResults {
            muscle_groups: self
                .muscle_groups
                .iter()
                .filter(|g| matches_query(&g.name, &query))
                .collect(),
            exercises,
        }
    }

    pub fn muscle_group_name(&self, muscle_group_id: &str) -> Option<&str> {
        self.muscle_groups
            .iter()
            .find(|g| g.id == muscle_group_id)
            .map(|g| g.name.as_str())
    }

    /// Looks up a loaded exercise by title, in the open group first.
    pub fn find_exercise(&self, title: &str) -> Option<&CatalogExercise> {
        let title = title.trim();
        self.group_exercises
            .iter()
            .chain(&self.all_exercises)
            .find(|e| e.title.eq_ignore_ascii_case(title))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::remote::{OnboardingProfile, Subscription};

    struct FakeBackend {
        groups: Vec<MuscleGroup>,
        exercises: Vec<CatalogExercise>,
        fail: bool,
    }

    fn group(id: &str, name: &str) -> MuscleGroup {
        MuscleGroup {
            id: id.to_string(),
            name: name.to_string(),
            image_url: None,
            created_at: None,
        }
    }

    fn exercise(id: &str, title: &str, group_id: &str) -> CatalogExercise {
        CatalogExercise {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            video_url: format!("https://youtu.be/{id}"),
            image_url: None,
            muscle_group_id: group_id.to_string(),
            created_at: None,
        }
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                groups: vec![group("g-back", "Back"), group("g-legs", "Legs")],
                exercises: vec![
                    exercise("e1", "Barbell Row", "g-back"),
                    exercise("e2", "Leg Press", "g-legs"),
                    exercise("e3", "Pull-up", "g-back"),
                    exercise("e4", "Squat", "g-legs"),
                ],
                fail: false,
            }
        }

        fn check(&self) -> Result<(), FetchError> {
            if self.fail {
                Err(FetchError::Status {
                    table: "muscle_groups",
                    status: 503,
                    body: "unavailable".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl DataSource for FakeBackend {
        async fn get_onboarding_profile(&self, user_id: &str) -> Result<OnboardingProfile, FetchError> {
            Err(FetchError::NotFound {
                table: "onboarding_responses",
                key: user_id.to_string(),
            })
        }

        async fn get_subscription(&self, user_id: &str) -> Result<Subscription, FetchError> {
            Err(FetchError::NotFound {
                table: "user_subscriptions",
                key: user_id.to_string(),
            })
        }

        async fn list_muscle_groups(&self) -> Result<Vec<MuscleGroup>, FetchError> {
            self.check()?;
            Ok(self.groups.clone())
        }

        async fn list_exercises(
            &self,
            muscle_group_id: Option<&str>,
        ) -> Result<Vec<CatalogExercise>, FetchError> {
            self.check()?;
            Ok(self
                .exercises
                .iter()
                .filter(|e| muscle_group_id.map_or(true, |id| e.muscle_group_id == id))
                .cloned()
                .collect())
        }

        async fn record_completion(&self, _user_id: &str, _date: NaiveDate) -> Result<(), FetchError> {
            Ok(())
        }
    }

    fn titles(results: &SearchResults<'_>) -> Vec<String> {
        results.exercises.iter().map(|e| e.title.clone()).collect()
    }

    #[tokio::test]
    async fn test_overview_hides_exercises_without_query() {
        let backend = FakeBackend::new();
        let mut search = ExerciseSearch::new();
        search.initialize(&backend).await.unwrap();
        assert_eq!(search.status(), &LoadState::Ready);

        let results = search.results();
        assert_eq!(results.muscle_groups.len(), 2);
        assert!(results.exercises.is_empty());
    }

    #[tokio::test]
    async fn test_overview_query_filters_groups_and_exercises() {
        let backend = FakeBackend::new();
        let mut search = ExerciseSearch::new();
        search.initialize(&backend).await.unwrap();

        search.set_query("LEG");
        let results = search.results();
        let groups: Vec<&str> = results.muscle_groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(groups, vec!["Legs"]);
        assert_eq!(titles(&results), vec!["Leg Press"]);

        search.set_query("u");
        assert_eq!(titles(&search.results()), vec!["Pull-up", "Squat"]);
    }

    #[tokio::test]
    async fn test_inside_group_lists_only_its_exercises() {
        let backend = FakeBackend::new();
        let mut search = ExerciseSearch::new();
        search.initialize(&backend).await.unwrap();
        search.set_query("squat");

        search.select_muscle_group("back", &backend).await.unwrap();
        assert_eq!(search.query(), "");
        let results = search.results();
        assert!(results.muscle_groups.is_empty());
        assert_eq!(titles(&results), vec!["Barbell Row", "Pull-up"]);

        search.set_query("pull");
        assert_eq!(titles(&search.results()), vec!["Pull-up"]);
        assert_eq!(search.muscle_group_name("g-back"), Some("Back"));

        search.back_to_groups();
        assert!(search.selected_group().is_none());
        assert!(search.results().exercises.is_empty());
        assert_eq!(search.find_exercise("squat").unwrap().id, "e4");
    }

    #[tokio::test]
    async fn test_unknown_group() {
        let backend = FakeBackend::new();
        let mut search = ExerciseSearch::new();
        search.initialize(&backend).await.unwrap();
        assert!(matches!(
            search.select_muscle_group("Arms", &backend).await,
            Err(SearchError::UnknownMuscleGroup(name)) if name == "Arms"
        ));
    }

    #[tokio::test]
    async fn test_failed_group_fetch_keeps_query() {
        let backend = FakeBackend::new();
        let mut search = ExerciseSearch::new();
        search.initialize(&backend).await.unwrap();
        search.set_query("row");

        let offline = FakeBackend {
            fail: true,
            ..FakeBackend::new()
        };
        assert!(matches!(
            search.select_muscle_group("Back", &offline).await,
            Err(SearchError::Fetch(_))
        ));
        assert_eq!(search.query(), "row");
        assert!(search.selected_group().is_none());
        assert!(matches!(search.status(), LoadState::Failed(_)));
        assert_eq!(titles(&search.results()), vec!["Barbell Row"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_surfaced_as_state() {
        let backend = FakeBackend {
            fail: true,
            ..FakeBackend::new()
        };
        let mut search = ExerciseSearch::new();
        assert!(search.initialize(&backend).await.is_err());
        assert!(matches!(search.status(), LoadState::Failed(message) if message.contains("503")));
        assert!(search.results().muscle_groups.is_empty());
    }
}
