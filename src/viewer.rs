// src/viewer.rs
use crate::catalog::Exercise;
use crate::embed::resolve_embed_url;
use crate::remote::CatalogExercise;

/// Sets, reps, rest and tempo of a program exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prescription {
    pub sets: u32,
    pub reps: String,
    pub rest: String,
    pub tempo: String,
}

/// Display-ready form of one exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseView {
    pub title: String,
    pub embed_url: String,
    pub description: String,
    /// Only program exercises carry a prescription; catalog entries from the backend do not.
    pub prescription: Option<Prescription>,
    pub coach_notes: Option<String>,
    pub user_notes: String,
    pub muscle_group: Option<String>,
}

/// Projects a program exercise for display.
///
/// `session_note` takes precedence over the exercise's stored user notes.
pub fn view(exercise: &Exercise, origin: &str, session_note: Option<&str>) -> ExerciseView {
    ExerciseView {
        title: exercise.name.clone(),
        embed_url: resolve_embed_url(&exercise.video_url, origin),
        description: exercise.description.clone(),
        prescription: Some(Prescription {
            sets: exercise.sets,
            reps: exercise.reps.clone(),
            rest: exercise.rest.clone(),
            tempo: exercise.tempo.clone(),
        }),
        coach_notes: exercise.coach_notes.clone(),
        user_notes: session_note.map_or_else(|| exercise.user_notes.clone(), str::to_string),
        muscle_group: None,
    }
}

/// Projects an exercise fetched from the backend catalog.
pub fn view_catalog_exercise(
    exercise: &CatalogExercise,
    origin: &str,
    muscle_group: Option<&str>,
) -> ExerciseView {
    ExerciseView {
        title: exercise.title.clone(),
        embed_url: resolve_embed_url(&exercise.video_url, origin),
        description: exercise.description.clone(),
        prescription: None,
        coach_notes: None,
        user_notes: String::new(),
        muscle_group: muscle_group.map(str::to_string),
    }
}

/// Holds the exercise currently opened for detail, if any.
///
/// Independent of the session player: opening or closing a view never touches session state.
#[derive(Debug, Clone, Default)]
pub struct ExerciseDetailViewer {
    current: Option<ExerciseView>,
}

impl ExerciseDetailViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `view`, replacing whatever was open.
    pub fn open(&mut self, view: ExerciseView) -> &ExerciseView {
        self.current.insert(view)
    }

    pub const fn current(&self) -> Option<&ExerciseView> {
        self.current.as_ref()
    }

    pub const fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn close(&mut self) -> Option<ExerciseView> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::ProgramCatalog;

    const ORIGIN: &str = "https://app.example.com";

    #[test]
    fn test_view_program_exercise() {
        let catalog = ProgramCatalog::builtin();
        let bench = catalog.find_exercise("Bench Press").unwrap();

        let shown = view(bench, ORIGIN, None);
        assert_eq!(shown.title, "Bench Press");
        assert_eq!(
            shown.embed_url,
            "https://www.youtube.com/embed/rT7DgCr-3pg?autoplay=0&origin=https://app.example.com"
        );
        assert_eq!(
            shown.prescription,
            Some(Prescription {
                sets: 4,
                reps: "8-10".to_string(),
                rest: "90s".to_string(),
                tempo: "2-1-2".to_string(),
            })
        );
        assert!(shown.coach_notes.unwrap().starts_with("Keep your shoulders back"));
        assert_eq!(shown.user_notes, "");

        assert_eq!(view(bench, ORIGIN, Some("Felt strong")).user_notes, "Felt strong");
    }

    #[test]
    fn test_view_catalog_exercise() {
        let exercise = CatalogExercise {
            id: "ex-1".to_string(),
            title: "Goblet Squat".to_string(),
            description: "Hold the weight at your chest.".to_string(),
            video_url: "https://example.com/goblet.mp4".to_string(),
            image_url: None,
            muscle_group_id: "legs".to_string(),
            created_at: None,
        };
        let shown = view_catalog_exercise(&exercise, ORIGIN, Some("Legs"));
        assert_eq!(shown.embed_url, "https://example.com/goblet.mp4");
        assert_eq!(shown.prescription, None);
        assert_eq!(shown.muscle_group.as_deref(), Some("Legs"));
    }

    #[test]
    fn test_open_and_close() {
        let catalog = ProgramCatalog::builtin();
        let mut viewer = ExerciseDetailViewer::new();
        assert!(!viewer.is_open());

        viewer.open(view(catalog.find_exercise("Squats").unwrap(), ORIGIN, None));
        viewer.open(view(catalog.find_exercise("Pull-ups").unwrap(), ORIGIN, None));
        assert_eq!(viewer.current().unwrap().title, "Pull-ups");

        assert_eq!(viewer.close().unwrap().title, "Pull-ups");
        assert!(viewer.close().is_none());
        assert!(!viewer.is_open());
    }
}
