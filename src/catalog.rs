// src/catalog.rs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("I/O error reading programs file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse programs file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Programs file does not define any program")]
    NoPrograms,
    #[error("Program name must not be empty")]
    EmptyProgramName,
    #[error("Program '{0}' is defined more than once")]
    DuplicateProgram(String),
    #[error("Program '{program}' lists exercise '{exercise}' more than once")]
    DuplicateExercise { program: String, exercise: String },
    #[error("Exercise '{exercise}' in program '{program}' must prescribe at least one set")]
    ZeroSets { program: String, exercise: String },
}

/// One prescribed exercise of a training program.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    pub name: String,
    pub sets: u32,
    /// Rep range as written by the coach, e.g. "8-10".
    pub reps: String,
    pub rest: String,
    pub tempo: String,
    pub video_url: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_notes: Option<String>,
    #[serde(default)]
    pub user_notes: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrainingProgram {
    pub name: String,
    #[serde(default, rename = "exercise")]
    pub exercises: Vec<Exercise>,
}

impl TrainingProgram {
    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn exercise(&self, name: &str) -> Option<&Exercise> {
        let name = name.trim();
        self.exercises
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::EmptyProgramName);
        }
        let mut seen = HashSet::new();
        for exercise in &self.exercises {
            if exercise.sets == 0 {
                return Err(CatalogError::ZeroSets {
                    program: self.name.clone(),
                    exercise: exercise.name.clone(),
                });
            }
            if !seen.insert(exercise.name.to_lowercase()) {
                return Err(CatalogError::DuplicateExercise {
                    program: self.name.clone(),
                    exercise: exercise.name.clone(),
                });
            }
        }
        Ok(())
    }
}

// Layout of a programs file: a list of [[program]] tables, each with [[program.exercise]] entries.
#[derive(Deserialize)]
struct ProgramsFile {
    #[serde(default, rename = "program")]
    programs: Vec<TrainingProgram>,
}

/// Ordered registry of training programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramCatalog {
    programs: Vec<TrainingProgram>,
}

impl Default for ProgramCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProgramCatalog {
    /// Builds a catalog, rejecting duplicate program or exercise names.
    pub fn new(programs: Vec<TrainingProgram>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for program in &programs {
            program.validate()?;
            if !seen.insert(program.name.to_lowercase()) {
                return Err(CatalogError::DuplicateProgram(program.name.clone()));
            }
        }
        Ok(Self { programs })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: ProgramsFile = toml::from_str(content)?;
        if file.programs.is_empty() {
            return Err(CatalogError::NoPrograms);
        }
        Self::new(file.programs)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The two programs shipped with the app.
    pub fn builtin() -> Self {
        let exercise = |name: &str,
                        reps: &str,
                        rest: &str,
                        video_url: &str,
                        description: &str,
                        coach_notes: &str| Exercise {
            name: name.to_string(),
            sets: 4,
            reps: reps.to_string(),
            rest: rest.to_string(),
            tempo: "2-1-2".to_string(),
            video_url: video_url.to_string(),
            description: description.to_string(),
            coach_notes: Some(coach_notes.to_string()),
            user_notes: String::new(),
        };

        Self {
            programs: vec![
                TrainingProgram {
                    name: "Training A".to_string(),
                    exercises: vec![
                        exercise(
                            "Bench Press",
                            "8-10",
                            "90s",
                            "https://www.youtube.com/embed/rT7DgCr-3pg",
                            "Perform with controlled movement, focusing on chest contraction.",
                            "Keep your shoulders back and down throughout the movement. Focus on driving through your chest, not your shoulders.",
                        ),
                        exercise(
                            "Squats",
                            "8-12",
                            "120s",
                            "https://www.youtube.com/embed/gsNoPYwWXeM",
                            "Keep your back straight and go as low as your mobility allows.",
                            "Remember to keep your core tight and maintain a neutral spine. Drive through your heels.",
                        ),
                    ],
                },
                TrainingProgram {
                    name: "Training B".to_string(),
                    exercises: vec![exercise(
                        "Pull-ups",
                        "6-8",
                        "90s",
                        "https://www.youtube.com/embed/eGo4IYlbE5g",
                        "Focus on full range of motion and controlled descent.",
                        "Initiate the movement by pulling your shoulder blades down. Keep your core engaged throughout.",
                    )],
                },
            ],
        }
    }

    pub fn list_programs(&self) -> &[TrainingProgram] {
        &self.programs
    }

    pub fn find_program(&self, name: &str) -> Option<&TrainingProgram> {
        let name = name.trim();
        self.programs
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// First exercise with this name across all programs, in catalog order.
    pub fn find_exercise(&self, name: &str) -> Option<&Exercise> {
        self.programs.iter().find_map(|p| p.exercise(name))
    }
}
