// src/session.rs
//! The training session player: walks through one program's exercises in order.
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::calendar::CompletionSet;
use crate::catalog::{Exercise, TrainingProgram};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Program '{0}' has no exercises and cannot be started")]
    InvalidProgram(String),
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: SessionPhase,
    },
    #[error("Exercise '{exercise}' is not part of program '{program}'")]
    UnknownExercise { program: String, exercise: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    ProgramSelection,
    InExercise(usize),
    Completed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ProgramSelection => write!(f, "selecting a program"),
            Self::InExercise(i) => write!(f, "on exercise {}", i + 1),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Progress through the active program. Only exists while a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    program: TrainingProgram,
    index: usize,
    // Keyed by exercise name so notes survive index changes.
    notes: HashMap<String, String>,
}

impl SessionState {
    pub const fn program(&self) -> &TrainingProgram {
        &self.program
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub fn current_exercise(&self) -> &Exercise {
        &self.program.exercises[self.index]
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.program.exercises.len()
    }

    pub fn note(&self, exercise_name: &str) -> Option<&str> {
        self.notes.get(exercise_name).map(String::as_str)
    }

    pub const fn notes(&self) -> &HashMap<String, String> {
        &self.notes
    }

    /// Notes paired with their exercise name, in program order.
    pub fn ordered_notes(&self) -> Vec<(String, String)> {
        self.program
            .exercises
            .iter()
            .filter_map(|e| {
                self.notes
                    .get(&e.name)
                    .map(|note| (e.name.clone(), note.clone()))
            })
            .collect()
    }
}

/// Record of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSession {
    pub program_name: String,
    pub completed_on: NaiveDate,
    /// Notes by exercise name, in program order.
    pub notes: Vec<(String, String)>,
    /// `false` when the day already had a completed session.
    pub newly_recorded: bool,
}

/// Result of a successful `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    NextExercise(usize),
    Completed(CompletedSession),
}

/// Emitted to observers after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    ProgramSelected { program: String },
    NoteRecorded { exercise: String },
    Advanced { from: usize, to: usize },
    Completed { program: String, date: NaiveDate, newly_recorded: bool },
    Cancelled { program: Option<String> },
    Reset,
}

pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

impl<F: FnMut(&SessionEvent)> SessionObserver for F {
    fn on_event(&mut self, event: &SessionEvent) {
        self(event);
    }
}

#[derive(Default)]
pub struct SessionPlayer {
    state: Option<SessionState>,
    phase: Phase,
    observers: Vec<Box<dyn SessionObserver>>,
}

// Internal phase; the index lives in `state` so it cannot drift from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    ProgramSelection,
    InExercise,
    Completed,
}

impl fmt::Debug for SessionPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPlayer")
            .field("phase", &self.phase())
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SessionPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.phase, &self.state) {
            (Phase::Idle, _) => SessionPhase::Idle,
            (Phase::ProgramSelection, _) => SessionPhase::ProgramSelection,
            (Phase::InExercise, Some(state)) => SessionPhase::InExercise(state.index),
            (Phase::InExercise, None) => SessionPhase::Idle,
            (Phase::Completed, _) => SessionPhase::Completed,
        }
    }

    pub const fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.state.as_ref().map(SessionState::current_exercise)
    }

    fn emit(&mut self, event: SessionEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            phase: self.phase(),
        }
    }

    /// `Idle -> ProgramSelection`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Idle {
            return Err(self.invalid("start training"));
        }
        self.phase = Phase::ProgramSelection;
        self.emit(SessionEvent::Started);
        Ok(())
    }

    /// `ProgramSelection -> InExercise(0)` with no notes.
    ///
    /// # Errors
    /// `InvalidProgram` for a program without exercises; the player stays in program selection.
    pub fn select_program(&mut self, program: &TrainingProgram) -> Result<(), SessionError> {
        if self.phase != Phase::ProgramSelection {
            return Err(self.invalid("select a program"));
        }
        if program.is_empty() {
            return Err(SessionError::InvalidProgram(program.name.clone()));
        }
        self.state = Some(SessionState {
            program: program.clone(),
            index: 0,
            notes: HashMap::new(),
        });
        self.phase = Phase::InExercise;
        self.emit(SessionEvent::ProgramSelected {
            program: program.name.clone(),
        });
        Ok(())
    }

    /// Sets the note of the current exercise.
    pub fn record_note(&mut self, text: &str) -> Result<(), SessionError> {
        let name = self
            .current_exercise()
            .map(|e| e.name.clone())
            .ok_or_else(|| self.invalid("record a note"))?;
        self.store_note(name, text);
        Ok(())
    }

    /// Sets the note of any exercise in the active program.
    pub fn record_note_for(&mut self, exercise_name: &str, text: &str) -> Result<(), SessionError> {
        let state = self
            .state
            .as_ref()
            .filter(|_| self.phase == Phase::InExercise)
            .ok_or_else(|| self.invalid("record a note"))?;
        let name = state
            .program
            .exercise(exercise_name)
            .map(|e| e.name.clone())
            .ok_or_else(|| SessionError::UnknownExercise {
                program: state.program.name.clone(),
                exercise: exercise_name.to_string(),
            })?;
        self.store_note(name, text);
        Ok(())
    }

    fn store_note(&mut self, name: String, text: &str) {
        if let Some(state) = self.state.as_mut() {
            state.notes.insert(name.clone(), text.to_string());
        }
        self.emit(SessionEvent::NoteRecorded { exercise: name });
    }

    /// The session `advance` would complete on `today`, without changing anything.
    /// `None` unless the last exercise is running.
    pub fn pending_completion(
        &self,
        completions: &CompletionSet,
        today: NaiveDate,
    ) -> Option<CompletedSession> {
        let state = self.state.as_ref().filter(|_| self.phase == Phase::InExercise)?;
        state.is_last().then(|| CompletedSession {
            program_name: state.program.name.clone(),
            completed_on: today,
            notes: state.ordered_notes(),
            newly_recorded: !completions.contains(today),
        })
    }

    /// Moves to the next exercise, or completes the session after the last one.
    ///
    /// Completion adds `today` to `completions`; a day already present is not added twice.
    pub fn advance(
        &mut self,
        completions: &mut CompletionSet,
        today: NaiveDate,
    ) -> Result<Advance, SessionError> {
        let (from, is_last) = match self.state.as_ref() {
            Some(state) if self.phase == Phase::InExercise => (state.index, state.is_last()),
            _ => return Err(self.invalid("advance")),
        };

        if !is_last {
            let to = from + 1;
            if let Some(state) = self.state.as_mut() {
                state.index = to;
            }
            self.emit(SessionEvent::Advanced { from, to });
            return Ok(Advance::NextExercise(to));
        }

        let Some(state) = self.state.take() else {
            return Err(self.invalid("advance"));
        };
        let newly_recorded = completions.insert(today);
        self.phase = Phase::Completed;

        let completed = CompletedSession {
            notes: state.ordered_notes(),
            program_name: state.program.name,
            completed_on: today,
            newly_recorded,
        };
        self.emit(SessionEvent::Completed {
            program: completed.program_name.clone(),
            date: today,
            newly_recorded,
        });
        Ok(Advance::Completed(completed))
    }

    /// Abandons program selection or the running session. Notes are discarded.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::ProgramSelection | Phase::InExercise) {
            return Err(self.invalid("cancel"));
        }
        let program = self.state.take().map(|s| s.program.name);
        self.phase = Phase::Idle;
        self.emit(SessionEvent::Cancelled { program });
        Ok(())
    }

    /// `Completed -> Idle`.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Completed {
            return Err(self.invalid("reset"));
        }
        self.phase = Phase::Idle;
        self.emit(SessionEvent::Reset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::catalog::ProgramCatalog;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    fn training_a() -> TrainingProgram {
        ProgramCatalog::builtin()
            .find_program("Training A")
            .cloned()
            .unwrap()
    }

    fn program_of(len: usize) -> TrainingProgram {
        let template = training_a().exercises[0].clone();
        TrainingProgram {
            name: format!("Program {len}"),
            exercises: (0..len)
                .map(|i| Exercise {
                    name: format!("Exercise {i}"),
                    ..template.clone()
                })
                .collect(),
        }
    }

    fn in_session(program: &TrainingProgram) -> SessionPlayer {
        let mut player = SessionPlayer::new();
        player.start().unwrap();
        player.select_program(program).unwrap();
        player
    }

    #[test]
    fn test_training_a_walkthrough() {
        let mut completions = CompletionSet::new();
        let mut player = SessionPlayer::new();
        assert_eq!(player.phase(), SessionPhase::Idle);

        player.start().unwrap();
        assert_eq!(player.phase(), SessionPhase::ProgramSelection);

        player.select_program(&training_a()).unwrap();
        assert_eq!(player.phase(), SessionPhase::InExercise(0));
        assert_eq!(player.current_exercise().unwrap().name, "Bench Press");

        assert_eq!(
            player.advance(&mut completions, today()).unwrap(),
            Advance::NextExercise(1)
        );
        assert_eq!(player.current_exercise().unwrap().name, "Squats");

        let Advance::Completed(done) = player.advance(&mut completions, today()).unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(player.phase(), SessionPhase::Completed);
        assert!(player.state().is_none());
        assert_eq!(done.program_name, "Training A");
        assert!(done.newly_recorded);
        assert!(completions.contains(today()));
    }

    #[test]
    fn test_pending_completion_matches_completed_session() {
        let mut completions = CompletionSet::new();
        let mut player = in_session(&training_a());
        assert_eq!(player.pending_completion(&completions, today()), None);

        player.record_note("Felt strong").unwrap();
        player.advance(&mut completions, today()).unwrap();
        let pending = player.pending_completion(&completions, today()).unwrap();
        // Preview only: nothing moved
        assert_eq!(player.phase(), SessionPhase::InExercise(1));
        assert!(completions.is_empty());

        let Advance::Completed(done) = player.advance(&mut completions, today()).unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(pending, done);
        assert_eq!(player.pending_completion(&completions, today()), None);
    }

    #[test]
    fn test_advance_visits_every_index_once() {
        for len in 1..=6 {
            let program = program_of(len);
            let mut completions = CompletionSet::new();
            let mut player = in_session(&program);
            let mut completed = 0;
            for call in 1..=len {
                match player.advance(&mut completions, today()).unwrap() {
                    Advance::NextExercise(i) => {
                        assert_eq!(i, call);
                        assert_eq!(player.phase(), SessionPhase::InExercise(call));
                    }
                    Advance::Completed(_) => completed += 1,
                }
            }
            assert_eq!(completed, 1);
            assert_eq!(player.phase(), SessionPhase::Completed);
        }
    }

    #[test]
    fn test_completing_twice_on_same_day_records_once() {
        let mut completions = CompletionSet::new();
        let mut player = SessionPlayer::new();

        for expected_new in [true, false] {
            player.start().unwrap();
            player.select_program(&program_of(1)).unwrap();
            let Advance::Completed(done) = player.advance(&mut completions, today()).unwrap() else {
                panic!("expected completion");
            };
            assert_eq!(done.newly_recorded, expected_new);
            player.reset().unwrap();
        }
        assert_eq!(completions.len(), 1);
    }

    #[test]
    fn test_notes_survive_advance() {
        let mut completions = CompletionSet::new();
        let mut player = in_session(&training_a());

        player.record_note("Felt strong").unwrap();
        player.advance(&mut completions, today()).unwrap();
        assert_eq!(
            player.state().unwrap().note("Bench Press"),
            Some("Felt strong")
        );
        assert_eq!(player.state().unwrap().note("Squats"), None);

        player.record_note("Knees ok").unwrap();
        player.record_note_for("bench press", "Felt strong, add 2.5kg").unwrap();
        let Advance::Completed(done) = player.advance(&mut completions, today()).unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(
            done.notes,
            vec![
                ("Bench Press".to_string(), "Felt strong, add 2.5kg".to_string()),
                ("Squats".to_string(), "Knees ok".to_string()),
            ]
        );
    }

    #[test]
    fn test_record_note_for_unknown_exercise() {
        let mut player = in_session(&training_a());
        assert_eq!(
            player.record_note_for("Deadlift", "heavy"),
            Err(SessionError::UnknownExercise {
                program: "Training A".to_string(),
                exercise: "Deadlift".to_string(),
            })
        );
        assert!(player.state().unwrap().notes().is_empty());
    }

    #[test]
    fn test_empty_program_is_rejected() {
        let mut player = SessionPlayer::new();
        player.start().unwrap();
        assert_eq!(
            player.select_program(&program_of(0)),
            Err(SessionError::InvalidProgram("Program 0".to_string()))
        );
        assert_eq!(player.phase(), SessionPhase::ProgramSelection);
        assert!(player.state().is_none());
    }

    #[test]
    fn test_cancel_discards_notes() {
        let mut player = in_session(&training_a());
        player.record_note("Felt strong").unwrap();
        player.cancel().unwrap();
        assert_eq!(player.phase(), SessionPhase::Idle);
        assert!(player.state().is_none());

        player.start().unwrap();
        player.select_program(&training_a()).unwrap();
        assert!(player.state().unwrap().notes().is_empty());
    }

    #[test]
    fn test_invalid_transitions_leave_phase_unchanged() {
        let mut completions = CompletionSet::new();
        let mut player = SessionPlayer::new();

        assert!(matches!(
            player.advance(&mut completions, today()),
            Err(SessionError::InvalidTransition { action: "advance", phase: SessionPhase::Idle })
        ));
        assert!(player.record_note("x").is_err());
        assert!(player.cancel().is_err());
        assert!(player.reset().is_err());
        assert!(player.select_program(&training_a()).is_err());
        assert_eq!(player.phase(), SessionPhase::Idle);

        player.start().unwrap();
        assert!(player.start().is_err());
        assert!(player.advance(&mut completions, today()).is_err());
        assert_eq!(player.phase(), SessionPhase::ProgramSelection);

        player.select_program(&program_of(1)).unwrap();
        assert!(player.select_program(&training_a()).is_err());
        player.advance(&mut completions, today()).unwrap();
        assert!(player.cancel().is_err());
        assert!(player.start().is_err());
        assert_eq!(player.phase(), SessionPhase::Completed);
        assert!(completions.contains(today()));
    }

    #[test]
    fn test_observers_see_every_transition() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let mut player = SessionPlayer::new();
        player.subscribe(move |event: &SessionEvent| sink.borrow_mut().push(event.clone()));

        let mut completions = CompletionSet::new();
        player.start().unwrap();
        player.select_program(&training_a()).unwrap();
        player.record_note("Felt strong").unwrap();
        player.advance(&mut completions, today()).unwrap();
        player.cancel().unwrap();

        assert_eq!(
            *events.borrow(),
            vec![
                SessionEvent::Started,
                SessionEvent::ProgramSelected { program: "Training A".to_string() },
                SessionEvent::NoteRecorded { exercise: "Bench Press".to_string() },
                SessionEvent::Advanced { from: 0, to: 1 },
                SessionEvent::Cancelled { program: Some("Training A".to_string()) },
            ]
        );
    }
}
