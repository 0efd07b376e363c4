// src/cli.rs
use chrono::{Duration, Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run training programs and track completed sessions", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print tables as CSV instead
    #[arg(long, global = true)]
    pub export_csv: bool,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the training week around a date, marking completed days
    Week {
        /// Day to anchor the week on ('today', 'yesterday', 'tomorrow', YYYY-MM-DD or DD.MM.YYYY)
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        /// Move this many weeks forward (negative goes back)
        #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,
    },
    /// List the training programs and their exercises
    Programs,
    /// Show the details of a program exercise
    Exercise {
        /// Exercise name (e.g., "Bench Press")
        name: String,
    },
    /// Start an interactive training session
    Train {
        /// Program to start right away
        #[arg(short, long)]
        program: Option<String>,
    },
    /// List completed sessions with their notes
    History {
        /// Show only the last N sessions
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Search the exercise catalog of the backend
    Search {
        /// Text to match against muscle groups and exercise titles
        query: Option<String>,
        /// Only search within this muscle group
        #[arg(short, long)]
        group: Option<String>,
        /// Show the details of the exercise with this title
        #[arg(long)]
        show: Option<String>,
    },
    /// Show the profile and subscription of the configured user
    Profile,
    /// Resolve a video link into an embeddable player URL
    Embed {
        url: String,
        /// Origin passed to the player. Defaults to the configured origin
        #[arg(long)]
        origin: Option<String>,
    },
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    /// Generate shell completion scripts
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

// Accepts day shorthands relative to the local date
pub fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    let today = Local::now().date_naive();
    match s.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        "tomorrow" => Ok(today + Duration::days(1)),
        other => ["%Y-%m-%d", "%d.%m.%Y", "%Y/%m/%d"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(other, fmt).ok())
            .ok_or_else(|| {
                format!(
                    "Invalid date '{s}'. Use 'today', 'yesterday', 'tomorrow', YYYY-MM-DD, DD.MM.YYYY or YYYY/MM/DD."
                )
            }),
    }
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

/// One line typed into the interactive training shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Start,
    Select(String),
    View(String),
    Close,
    Note(String),
    NoteFor { exercise: String, text: String },
    Advance,
    Cancel,
    Status,
    Week,
    Help,
    Quit,
}

pub const SHELL_HELP: &str = "\
Commands:
  start                        open program selection
  select <program>             start a program
  view <exercise>              show exercise details
  close                        close the exercise details
  note <text>                  note for the current exercise
  note-for <exercise> = <text> note for any exercise of the program
  next | advance               next exercise (completes after the last)
  cancel                       abandon the session (notes are lost)
  status                       show where you are
  week                         show this week's training days
  help                         show this help
  quit                         leave";

fn required(arg: &str, usage: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(format!("Usage: {usage}"))
    } else {
        Ok(arg.to_string())
    }
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));

        match word.to_lowercase().as_str() {
            "start" | "train" if rest.is_empty() || rest.eq_ignore_ascii_case("training") => {
                Ok(Self::Start)
            }
            "select" => {
                let program = rest
                    .strip_prefix("program ")
                    .map_or(rest, str::trim);
                required(program, "select <program>").map(Self::Select)
            }
            "view" => required(rest, "view <exercise>").map(Self::View),
            "close" => Ok(Self::Close),
            "note" => required(rest, "note <text>").map(Self::Note),
            "note-for" => {
                let usage = "note-for <exercise> = <text>";
                let (exercise, text) = rest.split_once('=').ok_or_else(|| format!("Usage: {usage}"))?;
                Ok(Self::NoteFor {
                    exercise: required(exercise.trim(), usage)?,
                    text: text.trim().to_string(),
                })
            }
            "next" | "advance" | "n" => Ok(Self::Advance),
            "cancel" => Ok(Self::Cancel),
            "status" | "s" => Ok(Self::Status),
            "week" => Ok(Self::Week),
            "help" | "?" | "h" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            "" => Err("Type 'help' for the list of commands".to_string()),
            other => Err(format!("Unknown command '{other}'. Type 'help' for the list of commands")),
        }
    }
}
