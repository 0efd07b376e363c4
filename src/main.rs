//src/main.rs
mod cli; // Keep cli module for parsing args

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io::{self, stdin, stdout, BufRead, Write};
use tracing_subscriber::EnvFilter;

use cli::ShellCommand;
use train_now_lib::{
    resolve_embed_url, Advance, CalendarDay, ExerciseSearch, ExerciseView, SessionPhase,
    SessionRecord, TrainingProgram, TrainingService,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli_args = cli::parse_args(); // Parse arguments once
    init_tracing(cli_args.verbose);
    let export_csv = cli_args.export_csv;

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command(); // Get the command structure
        let bin_name = cmd.get_name().to_string(); // Get the binary name

        eprintln!("Generating completion script for {shell}..."); // Print to stderr
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout()); // Print script to stdout
        return Ok(());
    }

    // Initialize the application service (loads config, connects to DB)
    let mut service =
        TrainingService::initialize().context("Failed to initialize application service")?;
    let header_color = service.config.theme.header();

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::Week { date, offset } => {
            if let Some(date) = date {
                service.select_date(date);
            }
            service.shift_weeks(offset);
            let days = service.week_days();
            if export_csv {
                print_week_csv(&days)?;
            } else {
                println!("{}", service.calendar().month_label());
                print_week_table(&days, header_color);
            }
        }
        cli::Commands::Programs => {
            if export_csv {
                print_programs_csv(service.list_programs())?;
            } else {
                print_programs_table(service.list_programs(), header_color);
            }
        }
        cli::Commands::Exercise { name } => {
            let view = service.view_exercise(&name)?;
            print_exercise_view(view, header_color);
        }
        cli::Commands::Train { program } => {
            run_training_shell(&mut service, program.as_deref(), header_color).await?;
        }
        cli::Commands::History { limit } => {
            let sessions = service.session_history(limit)?;
            if export_csv {
                print_history_csv(&sessions)?;
            } else if sessions.is_empty() {
                println!("No completed sessions yet.");
            } else {
                print_history_table(&sessions, header_color);
            }
        }
        cli::Commands::Search { query, group, show } => {
            let source = service.data_source()?;
            let mut search = ExerciseSearch::new();
            eprintln!("Loading exercise catalog...");
            search
                .initialize(&source)
                .await
                .context("Failed to load the exercise catalog")?;
            if let Some(group) = group {
                eprintln!("Loading exercises for '{group}'...");
                search.select_muscle_group(&group, &source).await?;
            }
            if let Some(query) = query {
                search.set_query(&query);
            }

            if let Some(title) = show {
                let exercise = search
                    .find_exercise(&title)
                    .with_context(|| format!("No exercise titled '{title}' in the catalog"))?;
                let group_name = search.muscle_group_name(&exercise.muscle_group_id);
                let view = train_now_lib::viewer::view_catalog_exercise(
                    exercise,
                    &service.config.embed_origin,
                    group_name,
                );
                print_exercise_view(&view, header_color);
            } else if export_csv {
                print_search_csv(&search)?;
            } else {
                print_search_tables(&search, header_color);
            }
        }
        cli::Commands::Profile => {
            let source = service.data_source()?;
            eprintln!("Loading profile...");
            let profile = service.load_profile(&source).await?;
            println!("{}", profile.display_name);
            println!("{} Plan", profile.plan);
            println!("{}", profile.plan_status());
            println!("Training days recorded: {}", service.completions().len());
        }
        cli::Commands::Embed { url, origin } => {
            let origin = origin.unwrap_or_else(|| service.config.embed_origin.clone());
            println!("{}", resolve_embed_url(&url, &origin));
        }
        cli::Commands::DbPath => {
            println!("Database file is located at: {:?}", service.get_db_path());
        }
        cli::Commands::ConfigPath => {
            println!("Config file is located at: {:?}", service.get_config_path());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

// --- Interactive training ---

async fn run_training_shell(
    service: &mut TrainingService,
    program: Option<&str>,
    header_color: Color,
) -> Result<()> {
    service.start_training()?;
    print_program_choices(service.list_programs());
    if let Some(program) = program {
        let exercise = service.select_program(program)?;
        println!("Started '{}'.", program.trim());
        println!("Current exercise: {}", exercise.name);
    }

    let mut lines = stdin().lock().lines();
    loop {
        print!("train [{}]> ", service.phase());
        stdout().flush()?;
        let Some(line) = lines.next() else {
            break; // EOF
        };
        let command = match line?.parse::<ShellCommand>() {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match handle_shell_command(service, command, header_color).await {
            Ok(ShellFlow::Continue) => {}
            Ok(ShellFlow::Exit) => break,
            // Everything here is recoverable: report it and keep the session going.
            Err(e) => println!("Error: {e:#}"),
        }
    }

    if matches!(service.phase(), SessionPhase::InExercise(_)) {
        service.cancel()?;
        println!("Session cancelled. Notes were discarded.");
    }
    Ok(())
}

enum ShellFlow {
    Continue,
    Exit,
}

async fn handle_shell_command(
    service: &mut TrainingService,
    command: ShellCommand,
    header_color: Color,
) -> Result<ShellFlow> {
    match command {
        ShellCommand::Start => {
            service.start_training()?;
            print_program_choices(service.list_programs());
        }
        ShellCommand::Select(name) => {
            let exercise = service.select_program(&name)?;
            println!("Current exercise: {}", exercise.name);
        }
        ShellCommand::View(name) => {
            let view = service.view_exercise(&name)?;
            print_exercise_view(view, header_color);
        }
        ShellCommand::Close => match service.close_exercise_view() {
            Some(view) => println!("Closed '{}'.", view.title),
            None => println!("No exercise is open."),
        },
        ShellCommand::Note(text) => {
            service.record_note(&text)?;
            println!("Note saved.");
        }
        ShellCommand::NoteFor { exercise, text } => {
            service.record_note_for(&exercise, &text)?;
            println!("Note saved for '{exercise}'.");
        }
        ShellCommand::Advance => match service.advance()? {
            Advance::NextExercise(index) => {
                print_session_status(service);
                if let Some(state) = service.player().state() {
                    if state.is_last() {
                        println!("Last exercise: 'next' completes the workout.");
                    }
                }
                tracing::debug!("Moved to exercise index {}", index);
            }
            Advance::Completed(session) => {
                println!(
                    "Workout '{}' complete! {} marked as a training day.",
                    session.program_name,
                    session.completed_on.format("%A %Y-%m-%d")
                );
                sync_completion(service, session.completed_on).await;
                service.finish()?;
                print_week_table(&service.week_days(), header_color);
                return Ok(ShellFlow::Exit);
            }
        },
        ShellCommand::Cancel => {
            service.cancel()?;
            println!("Session cancelled. Notes were discarded.");
        }
        ShellCommand::Status => print_session_status(service),
        ShellCommand::Week => print_week_table(&service.week_days(), header_color),
        ShellCommand::Help => println!("{}", cli::SHELL_HELP),
        ShellCommand::Quit => return Ok(ShellFlow::Exit),
    }
    Ok(ShellFlow::Continue)
}

/// Best effort: a failed push is reported, the local record stays.
async fn sync_completion(service: &TrainingService, date: chrono::NaiveDate) {
    if !service.config.backend.sync_completions {
        return;
    }
    let result = match service.data_source() {
        Ok(source) => service.sync_completion(&source, date).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("Warning: {e:#}");
    }
}

fn print_program_choices(programs: &[TrainingProgram]) {
    println!("Select training:");
    for program in programs {
        println!("  {} ({} exercises)", program.name, program.exercises.len());
    }
}

fn print_session_status(service: &TrainingService) {
    let Some(state) = service.player().state() else {
        println!("Session is {}.", service.phase());
        return;
    };
    let program = state.program();
    let exercise = state.current_exercise();
    println!(
        "{}: exercise {}/{} - {} ({} x {}, rest {}, tempo {})",
        program.name,
        state.index() + 1,
        program.exercises.len(),
        exercise.name,
        exercise.sets,
        exercise.reps,
        exercise.rest,
        exercise.tempo
    );
    for (name, note) in state.ordered_notes() {
        println!("  note [{name}]: {note}");
    }
}

// --- Output helpers ---

fn print_week_table(days: &[CalendarDay], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            days.iter()
                .map(|day| Cell::new(day.weekday_label()).fg(header_color))
                .collect::<Vec<_>>(),
        );

    table.add_row(
        days.iter()
            .map(|day| {
                let cell = Cell::new(day.date.format("%d").to_string());
                if day.selected {
                    cell.add_attribute(Attribute::Bold)
                } else {
                    cell
                }
            })
            .collect::<Vec<_>>(),
    );
    table.add_row(
        days.iter()
            .map(|day| {
                if day.completed {
                    Cell::new("done").fg(Color::Green)
                } else {
                    Cell::new("")
                }
            })
            .collect::<Vec<_>>(),
    );
    println!("{table}");
}

fn print_week_csv(days: &[CalendarDay]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["Date", "Weekday", "Completed", "Selected"])?;
    for day in days {
        writer.write_record([
            day.date.format("%Y-%m-%d").to_string(),
            day.weekday_label(),
            day.completed.to_string(),
            day.selected.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_programs_table(programs: &[TrainingProgram], header_color: Color) {
    for program in programs {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("#").fg(header_color),
                Cell::new("Exercise").fg(header_color),
                Cell::new("Sets x Reps").fg(header_color),
                Cell::new("Rest").fg(header_color),
                Cell::new("Tempo").fg(header_color),
            ]);
        for (i, exercise) in program.exercises.iter().enumerate() {
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(&exercise.name),
                Cell::new(format!("{} x {}", exercise.sets, exercise.reps)),
                Cell::new(&exercise.rest),
                Cell::new(&exercise.tempo),
            ]);
        }
        println!("{}", program.name);
        println!("{table}");
    }
}

fn print_programs_csv(programs: &[TrainingProgram]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["Program", "Position", "Exercise", "Sets", "Reps", "Rest", "Tempo"])?;
    for program in programs {
        for (i, exercise) in program.exercises.iter().enumerate() {
            writer.write_record([
                program.name.clone(),
                (i + 1).to_string(),
                exercise.name.clone(),
                exercise.sets.to_string(),
                exercise.reps.clone(),
                exercise.rest.clone(),
                exercise.tempo.clone(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn print_exercise_view(view: &ExerciseView, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new(&view.title).fg(header_color).add_attribute(Attribute::Bold),
            Cell::new(""),
        ]);

    if let Some(group) = &view.muscle_group {
        table.add_row(vec![Cell::new("Muscle group"), Cell::new(group)]);
    }
    if let Some(prescription) = &view.prescription {
        table.add_row(vec![Cell::new("Sets"), Cell::new(prescription.sets)]);
        table.add_row(vec![Cell::new("Reps"), Cell::new(&prescription.reps)]);
        table.add_row(vec![Cell::new("Rest"), Cell::new(&prescription.rest)]);
        table.add_row(vec![Cell::new("Tempo"), Cell::new(&prescription.tempo)]);
    }
    table.add_row(vec![Cell::new("Video"), Cell::new(&view.embed_url)]);
    if !view.description.is_empty() {
        table.add_row(vec![Cell::new("Description"), Cell::new(&view.description)]);
    }
    if let Some(notes) = &view.coach_notes {
        table.add_row(vec![Cell::new("Notes from coach"), Cell::new(notes)]);
    }
    if view.prescription.is_some() {
        let notes = if view.user_notes.is_empty() {
            "-"
        } else {
            view.user_notes.as_str()
        };
        table.add_row(vec![Cell::new("My notes"), Cell::new(notes)]);
    }
    println!("{table}");
}

fn print_history_table(sessions: &[SessionRecord], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Date").fg(header_color),
            Cell::new("Program").fg(header_color),
            Cell::new("Notes").fg(header_color),
        ]);

    for session in sessions {
        let notes = session
            .notes
            .iter()
            .map(|(exercise, note)| format!("{exercise}: {note}"))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            Cell::new(session.id),
            Cell::new(session.completed_on.format("%Y-%m-%d")),
            Cell::new(&session.program_name),
            Cell::new(notes),
        ]);
    }
    println!("{table}");
}

fn print_history_csv(sessions: &[SessionRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["Id", "Date", "Program", "Exercise", "Note"])?;
    for session in sessions {
        if session.notes.is_empty() {
            writer.write_record([
                session.id.to_string(),
                session.completed_on.to_string(),
                session.program_name.clone(),
                String::new(),
                String::new(),
            ])?;
        }
        for (exercise, note) in &session.notes {
            writer.write_record([
                session.id.to_string(),
                session.completed_on.to_string(),
                session.program_name.clone(),
                exercise.clone(),
                note.clone(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn print_search_tables(search: &ExerciseSearch, header_color: Color) {
    let results = search.results();
    if let Some(group) = search.selected_group() {
        println!("{} exercises", group.name);
    } else if !results.muscle_groups.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec![Cell::new("Muscle group").fg(header_color)]);
        for group in &results.muscle_groups {
            table.add_row(vec![Cell::new(&group.name)]);
        }
        println!("{table}");
    }

    if results.exercises.is_empty() {
        if search.selected_group().is_some() || !search.query().is_empty() {
            println!("No exercises found.");
        }
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Exercise").fg(header_color),
            Cell::new("Muscle group").fg(header_color),
            Cell::new("Description").fg(header_color),
        ]);
    for exercise in &results.exercises {
        table.add_row(vec![
            Cell::new(&exercise.title),
            Cell::new(search.muscle_group_name(&exercise.muscle_group_id).unwrap_or("")),
            Cell::new(&exercise.description),
        ]);
    }
    println!("{table}");
}

fn print_search_csv(search: &ExerciseSearch) -> Result<()> {
    let results = search.results();
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["Kind", "Name", "Muscle_Group", "Video_Url"])?;
    for group in &results.muscle_groups {
        writer.write_record(["muscle_group", group.name.as_str(), "", ""])?;
    }
    for exercise in &results.exercises {
        writer.write_record([
            "exercise",
            exercise.title.as_str(),
            search.muscle_group_name(&exercise.muscle_group_id).unwrap_or(""),
            exercise.video_url.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
