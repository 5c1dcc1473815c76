use std::fmt;
use std::sync::Arc;

use services::{
    AssignmentLoopService, AssignmentSettings, BackendConfig, CancellationToken, Clock,
    HttpBackend, SessionCommand, SessionEvent, SessionProgress,
};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use worksheet_core::model::{
    GradingResult, Problem, ProblemKind, SessionId, Subject, WorksheetId, WorksheetRef,
    choice_letter, is_canvas_capture,
};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidSubject { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSubject { raw } => write!(f, "invalid --subject value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id(flag: &'static str, value: String) -> Result<u64, ArgsError> {
    value
        .trim()
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw: value })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  cargo run -p app -- run    --subject <math|korean|english> --worksheet <id> [--time-limit <secs>] [--db <sqlite_url>]"
    );
    eprintln!("  cargo run -p app -- result --subject <math|korean|english> --session <id>");
    eprintln!();
    eprintln!("Commands while a worksheet is open:");
    eprintln!("  next | prev | go <n> | answer <text> | submit | quit");
    eprintln!();
    eprintln!("Defaults for run:");
    eprintln!("  --db sqlite://worksheet-drafts.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  WORKSHEET_MATH_URL, WORKSHEET_KOREAN_URL, WORKSHEET_ENGLISH_URL,");
    eprintln!("  WORKSHEET_API_TOKEN, WORKSHEET_HTTP_TIMEOUT_SECS, WORKSHEET_TIME_LIMIT_SECS,");
    eprintln!("  WORKSHEET_POLL_INTERVAL_MS, WORKSHEET_POLL_ATTEMPTS, WORKSHEET_PASS_MARK,");
    eprintln!("  WORKSHEET_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Result,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "result" => Some(Self::Result),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    worksheet: WorksheetRef,
    time_limit_secs: Option<u32>,
    db_url: String,
}

#[derive(Debug, PartialEq, Eq)]
struct ResultArgs {
    subject: Subject,
    session_id: SessionId,
}

fn parse_subject(value: String) -> Result<Subject, ArgsError> {
    value
        .parse()
        .map_err(|_| ArgsError::InvalidSubject { raw: value })
}

impl RunArgs {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env_db_url: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env_db_url
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| "sqlite://worksheet-drafts.sqlite3".into(), normalize_sqlite_url);
        let mut subject = None;
        let mut worksheet_id = None;
        let mut time_limit_secs = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--subject" => subject = Some(parse_subject(require_value(args, "--subject")?)?),
                "--worksheet" => {
                    let value = require_value(args, "--worksheet")?;
                    worksheet_id = Some(WorksheetId::new(parse_id("--worksheet", value)?));
                }
                "--time-limit" => {
                    let value = require_value(args, "--time-limit")?;
                    let secs = parse_id("--time-limit", value.clone())?;
                    let secs = u32::try_from(secs).map_err(|_| ArgsError::InvalidId {
                        flag: "--time-limit",
                        raw: value,
                    })?;
                    time_limit_secs = Some(secs);
                }
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let subject = subject.ok_or(ArgsError::MissingFlag { flag: "--subject" })?;
        let worksheet_id = worksheet_id.ok_or(ArgsError::MissingFlag { flag: "--worksheet" })?;
        Ok(Self {
            worksheet: WorksheetRef::new(subject, worksheet_id),
            time_limit_secs,
            db_url,
        })
    }
}

impl ResultArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut subject = None;
        let mut session_id = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--subject" => subject = Some(parse_subject(require_value(args, "--subject")?)?),
                "--session" => {
                    let value = require_value(args, "--session")?;
                    session_id = Some(SessionId::new(parse_id("--session", value)?));
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            subject: subject.ok_or(ArgsError::MissingFlag { flag: "--subject" })?,
            session_id: session_id.ok_or(ArgsError::MissingFlag { flag: "--session" })?,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

//
// ─── TERMINAL COMMANDS ─────────────────────────────────────────────────────────
//

/// A line typed by the learner. `Answer` applies to the problem on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Next,
    Previous,
    GoTo(usize),
    Answer(String),
    Submit,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));
    match word.to_ascii_lowercase().as_str() {
        "next" | "n" => Ok(Input::Next),
        "prev" | "p" => Ok(Input::Previous),
        "go" => match rest.parse::<usize>() {
            Ok(number) if number >= 1 => Ok(Input::GoTo(number - 1)),
            _ => Err(format!("go expects a problem number, got {rest:?}")),
        },
        "answer" | "a" => Ok(Input::Answer(rest.to_string())),
        "submit" => Ok(Input::Submit),
        "quit" | "exit" | "q" => Ok(Input::Quit),
        "" => Err("type next, prev, go <n>, answer <text>, submit or quit".to_string()),
        other => Err(format!("unknown command: {other}")),
    }
}

fn print_problem(problem: &Problem, index: usize, total: usize) {
    println!();
    println!(
        "[{}/{}] ({}, {}) {}",
        index + 1,
        total,
        problem.kind(),
        if problem.difficulty().is_empty() {
            "-"
        } else {
            problem.difficulty()
        },
        problem.prompt()
    );
    if problem.kind() == ProblemKind::MultipleChoice {
        for (i, choice) in problem.choices().iter().enumerate() {
            if let Some(letter) = choice_letter(i) {
                println!("  {letter}) {choice}");
            }
        }
    }
}

fn answered_line(progress: &SessionProgress) -> String {
    format!("{}/{} answered", progress.answered, progress.total)
}

fn print_result(result: &GradingResult, pass_mark: u8) {
    println!();
    println!(
        "Session {}: {}/{} correct, score {} ({})",
        result.session_id(),
        result.correct(),
        result.total(),
        result.score(),
        if result.passed(pass_mark) { "pass" } else { "fail" }
    );
    for entry in result.incorrect() {
        let submitted = match entry.submitted_answer() {
            "" => "(blank)",
            value if is_canvas_capture(value) => "(handwriting)",
            value => value,
        };
        println!(
            "  #{} {}: answered {submitted}, expected {}",
            entry.problem().order(),
            entry.problem().prompt(),
            entry.correct_answer()
        );
        if let Some(explanation) = entry.problem().explanation() {
            println!("      {explanation}");
        }
    }
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

async fn run_worksheet(
    service: &AssignmentLoopService,
    worksheet: WorksheetRef,
) -> Result<(), Box<dyn std::error::Error>> {
    let pass_mark = service.settings().pass_mark;
    let mut interrupted = false;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let cancel_load = CancellationToken::new();
    let loading = service.start(worksheet, &cancel_load);
    tokio::pin!(loading);
    let session = loop {
        tokio::select! {
            session = &mut loading => break session?,
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                cancel_load.cancel();
            }
        }
    };

    let problems = session.problems().to_vec();
    let mut current = session.current_index();
    let progress = session.progress();
    println!(
        "{worksheet}: {}, {}s on the clock",
        answered_line(&progress),
        progress.remaining_secs
    );
    if let Some(problem) = problems.get(current) {
        print_problem(problem, current, problems.len());
    }

    let mut handle = service.drive(session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::Navigated { index, .. } => {
                        current = index;
                        if let Some(problem) = problems.get(index) {
                            print_problem(problem, index, problems.len());
                        }
                    }
                    SessionEvent::AnswerSaved { answered, total, .. } => {
                        println!("saved ({answered}/{total} answered)");
                    }
                    SessionEvent::Ticked { remaining_secs } => {
                        if remaining_secs % 60 == 0 || remaining_secs <= 10 {
                            println!("{remaining_secs}s left");
                        }
                    }
                    SessionEvent::TimeExpired => println!("time is up, submitting"),
                    SessionEvent::SubmissionStarted => println!("submitting..."),
                    SessionEvent::Graded(result) => print_result(&result, pass_mark),
                    SessionEvent::SubmissionFailed(failure) => {
                        println!("submission failed ({:?}): {}", failure.kind, failure.message);
                    }
                    SessionEvent::Rejected(reason) => println!("{reason}"),
                }
            }
            line = lines.next_line(), if stdin_open => {
                let command = match line? {
                    None => {
                        stdin_open = false;
                        SessionCommand::Exit
                    }
                    Some(line) => match parse_input(&line) {
                        Ok(Input::Next) => SessionCommand::Next,
                        Ok(Input::Previous) => SessionCommand::Previous,
                        Ok(Input::GoTo(index)) => SessionCommand::GoTo(index),
                        Ok(Input::Answer(value)) => match problems.get(current) {
                            Some(problem) => SessionCommand::Answer {
                                problem_id: problem.id(),
                                value,
                            },
                            None => continue,
                        },
                        Ok(Input::Submit) => SessionCommand::Submit,
                        Ok(Input::Quit) => SessionCommand::Exit,
                        Err(message) => {
                            println!("{message}");
                            continue;
                        }
                    },
                };
                if !handle.send(command).await {
                    break;
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                handle.cancel();
            }
        }
    }

    let session = handle.finish().await?;
    let progress = session.progress();
    if !progress.is_complete {
        println!(
            "left {worksheet} with {}; answers are kept for next time",
            answered_line(&progress)
        );
    }
    Ok(())
}

async fn show_result(
    service: &AssignmentLoopService,
    args: &ResultArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = service.fetch_result(args.subject, args.session_id).await?;
    print_result(&result, service.settings().pass_mark);
    Ok(())
}

fn build_service(
    backend: HttpBackend,
    storage: &Storage,
    settings: AssignmentSettings,
) -> AssignmentLoopService {
    let backend = Arc::new(backend);
    AssignmentLoopService::new(
        Clock::system(),
        backend.clone(),
        backend,
        Arc::clone(&storage.drafts),
        settings,
    )
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut iter = argv.into_iter();

    let cmd = match iter.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let backend = HttpBackend::new(BackendConfig::from_env()?)?;
    let mut settings = AssignmentSettings::from_env()?;

    match cmd {
        Command::Run => {
            let args = RunArgs::parse(&mut iter, std::env::var("WORKSHEET_DB_URL").ok())
                .map_err(|e| {
                    eprintln!("{e}");
                    print_usage();
                    e
                })?;
            if let Some(secs) = args.time_limit_secs {
                settings.time_limit_secs = secs;
            }

            // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
            prepare_sqlite_file(&args.db_url)?;
            let storage = Storage::sqlite(&args.db_url).await?;
            tracing::debug!(db_url = %args.db_url, "draft cache ready");
            let service = build_service(backend, &storage, settings);
            run_worksheet(&service, args.worksheet).await
        }
        Command::Result => {
            let args = ResultArgs::parse(&mut iter).map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?;
            let service = build_service(backend, &Storage::in_memory(), settings);
            show_result(&service, &args).await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
