//! mavlog CLI
//!
//! Runs Maven builds and replays captured logs through the mavlog parser,
//! printing the resulting build events.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mavlog_core::{BuildEvent, ClassificationConfig, ClassificationStrategy, EventSink};
use mavlog_run::{
    replay, BuildRunner, Capture, LineSource, MavenCommand, ReaderLines, RunOutcome,
    StartOption,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, info, warn, Level};

#[derive(Parser)]
#[command(name = "mavlog")]
#[command(author = "mavlog contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Streaming parser for Maven build output", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run Maven and print its build events as they happen
    Run(RunArgs),

    /// Parse a captured Maven log ("-" reads stdin)
    Parse {
        /// Log file to replay
        log: PathBuf,

        /// Classification config (default: .mavlog.json in the current directory)
        #[arg(short, long, env = "MAVLOG_CONFIG")]
        config: Option<PathBuf>,

        /// Event output format
        #[arg(long, value_enum, default_value_t = EventFormat::Text)]
        format: EventFormat,
    },

    /// Show which matcher classifies each line, and how
    Classify {
        /// Classification config (default: the project's .mavlog.json)
        #[arg(short, long, env = "MAVLOG_CONFIG")]
        config: Option<PathBuf>,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Lines to classify (default: the config's test_input)
        lines: Vec<String>,
    },

    /// Manage the per-project classification config
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Maven project directory
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Classification config (default: the project's .mavlog.json)
    #[arg(short, long, env = "MAVLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Resume the reactor from this module
    #[arg(long, value_name = "MODULE", conflicts_with_all = ["projects", "also_make"])]
    resume_from: Option<String>,

    /// Build only this module
    #[arg(long, value_name = "MODULE", conflicts_with = "also_make")]
    projects: Option<String>,

    /// Build this module and the modules it depends on
    #[arg(long, value_name = "MODULE")]
    also_make: Option<String>,

    /// Pass -DskipTests
    #[arg(long)]
    skip_tests: bool,

    /// Maven launcher to use instead of mvn
    #[arg(long, value_name = "EXE")]
    mvn: Option<String>,

    /// Event output format
    #[arg(long, value_enum, default_value_t = EventFormat::Text)]
    format: EventFormat,

    /// Keep the raw output for `mavlog parse` (default: mavlog-<run id>.log in the temp dir)
    #[arg(long, value_name = "PATH", num_args = 0..=1, require_equals = true)]
    capture: Option<Option<PathBuf>>,

    /// Goals and extra Maven options, passed through verbatim
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    goals: Vec<String>,
}

impl RunArgs {
    fn start_option(&self) -> StartOption {
        if let Some(module) = &self.resume_from {
            StartOption::ResumeFrom(module.clone())
        } else if let Some(module) = &self.projects {
            StartOption::BuildOnly(module.clone())
        } else if let Some(module) = &self.also_make {
            StartOption::BuildUpTo(module.clone())
        } else {
            StartOption::All
        }
    }

    fn capture(&self) -> Capture {
        match &self.capture {
            None => Capture::Off,
            Some(None) => Capture::TempDir,
            Some(Some(path)) => Capture::File(path.clone()),
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default config to the project directory
    Init {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Print the effective config of a project
    Show {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EventFormat {
    /// One compact line per event
    Text,
    /// Newline-delimited JSON
    Json,
}

/// Writes events as they arrive. The first write error stops output and is
/// reported by [`EventPrinter::finish`].
struct EventPrinter<W> {
    out: W,
    format: EventFormat,
    failed: Option<io::Error>,
}

impl<W: Write> EventPrinter<W> {
    fn new(out: W, format: EventFormat) -> Self {
        Self {
            out,
            format,
            failed: None,
        }
    }

    fn write(&mut self, event: &BuildEvent) -> io::Result<()> {
        match self.format {
            EventFormat::Text => writeln!(self.out, "{event}"),
            EventFormat::Json => {
                serde_json::to_writer(&mut self.out, event)?;
                writeln!(self.out)
            }
        }
    }

    fn finish(mut self) -> io::Result<()> {
        if let Some(err) = self.failed.take() {
            return Err(err);
        }
        self.out.flush()
    }
}

impl<W: Write + Send> EventSink for EventPrinter<W> {
    fn emit(&mut self, event: BuildEvent) {
        if self.failed.is_some() {
            return;
        }
        if let Err(err) = self.write(&event) {
            self.failed = Some(err);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    mavlog_core::init_tracing(cli.json, level);

    let success = match cli.command {
        Commands::Run(args) => cmd_run(args).await?,
        Commands::Parse {
            log,
            config,
            format,
        } => cmd_parse(&log, config.as_deref(), format, io::stdout()).await?,
        Commands::Classify {
            config,
            project,
            lines,
        } => {
            cmd_classify(config.as_deref(), &project, &lines, &mut io::stdout())?;
            true
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Init { project, force } => {
                    cmd_config_init(&project, force, &mut io::stdout())?
                }
                ConfigAction::Show { project } => cmd_config_show(&project, &mut io::stdout())?,
            }
            true
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(config: Option<&Path>, project: &Path) -> Result<ClassificationConfig> {
    match config {
        Some(path) => ClassificationConfig::load(path)
            .with_context(|| format!("Failed to load classification config {:?}", path)),
        None => ClassificationConfig::load_for_project(project)
            .with_context(|| format!("Failed to load classification config of {:?}", project)),
    }
}

fn load_strategy(config: Option<&Path>, project: &Path) -> Result<Arc<ClassificationStrategy>> {
    let strategy = load_config(config, project)?
        .build_strategy()
        .context("Invalid classification config")?;
    Ok(Arc::new(strategy))
}

/// Run Maven, streaming events to stdout. Returns whether the build succeeded.
async fn cmd_run(args: RunArgs) -> Result<bool> {
    let project = args
        .project
        .canonicalize()
        .with_context(|| format!("Project directory not found: {:?}", args.project))?;
    let strategy = load_strategy(args.config.as_deref(), &project)?;
    let capture = args.capture();

    let mut command = MavenCommand::new(project.clone())
        .with_start(args.start_option())
        .with_goals(args.goals)
        .skip_tests(args.skip_tests);
    if let Some(mvn) = args.mvn {
        command = command.with_executable(mvn);
    }
    info!("Running {:?} in {:?}", command.command_line(), project);

    let runner = BuildRunner::new(strategy).with_capture(capture);
    let (handle, mut events) = runner.spawn(command);
    let mut printer = EventPrinter::new(io::stdout(), args.format);
    while let Some(event) = events.recv().await {
        printer.emit(event);
    }
    let outcome = handle.await.context("Build task failed")?;
    printer.finish().context("Failed to write build events")?;

    report_outcome(&outcome, args.format);
    Ok(outcome.success())
}

fn report_outcome(outcome: &RunOutcome, format: EventFormat) {
    info!(
        run_id = %outcome.run_id,
        exit_code = outcome.exit_code,
        events = outcome.summary.event_count,
        duration_ms = outcome.duration_ms,
        "Build finished"
    );
    if let Some(err) = &outcome.summary.parse_error {
        warn!("Build output could not be parsed: {}", err);
    }
    if let Some(path) = &outcome.capture_path {
        eprintln!("Raw output captured to {}", path.display());
    }
    if format == EventFormat::Text && !outcome.success() {
        if let Some(token) = &outcome.summary.resume_hint {
            eprintln!("Resume with: mavlog run --resume-from {token} <goals>");
        }
    }
}

/// Replay a captured log. Returns whether it parsed cleanly.
async fn cmd_parse<W: Write + Send>(
    log: &Path,
    config: Option<&Path>,
    format: EventFormat,
    out: W,
) -> Result<bool> {
    let strategy = load_strategy(config, Path::new("."))?;

    let mut source: Box<dyn LineSource> = if log == Path::new("-") {
        Box::new(ReaderLines::new(BufReader::new(tokio::io::stdin())))
    } else {
        let file = tokio::fs::File::open(log)
            .await
            .with_context(|| format!("Failed to open log {:?}", log))?;
        Box::new(ReaderLines::new(BufReader::new(file)))
    };

    let mut printer = EventPrinter::new(out, format);
    let summary = replay(source.as_mut(), strategy, &mut printer).await?;
    printer.finish().context("Failed to write build events")?;

    debug!(
        lines = summary.lines,
        events = summary.event_count,
        "Replay finished"
    );
    if let Some(err) = &summary.parse_error {
        warn!("Log could not be parsed: {}", err);
    }
    Ok(summary.parse_error.is_none())
}

fn cmd_classify(
    config: Option<&Path>,
    project: &Path,
    lines: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let config = load_config(config, project)?;
    let strategy = config
        .build_strategy()
        .context("Invalid classification config")?;

    let inputs: Vec<&str> = if lines.is_empty() {
        config.test_input.iter().map(String::as_str).collect()
    } else {
        lines.iter().map(String::as_str).collect()
    };
    if inputs.is_empty() {
        writeln!(out, "No lines to classify; pass some or add test_input to the config")?;
        return Ok(());
    }

    for result in strategy.debug_all(inputs) {
        writeln!(out, "{result}")?;
    }
    Ok(())
}

fn cmd_config_init(project: &Path, force: bool, out: &mut impl Write) -> Result<()> {
    let path = ClassificationConfig::project_path(project);
    if path.exists() && !force {
        bail!("{:?} already exists; use --force to overwrite it", path);
    }

    ClassificationConfig::default()
        .save(&path)
        .with_context(|| format!("Failed to write {:?}", path))?;
    writeln!(out, "Wrote default classification config to {:?}", path)?;
    Ok(())
}

fn cmd_config_show(project: &Path, out: &mut impl Write) -> Result<()> {
    let config = ClassificationConfig::load_for_project(project)
        .with_context(|| format!("Failed to load classification config of {:?}", project))?;
    writeln!(out, "{}", config.to_json_string()?)?;

    for (index, err) in config.check() {
        warn!(index, "Matcher does not compile: {}", err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_passes_goals_and_options_through() {
        let args = run_args(&["mavlog", "run", "--skip-tests", "clean", "install", "-o", "-U"]);
        assert!(args.skip_tests);
        assert_eq!(args.goals, vec!["clean", "install", "-o", "-U"]);
        assert_eq!(args.start_option(), StartOption::All);
        assert_eq!(args.format, EventFormat::Text);
    }

    #[test]
    fn test_run_start_options() {
        let args = run_args(&["mavlog", "run", "--resume-from", ":core", "install"]);
        assert_eq!(args.start_option(), StartOption::ResumeFrom(":core".to_string()));

        let args = run_args(&["mavlog", "run", "--also-make", "web"]);
        assert_eq!(args.start_option(), StartOption::BuildUpTo("web".to_string()));

        assert!(Cli::try_parse_from(["mavlog", "run", "--resume-from", "a", "--projects", "b"])
            .is_err());
    }

    #[test]
    fn test_run_capture_flag() {
        assert_eq!(run_args(&["mavlog", "run", "install"]).capture(), Capture::Off);

        let args = run_args(&["mavlog", "run", "--capture", "clean", "install"]);
        assert_eq!(args.capture(), Capture::TempDir);
        assert_eq!(args.goals, vec!["clean", "install"]);

        let args = run_args(&["mavlog", "run", "--capture=/tmp/build.log", "install"]);
        assert_eq!(
            args.capture(),
            Capture::File(PathBuf::from("/tmp/build.log"))
        );
        assert_eq!(args.goals, vec!["install"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captured_run_parses_back_to_same_events() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("run.log");
        let command = MavenCommand::new(dir.path())
            .with_executable("sh")
            .with_goals([
                "-c",
                "echo '[INFO] Building demo 1.0'; echo '[WARNING] careful' >&2; \
                 echo '[INFO] BUILD SUCCESS'",
            ]);

        let mut live = Vec::new();
        let outcome = BuildRunner::new(Arc::new(ClassificationStrategy::default()))
            .with_capture(Capture::File(log.clone()))
            .run(&command, &mut live)
            .await;
        assert_eq!(outcome.capture_path.as_deref(), Some(log.as_path()));

        let mut out = Vec::new();
        assert!(cmd_parse(&log, None, EventFormat::Json, &mut out)
            .await
            .unwrap());
        let replayed: Vec<BuildEvent> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(&live[1..live.len() - 1], replayed.as_slice());
    }

    #[tokio::test]
    async fn test_parse_prints_text_dump() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("build.log");
        std::fs::write(&log, "[INFO] Building demo 1.0\n[INFO] BUILD SUCCESS\n").unwrap();

        let mut out = Vec::new();
        let ok = cmd_parse(&log, None, EventFormat::Text, &mut out)
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#MAVEN_MODULE [demo 1.0]\n[INFO] BUILD SUCCESS\n"
        );
    }

    #[tokio::test]
    async fn test_parse_prints_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("build.log");
        std::fs::write(&log, "[INFO] Building demo 1.0\n[WARNING] careful\n").unwrap();

        let mut out = Vec::new();
        cmd_parse(&log, None, EventFormat::Json, &mut out)
            .await
            .unwrap();
        let events: Vec<BuildEvent> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                BuildEvent::ModuleStarted {
                    coordinate: "demo 1.0".to_string()
                },
                BuildEvent::warning("careful"),
            ]
        );
    }

    #[tokio::test]
    async fn test_parse_reports_aborted_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("build.log");
        std::fs::write(
            &log,
            "[INFO] Reactor Build Order:\n[INFO]\n[INFO] a\n[INFO]\n[INFO] Building a [one/two]\n",
        )
        .unwrap();

        let mut out = Vec::new();
        let ok = cmd_parse(&log, None, EventFormat::Text, &mut out)
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_parse_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_parse(
            &dir.path().join("missing.log"),
            None,
            EventFormat::Text,
            Vec::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Failed to open log"));
    }

    #[test]
    fn test_config_init_and_show() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        cmd_config_init(dir.path(), false, &mut out).unwrap();
        assert!(ClassificationConfig::project_path(dir.path()).exists());

        let err = cmd_config_init(dir.path(), false, &mut out).unwrap_err();
        assert!(err.to_string().contains("--force"));
        cmd_config_init(dir.path(), true, &mut out).unwrap();

        let mut shown = Vec::new();
        cmd_config_show(dir.path(), &mut shown).unwrap();
        let shown = String::from_utf8(shown).unwrap();
        assert_eq!(
            ClassificationConfig::from_json_str(&shown).unwrap(),
            ClassificationConfig::default()
        );
    }

    #[test]
    fn test_classify_explicit_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        cmd_classify(
            None,
            dir.path(),
            &["12:00 [main] ERROR boom".to_string(), "plain".to_string()],
            &mut out,
        )
        .unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("result=ERROR"), "{}", lines[0]);
        assert_eq!(lines[1], "(\"plain\", -)");
    }

    #[test]
    fn test_classify_uses_config_test_input() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.json");
        std::fs::write(
            &config_path,
            r#"{"matchers": [["startswith", "SEVERE", 4]], "test_input": ["SEVERE: disk", "fine"]}"#,
        )
        .unwrap();

        let mut out = Vec::new();
        cmd_classify(Some(&config_path), dir.path(), &[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }
}
