//! CLI entry point for `mailextract`.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailextract::config::{self, Config};
use mailextract::export::{ExportOptions, Exporter, RunReport, RunStatus};
use mailextract::write::OutputFormat;

/// Extract messages and attachments from a mail archive into .eml and .pdf files.
#[derive(Parser)]
#[command(name = "mailextract", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Archive to extract
    #[arg(value_name = "ARCHIVE")]
    archive: Option<PathBuf>,

    /// Output directory (default: output/<archive name>_extracted)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Plan every file and print the report without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Ask for the archive, format and output directory when not given
    #[arg(long)]
    interactive: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => cmd_extract(&cli, &config),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailextract.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<ExitCode> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailextract", &mut std::io::stdout());
    Ok(ExitCode::SUCCESS)
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<ExitCode> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(ExitCode::SUCCESS)
}

/// Extract one archive. Exit code 2 when some messages failed.
fn cmd_extract(cli: &Cli, config: &Config) -> anyhow::Result<ExitCode> {
    let mut prompter = Prompter::new(cli.interactive);

    let archive = match &cli.archive {
        Some(path) => path.clone(),
        None => match prompter.ask("Archive to extract", None)? {
            Some(answer) => PathBuf::from(answer),
            None => {
                Cli::command().print_help()?;
                anyhow::bail!("No archive given");
            }
        },
    };

    let formats = match cli.format {
        Some(format) => format,
        None => {
            let default = config.export.default_format;
            match prompter.ask("Format (eml, pdf, both)", Some(&default.to_string()))? {
                Some(answer) => answer.parse().map_err(anyhow::Error::msg)?,
                None => default,
            }
        }
    };

    let output = match &cli.output {
        Some(dir) => dir.clone(),
        None => {
            let default = config.output_root_for(&archive);
            match prompter.ask("Output directory", Some(&default.display().to_string()))? {
                Some(answer) => PathBuf::from(answer),
                None => default,
            }
        }
    };

    let options = ExportOptions {
        preview: cli.dry_run,
        utc_offset: config.utc_offset(),
        max_subject_bytes: config.naming.max_subject_bytes,
        pdf: config.pdf_style(),
        ..ExportOptions::new(&output, formats)
    };

    if !cli.json {
        println!(
            "  {} {} as {} to {}",
            if cli.dry_run { "Planning" } else { "Extracting" },
            archive.display(),
            formats,
            output.display()
        );
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let start = Instant::now();
    let report = Exporter::new(options).run_with_progress(&archive, &|progress| {
        let r = progress.report;
        spinner.set_message(format!(
            "{} processed, {} skipped, {} failed  {}",
            r.processed, r.skipped, r.failed, progress.folder
        ));
    });
    spinner.finish_and_clear();
    let report = report?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, start.elapsed(), cli.verbose > 0, &config::log_file_path(config));
    }

    Ok(match report.status() {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::PartialFailure => ExitCode::from(2),
    })
}

fn print_summary(report: &RunReport, elapsed: Duration, verbose: bool, log_file: &Path) {
    use humansize::{format_size, BINARY};

    println!();
    println!(
        "  {}",
        if report.preview {
            "Dry run complete (nothing written):"
        } else {
            "Extraction complete:"
        }
    );
    println!("  {:<25} {}", "Messages processed", report.processed);
    println!("  {:<25} {}", "Items skipped", report.skipped);
    println!("  {:<25} {}", "Failures", report.failed);
    println!("  {:<25} {}", "Degraded messages", report.degraded.len());
    if report.preview {
        println!("  {:<25} {}", "Files planned", report.outputs.len());
    } else {
        println!("  {:<25} {}", "Files written", report.outputs.len());
        println!("  {:<25} {}", "Attachments", report.attachments_written);
        println!(
            "  {:<25} {}",
            "Output size",
            format_size(report.bytes_written, BINARY)
        );
    }
    println!("  {:<25} {:.2?}", "Elapsed", elapsed);
    println!("  {:<25} {}", "Output directory", report.output_root.display());
    if verbose {
        println!("  {:<25} {}", "Log file", log_file.display());
    }

    if !report.failures.is_empty() {
        println!();
        println!("  Failures:");
        for failure in &report.failures {
            println!("    {}: {}", failure.source, failure.reason);
        }
    }

    if verbose {
        if !report.degraded.is_empty() {
            println!();
            println!("  Degraded:");
            for entry in &report.degraded {
                for note in &entry.notes {
                    println!("    {}: {note}", entry.source);
                }
            }
        }
        if report.preview {
            println!();
            println!("  Planned files:");
            for path in &report.outputs {
                println!("    {}", path.display());
            }
        }
    }
    println!();
}

/// Line-based questions on stdin. Inactive prompters answer nothing.
struct Prompter {
    active: bool,
    stdin: std::io::StdinLock<'static>,
}

impl Prompter {
    fn new(active: bool) -> Self {
        Self {
            active,
            stdin: std::io::stdin().lock(),
        }
    }

    /// `None` when inactive, or when the answer is blank and there is a default.
    fn ask(&mut self, question: &str, default: Option<&str>) -> anyhow::Result<Option<String>> {
        if !self.active {
            return Ok(None);
        }
        loop {
            match default {
                Some(d) => eprint!("{question} [{d}]: "),
                None => eprint!("{question}: "),
            }
            std::io::stderr().flush()?;

            let mut line = String::new();
            if self.stdin.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let answer = line.trim();
            if !answer.is_empty() {
                return Ok(Some(answer.to_string()));
            }
            if default.is_some() {
                return Ok(None);
            }
        }
    }
}
