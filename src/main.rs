use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogger_export::{Config, DirectorySink, Event, Exporter, RunOutcome, RunState};
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Parser)]
#[command(name = "blogger-export")]
#[command(about = "Export every post of a Blogger blog into one XML file per year")]
struct Cli {
    /// Blog URL, for example https://myblog.blogspot.com
    url: String,

    /// Directory the XML files are written to (overrides the config file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fail the run instead of exporting a partial feed when a page cannot be read
    #[arg(long)]
    strict: bool,

    /// Print the export summary as JSON
    #[arg(long)]
    json: bool,
}

/// Initialize tracing with output to stderr so stdout only carries results
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "blogger_export=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> blogger_export::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.output {
        config.export.output_dir = dir.clone();
    }
    if cli.strict {
        config.feed.strict_pagination = true;
    }
    Ok(config)
}

/// How long the CLI waits for queued progress lines after a run returns
const PRINTER_GRACE: Duration = Duration::from_secs(1);

/// Stderr line for an event, if it is worth showing
fn progress_line(event: &Event) -> Option<String> {
    match event {
        Event::Progress { percent, message } => Some(format!("[{:>3}%] {}", percent, message)),
        Event::PaginationHalted { halt } => Some(format!(
            "Warning: feed ended early at post {} ({})",
            halt.start_index, halt.reason
        )),
        Event::DocumentExported { filename, posts, .. } => {
            Some(format!("  wrote {} ({} posts)", filename, posts))
        }
        Event::DocumentSaveFailed {
            filename, error, ..
        } => Some(format!("Warning: could not save {}: {}", filename, error)),
        _ => None,
    }
}

/// Whether no further events of the current run will follow
fn ends_run(event: &Event) -> bool {
    matches!(
        event,
        Event::Completed { .. }
            | Event::Failed { .. }
            | Event::Cancelled
            | Event::StateChanged {
                state: RunState::Error
            }
    )
}

/// Print events until the run ends, returning how many lines were printed
async fn print_events(mut events: broadcast::Receiver<Event>) -> usize {
    let mut printed = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = progress_line(&event) {
                    eprintln!("{}", line);
                    printed += 1;
                }
                if ends_run(&event) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress printer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
    printed
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let sink = DirectorySink::new(config.export.output_dir.clone());

    let exporter = match Exporter::new(config) {
        Ok(exporter) => Arc::new(exporter),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // progress lines go to stderr, --json keeps stdout machine-readable
    let mut printer = tokio::spawn(print_events(exporter.subscribe()));

    let interrupt = {
        let exporter = exporter.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                exporter.cancel().await;
            }
        })
    };

    let outcome = exporter.run(&cli.url, &sink).await;
    interrupt.abort();
    // let the printer catch up on events already queued for this run
    if tokio::time::timeout(PRINTER_GRACE, &mut printer).await.is_err() {
        printer.abort();
    }

    match outcome {
        RunOutcome::Completed(summary) => {
            if cli.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!(
                    "Exported {} posts from {} into {} ({} files)",
                    summary.total_posts,
                    summary.blog_id,
                    sink.dir().display(),
                    summary.file_count
                );
                for year in &summary.years {
                    println!("  {}: {} posts", year.year, year.count);
                }
                if let Some(halt) = &summary.truncated {
                    println!("  (feed ended early at post {})", halt.start_index);
                }
            }
            if summary.failed_files.is_empty() {
                ExitCode::SUCCESS
            } else {
                eprintln!(
                    "Error: {} of {} files could not be saved: {}",
                    summary.failed_files.len(),
                    summary.failed_files.len() + summary.file_count,
                    summary.failed_files.join(", ")
                );
                ExitCode::FAILURE
            }
        }
        RunOutcome::Failed { message, .. } => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
        RunOutcome::Cancelled => {
            eprintln!("Cancelled");
            ExitCode::from(130)
        }
        RunOutcome::Busy => {
            eprintln!("Error: an export is already running");
            ExitCode::FAILURE
        }
    }
}
