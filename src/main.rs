mod app;
mod file_io;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mergecanvas_export::{DEFAULT_ARCHIVE_NAME, DEFAULT_PIXEL_RATIO, FailurePolicy, RenderOptions};
use tracing_subscriber::EnvFilter;

use app::{App, parse_binding};
use file_io::DirectorySink;

/// Turn an extracted design into one PNG per spreadsheet row
#[derive(Parser, Debug)]
#[command(name = "mergecanvas")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every dataset row and write the designs as a zip archive
    Render(RenderArgs),
    /// Print the document seeded from an extraction result as JSON
    Inspect {
        /// Extraction result (JSON)
        #[arg(long, value_name = "FILE")]
        extraction: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Extraction result (JSON)
    #[arg(long, value_name = "FILE")]
    extraction: PathBuf,

    /// Dataset as a JSON array of string arrays, header record first
    #[arg(long, value_name = "FILE")]
    data: PathBuf,

    /// Bind a shape to a column (repeatable)
    #[arg(long = "bind", value_name = "SHAPE=COLUMN", value_parser = parse_binding)]
    bindings: Vec<(String, String)>,

    /// Output directory for the archive
    #[arg(long, value_name = "DIR", default_value = ".")]
    out: PathBuf,

    /// Archive file name
    #[arg(long, default_value = DEFAULT_ARCHIVE_NAME)]
    name: String,

    /// Directory that relative image references resolve against
    #[arg(long, value_name = "DIR", default_value = ".")]
    images_dir: PathBuf,

    /// Leave rows whose images fail to load out of the archive
    #[arg(long)]
    skip_failed_rows: bool,

    /// Output pixels per canvas unit
    #[arg(long, default_value_t = DEFAULT_PIXEL_RATIO)]
    pixel_ratio: f32,

    /// Give up on a single image load after this many milliseconds
    #[arg(long, value_name = "MS")]
    load_timeout_ms: Option<u64>,
}

impl RenderArgs {
    fn options(&self) -> RenderOptions {
        RenderOptions {
            pixel_ratio: self.pixel_ratio,
            failure_policy: if self.skip_failed_rows {
                FailurePolicy::SkipRow
            } else {
                FailurePolicy::AbortBatch
            },
            load_timeout: self.load_timeout_ms.map(Duration::from_millis),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `inspect` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Render(render) => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to create tokio runtime")?;
            rt.block_on(run_render(render))
        }
        Command::Inspect { extraction } => {
            let mut app = App::new(RenderOptions::default(), PathBuf::from("."));
            let doc = app.open(file_io::load_extraction(&extraction)?)?;
            let json = serde_json::to_string_pretty(doc.shapes()).context("failed to serialize shapes")?;
            println!("{json}");
            Ok(())
        }
    }
}

/// `RUST_LOG` directives when set and valid, `info` otherwise
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

async fn run_render(args: RenderArgs) -> Result<()> {
    if !(args.pixel_ratio.is_finite() && args.pixel_ratio > 0.0) {
        anyhow::bail!("pixel ratio must be positive, got {}", args.pixel_ratio);
    }

    let mut app = App::new(args.options(), args.images_dir.clone());
    app.open(file_io::load_extraction(&args.extraction)?)?;
    app.load_table(file_io::load_dataset(&args.data)?);
    app.bind(&args.bindings)?;

    let mut sink = DirectorySink::new(&args.out);
    let report = app.export(&mut sink, &args.name).await?;

    for skipped in &report.skipped {
        tracing::warn!(row = skipped.row_index + 1, error = %skipped.cause, "row left out of archive");
    }
    tracing::info!(
        path = %sink.path_for(&report.file_name).display(),
        designs = report.rendered,
        "wrote archive"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_replaces_default_level() {
        let filter = log_filter(Some("debug")).to_string();
        assert!(filter.contains("debug"));
        assert!(!filter.contains("info"));
    }

    #[test]
    fn defaults_to_info() {
        assert!(log_filter(None).to_string().contains("info"));
        assert!(log_filter(Some("  ")).to_string().contains("info"));
    }

    #[test]
    fn skip_flag_selects_skip_policy() {
        let args = Args::parse_from([
            "mergecanvas",
            "render",
            "--extraction",
            "e.json",
            "--data",
            "d.json",
            "--bind",
            "text1=Name",
            "--skip-failed-rows",
            "--load-timeout-ms",
            "250",
        ]);
        let Command::Render(render) = args.command else {
            panic!("expected render");
        };
        assert_eq!(render.bindings, vec![("text1".to_string(), "Name".to_string())]);
        let options = render.options();
        assert_eq!(options.failure_policy, FailurePolicy::SkipRow);
        assert_eq!(options.load_timeout, Some(Duration::from_millis(250)));
    }
}
