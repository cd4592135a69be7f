//! CLI binary for tei-harvest.
//!
//! A thin shim over the library crate that maps CLI flags (with environment
//! fallbacks) to `HarvestConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tei_harvest::{
    discover_documents, run_batch, verify_categories, ArtifactStore, BatchProgressCallback, BatchReport,
    CheckCategory, DocumentReport, HarvestConfig, HealthProber, ProgressCallback, RetryPolicy, Stage,
    StageOutcome, SummaryOutcome, VerificationReport,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per document.
struct CliProgressCallback {
    bar: ProgressBar,
    failed_stages: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Waiting for the extraction service…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed_stages: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Harvesting");
        self.bar.reset_eta();
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} document(s)…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, doc_id: &str) {
        self.bar.set_message(doc_id.to_string());
    }

    fn on_stage_complete(&self, _doc_id: &str, stage: Stage, outcome: &StageOutcome) {
        if let StageOutcome::Failed { error } = outcome {
            self.failed_stages.fetch_add(1, Ordering::SeqCst);
            let msg = error.to_string();
            let msg = if msg.chars().count() > 100 {
                let cut: String = msg.chars().take(99).collect();
                format!("{cut}\u{2026}")
            } else {
                msg
            };
            self.bar
                .println(format!("      {} {:<22} {}", red("✗"), stage.name(), red(&msg)));
        }
    }

    fn on_document_complete(&self, index: usize, total: usize, report: &DocumentReport) {
        let mark = if report.failed() { red("✗") } else { green("✓") };
        let skipped = report
            .stages
            .iter()
            .filter(|s| s.outcome == StageOutcome::Skipped)
            .count();
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {:<40} {}  {}",
            mark,
            index + 1,
            total,
            report.doc_id,
            dim(&format!("{} request(s), {} skipped", report.requests(), skipped)),
            dim(&format!("{:.1}s", report.duration_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_summary_complete(&self, outcome: &SummaryOutcome) {
        if let SummaryOutcome::Written { path, documents } = outcome {
            self.bar.println(format!(
                "  {} figures chart ({} documents) → {}",
                green("✓"),
                documents,
                dim(&path.display().to_string())
            ));
        }
    }

    fn on_batch_complete(&self, total_documents: usize, failed_documents: usize) {
        self.bar.finish_and_clear();
        if failed_documents == 0 {
            eprintln!(
                "{} {} document(s) processed successfully",
                green("✔"),
                bold(&total_documents.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} document(s) complete  ({} failed stage(s), retried on next run)",
                if failed_documents == total_documents { red("✘") } else { cyan("⚠") },
                bold(&(total_documents - failed_documents).to_string()),
                total_documents,
                red(&self.failed_stages.load(Ordering::SeqCst).to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process every PDF in /app/pdfs against the default service
  tei-harvest run

  # Explicit service and folders, then verify the tree
  tei-harvest run --service-url http://localhost:8070 --input ./pdfs --output ./out --verify

  # Only full text and links, no chart
  tei-harvest run --stages full-text,links --no-summary

  # Is the service up? (exit code 0/1)
  tei-harvest probe --attempts 3 --interval 2

  # Check the artifact tree of a previous run
  tei-harvest verify --input ./pdfs --output ./out --json

STAGES:
  full-text              processFulltextDocument → pdf_full_text_document/tei.xml
  keyword-cloud          processHeaderDocument   → keyword_cloud/{tei.xml, keyword_cloud.png}
  links                  processReferences       → links_in_pdf/{tei.xml, links.txt}
  figure-visualization   visualization/figures   → visualization_figures/visualization_figures.png

ENVIRONMENT VARIABLES:
  SERVICE_URL            Extraction service base URL (default http://service-host:8070)
  INPUT_FOLDER           Folder scanned for *.pdf (default /app/pdfs)
  OUTPUT_FOLDER          Artifact tree root (default: the input folder)
  PROBE_ATTEMPTS         Health-probe attempts (default 10)
  PROBE_INTERVAL_SECS    Seconds between attempts (default 10)
  PROBE_TIMEOUT_SECS     Timeout of one health check (default 10)
  REQUEST_TIMEOUT_SECS   Timeout of one document upload (default 180)
  EXPECTED_VERSION       Require this exact service version
  FONT_PATH              TrueType font for word clouds and chart labels (default: system, else built-in DejaVu Sans)
  STAGES                 Comma-separated stage list (default all)
  RUST_LOG               Overrides the log filter

Re-running is safe: finished artifacts are never requested again, failed
ones are retried.
"#;

/// Drive a PDF-to-TEI extraction service over a folder of PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "tei-harvest",
    version,
    about = "Drive a PDF-to-TEI extraction service over a folder of PDFs",
    long_about = "Submit every PDF of a folder to a PDF-to-TEI extraction service (such as GROBID), \
store the responses in a per-document artifact tree, and derive keyword clouds, link lists and a \
figures-per-article chart. Finished artifacts are skipped on later runs.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "TEI_HARVEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "TEI_HARVEST_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the service, then process every PDF of the input folder.
    Run(RunArgs),
    /// Wait for the service to become ready; exit 1 if it never does.
    Probe(ProbeArgs),
    /// Check the artifact tree of a previous run; exit 1 on missing artifacts.
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Base URL of the extraction service.
    #[arg(long, env = "SERVICE_URL", default_value = tei_harvest::config::DEFAULT_SERVICE_URL)]
    service_url: String,

    /// Health-probe attempts before giving up.
    #[arg(long = "attempts", env = "PROBE_ATTEMPTS", default_value_t = 10)]
    probe_attempts: u32,

    /// Seconds to sleep between health-probe attempts.
    #[arg(long = "interval", env = "PROBE_INTERVAL_SECS", default_value_t = 10)]
    probe_interval_secs: u64,

    /// Timeout of a single health check, in seconds.
    #[arg(long = "probe-timeout", env = "PROBE_TIMEOUT_SECS", default_value_t = 10)]
    probe_timeout_secs: u64,

    /// Require `/api/version` to report exactly this version.
    #[arg(long, env = "EXPECTED_VERSION")]
    expected_version: Option<String>,
}

#[derive(Args, Debug)]
struct FolderArgs {
    /// Folder scanned for *.pdf files.
    #[arg(short, long = "input", env = "INPUT_FOLDER", default_value = tei_harvest::config::DEFAULT_INPUT_FOLDER)]
    input_folder: PathBuf,

    /// Root of the artifact tree. Defaults to the input folder.
    #[arg(short, long = "output", env = "OUTPUT_FOLDER")]
    output_folder: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    service: ServiceArgs,

    #[command(flatten)]
    folders: FolderArgs,

    /// Timeout of a single document upload, in seconds.
    #[arg(long = "request-timeout", env = "REQUEST_TIMEOUT_SECS", default_value_t = 180)]
    request_timeout_secs: u64,

    /// Stages to run: all, or a comma-separated list
    /// (full-text, keyword-cloud, links, figure-visualization).
    #[arg(long, env = "STAGES", default_value = "all")]
    stages: String,

    /// Do not (re)generate figures_in_articles.png.
    #[arg(long)]
    no_summary: bool,

    /// Skip the health probe.
    #[arg(long)]
    skip_probe: bool,

    /// TrueType font for word clouds and chart labels.
    #[arg(long = "font", env = "FONT_PATH")]
    font_path: Option<PathBuf>,

    /// Verify the artifact tree after the run.
    #[arg(long)]
    verify: bool,

    /// Output the BatchReport as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "TEI_HARVEST_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    #[command(flatten)]
    service: ServiceArgs,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    #[command(flatten)]
    folders: FolderArgs,

    /// Also require visualization_figures.png for every document.
    #[arg(long)]
    visualization: bool,

    /// Output the VerificationReport as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are hidden while the progress bar is active; the bar
    // carries the same information.
    let show_progress = match &cli.command {
        Command::Run(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run(args) => cmd_run(args, show_progress, cli.quiet).await,
        Command::Probe(args) => cmd_probe(args, cli.quiet).await,
        Command::Verify(args) => cmd_verify(args, cli.quiet),
    }
}

async fn cmd_run(args: RunArgs, show_progress: bool, quiet: bool) -> Result<ExitCode> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&args, progress_cb)?;

    let report = run_batch(&config).await.context("Batch failed")?;

    let verification = if args.verify {
        Some(verify_tree(&config.input_folder, config.output_root(), false)?)
    } else {
        None
    };

    if args.json {
        let json = match &verification {
            Some(v) => serde_json::to_string_pretty(&serde_json::json!({ "batch": report, "verification": v })),
            None => serde_json::to_string_pretty(&report),
        }
        .context("Failed to serialise report")?;
        println!("{json}");
    } else if !quiet {
        print_batch_summary(&report, show_progress);
        if let Some(v) = &verification {
            print_verification(v);
        }
    }

    let verified = verification.as_ref().map_or(true, VerificationReport::passed);
    Ok(if report.has_failures() || !verified {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn cmd_probe(args: ProbeArgs, quiet: bool) -> Result<ExitCode> {
    let s = &args.service;
    let mut prober = HealthProber::new(
        s.service_url.clone(),
        RetryPolicy::fixed(s.probe_attempts.max(1), Duration::from_secs(s.probe_interval_secs)),
        Duration::from_secs(s.probe_timeout_secs.max(1)),
    )
    .context("Failed to create health prober")?;
    if let Some(v) = &s.expected_version {
        prober = prober.with_expected_version(v.clone());
    }

    match prober.wait().await {
        Some(info) => {
            if !quiet {
                eprintln!(
                    "{} {} is ready (version {})",
                    green("✔"),
                    bold(&s.service_url),
                    info.version
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!(
                "{} {} not ready after {} attempt(s)",
                red("✘"),
                bold(&s.service_url),
                s.probe_attempts.max(1)
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_verify(args: VerifyArgs, quiet: bool) -> Result<ExitCode> {
    let root = args
        .folders
        .output_folder
        .clone()
        .unwrap_or_else(|| args.folders.input_folder.clone());
    let report = verify_tree(&args.folders.input_folder, &root, args.visualization)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !quiet {
        print_verification(&report);
    }
    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn verify_tree(input: &Path, root: &Path, visualization: bool) -> Result<VerificationReport> {
    let docs = discover_documents(input).context("Failed to list input documents")?;
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    let categories: &[CheckCategory] = if visualization {
        &CheckCategory::ALL
    } else {
        &CheckCategory::DEFAULT
    };
    Ok(verify_categories(&ArtifactStore::new(root), &ids, categories))
}

/// Map CLI args to `HarvestConfig`.
fn build_config(args: &RunArgs, progress: Option<ProgressCallback>) -> Result<HarvestConfig> {
    let s = &args.service;
    let mut builder = HarvestConfig::builder()
        .service_url(s.service_url.clone())
        .input_folder(args.folders.input_folder.clone())
        .probe_attempts(s.probe_attempts)
        .probe_interval_secs(s.probe_interval_secs)
        .probe_timeout_secs(s.probe_timeout_secs)
        .request_timeout_secs(args.request_timeout_secs)
        .skip_probe(args.skip_probe)
        .stages(parse_stages(&args.stages)?)
        .summary(!args.no_summary);

    if let Some(ref out) = args.folders.output_folder {
        builder = builder.output_folder(out.clone());
    }
    if let Some(ref v) = s.expected_version {
        builder = builder.expected_version(v.clone());
    }
    if let Some(ref font) = args.font_path {
        builder = builder.font_path(font.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--stages`: `all`, `none`, or a comma-separated list of stage names.
fn parse_stages(s: &str) -> Result<Vec<Stage>> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "" | "all" => return Ok(Stage::ALL.to_vec()),
        "none" => return Ok(Vec::new()),
        _ => {}
    }
    s.split(',')
        .map(|name| {
            Stage::parse(name).with_context(|| {
                format!(
                    "Unknown stage '{}' (expected one of: {})",
                    name.trim(),
                    Stage::ALL.map(|s| s.name()).join(", ")
                )
            })
        })
        .collect()
}

fn print_batch_summary(report: &BatchReport, progress_shown: bool) {
    let st = &report.stats;
    if !progress_shown {
        for doc in &report.documents {
            let mark = if doc.failed() { red("✗") } else { green("✓") };
            eprintln!("  {} {:<40} {}", mark, doc.doc_id, dim(&format!("{} request(s)", doc.requests())));
            for err in doc.errors() {
                eprintln!("      {}", red(&err.to_string()));
            }
        }
    }
    if let Some(ref v) = report.service_version {
        eprintln!("   service version {}", dim(v));
    }
    let summary = match &report.summary {
        SummaryOutcome::Written { path, .. } => format!("chart → {}", path.display()),
        SummaryOutcome::UpToDate => "chart up to date".to_string(),
        SummaryOutcome::NoData => "no chart (no full-text TEI)".to_string(),
        SummaryOutcome::Disabled => "chart disabled".to_string(),
        SummaryOutcome::Failed { detail } => red(&format!("chart failed: {detail}")),
    };
    eprintln!(
        "{}  {} document(s)  {} done / {} skipped / {} empty / {} failed  {} request(s)  {}ms  —  {}",
        if report.has_failures() { cyan("⚠") } else { green("✔") },
        st.documents,
        st.stages_done,
        st.stages_skipped,
        st.stages_empty,
        st.stages_failed,
        st.requests,
        st.duration_ms,
        summary,
    );
}

fn print_verification(report: &VerificationReport) {
    eprintln!("{} {}", cyan("◆"), bold(&format!("Verification of {} document(s)", report.documents)));
    for c in &report.categories {
        if c.passed {
            eprintln!("  {} {:<22} {}", green("✓"), c.category.name(), dim(&format!("{} checked", c.checked)));
        } else {
            eprintln!(
                "  {} {:<22} {}",
                red("✗"),
                c.category.name(),
                red(&format!("{}/{} missing", c.failing.len(), c.checked))
            );
            for path in &c.failing {
                eprintln!("      {}", dim(&path.display().to_string()));
            }
        }
    }
    if report.passed() {
        eprintln!("{} all checks passed", green("✔"));
    } else {
        eprintln!("{} some checks failed", red("✘"));
    }
}
