//! CLI binary for docx2wiki.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, connects to the wiki and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docx2wiki::{
    convert_and_publish, dump_index, write_output, ConversionConfig, ConversionProgressCallback,
    ConversionResult, MediaWikiClient, OfflineStore, ProgressCallback, Publisher, ReconcileReport,
    RemoteStore, Resolution,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal progress: one bar reused for the reconciliation pass and then
/// for the document's images.
struct CliProgressCallback {
    bar: ProgressBar,
    verbose: bool,
}

impl CliProgressCallback {
    fn new(verbose: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar, verbose })
    }

    fn activate_bar(&self, prefix: &'static str, unit: &str, total: usize) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>4}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_reconcile_start(&self, total_assets: usize) {
        self.activate_bar("Indexing wiki", "files", total_assets);
    }

    fn on_asset_processed(&self, title: &str, fingerprint: Option<&str>) {
        if let (true, Some(fp)) = (self.verbose, fingerprint) {
            self.bar
                .println(format!("  {} {}  {}", cyan("+"), title, dim(fp)));
        }
        self.bar.set_message(title.to_string());
        self.bar.inc(1);
    }

    fn on_reconcile_complete(&self, report: &ReconcileReport) {
        self.bar.println(format!(
            "{} Index up to date  {}",
            green("✓"),
            dim(&format!(
                "{} listed, {} new, {} known, {} skipped",
                report.listed, report.indexed, report.already_known, report.skipped_format
            )),
        ));
    }

    fn on_image_start(&self, sequence: u32, total_images: usize) {
        if sequence == 1 {
            self.activate_bar("Images", "images", total_images);
        }
        self.bar.set_message(format!("image {sequence}"));
    }

    fn on_image_resolved(&self, sequence: u32, resolution: &Resolution) {
        let line = match resolution {
            Resolution::Existing(id) => format!("  {} Image {:>3}  {}", green("="), sequence, dim(id)),
            Resolution::Uploaded(id) => format!("  {} Image {:>3}  {}", cyan("↑"), sequence, id),
            Resolution::Pending => format!(
                "  {} Image {:>3}  {}",
                yellow("…"),
                sequence,
                yellow("not on the wiki")
            ),
        };
        self.bar.println(line);
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Import a document into a page
  docx2wiki --api-url https://wiki.example.org/w/api.php \
            --username 'Importer@docx2wiki' --password "$BOT_PASSWORD" \
            --pagename "Harbour survey" --input survey.docx

  # Preview the wikitext without uploading or saving anything
  # (works offline when no --api-url is set)
  docx2wiki --dry --input survey.docx > survey.wiki

  # Skip the wiki inventory pass when the index is known to be current
  docx2wiki --nohashes --pagename "Harbour survey" --input survey.docx

  # List the fingerprint index
  docx2wiki --dump --db ~/DFM_images

NOTES:
  Every embedded image must either already exist on the wiki or carry
  ALT text, which becomes the description of the uploaded file.
  Images are matched by a 64-bit perceptual fingerprint kept in
  <db>.idx; the first run downloads every jpeg/png on the wiki once.

ENVIRONMENT VARIABLES:
  DOCX2WIKI_API_URL   MediaWiki api.php endpoint
  DOCX2WIKI_USERNAME  Bot-password user name (User@botname)
  DOCX2WIKI_PASSWORD  Bot password
  DOCX2WIKI_DB        Fingerprint index base path
  RUST_LOG            Override the log filter
"#;

/// Import Word documents into MediaWiki, reusing images already on the wiki.
#[derive(Parser, Debug)]
#[command(
    name = "docx2wiki",
    version,
    about = "Import Word documents into MediaWiki, reusing images already on the wiki",
    long_about = "Convert a .docx document to MediaWiki markup and save it to a page. \
Embedded images are matched against the wiki's files by perceptual fingerprint and \
uploaded only when no match exists. Zotero citations become <ref> templates.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Wiki page to save the converted document to.
    #[arg(long, required_unless_present_any = ["dump", "dry"])]
    pagename: Option<String>,

    /// The .docx file to import.
    #[arg(long, required_unless_present = "dump")]
    input: Option<PathBuf>,

    /// Fingerprint index base path (the store lives at <db>.idx). Default: ~/DFM_images.
    #[arg(long, env = "DOCX2WIKI_DB")]
    db: Option<PathBuf>,

    /// Print every index record as `fingerprint,remote_id` and exit.
    #[arg(long)]
    dump: bool,

    /// Do not fingerprint wiki images missing from the index before converting.
    #[arg(long)]
    nohashes: bool,

    /// Convert only: no uploads, no index writes, no page save.
    #[arg(long)]
    dry: bool,

    /// MediaWiki api.php endpoint. A dry run without one works offline.
    #[arg(long, env = "DOCX2WIKI_API_URL", required_unless_present_any = ["dump", "dry"])]
    api_url: Option<String>,

    /// Bot-password user name.
    #[arg(long, env = "DOCX2WIKI_USERNAME", requires = "password")]
    username: Option<String>,

    /// Bot password.
    #[arg(long, env = "DOCX2WIKI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Also write the wikitext to this file.
    #[arg(short, long, env = "DOCX2WIKI_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the conversion result as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Prefix for uploaded file names. Default: the input file stem.
    #[arg(long)]
    upload_base: Option<String>,

    /// Edit summary for the saved page.
    #[arg(long)]
    summary: Option<String>,

    /// Leave Zotero citation links as plain text.
    #[arg(long)]
    no_citations: bool,

    /// Per-request wiki API timeout in seconds.
    #[arg(long, env = "DOCX2WIKI_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "DOCX2WIKI_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCX2WIKI_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCX2WIKI_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.dump;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let db = match cli.db.clone() {
        Some(db) => db,
        None => default_db()?,
    };

    // ── Dump mode ────────────────────────────────────────────────────────
    if cli.dump {
        let records = dump_index(&db)
            .with_context(|| format!("Failed to read index {}", db.display()))?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        for record in records {
            writeln!(handle, "{},{}", record.fingerprint, record.remote_id)
                .context("Failed to write to stdout")?;
        }
        return Ok(());
    }

    let input = cli.input.clone().context("--input is required")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(|| CliProgressCallback::new(cli.verbose));
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ConversionProgressCallback>),
    )?;

    // ── Connect and run ──────────────────────────────────────────────────
    let outcome = match cli.api_url.as_deref() {
        Some(api_url) => {
            let client = MediaWikiClient::from_config(api_url, &config)
                .context("Failed to create the wiki client")?;
            if let (Some(user), Some(pass)) = (&cli.username, &cli.password) {
                client
                    .login(user, pass)
                    .await
                    .with_context(|| format!("Login as '{}' failed", user))?;
            }
            run_import(&input, &db, &client, &config).await
        }
        // Only a dry run gets here, and a dry run never calls the wiki.
        None => run_import(&input, &db, &OfflineStore, &config).await,
    };
    if let Some(cb) = &progress {
        cb.finish();
    }
    let result = outcome?;

    if let Some(ref output_path) = cli.output {
        write_output(output_path, &result.markup)
            .await
            .context("Failed to write output")?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else if cli.dry && cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(result.markup.as_bytes())
            .context("Failed to write to stdout")?;
        if !result.markup.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet {
        print_summary(&cli, &result);
    }
    Ok(())
}

async fn run_import<C: RemoteStore + Publisher>(
    input: &Path,
    db: &Path,
    client: &C,
    config: &ConversionConfig,
) -> Result<ConversionResult> {
    convert_and_publish(input, db, client, config)
        .await
        .with_context(|| format!("Import of {} failed", input.display()))
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .dry_run(cli.dry)
        .reconcile(!cli.nohashes)
        .resolve_citations(!cli.no_citations)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref page) = cli.pagename {
        builder = builder.page_name(page);
    }
    if let Some(ref base) = cli.upload_base {
        builder = builder.upload_base(base);
    }
    if let Some(ref summary) = cli.summary {
        builder = builder.summary(summary);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `~/DFM_images`, resolved from the user's home directory.
fn default_db() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .context("Cannot locate the home directory; pass --db")?;
    Ok(PathBuf::from(home).join("DFM_images"))
}

fn print_summary(cli: &Cli, result: &ConversionResult) {
    let stats = &result.stats;
    let target = match (&cli.pagename, cli.dry) {
        (Some(page), false) => format!("saved to {}", bold(page)),
        _ => "dry run, nothing saved".to_string(),
    };
    eprintln!(
        "{}  {} images ({} reused, {} uploaded, {} pending)  {} citations  {}ms  →  {}",
        if result.warnings.is_empty() {
            green("✔")
        } else {
            yellow("⚠")
        },
        stats.total_images,
        stats.matched_images,
        stats.uploaded_images,
        stats.unresolved_images,
        stats.citations_resolved,
        stats.total_duration_ms,
        target,
    );
    if let Some(ref path) = cli.output {
        eprintln!("   wikitext written to {}", bold(&path.display().to_string()));
    }
    for warning in &result.warnings {
        eprintln!("   {} {}", yellow("warning:"), warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn dry_run_needs_neither_page_nor_wiki() {
        let cli = Cli::try_parse_from(["docx2wiki", "--dry", "--input", "survey.docx"]).unwrap();
        assert!(cli.dry);
        assert_eq!(cli.input.as_deref(), Some(Path::new("survey.docx")));
        assert!(cli.pagename.is_none());
    }

    #[test]
    fn timeout_reaches_the_config() {
        let cli = Cli::try_parse_from([
            "docx2wiki",
            "--dry",
            "--input",
            "survey.docx",
            "--api-timeout",
            "7",
        ])
        .unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.api_timeout_secs, 7);
        assert!(config.dry_run);
    }
}
