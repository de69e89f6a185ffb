use anyhow::Result;
use clap::Parser;
use futures_util::{pin_mut, StreamExt};
use owo_colors::OwoColorize;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use docpull::config::{find_settings_file, get_settings, load_settings};
use docpull::models::{BatchEvent, ConversionResult, ListingEntry};
use docpull::pipeline::{preview_paper_selection, BatchSequencer, Converter};

/// Convert document-bearing URLs into local PDF or Markdown artifacts
#[derive(Parser, Debug)]
#[command(name = "docpull")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert arXiv pages, PDF links, and webpages into local artifacts", long_about = None)]
struct Cli {
    /// URLs to process, in order
    #[arg(required = true)]
    urls: Vec<String>,

    /// Force an extraction format for webpages (markdown or text) instead
    /// of the automatic fallback chain
    #[arg(long, short)]
    format: Option<String>,

    /// Output directory for written artifacts
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Emit the streamed event protocol (marker-prefixed JSON frames)
    /// instead of human-readable output
    #[arg(long)]
    json: bool,

    /// Skip the multi-paper selection preview and process everything
    #[arg(long)]
    no_preview: bool,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v, -vv, -vvv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = match cli.config.clone().or_else(find_settings_file) {
        Some(path) => load_settings(&path)?,
        None => get_settings(),
    };
    if let Some(output) = cli.output.clone() {
        settings.output_dir = output;
    }

    let color = std::io::stdout().is_terminal();

    // Several arXiv paper URLs at once: offer a selection preview instead
    // of downloading everything unasked
    if !cli.no_preview && cli.format.is_none() {
        if let Some(entries) = preview_paper_selection(&cli.urls, settings.selection_threshold) {
            print_selection_preview(&entries, cli.json);
            return Ok(());
        }
    }

    let output_dir = settings.output_dir.clone();
    let converter = Arc::new(Converter::new(settings));

    let results = match &cli.format {
        Some(format) => run_with_format(&converter, &cli.urls, format, cli.json, color).await,
        None => run_batch(&converter, &cli.urls, cli.json, color).await,
    };

    if !cli.json {
        print_summary(&results, &output_dir, color);
    }

    Ok(())
}

/// Drive the batch sequencer, relaying its event stream.
async fn run_batch(
    converter: &Arc<Converter>,
    urls: &[String],
    json: bool,
    color: bool,
) -> Vec<ConversionResult> {
    let sequencer = BatchSequencer::new(Arc::clone(converter));
    let events = sequencer.stream_events(urls);
    pin_mut!(events);

    let mut results = Vec::new();
    while let Some(event) = events.next().await {
        if json {
            print!("{}", event.to_frame());
            let _ = std::io::stdout().flush();
            if let BatchEvent::Complete { results: all, .. } = event {
                results = all;
            }
            continue;
        }

        match event {
            BatchEvent::Progress {
                current,
                total,
                url,
                ..
            } => {
                println!("[{}/{}] {}", current, total, url);
            }
            BatchEvent::Result { result, .. } => {
                print_result_line(&result, color);
            }
            BatchEvent::Complete { results: all, .. } => {
                results = all;
            }
        }
    }
    results
}

/// Explicit-format mode: every URL goes through the content extractor.
async fn run_with_format(
    converter: &Arc<Converter>,
    urls: &[String],
    format: &str,
    json: bool,
    color: bool,
) -> Vec<ConversionResult> {
    let pacing = converter.settings().pacing();
    let total = urls.len();
    let mut results = Vec::with_capacity(total);

    for (index, url) in urls.iter().enumerate() {
        if !json {
            println!("[{}/{}] {}", index + 1, total, url);
        }

        let result = converter.extract_as(url, format).await;
        if json {
            print!("{}", BatchEvent::result(index, total, result.clone()).to_frame());
            let _ = std::io::stdout().flush();
        } else {
            print_result_line(&result, color);
        }
        results.push(result);

        if index + 1 < total && !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }

    if json {
        let success_count = results.iter().filter(|r| r.success).count();
        let event = BatchEvent::Complete {
            total,
            success_count,
            results: results.clone(),
        };
        print!("{}", event.to_frame());
        let _ = std::io::stdout().flush();
    }

    results
}

fn print_selection_preview(entries: &[ListingEntry], json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string())
        );
        return;
    }

    println!(
        "Found {} arXiv papers. Re-run with the ones you want, or pass --no-preview to download all:",
        entries.len()
    );
    for (i, entry) in entries.iter().enumerate() {
        println!("  {}. {} - {}", i + 1, entry.title, entry.url);
    }
}

fn print_result_line(result: &ConversionResult, color: bool) {
    let mark = marker(result.success, color);

    if result.success {
        let title = result.title.as_deref().unwrap_or("untitled");
        println!("  {} {}", mark, title);
        if let Some(file_name) = &result.file_name {
            println!("    file: {}", file_name);
        }
        if let Some(items) = &result.items {
            for entry in items {
                println!("    - {} ({})", entry.title, entry.url);
            }
        }
        if let Some(note) = &result.note {
            println!("    note: {}", note);
        }
        if let Some(guidance) = &result.guidance {
            for alternative in &guidance.alternatives {
                println!("    - {}", alternative);
            }
            for link in &guidance.discovered_pdf_links {
                println!("    pdf: {} ({})", link.text, link.url);
            }
        }
    } else {
        println!(
            "  {} failed: {}",
            mark,
            result.error.as_deref().unwrap_or("unknown error")
        );
        if let Some(suggestion) = &result.suggestion {
            println!("    suggestion: {}", suggestion);
        }
    }
}

fn print_summary(results: &[ConversionResult], output_dir: &std::path::Path, color: bool) {
    let success_count = results.iter().filter(|r| r.success).count();

    println!();
    println!("Summary");
    println!("=======");
    for (i, result) in results.iter().enumerate() {
        let mark = marker(result.success, color);
        let label = result
            .title
            .as_deref()
            .or(result.error.as_deref())
            .unwrap_or("unknown");
        println!("{} {}. [{}] {}", mark, i + 1, result.kind, label);
    }
    println!();
    println!("Total: {}/{} succeeded", success_count, results.len());

    let wrote_artifacts = results
        .iter()
        .any(|r| r.success && r.file_path.is_some());
    if wrote_artifacts {
        println!("Artifacts saved to: {}", output_dir.display());
    }
}

fn marker(ok: bool, color: bool) -> String {
    match (ok, color) {
        (true, true) => "✓".green().to_string(),
        (true, false) => "✓".to_string(),
        (false, true) => "✗".red().to_string(),
        (false, false) => "✗".to_string(),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("docpull={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
