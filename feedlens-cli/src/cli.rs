use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use feedlens_core::aggregator::{top_topics, SentimentBreakdown};
use feedlens_core::batcher;
use feedlens_core::progress::{FnSink, ProgressEvent};
use feedlens_core::{
    compare, default_analysis_name, llm_analyzer, ColumnMapping, DataSource, FeedlensConfig,
    FileIdentityProvider, IdentityProvider, JsonFileReportStore, NewReport, ProcessedReport,
    ReportStore, RunSummary, StoredReport,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "feedlens-cli")]
#[command(about = "Analyze customer feedback CSVs and manage saved reports")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify, summarize and aggregate a feedback CSV
    Analyze {
        #[arg(short, long)]
        file: PathBuf,
        /// Column holding the feedback text
        #[arg(short = 't', long)]
        text_column: String,
        /// Optional column holding a date/time per row
        #[arg(long)]
        timestamp_column: Option<String>,
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Print the batch plan only; no LLM calls are made
        #[arg(long)]
        dry_run: bool,
        /// Save the report to the local store
        #[arg(long)]
        save: bool,
        /// Name for the saved report; defaults to "<file> Analysis"
        #[arg(short, long, requires = "save")]
        name: Option<String>,
        /// Write the report (storage form) as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List saved reports for this client, newest first
    History,
    /// Print a saved report
    Show {
        #[arg(long)]
        id: String,
    },
    /// Compare two saved reports
    Compare {
        #[arg(long)]
        current: String,
        #[arg(long)]
        previous: String,
    },
    /// Start mock LLM server
    MockServer {
        #[arg(short, long, default_value = "3001")]
        port: u16,
        /// classify | flaky | rate-limited
        #[arg(short, long)]
        scenario: Option<String>,
    },
}

pub struct AnalyzeArgs {
    pub file: PathBuf,
    pub text_column: String,
    pub timestamp_column: Option<String>,
    pub dry_run: bool,
    pub save: bool,
    pub name: Option<String>,
    pub output: Option<PathBuf>,
}

pub fn load_config(file: Option<&Path>, batch_size: Option<usize>) -> Result<FeedlensConfig> {
    let mut overrides = Vec::new();
    if let Some(size) = batch_size {
        overrides.push(("batch_size", size.to_string()));
    }
    FeedlensConfig::load(file, &overrides).context("failed to load configuration")
}

async fn open_store(config: &FeedlensConfig) -> Result<JsonFileReportStore> {
    Ok(JsonFileReportStore::open(&config.store.path).await?)
}

async fn client_id(config: &FeedlensConfig) -> Result<String> {
    Ok(FileIdentityProvider::new(&config.identity.path)
        .user_id()
        .await?)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub async fn analyze_command(config: &FeedlensConfig, args: AnalyzeArgs) -> Result<()> {
    info!("Analyzing {} (feedback column '{}')", args.file.display(), args.text_column);

    let input = DataSource::csv(args.file.clone()).load().await?;
    let mut mapping = ColumnMapping::new(args.text_column.clone());
    if let Some(column) = args.timestamp_column.as_deref() {
        mapping = mapping.with_timestamp(column);
    }

    if !input.has_column(&mapping.feedback_text_column) {
        bail!(
            "Column '{}' not found. Available columns: {}",
            mapping.feedback_text_column,
            input.headers.join(", ")
        );
    }

    if args.dry_run {
        println!("DRY RUN MODE - No LLM calls will be made");
        println!("========================================");

        let plan = batcher::plan(input.rows.len(), config.batch_size)?;
        let batches: Vec<_> = plan
            .iter()
            .map(|b| {
                json!({
                    "batch": b.number,
                    "of": b.of,
                    "first_row": b.range.start,
                    "rows": b.len(),
                })
            })
            .collect();
        let summary = json!({
            "mode": "dry-run",
            "input_file": args.file.display().to_string(),
            "rows": input.rows.len(),
            "feedback_column": mapping.feedback_text_column,
            "timestamp_column": mapping.timestamp_column,
            "batch_size": config.batch_size,
            "batches": batches,
            "output_would_be_written_to": args
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stdout".to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let analyzer = llm_analyzer(config)?;
    let share = config.classification_progress_share;
    let sink = FnSink(move |event: ProgressEvent| match event {
        ProgressEvent::Phase { phase } => eprintln!("-- {:?}", phase),
        ProgressEvent::Progress {
            attempted, total, ..
        } => {
            let pct = feedlens_core::progress::Progress { attempted, total }.scaled_percentage(share);
            eprintln!("   {}/{} rows ({}%)", attempted, total, pct);
        }
        ProgressEvent::Notice { notice } => eprintln!("!! {}: {}", notice.title, notice.message),
    });

    let outcome = analyzer.analyze(&input, &mapping, &sink).await?;
    print_report(&outcome.report, config.top_topics);
    print_run_summary(&outcome.summary);

    let stored = StoredReport::from_report(&outcome.report);
    if let Some(output_path) = &args.output {
        tokio::fs::write(output_path, serde_json::to_string_pretty(&stored)?).await?;
        info!("Report written to {}", output_path.display());
    }

    if args.save {
        let store = open_store(config).await?;
        let source_file_name = file_name(&args.file);
        let analysis_name = args
            .name
            .unwrap_or_else(|| default_analysis_name(&source_file_name));
        let id = store
            .save(NewReport {
                user_id: client_id(config).await?,
                analysis_name: analysis_name.clone(),
                source_file_name,
                processed_data: stored,
            })
            .await?;
        println!("\nSaved '{}' as {}", analysis_name, id);
    }

    Ok(())
}

pub async fn history_command(config: &FeedlensConfig) -> Result<()> {
    let store = open_store(config).await?;
    let summaries = store.list_by_user(&client_id(config).await?).await?;

    if summaries.is_empty() {
        println!("No saved reports.");
        return Ok(());
    }
    for summary in summaries {
        println!(
            "{}  {}  {}",
            summary.storage_id,
            summary.created_at.format("%Y-%m-%d %H:%M"),
            summary.analysis_name
        );
    }
    Ok(())
}

pub async fn show_command(config: &FeedlensConfig, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let record = store
        .get_by_id(id)
        .await?
        .ok_or_else(|| anyhow!("Report {} not found", id))?;

    println!("{} ({})", record.analysis_name, record.source_file_name);
    println!("Saved {}", record.created_at.to_rfc3339());
    println!();
    print_report(&record.processed_data.to_report()?, config.top_topics);
    Ok(())
}

pub async fn compare_command(config: &FeedlensConfig, current: &str, previous: &str) -> Result<()> {
    let store = open_store(config).await?;
    let current = store
        .get_by_id(current)
        .await?
        .ok_or_else(|| anyhow!("Report {} not found", current))?;
    let previous = store
        .get_by_id(previous)
        .await?
        .ok_or_else(|| anyhow!("Report {} not found", previous))?;

    let comparison = compare(
        &current.processed_data.to_report()?,
        &previous.processed_data.to_report()?,
    );

    println!("{}  vs  {}", current.analysis_name, previous.analysis_name);
    println!("{:<16}{:>10}{:>10}{:>8}{:>8}", "metric", "current", "previous", "change", "");
    for delta in &comparison.metrics {
        let marker = if delta.change == 0 {
            ""
        } else if delta.improved() {
            "better"
        } else {
            "worse"
        };
        println!(
            "{:<16}{:>10}{:>10}{:>8}  {}",
            delta.metric, delta.current, delta.previous, delta.percent_change, marker
        );
    }
    Ok(())
}

fn print_report(report: &ProcessedReport, top_n: usize) {
    let breakdown = SentimentBreakdown::from_units(&report.feedback_items);
    println!("Feedback analyzed: {}", report.feedback_items.len());
    println!(
        "Labeled: {} (positive {}%, negative {}%, neutral {}%)",
        breakdown.counts.total(),
        breakdown.positive_pct,
        breakdown.negative_pct,
        breakdown.neutral_pct
    );

    if let Some(insights) = &report.key_insights {
        println!("Urgent issue: {}", insights.urgent_issue);
        println!("{}", insights.overall_sentiment);
    }

    let topics = top_topics(&report.topic_distribution, top_n);
    if !topics.is_empty() {
        println!("\nTop topics:");
        for topic in topics {
            println!(
                "  {:<18} {:>4}  (+{} / -{} / ={})",
                topic.topic, topic.total, topic.positive, topic.negative, topic.neutral
            );
        }
    }

    if !report.sentiment_over_time.is_empty() {
        println!("\nSentiment over time:");
        for point in &report.sentiment_over_time {
            println!(
                "  {:<12} +{} -{} ={}",
                point.bucket_key, point.positive, point.negative, point.neutral
            );
        }
    }
}

fn print_run_summary(summary: &RunSummary) {
    if summary.is_complete() {
        return;
    }
    println!(
        "\n{} of {} rows could not be labeled.",
        summary.unprocessed_units, summary.total_units
    );
    for notice in &summary.notices {
        println!("  {}: {}", notice.title, notice.message);
    }
}
