use std::io::Write;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, bail};
use log::{debug, info};

mod cli;

use cli::{Cli, Command, OutputFormat, ProcessArgs};
use ytsum::error::PipelineError;
use ytsum::pipeline::{Pipeline, ProcessEvent, ProcessRequest};
use ytsum::repo::{self, JsonRepo, VideoRepo};
use ytsum::{VideoMetadata, VideoRecord, output};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytsum.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytsum")
        .join("logs")
}

fn tool_version(name: &str) -> Option<String> {
    ProcessCommand::new(name)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn build_after_help() -> String {
    let yt_dlp = tool_version("yt-dlp");

    let yt_dlp_line = match &yt_dlp {
        Some(v) => format!("  \x1b[32m✅\x1b[0m yt-dlp     {v}"),
        None => "  \x1b[31m❌\x1b[0m yt-dlp     (not found — needed for the audio fallback)".to_string(),
    };

    let log_path = log_dir().join("ytsum.log");

    format!(
        "\nREQUIRED TOOLS:\n{yt_dlp_line}\n\nLogs are written to: {}",
        log_path.display()
    )
}

/// Retry an async operation with exponential backoff
async fn retry<F, Fut, T, E>(max_attempts: u32, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_err = None;
    for attempt in 0..max_attempts {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if attempt + 1 < max_attempts {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    debug!("Attempt {} failed: {e}, retrying in {delay:?}", attempt + 1);
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap())
}

fn print_metadata_header(metadata: &VideoMetadata) {
    eprintln!("Title:       {}", metadata.title);
    eprintln!("Channel:     {}", metadata.channel);
    eprintln!("Published:   {}", metadata.publish_date);
    eprintln!("Views:       {}", metadata.views);
    eprintln!("Duration:    {}", metadata.duration);
    eprintln!("Subscribers: {}", metadata.subscribers);
    eprintln!("Videos:      {}", metadata.channel_videos);
    eprintln!();
}

fn print_record(record: &VideoRecord, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Text => output::render_text(record),
        OutputFormat::Json => output::render_json(record)?,
    };
    println!("{rendered}");
    Ok(())
}

async fn run_process(pipeline: &Pipeline, args: &ProcessArgs, language: String, verbose: bool) -> Result<()> {
    if args.redo {
        if let Some(video_id) = ytsum::extract_video_id(&args.url) {
            if pipeline.repo().delete(&video_id)? {
                eprintln!("Existing record for {video_id} deleted, reprocessing...");
            }
        }
    }

    let mut req = ProcessRequest::new(args.url.clone(), language, args.tier, args.tags.clone());
    req.whisper_only = args.whisper_only;
    req.no_fallback = args.no_fallback;

    if args.no_stream {
        // Each attempt is a fresh run from the cache check; a completed
        // record is returned as-is on retry.
        let outcome = retry(3, || pipeline.process(&req))
            .await
            .map_err(|e| eyre::eyre!("[{}] {e}", e.stage()))?;
        if verbose && outcome.cached {
            eprintln!("Returning cached record for {}", outcome.record.video_id);
        }
        return print_record(&outcome.record, args.format);
    }

    let mut rx = pipeline.process_streaming(req);
    let mut failure: Option<String> = None;
    let mut streamed_any = false;

    while let Some(event) = rx.recv().await {
        match event {
            ProcessEvent::Status { stage, message } => {
                if verbose {
                    eprintln!("[{stage}] {message}");
                }
            }
            ProcessEvent::Metadata { metadata, .. } => {
                print_metadata_header(&metadata);
            }
            ProcessEvent::Chunk { text } => {
                print!("{text}");
                let _ = std::io::stdout().flush();
                streamed_any = true;
            }
            ProcessEvent::Summary(summary) => {
                if !streamed_any {
                    // cached record or non-streaming LLM config
                    println!("{}", summary.markdown);
                } else {
                    println!();
                }
                if !summary.topics.is_empty() {
                    println!("\nTopics:");
                    for (topic, timestamp) in &summary.topics {
                        println!("- {topic} [{timestamp}]");
                    }
                }
            }
            ProcessEvent::Error { stage, message } => {
                failure = Some(format!("[{stage}] {message}"));
            }
        }
    }

    if let Some(message) = failure {
        bail!(message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = ytsum::config::Config::load().unwrap_or_default();

    if cli.verbose {
        let config_path = ytsum::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
    }

    let repo = Arc::new(JsonRepo::new(JsonRepo::default_root()));

    match &cli.command {
        Command::Process(args) => {
            // CLI flag takes priority over the config default
            let language = args.lang.clone().unwrap_or_else(|| config.summary_language.clone());
            let pipeline = Pipeline::new(config, repo);
            run_process(&pipeline, args, language, cli.verbose).await?;
        }
        Command::Get(args) => {
            match repo.lookup(&args.video_id).map_err(pipeline_err)? {
                Some(record) => print_record(&record, args.format)?,
                None => bail!("no record for video {}", args.video_id),
            }
        }
        Command::Delete(args) => {
            if repo.delete(&args.video_id).map_err(pipeline_err)? {
                println!("Deleted record for {}", args.video_id);
            } else {
                println!("No record for {}", args.video_id);
            }
        }
        Command::Search(args) => {
            let records = repo.list().map_err(pipeline_err)?;
            let hits = repo::search(records, args.query.as_deref(), &args.tags);
            if hits.is_empty() {
                eprintln!("No matching records");
            }
            for record in &hits {
                print_record_line(record);
            }
        }
        Command::List => {
            let records = repo.list().map_err(pipeline_err)?;
            if records.is_empty() {
                eprintln!("No records yet");
            }
            for record in &records {
                print_record_line(record);
            }
        }
    }

    Ok(())
}

fn print_record_line(record: &VideoRecord) {
    let tags = if record.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", record.tags.join(","))
    };
    println!(
        "{}  {}  —  {} ({}){tags}",
        record.video_id, record.metadata.title, record.metadata.channel, record.tier
    );
}

fn pipeline_err(e: PipelineError) -> eyre::Report {
    eyre::eyre!("[{}] {e}", e.stage())
}
