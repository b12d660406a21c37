use clap::{Args, Parser, Subcommand};

use ytsum::SummaryTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "ytsum", about = "YouTube video summarizer", version)]
pub struct Cli {
    /// Show processing detail on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Summarize a video (returns the stored record when one exists)
    Process(ProcessArgs),
    /// Show a stored record
    Get(GetArgs),
    /// Delete a stored record
    Delete(DeleteArgs),
    /// Search stored records by text and tags
    Search(SearchArgs),
    /// List all stored records, newest first
    List,
}

#[derive(Args)]
pub struct ProcessArgs {
    /// YouTube video URL or bare video ID
    pub url: String,

    /// Language the summary is written in (default from config)
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Summary verbosity
    #[arg(short, long, value_enum, default_value_t = SummaryTier::Short)]
    pub tier: SummaryTier,

    /// Comma-separated tags stored with the record
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Delete any existing record first and reprocess
    #[arg(long)]
    pub redo: bool,

    /// Wait for the full result instead of streaming the summary
    #[arg(long)]
    pub no_stream: bool,

    /// Skip caption extraction, always transcribe audio
    #[arg(long)]
    pub whisper_only: bool,

    /// Don't fall back to audio transcription if captions unavailable
    #[arg(long)]
    pub no_fallback: bool,

    /// Output format for the final record (with --no-stream)
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct GetArgs {
    /// Video ID of the stored record
    pub video_id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Video ID of the stored record
    pub video_id: String,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Case-insensitive text matched against title, channel and summary
    pub query: Option<String>,

    /// Comma-separated tags (matches records carrying any of them)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
}
