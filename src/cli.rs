use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mirror one documentation site as markdown.
    Download(DownloadArgs),
    /// Mirror several sites, one after another.
    Bulk(BulkArgs),
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Start URL (must be http/https).
    #[arg(long)]
    pub url: String,

    #[command(flatten)]
    pub crawl: CrawlArgs,
}

#[derive(Debug, Args)]
pub struct BulkArgs {
    /// Start URL; repeat for each site.
    #[arg(long = "url", required = true)]
    pub urls: Vec<String>,

    #[command(flatten)]
    pub crawl: CrawlArgs,
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Output root; each site lands in its own subdirectory.
    #[arg(long, default_value = "downloads")]
    pub out: String,

    /// Maximum link depth to traverse (a site config may override it).
    #[arg(long, default_value_t = 2)]
    pub max_depth: u32,

    /// Site config file (JSON, or YAML by extension) keyed by hostname.
    #[arg(long)]
    pub config: Option<String>,

    /// Overwrite pages that were already downloaded.
    #[arg(long)]
    pub force: bool,

    /// Prefix each page with a `source_url`/`downloaded_at` block.
    #[arg(long)]
    pub metadata: bool,

    /// Delay before each page request (politeness).
    #[arg(long, default_value_t = 500)]
    pub delay_ms: u64,

    /// Base delay between page fetch retries; grows linearly per attempt.
    #[arg(long, default_value_t = 1000)]
    pub retry_delay_ms: u64,
}
