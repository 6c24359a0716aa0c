use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kubectl-logagg")]
#[command(about = "Follow the logs of the first container running an image, anywhere in the cluster")]
pub struct Cli {
    /// Container image reference to look for (exact match)
    pub image: String,

    /// Context
    #[arg(long)]
    pub context: Option<String>,

    /// YAML settings file (retries, retry_delay_ms, ready_timeout_secs)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of locate-and-stream attempts
    #[arg(long)]
    pub retries: Option<u32>,

    /// Pause between attempts, in milliseconds
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// How long to wait for the selected pod to become ready, in seconds
    #[arg(long)]
    pub ready_timeout_secs: Option<u64>,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    pub verbose: bool,
}
