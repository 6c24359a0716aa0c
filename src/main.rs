use clap::Parser;
use kubectl_logagg::cli::Cli;
use kubectl_logagg::controls::control_loop;
use kubectl_logagg::{Aggregator, FileConfig, KubeCluster};
use tokio::io::BufReader;
use tokio_util::compat::TokioAsyncWriteCompatExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Forwarded lines go to stdout, diagnostics to stderr
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let file_config = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let (config, ready_timeout) =
        file_config.resolve(cli.retries, cli.retry_delay_ms, cli.ready_timeout_secs);

    let cluster = KubeCluster::connect(cli.context.as_deref(), ready_timeout).await?;

    let mut aggregator = Aggregator::with_config(tokio::io::stdout().compat_write(), config);

    let cancel = CancellationToken::new();
    tokio::spawn(control_loop(
        BufReader::new(tokio::io::stdin()),
        aggregator.muter(),
        cancel.clone(),
    ));

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            on_signal.cancel();
        }
    });

    info!(
        "Streaming logs for {} (up to {} attempts, {:?} apart)",
        cli.image, config.retry_limit, config.retry_delay
    );
    aggregator
        .stream_logs_until(&cluster, &cluster, &cli.image, &cancel)
        .await;
    cancel.cancel();

    // Reading stdin parks a blocking thread that runtime shutdown would wait on
    std::process::exit(0);
}
