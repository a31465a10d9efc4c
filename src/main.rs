use anyhow::Context;
use copilot_usage_exporter::{
    cli, collector::Collector, config::Config, http::GithubClient, metrics::Publisher,
    server::{self, AppState},
    worker::Worker,
};
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli::build_cli().get_matches();
    if matches.get_flag("version") {
        println!("copilot-usage-exporter {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::from_env().context("loading configuration")?;
    cli::init_logging(
        matches.get_one::<String>("log-level").map(String::as_str),
        config.log_debug,
        &config.log_level,
    );
    info!("starting copilot-usage-exporter {}", env!("CARGO_PKG_VERSION"));

    let client = Arc::new(GithubClient::new(&config.github).context("building github client")?);
    let publisher = Arc::new(Publisher::new());

    let worker = Worker::new(
        Collector::new(client.clone()),
        publisher.clone(),
        config.github.enterprise.clone(),
        config.worker_interval,
    );
    tokio::spawn(worker.run());

    server::serve(config.listen_addr, AppState { publisher, client })
        .await
        .with_context(|| format!("serving on {}", config.listen_addr))
}
