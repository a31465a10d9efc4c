use clap::{Arg, ArgAction, Command};
use log::LevelFilter;

pub fn build_cli() -> Command {
    Command::new("copilot-usage-exporter")
        .about("Export GitHub Copilot premium request usage as Prometheus metrics")
        .disable_version_flag(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override the configured log filter (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
}

/// Precedence: `--log-level`, then `CPUE_LOG_DEBUG`, then `RUST_LOG`, then `CPUE_LOG_LEVEL`.
pub fn init_logging(cli_level: Option<&str>, debug: bool, configured: &str) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(configured));
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    if let Some(lvl) = cli_level {
        builder.parse_filters(lvl);
    }
    builder.init();
}
