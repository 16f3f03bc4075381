use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use flowlogd::collector::Collector;
use flowlogd::config::Config;
use flowlogd::monitor::DirectMonitor;

#[derive(Debug, Parser)]
#[command(name = "flowlogd", version, about = "NetFlow v1/v5/v7 collector daemon")]
struct Opts {
    /// Stay verbose: debug logging plus one line per stored flow
    #[arg(short = 'd')]
    debug: bool,

    /// Configuration file
    #[arg(short = 'f', value_name = "path", default_value = "/etc/flowlogd.conf")]
    config: PathBuf,

    /// Define a configuration macro (repeatable)
    #[arg(short = 'D', value_name = "name=value")]
    define: Vec<String>,
}

fn parse_defines(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|definition| match definition.split_once('=') {
            Some((name, value)) if !name.is_empty() => {
                Ok((name.to_string(), value.to_string()))
            }
            _ => bail!("bad macro definition {definition:?}, expected name=value"),
        })
        .collect()
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    let default_level = if opts.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let defines = parse_defines(&opts.define)?;
    let config = Config::from_file(&opts.config, &defines)?;
    let monitor = DirectMonitor::new(opts.config.clone(), defines, config.logfile.clone());
    let collector = Collector::new(config, monitor, opts.debug)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?;
    runtime.block_on(collector.run())
}
