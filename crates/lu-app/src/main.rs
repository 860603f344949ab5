//! `lineup`: rank the rows of a CSV file from the command line

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lu_core::{ColumnRegistry, ProviderDump, RankingId};
use lu_data::{CsvSource, DataProvider, LocalDataProvider, ProviderConfig};

mod args;
mod ranking_config;
mod report;

use args::CliArgs;
use ranking_config::RankingConfig;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse_from(std::env::args().skip(1))?;
    let runtime = tokio::runtime::Runtime::new().context("starting the async runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: CliArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => ProviderConfig::from_file(path)
            .with_context(|| format!("loading provider configuration {}", path.display()))?,
        None => ProviderConfig::default(),
    };

    let source = CsvSource::load(args.data.clone(), &config)
        .await
        .with_context(|| format!("loading {}", args.data.display()))?;
    let provider = source.into_provider(config, ColumnRegistry::new());

    let ranking = match (&args.restore, &args.ranking) {
        (Some(dump), _) => restore(&provider, dump)?,
        (None, Some(path)) => RankingConfig::from_file(path)?.apply(&provider)?,
        (None, None) => RankingConfig::default().apply(&provider)?,
    };

    let order = provider.sort(&ranking).await?;
    info!(ranking = %ranking, rows = order.len(), total = provider.len(), "ranked");

    let top = &order[..order.len().min(args.top)];
    let rows: Vec<_> = provider
        .view(top)
        .await?
        .into_iter()
        .map(|row| (row.index, row.value))
        .collect();
    let table = provider
        .core()
        .with_ranking(&ranking, |r| report::render(r, &rows))
        .context("ranking vanished")?;
    print!("{table}");

    if let Some(path) = &args.dump {
        let json = serde_json::to_string_pretty(&provider.dump())?;
        std::fs::write(path, json).with_context(|| format!("writing dump {}", path.display()))?;
        info!(path = %path.display(), "dump written");
    }
    Ok(())
}

/// Restore a dump and pick its first ranking
fn restore(provider: &LocalDataProvider, path: &Path) -> Result<RankingId> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading dump {}", path.display()))?;
    let dump: ProviderDump = serde_json::from_str(&text)
        .with_context(|| format!("parsing dump {}", path.display()))?;
    provider.restore(&dump);
    provider
        .rankings()
        .into_iter()
        .next()
        .context("the dump holds no ranking")
}
