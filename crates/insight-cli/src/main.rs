//! `insight-dashboard`: pick a company, then print LLM-generated insights on
//! its quarterly financials.

mod args;
mod output;

use anyhow::{Context, bail};
use clap::Parser;
use dialoguer::{Confirm, FuzzySelect, theme::ColorfulTheme};
use insight::{Dashboard, InsightConfig, InsightError, LanguageModel, SelectionFlow, Symbol};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::Cli;

/// Crates whose logs are shown by default.
const LOG_TARGETS: [&str; 6] = [
    "insight",
    "insight_core",
    "insight_cache",
    "insight_sectors",
    "insight_replicate",
    "insight_dashboard",
];

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();
    init_tracing(cli.verbose);

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable .env"),
    }

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Logs go to stderr so stdout carries only the panels.
fn init_tracing(verbose: bool) {
    let directives = |level: &str| {
        LOG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    };
    let filter = if verbose {
        EnvFilter::new(directives("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives("info")))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = InsightConfig::from_env()?;
    cli.apply(&mut config)?;
    let dashboard = Dashboard::from_config(&config)?;
    info!(
        model = dashboard.model().model_name(),
        quarters = config.financials.n_quarters,
        report_date = %config.financials.report_date,
        cache = %config.cache,
        "Dashboard ready"
    );
    match dashboard.expire_stale().await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "Dropped stale cache entries"),
        Err(e) => warn!(error = %e, "Failed to expire stale cache entries"),
    }

    let symbol = select_symbol(cli, &dashboard).await?;

    if !(cli.yes || cli.is_non_interactive() || confirm(&symbol)?) {
        info!("Cancelled");
        return Ok(());
    }

    let mut stdout = std::io::stdout();
    let mut write_error = None;
    let report = dashboard
        .view_insights_with(&symbol, |panel| {
            if let Err(e) = output::write_panel(&mut stdout, panel) {
                write_error.get_or_insert(e);
            }
        })
        .await
        .with_context(|| format!("Failed to build insights for {symbol}"))?;
    if let Some(e) = write_error {
        return Err(e).context("Failed to write insights");
    }

    if let Some(path) = &cli.svg {
        if let Some(figure) = report.figure() {
            output::save_svg(figure, path)?;
            info!(path = %path.display(), "Wrote revenue chart");
        }
    }

    Ok(())
}

/// Resolves the symbol from flags, prompting for whatever is missing.
async fn select_symbol(cli: &Cli, dashboard: &Dashboard) -> anyhow::Result<Symbol> {
    if let (None, Some(symbol)) = (&cli.subsector, &cli.symbol) {
        return Ok(Symbol::from_label(symbol));
    }

    let mut flow = SelectionFlow::load(dashboard)
        .await
        .context("Failed to load subsectors")?;

    let subsector = match &cli.subsector {
        Some(name) => name.clone(),
        None => choose("🔽 Select Subsector", &flow.subsector_options())?,
    };
    flow.select_subsector(dashboard, &subsector)
        .await
        .with_context(|| format!("Failed to load companies for {subsector}"))?;

    let label = match &cli.symbol {
        Some(symbol) => symbol.clone(),
        None => choose("🏢 Select Company", &flow.company_options())?,
    };
    Ok(flow.select_company(&label)?.clone())
}

fn choose<T: ToString>(prompt: &str, items: &[T]) -> anyhow::Result<String> {
    if items.is_empty() {
        bail!("Nothing to choose from for {prompt:?}");
    }
    let index = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact()
        .context("Failed to read selection")?;
    Ok(items[index].to_string())
}

fn confirm(symbol: &Symbol) -> anyhow::Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("🔍 View insights for {symbol}?"))
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

/// 2 for configuration errors, 3 for rejected credentials, 1 otherwise.
fn exit_status(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<InsightError>() {
        Some(
            InsightError::Config(_)
            | InsightError::MissingCredential(_)
            | InsightError::InvalidParameter(_),
        ) => 2,
        Some(InsightError::AuthenticationFailed(_)) => 3,
        _ => 1,
    }
}
