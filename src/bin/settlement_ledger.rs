//! Settlement ledger server.
//!
//! Usage:
//!   settlement-ledger [--config settlement-ledger.toml] [--json-logs]
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use anyhow::Context;
use clap::Parser;
use settlement_ledger::api::rest::{AppState, create_router};
use settlement_ledger::application::services::{
    ApprovalQueue, HoldSweeper, PayoutWorkflow, Reconciler, SettlementConfig, SettlementService,
};
use settlement_ledger::domain::entities::party::Party;
use settlement_ledger::domain::services::commission_resolver::CommissionResolver;
use settlement_ledger::infrastructure::config::AppConfig;
use settlement_ledger::infrastructure::notifications::{
    Notifier, TracingDispatcher, WebhookDispatcher,
};
use settlement_ledger::infrastructure::persistence::in_memory::{
    InMemoryLedgerStore, InMemoryPartyRepository, InMemoryPayoutRepository,
};
use settlement_ledger::infrastructure::persistence::{
    LedgerStore, PartyRepository, PayoutRepository,
};
use settlement_ledger::infrastructure::processor::{
    HttpPaymentProcessor, PaymentProcessor, SimulatedPaymentProcessor,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "settlement-ledger")]
#[command(about = "Commission and settlement ledger service")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn notifier(config: &AppConfig) -> anyhow::Result<Notifier> {
    let mut notifier = Notifier::new();
    if config.notifications.log_events {
        notifier = notifier.with_dispatcher(Arc::new(TracingDispatcher));
    }
    if let Some(url) = &config.notifications.webhook_url {
        let webhook = WebhookDispatcher::new(url.as_str(), config.notifications.webhook_timeout_ms)
            .context("creating webhook dispatcher")?;
        notifier = notifier.with_dispatcher(Arc::new(webhook));
    }
    Ok(notifier)
}

fn processor(config: &AppConfig) -> anyhow::Result<Arc<dyn PaymentProcessor>> {
    match &config.payouts.processor_url {
        Some(url) => {
            info!(%url, "Using HTTP payment processor");
            let http = HttpPaymentProcessor::new(url.as_str(), config.payouts.processor_timeout_ms)
                .context("creating payment processor client")?;
            Ok(Arc::new(http))
        }
        None => {
            info!("No processor URL configured, payouts are simulated");
            Ok(Arc::new(SimulatedPaymentProcessor::succeeding()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    config.validate().context("validating configuration")?;
    let currency = config.currency()?;
    let addr = config.socket_addr()?;

    let parties = Arc::new(InMemoryPartyRepository::new());
    parties
        .insert(&Party::platform(
            config.platform_party(),
            config.ledger.platform_name.as_str(),
        ))
        .await
        .context("registering platform party")?;
    let parties: Arc<dyn PartyRepository> = parties;
    let ledger: Arc<dyn LedgerStore> =
        Arc::new(InMemoryLedgerStore::new(currency.clone(), Arc::clone(&parties)));
    let payouts: Arc<dyn PayoutRepository> = Arc::new(InMemoryPayoutRepository::new());

    let resolver = Arc::new(CommissionResolver::new(
        config.rate_table()?,
        config.resolver_config(),
    ));
    let notifier = notifier(&config)?;

    let settlement = SettlementService::new(
        resolver,
        Arc::clone(&ledger),
        Arc::clone(&parties),
        notifier.clone(),
        SettlementConfig {
            hold_period: config.hold_period(),
            volume_window_days: config.ledger.volume_window_days,
        },
    );
    let workflow = PayoutWorkflow::new(
        Arc::clone(&ledger),
        Arc::clone(&payouts),
        Arc::clone(&parties),
        processor(&config)?,
        notifier.clone(),
    )
    .with_processor_timeout(config.processor_timeout());
    let approvals = ApprovalQueue::new(Arc::clone(&parties), notifier.clone());
    let reconciler = Reconciler::new(Arc::clone(&ledger), Arc::clone(&payouts), notifier);

    let sweeper = HoldSweeper::new(Arc::clone(&ledger), config.sweep_interval()).start();

    let state = Arc::new(AppState {
        settlement: Arc::new(settlement),
        payouts: Arc::new(workflow),
        approvals: Arc::new(approvals),
        reconciler: Arc::new(reconciler),
        ledger,
    });
    let router = create_router(state, config.server.cors_permissive);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, %currency, "Settlement ledger listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
            }
        })
        .await
        .context("serving HTTP")?;

    sweeper.stop().await;
    info!("Settlement ledger stopped");
    Ok(())
}
