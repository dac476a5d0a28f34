//! Token Unloader
//!
//! Sells an ERC-20 holding for the native currency through a Uniswap V2 style
//! router, one gas-estimated candidate at a time.
//! Features:
//! - Geometric decay sizing with a configurable floor
//! - One-time unlimited router approval
//! - EIP-1559 or legacy pricing with priority fee escalation
//! - Dry-run mode and a JSON lines cycle journal

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use unloader_chain::{create_gas_strategy, AlloyGateway, ChainGateway};
use unloader_core::{
    load_settings, u256_math, Explorer, Journal, RunState, Runner, SellContext, Settings,
    SwapTemplate, TokenInfo,
};

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();
    init_tracing();

    let settings = load_settings().context("Failed to load configuration")?;
    settings.config.log_config();

    let (ctx, mut runner) = initialize(&settings).await?;
    log_wallet_summary(&ctx).await;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping after the current step");
        shutdown.cancel();
    });

    let summary = runner.run(cancel).await;

    info!(
        cycles = summary.cycles,
        sold = %ctx.token.display(summary.sold),
        end = summary.last_end.as_ref().map(|e| e.label()).unwrap_or("none"),
        "Unloader exiting"
    );
    if summary.state == RunState::Finished {
        info!("Nothing left to sell");
    }

    Ok(())
}

/// `RUST_LOG` filter, JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,unloader_core=debug,unloader_chain=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

async fn initialize(settings: &Settings) -> Result<(Arc<SellContext>, Runner)> {
    info!("Initializing components...");
    let config = &settings.config;

    // Chain gateway
    let gateway = Arc::new(
        AlloyGateway::connect(
            &settings.chain.rpc_url,
            settings.wallet.clone(),
            settings.account,
            config.timing.request_timeout(),
        )
        .await
        .context("Failed to connect to RPC")?,
    );

    if let Some(expected) = settings.chain.chain_id {
        if expected != gateway.chain_id() {
            bail!(
                "RPC reports chain id {} but configuration expects {}",
                gateway.chain_id(),
                expected
            );
        }
    }

    // Token metadata for readable amounts
    let metadata = gateway
        .token_metadata(settings.chain.token)
        .await
        .context("Failed to read token metadata")?;
    let token = TokenInfo::new(settings.chain.token, metadata);
    info!(
        token = %token.address,
        symbol = %token.symbol,
        decimals = token.decimals,
        "Token loaded"
    );

    // Gas strategy
    let gas = create_gas_strategy(
        config.gas.pricing.as_str(),
        config.gas.priority_escalation,
        config.gas.min_priority_fee_gwei,
        config.gas.base_fee_multiplier,
        config.gas.max_fee_gwei,
    );
    info!(strategy = gas.strategy_name(), "Gas strategy configured");

    let ctx = Arc::new(SellContext::new(
        gateway,
        token,
        settings.chain.router,
        settings.chain.wrapped_native,
        gas,
        SwapTemplate {
            entry_point: config.sizing.entry_point,
            deadline: config.sizing.deadline(),
        },
        Explorer::new(settings.chain.explorer_url.clone()),
    ));

    let journal = Arc::new(Journal::new(config.journal_path.clone()));
    if let Some(path) = journal.path() {
        info!(path = %path.display(), "Journal file enabled");
    }

    let runner = Runner::from_config(ctx.clone(), config, settings.min_amount_out, journal)?;

    info!(
        router = %ctx.router,
        floor = %ctx.token.display(runner.sizer().floor()),
        "All components initialized"
    );

    Ok((ctx, runner))
}

/// Balances at startup. Failures only warn; the first cycle retries them.
async fn log_wallet_summary(ctx: &SellContext) {
    let (token_balance, native_balance) = tokio::join!(
        ctx.gateway.token_balance(ctx.token.address, ctx.account),
        ctx.gateway.native_balance(ctx.account)
    );

    match (token_balance, native_balance) {
        (Ok(token_balance), Ok(native_balance)) => info!(
            account = %ctx.account,
            token_balance = %ctx.token.display(token_balance),
            native_balance = %u256_math::format_units(native_balance, 18),
            link = %ctx.explorer.address_url(ctx.account),
            "Wallet"
        ),
        (Err(e), _) | (_, Err(e)) => warn!(
            account = %ctx.account,
            error = %e,
            "Failed to read wallet balances"
        ),
    }
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn print_banner() {
    println!(r#"
    ╦ ╦┌┐┌┬  ┌─┐┌─┐┌┬┐┌─┐┬─┐
    ║ ║│││││  │ │├─┤ ││├┤ ├┬┘
    ╚═╝┘└┘┴─┘└─┘┴ ┴─┴┘└─┘┴└─
    Token Unloader v0.1.0
    "#);
}
