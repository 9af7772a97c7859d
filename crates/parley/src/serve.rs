// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Opens the authorization registry, builds the OpenAI provider and the
//! Telegram channel, assembles the dispatcher and runs the agent loop until
//! SIGINT/SIGTERM.

use std::str::FromStr;
use std::sync::Arc;

use parley_agent::shutdown;
use parley_agent::{AgentLoop, ContentResolver, Dispatcher, DispatcherSettings, GroupTrigger};
use parley_config::ParleyConfig;
use parley_context::{ContextSettings, ContextStore, SystemClock, load_base_policy};
use parley_core::{
    AuthRegistry, ChannelAdapter, HealthStatus, ImageDetail, ParleyError, PluginAdapter,
};
use parley_openai::OpenAiProvider;
use parley_storage::SqliteAuthRegistry;
use parley_telegram::TelegramChannel;
use tracing::{error, info, warn};

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.agent.log_level);

    info!("starting parley serve");

    let registry = Arc::new(SqliteAuthRegistry::new(&config.storage));
    registry.initialize().await?;
    let authorized = registry.list_authorized().await?.len();
    info!(
        path = registry.path(),
        authorized, "authorization registry ready"
    );

    let provider = Arc::new(OpenAiProvider::new(&config.provider).map_err(|e| {
        error!(error = %e, "failed to initialize OpenAI provider");
        eprintln!("error: API key required. Set provider.api_key or the OPENAI_API_KEY env var");
        e
    })?);
    info!(model = config.provider.model.as_str(), "provider ready");

    let mut telegram = TelegramChannel::new(config.telegram.clone()).map_err(|e| {
        error!(error = %e, "failed to initialize Telegram channel");
        eprintln!("error: Telegram bot token required. Set telegram.bot_token or PARLEY_TELEGRAM_BOT_TOKEN");
        e
    })?;
    telegram.connect().await?;
    let telegram = Arc::new(telegram);
    let channel: Arc<dyn ChannelAdapter> = telegram.clone();

    let base_policy = load_base_policy(&config.agent).await;
    let contexts = Arc::new(ContextStore::new(
        ContextSettings::from_config(&config.context, base_policy, config.agent.name.clone()),
        Arc::new(SystemClock),
    ));

    let detail = ImageDetail::from_str(&config.provider.image_detail).unwrap_or_else(|_| {
        warn!(
            value = config.provider.image_detail.as_str(),
            "unknown image detail, using auto"
        );
        ImageDetail::default()
    });
    let resolver = ContentResolver::new(
        Arc::clone(&channel),
        GroupTrigger::new(&config.telegram.group_trigger)?,
        detail,
    );

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&channel),
        provider.clone(),
        registry.clone(),
        contexts,
        resolver,
        DispatcherSettings::from_config(&config)
            .with_bot_username(telegram.username().map(str::to_owned)),
    ));

    let adapters: [&dyn PluginAdapter; 3] =
        [telegram.as_ref(), provider.as_ref(), registry.as_ref()];
    report_health(&adapters).await;

    let cancel = shutdown::install_signal_handler();
    let mut agent_loop = AgentLoop::new(Arc::clone(&channel), dispatcher, &config.context);
    let result = agent_loop.run(cancel).await;

    for adapter in adapters {
        if let Err(e) = adapter.shutdown().await {
            warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed");
        }
    }

    result?;
    info!("parley serve shutdown complete");
    Ok(())
}

/// Logs the health of every adapter. Unhealthy adapters do not stop startup.
async fn report_health(adapters: &[&dyn PluginAdapter]) {
    for adapter in adapters {
        match adapter.health_check().await {
            Ok(HealthStatus::Healthy) => info!(adapter = adapter.name(), "healthy"),
            Ok(HealthStatus::Degraded(reason)) => {
                warn!(adapter = adapter.name(), reason = reason.as_str(), "degraded")
            }
            Ok(HealthStatus::Unhealthy(reason)) => {
                error!(adapter = adapter.name(), reason = reason.as_str(), "unhealthy")
            }
            Err(e) => error!(adapter = adapter.name(), error = %e, "health check failed"),
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
