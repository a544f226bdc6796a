// # allowsyncd - Access Allowlist Sync Daemon
//
// Thin integration layer: all reconciliation logic lives in allowsync-core.
//
// The daemon is responsible for:
// 1. Reading configuration from `.env` and environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the address resolver, Cloudflare store and notifier together
// 4. Serving the liveness endpoint
// 5. Running the scheduler until SIGINT/SIGTERM
//
// ## Configuration
//
// ### Required
// - `ACCOUNTID`: Cloudflare account ID
// - `RULEID`: Access group ID
// - `CRON`: Reconciliation schedule (cron, `@hourly`, `@every 5m`, ...)
// - `AUTH_TOKEN`: Cloudflare API token
//
// ### Optional
// - `NOTIFICATION_URL`: Notification target (`discord://`, `telegram://`, `generic://`, `https://`)
// - `NOTIFICATION_IDENTIFIER`: Prefix for every notification message
// - `TEST_NOTIFICATION`: `true` sends a notification at startup
// - `HEALTH_PORT`: Liveness endpoint port (default 8080)
// - `LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export ACCOUNTID=0123456789abcdef
// export RULEID=fedcba98-7654-3210
// export AUTH_TOKEN=your_token
// export CRON="*/5 * * * *"
//
// allowsyncd
// ```

use allowsync_core::{
    NotificationEvent, Notifier, Reconciler, Scheduler, SyncConfig, TransportRegistry,
};
use allowsync_ip_http::HttpAddressResolver;
use allowsync_provider_cloudflare::CloudflarePolicyStore;
use allowsyncd::health::{self, HealthState};
use allowsyncd::logging;
use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum AllowsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<AllowsyncExitCode> for ExitCode {
    fn from(code: AllowsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let health_state = HealthState::now();

    // Must happen before any variable is read
    let dotenv = dotenvy::dotenv();

    let config = match SyncConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return AllowsyncExitCode::ConfigError.into();
        }
    };

    let log_level = match logging::parse_level(env::var(logging::ENV_LOG_LEVEL).ok().as_deref()) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return AllowsyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = logging::init(log_level) {
        eprintln!("{}", e);
        return AllowsyncExitCode::ConfigError.into();
    }

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => info!("No .env file found, using process environment"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    }

    info!("Starting allowsyncd daemon");
    info!("Configuration loaded: {:?}", config);

    let scheduler = match Scheduler::new(config.schedule.clone()) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("Invalid schedule '{}': {}", config.schedule, e);
            return AllowsyncExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AllowsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, scheduler, health_state).await {
            error!("Daemon error: {}", e);
            AllowsyncExitCode::RuntimeError
        } else {
            AllowsyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(
    config: SyncConfig,
    scheduler: Scheduler,
    health_state: HealthState,
) -> Result<()> {
    let registry = Arc::new(TransportRegistry::new());
    allowsync_notify::register(&registry)?;
    info!("Notification transports: {:?}", registry.list_schemes());

    if let Some(target) = &config.notification
        && let Err(e) = registry.transport_for(&target.url)
    {
        warn!("Notifications will fail: {}", e);
    }

    let source = Arc::new(HttpAddressResolver::with_defaults()?);
    let store = Arc::new(CloudflarePolicyStore::from_config(&config)?);
    let notifier = Notifier::from_config(&config, registry);
    let reconciler = Reconciler::new(source, store, notifier);

    health::spawn(config.health_port, health_state);

    if config.test_notification {
        if reconciler.notifier().is_enabled() {
            info!("Sending test notification");
            reconciler
                .notifier()
                .notify_best_effort(&NotificationEvent::startup_test())
                .await;
        } else {
            warn!("TEST_NOTIFICATION is set but NOTIFICATION_URL is not");
        }
    }

    let shutdown = shutdown_signal()?;
    let ticks = scheduler
        .run_until(&reconciler, async {
            let signal = shutdown.await;
            info!("Received shutdown signal: {}", signal);
        })
        .await;

    info!("Shutting down daemon after {} tick(s)", ticks);
    reconciler
        .notifier()
        .notify_best_effort(&NotificationEvent::shutdown())
        .await;

    Ok(())
}

/// Install SIGTERM and SIGINT handlers
///
/// # Returns
///
/// A future resolving to the name of the first signal received
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    })
}
