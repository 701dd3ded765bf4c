//! # gpiohubd
//!
//! Composition root: the only place that knows about every adapter.
//!
//! ## Responsibilities
//! - Load configuration (`gpiohub.toml` + `GPIOHUB_*` env vars)
//! - Initialise tracing/logging
//! - Open the `SQLite` database and seed the pin catalog
//! - Pick the GPIO backend and re-apply persisted device states
//! - Start the action scheduler
//! - Serve HTTP until SIGINT/SIGTERM, then stop the scheduler
//!
//! ## Dependency rule
//! This is the only crate allowed to depend on all other crates.

mod config;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use gpiohub_adapter_gpio::{AnyLines, Backend, SysfsLines, VirtualLines};
use gpiohub_adapter_http_axum::router;
use gpiohub_adapter_http_axum::state::AppState;
use gpiohub_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteActionRepository, SqliteDeviceRepository, SqlitePinRepository,
};
use gpiohub_app::clock::Clock;
use gpiohub_app::gpio_driver::GpioDriver;
use gpiohub_app::scheduler::{ActionScheduler, Executor};
use gpiohub_app::services::action_service::ActionService;
use gpiohub_app::services::device_controller::DeviceController;
use gpiohub_app::services::device_service::DeviceService;
use gpiohub_app::services::pin_service::PinService;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    let device_repo = SqliteDeviceRepository::new(pool.clone());
    let pin_repo = SqlitePinRepository::new(pool.clone());
    let action_repo = SqliteActionRepository::new(pool);

    let lines = match config.gpio.backend {
        Backend::Virtual => AnyLines::Virtual(VirtualLines::default()),
        Backend::Sysfs => AnyLines::Sysfs(SysfsLines::new(&config.gpio.sysfs_root)),
    };
    tracing::info!(
        backend = ?config.gpio.backend,
        polarity = ?config.polarity(),
        "gpio backend selected"
    );

    let clock = Clock::System;
    let controller = Arc::new(DeviceController::new(
        device_repo.clone(),
        GpioDriver::new(lines, config.polarity()),
        clock,
    ));
    controller.initialize_all().await?;

    let executor = Executor::new(action_repo.clone(), Arc::clone(&controller), clock);
    let scheduler = ActionScheduler::new(executor, clock, config.scheduler_settings()?);
    let action_service =
        ActionService::new(action_repo, device_repo.clone(), scheduler.clone(), clock);

    let state = AppState::new(
        DeviceService::new(device_repo, pin_repo.clone()),
        PinService::new(pin_repo),
        controller,
        action_service,
    );
    let app = router::build(state);

    scheduler.start().await?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gpiohubd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    tracing::info!("gpiohubd stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
