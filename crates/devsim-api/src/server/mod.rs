//! Web server for the device simulation service.

pub mod router;
pub mod types;

pub use router::create_router;
pub use types::{MAX_REQUEST_BODY_SIZE, ServerState};

use devsim_core::config::ServiceConfig;

/// Start the web server with the given configuration and serve until a
/// shutdown signal arrives.
pub async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    use crate::startup::{ServiceStatus, StartupLogger};

    // JSON logs are for machines, skip the console banner.
    let mut startup = if config.log_json {
        StartupLogger::quiet()
    } else {
        StartupLogger::new()
    };
    startup.banner();

    // Initialization phase
    startup.phase_init();
    let state = ServerState::new(&config).await?;
    startup.service("Storage", ServiceStatus::Started);
    startup.detail(&config.database_path().display().to_string());
    startup.service("Provisioning worker", ServiceStatus::Started);

    // Configuration phase
    startup.phase_config();
    match state.default_hub_host() {
        Some(host) if config.iothub_connection_string.is_some() => {
            startup.info(&format!("Default IoT Hub: {host}"));
        }
        Some(host) => {
            startup.warning(&format!("No IoT Hub configured, using local hub {host}"));
        }
        None => startup.warning("No default IoT Hub"),
    }

    // Services phase
    startup.phase_services();
    if let Err(e) = state.initialize(&config).await {
        startup.service("Device model catalog", ServiceStatus::Error);
        return Err(e.into());
    }
    startup.service("Device model catalog", ServiceStatus::Started);
    startup.service(
        "Default simulation",
        if config.seed_default_simulation {
            ServiceStatus::Started
        } else {
            ServiceStatus::Disabled
        },
    );

    let app = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.bind).await?;

    // Ready phase
    startup.phase_ready();
    startup.ready_info(&config.bind.to_string());

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(crate::shutdown::shutdown_signal())
        .await?;

    crate::shutdown::shutdown_with_timeout(&state).await;

    tracing::info!("Server shutdown complete");
    Ok(())
}
