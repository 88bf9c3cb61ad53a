use edgewatch_controller::{
    ComputeBackend, ControllerConfig, InstanceProvisioner, ViewershipController, ViewershipService,
};
use edgewatch_providers::{
    ComputeRepository, Ec2ComputeRepository, HelixStreamRepository, InMemoryComputeRepository,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("edgewatch=info,info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ControllerConfig::from_env()?;
    info!(
        channel = %config.channel,
        threshold = config.viewer_threshold,
        eviction = %config.eviction,
        regions = ?config.regions,
        dry_run = config.is_dry_run(),
        "Starting edgewatch"
    );

    let compute: Arc<dyn ComputeRepository> = match &config.compute {
        ComputeBackend::DryRun => {
            warn!("Dry run enabled, instances are simulated in memory");
            Arc::new(InMemoryComputeRepository::new())
        }
        ComputeBackend::Ec2(credentials) => Arc::new(Ec2ComputeRepository::new(
            credentials.clone(),
            config.request_timeout,
        )?),
    };
    let streams = Arc::new(HelixStreamRepository::new(
        config.twitch.clone(),
        config.request_timeout,
    )?);

    let provisioner = Arc::new(InstanceProvisioner::new(compute, config.regions.clone()));
    let service = Arc::new(ViewershipService::new(
        streams,
        provisioner,
        config.monitor_settings(),
    ));
    let controller = ViewershipController::new(service, config.schedule);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "Could not listen for Ctrl-C");
                // Dropping the sender would stop the loop.
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    if let Err(e) = controller.run(shutdown_rx).await {
        error!(error = %e, "Viewership controller stopped");
        return Err(e.into());
    }

    info!("Edgewatch stopped");
    Ok(())
}
