use spool_server::{Server, print_banner, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = setup_environment()?;

    print_banner();

    tracing::info!(
        environment = %config.environment,
        ingest_url = %config.ingest_url,
        work_dir = %config.work_dir,
        "Spool daemon starting"
    );

    let server = Server::new(config);
    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Server exited with error");
        return Err(e.into());
    }

    Ok(())
}
