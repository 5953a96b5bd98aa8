use dhub_ratelimit::cli::Cli;
use dhub_ratelimit::config::{read_password_from, ExporterConfig, FileConfig};
use dhub_ratelimit::core::{get_debug_logger, init_logger, Checker, LoggerConfig};
use dhub_ratelimit::exporter::{
    router, AppState, ExporterMetrics, ExporterState, PollError, Poller, SharedState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();

    let stdin_password = if cli.password_stdin {
        Some(read_password_from(std::io::stdin().lock())?)
    } else {
        None
    };

    let file_config = FileConfig::discover(cli.config.as_deref())?;
    let config = ExporterConfig::resolve(&cli, file_config, stdin_password)?;

    init_logger(LoggerConfig {
        verbose: config.verbose,
        log_file: config.log_file.clone(),
    });
    let logger = get_debug_logger();

    let checker = Arc::new(
        Checker::builder()
            .credentials(config.username, config.password)
            .ip_provider(config.ip_provider)
            .build()?,
    );

    if config.once {
        let result = tokio::time::timeout(config.check_timeout, checker.check())
            .await
            .map_err(|_| PollError::Timeout(config.check_timeout))??;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let metrics = Arc::new(ExporterMetrics::new()?);
    let state: SharedState = Arc::new(RwLock::new(ExporterState::default()));

    let poller = Poller::new(
        Arc::clone(&checker),
        Arc::clone(&metrics),
        Arc::clone(&state),
        config.interval,
        config.check_timeout,
    );
    let poll_task = tokio::spawn(poller.run());

    let app = router(Arc::new(AppState { metrics, state }));
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    logger.info(
        "Main",
        "listening",
        &format!(
            "about to listen for HTTP on {} (identity {}, interval {:?})",
            config.listen_addr,
            checker.identity_string(),
            config.interval
        ),
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    poll_task.abort();
    logger.info("Main", "shutdown", "HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        get_debug_logger().error(
            "Main",
            "signal_handler",
            &format!("unable to listen for Ctrl-C: {}", e),
        );
        std::future::pending::<()>().await;
    }
}
