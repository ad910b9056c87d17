use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use servicevisor::{
    CollaboratorRef, Config, ControlSurface, EndpointSpec, HttpEndpoint, LogWriter, Subscribe,
    Supervisor, api, shutdown,
};

/// Health supervisor and live control plane.
#[derive(Debug, Parser)]
#[command(name = "servicevisor", version, about)]
struct Cli {
    /// Address of the HTTP / WebSocket control API.
    #[arg(long, env = "SERVICEVISOR_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,

    /// Endpoint to supervise, `name=tcp://host:port` or `name=http(s)://...`.
    #[arg(short, long = "endpoint", env = "SERVICEVISOR_ENDPOINTS", value_delimiter = ',')]
    endpoints: Vec<EndpointSpec>,

    /// Reconciliation period in seconds.
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Run start-all once at boot.
    #[arg(long)]
    autostart: bool,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut cfg = Config::from_env();
    if let Some(secs) = cli.tick_secs {
        cfg.tick_interval = Duration::from_secs(secs);
    }
    cfg.autostart |= cli.autostart;

    let listener = TcpListener::bind(&cli.listen)
        .await
        .wrap_err_with(|| format!("failed to bind {}", cli.listen))?;
    let local = listener.local_addr().wrap_err("failed to read listen address")?;

    let mut collaborators: Vec<CollaboratorRef> = cli
        .endpoints
        .into_iter()
        .map(EndpointSpec::into_collaborator)
        .collect();
    // the control API supervises itself
    if !collaborators.iter().any(|c| c.name() == "http") {
        collaborators.push(Arc::new(HttpEndpoint::new("http", format!("http://{local}/health"))));
    }

    let sup = Supervisor::builder(cfg)
        .with_collaborators(collaborators)
        .with_subscribers(vec![Arc::new(LogWriter::new()) as Arc<dyn Subscribe>])
        .build()
        .wrap_err("invalid supervisor wiring")?;
    let control = ControlSurface::new(Arc::clone(&sup));

    let token = CancellationToken::new();
    shutdown::cancel_on_signal(token.clone());

    let runner = tokio::spawn({
        let sup = Arc::clone(&sup);
        let token = token.clone();
        async move { sup.run(token).await }
    });

    if sup.config().autostart {
        let control = control.clone();
        tokio::spawn(async move {
            let report = control.start_all().await;
            info!(success = report.success, "autostart finished");
        });
    }

    info!(%local, services = sup.registry().len(), "control plane listening");
    axum::serve(listener, api::router(control))
        .with_graceful_shutdown({
            let token = token.clone();
            async move { token.cancelled().await }
        })
        .await
        .wrap_err("http server failed")?;

    token.cancel();
    runner.await.wrap_err("supervisor task panicked")??;
    info!("bye");
    Ok(())
}
