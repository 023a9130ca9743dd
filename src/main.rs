use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{self, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use hopdial::adapters::{AdapterTable, ClientIdentityCatalog, ConnectionTracker};
use hopdial::domain::{ConnectService, DialContext, Metadata, ProfileConfig};

#[derive(Parser, Debug)]
#[clap(version = env!("HOPDIAL_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
pub struct Opts {
    /// Profile listing the configured proxies
    #[clap(long, short = 'c', default_value = "hopdial.toml")]
    config: PathBuf,

    /// Name of the proxy to dial through
    #[clap(long, short = 'p')]
    proxy: String,

    /// Destination, as host:port
    #[clap(long, short = 't')]
    target: String,

    /// Log filter used when RUST_LOG is not set
    #[clap(long, short = 'l', default_value = "info")]
    log_level: String,

    /// Seconds allowed for establishing the tunnel
    #[clap(long, default_value_t = 10)]
    timeout: u64,

    /// Client fingerprint overriding the profile's global one
    #[clap(long)]
    fingerprint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    // stdout carries tunnel bytes, logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&opts.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match rlimit::increase_nofile_limit(u64::MAX) {
        Ok(limit) => debug!("open file limit raised to {}", limit),
        Err(e) => debug!("could not raise open file limit: {}", e),
    }

    let profile: ProfileConfig = confy::load_path(&opts.config)?;
    let fingerprint = opts
        .fingerprint
        .as_deref()
        .or(profile.global_client_fingerprint.as_deref());
    let identities = Arc::new(ClientIdentityCatalog::new(fingerprint)?);
    let table = AdapterTable::from_options(&profile.proxies, identities)?;
    info!(
        config = %opts.config.display(),
        adapters = ?table.names(),
        "profile loaded"
    );

    let tracker = Arc::new(ConnectionTracker::new());
    let _cleanup = tracker.start_cleanup();
    let service = ConnectService::new(table, tracker);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
            on_signal.cancel();
        }
    });

    let metadata = Metadata::from_address(&opts.target)?;
    let ctx = DialContext::new()
        .with_cancel(cancel.clone())
        .with_timeout(Duration::from_secs(opts.timeout));

    let (id, conn) = match service.connect(&opts.proxy, &metadata, &ctx, &[]).await {
        Ok(established) => established,
        Err(e) => {
            error!(proxy = %opts.proxy, target = %opts.target, "{}", e);
            return Err(e.into());
        }
    };

    let (mut rd, mut wr) = io::split(conn);
    let upstream = async {
        io::copy(&mut io::stdin(), &mut wr).await?;
        wr.shutdown().await
    };
    let downstream = async {
        let mut stdout = io::stdout();
        io::copy(&mut rd, &mut stdout).await?;
        stdout.flush().await
    };

    let relayed = tokio::select! {
        result = async { tokio::try_join!(upstream, downstream) } => result.map(|_| ()),
        _ = cancel.cancelled() => Ok(()),
    };

    let mut conn = rd.unsplit(wr);
    conn.close().await;
    service.close_connection(id).await?;

    if let Err(e) = relayed {
        error!(proxy = %opts.proxy, "relay failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}
