use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    extract::OriginalUri,
    http::{Method, Response, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use rust_embed::RustEmbed;
use tokio::{net::TcpListener, signal, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use zonewatch::{
    AppState, SharedState, api,
    config::{ServerConfig, SyncConfig, ZoneConfig},
    dns::{DnsClient, resolve::can_resolve, tsig::parse_algorithm},
    normalize::RecordFilter,
    poll::{self, Broadcaster},
    store::SnapshotStore,
    sync::SyncEngine,
    validation::{decode_key_secret, normalize_fqdn},
};

#[derive(Parser, Debug)]
#[command(author, version, about, rename_all = "kebab-case")]
struct Cli {
    /// Zone to mirror (e.g. example.com)
    #[arg(long, env = "DNS_DOMAIN", value_name = "DOMAIN")]
    domain: String,
    /// Primary nameserver to probe and transfer from
    #[arg(long, env = "DNS_NS_SERVER", value_name = "HOST")]
    ns_server: String,
    /// Port of the primary nameserver
    #[arg(long, env = "DNS_NS_SERVER_PORT", value_name = "PORT", default_value_t = 53)]
    ns_server_port: u16,
    /// TSIG key name
    #[arg(long, env = "DNS_KEY_NAME", value_name = "NAME")]
    key_name: String,
    /// TSIG secret, base64 encoded
    #[arg(long, env = "DNS_KEY_SECRET", value_name = "BASE64", hide_env_values = true)]
    key_secret: String,
    /// TSIG algorithm
    #[arg(long, env = "DNS_KEY_ALGORITHM", value_name = "ALG", default_value = "hmac-sha256")]
    key_algorithm: String,
    /// Seconds between SOA serial checks
    #[arg(long, env = "DNS_POLL_INTERVAL", value_name = "SECS", default_value_t = 30)]
    poll_interval: u64,
    /// Seconds to wait for the SOA answer
    #[arg(long, env = "DNS_QUERY_TIMEOUT", value_name = "SECS", default_value_t = 5)]
    query_timeout: u64,
    /// Seconds a full zone transfer may take
    #[arg(long, env = "DNS_TRANSFER_TIMEOUT", value_name = "SECS", default_value_t = 60)]
    transfer_timeout: u64,
    /// Listen address for the HTTP server
    #[arg(long, env = "DNS_LISTEN", value_name = "ADDR", default_value = "0.0.0.0:5000")]
    listen: SocketAddr,
    /// Record type to keep (repeat for multiple values; default keeps all)
    #[arg(long = "record-type", env = "DNS_RECORD_TYPE", value_name = "TYPE", value_delimiter = ',')]
    record_types: Vec<String>,
}

/// The page is one script plus an inline stylesheet, and only talks to
/// the event stream.
const PAGE_POLICY: &str = "default-src 'none'; script-src 'self'; style-src 'unsafe-inline'; \
                           connect-src 'self'; base-uri 'none'; frame-ancestors 'none'";

#[derive(RustEmbed)]
#[folder = "dist"]
struct EmbeddedDist;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let zone = Arc::new(build_zone_config(&cli)?);
    let sync = build_sync_config(&cli)?;
    let server = ServerConfig { listen: cli.listen };
    info!(zone = %zone.domain, server = %zone.server_label(), key = %zone.key_name, "starting zonewatch");

    startup_diagnostics(&zone).await;

    let store = Arc::new(SnapshotStore::new());
    let updates = Broadcaster::default();
    let client = Arc::new(DnsClient::new(zone.clone(), &sync).context("failed to build TSIG key")?);
    let engine = Arc::new(
        SyncEngine::new(zone.clone(), client.clone(), client, store.clone())
            .with_filter(RecordFilter::record_types(&cli.record_types)),
    );

    let (stop, shutdown) = watch::channel(false);
    let poller = tokio::spawn(poll::run(engine, sync.poll_interval, updates.clone(), shutdown));

    let state: SharedState = Arc::new(AppState {
        config: zone,
        store,
        updates,
    });

    let spa_routes = get(frontend_handler).head(frontend_handler);
    let app = Router::new()
        .merge(api::create_router(state))
        .route("/", spa_routes.clone())
        .route("/{*path}", spa_routes)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(server.listen)
        .await
        .with_context(|| format!("failed to bind to {}", server.listen))?;

    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    let _ = stop.send(true);
    poller.await.context("poll loop panicked")?;

    Ok(())
}

fn build_zone_config(cli: &Cli) -> Result<ZoneConfig> {
    let domain = normalize_fqdn(&cli.domain)
        .with_context(|| format!("invalid domain '{}'", cli.domain))?;
    let key_name = normalize_fqdn(&cli.key_name)
        .with_context(|| format!("invalid key name '{}'", cli.key_name))?;
    let key_secret = decode_key_secret(&cli.key_secret).context("invalid key secret")?;
    let key_algorithm = parse_algorithm(&cli.key_algorithm)?;

    let server_host = cli.ns_server.trim().to_string();
    if server_host.is_empty() {
        anyhow::bail!("ns-server cannot be empty");
    }

    Ok(ZoneConfig {
        domain,
        server_host,
        server_port: cli.ns_server_port,
        key_name,
        key_secret,
        key_algorithm,
    })
}

fn build_sync_config(cli: &Cli) -> Result<SyncConfig> {
    if cli.poll_interval == 0 {
        anyhow::bail!("poll-interval must be at least one second");
    }
    Ok(SyncConfig {
        poll_interval: Duration::from_secs(cli.poll_interval),
        query_timeout: Duration::from_secs(cli.query_timeout.max(1)),
        transfer_timeout: Duration::from_secs(cli.transfer_timeout.max(1)),
    })
}

/// Resolution problems are reported but never stop startup; the poll loop
/// retries every cycle.
async fn startup_diagnostics(zone: &ZoneConfig) {
    if !can_resolve(&zone.server_host).await {
        warn!(host = %zone.server_host, "nameserver does not resolve yet");
    }
    if !can_resolve(zone.domain_root()).await {
        warn!(host = %zone.domain_root(), "zone apex does not resolve");
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install CTRL+C handler: {err}");
    }
    info!("shutdown signal received");
}

async fn frontend_handler(method: Method, OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let path = uri.path().trim_start_matches('/');
    if path.contains("..") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let candidate = if path.is_empty() { "index.html" } else { path };
    if let Some(resp) = embedded_response(candidate, &method) {
        return resp;
    }

    StatusCode::NOT_FOUND.into_response()
}

fn embedded_response(path: &str, method: &Method) -> Option<Response<Body>> {
    let asset = EmbeddedDist::get(path)?;
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(asset.data.into_owned())
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONTENT_SECURITY_POLICY, PAGE_POLICY)
        .header(header::REFERRER_POLICY, "no-referrer")
        .body(body)
        .ok()
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
