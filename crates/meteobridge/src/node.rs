//! Node runtime: Zenoh session, shutdown signal, health heartbeat and the
//! Zenoh-backed driver publisher.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::poller::Poller;
use crate::sink::{DriverPublisher, DriverUpdate};

const DEFAULT_ENDPOINT: &str = "tcp/127.0.0.1:7447";

/// Runtime context shared by the node's tasks.
pub struct NodeContext {
    pub session: Arc<zenoh::Session>,
    /// Deployment scope (from BUBBALOOP_SCOPE env, default: "local")
    pub scope: String,
    /// Machine identifier (from BUBBALOOP_MACHINE_ID env, default: hostname)
    pub machine_id: String,
    pub node_name: String,
    pub shutdown_rx: watch::Receiver<()>,
}

impl NodeContext {
    /// `bubbaloop/{scope}/{machine_id}/{suffix}`
    pub fn topic(&self, suffix: &str) -> String {
        scoped_topic(&self.scope, &self.machine_id, suffix)
    }
}

fn scoped_topic(scope: &str, machine_id: &str, suffix: &str) -> String {
    format!("bubbaloop/{}/{}/{}", scope, machine_id, suffix)
}

/// Initialize env_logger, defaulting to "info" unless RUST_LOG says otherwise.
pub fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Shutdown channel fired by SIGINT/SIGTERM.
pub fn setup_shutdown() -> anyhow::Result<watch::Sender<()>> {
    let (tx, _rx) = watch::channel(());
    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        log::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    })?;
    Ok(tx)
}

pub fn resolve_scope() -> String {
    std::env::var("BUBBALOOP_SCOPE").unwrap_or_else(|_| "local".to_string())
}

pub fn resolve_machine_id() -> String {
    std::env::var("BUBBALOOP_MACHINE_ID")
        .unwrap_or_else(|_| {
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        })
        .replace('-', "_")
}

/// Endpoint precedence: `ZENOH_ENDPOINT`, `BUBBALOOP_ZENOH_ENDPOINT`, the
/// CLI value, then the local router.
pub fn resolve_endpoint(cli: Option<&str>) -> String {
    std::env::var("ZENOH_ENDPOINT")
        .or_else(|_| std::env::var("BUBBALOOP_ZENOH_ENDPOINT"))
        .ok()
        .or_else(|| cli.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

/// Client-mode Zenoh configuration for `endpoint`, scouting disabled.
fn session_config(endpoint: &str) -> Result<zenoh::Config> {
    let endpoints = format!(r#"["{}"]"#, endpoint);
    // Peer discovery stays off: the node only talks to the configured router.
    let settings = [
        ("mode", r#""client""#),
        ("connect/endpoints", endpoints.as_str()),
        ("scouting/multicast/enabled", "false"),
        ("scouting/gossip/enabled", "false"),
    ];

    let mut config = zenoh::Config::default();
    for (key, value) in settings {
        config
            .insert_json5(key, value)
            .map_err(|e| Error::Zenoh(format!("Failed to set {key}: {e}")))?;
    }
    Ok(config)
}

/// Open a Zenoh session in client mode with scouting disabled.
pub async fn open_zenoh_session(endpoint: &str) -> Result<Arc<zenoh::Session>> {
    log::info!("Connecting to Zenoh at: {}", endpoint);
    let session = zenoh::open(session_config(endpoint)?).await?;
    log::info!("Connected to Zenoh");
    Ok(Arc::new(session))
}

/// Publish `"ok"` on `.../health/{node_name}` every 5 seconds until shutdown.
pub async fn spawn_health_heartbeat(ctx: &NodeContext) -> Result<tokio::task::JoinHandle<()>> {
    let topic = ctx.topic(&format!("health/{}", ctx.node_name));
    log::info!("Health heartbeat: {}", topic);
    let publisher = ctx.session.declare_publisher(topic).await?;
    let mut shutdown_rx = ctx.shutdown_rx.clone();

    Ok(tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {
                    if let Err(e) = publisher.put("ok").await {
                        log::warn!("Health heartbeat failed: {}", e);
                    }
                }
            }
        }
    }))
}

/// Publishes each driver update as JSON on
/// `bubbaloop/{scope}/{machine_id}/{node_name}/{category}/{slot}`.
pub struct ZenohDriverPublisher {
    session: Arc<zenoh::Session>,
    prefix: String,
}

impl ZenohDriverPublisher {
    pub fn new(ctx: &NodeContext) -> Self {
        Self {
            session: ctx.session.clone(),
            prefix: ctx.topic(&ctx.node_name),
        }
    }

    pub fn key(&self, update: &DriverUpdate) -> String {
        driver_key(&self.prefix, update)
    }
}

fn driver_key(prefix: &str, update: &DriverUpdate) -> String {
    format!("{}/{}/{}", prefix, update.category, update.slot)
}

#[async_trait]
impl DriverPublisher for ZenohDriverPublisher {
    async fn set_driver(&self, update: &DriverUpdate) -> Result<()> {
        let payload =
            serde_json::to_string(update).map_err(|e| Error::Zenoh(format!("encode: {e}")))?;
        self.session.put(self.key(update), payload).await?;
        Ok(())
    }
}

/// Run the bridge until shutdown.
pub async fn run(config: Config, endpoint: Option<&str>) -> anyhow::Result<()> {
    let poll_config = config.poll_config()?;
    if !poll_config.device.is_configured() {
        log::warn!("device.host is not set; polls will be skipped until it is configured");
    }

    let shutdown_tx = setup_shutdown()?;
    let session = open_zenoh_session(&resolve_endpoint(endpoint)).await?;

    let ctx = NodeContext {
        session,
        scope: resolve_scope(),
        machine_id: resolve_machine_id(),
        node_name: config.node_name.clone(),
        shutdown_rx: shutdown_tx.subscribe(),
    };
    log::info!("Scope: {}, Machine ID: {}", ctx.scope, ctx.machine_id);

    let heartbeat = spawn_health_heartbeat(&ctx).await?;
    let publisher: Arc<dyn DriverPublisher> = Arc::new(ZenohDriverPublisher::new(&ctx));

    Poller::new(poll_config)
        .run(publisher, ctx.shutdown_rx.clone())
        .await?;

    let _ = heartbeat.await;
    log::info!("{} node shut down", ctx.node_name);
    Ok(())
}
