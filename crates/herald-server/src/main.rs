//! Herald daemon binary.
//!
//! Loads configuration, probes the TTS back-ends once, starts the queue
//! worker and serves the loopback HTTP API with graceful shutdown on
//! SIGTERM/SIGINT. The only fatal start-up error is a failed bind.

use herald_server::{activity::AudioActivity, app, config, queue, AppState};
use herald_voice::Speaker;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_paths() -> (config::ConfigPaths, &'static str) {
    let mut paths = config::ConfigPaths::default();
    if let Some(dotenv) = std::env::args().nth(1).filter(|v| !v.trim().is_empty()) {
        paths.dotenv = dotenv.into();
        return (paths, "cli-arg");
    }
    (paths, "default")
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("HERALD_LOG_JSON").is_ok_and(|v| v == "true" || v == "1") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let (paths, source) = resolve_paths();
    tracing::info!(
        source,
        dotenv = %paths.dotenv.display(),
        "resolved configuration paths"
    );

    let config = Arc::new(config::Config::load(&paths));

    tracing::info!(
        owner = %config.owner_name,
        reduced_voice_feedback = config.reduced_voice_feedback,
        default_voice_id = %config.default_voice_id,
        "loaded configuration"
    );

    // Probes run exactly once; the selection is never revised mid-run.
    let speaker = Arc::new(Speaker::initialize(config.speaker_config()).await);
    let engine = speaker.engine();

    let (audio_queue, queue_rx) = queue::AudioQueue::new();
    let audio_activity =
        AudioActivity::new(speaker.pactl_present(), speaker.wav_player_binary());
    queue::spawn_worker(speaker, audio_activity, queue_rx);

    let state = AppState {
        config: config.clone(),
        engine,
        queue: audio_queue,
        rate_limiter: herald_server::middleware::RateLimiter::new(),
    };

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), config.port);
    tracing::info!(%addr, "starting herald voice server");

    // The one fatal start-up error: losing the notification port, usually
    // to another herald instance.
    let listener = TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("cannot bind {addr}: {e}"));

    axum::serve(listener, app(state))
        .with_graceful_shutdown(wait_for_shutdown(config.port))
        .await
        .expect("notification endpoint failed while serving");

    tracing::info!("herald voice server shut down");
}

/// Resolves once the supervisor asks the daemon to stop (Ctrl+C, or
/// SIGTERM from a service manager).
async fn wait_for_shutdown(port: u16) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(port, "interrupt received, closing the notification endpoint");
            }
            _ = sigterm.recv() => {
                tracing::info!(port, "terminate received, closing the notification endpoint");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!(port, "interrupt received, closing the notification endpoint");
    }
}
