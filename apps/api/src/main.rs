use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::AppointmentLifecycleService;
use notification_cell::handlers::NotificationState;
use notification_cell::{
    spawn_poller, InMemoryReadState, LifecycleFeed, NotificationCenter, ReadStateBackend, ReadStateTracker,
    RedisReadState, Viewer,
};
use shared_config::AppConfig;

async fn read_state_backend(config: &AppConfig) -> Arc<dyn ReadStateBackend> {
    match config.redis_url.as_deref() {
        Some(url) => match RedisReadState::new(url).await {
            Ok(backend) => Arc::new(backend),
            Err(e) => {
                warn!("Redis unavailable ({}), keeping notification read-state in memory", e);
                Arc::new(InMemoryReadState::new())
            }
        },
        None => {
            info!("REDIS_URL not set, keeping notification read-state in memory");
            Arc::new(InMemoryReadState::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hospital appointment API server");

    let config = Arc::new(AppConfig::from_env());
    if !config.is_auth_configured() {
        warn!("SUPABASE_JWT_SECRET not set; notification endpoints will reject every request");
    }

    let lifecycle = Arc::new(AppointmentLifecycleService::from_config(&config));
    let notifications = Arc::new(NotificationState {
        feed: Arc::new(LifecycleFeed::new(lifecycle.clone())),
        read_state: read_state_backend(&config).await,
        clock: lifecycle.clock(),
        clinic_offset: lifecycle.rules().clinic_offset,
    });

    // Clinic-wide digest in the server log, opt-in since it reads every appointment.
    let _digest_poller = if config.notification_digest_enabled {
        let digest = Arc::new(NotificationCenter::new(
            Viewer::Admin,
            notifications.feed.clone(),
            ReadStateTracker::new(notifications.read_state.clone(), "server-digest"),
            notifications.clock.clone(),
            notifications.clinic_offset,
        ));
        let poll_every = Duration::from_secs(config.notification_poll_interval_secs.max(1));
        Some(spawn_poller(digest, poll_every))
    } else {
        None
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), lifecycle, notifications)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
