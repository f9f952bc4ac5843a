use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use aquabear_api::{
    app_with_origins,
    auth::StaffDirectory,
    state::{AppState, AuthConfig},
};
use aquabear_core::dispatch::NoopDispatcher;
use aquabear_core::notice::SilentAlerts;
use aquabear_core::{
    BookingIntake, ConsoleContext, ConsoleSettings, NotificationDispatcher, ReservationConsole,
    ReservationStore,
};
use aquabear_store::{
    app_config::Config, DbClient, MemoryReservationStore, PgReservationStore, RedisClient,
    ResendDispatcher,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aquabear_api=debug,aquabear_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Aqua Bear API on port {}", config.server.port);

    // Reservation store
    let store: Arc<dyn ReservationStore> = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PgReservationStore::new(db.pool.clone()))
        }
        None => {
            tracing::warn!("No database configured, using the in-memory reservation store");
            Arc::new(MemoryReservationStore::new())
        }
    };

    // Redis (optional, rate limiting only)
    let redis = match &config.redis.url {
        Some(url) => match RedisClient::new(url).await {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled");
                None
            }
        },
        None => None,
    };

    // Staff notification email
    let dispatcher: Arc<dyn NotificationDispatcher> =
        match config.notifications.resend_api_key.as_deref() {
            Some(key) if !key.is_empty() => Arc::new(ResendDispatcher::new(&config.notifications, key)),
            _ => {
                tracing::info!("No email API key configured, staff notifications are logged only");
                Arc::new(NoopDispatcher)
            }
        };

    let staff = StaffDirectory::from_config(&config.auth.staff).context("Invalid staff accounts")?;
    if staff.is_empty() {
        tracing::warn!("No staff accounts configured, the console is unreachable");
    }

    let console = Arc::new(ReservationConsole::new(ConsoleContext {
        store: store.clone(),
        alerts: Arc::new(SilentAlerts),
        settings: ConsoleSettings {
            notice_delay: config.console.notice_delay(),
            store_timeout: config.console.store_timeout(),
            club_name: config.club_name.clone(),
        },
    }));
    console.mount().await;

    let intake = Arc::new(BookingIntake::new(store, dispatcher.clone()));

    let mut app_state = AppState::new(
        console.clone(),
        intake,
        dispatcher,
        staff,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    );
    if let Some(redis) = redis {
        app_state = app_state.with_redis(redis, config.rate_limit.clone());
    }

    let app = app_with_origins(app_state, &config.server.allowed_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    console.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
