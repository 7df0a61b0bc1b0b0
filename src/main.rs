use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mongodb::Client;

use alertwatch::{
    config,
    routes,
    services::{
        alert_monitor::MonitorLoop,
        alert_sink::{AlertSink, JsonFileSink},
        db_init,
        finnhub,
        mongo_sink::MongoAlertSink,
        notifier::{EventBus, FanOut, LogSink},
        volume_window::RollingVolume,
    },
    AlertEngine, AppState,
};

async fn build_sink(settings: &config::Settings) -> Result<Arc<dyn AlertSink>, Box<dyn std::error::Error>> {
    match &settings.mongodb_uri {
        Some(uri) => {
            let client = Client::with_uri_str(uri).await?;
            let db = client.database(&settings.mongodb_db);

            if let Err(e) = db_init::ensure_indexes(&db).await {
                tracing::warn!("ensure_indexes failed: {}", e);
            }

            tracing::info!("storing alerts in MongoDB database {}", settings.mongodb_db);
            Ok(Arc::new(MongoAlertSink::new(&db)))
        }
        None => {
            tracing::info!("storing alerts in {}", settings.alerts_file);
            Ok(Arc::new(JsonFileSink::new(&settings.alerts_file)))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let settings = config::load();

    let sink = build_sink(&settings).await?;
    let events = EventBus::new(settings.event_buffer);
    let notifier = FanOut::new()
        .with(Arc::new(LogSink))
        .with(Arc::new(events.clone()));

    let engine = AlertEngine::builder(sink)
        .notifier(Arc::new(notifier))
        .volume(Arc::new(RollingVolume::new(settings.volume_window)))
        .default_cooldown_ms(settings.default_cooldown_ms)
        .build()
        .await?;
    let engine = Arc::new(engine);

    let monitor = MonitorLoop::start(
        engine.clone(),
        Duration::from_millis(settings.monitor_interval_ms),
    );
    let feed = finnhub::spawn_trade_feed(engine.clone(), settings.finnhub_api_key.clone());

    let state = AppState {
        engine: engine.clone(),
        events,
        settings: settings.clone(),
    };
    let app = routes::app(state);

    let addr = SocketAddr::from((settings.host.parse::<std::net::IpAddr>()?, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    if let Some(feed) = feed {
        feed.abort();
    }
    monitor.stop().await;

    if let Err(e) = engine.flush().await {
        tracing::error!("final alert write failed: {}", e);
    }

    Ok(())
}
