use dotenv::dotenv;

use mastery_hub::{
    AppState,
    config::Config,
    db::{SubjectExt, UserExt},
    handler::auth::seed_default_users,
    store::FileStore,
    tracing_config::init_tracing,
};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("🔥 Invalid configuration: {}", err.message);
            std::process::exit(1);
        }
    };

    // Keep the guard alive until exit so buffered log lines are flushed.
    let _guard = init_tracing(&config.log_dir);

    let store = match FileStore::open(&config.data_dir) {
        Ok(store) => {
            tracing::info!(data_dir = %config.data_dir.display(), "✅ Data directory is ready");
            store
        }
        Err(err) => {
            tracing::error!("🔥 Failed to open the data directory: {}", err.message);
            std::process::exit(1);
        }
    };

    let app_state = AppState::new(config, store);

    match seed_default_users(&app_state) {
        Ok(true) => tracing::info!("Default administrator and faculty accounts created"),
        Ok(false) => {}
        Err(err) => {
            tracing::error!("🔥 Failed to seed default accounts: {}", err.message);
            std::process::exit(1);
        }
    }

    let db = &app_state.db_client;
    let users = db.load_users().map(|u| u.len()).unwrap_or_default();
    let subjects = db.load_subjects().map(|s| s.len()).unwrap_or_default();
    tracing::info!(
        users,
        subjects,
        latency_ms = app_state.latency.duration().as_millis() as u64,
        log_capacity = db.log_capacity(),
        "🚀 Mastery Hub core is ready"
    );
}
