mod cache;
mod clock;
mod component_id;
mod config;
pub mod db;
mod error;
mod eviction;
pub mod handlers;
mod records;
pub mod serializer;
mod store;
mod text;

pub use component_id::{ComponentId, Lifespan};
pub use config::ComponentIdStoreConfig;
pub use error::StoreError;
pub use eviction::{EvictedComponent, EvictionListener};
pub use records::{ComponentRecord, ComponentRecords};
pub use serializer::FormatError;
pub use store::ComponentIdStore;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

fn env_var<T: std::str::FromStr>(name: &str) -> Result<T, Error>
where
    T::Err: std::fmt::Display,
{
    Ok(std::env::var(name)
        .map_err(|_| format!("Missing {}", name))?
        .parse()
        .map_err(|e| format!("Invalid {}: {}", name, e))?)
}

async fn app() -> Result<(), Error> {
    let database_url: String = env_var("DATABASE_URL")?;
    let config = ComponentIdStoreConfig::from_env()?;
    let pool = db::connect(&database_url).await?;

    log::info!("Starting component id store with {:?}", config);
    let store = ComponentIdStore::new(pool, config);
    store.add_eviction_callback(|evicted| {
        log::debug!(
            "Component id {} of `{}` expired",
            evicted.token,
            evicted.component_id.owner()
        );
    });

    // Business handlers register themselves here and create their components through
    // `Handlers::component_id`; the platform event loop hands tokens to `Handlers::route`.
    let handlers = handlers::Handlers::new();
    for (owner, description) in handlers.describe() {
        log::info!("Component handler `{}`: {}", owner, description);
    }
    log::info!(
        "Ready (revision {}), {} component handlers registered",
        env!("BUILD_REVISION"),
        handlers.len()
    );

    tokio::signal::ctrl_c().await?;
    log::info!("Received Ctrl-C, shutting down");
    store.shutdown().await;

    Ok(())
}

pub async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    if let Err(e) = app().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
