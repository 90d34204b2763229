use cat_meter::api;
use cat_meter::config;
use cat_meter::database::Storage;
use cat_meter::error::{ApplicationError, BindAddressSnafu, TemplatesSnafu, WebServerSnafu};
use cat_meter::logger;
use dotenvy::dotenv;
use snafu::ResultExt as _;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = config::load()?;

    let _guard = logger::init(&config)?;
    tracing::info!("starting Cat-O-Meter API...");

    let storage = Storage::new(config.storage());
    if storage.initialize().await {
        tracing::info!("API started with database support");
    } else {
        tracing::warn!("API started in limited mode (no database)");
    }

    let app = api::create_app(storage).context(TemplatesSnafu)?;
    let router = api::create_router(app, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(config.host)
        .await
        .context(BindAddressSnafu { address: config.host })?;
    tracing::info!(address = %config.host, "listening");

    axum::serve(listener, router).await.context(WebServerSnafu)
}
