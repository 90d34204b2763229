use std::path::Path;

use axum::routing::{get, post};
use axum::Router;
use tera::Tera;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

mod error;
mod state;

pub use error::*;
pub use state::*;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates([
        ("index.html", include_str!("../../templates/index.html")),
        ("help.html", include_str!("../../templates/help.html")),
    ])?;
    Ok(tera)
}

pub fn create_router(app: App, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(pages::index))
        .route("/help-for-admin", get(pages::help))
        .route("/api/cat-meter/:name", get(meter::check_by_path))
        .route("/api/cat-meter/", post(meter::check_by_body))
        .route("/api/stats/:user_id", get(stats::user))
        .route("/api/global-stats", get(stats::global))
        .route("/health", get(health::health))
        .route("/debug/db-status", get(health::database_status))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(app)
}

pub mod pages {
    use axum::extract::State;
    use axum::response::IntoResponse;
    use axum_template::RenderHtml;
    use serde::Serialize;

    use super::AppEngine;
    use crate::service::CatMeter;

    #[derive(Debug, Serialize)]
    struct IndexPage {
        version: &'static str,
    }

    #[derive(Debug, Serialize)]
    struct HelpPage {
        database_available: bool,
        version: &'static str,
    }

    pub async fn index(engine: AppEngine) -> impl IntoResponse {
        RenderHtml("index.html", engine, IndexPage { version: super::VERSION })
    }

    pub async fn help(engine: AppEngine, State(meter): State<CatMeter>) -> impl IntoResponse {
        let page = HelpPage {
            database_available: meter.is_storage_available(),
            version: super::VERSION,
        };

        RenderHtml("help.html", engine, page)
    }
}

pub mod meter {
    use axum::extract::{Path, State};
    use axum::Json;
    use derive_new::new;
    use serde::{Deserialize, Serialize};
    use snafu::ensure;
    use tracing::instrument;

    use super::{EmptyNameSnafu, Result};
    use crate::model::{CheckSource, UserKey};
    use crate::service::CatMeter;

    pub const EMOJI: &str = "🐱";

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CheckRequest {
        pub name: String,
    }

    #[derive(Debug, Serialize, new)]
    pub struct CheckResponse {
        pub name: String,
        pub percentage: u8,
        pub phrase: &'static str,
        pub emoji: &'static str,
    }

    #[instrument(skip(meter))]
    pub async fn check_by_path(
        State(meter): State<CatMeter>, Path(name): Path<String>,
    ) -> Result<Json<CheckResponse>> {
        check(&meter, CheckSource::Get, name).await
    }

    #[instrument(skip(meter))]
    pub async fn check_by_body(
        State(meter): State<CatMeter>, Json(request): Json<CheckRequest>,
    ) -> Result<Json<CheckResponse>> {
        check(&meter, CheckSource::Post, request.name).await
    }

    async fn check(meter: &CatMeter, source: CheckSource, name: String) -> Result<Json<CheckResponse>> {
        ensure!(!name.trim().is_empty(), EmptyNameSnafu);

        let score = meter.compute_score(&name);
        let key = UserKey::anonymous(source, &name);
        meter.record_check(&key, &name, score.percentage).await;

        tracing::info!(%key, percentage = score.percentage, "measured cat percentage");

        Ok(Json(CheckResponse::new(name, score.percentage, score.phrase, EMOJI)))
    }
}

pub mod stats {
    use axum::extract::{Path, State};
    use axum::Json;
    use serde::Serialize;

    use super::Result;
    use crate::model::{GlobalStats, UserStats};
    use crate::service::CatMeter;

    #[derive(Debug, Serialize)]
    pub struct GlobalStatsResponse {
        #[serde(flatten)]
        pub stats: GlobalStats,
        pub database_available: bool,
        pub service_status: &'static str,
    }

    pub async fn user(
        State(meter): State<CatMeter>, Path(user_id): Path<String>,
    ) -> Result<Json<UserStats>> {
        let stats = meter.fetch_user_stats(&user_id).await?;
        Ok(Json(stats))
    }

    pub async fn global(State(meter): State<CatMeter>) -> Json<GlobalStatsResponse> {
        let report = meter.fetch_global_stats().await;

        Json(GlobalStatsResponse {
            stats: report.stats,
            database_available: report.storage_available,
            service_status: "running",
        })
    }
}

pub mod health {
    use axum::extract::State;
    use axum::Json;
    use serde::Serialize;

    use crate::database::StorageMode;
    use crate::model::now;
    use crate::service::CatMeter;

    #[derive(Debug, Serialize)]
    pub struct Health {
        pub status: &'static str,
        pub timestamp: String,
        pub database: &'static str,
        pub version: &'static str,
    }

    #[derive(Debug, Serialize)]
    pub struct DatabaseStatus {
        pub db_initialized: bool,
        pub mode: StorageMode,
        pub tables: Vec<String>,
        pub data_directory_exists: bool,
        pub data_directory_writable: bool,
    }

    pub async fn health(State(meter): State<CatMeter>) -> Json<Health> {
        let database = if meter.is_storage_available() {
            "available"
        } else {
            "unavailable"
        };

        Json(Health {
            status: "healthy",
            timestamp: now().to_rfc3339(),
            database,
            version: super::VERSION,
        })
    }

    pub async fn database_status(State(meter): State<CatMeter>) -> Json<DatabaseStatus> {
        let storage = meter.storage();

        let data_directory_exists = tokio::fs::try_exists(storage.data_dir())
            .await
            .unwrap_or(false);
        let data_directory_writable = meter.check_storage_writable().await;

        let tables = if data_directory_writable {
            storage.tables().await.unwrap_or_else(|err| {
                tracing::error!("debug database error: {}", err);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        Json(DatabaseStatus {
            db_initialized: meter.is_storage_available(),
            mode: storage.mode(),
            tables,
            data_directory_exists,
            data_directory_writable,
        })
    }
}
