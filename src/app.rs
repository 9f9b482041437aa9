use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::audit::{AuditSink, NoopAuditSink, TracingAuditSink};
use crate::config::{AppConfig, StorageBackend};
use crate::database::{memory::MemoryStore, postgres::PgStore, BoardBlockStore};
use crate::handlers::{protected, public};
use crate::middleware::{csrf_middleware, session_middleware};
use crate::model::RandomIds;
use crate::permissions::{policy::PolicyServiceClient, GrantTable, PermissionChecker};
use crate::services::{stamp::SystemClock, ServiceDeps, Services};

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Services,
    pub store: Arc<dyn BoardBlockStore>,
}

impl AppState {
    pub fn new(config: AppConfig, deps: ServiceDeps) -> Self {
        Self {
            config: Arc::new(config),
            store: deps.store.clone(),
            services: Services::new(deps),
        }
    }

    /// Wires the configured collaborators together.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn BoardBlockStore> = match config.storage.backend {
            StorageBackend::Memory => {
                info!("using in-memory store");
                Arc::new(MemoryStore::new())
            }
            StorageBackend::Postgres => {
                let url = config
                    .storage
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set for the postgres backend")?;
                let timeout = Duration::from_secs(config.storage.connection_timeout);
                let store = PgStore::connect(url, config.storage.max_connections, timeout)
                    .await
                    .context("failed to connect to postgres")?;
                info!("using postgres store");
                Arc::new(store)
            }
        };

        let permissions: Arc<dyn PermissionChecker> = match config.policy.service_url.as_deref() {
            Some(url) => {
                let timeout = Duration::from_millis(config.policy.timeout_ms);
                Arc::new(PolicyServiceClient::new(url, timeout).context("failed to build policy client")?)
            }
            None => {
                warn!("no policy service configured, only single-user sessions are authorized");
                Arc::new(GrantTable::default())
            }
        };

        let audit: Arc<dyn AuditSink> = if config.audit.enabled {
            Arc::new(TracingAuditSink)
        } else {
            Arc::new(NoopAuditSink)
        };

        let deps = ServiceDeps {
            store,
            permissions,
            audit,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
        };
        Ok(Self::new(config.clone(), deps))
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_request_size_bytes;
    let cors = cors_layer(&state.config);

    let app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected API
        .nest("/api/v1", api_routes(state.clone()))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn api_routes(state: AppState) -> Router<AppState> {
    use protected::{blocks, boards, boards_and_blocks};

    Router::new()
        // Composite mutations
        .route(
            "/boards-and-blocks",
            post(boards_and_blocks::create)
                .patch(boards_and_blocks::patch)
                .delete(boards_and_blocks::delete),
        )
        // Boards
        .route("/teams/:team_id/boards", get(boards::team_boards_get))
        .route("/boards", post(boards::board_post))
        .route(
            "/boards/:board_id",
            get(boards::board_get).patch(boards::board_patch).delete(boards::board_delete),
        )
        // Blocks
        .route("/boards/:board_id/blocks", get(blocks::blocks_get).post(blocks::blocks_post))
        .route("/boards/:board_id/blocks/export", get(blocks::export_get))
        .route("/boards/:board_id/blocks/import", post(blocks::import_post))
        .route(
            "/boards/:board_id/blocks/:block_id",
            patch(blocks::block_patch).delete(blocks::block_delete),
        )
        .route("/boards/:board_id/blocks/:block_id/subtree", get(blocks::subtree_get))
        // CSRF runs before the session lookup
        .route_layer(from_fn_with_state(state.clone(), session_middleware))
        .route_layer(from_fn_with_state(state, csrf_middleware))
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    if !config.security.enable_cors {
        return None;
    }

    let origins = &config.security.cors_origins;
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
