use std::sync::Arc;
use std::time::Instant;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};

use super::graphql::{self, AppSchema};
use crate::auth::{ACCESS_TOKEN_HEADER, PasswordHasher, REFRESH_TOKEN_HEADER, Session, SessionKeys};
use crate::config::ServerConfig;
use crate::oauth::OAuthProvider;
use crate::settings::SettingsStore;
use crate::store::Store;
use crate::tokens::{InMemoryTokenStore, ServiceTokens, TokenRefresher};
use crate::workspace::Workspaces;

pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn Store>,
    pub tokens: ServiceTokens,
    pub oauth: Arc<dyn OAuthProvider>,
    pub workspaces: Workspaces,
    pub settings: SettingsStore,
    pub session_keys: SessionKeys,
    pub hasher: PasswordHasher,
    pub schema: AppSchema,
}

impl AppState {
    /// Wires the state from its configuration. `provider` talks to the git
    /// services and refreshes their tokens.
    pub fn new<P>(config: ServerConfig, store: Arc<dyn Store>, provider: Arc<P>) -> Self
    where
        P: OAuthProvider + TokenRefresher + 'static,
    {
        let session_keys = match &config.jwt_secret {
            Some(secret) => SessionKeys::new(secret.as_bytes()),
            None => {
                tracing::warn!(
                    "No JWT secret configured, sessions will not survive a restart"
                );
                SessionKeys::random()
            }
        };

        let refresher: Arc<dyn TokenRefresher> = provider.clone();
        let tokens = ServiceTokens::new(Arc::new(InMemoryTokenStore::new()), refresher);

        Self {
            workspaces: Workspaces::new(config.repositories_dir(), config.git_timeout()),
            settings: SettingsStore::new(config.settings_path()),
            store,
            tokens,
            oauth: provider,
            session_keys,
            hasher: PasswordHasher::new(),
            schema: graphql::build_schema(),
            config,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn graphql_handler(
    State(state): State<Arc<AppState>>,
    session: Session,
    request: GraphQLRequest,
) -> Response {
    let headers = session.reissue_headers();
    let response = graphql::execute(&state, session, request.into_inner()).await;
    (headers, GraphQLResponse::from(response)).into_response()
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            axum::http::HeaderName::from_static(ACCESS_TOKEN_HEADER),
            axum::http::HeaderName::from_static(REFRESH_TOKEN_HEADER),
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/graphql", get(graphiql).post(graphql_handler))
        .layer(middleware::from_fn(log_request))
        .layer(cors)
        .with_state(state)
}
