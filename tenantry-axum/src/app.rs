use axum::middleware;
use axum::routing::get;
use axum::Router;
use tenantry_core::config::{HTTP_HOST, HTTP_PORT};
use tenantry_core::TenantryApp;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::rest;
use crate::tenant::resolve_tenant;
use crate::TenantryState;

/// An HTTP surface over a [`TenantryApp`].
///
/// Routes:
/// - `GET /health`
/// - `/resumes/...` (tenant-scoped, see [`rest::resume_router`])
#[derive(Clone)]
pub struct AxumApp {
    pub app: TenantryApp,
    pub router: Router<()>,
}

impl AxumApp {
    pub fn new(app: TenantryApp) -> Self {
        let state = TenantryState::new(app.clone());

        let tenant_scoped = Router::new()
            .nest("/resumes", rest::resume_router(state.clone()))
            .layer(middleware::from_fn_with_state(state, resolve_tenant));

        let router = Router::new()
            .route("/health", get(|| async { "ok" }))
            .merge(tenant_scoped)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            );

        Self { app, router }
    }

    /// Mount extra (tenant-agnostic) routes.
    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    /// `http.host:http.port` from config, defaulting to `127.0.0.1:3000`.
    pub fn bind_address(&self) -> String {
        let host = self
            .app
            .get(HTTP_HOST)
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = self.app.get(HTTP_PORT).unwrap_or_else(|| "3000".to_string());
        format!("{host}:{port}")
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = ?listener.local_addr().ok(), "tenantry listening");
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

pub fn axum(app: TenantryApp) -> AxumApp {
    AxumApp::new(app)
}
