//! Read-only HTTP API over the notice cache.
//!
//! The handlers only read the cache snapshot; a manual refresh is forwarded
//! to the scheduler so it runs in the task that owns the pipeline.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{Query, Request, State},
    http::{Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use chrono::Utc;
use tokio::net::TcpListener;

use crate::error::{AppError, Result};
use crate::pipeline::{NoticeCache, NoticeFilter, SchedulerHandle};

pub struct AppState {
    pub cache: Arc<NoticeCache>,
    pub scheduler: SchedulerHandle,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(cache: Arc<NoticeCache>, scheduler: SchedulerHandle) -> Self {
        Self {
            cache,
            scheduler,
            started_at: Instant::now(),
        }
    }

    fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/notices", get(list_notices))
        .route("/notices/refresh", get(refresh).post(refresh))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

fn request_line(method: &Method, uri: &Uri) -> String {
    format!("{} {}", method, uri.path())
}

async fn log_request(request: Request, next: Next) -> Response {
    log::info!("{}", request_line(request.method(), request.uri()));
    next.run(request).await
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        log::info!("Query API listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// --- Handlers ---

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /notices?subject=&date= - cached notices, newest first",
            "GET /notices/refresh - refetch the notice list now",
            "GET /stats - cache and delivery counters",
            "GET /health - liveness",
        ],
    }))
}

async fn list_notices(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<NoticeFilter>,
) -> impl IntoResponse {
    Json(state.cache.query(&filter))
}

async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.scheduler.refresh().await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Notices refreshed",
                "updated_at": report.updated_at,
                "total": report.total,
            })),
        ),
        Err(e) => {
            log::error!("Refresh request failed: {}", e);
            let status = match &e {
                AppError::SchedulerClosed => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(serde_json::json!({
                    "error": "Failed to refresh notices",
                    "details": e.to_string(),
                })),
            )
        }
    }
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.cache.stats();
    Json(serde_json::json!({
        "total_notices": stats.total_notices,
        "delivered": stats.delivered,
        "pending": stats.pending,
        "updated_at": stats.updated_at,
        "uptime_secs": state.uptime_secs(),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "uptime_secs": state.uptime_secs(),
        "data_loaded": state.cache.snapshot().updated_at.is_some(),
    }))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use serde_json::Value;

    use super::*;
    use crate::models::{DeliveryConfig, ScheduleConfig};
    use crate::pipeline::{DedupLedger, DeliveryQueue, Pipeline, Scheduler};
    use crate::test_support::{MemoryStore, RecordingTransport, StaticSource, raw_notice};

    struct TestServer {
        addr: SocketAddr,
        source: Arc<StaticSource>,
        cache: Arc<NoticeCache>,
        client: reqwest::Client,
    }

    impl TestServer {
        async fn get(&self, path: &str) -> (u16, Value) {
            let response = self
                .client
                .get(format!("http://{}{}", self.addr, path))
                .send()
                .await
                .unwrap();
            let status = response.status().as_u16();
            (status, response.json().await.unwrap())
        }
    }

    /// Start the API over in-memory doubles; `run_scheduler = false` leaves
    /// the scheduler unstarted so its handle reports it as closed.
    async fn start(run_scheduler: bool) -> TestServer {
        let source = Arc::new(StaticSource::new(vec![
            raw_notice("Redes y Comunicaciones", "Parcial", "03/01/2024 10:00", "<p>a</p>"),
            raw_notice("Algoritmos", "Aula", "02/01/2024", "<p>b</p>"),
        ]));
        let cache = Arc::new(NoticeCache::new());
        let store = Arc::new(MemoryStore::default());
        let pipeline = Pipeline::new(
            source.clone(),
            DedupLedger::load(store).await,
            DeliveryQueue::new(
                Arc::new(RecordingTransport::new()),
                &DeliveryConfig::default(),
                Duration::from_secs(5),
            ),
            cache.clone(),
            "dest",
        );

        let (scheduler, handle) = Scheduler::new(pipeline, ScheduleConfig::default());
        if run_scheduler {
            tokio::spawn(scheduler.run(std::future::pending()));
        } else {
            drop(scheduler);
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(cache.clone(), handle));
        tokio::spawn(serve(listener, state, std::future::pending()));

        TestServer {
            addr,
            source,
            cache,
            client: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let server = start(true).await;
        let (status, body) = server.get("/").await;
        assert_eq!(status, 200);
        assert_eq!(body["name"], "notice-relay");
        assert!(body["endpoints"].as_array().unwrap().len() >= 4);
    }

    #[tokio::test]
    async fn test_refresh_then_query() {
        let server = start(true).await;

        let (status, body) = server.get("/notices").await;
        assert_eq!(status, 200);
        assert_eq!(body["total"], 0);
        assert!(body["updated_at"].is_null());

        let (status, body) = server.get("/notices/refresh").await;
        assert_eq!(status, 200);
        assert_eq!(body["total"], 2);

        let (_, body) = server.get("/notices").await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["notices"][0]["title"], "Parcial");
        assert_eq!(body["notices"][1]["title"], "Aula");
        assert_eq!(body["notices"][0]["body"], "a");

        let (_, body) = server.get("/notices?subject=redes").await;
        assert_eq!(body["total"], 1);

        let (_, body) = server.get("/notices?date=02/01").await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["notices"][0]["subject"], "Algoritmos");
    }

    #[tokio::test]
    async fn test_refresh_accepts_post() {
        let server = start(true).await;
        let response = server
            .client
            .post(format!("http://{}/notices/refresh", server.addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(server.cache.snapshot().notices.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_500() {
        let server = start(true).await;
        server.source.set_failing(true);

        let (status, body) = server.get("/notices/refresh").await;
        assert_eq!(status, 500);
        assert_eq!(body["error"], "Failed to refresh notices");
    }

    #[tokio::test]
    async fn test_refresh_without_scheduler_is_503() {
        let server = start(false).await;
        let (status, _) = server.get("/notices/refresh").await;
        assert_eq!(status, 503);
    }

    #[test]
    fn test_request_line_omits_query() {
        let uri: Uri = "/notices?subject=redes".parse().unwrap();
        assert_eq!(request_line(&Method::GET, &uri), "GET /notices");
    }

    #[tokio::test]
    async fn test_logged_routes_still_respond() {
        let server = start(true).await;
        let (status, body) = server.get("/health").await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_stats_and_health() {
        let server = start(true).await;

        let (_, health) = server.get("/health").await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["data_loaded"], false);

        server.get("/notices/refresh").await;
        server.cache.record_counts(7, 1);

        let (_, stats) = server.get("/stats").await;
        assert_eq!(stats["total_notices"], 2);
        assert_eq!(stats["delivered"], 7);
        assert_eq!(stats["pending"], 1);

        let (_, health) = server.get("/health").await;
        assert_eq!(health["data_loaded"], true);
    }
}
