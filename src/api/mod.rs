//! HTTP surface.
//!
//! | Route | Command |
//! |---|---|
//! | `POST /api/control/start` | start-all |
//! | `POST /api/control/stop` | stop-all |
//! | `POST /api/control/restart/{name}` | restart |
//! | `POST /api/control/restart-all` | restart-all |
//! | `POST /api/control/monitoring/pause` | pause monitoring |
//! | `POST /api/control/monitoring/resume` | resume monitoring |
//! | `GET /api/control/status` | status |
//! | `GET /api/control/logs?limit=N` | logs (default 100) |
//! | `DELETE /api/control/logs` | clear-logs |
//! | `POST /api/control/diagnostic` | diagnostic |
//! | `GET /api/control/ws?backlog=N` | push channel (default from config, 400 above log capacity) |
//! | `GET /health` | liveness |

mod control;
mod error;
mod ws;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::control::ControlSurface;

pub use error::{ApiError, ApiResult, ErrorResponse};

/// Builds the complete router.
pub fn router(surface: ControlSurface) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/control", control::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(surface)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::extract::{Path, Query, State};
    use axum::response::IntoResponse;

    use super::control::{self, LogsQuery};
    use super::*;
    use crate::collaborators::{Collaborator, Health};
    use crate::config::Config;
    use crate::core::Supervisor;
    use crate::error::CollaboratorError;

    struct Up(&'static str);

    #[async_trait]
    impl Collaborator for Up {
        fn name(&self) -> &str {
            self.0
        }
        async fn probe(&self) -> Health {
            Health::healthy("ok")
        }
        async fn start(&self) -> Result<(), CollaboratorError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    fn surface() -> ControlSurface {
        let cfg = Config {
            restart_all_pause: std::time::Duration::ZERO,
            ..Config::default()
        };
        let sup = Supervisor::builder(cfg)
            .with_collaborator(Arc::new(Up("database")))
            .with_collaborator(Arc::new(Up("catalog")))
            .build()
            .unwrap();
        ControlSurface::new(sup)
    }

    #[tokio::test]
    async fn test_router_builds() {
        let _ = router(surface());
        assert_eq!(health().await.0["status"], "ok");
    }

    #[tokio::test]
    async fn test_restart_unknown_is_404() {
        let err = control::restart(State(surface()), Path("nope".to_string()))
            .await
            .err()
            .unwrap();
        assert_eq!(err, ApiError::not_found("service 'nope'"));
    }

    #[tokio::test]
    async fn test_start_then_logs_with_limit() {
        let s = surface();
        let report = control::start_all(State(s.clone())).await.0;
        assert!(report.success);

        let logs = control::logs(State(s.clone()), Query(LogsQuery { limit: Some(2) })).await.0;
        assert_eq!(logs.len(), 2);
        assert!(logs[0].id > logs[1].id);

        let default = control::logs(State(s.clone()), Query(LogsQuery::default())).await.0;
        assert!(default.len() > 2 && default.len() <= control::DEFAULT_LOG_LIMIT);

        assert!(control::clear_logs(State(s.clone())).await.0.success);
        let after = control::logs(State(s), Query(LogsQuery::default())).await.0;
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn test_backlog_above_log_capacity_is_rejected() {
        let s = surface();
        let capacity = s.supervisor().logs().capacity();

        assert_eq!(ws::resolve_backlog(&s, None), Ok(s.supervisor().config().default_backlog));
        assert_eq!(ws::resolve_backlog(&s, Some(capacity)), Ok(capacity));
        let err = ws::resolve_backlog(&s, Some(usize::MAX)).err().unwrap();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.into_response().status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_restart_all_and_monitoring_routes() {
        let s = surface();
        let report = control::restart_all(State(s.clone())).await.0;
        assert!(report.success);
        assert!(report.stopped.success && report.started.success);

        assert_eq!(control::pause_monitoring(State(s.clone())).await.0.message, "monitoring paused");
        assert_eq!(
            control::pause_monitoring(State(s.clone())).await.0.message,
            "monitoring already paused"
        );
        assert!(!control::status(State(s.clone())).await.0.monitoring);
        assert_eq!(control::resume_monitoring(State(s.clone())).await.0.message, "monitoring resumed");
        assert!(control::status(State(s)).await.0.monitoring);
    }

    #[tokio::test]
    async fn test_status_lists_services() {
        let status = control::status(State(surface())).await.0;
        assert_eq!(status.services.len(), 2);
        let value = serde_json::to_value(&status).unwrap();
        assert!(value["system"]["uptimeSecs"].is_u64());
    }
}
