//! Read-only introspection HTTP server: `GET /tasks` lists every
//! configured room and its current supervisor status.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use tracing::info;

use crate::fleet::FleetHandle;

pub fn router(fleet: FleetHandle) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks))
        .with_state(fleet)
}

async fn list_tasks(State(fleet): State<FleetHandle>) -> Json<Vec<rec_protocol::TaskInfoDto>> {
    Json(fleet.snapshot())
}

/// Bind and serve the introspection endpoint until `cancel` fires.
pub async fn serve(
    bind: SocketAddr,
    fleet: FleetHandle,
    cancel: tokio_util::sync::CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "status_http: listening");
    axum::serve(listener, router(fleet))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DownloadConfig, TaskConfig, TransportConfig, WatchConfig};
    use crate::fleet::Fleet;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_config(room_id: u64) -> TaskConfig {
        TaskConfig {
            room_id,
            transport: TransportConfig::default_transport(),
            download: DownloadConfig {
                save_directory: ".".to_owned(),
                disk_write_buffer_bytes: 4096,
                use_special_ext_name_when_downloading: false,
            },
            watch: WatchConfig::default(),
        }
    }

    #[tokio::test]
    async fn tasks_endpoint_lists_configured_rooms() {
        let fleet = Fleet::new(vec![test_config(7)]);
        let app = router(fleet.handle());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/tasks")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let rooms: Vec<rec_protocol::TaskInfoDto> = serde_json::from_slice(&body).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].live_room.id, 7);
        assert_eq!(rooms[0].status, "NotStarted");
    }
}
