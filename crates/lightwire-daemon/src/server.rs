//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use lightwire_transport::EventReceiver;

use crate::api;
use crate::state::AppState;
use crate::ws;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // API routes
        .route("/api/shadow", get(api::get_shadow))
        .route(
            "/api/resources",
            get(api::list_resources).delete(api::remove_resource),
        )
        .route("/api/desired", post(api::apply_desired))
        .route("/api/discover", post(api::trigger_discover))
        .route("/api/simulator", post(api::control_simulator))
        // WebSocket for shadow updates
        .route("/ws", get(ws::websocket_handler))
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the background tasks and the web server
pub async fn run(state: Arc<AppState>, events: EventReceiver, bind: &str) -> Result<()> {
    let app = router(state.clone());

    // Transport event loop
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.run(events).await;
        tracing::error!("Transport event loop exited");
    });

    // Periodic discovery
    let pipeline = state.pipeline.clone();
    let interval = state.config.daemon.discovery_interval();
    tokio::spawn(async move {
        pipeline.run_discovery(interval).await;
    });

    // Stale-entry sweeps
    let sweeper = state.sweeper.clone();
    tokio::spawn(async move {
        sweeper.run().await;
    });

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use lightwire_transport::{LightLayout, SimulatedLight};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn discovered_state(temp_dir: &TempDir) -> Arc<AppState> {
        let mut config = Config::default();
        config.names.path = temp_dir
            .path()
            .join("names.json")
            .to_string_lossy()
            .into_owned();
        config.simulator.lights = vec![
            SimulatedLight::new("Porch", LightLayout::Monolithic).with_state(true, 40),
            SimulatedLight::new("Attic", LightLayout::Monolithic),
        ];

        let (state, mut events) = AppState::new(config).await.unwrap();
        state.pipeline.discover();
        state.pipeline.drain(&mut events).await;
        state
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_shadow_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let state = discovered_state(&temp_dir).await;

        let request = Request::get("/api/shadow").body(Body::empty()).unwrap();
        let (status, body) = send(router(state), request).await;

        assert_eq!(status, StatusCode::OK);
        let lights = body["lightDevices"].as_array().unwrap();
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0]["name"], "Attic");
        assert_eq!(lights[1]["name"], "Porch");
        assert_eq!(lights[1]["powerOn"], json!(true));
        assert_eq!(lights[1]["brightness"], json!(40));
    }

    #[tokio::test]
    async fn test_desired_unknown_light_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let state = discovered_state(&temp_dir).await;

        let request = json_request(
            "POST",
            "/api/desired",
            json!({ "uri": "/a/light/missing", "powerOn": true }),
        );
        let (status, body) = send(router(state), request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_desired_power_is_written() {
        let temp_dir = TempDir::new().unwrap();
        let state = discovered_state(&temp_dir).await;
        let uri = state.snapshot().await.light_devices[0].uri.clone();

        let request = json_request(
            "POST",
            "/api/desired",
            json!({ "uri": uri, "powerOn": true, "brightness": 150 }),
        );
        let (status, body) = send(router(state.clone()), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["issued"].as_array().unwrap().len(), 1);
        let light = state.network.light(&uri).unwrap();
        assert!(light.power_on);
        assert_eq!(light.brightness, 100);
    }

    #[tokio::test]
    async fn test_remove_resource() {
        let temp_dir = TempDir::new().unwrap();
        let state = discovered_state(&temp_dir).await;
        let uri = state.snapshot().await.light_devices[0].uri.clone();

        let request = json_request("DELETE", "/api/resources", json!({ "uri": uri }));
        let (status, body) = send(router(state.clone()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], json!([uri]));
        assert_eq!(state.snapshot().await.light_devices.len(), 1);

        let request = json_request("DELETE", "/api/resources", json!({ "uri": uri }));
        let (status, _) = send(router(state), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_resources() {
        let temp_dir = TempDir::new().unwrap();
        let state = discovered_state(&temp_dir).await;

        let request = Request::get("/api/resources").body(Body::empty()).unwrap();
        let (status, body) = send(router(state), request).await;

        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e["kind"] == "light"));
    }
}
