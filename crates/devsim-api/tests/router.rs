//! Requests through the full router, middleware included.

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use devsim_api::{ServerState, create_router};
use devsim_core::config::ServiceConfig;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{create_test_server, custom_model_json, simulation_json, wait_running};

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn send_raw(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn assert_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], code);
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_status_route() {
    let server = create_test_server().await;
    let app = create_router(server.state.clone());

    let (status, body) = send(&app, Method::GET, "/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    for key in ["Name", "Status", "Uptime", "Version", "Properties"] {
        assert!(body.get(key).is_some(), "missing {key}");
    }
    assert!(body["Status"].as_str().unwrap().starts_with("OK"));
}

#[tokio::test]
async fn test_device_model_routes() {
    let server = create_test_server().await;
    let app = create_router(server.state.clone());

    let (status, body) = send(&app, Method::GET, "/v1/devicemodels", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Items"].as_array().unwrap().len(), 10);

    let (status, created) =
        send(&app, Method::POST, "/v1/devicemodels", Some(custom_model_json())).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["Id"].as_str().unwrap().to_string();
    let etag = created["ETag"].as_str().unwrap().to_string();
    assert!(!etag.is_empty());
    assert_eq!(created["Protocol"], "AMQP");

    let uri = format!("/v1/devicemodels/{id}");
    let (status, fetched) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let mut edit = created.clone();
    edit["Name"] = json!("Elevator v2");
    let (status, updated) = send(&app, Method::PUT, &uri, Some(edit.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(updated["ETag"], created["ETag"]);

    let (status, body) = send(&app, Method::PUT, &uri, Some(edit)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error(&body, "CONFLICT");

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");
}

#[tokio::test]
async fn test_device_model_validation_and_protection() {
    let server = create_test_server().await;
    let app = create_router(server.state.clone());

    let mut missing_protocol = custom_model_json();
    missing_protocol.as_object_mut().unwrap().remove("Protocol");
    let (status, body) =
        send(&app, Method::POST, "/v1/devicemodels", Some(missing_protocol)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");

    let mut unknown_protocol = custom_model_json();
    unknown_protocol["Protocol"] = json!("CoAP");
    let (status, body) =
        send(&app, Method::POST, "/v1/devicemodels", Some(unknown_protocol)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");

    let mut no_telemetry = custom_model_json();
    no_telemetry["Telemetry"] = json!([]);
    let (status, _) = send(&app, Method::POST, "/v1/devicemodels", Some(no_telemetry)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_raw(&app, Method::POST, "/v1/devicemodels", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");

    let (status, body) = send(&app, Method::DELETE, "/v1/devicemodels/chiller-01", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error(&body, "FORBIDDEN");

    let (_, list) = send(&app, Method::GET, "/v1/devicemodels", None).await;
    assert_eq!(list["Items"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_simulation_routes() {
    let server = create_test_server().await;
    let app = create_router(server.state.clone());

    let (status, default) = send(&app, Method::GET, "/v1/simulations/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(default["Id"], "1");

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/simulations?template=default",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error(&body, "CONFLICT");

    let (status, created) = send(
        &app,
        Method::POST,
        "/v1/simulations",
        Some(simulation_json(json!([{ "Id": "truck-01", "Count": 5 }]))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["Id"].as_str().unwrap().to_string();
    let uri = format!("/v1/simulations/{id}");

    let (status, list) = send(&app, Method::GET, "/v1/simulations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["Items"].as_array().unwrap().len(), 2);

    let (status, enabled) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({ "ETag": created["ETag"], "Enabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(enabled["Enabled"], true);

    let running = wait_running(&server.state, &id).await;
    assert!(matches!(
        running,
        devsim_devices::ProvisioningStatus::Running { devices: 5, .. }
    ));
    let (status, body) = send(&app, Method::GET, &format!("{uri}/status"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Status"], "Running");
    assert_eq!(body["Devices"], 5);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({ "ETag": created["ETag"], "Enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error(&body, "CONFLICT");

    let mut replacement = enabled.clone();
    replacement["DeviceModels"] = json!([{ "Id": "truck-01", "Count": 2 }]);
    let (status, replaced) = send(&app, Method::PUT, &uri, Some(replacement)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["DeviceModels"][0]["Count"], 2);

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error(&body, "NOT_FOUND");
    let (status, _) = send(&app, Method::GET, &format!("{uri}/status"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_simulation_validation_errors() {
    let server = create_test_server().await;
    let app = create_router(server.state.clone());

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/simulations",
        Some(simulation_json(json!([]))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");

    let mut bad_time = simulation_json(json!([{ "Id": "truck-01", "Count": 1 }]));
    bad_time["StartTime"] = json!("invalid time");
    let (status, _) = send(&app, Method::POST, "/v1/simulations", Some(bad_time)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut reversed = simulation_json(json!([{ "Id": "truck-01", "Count": 1 }]));
    reversed["StartTime"] = json!("NOW+P1D");
    reversed["EndTime"] = json!("NOW");
    let (status, _) = send(&app, Method::POST, "/v1/simulations", Some(reversed)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/simulations?template=nope",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error(&body, "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/v1/simulations/1",
        Some(json!({ "ETag": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/v1/simulations/ghost",
        Some(json!({ "ETag": "x", "Enabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, Method::GET, "/v1/simulations", None).await;
    assert_eq!(list["Items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_state_over_data_directory_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        data_dir: dir.path().join("nested"),
        ..common::test_config()
    };

    let id = {
        let state = ServerState::new(&config).await.unwrap();
        state.initialize(&config).await.unwrap();
        let app = create_router(state.clone());
        let (status, created) =
            send(&app, Method::POST, "/v1/devicemodels", Some(custom_model_json())).await;
        assert_eq!(status, StatusCode::OK);
        state.provisioner.shutdown().await;
        created["Id"].as_str().unwrap().to_string()
    };

    let state = ServerState::new(&config).await.unwrap();
    state.initialize(&config).await.unwrap();
    let app = create_router(state);
    let (status, fetched) =
        send(&app, Method::GET, &format!("/v1/devicemodels/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["Name"], "Elevator");

    let (_, simulations) = send(&app, Method::GET, "/v1/simulations", None).await;
    assert_eq!(simulations["Items"].as_array().unwrap().len(), 1);
}
