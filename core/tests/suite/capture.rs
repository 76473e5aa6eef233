use ld_migrate_core::{
    DryRunTransport, MigrateError, MigrationPlan, Migrator, SnapshotDir, SnapshotSource,
    capture_project,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::http_transport;

async fn mount_get(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn captured_snapshot_replays_offline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/projects/demo"))
        .and(query_param("expand", "environments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "demo",
            "name": "Demo",
            "environments": { "items": [
                { "key": "prod", "name": "Production", "color": "000000" },
                { "key": "test", "name": "Test", "color": "ffffff" }
            ] }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/api/v2/segments/demo/prod",
        json!({ "items": [{ "key": "vip", "name": "VIP", "included": ["u1"] }] }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/segments/demo/test"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/api/v2/flags/demo",
        json!({ "items": [{ "key": "f", "name": "F", "variations": [], "environments": { "prod": { "on": true } } }] }),
    )
    .await;
    mount_get(&server, "/api/v2/metrics/demo", json!({ "items": [{ "key": "signup" }] })).await;
    mount_get(
        &server,
        "/api/v2/metrics/demo/signup",
        json!({ "key": "signup", "kind": "pageview", "urls": [{ "kind": "substring", "substring": "/join" }] }),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let store = SnapshotDir::new(dir.path());
    let transport = http_transport(&server);

    let summary = capture_project(&transport, &store, "demo").await.unwrap();

    assert!(!summary.is_complete());
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].resource, "segment-test");
    assert_eq!(summary.written.len(), 5);
    assert_eq!(store.read_project("demo").unwrap().environment_keys(), vec!["prod", "test"]);

    let dry_run = DryRunTransport::new();
    let plan = MigrationPlan {
        source_project: "demo".to_string(),
        destination_project: "demo-copy".to_string(),
    };
    let report = Migrator::new(&store, &dry_run).run(&plan).await.unwrap();

    assert!(!report.needs_review());
    let paths: Vec<String> = dry_run
        .requests()
        .iter()
        .map(|request| format!("{} {}", request.method, request.path))
        .collect();
    assert_eq!(
        paths,
        vec![
            "POST projects",
            "POST segments/demo-copy/prod",
            "PATCH segments/demo-copy/prod/vip",
            "POST flags/demo-copy",
            "PATCH flags/demo-copy/f",
            "POST metrics/demo-copy",
        ]
    );
}

#[tokio::test]
async fn missing_source_project_fails_capture() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = SnapshotDir::new(dir.path());
    let transport = http_transport(&server);

    let err = capture_project(&transport, &store, "nope").await.unwrap_err();

    assert!(matches!(err, MigrateError::ProjectCapture { .. }), "{err}");
}
