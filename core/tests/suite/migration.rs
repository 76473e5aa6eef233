use ld_migrate_core::report::EntityKind;
use ld_migrate_core::{DryRunTransport, MigrateError, MigrationPhase, MigrationPlan, Migrator};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{API_KEY, body_of, http_transport, request_log, write_snapshot};

fn demo_snapshot() -> Vec<(&'static str, Value)> {
    vec![
        (
            "project",
            json!({
                "key": "demo",
                "name": "Demo",
                "tags": ["web"],
                "environments": { "items": [
                    { "key": "prod", "name": "Production", "color": "417505", "_id": "env1", "apiKey": "sdk-x" }
                ] }
            }),
        ),
        (
            "segment-prod",
            json!({ "items": [
                {
                    "key": "internal-users",
                    "name": "Internal users",
                    "unbounded": false,
                    "included": ["user1"],
                    "version": 4,
                    "rules": [{
                        "_id": "rule1",
                        "generation": 2,
                        "clauses": [{ "_id": "abc", "attribute": "email", "op": "endsWith", "values": ["@demo.io"], "negate": false }]
                    }]
                },
                { "key": "synced-cohort", "name": "Synced", "unbounded": true }
            ] }),
        ),
        (
            "flag",
            json!({ "items": [{
                "key": "new-checkout",
                "name": "New checkout",
                "variations": [
                    { "_id": "v1", "value": true, "name": "on" },
                    { "_id": "v2", "value": false, "name": "off" }
                ],
                "temporary": true,
                "clientSideAvailability": { "usingMobileKey": false, "usingEnvironmentId": true },
                "environments": {
                    "prod": {
                        "on": true,
                        "salt": "abc123",
                        "version": 12,
                        "lastModified": 1700000000000u64,
                        "_site": { "href": "/x" },
                        "rules": [{
                            "_id": "r1",
                            "variation": 0,
                            "clauses": [{ "_id": "c1", "attribute": "country", "op": "in", "values": ["NZ"], "negate": false }]
                        }],
                        "fallthrough": { "variation": 1 }
                    },
                    "staging": { "on": false }
                }
            }] }),
        ),
        (
            "metrics",
            json!({ "items": [{ "key": "signup" }, { "key": "cta-click" }] }),
        ),
        (
            "metrics-signup",
            json!({
                "key": "signup",
                "kind": "custom",
                "eventKey": "signed-up",
                "isNumeric": true,
                "unit": "users",
                "successCriteria": "HigherThanBaseline",
                "_id": "m1"
            }),
        ),
        (
            "metrics-cta-click",
            json!({
                "key": "cta-click",
                "kind": "click",
                "selector": ".buy-now",
                "urls": [{ "kind": "exact", "url": "https://demo.io/cart" }],
                "eventKey": "ignored",
                "isNumeric": false
            }),
        ),
    ]
}

fn plan() -> MigrationPlan {
    MigrationPlan {
        source_project: "demo".to_string(),
        destination_project: "demo-copy".to_string(),
    }
}

async fn mount_created_project(server: &MockServer, key: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v2/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "key": key,
            "environments": { "items": [{ "key": "prod", "_id": "new-env" }] }
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn demo_project_is_replayed_into_destination() {
    let server = MockServer::start().await;
    mount_created_project(&server, "demo-copy").await;
    Mock::given(method("POST"))
        .and(path("/api/v2/segments/demo-copy/prod"))
        .and(header("Authorization", API_KEY))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/segments/demo-copy/prod/internal-users"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/flags/demo-copy"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/flags/demo-copy/new-checkout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/metrics/demo-copy"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = write_snapshot(dir.path(), "demo", &demo_snapshot());
    let transport = http_transport(&server);

    let report = Migrator::new(&store, &transport).run(&plan()).await.unwrap();

    assert_eq!(report.phase, MigrationPhase::Done);
    assert!(!report.needs_review(), "review: {:?}", report.review);
    assert_eq!(report.environments, vec!["prod".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key, "synced-cohort");
    assert_eq!(report.stats.segments.created, 1);
    assert_eq!(report.stats.segments.patched, 1);
    assert_eq!(report.stats.flags.patched, 1);
    assert_eq!(report.stats.metrics.created, 2);

    assert_eq!(
        request_log(&server).await,
        vec![
            "POST /api/v2/projects",
            "POST /api/v2/segments/demo-copy/prod",
            "PATCH /api/v2/segments/demo-copy/prod/internal-users",
            "POST /api/v2/flags/demo-copy",
            "PATCH /api/v2/flags/demo-copy/new-checkout",
            "POST /api/v2/metrics/demo-copy",
            "POST /api/v2/metrics/demo-copy",
        ]
    );

    assert_eq!(
        body_of(&server, "POST", "/api/v2/projects").await,
        json!({
            "key": "demo-copy",
            "name": "Demo",
            "tags": ["web"],
            "environments": [{ "name": "Production", "key": "prod", "color": "417505" }]
        })
    );

    assert_eq!(
        body_of(&server, "PATCH", "/api/v2/segments/demo-copy/prod/internal-users").await,
        json!([
            { "path": "/included", "op": "add", "value": ["user1"] },
            {
                "path": "/rules/-",
                "op": "add",
                "value": {
                    "clauses": [{ "attribute": "email", "op": "endsWith", "values": ["@demo.io"], "negate": false }]
                }
            }
        ])
    );

    let flag = body_of(&server, "POST", "/api/v2/flags/demo-copy").await;
    assert_eq!(
        flag["variations"],
        json!([{ "value": true, "name": "on" }, { "value": false, "name": "off" }])
    );
    assert_eq!(
        flag["clientSideAvailability"],
        json!({ "usingMobileKey": false, "usingEnvironmentId": true })
    );
    assert!(flag.get("environments").is_none());

    // Only the destination's environments are patched, in one request.
    assert_eq!(
        body_of(&server, "PATCH", "/api/v2/flags/demo-copy/new-checkout").await,
        json!([
            { "path": "/environments/prod/on", "op": "replace", "value": true },
            {
                "path": "/environments/prod/rules/-",
                "op": "add",
                "value": {
                    "variation": 0,
                    "clauses": [{ "attribute": "country", "op": "in", "values": ["NZ"], "negate": false }]
                }
            },
            { "path": "/environments/prod/fallthrough", "op": "replace", "value": { "variation": 1 } }
        ])
    );

    let metrics: Vec<Value> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/api/v2/metrics/demo-copy")
        .map(|request| request.body_json().unwrap())
        .collect();
    assert_eq!(
        metrics,
        vec![
            json!({
                "key": "signup",
                "kind": "custom",
                "eventKey": "signed-up",
                "isNumeric": true,
                "unit": "users",
                "successCriteria": "HigherThanBaseline"
            }),
            json!({
                "key": "cta-click",
                "kind": "click",
                "urls": [{ "kind": "exact", "url": "https://demo.io/cart" }],
                "selector": ".buy-now"
            }),
        ]
    );
}

#[tokio::test]
async fn later_phases_use_the_key_the_destination_assigned() {
    let server = MockServer::start().await;
    mount_created_project(&server, "demo-copy-1").await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = write_snapshot(dir.path(), "demo", &demo_snapshot());
    let transport = http_transport(&server);

    let report = Migrator::new(&store, &transport).run(&plan()).await.unwrap();

    assert_eq!(report.destination_project, "demo-copy-1");
    let log = request_log(&server).await;
    assert_eq!(log.len(), 7);
    assert!(log[1..].iter().all(|line| line.contains("/demo-copy-1")), "{log:?}");
}

#[tokio::test]
async fn failed_project_creation_stops_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/projects"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "code": "conflict" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = write_snapshot(dir.path(), "demo", &demo_snapshot());
    let transport = http_transport(&server);

    let err = Migrator::new(&store, &transport)
        .run(&plan())
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::ProjectCreation { .. }), "{err}");
    assert_eq!(request_log(&server).await, vec!["POST /api/v2/projects"]);
}

#[tokio::test]
async fn rejected_entities_are_listed_and_the_run_continues() {
    let server = MockServer::start().await;
    mount_created_project(&server, "demo-copy").await;
    Mock::given(method("POST"))
        .and(path("/api/v2/segments/demo-copy/prod"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/v2/flags/demo-copy/new-checkout"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(201))
        .with_priority(10)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = write_snapshot(dir.path(), "demo", &demo_snapshot());
    let transport = http_transport(&server);

    let report = Migrator::new(&store, &transport).run(&plan()).await.unwrap();

    assert_eq!(report.phase, MigrationPhase::Done);
    assert_eq!(report.review.keys(), vec!["internal-users", "new-checkout"]);
    assert_eq!(report.review.entries()[0].kind, EntityKind::Segment);
    assert_eq!(report.review.entries()[0].environment.as_deref(), Some("prod"));
    assert_eq!(report.stats.metrics.created, 2);
}

#[tokio::test]
async fn missing_snapshot_files_are_treated_as_empty() {
    let server = MockServer::start().await;
    mount_created_project(&server, "demo-copy").await;

    let dir = TempDir::new().unwrap();
    let files: Vec<_> = demo_snapshot()
        .into_iter()
        .filter(|(resource, _)| *resource == "project")
        .collect();
    let store = write_snapshot(dir.path(), "demo", &files);
    let transport = http_transport(&server);

    let report = Migrator::new(&store, &transport).run(&plan()).await.unwrap();

    assert_eq!(report.phase, MigrationPhase::Done);
    assert!(!report.needs_review());
    assert_eq!(request_log(&server).await, vec!["POST /api/v2/projects"]);
}

#[tokio::test]
async fn malformed_entries_are_reviewed_and_siblings_still_migrate() {
    let dir = TempDir::new().unwrap();
    let store = write_snapshot(
        dir.path(),
        "demo",
        &[
            (
                "project",
                json!({ "key": "demo", "name": "Demo", "environments": [{ "key": "prod", "name": "Production" }] }),
            ),
            (
                "segment-prod",
                json!({ "items": [
                    { "key": "good-seg", "name": "Good", "included": ["u1"] },
                    { "key": "bad-seg", "name": "Bad", "rules": [{ "_id": "r1", "variation": 0 }] }
                ] }),
            ),
            (
                "flag",
                json!({ "items": [
                    { "key": "good-flag", "name": "Good", "environments": { "prod": { "on": true } } },
                    { "key": "null-tags", "name": "Null tags", "tags": null, "variations": null },
                    { "key": "bad-flag", "name": 7 }
                ] }),
            ),
            ("metrics", json!({ "items": [{ "key": "signup" }, { "key": 5 }] })),
            ("metrics-signup", json!({ "key": "signup", "kind": "pageview", "urls": [] })),
        ],
    );
    let transport = DryRunTransport::new();

    let report = Migrator::new(&store, &transport).run(&plan()).await.unwrap();

    let paths: Vec<String> = transport
        .requests()
        .iter()
        .map(|request| format!("{} {}", request.method, request.path))
        .collect();
    assert_eq!(
        paths,
        vec![
            "POST projects",
            "POST segments/demo-copy/prod",
            "PATCH segments/demo-copy/prod/good-seg",
            "POST flags/demo-copy",
            "POST flags/demo-copy",
            "PATCH flags/demo-copy/good-flag",
            "POST metrics/demo-copy",
        ]
    );
    assert_eq!(report.phase, MigrationPhase::Done);
    assert!(report.needs_review());
    assert_eq!(report.review.keys(), vec!["bad-seg", "bad-flag", "#1"]);
    assert_eq!(report.review.entries()[0].kind, EntityKind::Segment);
    assert_eq!(report.review.entries()[0].environment.as_deref(), Some("prod"));
    assert_eq!(report.review.entries()[2].kind, EntityKind::Metric);
    assert_eq!(report.stats.segments.rejected, 1);
    assert_eq!(report.stats.flags.created, 2);
    assert_eq!(report.stats.flags.rejected, 1);
    assert_eq!(report.stats.metrics.rejected, 1);
}
