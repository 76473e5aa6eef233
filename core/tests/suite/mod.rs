use std::path::Path;
use std::time::Duration;

use ld_migrate_core::{HttpTransport, RateLimitedTransport, SnapshotDir};
use serde_json::Value;
use wiremock::MockServer;

mod capture;
mod migration;

pub const API_KEY: &str = "api-test-key";

/// The transport stack the CLI builds, pointed at a mock server.
pub fn http_transport(server: &MockServer) -> RateLimitedTransport<HttpTransport> {
    let base = format!("{}/api/v2", server.uri());
    let http = HttpTransport::new(&base, API_KEY, Duration::from_secs(5)).expect("valid base url");
    RateLimitedTransport::new(http)
}

pub fn write_snapshot(root: &Path, project: &str, files: &[(&str, Value)]) -> SnapshotDir {
    let store = SnapshotDir::new(root);
    for (resource, data) in files {
        store.write_resource(project, resource, data).expect("write fixture");
    }
    store
}

/// `METHOD /path` for every request the server saw, in arrival order.
pub async fn request_log(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| format!("{} {}", request.method, request.url.path()))
        .collect()
}

/// JSON body of the only request matching `method` and `path`.
pub async fn body_of(server: &MockServer, method: &str, path: &str) -> Value {
    let requests = server.received_requests().await.unwrap_or_default();
    let matching: Vec<_> = requests
        .iter()
        .filter(|request| request.method.as_str() == method && request.url.path() == path)
        .collect();
    assert_eq!(matching.len(), 1, "expected one {method} {path}");
    matching[0].body_json().expect("json body")
}
