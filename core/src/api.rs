//! Destination and source API endpoints, relative to `/api/v2`.

use serde::Serialize;

use crate::error::TransportError;
use crate::patch::PatchOperation;
use crate::transport::ApiRequest;

pub fn create_project<B: Serialize>(body: &B) -> Result<ApiRequest, TransportError> {
    ApiRequest::post("projects", body)
}

pub fn create_segment<B: Serialize>(
    project: &str,
    environment: &str,
    body: &B,
) -> Result<ApiRequest, TransportError> {
    ApiRequest::post(format!("segments/{project}/{environment}"), body)
}

pub fn patch_segment(
    project: &str,
    environment: &str,
    segment: &str,
    ops: &[PatchOperation],
) -> Result<ApiRequest, TransportError> {
    ApiRequest::patch(format!("segments/{project}/{environment}/{segment}"), &ops)
}

pub fn create_flag<B: Serialize>(project: &str, body: &B) -> Result<ApiRequest, TransportError> {
    ApiRequest::post(format!("flags/{project}"), body)
}

pub fn patch_flag(
    project: &str,
    flag: &str,
    ops: &[PatchOperation],
) -> Result<ApiRequest, TransportError> {
    ApiRequest::patch(format!("flags/{project}/{flag}"), &ops)
}

pub fn create_metric<B: Serialize>(project: &str, body: &B) -> Result<ApiRequest, TransportError> {
    ApiRequest::post(format!("metrics/{project}"), body)
}

pub fn get_project(project: &str) -> ApiRequest {
    ApiRequest::get(format!("projects/{project}?expand=environments"))
}

pub fn list_segments(project: &str, environment: &str) -> ApiRequest {
    ApiRequest::get(format!("segments/{project}/{environment}"))
}

pub fn list_flags(project: &str) -> ApiRequest {
    ApiRequest::get(format!("flags/{project}?summary=false"))
}

pub fn list_metrics(project: &str) -> ApiRequest {
    ApiRequest::get(format!("metrics/{project}"))
}

pub fn get_metric(project: &str, metric: &str) -> ApiRequest {
    ApiRequest::get(format!("metrics/{project}/{metric}"))
}
