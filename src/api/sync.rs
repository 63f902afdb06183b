use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::SyncError;
use crate::model::DeviceSyncStatus;
use crate::recon::SyncSummary;
use crate::scheduler::SyncScheduler;

#[derive(Serialize, ToSchema)]
pub struct RosterSyncResponse {
    /// Employees newly created (inert) from the device roster.
    pub created: u32,
}

fn error_response(e: SyncError) -> HttpResponse {
    match &e {
        SyncError::DeviceNotFound(id) => HttpResponse::NotFound().json(serde_json::json!({
            "message": format!("Device {id} not found")
        })),
        SyncError::DeviceUnreachable(msg) => {
            HttpResponse::BadGateway().json(serde_json::json!({
                "message": format!("Device unreachable: {msg}")
            }))
        }
        _ => {
            tracing::error!(error = %e, "Sync request failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "message": "Internal Server Error"
            }))
        }
    }
}

/// Force a full sync of one device now
#[utoipa::path(
    post,
    path = "/api/devices/{id}/sync",
    params(
        ("id" = u64, Path, description = "Device id")
    ),
    responses(
        (status = 200, description = "Sync completed", body = SyncSummary),
        (status = 404, description = "Device not found"),
        (status = 502, description = "Device unreachable"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Device Sync"
)]
pub async fn trigger_sync(
    path: web::Path<u64>,
    scheduler: web::Data<Arc<SyncScheduler>>,
) -> actix_web::Result<impl Responder> {
    let device_id = path.into_inner();

    // Operator path: roster sync first, wide look-back window.
    match scheduler.sync_device(device_id, true).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(summary)),
        Err(e) => Ok(error_response(e)),
    }
}

/// Pull the user roster from one device now
#[utoipa::path(
    post,
    path = "/api/devices/{id}/sync-users",
    params(
        ("id" = u64, Path, description = "Device id")
    ),
    responses(
        (status = 200, description = "Roster synced", body = RosterSyncResponse),
        (status = 404, description = "Device not found"),
        (status = 502, description = "Device unreachable"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Device Sync"
)]
pub async fn sync_users(
    path: web::Path<u64>,
    scheduler: web::Data<Arc<SyncScheduler>>,
) -> actix_web::Result<impl Responder> {
    let device_id = path.into_inner();

    match scheduler.sync_roster(device_id).await {
        Ok(created) => Ok(HttpResponse::Ok().json(RosterSyncResponse { created })),
        Err(e) => Ok(error_response(e)),
    }
}

/// Sync health for all active devices
#[utoipa::path(
    get,
    path = "/api/devices/sync-status",
    responses(
        (status = 200, description = "Per-device sync health", body = [DeviceSyncStatus]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Device Sync"
)]
pub async fn sync_status(
    scheduler: web::Data<Arc<SyncScheduler>>,
) -> actix_web::Result<impl Responder> {
    match scheduler.status().await {
        Ok(statuses) => Ok(HttpResponse::Ok().json(statuses)),
        Err(e) => Ok(error_response(e)),
    }
}
