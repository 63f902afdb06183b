use utoipa::OpenApi;

use crate::api::sync::RosterSyncResponse;
use crate::model::{DeviceSyncStatus, SyncStatus};
use crate::recon::SyncSummary;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::sync::trigger_sync,
        crate::api::sync::sync_users,
        crate::api::sync::sync_status,
    ),
    components(schemas(
        SyncSummary,
        RosterSyncResponse,
        DeviceSyncStatus,
        SyncStatus,
    )),
    tags(
        (name = "Device Sync", description = "Biometric device synchronization")
    )
)]
pub struct ApiDoc;
