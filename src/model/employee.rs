use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Biometric-linked subset of an employee record.
///
/// `bio_id` is the numeric user id assigned by the terminal and must be
/// unique across active employees. A row is created inactive when first
/// seen in a device roster and activated exactly once, on the first scan
/// reconciled for that bio id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Employee {
    pub id: u64,

    #[schema(example = 34)]
    pub bio_id: u32,

    #[schema(example = "John Doe")]
    pub display_name: String,

    pub is_active: bool,
}
