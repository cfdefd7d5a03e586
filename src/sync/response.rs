//! Wire-level synchronization response types.

use crate::types::{ChangeRecord, Notification, ProfileType, Revision};
use serde::{Deserialize, Serialize};

/// Protocol version tag carried on every response.
pub const RESPONSE_VERSION: u32 = 1;

/// The response a gameplay handler returns verbatim as JSON.
///
/// `profile_changes` brings the client from `profile_changes_base_revision`
/// up to `profile_revision`; `multi_update` carries the same for any other
/// segment the request happened to touch.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub profile_revision: Revision,
    pub profile_id: ProfileType,
    pub profile_changes_base_revision: Revision,
    pub profile_changes: Vec<ChangeRecord>,
    pub profile_command_revision: u64,
    pub server_time: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub multi_update: Vec<MultiUpdate>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notifications: Vec<Notification>,
    pub response_version: u32,
}

/// Update rider for a non-addressed segment mutated during the request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiUpdate {
    pub profile_revision: Revision,
    pub profile_id: ProfileType,
    pub profile_changes_base_revision: Revision,
    pub profile_changes: Vec<ChangeRecord>,
    pub profile_command_revision: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notifications: Vec<Notification>,
}
