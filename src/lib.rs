//! # Dossier
//!
//! A revision-synchronized player profile store for live-service game
//! backends.
//!
//! ## Core Concepts
//!
//! - **Profiles**: Per-account, per-segment documents holding items and
//!   stats, each with a monotonically increasing revision
//! - **Change log**: Every mutation in a request is recorded once; the log
//!   is the diff the client receives
//! - **Sync responses**: Incremental changes when the client is caught up,
//!   one full snapshot when it is not
//! - **Store**: Process-wide cache with lazy loading, per-account locking,
//!   and flush-on-shutdown
//!
//! ## Example
//!
//! ```ignore
//! use dossier::{ItemInput, ProfileStore, ProfileType, StoreConfig};
//!
//! let store = ProfileStore::open_or_create(StoreConfig {
//!     path: "./profiles".into(),
//!     ..Default::default()
//! })?;
//!
//! let handle = store.get("account-id")?;
//! let mut player = handle.lock();
//!
//! // Grant 100 gold
//! let profile = player.profile_mut(ProfileType::Profile0);
//! profile.add_item(ItemInput::new("Currency:Gold", 100));
//!
//! // Answer the client that last saw revision 0
//! let response = player.construct_response(ProfileType::Profile0, 0, &[], false)?;
//! ```

pub mod error;
pub mod loot;
pub mod profile;
pub mod storage;
pub mod store;
pub mod sync;
pub mod types;

// Re-exports
pub use error::{ProfileError, Result};
pub use loot::{advance_streak, PityRoll};
pub use profile::{ItemCollection, NotificationQueue, PlayerProfile, Profile, StatTable};
pub use storage::ProfileStorage;
pub use store::{ProfileStore, StoreConfig};
pub use sync::{ChangeLog, MultiUpdate, SyncMode, SyncResponse, RESPONSE_VERSION};
pub use types::*;
