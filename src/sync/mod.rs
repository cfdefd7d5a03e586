//! Revision synchronization: change accumulation, sync-mode
//! classification, and the wire response shape.

pub mod changelog;
pub mod response;

pub use changelog::{classify, ChangeLog, SyncMode};
pub use response::{MultiUpdate, SyncResponse, RESPONSE_VERSION};
