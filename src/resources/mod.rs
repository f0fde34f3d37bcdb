//! Local resource files kept in sync with a remote manifest.

mod manifest;
mod sync;

pub use manifest::{md5_hex, LocalState, ManifestEntry};
pub use sync::{ManifestError, ResourceSync, SyncReport};
