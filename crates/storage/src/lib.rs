//! Filesystem storage engine for Pository.
//!
//! Sole owner of the on-disk data tree:
//!
//! ```text
//! <repo>/
//!   index.json
//!   <distribution>/<component>/<architecture>/<name>/<version>/
//!     package.deb
//!     metadata.json
//! ```
//!
//! All writes go through temporary siblings renamed into place, and the
//! per-repo index is only updated in memory after its on-disk replacement
//! has landed, so readers observe either the prior state or the new state
//! of an upload, never a mix.

pub mod engine;
pub mod error;
pub mod events;
pub mod index;

pub use engine::{PackageFilters, PackageStore, StorageStats};
pub use error::{StorageError, StorageResult};
pub use events::{EventBus, IndexChanged};
pub use index::RepoIndex;
