//! Static asset sets for Strata.
//!
//! A [`Files`] set maps names to asset bytes. Assets are added from an
//! [`Opener`] (inline bytes, a zstd frame, or a disk path) and decoded once;
//! lookups can be redirected to a directory through an environment
//! variable, and names missing from memory can fall back to a directory on
//! disk, optionally cached after first use.

pub mod asset;
pub mod error;
pub mod files;
pub mod opener;

pub use asset::{AssetFile, MemoryFile, StaticFile};
pub use error::{EmbedError, EmbedResult};
pub use files::Files;
pub use opener::Opener;
