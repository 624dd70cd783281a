//! Shared data model for forge.
//!
//! Types in this crate are produced and consumed by every stage of the
//! packaging pipeline: descriptors go into the resolver, resolved manifests
//! come out of it, and content hashes tie bundles to what publication targets
//! already hold.

pub mod descriptor;
pub mod hash;
pub mod manifest;
pub mod types;
pub mod version;

// Re-exports
pub use descriptor::{Developer, Organization, PackageDescriptor, Relocation, VariantSpec};
pub use hash::{ContentHash, HashError};
pub use manifest::{EntrySource, ManifestEntry, ManifestError, Origin, ResolvedManifest};
pub use types::*;
pub use version::{StructuredVersion, VersionError};

/// Manifest path written first into every bundle.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Directory holding service registration files, which merge instead of conflicting.
pub const SERVICES_DIR: &str = "META-INF/services/";
