//! Packaging and publication engine.
//!
//! A run resolves a [`PackageDescriptor`](forge_schema::PackageDescriptor)
//! into one manifest per variant, assembles each manifest into a
//! reproducible jar and hands every jar to every configured publication
//! target.

pub mod assembler;
pub mod bundle;
pub mod config;
pub mod error;
pub mod lookup;
pub mod pipeline;
pub mod pom;
pub mod relocate;
pub mod reporter;
pub mod resolver;
pub mod targets;

pub use assembler::{Assembler, AssemblyError, EntryTransform};
pub use bundle::{Bundle, BundleId, CoordinateError};
pub use config::{ForgeConfig, TargetConfig};
pub use error::{ConfigError, PipelineError};
pub use lookup::{ArtifactLookup, DirectoryLookup, FileSet, LookupError, MemoryLookup};
pub use pipeline::{Pipeline, PublishPlan, RetryPolicy, RunReport};
pub use reporter::{NullReporter, Reporter};
pub use resolver::{MergeablePaths, Resolution, Resolver, ServiceFiles};
pub use targets::{Outcome, PublicationTarget};

/// User Agent string for outbound requests
pub const USER_AGENT: &str = concat!("forge-core/", env!("CARGO_PKG_VERSION"));
