//! Bundle assembly: resolved manifest in, reproducible jar out.
//!
//! The archive always starts with a generated `META-INF/MANIFEST.MF`,
//! followed by the manifest entries in order, each passed through the
//! registered [`EntryTransform`]s. Timestamps, permissions and compression are
//! fixed so that the same manifest always yields byte-identical archives.

use std::io::{Cursor, Write};
use std::sync::Arc;

use bytes::Bytes;
use forge_schema::{
    EntryPath, EntrySource, MANIFEST_PATH, ManifestEntry, ManifestError, Origin, ResolvedManifest,
    VariantName,
};
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::bundle::{Bundle, BundleId};

/// Jar manifests wrap at 72 bytes per line, CRLF excluded.
const MAX_LINE: usize = 72;

/// Header recording which variant a bundle was built from.
pub const VARIANT_HEADER: &str = "X-Forge-Variant";

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Failed to write archive: {0}")]
    WriteFailure(#[source] std::io::Error),

    #[error("Transform failed for '{path}': {cause}")]
    TransformFailure { path: EntryPath, cause: String },

    #[error("Invalid bundle contents: {0}")]
    Manifest(#[from] ManifestError),
}

impl From<std::io::Error> for AssemblyError {
    fn from(e: std::io::Error) -> Self {
        Self::WriteFailure(e)
    }
}

impl From<zip::result::ZipError> for AssemblyError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Self::WriteFailure(io),
            other => Self::WriteFailure(std::io::Error::other(other)),
        }
    }
}

/// Rewrites entry content during assembly.
pub trait EntryTransform: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Whether this transform wants to see `path`.
    fn applies_to(&self, _path: &EntryPath) -> bool {
        true
    }

    /// Transform the rendered content of one entry.
    ///
    /// # Errors
    ///
    /// Any error aborts assembly with [`AssemblyError::TransformFailure`].
    fn apply(&self, path: &EntryPath, data: Bytes) -> anyhow::Result<Bytes>;
}

/// Builds bundles from resolved manifests.
#[derive(Clone, Default)]
pub struct Assembler {
    transforms: Vec<Arc<dyn EntryTransform>>,
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.transforms.iter().map(|t| t.name()).collect();
        f.debug_struct("Assembler")
            .field("transforms", &names)
            .finish()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform; transforms run in registration order.
    pub fn with_transform(mut self, transform: impl EntryTransform + 'static) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    /// Assemble `manifest` into a bundle for `variant`.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::TransformFailure`] if a transform rejects an
    /// entry and [`AssemblyError::WriteFailure`] if the archive cannot be
    /// written. Nothing is returned on failure.
    pub fn assemble(
        &self,
        id: BundleId,
        manifest: &ResolvedManifest,
        variant: &VariantName,
    ) -> Result<Bundle, AssemblyError> {
        let rendered = render_manifest(manifest.attributes(), variant);

        let mut entries = Vec::with_capacity(manifest.len() + 1);
        entries.push(ManifestEntry::new(
            EntryPath::jar_manifest(),
            EntrySource::new(Origin::Generated, rendered),
        ));
        for entry in manifest.entries() {
            if entry.path().as_str() == MANIFEST_PATH {
                continue;
            }
            entries.push(self.transform(entry)?);
        }

        let archive = write_archive(&entries)?;
        let contents = ResolvedManifest::new(entries, manifest.attributes().to_vec())?;
        let bundle = Bundle::new(id, variant.clone(), contents, archive);

        info!(
            bundle = %bundle.id(),
            variant = %variant,
            size = bundle.size(),
            digest = %bundle.digest(),
            "bundle assembled"
        );
        Ok(bundle)
    }

    fn transform(&self, entry: &ManifestEntry) -> Result<ManifestEntry, AssemblyError> {
        let path = entry.path();
        let mut applicable = self.transforms.iter().filter(|t| t.applies_to(path)).peekable();
        if applicable.peek().is_none() {
            return Ok(entry.clone());
        }

        let original = entry.content();
        let mut data = Bytes::copy_from_slice(&original);
        for transform in applicable {
            data = transform
                .apply(path, data)
                .map_err(|e| AssemblyError::TransformFailure {
                    path: path.clone(),
                    cause: format!("{}: {e:#}", transform.name()),
                })?;
        }

        if data.as_ref() == original.as_ref() {
            return Ok(entry.clone());
        }
        debug!(path = %path, "entry rewritten by transform");
        let origin = entry.sources()[0].origin.clone();
        Ok(ManifestEntry::new(path.clone(), EntrySource::new(origin, data)))
    }
}

/// Render jar manifest headers with the variant header appended.
///
/// `Manifest-Version` is always emitted first; the section ends with an
/// empty line.
pub fn render_manifest(attributes: &[(String, String)], variant: &VariantName) -> String {
    let mut out = String::new();
    let version = attributes
        .iter()
        .find(|(k, _)| k == "Manifest-Version")
        .map_or("1.0", |(_, v)| v.as_str());
    write_header(&mut out, "Manifest-Version", version);

    for (key, value) in attributes {
        if key == "Manifest-Version" || key == VARIANT_HEADER {
            continue;
        }
        write_header(&mut out, key, value);
    }
    write_header(&mut out, VARIANT_HEADER, variant.as_str());
    out.push_str("\r\n");
    out
}

fn write_header(out: &mut String, key: &str, value: &str) {
    let line = format!("{key}: {value}");
    let mut rest = line.as_str();
    let mut limit = MAX_LINE;
    let mut first = true;
    while !rest.is_empty() {
        let mut cut = rest.len().min(limit);
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if !first {
            out.push(' ');
        }
        out.push_str(&rest[..cut]);
        out.push_str("\r\n");
        rest = &rest[cut..];
        first = false;
        // continuation lines spend one byte on the leading space
        limit = MAX_LINE - 1;
    }
}

fn write_archive(entries: &[ManifestEntry]) -> Result<Bytes, AssemblyError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        zip.start_file(entry.path().as_str(), options)?;
        zip.write_all(&entry.content())?;
    }
    let cursor = zip.finish()?;
    Ok(Bytes::from(cursor.into_inner()))
}
