//! Immutable package metadata created at upload time.

use crate::location::PackageLocation;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Optional fields extracted from the package's own control file.
///
/// Every field mirrors the control file verbatim; none of these is ever
/// synthesized. `Multi-Arch` and `Installed-Size` in particular must only
/// carry values the deb itself declared, otherwise apt clients record the
/// fabricated value at install time and flag the package as perpetually
/// upgradeable afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_arch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_depends: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggests: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provides: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Kibibytes, as declared by the control file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_size: Option<u64>,
}

impl ControlFields {
    /// True when no control field is present at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Backfill absent fields from another extraction of the same deb.
    /// Present fields are never overwritten.
    pub fn fill_missing_from(&mut self, other: ControlFields) {
        fn fill<T>(dst: &mut Option<T>, src: Option<T>) {
            if dst.is_none() {
                *dst = src;
            }
        }
        fill(&mut self.description, other.description);
        fill(&mut self.multi_arch, other.multi_arch);
        fill(&mut self.maintainer, other.maintainer);
        fill(&mut self.depends, other.depends);
        fill(&mut self.pre_depends, other.pre_depends);
        fill(&mut self.suggests, other.suggests);
        fill(&mut self.conflicts, other.conflicts);
        fill(&mut self.breaks, other.breaks);
        fill(&mut self.replaces, other.replaces);
        fill(&mut self.provides, other.provides);
        fill(&mut self.homepage, other.homepage);
        fill(&mut self.section, other.section);
        fill(&mut self.priority, other.priority);
        fill(&mut self.installed_size, other.installed_size);
    }
}

/// Immutable record describing one stored artifact.
///
/// Created on successful upload and never mutated afterwards, except for
/// self-heal backfill of missing control fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    pub repo: String,
    pub distribution: String,
    pub component: String,
    pub architecture: String,
    pub name: String,
    pub version: String,
    /// Size of the full deb in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 of the full deb.
    pub sha256: String,
    pub mime: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    /// Key id, or `oidc:<owner/repo>` for workload-identity uploads.
    pub uploader_key_id: String,
    #[serde(flatten)]
    pub control: ControlFields,
}

impl PackageMetadata {
    /// The location this record describes.
    pub fn location(&self) -> PackageLocation {
        PackageLocation {
            repo: self.repo.clone(),
            distribution: self.distribution.clone(),
            component: self.component.clone(),
            architecture: self.architecture.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    /// Whether this record and `loc` share the full six-part key.
    pub fn matches_location(&self, loc: &PackageLocation) -> bool {
        self.repo == loc.repo
            && self.distribution == loc.distribution
            && self.component == loc.component
            && self.architecture == loc.architecture
            && self.name == loc.name
            && self.version == loc.version
    }

    /// The `<name>_<version>_<arch>.deb` filename for this record.
    pub fn deb_filename(&self) -> String {
        crate::location::format_deb_filename(&self.name, &self.version, &self.architecture)
    }
}
