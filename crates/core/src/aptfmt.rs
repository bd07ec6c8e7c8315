//! Apt index document rendering.
//!
//! Produces the plain-text `Packages` and `Release` documents served to apt
//! clients. Rendering is deterministic: the same metadata always yields the
//! same bytes, so the digests embedded in `Release` stay valid for the
//! `Packages` bodies served next to it.

use crate::metadata::PackageMetadata;
use md5::{Digest as _, Md5};
use sha2::{Digest as _, Sha256};
use time::OffsetDateTime;
use time::macros::format_description;

/// Lowercase hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Render one `Packages` stanza for a stored package.
///
/// Field order is fixed; optional fields are omitted when the stored value
/// is absent. `Multi-Arch` and `Installed-Size` appear if and only if the
/// deb's own control file declared them. `md5sum` is the digest of the
/// artifact on disk, when the caller could read it.
pub fn render_stanza(meta: &PackageMetadata, md5sum: Option<&str>) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(16);

    lines.push(format!("Package: {}", meta.name));
    lines.push(format!("Version: {}", meta.version));
    lines.push(format!("Architecture: {}", meta.architecture));

    let mut push_opt = |field: &str, value: &Option<String>| {
        if let Some(v) = value
            && !v.is_empty()
        {
            lines.push(format!("{field}: {v}"));
        }
    };
    push_opt("Maintainer", &meta.control.maintainer);
    push_opt("Multi-Arch", &meta.control.multi_arch);
    push_opt("Homepage", &meta.control.homepage);
    push_opt("Section", &meta.control.section);
    push_opt("Priority", &meta.control.priority);
    push_opt("Pre-Depends", &meta.control.pre_depends);
    push_opt("Depends", &meta.control.depends);
    push_opt("Suggests", &meta.control.suggests);
    push_opt("Conflicts", &meta.control.conflicts);
    push_opt("Breaks", &meta.control.breaks);
    push_opt("Replaces", &meta.control.replaces);
    push_opt("Provides", &meta.control.provides);

    if let Some(size) = meta.control.installed_size {
        lines.push(format!("Installed-Size: {size}"));
    }

    lines.push(format!(
        "Filename: pool/{}/{}/{}/{}",
        meta.distribution,
        meta.component,
        meta.architecture,
        meta.deb_filename()
    ));
    lines.push(format!("Size: {}", meta.size));
    lines.push(format!("SHA256: {}", meta.sha256));
    if let Some(md5) = md5sum {
        lines.push(format!("MD5sum: {md5}"));
    }

    let description = normalized_description(meta);
    lines.push(format!("Description: {description}"));
    lines.push(format!(
        "Description-md5: {}",
        md5_hex(format!("{description}\n").as_bytes())
    ));

    lines.join("\n") + "\n"
}

/// The description as emitted: stored value, or `<name> <version>` when the
/// control file carried none. Continuation lines are normalized to exactly
/// one leading space; blank continuation lines become ` .` so a stanza
/// never contains a blank line.
fn normalized_description(meta: &PackageMetadata) -> String {
    let raw = match &meta.control.description {
        Some(d) if !d.is_empty() => d.clone(),
        _ => format!("{} {}", meta.name, meta.version),
    };

    let mut lines = raw.lines();
    let first = lines.next().unwrap_or_default().trim().to_string();
    let mut out = first;
    for line in lines {
        let trimmed = line.trim();
        out.push('\n');
        if trimmed.is_empty() {
            out.push_str(" .");
        } else {
            out.push(' ');
            out.push_str(trimmed);
        }
    }
    out
}

/// An entry for the `Packages` document: the metadata plus the on-disk MD5
/// when readable.
pub struct PackagesEntry {
    pub meta: PackageMetadata,
    pub md5sum: Option<String>,
}

/// Render the full `Packages` document for one component/architecture
/// slice. Stanzas are separated by blank lines and the document ends with
/// a trailing blank line; an empty slice renders as an empty document.
pub fn render_packages(entries: &[PackagesEntry]) -> String {
    entries
        .iter()
        .map(|e| render_stanza(&e.meta, e.md5sum.as_deref()) + "\n")
        .collect()
}

/// Digests of one rendered `Packages` document, for the `Release` index.
pub struct ReleaseSlice {
    pub component: String,
    pub architecture: String,
    pub size: usize,
    pub md5: String,
    pub sha256: String,
}

impl ReleaseSlice {
    /// Digest a rendered `Packages` body.
    pub fn digest(component: &str, architecture: &str, packages: &str) -> Self {
        Self {
            component: component.to_string(),
            architecture: architecture.to_string(),
            size: packages.len(),
            md5: md5_hex(packages.as_bytes()),
            sha256: sha256_hex(packages.as_bytes()),
        }
    }

    fn index_path(&self) -> String {
        format!("{}/binary-{}/Packages", self.component, self.architecture)
    }
}

/// Render the unsigned `Release` document for one repo distribution.
pub fn render_release(
    repo: &str,
    distribution: &str,
    date: OffsetDateTime,
    architectures: &[String],
    components: &[String],
    slices: &[ReleaseSlice],
) -> String {
    let mut out = String::new();
    out.push_str("Origin: Pository\n");
    out.push_str("Label: Pository\n");
    out.push_str(&format!("Suite: {distribution}\n"));
    out.push_str(&format!("Codename: pository-{repo}-{distribution}\n"));
    // RFC 1123 with an explicit UTC zone, as emitted by Debian archive tools
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] UTC"
    );
    let date = date
        .format(format)
        .unwrap_or_else(|_| String::from("Thu, 01 Jan 1970 00:00:00 UTC"));
    out.push_str(&format!("Date: {date}\n"));
    out.push_str(&format!("Architectures: {}\n", architectures.join(" ")));
    out.push_str(&format!("Components: {}\n", components.join(" ")));
    out.push_str(&format!("Description: Pository repository for {repo}\n"));

    out.push_str("MD5Sum:\n");
    for slice in slices {
        out.push_str(&format!(
            " {} {} {}\n",
            slice.md5,
            slice.size,
            slice.index_path()
        ));
    }
    out.push_str("SHA256:\n");
    for slice in slices {
        out.push_str(&format!(
            " {} {} {}\n",
            slice.sha256,
            slice.size,
            slice.index_path()
        ));
    }

    out
}
