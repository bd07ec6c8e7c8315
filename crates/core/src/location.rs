//! Package locations and component sanitization.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strip path separators and traversal segments from a single component.
///
/// Removes `/` and `\`, collapses any run of dots into a single dot, and
/// strips leading dots. The result never contains a separator or a `..`
/// segment; it may be empty, which callers must reject.
pub fn sanitize_path(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_dot = false;
    for c in s.chars() {
        if c == '/' || c == '\\' {
            continue;
        }
        if c == '.' {
            if prev_dot {
                continue;
            }
            prev_dot = true;
        } else {
            prev_dot = false;
        }
        out.push(c);
    }
    out.trim_start_matches('.').to_string()
}

/// Package name: starts alphanumeric, then alphanumerics and `+.-`.
/// Matching is case-insensitive.
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// Package version: starts alphanumeric, then alphanumerics and `.+~:-`.
pub fn is_valid_version(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '~' | ':' | '-'))
}

/// Architecture: a known Debian tag, or lowercase letter followed by
/// lowercase alphanumerics and `-`.
pub fn is_valid_architecture(s: &str) -> bool {
    if crate::KNOWN_ARCHITECTURES.contains(&s) {
        return true;
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// The primary key of every stored artifact.
///
/// All six components are sanitized, non-empty strings; construction via
/// [`PackageLocation::new`] is the only way to get one, so holders can rely
/// on the components being safe for filesystem use.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageLocation {
    pub repo: String,
    pub distribution: String,
    pub component: String,
    pub architecture: String,
    pub name: String,
    pub version: String,
}

impl PackageLocation {
    /// Sanitize and validate all six components.
    pub fn new(
        repo: &str,
        distribution: &str,
        component: &str,
        architecture: &str,
        name: &str,
        version: &str,
    ) -> Result<Self> {
        let repo = non_empty("repo", sanitize_path(repo))?;
        let distribution = non_empty("distribution", sanitize_path(distribution))?;
        let component = non_empty("component", sanitize_path(component))?;
        let architecture = non_empty("architecture", sanitize_path(architecture))?;
        let name = non_empty("name", sanitize_path(name))?;
        let version = non_empty("version", sanitize_path(version))?;

        if !is_valid_name(&name) {
            return Err(Error::InvalidName(name));
        }
        if !is_valid_version(&version) {
            return Err(Error::InvalidVersion(version));
        }
        if !is_valid_architecture(&architecture) {
            return Err(Error::InvalidArchitecture(architecture));
        }

        Ok(Self {
            repo,
            distribution,
            component,
            architecture,
            name,
            version,
        })
    }

    /// The `<name>_<version>_<arch>.deb` filename for this location.
    pub fn deb_filename(&self) -> String {
        format_deb_filename(&self.name, &self.version, &self.architecture)
    }
}

impl fmt::Display for PackageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}",
            self.repo, self.distribution, self.component, self.architecture, self.name, self.version
        )
    }
}

fn non_empty(which: &'static str, s: String) -> Result<String> {
    if s.is_empty() {
        Err(Error::EmptyComponent(which))
    } else {
        Ok(s)
    }
}

/// Render the canonical deb filename.
pub fn format_deb_filename(name: &str, version: &str, architecture: &str) -> String {
    format!("{name}_{version}_{architecture}.deb")
}

/// Decode a deb filename back into its `(name, version, architecture)` parts.
///
/// The architecture segment is optional (`hello_1.0.deb` parses with
/// `None`); callers supply a fallback from context.
pub fn parse_deb_filename(filename: &str) -> Result<(String, String, Option<String>)> {
    let stem = filename
        .strip_suffix(".deb")
        .ok_or_else(|| Error::InvalidFilename(filename.to_string()))?;

    let mut parts = stem.splitn(3, '_');
    let name = parts.next().unwrap_or_default();
    let version = parts
        .next()
        .ok_or_else(|| Error::InvalidFilename(filename.to_string()))?;
    let arch = parts.next();

    if name.is_empty() || version.is_empty() || arch.is_some_and(str::is_empty) {
        return Err(Error::InvalidFilename(filename.to_string()));
    }

    Ok((
        name.to_string(),
        version.to_string(),
        arch.map(str::to_string),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_separators_and_traversal() {
        assert_eq!(sanitize_path("foo/bar"), "foobar");
        assert_eq!(sanitize_path("foo\\bar"), "foobar");
        assert_eq!(sanitize_path("../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_path("..\\..\\windows"), "windows");
        assert_eq!(sanitize_path("a..b"), "a.b");
        assert_eq!(sanitize_path("...."), "");
        assert_eq!(sanitize_path(".hidden"), "hidden");
        assert_eq!(sanitize_path("plain-1.2.3"), "plain-1.2.3");
    }

    #[test]
    fn sanitize_never_yields_traversal() {
        for input in ["..", "../..", "a/../b", "..\\x", "./.."] {
            let out = sanitize_path(input);
            assert!(!out.contains(".."), "{input:?} -> {out:?}");
            assert!(!out.contains('/') && !out.contains('\\'));
        }
    }

    #[test]
    fn name_validation() {
        assert!(is_valid_name("hello"));
        assert!(is_valid_name("libfoo++"));
        assert!(is_valid_name("g++-12"));
        assert!(is_valid_name("0ad"));
        assert!(is_valid_name("Hello")); // case-insensitive
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("-dash-first"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("under_score"));
    }

    #[test]
    fn version_validation() {
        assert!(is_valid_version("1.0"));
        assert!(is_valid_version("2.1-3ubuntu4"));
        assert!(is_valid_version("1:1.2.3~rc1"));
        assert!(!is_valid_version(""));
        assert!(!is_valid_version("~leading"));
        assert!(!is_valid_version("1.0 beta"));
    }

    #[test]
    fn architecture_validation() {
        assert!(is_valid_architecture("amd64"));
        assert!(is_valid_architecture("all"));
        assert!(is_valid_architecture("riscv64"));
        assert!(is_valid_architecture("myarch-v2"));
        assert!(!is_valid_architecture(""));
        assert!(!is_valid_architecture("64bit"));
        assert!(!is_valid_architecture("AMD64"));
    }

    #[test]
    fn location_rejects_empty_after_sanitize() {
        let err = PackageLocation::new("....", "stable", "main", "amd64", "hello", "1.0");
        assert!(matches!(err, Err(Error::EmptyComponent("repo"))));
    }

    #[test]
    fn location_sanitizes_components() {
        let loc =
            PackageLocation::new("de/fault", "stable", "main", "amd64", "hello", "1.0").unwrap();
        assert_eq!(loc.repo, "default");
        assert_eq!(loc.deb_filename(), "hello_1.0_amd64.deb");
    }

    #[test]
    fn filename_roundtrip() {
        let (n, v, a) = parse_deb_filename("hello_1.0_amd64.deb").unwrap();
        assert_eq!((n.as_str(), v.as_str()), ("hello", "1.0"));
        assert_eq!(a.as_deref(), Some("amd64"));
        assert_eq!(format_deb_filename("hello", "1.0", "amd64"), "hello_1.0_amd64.deb");
    }

    #[test]
    fn filename_without_arch() {
        let (n, v, a) = parse_deb_filename("hello_1.0.deb").unwrap();
        assert_eq!((n.as_str(), v.as_str(), a), ("hello", "1.0", None));
    }

    #[test]
    fn filename_rejects_garbage() {
        assert!(parse_deb_filename("hello.deb").is_err());
        assert!(parse_deb_filename("hello_1.0_amd64").is_err());
        assert!(parse_deb_filename("_1.0_amd64.deb").is_err());
        assert!(parse_deb_filename("hello_1.0_.deb").is_err());
    }
}
