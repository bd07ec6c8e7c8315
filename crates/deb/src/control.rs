//! RFC-822-style control file parsing.

use pository_core::ControlFields;

/// Parse control text into ordered `(field, value)` pairs.
///
/// Lines starting with space or tab continue the previous field; the
/// continuation content is joined with a newline. Lines without a colon
/// and blank lines are skipped.
pub fn parse_control_text(text: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = fields.last_mut() {
                value.push('\n');
                value.push_str(line.trim_start());
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            fields.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    fields
}

/// The control fields a package declares, split into the identifying
/// triple and the enrichment record stored alongside the artifact.
#[derive(Clone, Debug, Default)]
pub struct ControlSummary {
    pub name: Option<String>,
    pub version: Option<String>,
    pub architecture: Option<String>,
    pub fields: ControlFields,
}

impl ControlSummary {
    /// Build a summary from raw control text. Unknown fields are discarded
    /// here, at the parse boundary.
    pub fn from_text(text: &str) -> Self {
        let pairs = parse_control_text(text);
        let get = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        };

        Self {
            name: get("Package"),
            version: get("Version"),
            architecture: get("Architecture"),
            fields: ControlFields {
                description: get("Description"),
                multi_arch: get("Multi-Arch"),
                maintainer: get("Maintainer"),
                depends: get("Depends"),
                pre_depends: get("Pre-Depends"),
                suggests: get("Suggests"),
                conflicts: get("Conflicts"),
                breaks: get("Breaks"),
                replaces: get("Replaces"),
                provides: get("Provides"),
                homepage: get("Homepage"),
                section: get("Section"),
                priority: get("Priority"),
                installed_size: get("Installed-Size").and_then(|v| v.trim().parse().ok()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_fields() {
        let pairs = parse_control_text("Package: hello\nVersion: 1.0\n");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], ("Package".to_string(), "hello".to_string()));
        assert_eq!(pairs[1], ("Version".to_string(), "1.0".to_string()));
    }

    #[test]
    fn continuation_lines_join_previous_field() {
        let pairs = parse_control_text("Description: short\n long line one\n\tlong line two\n");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, "short\nlong line one\nlong line two");
    }

    #[test]
    fn leading_continuation_without_field_is_dropped() {
        let pairs = parse_control_text(" dangling\nPackage: x\n");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "Package");
    }

    #[test]
    fn summary_extracts_known_fields_case_insensitively() {
        let summary = ControlSummary::from_text(
            "package: hello\nVERSION: 1.0\nArchitecture: all\nmulti-arch: foreign\nUnknown-Field: dropped\n",
        );
        assert_eq!(summary.name.as_deref(), Some("hello"));
        assert_eq!(summary.version.as_deref(), Some("1.0"));
        assert_eq!(summary.architecture.as_deref(), Some("all"));
        assert_eq!(summary.fields.multi_arch.as_deref(), Some("foreign"));
    }

    #[test]
    fn installed_size_must_be_numeric() {
        let summary = ControlSummary::from_text("Installed-Size: 91\n");
        assert_eq!(summary.fields.installed_size, Some(91));

        let summary = ControlSummary::from_text("Installed-Size: lots\n");
        assert_eq!(summary.fields.installed_size, None);
    }
}
