//! Upload authorization for workload identities.

use crate::oidc::WorkloadClaims;
use std::collections::HashMap;

/// Decides whether a verified workflow identity may upload a package.
///
/// The override map is consulted before the default rule, so a repository
/// listed there is governed entirely by its package allow-list.
pub struct UploadPolicy {
    allowed_owners: Vec<String>,
    require_private: bool,
    overrides: HashMap<String, Vec<String>>,
}

impl UploadPolicy {
    pub fn new(
        allowed_owners: Vec<String>,
        require_private: bool,
        overrides: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            allowed_owners,
            require_private,
            overrides,
        }
    }

    /// Build from the application configuration.
    pub fn from_config(config: &pository_core::AppConfig) -> Self {
        Self::new(
            config.oidc_allowed_owners.clone(),
            config.oidc_require_private,
            config.oidc_overrides.clone(),
        )
    }

    /// Allow or deny the upload of `package` by `claims`, with the denial
    /// reason on the error side.
    pub fn authorize(&self, claims: &WorkloadClaims, package: &str) -> Result<(), String> {
        if claims.event_name.as_deref() == Some("pull_request") {
            return Err("pull_request workflows may not upload".to_string());
        }

        if let Some(allowed) = self.overrides.get(&claims.repository) {
            if allowed.iter().any(|p| p == "*" || p == package) {
                return Ok(());
            }
            return Err(format!(
                "package {package} is not in the allow-list for {}",
                claims.repository
            ));
        }

        let Some((owner, repo_name)) = claims.repository.split_once('/') else {
            return Err(format!("malformed repository claim: {}", claims.repository));
        };

        if !self.allowed_owners.iter().any(|o| o == owner) {
            return Err(format!("owner {owner} is not allow-listed"));
        }

        if self.require_private && claims.repository_visibility.as_deref() != Some("private") {
            return Err(format!(
                "repository {} is not private",
                claims.repository
            ));
        }

        if package != repo_name {
            return Err(format!(
                "by convention {} may only upload the package named {repo_name}, not {package}",
                claims.repository
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(repository: &str, visibility: &str, event: &str) -> WorkloadClaims {
        serde_json::from_str(&format!(
            r#"{{"repository":"{repository}","repository_visibility":"{visibility}","event_name":"{event}"}}"#
        ))
        .unwrap()
    }

    fn policy() -> UploadPolicy {
        UploadPolicy::new(vec!["alice".to_string()], true, HashMap::new())
    }

    #[test]
    fn default_convention_allows_matching_package() {
        let c = claims("alice/foo", "private", "push");
        assert!(policy().authorize(&c, "foo").is_ok());
    }

    #[test]
    fn default_convention_denies_other_packages() {
        let c = claims("alice/foo", "private", "push");
        let reason = policy().authorize(&c, "bar").unwrap_err();
        assert!(reason.contains("convention"));
        assert!(reason.contains("foo"));
    }

    #[test]
    fn pull_request_is_denied_unconditionally() {
        let c = claims("alice/foo", "private", "pull_request");
        assert!(policy().authorize(&c, "foo").is_err());

        // even with a wildcard override
        let overrides = HashMap::from([("alice/foo".to_string(), vec!["*".to_string()])]);
        let permissive = UploadPolicy::new(vec!["alice".to_string()], false, overrides);
        assert!(permissive.authorize(&c, "foo").is_err());
    }

    #[test]
    fn unlisted_owner_is_denied() {
        let c = claims("mallory/foo", "private", "push");
        let reason = policy().authorize(&c, "foo").unwrap_err();
        assert!(reason.contains("mallory"));
    }

    #[test]
    fn public_repository_denied_when_private_required() {
        let c = claims("alice/foo", "public", "push");
        assert!(policy().authorize(&c, "foo").is_err());

        let relaxed = UploadPolicy::new(vec!["alice".to_string()], false, HashMap::new());
        assert!(relaxed.authorize(&c, "foo").is_ok());
    }

    #[test]
    fn override_list_governs_listed_repositories() {
        let overrides = HashMap::from([(
            "bob/tools".to_string(),
            vec!["cli".to_string(), "daemon".to_string()],
        )]);
        // owner not in the allow-list: overrides take precedence anyway
        let policy = UploadPolicy::new(vec!["alice".to_string()], true, overrides);

        let c = claims("bob/tools", "public", "push");
        assert!(policy.authorize(&c, "cli").is_ok());
        assert!(policy.authorize(&c, "daemon").is_ok());
        let reason = policy.authorize(&c, "other").unwrap_err();
        assert!(reason.contains("allow-list"));
    }

    #[test]
    fn override_wildcard_allows_everything() {
        let overrides = HashMap::from([("bob/tools".to_string(), vec!["*".to_string()])]);
        let policy = UploadPolicy::new(Vec::new(), true, overrides);
        let c = claims("bob/tools", "public", "push");
        assert!(policy.authorize(&c, "anything").is_ok());
    }

    #[test]
    fn malformed_repository_claim_is_denied() {
        let c = claims("no-slash-here", "private", "push");
        assert!(policy().authorize(&c, "foo").is_err());
    }
}
