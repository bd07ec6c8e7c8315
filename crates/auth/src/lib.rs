//! Authentication and authorization for Pository.
//!
//! Three collaborators live here:
//! - the API key store: persistent keys with Argon2id-hashed secrets, a
//!   role hierarchy and optional repo/distribution scopes
//! - the workload identity verifier: externally issued RS256 JWTs checked
//!   against a cached JWKS
//! - the upload policy deciding whether a verified workload identity may
//!   upload a given package

pub mod error;
pub mod keys;
pub mod oidc;
pub mod policy;

pub use error::{AuthError, Result};
pub use keys::{ApiKey, ApiKeyStore, KeyIdentity, KeyInfo, KeyRole, KeyScope};
pub use oidc::{OidcVerifier, WorkloadClaims};
pub use policy::UploadPolicy;
