//! Apt-compatible read endpoints: `Release`, `Packages` and pool
//! downloads. All three are unauthenticated.

use crate::error::{ApiError, ApiResult};
use crate::handlers::packages::stream_deb;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use pository_core::aptfmt::{self, PackagesEntry, ReleaseSlice};
use pository_core::location::parse_deb_filename;
use pository_core::{PackageLocation, PackageMetadata, sanitize_path};
use std::collections::BTreeSet;
use time::OffsetDateTime;

/// The native architecture always advertised, so `Architecture: all`
/// packages are reachable even before any native-arch upload.
const DEFAULT_NATIVE_ARCH: &str = "amd64";

/// GET /apt/{repo}/dists/{distribution}/Release
pub async fn apt_release(
    State(state): State<AppState>,
    Path((repo, distribution)): Path<(String, String)>,
) -> ApiResult<Response> {
    let repo = check_repo(&state, &repo)?;
    let index = state.store.repo_index(&repo).await?;
    let entries: Vec<PackageMetadata> = index
        .packages
        .iter()
        .filter(|m| m.distribution == distribution)
        .cloned()
        .collect();

    let components: BTreeSet<String> = entries.iter().map(|m| m.component.clone()).collect();
    let mut architectures: BTreeSet<String> = entries
        .iter()
        .filter(|m| m.architecture != "all")
        .map(|m| m.architecture.clone())
        .collect();
    architectures.insert(DEFAULT_NATIVE_ARCH.to_string());

    let mut slices = Vec::new();
    for component in &components {
        for architecture in &architectures {
            let slice = slice_entries(&entries, component, architecture);
            if slice.is_empty() {
                continue;
            }
            let rendered = render_slice(&state, slice).await?;
            slices.push(ReleaseSlice::digest(component, architecture, &rendered));
        }
    }

    let body = aptfmt::render_release(
        &repo,
        &distribution,
        OffsetDateTime::now_utc(),
        &architectures.iter().cloned().collect::<Vec<_>>(),
        &components.iter().cloned().collect::<Vec<_>>(),
        &slices,
    );
    Ok(text_response(body))
}

/// GET /apt/{repo}/dists/{distribution}/{component}/binary-{arch}/Packages
///
/// `Architecture: all` packages appear in every native arch slice; no
/// `binary-all` document exists, so apt never sees them twice.
pub async fn apt_packages(
    State(state): State<AppState>,
    Path((repo, distribution, component, binary_arch)): Path<(String, String, String, String)>,
) -> ApiResult<Response> {
    let repo = check_repo(&state, &repo)?;
    let Some(architecture) = binary_arch.strip_prefix("binary-") else {
        return Err(ApiError::NotFound(format!("dists entry {binary_arch}")));
    };
    if architecture == "all" {
        return Err(ApiError::NotFound(
            "binary-all is folded into the native architecture indexes".to_string(),
        ));
    }

    let index = state.store.repo_index(&repo).await?;
    let entries: Vec<PackageMetadata> = index
        .packages
        .iter()
        .filter(|m| m.distribution == distribution)
        .cloned()
        .collect();
    let slice = slice_entries(&entries, &component, architecture);
    if slice.is_empty() {
        return Err(ApiError::NotFound(format!(
            "{component}/binary-{architecture}/Packages"
        )));
    }

    let body = render_slice(&state, slice).await?;
    Ok(text_response(body))
}

/// GET /apt/{repo}/pool/{distribution}/{component}/{architecture}/{filename}
pub async fn apt_pool(
    State(state): State<AppState>,
    Path(parts): Path<(String, String, String, String, String)>,
) -> ApiResult<Response> {
    let (repo, distribution, component, _architecture, filename) = parts;
    let repo = check_repo(&state, &repo)?;

    let (name, version, file_arch) =
        parse_deb_filename(&filename).map_err(|e| ApiError::Validation(e.to_string()))?;
    let architecture = file_arch.ok_or_else(|| {
        ApiError::Validation(format!(
            "pool filename must be <name>_<version>_<arch>.deb, got {filename}"
        ))
    })?;

    let loc = PackageLocation::new(
        &repo,
        &distribution,
        &component,
        &architecture,
        &name,
        &version,
    )?;
    stream_deb(&state, &loc).await
}

/// The entries of one component/arch slice, with `all` packages folded in.
fn slice_entries(
    entries: &[PackageMetadata],
    component: &str,
    architecture: &str,
) -> Vec<PackageMetadata> {
    entries
        .iter()
        .filter(|m| {
            m.component == component
                && (m.architecture == architecture || m.architecture == "all")
        })
        .cloned()
        .collect()
}

/// Render a `Packages` document, reading each artifact for its MD5 when
/// possible.
async fn render_slice(state: &AppState, metas: Vec<PackageMetadata>) -> ApiResult<String> {
    let mut entries = Vec::with_capacity(metas.len());
    for meta in metas {
        let md5sum = match state.store.get_package_file(&meta.location()).await? {
            Some(path) => tokio::fs::read(&path)
                .await
                .ok()
                .map(|bytes| aptfmt::md5_hex(&bytes)),
            None => None,
        };
        entries.push(PackagesEntry { meta, md5sum });
    }
    Ok(aptfmt::render_packages(&entries))
}

/// Unknown and disallowed repos are indistinguishable on the apt surface.
fn check_repo(state: &AppState, repo: &str) -> ApiResult<String> {
    let repo = sanitize_path(repo);
    if repo.is_empty() || !state.config.repo_allowed(&repo) {
        return Err(ApiError::NotFound(format!("repo {repo}")));
    }
    Ok(repo)
}

fn text_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}
