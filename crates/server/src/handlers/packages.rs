//! Package management endpoints: upload, list, metadata, delete and the
//! compatibility download route.

use crate::auth::Identity;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Extension, Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use pository_auth::KeyRole;
use pository_core::location::parse_deb_filename;
use pository_core::{PackageLocation, PackageMetadata};
use pository_storage::PackageFilters;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// Query parameters for package listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub repo: Option<String>,
    pub distribution: Option<String>,
    pub component: Option<String>,
    pub architecture: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
}

/// POST /api/v1/packages - multipart package upload.
pub async fn upload_package(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut repo = "default".to_string();
    let mut distribution = "stable".to_string();
    let mut component = "main".to_string();
    let mut arch_field: Option<String> = None;
    let mut upload: Option<(Option<String>, Bytes)> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("multipart: {e}")))?
    {
        match field.name() {
            Some("repo") => repo = read_text(field).await?,
            Some("distribution") => distribution = read_text(field).await?,
            Some("component") => component = read_text(field).await?,
            Some("architecture") => arch_field = Some(read_text(field).await?),
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let bytes = read_file_limited(&mut field, state.config.max_upload_size).await?;
                upload = Some((filename, bytes));
            }
            _ => {}
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| {
        ApiError::Validation("multipart upload requires a \"file\" part".to_string())
    })?;

    let info = pository_deb::parse_deb(&bytes).map_err(|e| ApiError::Validation(e.to_string()))?;

    // name/version/architecture: the control fields win, the filename
    // pattern is the fallback
    let control = info.control;
    let mut name = control.as_ref().and_then(|c| c.name.clone());
    let mut version = control.as_ref().and_then(|c| c.version.clone());
    let mut architecture = control.as_ref().and_then(|c| c.architecture.clone());

    if (name.is_none() || version.is_none())
        && let Some(filename) = &filename
        && let Ok((n, v, a)) = parse_deb_filename(filename)
    {
        name.get_or_insert(n);
        version.get_or_insert(v);
        if architecture.is_none() {
            architecture = a;
        }
    }

    let name = name.ok_or_else(|| {
        ApiError::Validation("package name missing from control fields and filename".to_string())
    })?;
    let version = version.ok_or_else(|| {
        ApiError::Validation("package version missing from control fields and filename".to_string())
    })?;
    let architecture = architecture
        .or(arch_field)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| "all".to_string());

    let loc = PackageLocation::new(
        &repo,
        &distribution,
        &component,
        &architecture,
        &name,
        &version,
    )?;

    if !state.config.repo_allowed(&loc.repo) {
        return Err(ApiError::RepoNotAllowed(loc.repo.clone()));
    }

    match &identity {
        Identity::Workload(claims) => state
            .policy
            .authorize(claims, &loc.name)
            .map_err(ApiError::AuthForbidden)?,
        Identity::Key(key) => {
            if !key.has_permission(KeyRole::Write, Some(&loc.repo), Some(&loc.distribution)) {
                return Err(ApiError::AuthForbidden(
                    "requires write access to this repo and distribution".to_string(),
                ));
            }
        }
    }

    let control_extra = control.map(|c| c.fields).filter(|f| !f.is_empty());
    let size = bytes.len() as u64;
    let meta = state
        .store
        .store_package(&loc, bytes, &identity.id(), control_extra)
        .await?;
    state.metrics.upload_bytes.inc_by(size);

    tracing::info!(location = %loc, uploader = %meta.uploader_key_id, size, "package stored");
    Ok((StatusCode::CREATED, Json(meta)).into_response())
}

/// GET /api/v1/packages - filtered listing across repos.
pub async fn list_packages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<PackageMetadata>>> {
    identity.require_role(
        KeyRole::Read,
        query.repo.as_deref(),
        query.distribution.as_deref(),
    )?;

    let filters = PackageFilters {
        repo: query.repo,
        distribution: query.distribution,
        component: query.component,
        architecture: query.architecture,
        name: query.name,
        version: query.version,
    };
    let mut packages = state.store.list_packages(&filters).await?;
    packages.retain(|p| state.config.repo_allowed(&p.repo));
    Ok(Json(packages))
}

/// GET /api/v1/packages/... - metadata for one location.
pub async fn get_package(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(parts): Path<(String, String, String, String, String, String)>,
) -> ApiResult<Json<PackageMetadata>> {
    let (repo, distribution, component, architecture, name, version) = parts;
    identity.require_role(KeyRole::Read, Some(&repo), Some(&distribution))?;

    let loc = PackageLocation::new(
        &repo,
        &distribution,
        &component,
        &architecture,
        &name,
        &version,
    )?;
    let meta = state
        .store
        .get_package_metadata(&loc)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("package {loc}")))?;
    Ok(Json(meta))
}

/// DELETE /api/v1/packages/... - remove a package.
pub async fn delete_package(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(parts): Path<(String, String, String, String, String, String)>,
) -> ApiResult<Response> {
    let (repo, distribution, component, architecture, name, version) = parts;
    identity.require_role(KeyRole::Admin, Some(&repo), Some(&distribution))?;

    let loc = PackageLocation::new(
        &repo,
        &distribution,
        &component,
        &architecture,
        &name,
        &version,
    )?;
    if state.store.delete_package(&loc).await? {
        tracing::info!(location = %loc, "package deleted");
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ApiError::NotFound(format!("package {loc}")))
    }
}

/// GET /repo/... - compatibility download with implicit repo `default`.
/// Accepts `<name>_<version>.deb` (architecture from the path) as well as
/// the full `<name>_<version>_<arch>.deb` form.
pub async fn download_package(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Path(parts): Path<(String, String, String, String)>,
) -> ApiResult<Response> {
    let (distribution, component, architecture, filename) = parts;
    if let Some(Extension(identity)) = identity {
        identity.require_role(KeyRole::Read, Some("default"), Some(&distribution))?;
    }

    let (name, version, file_arch) =
        parse_deb_filename(&filename).map_err(|e| ApiError::Validation(e.to_string()))?;
    let architecture = file_arch.unwrap_or(architecture);

    let loc = PackageLocation::new(
        "default",
        &distribution,
        &component,
        &architecture,
        &name,
        &version,
    )?;
    stream_deb(&state, &loc).await
}

/// Stream a stored artifact with the download headers.
pub(crate) async fn stream_deb(state: &AppState, loc: &PackageLocation) -> ApiResult<Response> {
    let path = state
        .store
        .get_package_file(loc)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("package {loc}")))?;
    let metadata = state.store.get_package_metadata(loc).await?;

    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            // deleted between lookup and open
            ApiError::NotFound(format!("package {loc}"))
        } else {
            ApiError::Internal(e.to_string())
        }
    })?;
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .len();
    state.metrics.download_bytes.inc_by(size);

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, pository_core::DEB_MIME)
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", loc.deb_filename()),
        );
    if let Some(meta) = metadata {
        builder = builder.header("x-checksum-sha256", meta.sha256);
    }

    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn read_text(field: Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("multipart: {e}")))
}

/// Read the file part, rejecting it as soon as it exceeds the limit.
async fn read_file_limited(field: &mut Field<'_>, limit: u64) -> ApiResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::Validation(format!("multipart: {e}")))?
    {
        if buf.len() as u64 + chunk.len() as u64 > limit {
            return Err(ApiError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
