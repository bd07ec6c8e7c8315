//! Integration tests for the upload pipeline and role enforcement.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::server::ADMIN_KEY;
use common::{TestServer, fixtures, json_request, send, upload};
use pository_auth::{KeyRole, KeyScope};
use sha2::{Digest, Sha256};

const STABLE_MAIN: &[(&str, &str)] = &[
    ("repo", "default"),
    ("distribution", "stable"),
    ("component", "main"),
];

#[tokio::test]
async fn upload_gzip_deb_end_to_end() {
    let server = TestServer::new().await;
    let deb = fixtures::deb("hello", "1.0", "amd64", &[("Depends", "libc6 (>= 2.34)")]);

    let (status, body) = upload(
        &server.router,
        ADMIN_KEY,
        STABLE_MAIN,
        "hello_1.0_amd64.deb",
        &deb,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["name"], "hello");
    assert_eq!(body["version"], "1.0");
    assert_eq!(body["architecture"], "amd64");
    assert_eq!(body["size"], deb.len() as u64);
    assert_eq!(body["sha256"], hex::encode(Sha256::digest(&deb)));
    assert_eq!(body["mime"], "application/vnd.debian.binary-package");
    assert_eq!(body["uploaderKeyId"], "admin");
    assert_eq!(body["depends"], "libc6 (>= 2.34)");
    assert_eq!(body["description"], "test package hello");

    // visible through the listing
    let (status, listed) =
        json_request(&server.router, "GET", "/api/v1/packages", Some(ADMIN_KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // and through the metadata endpoint
    let (status, meta) = json_request(
        &server.router,
        "GET",
        "/api/v1/packages/default/stable/main/amd64/hello/1.0",
        Some(ADMIN_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["sha256"], body["sha256"]);
}

#[tokio::test]
async fn download_compat_route_streams_same_bytes() {
    let server = TestServer::new().await;
    let deb = fixtures::deb("hello", "1.0", "amd64", &[]);
    upload(&server.router, ADMIN_KEY, STABLE_MAIN, "hello_1.0_amd64.deb", &deb).await;

    let request = Request::builder()
        .method("GET")
        .uri("/repo/stable/main/amd64/hello_1.0_amd64.deb")
        .header("X-Api-Key", ADMIN_KEY)
        .body(Body::empty())
        .unwrap();
    let response = server.router.clone();
    let response = tower::ServiceExt::oneshot(response, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/vnd.debian.binary-package"
    );
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"hello_1.0_amd64.deb\""
    );
    assert_eq!(
        response.headers().get("x-checksum-sha256").unwrap(),
        &hex::encode(Sha256::digest(&deb))
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), deb.as_slice());
}

#[tokio::test]
async fn download_without_auth_respects_toggle() {
    // default: downloads require read credentials
    let server = TestServer::new().await;
    let deb = fixtures::deb("hello", "1.0", "amd64", &[]);
    upload(&server.router, ADMIN_KEY, STABLE_MAIN, "hello_1.0_amd64.deb", &deb).await;

    let request = Request::builder()
        .method("GET")
        .uri("/repo/stable/main/amd64/hello_1.0_amd64.deb")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // with the toggle off the same request succeeds anonymously
    let open_server = TestServer::with_config(|c| c.auth_on_download = false).await;
    upload(&open_server.router, ADMIN_KEY, STABLE_MAIN, "hello_1.0_amd64.deb", &deb).await;
    let request = Request::builder()
        .method("GET")
        .uri("/repo/stable/main/amd64/hello_1.0_amd64.deb")
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = send(&open_server.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes.as_ref(), deb.as_slice());
}

#[tokio::test]
async fn one_byte_file_fails_validation() {
    let server = TestServer::new().await;
    let (status, body) = upload(&server.router, ADMIN_KEY, STABLE_MAIN, "x.deb", b"x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation failed");
    assert!(body["detail"].as_str().unwrap().contains("Invalid ar archive"));
}

#[tokio::test]
async fn oversized_upload_is_rejected_with_413() {
    let server = TestServer::with_config(|c| c.max_upload_size = 1024).await;
    let oversized = vec![0u8; 1025];
    let (status, body) =
        upload(&server.router, ADMIN_KEY, STABLE_MAIN, "big_1.0_amd64.deb", &oversized).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{body}");
    assert_eq!(body["error"], "payload too large");
}

#[tokio::test]
async fn missing_file_part_fails_validation() {
    let server = TestServer::new().await;
    let body = {
        let mut body = Vec::new();
        body.extend(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"repo\"\r\n\r\ndefault\r\n--{}--\r\n",
                fixtures::BOUNDARY,
                fixtures::BOUNDARY
            )
            .into_bytes(),
        );
        body
    };
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/packages")
        .header("X-Api-Key", ADMIN_KEY)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", fixtures::BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&server.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn name_and_version_fall_back_to_filename() {
    let server = TestServer::new().await;
    // control file with no Package/Version/Architecture lines
    let deb = fixtures::deb_from_control("Maintainer: Test <t@example.com>\n");

    let (status, body) = upload(
        &server.router,
        ADMIN_KEY,
        STABLE_MAIN,
        "fallback_2.3_arm64.deb",
        &deb,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["name"], "fallback");
    assert_eq!(body["version"], "2.3");
    assert_eq!(body["architecture"], "arm64");
}

#[tokio::test]
async fn unresolvable_name_fails_validation() {
    let server = TestServer::new().await;
    let deb = fixtures::deb_from_control("Maintainer: Test <t@example.com>\n");
    let (status, body) =
        upload(&server.router, ADMIN_KEY, STABLE_MAIN, "garbage.deb", &deb).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation failed");
}

#[tokio::test]
async fn overwrite_replaces_artifact_and_entry() {
    let server = TestServer::new().await;
    let first = fixtures::deb("hello", "1.0", "amd64", &[]);
    let second = fixtures::deb("hello", "1.0", "amd64", &[("Section", "utils")]);
    assert_ne!(first, second);

    upload(&server.router, ADMIN_KEY, STABLE_MAIN, "hello_1.0_amd64.deb", &first).await;
    let (status, body) = upload(
        &server.router,
        ADMIN_KEY,
        STABLE_MAIN,
        "hello_1.0_amd64.deb",
        &second,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, listed) =
        json_request(&server.router, "GET", "/api/v1/packages", Some(ADMIN_KEY), None).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["sha256"], body["sha256"]);
    assert_eq!(listed[0]["sha256"], hex::encode(Sha256::digest(&second)).as_str());
}

#[tokio::test]
async fn read_key_cannot_upload() {
    let server = TestServer::new().await;
    let read_key = server.create_key(KeyRole::Read).await;
    let deb = fixtures::deb("hello", "1.0", "amd64", &[]);

    let (status, body) =
        upload(&server.router, &read_key, STABLE_MAIN, "hello_1.0_amd64.deb", &deb).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn delete_requires_admin() {
    let server = TestServer::new().await;
    let write_key = server.create_key(KeyRole::Write).await;
    let deb = fixtures::deb("hello", "1.0", "amd64", &[]);
    upload(&server.router, &write_key, STABLE_MAIN, "hello_1.0_amd64.deb", &deb).await;

    let uri = "/api/v1/packages/default/stable/main/amd64/hello/1.0";
    let (status, _) = json_request(&server.router, "DELETE", uri, Some(&write_key), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = json_request(&server.router, "DELETE", uri, Some(ADMIN_KEY), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // idempotent deletes are expected to 404
    let (status, _) = json_request(&server.router, "DELETE", uri, Some(ADMIN_KEY), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scoped_write_key_is_limited_to_its_repo() {
    let server = TestServer::new().await;
    let scoped = server
        .create_scoped_key(
            KeyRole::Write,
            KeyScope {
                repos: vec!["staging".to_string()],
                distributions: Vec::new(),
            },
        )
        .await;
    let deb = fixtures::deb("hello", "1.0", "amd64", &[]);

    let (status, _) =
        upload(&server.router, &scoped, STABLE_MAIN, "hello_1.0_amd64.deb", &deb).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let staging = &[
        ("repo", "staging"),
        ("distribution", "stable"),
        ("component", "main"),
    ];
    let (status, _) =
        upload(&server.router, &scoped, staging, "hello_1.0_amd64.deb", &deb).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn disallowed_repo_is_rejected() {
    let server =
        TestServer::with_config(|c| c.allowed_repos = vec!["default".to_string()]).await;
    let deb = fixtures::deb("hello", "1.0", "amd64", &[]);

    let other = &[
        ("repo", "other"),
        ("distribution", "stable"),
        ("component", "main"),
    ];
    let (status, body) =
        upload(&server.router, ADMIN_KEY, other, "hello_1.0_amd64.deb", &deb).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "repo not allowed");
}

#[tokio::test]
async fn traversal_in_fields_is_neutralized() {
    let server = TestServer::new().await;
    let deb = fixtures::deb("hello", "1.0", "amd64", &[]);
    let sneaky = &[
        ("repo", "../../etc"),
        ("distribution", "stable"),
        ("component", "main"),
    ];
    let (status, body) =
        upload(&server.router, ADMIN_KEY, sneaky, "hello_1.0_amd64.deb", &deb).await;
    // "../../etc" sanitizes to "etc": stored, but only under the data root
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["repo"], "etc");
}
