//! Deb and multipart fixtures, built in-process.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "pository-test-boundary";

/// Assemble one ar member with a 60-byte header.
fn ar_member(name: &str, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("{name:<16}").as_bytes());
    out.extend_from_slice(format!("{:<12}", 0).as_bytes());
    out.extend_from_slice(format!("{:<6}", 0).as_bytes());
    out.extend_from_slice(format!("{:<6}", 0).as_bytes());
    out.extend_from_slice(format!("{:<8}", 100644).as_bytes());
    out.extend_from_slice(format!("{:<10}", data.len()).as_bytes());
    out.extend_from_slice(b"`\n");
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(b'\n');
    }
    out
}

fn tar_gz_with_file(path: &str, contents: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_ustar();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, contents).unwrap();
    let tarball = builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tarball).unwrap();
    encoder.finish().unwrap()
}

/// Build a complete gzip-compressed deb from control file text.
pub fn deb_from_control(control: &str) -> Vec<u8> {
    let mut out = Vec::from(&b"!<arch>\n"[..]);
    out.extend(ar_member("debian-binary", b"2.0\n"));
    out.extend(ar_member(
        "control.tar.gz",
        &tar_gz_with_file("./control", control.as_bytes()),
    ));
    out.extend(ar_member(
        "data.tar.gz",
        &tar_gz_with_file("./usr/share/doc/placeholder", b"data"),
    ));
    out
}

/// Build a deb declaring the given identity plus extra control lines.
pub fn deb(name: &str, version: &str, arch: &str, extra_control: &[(&str, &str)]) -> Vec<u8> {
    let mut control = format!(
        "Package: {name}\nVersion: {version}\nArchitecture: {arch}\n\
         Maintainer: Test Packager <packager@example.com>\n"
    );
    for (field, value) in extra_control {
        control.push_str(&format!("{field}: {value}\n"));
    }
    control.push_str(&format!("Description: test package {name}\n"));
    deb_from_control(&control)
}

/// Assemble a `multipart/form-data` body with text fields and one file
/// part named `file`.
pub fn multipart_body(fields: &[(&str, &str)], filename: &str, file: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .into_bytes(),
        );
    }
    body.extend(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: application/vnd.debian.binary-package\r\n\r\n"
        )
        .into_bytes(),
    );
    body.extend_from_slice(file);
    body.extend(format!("\r\n--{BOUNDARY}--\r\n").into_bytes());
    body
}
