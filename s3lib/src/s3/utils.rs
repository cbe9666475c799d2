use crate::s3::Error;
use base64::{Engine, engine::general_purpose};
use md5::{Digest, Md5};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// object key在path中编码时保留`/`和unreserved字符
pub(crate) const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

// 用 buffer 读文件并计算MD5
pub(crate) async fn compute_md5_from_file(path: &Path) -> Result<String, Error> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(general_purpose::STANDARD.encode(hasher.finalize()))
}

pub(crate) fn validate_bucket_name(name: &str) -> Result<(), Error> {
    let len = name.len();
    if !(3..=63).contains(&len) {
        return Err(Error::InvalidRequest(format!(
            "bucket name must be 3-63 characters long, got {len}"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(Error::InvalidRequest(format!(
            "bucket name `{name}` may only contain lowercase letters, digits, '-' and '.'"
        )));
    }
    let first = name.as_bytes()[0];
    let last = name.as_bytes()[len - 1];
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(Error::InvalidRequest(format!(
            "bucket name `{name}` must start and end with a letter or digit"
        )));
    }
    Ok(())
}

pub(crate) fn validate_object_key(key: &str) -> Result<(), Error> {
    let len = key.len();
    if len == 0 {
        return Err(Error::InvalidRequest("object key cannot be empty".to_owned()));
    }
    if len > 1024 {
        return Err(Error::InvalidRequest(
            "object key is too long, max is 1024 bytes".to_owned(),
        ));
    }
    if key.starts_with('/') {
        return Err(Error::InvalidRequest(
            "object key cannot start with '/'".to_owned(),
        ));
    }
    if key.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(Error::InvalidRequest(
            "object key cannot contain control characters".to_owned(),
        ));
    }
    // url会把`.`和`..`当作相对路径处理，发送的路径会和签名的不一致
    if key.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(Error::InvalidRequest(format!(
            "object key `{key}` cannot contain `.` or `..` path segments"
        )));
    }
    Ok(())
}

#[test]
fn validate_bucket_name_test() {
    assert!(validate_bucket_name("my-bucket.logs").is_ok());
    assert!(validate_bucket_name("abc").is_ok());

    assert!(validate_bucket_name("ab").is_err());
    assert!(validate_bucket_name(&"a".repeat(64)).is_err());
    assert!(validate_bucket_name("My-Bucket").is_err());
    assert!(validate_bucket_name("-bucket").is_err());
    assert!(validate_bucket_name("bucket.").is_err());
    assert!(validate_bucket_name("bu_cket").is_err());
}

#[test]
fn validate_object_key_test() {
    assert!(validate_object_key("stream.0").is_ok());
    assert!(validate_object_key("dir/subdir/文件 01.log").is_ok());
    assert!(validate_object_key("a/b/").is_ok());
    assert!(validate_object_key("a/..b/c..txt/.hidden").is_ok());

    assert!(validate_object_key("").is_err());
    assert!(validate_object_key(&"a".repeat(1025)).is_err());
    assert!(validate_object_key("/leading").is_err());
    assert!(validate_object_key("line\nbreak").is_err());
    assert!(validate_object_key("a/../secret.txt").is_err());
    assert!(validate_object_key("./a.txt").is_err());
    assert!(validate_object_key("a/..").is_err());
}

#[tokio::test]
async fn compute_md5_from_file_test() {
    let path = std::env::temp_dir().join("s3lib_compute_md5_from_file_test.txt");
    tokio::fs::write(&path, b"0123456789").await.unwrap();
    let md5 = compute_md5_from_file(&path).await.unwrap();
    let _ = tokio::fs::remove_file(&path).await;
    assert_eq!(md5, "eB5eJF1ptWaXm4bijSPyxw==");
}
