use super::request::Operation;
use crate::credentials::Credentials;
use crate::s3::Error;
use base64::{Engine, engine::general_purpose};
use s3lib_common::helper::{gmt_format, sign_hmac_sha1};
use std::fmt::{Display, Formatter};
use time::OffsetDateTime;
// 签名文档：https://docs.aws.amazon.com/AmazonS3/latest/userguide/RESTAuthentication.html

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HTTPVerb {
    Get,
    Put,
    Post,
    Delete,
    Head,
}

impl HTTPVerb {
    pub fn method(&self) -> reqwest::Method {
        match self {
            HTTPVerb::Get => reqwest::Method::GET,
            HTTPVerb::Put => reqwest::Method::PUT,
            HTTPVerb::Post => reqwest::Method::POST,
            HTTPVerb::Delete => reqwest::Method::DELETE,
            HTTPVerb::Head => reqwest::Method::HEAD,
        }
    }
}

impl Display for HTTPVerb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HTTPVerb::Get => write!(f, "GET"),
            HTTPVerb::Put => write!(f, "PUT"),
            HTTPVerb::Post => write!(f, "POST"),
            HTTPVerb::Delete => write!(f, "DELETE"),
            HTTPVerb::Head => write!(f, "HEAD"),
        }
    }
}

/// 参与签名的查询参数，分页参数(prefix, marker, max-keys, delimiter)不在其中
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "cors",
    "delete",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "website",
];

// x-amz-开头的header, 按名称排序, 每行`name:value\n`
fn canonicalized_amz_headers(op: &Operation) -> String {
    // op.headers的key已经是小写，BTreeMap保证了顺序
    op.headers
        .iter()
        .filter(|(k, _)| k.starts_with("x-amz-"))
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect()
}

fn canonicalized_resource(op: &Operation) -> String {
    let mut s = op.resource_path();
    let sub_resources = op
        .query
        .iter()
        .filter(|(k, _)| SUB_RESOURCES.contains(&k.as_str()))
        .map(|(k, v)| match v {
            Some(v) => format!("{k}={v}"),
            None => k.clone(),
        })
        .collect::<Vec<_>>();
    if !sub_resources.is_empty() {
        s.push('?');
        s.push_str(&sub_resources.join("&"));
    }
    s
}

/// VERB\nContent-MD5\nContent-Type\nDate\n<amz headers><resource>
pub fn string_to_sign(op: &Operation, date: &str) -> String {
    let content_md5 = op.header_value("content-md5").unwrap_or_default();
    let content_type = op.header_value("content-type").unwrap_or_default();
    // 有x-amz-date时Date行留空
    let date = if op.header_value("x-amz-date").is_some() {
        ""
    } else {
        date
    };

    format!(
        "{}\n{}\n{}\n{}\n{}{}",
        op.verb,
        content_md5,
        content_type,
        date,
        canonicalized_amz_headers(op),
        canonicalized_resource(op)
    )
}

pub fn signature(secret: &str, string_to_sign: &str) -> Result<String, Error> {
    let digest = sign_hmac_sha1(secret, string_to_sign)?;
    Ok(general_purpose::STANDARD.encode(digest))
}

/// 计算`Authorization`的值: `AWS {access_key_id}:{signature}`
///
/// 结果只取决于传入的参数，相同的输入总是得到相同的签名
pub fn sign(
    credentials: &Credentials,
    op: &Operation,
    date_time: &OffsetDateTime,
) -> Result<String, Error> {
    let date = gmt_format(date_time)?;
    let str_to_sign = string_to_sign(op, &date);
    let signature = signature(&credentials.secret_access_key, &str_to_sign)?;
    Ok(format!("AWS {}:{}", credentials.access_key_id, signature))
}
