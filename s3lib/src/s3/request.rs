//! 一次逻辑调用的描述
//!
//! [Operation]只负责记录请求的各个部分；签名和发送由[RequestExecutor](super::execute::RequestExecutor)完成，
//! 签名过程不会修改`Operation`中的任何字段。

use super::sign_v2::HTTPVerb;
use super::transport::RequestBody;
use super::utils::KEY_ENCODE_SET;
use bytes::Bytes;
use percent_encoding::utf8_percent_encode;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct Operation {
    pub(crate) verb: HTTPVerb,
    pub(crate) bucket: Option<String>,
    pub(crate) key: Option<String>,
    // value为None的是`?acl`这种不带值的参数
    pub(crate) query: BTreeMap<String, Option<String>>,
    // key统一为小写
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) body: RequestBody,
}

impl Operation {
    pub fn new(verb: HTTPVerb) -> Self {
        Self {
            verb,
            bucket: None,
            key: None,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), Some(value.into()));
        self
    }

    /// 不带值的查询参数，如`acl`
    pub fn sub_resource(mut self, name: impl Into<String>) -> Self {
        self.query.insert(name.into(), None);
        self
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn bytes_body(self, bytes: impl Into<Bytes>) -> Self {
        self.body(RequestBody::Bytes(bytes.into()))
    }

    pub fn verb(&self) -> HTTPVerb {
        self.verb
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 编码后的请求路径: `/`, `/bucket/`, `/bucket/key`
    pub fn resource_path(&self) -> String {
        match (&self.bucket, &self.key) {
            (Some(bucket), Some(key)) => format!(
                "/{}/{}",
                bucket,
                utf8_percent_encode(key, KEY_ENCODE_SET)
            ),
            (Some(bucket), None) => format!("/{bucket}/"),
            _ => "/".to_owned(),
        }
    }
}
