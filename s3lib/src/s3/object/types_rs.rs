use super::super::Client;
use crate::s3::ResponseBody;
use crate::s3::acl::CannedAcl;
use crate::s3::transport::UploadStream;
use bon::Builder;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use s3lib_common::helper::parse_gmt;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use time::OffsetDateTime;

/// 自定义元数据header的前缀
pub const META_PREFIX: &str = "x-amz-meta-";

// region:    --- put object
/// Header字段中：
/// - content_md5: 由程序自动添加
/// - content_length：由程序自动添加
/// - x_amz_acl: 未设置时为`private`
#[derive(Builder)]
pub struct PutObject<'a> {
    #[builder(start_fn)]
    pub(crate) client: &'a Client,
    // x-amz-meta-*，收集到map中
    #[builder(field)]
    pub(crate) custom_metas: BTreeMap<String, String>,
    #[builder(field)]
    pub(crate) extra_headers: BTreeMap<String, String>,

    /// 对于MIME不会进行检查合法性检查
    pub(crate) content_type: Option<&'a str>,
    pub(crate) cache_control: Option<&'a str>,
    pub(crate) content_disposition: Option<&'a str>,
    pub(crate) content_encoding: Option<&'a str>,
    pub(crate) expires: Option<&'a str>,
    #[builder(default)]
    pub(crate) acl: CannedAcl,
}

pub trait MetaExt<'a>: Sized {
    fn custom_metas_mut(&mut self) -> &mut BTreeMap<String, String>;

    /// 添加`x-amz-meta-{key}: val`
    fn x_meta(mut self, key: &'a str, val: &'a str) -> Self {
        self.custom_metas_mut()
            .insert(format!("{META_PREFIX}{}", key.to_ascii_lowercase()), val.to_owned());
        self
    }

    fn x_metas(mut self, metas: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (key, val) in metas {
            self.custom_metas_mut()
                .insert(format!("{META_PREFIX}{}", key.to_ascii_lowercase()), val.to_owned());
        }
        self
    }
}

impl<'a, S: put_object_builder::State> MetaExt<'a> for PutObjectBuilder<'a, S> {
    fn custom_metas_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.custom_metas
    }
}

impl<'a, S: put_object_builder::State> PutObjectBuilder<'a, S> {
    /// 其它需要原样发送的header
    pub fn header(mut self, name: &'a str, value: &'a str) -> Self {
        self.extra_headers
            .insert(name.to_ascii_lowercase(), value.to_owned());
        self
    }
}

pub enum PutObjectBody<'a> {
    Bytes(Bytes),
    FilePath(&'a Path),
    /// 调用者提供的流，需要给出长度和base64编码的MD5
    Stream {
        stream: UploadStream,
        length: u64,
        content_md5: String,
    },
}

impl Debug for PutObjectBody<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PutObjectBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            PutObjectBody::FilePath(p) => write!(f, "FilePath({})", p.display()),
            PutObjectBody::Stream { length, .. } => write!(f, "Stream({length} bytes)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PutObjectResponseHeader {
    pub e_tag: Option<String>,
    pub version_id: Option<String>,
}
// endregion: --- put object

// region:    --- get object
/// GET/HEAD返回的object信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_length: u64,
    /// 原始值，一般是带引号的16进制MD5
    pub e_tag: String,
    /// 无法解析的时候为None
    pub last_modified: Option<OffsetDateTime>,
    pub content_type: Option<String>,
    /// 去掉`x-amz-meta-`前缀后的自定义元数据
    pub custom_metas: BTreeMap<String, String>,
}

impl ObjectMetadata {
    /// 缺少必须的header时返回原因
    pub(crate) fn from_headers(headers: &HeaderMap) -> Result<Self, String> {
        let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let content_length = header_str("content-length")
            .ok_or("missing Content-Length header")?
            .trim()
            .parse::<u64>()
            .map_err(|_| "invalid Content-Length header".to_owned())?;
        let e_tag = header_str("etag").ok_or("missing ETag header")?.to_owned();
        let last_modified = header_str("last-modified").and_then(|s| parse_gmt(s).ok());
        let content_type = header_str("content-type").map(str::to_owned);

        let custom_metas = headers
            .iter()
            .filter_map(|(k, v)| {
                let key = k.as_str().strip_prefix(META_PREFIX)?;
                let val = v.to_str().ok()?;
                Some((key.to_owned(), val.to_owned()))
            })
            .collect();

        Ok(Self {
            content_length,
            e_tag,
            last_modified,
            content_type,
            custom_metas,
        })
    }

    /// ETag是16进制MD5时返回解码后的digest，分片上传等情况下的ETag返回None
    pub fn md5_digest(&self) -> Option<[u8; 16]> {
        let hex_str = self.e_tag.trim_matches('"');
        if hex_str.len() != 32 {
            return None;
        }
        let mut digest = [0u8; 16];
        hex::decode_to_slice(hex_str, &mut digest).ok()?;
        Some(digest)
    }
}

#[derive(Debug)]
pub struct GetObjectOutput {
    pub metadata: ObjectMetadata,
    pub body: ResponseBody,
}
// endregion: --- get object
