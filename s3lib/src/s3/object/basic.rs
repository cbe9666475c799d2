//! 关于Object操作/基础操作

use super::types_rs::*;
use crate::s3::Client;
use crate::s3::Error;
use crate::s3::acl::ACL_HEADER;
use crate::s3::request::Operation;
use crate::s3::sign_v2::HTTPVerb;
use crate::s3::transport::RequestBody;
use crate::s3::utils::{compute_md5_from_file, validate_bucket_name, validate_object_key};
use s3lib_common::helper::content_md5;
use tokio_util::io::ReaderStream;

impl PutObject<'_> {
    /// - `key`：如果需要创建文件夹，以`/`结尾，body为空即可
    /// - 未设置acl时使用`private`
    pub async fn send(
        &self,
        bucket: &str,
        key: &str,
        object: PutObjectBody<'_>,
    ) -> Result<PutObjectResponseHeader, Error> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;

        let mut op = Operation::new(HTTPVerb::Put)
            .bucket(bucket)
            .key(key)
            .header(ACL_HEADER, self.acl.as_str());
        let optional_headers = [
            ("content-type", self.content_type),
            ("cache-control", self.cache_control),
            ("content-disposition", self.content_disposition),
            ("content-encoding", self.content_encoding),
            ("expires", self.expires),
        ];
        for (name, value) in optional_headers {
            if let Some(value) = value {
                op = op.header(name, value);
            }
        }
        for (k, v) in self.extra_headers.iter().chain(&self.custom_metas) {
            op = op.header(k, v.as_str());
        }

        let op = match object {
            PutObjectBody::Bytes(bytes) => op
                .header("content-md5", content_md5(&bytes))
                .body(RequestBody::Bytes(bytes)),
            PutObjectBody::FilePath(path) => {
                let length = tokio::fs::metadata(path).await?.len();
                let md5 = compute_md5_from_file(path).await?;
                let file = tokio::fs::File::open(path).await?;
                op.header("content-md5", md5).body(RequestBody::Stream {
                    stream: Box::pin(ReaderStream::new(file)),
                    length,
                })
            }
            PutObjectBody::Stream {
                stream,
                length,
                content_md5,
            } => op
                .header("content-md5", content_md5)
                .body(RequestBody::Stream { stream, length }),
        };

        let resp = self.client.executor().execute_without_body(op).await?;
        let header_str = |name: &str| {
            resp.headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        Ok(PutObjectResponseHeader {
            e_tag: header_str("etag"),
            version_id: header_str("x-amz-version-id"),
        })
    }
}

/// Object基础操作
impl Client {
    pub fn put_object(&self) -> PutObjectBuilder<'_> {
        PutObject::builder(self)
    }

    /// 返回的body需要读完、关闭或drop，连接才会释放
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectOutput, Error> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;

        let op = Operation::new(HTTPVerb::Get).bucket(bucket).key(key);
        let resource = op.resource_path();
        let (metadata, body) = self.executor().fetch_object(op).await?;
        let body = body.ok_or_else(|| Error::protocol(resource, "missing response body"))?;
        Ok(GetObjectOutput { metadata, body })
    }

    /// 只获取元数据，连接立即释放
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, Error> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;

        let op = Operation::new(HTTPVerb::Head).bucket(bucket).key(key);
        let (metadata, _) = self.executor().fetch_object(op).await?;
        Ok(metadata)
    }

    /// 无论object是否存在都会返回成功
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), Error> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;

        let op = Operation::new(HTTPVerb::Delete).bucket(bucket).key(key);
        self.executor().execute_without_body(op).await?;
        Ok(())
    }
}
