//! Bucket相关操作

use crate::s3::Client;
use crate::s3::Error;
use crate::s3::acl::{ACL_HEADER, CannedAcl};
use crate::s3::listing::{ObjectListing, parse_listing};
use crate::s3::request::Operation;
use crate::s3::sign_v2::HTTPVerb;
use crate::s3::utils::validate_bucket_name;
use bon::Builder;

// region:    --- list objects
/// 分页参数不参与签名
#[derive(Builder)]
pub struct ListObjects<'a> {
    #[builder(start_fn)]
    pub(crate) client: &'a Client,
    #[builder(start_fn)]
    pub(crate) bucket: &'a str,
    prefix: Option<&'a str>,
    marker: Option<&'a str>,
    max_keys: Option<u32>,
    delimiter: Option<&'a str>,
}

impl ListObjects<'_> {
    pub async fn send(&self) -> Result<ObjectListing, Error> {
        validate_bucket_name(self.bucket)?;

        let mut op = Operation::new(HTTPVerb::Get).bucket(self.bucket);
        let params = [
            ("prefix", self.prefix.map(str::to_owned)),
            ("marker", self.marker.map(str::to_owned)),
            ("max-keys", self.max_keys.map(|n| n.to_string())),
            ("delimiter", self.delimiter.map(str::to_owned)),
        ];
        for (name, value) in params {
            if let Some(value) = value {
                op = op.query(name, value);
            }
        }

        let resource = op.resource_path();
        let resp = self.client.executor().execute(op).await?;
        let body = resp
            .body
            .ok_or_else(|| Error::protocol(resource, "missing response body"))?;
        let document = body.bytes().await?;
        parse_listing(&document)
    }
}
// endregion: --- list objects

impl Client {
    pub fn list_objects<'a>(&'a self, bucket: &'a str) -> ListObjectsBuilder<'a> {
        ListObjects::builder(self, bucket)
    }

    pub async fn create_bucket(&self, bucket: &str, acl: CannedAcl) -> Result<(), Error> {
        validate_bucket_name(bucket)?;

        let op = Operation::new(HTTPVerb::Put)
            .bucket(bucket)
            .header(ACL_HEADER, acl.as_str());
        self.executor().execute_without_body(op).await?;
        Ok(())
    }

    /// bucket不为空时返回`BucketNotEmpty`
    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), Error> {
        validate_bucket_name(bucket)?;

        let op = Operation::new(HTTPVerb::Delete).bucket(bucket);
        self.executor().execute_without_body(op).await?;
        Ok(())
    }
}
