//! 服务端错误的分类
//!
//! 服务端返回的错误文档形如：
//!
//! ```xml
//! <Error>
//!   <Code>NoSuchKey</Code>
//!   <Message>The specified key does not exist.</Message>
//!   <RequestId>4442587FB7D0A2F9</RequestId>
//!   <HostId>...</HostId>
//! </Error>
//! ```
//!
//! `Code`通过静态表[ERROR_CODES]映射为[ErrorKind]，表中没有的code统一归为[ErrorKind::Unknown]，
//! 原始的code保留在[ServiceError::code]中。

use serde::Deserialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    AccessDenied,
    AccountProblem,
    AllAccessDisabled,
    AmbiguousGrantByEmailAddress,
    OperationAborted,
    BadDigest,
    BucketAlreadyExists,
    BucketNotEmpty,
    CredentialsNotSupported,
    EntityTooLarge,
    IncompleteBody,
    InternalError,
    InvalidAccessKeyId,
    InvalidAddressingHeader,
    InvalidArgument,
    InvalidBucketName,
    InvalidDigest,
    InvalidRange,
    InvalidSecurity,
    InvalidSoapRequest,
    InvalidStorageClass,
    InvalidTargetBucketForLogging,
    KeyTooLong,
    InvalidUri,
    MalformedAcl,
    MalformedXml,
    MaxMessageLengthExceeded,
    MetadataTooLarge,
    MethodNotAllowed,
    MissingAttachment,
    MissingContentLength,
    MissingSecurityElement,
    MissingSecurityHeader,
    NoLoggingStatusForKey,
    NoSuchBucket,
    NoSuchKey,
    NotImplemented,
    NotSignedUp,
    PreconditionFailed,
    RequestTimeout,
    RequestTimeTooSkewed,
    RequestTorrentOfBucketError,
    SignatureDoesNotMatch,
    /// 没有code、无法解析或不在[ERROR_CODES]中
    Unknown,
}

/// code -> kind -> description
///
/// 查找区分大小写；一个kind可以对应多个code，第一个为标准code
pub static ERROR_CODES: &[(&str, ErrorKind, &str)] = &[
    ("AccessDenied", ErrorKind::AccessDenied, "Access Denied"),
    (
        "AccountProblem",
        ErrorKind::AccountProblem,
        "There is a problem with your account that prevents the operation from completing successfully.",
    ),
    (
        "AllAccessDisabled",
        ErrorKind::AllAccessDisabled,
        "All access to this object has been disabled.",
    ),
    (
        "AmbiguousGrantByEmailAddress",
        ErrorKind::AmbiguousGrantByEmailAddress,
        "The e-mail address you provided is associated with more than one account.",
    ),
    (
        "OperationAborted",
        ErrorKind::OperationAborted,
        "A conflicting conditional operation is currently in progress against this resource.",
    ),
    (
        "BadDigest",
        ErrorKind::BadDigest,
        "The Content-MD5 you specified did not match what we received.",
    ),
    (
        "BucketAlreadyExists",
        ErrorKind::BucketAlreadyExists,
        "The named bucket you tried to create already exists.",
    ),
    (
        "BucketNotEmpty",
        ErrorKind::BucketNotEmpty,
        "The bucket you tried to delete is not empty.",
    ),
    (
        "CredentialsNotSupported",
        ErrorKind::CredentialsNotSupported,
        "This request does not support credentials.",
    ),
    (
        "EntityTooLarge",
        ErrorKind::EntityTooLarge,
        "Your proposed upload exceeds the maximum allowed object size.",
    ),
    (
        "IncompleteBody",
        ErrorKind::IncompleteBody,
        "You did not provide the number of bytes specified by the Content-Length HTTP header.",
    ),
    (
        "InternalError",
        ErrorKind::InternalError,
        "We encountered an internal error. Please try again.",
    ),
    (
        "InvalidAccessKeyId",
        ErrorKind::InvalidAccessKeyId,
        "The access key id you provided does not exist in our records.",
    ),
    (
        "InvalidAddressingHeader",
        ErrorKind::InvalidAddressingHeader,
        "You must specify the Anonymous role.",
    ),
    ("InvalidArgument", ErrorKind::InvalidArgument, "Invalid Argument"),
    (
        "InvalidBucketName",
        ErrorKind::InvalidBucketName,
        "The specified bucket is not valid.",
    ),
    (
        "InvalidDigest",
        ErrorKind::InvalidDigest,
        "The Content-MD5 you specified was invalid.",
    ),
    (
        "InvalidRange",
        ErrorKind::InvalidRange,
        "The requested range is not satisfiable.",
    ),
    (
        "InvalidSecurity",
        ErrorKind::InvalidSecurity,
        "The provided security credentials are not valid.",
    ),
    (
        "InvalidSOAPRequest",
        ErrorKind::InvalidSoapRequest,
        "The SOAP request body is invalid.",
    ),
    (
        "InvalidStorageClass",
        ErrorKind::InvalidStorageClass,
        "The storage class you specified is not valid.",
    ),
    (
        "InvalidTargetBucketForLogging",
        ErrorKind::InvalidTargetBucketForLogging,
        "The target bucket for logging does not exist or is not owned by you.",
    ),
    ("KeyTooLong", ErrorKind::KeyTooLong, "Your key is too long."),
    ("KeyTooLongError", ErrorKind::KeyTooLong, "Your key is too long."),
    (
        "InvalidURI",
        ErrorKind::InvalidUri,
        "Couldn't parse the specified URI.",
    ),
    (
        "MalformedACLError",
        ErrorKind::MalformedAcl,
        "The ACL you provided was not well-formed or did not validate against the published schema.",
    ),
    (
        "MalformedXMLError",
        ErrorKind::MalformedXml,
        "The XML you provided was not well-formed or did not validate against the published schema.",
    ),
    (
        "MalformedXML",
        ErrorKind::MalformedXml,
        "The XML you provided was not well-formed or did not validate against the published schema.",
    ),
    (
        "MaxMessageLengthExceeded",
        ErrorKind::MaxMessageLengthExceeded,
        "Your request was too big.",
    ),
    (
        "MetadataTooLarge",
        ErrorKind::MetadataTooLarge,
        "Your metadata headers exceed the maximum allowed metadata size.",
    ),
    (
        "MethodNotAllowed",
        ErrorKind::MethodNotAllowed,
        "The specified method is not allowed against this resource.",
    ),
    (
        "MissingAttachment",
        ErrorKind::MissingAttachment,
        "A SOAP attachment was expected, but none were found.",
    ),
    (
        "MissingContentLength",
        ErrorKind::MissingContentLength,
        "You must provide the Content-Length HTTP header.",
    ),
    (
        "MissingSecurityElement",
        ErrorKind::MissingSecurityElement,
        "The SOAP 1.1 request is missing a security element.",
    ),
    (
        "MissingSecurityHeader",
        ErrorKind::MissingSecurityHeader,
        "Your request was missing a required header.",
    ),
    (
        "NoLoggingStatusForKey",
        ErrorKind::NoLoggingStatusForKey,
        "There is no such thing as a logging status sub-resource for a key.",
    ),
    (
        "NoSuchBucket",
        ErrorKind::NoSuchBucket,
        "The specified bucket does not exist.",
    ),
    (
        "NoSuchKey",
        ErrorKind::NoSuchKey,
        "The specified key does not exist.",
    ),
    (
        "NotImplemented",
        ErrorKind::NotImplemented,
        "A header you provided implies functionality that is not implemented.",
    ),
    (
        "NotSignedUp",
        ErrorKind::NotSignedUp,
        "Your account is not signed up for the service.",
    ),
    (
        "PreconditionFailed",
        ErrorKind::PreconditionFailed,
        "At least one of the pre-conditions you specified did not hold.",
    ),
    (
        "RequestTimeout",
        ErrorKind::RequestTimeout,
        "Your socket connection to the server was not read from or written to within the timeout period.",
    ),
    (
        "RequestTimeTooSkewed",
        ErrorKind::RequestTimeTooSkewed,
        "The difference between the request time and the server's time is too large.",
    ),
    (
        "RequestTorrentOfBucketError",
        ErrorKind::RequestTorrentOfBucketError,
        "Requesting the torrent file of a bucket is not permitted.",
    ),
    (
        "SignatureDoesNotMatch",
        ErrorKind::SignatureDoesNotMatch,
        "The request signature we calculated does not match the signature you provided.",
    ),
];

impl ErrorKind {
    pub fn from_code(code: &str) -> Self {
        ERROR_CODES
            .iter()
            .find(|(c, _, _)| *c == code)
            .map_or(ErrorKind::Unknown, |(_, kind, _)| *kind)
    }

    /// 标准code，[ErrorKind::Unknown]返回`None`
    pub fn code(self) -> Option<&'static str> {
        ERROR_CODES
            .iter()
            .find(|(_, kind, _)| *kind == self)
            .map(|(c, _, _)| *c)
    }

    pub fn description(self) -> &'static str {
        ERROR_CODES
            .iter()
            .find(|(_, kind, _)| *kind == self)
            .map_or("An unhandled service error code was returned.", |(_, _, d)| {
                *d
            })
    }
}

/// 服务端返回的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub kind: ErrorKind,
    /// `<Code>`的原始值，即使[ErrorKind::Unknown]也会保留
    pub code: Option<String>,
    pub message: String,
    pub request_id: Option<String>,
    pub host_id: Option<String>,
    /// 由executor补充
    pub status: Option<u16>,
    /// 由executor补充
    pub resource: Option<String>,
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let code = self.code.as_deref().unwrap_or("unknown service error");
        write!(f, "{code}: {}", self.message)?;
        if let Some(status) = self.status {
            write!(f, " (status: {status}")?;
            if let Some(resource) = &self.resource {
                write!(f, ", resource: {resource}")?;
            }
            write!(f, ")")?;
        }
        if self.request_id.is_some() || self.host_id.is_some() {
            write!(
                f,
                " [request id: {}, host id: {}]",
                self.request_id.as_deref().unwrap_or("-"),
                self.host_id.as_deref().unwrap_or("-")
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct ErrorDocument {
    code: Option<String>,
    message: Option<String>,
    request_id: Option<String>,
    host_id: Option<String>,
}

/// 把错误文档解析为[ServiceError]，不会失败
pub fn classify(document: &[u8]) -> ServiceError {
    let raw = String::from_utf8_lossy(document);
    let raw = raw.trim();

    let doc = match quick_xml::de::from_str::<ErrorDocument>(raw) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable error document");
            return ServiceError {
                kind: ErrorKind::Unknown,
                code: None,
                message: raw.to_owned(),
                request_id: None,
                host_id: None,
                status: None,
                resource: None,
            };
        }
    };

    let kind = doc
        .code
        .as_deref()
        .map_or(ErrorKind::Unknown, ErrorKind::from_code);
    let message = match (doc.message, &doc.code) {
        (Some(m), _) => m,
        (None, Some(code)) if kind == ErrorKind::Unknown => {
            format!("an unhandled error code was returned: {code}")
        }
        (None, Some(_)) => kind.description().to_owned(),
        // 什么都没有解析出来，保留原文
        (None, None) => raw.to_owned(),
    };

    ServiceError {
        kind,
        code: doc.code,
        message,
        request_id: doc.request_id,
        host_id: doc.host_id,
        status: None,
        resource: None,
    }
}
