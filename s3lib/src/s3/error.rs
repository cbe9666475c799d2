use super::service_error::ServiceError;
use super::transport::TransportError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// 网络层面的错误（连接失败、重置、超时等），不会自动重试
    #[error("transport error on `{resource}`: {source}")]
    Transport {
        resource: String,
        #[source]
        source: TransportError,
    },
    /// 服务端的响应缺少必须的header或body，一般说明服务端与客户端不兼容
    #[error("protocol violation on `{resource}`: {reason}")]
    ProtocolViolation { resource: String, reason: String },
    /// 服务端明确拒绝了请求
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
    /// 对返回的xml反序列化失败，说明服务端返回的数据结构和预期不一致
    #[error("xml deserialize error: {0}")]
    XmlDeserialize(#[from] quick_xml::DeError),
    #[error("error: {0}")]
    Common(#[from] s3lib_common::Error),
}

impl Error {
    pub(crate) fn protocol(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ProtocolViolation {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(resource: impl Into<String>, source: TransportError) -> Self {
        Error::Transport {
            resource: resource.into(),
            source,
        }
    }

    /// 服务端拒绝请求时返回对应的[ServiceError]
    pub fn as_service_error(&self) -> Option<&ServiceError> {
        match self {
            Error::Service(e) => Some(e),
            _ => None,
        }
    }
}
