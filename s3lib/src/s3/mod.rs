//! s3 sdk
//!
//! 接口文档：<https://docs.aws.amazon.com/AmazonS3/latest/API/Welcome.html>
//!
//! 注意：
//!
//! - 只使用path-style的url，签名为v2（header携带）
//! - 所有请求都不会自动重试，重试策略由调用者决定

// 所有api最终都通过execute.rs发送，具体步骤可参考其中的注释

pub mod acl;
pub mod bucket;
pub mod execute;
pub mod listing;
pub mod object;
pub mod request;
pub mod service_error;
pub mod sign_v2;
pub mod transport;

mod body;
mod error;
pub(crate) mod utils;

pub use body::ResponseBody;
pub use error::Error;
pub use service_error::{ErrorKind, ServiceError};

use crate::credentials::Credentials;
use bon::{Builder, bon};
use execute::RequestExecutor;
use serde::Deserialize;
use std::sync::Arc;
use transport::{ReqwestTransport, Transport};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://s3.amazonaws.com";
/// 错误响应最多读取的字节数
pub const DEFAULT_MAX_ERROR_BODY: usize = 2048;

/// 客户端配置，可以从配置文件中反序列化，缺省的字段使用默认值
#[derive(Debug, Clone, Builder, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[builder(default = DEFAULT_ENDPOINT.to_owned(), into)]
    pub endpoint: String,
    pub connect_timeout_secs: Option<u64>,
    /// 单个请求的超时时间，包括读取body
    pub timeout_secs: Option<u64>,
    #[builder(default = DEFAULT_MAX_ERROR_BODY)]
    pub max_error_body: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    executor: RequestExecutor,
}

/// 创建s3客户端
#[bon]
impl Client {
    /// 没有传入`transport`时使用[ReqwestTransport]
    #[builder]
    pub fn new(
        credentials: Credentials,
        #[builder(default)] config: ClientConfig,
        transport: Option<Arc<dyn Transport>>,
    ) -> Result<Self, Error> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            Error::InvalidRequest(format!("invalid endpoint `{}`: {e}", config.endpoint))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::InvalidRequest(format!(
                "invalid endpoint `{}`",
                config.endpoint
            )));
        }
        let transport = match transport {
            Some(t) => t,
            None => Arc::new(
                ReqwestTransport::new(&config)
                    .map_err(|e| Error::transport(config.endpoint.clone(), e))?,
            ),
        };
        tracing::debug!(endpoint = %endpoint, "s3 client created");

        Ok(Self {
            executor: RequestExecutor::new(credentials, endpoint, transport, config.max_error_body),
        })
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn endpoint(&self) -> &str {
        self.executor.endpoint().as_str()
    }
}
