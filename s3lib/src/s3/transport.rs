//! HTTP传输层
//!
//! [Transport]是客户端与网络之间唯一的接缝：执行器只依赖这个trait，测试里可以替换成内存实现。
//! 每个[TransportResponse]都带着一个[ConnectionGuard]，guard被释放（显式调用或drop）后连接才会归还连接池。

use super::ClientConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::fmt::{Debug, Display, Formatter};
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::{Stream, StreamExt};
use url::Url;

/// 响应体的字节流
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;
/// 请求体的字节流
pub type UploadStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync>>;

pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    /// `length`会作为`Content-Length`发送
    Stream {
        stream: UploadStream,
        length: u64,
    },
}

impl RequestBody {
    pub fn content_length(&self) -> u64 {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(b) => b.len() as u64,
            RequestBody::Stream { length, .. } => *length,
        }
    }

    /// 内存中的body，用于计算`Content-MD5`
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RequestBody::Empty => Some(&[]),
            RequestBody::Bytes(b) => Some(b),
            RequestBody::Stream { .. } => None,
        }
    }
}

impl Debug for RequestBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "Empty"),
            RequestBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            RequestBody::Stream { length, .. } => write!(f, "Stream({length} bytes)"),
        }
    }
}

#[derive(Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// HEAD请求等没有body的响应为`None`
    pub body: Option<BodyStream>,
    pub connection: ConnectionGuard,
}

impl Debug for TransportResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .field("connection", &self.connection)
            .finish()
    }
}

/// 连接的占用凭证
///
/// 不论调用多少次[release](ConnectionGuard::release)，归还动作只会执行一次；
/// 没有显式释放的guard会在drop时释放。
pub struct ConnectionGuard {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ConnectionGuard {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// 没有归还动作的guard
    pub fn noop() -> Self {
        Self { release: None }
    }

    pub fn release(&mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl Debug for ConnectionGuard {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("released", &self.is_released())
            .finish()
    }
}

/// 网络错误：连接失败、被重置、超时等
#[derive(Debug)]
pub struct TransportError {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "request timed out"
        } else if e.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        Self::with_source(message, e)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// 基于reqwest连接池的默认实现
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| TransportError::with_source("failed to build http client", e))?;
        Ok(Self { http_client })
    }

    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let is_head = method == Method::HEAD;

        let mut req = self.http_client.request(method, url).headers(headers);
        req = match body {
            RequestBody::Empty => req,
            RequestBody::Bytes(bytes) => req.body(bytes),
            RequestBody::Stream { stream, .. } => req.body(reqwest::Body::wrap_stream(stream)),
        };

        let resp = req.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body: Option<BodyStream> = if is_head {
            None
        } else {
            Some(Box::pin(
                resp.bytes_stream()
                    .map(|item| item.map_err(std::io::Error::other)),
            ))
        };

        // reqwest在body读完或被drop时自动把连接放回池中
        let connection = ConnectionGuard::new(|| tracing::trace!("connection released"));
        Ok(TransportResponse {
            status,
            headers,
            body,
            connection,
        })
    }
}
