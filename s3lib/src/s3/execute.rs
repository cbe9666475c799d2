//! 请求的签名、发送和响应分类
//!
//! 所有API都通过[RequestExecutor]发送：
//! 1. 用[sign](super::sign_v2::sign)计算`Authorization`并发送
//! 2. 网络错误直接返回[Error::Transport]，不会重试
//! 3. 2xx：需要body时返回绑定连接的[ResponseBody]，否则立即释放连接
//! 4. 其它状态码：最多读取`max_error_body`字节的错误文档，释放连接后交给[classify]
//!
//! 每个请求只释放一次连接。

use super::body::ResponseBody;
use super::object::ObjectMetadata;
use super::request::Operation;
use super::service_error::classify;
use super::sign_v2::{HTTPVerb, sign};
use super::transport::{
    BodyStream, RequestBody, Transport, TransportError, TransportRequest, TransportResponse,
};
use crate::credentials::Credentials;
use crate::s3::Error;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use s3lib_common::helper::{gmt_format, into_header_map};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio_stream::StreamExt;
use tracing::Instrument;
use url::Url;

#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// 只有需要body的请求才会有
    pub body: Option<ResponseBody>,
}

#[derive(Clone)]
pub struct RequestExecutor {
    credentials: Arc<Credentials>,
    endpoint: Url,
    transport: Arc<dyn Transport>,
    max_error_body: usize,
}

impl RequestExecutor {
    pub(crate) fn new(
        credentials: Credentials,
        endpoint: Url,
        transport: Arc<dyn Transport>,
        max_error_body: usize,
    ) -> Self {
        Self {
            credentials: Arc::new(credentials),
            endpoint,
            transport,
            max_error_body,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// 发送请求并返回带body的响应；HEAD请求不会有body
    pub async fn execute(&self, op: Operation) -> Result<Response, Error> {
        let expect_body = op.verb != HTTPVerb::Head;
        self.dispatch(op, expect_body).await
    }

    /// 发送请求，不需要body，连接在返回前释放
    pub async fn execute_without_body(&self, op: Operation) -> Result<Response, Error> {
        self.dispatch(op, false).await
    }

    /// GET/HEAD object，读取必须的header
    ///
    /// 缺少`Content-Length`或`ETag`时返回[Error::ProtocolViolation]，连接已经释放
    pub async fn fetch_object(
        &self,
        op: Operation,
    ) -> Result<(ObjectMetadata, Option<ResponseBody>), Error> {
        let resource = op.resource_path();
        let Response { headers, body, .. } = self.execute(op).await?;
        match ObjectMetadata::from_headers(&headers) {
            Ok(metadata) => Ok((metadata, body)),
            Err(reason) => {
                if let Some(mut body) = body {
                    body.close();
                }
                tracing::warn!(%resource, %reason, "response is missing required headers");
                Err(Error::protocol(resource, reason))
            }
        }
    }

    async fn dispatch(&self, op: Operation, expect_body: bool) -> Result<Response, Error> {
        let resource = op.resource_path();
        let span = tracing::debug_span!("s3_request", verb = %op.verb, %resource);
        self.dispatch_inner(op, resource, expect_body)
            .instrument(span)
            .await
    }

    async fn dispatch_inner(
        &self,
        op: Operation,
        resource: String,
        expect_body: bool,
    ) -> Result<Response, Error> {
        let request = self.signed_request(op, OffsetDateTime::now_utc())?;

        let resp = match self.transport.send(request).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(error = %e, "transport failed");
                return Err(Error::transport(resource, e));
            }
        };

        let TransportResponse {
            status,
            headers,
            body,
            mut connection,
        } = resp;

        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "request succeeded");
            let body = if expect_body {
                Some(ResponseBody::new(body, connection))
            } else {
                drop(body);
                connection.release();
                None
            };
            return Ok(Response {
                status,
                headers,
                body,
            });
        }

        let read = read_error_body(body, self.max_error_body).await;
        connection.release();
        let document = match read {
            Ok(document) => document,
            Err(e) => {
                let source = TransportError::with_source("failed to read error body", e);
                return Err(Error::transport(resource, source));
            }
        };

        if document.is_empty() {
            tracing::warn!(status = status.as_u16(), "error status without a body");
            return Err(Error::protocol(
                resource,
                format!("status {} returned without an error document", status.as_u16()),
            ));
        }

        let mut service_error = classify(&document);
        service_error.status = Some(status.as_u16());
        service_error.resource = Some(resource);
        tracing::debug!(
            status = status.as_u16(),
            code = service_error.code.as_deref().unwrap_or_default(),
            request_id = service_error.request_id.as_deref().unwrap_or_default(),
            "service returned an error"
        );
        Err(Error::Service(service_error))
    }

    /// 构造签名后的请求，`Operation`中的字段只会被读取
    pub(crate) fn signed_request(
        &self,
        op: Operation,
        date_time: OffsetDateTime,
    ) -> Result<TransportRequest, Error> {
        let authorization = sign(&self.credentials, &op, &date_time)?;

        let mut headers = op.headers.clone();
        headers.insert("date".to_owned(), gmt_format(&date_time)?);
        headers.insert("authorization".to_owned(), authorization);
        if let RequestBody::Stream { length, .. } = &op.body {
            headers.insert("content-length".to_owned(), length.to_string());
        }
        let headers = into_header_map(&headers)?;

        let resource = op.resource_path();
        let mut url = self.endpoint.clone();
        url.set_path(&resource);
        // set_path会处理`.`和`..`，签名的路径和实际发送的路径必须一致
        if url.path() != resource {
            return Err(Error::InvalidRequest(format!(
                "resource `{resource}` would be sent as `{}`",
                url.path()
            )));
        }
        if !op.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &op.query {
                match v {
                    Some(v) => pairs.append_pair(k, v),
                    None => pairs.append_key_only(k),
                };
            }
        }

        Ok(TransportRequest {
            method: op.verb.method(),
            url,
            headers,
            body: op.body,
        })
    }
}

impl Debug for RequestExecutor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("credentials", &self.credentials)
            .field("endpoint", &self.endpoint.as_str())
            .field("max_error_body", &self.max_error_body)
            .finish()
    }
}

// 最多读取limit字节，读到的内容可能是不完整的
async fn read_error_body(
    body: Option<BodyStream>,
    limit: usize,
) -> Result<Vec<u8>, std::io::Error> {
    let mut buf = Vec::new();
    let Some(mut body) = body else {
        return Ok(buf);
    };
    while buf.len() < limit {
        match body.next().await {
            Some(chunk) => {
                let chunk = chunk?;
                let take = chunk.len().min(limit - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            None => break,
        }
    }
    Ok(buf)
}
