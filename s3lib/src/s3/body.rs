use super::transport::{BodyStream, ConnectionGuard};
use crate::s3::Error;
use bytes::{Bytes, BytesMut};
use std::fmt::{Debug, Formatter};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_stream::{Stream, StreamExt};
use tokio_util::io::StreamReader;

/// 只能读取一次的响应体，和它占用的连接一一对应
///
/// 读到结尾、读取出错、调用[close](ResponseBody::close)或者drop，任何一种情况都会释放连接，
/// 并且只会释放一次。
pub struct ResponseBody {
    inner: Option<BodyStream>,
    connection: ConnectionGuard,
}

impl ResponseBody {
    pub(crate) fn new(inner: Option<BodyStream>, connection: ConnectionGuard) -> Self {
        Self { inner, connection }
    }

    /// 丢弃剩余的数据并释放连接，可以重复调用
    pub fn close(&mut self) {
        self.inner = None;
        self.connection.release();
    }

    pub fn is_released(&self) -> bool {
        self.connection.is_released()
    }

    /// 读取全部数据
    pub async fn bytes(mut self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(self)
    }

    /// 把数据写入`writer`，返回写入的字节数
    pub async fn write_to<W>(self, writer: &mut W) -> Result<u64, Error>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut reader = self.into_async_read();
        let n = tokio::io::copy(&mut reader, writer).await?;
        Ok(n)
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            this.connection.release();
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.close();
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

impl Debug for ResponseBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody")
            .field("exhausted", &self.inner.is_none())
            .field("connection", &self.connection)
            .finish()
    }
}
