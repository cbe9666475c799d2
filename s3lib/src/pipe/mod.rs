//! 流式分块上传
//!
//! [UploadCoordinator]把任意的输入流切分为固定大小的block，每个block作为一个独立的object上传，
//! 命名为`{stream_name}.{sequence}`，sequence从0开始。
//!
//! - 读取在单独的task中进行([BlockProducer])，通过有界队列交给上传端，队列满时读取会暂停
//! - block按顺序逐个上传，任何一个失败都会取消读取并返回[UploadError::Block]
//! - 所有block上传成功后，如果读取过程中出错，返回[UploadError::SourceRead]
//!
//! # Example
//! ```no_run
//! # async fn run(client: s3lib::s3::Client) -> Result<(), s3lib::pipe::UploadError> {
//! use s3lib::pipe::UploadCoordinator;
//!
//! let mut coordinator = UploadCoordinator::builder()
//!     .client(client)
//!     .bucket("backups")
//!     .block_size(8 * 1024 * 1024)
//!     .build()?;
//! let file = tokio::fs::File::open("db.dump").await.unwrap();
//! let summary = coordinator.upload("db.dump", file).await?;
//! println!("{} blocks, {} bytes", summary.blocks, summary.bytes);
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod producer;

pub use coordinator::{DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY, UploadCoordinator};
pub use producer::{Block, BlockProducer, ProducerExit};

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("failed to read the source stream: {0}")]
    SourceRead(#[source] std::io::Error),
    /// 上传失败的block，之后的block不会再上传
    #[error("failed to upload block {sequence} as `{key}`: {source}")]
    Block {
        sequence: u64,
        key: String,
        #[source]
        source: crate::s3::Error,
    },
    #[error("upload was cancelled")]
    Cancelled,
    #[error("invalid upload configuration: {0}")]
    InvalidConfig(String),
}

impl UploadError {
    /// 服务端返回的错误，可以拿到request id
    pub fn service_error(&self) -> Option<&crate::s3::ServiceError> {
        match self {
            UploadError::Block { source, .. } => source.as_service_error(),
            _ => None,
        }
    }
}

/// 每次调用`upload`的状态: Idle -> Running -> {Succeeded, Failed}
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    SourceRead,
    Upload { sequence: u64 },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadSummary {
    pub blocks: u64,
    pub bytes: u64,
}
