use super::producer::{BlockProducer, ProducerExit};
use super::{FailureReason, UploadError, UploadState, UploadSummary};
use crate::s3::Client;
use crate::s3::acl::CannedAcl;
use crate::s3::object::PutObjectBody;
use crate::s3::utils::{validate_bucket_name, validate_object_key};
use bon::bon;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// 把一个输入流上传为`{name}.0`, `{name}.1`, ...多个object
///
/// 读取和上传并行，上传是顺序的：同一时间只有一个block在上传。
/// 任何一个block上传失败都会停止读取并返回，不会重试。
#[derive(Debug)]
pub struct UploadCoordinator {
    client: Client,
    bucket: String,
    block_size: usize,
    queue_capacity: usize,
    acl: CannedAcl,
    state: UploadState,
}

#[bon]
impl UploadCoordinator {
    #[builder(on(String, into))]
    pub fn new(
        client: Client,
        bucket: String,
        #[builder(default = DEFAULT_BLOCK_SIZE)] block_size: usize,
        #[builder(default = DEFAULT_QUEUE_CAPACITY)] queue_capacity: usize,
        #[builder(default)] acl: CannedAcl,
    ) -> Result<Self, UploadError> {
        if block_size == 0 {
            return Err(UploadError::InvalidConfig(
                "block_size must be greater than 0".to_owned(),
            ));
        }
        if queue_capacity == 0 {
            return Err(UploadError::InvalidConfig(
                "queue_capacity must be greater than 0".to_owned(),
            ));
        }
        validate_bucket_name(&bucket).map_err(|e| UploadError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            bucket,
            block_size,
            queue_capacity,
            acl,
            state: UploadState::Idle,
        })
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// 返回的future被drop时，读取会停止，状态变为`Failed(Cancelled)`
    pub async fn upload<R>(
        &mut self,
        stream_name: &str,
        source: R,
    ) -> Result<UploadSummary, UploadError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        // 按最大的sequence检查block key
        validate_object_key(&format!("{stream_name}.{}", u64::MAX))
            .map_err(|e| UploadError::InvalidConfig(e.to_string()))?;

        let state = StateGuard::start(&mut self.state);
        let cancel = CancellationToken::new();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let (sender, mut receiver) = mpsc::channel(self.queue_capacity);
        let producer = BlockProducer::new(source, self.block_size, sender, cancel.clone());
        let handle = tokio::spawn(producer.run());
        tracing::debug!(
            stream = stream_name,
            block_size = self.block_size,
            queue_capacity = self.queue_capacity,
            "upload started"
        );

        let mut summary = UploadSummary::default();
        while let Some(block) = receiver.recv().await {
            let sequence = block.sequence;
            let len = block.len() as u64;
            let key = format!("{stream_name}.{sequence}");

            let res = self
                .client
                .put_object()
                .acl(self.acl)
                .build()
                .send(&self.bucket, &key, PutObjectBody::Bytes(block.payload))
                .await;
            if let Err(source) = res {
                tracing::warn!(stream = stream_name, sequence, error = %source, "block upload failed");
                cancel.cancel();
                drop(receiver);
                // 只需要等producer退出，它的结果已经不重要了
                let _ = handle.await;
                state.finish(UploadState::Failed(FailureReason::Upload { sequence }));
                return Err(UploadError::Block {
                    sequence,
                    key,
                    source,
                });
            }

            tracing::debug!(stream = stream_name, sequence, bytes = len, "block uploaded");
            summary.blocks += 1;
            summary.bytes += len;
        }

        // 队列关闭说明producer已经退出
        let exit = match handle.await {
            Ok(exit) => exit,
            Err(e) => Err(std::io::Error::other(e)),
        };
        match exit {
            Ok(ProducerExit::Completed { .. }) => {
                tracing::debug!(
                    stream = stream_name,
                    blocks = summary.blocks,
                    bytes = summary.bytes,
                    "upload finished"
                );
                state.finish(UploadState::Succeeded);
                Ok(summary)
            }
            Ok(ProducerExit::Cancelled) => {
                state.finish(UploadState::Failed(FailureReason::Cancelled));
                Err(UploadError::Cancelled)
            }
            Err(e) => {
                tracing::warn!(stream = stream_name, error = %e, "reading source failed");
                state.finish(UploadState::Failed(FailureReason::SourceRead));
                Err(UploadError::SourceRead(e))
            }
        }
    }
}

// upload的future被drop时仍是Running，改为Failed(Cancelled)
struct StateGuard<'a> {
    state: &'a mut UploadState,
}

impl<'a> StateGuard<'a> {
    fn start(state: &'a mut UploadState) -> Self {
        *state = UploadState::Running;
        Self { state }
    }

    fn finish(self, terminal: UploadState) {
        *self.state = terminal;
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if *self.state == UploadState::Running {
            *self.state = UploadState::Failed(FailureReason::Cancelled);
        }
    }
}
