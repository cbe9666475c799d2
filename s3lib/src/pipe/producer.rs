use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// 输入流中的一段，除了最后一个block以外长度都等于block_size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub sequence: u64,
    pub payload: Bytes,
}

impl Block {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    /// 读到了结尾，`blocks`是放入队列的block数量
    Completed { blocks: u64 },
    Cancelled,
}

/// 把输入流按固定大小切分，依次放入有界队列
///
/// 队列满的时候会等待，读取的速度因此和上传的速度一致。
/// 只有完整读出的block才会放入队列，取消或者读取出错时不会放入不完整的block。
/// 返回时sender被drop，队列随之关闭。
pub struct BlockProducer<R> {
    source: R,
    block_size: usize,
    sender: mpsc::Sender<Block>,
    cancel: CancellationToken,
}

impl<R> BlockProducer<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(
        source: R,
        block_size: usize,
        sender: mpsc::Sender<Block>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            block_size,
            sender,
            cancel,
        }
    }

    pub async fn run(mut self) -> Result<ProducerExit, std::io::Error> {
        let mut sequence = 0u64;
        loop {
            let mut buf = BytesMut::zeroed(self.block_size);
            let mut filled = 0;
            let mut eof = false;
            while filled < self.block_size {
                let n = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(ProducerExit::Cancelled),
                    n = self.source.read(&mut buf[filled..]) => n?,
                };
                if n == 0 {
                    eof = true;
                    break;
                }
                filled += n;
            }

            if filled > 0 {
                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(ProducerExit::Cancelled),
                    permit = self.sender.reserve() => match permit {
                        Ok(permit) => permit,
                        // 消费端已经不在了
                        Err(_) => return Ok(ProducerExit::Cancelled),
                    },
                };
                buf.truncate(filled);
                permit.send(Block {
                    sequence,
                    payload: buf.freeze(),
                });
                tracing::trace!(sequence, bytes = filled, "block queued");
                sequence += 1;
            }

            if eof {
                return Ok(ProducerExit::Completed { blocks: sequence });
            }
        }
    }
}
