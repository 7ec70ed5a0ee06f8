//! 入站消息回调
//!
//! 接收线程每解码出一条非空消息就调用一次 [`MessageHandler`]（在链路锁之外）。
//! 回调在接收线程上同步执行，耗时会直接推迟下一次读取，
//! 需要重处理的场景应转发到 Channel 异步消费（见 [`ChannelHandler`]）。
//!
//! # 使用示例
//!
//! ```rust
//! use rac_driver::hooks::{ChannelHandler, MessageHandler};
//! use rac_protocol::Message;
//!
//! let (handler, rx) = ChannelHandler::bounded(16);
//! handler.on_message(Message::single(0, 500u16));
//! assert_eq!(rx.try_recv().unwrap().len(), 1);
//! ```

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use rac_protocol::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// 入站消息回调 Trait
///
/// # 要求
///
/// - 不得无限阻塞（会卡住接收线程，`stop()` 也将等待其返回）
/// - 推荐使用 `try_send` 而非 `send`
pub trait MessageHandler: Send + Sync {
    /// 收到一条解码后的非空消息
    fn on_message(&self, message: Message);
}

impl<F> MessageHandler for F
where
    F: Fn(Message) + Send + Sync,
{
    fn on_message(&self, message: Message) {
        self(message)
    }
}

/// 丢弃所有入站消息的回调（只发送不接收的场景）
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardHandler;

impl MessageHandler for DiscardHandler {
    fn on_message(&self, _message: Message) {}
}

/// 转发到有界 Channel 的回调
///
/// 接收端消费不及时（Channel 满）时丢弃新消息并计数，不阻塞接收线程。
#[derive(Debug)]
pub struct ChannelHandler {
    tx: Sender<Message>,
    dropped: AtomicU64,
}

impl ChannelHandler {
    /// 创建容量为 `capacity` 的转发回调及其接收端
    pub fn bounded(capacity: usize) -> (Self, Receiver<Message>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// 因 Channel 满或接收端关闭而丢弃的消息数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MessageHandler for ChannelHandler {
    fn on_message(&self, message: Message) {
        match self.tx.try_send(message) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    warn!("Inbound channel full, {} messages dropped so far", dropped);
                }
            },
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
}
