//! 接收/发送线程主循环
//!
//! 两个线程通过同一把链路锁串行化所有链路访问（读一条消息、写一条消息各占一个临界区），
//! 出站消息经由 [`Mailbox`] 交接，与链路锁分离。
//!
//! # 停止流程
//!
//! 1. 任何一方（调用方 `stop()`、接收线程读错误、发送线程写错误）调用 `request_stop()`：
//!    置位停止标志并关闭邮箱，唤醒等待中的发送线程
//! 2. 两个线程各自观察到停止标志后退出
//! 3. 最后一个退出的线程在链路锁内关闭链路，保证关闭发生在最后一次读写之后

use crate::hooks::MessageHandler;
use crate::mailbox::Mailbox;
use crate::metrics::LinkMetrics;
use crate::state::{AtomicExecutorState, ExecutorState, FaultOrigin, LinkFault};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use rac_link::Link;
use rac_protocol::{DecodeError, RacCodec};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 线程循环配置
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// 无可读字节时的休眠间隔
    pub poll_interval: Duration,
    /// 逐条记录收发消息
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(200),
            debug: false,
        }
    }
}

/// 接收/发送线程与调用方共享的上下文
pub struct LinkContext<L: Link> {
    /// 链路（唯一的访问路径）
    pub(crate) link: Mutex<L>,
    pub(crate) codec: RacCodec,
    pub(crate) mailbox: Mailbox,
    pub(crate) metrics: LinkMetrics,
    pub(crate) state: AtomicExecutorState,
    fault: ArcSwapOption<LinkFault>,
    /// 停止标志（只会从 false 变为 true）
    shutdown: AtomicBool,
    /// 尚未退出的线程数
    live_loops: AtomicUsize,
}

impl<L: Link> LinkContext<L> {
    pub(crate) fn new(link: L, codec: RacCodec) -> Self {
        Self {
            link: Mutex::new(link),
            codec,
            mailbox: Mailbox::new(),
            metrics: LinkMetrics::new(),
            state: AtomicExecutorState::default(),
            fault: ArcSwapOption::empty(),
            shutdown: AtomicBool::new(false),
            live_loops: AtomicUsize::new(0),
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        // Acquire: 看到 true 时必须同时看到停止前的所有写入
        self.shutdown.load(Ordering::Acquire)
    }

    /// 请求停止（幂等，可从任何线程调用）
    pub(crate) fn request_stop(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.mailbox.close();
        if self.state.get(Ordering::Acquire) == ExecutorState::Running {
            self.state.advance_to(ExecutorState::Stopping);
        }
        info!("Shutdown requested");
    }

    /// 登记即将启动的线程数（在 spawn 之前调用）
    pub(crate) fn register_loops(&self, count: usize) {
        self.live_loops.store(count, Ordering::Release);
    }

    /// 线程退出时调用，最后一个退出的线程关闭链路
    pub(crate) fn loop_exited(&self) {
        if self.live_loops.fetch_sub(1, Ordering::AcqRel) == 1 {
            let mut link = self.link.lock();
            link.close();
            self.state.set(ExecutorState::Stopped, Ordering::Release);
            info!("Link {} closed", link.name());
        }
    }

    pub(crate) fn record_fault(&self, origin: FaultOrigin, message: impl Into<String>) {
        let fault = LinkFault::new(origin, message);
        error!("Link {}", fault);
        self.metrics.link_errors.fetch_add(1, Ordering::Relaxed);
        self.fault.store(Some(Arc::new(fault)));
    }

    pub(crate) fn last_fault(&self) -> Option<LinkFault> {
        self.fault.load_full().map(|fault| fault.as_ref().clone())
    }
}

/// 设置当前线程为最高优先级（`realtime` feature）
#[cfg(feature = "realtime")]
fn raise_thread_priority(label: &str) {
    use thread_priority::*;

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(_) => {
            info!("{} thread priority set to MAX (realtime)", label);
        },
        Err(e) => {
            warn!(
                "Failed to set {} thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                label, e
            );
        },
    }
}

/// 接收线程主循环
///
/// 轮询可读字节数；有数据时在链路锁内解码一条消息，在锁外交给回调。
///
/// - 帧模式下的空消息（非 START 空闲字节）计数后继续
/// - 帧模式下的协议错误（帧内未知寄存器、截断）丢弃半帧，重新寻找 START
/// - 非帧模式下的协议错误无法重新同步，记录故障并停止
/// - 链路错误记录故障并停止
pub fn rx_loop<L: Link>(
    ctx: Arc<LinkContext<L>>,
    handler: Arc<dyn MessageHandler>,
    config: PipelineConfig,
) {
    #[cfg(feature = "realtime")]
    raise_thread_priority("RX");

    let framed = ctx.codec.config().input_framed;

    loop {
        if ctx.is_shutdown() {
            trace!("RX thread: shutdown flag set, exiting");
            break;
        }

        let decoded = {
            let mut link = ctx.link.lock();
            match link.bytes_available() {
                Ok(0) => None,
                Ok(_) => Some(ctx.codec.decode(&mut *link)),
                Err(e) => {
                    drop(link);
                    ctx.record_fault(FaultOrigin::Receive, e.to_string());
                    ctx.request_stop();
                    break;
                },
            }
        };

        let message = match decoded {
            None => {
                // 使用 spin_sleep 获得微秒级休眠精度
                spin_sleep::sleep(config.poll_interval);
                continue;
            },
            Some(Ok(message)) if message.is_empty() => {
                if framed {
                    ctx.metrics.rx_idle_bytes.fetch_add(1, Ordering::Relaxed);
                }
                continue;
            },
            Some(Ok(message)) => message,
            Some(Err(DecodeError::Protocol(e))) if framed => {
                warn!("RX thread: stream desynchronised ({}), hunting for next frame", e);
                ctx.metrics.rx_desyncs.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Some(Err(e)) => {
                ctx.record_fault(FaultOrigin::Receive, e.to_string());
                ctx.request_stop();
                break;
            },
        };

        ctx.metrics.rx_messages.fetch_add(1, Ordering::Relaxed);
        ctx.metrics
            .rx_pairs
            .fetch_add(message.len() as u64, Ordering::Relaxed);
        if config.debug {
            debug!("RX: {:?}", message.pairs());
        }

        handler.on_message(message);
    }

    trace!("RX thread: loop exited");
    ctx.loop_exited();
}

/// 发送线程主循环
///
/// 等待邮箱中的消息或停止请求；取出消息后（此时阻塞的发布者可以继续）
/// 在链路锁内编码写入。写失败记录故障并停止。
pub fn tx_loop<L: Link>(ctx: Arc<LinkContext<L>>, config: PipelineConfig) {
    #[cfg(feature = "realtime")]
    raise_thread_priority("TX");

    while let Some(message) = ctx.mailbox.take() {
        if ctx.is_shutdown() {
            break;
        }

        // 消息已在 set_data 中校验过，这里失败只可能是调用方绕过了校验
        let bytes = match ctx.codec.encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("TX thread: dropping message that failed to encode: {}", e);
                continue;
            },
        };

        let result = {
            let mut link = ctx.link.lock();
            link.write_all(&bytes).and_then(|_| link.flush())
        };

        match result {
            Ok(()) => {
                ctx.metrics.tx_messages.fetch_add(1, Ordering::Relaxed);
                ctx.metrics
                    .tx_bytes
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                if config.debug {
                    debug!("TX: {:?} -> {:02X?}", message.pairs(), bytes);
                }
            },
            Err(e) => {
                ctx.record_fault(FaultOrigin::Transmit, e.to_string());
                ctx.request_stop();
                break;
            },
        }
    }

    trace!("TX thread: loop exited");
    ctx.loop_exited();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rac_link::{MockLink, MockLinkHandle};
    use rac_protocol::{CodecConfig, Message, RegisterTypeTable, ValueType};
    use std::thread;

    fn context(input_framed: bool) -> (Arc<LinkContext<MockLink>>, MockLinkHandle) {
        let table =
            RegisterTypeTable::from_entries([(0, ValueType::UInt16), (1, ValueType::Bool)])
                .unwrap();
        let codec = RacCodec::new(
            table,
            CodecConfig {
                input_framed,
                output_framed: input_framed,
                ..Default::default()
            },
        )
        .unwrap();
        let (mut link, handle) = MockLink::new("pipeline");
        link.open().unwrap();
        (Arc::new(LinkContext::new(link, codec)), handle)
    }

    #[test]
    fn test_request_stop_is_idempotent() {
        let (ctx, _handle) = context(false);
        ctx.state.set(ExecutorState::Running, Ordering::Release);
        ctx.request_stop();
        ctx.request_stop();
        assert!(ctx.is_shutdown());
        assert!(ctx.mailbox.is_closed());
        assert_eq!(ctx.state.get(Ordering::Acquire), ExecutorState::Stopping);
    }

    #[test]
    fn test_last_loop_closes_link() {
        let (ctx, handle) = context(false);
        ctx.register_loops(2);
        ctx.loop_exited();
        assert!(handle.is_open());
        ctx.loop_exited();
        assert!(!handle.is_open());
        assert_eq!(ctx.state.get(Ordering::Acquire), ExecutorState::Stopped);
    }

    #[test]
    fn test_rx_loop_resyncs_framed_stream() {
        let (ctx, handle) = context(true);
        let (tx, rx) = crossbeam_channel::unbounded();
        let handler: Arc<dyn MessageHandler> = Arc::new(move |message: Message| {
            let _ = tx.send(message);
        });

        // 空闲字节 + 含未知寄存器的坏帧 + 正常帧
        handle.push_inbound(&[0x00, 0x42, 0xFF, 0x09, 0xFF, 0x01, 0x01, 0xFE]);

        ctx.register_loops(1);
        let rx_ctx = ctx.clone();
        let rx_thread = thread::spawn(move || rx_loop(rx_ctx, handler, PipelineConfig::default()));

        let message = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(message, Message::single(1, true));

        ctx.request_stop();
        rx_thread.join().unwrap();

        let snapshot = ctx.metrics.snapshot();
        assert_eq!(snapshot.rx_idle_bytes, 2);
        assert_eq!(snapshot.rx_desyncs, 1);
        assert_eq!(snapshot.rx_messages, 1);
        assert!(ctx.last_fault().is_none());
        assert!(!handle.is_open());
    }

    #[test]
    fn test_rx_loop_stops_on_unframed_corruption() {
        let (ctx, handle) = context(false);
        handle.push_inbound(&[0x09, 0x00]);

        ctx.register_loops(1);
        ctx.state.set(ExecutorState::Running, Ordering::Release);
        let rx_ctx = ctx.clone();
        let rx_thread = thread::spawn(move || {
            rx_loop(rx_ctx, Arc::new(crate::hooks::DiscardHandler), PipelineConfig::default())
        });
        rx_thread.join().unwrap();

        let fault = ctx.last_fault().unwrap();
        assert_eq!(fault.origin, FaultOrigin::Receive);
        assert!(fault.message.contains("Unknown register"));
        assert!(ctx.is_shutdown());
        assert_eq!(ctx.state.get(Ordering::Acquire), ExecutorState::Stopped);
    }

    #[test]
    fn test_tx_loop_writes_and_exits_on_close() {
        let (ctx, handle) = context(true);
        ctx.register_loops(1);
        let tx_ctx = ctx.clone();
        let tx_thread = thread::spawn(move || tx_loop(tx_ctx, PipelineConfig::default()));

        ctx.mailbox
            .publish(Message::new().with(0, 500u16).with(1, true), false)
            .unwrap();
        assert!(handle.wait_for_writes(1, Duration::from_secs(1)));
        assert_eq!(
            handle.written_bytes(),
            vec![0xFF, 0x00, 0xF4, 0x01, 0x01, 0x01, 0xFE]
        );

        ctx.request_stop();
        tx_thread.join().unwrap();
        assert_eq!(ctx.metrics.snapshot().tx_bytes, 7);
    }
}
