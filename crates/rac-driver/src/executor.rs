//! 链路执行器
//!
//! 提供对外的 [`ProtocolExecutor`]，封装接收/发送线程、链路锁与出站邮箱。

use crate::config::ExecutorConfig;
use crate::error::DriverError;
use crate::hooks::MessageHandler;
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{LinkContext, PipelineConfig, rx_loop, tx_loop};
use crate::state::{ExecutorState, FaultOrigin, LinkFault};
use parking_lot::Mutex;
use rac_link::Link;
use rac_protocol::{Message, RacCodec};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程代为 join，本线程只做带超时的等待
        thread::spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 区分 join 超时与线程 panic
fn describe_join_error(err: &(dyn Any + Send)) -> String {
    if let Some(e) = err.downcast_ref::<std::io::Error>() {
        e.to_string()
    } else if let Some(msg) = err.downcast_ref::<&str>() {
        format!("thread panicked: {}", msg)
    } else if let Some(msg) = err.downcast_ref::<String>() {
        format!("thread panicked: {}", msg)
    } else {
        "thread panicked".to_string()
    }
}

#[derive(Default)]
struct LoopThreads {
    rx: Option<JoinHandle<()>>,
    tx: Option<JoinHandle<()>>,
}

/// 链路执行器
///
/// 持有一条链路、一个出站邮箱和停止标志，运行一个接收线程和一个发送线程。
/// 所有方法只需要 `&self`，可以放进 `Arc` 在多个线程间共享
/// （包括在入站回调里调用 `stop()`）。
///
/// 执行器不可重启：`stop()` 之后再次 `start()` 返回 false。
///
/// # Example
///
/// ```no_run
/// use rac_driver::ExecutorBuilder;
/// use rac_protocol::{Message, RegisterTypeTable, ValueType};
///
/// let table = RegisterTypeTable::from_entries([(0, ValueType::UInt16), (1, ValueType::Bool)])
///     .unwrap();
/// let executor = ExecutorBuilder::new()
///     .port("/dev/ttyACM0")
///     .baud_rate(250_000)
///     .output_framed(true)
///     .registers(table)
///     .handler(|message: Message| println!("{:?}", message))
///     .build()
///     .unwrap();
///
/// assert!(executor.start());
/// executor.set_data(Message::new().with(0, 500u16).with(1, true), false).unwrap();
/// executor.stop();
/// ```
pub struct ProtocolExecutor<L: Link + 'static> {
    ctx: Arc<LinkContext<L>>,
    handler: Arc<dyn MessageHandler>,
    config: ExecutorConfig,
    /// 线程句柄；同时串行化 start/stop
    threads: Mutex<LoopThreads>,
}

impl<L: Link + 'static> ProtocolExecutor<L> {
    /// 创建执行器（不打开链路、不启动线程）
    pub fn new(
        link: L,
        codec: RacCodec,
        handler: Arc<dyn MessageHandler>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            ctx: Arc::new(LinkContext::new(link, codec)),
            handler,
            config,
            threads: Mutex::new(LoopThreads::default()),
        }
    }

    /// 打开链路并启动接收/发送线程
    ///
    /// 打开失败时返回 false，不启动线程，执行器保持 `Idle` 可重试；
    /// 失败原因可通过 [`last_fault()`](Self::last_fault) 查询。
    pub fn start(&self) -> bool {
        match self.try_start() {
            Ok(()) => true,
            Err(e) => {
                debug!("Executor start failed: {}", e);
                false
            },
        }
    }

    /// 打开链路并启动接收/发送线程（返回具体错误）
    ///
    /// # 错误
    /// - `DriverError::AlreadyStarted`: 执行器不是 `Idle`
    /// - `DriverError::Link`: 打开链路失败
    /// - `DriverError::IoThread`: 创建线程失败
    pub fn try_start(&self) -> Result<(), DriverError> {
        let mut threads = self.threads.lock();
        if self.ctx.state.get(Ordering::Acquire) != ExecutorState::Idle {
            return Err(DriverError::AlreadyStarted);
        }

        let link_name = {
            let mut link = self.ctx.link.lock();
            if let Err(e) = link.open() {
                self.ctx.record_fault(FaultOrigin::Open, e.to_string());
                return Err(e.into());
            }
            link.name().to_string()
        };

        let pipeline = PipelineConfig {
            poll_interval: self.config.poll_interval(),
            debug: self.config.debug,
        };

        self.ctx.register_loops(2);
        self.ctx.state.set(ExecutorState::Running, Ordering::Release);

        let rx_ctx = self.ctx.clone();
        let handler = self.handler.clone();
        let rx = thread::Builder::new()
            .name("rac-rx".to_string())
            .spawn(move || rx_loop(rx_ctx, handler, pipeline));
        let rx = match rx {
            Ok(handle) => handle,
            Err(e) => {
                // 两个线程都未启动
                self.ctx.request_stop();
                self.ctx.loop_exited();
                self.ctx.loop_exited();
                return Err(DriverError::IoThread(e.to_string()));
            },
        };
        threads.rx = Some(rx);

        let tx_ctx = self.ctx.clone();
        let tx = thread::Builder::new()
            .name("rac-tx".to_string())
            .spawn(move || tx_loop(tx_ctx, pipeline));
        match tx {
            Ok(handle) => threads.tx = Some(handle),
            Err(e) => {
                self.ctx.request_stop();
                self.ctx.loop_exited();
                return Err(DriverError::IoThread(e.to_string()));
            },
        }

        info!(
            "Executor started on {} (input framed: {}, output framed: {})",
            link_name, self.config.input_framed, self.config.output_framed
        );
        Ok(())
    }

    /// 停止执行器（幂等，可从任何线程调用，包括入站回调内部）
    ///
    /// 置位停止标志、唤醒发送线程，等待两个线程退出（每个最多 `join_timeout`）。
    /// 链路由最后退出的线程关闭。启动前调用直接进入 `Stopped`。
    pub fn stop(&self) {
        let handles = {
            let mut threads = self.threads.lock();

            if self.ctx.state.compare_exchange(
                ExecutorState::Idle,
                ExecutorState::Stopped,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                self.ctx.request_stop();
                info!("Executor stopped before start");
                return;
            }

            self.ctx.request_stop();
            [("RX", threads.rx.take()), ("TX", threads.tx.take())]
        };

        // join 期间不持有 threads 锁，回调中并发调用的 stop() 才能返回
        let join_timeout = self.config.join_timeout();
        let current = thread::current().id();
        for (label, handle) in handles {
            let Some(handle) = handle else { continue };
            // 在线程自身内部调用 stop()：不能 join 自己，线程返回后自行退出
            if handle.thread().id() == current {
                continue;
            }
            if let Err(e) = handle.join_timeout(join_timeout) {
                error!(
                    "{} thread did not shut down cleanly within {:?}: {}",
                    label,
                    join_timeout,
                    describe_join_error(&*e)
                );
            }
        }
    }

    /// 发布下一条待发送消息
    ///
    /// - `block = false`: 覆盖尚未发送的旧消息（只保留最新值）
    /// - `block = true`: 先等待旧消息被发送线程取走
    ///
    /// 启动前发布的消息暂存在邮箱中，启动后发送。
    ///
    /// # 错误
    /// - `DriverError::Protocol`: 未知寄存器或值类型不匹配（不写入任何字节）
    /// - `DriverError::Stopped`: 执行器已停止
    pub fn set_data(&self, message: Message, block: bool) -> Result<(), DriverError> {
        self.ctx.codec.validate(&message)?;
        if self.ctx.mailbox.publish(message, block)? {
            self.ctx.metrics.tx_overwrites.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// 阻塞发布，最多等待 `timeout`
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 超时仍有未发送的旧消息（新消息被丢弃）
    pub fn set_data_timeout(&self, message: Message, timeout: Duration) -> Result<(), DriverError> {
        self.ctx.codec.validate(&message)?;
        self.ctx.mailbox.publish_timeout(message, timeout)
    }

    pub fn state(&self) -> ExecutorState {
        self.ctx.state.get(Ordering::Acquire)
    }

    /// 线程是否在运行且未请求停止
    pub fn is_running(&self) -> bool {
        self.state() == ExecutorState::Running
    }

    /// 最近一次链路故障（打开失败、读写错误、非帧模式失步）
    pub fn last_fault(&self) -> Option<LinkFault> {
        self.ctx.last_fault()
    }

    /// 检查线程健康状态
    ///
    /// # 返回
    /// - `(rx_alive, tx_alive)`: 线程是否仍在运行（未启动或已 join 时为 false）
    pub fn check_health(&self) -> (bool, bool) {
        let threads = self.threads.lock();
        let alive = |handle: &Option<JoinHandle<()>>| {
            handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
        };
        (alive(&threads.rx), alive(&threads.tx))
    }

    /// 获取性能指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn codec(&self) -> &RacCodec {
        &self.ctx.codec
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

impl<L: Link + 'static> Drop for ProtocolExecutor<L> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::DiscardHandler;
    use rac_link::MockLink;
    use rac_protocol::{CodecConfig, RegisterTypeTable, ValueType};

    fn executor() -> (ProtocolExecutor<MockLink>, rac_link::MockLinkHandle) {
        let table = RegisterTypeTable::from_entries([(0, ValueType::UInt16)]).unwrap();
        let codec = RacCodec::new(table, CodecConfig::default()).unwrap();
        let (link, handle) = MockLink::new("unit");
        let executor = ProtocolExecutor::new(
            link,
            codec,
            Arc::new(DiscardHandler),
            ExecutorConfig::default(),
        );
        (executor, handle)
    }

    #[test]
    fn test_start_and_stop() {
        let (executor, handle) = executor();
        assert_eq!(executor.state(), ExecutorState::Idle);
        assert_eq!(executor.check_health(), (false, false));

        assert!(executor.start());
        assert!(executor.is_running());
        assert!(handle.is_open());

        executor.stop();
        assert_eq!(executor.state(), ExecutorState::Stopped);
        assert!(!handle.is_open());
        assert_eq!(executor.check_health(), (false, false));
    }

    #[test]
    fn test_stop_before_start() {
        let (executor, handle) = executor();
        executor.stop();
        assert_eq!(executor.state(), ExecutorState::Stopped);
        assert!(!executor.start());
        assert_eq!(handle.open_count(), 0);
    }

    #[test]
    fn test_set_data_rejects_unknown_register() {
        let (executor, _handle) = executor();
        let result = executor.set_data(Message::single(9, 1u16), false);
        assert!(matches!(result, Err(DriverError::Protocol(_))));

        let result = executor.set_data(Message::single(0, true), false);
        assert!(matches!(result, Err(DriverError::Protocol(_))));
    }

    #[test]
    fn test_join_timeout() {
        let handle = thread::spawn(|| thread::sleep(Duration::from_millis(200)));
        assert!(handle.join_timeout(Duration::from_millis(10)).is_err());

        let handle = thread::spawn(|| {});
        assert!(handle.join_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_join_error_distinguishes_timeout_from_panic() {
        let handle = thread::spawn(|| thread::sleep(Duration::from_millis(200)));
        let err = handle.join_timeout(Duration::from_millis(10)).unwrap_err();
        assert_eq!(describe_join_error(&*err), "Thread join timeout");

        let handle = thread::spawn(|| panic!("decoder state corrupted"));
        let err = handle.join_timeout(Duration::from_secs(1)).unwrap_err();
        assert_eq!(
            describe_join_error(&*err),
            "thread panicked: decoder state corrupted"
        );
    }
}
