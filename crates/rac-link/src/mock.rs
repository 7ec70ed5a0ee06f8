//! 内存链路
//!
//! 用于无硬件测试：测试代码通过 [`MockLinkHandle`] 注入入站字节、
//! 观察出站写入，并模拟打开失败、IO 故障与慢速写入。

use crate::{Link, LinkError, not_connected};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct MockState {
    inbound: VecDeque<u8>,
    /// 每次 `write` 调用一条记录
    written: Vec<Vec<u8>>,
    open: bool,
    fail_open: bool,
    fail_io: bool,
    write_delay: Option<Duration>,
    open_count: usize,
}

/// 内存链路（交给执行器）
#[derive(Debug)]
pub struct MockLink {
    name: String,
    state: Arc<Mutex<MockState>>,
}

/// 内存链路的测试端句柄（可克隆，跨线程使用）
#[derive(Debug, Clone)]
pub struct MockLinkHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    /// 创建链路及其测试端句柄
    pub fn new(name: impl Into<String>) -> (Self, MockLinkHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let link = Self {
            name: name.into(),
            state: state.clone(),
        };
        (link, MockLinkHandle { state })
    }
}

impl Link for MockLink {
    fn open(&mut self) -> Result<(), LinkError> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(LinkError::open(&self.name, "injected open failure"));
        }
        state.open = true;
        state.open_count += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        let state = self.state.lock();
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        if state.fail_io {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
        }
        Ok(state.inbound.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.fail_io {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        if !state.open {
            return Err(not_connected());
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if state.inbound.is_empty() {
            // 与串口读超时行为一致
            return Err(io::Error::from(io::ErrorKind::TimedOut));
        }

        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let delay = {
            let state = self.state.lock();
            if state.fail_io {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            if !state.open {
                return Err(not_connected());
            }
            state.write_delay
        };

        // 在状态锁之外休眠，测试端句柄不受影响
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        self.state.lock().written.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let state = self.state.lock();
        if state.fail_io {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        Ok(())
    }
}

impl MockLinkHandle {
    /// 追加入站字节
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes.iter().copied());
    }

    /// 尚未被读取的入站字节数
    pub fn pending_inbound(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// 所有写入记录（每次 `write` 一条）
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    /// 所有写入字节按顺序拼接
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state.lock().written.concat()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// 注入 IO 故障：之后所有读写返回 `BrokenPipe`
    pub fn set_fail_io(&self, fail: bool) {
        self.state.lock().fail_io = fail;
    }

    /// 每次写入前的模拟延迟
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        self.state.lock().write_delay = delay;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// 链路被成功打开的次数
    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    /// 等待至少 `count` 条写入记录，超时返回 false
    pub fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| state.written.len() >= count)
    }

    /// 等待入站字节被读空，超时返回 false
    pub fn wait_for_drain(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| state.inbound.is_empty())
    }

    fn wait_until(&self, timeout: Duration, cond: impl Fn(&MockState) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if cond(&self.state.lock()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
