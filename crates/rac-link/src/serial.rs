//! 串口链路
//!
//! 基于 `serialport` 的 [`Link`] 实现，适用于 USB 虚拟串口（Arduino 等）
//! 和物理 RS-232 串口。固定 8N1、无流控。

use crate::{Link, LinkError, not_connected};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// 默认读超时
///
/// 决定接收线程在帧中途等待剩余字节的最长时间，也决定 `stop()` 的最坏响应时间。
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(20);

/// 串口链路
///
/// 构造时不打开端口，`open()` 由执行器在 `start()` 中调用。
///
/// # Example
///
/// ```no_run
/// use rac_link::{Link, SerialLink};
///
/// let mut link = SerialLink::new("/dev/ttyACM0", 250_000);
/// link.open().unwrap();
/// ```
pub struct SerialLink {
    port_name: String,
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialLink {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
            port: None,
        }
    }

    /// 设置读超时（下次 `open()` 生效）
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or_else(not_connected)
    }
}

impl Link for SerialLink {
    fn open(&mut self) -> Result<(), LinkError> {
        if self.port.is_some() {
            return Ok(());
        }

        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| LinkError::open(&self.port_name, e))?;

        info!(
            "Serial link opened: {} @ {} baud (read timeout {:?})",
            self.port_name, self.baud_rate, self.read_timeout
        );
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) {
        // drop 即关闭底层文件描述符/句柄
        if self.port.take().is_some() {
            debug!("Serial link closed: {}", self.port_name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn bytes_available(&mut self) -> Result<usize, LinkError> {
        let port = self.port.as_ref().ok_or(LinkError::NotOpen)?;
        let available = port.bytes_to_read().map_err(io::Error::from)?;
        Ok(available as usize)
    }

    fn name(&self) -> &str {
        &self.port_name
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port_mut()?.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port_mut()?.flush()
    }
}

/// 枚举系统中的串口名称
pub fn available_ports() -> Result<Vec<String>, LinkError> {
    let ports = serialport::available_ports().map_err(io::Error::from)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
