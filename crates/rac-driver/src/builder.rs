//! Builder 模式实现
//!
//! 提供链式构造 `ProtocolExecutor` 实例的便捷方式。

use crate::config::ExecutorConfig;
use crate::error::DriverError;
use crate::executor::ProtocolExecutor;
use crate::hooks::{DiscardHandler, MessageHandler};
use rac_link::Link;
#[cfg(feature = "serial")]
use rac_link::SerialLink;
use rac_protocol::{ByteOrder, RacCodec, RegisterTypeTable};
use std::sync::Arc;

/// Executor Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use rac_driver::ExecutorBuilder;
/// use rac_protocol::{RegisterTypeTable, ValueType};
///
/// let table = RegisterTypeTable::from_entries([(0, ValueType::Int16)]).unwrap();
/// let executor = ExecutorBuilder::new()
///     .port("COM3")
///     .baud_rate(250_000)
///     .input_framed(true)
///     .registers(table)
///     .build()
///     .unwrap();
/// ```
pub struct ExecutorBuilder {
    config: ExecutorConfig,
    /// 寄存器类型表（未设置时为空表，所有消息都会被拒绝）
    registers: Option<RegisterTypeTable>,
    /// 入站回调（默认丢弃）
    handler: Option<Arc<dyn MessageHandler>>,
}

impl ExecutorBuilder {
    pub fn new() -> Self {
        Self {
            config: ExecutorConfig::default(),
            registers: None,
            handler: None,
        }
    }

    /// 设置串口名称
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.config.port = port.into();
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// 接收方向是否期望起止字节
    pub fn input_framed(mut self, framed: bool) -> Self {
        self.config.input_framed = framed;
        self
    }

    /// 发送方向是否附加起止字节
    pub fn output_framed(mut self, framed: bool) -> Self {
        self.config.output_framed = framed;
        self
    }

    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.config.byte_order = byte_order;
        self
    }

    /// 逐条记录收发消息（debug 级别）
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// 设置寄存器类型表
    pub fn registers(mut self, table: RegisterTypeTable) -> Self {
        self.registers = Some(table);
        self
    }

    /// 整体替换配置（之后的链式调用仍可覆盖单个字段）
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置入站回调
    pub fn handler(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// 设置共享的入站回调
    pub fn shared_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// 使用串口链路构建执行器（不打开端口）
    ///
    /// # 错误
    /// - `DriverError::Protocol`: 帧模式下寄存器 ID 与起止字节冲突
    #[cfg(feature = "serial")]
    pub fn build(self) -> Result<ProtocolExecutor<SerialLink>, DriverError> {
        let link = SerialLink::new(self.config.port.clone(), self.config.baud_rate)
            .with_read_timeout(self.config.read_timeout());
        self.build_with_link(link)
    }

    /// 使用任意链路构建执行器
    pub fn build_with_link<L: Link + 'static>(
        self,
        link: L,
    ) -> Result<ProtocolExecutor<L>, DriverError> {
        let table = self.registers.unwrap_or_default();
        let codec = RacCodec::new(table, self.config.codec_config())?;
        let handler = self.handler.unwrap_or_else(|| Arc::new(DiscardHandler));
        Ok(ProtocolExecutor::new(link, codec, handler, self.config))
    }
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
