//! 执行器配置

use rac_protocol::{ByteOrder, CodecConfig};
use std::time::Duration;

/// 执行器配置（POD，可序列化）
///
/// # Example
///
/// ```
/// use rac_driver::ExecutorConfig;
///
/// let config = ExecutorConfig {
///     port: "/dev/ttyUSB0".to_string(),
///     baud_rate: 250_000,
///     input_framed: true,
///     ..Default::default()
/// };
/// assert!(config.codec_config().input_framed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExecutorConfig {
    /// 串口名称（`/dev/ttyACM0`、`COM3` 等）
    pub port: String,
    /// 波特率
    pub baud_rate: u32,
    /// 接收方向是否期望起止字节
    pub input_framed: bool,
    /// 发送方向是否附加起止字节
    pub output_framed: bool,
    /// 多字节值的字节序
    pub byte_order: ByteOrder,
    /// 逐条记录收发消息（debug 级别）
    pub debug: bool,
    /// 链路读超时（毫秒）
    pub read_timeout_ms: u64,
    /// 无可读字节时接收线程的休眠间隔（微秒）
    pub poll_interval_us: u64,
    /// `stop()` 等待每个线程退出的最长时间（毫秒）
    pub join_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            input_framed: false,
            output_framed: false,
            byte_order: ByteOrder::Little,
            debug: false,
            read_timeout_ms: 20,
            poll_interval_us: 200,
            join_timeout_ms: 2000,
        }
    }
}

impl ExecutorConfig {
    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            input_framed: self.input_framed,
            output_framed: self.output_framed,
            byte_order: self.byte_order,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_config_default() {
        let config = ExecutorConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert!(!config.input_framed && !config.output_framed);
        assert_eq!(config.read_timeout(), Duration::from_millis(20));
        assert_eq!(config.poll_interval(), Duration::from_micros(200));
        assert_eq!(config.join_timeout(), Duration::from_secs(2));
        assert_eq!(config.codec_config(), CodecConfig::default());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_executor_config_from_toml() {
        let config: ExecutorConfig = toml::from_str(
            r#"
            port = "COM3"
            baud_rate = 250000
            input_framed = true
            byte_order = "big"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, "COM3");
        assert_eq!(config.baud_rate, 250_000);
        assert!(config.input_framed);
        assert!(!config.output_framed);
        assert_eq!(config.byte_order, ByteOrder::Big);
        // 未给出的字段取默认值
        assert_eq!(config.poll_interval_us, 200);
    }
}
