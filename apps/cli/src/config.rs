//! 链路配置文件
//!
//! ```toml
//! [link]
//! port = "/dev/ttyACM0"
//! baud_rate = 250000
//! input_framed = true
//! output_framed = false
//!
//! [[registers]]
//! name = "drive_delay1"
//! id = 0
//! type = "int16"
//! ```

use anyhow::{Context, Result};
use rac_driver::ExecutorConfig;
use rac_protocol::RegisterMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// 链路配置文件内容
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkFile {
    /// 链路参数（缺省字段取默认值）
    #[serde(default)]
    pub link: ExecutorConfig,

    /// 寄存器定义
    #[serde(default)]
    pub registers: RegisterMap,
}

impl LinkFile {
    /// 从 TOML 文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 应用命令行覆盖项
    pub fn with_overrides(mut self, port: Option<String>, baud_rate: Option<u32>) -> Self {
        if let Some(port) = port {
            self.link.port = port;
        }
        if let Some(baud_rate) = baud_rate {
            self.link.baud_rate = baud_rate;
        }
        self
    }
}
