//! # RAC CLI
//!
//! Command-line interface for RAC serial devices.
//!
//! ```bash
//! # 列出串口
//! rac-cli ports
//!
//! # 监控入站寄存器（JSON，每条消息一行），Ctrl-C 退出
//! rac-cli --config link.toml monitor
//!
//! # 下发寄存器值
//! rac-cli --config link.toml send drive_delay1=120 enable=true --block
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rac_driver::{ExecutorBuilder, ExecutorState, ProtocolExecutor};
use rac_link::SerialLink;
use rac_protocol::{Message, RegisterMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

mod config;

use config::LinkFile;

/// RAC CLI - 寄存器协议命令行工具
#[derive(Parser, Debug)]
#[command(name = "rac-cli")]
#[command(about = "Command-line interface for RAC serial devices", long_about = None)]
#[command(version)]
struct Cli {
    /// 链路配置文件（TOML）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 串口名称（覆盖配置文件）
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// 波特率（覆盖配置文件）
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// 逐条记录收发消息
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 打印入站消息（以寄存器名称为键的 JSON）
    Monitor {
        /// 运行时长（秒），缺省时运行到 Ctrl-C
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// 下发一条消息
    Send {
        /// 寄存器赋值，形如 name=value
        #[arg(required = true)]
        assignments: Vec<String>,

        /// 等待之前未发送的消息发送完毕（背压）
        #[arg(long)]
        block: bool,

        /// 等待发送完成的最长时间（毫秒）
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },

    /// 列出串口
    Ports,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("rac_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ports => list_ports(),

        Commands::Monitor { duration } => {
            let file = load_link_file(cli.config, cli.port, cli.baud, cli.debug)?;
            monitor(file, duration.map(Duration::from_secs))
        },

        Commands::Send {
            assignments,
            block,
            timeout_ms,
        } => {
            let file = load_link_file(cli.config, cli.port, cli.baud, cli.debug)?;
            send(file, &assignments, block, Duration::from_millis(timeout_ms))
        },
    }
}

fn load_link_file(
    path: Option<PathBuf>,
    port: Option<String>,
    baud_rate: Option<u32>,
    debug: bool,
) -> Result<LinkFile> {
    let file = match path {
        Some(path) => LinkFile::load(&path)?,
        None => LinkFile::default(),
    };
    let mut file = file.with_overrides(port, baud_rate);
    file.link.debug |= debug;
    Ok(file)
}

fn list_ports() -> Result<()> {
    let ports = rac_link::available_ports().context("枚举串口失败")?;
    if ports.is_empty() {
        println!("(未发现串口)");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

fn start_executor(
    file: LinkFile,
    registers: Arc<RegisterMap>,
) -> Result<ProtocolExecutor<SerialLink>> {
    if registers.table().is_empty() {
        warn!("No registers defined, every message will be rejected");
    }

    let port = file.link.port.clone();
    let handler_registers = registers.clone();
    let executor = ExecutorBuilder::new()
        .config(file.link)
        .registers(registers.table().clone())
        .handler(move |message: Message| print_message(&handler_registers, &message))
        .build()?;

    if let Err(e) = executor.try_start() {
        bail!("无法打开串口 {}: {}", port, e);
    }
    Ok(executor)
}

fn print_message(registers: &RegisterMap, message: &Message) {
    match registers.to_named(message) {
        Ok(named) => match serde_json::to_string(&named) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize message: {}", e),
        },
        Err(e) => warn!("Inbound message with unnamed register: {}", e),
    }
}

fn monitor(file: LinkFile, duration: Option<Duration>) -> Result<()> {
    let registers = Arc::new(file.registers.clone());
    let executor = start_executor(file, registers)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Release);
    })
    .context("设置 Ctrl-C 处理失败")?;

    info!("Monitoring {}, press Ctrl-C to exit", executor.config().port);
    let started = Instant::now();
    loop {
        if interrupted.load(Ordering::Acquire) {
            info!("Interrupted");
            break;
        }
        if duration.is_some_and(|d| started.elapsed() >= d) {
            break;
        }
        if executor.state() == ExecutorState::Stopped {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    executor.stop();
    report(&executor)
}

fn send(file: LinkFile, assignments: &[String], block: bool, timeout: Duration) -> Result<()> {
    let message = assignments
        .iter()
        .map(|assignment| file.registers.parse_assignment(assignment))
        .collect::<Result<Message, _>>()?;

    let registers = Arc::new(file.registers.clone());
    let executor = start_executor(file, registers)?;
    executor.set_data(message, block)?;

    let deadline = Instant::now() + timeout;
    while executor.metrics().tx_messages == 0 {
        if executor.state() == ExecutorState::Stopped || Instant::now() >= deadline {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    let sent = executor.metrics().tx_messages > 0;
    executor.stop();
    report(&executor)?;
    if !sent {
        bail!("消息未在 {:?} 内发送", timeout);
    }
    info!("Sent {} register(s)", assignments.len());
    Ok(())
}

/// 输出运行统计，链路故障时返回错误
fn report(executor: &ProtocolExecutor<SerialLink>) -> Result<()> {
    let metrics = executor.metrics();
    info!(
        "rx: {} messages ({} pairs, {} idle bytes, {} desyncs), tx: {} messages ({} bytes, {} overwritten)",
        metrics.rx_messages,
        metrics.rx_pairs,
        metrics.rx_idle_bytes,
        metrics.rx_desyncs,
        metrics.tx_messages,
        metrics.tx_bytes,
        metrics.tx_overwrites,
    );
    if let Some(fault) = executor.last_fault() {
        bail!("{}", fault);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_send() {
        let cli = Cli::try_parse_from([
            "rac-cli",
            "--config",
            "link.toml",
            "send",
            "enable=true",
            "drive=5",
            "--block",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("link.toml")));
        match cli.command {
            Commands::Send {
                assignments, block, ..
            } => {
                assert_eq!(assignments, vec!["enable=true", "drive=5"]);
                assert!(block);
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from(["rac-cli", "monitor", "--port", "COM3", "-d", "5"]).unwrap();
        assert_eq!(cli.port.as_deref(), Some("COM3"));
        assert!(matches!(cli.command, Commands::Monitor { duration: Some(5) }));
    }

    #[test]
    fn test_send_requires_assignments() {
        assert!(Cli::try_parse_from(["rac-cli", "send"]).is_err());
    }
}
