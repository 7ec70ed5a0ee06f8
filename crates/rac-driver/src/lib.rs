//! # RAC Driver
//!
//! 链路执行器：在一条点对点字节链路上并发运行接收线程和发送线程。
//!
//! - 接收线程轮询链路，解码入站消息并交给 [`MessageHandler`]
//! - 发送线程从单槽 [`Mailbox`] 取出最新消息，编码后写入链路
//! - 两个线程共用一把链路锁；邮箱锁独立，慢速写不会阻塞 `set_data`
//! - 链路故障在线程内触发停止，通过 [`ProtocolExecutor::last_fault`] 查询
//!
//! # Example
//!
//! ```no_run
//! use rac_driver::{ChannelHandler, ExecutorBuilder};
//! use rac_protocol::{Message, RegisterTypeTable, ValueType};
//!
//! let table = RegisterTypeTable::from_entries([(0, ValueType::UInt16), (1, ValueType::Bool)])
//!     .unwrap();
//! let (handler, inbound) = ChannelHandler::bounded(64);
//! let executor = ExecutorBuilder::new()
//!     .port("/dev/ttyACM0")
//!     .input_framed(true)
//!     .output_framed(true)
//!     .registers(table)
//!     .handler(handler)
//!     .build()
//!     .unwrap();
//!
//! if executor.start() {
//!     executor.set_data(Message::new().with(0, 500u16).with(1, true), false).unwrap();
//!     while let Ok(message) = inbound.recv() {
//!         println!("{:?}", message);
//!     }
//! }
//! ```

mod builder;
mod config;
mod error;
mod executor;
pub mod hooks;
pub mod mailbox;
pub mod metrics;
mod pipeline;
pub mod state;

pub use builder::ExecutorBuilder;
pub use config::ExecutorConfig;
pub use error::DriverError;
pub use executor::ProtocolExecutor;
pub use hooks::{ChannelHandler, DiscardHandler, MessageHandler};
pub use mailbox::Mailbox;
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use state::{ExecutorState, FaultOrigin, LinkFault};
