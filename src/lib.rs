//! # 延时任务调度器
//!
//! 基于时间轮（Timing Wheel）算法的延时任务调度器，运行在 tokio 之上，
//! 附带一个带故障隔离的任务派发器。
//!
//! ## 特性
//!
//! - **单循环串行化**: 所有对时间轮的修改都在一个调度循环里顺序执行，时间轮本身无锁
//! - **多圈计数**: 超出一圈范围的任务记录剩余圈数，每经过一次所在槽位减一
//! - **可取消**: 通过自动生成或调用方提供的键取消尚未触发的任务
//! - **故障隔离**: 回调在独立的 tokio 任务中执行，panic 被捕获并记录到日志
//!
//! ## 快速开始
//!
//! ```no_run
//! use delay_wheel::TimerWheel;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let timer = TimerWheel::with_defaults();
//!     timer.start(CancellationToken::new())?;
//!
//!     // 可取消的定时器
//!     timer.add_timer_with_key(Duration::from_secs(5), "session-1", || async {
//!         println!("session expired");
//!     }).await?;
//!
//!     timer.remove_timer("session-1").await?;
//!     timer.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## 架构说明
//!
//! 时间轮是一个环形数组，每个槽位按插入顺序存储一组任务，游标每个 tick 前进一格。
//! 对延迟 `d`：
//!
//! - `ticks = floor(d / tick_interval)`，不足一个 tick 的延迟会在下一个 tick 触发
//! - 槽位 = `(cursor + ticks) mod bucket_count`
//! - 圈数 = `ticks / bucket_count`
//!
//! 调用方通过 [`TimerWheel`] 发送消息给调度循环；调度循环在 tick 时扫描槽位，
//! 把到期任务交给 [`Dispatcher`] 执行。
//!
//! 进程级默认实例见 [`default_wheel`]。

mod config;
mod dispatch;
mod error;
mod global;
mod scheduler;
mod task;
mod timer;
mod wheel;

// 重新导出公共 API
pub use config::{
    LoopConfig, LoopConfigBuilder,
    TimerConfig, TimerConfigBuilder,
    WheelConfig, WheelConfigBuilder,
};
pub use dispatch::{Dispatcher, ExecError, FaultLogger, Pending, TracingFaultLogger};
pub use error::TimerError;
pub use global::{default_runtime, default_wheel, set_default_wheel, stop_default_wheel};
pub use task::{CallbackWrapper, KeyGenerator, TaskKey, TimerCallback, TimerTask};
pub use timer::TimerWheel;
pub use wheel::Wheel;
