//! 进程级默认定时器
//!
//! 不在进程启动时创建：在第一次调用 [`default_wheel`]、[`default_runtime`]
//! 或 [`set_default_wheel`] 之前，不会有任何运行时、线程或调度循环存在。
//! 创建后运行在进程专用的多线程运行时上，
//! 直到调用 [`stop_default_wheel`] 或进程退出。需要独立实例
//! （例如测试）时直接构造 [`TimerWheel`] 并显式传递即可。

use crate::error::TimerError;
use crate::timer::TimerWheel;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

/// 默认运行时的工作线程数
const DEFAULT_WORKER_THREADS: usize = 2;

struct DefaultTimer {
    /// 默认实例的运行时，进程内常驻
    runtime: Runtime,
    /// 自动启动的时间轮的关闭信号
    shutdown: CancellationToken,
    wheel: RwLock<Arc<TimerWheel>>,
}

static DEFAULT_TIMER: Mutex<Option<&'static DefaultTimer>> = parking_lot::const_mutex(None);

fn instance() -> Result<&'static DefaultTimer, TimerError> {
    let mut slot = DEFAULT_TIMER.lock();
    if let Some(timer) = *slot {
        return Ok(timer);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(DEFAULT_WORKER_THREADS)
        .thread_name("delay-wheel-default")
        .enable_time()
        .build()
        .map_err(|err| TimerError::RuntimeBuild(err.to_string()))?;

    let shutdown = CancellationToken::new();
    let wheel = TimerWheel::with_defaults();
    wheel.start_on(runtime.handle(), shutdown.clone())?;

    tracing::debug!("default timer wheel started");

    let timer: &'static DefaultTimer = Box::leak(Box::new(DefaultTimer {
        runtime,
        shutdown,
        wheel: RwLock::new(Arc::new(wheel)),
    }));
    *slot = Some(timer);
    Ok(timer)
}

/// 获取进程级默认定时器，首次调用时创建并启动（10ms tick，100 个槽位）
pub fn default_wheel() -> Result<Arc<TimerWheel>, TimerError> {
    Ok(Arc::clone(&instance()?.wheel.read()))
}

/// 替换进程级默认定时器，返回被替换的实例
///
/// 新实例需要由调用方自行启动；被替换的实例继续运行，
/// 直到调用方停止它或 [`stop_default_wheel`] 被调用。
pub fn set_default_wheel(wheel: Arc<TimerWheel>) -> Result<Arc<TimerWheel>, TimerError> {
    let timer = instance()?;
    let previous = std::mem::replace(&mut *timer.wheel.write(), wheel);
    Ok(previous)
}

/// 停止进程级默认定时器
///
/// 同时停止自动启动的实例和当前注册的实例。尚未初始化时什么也不做。
pub fn stop_default_wheel() {
    let Some(timer) = *DEFAULT_TIMER.lock() else {
        return;
    };

    timer.shutdown.cancel();
    timer.wheel.read().request_stop();
    tracing::debug!("default timer wheel stopped");
}

/// 默认定时器所在运行时的句柄，可用于在同一运行时上派发任务
pub fn default_runtime() -> Result<tokio::runtime::Handle, TimerError> {
    Ok(instance()?.runtime.handle().clone())
}
