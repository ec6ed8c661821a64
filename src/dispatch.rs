//! 任务派发模块
//!
//! 在独立的 tokio 任务中执行回调，并在任务边界捕获 panic，
//! 保证出错的回调不会影响调度循环或其他任务。

use crate::error::TimerError;
use crate::task::{CallbackWrapper, TimerCallback};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// 故障日志接口
///
/// 派发器捕获到的 panic 以 `error` 上报；调度循环用 `warn` 上报
/// 仍在等待的任务被同键任务替换。
pub trait FaultLogger: Send + Sync + 'static {
    /// 记录错误
    fn error(&self, message: &str);

    /// 记录警告
    fn warn(&self, message: &str);
}

/// 基于 `tracing` 的默认故障日志实现
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFaultLogger;

impl FaultLogger for TracingFaultLogger {
    fn error(&self, message: &str) {
        tracing::error!(target: "delay_wheel::dispatch", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "delay_wheel::dispatch", "{}", message);
    }
}

/// 异步计算的失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError<E> {
    /// 计算函数返回了错误
    Failed(E),
    /// 计算函数 panic，携带 panic 信息
    Panicked(String),
    /// 运行时在计算结束前关闭，结果无法送达
    Aborted,
}

impl<E: fmt::Display> fmt::Display for ExecError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::Failed(err) => write!(f, "异步任务执行失败: {}", err),
            ExecError::Panicked(message) => write!(f, "异步任务执行异常: {}", message),
            ExecError::Aborted => write!(f, "异步任务被中止"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ExecError<E> {}

/// 任务派发器
///
/// 每次派发都会生成一个新的 tokio 任务，没有并发上限也没有背压。
///
/// # 示例
/// ```no_run
/// use delay_wheel::Dispatcher;
///
/// #[tokio::main]
/// async fn main() {
///     let dispatcher = Dispatcher::current().unwrap();
///
///     dispatcher.go(|| async {
///         panic!("只会被记录到日志");
///     });
///
///     let pending = dispatcher.exec(|| async { Ok::<_, std::io::Error>(42) });
///     assert_eq!(pending.wait().await.unwrap(), 42);
/// }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    runtime: Handle,
    logger: Arc<dyn FaultLogger>,
}

impl Dispatcher {
    /// 创建派发器
    ///
    /// # 参数
    /// - `runtime`: 执行任务的运行时
    /// - `logger`: 故障日志
    pub fn new(runtime: Handle, logger: Arc<dyn FaultLogger>) -> Self {
        Self { runtime, logger }
    }

    /// 使用当前运行时和 `TracingFaultLogger` 创建派发器
    pub fn current() -> Result<Self, TimerError> {
        let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        Ok(Self::new(runtime, Arc::new(TracingFaultLogger)))
    }

    /// 替换故障日志
    pub fn with_logger(mut self, logger: Arc<dyn FaultLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// 在独立任务中执行回调（不关心结果）
    pub fn go<C>(&self, callback: C)
    where
        C: TimerCallback,
    {
        self.dispatch(Box::new(callback));
    }

    /// 通过故障日志上报警告
    pub(crate) fn warn(&self, message: &str) {
        self.logger.warn(message);
    }

    /// 派发已装箱的回调
    pub(crate) fn dispatch(&self, callback: CallbackWrapper) {
        let logger = Arc::clone(&self.logger);
        self.runtime.spawn(async move {
            let outcome = AssertUnwindSafe(async move { callback.call().await })
                .catch_unwind()
                .await;

            if let Err(payload) = outcome {
                logger.error(&format!(
                    "timer callback panicked: {}",
                    panic_message(payload.as_ref())
                ));
            }
        });
    }

    /// 在独立任务中执行计算，立即返回等待句柄
    ///
    /// 计算一定会执行到结束；放弃等待不会中断计算本身。
    pub fn exec<T, E, F, Fut>(&self, f: F) -> Pending<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let logger = Arc::clone(&self.logger);

        self.runtime.spawn(async move {
            let outcome = match AssertUnwindSafe(async move { f().await })
                .catch_unwind()
                .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(ExecError::Failed(err)),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    logger.error(&format!("async computation panicked: {}", message));
                    Err(ExecError::Panicked(message))
                }
            };

            // 等待方可能已经放弃
            let _ = result_tx.send(outcome);
        });

        Pending { result_rx }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

/// 异步计算的等待句柄
#[must_use = "计算结果需要通过 wait 或 wait_until 获取"]
pub struct Pending<T, E> {
    result_rx: oneshot::Receiver<Result<T, ExecError<E>>>,
}

impl<T, E> Pending<T, E> {
    /// 等待计算结束
    pub async fn wait(self) -> Result<T, ExecError<E>> {
        self.result_rx.await.unwrap_or(Err(ExecError::Aborted))
    }

    /// 等待计算结束，或在取消令牌触发时放弃等待
    ///
    /// # 返回
    /// - `Ok(Some(value))`: 计算成功
    /// - `Ok(None)`: 取消令牌先触发，放弃等待（计算仍会继续执行）
    /// - `Err(ExecError)`: 计算失败、panic 或被中止
    pub async fn wait_until(self, cancel: &CancellationToken) -> Result<Option<T>, ExecError<E>> {
        tokio::select! {
            biased;
            outcome = self.result_rx => outcome.unwrap_or(Err(ExecError::Aborted)).map(Some),
            _ = cancel.cancelled() => Ok(None),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
