use crate::config::{TimerConfig, WheelConfig};
use crate::dispatch::{Dispatcher, FaultLogger, TracingFaultLogger};
use crate::error::TimerError;
use crate::scheduler::{LoopCommand, SchedulerLoop};
use crate::task::{KeyGenerator, TaskKey, TimerCallback, TimerTask};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 时间轮定时器管理器
///
/// 线程安全的入口：所有调度和取消请求都以消息的形式发送给调度循环，
/// 调用方只会等待到调度循环接收消息为止，不会等待定时器触发。
///
/// 需要在多个任务之间共享时请使用 `Arc<TimerWheel>`。
pub struct TimerWheel {
    config: TimerConfig,

    /// 命令发送端
    command_tx: mpsc::Sender<LoopCommand>,

    /// 命令接收端，启动调度循环时被取走
    command_rx: Mutex<Option<mpsc::Receiver<LoopCommand>>>,

    /// 自动生成任务键
    keys: KeyGenerator,

    /// 派发器使用的故障日志
    logger: Arc<dyn FaultLogger>,

    /// `stop()` 使用的停止信号
    stop: CancellationToken,

    /// 调度循环任务句柄
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerWheel {
    /// 创建新的定时器管理器（尚未启动）
    ///
    /// # 参数
    /// - `tick_interval`: 每个 tick 的时间长度（建议 10ms）
    /// - `bucket_count`: 槽位数量
    ///
    /// # 返回
    /// 参数不为正时返回 `TimerError::InvalidConfiguration`
    ///
    /// # 示例
    /// ```no_run
    /// use delay_wheel::TimerWheel;
    /// use std::time::Duration;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let timer = TimerWheel::new(Duration::from_millis(10), 100).unwrap();
    ///     timer.start(CancellationToken::new()).unwrap();
    /// }
    /// ```
    pub fn new(tick_interval: Duration, bucket_count: usize) -> Result<Self, TimerError> {
        let wheel = WheelConfig::builder()
            .tick_interval(tick_interval)
            .bucket_count(bucket_count)
            .build()?;
        Ok(Self::from_config(TimerConfig {
            wheel,
            ..TimerConfig::default()
        }))
    }

    /// 使用完整配置创建定时器管理器（尚未启动）
    pub fn with_config(config: TimerConfig) -> Result<Self, TimerError> {
        let config = TimerConfig::builder()
            .tick_interval(config.wheel.tick_interval)
            .bucket_count(config.wheel.bucket_count)
            .command_channel_capacity(config.scheduler.command_channel_capacity)
            .build()?;
        Ok(Self::from_config(config))
    }

    /// 创建带默认配置的定时器管理器（尚未启动）
    /// - tick 时长: 10ms
    /// - 槽位数量: 100
    pub fn with_defaults() -> Self {
        Self::from_config(TimerConfig::default())
    }

    fn from_config(config: TimerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.scheduler.command_channel_capacity);

        Self {
            config,
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            keys: KeyGenerator::new(),
            logger: Arc::new(TracingFaultLogger),
            stop: CancellationToken::new(),
            loop_handle: Mutex::new(None),
        }
    }

    /// 替换派发器使用的故障日志，需要在启动前调用
    pub fn with_logger(mut self, logger: Arc<dyn FaultLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// 获取配置
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// 在当前 tokio 运行时上启动调度循环
    ///
    /// # 参数
    /// - `shutdown`: 外部关闭信号，触发后调度循环退出
    pub fn start(&self, shutdown: CancellationToken) -> Result<(), TimerError> {
        let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        self.start_on(&runtime, shutdown)
    }

    /// 在指定运行时上启动调度循环，到期的回调也在该运行时上执行
    ///
    /// # 返回
    /// 重复启动时返回 `TimerError::AlreadyStarted`
    pub fn start_on(&self, runtime: &Handle, shutdown: CancellationToken) -> Result<(), TimerError> {
        let command_rx = self
            .command_rx
            .lock()
            .take()
            .ok_or(TimerError::AlreadyStarted)?;

        let dispatcher = Dispatcher::new(runtime.clone(), Arc::clone(&self.logger));
        let scheduler = SchedulerLoop::new(
            &self.config.wheel,
            command_rx,
            dispatcher,
            self.stop.clone(),
            shutdown,
        );

        let handle = runtime.spawn(scheduler.run());
        *self.loop_handle.lock() = Some(handle);
        Ok(())
    }

    /// 调度循环是否正在运行
    pub fn is_running(&self) -> bool {
        self.loop_handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 调度一次性定时器（自动生成键）
    ///
    /// # 参数
    /// - `delay`: 延迟时间，为 0 时请求被直接丢弃
    /// - `callback`: 到期后执行的回调，参数由闭包捕获
    ///
    /// # 返回
    /// - `Ok(Some(key))`: 已提交给调度循环，可用 `key` 取消
    /// - `Ok(None)`: 延迟为 0，请求被丢弃
    /// - `Err(TimerError::ChannelClosed)`: 调度循环已经停止
    ///
    /// # 示例
    /// ```no_run
    /// use delay_wheel::TimerWheel;
    /// use std::time::Duration;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let timer = TimerWheel::with_defaults();
    ///     timer.start(CancellationToken::new()).unwrap();
    ///
    ///     let payload = String::from("session-42");
    ///     timer.add_timer(Duration::from_secs(1), move || async move {
    ///         println!("expired: {}", payload);
    ///     }).await.unwrap();
    /// }
    /// ```
    pub async fn add_timer<C>(&self, delay: Duration, callback: C) -> Result<Option<TaskKey>, TimerError>
    where
        C: TimerCallback,
    {
        if delay.is_zero() {
            tracing::debug!("zero delay timer dropped");
            return Ok(None);
        }

        let key = self.keys.next_key();
        let task = TimerTask::new(key.clone(), delay, callback);
        self.send(LoopCommand::Add(task)).await?;
        Ok(Some(key))
    }

    /// 使用调用方提供的键调度一次性定时器
    ///
    /// 如果相同键的任务仍在等待，旧任务会被替换。
    pub async fn add_timer_with_key<K, C>(&self, delay: Duration, key: K, callback: C) -> Result<(), TimerError>
    where
        K: Into<TaskKey>,
        C: TimerCallback,
    {
        let Some(task) = Self::keyed_task(delay, key.into(), callback) else {
            return Ok(());
        };
        self.send(LoopCommand::Add(task)).await
    }

    /// 按键取消定时器
    ///
    /// 键不存在或任务已经触发时什么也不做。取消与即将到来的 tick
    /// 之间存在竞争，不保证一定能拦下即将触发的任务。
    pub async fn remove_timer<K>(&self, key: K) -> Result<(), TimerError>
    where
        K: Into<TaskKey>,
    {
        self.send(LoopCommand::Remove(key.into())).await
    }

    /// 批量取消定时器
    pub async fn remove_timers(&self, keys: Vec<TaskKey>) -> Result<(), TimerError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.send(LoopCommand::RemoveBatch(keys)).await
    }

    /// 获取当前等待中的定时器数量
    ///
    /// 查询同样经过调度循环，因此结果反映此前已提交的所有请求。
    pub async fn pending_count(&self) -> Result<usize, TimerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LoopCommand::PendingCount(reply_tx)).await?;
        reply_rx.await.map_err(|_| TimerError::ChannelClosed)
    }

    /// `add_timer` 的阻塞版本，供非异步代码调用
    ///
    /// # Panics
    /// 在异步上下文中调用会 panic（与 `mpsc::Sender::blocking_send` 相同）。
    pub fn blocking_add_timer<C>(&self, delay: Duration, callback: C) -> Result<Option<TaskKey>, TimerError>
    where
        C: TimerCallback,
    {
        if delay.is_zero() {
            tracing::debug!("zero delay timer dropped");
            return Ok(None);
        }

        let key = self.keys.next_key();
        let task = TimerTask::new(key.clone(), delay, callback);
        self.blocking_send(LoopCommand::Add(task))?;
        Ok(Some(key))
    }

    /// `add_timer_with_key` 的阻塞版本
    ///
    /// # Panics
    /// 在异步上下文中调用会 panic。
    pub fn blocking_add_timer_with_key<K, C>(&self, delay: Duration, key: K, callback: C) -> Result<(), TimerError>
    where
        K: Into<TaskKey>,
        C: TimerCallback,
    {
        let Some(task) = Self::keyed_task(delay, key.into(), callback) else {
            return Ok(());
        };
        self.blocking_send(LoopCommand::Add(task))
    }

    /// `remove_timer` 的阻塞版本
    ///
    /// # Panics
    /// 在异步上下文中调用会 panic。
    pub fn blocking_remove_timer<K>(&self, key: K) -> Result<(), TimerError>
    where
        K: Into<TaskKey>,
    {
        self.blocking_send(LoopCommand::Remove(key.into()))
    }

    /// 通知调度循环停止，不等待其退出
    ///
    /// 尚未启动时直接丢弃接收端和其中缓冲的请求。
    pub fn request_stop(&self) {
        self.stop.cancel();
        self.command_rx.lock().take();
    }

    /// 停止调度循环并等待其退出
    ///
    /// 停止后不会再有 tick 或派发，已经派发的回调继续执行。
    /// 之后的调度请求都会返回 `TimerError::ChannelClosed`，
    /// 无论此前是否启动过。
    pub async fn stop(&self) {
        self.request_stop();

        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn keyed_task<C>(delay: Duration, key: TaskKey, callback: C) -> Option<TimerTask>
    where
        C: TimerCallback,
    {
        if delay.is_zero() {
            tracing::debug!(key = %key, "zero delay timer dropped");
            return None;
        }
        Some(TimerTask::new(key, delay, callback))
    }

    async fn send(&self, command: LoopCommand) -> Result<(), TimerError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| TimerError::ChannelClosed)
    }

    fn blocking_send(&self, command: LoopCommand) -> Result<(), TimerError> {
        self.command_tx
            .blocking_send(command)
            .map_err(|_| TimerError::ChannelClosed)
    }
}

impl Drop for TimerWheel {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
