use crate::config::WheelConfig;
use crate::dispatch::Dispatcher;
use crate::task::{TaskKey, TimerTask};
use crate::wheel::Wheel;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// 调度循环命令类型
pub(crate) enum LoopCommand {
    /// 添加定时器任务
    Add(TimerTask),
    /// 按键取消定时器任务
    Remove(TaskKey),
    /// 批量取消定时器任务
    RemoveBatch(Vec<TaskKey>),
    /// 查询等待中的任务数量
    PendingCount(oneshot::Sender<usize>),
}

/// 调度循环
///
/// 独占时间轮，所有对槽位和键索引的修改都在这一个循环里顺序执行，
/// 因此时间轮本身不需要加锁。
pub(crate) struct SchedulerLoop {
    wheel: Wheel,
    tick_interval: Duration,
    command_rx: mpsc::Receiver<LoopCommand>,
    dispatcher: Dispatcher,
    /// `stop()` 触发的停止信号
    stop: CancellationToken,
    /// 外部传入的关闭信号
    shutdown: CancellationToken,
}

impl SchedulerLoop {
    pub(crate) fn new(
        config: &WheelConfig,
        command_rx: mpsc::Receiver<LoopCommand>,
        dispatcher: Dispatcher,
        stop: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            wheel: Wheel::new(config),
            tick_interval: config.tick_interval,
            command_rx,
            dispatcher,
            stop,
            shutdown,
        }
    }

    /// 运行调度循环，直到收到停止信号或所有发送端都被丢弃
    ///
    /// 各事件源之间没有优先级，谁先就绪先处理谁。
    /// 循环退出后不会再有 tick 或派发，已经派发出去的回调不受影响。
    pub(crate) async fn run(mut self) {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(
            tick_interval = ?self.tick_interval,
            bucket_count = self.wheel.bucket_count(),
            "scheduler loop started"
        );

        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => self.on_tick(),
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        tracing::debug!(pending = self.wheel.len(), "scheduler loop stopped");
    }

    fn on_tick(&mut self) {
        for task in self.wheel.advance() {
            tracing::trace!(key = %task.key, delay = ?task.delay, "task expired");
            self.dispatcher.dispatch(task.callback);
        }
    }

    fn handle_command(&mut self, command: LoopCommand) {
        match command {
            LoopCommand::Add(task) => {
                if let Some(replaced) = self.wheel.insert(task) {
                    self.dispatcher
                        .warn(&format!("pending task {} replaced by new schedule", replaced.key));
                }
            }
            LoopCommand::Remove(key) => {
                self.wheel.cancel(&key);
            }
            LoopCommand::RemoveBatch(keys) => {
                self.wheel.cancel_batch(&keys);
            }
            LoopCommand::PendingCount(reply) => {
                let _ = reply.send(self.wheel.len());
            }
        }
    }
}
