//! 定时器配置模块
//!
//! 提供分层的配置结构和 Builder 模式，用于配置时间轮和调度循环。

use crate::error::TimerError;
use std::time::Duration;

/// 时间轮配置
///
/// 决定时间精度（tick 时长）和环的大小（槽位数量），
/// 一整圈的时间跨度为 `tick_interval × bucket_count`。
///
/// # 示例
/// ```no_run
/// use delay_wheel::WheelConfig;
/// use std::time::Duration;
///
/// let config = WheelConfig::builder()
///     .tick_interval(Duration::from_millis(20))
///     .bucket_count(60)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct WheelConfig {
    /// 每个 tick 的时间长度
    pub tick_interval: Duration,
    /// 槽位数量
    pub bucket_count: usize,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            bucket_count: 100,
        }
    }
}

impl WheelConfig {
    /// 创建配置构建器
    pub fn builder() -> WheelConfigBuilder {
        WheelConfigBuilder::default()
    }
}

/// 时间轮配置构建器
#[derive(Debug, Clone)]
pub struct WheelConfigBuilder {
    tick_interval: Duration,
    bucket_count: usize,
}

impl Default for WheelConfigBuilder {
    fn default() -> Self {
        let config = WheelConfig::default();
        Self {
            tick_interval: config.tick_interval,
            bucket_count: config.bucket_count,
        }
    }
}

impl WheelConfigBuilder {
    /// 设置 tick 时长
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// 设置槽位数量
    pub fn bucket_count(mut self, count: usize) -> Self {
        self.bucket_count = count;
        self
    }

    /// 构建配置并进行验证
    ///
    /// # 验证规则
    /// - tick_interval 必须大于 0
    /// - bucket_count 必须大于 0（不要求是 2 的幂次方）
    pub fn build(self) -> Result<WheelConfig, TimerError> {
        if self.tick_interval.is_zero() {
            return Err(TimerError::InvalidConfiguration {
                field: "tick_interval",
                reason: "tick 时长必须大于 0",
            });
        }

        if self.bucket_count == 0 {
            return Err(TimerError::InvalidConfiguration {
                field: "bucket_count",
                reason: "槽位数量必须大于 0",
            });
        }

        Ok(WheelConfig {
            tick_interval: self.tick_interval,
            bucket_count: self.bucket_count,
        })
    }
}

/// 调度循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// 命令通道容量，满时调用方会等待调度循环接收消息
    pub command_channel_capacity: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            command_channel_capacity: 512,
        }
    }
}

impl LoopConfig {
    /// 创建配置构建器
    pub fn builder() -> LoopConfigBuilder {
        LoopConfigBuilder::default()
    }
}

/// 调度循环配置构建器
#[derive(Debug, Clone)]
pub struct LoopConfigBuilder {
    command_channel_capacity: usize,
}

impl Default for LoopConfigBuilder {
    fn default() -> Self {
        Self {
            command_channel_capacity: LoopConfig::default().command_channel_capacity,
        }
    }
}

impl LoopConfigBuilder {
    /// 设置命令通道容量
    pub fn command_channel_capacity(mut self, capacity: usize) -> Self {
        self.command_channel_capacity = capacity;
        self
    }

    /// 构建配置并进行验证
    pub fn build(self) -> Result<LoopConfig, TimerError> {
        if self.command_channel_capacity == 0 {
            return Err(TimerError::InvalidConfiguration {
                field: "command_channel_capacity",
                reason: "命令通道容量必须大于 0",
            });
        }

        Ok(LoopConfig {
            command_channel_capacity: self.command_channel_capacity,
        })
    }
}

/// 顶层定时器配置
///
/// # 示例
/// ```no_run
/// use delay_wheel::TimerConfig;
///
/// let config = TimerConfig::builder()
///     .tick_interval(std::time::Duration::from_millis(5))
///     .bucket_count(200)
///     .command_channel_capacity(1024)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TimerConfig {
    /// 时间轮配置
    pub wheel: WheelConfig,
    /// 调度循环配置
    pub scheduler: LoopConfig,
}

impl TimerConfig {
    /// 创建配置构建器
    pub fn builder() -> TimerConfigBuilder {
        TimerConfigBuilder::default()
    }
}

/// 顶层定时器配置构建器
#[derive(Debug, Default)]
pub struct TimerConfigBuilder {
    wheel_builder: WheelConfigBuilder,
    loop_builder: LoopConfigBuilder,
}

impl TimerConfigBuilder {
    /// 设置 tick 时长
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.wheel_builder = self.wheel_builder.tick_interval(interval);
        self
    }

    /// 设置槽位数量
    pub fn bucket_count(mut self, count: usize) -> Self {
        self.wheel_builder = self.wheel_builder.bucket_count(count);
        self
    }

    /// 设置命令通道容量
    pub fn command_channel_capacity(mut self, capacity: usize) -> Self {
        self.loop_builder = self.loop_builder.command_channel_capacity(capacity);
        self
    }

    /// 构建配置并进行验证
    pub fn build(self) -> Result<TimerConfig, TimerError> {
        Ok(TimerConfig {
            wheel: self.wheel_builder.build()?,
            scheduler: self.loop_builder.build()?,
        })
    }
}
