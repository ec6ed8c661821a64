use std::fmt;

/// 定时器错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// 配置参数无效（tick 时长、槽位数量或通道容量不为正）
    InvalidConfiguration {
        field: &'static str,
        reason: &'static str,
    },

    /// 内部通信通道已关闭（调度循环已经退出）
    ChannelClosed,

    /// 调度循环已经启动过
    AlreadyStarted,

    /// 当前上下文中没有可用的 tokio 运行时
    NoRuntime,

    /// 默认实例的运行时构建失败
    RuntimeBuild(String),
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::InvalidConfiguration { field, reason } => {
                write!(f, "无效的配置项 {}: {}", field, reason)
            }
            TimerError::ChannelClosed => {
                write!(f, "内部通信通道已关闭")
            }
            TimerError::AlreadyStarted => {
                write!(f, "调度循环已经启动")
            }
            TimerError::NoRuntime => {
                write!(f, "没有可用的 tokio 运行时")
            }
            TimerError::RuntimeBuild(reason) => {
                write!(f, "运行时构建失败: {}", reason)
            }
        }
    }
}

impl std::error::Error for TimerError {}
