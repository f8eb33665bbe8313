//! 错误类型定义
//!
//! 定义任务 I/O 组装过程中的错误类型，提供描述性错误消息。
//!
//! ## 功能
//! - 定义 TaskIoError 枚举，涵盖配置错误、运行时错误和 I/O 错误
//! - 实现错误转换（From trait）
//! - 提供错误分类和辅助方法

use thiserror::Error;

/// 任务 I/O 错误类型
#[derive(Debug, Error)]
pub enum TaskIoError {
    /// 日志目标 URI 无法解析
    #[error("日志 URI 无效: {0}")]
    InvalidLogUri(String),

    /// 二进制日志参数数量不为 1
    #[error("parse logging path error: {0}")]
    LoggingPathParse(String),

    /// 终端模式下没有可用的控制台
    #[error("控制台不存在: {0}")]
    ConsoleMissing(String),

    /// 输入设备不是 TTY
    #[error("the input device is not a TTY: {0}")]
    NotATerminal(String),

    /// 控制台包装失败
    #[error("控制台包装失败: {0}")]
    ConsoleFailed(String),

    /// 分离键序列无效
    #[error("分离键无效: {0}")]
    InvalidDetachKeys(String),

    /// 任务创建失败
    #[error("任务创建失败: {0}")]
    TaskCreationFailed(String),

    /// 任务不存在
    #[error("任务不存在: {0}")]
    TaskNotFound(String),

    /// 运行时版本查询失败
    #[error("版本查询失败: {0}")]
    VersionQueryFailed(String),

    /// 运行时不支持该 I/O 方式
    #[error("不支持的 I/O 方式: {0}")]
    UnsupportedIo(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<url::ParseError> for TaskIoError {
    fn from(err: url::ParseError) -> Self {
        TaskIoError::InvalidLogUri(err.to_string())
    }
}

impl TaskIoError {
    /// 获取错误码
    pub fn code(&self) -> i32 {
        match self {
            TaskIoError::InvalidLogUri(_) => 2001,
            TaskIoError::LoggingPathParse(_) => 2002,
            TaskIoError::ConsoleMissing(_) => 2003,
            TaskIoError::NotATerminal(_) => 2004,
            TaskIoError::ConsoleFailed(_) => 2005,
            TaskIoError::InvalidDetachKeys(_) => 2006,
            TaskIoError::TaskCreationFailed(_) => 2007,
            TaskIoError::TaskNotFound(_) => 2008,
            TaskIoError::VersionQueryFailed(_) => 2009,
            TaskIoError::UnsupportedIo(_) => 2010,
            TaskIoError::IoError(_) => 2011,
            TaskIoError::SerializationError(_) => 2012,
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            TaskIoError::InvalidLogUri(_) => "invalid_log_uri",
            TaskIoError::LoggingPathParse(_) => "logging_path_parse",
            TaskIoError::ConsoleMissing(_) => "console_missing",
            TaskIoError::NotATerminal(_) => "not_a_terminal",
            TaskIoError::ConsoleFailed(_) => "console_failed",
            TaskIoError::InvalidDetachKeys(_) => "invalid_detach_keys",
            TaskIoError::TaskCreationFailed(_) => "task_creation_failed",
            TaskIoError::TaskNotFound(_) => "task_not_found",
            TaskIoError::VersionQueryFailed(_) => "version_query_failed",
            TaskIoError::UnsupportedIo(_) => "unsupported_io",
            TaskIoError::IoError(_) => "io_error",
            TaskIoError::SerializationError(_) => "serialization_error",
        }
    }

    /// 检查是否为配置错误
    ///
    /// 配置错误在任务创建前就会被发现，重试没有意义。
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TaskIoError::InvalidLogUri(_)
                | TaskIoError::LoggingPathParse(_)
                | TaskIoError::ConsoleMissing(_)
                | TaskIoError::NotATerminal(_)
                | TaskIoError::InvalidDetachKeys(_)
        )
    }

    /// 检查是否为仅需告警的错误
    pub fn is_advisory(&self) -> bool {
        matches!(self, TaskIoError::VersionQueryFailed(_))
    }

    // ============ 错误构造辅助方法 ============

    /// 创建日志参数解析错误（包含实际参数数量）
    pub fn logging_args(log_uri: &str, count: usize) -> Self {
        TaskIoError::LoggingPathParse(format!(
            "{} 应包含 1 个查询参数，实际为 {}",
            log_uri, count
        ))
    }

    /// 创建任务创建失败错误
    pub fn task_creation_failed(program: &str, reason: &str) -> Self {
        TaskIoError::TaskCreationFailed(format!("{}: {}", program, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TaskIoError::NotATerminal("stdin".to_string());
        assert_eq!(err.to_string(), "the input device is not a TTY: stdin");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(TaskIoError::InvalidLogUri("".to_string()).code(), 2001);
        assert_eq!(TaskIoError::LoggingPathParse("".to_string()).code(), 2002);
        assert_eq!(TaskIoError::ConsoleMissing("".to_string()).code(), 2003);
        assert_eq!(TaskIoError::UnsupportedIo("".to_string()).code(), 2010);
    }

    #[test]
    fn test_error_types() {
        assert_eq!(
            TaskIoError::ConsoleMissing("".to_string()).error_type(),
            "console_missing"
        );
        assert_eq!(
            TaskIoError::InvalidDetachKeys("".to_string()).error_type(),
            "invalid_detach_keys"
        );
    }

    #[test]
    fn test_is_configuration_error() {
        assert!(TaskIoError::LoggingPathParse("".to_string()).is_configuration_error());
        assert!(TaskIoError::NotATerminal("".to_string()).is_configuration_error());
        assert!(!TaskIoError::VersionQueryFailed("".to_string()).is_configuration_error());
        assert!(!TaskIoError::TaskNotFound("".to_string()).is_configuration_error());
    }

    #[test]
    fn test_is_advisory() {
        assert!(TaskIoError::VersionQueryFailed("timeout".to_string()).is_advisory());
        assert!(!TaskIoError::InvalidLogUri("x".to_string()).is_advisory());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err: TaskIoError = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(err.error_type(), "invalid_log_uri");
    }

    #[test]
    fn test_logging_args_helper() {
        let err = TaskIoError::logging_args("binary:///bin/log", 0);
        let msg = err.to_string();
        assert!(msg.starts_with("parse logging path error"));
        assert!(msg.contains("binary:///bin/log"));
        assert!(msg.contains('0'));
    }
}
