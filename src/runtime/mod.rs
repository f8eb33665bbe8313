//! 运行时接口
//!
//! 容器运行时客户端、容器和任务的窄接口。选择器只通过这些接口与运行时交互。

pub mod creator;
#[cfg(feature = "local-runtime")]
pub mod local;

use async_trait::async_trait;
use std::sync::Arc;

use crate::utils::error::TaskIoError;

pub use creator::{ContainerIo, IoCreator};
#[cfg(feature = "local-runtime")]
pub use local::{LocalContainer, LocalRuntime, LocalTask};

/// 运行时客户端
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// 查询运行时服务端版本
    async fn server_version(&self) -> Result<String, TaskIoError>;
}

/// 任务的实时 I/O
pub trait TaskIo: Send + Sync {
    /// 取消所有 I/O 泵
    fn cancel(&self);
}

/// 运行中的任务
#[async_trait]
pub trait Task: Send + Sync {
    /// 任务 ID
    fn id(&self) -> &str;

    /// 实时 I/O 句柄；仅写日志的任务没有实时 I/O
    fn io(&self) -> Option<Arc<dyn TaskIo>>;

    /// 关闭任务的 stdin
    async fn close_stdin(&self) -> Result<(), TaskIoError>;

    /// 等待任务退出，返回退出码
    async fn wait(&self) -> Result<i32, TaskIoError>;
}

/// 容器
#[async_trait]
pub trait Container: Send + Sync {
    /// 使用 I/O 创建器创建任务
    async fn new_task(&self, creator: IoCreator) -> Result<Arc<dyn Task>, TaskIoError>;

    /// 查找已创建的任务
    async fn task(&self) -> Result<Arc<dyn Task>, TaskIoError>;
}
