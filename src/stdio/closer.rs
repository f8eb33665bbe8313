//! 终止回调
//!
//! 回调在任务创建之前就要构造出来，而任务句柄要等创建完成后才有，
//! 所以回调持有一个延迟填充的任务槽。

use std::sync::mpsc::SyncSender;
use std::sync::{Arc, OnceLock};

use crate::runtime::{Container, Task};

use super::guarded::Closer;

/// 延迟绑定的任务句柄
#[derive(Clone, Default)]
pub struct TaskSlot {
    task: Arc<OnceLock<Arc<dyn Task>>>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 填充任务句柄；只有第一次填充生效
    pub fn fill(&self, task: Arc<dyn Task>) -> bool {
        self.task.set(task).is_ok()
    }

    pub fn get(&self) -> Option<Arc<dyn Task>> {
        self.task.get().cloned()
    }
}

impl std::fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSlot")
            .field("filled", &self.task.get().is_some())
            .finish()
    }
}

/// 构造终端模式的分离回调
///
/// 先通知分离信号的接收方（阻塞直到被接收），再取消任务的实时 I/O。
/// 任务尚未创建或没有实时 I/O 时只记录日志。
pub fn detach_closer(detach_tx: Option<SyncSender<()>>, slot: TaskSlot) -> Closer {
    Box::new(move || {
        if let Some(tx) = detach_tx {
            if tx.send(()).is_err() {
                tracing::debug!("分离信号接收方已关闭");
            }
        }

        let Some(task) = slot.get() else {
            tracing::warn!("任务尚未创建，跳过 I/O 取消");
            return;
        };

        match task.io() {
            Some(io) => io.cancel(),
            None => tracing::error!("任务 {} 没有实时 I/O", task.id()),
        }
    })
}

/// 构造非终端交互模式的 stdin 关闭回调
///
/// 回调在 I/O 泵线程上执行，查找任务并关闭 stdin 的工作交给 tokio 运行时。
pub fn stdin_closer(container: Arc<dyn Container>) -> Closer {
    let handle = tokio::runtime::Handle::try_current().ok();

    Box::new(move || {
        let Some(handle) = handle else {
            tracing::debug!("没有可用的 tokio 运行时，无法关闭任务 stdin");
            return;
        };

        handle.spawn(async move {
            match container.task().await {
                Ok(task) => {
                    if let Err(e) = task.close_stdin().await {
                        tracing::debug!("关闭任务 {} 的 stdin 失败: {}", task.id(), e);
                    }
                }
                Err(e) => tracing::debug!("获取任务失败，无法关闭 stdin: {}", e),
            }
        });
    })
}
