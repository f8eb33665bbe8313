//! taskio 库
//!
//! 为容器任务选择并组装标准 I/O：重定向、终端、分离和日志驱动。
//! 附带一个在宿主机上以子进程运行任务的本地运行时。

pub mod console;
pub mod runtime;
pub mod stdio;
pub mod utils;

#[cfg(test)]
mod testing;

pub use stdio::{classify, IoMode, IoSelector, ModeParams};
pub use utils::error::TaskIoError;
