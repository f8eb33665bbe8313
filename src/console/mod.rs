//! 控制台模块
//!
//! 终端类双工流的抽象，以及分离键处理。

pub mod detach;
pub mod pty;
pub mod stdio;

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::utils::error::TaskIoError;

pub use detach::{parse_detach_keys, DetachableStdin, DEFAULT_DETACH_KEYS};
pub use pty::PtyConsole;
pub use stdio::StdioConsole;

/// 终端尺寸
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for TermSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// 控制台
///
/// 一个双工的终端流：既是任务的输入来源，也是输出目标。
/// 终端语义下 stdout 与 stderr 合并为同一个流。
pub trait Console: Send + Sync {
    /// 获取一个读取端
    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, TaskIoError>;

    /// 获取写入端
    fn take_writer(&self) -> Result<Box<dyn Write + Send>, TaskIoError>;

    /// 调整终端大小
    fn resize(&self, size: TermSize) -> Result<(), TaskIoError>;
}
