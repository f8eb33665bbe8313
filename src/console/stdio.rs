//! 当前进程的终端
//!
//! 以进程自身的 stdin/stdout 作为控制台。

use std::io::{Read, Write};

use crate::utils::error::TaskIoError;

use super::{Console, TermSize};

/// 检查进程的 stdin 是否为终端设备
pub fn stdin_is_terminal() -> bool {
    atty::is(atty::Stream::Stdin)
}

/// 进程自身的终端
#[derive(Debug, Default)]
pub struct StdioConsole {
    _private: (),
}

impl StdioConsole {
    /// 获取当前终端
    ///
    /// stdin 不是终端设备时返回错误。
    pub fn current() -> Result<Self, TaskIoError> {
        if !stdin_is_terminal() {
            return Err(TaskIoError::NotATerminal("stdin".to_string()));
        }
        Ok(Self { _private: () })
    }
}

impl Console for StdioConsole {
    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, TaskIoError> {
        Ok(Box::new(std::io::stdin()))
    }

    fn take_writer(&self) -> Result<Box<dyn Write + Send>, TaskIoError> {
        Ok(Box::new(std::io::stdout()))
    }

    fn resize(&self, size: TermSize) -> Result<(), TaskIoError> {
        // 宿主终端的尺寸由用户的终端模拟器决定
        tracing::trace!("忽略宿主终端尺寸调整: {}x{}", size.cols, size.rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_matches_tty_probe() {
        assert_eq!(StdioConsole::current().is_ok(), stdin_is_terminal());
    }

    #[test]
    fn test_current_error_type() {
        if let Err(e) = StdioConsole::current() {
            assert_eq!(e.error_type(), "not_a_terminal");
        }
    }
}
