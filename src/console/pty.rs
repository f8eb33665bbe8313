//! 伪终端控制台
//!
//! 使用 portable-pty 打开一对伪终端，主端作为控制台交给任务 I/O。

use parking_lot::Mutex;
use portable_pty::{native_pty_system, MasterPty, PtyPair, PtySize, SlavePty};
use std::io::{Read, Write};

use crate::utils::error::TaskIoError;

use super::{Console, TermSize};

fn pty_size(term_size: TermSize) -> PtySize {
    PtySize {
        rows: term_size.rows,
        cols: term_size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn pty_error(e: impl std::fmt::Display) -> TaskIoError {
    TaskIoError::ConsoleFailed(e.to_string())
}

/// 伪终端控制台
pub struct PtyConsole {
    /// PTY master
    master: Mutex<Box<dyn MasterPty + Send>>,
    /// PTY slave，保持打开以免主端读到 EOF
    slave: Mutex<Option<Box<dyn SlavePty + Send>>>,
    /// 当前尺寸
    size: Mutex<TermSize>,
}

impl PtyConsole {
    /// 打开新的伪终端控制台
    pub fn open(term_size: TermSize) -> Result<Self, TaskIoError> {
        let pty_system = native_pty_system();
        let PtyPair { master, slave } = pty_system.openpty(pty_size(term_size)).map_err(pty_error)?;

        tracing::debug!("打开伪终端控制台: {}x{}", term_size.cols, term_size.rows);

        Ok(Self {
            master: Mutex::new(master),
            slave: Mutex::new(Some(slave)),
            size: Mutex::new(term_size),
        })
    }

    /// 取出 slave 端，交给需要在该终端中运行的进程
    pub fn take_slave(&self) -> Option<Box<dyn SlavePty + Send>> {
        self.slave.lock().take()
    }

    /// 获取当前尺寸
    pub fn size(&self) -> TermSize {
        *self.size.lock()
    }
}

impl Console for PtyConsole {
    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, TaskIoError> {
        self.master.lock().try_clone_reader().map_err(pty_error)
    }

    fn take_writer(&self) -> Result<Box<dyn Write + Send>, TaskIoError> {
        self.master.lock().take_writer().map_err(pty_error)
    }

    fn resize(&self, term_size: TermSize) -> Result<(), TaskIoError> {
        self.master.lock().resize(pty_size(term_size)).map_err(pty_error)?;
        *self.size.lock() = term_size;
        Ok(())
    }
}
