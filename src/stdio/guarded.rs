//! 受保护的 stdin
//!
//! 包装任务的输入流：读取失败、读到 EOF 或被显式关闭时，
//! 终止回调在整个生命周期内只触发一次。
//!
//! 运行时的 I/O 泵在自己的线程上读取，分离信号或任务关闭路径可能同时关闭它，
//! 因此关闭标记的检查与回调调用处于同一把锁内。

use parking_lot::Mutex;
use std::io::{self, Read};
use std::sync::Arc;

/// 终止回调
pub type Closer = Box<dyn FnOnce() + Send>;

struct Inner {
    stdin: Box<dyn Read + Send>,
    closer: Option<Closer>,
    closed: bool,
}

impl Inner {
    fn fire(&mut self) {
        self.closed = true;
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

/// 受保护的 stdin
///
/// 克隆共享同一份状态：I/O 泵读取一份，关闭路径持有另一份。
#[derive(Clone)]
pub struct GuardedStdin {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for GuardedStdin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedStdin")
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn bad_file_descriptor() -> io::Error {
    #[cfg(unix)]
    {
        io::Error::from_raw_os_error(libc::EBADF)
    }

    #[cfg(not(unix))]
    {
        io::Error::new(io::ErrorKind::Other, "bad file descriptor")
    }
}

impl GuardedStdin {
    /// 包装输入流
    pub fn new(stdin: Box<dyn Read + Send>, closer: Option<Closer>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                stdin,
                closer,
                closed: false,
            })),
        }
    }

    /// 从包装的输入流读取
    ///
    /// 已关闭时返回 EBADF。读取出错或读到 EOF 时触发终止回调，
    /// 原始结果照常返回给调用方。
    pub fn read_guarded(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(bad_file_descriptor());
        }

        let result = inner.stdin.read(buf);
        let finished = match &result {
            Ok(0) => !buf.is_empty(),
            Ok(_) => false,
            Err(e) => e.kind() != io::ErrorKind::Interrupted,
        };
        if finished {
            tracing::debug!("stdin 读取结束，触发终止回调");
            inner.fire();
        }
        result
    }

    /// 关闭输入流
    ///
    /// 已关闭时什么也不做；总是返回 Ok。
    pub fn close(&self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        inner.fire();
        Ok(())
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Read for GuardedStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_guarded(buf)
    }
}
