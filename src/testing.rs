//! 测试用的运行时替身

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::console::{Console, TermSize};
use crate::runtime::{Container, IoCreator, RuntimeClient, Task, TaskIo};
use crate::utils::error::TaskIoError;

/// 记录取消次数的 I/O 句柄
#[derive(Default)]
pub struct CountingIo {
    cancelled: AtomicUsize,
}

impl CountingIo {
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl TaskIo for CountingIo {
    fn cancel(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

/// 假任务
pub struct FakeTask {
    pub io: Option<Arc<CountingIo>>,
    stdin_closed: AtomicUsize,
}

impl FakeTask {
    pub fn new(io: Option<Arc<CountingIo>>) -> Arc<Self> {
        Arc::new(Self {
            io,
            stdin_closed: AtomicUsize::new(0),
        })
    }

    pub fn stdin_closed(&self) -> usize {
        self.stdin_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Task for FakeTask {
    fn id(&self) -> &str {
        "fake-task"
    }

    fn io(&self) -> Option<Arc<dyn TaskIo>> {
        self.io.clone().map(|io| io as Arc<dyn TaskIo>)
    }

    async fn close_stdin(&self) -> Result<(), TaskIoError> {
        self.stdin_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&self) -> Result<i32, TaskIoError> {
        Ok(0)
    }
}

/// 假容器，记录收到的 I/O 创建器
///
/// 排队的任务按创建顺序依次交出，队列为空后一直交出最后一个。
pub struct FakeContainer {
    pub task: Mutex<Arc<FakeTask>>,
    pub creator: Mutex<Option<IoCreator>>,
    queue: Mutex<VecDeque<Arc<FakeTask>>>,
    fail: bool,
}

impl FakeContainer {
    pub fn new(task: Arc<FakeTask>) -> Arc<Self> {
        Self::with_tasks(vec![task])
    }

    pub fn with_tasks(tasks: Vec<Arc<FakeTask>>) -> Arc<Self> {
        let queue: VecDeque<_> = tasks.into_iter().collect();
        Arc::new(Self {
            task: Mutex::new(queue.front().cloned().unwrap_or_else(|| FakeTask::new(None))),
            creator: Mutex::new(None),
            queue: Mutex::new(queue),
            fail: false,
        })
    }

    pub fn failing(task: Arc<FakeTask>) -> Arc<Self> {
        Arc::new(Self {
            task: Mutex::new(task),
            creator: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
            fail: true,
        })
    }
}

#[async_trait]
impl Container for FakeContainer {
    async fn new_task(&self, creator: IoCreator) -> Result<Arc<dyn Task>, TaskIoError> {
        if self.fail {
            return Err(TaskIoError::task_creation_failed("fake", "refused"));
        }
        *self.creator.lock() = Some(creator);
        if let Some(next) = self.queue.lock().pop_front() {
            *self.task.lock() = next;
        }
        Ok(self.task.lock().clone())
    }

    async fn task(&self) -> Result<Arc<dyn Task>, TaskIoError> {
        Ok(self.task.lock().clone())
    }
}

/// 返回固定版本号的客户端
pub struct FixedVersionClient {
    pub version: Result<String, String>,
    queries: AtomicUsize,
}

impl FixedVersionClient {
    pub fn new(version: &str) -> Arc<Self> {
        Arc::new(Self {
            version: Ok(version.to_string()),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            version: Err(reason.to_string()),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuntimeClient for FixedVersionClient {
    async fn server_version(&self) -> Result<String, TaskIoError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.version
            .clone()
            .map_err(TaskIoError::VersionQueryFailed)
    }
}

/// 内存控制台：读取预置的输入，写入的内容被收集起来
pub struct MemoryConsole {
    input: Vec<u8>,
    pub output: Arc<Mutex<Vec<u8>>>,
}

impl MemoryConsole {
    pub fn new(input: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            input: input.to_vec(),
            output: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Console for MemoryConsole {
    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>, TaskIoError> {
        Ok(Box::new(Cursor::new(self.input.clone())))
    }

    fn take_writer(&self) -> Result<Box<dyn Write + Send>, TaskIoError> {
        Ok(Box::new(SharedWriter(self.output.clone())))
    }

    fn resize(&self, _size: TermSize) -> Result<(), TaskIoError> {
        Ok(())
    }
}
