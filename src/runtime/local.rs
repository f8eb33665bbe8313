//! 本地运行时
//!
//! 在宿主机上以子进程运行任务，按 I/O 创建器接入标准流。
//! 终端任务使用 portable-pty 创建伪终端，非终端任务使用管道。

use async_trait::async_trait;
use parking_lot::Mutex;
use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::console::TermSize;
use crate::stdio::log_target::is_log_enabled;
use crate::stdio::streams::{InputStream, OutputStream};
use crate::utils::error::TaskIoError;

use super::creator::{ContainerIo, IoCreator};
use super::{Container, RuntimeClient, Task, TaskIo};

/// 本地运行时默认上报的版本
pub const LOCAL_RUNTIME_VERSION: &str = "1.7.0";

/// I/O 泵读取缓冲区大小
const PUMP_BUFFER_SIZE: usize = 4096;

/// 进程状态轮询间隔
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 进程退出后等待输出泵排空的时间
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 本地运行时客户端
#[derive(Debug, Clone)]
pub struct LocalRuntime {
    version: String,
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self {
            version: LOCAL_RUNTIME_VERSION.to_string(),
        }
    }

    /// 指定上报的版本
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Default for LocalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuntimeClient for LocalRuntime {
    async fn server_version(&self) -> Result<String, TaskIoError> {
        Ok(self.version.clone())
    }
}

/// 子进程的输入端，可在 I/O 泵之外被关闭
#[derive(Clone, Default)]
struct ChildInput(Arc<Mutex<Option<Box<dyn Write + Send>>>>);

impl ChildInput {
    fn new(writer: Box<dyn Write + Send>) -> Self {
        Self(Arc::new(Mutex::new(Some(writer))))
    }

    /// 关闭输入端；返回此前是否处于打开状态
    fn close(&self) -> bool {
        self.0.lock().take().is_some()
    }
}

impl Write for ChildInput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock().as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin 已关闭")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.lock().as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

/// 同时写入日志文件的输出
///
/// 日志写入失败只记录一次，不影响主输出。
struct TeeWriter {
    primary: Box<dyn Write + Send>,
    log: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.primary.write(buf)?;
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.write_all(&buf[..n]) {
                tracing::warn!("写入任务日志失败，停止记录: {}", e);
                self.log = None;
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()
    }
}

/// I/O 泵句柄
struct PumpHandle {
    stop_tx: mpsc::Sender<()>,
    done_rx: oneshot::Receiver<()>,
}

/// 启动 I/O 泵
///
/// 在独立线程中把 reader 的数据搬运到 writer，直到 EOF、出错或收到停止信号。
/// 使用独立线程而不是 tokio 的阻塞线程池：读取进程 stdin 的线程可能永远不会返回。
fn start_pump<F>(
    name: &str,
    task_id: &str,
    mut reader: Box<dyn Read + Send>,
    mut writer: Box<dyn Write + Send>,
    on_finish: F,
) -> Result<PumpHandle, TaskIoError>
where
    F: FnOnce() + Send + 'static,
{
    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
    let (done_tx, done_rx) = oneshot::channel();
    let label = format!("{}/{}", task_id, name);

    std::thread::Builder::new()
        .name(format!("taskio-{}", name))
        .spawn(move || {
            let mut buffer = vec![0u8; PUMP_BUFFER_SIZE];

            loop {
                if stop_rx.try_recv().is_ok() {
                    tracing::debug!("I/O 泵收到停止信号: {}", label);
                    break;
                }

                match reader.read(&mut buffer) {
                    Ok(0) => {
                        tracing::debug!("I/O 泵读到 EOF: {}", label);
                        break;
                    }
                    Ok(n) => {
                        tracing::trace!("I/O 泵搬运 {} bytes: {}", n, label);
                        if let Err(e) = writer.write_all(&buffer[..n]).and_then(|_| writer.flush()) {
                            tracing::debug!("I/O 泵写入失败: {}: {}", label, e);
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(10));
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::debug!("I/O 泵读取结束: {}: {}", label, e);
                        break;
                    }
                }
            }

            on_finish();
            let _ = done_tx.send(());
        })?;

    Ok(PumpHandle { stop_tx, done_rx })
}

/// 本地任务的实时 I/O
struct LocalIo {
    stop_txs: Vec<mpsc::Sender<()>>,
    stdin: ChildInput,
    cancelled: AtomicBool,
}

impl TaskIo for LocalIo {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("取消任务 I/O");
        for tx in &self.stop_txs {
            let _ = tx.try_send(());
        }
        self.stdin.close();
    }
}

/// 子进程
enum ChildProcess {
    Piped(std::process::Child),
    Pty(Box<dyn portable_pty::Child + Send + Sync>),
}

impl ChildProcess {
    fn pid(&self) -> Option<u32> {
        match self {
            ChildProcess::Piped(child) => Some(child.id()),
            ChildProcess::Pty(child) => child.process_id(),
        }
    }

    fn try_wait(&mut self) -> Result<Option<i32>, TaskIoError> {
        match self {
            ChildProcess::Piped(child) => Ok(child
                .try_wait()?
                .map(|status| status.code().unwrap_or(-1))),
            ChildProcess::Pty(child) => Ok(child
                .try_wait()?
                .map(|status| status.exit_code() as i32)),
        }
    }
}

/// 本地任务
pub struct LocalTask {
    id: String,
    pid: Option<u32>,
    child: Mutex<ChildProcess>,
    stdin: ChildInput,
    io: Option<Arc<LocalIo>>,
    outputs: tokio::sync::Mutex<Vec<oneshot::Receiver<()>>>,
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
}

impl LocalTask {
    /// 子进程 PID
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// 调整伪终端大小；非终端任务返回错误
    pub fn resize(&self, term_size: TermSize) -> Result<(), TaskIoError> {
        let master = self.master.lock();
        let master = master
            .as_ref()
            .ok_or_else(|| TaskIoError::UnsupportedIo("任务没有伪终端".to_string()))?;
        master
            .resize(PtySize {
                rows: term_size.rows,
                cols: term_size.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TaskIoError::ConsoleFailed(e.to_string()))
    }
}

#[async_trait]
impl Task for LocalTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn io(&self) -> Option<Arc<dyn TaskIo>> {
        self.io.clone().map(|io| io as Arc<dyn TaskIo>)
    }

    async fn close_stdin(&self) -> Result<(), TaskIoError> {
        if self.stdin.close() {
            tracing::debug!("关闭任务 stdin: {}", self.id);
        }
        Ok(())
    }

    async fn wait(&self) -> Result<i32, TaskIoError> {
        let code = loop {
            let status = self.child.lock().try_wait()?;
            if let Some(code) = status {
                break code;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        };

        // 进程已退出，等待输出泵把剩余数据写完
        let outputs: Vec<_> = self.outputs.lock().await.drain(..).collect();
        for done in outputs {
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, done).await.is_err() {
                tracing::warn!("等待任务输出排空超时: {}", self.id);
            }
        }

        tracing::info!("任务 {} 退出，退出码 {}", self.id, code);
        Ok(code)
    }
}

/// 本地容器
pub struct LocalContainer {
    id: String,
    program: String,
    args: Vec<String>,
    task: tokio::sync::Mutex<Option<Arc<LocalTask>>>,
}

impl LocalContainer {
    /// 创建本地容器
    pub fn new(id: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            id: id.into(),
            program: program.into(),
            args,
            task: tokio::sync::Mutex::new(None),
        }
    }

    fn spawn_error(&self, e: impl std::fmt::Display) -> TaskIoError {
        TaskIoError::task_creation_failed(&self.program, &e.to_string())
    }

    /// 打开日志文件；只支持 file 协议
    fn open_log(&self, log_uri: &str) -> Result<Option<File>, TaskIoError> {
        if !is_log_enabled(log_uri) {
            return Ok(None);
        }
        let url = Url::parse(log_uri)?;
        if url.scheme() != "file" {
            tracing::warn!("本地运行时只支持 file 日志 URI，忽略: {}", log_uri);
            return Ok(None);
        }
        open_log_file(&url).map(Some)
    }

    fn output_writer(
        stream: Option<OutputStream>,
        log: Option<File>,
    ) -> Result<Box<dyn Write + Send>, TaskIoError> {
        let primary = match stream {
            Some(stream) => stream.into_writer()?,
            None => Box::new(io::sink()),
        };
        Ok(Box::new(TeeWriter { primary, log }))
    }

    /// 把任务输入搬运到子进程；输入结束后关闭子进程的 stdin
    fn pump_stdin(
        &self,
        input: Option<InputStream>,
        stdin: &ChildInput,
    ) -> Result<Vec<PumpHandle>, TaskIoError> {
        let Some(input) = input else {
            return Ok(Vec::new());
        };
        let closer = stdin.clone();
        let pump = start_pump(
            "stdin",
            &self.id,
            input.into_reader(),
            Box::new(stdin.clone()),
            move || {
                closer.close();
            },
        )?;
        Ok(vec![pump])
    }

    fn spawn_piped(&self, io: ContainerIo) -> Result<LocalTask, TaskIoError> {
        let log = self.open_log(&io.log_uri)?;
        let capture_stdout = io.stdout.is_some() || log.is_some();
        let capture_stderr = io.stderr.is_some() || log.is_some();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(if io.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(if capture_stdout { Stdio::piped() } else { Stdio::null() })
            .stderr(if capture_stderr { Stdio::piped() } else { Stdio::null() });

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        tracing::info!("启动本地任务 {} (pid {}): {}", self.id, child.id(), self.program);

        let stdin = match child.stdin.take() {
            Some(pipe) => ChildInput::new(Box::new(pipe)),
            None => ChildInput::default(),
        };

        let pumps = self.pump_stdin(io.stdin, &stdin)?;
        let mut outputs = Vec::new();

        if let Some(pipe) = child.stdout.take() {
            let log = log.as_ref().map(File::try_clone).transpose()?;
            let pump = start_pump(
                "stdout",
                &self.id,
                Box::new(pipe),
                Self::output_writer(io.stdout, log)?,
                || {},
            )?;
            outputs.push(pump);
        }

        if let Some(pipe) = child.stderr.take() {
            let pump = start_pump(
                "stderr",
                &self.id,
                Box::new(pipe),
                Self::output_writer(io.stderr, log)?,
                || {},
            )?;
            outputs.push(pump);
        }

        Ok(self.assemble(ChildProcess::Piped(child), stdin, pumps, outputs, None))
    }

    fn spawn_pty(&self, io: ContainerIo) -> Result<LocalTask, TaskIoError> {
        let log = self.open_log(&io.log_uri)?;

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: TermSize::default().rows,
                cols: TermSize::default().cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TaskIoError::ConsoleFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&self.program);
        cmd.args(&self.args);
        cmd.env("TERM", "xterm-256color");

        let child = pair.slave.spawn_command(cmd).map_err(|e| self.spawn_error(e))?;
        // 只保留主端，子进程退出后主端才能读到 EOF
        drop(pair.slave);
        tracing::info!(
            "启动本地终端任务 {} (pid {:?}): {}",
            self.id,
            child.process_id(),
            self.program
        );

        let console_err = |e: anyhow::Error| TaskIoError::ConsoleFailed(e.to_string());
        let stdin = ChildInput::new(pair.master.take_writer().map_err(console_err)?);
        let reader = pair.master.try_clone_reader().map_err(console_err)?;

        let pumps = self.pump_stdin(io.stdin, &stdin)?;

        // 终端下 stdout 与 stderr 合并
        let output = start_pump(
            "tty",
            &self.id,
            reader,
            Self::output_writer(io.stdout, log)?,
            || {},
        )?;

        Ok(self.assemble(
            ChildProcess::Pty(child),
            stdin,
            pumps,
            vec![output],
            Some(pair.master),
        ))
    }

    fn spawn_logged(&self, url: &Url) -> Result<LocalTask, TaskIoError> {
        if url.scheme() != "file" {
            return Err(TaskIoError::UnsupportedIo(format!(
                "本地运行时只支持 file 日志 URI: {}",
                url
            )));
        }
        let log = open_log_file(url)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));

        let child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        tracing::info!("启动后台任务 {} (pid {})，日志写入 {}", self.id, child.id(), url);

        Ok(LocalTask {
            id: self.id.clone(),
            pid: Some(child.id()),
            child: Mutex::new(ChildProcess::Piped(child)),
            stdin: ChildInput::default(),
            io: None,
            outputs: tokio::sync::Mutex::new(Vec::new()),
            master: Mutex::new(None),
        })
    }

    fn assemble(
        &self,
        child: ChildProcess,
        stdin: ChildInput,
        pumps: Vec<PumpHandle>,
        outputs: Vec<PumpHandle>,
        master: Option<Box<dyn MasterPty + Send>>,
    ) -> LocalTask {
        let mut stop_txs = Vec::new();
        let mut done = Vec::new();
        for pump in pumps {
            stop_txs.push(pump.stop_tx);
        }
        for pump in outputs {
            stop_txs.push(pump.stop_tx);
            done.push(pump.done_rx);
        }

        LocalTask {
            id: self.id.clone(),
            pid: child.pid(),
            child: Mutex::new(child),
            stdin: stdin.clone(),
            io: Some(Arc::new(LocalIo {
                stop_txs,
                stdin,
                cancelled: AtomicBool::new(false),
            })),
            outputs: tokio::sync::Mutex::new(done),
            master: Mutex::new(master),
        }
    }
}

fn open_log_file(url: &Url) -> Result<File, TaskIoError> {
    let path = url
        .to_file_path()
        .map_err(|_| TaskIoError::InvalidLogUri(format!("不是本地文件路径: {}", url)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[async_trait]
impl Container for LocalContainer {
    async fn new_task(&self, creator: IoCreator) -> Result<Arc<dyn Task>, TaskIoError> {
        let mut slot = self.task.lock().await;
        if slot.is_some() {
            return Err(TaskIoError::task_creation_failed(&self.program, "任务已存在"));
        }

        tracing::debug!("容器 {} 使用 {} I/O 创建任务", self.id, creator.kind());
        let task = match creator {
            IoCreator::Container(io) if io.terminal => self.spawn_pty(io)?,
            IoCreator::Container(io) => self.spawn_piped(io)?,
            IoCreator::LogUri(url) => self.spawn_logged(&url)?,
            IoCreator::BinaryLog { path, .. } => {
                return Err(TaskIoError::UnsupportedIo(format!(
                    "本地运行时不支持二进制日志驱动: {}",
                    path
                )))
            }
        };

        let task = Arc::new(task);
        *slot = Some(task.clone());
        Ok(task)
    }

    async fn task(&self) -> Result<Arc<dyn Task>, TaskIoError> {
        self.task
            .lock()
            .await
            .clone()
            .map(|task| task as Arc<dyn Task>)
            .ok_or_else(|| TaskIoError::TaskNotFound(self.id.clone()))
    }
}
