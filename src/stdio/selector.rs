//! I/O 模式选择器
//!
//! 把模式参数转换为一个 I/O 创建器，并负责创建任务。
//!
//! ## 功能
//! - 按 `classify` 的结果组装 I/O 创建器
//! - 交互模式下用 GuardedStdin 包装输入，并绑定分离/关闭回调
//! - 任务创建成功后把任务句柄填入分离回调的任务槽

use std::sync::mpsc::SyncSender;
use std::sync::Arc;

use crate::console::{stdio::stdin_is_terminal, Console, DetachableStdin};
use crate::runtime::{Container, ContainerIo, IoCreator, RuntimeClient, Task};
use crate::utils::error::TaskIoError;

use super::closer::{detach_closer, stdin_closer, TaskSlot};
use super::guarded::GuardedStdin;
use super::log_target::{parse_binary_log_target, parse_log_uri};
use super::mode::{classify, IoMode, ModeParams};
use super::streams::{parse_attach_streams, InputStream, OutputStream};
use super::version::check_server_version;

/// 检查进程 stdin 是否为终端设备
pub type TerminalProbe = fn() -> bool;

/// I/O 模式选择器
///
/// 每次创建任务都使用新的任务槽，分离回调只会作用于它所属的任务。
pub struct IoSelector {
    client: Arc<dyn RuntimeClient>,
    container: Arc<dyn Container>,
    console: Option<Arc<dyn Console>>,
    detach_tx: Option<SyncSender<()>>,
    stdin_is_terminal: TerminalProbe,
}

impl IoSelector {
    /// 创建新的选择器
    pub fn new(client: Arc<dyn RuntimeClient>, container: Arc<dyn Container>) -> Self {
        Self {
            client,
            container,
            console: None,
            detach_tx: None,
            stdin_is_terminal,
        }
    }

    /// 设置控制台
    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// 设置分离信号通道
    ///
    /// 发送是阻塞的交接，调用方必须在任务创建返回前准备好接收方。
    pub fn with_detach_channel(mut self, detach_tx: SyncSender<()>) -> Self {
        self.detach_tx = Some(detach_tx);
        self
    }

    /// 替换终端设备检测
    pub fn with_terminal_probe(mut self, probe: TerminalProbe) -> Self {
        self.stdin_is_terminal = probe;
        self
    }

    /// 根据模式参数组装 I/O 创建器
    ///
    /// 交互终端模式下的分离回调绑定到 `slot`，由调用方在任务创建后填充。
    pub async fn select_io(
        &self,
        params: &ModeParams,
        slot: &TaskSlot,
    ) -> Result<IoCreator, TaskIoError> {
        let mode = classify(params);
        tracing::debug!("任务 I/O 模式: {:?}", mode);

        match mode {
            IoMode::Redirect => self.redirect_io(params, slot),
            IoMode::DetachedTerminal => {
                let target = parse_binary_log_target(&params.log_uri)?;
                Ok(IoCreator::BinaryLog {
                    path: target.path,
                    args: target.args,
                })
            }
            IoMode::LiveTerminal => self.live_terminal_io(params, slot),
            IoMode::LogOnlyDetached => Ok(IoCreator::LogUri(parse_log_uri(&params.log_uri)?)),
            IoMode::Default => self.default_io(params).await,
        }
    }

    /// 组装 I/O 并创建任务
    pub async fn new_task(&self, params: &ModeParams) -> Result<Arc<dyn Task>, TaskIoError> {
        let slot = TaskSlot::new();
        let creator = self.select_io(params, &slot).await?;
        let task = self.container.new_task(creator).await?;

        slot.fill(task.clone());
        tracing::debug!("任务已创建: {}", task.id());
        Ok(task)
    }

    fn redirect_io(&self, params: &ModeParams, slot: &TaskSlot) -> Result<IoCreator, TaskIoError> {
        tracing::debug!("按 attach 列表接入输出，不使用日志 URI 回显");

        if params.terminal {
            // 终端下控制台负责回显，日志仍由日志 URI 持久化
            let console = self.require_console()?;
            let stdin = self.console_input(&console, params, slot)?;
            return Ok(IoCreator::Container(ContainerIo {
                namespace: params.namespace.clone(),
                log_uri: params.log_uri.clone(),
                terminal: true,
                stdin,
                stdout: Some(OutputStream::Console(console.clone())),
                stderr: Some(OutputStream::Console(console)),
            }));
        }

        let streams = parse_attach_streams(&params.attach_streams);
        Ok(IoCreator::Container(ContainerIo {
            namespace: params.namespace.clone(),
            log_uri: params.log_uri.clone(),
            terminal: false,
            stdin: streams.stdin,
            stdout: streams.stdout,
            stderr: streams.stderr,
        }))
    }

    fn live_terminal_io(&self, params: &ModeParams, slot: &TaskSlot) -> Result<IoCreator, TaskIoError> {
        let console = self.require_console()?;
        let stdin = self.console_input(&console, params, slot)?;

        Ok(IoCreator::Container(ContainerIo {
            namespace: params.namespace.clone(),
            log_uri: params.log_uri.clone(),
            terminal: true,
            stdin,
            stdout: Some(OutputStream::Console(console.clone())),
            stderr: Some(OutputStream::Console(console)),
        }))
    }

    async fn default_io(&self, params: &ModeParams) -> Result<IoCreator, TaskIoError> {
        let stdin = if params.interactive {
            check_server_version(self.client.as_ref()).await;

            let guarded = GuardedStdin::new(
                Box::new(std::io::stdin()),
                Some(stdin_closer(self.container.clone())),
            );
            Some(InputStream::Guarded(guarded))
        } else {
            None
        };

        Ok(IoCreator::Container(ContainerIo {
            namespace: params.namespace.clone(),
            log_uri: params.log_uri.clone(),
            terminal: false,
            stdin,
            stdout: Some(OutputStream::Stdout),
            stderr: Some(OutputStream::Stderr),
        }))
    }

    fn require_console(&self) -> Result<Arc<dyn Console>, TaskIoError> {
        self.console
            .clone()
            .ok_or_else(|| TaskIoError::ConsoleMissing("终端模式需要控制台".to_string()))
    }

    /// 交互模式下把控制台输入包装为可分离、受保护的 stdin
    fn console_input(
        &self,
        console: &Arc<dyn Console>,
        params: &ModeParams,
        slot: &TaskSlot,
    ) -> Result<Option<InputStream>, TaskIoError> {
        if !params.interactive {
            return Ok(None);
        }

        // TODO: Windows 上同样检查 stdin 是否为终端
        if !cfg!(windows) && !(self.stdin_is_terminal)() {
            return Err(TaskIoError::NotATerminal("stdin".to_string()));
        }

        let reader = console.try_clone_reader()?;
        let detachable = DetachableStdin::new(reader, &params.detach_keys)?;
        let guarded = GuardedStdin::new(
            Box::new(detachable),
            Some(detach_closer(self.detach_tx.clone(), slot.clone())),
        );
        Ok(Some(InputStream::Guarded(guarded)))
    }
}
