//! taskio-run 命令行入口
//!
//! 用法：`taskio-run <params.json|-> -- <program> [args...]`
//!
//! 从 JSON 文件（`-` 表示 stdin）读取 I/O 参数，在本地运行时中启动任务，
//! 以任务的退出码退出；分离时立即返回。

use anyhow::{bail, Context};
use std::io::Read;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskio::console::{Console, StdioConsole};
use taskio::runtime::{LocalContainer, LocalRuntime, Task};
use taskio::{IoSelector, ModeParams};

const USAGE: &str = "用法: taskio-run <params.json|-> -- <program> [args...]";

struct CliArgs {
    params: String,
    program: String,
    args: Vec<String>,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let Some(params) = argv.next() else {
        bail!("缺少参数文件\n{}", USAGE);
    };
    if argv.next().as_deref() != Some("--") {
        bail!("参数文件后需要 `--`\n{}", USAGE);
    }
    let Some(program) = argv.next() else {
        bail!("缺少要运行的程序\n{}", USAGE);
    };

    Ok(CliArgs {
        params,
        program,
        args: argv.collect(),
    })
}

fn load_params(source: &str) -> anyhow::Result<ModeParams> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("从 stdin 读取参数失败")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("读取参数文件失败: {}", source))?
    };

    serde_json::from_str(&content).context("解析 I/O 参数失败")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志输出到 stderr，避免与任务的 stdout 混在一起
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = parse_args(std::env::args().skip(1))?;
    let params = load_params(&cli.params)?;
    tracing::debug!("I/O 参数: {:?}", params);

    let client = Arc::new(LocalRuntime::new());
    let container = Arc::new(LocalContainer::new("taskio-run", cli.program, cli.args));

    // 分离信号：同步通道在 I/O 泵线程上发送，转交给异步侧
    let (detach_tx, detach_rx) = std::sync::mpsc::sync_channel::<()>(0);
    let (detached_tx, detached_rx) = oneshot::channel::<()>();
    std::thread::spawn(move || {
        if detach_rx.recv().is_ok() {
            let _ = detached_tx.send(());
        }
    });

    let mut selector = IoSelector::new(client, container).with_detach_channel(detach_tx);
    if params.terminal {
        match StdioConsole::current() {
            Ok(console) => {
                selector = selector.with_console(Arc::new(console) as Arc<dyn Console>);
            }
            Err(e) => tracing::debug!("当前进程没有可用的控制台: {}", e),
        }
    }

    let task = selector.new_task(&params).await?;
    tracing::info!("任务 {} 已启动", task.id());

    if params.detach {
        return Ok(());
    }

    tokio::select! {
        code = task.wait() => {
            let code = code?;
            std::process::exit(code);
        }
        Ok(()) = detached_rx => {
            tracing::info!("已从任务 {} 分离", task.id());
        }
    }

    Ok(())
}
