//! I/O 创建器
//!
//! 选择器的产物，由 `Container::new_task` 消费一次。

use std::collections::HashMap;
use url::Url;

use crate::stdio::streams::{InputStream, OutputStream};

/// 常规容器 I/O
///
/// `terminal` 为真时 stdout 与 stderr 是同一个控制台，运行时只需接入其中一个。
#[derive(Debug)]
pub struct ContainerIo {
    pub namespace: String,
    /// 日志目标，空或 `none` 表示不持久化
    pub log_uri: String,
    /// 是否以终端方式运行
    pub terminal: bool,
    pub stdin: Option<InputStream>,
    pub stdout: Option<OutputStream>,
    pub stderr: Option<OutputStream>,
}

/// I/O 创建器
#[derive(Debug)]
pub enum IoCreator {
    /// 把流直接接到任务上
    Container(ContainerIo),
    /// 终端输出全部交给二进制日志驱动
    BinaryLog {
        path: String,
        args: HashMap<String, String>,
    },
    /// 输出写入日志 URI
    LogUri(Url),
}

impl IoCreator {
    /// 创建器类型名称
    pub fn kind(&self) -> &'static str {
        match self {
            IoCreator::Container(_) => "container",
            IoCreator::BinaryLog { .. } => "binary_log",
            IoCreator::LogUri(_) => "log_uri",
        }
    }

    /// 是否接入了实时流
    pub fn has_live_streams(&self) -> bool {
        match self {
            IoCreator::Container(io) => {
                io.stdin.is_some() || io.stdout.is_some() || io.stderr.is_some()
            }
            _ => false,
        }
    }

    /// 获取常规容器 I/O（如果是）
    pub fn as_container_io(&self) -> Option<&ContainerIo> {
        match self {
            IoCreator::Container(io) => Some(io),
            _ => None,
        }
    }
}
