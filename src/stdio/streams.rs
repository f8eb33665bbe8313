//! 标准流集合
//!
//! 描述交给任务的 stdin/stdout/stderr 端点，以及 `--attach` 列表的解析。

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::console::Console;

use super::guarded::GuardedStdin;

/// 任务的输入端点
pub enum InputStream {
    /// 进程自身的 stdin
    Process,
    /// 受保护的 stdin
    Guarded(GuardedStdin),
    /// 丢弃流
    Discard(File),
}

impl InputStream {
    /// 转换为可读取的流
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        match self {
            InputStream::Process => Box::new(io::stdin()),
            InputStream::Guarded(stdin) => Box::new(stdin),
            InputStream::Discard(file) => Box::new(file),
        }
    }

    /// 获取受保护的 stdin（如果是）
    pub fn as_guarded(&self) -> Option<&GuardedStdin> {
        match self {
            InputStream::Guarded(stdin) => Some(stdin),
            _ => None,
        }
    }

    pub fn is_discard(&self) -> bool {
        matches!(self, InputStream::Discard(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InputStream::Process => "process",
            InputStream::Guarded(_) => "guarded",
            InputStream::Discard(_) => "discard",
        }
    }
}

impl std::fmt::Debug for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InputStream::{}", self.kind())
    }
}

/// 任务的输出端点
pub enum OutputStream {
    /// 进程自身的 stdout
    Stdout,
    /// 进程自身的 stderr
    Stderr,
    /// 控制台
    Console(Arc<dyn Console>),
    /// 普通文件
    File(File),
    /// 丢弃流
    Discard(File),
}

impl OutputStream {
    /// 转换为可写入的流
    pub fn into_writer(self) -> io::Result<Box<dyn Write + Send>> {
        match self {
            OutputStream::Stdout => Ok(Box::new(io::stdout())),
            OutputStream::Stderr => Ok(Box::new(io::stderr())),
            OutputStream::Console(console) => console
                .take_writer()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string())),
            OutputStream::File(file) | OutputStream::Discard(file) => Ok(Box::new(file)),
        }
    }

    pub fn is_discard(&self) -> bool {
        matches!(self, OutputStream::Discard(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
            OutputStream::Console(_) => "console",
            OutputStream::File(_) => "file",
            OutputStream::Discard(_) => "discard",
        }
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OutputStream::{}", self.kind())
    }
}

/// 三个标准流
///
/// 某个角色为 None 表示丢弃流打开失败，该角色不接入任何流。
#[derive(Debug)]
pub struct StreamSet {
    pub stdin: Option<InputStream>,
    pub stdout: Option<OutputStream>,
    pub stderr: Option<OutputStream>,
}

/// 打开丢弃流用于读取
fn null_reader() -> Option<File> {
    File::open(null_device())
        .map_err(|e| tracing::debug!("打开丢弃流失败: {}", e))
        .ok()
}

/// 打开丢弃流用于写入
fn null_writer() -> Option<File> {
    OpenOptions::new()
        .write(true)
        .open(null_device())
        .map_err(|e| tracing::debug!("打开丢弃流失败: {}", e))
        .ok()
}

fn null_device() -> &'static str {
    #[cfg(windows)]
    {
        "NUL"
    }

    #[cfg(not(windows))]
    {
        "/dev/null"
    }
}

/// 已接入的标准流角色
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachedRoles {
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
}

impl AttachedRoles {
    /// 按名称判断接入的角色，不区分大小写，忽略未知名称和重复项
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut roles = Self::default();
        for name in names {
            match name.as_ref().to_ascii_uppercase().as_str() {
                "STDIN" => roles.stdin = true,
                "STDOUT" => roles.stdout = true,
                "STDERR" => roles.stderr = true,
                other => tracing::debug!("忽略未知的 attach 流: {}", other),
            }
        }
        roles
    }
}

/// 解析 `--attach` 列表为标准流集合
///
/// 未列出的角色接到丢弃流；丢弃流打开失败时该角色为 None，不影响任务启动。
pub fn parse_attach_streams<S: AsRef<str>>(names: &[S]) -> StreamSet {
    let roles = AttachedRoles::from_names(names);

    StreamSet {
        stdin: if roles.stdin {
            Some(InputStream::Process)
        } else {
            null_reader().map(InputStream::Discard)
        },
        stdout: if roles.stdout {
            Some(OutputStream::Stdout)
        } else {
            null_writer().map(OutputStream::Discard)
        },
        stderr: if roles.stderr {
            Some(OutputStream::Stderr)
        } else {
            null_writer().map(OutputStream::Discard)
        },
    }
}


/// Property-based tests for attach stream parsing
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn name_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("stdin".to_string()),
            Just("stdout".to_string()),
            Just("stderr".to_string()),
            "[a-z]{1,8}",
        ]
    }

    fn random_case(s: &str, mask: &[bool]) -> String {
        s.chars()
            .zip(mask.iter().cycle())
            .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// 解析结果与顺序和大小写无关
        #[test]
        fn prop_roles_invariant_under_order_and_case(
            names in prop::collection::vec(name_strategy(), 0..6),
            mask in prop::collection::vec(any::<bool>(), 1..8),
            seed in any::<u64>(),
        ) {
            let expected = AttachedRoles::from_names(&names);

            let mut shuffled: Vec<String> = names.iter().map(|n| random_case(n, &mask)).collect();
            let len = shuffled.len();
            if len > 1 {
                shuffled.rotate_left((seed as usize) % len);
            }
            prop_assert_eq!(AttachedRoles::from_names(&shuffled), expected);
        }

        /// 角色接入当且仅当名称出现在列表中
        #[test]
        fn prop_roles_match_membership(names in prop::collection::vec(name_strategy(), 0..6)) {
            let roles = AttachedRoles::from_names(&names);
            prop_assert_eq!(roles.stdin, names.iter().any(|n| n == "stdin"));
            prop_assert_eq!(roles.stdout, names.iter().any(|n| n == "stdout"));
            prop_assert_eq!(roles.stderr, names.iter().any(|n| n == "stderr"));
        }
    }
}
