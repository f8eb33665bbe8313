//! I/O 模式分类
//!
//! 根据交互、终端、分离、attach 列表和日志目标，确定唯一的 I/O 组装方式。
//! 分类是纯函数，不触及任何 I/O。

use serde::{Deserialize, Serialize};

use super::log_target::is_log_enabled;

/// 任务 I/O 参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeParams {
    /// 保持 stdin 打开（`-i`）
    pub interactive: bool,
    /// 分配终端（`-t`）
    pub terminal: bool,
    /// 后台运行（`-d`）
    pub detach: bool,
    /// 要接入的标准流（`-a`）
    pub attach_streams: Vec<String>,
    /// 日志目标 URI，空或 `none` 表示不记录
    pub log_uri: String,
    /// 分离键，空表示默认值
    pub detach_keys: String,
    /// 命名空间
    pub namespace: String,
}

/// I/O 组装方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoMode {
    /// 显式 attach 列表：把指定的流重定向给任务
    Redirect,
    /// 终端 + 后台：全部经由二进制日志驱动持久化
    DetachedTerminal,
    /// 终端 + 前台：接入控制台
    LiveTerminal,
    /// 非终端 + 后台 + 有日志目标：只写日志
    LogOnlyDetached,
    /// 其余情况：普通重定向
    Default,
}

impl IoMode {
    /// 该模式是否接入实时流
    pub fn attaches_live_streams(&self) -> bool {
        !matches!(self, IoMode::DetachedTerminal | IoMode::LogOnlyDetached)
    }
}

/// 确定 I/O 组装方式
///
/// 按顺序匹配，第一个命中的分支生效；后面的条件默认前面的都不成立。
pub fn classify(params: &ModeParams) -> IoMode {
    if !params.attach_streams.is_empty() {
        IoMode::Redirect
    } else if params.terminal && params.detach {
        IoMode::DetachedTerminal
    } else if params.terminal {
        IoMode::LiveTerminal
    } else if params.detach && is_log_enabled(&params.log_uri) {
        IoMode::LogOnlyDetached
    } else {
        IoMode::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(terminal: bool, detach: bool, attach: &[&str], log_uri: &str) -> ModeParams {
        ModeParams {
            terminal,
            detach,
            attach_streams: attach.iter().map(|s| s.to_string()).collect(),
            log_uri: log_uri.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_attach_list_wins() {
        assert_eq!(classify(&params(true, true, &["stdout"], "")), IoMode::Redirect);
        assert_eq!(classify(&params(false, false, &["stdin"], "none")), IoMode::Redirect);
    }

    #[test]
    fn test_terminal_modes() {
        assert_eq!(classify(&params(true, true, &[], "")), IoMode::DetachedTerminal);
        assert_eq!(classify(&params(true, false, &[], "")), IoMode::LiveTerminal);
    }

    #[test]
    fn test_log_only_detached() {
        assert_eq!(
            classify(&params(false, true, &[], "file:///var/log/t.log")),
            IoMode::LogOnlyDetached
        );
        assert_eq!(classify(&params(false, true, &[], "none")), IoMode::Default);
        assert_eq!(classify(&params(false, true, &[], "")), IoMode::Default);
    }

    #[test]
    fn test_default_mode() {
        assert_eq!(classify(&params(false, false, &[], "")), IoMode::Default);
        assert_eq!(
            classify(&params(false, false, &[], "file:///var/log/t.log")),
            IoMode::Default
        );
    }

    #[test]
    fn test_attaches_live_streams() {
        assert!(IoMode::Redirect.attaches_live_streams());
        assert!(IoMode::LiveTerminal.attaches_live_streams());
        assert!(!IoMode::DetachedTerminal.attaches_live_streams());
        assert!(!IoMode::LogOnlyDetached.attaches_live_streams());
    }

    #[test]
    fn test_params_deserialize_defaults() {
        let params: ModeParams = serde_json::from_str(r#"{"interactive": true}"#).unwrap();
        assert!(params.interactive);
        assert!(!params.terminal);
        assert!(params.attach_streams.is_empty());
        assert_eq!(params.log_uri, "");
    }
}
