//! 日志目标解析
//!
//! 分离终端模式下，日志目标形如
//! `binary:///usr/local/bin/logger?_INTERNAL_LOGGING=/var/lib/taskio/1935db59`，
//! 查询串必须恰好包含一个参数，作为二进制日志驱动的唯一配置项。

use std::collections::HashMap;

use url::Url;

use crate::utils::error::TaskIoError;

/// 表示不记录日志的日志目标
pub const LOG_DISABLED: &str = "none";

/// 二进制日志驱动的启动配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLogTarget {
    /// 日志驱动可执行文件路径
    pub path: String,
    /// 日志驱动参数
    pub args: HashMap<String, String>,
}

/// 日志目标是否启用
pub fn is_log_enabled(log_uri: &str) -> bool {
    !log_uri.is_empty() && log_uri != LOG_DISABLED
}

/// 解析日志目标 URI
pub fn parse_log_uri(log_uri: &str) -> Result<Url, TaskIoError> {
    Url::parse(log_uri).map_err(|e| TaskIoError::InvalidLogUri(format!("{}: {}", log_uri, e)))
}

/// 解析分离终端模式下的二进制日志目标
pub fn parse_binary_log_target(log_uri: &str) -> Result<BinaryLogTarget, TaskIoError> {
    let url = parse_log_uri(log_uri)?;

    // 同名参数只取第一个值
    let mut args: Vec<(String, String)> = Vec::new();
    for (key, value) in url.query_pairs() {
        if !args.iter().any(|(k, _)| *k == key) {
            args.push((key.into_owned(), value.into_owned()));
        }
    }

    if args.len() != 1 {
        return Err(TaskIoError::logging_args(log_uri, args.len()));
    }

    Ok(BinaryLogTarget {
        path: normalize_log_path(url.path()),
        args: args.into_iter().collect(),
    })
}

/// 规范化日志驱动路径
///
/// Windows 上 URI 路径形如 `/C:/bin/logger`，需要去掉开头的分隔符。
pub fn normalize_log_path(path: &str) -> String {
    normalize_log_path_for(path, cfg!(windows))
}

/// 按指定的平台约定规范化日志驱动路径
pub fn normalize_log_path_for(path: &str, strip_leading_separator: bool) -> String {
    if strip_leading_separator {
        path.trim_start_matches('/').to_string()
    } else {
        path.to_string()
    }
}


/// Property-based tests for binary log target decoding
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// 单个查询参数解码为单项参数表
        #[test]
        fn prop_single_pair_roundtrip(
            key in "[A-Za-z_][A-Za-z0-9_]{0,15}",
            value in "[A-Za-z0-9/._-]{0,30}",
            path in "(/[a-z0-9]{1,8}){1,4}",
        ) {
            let uri = format!("binary://{}?{}={}", path, key, value);
            let target = parse_binary_log_target(&uri).unwrap();
            prop_assert_eq!(target.args.len(), 1);
            prop_assert_eq!(target.args.get(&key), Some(&value));
        }

        /// 两个不同的键总是解析失败
        #[test]
        fn prop_two_pairs_fail(
            a in "[a-m]{1,6}",
            b in "[n-z]{1,6}",
        ) {
            let uri = format!("binary:///bin/logger?{}=1&{}=2", a, b);
            prop_assert!(parse_binary_log_target(&uri).is_err());
        }
    }
}
