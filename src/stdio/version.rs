//! 运行时版本提示
//!
//! 非终端的交互输入需要较新的运行时。版本过旧或查询失败都只告警，不影响任务创建。

use semver::Version;

use crate::runtime::RuntimeClient;
use crate::utils::error::TaskIoError;

/// 支持非终端交互输入的最低运行时版本
pub const NON_TTY_STDIN_MIN_VERSION: &str = "1.6.0-0";

/// 版本检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionAdvisory {
    /// 版本满足要求
    Supported(Version),
    /// 版本过旧
    TooOld(Version),
    /// 无法确定版本
    Unknown(String),
}

/// 解析运行时上报的版本号，允许 `v` 前缀
pub fn parse_server_version(raw: &str) -> Result<Version, TaskIoError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed)
        .map_err(|e| TaskIoError::VersionQueryFailed(format!("无法解析版本 {:?}: {}", raw, e)))
}

/// 判断版本是否满足非终端交互输入的要求
pub fn evaluate_version(raw: &str) -> VersionAdvisory {
    let min = match Version::parse(NON_TTY_STDIN_MIN_VERSION) {
        Ok(v) => v,
        Err(e) => return VersionAdvisory::Unknown(e.to_string()),
    };

    match parse_server_version(raw) {
        Ok(v) if v < min => VersionAdvisory::TooOld(v),
        Ok(v) => VersionAdvisory::Supported(v),
        Err(e) => VersionAdvisory::Unknown(e.to_string()),
    }
}

/// 查询运行时版本并在版本过旧时告警
pub async fn check_server_version(client: &dyn RuntimeClient) -> VersionAdvisory {
    let advisory = match client.server_version().await {
        Ok(raw) => evaluate_version(&raw),
        Err(e) => VersionAdvisory::Unknown(e.to_string()),
    };

    match &advisory {
        VersionAdvisory::TooOld(v) => tracing::warn!(
            "非终端的交互输入（-i 不带 -t）需要运行时 1.6 或更高版本，当前为 {}",
            v
        ),
        VersionAdvisory::Unknown(reason) => tracing::warn!("{}", reason),
        VersionAdvisory::Supported(v) => tracing::debug!("运行时版本: {}", v),
    }

    advisory
}
