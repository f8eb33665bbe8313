//! 任务标准 I/O 模块
//!
//! 负责选择任务的 I/O 组装方式，以及保护任务 stdin 的生命周期。

pub mod closer;
pub mod guarded;
pub mod log_target;
pub mod mode;
pub mod selector;
pub mod streams;
pub mod version;

pub use closer::{detach_closer, stdin_closer, TaskSlot};
pub use guarded::{Closer, GuardedStdin};
pub use log_target::{parse_binary_log_target, parse_log_uri, BinaryLogTarget};
pub use mode::{classify, IoMode, ModeParams};
pub use selector::IoSelector;
pub use streams::{parse_attach_streams, InputStream, OutputStream, StreamSet};
pub use version::{check_server_version, VersionAdvisory};
