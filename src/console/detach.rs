//! 分离键处理
//!
//! 解析形如 `ctrl-p,ctrl-q` 的分离键配置，并在输入流中识别该序列。
//! 识别到分离序列后输入流表现为 EOF，由外层的 GuardedStdin 负责触发分离回调。

use std::io::{self, Read};

use crate::utils::error::TaskIoError;

/// 默认分离键
pub const DEFAULT_DETACH_KEYS: &str = "ctrl-p,ctrl-q";

/// 解析分离键配置为字节序列
///
/// 每个逗号分隔的片段是单个字符，或 `ctrl-` 加上 `a-z @ [ \ ] ^ _` 之一。
/// 空字符串使用默认分离键。
pub fn parse_detach_keys(keys: &str) -> Result<Vec<u8>, TaskIoError> {
    let keys = if keys.is_empty() {
        DEFAULT_DETACH_KEYS
    } else {
        keys
    };

    let mut codes = Vec::new();
    for key in keys.split(',') {
        let lower = key.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("ctrl-") {
            let code = match rest.as_bytes() {
                [c @ b'a'..=b'z'] => c - b'a' + 1,
                [b'@'] => 0,
                [c @ (b'[' | b'\\' | b']' | b'^' | b'_')] => c - b'[' + 27,
                _ => {
                    return Err(TaskIoError::InvalidDetachKeys(format!(
                        "未知的控制键: {}",
                        key
                    )))
                }
            };
            codes.push(code);
        } else if key.len() == 1 {
            codes.push(key.as_bytes()[0]);
        } else {
            return Err(TaskIoError::InvalidDetachKeys(format!(
                "未知的按键: {:?}",
                key
            )));
        }
    }

    Ok(codes)
}

/// 可分离的输入流
///
/// 转发底层读取的字节；与分离序列部分匹配的字节会被暂存，
/// 匹配失败时原样补发。完整匹配后先交付序列之前的字节，之后始终返回 EOF。
pub struct DetachableStdin<R> {
    inner: R,
    keys: Vec<u8>,
    /// 已匹配的分离键数量
    matched: usize,
    /// 尚未交付给调用方的字节
    pending: Vec<u8>,
    detached: bool,
}

impl<R: Read> DetachableStdin<R> {
    /// 使用分离键配置包装输入流
    pub fn new(inner: R, keys: &str) -> Result<Self, TaskIoError> {
        let keys = parse_detach_keys(keys)?;
        Ok(Self::with_key_bytes(inner, keys))
    }

    /// 使用已解析的分离键字节包装输入流
    pub fn with_key_bytes(inner: R, keys: Vec<u8>) -> Self {
        Self {
            inner,
            keys,
            matched: 0,
            pending: Vec::new(),
            detached: false,
        }
    }

    /// 是否已经读到分离序列
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    fn drain_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }

    fn scan(&mut self, data: &[u8]) {
        for &b in data {
            if b == self.keys[self.matched] {
                self.matched += 1;
                if self.matched == self.keys.len() {
                    tracing::info!("读取到分离键");
                    self.detached = true;
                    self.matched = 0;
                    return;
                }
                continue;
            }

            // 匹配中断，补发暂存的前缀后重新从头匹配当前字节
            self.pending.extend_from_slice(&self.keys[..self.matched]);
            self.matched = 0;
            if b == self.keys[0] {
                self.matched = 1;
            } else {
                self.pending.push(b);
            }
        }
    }
}

impl<R: Read> Read for DetachableStdin<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.pending.is_empty() {
            return Ok(self.drain_pending(buf));
        }
        if self.detached {
            return Ok(0);
        }
        if self.keys.is_empty() {
            return self.inner.read(buf);
        }

        let mut chunk = vec![0u8; buf.len()];
        loop {
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                // EOF：交付未完成匹配的前缀
                self.pending.extend_from_slice(&self.keys[..self.matched]);
                self.matched = 0;
                return Ok(self.drain_pending(buf));
            }

            self.scan(&chunk[..n]);
            if !self.pending.is_empty() || self.detached {
                return Ok(self.drain_pending(buf));
            }
            // 本次读取的字节全部是分离键前缀，继续读取而不是返回 0
        }
    }
}


/// Property-based tests for detach key detection
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// 不含分离键首字节的输入原样通过
        #[test]
        fn prop_input_without_keys_is_unchanged(
            data in prop::collection::vec(any::<u8>().prop_filter("not ctrl-p", |b| *b != 16), 0..256)
        ) {
            let mut stdin = DetachableStdin::new(Cursor::new(data.clone()), "").unwrap();
            let mut out = Vec::new();
            stdin.read_to_end(&mut out).unwrap();
            prop_assert_eq!(out, data);
            prop_assert!(!stdin.is_detached());
        }

        /// 分离序列之前的字节全部交付，之后的字节全部丢弃
        #[test]
        fn prop_detach_truncates_input(
            head in prop::collection::vec(any::<u8>().prop_filter("not ctrl-p", |b| *b != 16), 0..64),
            tail in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut data = head.clone();
            data.extend_from_slice(&[16, 17]);
            data.extend_from_slice(&tail);

            let mut stdin = DetachableStdin::new(Cursor::new(data), "").unwrap();
            let mut out = Vec::new();
            stdin.read_to_end(&mut out).unwrap();
            prop_assert_eq!(out, head);
            prop_assert!(stdin.is_detached());
        }
    }
}
