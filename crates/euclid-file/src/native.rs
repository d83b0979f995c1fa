//! 回放快照格式（.eucl）
//!
//! 回放完成后的状态和事实，保存下来作为预览缓存：
//! MessagePack 序列化后用 Zstd 压缩，前面加 16 字节文件头。

use crate::error::FileError;
use euclid_core::facts::FactStore;
use euclid_core::replay::Replay;
use euclid_core::state::ConstructionState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 文件魔数 "EUCL"
const MAGIC: &[u8; 4] = b"EUCL";

/// 当前文件格式版本
const FORMAT_VERSION: u32 = 1;

/// 文件头长度：魔数、版本、标志位（预留）、压缩后数据长度
const HEADER_LEN: usize = 16;

/// Zstd 压缩级别
const COMPRESSION_LEVEL: i32 = 3;

/// 快照内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 命题编号
    pub number: u32,
    pub state: ConstructionState,
    pub facts: FactStore,
}

impl Snapshot {
    pub fn from_replay(number: u32, replay: &Replay) -> Self {
        Self {
            number,
            state: replay.state.clone(),
            facts: replay.facts.clone(),
        }
    }

    /// 编码为文件字节：文件头 + zstd(MessagePack)
    pub fn encode(&self) -> Result<Vec<u8>, FileError> {
        // 带标签的实体枚举需要按字段名编码
        let payload = zstd::encode_all(
            rmp_serde::to_vec_named(self)?.as_slice(),
            COMPRESSION_LEVEL,
        )?;
        let size = u32::try_from(payload.len()).map_err(|_| {
            FileError::InvalidFormat(format!(
                "Snapshot too large ({} bytes compressed)",
                payload.len()
            ))
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&size.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// 从文件字节解码，先校验文件头
    pub fn decode(bytes: &[u8]) -> Result<Self, FileError> {
        let Some((header, rest)) = bytes.split_first_chunk::<HEADER_LEN>() else {
            return Err(FileError::InvalidFormat(format!(
                "Snapshot is {} bytes, shorter than its header",
                bytes.len()
            )));
        };
        if &header[0..4] != MAGIC {
            return Err(FileError::InvalidFormat(
                "Invalid magic number, not a Euclid snapshot".to_string(),
            ));
        }

        let word = |i: usize| {
            u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]])
        };
        let version = word(4);
        if version > FORMAT_VERSION {
            return Err(FileError::UnsupportedVersion(format!(
                "File version {} is newer than supported version {}",
                version, FORMAT_VERSION
            )));
        }

        let size = word(12) as usize;
        let payload = rest.get(..size).ok_or_else(|| {
            FileError::InvalidFormat(format!(
                "Snapshot payload truncated: expected {} bytes, found {}",
                size,
                rest.len()
            ))
        })?;

        let msgpack_data = zstd::decode_all(payload)?;
        Ok(rmp_serde::from_slice(&msgpack_data)?)
    }
}

/// 保存快照
pub fn save_snapshot(snapshot: &Snapshot, path: &Path) -> Result<(), FileError> {
    let bytes = snapshot.encode()?;
    fs::write(path, &bytes)?;

    tracing::info!(
        "Saved I.{} snapshot ({} entities, {} facts) to {} ({} bytes)",
        snapshot.number,
        snapshot.state.len(),
        snapshot.facts.len(),
        path.display(),
        bytes.len()
    );

    Ok(())
}

/// 加载快照
pub fn load_snapshot(path: &Path) -> Result<Snapshot, FileError> {
    let snapshot = Snapshot::decode(&fs::read(path)?)?;

    tracing::info!(
        "Loaded I.{} snapshot ({} entities, {} facts) from {}",
        snapshot.number,
        snapshot.state.len(),
        snapshot.facts.len(),
        path.display()
    );

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use euclid_core::macros::MacroRegistry;
    use euclid_core::propositions;
    use euclid_core::replay::Interpreter;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file_path = dir.path().join("i3.eucl");

        let registry = MacroRegistry::with_builtins();
        let replay = Interpreter::new(&registry)
            .replay(&propositions::proposition_3())
            .expect("Failed to replay");
        let snapshot = Snapshot::from_replay(3, &replay);

        save_snapshot(&snapshot, &file_path).expect("Failed to save");

        // 验证文件头
        let bytes = fs::read(&file_path).expect("Failed to read");
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(bytes[4..8], FORMAT_VERSION.to_le_bytes());
        assert_eq!(
            u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize,
            bytes.len() - HEADER_LEN
        );

        let loaded = load_snapshot(&file_path).expect("Failed to load");
        assert_eq!(loaded, snapshot);
        assert!(loaded.state.by_label("F").is_some());
    }

    #[test]
    fn test_invalid_magic() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file_path = dir.path().join("invalid.eucl");

        let mut bytes = b"XXXX".to_vec();
        bytes.extend_from_slice(&[0u8; 12]);
        fs::write(&file_path, &bytes).expect("Failed to write");

        assert!(matches!(
            load_snapshot(&file_path),
            Err(FileError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);

        assert!(matches!(
            Snapshot::decode(&bytes),
            Err(FileError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_truncated_snapshot_rejected() {
        let registry = MacroRegistry::with_builtins();
        let replay = Interpreter::new(&registry)
            .replay(&propositions::proposition_1())
            .expect("Failed to replay");
        let bytes = Snapshot::from_replay(1, &replay).encode().expect("Failed to encode");

        assert!(matches!(
            Snapshot::decode(&bytes[..HEADER_LEN - 1]),
            Err(FileError::InvalidFormat(_))
        ));
        assert!(matches!(
            Snapshot::decode(&bytes[..bytes.len() - 1]),
            Err(FileError::InvalidFormat(_))
        ));
    }
}
