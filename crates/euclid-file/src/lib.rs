//! Euclid 文件格式处理
//!
//! 支持：
//! - `.json` 命题脚本与命题目录
//! - `.eucl` 回放快照（MessagePack + Zstd），用作预览缓存

pub mod error;
pub mod native;
pub mod script;

pub use error::FileError;
pub use native::{load_snapshot, save_snapshot, Snapshot};
pub use script::{
    load_catalog, load_proposition, load_registry, parse_catalog, parse_proposition, save_catalog,
    save_proposition,
};
