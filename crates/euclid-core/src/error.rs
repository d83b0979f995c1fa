//! 作图错误定义

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    /// 消歧规则之后剩余 0 个或多于 1 个候选
    #[error("Ambiguous selection: {0}")]
    AmbiguousSelection(String),

    /// 同心圆、零半径、预期交点不存在等
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// 选择器或宏输入引用了不存在的实体
    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    #[error("Macro I.{number} expects {expected} {what}, got {actual}")]
    MacroArityMismatch {
        number: u32,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),
}

pub type Result<T> = std::result::Result<T, ConstructionError>;
