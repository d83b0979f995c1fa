//! Euclid 尺规作图回放引擎
//!
//! 按脚本回放《几何原本》第一卷命题的作图过程：
//! 用圆规、直尺画出实体，求交并选出交点，记录由定义推出的相等关系。
//!
//! # 架构设计
//!
//! - `ConstructionState`: 不可变的实体库，每次添加都得到新状态
//! - `CandidatePool`: 只追加的交点候选池
//! - `Selector` / `Disambiguation`: 把符号引用解析为实体，并在多个交点中选出一个
//! - `FactStore`: 带来源的相等断言
//! - `MacroRegistry`: 先前命题作为单步宏调用
//! - `Interpreter`: 顺序执行步骤，失败时返回失败前的状态
//!
//! # 示例
//!
//! ```rust
//! use euclid_core::prelude::*;
//!
//! let registry = MacroRegistry::with_builtins();
//! let replay = Interpreter::new(&registry)
//!     .replay(&propositions::proposition_1())
//!     .unwrap();
//!
//! let c = replay.state.by_label("C").unwrap();
//! assert!(replay.state.position(c).unwrap().y > 0.0);
//! ```

pub mod conformance;
pub mod entity;
pub mod error;
pub mod facts;
pub mod intersection;
pub mod macros;
pub mod math;
pub mod propositions;
pub mod reference;
pub mod replay;
pub mod script;
pub mod selector;
pub mod state;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::conformance::{compare, ConformanceReport};
    pub use crate::entity::{Circle, Entity, EntityId, Line, Point, PointOrigin, Segment};
    pub use crate::error::{ConstructionError, Result};
    pub use crate::facts::{Fact, FactKind, FactStore, Length, Provenance, Rule};
    pub use crate::intersection::{find_new_intersections, CandidatePool, IntersectionCandidate};
    pub use crate::macros::{MacroEntry, MacroInvocation, MacroOutcome, MacroRegistry};
    pub use crate::math::{Point2, Vector2, EPSILON};
    pub use crate::propositions;
    pub use crate::replay::{Interpreter, Replay, ReplayOptions, StepFailure, StepRecord};
    pub use crate::script::{GivenElement, IntersectionStep, Proposition, Step, StepKind};
    pub use crate::selector::{Disambiguation, Selector, Side};
    pub use crate::state::ConstructionState;
}
