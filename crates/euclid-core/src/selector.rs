//! 选择器与消歧
//!
//! 选择器把步骤中的符号引用（标签或结构描述）解析为实体ID。
//! 一对实体产生多个候选时，按固定顺序消歧：
//!
//! 1. 指定了"越过点"P 时，只保留沿射线严格越过 P 的候选
//! 2. 只剩一个则选中
//! 3. 否则按参考线段的手性（叉积符号）偏向一侧
//! 4. 仍然并列则取发现顺序中的第一个
//!
//! 这个顺序是策略而非几何定律，欧几里得插图默认的朝向只能由它复现。

use crate::entity::{Entity, EntityId};
use crate::error::{ConstructionError, Result};
use crate::intersection::{degenerate_pair, lies_beyond, CandidatePool, IntersectionCandidate};
use crate::math::{cross, Point2, EPSILON};
use crate::state::ConstructionState;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 实体选择器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// 按标签
    Label(String),
    /// 连接两点的线段（不区分方向）
    Segment(String, String),
    /// 圆心 + 经过点
    Circle { center: String, through: String },
    /// 经过两点的直线（不区分方向）
    Line(String, String),
}

impl Selector {
    pub fn label(label: impl Into<String>) -> Self {
        Selector::Label(label.into())
    }

    pub fn segment(a: impl Into<String>, b: impl Into<String>) -> Self {
        Selector::Segment(a.into(), b.into())
    }

    pub fn circle(center: impl Into<String>, through: impl Into<String>) -> Self {
        Selector::Circle {
            center: center.into(),
            through: through.into(),
        }
    }

    pub fn line(a: impl Into<String>, b: impl Into<String>) -> Self {
        Selector::Line(a.into(), b.into())
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Label(l) => write!(f, "{}", l),
            Selector::Segment(a, b) => write!(f, "segment {}{}", a, b),
            Selector::Circle { center, through } => write!(f, "circle({},{})", center, through),
            Selector::Line(a, b) => write!(f, "line({},{})", a, b),
        }
    }
}

/// 把选择器解析为实体ID
pub fn resolve_selector(selector: &Selector, state: &ConstructionState) -> Result<EntityId> {
    let found = match selector {
        Selector::Label(label) => state.by_label(label),
        Selector::Segment(a, b) => {
            state.segment_between(resolve_point(a, state)?, resolve_point(b, state)?)
        }
        Selector::Circle { center, through } => {
            state.circle_with(resolve_point(center, state)?, resolve_point(through, state)?)
        }
        Selector::Line(a, b) => {
            state.line_through(resolve_point(a, state)?, resolve_point(b, state)?)
        }
    };
    found.ok_or_else(|| ConstructionError::UnknownReference(selector.to_string()))
}

/// 按标签解析点
pub fn resolve_point(label: &str, state: &ConstructionState) -> Result<EntityId> {
    let id = state
        .by_label(label)
        .ok_or_else(|| ConstructionError::UnknownReference(format!("point {}", label)))?;
    state.point(id)?;
    Ok(id)
}

/// 手性偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// 参考方向左侧（叉积为正）
    #[default]
    Left,
    /// 参考方向右侧（叉积为负）
    Right,
}

/// 交点步骤的消歧参数（均已解析为ID）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Disambiguation {
    /// 越过点
    pub beyond: Option<EntityId>,
    /// 手性参考线段 R->S；缺省时取两实体各自的第一个定义点
    pub reference: Option<(EntityId, EntityId)>,
    pub side: Side,
}

/// 从实体对 (a, b) 的候选中选出唯一一个
pub fn select_candidate(
    state: &ConstructionState,
    pool: &CandidatePool,
    a: EntityId,
    b: EntityId,
    rules: &Disambiguation,
) -> Result<IntersectionCandidate> {
    let first = state.require(a)?;
    let second = state.require(b)?;

    let mut survivors = pool.for_pair(a, b);
    if survivors.is_empty() {
        let reason = degenerate_pair(state, first, second)?
            .unwrap_or_else(|| "do not intersect".to_string());
        return Err(ConstructionError::DegenerateGeometry(format!(
            "{} and {}: {}",
            first.label(),
            second.label(),
            reason
        )));
    }

    // 1. 越过点
    if let Some(p) = rules.beyond {
        let (from, through) = beyond_ray(state, first, second, p)?;
        survivors.retain(|c| lies_beyond(&from, &through, &c.position));
        if survivors.is_empty() {
            return Err(ConstructionError::AmbiguousSelection(format!(
                "no intersection of {} and {} lies beyond {}",
                first.label(),
                second.label(),
                state.label_of(p).unwrap_or("?")
            )));
        }
    }

    // 2. 唯一
    if let [only] = survivors.as_slice() {
        return Ok((*only).clone());
    }

    // 3./4. 手性与发现顺序
    let (r, s) = match rules.reference {
        Some((r, s)) => (r, s),
        None => default_reference(first, second)?,
    };
    let reference = (state.position(r)?, state.position(s)?);
    let chosen = break_tie(&survivors, reference, rules.side).ok_or_else(|| {
        ConstructionError::AmbiguousSelection(format!(
            "no candidate left for {} and {}",
            first.label(),
            second.label()
        ))
    })?;

    debug!(
        "tie-break chose candidate #{} of {} for {} x {}",
        chosen.sequence,
        survivors.len(),
        first.label(),
        second.label()
    );
    Ok(chosen.clone())
}

/// 平局裁决：先按手性偏向一侧，仍并列则取发现顺序第一个
///
/// 偏好一侧没有候选时（全部在另一侧或在参考线上），在全部候选中取第一个。
pub fn break_tie<'a>(
    candidates: &[&'a IntersectionCandidate],
    reference: (Point2, Point2),
    side: Side,
) -> Option<&'a IntersectionCandidate> {
    let (r, s) = reference;
    let axis = s - r;

    let preferred: Vec<&IntersectionCandidate> = candidates
        .iter()
        .copied()
        .filter(|c| {
            let z = cross(&axis, &(c.position - r));
            match side {
                Side::Left => z > EPSILON,
                Side::Right => z < -EPSILON,
            }
        })
        .collect();

    let pool = if preferred.is_empty() {
        candidates.to_vec()
    } else {
        preferred
    };
    pool.into_iter().min_by_key(|c| c.sequence)
}

/// 越过点所在的射线：在 a、b 中找以 P 为定义点的直实体，射线从另一定义点出发经过 P
fn beyond_ray(
    state: &ConstructionState,
    first: &Entity,
    second: &Entity,
    p: EntityId,
) -> Result<(Point2, Point2)> {
    for entity in [first, second] {
        if !entity.is_straight() {
            continue;
        }
        if let Some((start, end)) = entity.defining_points() {
            if end == p {
                return Ok((state.position(start)?, state.position(p)?));
            }
            if start == p {
                return Ok((state.position(end)?, state.position(p)?));
            }
        }
    }
    Err(ConstructionError::UnknownReference(format!(
        "{} does not define {} or {}",
        state.label_of(p).unwrap_or("?"),
        first.label(),
        second.label()
    )))
}

/// 默认参考线段：a 的第一个定义点 -> b 的第一个定义点（圆取圆心）
fn default_reference(first: &Entity, second: &Entity) -> Result<(EntityId, EntityId)> {
    let r = first.defining_points().map(|(p, _)| p);
    let s = second.defining_points().map(|(p, _)| p);
    match (r, s) {
        (Some(r), Some(s)) if r != s => Ok((r, s)),
        // 同一起点时退回 a 自身的方向
        (Some(_), Some(_)) => first.defining_points().ok_or_else(|| {
            ConstructionError::AmbiguousSelection(format!("no reference for {}", first.label()))
        }),
        _ => Err(ConstructionError::AmbiguousSelection(format!(
            "{} and {} cannot define a reference direction",
            first.label(),
            second.label()
        ))),
    }
}
