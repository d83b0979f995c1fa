//! 交点求解
//!
//! 每当向状态中加入一个新实体，就计算它与所有已有实体的交点，
//! 得到的候选点**追加**到候选池中（从不替换），
//! 因为后续步骤可能引用若干步之前发现的交点。
//!
//! 支持的组合：
//! - 圆-圆
//! - 圆-直（线段/直线）
//! - 直-直
//!
//! 所有判定使用 [`EPSILON`]。

use crate::entity::{Entity, EntityId};
use crate::error::{ConstructionError, Result};
use crate::math::{approx_eq, cross, line_parameter, points_coincide, Point2, Vector2, EPSILON};
use crate::state::ConstructionState;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 交点候选
///
/// 临时对象：要么被提升为命名的点，要么被丢弃。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionCandidate {
    pub position: Point2,
    /// 产生该交点的两个实体
    pub parents: (EntityId, EntityId),
    /// 发现顺序
    pub sequence: u64,
}

impl IntersectionCandidate {
    /// 是否由给定的一对实体产生（不区分顺序）
    pub fn from_pair(&self, a: EntityId, b: EntityId) -> bool {
        (self.parents.0 == a && self.parents.1 == b) || (self.parents.0 == b && self.parents.1 == a)
    }
}

/// 候选池
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidatePool {
    items: Vec<IntersectionCandidate>,
    next_sequence: u64,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntersectionCandidate> {
        self.items.iter()
    }

    /// 某一对实体的全部候选（按发现顺序）
    pub fn for_pair(&self, a: EntityId, b: EntityId) -> Vec<&IntersectionCandidate> {
        self.items.iter().filter(|c| c.from_pair(a, b)).collect()
    }

    /// 追加一个候选；同一对实体在同一位置已有候选时忽略
    fn push(&mut self, position: Point2, parents: (EntityId, EntityId)) -> bool {
        let duplicate = self.items.iter().any(|c| {
            c.from_pair(parents.0, parents.1) && points_coincide(&c.position, &position)
        });
        if duplicate {
            return false;
        }
        self.items.push(IntersectionCandidate {
            position,
            parents,
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        true
    }

    /// 某位置已成为命名点后，丢弃该位置上的所有候选
    pub fn discard_at(&self, position: &Point2) -> Self {
        let mut next = self.clone();
        next.items.retain(|c| !points_coincide(&c.position, position));
        next
    }
}

/// 用于求交的解析形状
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle {
        center: Point2,
        radius: f64,
    },
    Straight {
        start: Point2,
        end: Point2,
        /// 是否视为无限长
        infinite: bool,
    },
}

impl Shape {
    /// 将实体解析为形状；点没有形状
    ///
    /// `extended` 为真时线段也视为无限长直线。
    pub fn of(state: &ConstructionState, entity: &Entity, extended: bool) -> Result<Option<Self>> {
        let shape = match entity {
            Entity::Point(_) => return Ok(None),
            Entity::Circle(c) => {
                let radius = state.radius(c)?;
                if radius <= EPSILON {
                    return Err(ConstructionError::DegenerateGeometry(format!(
                        "circle {} has zero radius",
                        c.label
                    )));
                }
                Shape::Circle {
                    center: state.position(c.center)?,
                    radius,
                }
            }
            Entity::Segment(s) => Shape::Straight {
                start: state.position(s.start)?,
                end: state.position(s.end)?,
                infinite: extended,
            },
            Entity::Line(l) => Shape::Straight {
                start: state.position(l.start)?,
                end: state.position(l.end)?,
                infinite: true,
            },
        };
        Ok(Some(shape))
    }
}

/// 计算新实体与所有已有实体的交点，追加到候选池
///
/// 两个实体共有的定义点本身就是它们的交点，不再作为候选。
/// 与其他命名点重合的交点照常加入，交点步骤可以再次标记它。
/// 重合的圆没有有限个交点，这一对跳过，只有交点步骤真正引用它们时才报错。
pub fn find_new_intersections(
    state: &ConstructionState,
    new_entity: EntityId,
    candidates: &CandidatePool,
    extended: bool,
) -> Result<CandidatePool> {
    let entity = state.require(new_entity)?;
    let mut pool = candidates.clone();

    let Some(new_shape) = Shape::of(state, entity, extended)? else {
        return Ok(pool);
    };

    for prior in state.entities() {
        if prior.id() == new_entity {
            continue;
        }
        let Some(prior_shape) = Shape::of(state, prior, extended)? else {
            continue;
        };

        let points = match intersect(&prior_shape, &new_shape) {
            Ok(points) => points,
            Err(reason) => {
                debug!("skipping {} x {}: {}", prior.label(), entity.label(), reason);
                continue;
            }
        };

        let shared = shared_defining_points(state, prior, entity)?;
        for point in points {
            if shared.iter().any(|p| points_coincide(p, &point)) {
                continue;
            }
            if pool.push(point, (prior.id(), new_entity)) {
                debug!(
                    "candidate ({:.6}, {:.6}) from {} x {}",
                    point.x,
                    point.y,
                    prior.label(),
                    entity.label()
                );
            }
        }
    }

    Ok(pool)
}

/// 两个实体共有的定义点的坐标
fn shared_defining_points(
    state: &ConstructionState,
    first: &Entity,
    second: &Entity,
) -> Result<Vec<Point2>> {
    let (Some((a0, a1)), Some((b0, b1))) = (first.defining_points(), second.defining_points())
    else {
        return Ok(vec![]);
    };
    [a0, a1]
        .into_iter()
        .filter(|id| *id == b0 || *id == b1)
        .map(|id| state.position(id))
        .collect()
}

/// 一对实体为何没有交点候选：重合的圆给出原因，其余情况返回 `None`
pub fn degenerate_pair(
    state: &ConstructionState,
    first: &Entity,
    second: &Entity,
) -> Result<Option<String>> {
    match (Shape::of(state, first, false)?, Shape::of(state, second, false)?) {
        (Some(a), Some(b)) => Ok(intersect(&a, &b).err()),
        _ => Ok(None),
    }
}

/// 两个形状的交点（按发现顺序）
///
/// 重合的圆返回错误；平行或共线的直线没有交点。
pub fn intersect(first: &Shape, second: &Shape) -> std::result::Result<Vec<Point2>, String> {
    match (first, second) {
        (
            Shape::Circle {
                center: c1,
                radius: r1,
            },
            Shape::Circle {
                center: c2,
                radius: r2,
            },
        ) => circle_circle(*c1, *r1, *c2, *r2),
        (Shape::Circle { center, radius }, straight @ Shape::Straight { .. })
        | (straight @ Shape::Straight { .. }, Shape::Circle { center, radius }) => {
            Ok(circle_straight(*center, *radius, straight))
        }
        (a @ Shape::Straight { .. }, b @ Shape::Straight { .. }) => {
            Ok(straight_straight(a, b).into_iter().collect())
        }
    }
}

/// 圆-圆交点
///
/// 两交点时先给出位于 c1->c2 左侧的点。
pub fn circle_circle(
    c1: Point2,
    r1: f64,
    c2: Point2,
    r2: f64,
) -> std::result::Result<Vec<Point2>, String> {
    let delta = c2 - c1;
    let d = delta.norm();

    if d <= EPSILON {
        if approx_eq(r1, r2) {
            return Err("coincident circles".to_string());
        }
        // 同心不等圆
        return Ok(vec![]);
    }

    // 相离或内含
    if d > r1 + r2 + EPSILON || d < (r1 - r2).abs() - EPSILON {
        return Ok(vec![]);
    }

    let a = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let h = (r1 * r1 - a * a).max(0.0).sqrt();

    let dir = delta / d;
    let p = c1 + dir * a;
    let perp = Vector2::new(-dir.y, dir.x);

    if h <= EPSILON || approx_eq(d, r1 + r2) || approx_eq(d, (r1 - r2).abs()) {
        // 相切
        Ok(vec![p])
    } else {
        Ok(vec![p + perp * h, p - perp * h])
    }
}

/// 圆-直交点，按沿定义方向的参数升序
fn circle_straight(center: Point2, radius: f64, straight: &Shape) -> Vec<Point2> {
    let Shape::Straight {
        start,
        end,
        infinite,
    } = *straight
    else {
        return vec![];
    };

    let d = end - start;
    let len = d.norm();
    if len <= EPSILON {
        return vec![];
    }
    let dir = d / len;

    // 圆心在直线上的垂足
    let foot_t = (center - start).dot(&dir);
    let foot = start + dir * foot_t;
    let dist = (center - foot).norm();

    let along: Vec<f64> = if dist > radius + EPSILON {
        vec![]
    } else if approx_eq(dist, radius) {
        vec![foot_t]
    } else {
        let half_chord = (radius * radius - dist * dist).max(0.0).sqrt();
        vec![foot_t - half_chord, foot_t + half_chord]
    };

    along
        .into_iter()
        .filter(|s| infinite || (*s >= -EPSILON && *s <= len + EPSILON))
        .map(|s| start + dir * s)
        .collect()
}

/// 直-直交点
fn straight_straight(first: &Shape, second: &Shape) -> Option<Point2> {
    let (
        Shape::Straight {
            start: s1,
            end: e1,
            infinite: inf1,
        },
        Shape::Straight {
            start: s2,
            end: e2,
            infinite: inf2,
        },
    ) = (*first, *second)
    else {
        return None;
    };

    let d1 = e1 - s1;
    let d2 = e2 - s2;
    let denom = cross(&d1, &d2);

    // 平行或共线
    if denom.abs() <= EPSILON * d1.norm() * d2.norm() {
        return None;
    }

    let w = s2 - s1;
    let t1 = cross(&w, &d2) / denom;
    let t2 = cross(&w, &d1) / denom;

    let within = |t: f64, infinite: bool| infinite || (t >= -EPSILON && t <= 1.0 + EPSILON);
    if within(t1, inf1) && within(t2, inf2) {
        Some(s1 + d1 * t1)
    } else {
        None
    }
}

/// 点 `p` 是否严格位于从 `from` 经过 `through` 的射线上 `through` 之外
pub fn lies_beyond(from: &Point2, through: &Point2, p: &Point2) -> bool {
    line_parameter(from, through, p).is_some_and(|t| t > 1.0 + EPSILON)
}
