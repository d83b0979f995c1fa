//! 作图状态（实体库）
//!
//! `ConstructionState` 是"到目前为止画了什么"的唯一来源。
//! 所有 `add_*` 操作都不修改自身，而是返回新的状态值和新实体的ID，
//! 因此每一个中间状态都可以独立检查。
//!
//! 不变量：
//! - 标签在同一状态内唯一
//! - 线段/圆/直线只引用本状态中存在的点
//! - 点坐标创建后不再改变

use crate::entity::{
    circle_label, line_label, segment_label, Circle, Entity, EntityId, Line, Point, PointOrigin,
    Segment,
};
use crate::error::{ConstructionError, Result};
use crate::math::{points_coincide, Point2, EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 作图状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructionState {
    /// ID -> 实体（按创建顺序有序）
    entities: BTreeMap<EntityId, Entity>,

    /// 标签索引
    labels: BTreeMap<String, EntityId>,

    /// 下一个分配的ID
    next_id: u64,
}

impl ConstructionState {
    /// 创建空状态
    pub fn new() -> Self {
        Self::default()
    }

    // ========== 添加（返回新状态） ==========

    /// 添加点
    pub fn add_point(
        &self,
        label: impl Into<String>,
        position: Point2,
        origin: PointOrigin,
    ) -> Result<(Self, EntityId)> {
        let label = label.into();
        if !position.x.is_finite() || !position.y.is_finite() {
            return Err(ConstructionError::DegenerateGeometry(format!(
                "point {} has non-finite coordinates",
                label
            )));
        }
        self.insert(label, |id, label| {
            Entity::Point(Point {
                id,
                label,
                position,
                origin,
            })
        })
    }

    /// 添加线段
    pub fn add_segment(
        &self,
        start: EntityId,
        end: EntityId,
        label: Option<&str>,
    ) -> Result<(Self, EntityId)> {
        let (a, b) = self.distinct_pair(start, end, "segment")?;
        let label = label
            .map(str::to_string)
            .unwrap_or_else(|| segment_label(&a.label, &b.label));
        self.insert(label, |id, label| {
            Entity::Segment(Segment {
                id,
                label,
                start,
                end,
            })
        })
    }

    /// 添加圆（圆心 + 经过点）
    pub fn add_circle(
        &self,
        center: EntityId,
        through: EntityId,
        label: Option<&str>,
    ) -> Result<(Self, EntityId)> {
        let (c, t) = self.distinct_pair(center, through, "circle")?;
        let label = label
            .map(str::to_string)
            .unwrap_or_else(|| circle_label(&c.label, &t.label));
        self.insert(label, |id, label| {
            Entity::Circle(Circle {
                id,
                label,
                center,
                through,
            })
        })
    }

    /// 添加直线（无限长）
    pub fn add_line(
        &self,
        start: EntityId,
        end: EntityId,
        label: Option<&str>,
    ) -> Result<(Self, EntityId)> {
        let (a, b) = self.distinct_pair(start, end, "line")?;
        let label = label
            .map(str::to_string)
            .unwrap_or_else(|| line_label(&a.label, &b.label));
        self.insert(label, |id, label| {
            Entity::Line(Line {
                id,
                label,
                start,
                end,
            })
        })
    }

    fn insert(
        &self,
        label: String,
        build: impl FnOnce(EntityId, String) -> Entity,
    ) -> Result<(Self, EntityId)> {
        if self.labels.contains_key(&label) {
            return Err(ConstructionError::DuplicateLabel(label));
        }

        let id = EntityId(self.next_id);
        let mut next = self.clone();
        next.next_id += 1;
        next.labels.insert(label.clone(), id);
        next.entities.insert(id, build(id, label));
        Ok((next, id))
    }

    /// 检查两个点存在且不重合（长度/半径不为零）
    fn distinct_pair(&self, a: EntityId, b: EntityId, what: &str) -> Result<(&Point, &Point)> {
        let pa = self.point(a)?;
        let pb = self.point(b)?;
        if a == b || (pa.position - pb.position).norm() <= EPSILON {
            return Err(ConstructionError::DegenerateGeometry(format!(
                "{} through {} and {} has zero length",
                what, pa.label, pb.label
            )));
        }
        Ok((pa, pb))
    }

    // ========== 查询 ==========

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// 按ID获取实体，不存在时报错
    pub fn require(&self, id: EntityId) -> Result<&Entity> {
        self.entities
            .get(&id)
            .ok_or_else(|| ConstructionError::UnknownReference(format!("entity {}", id)))
    }

    /// 按ID获取点
    pub fn point(&self, id: EntityId) -> Result<&Point> {
        match self.require(id)? {
            Entity::Point(p) => Ok(p),
            other => Err(ConstructionError::UnknownReference(format!(
                "{} ({}) is a {}, not a point",
                other.label(),
                id,
                other.type_name()
            ))),
        }
    }

    pub fn position(&self, id: EntityId) -> Result<Point2> {
        Ok(self.point(id)?.position)
    }

    /// 所有点（按创建顺序）
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.entities.values().filter_map(Entity::as_point)
    }

    /// 所有实体（按创建顺序）
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn by_label(&self, label: &str) -> Option<EntityId> {
        self.labels.get(label).copied()
    }

    pub fn label_of(&self, id: EntityId) -> Option<&str> {
        self.entities.get(&id).map(Entity::label)
    }

    /// 连接两点的线段（不区分方向）
    pub fn segment_between(&self, a: EntityId, b: EntityId) -> Option<EntityId> {
        self.entities.values().find_map(|e| match e {
            Entity::Segment(s) if s.joins(a, b) => Some(s.id),
            _ => None,
        })
    }

    /// 以 `center` 为圆心、经过 `through` 的圆
    pub fn circle_with(&self, center: EntityId, through: EntityId) -> Option<EntityId> {
        self.entities.values().find_map(|e| match e {
            Entity::Circle(c) if c.center == center && c.through == through => Some(c.id),
            _ => None,
        })
    }

    /// 经过两点的直线（不区分方向）
    pub fn line_through(&self, a: EntityId, b: EntityId) -> Option<EntityId> {
        self.entities.values().find_map(|e| match e {
            Entity::Line(l) if l.passes_through(a, b) => Some(l.id),
            _ => None,
        })
    }

    /// 与给定坐标重合的已有点
    pub fn point_at(&self, position: &Point2) -> Option<EntityId> {
        self.points()
            .find(|p| points_coincide(&p.position, position))
            .map(|p| p.id)
    }

    /// 圆的半径：|圆心 - 经过点|
    pub fn radius(&self, circle: &Circle) -> Result<f64> {
        Ok((self.position(circle.through)? - self.position(circle.center)?).norm())
    }

    /// 两点间距离
    pub fn distance(&self, a: EntityId, b: EntityId) -> Result<f64> {
        Ok((self.position(a)? - self.position(b)?).norm())
    }

    // ========== 统计 ==========

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.count(|e| matches!(e, Entity::Point(_)))
    }

    pub fn segment_count(&self) -> usize {
        self.count(|e| matches!(e, Entity::Segment(_)))
    }

    pub fn circle_count(&self) -> usize {
        self.count(|e| matches!(e, Entity::Circle(_)))
    }

    pub fn line_count(&self) -> usize {
        self.count(|e| matches!(e, Entity::Line(_)))
    }

    fn count(&self, pred: impl Fn(&Entity) -> bool) -> usize {
        self.entities.values().filter(|e| pred(e)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_points() -> (ConstructionState, EntityId, EntityId) {
        let s = ConstructionState::new();
        let (s, a) = s.add_point("A", Point2::new(0.0, 0.0), PointOrigin::Given).unwrap();
        let (s, b) = s.add_point("B", Point2::new(3.0, 4.0), PointOrigin::Given).unwrap();
        (s, a, b)
    }

    #[test]
    fn test_add_returns_new_state() {
        let (s, a, b) = two_points();
        let (next, seg) = s.add_segment(a, b, None).unwrap();

        assert_eq!(s.segment_count(), 0);
        assert_eq!(next.segment_count(), 1);
        assert_eq!(next.label_of(seg), Some("AB"));
        assert_eq!(next.segment_between(b, a), Some(seg));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let (s, _, _) = two_points();
        let err = s
            .add_point("A", Point2::new(5.0, 5.0), PointOrigin::Given)
            .unwrap_err();
        assert_eq!(err, ConstructionError::DuplicateLabel("A".into()));
    }

    #[test]
    fn test_zero_radius_circle_rejected() {
        let (s, a, _) = two_points();
        let (s, a2) = s.add_point("A'", Point2::new(0.0, 0.0), PointOrigin::Given).unwrap();
        assert!(matches!(
            s.add_circle(a, a2, None),
            Err(ConstructionError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_radius_recomputed_from_points() {
        let (s, a, b) = two_points();
        let (s, c) = s.add_circle(a, b, None).unwrap();
        let Some(Entity::Circle(circle)) = s.entity(c) else {
            panic!("expected circle");
        };
        assert!((s.radius(circle).unwrap() - 5.0).abs() < EPSILON);
        assert_eq!(s.circle_with(a, b), Some(c));
        assert_eq!(s.circle_with(b, a), None);
    }

    #[test]
    fn test_unknown_reference() {
        let (s, a, _) = two_points();
        assert!(matches!(
            s.add_segment(a, EntityId(99), None),
            Err(ConstructionError::UnknownReference(_))
        ));
    }

    #[test]
    fn test_ids_are_sequential() {
        let (s, a, b) = two_points();
        assert_eq!(a, EntityId(0));
        assert_eq!(b, EntityId(1));
        let (_, seg) = s.add_segment(a, b, None).unwrap();
        assert_eq!(seg, EntityId(2));
    }
}
