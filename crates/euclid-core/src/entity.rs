//! 作图实体定义
//!
//! 支持的实体：
//! - 点 (Point)
//! - 线段 (Segment)
//! - 圆 (Circle)，采用"折叠圆规"约定：半径 = |圆心 - 经过点|
//! - 直线 (Line)，由两点定义，求交时视为无限长
//!
//! 线段、圆、直线只保存点的 ID，长度与半径总是从端点坐标重新计算。

use crate::math::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 实体ID
///
/// 在同一个作图状态内按创建顺序递增分配，因此相同脚本的两次回放得到相同的ID。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 点的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointOrigin {
    /// 命题给定
    Given,
    /// 由交点候选提升而来
    Intersection,
    /// 宏（先前命题）的产出
    MacroOutput,
}

/// 点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: EntityId,
    pub label: String,
    pub position: Point2,
    pub origin: PointOrigin,
}

/// 线段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: EntityId,
    pub label: String,
    pub start: EntityId,
    pub end: EntityId,
}

impl Segment {
    /// 是否连接给定的两点（不区分方向）
    pub fn joins(&self, a: EntityId, b: EntityId) -> bool {
        (self.start == a && self.end == b) || (self.start == b && self.end == a)
    }
}

/// 圆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub id: EntityId,
    pub label: String,
    pub center: EntityId,
    /// 圆上一点，决定半径
    pub through: EntityId,
}

/// 直线（无限长）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: EntityId,
    pub label: String,
    pub start: EntityId,
    pub end: EntityId,
}

impl Line {
    pub fn passes_through(&self, a: EntityId, b: EntityId) -> bool {
        (self.start == a && self.end == b) || (self.start == b && self.end == a)
    }
}

/// 实体枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    Point(Point),
    Segment(Segment),
    Circle(Circle),
    Line(Line),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Point(p) => p.id,
            Entity::Segment(s) => s.id,
            Entity::Circle(c) => c.id,
            Entity::Line(l) => l.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Entity::Point(p) => &p.label,
            Entity::Segment(s) => &s.label,
            Entity::Circle(c) => &c.label,
            Entity::Line(l) => &l.label,
        }
    }

    /// 获取实体的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Entity::Point(_) => "Point",
            Entity::Segment(_) => "Segment",
            Entity::Circle(_) => "Circle",
            Entity::Line(_) => "Line",
        }
    }

    /// 定义该实体的两个点（圆为圆心与经过点），点实体返回 `None`
    pub fn defining_points(&self) -> Option<(EntityId, EntityId)> {
        match self {
            Entity::Point(_) => None,
            Entity::Segment(s) => Some((s.start, s.end)),
            Entity::Circle(c) => Some((c.center, c.through)),
            Entity::Line(l) => Some((l.start, l.end)),
        }
    }

    /// 是否是直的（线段或直线）
    pub fn is_straight(&self) -> bool {
        matches!(self, Entity::Segment(_) | Entity::Line(_))
    }

    pub fn as_point(&self) -> Option<&Point> {
        match self {
            Entity::Point(p) => Some(p),
            _ => None,
        }
    }
}

/// 线段默认标签：单字母端点直接拼接（"AB"），否则用连字符分隔（"D@0-A"）
pub fn segment_label(a: &str, b: &str) -> String {
    if a.chars().count() == 1 && b.chars().count() == 1 {
        format!("{}{}", a, b)
    } else {
        format!("{}-{}", a, b)
    }
}

/// 圆默认标签
pub fn circle_label(center: &str, through: &str) -> String {
    format!("circle({},{})", center, through)
}

/// 直线默认标签
pub fn line_label(a: &str, b: &str) -> String {
    format!("line({},{})", a, b)
}
