//! 命题脚本
//!
//! 一个命题由给定元素和有序的作图步骤组成，全部可序列化，
//! 由内容编写方提供，引擎只负责回放。

use crate::selector::{Selector, Side};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 给定元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GivenElement {
    Point { label: String, x: f64, y: f64 },
    Segment { from: String, to: String },
}

impl GivenElement {
    pub fn point(label: impl Into<String>, x: f64, y: f64) -> Self {
        GivenElement::Point {
            label: label.into(),
            x,
            y,
        }
    }

    pub fn segment(from: impl Into<String>, to: impl Into<String>) -> Self {
        GivenElement::Segment {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// 交点步骤
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionStep {
    pub a: Selector,
    pub b: Selector,
    /// 新点标签
    pub label: String,
    /// 越过点
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beyond: Option<String>,
    #[serde(default)]
    pub side: Side,
    /// 手性参考线段（两点标签）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<(String, String)>,
}

impl IntersectionStep {
    pub fn beyond(mut self, point: impl Into<String>) -> Self {
        self.beyond = Some(point.into());
        self
    }

    pub fn side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn reference(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.reference = Some((from.into(), to.into()));
        self
    }
}

/// 作图步骤
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// 以 center 为圆心、经过 through 画圆
    Compass {
        center: String,
        through: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// 连接两点
    Straightedge {
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// 求交并标记新点
    Intersection(IntersectionStep),
    /// 将线段延长为直线
    Extend {
        segment: Selector,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// 调用先前命题
    Macro {
        number: u32,
        inputs: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outputs: Option<Vec<String>>,
    },
}

impl Step {
    pub fn compass(center: impl Into<String>, through: impl Into<String>) -> Self {
        Step::Compass {
            center: center.into(),
            through: through.into(),
            label: None,
        }
    }

    pub fn straightedge(from: impl Into<String>, to: impl Into<String>) -> Self {
        Step::Straightedge {
            from: from.into(),
            to: to.into(),
            label: None,
        }
    }

    pub fn intersection(a: Selector, b: Selector, label: impl Into<String>) -> IntersectionStep {
        IntersectionStep {
            a,
            b,
            label: label.into(),
            beyond: None,
            side: Side::default(),
            reference: None,
        }
    }

    pub fn extend(segment: Selector) -> Self {
        Step::Extend {
            segment,
            label: None,
        }
    }

    pub fn invoke<I, O>(number: u32, inputs: I, outputs: O) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let outputs: Vec<String> = outputs.into_iter().map(Into::into).collect();
        Step::Macro {
            number,
            inputs: inputs.into_iter().map(Into::into).collect(),
            outputs: (!outputs.is_empty()).then_some(outputs),
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Step::Compass { .. } => StepKind::Compass,
            Step::Straightedge { .. } => StepKind::Straightedge,
            Step::Intersection(_) => StepKind::Intersection,
            Step::Extend { .. } => StepKind::Extend,
            Step::Macro { .. } => StepKind::Macro,
        }
    }
}

impl From<IntersectionStep> for Step {
    fn from(step: IntersectionStep) -> Self {
        Step::Intersection(step)
    }
}

/// 步骤类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Compass,
    Straightedge,
    Intersection,
    Extend,
    Macro,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Compass => "compass",
            StepKind::Straightedge => "straightedge",
            StepKind::Intersection => "intersection",
            StepKind::Extend => "extend",
            StepKind::Macro => "macro",
        };
        f.pad(name)
    }
}

/// 命题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposition {
    /// 第一卷中的命题编号，同时是宏编号
    pub number: u32,
    #[serde(default)]
    pub title: String,
    pub given: Vec<GivenElement>,
    pub steps: Vec<Step>,
    /// 作为宏调用时对外产出的点
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl Proposition {
    /// 给定点的标签（按顺序），即宏的输入
    pub fn given_points(&self) -> impl Iterator<Item = &str> {
        self.given.iter().filter_map(|g| match g {
            GivenElement::Point { label, .. } => Some(label.as_str()),
            GivenElement::Segment { .. } => None,
        })
    }

    /// 作为宏时需要的输入点数
    pub fn arity(&self) -> usize {
        self.given_points().count()
    }
}
