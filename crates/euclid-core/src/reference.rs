//! 参考构造
//!
//! 用直接的解析公式给出命题 1-3 的最终图形和事实，不经过
//! 解释器、选择器和求交。标签、实体种类和事实来源与回放结果一一对应，
//! 用于一致性检验。

use crate::entity::{EntityId, PointOrigin};
use crate::error::Result;
use crate::facts::{FactKind, FactStore, Length, Provenance, Rule};
use crate::math::{Point2, Vector2};
use crate::script::{GivenElement, Proposition};
use crate::state::ConstructionState;

/// 参考图形
#[derive(Debug, Clone, Default)]
pub struct ReferenceFigure {
    pub state: ConstructionState,
    pub facts: FactStore,
}

/// 可比较的命题编号
pub const NUMBERS: [u32; 3] = [1, 2, 3];

/// 实体所处的层次：顶层步骤，或被拼接进调用方的某一步
#[derive(Debug, Clone, Copy)]
enum Frame {
    TopLevel,
    Spliced { step: usize, number: u32 },
}

impl Frame {
    fn step(self, own: usize) -> usize {
        match self {
            Frame::TopLevel => own,
            Frame::Spliced { step, .. } => step,
        }
    }

    fn via(self, own: Option<u32>) -> Option<u32> {
        match self {
            Frame::TopLevel => own,
            Frame::Spliced { number, .. } => Some(number),
        }
    }

    fn origin(self, own: PointOrigin) -> PointOrigin {
        match self {
            Frame::TopLevel => own,
            Frame::Spliced { .. } => PointOrigin::MacroOutput,
        }
    }

    /// 点在调用方中的名字：产出点用调用方标签，其余加 `@步骤`
    fn name(self, own: &str, output: Option<&str>) -> String {
        match (self, output) {
            (Frame::TopLevel, _) => own.to_string(),
            (Frame::Spliced { .. }, Some(renamed)) => renamed.to_string(),
            (Frame::Spliced { step, .. }, None) => format!("{}@{}", own, step),
        }
    }
}

impl ReferenceFigure {
    fn point(&mut self, label: &str, position: Point2, origin: PointOrigin) -> Result<EntityId> {
        let (state, id) = self.state.add_point(label, position, origin)?;
        self.state = state;
        Ok(id)
    }

    fn segment(&mut self, a: EntityId, b: EntityId) -> Result<EntityId> {
        let (state, id) = self.state.add_segment(a, b, None)?;
        self.state = state;
        Ok(id)
    }

    fn circle(&mut self, center: EntityId, through: EntityId) -> Result<EntityId> {
        let (state, id) = self.state.add_circle(center, through, None)?;
        self.state = state;
        Ok(id)
    }

    fn line(&mut self, a: EntityId, b: EntityId) -> Result<EntityId> {
        let (state, id) = self.state.add_line(a, b, None)?;
        self.state = state;
        Ok(id)
    }

    /// |center - on| = |center - through|
    fn radius_fact(
        &mut self,
        center: EntityId,
        on: EntityId,
        through: EntityId,
        step: usize,
        via_macro: Option<u32>,
    ) {
        self.facts.assert(
            FactKind::equal_length(Length::new(center, on), Length::new(center, through)),
            Provenance {
                step,
                rule: Rule::Definition15,
                via_macro,
            },
        );
    }
}

/// AB 左侧的等边三角形顶点
pub fn equilateral_apex(a: Point2, b: Point2) -> Point2 {
    let ab = b - a;
    let normal = Vector2::new(-ab.y, ab.x);
    nalgebra::center(&a, &b) + normal * (3f64.sqrt() / 2.0)
}

/// 从 from 出发沿 toward 方向量取 length
fn along(from: Point2, toward: Point2, length: f64) -> Point2 {
    from + (toward - from).normalize() * length
}

/// I.1 的作图部分（给定元素之外），顶层时对应步骤 0-4
fn equilateral(
    fig: &mut ReferenceFigure,
    a: EntityId,
    b: EntityId,
    apex: &str,
    frame: Frame,
) -> Result<EntityId> {
    let (pa, pb) = (fig.state.position(a)?, fig.state.position(b)?);
    fig.circle(a, b)?;
    fig.circle(b, a)?;
    let c = fig.point(
        apex,
        equilateral_apex(pa, pb),
        frame.origin(PointOrigin::Intersection),
    )?;
    fig.radius_fact(a, c, b, frame.step(2), frame.via(None));
    fig.radius_fact(b, c, a, frame.step(2), frame.via(None));
    fig.segment(c, a)?;
    fig.segment(c, b)?;
    Ok(c)
}

/// I.2 的作图部分，顶层时对应步骤 0-8
fn equal_line(
    fig: &mut ReferenceFigure,
    a: EntityId,
    b: EntityId,
    c: EntityId,
    output: Option<&str>,
    frame: Frame,
) -> Result<EntityId> {
    let (pa, pb, pc) = (
        fig.state.position(a)?,
        fig.state.position(b)?,
        fig.state.position(c)?,
    );

    fig.segment(a, b)?;

    // I.1 的事实归到调用它的步骤
    let nested = match frame {
        Frame::TopLevel => Frame::Spliced { step: 1, number: 1 },
        outer => outer,
    };
    let d = equilateral(fig, a, b, &frame.name("D", None), nested)?;
    let pd = fig.state.position(d)?;

    fig.line(d, a)?;
    fig.line(d, b)?;
    fig.circle(b, c)?;

    let pg = along(pb, pb + (pb - pd), (pc - pb).norm());
    let g = fig.point(
        &frame.name("G", None),
        pg,
        frame.origin(PointOrigin::Intersection),
    )?;
    fig.radius_fact(b, g, c, frame.step(5), frame.via(None));

    fig.circle(d, g)?;

    let pl = along(pd, pa, (pg - pd).norm());
    let l = fig.point(
        &frame.name("L", output),
        pl,
        frame.origin(PointOrigin::Intersection),
    )?;
    fig.radius_fact(d, l, g, frame.step(7), frame.via(None));

    fig.segment(a, l)?;
    Ok(l)
}

fn given(fig: &mut ReferenceFigure, points: &[(&str, Point2)]) -> Result<Vec<EntityId>> {
    points
        .iter()
        .map(|(label, p)| fig.point(label, *p, PointOrigin::Given))
        .collect()
}

/// I.1 参考图形
pub fn proposition_1(a: Point2, b: Point2) -> Result<ReferenceFigure> {
    let mut fig = ReferenceFigure::default();
    let ids = given(&mut fig, &[("A", a), ("B", b)])?;
    fig.segment(ids[0], ids[1])?;
    equilateral(&mut fig, ids[0], ids[1], "C", Frame::TopLevel)?;
    Ok(fig)
}

/// I.2 参考图形
pub fn proposition_2(a: Point2, b: Point2, c: Point2) -> Result<ReferenceFigure> {
    let mut fig = ReferenceFigure::default();
    let ids = given(&mut fig, &[("A", a), ("B", b), ("C", c)])?;
    fig.segment(ids[1], ids[2])?;
    equal_line(&mut fig, ids[0], ids[1], ids[2], None, Frame::TopLevel)?;
    Ok(fig)
}

/// I.3 参考图形
pub fn proposition_3(a: Point2, b: Point2, c: Point2, d: Point2) -> Result<ReferenceFigure> {
    let mut fig = ReferenceFigure::default();
    let ids = given(&mut fig, &[("A", a), ("B", b), ("C", c), ("D", d)])?;
    let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
    fig.segment(a, b)?;
    fig.segment(c, d)?;

    let e = equal_line(
        &mut fig,
        a,
        c,
        d,
        Some("E"),
        Frame::Spliced { step: 0, number: 2 },
    )?;
    fig.circle(a, e)?;

    let (pa, pb, pe) = (
        fig.state.position(a)?,
        fig.state.position(b)?,
        fig.state.position(e)?,
    );
    let f = fig.point("F", along(pa, pb, (pe - pa).norm()), PointOrigin::Intersection)?;
    fig.radius_fact(a, f, e, 2, None);
    Ok(fig)
}

/// 按命题的给定坐标构造参考图形；没有参考构造时返回 `None`
pub fn for_proposition(proposition: &Proposition) -> Option<Result<ReferenceFigure>> {
    let points: Vec<Point2> = proposition
        .given
        .iter()
        .filter_map(|g| match g {
            GivenElement::Point { x, y, .. } => Some(Point2::new(*x, *y)),
            GivenElement::Segment { .. } => None,
        })
        .collect();

    match (proposition.number, points.as_slice()) {
        (1, [a, b]) => Some(proposition_1(*a, *b)),
        (2, [a, b, c]) => Some(proposition_2(*a, *b, *c)),
        (3, [a, b, c, d]) => Some(proposition_3(*a, *b, *c, *d)),
        _ => None,
    }
}
