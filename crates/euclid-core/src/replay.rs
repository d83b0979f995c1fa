//! 回放解释器
//!
//! 从给定元素开始，按顺序执行每个步骤。每一步都从上一步的状态
//! 产生一个新状态，任何一步失败都立即停止，并把失败前的状态
//! 连同错误一起返回，方便调用方查看。
//!
//! 同一个脚本在同样的输入下总是得到同样的实体、ID和事实。

use crate::entity::{Entity, EntityId, PointOrigin};
use crate::error::{ConstructionError, Result};
use crate::facts::{derive_def15_facts, FactStore};
use crate::intersection::{find_new_intersections, CandidatePool};
use crate::macros::{MacroInvocation, MacroRegistry};
use crate::math::Point2;
use crate::script::{GivenElement, IntersectionStep, Proposition, Step, StepKind};
use crate::selector::{resolve_point, resolve_selector, select_candidate, Disambiguation};
use crate::state::ConstructionState;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// 回放选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    /// 求交时把线段视为无限长
    pub extended: bool,
    /// 记录每一步之后的状态
    pub record_snapshots: bool,
}

/// 单步记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub kind: StepKind,
    /// 本步新建的实体（重画已有图形时为空）
    pub created: Vec<EntityId>,
}

/// 回放结果
#[derive(Debug, Clone)]
pub struct Replay {
    pub state: ConstructionState,
    pub facts: FactStore,
    /// 结束时仍未使用的交点候选
    pub candidates: CandidatePool,
    pub trace: Vec<StepRecord>,
    /// 开启 `record_snapshots` 时：给定元素之后的状态，以及每一步之后的状态
    pub snapshots: Vec<ConstructionState>,
}

/// 回放失败
#[derive(Debug, Clone, Error)]
#[error("{} failed: {error}", describe_step(.step, .kind))]
pub struct StepFailure {
    /// 失败的步骤序号；`None` 表示给定元素本身有误
    pub step: Option<usize>,
    pub kind: Option<StepKind>,
    #[source]
    pub error: ConstructionError,
    /// 失败前的状态
    pub state: ConstructionState,
    pub facts: FactStore,
}

fn describe_step(step: &Option<usize>, kind: &Option<StepKind>) -> String {
    match (step, kind) {
        (Some(index), Some(kind)) => format!("Step {} ({})", index, kind),
        (Some(index), None) => format!("Step {}", index),
        (None, _) => "Given elements".to_string(),
    }
}

/// 由给定元素构造初始状态
///
/// 给定线段之间的交点同样进入候选池。
pub fn seed_state(
    given: &[GivenElement],
    extended: bool,
) -> Result<(ConstructionState, CandidatePool)> {
    let mut state = ConstructionState::new();
    let mut candidates = CandidatePool::new();
    for element in given {
        match element {
            GivenElement::Point { label, x, y } => {
                state = state
                    .add_point(label.as_str(), Point2::new(*x, *y), PointOrigin::Given)?
                    .0;
            }
            GivenElement::Segment { from, to } => {
                let a = resolve_point(from, &state)?;
                let b = resolve_point(to, &state)?;
                let (next, id) = state.add_segment(a, b, None)?;
                candidates = find_new_intersections(&next, id, &candidates, extended)?;
                state = next;
            }
        }
    }
    Ok((state, candidates))
}

/// 一步执行前后携带的全部数据
#[derive(Debug, Clone)]
struct Cursor {
    state: ConstructionState,
    candidates: CandidatePool,
    facts: FactStore,
}

/// 回放解释器
#[derive(Debug, Clone, Copy)]
pub struct Interpreter<'r> {
    registry: &'r MacroRegistry,
    options: ReplayOptions,
}

impl<'r> Interpreter<'r> {
    pub fn new(registry: &'r MacroRegistry) -> Self {
        Self {
            registry,
            options: ReplayOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReplayOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// 回放一个命题
    pub fn replay(&self, proposition: &Proposition) -> std::result::Result<Replay, StepFailure> {
        info!(
            "Replaying I.{} ({} given, {} steps)",
            proposition.number,
            proposition.given.len(),
            proposition.steps.len()
        );

        let (state, candidates) =
            seed_state(&proposition.given, self.options.extended).map_err(|error| {
                warn!("I.{} given elements rejected: {}", proposition.number, error);
                StepFailure {
                    step: None,
                    kind: None,
                    error,
                    state: ConstructionState::new(),
                    facts: FactStore::new(),
                }
            })?;

        let replay = self.run(state, candidates, FactStore::new(), &proposition.steps)?;
        info!(
            "I.{} replayed: {} points, {} facts",
            proposition.number,
            replay.state.point_count(),
            replay.facts.len()
        );
        Ok(replay)
    }

    /// 从给定状态开始执行一串步骤
    pub fn run(
        &self,
        state: ConstructionState,
        candidates: CandidatePool,
        facts: FactStore,
        steps: &[Step],
    ) -> std::result::Result<Replay, StepFailure> {
        let mut snapshots = Vec::new();
        if self.options.record_snapshots {
            snapshots.push(state.clone());
        }
        let mut cursor = Cursor {
            state,
            candidates,
            facts,
        };
        let mut trace = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            debug!("Step {}: {}", index, step.kind());
            match self.apply(&cursor, index, step) {
                Ok((next, created)) => {
                    cursor = next;
                    trace.push(StepRecord {
                        index,
                        kind: step.kind(),
                        created,
                    });
                    if self.options.record_snapshots {
                        snapshots.push(cursor.state.clone());
                    }
                }
                Err(error) => {
                    warn!("Step {} ({}) failed: {}", index, step.kind(), error);
                    return Err(StepFailure {
                        step: Some(index),
                        kind: Some(step.kind()),
                        error,
                        state: cursor.state,
                        facts: cursor.facts,
                    });
                }
            }
        }

        Ok(Replay {
            state: cursor.state,
            facts: cursor.facts,
            candidates: cursor.candidates,
            trace,
            snapshots,
        })
    }

    fn apply(&self, cursor: &Cursor, index: usize, step: &Step) -> Result<(Cursor, Vec<EntityId>)> {
        match step {
            Step::Compass {
                center,
                through,
                label,
            } => {
                let center = resolve_point(center, &cursor.state)?;
                let through = resolve_point(through, &cursor.state)?;
                if cursor.state.circle_with(center, through).is_some() {
                    return Ok((cursor.clone(), vec![]));
                }
                let (state, id) = cursor.state.add_circle(center, through, label.as_deref())?;
                self.with_new_entity(cursor, state, id)
            }
            Step::Straightedge { from, to, label } => {
                let a = resolve_point(from, &cursor.state)?;
                let b = resolve_point(to, &cursor.state)?;
                if cursor.state.segment_between(a, b).is_some() {
                    return Ok((cursor.clone(), vec![]));
                }
                let (state, id) = cursor.state.add_segment(a, b, label.as_deref())?;
                self.with_new_entity(cursor, state, id)
            }
            Step::Extend { segment, label } => {
                let id = resolve_selector(segment, &cursor.state)?;
                let (start, end) = match cursor.state.require(id)? {
                    Entity::Segment(s) => (s.start, s.end),
                    Entity::Line(_) => return Ok((cursor.clone(), vec![])),
                    other => {
                        return Err(ConstructionError::DegenerateGeometry(format!(
                            "{} {} cannot be extended",
                            other.type_name(),
                            other.label()
                        )))
                    }
                };
                if cursor.state.line_through(start, end).is_some() {
                    return Ok((cursor.clone(), vec![]));
                }
                let (state, id) = cursor.state.add_line(start, end, label.as_deref())?;
                self.with_new_entity(cursor, state, id)
            }
            Step::Intersection(step) => self.intersection(cursor, index, step),
            Step::Macro {
                number,
                inputs,
                outputs,
            } => {
                let inputs = inputs
                    .iter()
                    .map(|label| resolve_point(label, &cursor.state))
                    .collect::<Result<Vec<_>>>()?;
                let mut facts = cursor.facts.clone();
                let outcome = self.registry.execute(
                    *number,
                    MacroInvocation {
                        state: &cursor.state,
                        inputs: &inputs,
                        candidates: &cursor.candidates,
                        facts: &mut facts,
                        step: index,
                        extended: self.options.extended,
                        outputs: outputs.as_deref(),
                    },
                )?;
                Ok((
                    Cursor {
                        state: outcome.state,
                        candidates: outcome.candidates,
                        facts,
                    },
                    outcome.created,
                ))
            }
        }
    }

    /// 新实体加入后求交，候选追加到池中
    fn with_new_entity(
        &self,
        cursor: &Cursor,
        state: ConstructionState,
        id: EntityId,
    ) -> Result<(Cursor, Vec<EntityId>)> {
        let candidates =
            find_new_intersections(&state, id, &cursor.candidates, self.options.extended)?;
        Ok((
            Cursor {
                state,
                candidates,
                facts: cursor.facts.clone(),
            },
            vec![id],
        ))
    }

    fn intersection(
        &self,
        cursor: &Cursor,
        index: usize,
        step: &IntersectionStep,
    ) -> Result<(Cursor, Vec<EntityId>)> {
        let state = &cursor.state;
        let a = resolve_selector(&step.a, state)?;
        let b = resolve_selector(&step.b, state)?;

        let rules = Disambiguation {
            beyond: step
                .beyond
                .as_deref()
                .map(|label| resolve_point(label, state))
                .transpose()?,
            reference: match &step.reference {
                Some((r, s)) => Some((resolve_point(r, state)?, resolve_point(s, state)?)),
                None => None,
            },
            side: step.side,
        };

        let chosen = select_candidate(state, &cursor.candidates, a, b, &rules)?;
        let (next, id) =
            state.add_point(step.label.as_str(), chosen.position, PointOrigin::Intersection)?;

        let mut facts = cursor.facts.clone();
        derive_def15_facts(&chosen, id, &next, &mut facts, index)?;

        Ok((
            Cursor {
                state: next,
                candidates: cursor.candidates.discard_at(&chosen.position),
                facts,
            },
            vec![id],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Selector;

    fn triangle() -> Proposition {
        Proposition {
            number: 1,
            title: "equilateral".into(),
            given: vec![
                GivenElement::point("A", 0.0, 0.0),
                GivenElement::point("B", 1.0, 0.0),
                GivenElement::segment("A", "B"),
            ],
            steps: vec![
                Step::compass("A", "B"),
                Step::compass("B", "A"),
                Step::intersection(Selector::circle("A", "B"), Selector::circle("B", "A"), "C")
                    .into(),
                Step::straightedge("C", "A"),
                Step::straightedge("C", "B"),
            ],
            outputs: vec!["C".into()],
        }
    }

    #[test]
    fn test_seed_state() {
        let (state, candidates) = seed_state(&triangle().given, false).unwrap();
        assert!(candidates.is_empty());
        assert_eq!(state.point_count(), 2);
        assert_eq!(state.segment_count(), 1);
        assert!(state.by_label("AB").is_some());
    }

    #[test]
    fn test_seed_rejects_unknown_endpoint() {
        let err = seed_state(&[GivenElement::segment("A", "B")], false).unwrap_err();
        assert!(matches!(err, ConstructionError::UnknownReference(_)));
    }

    #[test]
    fn test_trace_and_snapshots() {
        let registry = MacroRegistry::new();
        let replay = Interpreter::new(&registry)
            .with_options(ReplayOptions {
                extended: false,
                record_snapshots: true,
            })
            .replay(&triangle())
            .unwrap();

        assert_eq!(replay.trace.len(), 5);
        assert_eq!(replay.trace[2].kind, StepKind::Intersection);
        assert_eq!(replay.trace[2].created, vec![replay.state.by_label("C").unwrap()]);
        assert_eq!(replay.snapshots.len(), 6);
        assert_eq!(replay.snapshots[0].len(), 3);
        assert_eq!(replay.snapshots.last(), Some(&replay.state));
    }

    #[test]
    fn test_redraw_is_noop() {
        let registry = MacroRegistry::new();
        let mut prop = triangle();
        prop.steps.push(Step::compass("A", "B"));
        prop.steps.push(Step::straightedge("B", "A"));

        let replay = Interpreter::new(&registry).replay(&prop).unwrap();
        assert_eq!(replay.state.circle_count(), 2);
        assert_eq!(replay.state.segment_count(), 3);
        assert!(replay.trace[5].created.is_empty());
        assert!(replay.trace[6].created.is_empty());
    }

    #[test]
    fn test_failure_keeps_prior_state() {
        let registry = MacroRegistry::new();
        let mut prop = triangle();
        prop.steps.insert(3, Step::straightedge("C", "Z"));

        let failure = Interpreter::new(&registry).replay(&prop).unwrap_err();
        assert_eq!(failure.step, Some(3));
        assert_eq!(failure.kind, Some(StepKind::Straightedge));
        assert!(matches!(failure.error, ConstructionError::UnknownReference(_)));
        assert!(failure.state.by_label("C").is_some());
        assert_eq!(failure.state.segment_count(), 1);
        assert_eq!(failure.facts.len(), 2);
        assert!(failure.to_string().starts_with("Step 3 (straightedge) failed"));
    }

    #[test]
    fn test_duplicate_label_fails() {
        let registry = MacroRegistry::new();
        let mut prop = triangle();
        prop.steps[2] = Step::intersection(Selector::circle("A", "B"), Selector::circle("B", "A"), "A").into();

        let failure = Interpreter::new(&registry).replay(&prop).unwrap_err();
        assert_eq!(failure.step, Some(2));
        assert_eq!(failure.error, ConstructionError::DuplicateLabel("A".into()));
    }

    #[test]
    fn test_extend_adds_line_and_intersects() {
        let registry = MacroRegistry::new();
        let prop = Proposition {
            number: 99,
            title: String::new(),
            given: vec![
                GivenElement::point("A", 0.0, 0.0),
                GivenElement::point("B", 1.0, 0.0),
                GivenElement::point("P", 3.0, -1.0),
                GivenElement::point("Q", 3.0, 1.0),
                GivenElement::segment("A", "B"),
                GivenElement::segment("P", "Q"),
            ],
            steps: vec![
                Step::extend(Selector::segment("A", "B")),
                Step::intersection(Selector::line("A", "B"), Selector::segment("P", "Q"), "X")
                    .into(),
            ],
            outputs: vec![],
        };

        let replay = Interpreter::new(&registry).replay(&prop).unwrap();
        assert_eq!(replay.state.line_count(), 1);
        let x = replay.state.position(replay.state.by_label("X").unwrap()).unwrap();
        assert!((x.x - 3.0).abs() < 1e-9);
        assert!(x.y.abs() < 1e-9);
        // 直线交点不产生定义15事实
        assert!(replay.facts.is_empty());
    }

    #[test]
    fn test_extend_circle_is_rejected() {
        let registry = MacroRegistry::new();
        let mut prop = triangle();
        prop.steps.push(Step::extend(Selector::circle("A", "B")));
        let failure = Interpreter::new(&registry).replay(&prop).unwrap_err();
        assert_eq!(failure.step, Some(5));
        assert!(matches!(failure.error, ConstructionError::DegenerateGeometry(_)));
    }
}
