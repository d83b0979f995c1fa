//! 宏注册表
//!
//! 每个宏对应一个先前的命题，可以作为单个步骤调用。
//! 注册表是"编号 -> 执行函数"的表，所有执行函数遵循同一签名，
//! 不使用继承层次。
//!
//! 基于脚本的宏在一个临时状态上回放命题：
//! 调用方提供的输入点替换命题自己的给定点，回放结束后把所有新实体
//! 和事实拼接回调用方：
//! - 产出点改名为调用方指定的标签，其他新点命名为 `标签@步骤`
//! - 线段/圆/直线按调用方的端点标签重新命名，结构相同的已有实体直接复用
//! - 每个拼接进来的实体都与调用方状态求交，候选追加到调用方的候选池
//! - 事实映射到调用方ID，来源改为调用步骤和宏编号

use crate::entity::{Entity, EntityId, PointOrigin};
use crate::error::{ConstructionError, Result};
use crate::facts::{FactStore, Provenance};
use crate::intersection::{find_new_intersections, CandidatePool};
use crate::propositions;
use crate::replay::{seed_state, Interpreter, ReplayOptions};
use crate::script::{GivenElement, Proposition, Step};
use crate::state::ConstructionState;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// 一次宏调用的参数
pub struct MacroInvocation<'a> {
    /// 调用方当前状态
    pub state: &'a ConstructionState,
    /// 输入点（按宏的给定点顺序）
    pub inputs: &'a [EntityId],
    /// 调用方候选池
    pub candidates: &'a CandidatePool,
    /// 调用方事实库，宏推导的事实直接追加进去
    pub facts: &'a mut FactStore,
    /// 调用方的步骤序号
    pub step: usize,
    pub extended: bool,
    /// 产出点改名
    pub outputs: Option<&'a [String]>,
}

/// 宏调用结果
#[derive(Debug, Clone)]
pub struct MacroOutcome {
    pub state: ConstructionState,
    pub candidates: CandidatePool,
    /// 新建的实体（调用方ID，按创建顺序）
    pub created: Vec<EntityId>,
    /// 产出点（调用方ID）
    pub outputs: Vec<EntityId>,
}

/// 宏执行函数
pub type MacroFn =
    Box<dyn Fn(&MacroRegistry, MacroInvocation<'_>) -> Result<MacroOutcome> + Send + Sync>;

/// 注册表条目
pub struct MacroEntry {
    pub number: u32,
    pub title: String,
    /// 输入点数
    pub arity: usize,
    /// 默认产出标签
    pub outputs: Vec<String>,
    execute: MacroFn,
}

impl MacroEntry {
    pub fn new(
        number: u32,
        title: impl Into<String>,
        arity: usize,
        outputs: Vec<String>,
        execute: MacroFn,
    ) -> Self {
        Self {
            number,
            title: title.into(),
            arity,
            outputs,
            execute,
        }
    }

    /// 由命题脚本构造条目
    pub fn from_script(proposition: Proposition) -> Self {
        let number = proposition.number;
        let title = proposition.title.clone();
        let arity = proposition.arity();
        let outputs = proposition.outputs.clone();
        Self::new(
            number,
            title,
            arity,
            outputs,
            Box::new(move |registry, invocation| replay_script(&proposition, registry, invocation)),
        )
    }
}

impl fmt::Debug for MacroEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroEntry")
            .field("number", &self.number)
            .field("title", &self.title)
            .field("arity", &self.arity)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// 宏注册表
///
/// 回放期间只读，可在多个线程间共享。
#[derive(Debug, Default)]
pub struct MacroRegistry {
    entries: BTreeMap<u32, MacroEntry>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置第一卷命题1-3
    ///
    /// 内置脚本只调用编号更小的命题，直接注册，不经过 [`Self::register_script`] 的检查。
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for proposition in propositions::builtin() {
            registry.register(MacroEntry::from_script(proposition));
        }
        registry
    }

    /// 注册条目，返回被替换的旧条目
    pub fn register(&mut self, entry: MacroEntry) -> Option<MacroEntry> {
        self.entries.insert(entry.number, entry)
    }

    /// 注册命题脚本
    ///
    /// 脚本只能调用编号更小的命题，从而排除递归。
    pub fn register_script(&mut self, proposition: Proposition) -> Result<Option<MacroEntry>> {
        for step in &proposition.steps {
            if let Step::Macro { number, .. } = step {
                if *number >= proposition.number {
                    return Err(ConstructionError::UnknownReference(format!(
                        "I.{} may only invoke earlier propositions, found I.{}",
                        proposition.number, number
                    )));
                }
            }
        }
        Ok(self.register(MacroEntry::from_script(proposition)))
    }

    pub fn get(&self, number: u32) -> Option<&MacroEntry> {
        self.entries.get(&number)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.entries.contains_key(&number)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 执行宏
    ///
    /// 输入点数或产出标签数不符时报 `MacroArityMismatch`，不做补齐或截断。
    pub fn execute(&self, number: u32, invocation: MacroInvocation<'_>) -> Result<MacroOutcome> {
        let entry = self
            .get(number)
            .ok_or_else(|| ConstructionError::UnknownReference(format!("macro I.{}", number)))?;

        if invocation.inputs.len() != entry.arity {
            return Err(ConstructionError::MacroArityMismatch {
                number,
                what: "input points",
                expected: entry.arity,
                actual: invocation.inputs.len(),
            });
        }
        if let Some(outputs) = invocation.outputs {
            if outputs.len() != entry.outputs.len() {
                return Err(ConstructionError::MacroArityMismatch {
                    number,
                    what: "output labels",
                    expected: entry.outputs.len(),
                    actual: outputs.len(),
                });
            }
        }

        debug!("Executing macro I.{} ({}) at step {}", number, entry.title, invocation.step);
        (entry.execute)(self, invocation)
    }
}

/// 在临时状态上回放命题脚本并拼接回调用方
fn replay_script(
    proposition: &Proposition,
    registry: &MacroRegistry,
    invocation: MacroInvocation<'_>,
) -> Result<MacroOutcome> {
    let MacroInvocation {
        state,
        inputs,
        candidates,
        facts,
        step,
        extended,
        outputs,
    } = invocation;
    let number = proposition.number;

    // 用调用方输入点的坐标替换给定点
    let mut given = proposition.given.clone();
    let mut input_ids = inputs.iter();
    for element in given.iter_mut() {
        if let GivenElement::Point { x, y, .. } = element {
            let id = input_ids
                .next()
                .ok_or_else(|| ConstructionError::MacroArityMismatch {
                    number,
                    what: "input points",
                    expected: proposition.arity(),
                    actual: inputs.len(),
                })?;
            let position = state.position(*id)?;
            *x = position.x;
            *y = position.y;
        }
    }
    let (scratch, scratch_pool) = seed_state(&given, extended)?;

    // 临时ID -> 调用方ID
    let mut map: BTreeMap<EntityId, EntityId> = BTreeMap::new();
    for (label, caller) in proposition.given_points().zip(inputs) {
        if let Some(id) = scratch.by_label(label) {
            map.insert(id, *caller);
        }
    }
    let seeded: BTreeSet<EntityId> = scratch.entities().map(Entity::id).collect();

    let interpreter = Interpreter::new(registry).with_options(ReplayOptions {
        extended,
        record_snapshots: false,
    });
    let sub = interpreter
        .run(scratch, scratch_pool, FactStore::new(), &proposition.steps)
        .map_err(|failure| {
            warn!("Macro I.{} failed internally: {}", number, failure);
            failure.error
        })?;

    let renamed: &[String] = outputs.unwrap_or(proposition.outputs.as_slice());

    let mut next = state.clone();
    let mut pool = candidates.clone();
    let mut created = Vec::new();

    for entity in sub.state.entities() {
        if seeded.contains(&entity.id()) {
            continue;
        }

        let lookup = |id: EntityId| {
            map.get(&id).copied().ok_or_else(|| {
                ConstructionError::UnknownReference(format!("macro I.{} entity {}", number, id))
            })
        };

        let id = match entity {
            Entity::Point(p) => {
                let label = match proposition.outputs.iter().position(|o| *o == p.label) {
                    Some(i) => renamed.get(i).cloned().unwrap_or_else(|| p.label.clone()),
                    None => format!("{}@{}", p.label, step),
                };
                let (s, id) = next.add_point(label, p.position, PointOrigin::MacroOutput)?;
                next = s;
                pool = pool.discard_at(&p.position);
                created.push(id);
                id
            }
            Entity::Segment(s) => {
                let (a, b) = (lookup(s.start)?, lookup(s.end)?);
                match next.segment_between(a, b) {
                    Some(existing) => existing,
                    None => {
                        let (s, id) = next.add_segment(a, b, None)?;
                        next = s;
                        pool = find_new_intersections(&next, id, &pool, extended)?;
                        created.push(id);
                        id
                    }
                }
            }
            Entity::Circle(c) => {
                let (center, through) = (lookup(c.center)?, lookup(c.through)?);
                match next.circle_with(center, through) {
                    Some(existing) => existing,
                    None => {
                        let (s, id) = next.add_circle(center, through, None)?;
                        next = s;
                        pool = find_new_intersections(&next, id, &pool, extended)?;
                        created.push(id);
                        id
                    }
                }
            }
            Entity::Line(l) => {
                let (a, b) = (lookup(l.start)?, lookup(l.end)?);
                match next.line_through(a, b) {
                    Some(existing) => existing,
                    None => {
                        let (s, id) = next.add_line(a, b, None)?;
                        next = s;
                        pool = find_new_intersections(&next, id, &pool, extended)?;
                        created.push(id);
                        id
                    }
                }
            }
        };
        map.insert(entity.id(), id);
    }

    for fact in sub.facts.iter() {
        let kind = fact
            .kind
            .remap(|id| map.get(&id).copied())
            .ok_or_else(|| {
                ConstructionError::UnknownReference(format!("macro I.{} fact {:?}", number, fact.kind))
            })?;
        facts.assert(
            kind,
            Provenance {
                step,
                rule: fact.provenance.rule,
                via_macro: Some(number),
            },
        );
    }

    let mut output_ids = Vec::with_capacity(proposition.outputs.len());
    for label in &proposition.outputs {
        let id = sub
            .state
            .by_label(label)
            .and_then(|id| map.get(&id).copied())
            .ok_or_else(|| {
                ConstructionError::UnknownReference(format!(
                    "macro I.{} did not produce {}",
                    number, label
                ))
            })?;
        output_ids.push(id);
    }

    debug!(
        "Macro I.{} spliced {} entities, {} facts",
        number,
        created.len(),
        sub.facts.len()
    );

    Ok(MacroOutcome {
        state: next,
        candidates: pool,
        created,
        outputs: output_ids,
    })
}
