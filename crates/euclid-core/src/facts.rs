//! 事实库与推导
//!
//! 事实是带来源的相等断言。事实库只追加：同一断言重复出现时忽略，
//! 从不视为矛盾。每条事实记录产生它的步骤序号，供证明讲解追溯
//! "为什么这两个量相等"。
//!
//! 目前的推导规则：
//! - 定义15：圆上各点到圆心距离相等（等于半径）

use crate::entity::{Entity, EntityId};
use crate::error::{ConstructionError, Result};
use crate::intersection::IntersectionCandidate;
use crate::state::ConstructionState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// 两点间的距离（无向，端点按ID排序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Length(pub EntityId, pub EntityId);

impl Length {
    pub fn new(a: EntityId, b: EntityId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn map(self, f: impl Fn(EntityId) -> Option<EntityId>) -> Option<Self> {
        Some(Self::new(f(self.0)?, f(self.1)?))
    }
}

/// 断言类型
///
/// 保持开放：新增推导规则（对顶角、边角边全等等）只需增加变体。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    /// 两段距离相等
    EqualLength(Length, Length),
}

impl FactKind {
    pub fn equal_length(a: Length, b: Length) -> Self {
        FactKind::EqualLength(a, b).normalize()
    }

    /// 规范化，便于去重
    pub fn normalize(self) -> Self {
        match self {
            FactKind::EqualLength(a, b) => {
                let (a, b) = (Length::new(a.0, a.1), Length::new(b.0, b.1));
                if a <= b {
                    FactKind::EqualLength(a, b)
                } else {
                    FactKind::EqualLength(b, a)
                }
            }
        }
    }

    /// 将其中的点ID映射到另一状态
    pub fn remap(&self, f: impl Fn(EntityId) -> Option<EntityId>) -> Option<Self> {
        match self {
            FactKind::EqualLength(a, b) => Some(Self::equal_length(a.map(&f)?, b.map(&f)?)),
        }
    }
}

/// 推导规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// 《几何原本》第一卷定义15：圆周上所有点到圆心的距离相等
    Definition15,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Definition15 => write!(f, "I. Def. 15"),
        }
    }
}

/// 来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// 产生事实的步骤序号
    pub step: usize,
    pub rule: Rule,
    /// 经由哪个宏（命题编号）拼接而来
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_macro: Option<u32>,
}

/// 事实
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub kind: FactKind,
    pub provenance: Provenance,
}

/// 只追加的事实库
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Fact>", into = "Vec<Fact>")]
pub struct FactStore {
    facts: Vec<Fact>,
    seen: HashSet<FactKind>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 断言一条事实；已存在时忽略并返回 `false`
    pub fn assert(&mut self, kind: FactKind, provenance: Provenance) -> bool {
        let kind = kind.normalize();
        if !self.seen.insert(kind.clone()) {
            return false;
        }
        self.facts.push(Fact { kind, provenance });
        true
    }

    pub fn contains(&self, kind: &FactKind) -> bool {
        self.seen.contains(&kind.clone().normalize())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// 某一步产生的事实
    pub fn facts_for_step(&self, step: usize) -> impl Iterator<Item = &Fact> {
        self.facts.iter().filter(move |f| f.provenance.step == step)
    }

    /// 两段距离是否（传递地）相等
    ///
    /// 公理1：等于同量的量彼此相等。只做查询，不新增事实。
    pub fn lengths_equal(&self, a: Length, b: Length) -> bool {
        let (a, b) = (Length::new(a.0, a.1), Length::new(b.0, b.1));
        if a == b {
            return true;
        }

        let mut edges: BTreeMap<Length, Vec<Length>> = BTreeMap::new();
        for fact in &self.facts {
            match fact.kind {
                FactKind::EqualLength(x, y) => {
                    edges.entry(x).or_default().push(y);
                    edges.entry(y).or_default().push(x);
                }
            }
        }

        let mut visited = BTreeSet::from([a]);
        let mut stack = vec![a];
        while let Some(current) = stack.pop() {
            for next in edges.get(&current).into_iter().flatten() {
                if *next == b {
                    return true;
                }
                if visited.insert(*next) {
                    stack.push(*next);
                }
            }
        }
        false
    }
}

impl From<Vec<Fact>> for FactStore {
    fn from(facts: Vec<Fact>) -> Self {
        let mut store = FactStore::new();
        for fact in facts {
            store.assert(fact.kind, fact.provenance);
        }
        store
    }
}

impl From<FactStore> for Vec<Fact> {
    fn from(store: FactStore) -> Self {
        store.facts
    }
}

/// 定义15推导
///
/// 候选由圆参与产生并被提升为 `new_point` 时，对每个父圆断言
/// |圆心 - 新点| = |圆心 - 经过点|。返回新增事实数。
pub fn derive_def15_facts(
    candidate: &IntersectionCandidate,
    new_point: EntityId,
    state: &ConstructionState,
    facts: &mut FactStore,
    step: usize,
) -> Result<usize> {
    state.point(new_point)?;

    let mut added = 0;
    for parent in [candidate.parents.0, candidate.parents.1] {
        let entity = state.entity(parent).ok_or_else(|| {
            ConstructionError::UnknownReference(format!("candidate parent {}", parent))
        })?;
        if let Entity::Circle(circle) = entity {
            let kind = FactKind::equal_length(
                Length::new(circle.center, new_point),
                Length::new(circle.center, circle.through),
            );
            let provenance = Provenance {
                step,
                rule: Rule::Definition15,
                via_macro: None,
            };
            if facts.assert(kind, provenance) {
                added += 1;
            }
        }
    }
    Ok(added)
}
