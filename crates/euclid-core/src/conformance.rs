//! 一致性检验
//!
//! 按标签比较两个图形：实体种类和数量、点坐标（在 [`EPSILON`](crate::math::EPSILON) 内）、
//! 非点实体的端点，以及事实（按标签表示，连同来源）。
//! ID 不参与比较。

use crate::entity::Entity;
use crate::facts::{Fact, FactKind, FactStore};
use crate::math::points_coincide;
use crate::state::ConstructionState;
use std::collections::BTreeSet;
use std::fmt;

/// 检验报告
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConformanceReport {
    pub mismatches: Vec<String>,
}

impl ConformanceReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "conforming");
        }
        writeln!(f, "{} mismatch(es):", self.mismatches.len())?;
        for m in &self.mismatches {
            writeln!(f, "  - {}", m)?;
        }
        Ok(())
    }
}

/// 比较回放结果与参考图形
pub fn compare(
    actual: &ConstructionState,
    actual_facts: &FactStore,
    expected: &ConstructionState,
    expected_facts: &FactStore,
) -> ConformanceReport {
    let mut mismatches = Vec::new();

    let counts = |s: &ConstructionState| {
        (
            s.point_count(),
            s.segment_count(),
            s.circle_count(),
            s.line_count(),
        )
    };
    if counts(actual) != counts(expected) {
        mismatches.push(format!(
            "entity counts (points, segments, circles, lines) {:?} != {:?}",
            counts(actual),
            counts(expected)
        ));
    }

    for entity in expected.entities() {
        let label = entity.label();
        let Some(found) = actual.by_label(label).and_then(|id| actual.entity(id)) else {
            mismatches.push(format!("missing {} {}", entity.type_name(), label));
            continue;
        };

        match (entity, found) {
            (Entity::Point(e), Entity::Point(a)) => {
                if !points_coincide(&e.position, &a.position) {
                    mismatches.push(format!(
                        "point {} at ({:.9}, {:.9}), expected ({:.9}, {:.9})",
                        label, a.position.x, a.position.y, e.position.x, e.position.y
                    ));
                }
                if e.origin != a.origin {
                    mismatches.push(format!(
                        "point {} origin {:?}, expected {:?}",
                        label, a.origin, e.origin
                    ));
                }
            }
            (e, a) if e.type_name() == a.type_name() => {
                let ends = |state: &ConstructionState, entity: &Entity| {
                    entity.defining_points().map(|(p, q)| {
                        (
                            state.label_of(p).unwrap_or("?").to_string(),
                            state.label_of(q).unwrap_or("?").to_string(),
                        )
                    })
                };
                let (ea, aa) = (ends(expected, e), ends(actual, a));
                if ea != aa {
                    mismatches.push(format!(
                        "{} {} joins {:?}, expected {:?}",
                        e.type_name(),
                        label,
                        aa,
                        ea
                    ));
                }
            }
            (e, a) => mismatches.push(format!(
                "{} is a {}, expected a {}",
                label,
                a.type_name(),
                e.type_name()
            )),
        }
    }

    let expected_keys = fact_keys(expected, expected_facts);
    let actual_keys = fact_keys(actual, actual_facts);
    for missing in expected_keys.difference(&actual_keys) {
        mismatches.push(format!("missing fact {}", missing));
    }
    for extra in actual_keys.difference(&expected_keys) {
        mismatches.push(format!("unexpected fact {}", extra));
    }

    ConformanceReport { mismatches }
}

/// 事实的标签形式，与 ID 无关
pub fn describe_fact(state: &ConstructionState, fact: &Fact) -> String {
    let name = |id| state.label_of(id).unwrap_or("?").to_string();
    let length = |p, q| {
        let mut ends = [name(p), name(q)];
        ends.sort();
        format!("|{} {}|", ends[0], ends[1])
    };

    let mut claim = match fact.kind {
        FactKind::EqualLength(x, y) => {
            let mut sides = [length(x.0, x.1), length(y.0, y.1)];
            sides.sort();
            format!("{} = {}", sides[0], sides[1])
        }
    };
    claim.push_str(&format!(" [{} @ step {}", fact.provenance.rule, fact.provenance.step));
    if let Some(number) = fact.provenance.via_macro {
        claim.push_str(&format!(" via I.{}", number));
    }
    claim.push(']');
    claim
}

fn fact_keys(state: &ConstructionState, facts: &FactStore) -> BTreeSet<String> {
    facts.iter().map(|f| describe_fact(state, f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PointOrigin;
    use crate::facts::{Length, Provenance, Rule};
    use crate::math::Point2;

    fn two_points(bx: f64) -> ConstructionState {
        let s = ConstructionState::new();
        let (s, a) = s.add_point("A", Point2::new(0.0, 0.0), PointOrigin::Given).unwrap();
        let (s, b) = s.add_point("B", Point2::new(bx, 0.0), PointOrigin::Given).unwrap();
        s.add_segment(a, b, None).unwrap().0
    }

    #[test]
    fn test_identical_figures_conform() {
        let s = two_points(1.0);
        let report = compare(&s, &FactStore::new(), &s, &FactStore::new());
        assert!(report.is_ok(), "{}", report);
    }

    #[test]
    fn test_moved_point_is_reported() {
        let report = compare(
            &two_points(1.0 + 1e-6),
            &FactStore::new(),
            &two_points(1.0),
            &FactStore::new(),
        );
        assert_eq!(report.mismatches.len(), 1);
        assert!(report.mismatches[0].starts_with("point B"));
    }

    #[test]
    fn test_fact_description_ignores_ids() {
        let s = two_points(1.0);
        let (a, b) = (s.by_label("A").unwrap(), s.by_label("B").unwrap());
        let fact = Fact {
            kind: FactKind::equal_length(Length::new(b, a), Length::new(a, a)),
            provenance: Provenance {
                step: 3,
                rule: Rule::Definition15,
                via_macro: Some(1),
            },
        };
        assert_eq!(
            describe_fact(&s, &fact),
            "|A A| = |A B| [I. Def. 15 @ step 3 via I.1]"
        );
    }
}
