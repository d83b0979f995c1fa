//! 回放场景测试：内置命题、一致性、事实、失败路径

use euclid_core::prelude::*;
use euclid_core::reference;

fn replay(proposition: &Proposition) -> Replay {
    let registry = MacroRegistry::with_builtins();
    Interpreter::new(&registry)
        .replay(proposition)
        .unwrap_or_else(|failure| panic!("I.{} failed: {}", proposition.number, failure))
}

fn position(replay: &Replay, label: &str) -> Point2 {
    let id = replay.state.by_label(label).unwrap();
    replay.state.position(id).unwrap()
}

fn distance(replay: &Replay, a: &str, b: &str) -> f64 {
    (position(replay, a) - position(replay, b)).norm()
}

#[test]
fn test_equilateral_triangle() {
    let result = replay(&propositions::proposition_1());
    let state = &result.state;

    // 只新增一个点 C，位于 AB 上方
    assert_eq!(state.point_count(), 3);
    let c = position(&result, "C");
    assert!((c.x - 0.5).abs() < 1e-9);
    assert!((c.y - 3f64.sqrt() / 2.0).abs() < 1e-9);
    assert_eq!(
        state.point(state.by_label("C").unwrap()).unwrap().origin,
        PointOrigin::Intersection
    );

    // 给定线段之外恰好两条新线段
    assert_eq!(state.segment_count(), 3);
    assert!(state.by_label("CA").is_some());
    assert!(state.by_label("CB").is_some());

    assert!((distance(&result, "A", "C") - 1.0).abs() < 1e-9);
    assert!((distance(&result, "B", "C") - 1.0).abs() < 1e-9);
}

#[test]
fn test_equilateral_facts() {
    let result = replay(&propositions::proposition_1());
    let id = |l: &str| result.state.by_label(l).unwrap();
    let (a, b, c) = (id("A"), id("B"), id("C"));

    assert_eq!(result.facts.len(), 2);
    assert!(result.facts.contains(&FactKind::equal_length(
        Length::new(a, c),
        Length::new(a, b)
    )));
    assert!(result.facts.contains(&FactKind::equal_length(
        Length::new(b, c),
        Length::new(b, a)
    )));
    assert!(result.facts.iter().all(|f| f.provenance.step == 2));

    // 三边两两相等
    assert!(result
        .facts
        .lengths_equal(Length::new(c, a), Length::new(c, b)));
}

#[test]
fn test_builtins_match_reference() {
    for proposition in propositions::builtin() {
        let result = replay(&proposition);
        let expected = reference::for_proposition(&proposition)
            .expect("reference exists")
            .expect("reference builds");
        let report = compare(&result.state, &result.facts, &expected.state, &expected.facts);
        assert!(report.is_ok(), "I.{}: {}", proposition.number, report);
    }
}

#[test]
fn test_facts_hold_numerically() {
    for proposition in propositions::builtin() {
        let result = replay(&proposition);
        for fact in result.facts.iter() {
            let (x, y) = match fact.kind {
                FactKind::EqualLength(x, y) => (x, y),
            };
            let dx = result.state.distance(x.0, x.1).unwrap();
            let dy = result.state.distance(y.0, y.1).unwrap();
            assert!((dx - dy).abs() < 1e-9, "I.{}: {:?}", proposition.number, fact);
        }
    }
}

#[test]
fn test_proposition_2_places_line() {
    let result = replay(&propositions::proposition_2());
    assert!((distance(&result, "A", "L") - distance(&result, "B", "C")).abs() < 1e-9);

    let state = &result.state;
    assert_eq!(state.point_count(), 6);
    assert_eq!(state.segment_count(), 5);
    assert_eq!(state.circle_count(), 4);
    assert_eq!(state.line_count(), 2);

    // I.1 的产出改名为 D
    let d = state.point(state.by_label("D").unwrap()).unwrap();
    assert_eq!(d.origin, PointOrigin::MacroOutput);
    let via: Vec<_> = result
        .facts
        .iter()
        .filter(|f| f.provenance.via_macro == Some(1))
        .collect();
    assert_eq!(via.len(), 2);
    assert!(via.iter().all(|f| f.provenance.step == 1));
}

#[test]
fn test_proposition_3_cuts_off() {
    let result = replay(&propositions::proposition_3());
    let f = position(&result, "F");
    assert!(f.y.abs() < 1e-9);
    assert!(f.x > 0.0 && f.x < 4.0);
    assert!((distance(&result, "A", "F") - distance(&result, "C", "D")).abs() < 1e-9);

    // 宏内部的点带调用步骤后缀
    assert!(result.state.by_label("D@0").is_some());
    assert!(result.state.by_label("G@0").is_some());
    assert!(result.state.by_label("E").is_some());
    assert!(result.state.by_label("L").is_none());
}

#[test]
fn test_replay_is_deterministic() {
    for proposition in propositions::builtin() {
        let first = replay(&proposition);
        let second = replay(&proposition);
        assert_eq!(first.state, second.state);
        assert_eq!(first.facts, second.facts);
        assert_eq!(first.trace, second.trace);
    }
}

#[test]
fn test_chirality_options() {
    let mut right = propositions::proposition_1();
    right.steps[2] =
        Step::intersection(Selector::circle("A", "B"), Selector::circle("B", "A"), "C")
            .side(Side::Right)
            .into();
    assert!(position(&replay(&right), "C").y < 0.0);

    let mut reversed = propositions::proposition_1();
    reversed.steps[2] =
        Step::intersection(Selector::circle("A", "B"), Selector::circle("B", "A"), "C")
            .reference("B", "A")
            .into();
    assert!(position(&replay(&reversed), "C").y < 0.0);
}

#[test]
fn test_macro_arity_mismatch_stops_replay() {
    let mut proposition = propositions::proposition_2();
    proposition.steps[1] = Step::invoke(1, ["A", "B", "C"], ["D"]);

    let registry = MacroRegistry::with_builtins();
    let failure = Interpreter::new(&registry).replay(&proposition).unwrap_err();
    assert_eq!(failure.step, Some(1));
    assert_eq!(
        failure.error,
        ConstructionError::MacroArityMismatch {
            number: 1,
            what: "input points",
            expected: 2,
            actual: 3
        }
    );
    // 失败前的状态：给定元素加上第 0 步的线段
    assert_eq!(failure.state.segment_count(), 2);
    assert!(failure.state.by_label("D").is_none());
}

#[test]
fn test_macro_output_label_mismatch() {
    let mut proposition = propositions::proposition_2();
    proposition.steps[1] = Step::invoke(1, ["A", "B"], ["D", "X"]);

    let registry = MacroRegistry::with_builtins();
    let failure = Interpreter::new(&registry).replay(&proposition).unwrap_err();
    assert!(matches!(
        failure.error,
        ConstructionError::MacroArityMismatch {
            what: "output labels",
            expected: 1,
            actual: 2,
            ..
        }
    ));
}

#[test]
fn test_beyond_filter_can_leave_nothing() {
    let mut proposition = propositions::proposition_2();
    // 圆 (B,C) 比 BD 短，两个交点都不会沿 B->D 越过 D
    proposition.steps[5] =
        Step::intersection(Selector::circle("B", "C"), Selector::line("D", "B"), "G")
            .beyond("D")
            .into();

    let registry = MacroRegistry::with_builtins();
    let failure = Interpreter::new(&registry).replay(&proposition).unwrap_err();
    assert_eq!(failure.step, Some(5));
    assert!(matches!(failure.error, ConstructionError::AmbiguousSelection(_)));
}

#[test]
fn test_disjoint_circles_are_degenerate() {
    let proposition = Proposition {
        number: 90,
        title: String::new(),
        given: vec![
            GivenElement::point("A", 0.0, 0.0),
            GivenElement::point("B", 1.0, 0.0),
            GivenElement::point("P", 10.0, 0.0),
            GivenElement::point("Q", 11.0, 0.0),
        ],
        steps: vec![
            Step::compass("A", "B"),
            Step::compass("P", "Q"),
            Step::intersection(Selector::circle("A", "B"), Selector::circle("P", "Q"), "X").into(),
        ],
        outputs: vec![],
    };

    let registry = MacroRegistry::new();
    let failure = Interpreter::new(&registry).replay(&proposition).unwrap_err();
    assert_eq!(failure.step, Some(2));
    assert!(matches!(failure.error, ConstructionError::DegenerateGeometry(_)));
    assert_eq!(failure.state.circle_count(), 2);
}

#[test]
fn test_coincident_circles_are_degenerate_only_when_intersected() {
    let mut proposition = Proposition {
        number: 91,
        title: String::new(),
        given: vec![
            GivenElement::point("A", 0.0, 0.0),
            GivenElement::point("B", 1.0, 0.0),
            GivenElement::point("C", 0.0, 1.0),
        ],
        steps: vec![Step::compass("A", "B"), Step::compass("A", "C")],
        outputs: vec![],
    };

    // 两个圆重合，但没有步骤求它们的交点
    let registry = MacroRegistry::new();
    let drawn = Interpreter::new(&registry).replay(&proposition).unwrap();
    assert_eq!(drawn.state.circle_count(), 2);

    proposition.steps.push(
        Step::intersection(Selector::circle("A", "B"), Selector::circle("A", "C"), "X").into(),
    );
    let failure = Interpreter::new(&registry).replay(&proposition).unwrap_err();
    assert_eq!(failure.step, Some(2));
    match failure.error {
        ConstructionError::DegenerateGeometry(reason) => {
            assert!(reason.contains("coincident circles"), "{}", reason)
        }
        other => panic!("unexpected error: {}", other),
    }
}

/// 把给定点移动到新坐标
fn with_point(mut proposition: Proposition, name: &str, px: f64, py: f64) -> Proposition {
    for element in proposition.given.iter_mut() {
        if let GivenElement::Point { label, x, y } = element {
            if label == name {
                *x = px;
                *y = py;
            }
        }
    }
    proposition
}

#[test]
fn test_proposition_2_with_equal_given_lengths() {
    // |BC| = |AB|：圆 (B,C) 与 I.1 拼接进来的圆 (B,A) 重合
    let proposition = with_point(propositions::proposition_2(), "C", 2.0, 2.0);
    let result = replay(&proposition);

    assert_eq!(result.state.circle_count(), 4);
    assert!((distance(&result, "A", "L") - 2.0).abs() < 1e-9);
}

#[test]
fn test_proposition_2_when_c_lies_on_ray_db() {
    // D 在 AB 上方，C 恰好落在射线 D->B 上越过 B 的位置，G 与 C 重合
    let c = Point2::new(2.5, -(3f64.sqrt()) / 2.0);
    let proposition = with_point(propositions::proposition_2(), "C", c.x, c.y);
    let result = replay(&proposition);

    assert!((position(&result, "G") - c).norm() < 1e-9);
    assert_ne!(result.state.by_label("G"), result.state.by_label("C"));
    assert!((distance(&result, "A", "L") - 1.0).abs() < 1e-9);
}

#[test]
fn test_proposition_3_when_e_lies_on_ab() {
    // E 只取决于 A、C、D；把 B 放在 2E 处，E 就是 AB 的中点
    let e = position(&replay(&propositions::proposition_3()), "E");
    let proposition = with_point(propositions::proposition_3(), "B", 2.0 * e.x, 2.0 * e.y);
    let result = replay(&proposition);

    assert!((position(&result, "F") - e).norm() < 1e-9);
    assert!((distance(&result, "A", "F") - distance(&result, "C", "D")).abs() < 1e-9);
    let f = result.state.by_label("F").unwrap();
    assert_eq!(
        result.state.point(f).unwrap().origin,
        PointOrigin::Intersection
    );
}

#[test]
fn test_extended_option_intersects_segments_as_lines() {
    let proposition = Proposition {
        number: 92,
        title: String::new(),
        given: vec![
            GivenElement::point("A", 0.0, 0.0),
            GivenElement::point("B", 1.0, 0.0),
            GivenElement::point("P", 3.0, 1.0),
            GivenElement::point("Q", 3.0, 2.0),
        ],
        steps: vec![
            Step::straightedge("A", "B"),
            Step::straightedge("P", "Q"),
            Step::intersection(Selector::segment("A", "B"), Selector::segment("P", "Q"), "X")
                .into(),
        ],
        outputs: vec![],
    };

    let registry = MacroRegistry::new();
    let bounded = Interpreter::new(&registry).replay(&proposition).unwrap_err();
    assert_eq!(bounded.step, Some(2));

    let extended = Interpreter::new(&registry)
        .with_options(ReplayOptions {
            extended: true,
            record_snapshots: false,
        })
        .replay(&proposition)
        .unwrap();
    let x = extended
        .state
        .position(extended.state.by_label("X").unwrap())
        .unwrap();
    assert!((x.x - 3.0).abs() < 1e-9);
    assert!(x.y.abs() < 1e-9);
}

#[test]
fn test_user_script_as_macro() {
    // 在 AB 两侧各作一个等边三角形
    let rhombus = Proposition {
        number: 10,
        title: "rhombus".into(),
        given: vec![
            GivenElement::point("A", 0.0, 0.0),
            GivenElement::point("B", 1.0, 0.0),
        ],
        steps: vec![
            Step::invoke(1, ["A", "B"], ["C"]),
            Step::invoke(1, ["B", "A"], ["D"]),
        ],
        outputs: vec!["C".into(), "D".into()],
    };

    let mut registry = MacroRegistry::with_builtins();
    registry.register_script(rhombus.clone()).unwrap();

    let caller = Proposition {
        number: 11,
        title: String::new(),
        given: vec![
            GivenElement::point("P", 0.0, 0.0),
            GivenElement::point("Q", 0.0, 2.0),
        ],
        steps: vec![Step::invoke(10, ["P", "Q"], ["U", "V"])],
        outputs: vec![],
    };

    let result = Interpreter::new(&registry).replay(&caller).unwrap();
    let u = position(&result, "U");
    let v = position(&result, "V");
    // P->Q 向上，左侧为 x < 0
    assert!(u.x < 0.0);
    assert!(v.x > 0.0);
    assert!((u.y - 1.0).abs() < 1e-9);
    assert!(result.facts.iter().all(|f| f.provenance.via_macro == Some(10)));
    // 第二次调用 I.1 重画的两个圆直接复用
    assert_eq!(result.state.circle_count(), 2);
}
