//! 内置命题（第一卷 1-3）
//!
//! 这些脚本既可以单独回放，也作为宏被后续命题调用。
//! 给定点的坐标只是默认示例，作为宏调用时由调用方的输入点替换。

use crate::script::{GivenElement, Proposition, Step};
use crate::selector::Selector;

/// I.1 在已知线段上作等边三角形
pub fn proposition_1() -> Proposition {
    Proposition {
        number: 1,
        title: "On a given finite straight line to construct an equilateral triangle".into(),
        given: vec![
            GivenElement::point("A", 0.0, 0.0),
            GivenElement::point("B", 1.0, 0.0),
            GivenElement::segment("A", "B"),
        ],
        steps: vec![
            Step::compass("A", "B"),
            Step::compass("B", "A"),
            Step::intersection(Selector::circle("A", "B"), Selector::circle("B", "A"), "C").into(),
            Step::straightedge("C", "A"),
            Step::straightedge("C", "B"),
        ],
        outputs: vec!["C".into()],
    }
}

/// I.2 以已知点为端点作一线段等于已知线段
///
/// A 为已知点，BC 为已知线段，产出 L 使 AL = BC。
pub fn proposition_2() -> Proposition {
    Proposition {
        number: 2,
        title: "To place at a given point a straight line equal to a given straight line".into(),
        given: vec![
            GivenElement::point("A", 0.0, 0.0),
            GivenElement::point("B", 2.0, 0.0),
            GivenElement::point("C", 2.5, 1.5),
            GivenElement::segment("B", "C"),
        ],
        steps: vec![
            Step::straightedge("A", "B"),
            Step::invoke(1, ["A", "B"], ["D"]),
            Step::extend(Selector::segment("D", "A")),
            Step::extend(Selector::segment("D", "B")),
            Step::compass("B", "C"),
            Step::intersection(Selector::circle("B", "C"), Selector::line("D", "B"), "G")
                .beyond("B")
                .into(),
            Step::compass("D", "G"),
            Step::intersection(Selector::circle("D", "G"), Selector::line("D", "A"), "L")
                .beyond("A")
                .into(),
            Step::straightedge("A", "L"),
        ],
        outputs: vec!["L".into()],
    }
}

/// I.3 从两条不等线段中较长的一条截取一段等于较短者
///
/// AB 为较长线段，CD 为较短线段，产出 F 使 AF = CD。
pub fn proposition_3() -> Proposition {
    Proposition {
        number: 3,
        title: "Given two unequal straight lines, to cut off from the greater a straight line equal to the less".into(),
        given: vec![
            GivenElement::point("A", 0.0, 0.0),
            GivenElement::point("B", 4.0, 0.0),
            GivenElement::point("C", 1.0, 2.0),
            GivenElement::point("D", 2.5, 2.5),
            GivenElement::segment("A", "B"),
            GivenElement::segment("C", "D"),
        ],
        steps: vec![
            Step::invoke(2, ["A", "C", "D"], ["E"]),
            Step::compass("A", "E"),
            Step::intersection(Selector::circle("A", "E"), Selector::segment("A", "B"), "F").into(),
        ],
        outputs: vec!["F".into()],
    }
}

/// 全部内置命题（按编号）
pub fn builtin() -> Vec<Proposition> {
    vec![proposition_1(), proposition_2(), proposition_3()]
}

/// 按编号取内置命题
pub fn builtin_by_number(number: u32) -> Option<Proposition> {
    builtin().into_iter().find(|p| p.number == number)
}
