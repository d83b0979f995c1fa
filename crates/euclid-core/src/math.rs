//! 数学基础类型
//!
//! 基于 nalgebra 的二维点/向量别名，以及整个引擎共用的唯一容差常量。

/// 二维点
pub type Point2 = nalgebra::Point2<f64>;

/// 二维向量
pub type Vector2 = nalgebra::Vector2<f64>;

/// 全局数值容差
///
/// 引擎中所有浮点比较（相切判定、点重合、参数位置、手性符号）都使用这一个常量。
pub const EPSILON: f64 = 1e-9;

/// 二维叉积（标量）
#[inline]
pub fn cross(a: &Vector2, b: &Vector2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// 两个浮点数在容差内相等
#[inline]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

/// 两点在容差内重合
#[inline]
pub fn points_coincide(a: &Point2, b: &Point2) -> bool {
    (a - b).norm() <= EPSILON
}

/// 点 `p` 在有向直线 `from -> to` 上的参数位置
///
/// `from` 处为 0，`to` 处为 1。方向向量退化时返回 `None`。
pub fn line_parameter(from: &Point2, to: &Point2, p: &Point2) -> Option<f64> {
    let d = to - from;
    let len2 = d.dot(&d);
    if len2 <= EPSILON * EPSILON {
        return None;
    }
    Some((p - from).dot(&d) / len2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_sign() {
        let x = Vector2::new(1.0, 0.0);
        let up = Vector2::new(0.0, 1.0);
        assert!(cross(&x, &up) > 0.0);
        assert!(cross(&up, &x) < 0.0);
    }

    #[test]
    fn test_line_parameter() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(2.0, 0.0);
        let t = line_parameter(&a, &b, &Point2::new(3.0, 1.0)).unwrap();
        assert!(approx_eq(t, 1.5));
        assert!(line_parameter(&a, &a, &b).is_none());
    }
}
