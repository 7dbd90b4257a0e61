//! Closest-point and barycentric queries on single triangles.

use nalgebra::{Point2, Point3};

/// Closest point of triangle `(a, b, c)` to `p`, as barycentric weights.
///
/// Region classification after Ericson, *Real-Time Collision Detection*,
/// section 5.1.5. Degenerate triangles fall back to their closest edge.
pub fn closest_barycentric(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> [f64; 3] {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return [1.0, 0.0, 0.0];
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return [0.0, 1.0, 0.0];
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return [1.0 - v, v, 0.0];
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return [0.0, 0.0, 1.0];
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return [1.0 - w, 0.0, w];
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return [0.0, 1.0 - w, w];
    }

    let denom = va + vb + vc;
    if denom == 0.0 {
        return closest_on_edges(p, a, b, c);
    }
    let v = vb / denom;
    let w = vc / denom;
    [1.0 - v - w, v, w]
}

fn closest_on_edges(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> [f64; 3] {
    let on_segment = |x: &Point3<f64>, y: &Point3<f64>| {
        let d = y - x;
        let len_sq = d.norm_squared();
        let t = if len_sq == 0.0 {
            0.0
        } else {
            ((p - x).dot(&d) / len_sq).clamp(0.0, 1.0)
        };
        (t, (p - (x + d * t)).norm())
    };
    let (t_ab, d_ab) = on_segment(a, b);
    let (t_bc, d_bc) = on_segment(b, c);
    let (t_ca, d_ca) = on_segment(c, a);
    if d_ab <= d_bc && d_ab <= d_ca {
        [1.0 - t_ab, t_ab, 0.0]
    } else if d_bc <= d_ca {
        [0.0, 1.0 - t_bc, t_bc]
    } else {
        [t_ca, 0.0, 1.0 - t_ca]
    }
}

/// Barycentric weights of `p` in the 2D triangle `(a, b, c)`, if it is not
/// degenerate. Weights may be negative outside the triangle.
pub fn barycentric_2d(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Option<[f64; 3]> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let det = v0.perp(&v1);
    if det == 0.0 {
        return None;
    }
    let v = v2.perp(&v1) / det;
    let w = v0.perp(&v2) / det;
    Some([1.0 - v - w, v, w])
}

/// Weighted sum of three points.
#[inline]
pub fn interpolate3(corners: [Point3<f64>; 3], w: [f64; 3]) -> Point3<f64> {
    Point3::from(corners[0].coords * w[0] + corners[1].coords * w[1] + corners[2].coords * w[2])
}

/// Weighted sum of three 2D points.
#[inline]
pub fn interpolate2(corners: [Point2<f64>; 3], w: [f64; 3]) -> Point2<f64> {
    Point2::from(corners[0].coords * w[0] + corners[1].coords * w[1] + corners[2].coords * w[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> [Point3<f64>; 3] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ]
    }

    fn closest(p: Point3<f64>) -> Point3<f64> {
        let [a, b, c] = tri();
        interpolate3(tri(), closest_barycentric(&p, &a, &b, &c))
    }

    #[test]
    fn test_interior_projects_straight_down() {
        let q = closest(Point3::new(0.5, 0.5, 3.0));
        assert!((q - Point3::new(0.5, 0.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_regions() {
        assert_eq!(closest(Point3::new(-1.0, -1.0, 0.0)), Point3::new(0.0, 0.0, 0.0));
        assert_eq!(closest(Point3::new(3.0, -1.0, 0.0)), Point3::new(2.0, 0.0, 0.0));
        assert!((closest(Point3::new(1.0, -1.0, 1.0)) - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((closest(Point3::new(2.0, 2.0, 0.0)) - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((closest(Point3::new(-1.0, 1.0, 0.0)) - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_degenerate_triangle() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(2.0, 0.0, 0.0);
        let w = closest_barycentric(&Point3::new(1.5, 1.0, 0.0), &a, &b, &c);
        let q = interpolate3([a, b, c], w);
        assert!((q - Point3::new(1.5, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_barycentric_2d() {
        let (a, b, c) = (Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0));
        let w = barycentric_2d(&Point2::new(0.25, 0.5), &a, &b, &c).unwrap();
        assert!((w[0] - 0.25).abs() < 1e-12);
        assert!((w[1] - 0.25).abs() < 1e-12);
        assert!((w[2] - 0.5).abs() < 1e-12);
        assert!(barycentric_2d(&Point2::origin(), &a, &a, &c).is_none());
    }
}
