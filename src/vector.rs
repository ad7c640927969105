use ultraviolet::DVec2;

/// 2D vector in simulation units (metres, m/s, newtons).
pub type Vector = DVec2;

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Vector, b: Vector) -> f64 {
    (b - a).mag()
}

/// Angle of the vector from `from` to `to`, measured from the +x axis.
#[inline]
pub fn angle(from: Vector, to: Vector) -> f64 {
    let d = to - from;
    d.y.atan2(d.x)
}
