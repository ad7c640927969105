use crate::body::{Body, Color};
use crate::config::DEFAULT_TRAIL_RESOLUTION;
use crate::error::BodyError;
use crate::vector::Vector;

/// Velocity for a circular orbit of a point at `offset` from a body of
/// `central_mass`, counter-clockwise: `v = sqrt(G M / r)`.
pub fn circular_orbit_velocity(g: f64, central_mass: f64, offset: Vector) -> Vector {
    let r = offset.mag();
    if r == 0.0 {
        return Vector::zero();
    }
    let speed = (g * central_mass / r).sqrt();
    Vector::new(-offset.y, offset.x) / r * speed
}

/// Generates `n` bodies in a disc around a heavy central star.
/// - The star sits at the origin, at rest.
/// - The others are spread with uniform area density between the inner and
///   outer radius, on circular orbits around the mass enclosed by them.
/// - The same `seed` always gives the same scenario.
pub fn uniform_disc(n: usize, g: f64, seed: u64) -> Result<Vec<Body>, BodyError> {
    let mut rng = fastrand::Rng::with_seed(seed);

    let inner_radius = 5.0e10;
    let outer_radius = inner_radius * (1.0 + (n as f64).sqrt());

    let mut bodies: Vec<Body> = Vec::with_capacity(n);
    if n == 0 {
        return Ok(bodies);
    }

    let star_mass = 2.0e30;
    bodies.push(Body::new(
        star_mass,
        7.0e8,
        Vector::zero(),
        Vector::zero(),
        Color::new(255, 220, 120, 255),
        "Star",
        DEFAULT_TRAIL_RESOLUTION,
    )?);

    let mut offsets: Vec<Vector> = (1..n)
        .map(|_| {
            let a = rng.f64() * std::f64::consts::TAU;
            let (sin, cos) = a.sin_cos();

            let t = inner_radius / outer_radius;
            let r = rng.f64() * (1.0 - t * t) + t * t;
            Vector::new(cos, sin) * outer_radius * r.sqrt()
        })
        .collect();

    // closest first, so each orbit only encloses what is inside it
    offsets.sort_by(|a, b| a.mag_sq().total_cmp(&b.mag_sq()));

    let mut enclosed = star_mass;
    for (i, offset) in offsets.into_iter().enumerate() {
        let mass = 1.0e22 + rng.f64() * 1.0e24;
        let color = Color::new(rng.u8(64..=255), rng.u8(64..=255), rng.u8(64..=255), 255);
        bodies.push(Body::new(
            mass,
            (mass / 5.5e3).cbrt(),
            offset,
            circular_orbit_velocity(g, enclosed, offset),
            color,
            format!("Body {}", i + 1),
            DEFAULT_TRAIL_RESOLUTION,
        )?);
        enclosed += mass;
    }

    Ok(bodies)
}
