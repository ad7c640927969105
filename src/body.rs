use std::collections::{TryReserveError, VecDeque};
use std::f64::consts::PI;

use tracing::{info, warn};

use crate::error::BodyError;
use crate::vector::{Vector, angle, distance};

/// RGBA colour, one byte per channel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Builds a colour from its channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Channel-wise `self * w1 + other * w2`, truncated back to a byte.
    fn mix(self, other: Color, w1: f64, w2: f64) -> Color {
        let ch = |a: u8, b: u8| (a as f64 * w1 + b as f64 * w2) as u8;
        Color {
            r: ch(self.r, other.r),
            g: ch(self.g, other.g),
            b: ch(self.b, other.b),
            a: ch(self.a, other.a),
        }
    }
}

/// Represents a gravitating disc in the simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    pos: Vector,
    vel: Vector,
    mass: f64,
    radius: f64,
    /// Mass per unit disc area, `mass / (π r²)`.
    density: f64,
    color: Color,
    name: String,
    trail_resolution: usize,
    trail: VecDeque<Vector>,
    apogee: f64,
    perigee: f64,
    apogee_vel: f64,
    perigee_vel: f64,
}

/// Result of scanning one body against the frozen snapshot of a tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Interaction {
    /// Sum of attractions from every non-overlapping partner.
    pub force: Vector,
    /// Overlapping partners in snapshot order, each with the attraction
    /// accumulated from the partners scanned before it.
    pub contacts: Vec<(usize, Vector)>,
}

impl Body {
    /// Creates a new body. The trail starts with the creation position and
    /// the extrema are unset.
    pub fn new(
        mass: f64,
        radius: f64,
        pos: Vector,
        vel: Vector,
        color: Color,
        name: impl Into<String>,
        trail_resolution: usize,
    ) -> Result<Self, BodyError> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(BodyError::InvalidMass(mass));
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(BodyError::InvalidRadius(radius));
        }
        if !(pos.x.is_finite() && pos.y.is_finite()) {
            return Err(BodyError::NonFinite("position"));
        }
        if !(vel.x.is_finite() && vel.y.is_finite()) {
            return Err(BodyError::NonFinite("velocity"));
        }

        let mut trail = VecDeque::with_capacity(trail_resolution.min(4096) + 1);
        if trail_resolution > 0 {
            trail.push_back(pos);
        }

        Ok(Self {
            pos,
            vel,
            mass,
            radius,
            density: mass / (PI * radius * radius),
            color,
            name: name.into(),
            trail_resolution,
            trail,
            apogee: 0.0,
            perigee: f64::INFINITY,
            apogee_vel: 0.0,
            perigee_vel: 0.0,
        })
    }

    /// Centre of the disc.
    pub fn position(&self) -> Vector {
        self.pos
    }

    /// Current velocity in m/s.
    pub fn velocity(&self) -> Vector {
        self.vel
    }

    /// Magnitude of the velocity.
    pub fn speed(&self) -> f64 {
        self.vel.mag()
    }

    /// Mass in kg, always positive.
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Disc radius in metres, always positive.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Mass per unit disc area.
    pub fn areal_density(&self) -> f64 {
        self.density
    }

    /// Display colour; blended on merges.
    pub fn color(&self) -> Color {
        self.color
    }

    /// Display name. Not unique.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of trail points kept.
    pub fn trail_resolution(&self) -> usize {
        self.trail_resolution
    }

    /// Past positions, oldest first.
    pub fn trail(&self) -> impl ExactSizeIterator<Item = Vector> + '_ {
        self.trail.iter().copied()
    }

    /// Farthest distance from the reference body seen so far (0 until observed).
    pub fn apogee(&self) -> f64 {
        self.apogee
    }

    /// Nearest distance from the reference body seen so far (+∞ until observed).
    pub fn perigee(&self) -> f64 {
        self.perigee
    }

    /// Speed when the apogee was last raised.
    pub fn apogee_velocity(&self) -> f64 {
        self.apogee_vel
    }

    /// Speed when the perigee was last lowered.
    pub fn perigee_velocity(&self) -> f64 {
        self.perigee_vel
    }

    /// Comparator used to pick the reference body.
    pub fn gravity_factor(&self) -> f64 {
        self.mass
    }

    /// True when the discs intersect (touching does not count).
    pub fn overlaps(&self, other: &Body) -> bool {
        distance(self.pos, other.pos) < self.radius + other.radius
    }

    /// Force that `other` exerts on `self`. Points from `self` towards `other`.
    pub fn attraction(&self, other: &Body, g: f64) -> Result<Vector, BodyError> {
        let d = distance(self.pos, other.pos);
        if d == 0.0 {
            return Err(BodyError::Coincident(self.name.clone(), other.name.clone()));
        }
        let force = g * self.mass * other.mass / (d * d);
        if !force.is_finite() {
            return Err(BodyError::ForceOverflow(self.name.clone(), other.name.clone()));
        }

        let (sin, cos) = angle(self.pos, other.pos).sin_cos();
        Ok(Vector::new(cos * force, sin * force))
    }

    /// Scans every other body of `snapshot` in order. With collisions on,
    /// overlapping partners become merge candidates together with the force
    /// gathered before them; the rest contribute attraction. Errors carry the
    /// index of the offending partner.
    pub(crate) fn interact(
        &self,
        index: usize,
        snapshot: &[Body],
        g: f64,
        collisions: bool,
    ) -> Result<Interaction, (usize, BodyError)> {
        let mut interaction = Interaction::default();
        for (j, other) in snapshot.iter().enumerate() {
            if j == index {
                continue;
            }
            if collisions && self.overlaps(other) {
                interaction.contacts.push((j, interaction.force));
                continue;
            }
            interaction.force += self.attraction(other, g).map_err(|e| (j, e))?;
        }
        Ok(interaction)
    }

    /// Semi-implicit Euler step followed by a trail push.
    pub fn integrate(&mut self, force: Vector, dt: f64) {
        self.vel += force / self.mass * dt;
        self.pos += self.vel * dt;
        self.push_trail(self.pos);
    }

    fn push_trail(&mut self, pos: Vector) {
        if self.trail_resolution == 0 {
            return;
        }
        self.trail.push_back(pos);
        while self.trail.len() > self.trail_resolution {
            self.trail.pop_front();
        }
    }

    /// Merges `other` into `self`. `self` keeps its storage (and extrema);
    /// name and trail come from the heavier of the two, `self` on ties.
    pub fn absorb(&mut self, other: &Body) {
        info!(survivor = %self.name, absorbed = %other.name, "bodies merged");

        let (w1, w2) = color_weights(self.mass, other.mass);

        if self.mass < other.mass {
            self.name.clone_from(&other.name);
            self.trail.clone_from(&other.trail);
            while self.trail.len() > self.trail_resolution {
                self.trail.pop_front();
            }
        }

        self.color = self.color.mix(other.color, w1, w2);

        let mass = self.mass + other.mass;
        let f1 = self.mass / mass;
        let f2 = other.mass / mass;

        self.vel = self.vel * f1 + other.vel * f2;
        self.density = self.density * f1 + other.density * f2;
        self.mass = mass;

        let area = self.mass / self.density + PI * self.radius * self.radius / self.density;
        self.radius = (area / PI).sqrt();
    }

    /// Raises the apogee / lowers the perigee against `reference`.
    pub fn update_extrema(&mut self, reference: Vector) {
        let d = distance(self.pos, reference);
        if d > self.apogee {
            self.apogee = d;
            self.apogee_vel = self.speed();
        }
        if d < self.perigee {
            self.perigee = d;
            self.perigee_vel = self.speed();
        }
    }

    /// Deep copy that reports allocation failure instead of aborting.
    pub fn try_clone(&self) -> Result<Self, TryReserveError> {
        let mut name = String::new();
        name.try_reserve_exact(self.name.len())?;
        name.push_str(&self.name);

        let mut trail = VecDeque::new();
        trail.try_reserve_exact(self.trail.len() + 1)?;
        trail.extend(self.trail.iter().copied());

        Ok(Self {
            name,
            trail,
            ..*self
        })
    }
}

/// Perceptual colour weights, `log10(m1) / (log10(m1) + log10(m2))` and its
/// complement. Masses at or below 1 kg make the logs non-positive; those
/// merges fall back to mass-proportional weights.
fn color_weights(m1: f64, m2: f64) -> (f64, f64) {
    let (l1, l2) = (m1.log10(), m2.log10());
    if l1 > 0.0 && l2 > 0.0 {
        (l1 / (l1 + l2), l2 / (l1 + l2))
    } else {
        warn!(m1, m2, "log10 colour blend undefined for masses <= 1 kg, blending by mass");
        (m1 / (m1 + m2), m2 / (m1 + m2))
    }
}
