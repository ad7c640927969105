use crate::{
    body::{Body, Interaction},
    config::{AU, SimulationConfig, check_positive},
    error::{ConfigError, SimulationError},
    vector::{Vector, distance},
};

use rayon::prelude::*;
use tracing::debug;

use std::collections::BTreeMap;
use std::fmt;

/// Stable handle to a body.
///
/// Handles are handed out in increasing order and never reused, so a handle
/// to a body that was merged away simply stops resolving. Clones made by
/// [`Simulation::clone_for_forward_simulation`] share the same handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(u64);

impl BodyId {
    /// Rebuilds a handle from [`BodyId::raw`]. Raw value 0 is never issued.
    pub fn from_raw(raw: u64) -> Self {
        BodyId(raw)
    }

    /// Numeric value of the handle, as exposed over the C ABI.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Owns the live bodies and drives the two-phase tick.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    /// Day counter; runs backwards while stepping with negative counts.
    day_count: i64,
    next_id: u64,
    /// Parallel to `bodies`, strictly increasing.
    ids: Vec<BodyId>,
    bodies: Vec<Body>,
    most_massive: Option<BodyId>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::from_valid_config(SimulationConfig::default())
    }
}

impl Simulation {
    /// Creates an empty simulation.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    /// Creates a simulation populated with `bodies`, inserted in order.
    pub fn with_bodies(bodies: Vec<Body>, config: SimulationConfig) -> Result<Self, ConfigError> {
        let mut sim = Self::new(config)?;
        for body in bodies {
            sim.add_body(body);
        }
        Ok(sim)
    }

    fn from_valid_config(config: SimulationConfig) -> Self {
        Self {
            config,
            day_count: 0,
            next_id: 1,
            ids: Vec::new(),
            bodies: Vec::new(),
            most_massive: None,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Signed count of ticks stepped so far.
    pub fn day_count(&self) -> i64 {
        self.day_count
    }

    /// Number of live bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Simulated seconds one tick stands for.
    pub fn seconds_per_tick(&self) -> f64 {
        self.config.seconds_per_tick
    }

    /// Rejects non-positive or non-finite values, leaving the old value in place.
    pub fn set_seconds_per_tick(&mut self, seconds: f64) -> Result<(), ConfigError> {
        check_positive("seconds_per_tick", seconds)?;
        self.config.seconds_per_tick = seconds;
        Ok(())
    }

    /// Signed number of ticks covering `simulated_seconds`, rounded to nearest.
    pub fn ticks_for(&self, simulated_seconds: f64) -> i64 {
        (simulated_seconds / self.config.seconds_per_tick).round() as i64
    }

    /// Inserts a body. The cached reference body only changes when the new
    /// body is strictly heavier, so earlier bodies win ties.
    pub fn add_body(&mut self, body: Body) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;

        let heavier = self
            .most_massive()
            .is_none_or(|current| current.gravity_factor() < body.gravity_factor());
        if heavier {
            self.most_massive = Some(id);
        }

        self.ids.push(id);
        self.bodies.push(body);
        id
    }

    fn index_of(&self, id: BodyId) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Looks up a live body. Handles of merged-away bodies return `None`.
    pub fn get(&self, id: BodyId) -> Option<&Body> {
        self.index_of(id).map(|i| &self.bodies[i])
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.index_of(id).is_some()
    }

    /// Live bodies in insertion order.
    pub fn bodies(&self) -> impl ExactSizeIterator<Item = (BodyId, &Body)> + '_ {
        self.ids.iter().copied().zip(self.bodies.iter())
    }

    /// First inserted body named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<BodyId> {
        self.bodies
            .iter()
            .position(|body| body.name() == name)
            .map(|i| self.ids[i])
    }

    /// First body whose centre lies within `tolerance` of `point`.
    pub fn body_near(&self, point: Vector, tolerance: f64) -> Option<BodyId> {
        self.bodies()
            .find(|(_, body)| distance(body.position(), point) < tolerance)
            .map(|(id, _)| id)
    }

    /// Handle of the heaviest body, earliest inserted on ties.
    pub fn most_massive_id(&self) -> Option<BodyId> {
        self.most_massive
    }

    /// The reference body for extrema tracking.
    pub fn most_massive(&self) -> Option<&Body> {
        self.most_massive.and_then(|id| self.get(id))
    }

    fn recompute_most_massive(&mut self) {
        let mut best: Option<usize> = None;
        for (i, body) in self.bodies.iter().enumerate() {
            match best {
                Some(k) if self.bodies[k].gravity_factor() >= body.gravity_factor() => {}
                _ => best = Some(i),
            }
        }
        self.most_massive = best.map(|i| self.ids[i]);
    }

    /// Advances the simulation by `n` ticks.
    ///
    /// Negative `n` runs the day counter backwards but integrates with the
    /// same forward formula; it is a preview approximation, not a time
    /// reversal. On error the failing tick's clock change is undone and no
    /// body has been touched by that tick.
    pub fn step(&mut self, n: i64) -> Result<(), SimulationError> {
        let direction = n.signum();
        for _ in 0..n.unsigned_abs() {
            self.day_count += direction;
            if let Err(err) = self.tick() {
                self.day_count -= direction;
                return Err(err);
            }
        }
        debug!(ticks = n, day = self.day_count, bodies = self.bodies.len(), "stepped");
        Ok(())
    }

    fn tick(&mut self) -> Result<(), SimulationError> {
        let interactions = self.interactions()?;

        let dt = self.config.timestep;
        let mut alive = vec![true; self.bodies.len()];
        // each body merges at most once per tick
        let mut partner: Vec<Option<usize>> = vec![None; self.bodies.len()];

        for (i, interaction) in interactions.iter().enumerate() {
            if partner[i].is_some() {
                continue;
            }
            let Some(&(j, _)) = interaction.contacts.iter().find(|(j, _)| partner[*j].is_none()) else {
                continue;
            };
            // the heavier slot survives, `i` on ties
            let (survivor, absorbed) = if self.bodies[j].mass() > self.bodies[i].mass() {
                (j, i)
            } else {
                (i, j)
            };
            let (body, other) = pair_mut(&mut self.bodies, survivor, absorbed);
            body.absorb(other);
            alive[absorbed] = false;
            partner[i] = Some(j);
            partner[j] = Some(i);
        }

        for (i, interaction) in interactions.iter().enumerate() {
            if !alive[i] {
                continue;
            }
            // a survivor only feels the partners scanned before its merge
            let force = partner[i]
                .and_then(|p| interaction.contacts.iter().find(|(j, _)| *j == p))
                .map_or(interaction.force, |&(_, before)| before);
            self.bodies[i].integrate(force, dt);
        }

        if alive.contains(&false) {
            let mut keep = alive.iter().copied();
            self.bodies.retain(|_| keep.next().unwrap_or(false));
            let mut keep = alive.iter().copied();
            self.ids.retain(|_| keep.next().unwrap_or(false));
            self.recompute_most_massive();
        }

        self.update_extrema();
        Ok(())
    }

    /// Force phase: every body against the same, untouched body list.
    fn interactions(&self) -> Result<Vec<Interaction>, SimulationError> {
        let g = self.config.gravitational_constant;
        let collisions = self.config.collisions_enabled;
        let snapshot = self.bodies.as_slice();

        let scan = |i: usize, body: &Body| {
            body.interact(i, snapshot, g, collisions)
                .map_err(|(j, source)| (i, j, source))
        };

        let result: Result<Vec<_>, _> = if self.config.parallel_forces {
            snapshot.par_iter().enumerate().map(|(i, body)| scan(i, body)).collect()
        } else {
            snapshot.iter().enumerate().map(|(i, body)| scan(i, body)).collect()
        };

        result.map_err(|(i, j, source)| SimulationError::DegenerateConfiguration {
            first: self.ids[i],
            second: self.ids[j],
            source,
        })
    }

    fn update_extrema(&mut self) {
        let Some(reference) = self.most_massive.and_then(|id| self.index_of(id)) else {
            return;
        };
        let origin = self.bodies[reference].position();
        for (i, body) in self.bodies.iter_mut().enumerate() {
            if i != reference {
                body.update_extrema(origin);
            }
        }
    }

    /// Independent deep copy for speculative runs. Nothing is shared with
    /// `self`, and allocation failure is reported before anything is built.
    pub fn clone_for_forward_simulation(&self) -> Result<Simulation, SimulationError> {
        let mut bodies = Vec::new();
        bodies.try_reserve_exact(self.bodies.len())?;
        for body in &self.bodies {
            bodies.push(body.try_clone()?);
        }

        let mut ids = Vec::new();
        ids.try_reserve_exact(self.ids.len())?;
        ids.extend_from_slice(&self.ids);

        Ok(Simulation {
            config: self.config.clone(),
            day_count: self.day_count,
            next_id: self.next_id,
            ids,
            bodies,
            most_massive: self.most_massive,
        })
    }

    /// Steps a clone `ticks` times and records where every body goes.
    pub fn preview(&self, ticks: i64) -> Result<ForwardPreview, SimulationError> {
        let mut clone = self.clone_for_forward_simulation()?;
        let mut paths: BTreeMap<BodyId, Vec<Vector>> = self
            .bodies()
            .map(|(id, body)| (id, vec![body.position()]))
            .collect();

        let direction = ticks.signum();
        for _ in 0..ticks.unsigned_abs() {
            clone.step(direction)?;
            for (id, body) in clone.bodies() {
                if let Some(path) = paths.get_mut(&id) {
                    path.push(body.position());
                }
            }
        }

        Ok(ForwardPreview {
            day_count: clone.day_count,
            paths: paths
                .into_iter()
                .map(|(id, points)| PreviewPath { id, points })
                .collect(),
        })
    }

    /// Info-panel figures for one body, relative to the current reference body.
    pub fn report(&self, id: BodyId) -> Option<BodyReport> {
        let body = self.get(id)?;
        let distance_from_reference = match (self.most_massive, self.most_massive()) {
            (Some(reference_id), Some(reference)) if reference_id != id => {
                Some(distance(body.position(), reference.position()))
            }
            _ => None,
        };

        Some(BodyReport {
            name: body.name().to_owned(),
            mass: body.mass(),
            radius: body.radius(),
            speed: body.speed(),
            distance_from_reference,
            apogee_au: body.apogee() / AU,
            perigee_au: body.perigee() / AU,
            apogee_velocity: body.apogee_velocity(),
            perigee_velocity: body.perigee_velocity(),
        })
    }
}

/// `(&mut bodies[i], &bodies[j])` for `i != j`.
fn pair_mut(bodies: &mut [Body], i: usize, j: usize) -> (&mut Body, &Body) {
    if i < j {
        let (head, tail) = bodies.split_at_mut(j);
        (&mut head[i], &tail[0])
    } else {
        let (head, tail) = bodies.split_at_mut(i);
        (&mut tail[0], &head[j])
    }
}

/// Predicted positions of one body, starting with its current position.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewPath {
    pub id: BodyId,
    pub points: Vec<Vector>,
}

/// Output of [`Simulation::preview`].
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardPreview {
    /// Day counter the clone reached.
    pub day_count: i64,
    /// One path per body alive when the preview started, in insertion order.
    /// Paths of bodies merged away during the preview stop early.
    pub paths: Vec<PreviewPath>,
}

impl ForwardPreview {
    pub fn path(&self, id: BodyId) -> Option<&[Vector]> {
        self.paths
            .iter()
            .find(|path| path.id == id)
            .map(|path| path.points.as_slice())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BodyReport {
    pub name: String,
    pub mass: f64,
    pub radius: f64,
    pub speed: f64,
    /// `None` for the reference body itself.
    pub distance_from_reference: Option<f64>,
    pub apogee_au: f64,
    pub perigee_au: f64,
    pub apogee_velocity: f64,
    pub perigee_velocity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Color;

    fn body(name: &str, mass: f64, x: f64, y: f64) -> Body {
        Body::new(mass, 1.0, Vector::new(x, y), Vector::zero(), Color::default(), name, 16).unwrap()
    }

    fn sim(config: SimulationConfig, bodies: Vec<Body>) -> Simulation {
        Simulation::with_bodies(bodies, config).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SimulationConfig {
            timestep: 0.0,
            ..SimulationConfig::default()
        };
        assert!(Simulation::new(config).is_err());
    }

    #[test]
    fn most_massive_keeps_first_on_ties() {
        let mut s = Simulation::default();
        assert!(s.most_massive().is_none());
        let a = s.add_body(body("a", 10.0, 0.0, 0.0));
        let _b = s.add_body(body("b", 10.0, 100.0, 0.0));
        assert_eq!(s.most_massive_id(), Some(a));
        let c = s.add_body(body("c", 11.0, 200.0, 0.0));
        assert_eq!(s.most_massive_id(), Some(c));
        assert_eq!(s.most_massive().map(Body::name), Some("c"));
    }

    #[test]
    fn find_by_name_prefers_first_inserted() {
        let mut s = Simulation::default();
        let first = s.add_body(body("twin", 1.0, 0.0, 0.0));
        let second = s.add_body(body("twin", 2.0, 50.0, 0.0));
        let other = s.add_body(body("other", 2.0, 100.0, 0.0));
        assert_eq!(s.find_by_name("twin"), Some(first));
        assert_ne!(s.find_by_name("twin"), Some(second));
        assert_eq!(s.find_by_name("other"), Some(other));
        assert_eq!(s.find_by_name("missing"), None);
    }

    #[test]
    fn zero_steps_do_nothing() {
        let mut s = sim(SimulationConfig::default(), vec![body("a", 1.0, 0.0, 0.0), body("b", 1.0, 10.0, 0.0)]);
        s.step(0).unwrap();
        assert_eq!(s.day_count(), 0);
        assert_eq!(s.get(BodyId::from_raw(1)).unwrap().position(), Vector::zero());
    }

    #[test]
    fn negative_steps_run_clock_backwards_only() {
        let config = SimulationConfig {
            timestep: 1.0,
            ..SimulationConfig::default()
        };
        let mut s = sim(config, vec![Body::new(1.0, 1.0, Vector::zero(), Vector::new(1.0, 0.0), Color::default(), "m", 4).unwrap()]);
        s.step(-3).unwrap();
        assert_eq!(s.day_count(), -3);
        // still integrated forwards
        assert_eq!(s.get(BodyId::from_raw(1)).unwrap().position(), Vector::new(3.0, 0.0));
    }

    #[test]
    fn coincident_bodies_without_collisions_fail() {
        let config = SimulationConfig {
            collisions_enabled: false,
            ..SimulationConfig::default()
        };
        let mut s = sim(config, vec![body("a", 1.0, 5.0, 5.0), body("b", 1.0, 5.0, 5.0)]);
        let err = s.step(2).unwrap_err();
        match err {
            SimulationError::DegenerateConfiguration { first, second, .. } => {
                assert_eq!(first, BodyId::from_raw(1));
                assert_eq!(second, BodyId::from_raw(2));
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(s.day_count(), 0);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn coincident_bodies_with_collisions_merge() {
        let mut s = sim(SimulationConfig::default(), vec![body("a", 1.0, 5.0, 5.0), body("b", 3.0, 5.0, 5.0)]);
        s.step(1).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.find_by_name("b"), Some(BodyId::from_raw(2)));
        assert!(!s.contains(BodyId::from_raw(1)));
        assert_eq!(s.get(BodyId::from_raw(2)).unwrap().mass(), 4.0);
    }

    #[test]
    fn merge_updates_reference_body() {
        let mut s = Simulation::default();
        let big = s.add_body(body("big", 100.0, 0.0, 0.0));
        let a = s.add_body(body("a", 60.0, 1e6, 0.0));
        let _b = s.add_body(body("b", 60.0, 1e6 + 0.5, 0.0));
        assert_eq!(s.most_massive_id(), Some(big));
        s.step(1).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.most_massive_id(), Some(a));
        assert_eq!(s.most_massive().unwrap().mass(), 120.0);
    }

    #[test]
    fn parallel_and_serial_forces_agree() {
        let bodies = || {
            (0..24)
                .map(|i| {
                    let a = i as f64 * 0.7;
                    body(&format!("b{i}"), 1e20 + i as f64 * 1e18, a.cos() * 1e7 * (1.0 + i as f64), a.sin() * 1e7)
                })
                .collect::<Vec<_>>()
        };
        let mut serial = sim(SimulationConfig::default(), bodies());
        let mut parallel = sim(
            SimulationConfig {
                parallel_forces: true,
                ..SimulationConfig::default()
            },
            bodies(),
        );
        serial.step(20).unwrap();
        parallel.step(20).unwrap();
        let a: Vec<_> = serial.bodies().map(|(id, b)| (id, b.position(), b.velocity())).collect();
        let b: Vec<_> = parallel.bodies().map(|(id, b)| (id, b.position(), b.velocity())).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn seconds_per_tick_roundtrip() {
        let mut s = Simulation::default();
        s.set_seconds_per_tick(3600.0).unwrap();
        assert_eq!(s.seconds_per_tick(), 3600.0);
        assert_eq!(s.ticks_for(86_400.0), 24);
        assert_eq!(s.ticks_for(-7200.0), -2);
        assert!(s.set_seconds_per_tick(0.0).is_err());
        assert!(s.set_seconds_per_tick(f64::NAN).is_err());
        assert_eq!(s.seconds_per_tick(), 3600.0);
    }

    #[test]
    fn clone_shares_handles_not_storage() {
        let mut s = sim(SimulationConfig::default(), vec![body("a", 1e24, 0.0, 0.0), body("b", 1e20, 1e9, 0.0)]);
        s.step(2).unwrap();
        let mut clone = s.clone_for_forward_simulation().unwrap();
        assert_eq!(clone.day_count(), 2);
        assert_eq!(clone.most_massive_id(), s.most_massive_id());
        let ids: Vec<_> = clone.bodies().map(|(id, _)| id).collect();
        assert_eq!(ids, s.bodies().map(|(id, _)| id).collect::<Vec<_>>());

        clone.step(10).unwrap();
        let id = s.find_by_name("b").unwrap();
        assert_ne!(clone.get(id).unwrap().position(), s.get(id).unwrap().position());
        assert_eq!(s.day_count(), 2);
        // handles keep counting from the same place
        let next = clone.add_body(body("c", 1.0, -1e9, 0.0));
        assert_eq!(next, BodyId::from_raw(3));
    }

    #[test]
    fn preview_leaves_original_untouched() {
        let s = sim(SimulationConfig::default(), vec![body("sun", 2e30, 0.0, 0.0), body("craft", 1.0, 1e11, 0.0)]);
        let before: Vec<_> = s.bodies().map(|(_, b)| b.clone()).collect();
        let preview = s.preview(5).unwrap();
        assert_eq!(preview.day_count, 5);
        let craft = s.find_by_name("craft").unwrap();
        let path = preview.path(craft).unwrap();
        assert_eq!(path.len(), 6);
        assert_eq!(path[0], Vector::new(1e11, 0.0));
        assert!(path[5].x < 1e11);
        let after: Vec<_> = s.bodies().map(|(_, b)| b.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(s.day_count(), 0);
    }

    #[test]
    fn preview_paths_stop_at_merge() {
        let s = sim(SimulationConfig::default(), vec![body("a", 10.0, 0.0, 0.0), body("b", 5.0, 1.0, 0.0)]);
        let preview = s.preview(3).unwrap();
        assert_eq!(preview.path(BodyId::from_raw(1)).unwrap().len(), 4);
        assert_eq!(preview.path(BodyId::from_raw(2)).unwrap().len(), 1);
    }

    #[test]
    fn body_near_picks_first_within_tolerance() {
        let s = sim(SimulationConfig::default(), vec![body("a", 1.0, 0.0, 0.0), body("b", 1.0, 10.0, 0.0)]);
        assert_eq!(s.body_near(Vector::new(9.0, 0.0), 2.0), Some(BodyId::from_raw(2)));
        assert_eq!(s.body_near(Vector::new(5.0, 0.0), 2.0), None);
        assert_eq!(s.body_near(Vector::new(5.0, 0.0), 100.0), Some(BodyId::from_raw(1)));
    }

    #[test]
    fn report_against_reference() {
        let mut s = sim(SimulationConfig::default(), vec![body("sun", 2e30, 0.0, 0.0), body("rock", 1.0, AU, 0.0)]);
        s.step(1).unwrap();
        let sun = s.report(BodyId::from_raw(1)).unwrap();
        assert_eq!(sun.distance_from_reference, None);
        let rock = s.report(BodyId::from_raw(2)).unwrap();
        assert_eq!(rock.name, "rock");
        let d = rock.distance_from_reference.unwrap();
        assert!(d < AU && d > 0.99 * AU);
        assert!((rock.apogee_au - d / AU).abs() < 1e-12);
        assert!(s.report(BodyId::from_raw(99)).is_none());
    }
}
