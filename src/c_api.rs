//! C ABI used by the host application (renderer and scripting layers).
//!
//! Handles are `BodyId::raw()` values; 0 means "no body".

use crate::{
    body::{Body, Color},
    config::SimulationConfig,
    error::SimulationError,
    simulation::{BodyId, Simulation},
    vector::Vector,
};

use std::ffi::{CStr, c_char};
use tracing::error;

pub const STATUS_OK: i32 = 0;
pub const STATUS_NULL_HANDLE: i32 = -1;
pub const STATUS_DEGENERATE: i32 = 1;
pub const STATUS_INVALID: i32 = 2;

/// Read-only view of a body for the renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyState {
    pub id: u64,
    pub mass: f64,
    pub radius: f64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub color: Color,
    pub apogee: f64,
    pub perigee: f64,
    pub apogee_velocity: f64,
    pub perigee_velocity: f64,
    pub trail_len: usize,
}

impl BodyState {
    fn new(id: BodyId, body: &Body) -> Self {
        let pos = body.position();
        let vel = body.velocity();
        Self {
            id: id.raw(),
            mass: body.mass(),
            radius: body.radius(),
            x: pos.x,
            y: pos.y,
            vx: vel.x,
            vy: vel.y,
            color: body.color(),
            apogee: body.apogee(),
            perigee: body.perigee(),
            apogee_velocity: body.apogee_velocity(),
            perigee_velocity: body.perigee_velocity(),
            trail_len: body.trail().len(),
        }
    }
}

/// Returns null if the parameters are rejected.
#[unsafe(no_mangle)]
pub extern "C" fn Simulation_Create(
    gravitational_constant: f64,
    timestep: f64,
    collisions_enabled: bool,
    seconds_per_tick: f64,
) -> *mut Simulation {
    let config = SimulationConfig {
        gravitational_constant,
        timestep,
        collisions_enabled,
        seconds_per_tick,
        ..SimulationConfig::default()
    };
    match Simulation::new(config) {
        Ok(sim) => Box::into_raw(Box::new(sim)),
        Err(err) => {
            error!(%err, "rejected simulation config");
            std::ptr::null_mut()
        }
    }
}

/// # Safety
/// `handle` must be null or a pointer from `Simulation_Create` or
/// `Simulation_CloneForward` that has not been destroyed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_Destroy(handle: *mut Simulation) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)) };
    }
}

/// Returns `STATUS_DEGENERATE` when two bodies share a centre; nothing is
/// changed by the failing tick.
///
/// # Safety
/// `handle` must be null or a live pointer from `Simulation_Create` or
/// `Simulation_CloneForward`, with no other reference to it alive.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_Step(handle: *mut Simulation, ticks: i64) -> i32 {
    let Some(sim) = (unsafe { handle.as_mut() }) else {
        return STATUS_NULL_HANDLE;
    };
    match sim.step(ticks) {
        Ok(()) => STATUS_OK,
        Err(err @ SimulationError::DegenerateConfiguration { .. }) => {
            error!(%err, "step aborted");
            STATUS_DEGENERATE
        }
        Err(err) => {
            error!(%err, "step failed");
            STATUS_INVALID
        }
    }
}

/// Returns the new body's handle, or 0 if the body was rejected.
///
/// # Safety
/// `handle` as for `Simulation_Step`. `name` must be null or point to a
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_AddBody(
    handle: *mut Simulation,
    mass: f64,
    radius: f64,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    color: Color,
    name: *const c_char,
    trail_resolution: usize,
) -> u64 {
    let Some(sim) = (unsafe { handle.as_mut() }) else {
        return 0;
    };
    let name = if name.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
    };
    match Body::new(mass, radius, Vector::new(x, y), Vector::new(vx, vy), color, name, trail_resolution) {
        Ok(body) => sim.add_body(body).raw(),
        Err(err) => {
            error!(%err, "rejected body");
            0
        }
    }
}

/// # Safety
/// `handle` must be null or a live pointer from `Simulation_Create` or
/// `Simulation_CloneForward`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_GetBodyCount(handle: *const Simulation) -> usize {
    unsafe { handle.as_ref() }.map_or(0, |sim| sim.len())
}

/// Copies the body at `index` (insertion order) into `out`.
///
/// # Safety
/// `handle` must be null or a live pointer from `Simulation_Create` or
/// `Simulation_CloneForward`.
/// `out` must be null or valid for writing one `BodyState`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_GetBody(handle: *const Simulation, index: usize, out: *mut BodyState) -> bool {
    let (Some(sim), Some(out)) = (unsafe { handle.as_ref() }, unsafe { out.as_mut() }) else {
        return false;
    };
    match sim.bodies().nth(index) {
        Some((id, body)) => {
            *out = BodyState::new(id, body);
            true
        }
        None => false,
    }
}

/// Writes up to `capacity` trail points as interleaved `x, y` pairs into
/// `out`, oldest first. Returns the number of points written.
///
/// # Safety
/// `handle` must be null or a live pointer from `Simulation_Create` or
/// `Simulation_CloneForward`.
/// `out` must be null or valid for writing `2 * min(capacity, trail length)`
/// doubles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_GetTrail(handle: *const Simulation, id: u64, out: *mut f64, capacity: usize) -> usize {
    let Some(body) = (unsafe { handle.as_ref() }).and_then(|sim| sim.get(BodyId::from_raw(id))) else {
        return 0;
    };
    if out.is_null() {
        return 0;
    }
    let count = body.trail().len().min(capacity);
    let out = unsafe { std::slice::from_raw_parts_mut(out, count * 2) };
    for (point, slot) in body.trail().zip(out.chunks_exact_mut(2)) {
        slot[0] = point.x;
        slot[1] = point.y;
    }
    count
}

/// Returns 0 when no body has that name.
///
/// # Safety
// `handle` must be null or a live pointer from `Simulation_Create` or
/// `Simulation_CloneForward`.
/// `name` must be null or point to a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_FindByName(handle: *const Simulation, name: *const c_char) -> u64 {
    let Some(sim) = (unsafe { handle.as_ref() }) else {
        return 0;
    };
    if name.is_null() {
        return 0;
    }
    let name = unsafe { CStr::from_ptr(name) }.to_string_lossy();
    sim.find_by_name(&name).map_or(0, BodyId::raw)
}

/// # Safety
/// `handle` must be null or a live pointer from `Simulation_Create` or
/// `Simulation_CloneForward`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_GetSecondsPerTick(handle: *const Simulation) -> f64 {
    unsafe { handle.as_ref() }.map_or(0.0, |sim| sim.seconds_per_tick())
}

/// # Safety
/// `handle` as for `Simulation_Step`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_SetSecondsPerTick(handle: *mut Simulation, seconds: f64) -> i32 {
    let Some(sim) = (unsafe { handle.as_mut() }) else {
        return STATUS_NULL_HANDLE;
    };
    match sim.set_seconds_per_tick(seconds) {
        Ok(()) => STATUS_OK,
        Err(err) => {
            error!(%err, "rejected seconds per tick");
            STATUS_INVALID
        }
    }
}

/// # Safety
/// `handle` must be null or a live pointer from `Simulation_Create` or
/// `Simulation_CloneForward`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_GetDayCount(handle: *const Simulation) -> i64 {
    unsafe { handle.as_ref() }.map_or(0, |sim| sim.day_count())
}

/// Independent copy for forward previews; free it with `Simulation_Destroy`.
/// Returns null on allocation failure.
///
/// # Safety
/// `handle` must be null or a live pointer from `Simulation_Create` or
/// `Simulation_CloneForward`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn Simulation_CloneForward(handle: *const Simulation) -> *mut Simulation {
    let Some(sim) = (unsafe { handle.as_ref() }) else {
        return std::ptr::null_mut();
    };
    match sim.clone_for_forward_simulation() {
        Ok(clone) => Box::into_raw(Box::new(clone)),
        Err(err) => {
            error!(%err, "forward clone failed");
            std::ptr::null_mut()
        }
    }
}
