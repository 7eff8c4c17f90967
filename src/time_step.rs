use crate::math::Vec2;

/// This is an internal structure.
#[derive(Copy, Clone, Debug)]
pub struct TimeStep {
    /// time step
    pub dt: f32,
    /// inverse time step (0 if dt == 0).
    pub inv_dt: f32,
    /// dt * inv_dt0
    pub dt_ratio: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}

/// Island-local center position and angle.
#[derive(Copy, Clone, Debug, Default)]
pub struct Position {
    pub c: Vec2,
    pub a: f32,
}

/// Island-local linear and angular velocity.
#[derive(Copy, Clone, Debug, Default)]
pub struct Velocity {
    pub v: Vec2,
    pub w: f32,
}

/// Solver state passed into joint constraint functions; positions and
/// velocities are indexed by island-local body index.
pub(crate) struct SolverData<'a> {
    pub step: TimeStep,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}
