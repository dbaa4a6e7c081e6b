//! What a simulation write means for its devices.

use devsim_core::Simulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Devices are unaffected.
    None,
    /// (Re-)provision the simulation's devices.
    Provision,
    /// Disconnect the simulation's devices.
    Stop,
}

impl LifecycleAction {
    /// Action for replacing `previous` (if any) with `next`.
    pub fn for_write(previous: Option<&Simulation>, next: &Simulation) -> Self {
        match (previous, next.enabled) {
            (None, true) => Self::Provision,
            (Some(prev), true) if !prev.enabled => Self::Provision,
            (Some(prev), true) if devices_changed(prev, next) => Self::Provision,
            (Some(prev), false) if prev.enabled => Self::Stop,
            _ => Self::None,
        }
    }

    /// Action for deleting a simulation.
    pub fn for_delete(_previous: &Simulation) -> Self {
        Self::Stop
    }
}

fn devices_changed(previous: &Simulation, next: &Simulation) -> bool {
    previous.device_models != next.device_models || previous.hubs() != next.hubs()
}
