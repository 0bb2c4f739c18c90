mod gate;

pub use gate::{InFlightGuard, ShutdownGate, ShutdownState};
