mod orchestrator;
mod signals;
mod supervisor;
mod timer;
mod types;


pub use orchestrator::{Application, RunningApplication};
pub use signals::install_signal_handlers;
pub use supervisor::{ShutdownSupervisor, ShutdownSupervisorBuilder};
pub use timer::{ForcedExitTimer, TimerState};
pub use types::{ExitPath, ShutdownOutcome, ShutdownTrigger, StopHandle, StopReason, StopRequests};
