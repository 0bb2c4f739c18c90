//! Membership of this worker in a multi-process cluster.

mod registration;

#[cfg(test)]
pub(crate) mod testing;


#[cfg(unix)]
pub use registration::ParentSignalWorker;
pub use registration::{
    DeregisterOutcome, StandaloneWorker, WorkerHandle, WorkerRegistration, WorkerState,
};
