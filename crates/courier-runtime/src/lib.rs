//! Polling runtime tying the courier pipeline together.
//!
//! One sequential loop per upstream: scan, dedup, extract, route, sleep.
//! The recovery supervisor watches every cycle and decides when the
//! session gets torn down and rebuilt.

pub mod engine;
pub mod supervisor;

pub use engine::{CourierEngine, CycleReport, EngineConfig};
pub use supervisor::{
    CycleOutcome, RecoverySupervisor, SupervisorAction, SupervisorConfig, SupervisorState,
};
