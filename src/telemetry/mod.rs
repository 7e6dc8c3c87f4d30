//! Best-effort hardware telemetry.
//!
//! Snapshots are advisory point samples for the shell's monitor view: every
//! field degrades independently to its zero value when a sensor is missing,
//! and sampling never fails.

pub mod cpu;
pub mod gpu;

pub use cpu::CpuSnapshot;
pub use gpu::GpuSnapshot;
