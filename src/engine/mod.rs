// =============================================================================
// Engine — cycle assembly, snapshot cache and scheduling
// =============================================================================

pub mod assembler;
pub mod cache;
pub mod scheduler;

pub use assembler::SnapshotAssembler;
pub use cache::{SnapshotCache, SnapshotSlot};
pub use scheduler::Scheduler;
