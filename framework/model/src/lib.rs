//! Record types shared by every Session Tunnel component.
//!
//! A [RunRecord] owns a snapshot of the [RunConfig] it was started with. Each spawned
//! [ClientSession] belongs to exactly one run, and each [TestError] belongs to one session.

mod config;
mod ids;
mod jsonl;
mod record;
mod stats;

pub use config::{RunConfig, ScenarioWeight, DEFAULT_TEST_DATA_PREFIX};
pub use ids::{ClientId, RunId};
pub use jsonl::{append_json_line, load_json_lines};
pub use record::{
    ClientSession, ErrorType, ResourceKind, ResourceRef, RunRecord, RunStatus, SessionStatus,
    StepRecord, StepStatus, TestError,
};
pub use stats::{LiveSession, RunStats};
