//! Result collection for Session Tunnel runs.
//!
//! The [Collector] is the only thing that writes session and error rows on behalf of the
//! orchestrator. Reading is a pure aggregation over those rows, see [summarize].

mod collector;
mod report;
mod results;

pub use collector::{Collector, CollectorError};
pub use report::{print_results_summary, print_run_list, print_sessions};
pub use results::{
    summarize, ErrorSample, ErrorTypeBreakdown, ResultsOptions, ResultsSummary, RunResults,
    ScenarioBreakdown, DEFAULT_SAMPLE_LIMIT,
};

pub mod prelude {
    pub use crate::{Collector, ResultsOptions, RunResults};
}
