pub mod metrics;
pub mod poller;
pub mod server;

pub use metrics::{CheckStatus, ExporterMetrics};
pub use poller::{ExporterState, PollError, Poller, SharedState};
pub use server::{router, AppState};
