pub mod chart_buffer;
pub mod poller;
pub mod state;
pub mod sync_controller;

pub use chart_buffer::ChartBuffer;
pub use poller::PollHandle;
pub use state::{SignalState, UiState};
pub use sync_controller::{FetchOutcome, SignalSyncController};
