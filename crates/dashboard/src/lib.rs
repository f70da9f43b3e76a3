pub mod controller;
pub mod view;

pub use controller::{
    ChartBuffer, FetchOutcome, PollHandle, SignalState, SignalSyncController, UiState,
};
pub use view::{ChartSummary, Status, Tone, ViewState};
