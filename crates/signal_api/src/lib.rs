pub mod remote;
pub mod traits;

pub use remote::{AnalysisRequest, ChatRequest, SignalClient, SignalRequest};
pub use traits::{RemoteResponse, SignalApi};

#[cfg(feature = "mock")]
pub use traits::MockSignalApi;
