pub mod analysis_response;
pub mod chat_response;
pub mod journal_response;
pub mod lenient;
pub mod quick_signal_response;
pub mod signal_client;
pub mod signal_response;

pub use analysis_response::{AnalysisRequest, AnalysisResponse};
pub use chat_response::{ChatRequest, ChatResponse};
pub use journal_response::JournalRowResponse;
pub use quick_signal_response::{QuickSignalResponse, SignalRequest};
pub use signal_client::SignalClient;
pub use signal_response::{CandleResponse, SignalFields, SignalResponse};
