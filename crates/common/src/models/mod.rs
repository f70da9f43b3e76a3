pub mod journal;
pub mod query;
pub mod sample;
pub mod signal;
pub mod trade;

pub use journal::JournalEntry;
pub use query::{Market, Query, QueryMode, SymbolParams};
pub use sample::{BufferPolicy, Candle, Sample};
pub use signal::{Analysis, ChatReply, QuickSignal, SignalAction, SignalReport};
pub use trade::{TradeKind, TradeOrder, TradeParams};
