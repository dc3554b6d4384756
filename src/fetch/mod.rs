pub mod chunks;
pub mod history;

pub use chunks::{date_chunks, DateChunk};
pub use history::{Candle, HistoryClient, DATA_BASE_URL};
