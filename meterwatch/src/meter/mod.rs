mod rate;
mod reading;
mod simulator;

pub use rate::{WindowStats, estimate, window_stats};
pub use reading::{READING_LOG_CAPACITY, Reading, ReadingId, ReadingLog};
pub use simulator::{FlowDirection, FlowMode, MAX_RANDOM_RATE, MeterSimulator};
