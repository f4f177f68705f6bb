pub mod app;

pub use app::bugreport::durations::{BugreportDurationLines, DurationMetrics};
pub use app::collector::{BugreportDurationCollector, CollectorHelper};
pub use app::error::AppError;
