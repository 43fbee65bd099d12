pub mod app_config;
pub mod error;
pub mod logging;
pub mod nse;
pub mod screener;
pub mod signals;
pub mod utility;

// Re-exports for convenience
pub use app_config::{AppConfig, ExecutionMode};
pub use error::{ExportError, FetchError, IngestError, ScreenerError};
pub use signals::{AccumulatorState, OptionSnapshotRow, SignalConfig, SignalLabel};
