pub mod config;
pub mod models;
pub mod nse_client;
pub mod nse_commands;

// Re-exports (public API)
pub use models::{Instrument, OptionChain, OptionData, OptionDetail};
pub use nse_client::{ist_now, select_expiry, NseClient};
pub use nse_commands::{process_and_export, process_snapshot, CycleReport, NseCommands};
