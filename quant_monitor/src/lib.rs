pub mod config;
pub mod dashboard;
pub mod error;
pub mod log_window;
pub mod merge;
pub mod models;
pub mod queue;
pub mod scheduler;
pub mod sort;
pub mod source;
pub mod stats;
pub mod transport;

pub use dashboard::{DashboardHandle, DashboardView, LiveDashboard};
pub use error::FetchError;
pub use models::*;
