pub mod config;
pub mod detector;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod matcher;
pub mod scan;
pub mod template;

pub use config::{Config, Rule};
pub use error::{LauncherError, Result};
pub use history::HistoryStore;
pub use scan::{ScanReport, Scanner};
