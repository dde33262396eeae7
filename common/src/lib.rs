pub mod config;
pub mod detector;
pub mod monitor;
pub mod record;
pub mod types;

pub use config::{ConfigError, ConfigFile, ConfigOverrides, WatchdogConfig};
pub use detector::restart_needed;
pub use monitor::{MonitorAction, MonitorPhase, PollState};
pub use record::ObservationRecord;
pub use types::{HvacMode, HvacState, Reading, Sample};
