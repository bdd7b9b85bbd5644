//! # psyche-host: Runtime host for psyche instances
//!
//! Everything a game server needs around the game-agnostic `psyche-core`
//! engine:
//!
//! - `session`: a set of independent instances, one per character
//! - `scheduler`: a tokio interval that ticks every instance in a session
//! - `console`: the debug-console command language (`suppress grief --force`)
//! - `syslog`: a bounded, tracing-mirrored gameplay log sink
//! - `narrative`: a bridge that records and forwards narrative events
//! - `settings`: layered TOML + environment configuration
//! - `telemetry`: `tracing-subscriber` setup
//!
//! ```text
//! TickScheduler ──tick──► Session ──► InstanceController ──► SystemLog / NarrativeBridge
//!       ▲                     ▲
//!       └── settings ─────────┴──── console (player commands)
//! ```

pub mod console;
pub mod error;
pub mod narrative;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod syslog;
pub mod telemetry;

pub use console::{parse_command, Command, ConsoleOutput};
pub use error::{HostError, HostResult};
pub use narrative::{NarrativeBridge, NarrativeEvent};
pub use scheduler::{SchedulerHandle, SchedulerStats, TickScheduler};
pub use session::Session;
pub use syslog::BufferedSystemLog;
