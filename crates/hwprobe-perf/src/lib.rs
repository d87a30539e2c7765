//! Benchmarking helpers that sit next to topology detection: sample statistics, timer
//! resolution probing and (stubbed) thread placement.

pub mod affinity;
pub mod stats;
pub mod timer;

pub use affinity::{set_thread_affinity, AffinityError};
pub use stats::{almost_equal, RunningStat, Samples, Shape, Summary};
pub use timer::{SpinMode, TimerConfig, TimerReport};
