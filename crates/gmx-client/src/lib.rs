//! gmx client: find instrumented processes and poll their values.
//!
//! - `discovery`: scan the socket directory, identify each live endpoint by
//!   its `os.args`, resolve a program name to exactly one process.
//! - `poll`: select keys by regex and sample them at a fixed interval.

pub mod discovery;
pub mod poll;

pub use discovery::{Process, Resolution};
pub use poll::{PollOptions, Poller};
