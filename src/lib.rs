//! strand - identity-aware execution contexts
//!
//! An [`ExecutionContext`] is a handle on a logical place where work runs:
//! the designated main thread, a concurrent pool at some QoS tier, or a
//! serial lane created on demand. Work can be scheduled onto it
//! immediately, synchronously or after a delay, and the context knows when
//! the caller is already running on it, so that:
//!
//! - `sync` onto the context you are already on runs inline instead of
//!   deadlocking a serial lane,
//! - `async_` from inside the context skips the thread hop,
//! - `just_dispatch` and `after` always go through the queue when a
//!   scheduling boundary is wanted.
//!
//! # Quick Start
//!
//! ```no_run
//! use strand_rs::prelude::*;
//!
//! let io = ExecutionContext::create(Some("io"), Qos::Utility);
//!
//! let answer = io.sync(|| 6 * 7);
//! assert_eq!(answer, 42);
//!
//! let ui = main_context().clone();
//! io.async_(move || {
//!     let result = 42;
//!     ui.async_(move || println!("result: {}", result));
//! });
//!
//! // On the thread that should act as the main thread:
//! let main_loop = install_main_thread().unwrap();
//! main_loop.run_for(std::time::Duration::from_millis(100));
//! ```
//!
//! The platform layer in [`executor`] (pools, lanes, timer, main loop) is
//! deliberately primitive: no work stealing and no adaptive scheduling.

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod prelude;

// Re-export key types at crate root
pub use config::{configure, Config, ConfigBuilder};
pub use context::{
    concurrent_background_context, concurrent_default_context, main_context, ExecutionContext,
};
pub use error::{Error, Result};
pub use executor::{
    install_main_thread, is_main_thread, MainLoop, NativeQueue, PanicStrategy, Qos, QueueStats,
    StopHandle,
};
