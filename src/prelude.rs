//! Convenient re-exports for common use.

pub use crate::config::{Config, ConfigBuilder};
pub use crate::context::{
    concurrent_background_context, concurrent_default_context, main_context, ExecutionContext,
};
pub use crate::error::{Error, Result};
pub use crate::executor::{install_main_thread, is_main_thread, MainLoop, Qos};
