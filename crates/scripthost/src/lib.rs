#![warn(missing_docs)]

//! A failure-safe bridge between a host application and embedded Rhai
//! scripts.
//!
//! [`ScriptHost`] wraps one engine instance and its global namespace. Every
//! operation that can fail (global lookup, binding, loading, calling) reports
//! the failure to an [`ErrorSink`] and returns a [`ScriptError`]; engine
//! errors never escape in any other form.
//!
//! Host enumerations are described with [`EnumDescriptor`]s (usually via
//! `#[derive(ScriptEnum)]`), collected in an [`EnumRegistry`], and projected
//! into every host through a shared [`EnumCache`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use scripthost::{EnumCache, EnumRegistry, ScriptEnum, ScriptHost, TracingSink};
//!
//! #[derive(ScriptEnum, Clone, Copy)]
//! #[script_enum(name = "Color")]
//! enum Color {
//!     Red = 0,
//!     Green = 1,
//!     #[script_value(hidden)]
//!     Debug = 2,
//! }
//!
//! let mut registry = EnumRegistry::new();
//! registry.register::<Color>()?;
//! let enums = Arc::new(EnumCache::new(registry));
//!
//! let mut host = ScriptHost::builder()
//!     .sink(Arc::new(TracingSink))
//!     .enums(enums)
//!     .build();
//! let green = host.execute_source("Color.Green")?;
//! ```

mod annotations;
mod config;
mod engine;
mod enums;
mod error;
mod host;
mod sink;
mod table;

pub mod testutils;

pub use annotations::{
    DocRegistry, EnumDescriptor, EnumRegistry, EnumValueDescriptor, FunctionDescriptor,
    NO_DESCRIPTION, RegistryError, ScriptEnum, VariableDescriptor,
};
pub use config::HostConfig;
pub use engine::SCRIPT_LOG_TARGET;
pub use enums::{EnumCache, EnumTable, EnumTables};
pub use error::{FailureKind, ScriptError, ScriptErrorInfo, ScriptResult};
pub use host::{CHUNK_ARGS, Chunk, STRING_ORIGIN, ScriptApi, ScriptHost, ScriptHostBuilder};
pub use sink::{ErrorSink, PanicSink, SharedSink, TracingSink, default_sink};
pub use table::Table;

pub use rhai::{Array, Dynamic, Engine, FnPtr, Map};
pub use scripthost_macros::ScriptEnum;
