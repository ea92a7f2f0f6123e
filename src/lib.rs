#![deny(unsafe_code)]

//! solvra_rtti – runtime type identity and fail-fast fault reporting for
//! natively compiled SolvraScript programs.
//!
//! * [`registry`] – the process-wide, immutable set of type descriptors built
//!   once from compiler metadata.
//! * [`cast`] – the pure cast validator deciding whether a value may be viewed
//!   as another declared type.
//! * [`guard`] – the null guard for dereference sites.
//! * [`fault`] – fault taxonomy, call-trace collection and the reporter that
//!   prints the diagnostic and ends the process.
//! * [`runtime`] – the installed context and the entry points generated code
//!   calls, which turn any fault into process termination.
//!
//! Only the reporter and the `ffi` entry points terminate the process; every
//! other API returns a `Result` so it can be tested in-process.

pub mod cast;
pub mod config;
pub mod descriptor;
pub mod fault;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod guard;
pub mod logging;
pub mod registry;
pub mod runtime;

pub use cast::{CastRule, CastValidator, DowncastPolicy};
pub use config::RtConfig;
pub use descriptor::{ObjectHeader, TypeDescriptor, TypeHandle, TypeId, Typed};
pub use fault::{Fault, FaultKind, FaultReporter};
pub use registry::{RegistryBuilder, RegistryError, RegistryManifest, TypeRegistry};
pub use runtime::{RuntimeContext, RuntimeError};
