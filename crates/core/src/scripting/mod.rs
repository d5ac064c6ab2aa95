//! External GIS script invocation.
//!
//! Maps each [`JobType`](crate::job::JobType) to a [`ScriptDescriptor`]
//! (interpreter, script path, argument encoding), spawns the process, and
//! turns its output streams into complete lines. All subprocess management is
//! pure (no HTTP, no registry state) and lives in the `core` crate for
//! isolation and testability.

pub mod catalog;
pub mod executor;
pub mod subprocess;

pub use catalog::ScriptCatalog;
pub use executor::{ArgEncoding, ScriptDescriptor, ScriptError, ScriptOutput};
pub use subprocess::{ExitOutcome, ProcessEvent};
