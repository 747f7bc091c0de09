//! # Mango Build Native
//!
//! Build-time coordination layer of the Mango JSX compiler.
//!
//! ## Naming
//!
//! Style classes and component props are minified through one
//! [`NamingCoordinator`] per build. Workers reach it over loopback HTTP with a
//! [`NamingClient`]; a single task owns the [`NamingTable`], so ordinals are
//! gap-free and stable across every concurrent caller:
//!
//! - `/classes/<a,b>` and `/props/<a,b>` return `{ "a": "a1", "b": "a2" }`
//! - ordinals start at 1 per namespace and are never reused in a run
//!
//! ## Dynamic exports
//!
//! Imports from `*.ssg`, `*.ssr` and `*.remote` modules are lifted into an
//! [`ExportBatch`] and resolved by an [`ExportResolver`] in an isolated
//! context (its own thread and module registry). Each export becomes:
//!
//! 1. `ssg`: a literal deep-equal to the exported value
//! 2. `ssr`: the string `"<hash>#<name>"`
//! 3. `remote`: `lookup("<hash>@<name>")`
//!
//! The [`injector`] splices the results after the unit's last import.
//!
//! Every failure is a [`BuildError`] and aborts the build.

pub mod collector;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod driver;
pub mod dynamic_imports;
pub mod error;
pub mod injector;
pub mod logging;
pub mod module_host;
pub mod naming;
pub mod naming_client;
pub mod resolver;
pub mod scope;
pub mod static_eval;
pub mod transform;
pub mod value;

#[cfg(test)]
mod coordinator_tests;

pub use config::BuildConfig;
pub use coordinator::{CoordinatorStats, NamingCoordinator, RunningCoordinator};
pub use driver::{build, BuildSummary};
pub use error::{BuildError, Result};
pub use module_host::{HostKind, HostSpec, ModuleHost};
pub use naming::{Assignments, Namespace, NamingTable};
pub use naming_client::NamingClient;
pub use resolver::{
    EmbeddingKind, ExportBatch, ExportRequest, ExportResolver, Representation, ResolvedExports,
};
pub use transform::{CompilationUnit, UnitKind, UnitOutput, UnitTransformer};
pub use value::ExportValue;
