//! Export Resolver
//!
//! Resolves a batch of dynamic-export requests in an isolated context. Each
//! batch gets its own OS thread and a freshly instantiated [`ModuleHost`], so
//! target-module code never runs on a compiler worker and no module registry
//! is shared between batches. The context reports back over a one-shot channel
//! with a serialized success or failure message; a panic inside it is caught
//! at the thread boundary and reported as a failure.

use crate::error::{BuildError, Result};
use crate::module_host::{HostSpec, ModuleHost};
use crate::value::ExportValue;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;

pub const DEFAULT_RUNTIME_LOOKUP: &str = "Mango.n";

/// How a resolved export is represented in generated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingKind {
    /// Inlined as a literal equal to the exported value.
    #[serde(rename = "ssg", alias = "staticGenerate")]
    StaticGenerate,
    /// `"<hash>#<name>"`, looked up server-side.
    #[serde(rename = "ssr", alias = "serverReference")]
    ServerReference,
    /// `lookup("<hash>@<name>")`, looked up by the client runtime.
    #[serde(rename = "remote", alias = "clientReference")]
    ClientReference,
}

impl EmbeddingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingKind::StaticGenerate => "ssg",
            EmbeddingKind::ServerReference => "ssr",
            EmbeddingKind::ClientReference => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub kind: EmbeddingKind,
    pub module_path: PathBuf,
    pub content_hash: String,
    pub export_names: Vec<String>,
}

pub type ExportBatch = Vec<ExportRequest>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Representation {
    Literal { value: ExportValue, source: String },
    ServerReference { key: String },
    ClientReference { callee: String, key: String },
}

impl Representation {
    /// JavaScript expression text for the declaration initializer.
    pub fn to_source(&self) -> String {
        match self {
            Representation::Literal { source, .. } => source.clone(),
            Representation::ServerReference { key } => quote(key),
            Representation::ClientReference { callee, key } => format!("{}({})", callee, quote(key)),
        }
    }
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Resolved exports in request order. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedExports {
    entries: Vec<(String, Representation)>,
}

impl ResolvedExports {
    pub fn get(&self, name: &str) -> Option<&Representation> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Representation)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// `(name, initializer source)` pairs ready for injection.
    pub fn declarations(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(name, repr)| (name.clone(), repr.to_source()))
            .collect()
    }

    fn push(&mut self, name: String, representation: Representation) {
        self.entries.push((name, representation));
    }
}

/// Failure as it crosses the isolated-context boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResolveFailure {
    ExportNotFound { name: String, module: PathBuf },
    DuplicateExportName { name: String },
    UnserializableValue { name: String, reason: String },
    Execution { message: String },
}

impl From<ResolveFailure> for BuildError {
    fn from(failure: ResolveFailure) -> Self {
        match failure {
            ResolveFailure::ExportNotFound { name, module } => BuildError::ExportNotFound { name, module },
            ResolveFailure::DuplicateExportName { name } => BuildError::DuplicateExportName { name },
            ResolveFailure::UnserializableValue { name, reason } => {
                BuildError::UnserializableValue { name, reason }
            }
            ResolveFailure::Execution { message } => BuildError::IsolatedExecutionFailure(message),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum IsolateMessage {
    Success { exports: ResolvedExports },
    Failure { error: ResolveFailure },
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLUTION (runs inside the isolated context)
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolve every entry of `batch` against `host`. Export names share one
/// scope across the whole batch; the first failure aborts it.
pub fn resolve_in_context(
    batch: &[ExportRequest],
    host: &mut dyn ModuleHost,
    runtime_lookup: &str,
) -> std::result::Result<ResolvedExports, ResolveFailure> {
    let mut table = ResolvedExports::default();

    for request in batch {
        let module = host.load(&request.module_path).map_err(|message| ResolveFailure::Execution {
            message: format!("{}: {}", request.module_path.display(), message),
        })?;

        for name in &request.export_names {
            let Some(slot) = module.slot(name) else {
                return Err(ResolveFailure::ExportNotFound {
                    name: name.clone(),
                    module: request.module_path.clone(),
                });
            };
            if table.contains(name) {
                return Err(ResolveFailure::DuplicateExportName { name: name.clone() });
            }

            let representation = match request.kind {
                EmbeddingKind::StaticGenerate => {
                    let value = slot.clone().map_err(|message| ResolveFailure::Execution {
                        message: format!(
                            "cannot evaluate export `{}` of {}: {}",
                            name,
                            request.module_path.display(),
                            message
                        ),
                    })?;
                    let source = value.to_literal(name).map_err(|e| match e {
                        BuildError::UnserializableValue { name, reason } => {
                            ResolveFailure::UnserializableValue { name, reason }
                        }
                        other => ResolveFailure::Execution {
                            message: other.to_string(),
                        },
                    })?;
                    Representation::Literal { value, source }
                }
                EmbeddingKind::ServerReference => Representation::ServerReference {
                    key: format!("{}#{}", request.content_hash, name),
                },
                EmbeddingKind::ClientReference => Representation::ClientReference {
                    callee: runtime_lookup.to_string(),
                    key: format!("{}@{}", request.content_hash, name),
                },
            };
            table.push(name.clone(), representation);
        }
    }

    Ok(table)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ISOLATED CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ExportResolver {
    host: HostSpec,
    runtime_lookup: String,
    timeout: Option<Duration>,
}

impl Default for ExportResolver {
    fn default() -> Self {
        Self::new(HostSpec::default(), DEFAULT_RUNTIME_LOOKUP)
    }
}

impl ExportResolver {
    pub fn new(host: HostSpec, runtime_lookup: impl Into<String>) -> Self {
        Self {
            host,
            runtime_lookup: runtime_lookup.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn runtime_lookup(&self) -> &str {
        &self.runtime_lookup
    }

    /// Resolve one batch in a fresh isolated context and wait for its result
    /// without blocking the calling worker.
    pub async fn resolve_batch(&self, batch: ExportBatch) -> Result<ResolvedExports> {
        if batch.is_empty() {
            return Ok(ResolvedExports::default());
        }
        let requested: usize = batch.iter().map(|r| r.export_names.len()).sum();
        tracing::debug!(
            entries = batch.len(),
            exports = requested,
            host = ?self.host.kind,
            "Resolving export batch"
        );

        let (tx, rx) = oneshot::channel::<String>();
        let host = self.host.clone();
        let runtime_lookup = self.runtime_lookup.clone();

        std::thread::Builder::new()
            .name("export-resolver".to_string())
            .spawn(move || {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut host = host.instantiate();
                    resolve_in_context(&batch, host.as_mut(), &runtime_lookup)
                }));
                let message = match outcome {
                    Ok(Ok(exports)) => IsolateMessage::Success { exports },
                    Ok(Err(error)) => IsolateMessage::Failure { error },
                    Err(panic) => IsolateMessage::Failure {
                        error: ResolveFailure::Execution {
                            message: panic_message(panic.as_ref()),
                        },
                    },
                };
                let _ = tx.send(serde_json::to_string(&message).unwrap_or_default());
            })
            .map_err(|e| {
                BuildError::IsolatedExecutionFailure(format!("failed to start isolated context: {}", e))
            })?;

        let received = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, rx).await.map_err(|_| {
                BuildError::IsolatedExecutionFailure(format!(
                    "export resolution did not finish within {}s",
                    limit.as_secs_f64()
                ))
            })?,
            None => rx.await,
        };
        let payload = received.map_err(|_| {
            BuildError::IsolatedExecutionFailure("isolated context exited without a result".to_string())
        })?;
        let message: IsolateMessage = serde_json::from_str(&payload).map_err(|e| {
            BuildError::IsolatedExecutionFailure(format!("unreadable isolated context result: {}", e))
        })?;

        match message {
            IsolateMessage::Success { exports } => {
                tracing::debug!(resolved = exports.len(), "Export batch resolved");
                Ok(exports)
            }
            IsolateMessage::Failure { error } => {
                let error = BuildError::from(error);
                tracing::warn!(code = error.code(), error = %error, "Export batch failed");
                Err(error)
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("isolated context panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("isolated context panicked: {}", s)
    } else {
        "isolated context panicked".to_string()
    }
}
