use std::path::PathBuf;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_EXPORT_NOT_FOUND: &str = "E-RESOLVE-001";
pub const ERR_DUPLICATE_EXPORT: &str = "E-RESOLVE-002";
pub const ERR_UNSERIALIZABLE: &str = "E-RESOLVE-003";
pub const ERR_ISOLATED_EXECUTION: &str = "E-RESOLVE-004";
pub const ERR_COORDINATOR_UNREACHABLE: &str = "E-NAMING-001";
pub const ERR_COORDINATOR_ROUTE: &str = "E-NAMING-002";
pub const ERR_COORDINATOR_REJECTED: &str = "E-NAMING-003";
pub const ERR_COORDINATOR_BIND: &str = "E-NAMING-004";
pub const ERR_PARSE: &str = "E-SYNTAX-001";
pub const ERR_UNSUPPORTED_IMPORT: &str = "E-IMPORT-001";
pub const ERR_DECLARATION_CONFLICT: &str = "E-INJECT-001";
pub const ERR_INVALID_DECLARATION: &str = "E-INJECT-002";
pub const ERR_CONFIG: &str = "E-CONFIG-001";
pub const ERR_IO: &str = "E-IO-001";

/// Every failure of the build layer. None of them is retried: the worker that
/// hits one stops its compilation unit and the driver aborts the run.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Export name `{name}` not found in {}", module.display())]
    ExportNotFound { name: String, module: PathBuf },

    #[error("Duplicate export name `{name}` in one resolution batch")]
    DuplicateExportName { name: String },

    #[error("Export `{name}` cannot be embedded as a literal: {reason}")]
    UnserializableValue { name: String, reason: String },

    #[error("Isolated execution failed: {0}")]
    IsolatedExecutionFailure(String),

    #[error("Naming coordinator unreachable: {0}")]
    CoordinatorUnreachable(String),

    #[error("Naming coordinator has no route for `{0}`")]
    CoordinatorRouteNotFound(String),

    #[error("Naming coordinator rejected request with status {status}: {body}")]
    CoordinatorRejected { status: u16, body: String },

    #[error("Naming coordinator failed to bind: {0}")]
    Bind(String),

    #[error("Failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Unsupported import in {file}: {message}")]
    UnsupportedImport { file: String, message: String },

    #[error("Injected declaration `{0}` collides with an existing top-level binding")]
    DeclarationConflict(String),

    #[error("`{0}` is not a valid declaration name")]
    InvalidDeclarationName(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable diagnostic code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            BuildError::ExportNotFound { .. } => ERR_EXPORT_NOT_FOUND,
            BuildError::DuplicateExportName { .. } => ERR_DUPLICATE_EXPORT,
            BuildError::UnserializableValue { .. } => ERR_UNSERIALIZABLE,
            BuildError::IsolatedExecutionFailure(_) => ERR_ISOLATED_EXECUTION,
            BuildError::CoordinatorUnreachable(_) => ERR_COORDINATOR_UNREACHABLE,
            BuildError::CoordinatorRouteNotFound(_) => ERR_COORDINATOR_ROUTE,
            BuildError::CoordinatorRejected { .. } => ERR_COORDINATOR_REJECTED,
            BuildError::Bind(_) => ERR_COORDINATOR_BIND,
            BuildError::Parse { .. } => ERR_PARSE,
            BuildError::UnsupportedImport { .. } => ERR_UNSUPPORTED_IMPORT,
            BuildError::DeclarationConflict(_) => ERR_DECLARATION_CONFLICT,
            BuildError::InvalidDeclarationName(_) => ERR_INVALID_DECLARATION,
            BuildError::Config(_) => ERR_CONFIG,
            BuildError::Io { .. } => ERR_IO,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
