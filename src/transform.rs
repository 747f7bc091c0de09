//! Per-unit transform pipeline.
//!
//! A script unit goes through two synchronous phases around its awaits:
//!
//! 1. parse, collect prop names, lift dynamic imports into an export batch,
//!    print the program;
//! 2. after naming and resolution, reparse the printed code, inject the
//!    resolved declarations and print again.
//!
//! No AST lives across an await, so a unit's future stays `Send` and the
//! worker is free while it waits on the coordinator or a resolver batch.
//! A style unit collects its class names, asks for their short names and
//! rewrites its selectors.

use crate::collector::{collect_classes, collect_props, rewrite_classes};
use crate::dynamic_imports::extract_dynamic_imports;
use crate::error::{BuildError, Result};
use crate::injector::inject_declarations;
use crate::naming::{Assignments, Namespace};
use crate::naming_client::NamingClient;
use crate::resolver::{ExportBatch, ExportResolver};
use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Script,
    Style,
}

impl UnitKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "js" | "mjs" | "ts" | "jsx" | "tsx" => Some(UnitKind::Script),
            "css" => Some(UnitKind::Style),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub path: PathBuf,
    /// Path below the source directory; outputs mirror it.
    pub relative: PathBuf,
    pub kind: UnitKind,
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct UnitOutput {
    pub relative: PathBuf,
    pub code: String,
    /// False when the unit was passed through untouched.
    pub transformed: bool,
    pub classes: Assignments,
    pub props: Assignments,
    pub resolved_exports: usize,
}

pub(crate) fn source_type_for(path: &Path) -> SourceType {
    SourceType::from_path(path)
        .unwrap_or_default()
        .with_module(true)
        .with_jsx(true)
}

pub(crate) fn parse_module<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    source_type: SourceType,
    file: &Path,
) -> Result<Program<'a>> {
    let ret = Parser::new(allocator, source, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        return Err(BuildError::Parse {
            file: file.display().to_string(),
            message: ret
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unrecoverable syntax error".to_string()),
        });
    }
    Ok(ret.program)
}

/// Plain `.js`/`.ts`/`.mjs` units opt in with a leading `// <marker>` or
/// `/* <marker> */` comment. JSX units always take part.
pub fn is_opted_in(path: &Path, source: &str, marker: &str) -> bool {
    if matches!(path.extension().and_then(|e| e.to_str()), Some("jsx" | "tsx")) {
        return true;
    }
    let mut rest = source.trim_start_matches('\u{feff}');
    if rest.starts_with("#!") {
        rest = rest.split_once('\n').map_or("", |(_, tail)| tail);
    }
    loop {
        rest = rest.trim_start();
        if let Some(line) = rest.strip_prefix("//") {
            let (comment, tail) = line.split_once('\n').unwrap_or((line, ""));
            if comment.trim() == marker {
                return true;
            }
            rest = tail;
        } else if let Some(block) = rest.strip_prefix("/*") {
            let Some((comment, tail)) = block.split_once("*/") else {
                return false;
            };
            if comment.trim() == marker {
                return true;
            }
            rest = tail;
        } else {
            return false;
        }
    }
}

struct PreparedScript {
    code: String,
    props: Vec<String>,
    batch: ExportBatch,
}

fn prepare_script(unit: &CompilationUnit) -> Result<PreparedScript> {
    let allocator = Allocator::default();
    let mut program = parse_module(&allocator, &unit.source, source_type_for(&unit.path), &unit.path)?;
    let props = collect_props(&program);
    let batch = extract_dynamic_imports(&mut program, &unit.path)?;
    let code = Codegen::new().build(&program).code;
    Ok(PreparedScript { code, props, batch })
}

fn finish_script(code: &str, path: &Path, declarations: &[(String, String)]) -> Result<String> {
    let allocator = Allocator::default();
    let mut program = parse_module(&allocator, code, source_type_for(path), path)?;
    inject_declarations(&allocator, &mut program, declarations)?;
    Ok(Codegen::new().build(&program).code)
}

/// Everything a worker needs to transform units. Cheap to share.
#[derive(Debug, Clone)]
pub struct UnitTransformer {
    naming: Option<NamingClient>,
    resolver: ExportResolver,
    marker: String,
}

impl UnitTransformer {
    /// Without a naming client, no short names are requested and style units
    /// pass through.
    pub fn new(naming: Option<NamingClient>, resolver: ExportResolver, marker: impl Into<String>) -> Self {
        Self {
            naming,
            resolver,
            marker: marker.into(),
        }
    }

    pub async fn transform(&self, unit: &CompilationUnit) -> Result<UnitOutput> {
        let output = match unit.kind {
            UnitKind::Script => self.transform_script(unit).await,
            UnitKind::Style => self.transform_style(unit).await,
        };
        if let Err(e) = &output {
            tracing::error!(file = %unit.relative.display(), code = e.code(), error = %e, "Unit failed");
        }
        output
    }

    async fn transform_script(&self, unit: &CompilationUnit) -> Result<UnitOutput> {
        if !is_opted_in(&unit.path, &unit.source, &self.marker) {
            tracing::debug!(file = %unit.relative.display(), "Script not opted in");
            return Ok(passthrough(unit));
        }

        let prepared = prepare_script(unit)?;

        let props = match &self.naming {
            Some(client) => client.assign(Namespace::Prop, &prepared.props).await?,
            None => Assignments::new(),
        };
        let resolved = self.resolver.resolve_batch(prepared.batch).await?;

        let code = if resolved.is_empty() {
            prepared.code
        } else {
            finish_script(&prepared.code, &unit.path, &resolved.declarations())?
        };

        tracing::debug!(
            file = %unit.relative.display(),
            props = props.len(),
            resolved = resolved.len(),
            "Script transformed"
        );
        Ok(UnitOutput {
            relative: unit.relative.clone(),
            code,
            transformed: true,
            classes: Assignments::new(),
            props,
            resolved_exports: resolved.len(),
        })
    }

    async fn transform_style(&self, unit: &CompilationUnit) -> Result<UnitOutput> {
        let Some(client) = &self.naming else {
            return Ok(passthrough(unit));
        };
        let classes = collect_classes(&unit.source);
        let names = client.assign(Namespace::Class, &classes).await?;
        let code = rewrite_classes(&unit.source, &names);
        tracing::debug!(file = %unit.relative.display(), classes = names.len(), "Style transformed");
        Ok(UnitOutput {
            relative: unit.relative.clone(),
            code,
            transformed: true,
            classes: names,
            props: Assignments::new(),
            resolved_exports: 0,
        })
    }
}

fn passthrough(unit: &CompilationUnit) -> UnitOutput {
    UnitOutput {
        relative: unit.relative.clone(),
        code: unit.source.clone(),
        ..UnitOutput::default()
    }
}
