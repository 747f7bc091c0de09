//! Dynamic import discovery.
//!
//! Named imports from `*.ssg`, `*.ssr` and `*.remote` modules are not real
//! imports: they ask the Export Resolver for a value to embed. This pass
//! turns them into an [`ExportBatch`] and removes them from the program, so
//! the injected declarations take over the imported local names.

use crate::error::{BuildError, Result};
use crate::resolver::{EmbeddingKind, ExportBatch, ExportRequest};
use oxc_ast::ast::{ImportDeclaration, ImportDeclarationSpecifier, Program, Statement};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

lazy_static::lazy_static! {
    static ref DYNAMIC_SOURCE: Regex =
        Regex::new(r"\.(ssg|ssr|remote)(\.js)?$").expect("dynamic source pattern is valid");
}

/// Embedding kind requested by an import source, if it is a dynamic import.
pub fn embedding_kind(source: &str) -> Option<EmbeddingKind> {
    let caps = DYNAMIC_SOURCE.captures(source)?;
    match caps.get(1)?.as_str() {
        "ssg" => Some(EmbeddingKind::StaticGenerate),
        "ssr" => Some(EmbeddingKind::ServerReference),
        "remote" => Some(EmbeddingKind::ClientReference),
        _ => None,
    }
}

/// First 16 hex digits of the SHA-256 of a module's source.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Target path of a dynamic import, relative to the importing file.
pub fn resolve_module_path(importer: &Path, source: &str) -> PathBuf {
    let base = importer.parent().unwrap_or_else(|| Path::new(""));
    if source.ends_with(".js") {
        base.join(source)
    } else {
        base.join(format!("{}.js", source))
    }
}

/// Collect every dynamic import of `program` into a batch and remove the
/// import declarations. Type-only imports are left alone.
pub fn extract_dynamic_imports(program: &mut Program<'_>, file: &Path) -> Result<ExportBatch> {
    let mut batch = ExportBatch::new();
    for stmt in program.body.iter() {
        let Statement::ImportDeclaration(decl) = stmt else {
            continue;
        };
        if decl.import_kind.is_type() {
            continue;
        }
        let Some(kind) = embedding_kind(decl.source.value.as_str()) else {
            continue;
        };
        batch.push(request_for(decl, kind, file)?);
    }

    if !batch.is_empty() {
        program.body.retain(|stmt| match stmt {
            Statement::ImportDeclaration(decl) => {
                decl.import_kind.is_type() || embedding_kind(decl.source.value.as_str()).is_none()
            }
            _ => true,
        });
    }
    Ok(batch)
}

fn request_for(decl: &ImportDeclaration<'_>, kind: EmbeddingKind, file: &Path) -> Result<ExportRequest> {
    let unsupported = |message: String| BuildError::UnsupportedImport {
        file: file.display().to_string(),
        message,
    };
    let source = decl.source.value.as_str();

    let mut export_names = Vec::new();
    for specifier in decl.specifiers.iter().flatten() {
        match specifier {
            ImportDeclarationSpecifier::ImportSpecifier(spec) => {
                if spec.import_kind.is_type() {
                    continue;
                }
                let imported = spec.imported.name();
                if imported.as_str() != spec.local.name.as_str() {
                    return Err(unsupported(format!(
                        "`{} as {}` from \"{}\": aliased imports cannot be embedded",
                        imported, spec.local.name, source
                    )));
                }
                export_names.push(imported.to_string());
            }
            ImportDeclarationSpecifier::ImportDefaultSpecifier(_)
            | ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => {
                return Err(unsupported(format!(
                    "\"{}\": only named imports are supported for {} imports",
                    source,
                    kind.as_str()
                )));
            }
        }
    }

    let module_path = resolve_module_path(file, source);
    let bytes = fs::read(&module_path).map_err(|e| BuildError::io(&module_path, e))?;
    Ok(ExportRequest {
        kind,
        content_hash: content_hash(&bytes),
        module_path,
        export_names,
    })
}
