//! Compilation-unit discovery.

use crate::error::{BuildError, Result};
use crate::transform::{CompilationUnit, UnitKind};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every script and style file under `src_dir`, in path order.
pub fn find_unit_files(src_dir: &Path) -> Result<Vec<(PathBuf, UnitKind)>> {
    if !src_dir.is_dir() {
        return Err(BuildError::Config(format!(
            "source directory {} does not exist",
            src_dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(src_dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src_dir.to_path_buf());
            BuildError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(kind) = UnitKind::from_path(entry.path()) {
            files.push((entry.into_path(), kind));
        }
    }
    Ok(files)
}

/// Discover and read every unit. Reads run on the rayon pool.
pub fn discover_units(src_dir: &Path) -> Result<Vec<CompilationUnit>> {
    let files = find_unit_files(src_dir)?;
    let units = files
        .into_par_iter()
        .map(|(path, kind)| {
            let source = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
            let relative = path.strip_prefix(src_dir).unwrap_or(&path).to_path_buf();
            Ok(CompilationUnit {
                path,
                relative,
                kind,
                source,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(dir = %src_dir.display(), units = units.len(), "Discovered compilation units");
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovers_scripts_and_styles() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pages/nested")).unwrap();
        fs::write(dir.path().join("main.jsx"), "export default 1;").unwrap();
        fs::write(dir.path().join("pages/nested/site.css"), ".a {}").unwrap();
        fs::write(dir.path().join("pages/data.ssg.js"), "export const a = 1;").unwrap();
        fs::write(dir.path().join("README.md"), "# docs").unwrap();

        let units = discover_units(dir.path()).unwrap();
        let relative: Vec<_> = units.iter().map(|u| u.relative.clone()).collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("main.jsx"),
                PathBuf::from("pages/data.ssg.js"),
                PathBuf::from("pages/nested/site.css"),
            ]
        );
        assert_eq!(units[2].kind, UnitKind::Style);
        assert_eq!(units[0].source, "export default 1;");
    }

    #[test]
    fn test_missing_source_dir_is_config_error() {
        let err = discover_units(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }
}
