//! Top-level build driver.
//!
//! Discovers units, runs them on a bounded worker pool while the naming
//! coordinator serves, and writes outputs only once every unit succeeded.
//! The first failing unit aborts the run; the coordinator is closed either
//! way.

use crate::config::BuildConfig;
use crate::discovery::discover_units;
use crate::error::{BuildError, Result};
use crate::naming::Assignments;
use crate::naming_client::NamingClient;
use crate::coordinator::NamingCoordinator;
use crate::transform::{CompilationUnit, UnitOutput, UnitTransformer};
use serde::Serialize;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Name of the short-name manifest written next to the outputs.
pub const NAMES_MANIFEST: &str = "mango-names.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub units: usize,
    pub transformed: usize,
    pub classes: usize,
    pub props: usize,
    pub resolved_exports: usize,
}

#[derive(Debug, Default, Serialize)]
struct NamesManifest {
    classes: Assignments,
    props: Assignments,
}

pub async fn build(config: &BuildConfig) -> Result<BuildSummary> {
    let started = Instant::now();
    let units = discover_units(&config.build.src_dir)?;
    let resolver = config.resolver.to_resolver();

    let outputs = if config.build.optimize {
        NamingCoordinator::run(config.naming.addr(), &config.naming.prefix, |addr| {
            let client = NamingClient::new(addr);
            async move {
                let transformer = UnitTransformer::new(Some(client?), resolver, &config.build.marker);
                run_workers(transformer, units, config.build.workers).await
            }
        })
        .await?
    } else {
        let transformer = UnitTransformer::new(None, resolver, &config.build.marker);
        run_workers(transformer, units, config.build.workers).await?
    };

    let summary = write_outputs(&config.build.out_dir, &outputs, config.build.optimize)?;
    tracing::info!(
        units = summary.units,
        transformed = summary.transformed,
        classes = summary.classes,
        props = summary.props,
        resolved_exports = summary.resolved_exports,
        out_dir = %config.build.out_dir.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Build finished"
    );
    Ok(summary)
}

/// Transform every unit with at most `workers` in flight. Each unit runs as
/// its own task so CPU work spreads over the runtime's threads.
pub async fn run_workers(
    transformer: UnitTransformer,
    units: Vec<CompilationUnit>,
    workers: usize,
) -> Result<Vec<UnitOutput>> {
    let transformer = Arc::new(transformer);
    run_bounded(units, workers, move |unit| {
        let transformer = Arc::clone(&transformer);
        async move { transformer.transform(&unit).await }
    })
    .await
}

/// Run `task` over `items` with at most `limit` tasks in flight and return
/// the results in input order. The first failure aborts every task still
/// running before it is returned.
async fn run_bounded<I, T, F, Fut>(items: Vec<I>, limit: usize, task: F) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let limit = limit.max(1);
    let mut pending = items.into_iter().enumerate();
    let mut tasks = JoinSet::new();
    let mut done = Vec::new();

    loop {
        while tasks.len() < limit {
            let Some((index, item)) = pending.next() else {
                break;
            };
            let fut = task(item);
            tasks.spawn(async move { (index, fut.await) });
        }
        let Some(joined) = tasks.join_next().await else {
            break;
        };
        let failure = match joined {
            Ok((index, Ok(value))) => {
                done.push((index, value));
                continue;
            }
            Ok((_, Err(e))) => e,
            Err(e) => BuildError::IsolatedExecutionFailure(format!("worker task failed: {}", e)),
        };
        tasks.abort_all();
        tracing::debug!(aborted = tasks.len(), "aborting in-flight units");
        return Err(failure);
    }

    done.sort_by_key(|(index, _)| *index);
    Ok(done.into_iter().map(|(_, value)| value).collect())
}

fn write_outputs(out_dir: &Path, outputs: &[UnitOutput], write_manifest: bool) -> Result<BuildSummary> {
    let mut summary = BuildSummary {
        units: outputs.len(),
        ..BuildSummary::default()
    };
    let mut manifest = NamesManifest::default();

    for output in outputs {
        let target = out_dir.join(&output.relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        fs::write(&target, &output.code).map_err(|e| BuildError::io(&target, e))?;

        if output.transformed {
            summary.transformed += 1;
        }
        summary.resolved_exports += output.resolved_exports;
        manifest.classes.extend(output.classes.clone());
        manifest.props.extend(output.props.clone());
    }
    summary.classes = manifest.classes.len();
    summary.props = manifest.props.len();

    if write_manifest {
        fs::create_dir_all(out_dir).map_err(|e| BuildError::io(out_dir, e))?;
        let path = out_dir.join(NAMES_MANIFEST);
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| BuildError::Config(format!("cannot encode names manifest: {}", e)))?;
        fs::write(&path, json).map_err(|e| BuildError::io(&path, e))?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config_for(root: &Path) -> BuildConfig {
        let mut config = BuildConfig::default();
        config.build.src_dir = root.join("src");
        config.build.out_dir = root.join("dist");
        config.build.workers = 2;
        config
    }

    #[tokio::test]
    async fn test_bounded_workers_keep_input_order() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let outputs = run_bounded(vec![30u64, 5, 20, 1, 10], 2, |delay| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(delay)
            }
        })
        .await
        .unwrap();
        assert_eq!(outputs, vec![30, 5, 20, 1, 10]);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_failure_aborts_running_workers() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let err = run_bounded(vec![0u32, 1, 2, 3], 2, |unit| {
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                if unit == 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    return Err(BuildError::IsolatedExecutionFailure("unit 0 failed".to_string()));
                }
                tokio::time::sleep(Duration::from_millis(300)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(unit)
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, BuildError::IsolatedExecutionFailure(ref m) if m == "unit 0 failed"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_build_writes_minified_outputs() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir_all(src.join("styles")).unwrap();
        fs::write(src.join("styles/a.css"), ".btn { } .card .btn { }").unwrap();
        fs::write(src.join("styles/b.css"), ".card { }").unwrap();
        fs::write(src.join("config.ssg.js"), "export const Theme = { dark: true };").unwrap();
        fs::write(
            src.join("app.jsx"),
            "import { Theme } from './config.ssg';\nexport const App = ({ title }) => <Page title={title} theme={Theme} />;\n",
        )
        .unwrap();

        let summary = build(&config_for(root.path())).await.unwrap();
        assert_eq!(summary.units, 4);
        assert_eq!(summary.classes, 2);
        assert_eq!(summary.resolved_exports, 1);
        assert!(summary.props >= 2);

        let dist = root.path().join("dist");
        let a = fs::read_to_string(dist.join("styles/a.css")).unwrap();
        let b = fs::read_to_string(dist.join("styles/b.css")).unwrap();
        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dist.join(NAMES_MANIFEST)).unwrap()).unwrap();
        let card = manifest["classes"]["card"].as_str().unwrap();
        let btn = manifest["classes"]["btn"].as_str().unwrap();
        assert_ne!(card, btn);
        assert_eq!(a, format!(".{btn} {{ }} .{card} .{btn} {{ }}"));
        assert_eq!(b, format!(".{card} {{ }}"));

        let app = fs::read_to_string(dist.join("app.jsx")).unwrap();
        assert!(app.contains("var Theme"));
        assert!(!app.contains("config.ssg"));
    }

    #[tokio::test]
    async fn test_failed_unit_aborts_without_outputs() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("ok.css"), ".a { }").unwrap();
        fs::write(src.join("bad.jsx"), "import { Missing } from './gone.ssg';\n").unwrap();

        let err = build(&config_for(root.path())).await.unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
        assert!(!root.path().join("dist").exists());
    }

    #[tokio::test]
    async fn test_unoptimized_build_skips_naming() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("site.css"), ".btn { }").unwrap();

        let mut config = config_for(root.path());
        config.build.optimize = false;
        let summary = build(&config).await.unwrap();
        assert_eq!(summary.transformed, 0);
        let dist = root.path().join("dist");
        assert_eq!(fs::read_to_string(dist.join("site.css")).unwrap(), ".btn { }");
        assert!(!dist.join(NAMES_MANIFEST).exists());
    }
}
