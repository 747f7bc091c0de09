//! Module hosts.
//!
//! A [`ModuleHost`] is the module registry of one isolated resolution
//! context. It loads a module by path and reports its export surface. Two
//! hosts exist: the in-process static evaluator and a Node.js subprocess.

use crate::static_eval::ModuleEvaluator;
use crate::value::ExportValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use url::Url;

/// Value of one export, or the reason it could not be produced. Failures are
/// deferred so that existence checks still work on partially evaluable
/// modules.
pub type ExportSlot = std::result::Result<ExportValue, String>;

/// The export surface of a loaded module.
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    slots: HashMap<String, ExportSlot>,
}

impl ModuleExports {
    pub fn new(slots: HashMap<String, ExportSlot>) -> Self {
        Self { slots }
    }

    pub fn slot(&self, name: &str) -> Option<&ExportSlot> {
        self.slots.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The module namespace object: exports sorted by name.
    pub fn namespace_object(&self) -> ExportSlot {
        let mut names: Vec<&String> = self.slots.keys().collect();
        names.sort();
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let value = self.slots[name].clone()?;
            entries.push((name.clone(), value));
        }
        Ok(ExportValue::Object(entries))
    }
}

pub trait ModuleHost {
    fn name(&self) -> &'static str;

    /// Load `path` (evaluating it on first use) and return its exports. An
    /// error means the module itself failed to load.
    fn load(&mut self, path: &Path) -> std::result::Result<Rc<ModuleExports>, String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    #[default]
    Static,
    Node,
}

impl std::str::FromStr for HostKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "static" => Ok(HostKind::Static),
            "node" => Ok(HostKind::Node),
            other => Err(format!("unknown module host `{}` (expected static or node)", other)),
        }
    }
}

/// Everything needed to build a fresh host inside an isolated context.
#[derive(Debug, Clone)]
pub struct HostSpec {
    pub kind: HostKind,
    pub node_binary: String,
}

impl Default for HostSpec {
    fn default() -> Self {
        Self {
            kind: HostKind::Static,
            node_binary: "node".to_string(),
        }
    }
}

impl HostSpec {
    pub fn instantiate(&self) -> Box<dyn ModuleHost> {
        match self.kind {
            HostKind::Static => Box::new(StaticModuleHost::new()),
            HostKind::Node => Box::new(NodeModuleHost::new(self.node_binary.clone())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATIC HOST
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct StaticModuleHost {
    evaluator: ModuleEvaluator,
}

impl StaticModuleHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleHost for StaticModuleHost {
    fn name(&self) -> &'static str {
        "static"
    }

    fn load(&mut self, path: &Path) -> std::result::Result<Rc<ModuleExports>, String> {
        self.evaluator.load(path)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE HOST
// ═══════════════════════════════════════════════════════════════════════════════

/// Separates the report from anything the module printed itself.
const REPORT_MARKER: &str = "@@mango-report@@";

/// Imports the module named by argv[1] and prints its exports in the tagged
/// encoding of [`ExportValue`], after the marker given as argv[2]. Module
/// writes to stdout are sent to stderr. The process exits once the report is
/// flushed, even if the module left timers or sockets open.
const NODE_LOADER: &str = r#"
const [url, marker] = process.argv.slice(1);
const writeReport = process.stdout.write.bind(process.stdout);
process.stdout.write = (chunk, ...rest) => process.stderr.write(chunk, ...rest);

const encode = (value, seen) => {
  switch (typeof value) {
    case 'undefined': return { type: 'undefined' };
    case 'boolean': return { type: 'bool', value };
    case 'number':
      if (Object.is(value, -0)) return { type: 'number', value: '-0' };
      return { type: 'number', value: Number.isFinite(value) ? value : String(value) };
    case 'string': return { type: 'string', value };
    case 'bigint': return { type: 'bigInt', value: value.toString() };
    case 'function': return { type: 'function', value: value.name || '' };
    case 'symbol': return { type: 'symbol', value: value.description ?? '' };
  }
  if (value === null) return { type: 'null' };
  const proto = Object.getPrototypeOf(value);
  const isArray = Array.isArray(value) && proto === Array.prototype;
  if (!isArray && proto !== Object.prototype && proto !== null) {
    const ctor = proto && Object.hasOwn(proto, 'constructor') ? proto.constructor : undefined;
    const kind = (typeof ctor === 'function' && ctor.name)
      || Object.prototype.toString.call(value).slice(8, -1);
    return { type: 'unsupported', value: kind };
  }
  if (seen.has(value)) return { type: 'circular' };
  seen.add(value);
  try {
    if (isArray) {
      return { type: 'array', value: Array.from(value, (item) => encode(item, seen)) };
    }
    return { type: 'object', value: Object.keys(value).map((key) => [key, encode(value[key], seen)]) };
  } finally {
    seen.delete(value);
  }
};

const finish = (report, code) => {
  writeReport(marker + JSON.stringify(report) + '\n', () => process.exit(code));
};

try {
  const ns = await import(url);
  const exports = {};
  for (const key of Object.keys(ns)) exports[key] = encode(ns[key], new Set());
  finish({ status: 'success', exports }, 0);
} catch (err) {
  finish({ status: 'failure', error: String(err && err.stack || err) }, 1);
}
"#;

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum NodeReport {
    Success { exports: HashMap<String, ExportValue> },
    Failure { error: String },
}

/// Runs each module in its own `node` process.
pub struct NodeModuleHost {
    binary: String,
    registry: HashMap<PathBuf, Rc<ModuleExports>>,
}

impl NodeModuleHost {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            registry: HashMap::new(),
        }
    }

    fn run_loader(&self, path: &Path) -> std::result::Result<ModuleExports, String> {
        let url = Url::from_file_path(path)
            .map_err(|_| format!("{} is not an absolute path", path.display()))?;
        let output = Command::new(&self.binary)
            .arg("--input-type=module")
            .arg("-e")
            .arg(NODE_LOADER)
            .arg(url.as_str())
            .arg(REPORT_MARKER)
            .output()
            .map_err(|e| format!("failed to run `{}`: {}", self.binary, e))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(module = %path.display(), output = %stderr.trim(), "module wrote to stdout or stderr");
        }
        // A failure report exits non-zero; it still carries the real error.
        if !output.status.success() && report_text(&output.stdout).is_none() {
            return Err(format!(
                "`{}` exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            ));
        }
        parse_report(&output.stdout)
    }
}

/// The text after the last report marker, if any.
fn report_text(stdout: &[u8]) -> Option<&[u8]> {
    let marker = REPORT_MARKER.as_bytes();
    stdout
        .windows(marker.len())
        .rposition(|window| window == marker)
        .map(|at| &stdout[at + marker.len()..])
}

fn parse_report(stdout: &[u8]) -> std::result::Result<ModuleExports, String> {
    let text = report_text(stdout).ok_or_else(|| "module host produced no report".to_string())?;
    let report: NodeReport = serde_json::from_slice(text)
        .map_err(|e| format!("unreadable module report: {}", e))?;
    match report {
        NodeReport::Success { exports } => Ok(ModuleExports::new(
            exports.into_iter().map(|(k, v)| (k, Ok(v))).collect(),
        )),
        NodeReport::Failure { error } => Err(error),
    }
}

impl ModuleHost for NodeModuleHost {
    fn name(&self) -> &'static str {
        "node"
    }

    fn load(&mut self, path: &Path) -> std::result::Result<Rc<ModuleExports>, String> {
        let path = std::fs::canonicalize(path)
            .map_err(|e| format!("cannot open module {}: {}", path.display(), e))?;
        if let Some(exports) = self.registry.get(&path) {
            return Ok(Rc::clone(exports));
        }
        let exports = Rc::new(self.run_loader(&path)?);
        self.registry.insert(path, Rc::clone(&exports));
        Ok(exports)
    }
}
