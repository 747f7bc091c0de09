//! Minification naming tables.
//!
//! Two independent numbering spaces (style classes and component props), each
//! mapping a symbol to an ordinal assigned on first sight. Ordinals start at 1,
//! grow by one per new symbol and are never reused within a run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Short names handed back for one request, keyed by the original symbol.
pub type Assignments = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Class,
    Prop,
}

impl Namespace {
    /// Path segment the coordinator transport routes this namespace on.
    pub fn route(&self) -> &'static str {
        match self {
            Namespace::Class => "classes",
            Namespace::Prop => "props",
        }
    }

    pub fn from_route(segment: &str) -> Option<Self> {
        match segment {
            "classes" => Some(Namespace::Class),
            "props" => Some(Namespace::Prop),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct OrdinalTable {
    ordinals: HashMap<String, u32>,
    counter: u32,
}

impl OrdinalTable {
    fn ordinal_for(&mut self, symbol: &str) -> u32 {
        if let Some(ordinal) = self.ordinals.get(symbol) {
            return *ordinal;
        }
        self.counter += 1;
        self.ordinals.insert(symbol.to_string(), self.counter);
        self.counter
    }
}

/// State owned by exactly one writer for the lifetime of a build.
#[derive(Debug)]
pub struct NamingTable {
    prefix: String,
    classes: OrdinalTable,
    props: OrdinalTable,
}

impl NamingTable {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            classes: OrdinalTable::default(),
            props: OrdinalTable::default(),
        }
    }

    fn table_mut(&mut self, namespace: Namespace) -> &mut OrdinalTable {
        match namespace {
            Namespace::Class => &mut self.classes,
            Namespace::Prop => &mut self.props,
        }
    }

    /// Assign or look up the short name of every symbol, in request order.
    /// Repeated symbols within one request resolve to the same name. Empty
    /// symbols are ignored.
    pub fn assign_batch<S: AsRef<str>>(&mut self, namespace: Namespace, symbols: &[S]) -> Assignments {
        let mut result = Assignments::new();
        for symbol in symbols {
            let symbol = symbol.as_ref();
            if symbol.is_empty() || result.contains_key(symbol) {
                continue;
            }
            let ordinal = self.table_mut(namespace).ordinal_for(symbol);
            result.insert(symbol.to_string(), format!("{}{}", self.prefix, ordinal));
        }
        result
    }

    /// Number of symbols assigned so far in a namespace.
    pub fn assigned(&self, namespace: Namespace) -> usize {
        match namespace {
            Namespace::Class => self.classes.ordinals.len(),
            Namespace::Prop => self.props.ordinals.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_share_one_ordinal() {
        let mut table = NamingTable::new("a");
        let names = table.assign_batch(Namespace::Class, &["btn", "btn", "card"]);
        assert_eq!(names.len(), 2);
        assert_eq!(names["btn"], "a1");
        assert_eq!(names["card"], "a2");
    }

    #[test]
    fn test_lookup_is_idempotent_across_requests() {
        let mut table = NamingTable::new("a");
        table.assign_batch(Namespace::Class, &["btn", "card"]);
        let again = table.assign_batch(Namespace::Class, &["btn"]);
        assert_eq!(again["btn"], "a1");
        let next = table.assign_batch(Namespace::Class, &["nav", "card"]);
        assert_eq!(next["nav"], "a3");
        assert_eq!(next["card"], "a2");
    }

    #[test]
    fn test_namespaces_count_independently() {
        let mut table = NamingTable::new("a");
        table.assign_batch(Namespace::Prop, &["title", "onClick"]);
        let class = table.assign_batch(Namespace::Class, &["id"]);
        let prop = table.assign_batch(Namespace::Prop, &["id"]);
        assert_eq!(class["id"], "a1");
        assert_eq!(prop["id"], "a3");

        let mut fresh = NamingTable::new("a");
        assert_eq!(fresh.assign_batch(Namespace::Class, &["id"])["id"], "a1");
        assert_eq!(fresh.assign_batch(Namespace::Prop, &["id"])["id"], "a1");
    }

    #[test]
    fn test_ordinals_are_gap_free() {
        let mut table = NamingTable::new("x");
        let symbols: Vec<String> = (0..50).map(|i| format!("s{}", i % 20)).collect();
        for chunk in symbols.chunks(7) {
            table.assign_batch(Namespace::Prop, chunk);
        }
        let all: Vec<String> = (0..20).map(|i| format!("s{}", i)).collect();
        let names = table.assign_batch(Namespace::Prop, &all);
        let mut ordinals: Vec<u32> = names
            .values()
            .map(|n| n.trim_start_matches('x').parse().unwrap())
            .collect();
        ordinals.sort_unstable();
        assert_eq!(ordinals, (1..=20).collect::<Vec<u32>>());
        assert_eq!(table.assigned(Namespace::Prop), 20);
        assert_eq!(table.assigned(Namespace::Class), 0);
    }

    #[test]
    fn test_empty_symbols_are_skipped() {
        let mut table = NamingTable::new("a");
        let names = table.assign_batch(Namespace::Class, &["", "hero", ""]);
        assert_eq!(names.len(), 1);
        assert_eq!(names["hero"], "a1");
    }

    #[test]
    fn test_routes_round_trip() {
        for ns in [Namespace::Class, Namespace::Prop] {
            assert_eq!(Namespace::from_route(ns.route()), Some(ns));
        }
        assert_eq!(Namespace::from_route("ids"), None);
    }
}
