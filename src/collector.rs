//! Symbol Collector
//!
//! Static scans producing the symbols that may receive a short name:
//! component prop names from a script unit and class names from a style
//! sheet. Both results keep first-seen order and hold no duplicates.

use crate::error::Result;
use crate::naming::Assignments;
use crate::transform::{parse_module, source_type_for};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_span::Span;
use oxc_syntax::scope::ScopeFlags;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;

/// Insertion-ordered set of symbol names.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SymbolSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl SymbolSet {
    pub fn insert(&mut self, symbol: &str) {
        if !symbol.is_empty() && self.seen.insert(symbol.to_string()) {
            self.order.push(symbol.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a script unit and collect its prop names.
pub fn collect_props_from_source(source: &str, file: &Path) -> Result<Vec<String>> {
    let allocator = Allocator::default();
    let program = parse_module(&allocator, source, source_type_for(file), file)?;
    Ok(collect_props(&program))
}

pub fn collect_props(program: &Program<'_>) -> Vec<String> {
    let mut collector = PropsCollector::default();
    collector.visit_program(program);
    collector.props.into_vec()
}

#[derive(Default)]
struct PropsCollector {
    props: SymbolSet,
}

/// `$name` (but not `$$name` or bare `$`), anything whose first character
/// has no distinct upper case, and the `lazy`/`children` built-ins.
fn is_custom_element(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    (name.starts_with('$') && !name.starts_with("$$") && name.len() > 1)
        || first.to_uppercase().eq(std::iter::once(first))
        || name == "lazy"
        || name == "children"
}

impl PropsCollector {
    fn collect_element(&mut self, element: &JSXElement<'_>) {
        let opening = &element.opening_element;
        let tag = match &opening.name {
            JSXElementName::NamespacedName(_) => return,
            JSXElementName::Identifier(id) => Some(id.name.as_str()),
            JSXElementName::IdentifierReference(id) => Some(id.name.as_str()),
            _ => None,
        };
        if opening
            .attributes
            .iter()
            .any(|attr| matches!(attr, JSXAttributeItem::SpreadAttribute(_)))
        {
            return;
        }
        if !element.children.is_empty() {
            self.props.insert("children");
        }
        if !tag.is_some_and(is_custom_element) {
            return;
        }
        for attr in &opening.attributes {
            let JSXAttributeItem::Attribute(attr) = attr else {
                continue;
            };
            match &attr.name {
                JSXAttributeName::NamespacedName(ns) => {
                    if ns.namespace.name.as_str() == "bind" && ns.name.name.as_str() == "this" {
                        self.props.insert("this");
                    }
                }
                JSXAttributeName::Identifier(id) => self.props.insert(id.name.as_str()),
            }
        }
    }

    /// A component is a function whose only return is its last statement
    /// and returns JSX. Its destructured props are collected up to the
    /// first key that is not a plain identifier.
    fn collect_component(&mut self, params: &FormalParameters<'_>, body: &FunctionBody<'_>, expression: bool) {
        let returns = if expression {
            match body.statements.first() {
                Some(Statement::ExpressionStatement(stmt)) => vec![OwnReturn {
                    span: stmt.span,
                    returns_jsx: is_jsx_element(Some(&stmt.expression)),
                }],
                _ => Vec::new(),
            }
        } else {
            let mut finder = ReturnFinder::default();
            for stmt in &body.statements {
                finder.visit_statement(stmt);
            }
            finder.returns
        };

        if !returns.iter().any(|r| r.returns_jsx) {
            return;
        }
        if returns.iter().any(|r| !r.returns_jsx) || returns.len() > 1 {
            return;
        }
        if !expression {
            let last = match body.statements.last() {
                Some(Statement::ReturnStatement(ret)) => Some(ret.span),
                _ => None,
            };
            if last != Some(returns[0].span) {
                return;
            }
        }

        if params.rest.is_some() {
            return;
        }
        if params.items.len() != 1 {
            return;
        }
        let param = &params.items[0];
        let BindingPattern::ObjectPattern(pattern) = &param.pattern else {
            return;
        };
        for property in &pattern.properties {
            match &property.key {
                PropertyKey::StaticIdentifier(id) if !property.computed => {
                    self.props.insert(id.name.as_str())
                }
                _ => return,
            }
        }
    }
}

fn is_jsx_element(expr: Option<&Expression<'_>>) -> bool {
    matches!(
        expr.map(|e| e.without_parentheses()),
        Some(Expression::JSXElement(_))
    )
}

struct OwnReturn {
    span: Span,
    returns_jsx: bool,
}

/// Return statements belonging to one function body, not to nested functions.
#[derive(Default)]
struct ReturnFinder {
    returns: Vec<OwnReturn>,
}

impl<'a> Visit<'a> for ReturnFinder {
    fn visit_return_statement(&mut self, ret: &ReturnStatement<'a>) {
        self.returns.push(OwnReturn {
            span: ret.span,
            returns_jsx: is_jsx_element(ret.argument.as_ref()),
        });
    }

    fn visit_function(&mut self, _func: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _func: &ArrowFunctionExpression<'a>) {}
}

impl<'a> Visit<'a> for PropsCollector {
    fn visit_jsx_element(&mut self, element: &JSXElement<'a>) {
        self.collect_element(element);
        oxc_ast_visit::walk::walk_jsx_element(self, element);
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        if let Some(body) = &func.body {
            self.collect_component(&func.params, body, false);
        }
        oxc_ast_visit::walk::walk_function(self, func, flags);
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        self.collect_component(&func.params, &func.body, func.expression);
        oxc_ast_visit::walk::walk_arrow_function_expression(self, func);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSES
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static::lazy_static! {
    static ref CLASS_SELECTOR: Regex = Regex::new(
        r"\.(-?(?:[_a-zA-Z]|[^\x00-\x7F]|\\[^\r\n\f])(?:[_a-zA-Z0-9-]|[^\x00-\x7F]|\\[^\r\n\f])*)"
    )
    .expect("class selector pattern is valid");
}

/// Replace comments and string contents by spaces of the same byte length,
/// so offsets into the masked text are offsets into the original.
fn mask_css(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.char_indices().peekable();
    let blank = |out: &mut String, c: char| out.extend(std::iter::repeat(' ').take(c.len_utf8()));

    while let Some((_, c)) = chars.next() {
        match c {
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                out.push_str("  ");
                chars.next();
                let mut prev = '\0';
                for (_, c) in chars.by_ref() {
                    blank(&mut out, c);
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            '"' | '\'' => {
                let quote = c;
                out.push(quote);
                let mut escaped = false;
                for (_, c) in chars.by_ref() {
                    if !escaped && c == quote {
                        out.push(quote);
                        break;
                    }
                    escaped = !escaped && c == '\\';
                    blank(&mut out, c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Byte ranges of every class name inside a selector prelude.
fn class_ranges(css: &str) -> Vec<Range<usize>> {
    let masked = mask_css(css);
    let mut ranges = Vec::new();
    let mut segment_start = 0;
    for (i, b) in masked.bytes().enumerate() {
        match b {
            b'{' => {
                let prelude = &masked[segment_start..i];
                if !prelude.trim_start().starts_with('@') {
                    for caps in CLASS_SELECTOR.captures_iter(prelude) {
                        if let Some(m) = caps.get(1) {
                            ranges.push(segment_start + m.start()..segment_start + m.end());
                        }
                    }
                }
                segment_start = i + 1;
            }
            b'}' | b';' => segment_start = i + 1,
            _ => {}
        }
    }
    ranges
}

/// Class names used in the selectors of a style sheet.
pub fn collect_classes(css: &str) -> Vec<String> {
    let mut classes = SymbolSet::default();
    for range in class_ranges(css) {
        classes.insert(&css[range]);
    }
    classes.into_vec()
}

/// Rename every class selector found in `names`; others are left as is.
pub fn rewrite_classes(css: &str, names: &Assignments) -> String {
    let mut out = String::with_capacity(css.len());
    let mut last = 0;
    for range in class_ranges(css) {
        if let Some(short) = names.get(&css[range.clone()]) {
            out.push_str(&css[last..range.start]);
            out.push_str(short);
            last = range.end;
        }
    }
    out.push_str(&css[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(source: &str) -> Vec<String> {
        collect_props_from_source(source, Path::new("unit.jsx")).unwrap()
    }

    #[test]
    fn test_custom_element_attributes() {
        let found = props(
            r#"
            const view = <main>
                <Card title="x" onSelect={pick} bind:this={ref} bind:value={v} />
                <$store.item />
                <$box size={1} />
                <div class="plain" id="x" />
                <svg:rect width="1" />
            </main>;
            "#,
        );
        assert_eq!(found, vec!["children", "title", "onSelect", "this", "size"]);
    }

    #[test]
    fn test_spread_attributes_disable_collection() {
        let found = props("const a = <Card {...rest} title=\"x\">text</Card>;");
        assert!(found.is_empty());
    }

    #[test]
    fn test_component_params() {
        let found = props(
            r#"
            function Header({ title, subtitle }) {
                const upper = title.toUpperCase();
                return <h1>{upper}</h1>;
            }
            const Footer = ({ year, ...rest }) => <footer />;
            const Nav = function ({ links, "data-x": d, after }) { return (<nav />); };
            "#,
        );
        assert_eq!(found, vec!["title", "subtitle", "children", "year", "links"]);
    }

    #[test]
    fn test_non_components_are_skipped() {
        let found = props(
            r#"
            function Maybe({ a }) { if (a) { return <b />; } return null; }
            function Early({ c }) { return <i />; cleanup(); }
            function Two({ d }, extra) { return <u />; }
            function Outer({ f }) {
                const inner = ({ g }) => { return <em />; };
                return inner;
            }
            "#,
        );
        assert_eq!(found, vec!["g"]);
    }

    #[test]
    fn test_classes_from_selectors_only() {
        let css = r#"
            /* .commented { } */
            .btn, .btn-primary:hover > .icon { color: red; width: .5em; }
            a[href$=".pdf"] { }
            @media (min-width: 10px) { .card.wide { padding: 0 } }
            .card { background: url("img.png"); .nested { margin: 0; } }
        "#;
        assert_eq!(
            collect_classes(css),
            vec!["btn", "btn-primary", "icon", "card", "wide", "nested"]
        );
    }

    #[test]
    fn test_rewrite_classes() {
        let css = ".btn, .card .btn { color: red } .keep { }";
        let mut names = Assignments::new();
        names.insert("btn".to_string(), "a1".to_string());
        names.insert("card".to_string(), "a2".to_string());
        assert_eq!(
            rewrite_classes(css, &names),
            ".a1, .a2 .a1 { color: red } .keep { }"
        );
    }
}
