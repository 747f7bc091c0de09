//! Static Module Evaluator
//!
//! Evaluates ES modules without a JavaScript engine: top-level declarations,
//! imports and re-exports are followed, and initializers built from literals,
//! operators, member access and a handful of well-known builtins are reduced
//! to [`ExportValue`]s. Functions and classes evaluate to opaque function
//! values. Anything else is recorded as a deferred error on the binding it
//! initializes and only surfaces if that binding's value is actually needed.
//!
//! A top-level `throw` fails the whole module, as it would at import time.
//! Any other top-level code that can run (a call, an assignment, a loop) may
//! throw or rewrite bindings after they were declared, so once one is seen
//! every export of the module is deferred with an error naming its line.

use crate::module_host::{ExportSlot, ModuleExports};
use crate::value::ExportValue;
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

type Env = HashMap<String, ExportSlot>;
type EvalResult<T> = std::result::Result<T, String>;

const RESOLVE_EXTENSIONS: [&str; 5] = ["js", "mjs", "ts", "jsx", "tsx"];

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// One module registry. Every module is evaluated at most once per evaluator.
#[derive(Default)]
pub struct ModuleEvaluator {
    registry: HashMap<PathBuf, Rc<ModuleExports>>,
    loading: Vec<PathBuf>,
}

impl ModuleEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> EvalResult<Rc<ModuleExports>> {
        let path = std::fs::canonicalize(path)
            .map_err(|e| format!("cannot open module {}: {}", path.display(), e))?;
        if let Some(exports) = self.registry.get(&path) {
            return Ok(Rc::clone(exports));
        }
        if self.loading.contains(&path) {
            return Err(format!(
                "circular import of {} cannot be evaluated statically",
                path.display()
            ));
        }

        self.loading.push(path.clone());
        let outcome = self.evaluate_module(&path);
        self.loading.pop();

        let exports = Rc::new(outcome?);
        self.registry.insert(path, Rc::clone(&exports));
        Ok(exports)
    }

    fn evaluate_module(&mut self, path: &Path) -> EvalResult<ModuleExports> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read module {}: {}", path.display(), e))?;
        let allocator = Allocator::default();
        let source_type = SourceType::from_path(path)
            .unwrap_or_default()
            .with_module(true);
        let ret = Parser::new(&allocator, &source, source_type).parse();
        if ret.panicked || !ret.errors.is_empty() {
            let message = ret
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unrecoverable syntax error".to_string());
            return Err(format!("syntax error in {}: {}", path.display(), message));
        }

        let mut scope = ModuleScope::default();
        scope.hoist_functions(&ret.program.body);
        for stmt in &ret.program.body {
            self.evaluate_statement(path, stmt, &mut scope)?;
        }
        let opaque = scope.opaque_at.map(|offset| {
            format!(
                "{}:{} runs top-level code that cannot be evaluated statically",
                path.display(),
                line_of(&source, offset)
            )
        });
        Ok(scope.finish(opaque))
    }

    /// Outer error: the import itself fails the module. Inner error: the
    /// binding is deferred (package imports cannot be followed statically).
    fn link(
        &mut self,
        from: &Path,
        specifier: &str,
    ) -> EvalResult<EvalResult<Rc<ModuleExports>>> {
        if !is_relative(specifier) {
            return Ok(Err(format!(
                "package import `{}` cannot be evaluated statically",
                specifier
            )));
        }
        match resolve_specifier(from, specifier) {
            Some(target) => self.load(&target).map(Ok),
            None => Err(format!(
                "cannot resolve `{}` from {}",
                specifier,
                from.display()
            )),
        }
    }

    fn evaluate_statement(
        &mut self,
        path: &Path,
        stmt: &Statement<'_>,
        scope: &mut ModuleScope,
    ) -> EvalResult<()> {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                if decl.import_kind.is_type() {
                    return Ok(());
                }
                let target = self.link(path, decl.source.value.as_str())?;
                let Some(specifiers) = &decl.specifiers else {
                    return Ok(());
                };
                for specifier in specifiers {
                    let (local, slot) = match specifier {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => (
                            s.local.name.as_str(),
                            imported_slot(&target, &s.imported.name()),
                        ),
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            (s.local.name.as_str(), imported_slot(&target, "default"))
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => (
                            s.local.name.as_str(),
                            target.as_ref().map_err(Clone::clone).and_then(|m| m.namespace_object()),
                        ),
                    };
                    scope.env.insert(local.to_string(), slot);
                }
            }
            Statement::ExportNamedDeclaration(decl) => {
                if decl.export_kind.is_type() {
                    return Ok(());
                }
                if let Some(declaration) = &decl.declaration {
                    for name in scope.declare(declaration) {
                        scope.local_exports.push((name.clone(), name));
                    }
                }
                if let Some(source) = &decl.source {
                    let target = self.link(path, source.value.as_str())?;
                    for specifier in &decl.specifiers {
                        let slot = imported_slot(&target, &specifier.local.name());
                        scope.exports.insert(specifier.exported.name().to_string(), slot);
                    }
                } else {
                    for specifier in &decl.specifiers {
                        scope.local_exports.push((
                            specifier.exported.name().to_string(),
                            specifier.local.name().to_string(),
                        ));
                    }
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                let slot = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        Ok(ExportValue::Function(binding_name(&func.id)))
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        if class_has_effects(class) {
                            scope.mark_opaque(class.span.start);
                        }
                        let value = ExportValue::Function(binding_name(&class.id));
                        if let Some(id) = &class.id {
                            scope.env.insert(id.name.to_string(), Ok(value.clone()));
                        }
                        Ok(value)
                    }
                    ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => return Ok(()),
                    other => match other.as_expression() {
                        Some(expr) => {
                            let value = evaluate(expr, &scope.env);
                            if value.is_err() && expression_has_effects(expr) {
                                scope.mark_opaque(expr.span().start);
                            }
                            value
                        }
                        None => return Ok(()),
                    },
                };
                scope.exports.insert("default".to_string(), slot);
            }
            Statement::ExportAllDeclaration(decl) => {
                if decl.export_kind.is_type() {
                    return Ok(());
                }
                let target = self.link(path, decl.source.value.as_str())?;
                match &decl.exported {
                    Some(exported) => {
                        let slot = target.and_then(|m| m.namespace_object());
                        scope.exports.insert(exported.name().to_string(), slot);
                    }
                    None => {
                        // `export *` cannot be lazily deferred: the names are unknown.
                        let target = target?;
                        for name in target.names() {
                            if name == "default" {
                                continue;
                            }
                            if let Some(slot) = target.slot(name) {
                                scope.star_exports.entry(name.to_string()).or_insert_with(|| slot.clone());
                            }
                        }
                    }
                }
            }
            Statement::VariableDeclaration(_)
            | Statement::FunctionDeclaration(_)
            | Statement::ClassDeclaration(_) => {
                if let Some(declaration) = stmt.as_declaration() {
                    scope.declare(declaration);
                }
            }
            Statement::ThrowStatement(throw) => {
                return Err(format!(
                    "module {} threw during evaluation: {}",
                    path.display(),
                    thrown_message(&throw.argument, &scope.env)
                ));
            }
            Statement::EmptyStatement(_)
            | Statement::DebuggerStatement(_)
            | Statement::TSTypeAliasDeclaration(_)
            | Statement::TSInterfaceDeclaration(_) => {}
            Statement::ExpressionStatement(expr)
                if !expression_has_effects(&expr.expression)
                    && evaluate(&expr.expression, &scope.env).is_ok() => {}
            other => scope.mark_opaque(other.span().start),
        }
        Ok(())
    }
}

fn line_of(source: &str, offset: u32) -> usize {
    let end = (offset as usize).min(source.len());
    source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

/// Looks for syntax that runs code or writes bindings while a top-level
/// statement executes. Function bodies are skipped; they run only if called.
#[derive(Default)]
struct EffectFinder {
    found: bool,
}

impl<'a> Visit<'a> for EffectFinder {
    fn visit_call_expression(&mut self, _call: &CallExpression<'a>) {
        self.found = true;
    }

    fn visit_new_expression(&mut self, _new: &NewExpression<'a>) {
        self.found = true;
    }

    fn visit_import_expression(&mut self, _import: &ImportExpression<'a>) {
        self.found = true;
    }

    fn visit_tagged_template_expression(&mut self, _tagged: &TaggedTemplateExpression<'a>) {
        self.found = true;
    }

    fn visit_assignment_expression(&mut self, _assign: &AssignmentExpression<'a>) {
        self.found = true;
    }

    fn visit_update_expression(&mut self, _update: &UpdateExpression<'a>) {
        self.found = true;
    }

    fn visit_await_expression(&mut self, _expr: &AwaitExpression<'a>) {
        self.found = true;
    }

    fn visit_unary_expression(&mut self, unary: &UnaryExpression<'a>) {
        if unary.operator == UnaryOperator::Delete {
            self.found = true;
        } else {
            oxc_ast_visit::walk::walk_unary_expression(self, unary);
        }
    }

    fn visit_function(&mut self, _func: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _func: &ArrowFunctionExpression<'a>) {}

    fn visit_class(&mut self, class: &Class<'a>) {
        // Heritage, static blocks and static field initializers run at definition.
        if let Some(super_class) = &class.super_class {
            self.visit_expression(super_class);
        }
        for element in &class.body.body {
            match element {
                ClassElement::StaticBlock(_) => self.found = true,
                ClassElement::PropertyDefinition(prop) if prop.r#static => {
                    if let Some(value) = &prop.value {
                        self.visit_expression(value);
                    }
                }
                _ => {}
            }
        }
    }
}

fn expression_has_effects(expr: &Expression<'_>) -> bool {
    let mut finder = EffectFinder::default();
    finder.visit_expression(expr);
    finder.found
}

fn class_has_effects(class: &Class<'_>) -> bool {
    let mut finder = EffectFinder::default();
    finder.visit_class(class);
    finder.found
}

fn imported_slot(target: &EvalResult<Rc<ModuleExports>>, name: &str) -> ExportSlot {
    match target {
        Ok(module) => match module.slot(name) {
            Some(slot) => slot.clone(),
            None => Err(format!("imported binding `{}` is not exported", name)),
        },
        Err(e) => Err(e.clone()),
    }
}

fn binding_name(id: &Option<BindingIdentifier<'_>>) -> String {
    id.as_ref().map(|id| id.name.to_string()).unwrap_or_default()
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

/// Resolve a relative import the way bundlers do: exact file, then known
/// extensions, then a directory index.
pub fn resolve_specifier(from: &Path, specifier: &str) -> Option<PathBuf> {
    if !is_relative(specifier) {
        return None;
    }
    let base = from.parent().unwrap_or_else(|| Path::new(".")).join(specifier);
    if base.is_file() {
        return Some(base);
    }
    for ext in RESOLVE_EXTENSIONS {
        let mut candidate = base.clone().into_os_string();
        candidate.push(".");
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    RESOLVE_EXTENSIONS
        .iter()
        .map(|ext| base.join(format!("index.{}", ext)))
        .find(|candidate| candidate.is_file())
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE SCOPE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct ModuleScope {
    env: Env,
    exports: HashMap<String, ExportSlot>,
    star_exports: HashMap<String, ExportSlot>,
    /// (exported, local) pairs, resolved once the whole body has run.
    local_exports: Vec<(String, String)>,
    /// Offset of the first top-level code that could not be modelled.
    opaque_at: Option<u32>,
}

impl ModuleScope {
    fn mark_opaque(&mut self, offset: u32) {
        self.opaque_at.get_or_insert(offset);
    }

    fn hoist_functions(&mut self, body: &[Statement<'_>]) {
        for stmt in body {
            let func = match stmt {
                Statement::FunctionDeclaration(func) => Some(&**func),
                Statement::ExportNamedDeclaration(decl) => match &decl.declaration {
                    Some(Declaration::FunctionDeclaration(func)) => Some(&**func),
                    _ => None,
                },
                Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => Some(&**func),
                    _ => None,
                },
                _ => None,
            };
            if let Some(id) = func.and_then(|f| f.id.as_ref()) {
                self.env
                    .insert(id.name.to_string(), Ok(ExportValue::Function(id.name.to_string())));
            }
        }
    }

    /// Bind a declaration and return the names it declared.
    fn declare(&mut self, declaration: &Declaration<'_>) -> Vec<String> {
        match declaration {
            Declaration::VariableDeclaration(decl) => {
                let mut names = Vec::new();
                for declarator in &decl.declarations {
                    let mut value = match &declarator.init {
                        Some(init) => {
                            let value = evaluate(init, &self.env);
                            if value.is_err() && expression_has_effects(init) {
                                self.mark_opaque(init.span().start);
                            }
                            value
                        }
                        None => Ok(ExportValue::Undefined),
                    };
                    // `const Handler = () => {}` names the function.
                    if let (Ok(ExportValue::Function(name)), Some(id)) =
                        (&mut value, declarator.id.get_identifier_name())
                    {
                        if name.is_empty() {
                            *name = id.to_string();
                        }
                    }
                    names.extend(
                        declarator
                            .id
                            .get_binding_identifiers()
                            .iter()
                            .map(|id| id.name.to_string()),
                    );
                    bind_pattern(&declarator.id, value, &mut self.env);
                }
                names
            }
            Declaration::FunctionDeclaration(func) => func
                .id
                .as_ref()
                .map(|id| vec![id.name.to_string()])
                .unwrap_or_default(),
            Declaration::ClassDeclaration(class) => {
                if class_has_effects(class) {
                    self.mark_opaque(class.span.start);
                }
                match &class.id {
                    Some(id) => {
                        let name = id.name.to_string();
                        self.env
                            .insert(name.clone(), Ok(ExportValue::Function(name.clone())));
                        vec![name]
                    }
                    None => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    /// Resolve the export table. `opaque` replaces every slot with a deferred
    /// error once unmodelled top-level code has run.
    fn finish(mut self, opaque: Option<String>) -> ModuleExports {
        for (exported, local) in std::mem::take(&mut self.local_exports) {
            let slot = match self.env.get(&local) {
                Some(slot) => slot.clone(),
                None => Err(format!("exported binding `{}` is not declared", local)),
            };
            self.exports.insert(exported, slot);
        }
        for (name, slot) in self.star_exports {
            self.exports.entry(name).or_insert(slot);
        }
        if let Some(reason) = opaque {
            for slot in self.exports.values_mut() {
                *slot = Err(reason.clone());
            }
        }
        ModuleExports::new(self.exports)
    }
}

fn bind_pattern(pattern: &BindingPattern<'_>, value: ExportSlot, env: &mut Env) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            env.insert(id.name.to_string(), value);
        }
        BindingPattern::AssignmentPattern(assign) => {
            let value = match value {
                Ok(ExportValue::Undefined) => evaluate(&assign.right, env),
                other => other,
            };
            bind_pattern(&assign.left, value, env);
        }
        BindingPattern::ObjectPattern(object) => {
            let mut taken = Vec::new();
            for property in &object.properties {
                let key = if property.computed {
                    property
                        .key
                        .as_expression()
                        .ok_or_else(|| "unsupported computed key".to_string())
                        .and_then(|e| evaluate(e, env))
                        .and_then(|k| to_property_key(&k))
                } else {
                    property
                        .key
                        .static_name()
                        .map(|k| k.to_string())
                        .ok_or_else(|| "unsupported property key".to_string())
                };
                let slot = match (&value, key) {
                    (Ok(v), Ok(key)) => {
                        let slot = get_property(v, &key);
                        taken.push(key);
                        slot
                    }
                    (Err(e), _) => Err(e.clone()),
                    (Ok(_), Err(e)) => Err(e),
                };
                bind_pattern(&property.value, slot, env);
            }
            if let Some(rest) = &object.rest {
                let slot = value.and_then(|v| match v {
                    ExportValue::Object(entries) => Ok(ExportValue::Object(
                        entries.into_iter().filter(|(k, _)| !taken.contains(k)).collect(),
                    )),
                    ExportValue::Null | ExportValue::Undefined => {
                        Err("cannot destructure null or undefined".to_string())
                    }
                    _ => Ok(ExportValue::Object(Vec::new())),
                });
                bind_pattern(&rest.argument, slot, env);
            }
        }
        BindingPattern::ArrayPattern(array) => {
            let items = value.and_then(|v| iterate(&v));
            for (i, element) in array.elements.iter().enumerate() {
                if let Some(element) = element {
                    let slot = match &items {
                        Ok(items) => Ok(items.get(i).cloned().unwrap_or(ExportValue::Undefined)),
                        Err(e) => Err(e.clone()),
                    };
                    bind_pattern(element, slot, env);
                }
            }
            if let Some(rest) = &array.rest {
                let skip = array.elements.len();
                let slot = items.map(|items| ExportValue::Array(items.into_iter().skip(skip).collect()));
                bind_pattern(&rest.argument, slot, env);
            }
        }
    }
}

fn thrown_message(expr: &Expression<'_>, env: &Env) -> String {
    if let Expression::NewExpression(new) = expr.get_inner_expression() {
        let message = new
            .arguments
            .first()
            .and_then(|arg| arg.as_expression())
            .and_then(|arg| evaluate(arg, env).ok())
            .and_then(|v| to_js_string(&v).ok())
            .unwrap_or_default();
        return message;
    }
    evaluate(expr, env)
        .ok()
        .and_then(|v| to_js_string(&v).ok())
        .unwrap_or_else(|| "uncaught exception".to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Evaluate one expression source text with no bindings in scope.
pub fn evaluate_expression_source(source: &str) -> EvalResult<ExportValue> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let expr = Parser::new(&allocator, source, source_type)
        .parse_expression()
        .map_err(|errors| {
            errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "invalid expression".to_string())
        })?;
    evaluate(&expr, &Env::new())
}

fn unsupported(what: &str) -> String {
    format!("{} cannot be evaluated statically", what)
}

fn evaluate(expr: &Expression<'_>, env: &Env) -> EvalResult<ExportValue> {
    match expr.get_inner_expression() {
        Expression::BooleanLiteral(lit) => Ok(ExportValue::Bool(lit.value)),
        Expression::NullLiteral(_) => Ok(ExportValue::Null),
        Expression::NumericLiteral(lit) => Ok(ExportValue::Number(lit.value)),
        Expression::BigIntLiteral(lit) => Ok(ExportValue::BigInt(lit.value.to_string())),
        Expression::StringLiteral(lit) => Ok(ExportValue::String(lit.value.to_string())),
        Expression::TemplateLiteral(tpl) => {
            let mut out = String::new();
            for (i, quasi) in tpl.quasis.iter().enumerate() {
                let cooked = quasi
                    .value
                    .cooked
                    .as_ref()
                    .ok_or_else(|| "invalid escape in template literal".to_string())?;
                out.push_str(cooked.as_str());
                if let Some(expr) = tpl.expressions.get(i) {
                    out.push_str(&to_js_string(&evaluate(expr, env)?)?);
                }
            }
            Ok(ExportValue::String(out))
        }
        Expression::Identifier(ident) => lookup(ident.name.as_str(), env),
        Expression::ArrayExpression(array) => {
            let mut items = Vec::with_capacity(array.elements.len());
            for element in &array.elements {
                match element {
                    ArrayExpressionElement::SpreadElement(spread) => {
                        items.extend(iterate(&evaluate(&spread.argument, env)?)?);
                    }
                    ArrayExpressionElement::Elision(_) => items.push(ExportValue::Undefined),
                    other => match other.as_expression() {
                        Some(expr) => items.push(evaluate(expr, env)?),
                        None => return Err(unsupported("array element")),
                    },
                }
            }
            Ok(ExportValue::Array(items))
        }
        Expression::ObjectExpression(object) => {
            let mut entries: Vec<(String, ExportValue)> = Vec::new();
            for property in &object.properties {
                match property {
                    ObjectPropertyKind::ObjectProperty(p) => {
                        if p.kind != PropertyKind::Init {
                            return Err(unsupported("accessor property"));
                        }
                        let key = if p.computed {
                            let key_expr = p
                                .key
                                .as_expression()
                                .ok_or_else(|| unsupported("computed key"))?;
                            to_property_key(&evaluate(key_expr, env)?)?
                        } else {
                            p.key
                                .static_name()
                                .map(|k| k.to_string())
                                .ok_or_else(|| unsupported("property key"))?
                        };
                        let value = if p.method {
                            ExportValue::Function(key.clone())
                        } else {
                            evaluate(&p.value, env)?
                        };
                        set_entry(&mut entries, key, value);
                    }
                    ObjectPropertyKind::SpreadProperty(spread) => {
                        match evaluate(&spread.argument, env)? {
                            ExportValue::Object(source) => {
                                for (k, v) in source {
                                    set_entry(&mut entries, k, v);
                                }
                            }
                            ExportValue::Array(items) => {
                                for (i, v) in items.into_iter().enumerate() {
                                    set_entry(&mut entries, i.to_string(), v);
                                }
                            }
                            ExportValue::String(s) => {
                                for (i, c) in s.chars().enumerate() {
                                    set_entry(&mut entries, i.to_string(), ExportValue::String(c.to_string()));
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            Ok(ExportValue::Object(entries))
        }
        Expression::FunctionExpression(func) => Ok(ExportValue::Function(binding_name(&func.id))),
        Expression::ArrowFunctionExpression(_) => Ok(ExportValue::Function(String::new())),
        Expression::ClassExpression(class) => Ok(ExportValue::Function(binding_name(&class.id))),
        Expression::UnaryExpression(unary) => evaluate_unary(unary, env),
        Expression::BinaryExpression(binary) => {
            let left = evaluate(&binary.left, env)?;
            let right = evaluate(&binary.right, env)?;
            evaluate_binary(binary.operator, left, right)
        }
        Expression::LogicalExpression(logical) => {
            let left = evaluate(&logical.left, env)?;
            let take_left = match logical.operator {
                LogicalOperator::Or => left.is_truthy(),
                LogicalOperator::And => !left.is_truthy(),
                LogicalOperator::Coalesce => {
                    !matches!(left, ExportValue::Null | ExportValue::Undefined)
                }
            };
            if take_left {
                Ok(left)
            } else {
                evaluate(&logical.right, env)
            }
        }
        Expression::ConditionalExpression(cond) => {
            if evaluate(&cond.test, env)?.is_truthy() {
                evaluate(&cond.consequent, env)
            } else {
                evaluate(&cond.alternate, env)
            }
        }
        Expression::SequenceExpression(seq) => {
            let mut last = ExportValue::Undefined;
            for expr in &seq.expressions {
                last = evaluate(expr, env)?;
            }
            Ok(last)
        }
        Expression::StaticMemberExpression(member) => {
            let object = evaluate(&member.object, env)?;
            if member.optional && is_nullish(&object) {
                return Ok(ExportValue::Undefined);
            }
            get_property(&object, member.property.name.as_str())
        }
        Expression::ComputedMemberExpression(member) => {
            let object = evaluate(&member.object, env)?;
            if member.optional && is_nullish(&object) {
                return Ok(ExportValue::Undefined);
            }
            let key = to_property_key(&evaluate(&member.expression, env)?)?;
            get_property(&object, &key)
        }
        Expression::ChainExpression(chain) => match &chain.expression {
            ChainElement::StaticMemberExpression(member) => {
                let object = evaluate(&member.object, env)?;
                if member.optional && is_nullish(&object) {
                    return Ok(ExportValue::Undefined);
                }
                get_property(&object, member.property.name.as_str())
            }
            ChainElement::ComputedMemberExpression(member) => {
                let object = evaluate(&member.object, env)?;
                if member.optional && is_nullish(&object) {
                    return Ok(ExportValue::Undefined);
                }
                let key = to_property_key(&evaluate(&member.expression, env)?)?;
                get_property(&object, &key)
            }
            _ => Err(unsupported("optional call")),
        },
        Expression::CallExpression(call) => evaluate_call(call, env),
        Expression::NewExpression(_) => Err(unsupported("`new` expression")),
        Expression::AwaitExpression(_) => Err(unsupported("top-level await")),
        Expression::JSXElement(_) | Expression::JSXFragment(_) => Err(unsupported("JSX")),
        _ => Err(unsupported("expression")),
    }
}

fn lookup(name: &str, env: &Env) -> EvalResult<ExportValue> {
    if let Some(slot) = env.get(name) {
        return slot.clone();
    }
    match name {
        "undefined" => Ok(ExportValue::Undefined),
        "NaN" => Ok(ExportValue::Number(f64::NAN)),
        "Infinity" => Ok(ExportValue::Number(f64::INFINITY)),
        _ => Err(format!("`{}` is not defined", name)),
    }
}

fn set_entry(entries: &mut Vec<(String, ExportValue)>, key: String, value: ExportValue) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

fn is_nullish(value: &ExportValue) -> bool {
    matches!(value, ExportValue::Null | ExportValue::Undefined)
}

fn iterate(value: &ExportValue) -> EvalResult<Vec<ExportValue>> {
    match value {
        ExportValue::Array(items) => Ok(items.clone()),
        ExportValue::String(s) => Ok(s.chars().map(|c| ExportValue::String(c.to_string())).collect()),
        other => Err(format!("{} is not iterable", other.type_name())),
    }
}

fn get_property(object: &ExportValue, key: &str) -> EvalResult<ExportValue> {
    let found = match object {
        ExportValue::Null | ExportValue::Undefined => {
            return Err(format!(
                "cannot read property `{}` of {}",
                key,
                object.type_name()
            ))
        }
        ExportValue::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()),
        ExportValue::Array(items) => match key {
            "length" => Some(ExportValue::Number(items.len() as f64)),
            _ => key.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
        },
        ExportValue::String(s) => match key {
            "length" => Some(ExportValue::Number(s.encode_utf16().count() as f64)),
            // Indices count UTF-16 code units, like `length`.
            _ => match key.parse::<usize>().ok().and_then(|i| s.encode_utf16().nth(i)) {
                Some(unit) => match char::decode_utf16([unit]).next() {
                    Some(Ok(c)) => Some(ExportValue::String(c.to_string())),
                    _ => return Err(format!("index {} of a string splits a surrogate pair", key)),
                },
                None => None,
            },
        },
        ExportValue::Function(name) if key == "name" => Some(ExportValue::String(name.clone())),
        _ => None,
    };
    Ok(found.unwrap_or(ExportValue::Undefined))
}

fn evaluate_call(call: &CallExpression<'_>, env: &Env) -> EvalResult<ExportValue> {
    let mut args = Vec::with_capacity(call.arguments.len());
    for arg in &call.arguments {
        match arg.as_expression() {
            Some(expr) => args.push(evaluate(expr, env)?),
            None => return Err(unsupported("spread argument")),
        }
    }
    let first = args.first().cloned().unwrap_or(ExportValue::Undefined);

    let callee = match call.callee.get_inner_expression() {
        Expression::Identifier(id) if !env.contains_key(id.name.as_str()) => id.name.to_string(),
        Expression::StaticMemberExpression(member) => match &member.object {
            Expression::Identifier(obj) if !env.contains_key(obj.name.as_str()) => {
                format!("{}.{}", obj.name, member.property.name)
            }
            _ => return Err(unsupported("method call")),
        },
        _ => return Err(unsupported("call expression")),
    };

    match callee.as_str() {
        "Symbol" | "Symbol.for" => {
            let description = match first {
                ExportValue::Undefined => String::new(),
                other => to_js_string(&other)?,
            };
            Ok(ExportValue::Symbol(description))
        }
        "Object.freeze" | "Object.seal" | "Object.preventExtensions" => Ok(first),
        "String" => match first {
            _ if args.is_empty() => Ok(ExportValue::String(String::new())),
            ExportValue::Symbol(desc) => Ok(ExportValue::String(format!("Symbol({})", desc))),
            other => Ok(ExportValue::String(to_js_string(&other)?)),
        },
        "Number" => {
            if args.is_empty() {
                Ok(ExportValue::Number(0.0))
            } else {
                Ok(ExportValue::Number(to_number(&first)?))
            }
        }
        "Boolean" => Ok(ExportValue::Bool(first.is_truthy())),
        _ => Err(unsupported(&format!("call to `{}`", callee))),
    }
}

fn evaluate_unary(unary: &UnaryExpression<'_>, env: &Env) -> EvalResult<ExportValue> {
    if unary.operator == UnaryOperator::Typeof {
        if let Expression::Identifier(id) = unary.argument.get_inner_expression() {
            if lookup(id.name.as_str(), env).is_err() && !env.contains_key(id.name.as_str()) {
                return Ok(ExportValue::String("undefined".to_string()));
            }
        }
    }
    if unary.operator == UnaryOperator::Delete {
        return Err(unsupported("`delete`"));
    }
    let value = evaluate(&unary.argument, env)?;
    Ok(match unary.operator {
        UnaryOperator::UnaryPlus => ExportValue::Number(to_number(&value)?),
        UnaryOperator::UnaryNegation => match value {
            ExportValue::BigInt(digits) => ExportValue::BigInt(negate_digits(&digits)),
            other => ExportValue::Number(-to_number(&other)?),
        },
        UnaryOperator::LogicalNot => ExportValue::Bool(!value.is_truthy()),
        UnaryOperator::BitwiseNot => ExportValue::Number(f64::from(!to_int32(to_number(&value)?))),
        UnaryOperator::Typeof => ExportValue::String(type_of(&value).to_string()),
        UnaryOperator::Void => ExportValue::Undefined,
        UnaryOperator::Delete => return Err(unsupported("`delete`")),
    })
}

fn evaluate_binary(op: BinaryOperator, left: ExportValue, right: ExportValue) -> EvalResult<ExportValue> {
    use BinaryOperator as B;

    if let (ExportValue::BigInt(a), ExportValue::BigInt(b)) = (&left, &right) {
        if let Some(result) = bigint_arithmetic(op, a, b) {
            return result;
        }
    }

    Ok(match op {
        B::Addition => {
            let left = to_primitive(left)?;
            let right = to_primitive(right)?;
            if matches!(left, ExportValue::String(_)) || matches!(right, ExportValue::String(_)) {
                ExportValue::String(to_js_string(&left)? + &to_js_string(&right)?)
            } else {
                ExportValue::Number(to_number(&left)? + to_number(&right)?)
            }
        }
        B::Subtraction => ExportValue::Number(to_number(&left)? - to_number(&right)?),
        B::Multiplication => ExportValue::Number(to_number(&left)? * to_number(&right)?),
        B::Division => ExportValue::Number(to_number(&left)? / to_number(&right)?),
        B::Remainder => ExportValue::Number(to_number(&left)? % to_number(&right)?),
        B::Exponential => ExportValue::Number(to_number(&left)?.powf(to_number(&right)?)),
        B::StrictEquality => ExportValue::Bool(strict_equals(&left, &right)?),
        B::StrictInequality => ExportValue::Bool(!strict_equals(&left, &right)?),
        B::Equality => ExportValue::Bool(loose_equals(&left, &right)?),
        B::Inequality => ExportValue::Bool(!loose_equals(&left, &right)?),
        B::LessThan | B::LessEqualThan | B::GreaterThan | B::GreaterEqualThan => {
            ExportValue::Bool(compare(op, &to_primitive(left)?, &to_primitive(right)?)?)
        }
        B::BitwiseAnd => int_op(&left, &right, |a, b| a & b)?,
        B::BitwiseOR => int_op(&left, &right, |a, b| a | b)?,
        B::BitwiseXOR => int_op(&left, &right, |a, b| a ^ b)?,
        B::ShiftLeft => int_op(&left, &right, |a, b| a.wrapping_shl(b as u32 & 31))?,
        B::ShiftRight => int_op(&left, &right, |a, b| a.wrapping_shr(b as u32 & 31))?,
        B::ShiftRightZeroFill => {
            let a = to_int32(to_number(&left)?) as u32;
            let b = to_int32(to_number(&right)?) as u32 & 31;
            ExportValue::Number(f64::from(a >> b))
        }
        _ => return Err(unsupported(&format!("operator `{}`", op.as_str()))),
    })
}

fn bigint_arithmetic(op: BinaryOperator, a: &str, b: &str) -> Option<EvalResult<ExportValue>> {
    let (Ok(a), Ok(b)) = (a.parse::<i128>(), b.parse::<i128>()) else {
        return Some(Err(unsupported("bigint beyond 128 bits")));
    };
    let result = match op {
        BinaryOperator::Addition => a.checked_add(b),
        BinaryOperator::Subtraction => a.checked_sub(b),
        BinaryOperator::Multiplication => a.checked_mul(b),
        BinaryOperator::Division if b != 0 => a.checked_div(b),
        BinaryOperator::Remainder if b != 0 => a.checked_rem(b),
        BinaryOperator::StrictEquality | BinaryOperator::Equality => {
            return Some(Ok(ExportValue::Bool(a == b)))
        }
        BinaryOperator::StrictInequality | BinaryOperator::Inequality => {
            return Some(Ok(ExportValue::Bool(a != b)))
        }
        _ => return None,
    };
    Some(
        result
            .map(|v| ExportValue::BigInt(v.to_string()))
            .ok_or_else(|| unsupported("bigint overflow or division by zero")),
    )
}

fn negate_digits(digits: &str) -> String {
    match digits.strip_prefix('-') {
        Some(abs) => abs.to_string(),
        None if digits == "0" => "0".to_string(),
        None => format!("-{}", digits),
    }
}

fn int_op(left: &ExportValue, right: &ExportValue, f: impl Fn(i32, i32) -> i32) -> EvalResult<ExportValue> {
    let a = to_int32(to_number(left)?);
    let b = to_int32(to_number(right)?);
    Ok(ExportValue::Number(f64::from(f(a, b))))
}

fn compare(op: BinaryOperator, left: &ExportValue, right: &ExportValue) -> EvalResult<bool> {
    use std::cmp::Ordering;
    let ordering = match (left, right) {
        (ExportValue::String(a), ExportValue::String(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
        _ => to_number(left)?.partial_cmp(&to_number(right)?),
    };
    Ok(match (op, ordering) {
        (_, None) => false,
        (BinaryOperator::LessThan, Some(o)) => o == Ordering::Less,
        (BinaryOperator::LessEqualThan, Some(o)) => o != Ordering::Greater,
        (BinaryOperator::GreaterThan, Some(o)) => o == Ordering::Greater,
        (_, Some(o)) => o != Ordering::Less,
    })
}

fn strict_equals(left: &ExportValue, right: &ExportValue) -> EvalResult<bool> {
    Ok(match (left, right) {
        (ExportValue::Undefined, ExportValue::Undefined) | (ExportValue::Null, ExportValue::Null) => true,
        (ExportValue::Bool(a), ExportValue::Bool(b)) => a == b,
        (ExportValue::Number(a), ExportValue::Number(b)) => a == b,
        (ExportValue::String(a), ExportValue::String(b)) => a == b,
        (ExportValue::BigInt(a), ExportValue::BigInt(b)) => a == b,
        (a, b) if type_of(a) != type_of(b) || is_nullish(a) != is_nullish(b) => false,
        _ => return Err(unsupported("identity comparison")),
    })
}

fn loose_equals(left: &ExportValue, right: &ExportValue) -> EvalResult<bool> {
    if is_nullish(left) || is_nullish(right) {
        return Ok(is_nullish(left) && is_nullish(right));
    }
    if type_of(left) == type_of(right) {
        return strict_equals(left, right);
    }
    match (left, right) {
        (ExportValue::Number(_) | ExportValue::String(_) | ExportValue::Bool(_),
         ExportValue::Number(_) | ExportValue::String(_) | ExportValue::Bool(_)) => {
            Ok(to_number(left)? == to_number(right)?)
        }
        _ => Err(unsupported("loose equality between objects and primitives")),
    }
}

fn type_of(value: &ExportValue) -> &'static str {
    match value {
        ExportValue::Undefined => "undefined",
        ExportValue::Bool(_) => "boolean",
        ExportValue::Number(_) => "number",
        ExportValue::String(_) => "string",
        ExportValue::BigInt(_) => "bigint",
        ExportValue::Function(_) => "function",
        ExportValue::Symbol(_) => "symbol",
        ExportValue::Null
        | ExportValue::Array(_)
        | ExportValue::Object(_)
        | ExportValue::Circular
        | ExportValue::Unsupported(_) => "object",
    }
}

fn to_primitive(value: ExportValue) -> EvalResult<ExportValue> {
    match value {
        ExportValue::Array(_) | ExportValue::Object(_) => Ok(ExportValue::String(to_js_string(&value)?)),
        ExportValue::Function(_) | ExportValue::Circular => Err(unsupported("function coercion")),
        ExportValue::Unsupported(kind) => Err(unsupported(&format!("coercion of {} instances", kind))),
        other => Ok(other),
    }
}

fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

fn to_number(value: &ExportValue) -> EvalResult<f64> {
    Ok(match value {
        ExportValue::Undefined => f64::NAN,
        ExportValue::Null => 0.0,
        ExportValue::Bool(b) => f64::from(u8::from(*b)),
        ExportValue::Number(n) => *n,
        ExportValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                match trimmed {
                    "Infinity" | "+Infinity" => f64::INFINITY,
                    "-Infinity" => f64::NEG_INFINITY,
                    _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
                    _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
                }
            }
        }
        ExportValue::BigInt(_) => return Err("cannot convert a BigInt to a number implicitly".to_string()),
        ExportValue::Array(_) | ExportValue::Object(_) => to_number(&ExportValue::String(to_js_string(value)?))?,
        ExportValue::Symbol(_) => return Err("cannot convert a Symbol to a number".to_string()),
        ExportValue::Function(_) | ExportValue::Circular => f64::NAN,
        ExportValue::Unsupported(kind) => return Err(unsupported(&format!("coercion of {} instances", kind))),
    })
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

fn to_js_string(value: &ExportValue) -> EvalResult<String> {
    Ok(match value {
        ExportValue::Undefined => "undefined".to_string(),
        ExportValue::Null => "null".to_string(),
        ExportValue::Bool(b) => b.to_string(),
        ExportValue::Number(n) => number_to_string(*n),
        ExportValue::String(s) => s.clone(),
        ExportValue::BigInt(digits) => digits.clone(),
        ExportValue::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(if is_nullish(item) { String::new() } else { to_js_string(item)? });
            }
            parts.join(",")
        }
        ExportValue::Object(_) => "[object Object]".to_string(),
        ExportValue::Symbol(_) => return Err("cannot convert a Symbol to a string".to_string()),
        ExportValue::Function(_) | ExportValue::Circular => {
            return Err(unsupported("string conversion of a function"))
        }
        ExportValue::Unsupported(kind) => return Err(unsupported(&format!("coercion of {} instances", kind))),
    })
}

fn to_property_key(value: &ExportValue) -> EvalResult<String> {
    match value {
        ExportValue::Symbol(_) => Err(unsupported("symbol-keyed property")),
        other => to_js_string(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn eval(src: &str) -> ExportValue {
        evaluate_expression_source(src).unwrap()
    }

    #[test]
    fn test_literals_and_operators() {
        assert_eq!(eval("1 + 2 * 3"), ExportValue::Number(7.0));
        assert_eq!(eval("'a' + 1"), ExportValue::String("a1".into()));
        assert_eq!(eval("`x${1 + 1}y`"), ExportValue::String("x2y".into()));
        assert_eq!(eval("null ?? 'd'"), ExportValue::String("d".into()));
        assert_eq!(eval("0 || 'x'"), ExportValue::String("x".into()));
        assert_eq!(eval("typeof missing"), ExportValue::String("undefined".into()));
        assert_eq!(eval("-(2n * 1n) === undefined"), ExportValue::Bool(false));
        assert_eq!(eval("10n * 3n"), ExportValue::BigInt("30".into()));
        assert_eq!(eval("~5"), ExportValue::Number(-6.0));
        assert_eq!(eval("1 < 2 ? [1, ...[2, 3]] : null"), eval("[1, 2, 3]"));
    }

    #[test]
    fn test_object_spread_and_member_access() {
        let value = eval("({ a: 1, ...{ b: 2, a: 3 }, ['c' + 1]: [4].length })");
        assert_eq!(
            value,
            ExportValue::Object(vec![
                ("a".into(), ExportValue::Number(3.0)),
                ("b".into(), ExportValue::Number(2.0)),
                ("c1".into(), ExportValue::Number(1.0)),
            ])
        );
        assert_eq!(eval("({ x: { y: 'z' } }).x.y"), ExportValue::String("z".into()));
        assert_eq!(eval("({})?.missing?.deeper"), ExportValue::Undefined);
    }

    #[test]
    fn test_string_index_counts_utf16_units() {
        assert_eq!(eval("'😀a'.length"), ExportValue::Number(3.0));
        assert_eq!(eval("'😀a'[2]"), ExportValue::String("a".into()));
        assert_eq!(eval("'é!'[1]"), ExportValue::String("!".into()));
        assert_eq!(eval("'😀a'[3]"), ExportValue::Undefined);
        assert!(evaluate_expression_source("'😀a'[0]").is_err());
    }

    #[test]
    fn test_functions_and_symbols_are_opaque() {
        assert_eq!(eval("function f() {}"), ExportValue::Function("f".into()));
        assert_eq!(eval("Symbol('tag')"), ExportValue::Symbol("tag".into()));
        assert_eq!(eval("Object.freeze({ k: 1 })"), eval("({ k: 1 })"));
        assert!(evaluate_expression_source("fetch('/x')").is_err());
        assert!(evaluate_expression_source("new Date()").is_err());
    }

    #[test]
    fn test_printed_literal_evaluates_back_to_value() {
        let original = eval(
            r#"({ n: -0.5, s: "q\"uote\n", list: [true, null, undefined, [NaN]], "a-b": { deep: 1e21 }, big: -7n })"#,
        );
        let printed = original.to_literal("Config").unwrap();
        let back = evaluate_expression_source(&format!("({})", printed)).unwrap();
        // NaN never compares equal; compare through the tagged encoding.
        assert_eq!(
            serde_json::to_string(&back).unwrap(),
            serde_json::to_string(&original).unwrap()
        );
    }

    #[test]
    fn test_module_with_imports_and_reexports() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.js"),
            "export const size = 3;\nexport default { theme: 'dark' };\nexport function helper() {}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("entry.js"),
            r#"
            import settings, { size as n } from './base';
            import * as all from './base.js';
            export * from './base.js';
            export { settings };
            const { theme, missing = 'fallback' } = settings;
            export const Widget = { count: n, theme, missing, flag: !n };
            export const names = [typeof all.helper, all.size];
            const Handler = () => null;
            export { Handler as Renamed };
            export const later = pending;
            "#,
        )
        .unwrap();

        let mut evaluator = ModuleEvaluator::new();
        let exports = evaluator.load(&dir.path().join("entry.js")).unwrap();
        assert_eq!(
            exports.slot("Widget").unwrap().as_ref().unwrap(),
            &ExportValue::Object(vec![
                ("count".into(), ExportValue::Number(3.0)),
                ("theme".into(), ExportValue::String("dark".into())),
                ("missing".into(), ExportValue::String("fallback".into())),
                ("flag".into(), ExportValue::Bool(false)),
            ])
        );
        assert_eq!(
            exports.slot("names").unwrap().as_ref().unwrap(),
            &ExportValue::Array(vec![
                ExportValue::String("function".into()),
                ExportValue::Number(3.0)
            ])
        );
        assert_eq!(
            exports.slot("Renamed").unwrap().as_ref().unwrap(),
            &ExportValue::Function("Handler".into())
        );
        assert!(exports.slot("size").is_some());
        assert!(exports.slot("default").is_none());
        // Declared but not evaluable: the name exists, the value is deferred.
        assert!(exports.slot("later").unwrap().is_err());
        assert!(exports.slot("Handler").is_none());
    }

    #[test]
    fn test_top_level_throw_fails_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.js");
        fs::write(&path, "export const a = 1;\nthrow new Error('boom');\n").unwrap();
        let err = ModuleEvaluator::new().load(&path).err().unwrap();
        assert!(err.contains("boom"), "{err}");
    }

    #[test]
    fn test_top_level_code_defers_every_export() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("push.js", "export const items = [];\nitems.push(1, 2);\n", 2),
            ("assign.js", "export let count = 1;\ncount = 5;\n", 2),
            (
                "call.js",
                "function boom() { throw new Error('x'); }\nexport const ok = 1;\n\nboom();\n",
                4,
            ),
            ("loop.js", "export const ok = 1;\nfor (const k of []) {}\n", 2),
            ("init.js", "export const ok = 1;\nconst rows = load();\n", 2),
            ("static.js", "export const ok = 1;\nclass Reg { static { ok; } }\n", 2),
        ];
        for (file, source, line) in cases {
            let path = dir.path().join(file);
            fs::write(&path, source).unwrap();
            let exports = ModuleEvaluator::new().load(&path).unwrap();
            let names: Vec<&str> = exports.names().collect();
            assert!(!names.is_empty(), "{file}");
            for name in names {
                let err = exports.slot(name).unwrap().as_ref().unwrap_err();
                assert!(
                    err.contains(&format!("{}:{} runs top-level code", file, line)),
                    "{file}: {err}"
                );
            }
        }
    }

    #[test]
    fn test_inert_top_level_statements_keep_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inert.js");
        fs::write(
            &path,
            "export const a = 1;\n;\na;\nclass Plain { static size = 2; method() { a(); } }\nexport { Plain };\n",
        )
        .unwrap();
        let exports = ModuleEvaluator::new().load(&path).unwrap();
        assert_eq!(exports.slot("a").unwrap().as_ref().unwrap(), &ExportValue::Number(1.0));
        assert_eq!(
            exports.slot("Plain").unwrap().as_ref().unwrap(),
            &ExportValue::Function("Plain".into())
        );
    }

    #[test]
    fn test_circular_import_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.js"), "import { b } from './b.js';\nexport const a = 1;\n").unwrap();
        fs::write(dir.path().join("b.js"), "import { a } from './a.js';\nexport const b = 2;\n").unwrap();
        let err = ModuleEvaluator::new().load(&dir.path().join("a.js")).err().unwrap();
        assert!(err.contains("circular import"), "{err}");
    }

    #[test]
    fn test_package_imports_are_deferred() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uses_pkg.js");
        fs::write(
            &path,
            "import { thing } from 'some-package';\nexport const local = 1;\nexport const remote = thing;\n",
        )
        .unwrap();
        let exports = ModuleEvaluator::new().load(&path).unwrap();
        assert_eq!(exports.slot("local").unwrap().as_ref().unwrap(), &ExportValue::Number(1.0));
        let err = exports.slot("remote").unwrap().as_ref().unwrap_err();
        assert!(err.contains("some-package"));
    }
}
