use oxc_ast::ast::{
    ArrowFunctionExpression, BindingIdentifier, BlockStatement, CatchClause, Class, ClassType,
    ForInStatement, ForOfStatement, ForStatement, Function, FunctionType, Program,
    VariableDeclaration, VariableDeclarationKind,
};
use oxc_ast_visit::Visit;
use oxc_syntax::scope::ScopeFlags;
use std::collections::HashSet;

/// Every name a program binds, split by whether the binding lives in the
/// module scope or in some nested function, class or block scope.
///
/// `var` is function-scoped: a `var` inside a top-level block still binds a
/// module-scope name.
#[derive(Debug, Default, Clone)]
pub struct BindingInventory {
    pub top_level: HashSet<String>,
    pub nested: HashSet<String>,
}

impl BindingInventory {
    pub fn collect(program: &Program<'_>) -> Self {
        let mut collector = BindingCollector {
            inventory: BindingInventory::default(),
            functions: 0,
            blocks: 0,
        };
        collector.visit_program(program);
        collector.inventory
    }

    pub fn binds(&self, name: &str) -> bool {
        self.top_level.contains(name) || self.nested.contains(name)
    }
}

struct BindingCollector {
    inventory: BindingInventory,
    functions: usize,
    blocks: usize,
}

impl BindingCollector {
    fn record(&mut self, name: &str, top_level: bool) {
        if top_level {
            self.inventory.top_level.insert(name.to_string());
        } else {
            self.inventory.nested.insert(name.to_string());
        }
    }

    fn record_lexical(&mut self, name: &str) {
        self.record(name, self.functions == 0 && self.blocks == 0);
    }

    fn record_var(&mut self, name: &str) {
        self.record(name, self.functions == 0);
    }

    fn in_function<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.functions += 1;
        f(self);
        self.functions -= 1;
    }

    fn in_block<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.blocks += 1;
        f(self);
        self.blocks -= 1;
    }
}

impl<'a> Visit<'a> for BindingCollector {
    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.record_lexical(ident.name.as_str());
    }

    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        if decl.kind != VariableDeclarationKind::Var {
            oxc_ast_visit::walk::walk_variable_declaration(self, decl);
            return;
        }
        for declarator in &decl.declarations {
            for id in declarator.id.get_binding_identifiers() {
                self.record_var(id.name.as_str());
            }
            if let Some(init) = &declarator.init {
                self.visit_expression(init);
            }
        }
    }

    fn visit_function(&mut self, func: &Function<'a>, _flags: ScopeFlags) {
        // A declaration names the enclosing scope; an expression's name is
        // visible only inside its own body.
        let declared = matches!(
            func.r#type,
            FunctionType::FunctionDeclaration | FunctionType::TSDeclareFunction
        );
        if let (true, Some(id)) = (declared, &func.id) {
            self.record_lexical(id.name.as_str());
        }
        self.in_function(|v| {
            if let (false, Some(id)) = (declared, &func.id) {
                v.record_lexical(id.name.as_str());
            }
            v.visit_formal_parameters(&func.params);
            if let Some(body) = &func.body {
                v.visit_function_body(body);
            }
        });
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        self.in_function(|v| oxc_ast_visit::walk::walk_arrow_function_expression(v, func));
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        let declared = matches!(class.r#type, ClassType::ClassDeclaration);
        if let (true, Some(id)) = (declared, &class.id) {
            self.record_lexical(id.name.as_str());
        }
        if let Some(super_class) = &class.super_class {
            self.visit_expression(super_class);
        }
        self.in_function(|v| {
            if let (false, Some(id)) = (declared, &class.id) {
                v.record_lexical(id.name.as_str());
            }
            v.visit_class_body(&class.body);
        });
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        self.in_block(|v| oxc_ast_visit::walk::walk_block_statement(v, block));
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        self.in_block(|v| oxc_ast_visit::walk::walk_for_statement(v, stmt));
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        self.in_block(|v| oxc_ast_visit::walk::walk_for_in_statement(v, stmt));
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        self.in_block(|v| oxc_ast_visit::walk::walk_for_of_statement(v, stmt));
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        self.in_block(|v| oxc_ast_visit::walk::walk_catch_clause(v, clause));
    }
}
