//! Code Injector
//!
//! Splices `var name = <expr>;` declarations into a program directly after
//! its last top-level import, in the order given. The injector runs before
//! any pass that consumes these names and performs no I/O.

use crate::error::{BuildError, Result};
use crate::scope::BindingInventory;
use crate::transform::parse_module;
use crate::value::is_declarable_name;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Program, Statement};
use oxc_ast::AstBuilder;
use oxc_span::SourceType;
use std::collections::HashSet;
use std::path::Path;

/// Insert one declaration per `(name, initializer)` pair. Names must be
/// declarable identifiers that the program does not already bind at the top
/// level.
pub fn inject_declarations<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    declarations: &[(String, String)],
) -> Result<()> {
    if declarations.is_empty() {
        return Ok(());
    }

    let bindings = BindingInventory::collect(program);
    let mut injected = HashSet::new();
    let mut text = String::new();
    for (name, initializer) in declarations {
        if !is_declarable_name(name) {
            return Err(BuildError::InvalidDeclarationName(name.clone()));
        }
        if bindings.top_level.contains(name) || !injected.insert(name.as_str()) {
            return Err(BuildError::DeclarationConflict(name.clone()));
        }
        if bindings.nested.contains(name) {
            tracing::warn!(name = %name, "injected declaration is shadowed in a nested scope");
        }
        text.push_str(&format!("var {} = {};\n", name, initializer));
    }

    let statements = parse_declarations(allocator, text)?;
    let ast = AstBuilder::new(allocator);
    let insert_at = insertion_index(program);

    let old_body = std::mem::replace(&mut program.body, ast.vec());
    let mut pending = Some(statements);
    for (index, stmt) in old_body.into_iter().enumerate() {
        if index == insert_at {
            for decl in pending.take().into_iter().flatten() {
                program.body.push(decl);
            }
        }
        program.body.push(stmt);
    }
    for decl in pending.take().into_iter().flatten() {
        program.body.push(decl);
    }
    Ok(())
}

/// Index just past the last top-level import, or 0.
fn insertion_index(program: &Program<'_>) -> usize {
    program
        .body
        .iter()
        .rposition(|stmt| matches!(stmt, Statement::ImportDeclaration(_)))
        .map_or(0, |i| i + 1)
}

fn parse_declarations<'a>(allocator: &'a Allocator, text: String) -> Result<Vec<Statement<'a>>> {
    let source: &'a str = allocator.alloc_str(&text);
    let program = parse_module(
        allocator,
        source,
        SourceType::mjs(),
        Path::new("<injected declarations>"),
    )?;
    Ok(program.body.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_codegen::Codegen;
    use oxc_parser::Parser;

    fn inject(source: &str, declarations: &[(&str, &str)]) -> Result<String> {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true).with_jsx(true);
        let mut program = Parser::new(&allocator, source, source_type).parse().program;
        let declarations: Vec<(String, String)> = declarations
            .iter()
            .map(|(n, s)| (n.to_string(), s.to_string()))
            .collect();
        inject_declarations(&allocator, &mut program, &declarations)?;
        Ok(Codegen::new().build(&program).code)
    }

    #[test]
    fn test_declarations_follow_last_import_in_order() {
        let code = inject(
            "import a from './a.js';\nimport { b } from './b.js';\nrender(Widget, Handler);\n",
            &[("Widget", "{ count: 3 }"), ("Handler", "\"h#Handler\"")],
        )
        .unwrap();
        let import_b = code.find("./b.js").unwrap();
        let widget = code.find("var Widget").unwrap();
        let handler = code.find("var Handler").unwrap();
        let render = code.find("render(").unwrap();
        assert!(import_b < widget && widget < handler && handler < render, "{code}");
        assert!(code.contains("count: 3"));
    }

    #[test]
    fn test_declarations_go_first_without_imports() {
        let code = inject("use(Key);\n", &[("Key", "Mango.n(\"c0@Key\")")]).unwrap();
        assert!(code.trim_start().starts_with("var Key = Mango.n("), "{code}");
    }

    #[test]
    fn test_top_level_collision_is_rejected() {
        let err = inject("const Widget = 1;\n", &[("Widget", "2")]).unwrap_err();
        assert!(matches!(err, BuildError::DeclarationConflict(ref n) if n == "Widget"));

        let err = inject("", &[("A", "1"), ("A", "2")]).unwrap_err();
        assert!(matches!(err, BuildError::DeclarationConflict(_)));
    }

    #[test]
    fn test_var_in_block_collides_with_injected_name() {
        let err = inject("if (x) { var Widget = 1; }
", &[("Widget", "2")]).unwrap_err();
        assert!(matches!(err, BuildError::DeclarationConflict(ref n) if n == "Widget"));

        let err = inject("function Widget() {}
", &[("Widget", "2")]).unwrap_err();
        assert!(matches!(err, BuildError::DeclarationConflict(_)));

        // Block-scoped and function-local bindings only shadow it.
        let code = inject(
            "if (x) { let Widget = 1; }
function f() { var Widget; }
",
            &[("Widget", "2")],
        )
        .unwrap();
        assert!(code.contains("var Widget = 2"), "{code}");
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        for name in ["default", "two words", "1st", "undefined"] {
            let err = inject("", &[(name, "1")]).unwrap_err();
            assert!(matches!(err, BuildError::InvalidDeclarationName(_)), "{name}");
        }
    }

    #[test]
    fn test_broken_initializer_is_parse_error() {
        let err = inject("", &[("A", "{ oops: }")]).unwrap_err();
        assert!(matches!(err, BuildError::Parse { .. }));
    }

    #[test]
    fn test_nothing_to_inject_leaves_program() {
        let code = inject("import x from './x.js';\nx();\n", &[]).unwrap();
        assert!(!code.contains("var "));
    }
}
