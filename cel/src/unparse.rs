//! Renders an [`Ast`] back to CEL source text. Macro calls
//! (`has`/`all`/`exists`/`exists_one`/`filter`/`map`) are reconstructed
//! from [`SourceInfo::macro_calls`] rather than printed as the
//! desugared comprehension, since that table records the original
//! receiver-style call shape (spec §4.6, §9 "macros as AST rewrites").
//!
//! Every binary/ternary operator is rendered fully parenthesized; this
//! gives up matching the original source's exact punctuation in
//! exchange for a trivial round-trip guarantee: re-parsing the output
//! always reproduces the same tree shape regardless of precedence.

use crate::ast::{Ast, CallExpr, Expr, IdedExpr, LiteralKind, SourceInfo};

pub fn unparse(ast: &Ast) -> String {
    format_node(&ast.root, &ast.source_info)
}

fn format_node(e: &IdedExpr, si: &SourceInfo) -> String {
    match si.macro_calls.get(&e.id) {
        Some(original) => format_expr(original, si),
        None => format_expr(e, si),
    }
}

fn format_expr(e: &IdedExpr, si: &SourceInfo) -> String {
    match &e.expr {
        Expr::Literal(lit) => format_literal(lit),
        Expr::Ident(name) => name.to_string(),
        Expr::Select(s) => {
            let operand = format_node(&s.operand, si);
            if s.test_only {
                format!("has({operand}.{})", s.field)
            } else {
                format!("{operand}.{}", s.field)
            }
        }
        Expr::Call(c) => format_call(c, si),
        Expr::List(l) => {
            let items = l.elements.iter().map(|e| format_node(e, si)).collect::<Vec<_>>().join(", ");
            format!("[{items}]")
        }
        Expr::Map(m) => {
            let entries = m
                .entries
                .iter()
                .map(|entry| format!("{}: {}", format_node(&entry.key, si), format_node(&entry.value, si)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{entries}}}")
        }
        Expr::Struct(s) => {
            let fields = s.fields.iter().map(|f| format!("{}: {}", f.name, format_node(&f.value, si))).collect::<Vec<_>>().join(", ");
            format!("{}{{{fields}}}", s.message_name)
        }
        // Only reachable if a comprehension node survived without a
        // recorded macro call, which the parser never produces.
        Expr::Comprehension(_) => "<comprehension>".to_string(),
    }
}

fn format_call(c: &CallExpr, si: &SourceInfo) -> String {
    match c.function.as_ref() {
        "_+_" | "_-_" | "_*_" | "_/_" | "_%_" | "_&&_" | "_||_" | "_==_" | "_!=_" | "_<_" | "_<=_" | "_>_" | "_>=_" => {
            let op = binary_symbol(&c.function);
            format!("({} {op} {})", format_node(&c.args[0], si), format_node(&c.args[1], si))
        }
        "@in" => format!("({} in {})", format_node(&c.args[0], si), format_node(&c.args[1], si)),
        "!_" => format!("!{}", format_node(&c.args[0], si)),
        "-_" => format!("-{}", format_node(&c.args[0], si)),
        "_?_:_" => {
            format!("({} ? {} : {})", format_node(&c.args[0], si), format_node(&c.args[1], si), format_node(&c.args[2], si))
        }
        "_[_]" => format!("{}[{}]", format_node(&c.args[0], si), format_node(&c.args[1], si)),
        _ => {
            let args = c.args.iter().map(|a| format_node(a, si)).collect::<Vec<_>>().join(", ");
            match &c.target {
                Some(t) => format!("{}.{}({args})", format_node(t, si), c.function),
                None => format!("{}({args})", c.function),
            }
        }
    }
}

fn binary_symbol(function: &str) -> &'static str {
    match function {
        "_+_" => "+",
        "_-_" => "-",
        "_*_" => "*",
        "_/_" => "/",
        "_%_" => "%",
        "_&&_" => "&&",
        "_||_" => "||",
        "_==_" => "==",
        "_!=_" => "!=",
        "_<_" => "<",
        "_<=_" => "<=",
        "_>_" => ">",
        "_>=_" => ">=",
        other => unreachable!("not a binary operator: {other}"),
    }
}

fn format_literal(lit: &LiteralKind) -> String {
    match lit {
        LiteralKind::Null => "null".to_string(),
        LiteralKind::Bool(b) => b.to_string(),
        LiteralKind::Int(i) => i.to_string(),
        LiteralKind::UInt(u) => format!("{u}u"),
        LiteralKind::Double(d) => d.to_string(),
        LiteralKind::String(s) => format!("{s:?}"),
        LiteralKind::Bytes(b) => format!("b{:?}", String::from_utf8_lossy(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::source::Source;

    fn roundtrip(src: &str) -> String {
        let ast = parse(&Source::from(src)).unwrap();
        unparse(&ast)
    }

    #[test]
    fn parenthesizes_arithmetic() {
        assert_eq!(roundtrip("1 + 2 * 3"), "(1 + (2 * 3))");
    }

    #[test]
    fn reconstructs_has_macro() {
        assert_eq!(roundtrip("has(a.b)"), "has(a.b)");
    }

    #[test]
    fn reconstructs_all_macro_as_receiver_call() {
        assert_eq!(roundtrip("x.all(e, e > 0)"), "x.all(e, (e > 0))");
    }

    #[test]
    fn unparsed_output_reparses_to_an_equivalent_tree() {
        let original = "a.b + c[0]";
        let once = roundtrip(original);
        let twice = {
            let ast = parse(&Source::from(once.as_str())).unwrap();
            unparse(&ast)
        };
        assert_eq!(once, twice);
    }
}
