//! Lowering: surface CST to the tagged internal AST.
//!
//! Each surface node becomes one internal node. Control-flow statements are
//! refined into shape-specific kinds (`For0..For4`, `If0..If3`) and binary
//! operators select their action here, so the executor dispatches without
//! re-inspecting structure.

use thiserror::Error;
use tracing::warn;

use crate::ast::{Action, Def, Kind, NodeId, NodeStack, Nodes};
use crate::parser::cst::{BinOp, BranchTok, Decl, Expr, Field, File, FuncDecl, Stmt};
use crate::value::Value;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LowerError {
    #[error("assignment mismatch: {targets} variables but {values} values")]
    AssignMismatch { targets: usize, values: usize },
}

pub type LowerResult<T> = Result<T, LowerError>;

/// Lowers one parsed file into the arena, returning the unit root and its
/// definition map.
pub fn lower_file(file: &File, nodes: &mut Nodes) -> LowerResult<(NodeId, Def)> {
    let mut lowerer = Lowerer {
        nodes,
        def: Def::new(),
        stack: NodeStack::default(),
    };
    let root = lowerer.file(file)?;
    debug_assert!(lowerer.stack.is_empty(), "unbalanced lowering walk");
    Ok((root, lowerer.def))
}

struct Lowerer<'a> {
    nodes: &'a mut Nodes,
    def: Def,
    stack: NodeStack,
}

impl Lowerer<'_> {
    /// Creates a node under the current ancestor and makes it the ancestor
    /// for its children. Every `begin` pairs with one `end`.
    fn begin(&mut self, kind: Kind, action: Action) -> NodeId {
        let node = self.nodes.add_child(self.stack.top(), kind, action);
        self.stack.push(node);
        node
    }

    fn end(&mut self) {
        let popped = self.stack.pop();
        debug_assert!(popped.is_some(), "lowering visit sequence underflow");
    }

    fn file(&mut self, file: &File) -> LowerResult<NodeId> {
        let node = self.begin(Kind::File, Action::Nop);
        for decl in &file.decls {
            match decl {
                Decl::Func(func) => self.func_decl(func)?,
                Decl::Stmt(stmt) => self.stmt(stmt)?,
            }
        }
        self.end();
        Ok(node)
    }

    fn func_decl(&mut self, decl: &FuncDecl) -> LowerResult<()> {
        let node = self.begin(Kind::FuncDecl, Action::Nop);
        self.def.insert(decl.name.clone(), node);
        self.ident(&decl.name);

        self.begin(Kind::FuncType, Action::Nop);
        self.field_list(&decl.params)?;
        if !decl.results.is_empty() {
            self.field_list(&decl.results)?;
        }
        self.end();

        self.block(&decl.body)?;
        self.end();
        Ok(())
    }

    fn field_list(&mut self, fields: &[Field]) -> LowerResult<()> {
        self.begin(Kind::FieldList, Action::Nop);
        for field in fields {
            self.begin(Kind::Field, Action::Nop);
            for name in &field.names {
                self.ident(name);
            }
            self.expr(&field.typ)?;
            self.end();
        }
        self.end();
        Ok(())
    }

    fn block(&mut self, stmts: &[Stmt]) -> LowerResult<()> {
        self.begin(Kind::BlockStmt, Action::Nop);
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        self.end();
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> LowerResult<()> {
        match stmt {
            Stmt::Block(stmts) => self.block(stmts),
            Stmt::Assign { lhs, rhs } => {
                let action = if lhs.len() > 1 && rhs.len() == 1 {
                    Action::AssignX
                } else if lhs.len() != rhs.len() {
                    return Err(LowerError::AssignMismatch {
                        targets: lhs.len(),
                        values: rhs.len(),
                    });
                } else {
                    Action::Assign
                };
                self.begin(Kind::AssignStmt, action);
                for expr in lhs.iter().chain(rhs.iter()) {
                    self.expr(expr)?;
                }
                self.end();
                Ok(())
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
            } => {
                let kind = match (init.is_some(), els.is_some()) {
                    (false, false) => Kind::If0,
                    (false, true) => Kind::If1,
                    (true, false) => Kind::If2,
                    (true, true) => Kind::If3,
                };
                self.begin(kind, Action::Nop);
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                self.expr(cond)?;
                self.block(then)?;
                if let Some(els) = els {
                    self.block(els)?;
                }
                self.end();
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                let kind = match (init.is_some(), cond.is_some(), post.is_some()) {
                    (_, false, _) => Kind::For0,
                    (false, true, false) => Kind::For1,
                    (true, true, false) => Kind::For2,
                    (false, true, true) => Kind::For3,
                    (true, true, true) => Kind::For4,
                };
                self.begin(kind, Action::Nop);
                if let Some(init) = init {
                    self.stmt(init)?;
                }
                if let Some(cond) = cond {
                    self.expr(cond)?;
                }
                if let Some(post) = post {
                    self.stmt(post)?;
                }
                self.block(body)?;
                self.end();
                Ok(())
            }
            Stmt::Range {
                key,
                value,
                expr,
                body,
            } => {
                // The surface syntax has no loop-head token; insert the
                // ForRangeStmt parent the executor expects.
                self.begin(Kind::ForRangeStmt, Action::Nop);
                self.begin(Kind::RangeStmt, Action::Range);
                self.expr(key)?;
                if let Some(value) = value {
                    self.expr(value)?;
                }
                self.expr(expr)?;
                self.block(body)?;
                self.end();
                self.end();
                Ok(())
            }
            Stmt::IncDec { target, dec } => {
                let action = if *dec { Action::Dec } else { Action::Inc };
                self.begin(Kind::IncDecStmt, action);
                self.expr(target)?;
                self.end();
                Ok(())
            }
            Stmt::Return(exprs) => {
                self.begin(Kind::ReturnStmt, Action::Return);
                for expr in exprs {
                    self.expr(expr)?;
                }
                self.end();
                Ok(())
            }
            Stmt::Branch(tok) => {
                let kind = match tok {
                    BranchTok::Break => Kind::Break,
                    BranchTok::Continue => Kind::Continue,
                    BranchTok::Goto => Kind::Goto,
                    BranchTok::Fallthrough => Kind::Fallthrough,
                };
                self.begin(kind, Action::Nop);
                self.end();
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.begin(Kind::ExprStmt, Action::Nop);
                self.expr(expr)?;
                self.end();
                Ok(())
            }
            Stmt::Var { names, values, .. } => {
                // Not classified yet; executing the node is a no-op.
                warn!(shape = "var declaration", "unknown statement kind");
                self.begin(Kind::Undef, Action::Nop);
                for name in names {
                    self.ident(name);
                }
                for value in values {
                    self.expr(value)?;
                }
                self.end();
                Ok(())
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> LowerResult<()> {
        match expr {
            Expr::Ident(name) => {
                self.ident(name);
                Ok(())
            }
            Expr::BasicLit { lexeme, .. } => {
                let node = self.begin(Kind::BasicLit, Action::Nop);
                self.nodes[node].ident = Some(lexeme.clone());
                self.nodes[node].val = Some(literal_value(lexeme));
                self.end();
                Ok(())
            }
            Expr::Binary { left, op, right } => {
                let action = match op {
                    BinOp::Add => Action::Add,
                    BinOp::Sub => Action::Sub,
                    BinOp::And => Action::And,
                    BinOp::Eql => Action::Equal,
                    BinOp::Gtr => Action::Greater,
                    BinOp::Lss => Action::Lower,
                };
                self.begin(Kind::BinaryExpr, action);
                self.expr(left)?;
                self.expr(right)?;
                self.end();
                Ok(())
            }
            Expr::Call { callee, args } => {
                let action = match callee.as_ref() {
                    Expr::Ident(name) if name == "println" => Action::Println,
                    _ => Action::Call,
                };
                self.begin(Kind::CallExpr, action);
                self.expr(callee)?;
                for arg in args {
                    self.expr(arg)?;
                }
                self.end();
                Ok(())
            }
            Expr::Index { target, index } => {
                self.begin(Kind::IndexExpr, Action::GetIndex);
                self.expr(target)?;
                self.expr(index)?;
                self.end();
                Ok(())
            }
            Expr::Paren(inner) => {
                self.begin(Kind::ParenExpr, Action::Nop);
                self.expr(inner)?;
                self.end();
                Ok(())
            }
            Expr::ArrayType { elem } => {
                self.begin(Kind::ArrayType, Action::Nop);
                self.expr(elem)?;
                self.end();
                Ok(())
            }
            Expr::Composite { typ, elems } => {
                self.begin(Kind::CompositeLit, Action::ArrayLit);
                self.expr(typ)?;
                for elem in elems {
                    self.expr(elem)?;
                }
                self.end();
                Ok(())
            }
        }
    }

    fn ident(&mut self, name: &str) {
        let node = self.begin(Kind::Ident, Action::Nop);
        self.nodes[node].ident = Some(name.to_string());
        self.end();
    }
}

/// Values a literal lexeme: signed integers with base auto-detection, quoted
/// strings unescaped, anything else kept verbatim as a string.
fn literal_value(lexeme: &str) -> Value {
    if lexeme.starts_with('"') {
        return Value::Str(unquote(lexeme));
    }
    match parse_int(lexeme) {
        Some(v) => Value::Int(v),
        None => Value::Str(lexeme.to_string()),
    }
}

fn parse_int(lexeme: &str) -> Option<i64> {
    let (negative, digits) = match lexeme.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lexeme.strip_prefix('+').unwrap_or(lexeme)),
    };
    let (radix, digits) = if let Some(rest) =
        digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
    {
        (16, rest)
    } else if let Some(rest) = digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")) {
        (8, rest)
    } else if let Some(rest) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, rest)
    } else {
        (10, digits)
    };
    if digits.is_empty() {
        return None;
    }
    let value = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -value } else { value })
}

fn unquote(lexeme: &str) -> String {
    let inner = &lexeme[1..lexeme.len().saturating_sub(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;
    use indoc::indoc;

    fn lower(source: &str) -> (Nodes, NodeId, Def) {
        let tokens = tokenize(source).expect("tokenize failed");
        let file = parse_tokens(tokens).expect("parse failed");
        let mut nodes = Nodes::new();
        let (root, def) = lower_file(&file, &mut nodes).expect("lower failed");
        (nodes, root, def)
    }

    fn kinds(nodes: &Nodes) -> Vec<Kind> {
        (0..nodes.len()).map(|id| nodes[id].kind).collect()
    }

    #[test]
    fn produces_a_single_rooted_tree_with_distinct_indices() {
        let (nodes, root, _) = lower(indoc! {r#"
            package main

            func f(n int) int {
                return n + 1
            }
        "#});

        assert_eq!(nodes[root].kind, Kind::File);
        let mut seen = std::collections::HashSet::new();
        let mut rootless = 0;
        for id in 0..nodes.len() {
            assert!(seen.insert(nodes[id].index), "duplicate index");
            if nodes[id].anc.is_none() {
                rootless += 1;
            }
            for &child in &nodes[id].child {
                assert_eq!(nodes[child].anc, Some(id));
            }
        }
        assert_eq!(rootless, 1);
        // Indices follow construction order.
        for id in 1..nodes.len() {
            assert!(nodes[id].index > nodes[id - 1].index);
        }
    }

    #[test]
    fn classifies_for_shapes() {
        let (nodes, _, _) = lower(indoc! {r#"
            package main

            func f() {
                for {
                    break
                }
                for i < 10 {
                    i++
                }
                for i := 0; i < 10; {
                    i++
                }
                for ; i < 10; i++ {
                }
                for i := 0; i < 10; i++ {
                }
            }
        "#});
        let kinds = kinds(&nodes);
        for kind in [Kind::For0, Kind::For1, Kind::For2, Kind::For3, Kind::For4] {
            assert_eq!(
                kinds.iter().filter(|k| **k == kind).count(),
                1,
                "expected exactly one {kind}"
            );
        }
    }

    #[test]
    fn classifies_if_shapes() {
        let (nodes, _, _) = lower(indoc! {r#"
            package main

            func f() {
                if a {
                }
                if a {
                } else {
                }
                if x := 1; a {
                }
                if x := 1; a {
                } else {
                }
            }
        "#});
        let kinds = kinds(&nodes);
        for kind in [Kind::If0, Kind::If1, Kind::If2, Kind::If3] {
            assert_eq!(
                kinds.iter().filter(|k| **k == kind).count(),
                1,
                "expected exactly one {kind}"
            );
        }
    }

    #[test]
    fn inserts_synthetic_range_parent() {
        let (nodes, _, _) = lower(indoc! {r#"
            package main

            func f() {
                for i, v := range xs {
                    println(i, v)
                }
            }
        "#});
        let parent = (0..nodes.len())
            .find(|&id| nodes[id].kind == Kind::ForRangeStmt)
            .expect("ForRangeStmt node");
        assert_eq!(nodes[parent].child.len(), 1);
        let head = nodes[parent].child[0];
        assert_eq!(nodes[head].kind, Kind::RangeStmt);
        assert_eq!(nodes[head].action, Action::Range);
    }

    #[test]
    fn registers_function_declarations() {
        let (nodes, _, def) = lower(indoc! {r#"
            package main

            func one() int {
                return 1
            }

            func two() int {
                return 2
            }
        "#});
        assert_eq!(def.len(), 2);
        let one = def["one"];
        assert_eq!(nodes[one].kind, Kind::FuncDecl);
    }

    #[test]
    fn selects_binary_actions_by_operator() {
        let (nodes, _, _) = lower("package main;x := 1 + 2 - 3 & 4");
        let actions: Vec<Action> = (0..nodes.len())
            .filter(|&id| nodes[id].kind == Kind::BinaryExpr)
            .map(|id| nodes[id].action)
            .collect();
        assert!(actions.contains(&Action::Add));
        assert!(actions.contains(&Action::Sub));
        assert!(actions.contains(&Action::And));
    }

    #[test]
    fn populates_literal_values_with_base_detection() {
        let cases = [
            ("42", Value::Int(42)),
            ("-7", Value::Int(-7)),
            ("0x1f", Value::Int(31)),
            ("0o17", Value::Int(15)),
            ("0b101", Value::Int(5)),
            // Leading zeros are plain decimal, not legacy octal.
            ("0777", Value::Int(777)),
        ];
        for (lexeme, expected) in cases {
            assert_eq!(literal_value(lexeme), expected, "lexeme {lexeme}");
        }
        assert_eq!(
            literal_value("12ab"),
            Value::Str("12ab".to_string()),
            "unparseable lexeme is kept verbatim"
        );
        assert_eq!(
            literal_value(r#""a\n\"b""#),
            Value::Str("a\n\"b".to_string())
        );
    }

    #[test]
    fn literal_nodes_keep_their_lexeme() {
        let (nodes, _, _) = lower("package main;x := 0x10");
        let lit = (0..nodes.len())
            .find(|&id| nodes[id].kind == Kind::BasicLit)
            .expect("literal node");
        assert_eq!(nodes[lit].ident.as_deref(), Some("0x10"));
        assert_eq!(nodes[lit].val, Some(Value::Int(16)));
    }

    #[test]
    fn unclassified_statements_lower_to_undef() {
        let (nodes, _, _) = lower("package main;var x = 1");
        assert!((0..nodes.len()).any(|id| nodes[id].kind == Kind::Undef
            && nodes[id].action == Action::Nop));
    }

    #[test]
    fn mismatched_assignment_is_a_lowering_error() {
        let tokens = tokenize("package main;a, b = 1, 2, 3").expect("tokenize");
        let file = parse_tokens(tokens).expect("parse");
        let mut nodes = Nodes::new();
        let err = lower_file(&file, &mut nodes).expect_err("expected lowering failure");
        assert_eq!(
            err,
            LowerError::AssignMismatch {
                targets: 2,
                values: 3
            }
        );
    }

    #[test]
    fn multi_target_single_rhs_selects_assign_x() {
        let (nodes, _, _) = lower("package main;a, b := f()");
        let assign = (0..nodes.len())
            .find(|&id| nodes[id].kind == Kind::AssignStmt)
            .expect("assign node");
        assert_eq!(nodes[assign].action, Action::AssignX);
    }
}
