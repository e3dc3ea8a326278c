use anyhow::Result;

use crate::token::{Span, Token, TokenKind};

pub mod cst;

use cst::{BinOp, BranchTok, Decl, Expr, Field, File, FuncDecl, ImportSpec, Stmt};

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    current: Token<'a>,
}

enum ForClause {
    Simple(Stmt),
    Range {
        key: Expr,
        value: Option<Expr>,
        expr: Expr,
    },
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new(TokenKind::EOF, Span::default()));
        }
        let current = tokens[0].clone();
        Self {
            tokens,
            pos: 0,
            current,
        }
    }

    pub fn parse_file(mut self) -> Result<File> {
        self.skip_semis();
        self.expect(TokenKind::Package, "package")?;
        let package = self.expect_ident()?;
        self.expect_terminator()?;

        let mut imports = Vec::new();
        while matches!(self.current.kind, TokenKind::Import) {
            self.advance();
            self.parse_import_spec(&mut imports)?;
            self.expect_terminator()?;
        }

        let mut decls = Vec::new();
        while !matches!(self.current.kind, TokenKind::EOF) {
            if self.skip_semis() {
                continue;
            }
            if matches!(self.current.kind, TokenKind::Func) {
                decls.push(Decl::Func(self.parse_func_decl()?));
            } else {
                decls.push(Decl::Stmt(self.parse_statement()?));
            }
            self.expect_terminator()?;
        }

        Ok(File {
            package,
            imports,
            decls,
        })
    }

    fn parse_import_spec(&mut self, imports: &mut Vec<ImportSpec>) -> Result<()> {
        if matches!(self.current.kind, TokenKind::LParen) {
            self.advance();
            loop {
                if self.skip_semis() {
                    continue;
                }
                if matches!(self.current.kind, TokenKind::RParen) {
                    self.advance();
                    return Ok(());
                }
                imports.push(self.expect_import_path()?);
            }
        }
        imports.push(self.expect_import_path()?);
        Ok(())
    }

    fn expect_import_path(&mut self) -> Result<ImportSpec> {
        if let TokenKind::Str(lexeme) = self.current.kind {
            let span = self.current.span;
            self.advance();
            // Import paths carry no escapes; strip the quotes.
            let path = lexeme[1..lexeme.len() - 1].to_string();
            Ok(ImportSpec { path, span })
        } else {
            Err(self.error("import path"))
        }
    }

    fn parse_func_decl(&mut self) -> Result<FuncDecl> {
        self.expect(TokenKind::Func, "func")?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen, "(")?;
        let params = self.parse_field_list(TokenKind::RParen)?;
        self.expect(TokenKind::RParen, ")")?;

        let results = if matches!(self.current.kind, TokenKind::LParen) {
            self.advance();
            let fields = self.parse_field_list(TokenKind::RParen)?;
            self.expect(TokenKind::RParen, ")")?;
            fields
        } else if matches!(
            self.current.kind,
            TokenKind::Ident(_) | TokenKind::LBrack
        ) {
            vec![Field {
                names: Vec::new(),
                typ: self.parse_type()?,
            }]
        } else {
            Vec::new()
        };

        let body = self.parse_block()?;
        Ok(FuncDecl {
            name,
            params,
            results,
            body,
        })
    }

    // Parses `a, b int, c string` and the unnamed form `string, int`. Names
    // are collected until a type appears; a group that runs out at the
    // terminator was a list of bare types.
    fn parse_field_list(&mut self, end: TokenKind<'a>) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        while self.current.kind != end {
            let mut names = vec![match self.current.kind {
                TokenKind::Ident(_) => self.expect_ident()?,
                TokenKind::LBrack => {
                    // A bare array type opens an unnamed group.
                    let typ = self.parse_type()?;
                    fields.push(Field {
                        names: Vec::new(),
                        typ,
                    });
                    if matches!(self.current.kind, TokenKind::Comma) {
                        self.advance();
                    }
                    continue;
                }
                _ => return Err(self.error("parameter")),
            }];

            loop {
                if matches!(self.current.kind, TokenKind::Comma) {
                    self.advance();
                    if matches!(self.current.kind, TokenKind::Ident(_)) {
                        names.push(self.expect_ident()?);
                        continue;
                    }
                    // `, []T` after idents: the idents were bare types.
                    for name in names.drain(..) {
                        fields.push(Field {
                            names: Vec::new(),
                            typ: Expr::Ident(name),
                        });
                    }
                    break;
                }
                if self.current.kind == end {
                    // No trailing type: every collected name was a bare type.
                    for name in names.drain(..) {
                        fields.push(Field {
                            names: Vec::new(),
                            typ: Expr::Ident(name),
                        });
                    }
                    return Ok(fields);
                }
                let typ = self.parse_type()?;
                fields.push(Field { names, typ });
                if matches!(self.current.kind, TokenKind::Comma) {
                    self.advance();
                }
                break;
            }
        }
        Ok(fields)
    }

    fn parse_type(&mut self) -> Result<Expr> {
        match self.current.kind {
            TokenKind::LBrack => {
                self.advance();
                self.expect(TokenKind::RBrack, "]")?;
                Ok(Expr::ArrayType {
                    elem: Box::new(self.parse_type()?),
                })
            }
            TokenKind::Ident(_) => {
                let name = self.expect_ident()?;
                Ok(Expr::Ident(self.maybe_qualified(name)?))
            }
            _ => Err(self.error("type")),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "{")?;
        let mut stmts = Vec::new();
        loop {
            if self.skip_semis() {
                continue;
            }
            if matches!(self.current.kind, TokenKind::RBrace) {
                self.advance();
                return Ok(stmts);
            }
            if matches!(self.current.kind, TokenKind::EOF) {
                return Err(self.error("}"));
            }
            stmts.push(self.parse_statement()?);
            if !matches!(self.current.kind, TokenKind::Semi | TokenKind::RBrace) {
                return Err(self.error("end of statement"));
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        match self.current.kind {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Branch(BranchTok::Break))
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Branch(BranchTok::Continue))
            }
            TokenKind::Goto => {
                self.advance();
                self.expect_ident()?;
                Ok(Stmt::Branch(BranchTok::Goto))
            }
            TokenKind::Fallthrough => {
                self.advance();
                Ok(Stmt::Branch(BranchTok::Fallthrough))
            }
            TokenKind::Var => self.parse_var(),
            _ => self.parse_simple_stmt(),
        }
    }

    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        match self.parse_for_clause(false)? {
            ForClause::Simple(stmt) => Ok(stmt),
            ForClause::Range { .. } => Err(self.error("statement")),
        }
    }

    // Shared by plain statements and for/if headers. With `allow_range`, an
    // assignment whose right side starts with `range` becomes a range clause.
    fn parse_for_clause(&mut self, allow_range: bool) -> Result<ForClause> {
        let lhs = self.parse_expr_list()?;

        match self.current.kind {
            TokenKind::Define | TokenKind::Assign => {
                self.advance();
                if allow_range && matches!(self.current.kind, TokenKind::Range) {
                    self.advance();
                    let expr = self.parse_expr()?;
                    let mut lhs = lhs;
                    let value = if lhs.len() > 1 { Some(lhs.remove(1)) } else { None };
                    let key = lhs.remove(0);
                    return Ok(ForClause::Range { key, value, expr });
                }
                let rhs = self.parse_expr_list()?;
                Ok(ForClause::Simple(Stmt::Assign { lhs, rhs }))
            }
            TokenKind::Inc | TokenKind::Dec => {
                if lhs.len() != 1 {
                    return Err(self.error("single operand"));
                }
                let dec = matches!(self.current.kind, TokenKind::Dec);
                self.advance();
                let mut lhs = lhs;
                Ok(ForClause::Simple(Stmt::IncDec {
                    target: lhs.remove(0),
                    dec,
                }))
            }
            _ => {
                if lhs.len() != 1 {
                    return Err(self.error("assignment"));
                }
                let mut lhs = lhs;
                Ok(ForClause::Simple(Stmt::Expr(lhs.remove(0))))
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::If, "if")?;
        let clause = self.parse_simple_stmt()?;
        let (init, cond) = if matches!(self.current.kind, TokenKind::Semi) {
            self.advance();
            (Some(Box::new(clause)), self.parse_expr()?)
        } else {
            match clause {
                Stmt::Expr(cond) => (None, cond),
                _ => return Err(self.error("if condition")),
            }
        };
        let then = self.parse_block()?;

        let els = if matches!(self.current.kind, TokenKind::Else) {
            self.advance();
            if matches!(self.current.kind, TokenKind::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Stmt::If {
            init,
            cond,
            then,
            els,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::For, "for")?;

        if matches!(self.current.kind, TokenKind::LBrace) {
            let body = self.parse_block()?;
            return Ok(Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
            });
        }

        let mut init = None;
        let mut cond = None;
        if !matches!(self.current.kind, TokenKind::Semi) {
            match self.parse_for_clause(true)? {
                ForClause::Range { key, value, expr } => {
                    let body = self.parse_block()?;
                    return Ok(Stmt::Range {
                        key,
                        value,
                        expr,
                        body,
                    });
                }
                ForClause::Simple(stmt) => {
                    if matches!(self.current.kind, TokenKind::LBrace) {
                        // `for cond { ... }`
                        let cond = match stmt {
                            Stmt::Expr(expr) => expr,
                            _ => return Err(self.error("for condition")),
                        };
                        let body = self.parse_block()?;
                        return Ok(Stmt::For {
                            init: None,
                            cond: Some(cond),
                            post: None,
                            body,
                        });
                    }
                    init = Some(Box::new(stmt));
                }
            }
        }

        self.expect(TokenKind::Semi, ";")?;
        if !matches!(self.current.kind, TokenKind::Semi) {
            cond = Some(self.parse_expr()?);
        }
        self.expect(TokenKind::Semi, ";")?;
        let post = if matches!(self.current.kind, TokenKind::LBrace) {
            None
        } else {
            Some(Box::new(self.parse_simple_stmt()?))
        };
        let body = self.parse_block()?;

        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
        })
    }

    fn parse_var(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::Var, "var")?;
        let mut names = vec![self.expect_ident()?];
        while matches!(self.current.kind, TokenKind::Comma) {
            self.advance();
            names.push(self.expect_ident()?);
        }
        let typ = if matches!(self.current.kind, TokenKind::Ident(_) | TokenKind::LBrack) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let values = if matches!(self.current.kind, TokenKind::Assign) {
            self.advance();
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        Ok(Stmt::Var { names, typ, values })
    }

    fn parse_return(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::Return, "return")?;
        if matches!(self.current.kind, TokenKind::Semi | TokenKind::RBrace) {
            return Ok(Stmt::Return(Vec::new()));
        }
        Ok(Stmt::Return(self.parse_expr_list()?))
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while matches!(self.current.kind, TokenKind::Comma) {
            self.advance();
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Eql => BinOp::Eql,
                TokenKind::Gtr => BinOp::Gtr,
                TokenKind::Lss => BinOp::Lss,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut expr = self.parse_and()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_and()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    // `&` binds tighter than `+`/`-`, as in Go.
    fn parse_and(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary()?;
        while matches!(self.current.kind, TokenKind::Amp) {
            self.advance();
            let right = self.parse_unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinOp::And,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if matches!(self.current.kind, TokenKind::Minus) {
            let span = self.current.span;
            self.advance();
            // Fold the sign into the literal lexeme so negative numbers stay
            // plain BasicLit nodes.
            if let TokenKind::Int(lexeme) = self.current.kind {
                self.advance();
                return Ok(Expr::BasicLit {
                    lexeme: format!("-{lexeme}"),
                    span,
                });
            }
            return Err(self.error("integer literal"));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let mut expr = self.parse_operand()?;
        loop {
            match self.current.kind {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !matches!(self.current.kind, TokenKind::RParen) {
                        args = self.parse_expr_list()?;
                    }
                    self.expect(TokenKind::RParen, ")")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                TokenKind::LBrack => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBrack, "]")?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Expr> {
        match self.current.kind {
            TokenKind::Int(lexeme) | TokenKind::Str(lexeme) => {
                let span = self.current.span;
                self.advance();
                Ok(Expr::BasicLit {
                    lexeme: lexeme.to_string(),
                    span,
                })
            }
            TokenKind::Ident(_) => {
                let name = self.expect_ident()?;
                Ok(Expr::Ident(self.maybe_qualified(name)?))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, ")")?;
                Ok(Expr::Paren(Box::new(expr)))
            }
            TokenKind::LBrack => {
                let typ = self.parse_type()?;
                self.expect(TokenKind::LBrace, "{")?;
                let mut elems = Vec::new();
                if !matches!(self.current.kind, TokenKind::RBrace) {
                    elems = self.parse_expr_list()?;
                }
                self.expect(TokenKind::RBrace, "}")?;
                Ok(Expr::Composite {
                    typ: Box::new(typ),
                    elems,
                })
            }
            _ => Err(self.error("expression")),
        }
    }

    // `pkg.Name` folds into one dotted identifier; the internal AST has no
    // selector shape and the linker resolves the qualification.
    fn maybe_qualified(&mut self, name: String) -> Result<String> {
        if matches!(self.current.kind, TokenKind::Dot) {
            self.advance();
            let member = self.expect_ident()?;
            return Ok(format!("{name}.{member}"));
        }
        Ok(name)
    }

    fn skip_semis(&mut self) -> bool {
        let mut skipped = false;
        while matches!(self.current.kind, TokenKind::Semi) {
            skipped = true;
            self.advance();
        }
        skipped
    }

    fn expect_terminator(&mut self) -> Result<()> {
        if matches!(self.current.kind, TokenKind::Semi) {
            self.advance();
            return Ok(());
        }
        if matches!(self.current.kind, TokenKind::EOF) {
            return Ok(());
        }
        Err(self.error("end of statement"))
    }

    fn expect_ident(&mut self) -> Result<String> {
        if let TokenKind::Ident(name) = self.current.kind {
            self.advance();
            Ok(name.to_string())
        } else {
            Err(self.error("identifier"))
        }
    }

    fn expect(&mut self, kind: TokenKind<'a>, expected: &str) -> Result<()> {
        if self.current.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn advance(&mut self) -> Token<'a> {
        let next = self
            .tokens
            .get(self.pos + 1)
            .cloned()
            .unwrap_or(Token::new(TokenKind::EOF, Span::default()));
        self.pos = self.pos.saturating_add(1);
        std::mem::replace(&mut self.current, next)
    }

    fn error(&self, expected: &str) -> anyhow::Error {
        let span = self.current.span();
        anyhow::anyhow!(
            "Expected {expected}, got {:?} at line {}, column {}",
            self.current.kind(),
            span.line,
            span.column
        )
    }
}

pub fn parse_tokens<'a>(tokens: Vec<Token<'a>>) -> Result<File> {
    Parser::new(tokens).parse_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use indoc::indoc;

    fn parse(source: &str) -> File {
        let tokens = tokenize(source).expect("tokenize failed");
        parse_tokens(tokens).expect("parse failed")
    }

    fn only_func(file: &File) -> &FuncDecl {
        match &file.decls[0] {
            Decl::Func(decl) => decl,
            other => panic!("expected func decl, got {other:?}"),
        }
    }

    #[test]
    fn parses_package_clause_and_imports() {
        let file = parse(indoc! {r#"
            package main

            import "github.com/foo/pkg"
            import (
                "github.com/foo/cheese"
                "github.com/foo/vin"
            )
        "#});
        assert_eq!(file.package, "main");
        let paths: Vec<_> = file.imports.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "github.com/foo/pkg",
                "github.com/foo/cheese",
                "github.com/foo/vin"
            ]
        );
    }

    #[test]
    fn records_import_path_position() {
        let file = parse("package main;import \"github.com/foo/pkg\"");
        assert_eq!(file.imports[0].span.line, 1);
        assert_eq!(file.imports[0].span.column, 21);
    }

    #[test]
    fn parses_func_decl_with_grouped_params_and_results() {
        let file = parse(indoc! {r#"
            package main

            func add(a, b int, s string) (int, string) {
                return a + b, s
            }
        "#});
        let decl = only_func(&file);
        assert_eq!(decl.name, "add");
        assert_eq!(
            decl.params,
            vec![
                Field {
                    names: vec!["a".to_string(), "b".to_string()],
                    typ: Expr::Ident("int".to_string()),
                },
                Field {
                    names: vec!["s".to_string()],
                    typ: Expr::Ident("string".to_string()),
                },
            ]
        );
        assert_eq!(
            decl.results,
            vec![
                Field {
                    names: Vec::new(),
                    typ: Expr::Ident("int".to_string()),
                },
                Field {
                    names: Vec::new(),
                    typ: Expr::Ident("string".to_string()),
                },
            ]
        );
        assert_eq!(
            decl.body,
            vec![Stmt::Return(vec![
                Expr::Binary {
                    left: Box::new(Expr::Ident("a".to_string())),
                    op: BinOp::Add,
                    right: Box::new(Expr::Ident("b".to_string())),
                },
                Expr::Ident("s".to_string()),
            ])]
        );
    }

    #[test]
    fn parses_if_with_init_and_else() {
        let file = parse(indoc! {r#"
            package main

            func f() int {
                if x := 1; x > 0 {
                    return x
                } else {
                    return 0
                }
            }
        "#});
        let decl = only_func(&file);
        match &decl.body[0] {
            Stmt::If {
                init, cond, els, ..
            } => {
                assert!(init.is_some());
                assert!(matches!(cond, Expr::Binary { op: BinOp::Gtr, .. }));
                assert!(els.is_some());
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn parses_all_for_shapes() {
        let file = parse(indoc! {r#"
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
        let decl = only_func(&file);
        let shapes: Vec<(bool, bool, bool)> = decl
            .body
            .iter()
            .map(|stmt| match stmt {
                Stmt::For {
                    init, cond, post, ..
                } => (init.is_some(), cond.is_some(), post.is_some()),
                other => panic!("expected for, got {other:?}"),
            })
            .collect();
        assert_eq!(
            shapes,
            vec![
                (false, false, false),
                (false, true, false),
                (true, true, false),
                (false, true, true),
                (true, true, true),
            ]
        );
    }

    #[test]
    fn parses_range_with_key_and_value() {
        let file = parse(indoc! {r#"
            package main

            func f() {
                for i, v := range xs {
                    println(i, v)
                }
            }
        "#});
        let decl = only_func(&file);
        match &decl.body[0] {
            Stmt::Range {
                key, value, expr, ..
            } => {
                assert_eq!(key, &Expr::Ident("i".to_string()));
                assert_eq!(value, &Some(Expr::Ident("v".to_string())));
                assert_eq!(expr, &Expr::Ident("xs".to_string()));
            }
            other => panic!("expected range, got {other:?}"),
        }
    }

    #[test]
    fn folds_qualified_names_into_dotted_idents() {
        let file = parse("package main;pkg.NewSample()");
        match &file.decls[0] {
            Decl::Stmt(Stmt::Expr(Expr::Call { callee, .. })) => {
                assert_eq!(**callee, Expr::Ident("pkg.NewSample".to_string()));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn parses_multi_assign_and_composite_literal() {
        let file = parse(indoc! {r#"
            package main

            func f() {
                a, b := twin()
                xs := []int{1, 2, 3}
                xs[0] = a + b
            }
        "#});
        let decl = only_func(&file);
        match &decl.body[0] {
            Stmt::Assign { lhs, rhs } => {
                assert_eq!(lhs.len(), 2);
                assert_eq!(rhs.len(), 1);
            }
            other => panic!("expected assign, got {other:?}"),
        }
        match &decl.body[1] {
            Stmt::Assign { rhs, .. } => {
                assert!(matches!(&rhs[0], Expr::Composite { elems, .. } if elems.len() == 3));
            }
            other => panic!("expected assign, got {other:?}"),
        }
        match &decl.body[2] {
            Stmt::Assign { lhs, .. } => {
                assert!(matches!(&lhs[0], Expr::Index { .. }));
            }
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn folds_unary_minus_into_integer_lexeme() {
        let file = parse("package main;x := -5");
        match &file.decls[0] {
            Decl::Stmt(Stmt::Assign { rhs, .. }) => {
                assert!(matches!(&rhs[0], Expr::BasicLit { lexeme, .. } if lexeme == "-5"));
            }
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn amp_binds_tighter_than_plus() {
        let file = parse("package main;x := 1 + 2 & 3");
        match &file.decls[0] {
            Decl::Stmt(Stmt::Assign { rhs, .. }) => match &rhs[0] {
                Expr::Binary { op, right, .. } => {
                    assert_eq!(*op, BinOp::Add);
                    assert!(matches!(**right, Expr::Binary { op: BinOp::And, .. }));
                }
                other => panic!("expected binary, got {other:?}"),
            },
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn errors_on_missing_statement_terminator() {
        let tokens = tokenize("package main;func f() { a := 1 b := 2 }").expect("tokenize");
        let err = parse_tokens(tokens).expect_err("expected parse failure");
        assert!(err.to_string().contains("Expected end of statement"));
    }
}
