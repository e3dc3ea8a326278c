//! Host API.
//!
//! An `Interp` owns the node arena, the session symbol table and the package
//! loader. `eval` drives the pipeline: parse, load imports, lower, commit the
//! unit's definitions, execute, and hand the last expression's value back to
//! the host.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::exec::Machine;
use crate::gopath::Loader;
use crate::lexer;
use crate::lower;
use crate::parser;
use crate::sym::{PkgId, SymRef, SymbolTable, Symbols, MAIN_PKG};
use crate::token::Span;
use crate::value::Value;
use crate::{ast::Nodes, parser::cst};

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Workspace root containing `src/` trees and vendored dependencies.
    pub gopath: PathBuf,
}

pub struct Interp {
    nodes: Nodes,
    table: SymbolTable,
    loader: Loader,
    globals: HashMap<String, Value>,
    out: Vec<String>,
}

impl Interp {
    pub fn new(options: Options) -> Self {
        // The literal value "off" disables manifest resolution.
        let use_modules = env::var("GO111MODULE")
            .map(|value| value != "off")
            .unwrap_or(true);
        Self {
            nodes: Nodes::new(),
            table: SymbolTable::new(),
            loader: Loader::new(options.gopath, use_modules),
            globals: HashMap::new(),
            out: Vec::new(),
        }
    }

    /// Overlays a host symbol table (typically the standard library binding).
    /// User definitions shadow overlaid names.
    pub fn use_symbols(&mut self, symbols: Symbols) {
        self.table.overlay(symbols);
    }

    /// Parses, links and executes one source fragment. Returns the value of
    /// the fragment's last expression, or `None` when there is none. The
    /// instance stays usable after a failure: definitions are committed only
    /// once the whole unit has lowered and linked.
    pub fn eval(&mut self, src: &str) -> Result<Option<Value>> {
        let wrapped = wrap(src);
        let tokens = lexer::tokenize(&wrapped)?;
        let file = parser::parse_tokens(tokens)?;

        let mut staged = self.table.clone();
        for spec in &file.imports {
            let root = self.loader.root().to_path_buf();
            let pkg = self.load_import(&mut staged, &spec.path, spec.span, &root)?;
            let binding = staged.package(pkg).name.clone();
            staged.bind_import(MAIN_PKG, binding, pkg);
        }

        let (root, def) = lower::lower_file(&file, &mut self.nodes)?;
        staged.merge_defs(MAIN_PKG, def);
        self.table = staged;

        let mut machine = Machine::new(
            &mut self.nodes,
            &self.table,
            &mut self.globals,
            &mut self.out,
        );
        Ok(machine.run_file(root)?)
    }

    /// Loads the package for one import path, registering it and everything
    /// it transitively imports in the staged table. Packages already staged
    /// (same resolved directory) are reused, which also terminates cycles.
    fn load_import(
        &mut self,
        staged: &mut SymbolTable,
        path: &str,
        span: Span,
        from_dir: &Path,
    ) -> Result<PkgId> {
        let resolved = self.loader.resolve(path, from_dir, span)?;
        if let Some(existing) = staged.package_by_dir(&resolved.dir) {
            return Ok(existing);
        }
        let pkg = staged.add_package(resolved.name.clone(), resolved.dir.clone());

        for (file_path, source) in &resolved.files {
            let file = parse_source(source)
                .with_context(|| format!("importing {}", file_path.display()))?;
            let (_, def) = lower::lower_file(&file, &mut self.nodes)
                .with_context(|| format!("importing {}", file_path.display()))?;
            staged.merge_defs(pkg, def);

            for spec in &file.imports {
                let dep = self.load_import(staged, &spec.path, spec.span, &resolved.dir)?;
                let binding = staged.package(dep).name.clone();
                staged.bind_import(pkg, binding, dep);
            }
        }
        Ok(pkg)
    }

    /// Invokes a function handle returned by `eval`.
    pub fn call(&mut self, func: &Value, args: &[Value]) -> Result<Value> {
        let Value::Func { node, pkg } = func else {
            bail!("not a function: {}", func.type_name());
        };
        let name = self.nodes[*node]
            .child
            .first()
            .and_then(|&child| self.nodes[child].ident.clone())
            .unwrap_or_else(|| "func".to_string());
        let mut machine = Machine::new(
            &mut self.nodes,
            &self.table,
            &mut self.globals,
            &mut self.out,
        );
        Ok(machine.call_function(*node, *pkg, &name, args.to_vec())?)
    }

    /// Resolves a committed definition to a callable handle, if any.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match self.table.resolve(MAIN_PKG, name) {
            Some(SymRef::Func { node, pkg }) => Some(Value::Func { node, pkg }),
            _ => None,
        }
    }

    /// Takes the `println` lines buffered since the last drain.
    pub fn drain_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.out)
    }
}

fn parse_source(source: &str) -> Result<cst::File> {
    let tokens = lexer::tokenize(source)?;
    parser::parse_tokens(tokens)
}

/// Bare fragments (no package clause) evaluate as package main, so `import`
/// lines and expressions submit directly. Positions count the prefix.
fn wrap(src: &str) -> String {
    let trimmed = src.trim_start();
    let has_clause = trimmed
        .strip_prefix("package")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_whitespace()));
    if has_clause {
        src.to_string()
    } else {
        format!("package main;{src}")
    }
}
