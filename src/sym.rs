//! Per-package symbol tables and the host symbol overlay.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::{Def, NodeId};
use crate::exec::ExecError;
use crate::value::Value;

/// Index of a loaded package in the session table. Package 0 is always the
/// eval unit (`main`).
pub type PkgId = usize;

pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value, ExecError>>;

/// Host-supplied symbol set, overlaid below user definitions.
#[derive(Clone, Default)]
pub struct Symbols {
    map: HashMap<String, NativeFn>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, ExecError> + 'static,
    {
        self.map.insert(name.to_string(), Rc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&NativeFn> {
        self.map.get(name)
    }
}

/// One compilation unit: declared name, its definitions, and what its
/// imports are bound to.
#[derive(Clone)]
pub struct Package {
    pub name: String,
    pub defs: Def,
    pub imports: HashMap<String, PkgId>,
}

impl Package {
    fn new(name: String) -> Self {
        Self {
            name,
            defs: Def::new(),
            imports: HashMap::new(),
        }
    }
}

/// Where a call site resolved to.
pub enum SymRef {
    Func { node: NodeId, pkg: PkgId },
    Native(NativeFn),
}

/// Session-wide table. `eval` stages mutations on a clone and commits it
/// whole, so a failed submission leaves no partial state behind.
#[derive(Clone)]
pub struct SymbolTable {
    packages: Vec<Package>,
    by_dir: HashMap<PathBuf, PkgId>,
    externals: Symbols,
}

pub const MAIN_PKG: PkgId = 0;

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            packages: vec![Package::new("main".to_string())],
            by_dir: HashMap::new(),
            externals: Symbols::new(),
        }
    }

    pub fn overlay(&mut self, symbols: Symbols) {
        self.externals.map.extend(symbols.map);
    }

    pub fn package(&self, id: PkgId) -> &Package {
        &self.packages[id]
    }

    pub fn package_by_dir(&self, dir: &Path) -> Option<PkgId> {
        self.by_dir.get(dir).copied()
    }

    pub fn add_package(&mut self, name: String, dir: PathBuf) -> PkgId {
        let id = self.packages.len();
        self.packages.push(Package::new(name));
        self.by_dir.insert(dir, id);
        id
    }

    pub fn bind_import(&mut self, importer: PkgId, binding: String, pkg: PkgId) {
        self.packages[importer].imports.insert(binding, pkg);
    }

    pub fn merge_defs(&mut self, pkg: PkgId, defs: Def) {
        self.packages[pkg].defs.extend(defs);
    }

    /// Resolves a name from inside `from`: the unit's own definitions first,
    /// dotted names through its import bindings, the host overlay last (so
    /// user code shadows it).
    pub fn resolve(&self, from: PkgId, name: &str) -> Option<SymRef> {
        if let Some((qual, member)) = name.split_once('.') {
            if let Some(&pkg) = self.packages[from].imports.get(qual) {
                if let Some(&node) = self.packages[pkg].defs.get(member) {
                    return Some(SymRef::Func { node, pkg });
                }
            }
        } else if let Some(&node) = self.packages[from].defs.get(name) {
            return Some(SymRef::Func { node, pkg: from });
        }
        self.externals.get(name).cloned().map(SymRef::Native)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal default host binding used by the tests and the CLI.
pub fn stdlib() -> Symbols {
    let mut symbols = Symbols::new();
    symbols.insert("len", |args| {
        if args.len() != 1 {
            return Err(ExecError::ArityMismatch {
                name: "len".to_string(),
                expected: 1,
                found: args.len(),
            });
        }
        match &args[0] {
            Value::Arr(values) => Ok(Value::Int(values.borrow().len() as i64)),
            Value::Str(s) => Ok(Value::Int(s.len() as i64)),
            other => Err(ExecError::InvalidArgument {
                message: format!("len of {}", other.type_name()),
            }),
        }
    });
    symbols
}
