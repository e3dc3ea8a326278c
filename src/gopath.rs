//! Package loader.
//!
//! Resolves import paths against a rooted workspace: vendored copies shadow
//! workspace packages and nested vendor directories shadow outer ones, so the
//! ancestor walk is innermost-first. When no vendored or `src/` copy exists
//! and module mode is enabled, a `go.mod` manifest at the workspace root maps
//! module-relative paths to directories.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::lexer;
use crate::token::{Span, TokenKind};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{line}:{column}: import \"{path}\" error: {detail}")]
pub struct ImportError {
    pub line: usize,
    pub column: usize,
    pub path: String,
    pub detail: String,
}

/// Source set for one resolved package.
#[derive(Debug)]
pub struct ResolvedPackage {
    pub dir: PathBuf,
    /// Canonical package name declared by every source file.
    pub name: String,
    pub files: Vec<(PathBuf, String)>,
}

#[derive(Debug)]
pub struct Loader {
    root: PathBuf,
    use_modules: bool,
}

impl Loader {
    pub fn new(root: PathBuf, use_modules: bool) -> Self {
        Self { root, use_modules }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `path` for an import written at `span` in a package living in
    /// `from_dir`. Search order: vendor walk from `from_dir` up to the root,
    /// the workspace `src/` layout, then the module manifest.
    pub fn resolve(
        &self,
        path: &str,
        from_dir: &Path,
        span: Span,
    ) -> Result<ResolvedPackage, ImportError> {
        let mut dir = from_dir.to_path_buf();
        loop {
            let candidate = dir.join("vendor").join(path);
            if has_go_files(&candidate) {
                debug!(path, dir = %candidate.display(), "vendored import");
                return self.read_package(path, candidate, span);
            }
            if dir == self.root || !dir.pop() {
                break;
            }
        }

        let candidate = self.root.join("src").join(path);
        if has_go_files(&candidate) {
            debug!(path, dir = %candidate.display(), "workspace import");
            return self.read_package(path, candidate, span);
        }

        if self.use_modules {
            if let Some(module) = read_module_path(&self.root.join("go.mod")) {
                if let Some(candidate) = module_dir(&self.root, &module, path) {
                    if has_go_files(&candidate) {
                        debug!(path, dir = %candidate.display(), "module import");
                        return self.read_package(path, candidate, span);
                    }
                }
            }
        }

        Err(self.error(path, span, format!("unable to find source related to: \"{path}\"")))
    }

    fn read_package(
        &self,
        path: &str,
        dir: PathBuf,
        span: Span,
    ) -> Result<ResolvedPackage, ImportError> {
        let mut name: Option<String> = None;
        let mut files = Vec::new();
        for file in go_files(&dir) {
            let source = fs::read_to_string(&file).map_err(|e| {
                self.error(path, span, format!("reading {}: {e}", file.display()))
            })?;
            if let Some(declared) = scan_package_name(&source) {
                match &name {
                    None => name = Some(declared),
                    Some(existing) if *existing != declared => {
                        return Err(self.error(
                            path,
                            span,
                            format!(
                                "found packages {existing} and {declared} in {}",
                                dir.display()
                            ),
                        ));
                    }
                    Some(_) => {}
                }
            }
            files.push((file, source));
        }
        let name = name.ok_or_else(|| {
            self.error(path, span, format!("no package clause in {}", dir.display()))
        })?;
        Ok(ResolvedPackage { dir, name, files })
    }

    fn error(&self, path: &str, span: Span, detail: String) -> ImportError {
        ImportError {
            line: span.line,
            column: span.column,
            path: path.to_string(),
            detail,
        }
    }
}

fn go_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == "go")
        })
        .collect();
    files.sort();
    files
}

fn has_go_files(dir: &Path) -> bool {
    !go_files(dir).is_empty()
}

/// Reads the package clause without a full parse.
fn scan_package_name(source: &str) -> Option<String> {
    let tokens = lexer::tokenize(source).ok()?;
    let mut tokens = tokens
        .iter()
        .filter(|token| !matches!(token.kind, TokenKind::Semi));
    match (tokens.next(), tokens.next()) {
        (Some(package), Some(name)) if matches!(package.kind, TokenKind::Package) => {
            match name.kind {
                TokenKind::Ident(name) => Some(name.to_string()),
                _ => None,
            }
        }
        _ => None,
    }
}

fn read_module_path(manifest: &Path) -> Option<String> {
    let source = fs::read_to_string(manifest).ok()?;
    source.lines().find_map(|line| {
        line.trim()
            .strip_prefix("module ")
            .map(|rest| rest.trim().trim_matches('"').to_string())
    })
}

fn module_dir(root: &Path, module: &str, path: &str) -> Option<PathBuf> {
    if path == module {
        return Some(root.to_path_buf());
    }
    path.strip_prefix(&format!("{module}/"))
        .map(|rest| root.join(rest))
}
