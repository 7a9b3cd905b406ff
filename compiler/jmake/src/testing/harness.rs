use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jmake_ir::{Module, ModuleId, OrderEntry, Project, SourceRoot, PACKAGE_INFO_FILE_NAME};
use parking_lot::RwLock;
use tempfile::TempDir;

use super::mocks::{write_class_file, ScriptedProcess};
use crate::chunk::{ModuleChunk, SharedProject};

/// A source line containing this makes [`simulate_compile`] report an error.
pub const ERROR_MARKER: &str = "COMPILE_ERROR";

/// On-disk project under a temp directory.
///
/// Module `m` gets `<root>/m/src` (production), `<root>/m/test` (test) and
/// `<root>/out/m` as output directory.
pub struct ProjectBuilder {
    dir: TempDir,
    project: SharedProject,
}

impl ProjectBuilder {
    pub fn new() -> io::Result<Self> {
        Ok(ProjectBuilder {
            dir: tempfile::tempdir()?,
            project: Arc::new(RwLock::new(Project::new())),
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn project(&self) -> SharedProject {
        Arc::clone(&self.project)
    }

    /// Module whose test classes share the production output directory.
    pub fn module(&self, name: &str) -> io::Result<ModuleId> {
        self.add(name, false)
    }

    /// Module with a separate `<root>/out/<name>-test` output directory.
    pub fn module_with_test_output(&self, name: &str) -> io::Result<ModuleId> {
        self.add(name, true)
    }

    fn add(&self, name: &str, test_output: bool) -> io::Result<ModuleId> {
        let base = self.root().join(name);
        let src = base.join("src");
        let test = base.join("test");
        let out = self.root().join("out").join(name);
        for dir in [&src, &test, &out] {
            fs::create_dir_all(dir)?;
        }
        let mut module = Module::new(name)
            .with_source_root(SourceRoot::production(src))
            .with_source_root(SourceRoot::test(test))
            .with_output_dir(out);
        if test_output {
            let test_out = self.root().join("out").join(format!("{name}-test"));
            fs::create_dir_all(&test_out)?;
            module = module.with_test_output_dir(test_out);
        }
        Ok(self.project.write().add_module(module))
    }

    /// Make `from` depend on `to`.
    pub fn depends_on(&self, from: ModuleId, to: ModuleId) {
        if let Some(module) = self.project.write().module_mut(from) {
            module.dependencies.push(OrderEntry::Module(to));
        }
    }

    /// Drop the production output directory of `module` from the model.
    pub fn clear_output_dir(&self, module: ModuleId) {
        if let Some(module) = self.project.write().module_mut(module) {
            module.output_dir = None;
        }
    }

    /// Write a production source, `relative` like `com/acme/Foo.java`.
    pub fn source(&self, module: ModuleId, relative: &str, content: &str) -> io::Result<PathBuf> {
        self.write(module, "src", relative, content)
    }

    /// Write a test source.
    pub fn test_source(&self, module: ModuleId, relative: &str, content: &str) -> io::Result<PathBuf> {
        self.write(module, "test", relative, content)
    }

    fn write(&self, module: ModuleId, kind: &str, relative: &str, content: &str) -> io::Result<PathBuf> {
        let name = self.name(module)?;
        let path = self.root().join(name).join(kind).join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn output_dir(&self, module: ModuleId) -> Option<PathBuf> {
        self.project
            .read()
            .module(module)
            .and_then(|m| m.output_dir.clone())
    }

    pub fn test_output_dir(&self, module: ModuleId) -> Option<PathBuf> {
        self.project
            .read()
            .module(module)
            .and_then(|m| m.output_dir_for(true).map(Path::to_path_buf))
    }

    /// A scratch directory for orchestrator temp dirs.
    pub fn temp_root(&self) -> io::Result<PathBuf> {
        let dir = self.root().join("tmp");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn name(&self, module: ModuleId) -> io::Result<String> {
        self.project
            .read()
            .module(module)
            .map(|m| m.name.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no module {module:?}")))
    }
}

/// Pretend to compile the chunk's current files into `output_dir`.
///
/// Every type declared in a source (`class X`, `interface X`, `enum X`)
/// becomes a fake class file in its package directory and a `[wrote ...]`
/// line on stdout. A source containing [`ERROR_MARKER`] produces an error
/// line on stderr instead, and the process exits with 1.
pub fn simulate_compile(chunk: &ModuleChunk, output_dir: &Path) -> io::Result<ScriptedProcess> {
    let sources = chunk.source_files();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for source in sources {
        let text = fs::read_to_string(chunk.effective_file(&source))?;
        if let Some(line) = text.lines().position(|l| l.contains(ERROR_MARKER)) {
            stderr.push(format!("{}:{}: error: simulated failure", source.display(), line + 1));
            continue;
        }
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if file_name == PACKAGE_INFO_FILE_NAME {
            continue;
        }
        let Some(relative) = chunk.project().read().relative_source_path(&source) else {
            continue;
        };
        let package_dir = relative
            .trim_start_matches('/')
            .rsplit_once('/')
            .map_or("", |(dir, _)| dir)
            .to_string();
        let package = package_dir.replace('/', ".");
        for name in declared_types(&text) {
            let qualified = if package.is_empty() {
                name.clone()
            } else {
                format!("{package}.{name}")
            };
            let class_file = output_dir.join(&package_dir).join(format!("{name}.class"));
            write_class_file(&class_file, &qualified, &file_name)?;
            stdout.push(format!("[wrote {}]", class_file.display()));
        }
    }
    let exit_code = i32::from(!stderr.is_empty());
    Ok(ScriptedProcess::exited(exit_code)
        .with_stdout_lines(stdout)
        .with_stderr_lines(stderr))
}

fn declared_types(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            if matches!(token, "class" | "interface" | "enum") {
                let name: String = tokens
                    .next()
                    .unwrap_or_default()
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
                    .collect();
                if !name.is_empty() {
                    names.push(name);
                }
            }
        }
    }
    names
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_types() {
        assert_eq!(
            declared_types("package a;\npublic class Foo {}\nenum Mode { A }\ninterface I<T> {}"),
            vec!["Foo", "Mode", "I"]
        );
        assert!(declared_types("package a;").is_empty());
    }
}
