//! Project and module model.
//!
//! The orchestrator never discovers configuration on its own: the caller
//! describes modules, their source roots, output directories and ordered
//! dependency lists here, and the engine only reads it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::ModuleId;

/// A JDK the compiler runs against.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Jdk {
    /// Display name, e.g. `corretto-17`.
    pub name: String,
    /// Installation home.
    pub home: PathBuf,
    /// Class roots contributed to the boot classpath.
    pub roots: Vec<PathBuf>,
}

impl Jdk {
    /// Create a JDK description.
    pub fn new(name: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        Jdk {
            name: name.into(),
            home: home.into(),
            roots: Vec::new(),
        }
    }

    /// Set the class roots.
    #[must_use]
    pub fn with_roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.roots = roots.into_iter().collect();
        self
    }
}

/// Java language level as a feature release number (8, 11, 17, ...).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LanguageLevel(u16);

impl LanguageLevel {
    pub const JDK_1_8: LanguageLevel = LanguageLevel(8);
    pub const JDK_11: LanguageLevel = LanguageLevel(11);
    pub const JDK_17: LanguageLevel = LanguageLevel(17);
    pub const JDK_21: LanguageLevel = LanguageLevel(21);

    /// Create a language level from a feature release number.
    #[inline]
    pub const fn new(feature: u16) -> Self {
        LanguageLevel(feature)
    }

    /// Feature release number.
    #[inline]
    pub const fn feature(self) -> u16 {
        self.0
    }
}

impl Default for LanguageLevel {
    fn default() -> Self {
        LanguageLevel::JDK_17
    }
}

/// Formats the way `-source`/`-target` expect it: `1.8` up to 8, `11` after.
impl fmt::Display for LanguageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= 8 {
            write!(f, "1.{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A directory holding sources of one module.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SourceRoot {
    pub path: PathBuf,
    /// Dotted package prefix of the root (`com.acme`), empty for none.
    pub package_prefix: String,
    pub is_test: bool,
}

impl SourceRoot {
    /// A production source root with no package prefix.
    pub fn production(path: impl Into<PathBuf>) -> Self {
        SourceRoot {
            path: path.into(),
            package_prefix: String::new(),
            is_test: false,
        }
    }

    /// A test source root with no package prefix.
    pub fn test(path: impl Into<PathBuf>) -> Self {
        SourceRoot {
            is_test: true,
            ..Self::production(path)
        }
    }

    /// Set the package prefix.
    #[must_use]
    pub fn with_package_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.package_prefix = prefix.into();
        self
    }

    /// Whether `file` lives under this root.
    #[inline]
    pub fn contains(&self, file: &Path) -> bool {
        file.starts_with(&self.path)
    }

    /// Package-prefixed, "/"-rooted path of `file` relative to this root.
    ///
    /// `/com/acme/Foo.java` for `<root>/Foo.java` under prefix `com.acme`.
    /// Returns `None` when `file` is not under the root.
    pub fn relative_source_path(&self, file: &Path) -> Option<String> {
        let rest = file.strip_prefix(&self.path).ok()?;
        let mut out = String::new();
        for segment in self.package_prefix.split('.').filter(|s| !s.is_empty()) {
            out.push('/');
            out.push_str(segment);
        }
        for component in rest.components() {
            out.push('/');
            out.push_str(&component.as_os_str().to_string_lossy());
        }
        Some(out)
    }
}

/// One entry of a module's ordered dependency list.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum OrderEntry {
    /// The module's JDK; splits boot classpath from compilation classpath.
    Jdk,
    /// The module's own output directories.
    ModuleSource,
    /// Outputs of another module.
    Module(ModuleId),
    /// A library's class roots.
    Library { name: String, roots: Vec<PathBuf> },
}

/// A unit of compilation configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Module {
    pub name: String,
    pub source_roots: Vec<SourceRoot>,
    pub excluded: Vec<PathBuf>,
    pub dependencies: Vec<OrderEntry>,
    pub jdk: Option<Jdk>,
    pub language_level: Option<LanguageLevel>,
    pub output_dir: Option<PathBuf>,
    pub test_output_dir: Option<PathBuf>,
}

impl Module {
    /// Create a module with the usual `[Jdk, ModuleSource]` dependency list.
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            dependencies: vec![OrderEntry::Jdk, OrderEntry::ModuleSource],
            ..Module::default()
        }
    }

    /// Add a source root.
    #[must_use]
    pub fn with_source_root(mut self, root: SourceRoot) -> Self {
        self.source_roots.push(root);
        self
    }

    /// Exclude a directory from this module's sources.
    #[must_use]
    pub fn with_excluded(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    /// Append a dependency entry.
    #[must_use]
    pub fn with_dependency(mut self, entry: OrderEntry) -> Self {
        self.dependencies.push(entry);
        self
    }

    /// Set the JDK.
    #[must_use]
    pub fn with_jdk(mut self, jdk: Jdk) -> Self {
        self.jdk = Some(jdk);
        self
    }

    /// Set the language level.
    #[must_use]
    pub fn with_language_level(mut self, level: LanguageLevel) -> Self {
        self.language_level = Some(level);
        self
    }

    /// Set the production output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the test output directory.
    #[must_use]
    pub fn with_test_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.test_output_dir = Some(dir.into());
        self
    }

    /// Output directory for production or test classes.
    ///
    /// Test classes fall back to the production directory when no separate
    /// test output is configured.
    pub fn output_dir_for(&self, is_test: bool) -> Option<&Path> {
        if is_test {
            self.test_output_dir
                .as_deref()
                .or(self.output_dir.as_deref())
        } else {
            self.output_dir.as_deref()
        }
    }

    /// Whether test classes go somewhere other than production classes.
    pub fn test_output_differs(&self) -> bool {
        match (&self.output_dir, &self.test_output_dir) {
            (Some(prod), Some(test)) => prod != test,
            _ => false,
        }
    }

    /// Modules this module depends on, in declaration order.
    pub fn module_dependencies(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.dependencies.iter().filter_map(|entry| match entry {
            OrderEntry::Module(id) => Some(*id),
            _ => None,
        })
    }

    /// Whether `file` sits in one of this module's excluded directories.
    pub fn is_excluded(&self, file: &Path) -> bool {
        self.excluded.iter().any(|dir| file.starts_with(dir))
    }
}

/// All modules of a project plus project-wide defaults.
#[derive(Clone, Debug, Default)]
pub struct Project {
    modules: Vec<Module>,
    pub default_jdk: Option<Jdk>,
    pub default_language_level: LanguageLevel,
    /// Directories excluded for every module.
    pub excluded: Vec<PathBuf>,
}

impl Project {
    /// Create an empty project.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, returning its id.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "projects never approach u32::MAX modules"
    )]
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = ModuleId::new(self.modules.len() as u32);
        self.modules.push(module);
        id
    }

    /// Look up a module.
    #[inline]
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id.index())
    }

    /// Mutable access to a module.
    #[inline]
    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id.index())
    }

    /// Number of modules.
    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the project has no modules.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// All modules with their ids, in insertion order.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "ids were created from u32 in add_module"
    )]
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleId::new(i as u32), m))
    }

    /// Whether `file` is excluded at project or module level.
    pub fn is_excluded(&self, module: &Module, file: &Path) -> bool {
        module.is_excluded(file) || self.excluded.iter().any(|dir| file.starts_with(dir))
    }

    /// The module and source root that own `file`.
    ///
    /// The deepest matching source root wins, so nested roots resolve to the
    /// innermost one. Excluded files have no owner.
    pub fn source_root_for(&self, file: &Path) -> Option<(ModuleId, &SourceRoot)> {
        let mut best: Option<(ModuleId, &SourceRoot)> = None;
        for (id, module) in self.modules() {
            for root in module.source_roots.iter().filter(|r| r.contains(file)) {
                let deeper = best.map_or(true, |(_, current)| {
                    root.path.components().count() > current.path.components().count()
                });
                if deeper && !self.is_excluded(module, file) {
                    best = Some((id, root));
                }
            }
        }
        best
    }

    /// The module that owns `file`, if any.
    pub fn module_for_file(&self, file: &Path) -> Option<ModuleId> {
        self.source_root_for(file).map(|(id, _)| id)
    }

    /// Whether `file` belongs to a test source root.
    pub fn is_test_source(&self, file: &Path) -> bool {
        self.source_root_for(file)
            .is_some_and(|(_, root)| root.is_test)
    }

    /// Package-prefixed relative path of `file` computed from its real location.
    pub fn relative_source_path(&self, file: &Path) -> Option<String> {
        self.source_root_for(file)
            .and_then(|(_, root)| root.relative_source_path(file))
    }

    /// JDK of `module`, falling back to the project default.
    pub fn jdk_for<'a>(&'a self, module: &'a Module) -> Option<&'a Jdk> {
        module.jdk.as_ref().or(self.default_jdk.as_ref())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
