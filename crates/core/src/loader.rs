//! Loading in-process modules
//!
//! Module code is compiled into the binary and registered by entry-type
//! name. What lives on disk at a resolved path is a unit manifest naming the
//! entry types the unit exports:
//!
//! ```json
//! { "exports": ["prop"] }
//! ```
//!
//! Loading reads the manifest, checks that the requested entry type is both
//! exported and registered, and constructs a fresh instance of it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::builtins;
use crate::config::Layout;
use crate::error::{DispatchError, Result};
use crate::module::{AnyModule, Module, ModuleInstance};
use crate::router::panic_message;

/// Zero-argument constructor for a registered entry type
pub type ModuleFactory = fn() -> Box<dyn AnyModule>;

fn construct<M: Module + Default>() -> Box<dyn AnyModule> {
    Box::new(M::default())
}

/// Entry types this binary can instantiate, by name
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in commands
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register_builtins(&mut registry);
        registry
    }

    pub fn register<M: Module + Default>(&mut self, name: &str) -> &mut Self {
        self.register_factory(name, construct::<M>)
    }

    pub fn register_factory(&mut self, name: &str, factory: ModuleFactory) -> &mut Self {
        if self.factories.insert(name.to_string(), factory).is_some() {
            debug!("Entry type '{}' registered again, replacing", name);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<ModuleFactory> {
        self.factories.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// On-disk description of an in-process unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitManifest {
    #[serde(default)]
    pub exports: Vec<String>,
}

impl UnitManifest {
    pub fn exporting(name: &str) -> Self {
        Self {
            exports: vec![name.to_string()],
        }
    }

    pub fn load(path: &Path) -> std::result::Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("unable to read {}: {}", path.display(), e))?;
        serde_json::from_str(&contents)
            .map_err(|e| format!("unable to parse {}: {}", path.display(), e))
    }

    pub fn exports(&self, name: &str) -> bool {
        self.exports.iter().any(|export| export == name)
    }
}

/// Write a manifest exporting `name` to `path`
pub fn write_unit_manifest(path: &Path, name: &str) -> io::Result<()> {
    let contents =
        serde_json::to_string_pretty(&UnitManifest::exporting(name)).map_err(io::Error::other)?;
    std::fs::write(path, contents + "\n")
}

/// Write a unit manifest for every registered entry type into the
/// built-in command directory.
pub fn install_builtin_units(layout: &Layout, registry: &ModuleRegistry) -> io::Result<Vec<PathBuf>> {
    let dir = layout.builtin_dir();
    std::fs::create_dir_all(&dir)?;

    let mut written = Vec::new();
    for name in registry.names() {
        let path = dir.join(name);
        write_unit_manifest(&path, name)?;
        debug!("Installed built-in unit {}", path.display());
        written.push(path);
    }
    info!("Installed {} built-in commands", written.len());
    Ok(written)
}

#[derive(Debug)]
struct LoadedUnit {
    path: PathBuf,
    manifest: UnitManifest,
}

/// Loads units by path and instantiates their entry types.
///
/// Units are bound under the command name they were loaded for. Loading a
/// second unit under a name already bound replaces the earlier binding.
#[derive(Debug)]
pub struct ModuleLoader {
    registry: ModuleRegistry,
    units: HashMap<String, LoadedUnit>,
}

impl ModuleLoader {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            registry,
            units: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Path of the unit currently bound to `name`
    pub fn unit_path(&self, name: &str) -> Option<&Path> {
        self.units.get(name).map(|unit| unit.path.as_path())
    }

    pub fn load(&mut self, path: &Path, name: &str, launch_dir: &Path) -> Result<ModuleInstance> {
        let manifest = UnitManifest::load(path).map_err(|reason| {
            error!("An error occurred while loading '{}'", name);
            error!("Error: {}", reason);
            DispatchError::LoadError {
                name: name.to_string(),
                reason,
            }
        })?;

        let unit = LoadedUnit {
            path: path.to_path_buf(),
            manifest,
        };
        if let Some(previous) = self.units.insert(name.to_string(), unit) {
            debug!(
                "Unit '{}' rebound from {} to {}",
                name,
                previous.path.display(),
                path.display()
            );
        }

        let exported = self
            .units
            .get(name)
            .is_some_and(|unit| unit.manifest.exports(name));
        let factory = match self.registry.get(name) {
            Some(factory) if exported => factory,
            _ => {
                error!("Unable to find entry type '{}' in module!", name);
                return Err(DispatchError::EntryPointMissing(name.to_string()));
            }
        };

        let inner = panic::catch_unwind(AssertUnwindSafe(factory)).map_err(|payload| {
            let reason = panic_message(payload.as_ref());
            error!("An error occurred while constructing '{}'", name);
            error!("Error: {}", reason);
            DispatchError::LoadError {
                name: name.to_string(),
                reason,
            }
        })?;

        let mut instance = ModuleInstance::new(name, inner);
        instance.set_launch_dir(launch_dir);
        debug!("Loaded {:?}", instance);
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::module::{ModuleResult, Routes};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Hello;

    impl Hello {
        fn execute(&mut self, ctx: &mut ExecutionContext<'_>, _args: Vec<String>) -> ModuleResult {
            use std::io::Write;
            writeln!(ctx, "hello")?;
            Ok(0)
        }
    }

    impl Module for Hello {
        fn name(&self) -> &str {
            "Hello"
        }

        fn version(&self) -> &str {
            "2.0.1"
        }

        fn min_sdk(&self) -> u32 {
            21
        }

        fn routes() -> Routes<Self> {
            Routes::execute(Self::execute)
        }
    }

    struct Exploding;

    impl Default for Exploding {
        fn default() -> Self {
            panic!("bad static initializer")
        }
    }

    impl Module for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn version(&self) -> &str {
            "0"
        }

        fn routes() -> Routes<Self> {
            Routes::new()
        }
    }

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register::<Hello>("hello");
        registry.register::<Exploding>("exploding");
        registry
    }

    #[test]
    fn test_load_instantiates_entry_type() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hello");
        write_unit_manifest(&path, "hello").unwrap();

        let mut loader = ModuleLoader::new(registry());
        let instance = loader
            .load(&path, "hello", Path::new("/launched"))
            .unwrap();

        assert_eq!(instance.name(), "hello");
        assert_eq!(instance.display_name(), "Hello");
        assert_eq!(instance.version(), "2.0.1");
        assert_eq!(instance.min_sdk(), 21);
        assert!(instance.requires().is_empty());
        assert_eq!(instance.launch_dir(), Path::new("/launched"));
    }

    #[test]
    fn test_unparsable_unit_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hello");
        std::fs::write(&path, "def hello(): pass").unwrap();

        let err = ModuleLoader::new(registry())
            .load(&path, "hello", temp_dir.path())
            .unwrap_err();
        assert_eq!(err.exit_code(), -9);
    }

    #[test]
    fn test_unreadable_unit_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ModuleLoader::new(registry())
            .load(&temp_dir.path().join("gone"), "hello", temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, DispatchError::LoadError { .. }));
    }

    #[test]
    fn test_constructor_panic_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("exploding");
        write_unit_manifest(&path, "exploding").unwrap();

        match ModuleLoader::new(registry())
            .load(&path, "exploding", temp_dir.path())
            .unwrap_err()
        {
            DispatchError::LoadError { name, reason } => {
                assert_eq!(name, "exploding");
                assert_eq!(reason, "bad static initializer");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_entry_point_missing() {
        let temp_dir = TempDir::new().unwrap();

        // Exported by the unit, but nothing registered under that name
        let unregistered = temp_dir.path().join("ghost");
        write_unit_manifest(&unregistered, "ghost").unwrap();
        let err = ModuleLoader::new(registry())
            .load(&unregistered, "ghost", temp_dir.path())
            .unwrap_err();
        assert_eq!(err.exit_code(), -6);

        // Registered, but the unit exports something else
        let wrong = temp_dir.path().join("hello");
        write_unit_manifest(&wrong, "other").unwrap();
        let err = ModuleLoader::new(registry())
            .load(&wrong, "hello", temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, DispatchError::EntryPointMissing(ref n) if n == "hello"));
    }

    #[test]
    fn test_reload_replaces_binding() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a");
        let second = temp_dir.path().join("b");
        write_unit_manifest(&first, "hello").unwrap();
        write_unit_manifest(&second, "hello").unwrap();

        let mut loader = ModuleLoader::new(registry());
        loader.load(&first, "hello", temp_dir.path()).unwrap();
        assert_eq!(loader.unit_path("hello"), Some(first.as_path()));

        loader.load(&second, "hello", temp_dir.path()).unwrap();
        assert_eq!(loader.unit_path("hello"), Some(second.as_path()));
    }

    #[test]
    fn test_install_builtin_units_writes_manifests() {
        let temp_dir = TempDir::new().unwrap();
        let layout = Layout::new(temp_dir.path().join("install"), temp_dir.path().join("data"));
        let registry = ModuleRegistry::with_builtins();

        let written = install_builtin_units(&layout, &registry).unwrap();
        assert_eq!(written.len(), registry.names().count());

        for name in registry.names() {
            let manifest = UnitManifest::load(&layout.builtin_dir().join(name)).unwrap();
            assert!(manifest.exports(name));
        }
    }
}
