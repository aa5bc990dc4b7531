//! Module dispatch
//!
//! The [`Dispatcher`] resolves a command name to a module in one of the
//! three storage tiers, decides how it runs, and folds every outcome into
//! a [`Result`] carrying either the module's own exit code or a
//! [`DispatchError`].

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::builtins;
use crate::capture::capture_invoke;
use crate::classifier::ModuleKind;
use crate::config::{Layout, find_project_root};
use crate::context::ExecutionContext;
use crate::device::{DeviceConnection, ProjectDevice};
use crate::error::{DispatchError, Result, to_exit_code};
use crate::interrupt::{self, InterruptScope};
use crate::launcher::ProcessLauncher;
use crate::loader::{ModuleLoader, ModuleRegistry};
use crate::logging;
use crate::resolver::{ModuleDescriptor, ModuleResolver, Scope};
use crate::validator::PrelaunchValidator;

/// Per-launch switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Run the module from the project root instead of the launch directory
    pub chdir: bool,
    /// Skip dependency and platform-version checks for in-process modules
    pub skip_checks: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chdir: true,
            skip_checks: false,
        }
    }
}

impl LaunchOptions {
    pub fn without_chdir(mut self) -> Self {
        self.chdir = false;
        self
    }

    pub fn with_skip_checks(mut self) -> Self {
        self.skip_checks = true;
        self
    }
}

pub struct Dispatcher {
    layout: Layout,
    launch_dir: PathBuf,
    project_root: Option<PathBuf>,
    resolver: ModuleResolver,
    loader: ModuleLoader,
    device: Box<dyn DeviceConnection>,
    search_paths: Option<OsString>,
}

impl Dispatcher {
    /// Dispatcher for commands started from `launch_dir`. The project root
    /// is found by searching upward from there.
    pub fn new(layout: Layout, registry: ModuleRegistry, launch_dir: impl Into<PathBuf>) -> Self {
        let launch_dir = launch_dir.into();
        let project_root = find_project_root(&launch_dir);
        match &project_root {
            Some(root) => debug!("Project root: {}", root.display()),
            None => debug!("No project above {}", launch_dir.display()),
        }

        Self {
            resolver: ModuleResolver::new(layout.clone(), project_root.clone()),
            loader: ModuleLoader::new(registry),
            device: Box::new(ProjectDevice::new(project_root.clone())),
            layout,
            launch_dir,
            project_root,
            search_paths: None,
        }
    }

    pub fn with_device(mut self, device: Box<dyn DeviceConnection>) -> Self {
        self.device = device;
        self
    }

    /// Search list used for module dependencies instead of the process `PATH`
    pub fn with_search_paths(mut self, search_paths: impl Into<OsString>) -> Self {
        self.search_paths = Some(search_paths.into());
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn launch_dir(&self) -> &Path {
        &self.launch_dir
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Run a top-level command: project-less built-ins first, then, inside
    /// a project, built-ins, local modules and installed modules in that
    /// order.
    pub fn run_command(&mut self, name: &str, args: Vec<String>, out: &mut dyn Write) -> Result<i32> {
        if builtins::is_projectless(name) {
            let options = LaunchOptions::default().without_chdir().with_skip_checks();
            return self.launch_builtin(name, args, options, out);
        }

        if self.project_root.is_none() {
            error!("Unable to find a project root! Is this a dtf project?");
            return Err(DispatchError::NoProject);
        }

        if builtins::is_built_in(name) {
            self.launch_builtin(name, args, LaunchOptions::default(), out)
        } else if self.find_local_module(name) {
            self.launch_local(name, args, out)
        } else if self.is_module_installed(name) {
            self.launch_global(name, args, out)
        } else {
            error!("Module or command '{}' not found!", name);
            Err(DispatchError::NotFound {
                name: name.to_string(),
                path: self.resolver.module_path(Scope::Global, name)?,
            })
        }
    }

    pub fn launch_builtin(
        &mut self,
        name: &str,
        args: Vec<String>,
        options: LaunchOptions,
        out: &mut dyn Write,
    ) -> Result<i32> {
        self.launch(Scope::Builtin, name, args, options, out)
    }

    pub fn launch_local(&mut self, name: &str, args: Vec<String>, out: &mut dyn Write) -> Result<i32> {
        self.launch(Scope::Local, name, args, LaunchOptions::default(), out)
    }

    pub fn launch_global(&mut self, name: &str, args: Vec<String>, out: &mut dyn Write) -> Result<i32> {
        self.launch(Scope::Global, name, args, LaunchOptions::default(), out)
    }

    /// Launch an installed module with its output collected in memory
    pub fn capture(&mut self, scope: Scope, name: &str, args: Vec<String>) -> (String, i32) {
        capture_invoke(|out| {
            to_exit_code(self.launch(scope, name, args, LaunchOptions::default(), out))
        })
    }

    pub fn find_local_module(&self, name: &str) -> bool {
        self.resolver.resolve(Scope::Local, name).is_ok()
    }

    pub fn is_module_installed(&self, name: &str) -> bool {
        self.resolver.resolve(Scope::Global, name).is_ok()
    }

    /// Resolve, classify and run one module.
    pub fn launch(
        &mut self,
        scope: Scope,
        name: &str,
        args: Vec<String>,
        options: LaunchOptions,
        out: &mut dyn Write,
    ) -> Result<i32> {
        let _interrupts = InterruptScope::install();

        let descriptor = self.resolver.describe(scope, name)?;
        let mut ctx = self.context(options, out);

        let result = match descriptor.kind {
            ModuleKind::Executable => {
                debug!("'{}' is an executable module", name);
                ProcessLauncher::new(&self.layout, self.device.as_ref()).launch(
                    &descriptor.path,
                    &args,
                    &mut ctx,
                )
            }
            ModuleKind::InProcess => self.launch_in_process(&descriptor, args, options, &mut ctx),
        };

        match result {
            Err(DispatchError::Interrupted(_)) => result,
            _ if interrupt::is_interrupted() => {
                error!("Module '{}' forcibly killed!", name);
                Err(DispatchError::Interrupted(name.to_string()))
            }
            _ => result,
        }
    }

    fn launch_in_process(
        &mut self,
        descriptor: &ModuleDescriptor,
        args: Vec<String>,
        options: LaunchOptions,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<i32> {
        let mut instance = self
            .loader
            .load(&descriptor.path, &descriptor.name, &self.launch_dir)?;

        if !options.skip_checks {
            let mut validator = PrelaunchValidator::new(self.project_root.as_deref());
            if let Some(paths) = &self.search_paths {
                validator = validator.with_search_paths(paths.clone());
            }
            if let Err(e) = validator.validate(&instance) {
                error!("Module prelaunch checks failed.");
                return Err(e);
            }
        }

        instance.run(ctx, args)
    }

    fn context<'a>(&self, options: LaunchOptions, out: &'a mut dyn Write) -> ExecutionContext<'a> {
        let working_dir = match (&self.project_root, options.chdir) {
            (Some(root), true) => root.clone(),
            _ => self.launch_dir.clone(),
        };

        ExecutionContext::new(self.launch_dir.clone(), out)
            .with_working_dir(working_dir)
            .with_project_root(self.project_root.clone())
            .with_layout(self.layout.clone())
            .with_verbosity(logging::verbosity_override())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONFIG_FILE_NAME, LOCAL_MODULES_DIRECTORY, Properties};
    use crate::device::StaticDevice;
    use crate::loader::{install_builtin_units, write_unit_manifest};
    use crate::module::{Module, ModuleResult, Routes};
    use serial_test::serial;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Where;

    impl Where {
        fn execute(&mut self, ctx: &mut ExecutionContext<'_>, _args: Vec<String>) -> ModuleResult {
            let working_dir = ctx.working_dir().to_path_buf();
            writeln!(ctx, "{}", working_dir.display())?;
            Ok(0)
        }
    }

    impl Module for Where {
        fn name(&self) -> &str {
            "where"
        }

        fn version(&self) -> &str {
            "1.0"
        }

        fn routes() -> Routes<Self> {
            Routes::execute(Self::execute)
        }
    }

    struct Fixture {
        _temp_dir: TempDir,
        layout: Layout,
        project: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let layout = Layout::new(temp_dir.path().join("install"), temp_dir.path().join("data"));
        layout.create_data_dirs().unwrap();

        let project = temp_dir.path().join("project");
        std::fs::create_dir_all(project.join(LOCAL_MODULES_DIRECTORY)).unwrap();
        let mut props = Properties::new();
        props.set_prop("Info", "sdk", "23");
        props.save_to_file(&project.join(CONFIG_FILE_NAME)).unwrap();

        Fixture {
            _temp_dir: temp_dir,
            layout,
            project,
        }
    }

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::with_builtins();
        registry.register::<Where>("where");
        registry
    }

    fn dispatcher(fixture: &Fixture, launch_dir: &Path) -> Dispatcher {
        Dispatcher::new(fixture.layout.clone(), registry(), launch_dir)
            .with_device(Box::new(StaticDevice(None)))
    }

    #[test]
    #[serial]
    fn test_resolution_order_local_before_global() {
        let fixture = fixture();
        write_unit_manifest(&fixture.layout.modules_dir().join("where"), "where").unwrap();

        let mut dispatcher = dispatcher(&fixture, &fixture.project);
        assert!(!dispatcher.find_local_module("where"));
        assert!(dispatcher.is_module_installed("where"));

        let mut out = Vec::new();
        assert_eq!(dispatcher.run_command("where", Vec::new(), &mut out).unwrap(), 0);
        assert_eq!(
            dispatcher.loader().unit_path("where"),
            Some(fixture.layout.modules_dir().join("where").as_path())
        );

        let local = fixture.project.join(LOCAL_MODULES_DIRECTORY).join("where");
        write_unit_manifest(&local, "where").unwrap();
        assert_eq!(dispatcher.run_command("where", Vec::new(), &mut out).unwrap(), 0);
        assert_eq!(dispatcher.loader().unit_path("where"), Some(local.as_path()));
    }

    #[test]
    #[serial]
    fn test_unknown_command_is_not_found() {
        let fixture = fixture();
        let mut dispatcher = dispatcher(&fixture, &fixture.project);

        let err = dispatcher
            .run_command("nothing-here", Vec::new(), &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.exit_code(), -4);
    }

    #[test]
    #[serial]
    fn test_project_required_outside_projectless_builtins() {
        let fixture = fixture();
        let outside = fixture.layout.data_dir().to_path_buf();
        let mut dispatcher = dispatcher(&fixture, &outside);
        assert!(dispatcher.project_root().is_none());

        let err = dispatcher
            .run_command("prop", vec!["dump".into()], &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoProject));

        // binding runs anywhere once its unit is installed
        install_builtin_units(&fixture.layout, &registry()).unwrap();
        Properties::new()
            .save_to_file(&fixture.layout.global_config())
            .unwrap();
        let code = dispatcher
            .run_command("binding", Vec::new(), &mut Vec::new())
            .unwrap();
        assert_eq!(code, -1);
    }

    #[test]
    #[serial]
    fn test_working_dir_follows_chdir_option() {
        let fixture = fixture();
        let nested = fixture.project.join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        write_unit_manifest(&fixture.layout.modules_dir().join("where"), "where").unwrap();

        let mut dispatcher = dispatcher(&fixture, &nested);
        assert_eq!(dispatcher.project_root(), Some(fixture.project.as_path()));

        let (text, code) = dispatcher.capture(Scope::Global, "where", Vec::new());
        assert_eq!(code, 0);
        assert_eq!(text.trim_end(), fixture.project.display().to_string());

        let mut out = Vec::new();
        let options = LaunchOptions::default().without_chdir();
        dispatcher
            .launch(Scope::Global, "where", Vec::new(), options, &mut out)
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap().trim_end(),
            nested.display().to_string()
        );
    }

    #[test]
    #[serial]
    fn test_prelaunch_checks_can_be_skipped() {
        let fixture = fixture();
        let mut props = Properties::new();
        props.set_prop("Info", "serial", "none");
        props
            .save_to_file(&fixture.project.join(CONFIG_FILE_NAME))
            .unwrap();
        write_unit_manifest(&fixture.layout.modules_dir().join("where"), "where").unwrap();

        let mut dispatcher = dispatcher(&fixture, &fixture.project);
        let mut out = Vec::new();

        let err = dispatcher
            .launch_global("where", Vec::new(), &mut out)
            .unwrap_err();
        assert_eq!(err.exit_code(), -13);

        let options = LaunchOptions::default().with_skip_checks();
        let code = dispatcher
            .launch(Scope::Global, "where", Vec::new(), options, &mut out)
            .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    #[serial]
    fn test_capture_reports_sentinel_for_missing_module() {
        let fixture = fixture();
        let mut dispatcher = dispatcher(&fixture, &fixture.project);

        let (text, code) = dispatcher.capture(Scope::Global, "absent", Vec::new());
        assert_eq!(text, "");
        assert_eq!(code, -4);
    }
}
