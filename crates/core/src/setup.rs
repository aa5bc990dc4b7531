//! First-run installation of the per-user data directory

use std::io;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{Layout, Properties};
use crate::loader::{ModuleRegistry, install_builtin_units};

const LOG_HELPER_SOURCE: &str = r#"#!/bin/sh
# Logging helpers for executable dtf modules: . "$DTF_LOG"

__dtf_log() {
    level=$1; min=$2; tag=$3; shift 3
    if [ "${GLOG_LEVEL:-3}" -ge "$min" ]; then
        echo "$level/$tag - $*"
    fi
}

log_e() { __dtf_log E 1 "$@"; }
log_w() { __dtf_log W 2 "$@"; }
log_i() { __dtf_log I 3 "$@"; }
log_d() { __dtf_log D 4 "$@"; }
log_v() { __dtf_log V 5 "$@"; }
"#;

const CORE_HELPER_SOURCE: &str = r#"#!/bin/sh
# Core helpers for executable dtf modules: . "$DTF_CORE"

dtf_project_root() {
    dir=$(pwd)
    while [ "$dir" != "/" ]; do
        if [ -f "$dir/.dtf.json" ]; then
            echo "$dir"
            return 0
        fi
        dir=$(dirname "$dir")
    done
    return 1
}

dtf_binding() {
    dtf binding "$1"
}
"#;

/// Create the data directories, helper scripts, built-in units and an
/// initial global configuration. Existing global configuration is kept.
pub fn first_run_setup(layout: &Layout, registry: &ModuleRegistry) -> io::Result<()> {
    info!("First time launch of dtf detected...");

    layout.create_data_dirs()?;
    write_helper(&layout.log_helper(), LOG_HELPER_SOURCE)?;
    write_helper(&layout.core_helper(), CORE_HELPER_SOURCE)?;
    install_builtin_units(layout, registry)?;

    let globals = layout.global_config();
    if !globals.is_file() {
        default_globals(layout)
            .save_to_file(&globals)
            .map_err(io::Error::other)?;
        debug!("Wrote {}", globals.display());
    }

    info!("Initial auto setup is completed!");
    Ok(())
}

fn write_helper(path: &Path, source: &str) -> io::Result<()> {
    std::fs::write(path, source)?;
    debug!("Wrote helper {}", path.display());
    Ok(())
}

fn default_globals(layout: &Layout) -> Properties {
    let mut props = Properties::new();
    let bindings = [
        ("dtf_included", layout.included_dir()),
        ("dtf_libraries", layout.libraries_dir()),
        ("dtf_binaries", layout.binaries_dir()),
        ("dtf_packages", layout.packages_dir()),
        ("dtf_modules", layout.modules_dir()),
    ];
    for (key, path) in bindings {
        props.set_prop("Bindings", key, &path.to_string_lossy());
    }
    props.set_prop("Bindings", "version", env!("CARGO_PKG_VERSION"));
    props
}
