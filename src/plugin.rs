//! Loadable driver modules.
//!
//! A driver module is a `cdylib` built against this crate that exports two
//! unmangled symbols, both generated by [`export_drivers!`](crate::export_drivers):
//!
//! - `sqlport_abi_version() -> u32`
//! - `sqlport_driver_factories() -> *mut ()`, a boxed
//!   `Vec<Arc<dyn DriverFactory>>` whose ownership moves to the host
//!
//! Trait objects cross the boundary as Rust values, so a module must be
//! built with the same compiler and the same version of this crate as the
//! host. The ABI version check catches the latter.
//!
//! Loaded modules are never unloaded, see [`load_module`].
//!
//! Loading never registers anything by itself. The registry receives the
//! factories and registers them explicitly.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use libloading::{Library, Symbol};

use crate::error::{Error, Result};
use crate::registry::DriverFactory;
use crate::url::is_scheme_token;

/// Current ABI version. Modules reporting anything else are rejected.
pub const SQLPORT_ABI_VERSION: u32 = 1;

/// Type of the `sqlport_abi_version` symbol.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Type of the `sqlport_driver_factories` symbol.
pub type DriverFactoriesFn = unsafe extern "C" fn() -> *mut ();

/// Export the driver module symbols for the given factory values.
///
/// ```ignore
/// sqlport::export_drivers!(sqlport::drivers::mariadb::MariadbDriver);
/// ```
#[macro_export]
macro_rules! export_drivers {
    ($($factory:expr),+ $(,)?) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn sqlport_abi_version() -> u32 {
            $crate::plugin::SQLPORT_ABI_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn sqlport_driver_factories() -> *mut () {
            $crate::plugin::factories_ok(vec![
                $(::std::sync::Arc::new($factory) as ::std::sync::Arc<dyn $crate::DriverFactory>),+
            ])
        }
    };
}

/// Hand a factory list to the host. Used by [`export_drivers!`](crate::export_drivers).
pub fn factories_ok(factories: Vec<Arc<dyn DriverFactory>>) -> *mut () {
    Box::into_raw(Box::new(factories)) as *mut ()
}

/// File name a module serving `scheme` must have, with the platform's
/// library prefix and suffix (`libsqlport_driver_mysql.so`,
/// `sqlport_driver_mysql.dll`).
///
/// Characters other than ASCII alphanumerics become `_`. Returns `None`
/// for schemes that are not valid scheme tokens, so no path component can
/// leak into the file name.
pub fn library_file_name(scheme: &str) -> Option<OsString> {
    if !is_scheme_token(scheme) {
        return None;
    }
    let stem: String = scheme
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    Some(libloading::library_filename(format!("sqlport_driver_{stem}")))
}

/// First existing module file for `scheme` across `search_paths`.
pub fn find_module(search_paths: &[PathBuf], scheme: &str) -> Option<PathBuf> {
    let file_name = library_file_name(scheme)?;
    search_paths
        .iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

/// Modules loaded by this process. Never unloaded: factories and
/// connections created from a module run its code, and they may outlive any
/// registry that loaded it.
static LOADED: Mutex<Vec<LoadedModule>> = Mutex::new(Vec::new());

struct LoadedModule {
    path: PathBuf,
    _lib: Library,
}

/// Paths of every driver module loaded so far, in load order.
pub fn loaded_modules() -> Vec<PathBuf> {
    LOADED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|module| module.path.clone())
        .collect()
}

/// Load the module at `path`, verify its ABI version and collect the
/// factories it exports.
///
/// A module that passes the version check stays mapped until the process
/// exits.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file is not a loadable library, lacks
/// one of the exported symbols, or reports another ABI version.
pub fn load_module(path: &Path) -> Result<Vec<Arc<dyn DriverFactory>>> {
    let lib = unsafe { Library::new(path) }.map_err(|e| {
        Error::Config(format!(
            "failed to load driver module '{}': {e}",
            path.display()
        ))
    })?;

    let abi_fn: Symbol<AbiVersionFn> = unsafe { lib.get(b"sqlport_abi_version") }
        .map_err(|e| {
            Error::Config(format!(
                "driver module '{}' missing sqlport_abi_version symbol: {e}",
                path.display()
            ))
        })?;
    let module_abi = unsafe { abi_fn() };
    if module_abi != SQLPORT_ABI_VERSION {
        return Err(Error::Config(format!(
            "driver module '{}' ABI version mismatch: module={module_abi}, host={SQLPORT_ABI_VERSION}",
            path.display()
        )));
    }

    let factories_fn: DriverFactoriesFn =
        *unsafe { lib.get::<DriverFactoriesFn>(b"sqlport_driver_factories") }.map_err(|e| {
            Error::Config(format!(
                "driver module '{}' missing sqlport_driver_factories symbol: {e}",
                path.display()
            ))
        })?;

    // Pin the module before any of its code hands out objects.
    LOADED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(LoadedModule {
            path: path.to_path_buf(),
            _lib: lib,
        });

    let ptr = unsafe { factories_fn() };
    if ptr.is_null() {
        return Ok(Vec::new());
    }
    Ok(unsafe { *Box::from_raw(ptr as *mut Vec<Arc<dyn DriverFactory>>) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn name(scheme: &str) -> Option<String> {
        library_file_name(scheme).map(|n| n.to_string_lossy().into_owned())
    }

    #[rstest]
    #[case("mysql", "sqlport_driver_mysql")]
    #[case("odbc+mssql", "sqlport_driver_odbc_mssql")]
    #[case("my.sql-x", "sqlport_driver_my_sql_x")]
    fn test_library_file_name_embeds_sanitized_scheme(#[case] scheme: &str, #[case] stem: &str) {
        let file = name(scheme).unwrap();
        assert!(file.contains(stem), "{file} should contain {stem}");
        assert_eq!(
            file,
            libloading::library_filename(stem).to_string_lossy()
        );
    }

    #[rstest]
    #[case("../../etc/passwd")]
    #[case("a/b")]
    #[case("")]
    #[case("9lives")]
    fn test_library_file_name_rejects_bad_schemes(#[case] scheme: &str) {
        assert_eq!(name(scheme), None);
    }

    #[rstest]
    fn test_find_module_scans_paths_in_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let file_name = library_file_name("maria").unwrap();
        std::fs::write(second.path().join(&file_name), b"").unwrap();

        let paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(
            find_module(&paths, "maria"),
            Some(second.path().join(&file_name))
        );
        assert_eq!(find_module(&paths, "odbc"), None);
    }

    #[rstest]
    fn test_load_rejects_non_library_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(library_file_name("fake").unwrap());
        std::fs::write(&path, b"not a shared object").unwrap();

        let Err(err) = load_module(&path) else {
            panic!("a non-library file must not load");
        };
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("failed to load driver module")));
        assert!(!loaded_modules().contains(&path));
    }

    #[rstest]
    fn test_factories_ok_round_trips_empty_list() {
        let ptr = factories_ok(Vec::new());
        let factories = unsafe { *Box::from_raw(ptr as *mut Vec<Arc<dyn DriverFactory>>) };
        assert!(factories.is_empty());
    }
}
