//! Installation layout lookup.
//!
//! Prebuilt builtin libraries ship as LLVM bitcode under
//! `<install>/lib/sscp/bitcode/`. The install root comes from
//! `SSCP_INSTALL_DIR` when set, otherwise from the location of the running
//! executable (`<install>/bin/<exe>`).

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the install root.
pub const INSTALL_DIR_ENV: &str = "SSCP_INSTALL_DIR";

/// Product directory below `lib/`.
pub const PRODUCT_DIR: &str = "sscp";

/// Paths of an SSCP installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the install root of the running process.
    pub fn discover() -> Self {
        if let Some(dir) = env::var_os(INSTALL_DIR_ENV) {
            return Self::new(dir);
        }

        let root = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        log::debug!("install root resolved from executable location: {}", root.display());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<install>/lib/sscp/bitcode`
    pub fn bitcode_dir(&self) -> PathBuf {
        self.root.join("lib").join(PRODUCT_DIR).join("bitcode")
    }

    /// Full path of a bundled bitcode library. Existence is not checked.
    pub fn bitcode_library(&self, file_name: &str) -> PathBuf {
        self.bitcode_dir().join(file_name)
    }
}
