//! Bitcode library loading and linking.

use std::path::Path;

use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;

use crate::core::error::{BackendError, BackendResult};

/// Parse the bitcode library at `path` into the context of `target`.
///
/// Loading is separate from linking so a missing or malformed library is
/// detected before `target` is touched.
pub fn load_bitcode_library<'ctx>(target: &Module<'ctx>, path: &Path) -> BackendResult<Module<'ctx>> {
    if !path.is_file() {
        return Err(BackendError::BitcodeLoad {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }

    Module::parse_bitcode_from_path(path, target.get_context()).map_err(|e| BackendError::BitcodeLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Link a previously loaded library into `target`. `library` is consumed.
pub fn link_library<'ctx>(target: &Module<'ctx>, library: Module<'ctx>, path: &Path) -> BackendResult<()> {
    target.link_in_module(library).map_err(|e| BackendError::BitcodeLink {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Parse in-memory bitcode handed over by a front end.
pub fn parse_bitcode<'ctx>(context: &'ctx Context, bitcode: &[u8], name: &str) -> BackendResult<Module<'ctx>> {
    let buffer = MemoryBuffer::create_from_memory_range_copy(bitcode, name);
    Module::parse_bitcode_from_buffer(&buffer, context).map_err(|e| BackendError::InvalidBitcode {
        reason: e.to_string(),
    })
}
