//! Host CPU backend.
//!
//! Kernels run on the host after flattening; memory is unsegmented, so the
//! address-space map sends every classification to 0.

mod translator;

pub use translator::{CpuTranslator, CPU_BUILTIN_LIBRARY};
