//! LLVM IR helpers used while flavoring modules.
//!
//! - [`annotations`] - kernel annotation metadata
//! - [`link`] - bitcode parsing and library linking
//! - [`pipeline`] - pass pipeline description and the [`PassHandler`] seam

pub mod annotations;
pub mod link;
pub mod pipeline;

pub use annotations::{annotated_kernels, mark_kernel, KERNEL_ANNOTATIONS};
pub use pipeline::{LlvmPassHandler, ModuleAnalysis, OptLevel, PassHandler, PassSpec, Pipeline};
