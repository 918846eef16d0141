//! Kernel annotation metadata.
//!
//! Kernels are recorded in the module-level named metadata
//! [`KERNEL_ANNOTATIONS`] as `!{ptr @fn, !"kernel", i32 1}` tuples.

use inkwell::module::{Linkage, Module};
use inkwell::values::{BasicMetadataValueEnum, FunctionValue};

use crate::core::error::{BackendError, BackendResult};

/// Named metadata collecting annotation tuples.
pub const KERNEL_ANNOTATIONS: &str = "sscp.annotations";

/// Marker string of a kernel annotation.
pub const KERNEL_MARKER: &str = "kernel";

/// Append a kernel annotation for `function` to `module`.
pub fn annotate_kernel<'ctx>(module: &Module<'ctx>, function: FunctionValue<'ctx>) -> BackendResult<()> {
    let context = module.get_context();
    let operands: [BasicMetadataValueEnum<'ctx>; 3] = [
        function.as_global_value().as_pointer_value().into(),
        context.metadata_string(KERNEL_MARKER).into(),
        context.i32_type().const_int(1, false).into(),
    ];
    let node = context.metadata_node(&operands);

    module
        .add_global_metadata(KERNEL_ANNOTATIONS, &node)
        .map_err(|reason| BackendError::Annotation {
            name: function.get_name().to_string_lossy().into_owned(),
            reason: reason.to_string(),
        })
}

/// Annotate `function` as a kernel and make it externally visible.
pub fn mark_kernel<'ctx>(module: &Module<'ctx>, function: FunctionValue<'ctx>) -> BackendResult<()> {
    annotate_kernel(module, function)?;
    function.set_linkage(Linkage::External);
    Ok(())
}

/// Names of all functions carrying a kernel annotation, in annotation order.
pub fn annotated_kernels(module: &Module<'_>) -> Vec<String> {
    module
        .get_global_metadata(KERNEL_ANNOTATIONS)
        .into_iter()
        .filter_map(|node| {
            let values = node.get_node_values();
            let marker = match values.get(1) {
                Some(BasicMetadataValueEnum::MetadataValue(md)) => md.get_string_value()?,
                _ => return None,
            };
            if marker.to_bytes() != KERNEL_MARKER.as_bytes() {
                return None;
            }
            match values.first() {
                Some(BasicMetadataValueEnum::PointerValue(ptr)) => {
                    Some(ptr.get_name().to_string_lossy().into_owned())
                }
                _ => None,
            }
        })
        .collect()
}
