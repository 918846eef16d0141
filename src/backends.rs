//! Translator factory keyed by [`BackendId`].

use crate::core::config::TranslatorConfig;
use crate::core::error::BackendResult;
use crate::core::translator::{BackendId, BackendTranslator};
use crate::cpu::CpuTranslator;

/// Create the translator for `backend`.
pub fn create_translator(
    backend: BackendId,
    kernel_names: Vec<String>,
    config: TranslatorConfig,
) -> Box<dyn BackendTranslator> {
    match backend {
        BackendId::Cpu => Box::new(CpuTranslator::with_config(kernel_names, config)),
    }
}

/// Like [`create_translator`], selecting the backend by name (`cpu`, `host`).
pub fn create_translator_by_name(
    name: &str,
    kernel_names: Vec<String>,
    config: TranslatorConfig,
) -> BackendResult<Box<dyn BackendTranslator>> {
    let backend: BackendId = name.parse()?;
    Ok(create_translator(backend, kernel_names, config))
}
