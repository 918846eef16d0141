// This module describes the transformation pipeline a translator runs over a flavored module
// and the PassHandler seam that executes it. A Pipeline is an ordered list of PassSpec
// entries: address-space inference parameterized by the backend's AddressSpaceMap, followed
// by the kernel flattening pipeline at a given optimization level with optional barrier
// splitting. Analyses that the flattening passes depend on are registered with the handler
// before the run. The actual passes belong to whoever embeds the translator, so PassHandler
// is a trait; LlvmPassHandler is the stock implementation that maps the pipeline onto the
// LLVM new pass manager through Module::run_passes.

//! Pass pipeline description and execution.

use std::fmt;

use inkwell::module::Module;
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{CodeModel, InitializationConfig, RelocMode, Target};
use inkwell::OptimizationLevel;

use crate::core::address_space::AddressSpaceMap;
use crate::core::error::{BackendError, BackendResult};

/// Optimization level of the flattening pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptLevel {
    O0,
    O1,
    O2,
    O3,
}

impl OptLevel {
    pub fn as_llvm(self) -> OptimizationLevel {
        match self {
            OptLevel::O0 => OptimizationLevel::None,
            OptLevel::O1 => OptimizationLevel::Less,
            OptLevel::O2 => OptimizationLevel::Default,
            OptLevel::O3 => OptimizationLevel::Aggressive,
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptLevel::O0 => "O0",
            OptLevel::O1 => "O1",
            OptLevel::O2 => "O2",
            OptLevel::O3 => "O3",
        };
        f.write_str(s)
    }
}

/// Module analyses the flattening passes query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleAnalysis {
    /// Collects functions annotated as barrier splitters.
    SplitterAnnotation,
}

/// One entry of a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassSpec {
    /// Rewrite pointers into the concrete address spaces of `map`.
    AddressSpaceInference(AddressSpaceMap),
    /// Flatten work-item loops of kernels for host execution.
    KernelFlattening {
        opt_level: OptLevel,
        split_barriers: bool,
    },
}

/// Ordered module pass pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    passes: Vec<PassSpec>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, pass: PassSpec) -> &mut Self {
        self.passes.push(pass);
        self
    }

    pub fn passes(&self) -> &[PassSpec] {
        &self.passes
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Textual pass pipeline understood by the LLVM new pass manager.
    pub fn to_llvm_pipeline(&self) -> String {
        self.passes
            .iter()
            .map(|pass| match pass {
                PassSpec::AddressSpaceInference(_) => "function(infer-address-spaces)".to_string(),
                PassSpec::KernelFlattening { opt_level, .. } => format!("default<{}>", opt_level),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Pipeline registration and execution service.
pub trait PassHandler {
    /// Make `analysis` available to passes of subsequent runs.
    fn register_analysis(&mut self, analysis: ModuleAnalysis);

    /// Run `pipeline` over `module`, mutating it in place.
    fn run_pipeline(&mut self, module: &Module<'_>, pipeline: &Pipeline) -> BackendResult<()>;
}

/// Runs pipelines with the stock LLVM pass manager.
///
/// Barrier splitting and the splitter annotation analysis have no upstream
/// counterpart; kernel flattening degrades to the default optimization
/// pipeline of the requested level.
///
/// Every target compiled into the linked LLVM is initialized, so a module
/// retargeted to a non-host triple is optimized with that triple's target
/// machine. Triples whose target LLVM was built without fail with
/// [`BackendError::Pipeline`].
#[derive(Debug, Default)]
pub struct LlvmPassHandler {
    analyses: Vec<ModuleAnalysis>,
}

impl LlvmPassHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered_analyses(&self) -> &[ModuleAnalysis] {
        &self.analyses
    }
}

impl PassHandler for LlvmPassHandler {
    fn register_analysis(&mut self, analysis: ModuleAnalysis) {
        if !self.analyses.contains(&analysis) {
            log::debug!("registering module analysis {:?}", analysis);
            self.analyses.push(analysis);
        }
    }

    fn run_pipeline(&mut self, module: &Module<'_>, pipeline: &Pipeline) -> BackendResult<()> {
        if pipeline.is_empty() {
            return Ok(());
        }

        Target::initialize_all(&InitializationConfig::default());

        let triple = module.get_triple();
        let target = Target::from_triple(&triple).map_err(|e| BackendError::Pipeline {
            reason: e.to_string(),
        })?;

        let opt = pipeline
            .passes()
            .iter()
            .filter_map(|pass| match pass {
                PassSpec::KernelFlattening { opt_level, .. } => Some(*opt_level),
                _ => None,
            })
            .max()
            .unwrap_or(OptLevel::O0);

        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                opt.as_llvm(),
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| BackendError::Pipeline {
                reason: format!(
                    "could not create target machine for {}",
                    triple.as_str().to_string_lossy()
                ),
            })?;

        for pass in pipeline.passes() {
            if let PassSpec::KernelFlattening { split_barriers: true, .. } = pass {
                log::debug!("barrier splitting unavailable, running plain optimization pipeline");
            }
        }

        let text = pipeline.to_llvm_pipeline();
        log::debug!("running pass pipeline: {}", text);
        module
            .run_passes(&text, &machine, PassBuilderOptions::create())
            .map_err(|e| BackendError::Pipeline {
                reason: e.to_string(),
            })
    }
}
