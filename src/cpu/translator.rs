// This module implements the CPU flavor of the SSCP backend translator. Flavoring loads the
// bundled CPU builtin library, retargets the module to the configured triple, links the
// library in, then annotates every requested kernel with a `kernel` metadata tuple and forces
// it to external linkage so it survives dead code elimination and shows up in the object's
// symbol table. Finally it registers the splitter annotation analysis and runs address-space
// inference plus the kernel flattening pipeline at O3 with barrier splitting. Lowering
// serializes the module to bitcode in a scoped temp file, invokes clang -cc1 to produce
// assembly in a second scoped temp file and returns that text. Both temp files are removed
// on every exit path because they are owned by drop guards for the duration of the call.

//! CPU backend translator.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use hashbrown::HashSet;
use inkwell::module::Module;
use inkwell::targets::TargetTriple;
use inkwell::values::FunctionValue;
use tempfile::{Builder, NamedTempFile, TempPath};

use crate::core::address_space::AddressSpaceMap;
use crate::core::config::TranslatorConfig;
use crate::core::error::{BackendError, BackendResult, ErrorLog};
use crate::core::invoke::{CommandRunner, CompilerInvocation, SystemCommandRunner};
use crate::core::translator::{BackendId, BackendTranslator, TranslatorState};
use crate::llvm::annotations;
use crate::llvm::link;
use crate::llvm::pipeline::{ModuleAnalysis, OptLevel, PassHandler, PassSpec, Pipeline};

/// File name of the CPU builtin library below the install's bitcode dir.
pub const CPU_BUILTIN_LIBRARY: &str = "libkernel-sscp-cpu-full.bc";

/// Prefix of ErrorLog entries written by this backend.
const LOG_PREFIX: &str = "cpu";

/// Prefix of the temp artifacts created while lowering.
const TEMP_PREFIX: &str = "sscp-cpu-";

/// Translates generic SSCP modules for execution on the host CPU.
pub struct CpuTranslator {
    kernel_names: Vec<String>,
    kernel_index: HashSet<String>,
    config: TranslatorConfig,
    runner: Box<dyn CommandRunner>,
    errors: ErrorLog,
    state: TranslatorState,
}

impl CpuTranslator {
    /// Translator for `kernel_names` targeting the host.
    pub fn new(kernel_names: Vec<String>) -> Self {
        Self::with_config(kernel_names, TranslatorConfig::host())
    }

    pub fn with_config(kernel_names: Vec<String>, config: TranslatorConfig) -> Self {
        let kernel_index = kernel_names.iter().cloned().collect();
        Self {
            kernel_names,
            kernel_index,
            config,
            runner: Box::new(SystemCommandRunner),
            errors: ErrorLog::new(),
            state: TranslatorState::Created,
        }
    }

    /// Replace the process runner used to invoke the external compiler.
    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn kernel_names(&self) -> &[String] {
        &self.kernel_names
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn builtin_library_path(&self) -> PathBuf {
        self.config.install().bitcode_library(CPU_BUILTIN_LIBRARY)
    }

    /// Pipeline run at the end of flavoring.
    pub fn build_pipeline(&self) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline
            .add_pass(PassSpec::AddressSpaceInference(self.address_space_map()))
            .add_pass(PassSpec::KernelFlattening {
                opt_level: OptLevel::O3,
                split_barriers: true,
            });
        pipeline
    }

    /// Compiler command line lowering `input` (bitcode) to `output` (assembly).
    pub fn build_invocation(&self, input: &Path, output: &Path) -> CompilerInvocation {
        let mut invocation = CompilerInvocation::new(self.config.compiler());
        invocation
            .args(["-cc1", "-triple", self.config.target_triple(), "-O3", "-S", "-x", "ir", "-o"])
            .arg(output)
            .arg(input);
        if self.config.has_specific_cpu() {
            invocation.arg("-target-cpu").arg(self.config.target_cpu());
        }
        invocation
    }

    fn fail<T>(&mut self, err: BackendError) -> BackendResult<T> {
        self.register_error(&err);
        Err(err)
    }

    fn flavor(&self, module: &Module<'_>, passes: &mut dyn PassHandler) -> BackendResult<()> {
        log::debug!("{}: install root {}", LOG_PREFIX, self.config.install().root().display());
        let library_path = self.builtin_library_path();
        let library = link::load_bitcode_library(module, &library_path)?;

        module.set_triple(&TargetTriple::create(self.config.target_triple()));
        link::link_library(module, library, &library_path)?;

        let mut seen = HashSet::new();
        for name in &self.kernel_names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match module.get_function(name) {
                Some(function) => annotations::mark_kernel(module, function)?,
                None => log::debug!("{}: kernel {} not present in module", LOG_PREFIX, name),
            }
        }

        passes.register_analysis(ModuleAnalysis::SplitterAnnotation);
        passes.run_pipeline(module, &self.build_pipeline())
    }

    fn dump_module(&self, module: &Module<'_>) {
        if let Some(path) = self.config.dump_module() {
            if let Err(e) = module.print_to_file(path) {
                log::warn!("{}: could not dump module to {}: {}", LOG_PREFIX, path.display(), e);
            }
        }
    }

    fn lower(&mut self, module: &Module<'_>) -> BackendResult<String> {
        self.dump_module(module);

        let temp_dir = env::temp_dir();
        let input = write_bitcode_artifact(&temp_dir, module)?;
        let output = temp_artifact(&temp_dir, ".s")?;

        let invocation = self.build_invocation(&input, &output);
        log::debug!("{}: Invoking {}", LOG_PREFIX, invocation);

        let program = invocation.program().display().to_string();
        let outcome = self
            .runner
            .execute_and_wait(&invocation)
            .map_err(|source| BackendError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !outcome.success() {
            if !outcome.stderr.is_empty() {
                log::debug!("{}: compiler stderr:\n{}", LOG_PREFIX, outcome.stderr);
            }
            return Err(match outcome.code {
                Some(code) => BackendError::CompilerFailed { program, code },
                None => BackendError::CompilerTerminated { program },
            });
        }

        fs::read_to_string(&output).map_err(|source| BackendError::ReadOutput {
            path: output.to_path_buf(),
            source,
        })
    }
}

/// Create an empty, uniquely named file in `dir`.
fn create_temp(dir: &Path, suffix: &str) -> BackendResult<NamedTempFile> {
    Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|source| BackendError::TempFile {
            path: dir.join(format!("{}XXXXXX{}", TEMP_PREFIX, suffix)),
            source,
        })
}

/// Temp artifact deleted when the returned guard drops.
fn temp_artifact(dir: &Path, suffix: &str) -> BackendResult<TempPath> {
    create_temp(dir, suffix).map(NamedTempFile::into_temp_path)
}

/// Serialize `module` into a fresh `.bc` temp artifact in `dir`.
fn write_bitcode_artifact(dir: &Path, module: &Module<'_>) -> BackendResult<TempPath> {
    let mut file = create_temp(dir, ".bc")?;

    let bitcode = module.write_bitcode_to_memory();
    let written = file.write_all(bitcode.as_slice()).and_then(|_| file.flush());
    if let Err(source) = written {
        return Err(BackendError::BitcodeWrite {
            path: file.path().to_path_buf(),
            source,
        });
    }

    Ok(file.into_temp_path())
}

impl BackendTranslator for CpuTranslator {
    fn backend(&self) -> BackendId {
        BackendId::Cpu
    }

    fn apply_build_option(&mut self, key: &str, value: &str) -> bool {
        let applied = match key {
            "triple" => self.config.set_target_triple(value),
            "cpu" => self.config.set_target_cpu(value),
            _ => false,
        };
        if applied && self.state == TranslatorState::Created {
            self.state = TranslatorState::Configured;
        }
        applied
    }

    fn to_backend_flavor(&mut self, module: &Module<'_>, passes: &mut dyn PassHandler) -> BackendResult<()> {
        log::info!(
            "{}: flavoring module for {} ({} kernels)",
            LOG_PREFIX,
            self.config.target_triple(),
            self.kernel_names().len()
        );
        match self.flavor(module, passes) {
            Ok(()) => {
                if self.state != TranslatorState::Failed {
                    self.state = TranslatorState::Flavored;
                }
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    fn translate_to_backend_format(&mut self, module: &Module<'_>, out: &mut String) -> BackendResult<()> {
        log::info!("{}: lowering module with {}", LOG_PREFIX, self.config.compiler().display());
        match self.lower(module) {
            Ok(text) => {
                *out = text;
                if self.state != TranslatorState::Failed {
                    self.state = TranslatorState::Lowered;
                }
                Ok(())
            }
            Err(err) => self.fail(err),
        }
    }

    fn is_kernel_after_flavoring(&self, function: FunctionValue<'_>) -> bool {
        function
            .get_name()
            .to_str()
            .map(|name| self.kernel_index.contains(name))
            .unwrap_or(false)
    }

    fn address_space_map(&self) -> AddressSpaceMap {
        AddressSpaceMap::flat()
    }

    fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    fn register_error(&mut self, err: &BackendError) {
        self.errors.register(format!("{}: {}", LOG_PREFIX, err));
        self.state = TranslatorState::Failed;
    }

    fn state(&self) -> TranslatorState {
        self.state
    }
}
