//! Tests for the CPU backend translator.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::{Linkage, Module};
use sscp_cpu::core::{
    AddressSpace, BackendError, BackendResult, BackendTranslator, CommandRunner, CompilerInvocation,
    ExitOutcome, TranslatorConfig, TranslatorState,
};
use sscp_cpu::cpu::{CpuTranslator, CPU_BUILTIN_LIBRARY};
use sscp_cpu::llvm::{
    annotated_kernels, LlvmPassHandler, ModuleAnalysis, OptLevel, PassHandler, PassSpec, Pipeline,
    KERNEL_ANNOTATIONS,
};
use tempfile::TempDir;

const KERNEL_MODULE: &str = r#"
define internal void @kernel_a(ptr %p) {
entry:
  ret void
}

define internal void @kernel_b() {
entry:
  ret void
}

define internal void @helper() {
entry:
  ret void
}
"#;

const BUILTIN_MODULE: &str = r#"
define i32 @__sscp_cpu_get_local_id(i32 %dim) {
entry:
  ret i32 0
}
"#;

const FAKE_ASM: &str = "\t.text\n\t.globl\tkernel_a\nkernel_a:\n\tretq\n";

fn parse_module<'ctx>(context: &'ctx Context, ir: &str, name: &str) -> Module<'ctx> {
    let buffer = MemoryBuffer::create_from_memory_range_copy(ir.as_bytes(), name);
    context.create_module_from_ir(buffer).unwrap()
}

/// Install tree containing the CPU builtin library.
fn install_with_builtins() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let bitcode_dir = dir.path().join("lib").join("sscp").join("bitcode");
    fs::create_dir_all(&bitcode_dir).unwrap();

    let context = Context::create();
    let library = parse_module(&context, BUILTIN_MODULE, "builtins");
    let path = bitcode_dir.join(CPU_BUILTIN_LIBRARY);
    assert!(library.write_bitcode_to_path(path.as_path()));
    dir
}

fn config_for(install: &Path) -> TranslatorConfig {
    TranslatorConfig::host()
        .with_install_dir(install)
        .with_compiler("fake-clang")
}

/// Pass handler that records what it is asked to do without running passes.
#[derive(Default)]
struct RecordingPassHandler {
    analyses: Vec<ModuleAnalysis>,
    pipelines: Vec<Pipeline>,
}

impl PassHandler for RecordingPassHandler {
    fn register_analysis(&mut self, analysis: ModuleAnalysis) {
        self.analyses.push(analysis);
    }

    fn run_pipeline(&mut self, _module: &Module<'_>, pipeline: &Pipeline) -> BackendResult<()> {
        self.pipelines.push(pipeline.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct RecordedCall {
    invocation: CompilerInvocation,
    input: PathBuf,
    output: PathBuf,
    input_was_written: bool,
}

#[derive(Clone)]
enum FakeBehavior {
    Succeed(String),
    ExitWith(i32),
    FailToSpawn,
    Terminated,
    /// Exits cleanly without leaving a result file behind.
    DeleteOutput,
}

/// Stand-in for the external compiler.
#[derive(Clone)]
struct FakeCompiler {
    behavior: FakeBehavior,
    calls: Rc<RefCell<Vec<RecordedCall>>>,
}

impl FakeCompiler {
    fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for FakeCompiler {
    fn execute_and_wait(&mut self, invocation: &CompilerInvocation) -> io::Result<ExitOutcome> {
        let output = PathBuf::from(invocation.flag_value("-o").expect("missing -o"));
        let input = invocation
            .get_args()
            .iter()
            .map(PathBuf::from)
            .find(|arg| arg.extension().map_or(false, |ext| ext == "bc"))
            .expect("missing input");
        let input_was_written = fs::metadata(&input).map(|m| m.len() > 0).unwrap_or(false);

        self.calls.borrow_mut().push(RecordedCall {
            invocation: invocation.clone(),
            input,
            output: output.clone(),
            input_was_written,
        });

        match &self.behavior {
            FakeBehavior::Succeed(text) => {
                fs::write(&output, text)?;
                Ok(ExitOutcome::with_code(0))
            }
            FakeBehavior::ExitWith(code) => Ok(ExitOutcome {
                code: Some(*code),
                stderr: "error: something went wrong".to_string(),
            }),
            FakeBehavior::FailToSpawn => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
            FakeBehavior::Terminated => Ok(ExitOutcome {
                code: None,
                stderr: String::new(),
            }),
            FakeBehavior::DeleteOutput => {
                fs::remove_file(&output)?;
                Ok(ExitOutcome::with_code(0))
            }
        }
    }
}

fn kernel_names() -> Vec<String> {
    vec!["kernel_a".to_string(), "kernel_b".to_string(), "missing_kernel".to_string()]
}

#[test]
fn test_flavoring_annotates_kernels() {
    let _ = env_logger::builder().is_test(true).try_init();
    let install = install_with_builtins();
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let mut translator = CpuTranslator::with_config(kernel_names(), config_for(install.path()));
    assert!(translator.apply_build_option("triple", "x86_64-pc-linux"));

    let mut passes = RecordingPassHandler::default();
    translator.to_backend_flavor(&module, &mut passes).unwrap();

    assert_eq!(module.get_triple().as_str().to_str().unwrap(), "x86_64-pc-linux");

    for name in ["kernel_a", "kernel_b"] {
        let f = module.get_function(name).unwrap();
        assert_eq!(f.get_linkage(), Linkage::External, "{} should be external", name);
    }
    let helper = module.get_function("helper").unwrap();
    assert_eq!(helper.get_linkage(), Linkage::Internal);

    assert_eq!(module.get_global_metadata_size(KERNEL_ANNOTATIONS), 2);
    assert_eq!(annotated_kernels(&module), vec!["kernel_a".to_string(), "kernel_b".to_string()]);

    assert_eq!(translator.state(), TranslatorState::Flavored);
    assert!(translator.error_log().is_empty());
}

#[test]
fn test_flavoring_links_builtin_library() {
    let install = install_with_builtins();
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let mut translator = CpuTranslator::with_config(kernel_names(), config_for(install.path()));
    translator
        .to_backend_flavor(&module, &mut RecordingPassHandler::default())
        .unwrap();

    assert!(module.get_function("__sscp_cpu_get_local_id").is_some());
}

#[test]
fn test_duplicate_kernel_names_annotate_once() {
    let install = install_with_builtins();
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let names = vec!["kernel_a".to_string(), "kernel_a".to_string()];
    let mut translator = CpuTranslator::with_config(names, config_for(install.path()));
    translator
        .to_backend_flavor(&module, &mut RecordingPassHandler::default())
        .unwrap();

    assert_eq!(annotated_kernels(&module), vec!["kernel_a".to_string()]);
}

#[test]
fn test_module_without_kernels_is_valid() {
    let install = install_with_builtins();
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let mut translator = CpuTranslator::with_config(vec!["nope".to_string()], config_for(install.path()));
    translator
        .to_backend_flavor(&module, &mut RecordingPassHandler::default())
        .unwrap();

    assert_eq!(module.get_global_metadata_size(KERNEL_ANNOTATIONS), 0);
    assert_eq!(module.get_function("kernel_a").unwrap().get_linkage(), Linkage::Internal);
}

#[test]
fn test_missing_builtin_library_fails_without_annotating() {
    let install = tempfile::tempdir().unwrap();
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let mut translator = CpuTranslator::with_config(kernel_names(), config_for(install.path()));
    let mut passes = RecordingPassHandler::default();
    assert!(translator.to_backend_flavor(&module, &mut passes).is_err());

    assert_eq!(module.get_function("kernel_a").unwrap().get_linkage(), Linkage::Internal);
    assert_eq!(module.get_function("kernel_b").unwrap().get_linkage(), Linkage::Internal);
    assert_eq!(module.get_global_metadata_size(KERNEL_ANNOTATIONS), 0);
    assert!(passes.pipelines.is_empty());

    assert_eq!(translator.state(), TranslatorState::Failed);
    assert_eq!(translator.error_log().len(), 1);
    assert!(translator.error_log().last().unwrap().contains(CPU_BUILTIN_LIBRARY));
}

#[test]
fn test_flavoring_runs_flattening_pipeline() {
    let install = install_with_builtins();
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let mut translator = CpuTranslator::with_config(kernel_names(), config_for(install.path()));
    let mut passes = RecordingPassHandler::default();
    translator.to_backend_flavor(&module, &mut passes).unwrap();

    assert_eq!(passes.analyses, vec![ModuleAnalysis::SplitterAnnotation]);
    assert_eq!(passes.pipelines.len(), 1);

    let pipeline = &passes.pipelines[0];
    match &pipeline.passes()[0] {
        PassSpec::AddressSpaceInference(map) => {
            for space in AddressSpace::ALL {
                assert_eq!(map[space], 0);
            }
        }
        other => panic!("expected address space inference first, got {:?}", other),
    }
    assert_eq!(
        pipeline.passes()[1],
        PassSpec::KernelFlattening {
            opt_level: OptLevel::O3,
            split_barriers: true,
        }
    );
}

#[test]
fn test_kernels_survive_llvm_pipeline() {
    let _ = env_logger::builder().is_test(true).try_init();
    let install = install_with_builtins();
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let mut translator = CpuTranslator::with_config(kernel_names(), config_for(install.path()));
    let mut passes = LlvmPassHandler::new();
    translator.to_backend_flavor(&module, &mut passes).unwrap();

    assert_eq!(passes.registered_analyses(), &[ModuleAnalysis::SplitterAnnotation]);
    assert!(module.get_function("kernel_a").is_some());
    assert!(module.get_function("kernel_b").is_some());
    // Unreferenced internal functions are dropped by global DCE.
    assert!(module.get_function("helper").is_none());
    assert!(module.verify().is_ok());
}

#[test]
fn test_is_kernel_after_flavoring() {
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");
    let translator = CpuTranslator::with_config(kernel_names(), TranslatorConfig::host());

    assert!(translator.is_kernel_after_flavoring(module.get_function("kernel_a").unwrap()));
    assert!(translator.is_kernel_after_flavoring(module.get_function("kernel_b").unwrap()));
    assert!(!translator.is_kernel_after_flavoring(module.get_function("helper").unwrap()));
}

#[test]
fn test_address_space_map_is_flat() {
    let translator = CpuTranslator::with_config(vec![], TranslatorConfig::host());
    let map = translator.address_space_map();
    assert_eq!(map.iter().count(), 7);
    assert!(map.iter().all(|(_, code)| code == 0));
}

#[test]
fn test_lowering_returns_compiler_output() {
    let _ = env_logger::builder().is_test(true).try_init();
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let compiler = FakeCompiler::new(FakeBehavior::Succeed(FAKE_ASM.to_string()));
    let mut translator = CpuTranslator::with_config(kernel_names(), TranslatorConfig::host().with_compiler("fake-clang"))
        .with_runner(compiler.clone());
    assert!(translator.apply_build_option("triple", "x86_64-pc-linux"));
    assert!(translator.apply_build_option("cpu", "generic"));

    let mut out = String::new();
    translator.translate_to_backend_format(&module, &mut out).unwrap();
    assert_eq!(out, FAKE_ASM);
    assert_eq!(translator.state(), TranslatorState::Lowered);

    let calls = compiler.calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert!(call.input_was_written);
    assert_eq!(call.invocation.program(), Path::new("fake-clang"));
    assert_eq!(
        call.invocation.flag_value("-triple").unwrap().to_str(),
        Some("x86_64-pc-linux")
    );
    assert!(call.invocation.flag_value("-target-cpu").is_none());
    assert!(!call.invocation.get_args().iter().any(|a| a == "-target-cpu"));

    assert!(!call.input.exists());
    assert!(!call.output.exists());
}

#[test]
fn test_lowering_passes_specific_cpu() {
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let compiler = FakeCompiler::new(FakeBehavior::Succeed(FAKE_ASM.to_string()));
    let mut translator =
        CpuTranslator::with_config(kernel_names(), TranslatorConfig::host()).with_runner(compiler.clone());
    assert!(translator.apply_build_option("cpu", "skylake-avx512"));

    let mut out = String::new();
    translator.translate_to_backend_format(&module, &mut out).unwrap();

    let call = &compiler.calls()[0];
    assert_eq!(
        call.invocation.flag_value("-target-cpu").unwrap().to_str(),
        Some("skylake-avx512")
    );
}

#[test]
fn test_compiler_failure_records_exit_code() {
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let compiler = FakeCompiler::new(FakeBehavior::ExitWith(17));
    let mut translator =
        CpuTranslator::with_config(kernel_names(), TranslatorConfig::host()).with_runner(compiler.clone());

    let mut out = String::from("untouched");
    assert!(translator.translate_to_backend_format(&module, &mut out).is_err());
    assert_eq!(out, "untouched");

    let log = translator.error_log();
    assert_eq!(log.len(), 1);
    assert!(log.last().unwrap().contains("17"));
    assert_eq!(translator.state(), TranslatorState::Failed);

    let call = &compiler.calls()[0];
    assert!(!call.input.exists());
    assert!(!call.output.exists());
}

#[test]
fn test_spawn_failure_is_recorded() {
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let compiler = FakeCompiler::new(FakeBehavior::FailToSpawn);
    let mut translator = CpuTranslator::with_config(kernel_names(), TranslatorConfig::host().with_compiler("fake-clang"))
        .with_runner(compiler.clone());

    let mut out = String::new();
    assert!(translator.translate_to_backend_format(&module, &mut out).is_err());
    assert!(out.is_empty());
    assert!(translator.error_log().last().unwrap().contains("Could not spawn fake-clang"));

    let call = &compiler.calls()[0];
    assert!(!call.input.exists());
    assert!(!call.output.exists());
}

#[test]
fn test_signal_termination_is_failure() {
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let mut translator = CpuTranslator::with_config(kernel_names(), TranslatorConfig::host())
        .with_runner(FakeCompiler::new(FakeBehavior::Terminated));

    let mut out = String::new();
    assert!(translator.translate_to_backend_format(&module, &mut out).is_err());
    assert!(translator.error_log().last().unwrap().contains("terminated by a signal"));
}

#[test]
fn test_missing_result_file_is_recorded() {
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");

    let compiler = FakeCompiler::new(FakeBehavior::DeleteOutput);
    let mut translator =
        CpuTranslator::with_config(kernel_names(), TranslatorConfig::host()).with_runner(compiler.clone());

    let mut out = String::from("untouched");
    let err = translator.translate_to_backend_format(&module, &mut out).unwrap_err();
    assert!(matches!(err, BackendError::ReadOutput { .. }));
    assert_eq!(out, "untouched");

    let log = translator.error_log();
    assert_eq!(log.len(), 1);
    assert!(log.last().unwrap().contains("Could not read result file"));
    assert_eq!(translator.state(), TranslatorState::Failed);

    let call = &compiler.calls()[0];
    assert!(call.input_was_written);
    assert!(!call.input.exists());
    assert!(!call.output.exists());
}

#[test]
fn test_module_dump_is_opt_in() {
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");
    let scratch = tempfile::tempdir().unwrap();
    let dump = scratch.path().join("flavored.ll");

    let config = TranslatorConfig::host().with_dump_module(Some(dump.clone()));
    let mut translator = CpuTranslator::with_config(kernel_names(), config)
        .with_runner(FakeCompiler::new(FakeBehavior::Succeed(FAKE_ASM.to_string())));

    let mut out = String::new();
    translator.translate_to_backend_format(&module, &mut out).unwrap();

    let text = fs::read_to_string(&dump).unwrap();
    assert!(text.contains("@kernel_a"));

    let translator = CpuTranslator::with_config(kernel_names(), TranslatorConfig::host());
    assert!(translator.config().dump_module().is_none());
}

#[test]
fn test_full_transformation() {
    let install = install_with_builtins();
    let context = Context::create();
    let module = parse_module(&context, KERNEL_MODULE, "kernels");
    let bitcode = module.write_bitcode_to_memory().as_slice().to_vec();

    let compiler = FakeCompiler::new(FakeBehavior::Succeed(FAKE_ASM.to_string()));
    let mut translator =
        CpuTranslator::with_config(kernel_names(), config_for(install.path())).with_runner(compiler.clone());

    let mut passes = RecordingPassHandler::default();
    let asm = translator.full_transformation(&bitcode, &mut passes).unwrap();

    assert_eq!(asm, FAKE_ASM);
    assert_eq!(passes.pipelines.len(), 1);
    assert_eq!(compiler.calls().len(), 1);
    assert_eq!(translator.state(), TranslatorState::Lowered);
}

#[test]
fn test_full_transformation_rejects_garbage() {
    let mut translator = CpuTranslator::with_config(kernel_names(), TranslatorConfig::host());
    let mut passes = RecordingPassHandler::default();

    assert!(translator.full_transformation(b"not bitcode", &mut passes).is_err());
    assert_eq!(translator.error_log().len(), 1);
    assert!(translator.error_log().last().unwrap().contains("Invalid input bitcode"));
    assert!(passes.pipelines.is_empty());
}
