//! Translate SSCP bitcode for the host CPU.
//!
//! Reads a generic kernel module, flavors it with the stock LLVM pass
//! pipeline and prints (or writes) the assembly produced by clang.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sscp_cpu::core::{BackendTranslator, BuildOption, TranslatorConfig};
use sscp_cpu::cpu::CpuTranslator;
use sscp_cpu::llvm::LlvmPassHandler;

#[derive(Parser, Debug)]
#[command(name = "sscp-cpu", about = "Lower SSCP kernel bitcode to host assembly")]
struct Args {
    /// Generic SSCP bitcode module.
    input: PathBuf,

    /// Kernel function name (repeatable).
    #[arg(short, long = "kernel")]
    kernels: Vec<String>,

    /// Build option as key=value, e.g. `cpu=znver4` or `triple=x86_64-pc-linux-gnu`.
    #[arg(short = 'O', long = "option")]
    options: Vec<BuildOption>,

    /// Installation root holding lib/sscp/bitcode.
    #[arg(long)]
    install_dir: Option<PathBuf>,

    /// External compiler binary.
    #[arg(long)]
    clang: Option<PathBuf>,

    /// Print the flavored module to this file before lowering.
    #[arg(long)]
    dump_module: Option<PathBuf>,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let bitcode = match fs::read(&args.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: could not read {}: {}", args.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut config = TranslatorConfig::host().with_dump_module(args.dump_module);
    if let Some(dir) = args.install_dir {
        config = config.with_install_dir(dir);
    }
    if let Some(clang) = args.clang {
        config = config.with_compiler(clang);
    }

    let mut translator = CpuTranslator::with_config(args.kernels, config);
    for option in &args.options {
        if !translator.apply_build_option(&option.key, &option.value) {
            eprintln!("Warning: ignoring unrecognized build option {}", option);
        }
    }

    let mut passes = LlvmPassHandler::new();
    let asm = match translator.full_transformation(&bitcode, &mut passes) {
        Ok(asm) => asm,
        Err(_) => {
            eprintln!("{}", translator.error_log());
            return ExitCode::FAILURE;
        }
    };

    match args.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, asm) {
                eprintln!("Error: could not write {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
        None => print!("{}", asm),
    }

    ExitCode::SUCCESS
}
