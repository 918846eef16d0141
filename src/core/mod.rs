// This module serves as the central hub for the target-independent parts of the SSCP backend
// translators. It exports and organizes the shared building blocks: the backend contract
// (BackendTranslator, BackendId, TranslatorState), the abstract address-space model and the
// per-target AddressSpaceMap, translator configuration (target triple, CPU model, compiler
// path, optional module dump), installation layout lookup for bundled bitcode libraries,
// the synchronous external compiler invocation seam, and the error types with the
// append-only ErrorLog every translator keeps.

//! Core translator infrastructure
//!
//! Everything a concrete backend needs besides its own flavoring and
//! lowering logic.
//!
//! # Key Components
//!
//! ## Backend contract (`translator`)
//! - `BackendTranslator` trait implemented once per target
//! - `BackendId` to select a target by name
//!
//! ## Address spaces (`address_space`)
//! - Abstract classifications and their target numbering
//!
//! ## Configuration (`config`, `install`)
//! - Target triple and CPU model with validated setters
//! - Location of bundled bitcode libraries
//!
//! ## External compiler (`invoke`)
//! - Argument vector construction and synchronous execution

pub mod address_space;
pub mod config;
pub mod error;
pub mod install;
pub mod invoke;
pub mod translator;

pub use address_space::{AddressSpace, AddressSpaceMap};

pub use config::{
    BuildOption,
    TranslatorConfig,
    GENERIC_CPU,
};

pub use error::{
    BackendError,
    BackendResult,
    ErrorLog,
};

pub use install::InstallLayout;

pub use invoke::{
    CommandRunner,
    CompilerInvocation,
    ExitOutcome,
    SystemCommandRunner,
};

pub use translator::{BackendId, BackendTranslator, TranslatorState};
