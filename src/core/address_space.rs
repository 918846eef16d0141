//! Abstract address spaces and their target-specific numbering.
//!
//! Front ends emit IR against a small set of abstract memory-space
//! classifications. Every backend publishes an [`AddressSpaceMap`] that
//! assigns each classification the numeric address space its code
//! generator expects. The map is total: a classification without an entry
//! cannot be expressed.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Abstract memory-space classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    Generic,
    Global,
    Local,
    Private,
    Constant,
    /// Address space used for stack allocations.
    AllocaDefault,
    /// Address space used for module-level global variables.
    GlobalVariableDefault,
}

impl AddressSpace {
    pub const COUNT: usize = 7;

    pub const ALL: [AddressSpace; Self::COUNT] = [
        AddressSpace::Generic,
        AddressSpace::Global,
        AddressSpace::Local,
        AddressSpace::Private,
        AddressSpace::Constant,
        AddressSpace::AllocaDefault,
        AddressSpace::GlobalVariableDefault,
    ];

    fn slot(self) -> usize {
        match self {
            AddressSpace::Generic => 0,
            AddressSpace::Global => 1,
            AddressSpace::Local => 2,
            AddressSpace::Private => 3,
            AddressSpace::Constant => 4,
            AddressSpace::AllocaDefault => 5,
            AddressSpace::GlobalVariableDefault => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AddressSpace::Generic => "generic",
            AddressSpace::Global => "global",
            AddressSpace::Local => "local",
            AddressSpace::Private => "private",
            AddressSpace::Constant => "constant",
            AddressSpace::AllocaDefault => "alloca-default",
            AddressSpace::GlobalVariableDefault => "global-variable-default",
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mapping from every [`AddressSpace`] to a concrete target code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpaceMap {
    codes: [u32; AddressSpace::COUNT],
}

impl AddressSpaceMap {
    /// A map sending every classification to `code`.
    pub fn uniform(code: u32) -> Self {
        Self {
            codes: [code; AddressSpace::COUNT],
        }
    }

    /// A flat, unsegmented memory model: everything lives in address space 0.
    pub fn flat() -> Self {
        Self::uniform(0)
    }

    pub fn get(&self, space: AddressSpace) -> u32 {
        self.codes[space.slot()]
    }

    pub fn set(&mut self, space: AddressSpace, code: u32) {
        self.codes[space.slot()] = code;
    }

    /// Iterate over `(classification, code)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (AddressSpace, u32)> + '_ {
        AddressSpace::ALL.iter().map(move |&space| (space, self.get(space)))
    }

    pub fn is_flat(&self) -> bool {
        self.codes.iter().all(|&code| code == self.codes[0])
    }
}

impl Index<AddressSpace> for AddressSpaceMap {
    type Output = u32;

    fn index(&self, space: AddressSpace) -> &u32 {
        &self.codes[space.slot()]
    }
}

impl IndexMut<AddressSpace> for AddressSpaceMap {
    fn index_mut(&mut self, space: AddressSpace) -> &mut u32 {
        &mut self.codes[space.slot()]
    }
}
