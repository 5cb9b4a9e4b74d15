//! Opcode registry.
//!
//! The symbolic instruction set is the closed [`Opcode`] enumeration. Each
//! variant carries its arity and parametricity intrinsically; an
//! [`OpcodeRegistry`] binds variants to numeric codes for one protocol
//! revision and checks that every code's flag bits agree with the variant.
//!
//! A malformed table is rejected when the registry is built, so lookups at
//! runtime only ever fail for unknown names or codes.

use std::sync::{Arc, LazyLock};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{HalError, HalResult};
use crate::layout::CommandLayout;

/// Number of qubit slots an opcode addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arity {
    Single,
    Dual,
}

impl Arity {
    /// Number of (argument, qubit index) pairs carried by the command.
    pub const fn slot_count(self) -> usize {
        match self {
            Arity::Single => 1,
            Arity::Dual => 2,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Single => write!(f, "SINGLE"),
            Arity::Dual => write!(f, "DUAL"),
        }
    }
}

/// Whether an opcode takes an angle argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parametricity {
    Const,
    Param,
}

impl std::fmt::Display for Parametricity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parametricity::Const => write!(f, "CONST"),
            Parametricity::Param => write!(f, "PARAM"),
        }
    }
}

macro_rules! opcodes {
    ($( $(#[$meta:meta])* $variant:ident = $name:literal, $arity:ident, $param:ident; )*) => {
        /// Every instruction the protocol knows about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Opcode {
            $( $(#[$meta])* #[serde(rename = $name)] $variant, )*
        }

        impl Opcode {
            /// All opcodes, in table order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$variant, )* ];

            /// Wire-level symbolic name.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $name, )*
                }
            }

            pub const fn arity(self) -> Arity {
                match self {
                    $( Opcode::$variant => Arity::$arity, )*
                }
            }

            pub const fn parametricity(self) -> Parametricity {
                match self {
                    $( Opcode::$variant => Parametricity::$param, )*
                }
            }
        }
    };
}

opcodes! {
    // Session control
    StartSession = "START_SESSION", Single, Const;
    /// Explicit teardown of the qubit register.
    EndSession = "END_SESSION", Single, Const;
    PageSetQubit0 = "PAGE_SET_QUBIT_0", Single, Const;
    PageSetQubit1 = "PAGE_SET_QUBIT_1", Single, Const;
    Nop = "NOP", Single, Const;
    StatePreparationAll = "STATE_PREPARATION_ALL", Single, Const;
    StatePreparation = "STATE_PREPARATION", Single, Const;
    QubitMeasure = "QUBIT_MEASURE", Single, Const;
    /// Out-of-band device description query.
    RequestMetadata = "REQUEST_METADATA", Dual, Const;
    /// Stage a control qubit for the next single-qubit gate.
    Control = "CONTROL", Single, Const;

    // Arbitrary rotations
    Rx = "RX", Single, Param;
    Ry = "RY", Single, Param;
    Rz = "RZ", Single, Param;
    R = "R", Single, Param;

    // Paulis
    PauliX = "PAULI_X", Single, Const;
    PauliY = "PAULI_Y", Single, Const;
    PauliZ = "PAULI_Z", Single, Const;

    // Cliffords and friends
    H = "H", Single, Const;
    Phase = "PHASE", Single, Param;
    T = "T", Single, Const;
    S = "S", Single, Const;
    X = "X", Single, Const;
    Y = "Y", Single, Const;
    Z = "Z", Single, Const;
    InvT = "INVT", Single, Const;
    InvS = "INVS", Single, Const;
    Sx = "SX", Single, Const;
    Sy = "SY", Single, Const;
    PiXy = "PIXY", Single, Param;
    PiYz = "PIYZ", Single, Param;
    PiZx = "PIZX", Single, Param;
    SqrtX = "SQRT_X", Single, Const;

    // Flow control placeholders, not executable yet
    ForStart = "FOR_START", Single, Param;
    ForEnd = "FOR_END", Single, Param;
    If = "IF", Single, Param;
    While = "WHILE", Single, Param;

    // Two-qubit gates
    Cnot = "CNOT", Dual, Const;
    Swap = "SWAP", Dual, Const;
    Pswap = "PSWAP", Dual, Param;
    Rzz = "RZZ", Dual, Param;
    Rxx = "RXX", Dual, Param;

    /// Reserved identity / protocol versioning word.
    Id = "ID", Single, Const;
}

impl Opcode {
    pub fn is_param(self) -> bool {
        self.parametricity() == Parametricity::Param
    }

    /// Page-set opcodes carry a wide base index instead of operands.
    pub fn is_page_set(self) -> bool {
        matches!(self, Opcode::PageSetQubit0 | Opcode::PageSetQubit1)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One opcode bound to its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDescriptor {
    pub opcode: Opcode,
    /// Full opcode field value, flag bits included.
    pub code: u16,
}

impl OpcodeDescriptor {
    pub const fn new(opcode: Opcode, code: u16) -> Self {
        Self { opcode, code }
    }

    pub const fn name(&self) -> &'static str {
        self.opcode.name()
    }

    pub const fn arity(&self) -> Arity {
        self.opcode.arity()
    }

    pub const fn parametricity(&self) -> Parametricity {
        self.opcode.parametricity()
    }
}

const P: u16 = 0x400;
const D: u16 = 0x800;

/// Revision 3 opcode table.
pub const REVISION_3_OPCODES: &[OpcodeDescriptor] = &[
    OpcodeDescriptor::new(Opcode::StartSession, 0),
    OpcodeDescriptor::new(Opcode::EndSession, 1),
    OpcodeDescriptor::new(Opcode::PageSetQubit0, 2),
    OpcodeDescriptor::new(Opcode::PageSetQubit1, 3),
    OpcodeDescriptor::new(Opcode::Nop, 4),
    OpcodeDescriptor::new(Opcode::StatePreparationAll, 5),
    OpcodeDescriptor::new(Opcode::StatePreparation, 6),
    OpcodeDescriptor::new(Opcode::QubitMeasure, 7),
    OpcodeDescriptor::new(Opcode::RequestMetadata, 8 | D),
    OpcodeDescriptor::new(Opcode::Control, 9),
    OpcodeDescriptor::new(Opcode::Rx, 10 | P),
    OpcodeDescriptor::new(Opcode::Ry, 11 | P),
    OpcodeDescriptor::new(Opcode::Rz, 12 | P),
    OpcodeDescriptor::new(Opcode::R, 13 | P),
    OpcodeDescriptor::new(Opcode::PauliX, 20),
    OpcodeDescriptor::new(Opcode::PauliY, 21),
    OpcodeDescriptor::new(Opcode::PauliZ, 22),
    OpcodeDescriptor::new(Opcode::H, 30),
    OpcodeDescriptor::new(Opcode::Phase, 31 | P),
    OpcodeDescriptor::new(Opcode::T, 32),
    OpcodeDescriptor::new(Opcode::S, 33),
    OpcodeDescriptor::new(Opcode::X, 34),
    OpcodeDescriptor::new(Opcode::Y, 35),
    OpcodeDescriptor::new(Opcode::Z, 36),
    OpcodeDescriptor::new(Opcode::InvT, 37),
    OpcodeDescriptor::new(Opcode::InvS, 38),
    OpcodeDescriptor::new(Opcode::Sx, 39),
    OpcodeDescriptor::new(Opcode::Sy, 40),
    OpcodeDescriptor::new(Opcode::PiXy, 41 | P),
    OpcodeDescriptor::new(Opcode::PiYz, 42 | P),
    OpcodeDescriptor::new(Opcode::PiZx, 43 | P),
    OpcodeDescriptor::new(Opcode::SqrtX, 44),
    OpcodeDescriptor::new(Opcode::ForStart, 50 | P),
    OpcodeDescriptor::new(Opcode::ForEnd, 51 | P),
    OpcodeDescriptor::new(Opcode::If, 52 | P),
    OpcodeDescriptor::new(Opcode::While, 53 | P),
    OpcodeDescriptor::new(Opcode::Cnot, 60 | D),
    OpcodeDescriptor::new(Opcode::Swap, 61 | D),
    OpcodeDescriptor::new(Opcode::Pswap, 62 | D | P),
    OpcodeDescriptor::new(Opcode::Rzz, 63 | D | P),
    OpcodeDescriptor::new(Opcode::Rxx, 64 | D | P),
    OpcodeDescriptor::new(Opcode::Id, 1000),
];

static REVISION_3: LazyLock<Arc<OpcodeRegistry>> = LazyLock::new(|| {
    Arc::new(
        OpcodeRegistry::new(REVISION_3_OPCODES, &CommandLayout::REVISION_3)
            .expect("revision 3 opcode table is consistent"),
    )
});

/// Opcode table bound to one command layout.
#[derive(Debug, Clone)]
pub struct OpcodeRegistry {
    entries: Vec<OpcodeDescriptor>,
    by_name: FxHashMap<&'static str, usize>,
    by_code: FxHashMap<u16, usize>,
    by_opcode: FxHashMap<Opcode, usize>,
}

impl OpcodeRegistry {
    /// Build a registry, rejecting duplicates and flag/kind mismatches.
    pub fn new(descriptors: &[OpcodeDescriptor], layout: &CommandLayout) -> HalResult<Self> {
        let mut registry = Self {
            entries: Vec::with_capacity(descriptors.len()),
            by_name: FxHashMap::default(),
            by_code: FxHashMap::default(),
            by_opcode: FxHashMap::default(),
        };

        for descriptor in descriptors {
            let name = descriptor.name();
            let code = descriptor.code;

            if u64::from(code) & !layout.opcode.mask() != 0 {
                return Err(HalError::OpcodeOutOfRange { name, code });
            }

            let dual_set = code & layout.dual_flag != 0;
            let param_set = code & layout.param_flag != 0;
            if dual_set != (descriptor.arity() == Arity::Dual)
                || param_set != (descriptor.parametricity() == Parametricity::Param)
            {
                return Err(HalError::OpcodeFlagMismatch { name, code });
            }

            if registry.by_opcode.contains_key(&descriptor.opcode) {
                return Err(HalError::DuplicateOpcode(name));
            }
            if let Some(&existing) = registry.by_code.get(&code) {
                return Err(HalError::DuplicateOpcodeCode {
                    code,
                    first: registry.entries[existing].name(),
                    second: name,
                });
            }

            let index = registry.entries.len();
            registry.entries.push(*descriptor);
            registry.by_name.insert(name, index);
            registry.by_code.insert(code, index);
            registry.by_opcode.insert(descriptor.opcode, index);
        }

        Ok(registry)
    }

    /// Shared registry for the revision 3 wire format.
    pub fn revision_3() -> Arc<Self> {
        Arc::clone(&REVISION_3)
    }

    pub fn lookup_by_name(&self, name: &str) -> HalResult<&OpcodeDescriptor> {
        self.by_name
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| HalError::UnknownOpcodeName(name.to_string()))
    }

    /// Resolve a full opcode field value (flags included).
    pub fn lookup_by_code(&self, code: u64) -> HalResult<&OpcodeDescriptor> {
        u16::try_from(code)
            .ok()
            .and_then(|c| self.by_code.get(&c))
            .map(|&i| &self.entries[i])
            .ok_or(HalError::UnrecognizedOpcode(code))
    }

    /// Numeric code of a registered opcode.
    pub fn code_of(&self, opcode: Opcode) -> HalResult<u16> {
        self.by_opcode
            .get(&opcode)
            .map(|&i| self.entries[i].code)
            .ok_or_else(|| HalError::UnknownOpcodeName(opcode.name().to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpcodeDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
