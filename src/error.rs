//! HAL error types.
//!
//! Every error is scoped to the command (or construction step) that raised
//! it and is returned to the immediate caller. Nothing is retried or
//! swallowed inside the core.
//!
//! | Category | Variants | Raised by |
//! |----------|----------|-----------|
//! | **Registry** | `UnknownOpcodeName`, `DuplicateOpcode`, `DuplicateOpcodeCode`, `OpcodeFlagMismatch`, `OpcodeOutOfRange` | registry construction and name lookup |
//! | **Codec** | `UnrecognizedOpcode`, `UnrecognizedCommand` | command decode and dispatch |
//! | **Bounds** | `QubitOutOfBounds` | lifecycle and metadata row lookups |
//! | **Lifecycle** | `RegisterAlreadyAllocated`, `QubitAlreadyPrepared`, `QubitNotPrepared`, `QubitAlreadyMeasured`, `RequiresPreparation`, `DuplicateControl`, `TooManyControls`, `ControlTargetCollision`, `DuplicateOperand` | qubit lifecycle |
//! | **Protocol** | `UnrecognizedMetadataRequest`, `UnknownNativeGate` | metadata requests |
//! | **Config** | `Configuration` | layouts, device metadata, config files |
//! | **Backend** | `Backend` | gate executors |

use thiserror::Error;

/// Errors that can occur in HAL operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum HalError {
    // ── Registry ─────────────────────────────────────────────────────
    /// No opcode is registered under this name.
    #[error("Unknown opcode: {0}")]
    UnknownOpcodeName(String),

    /// The same opcode was registered twice.
    #[error("Duplicate opcode registration: {0}")]
    DuplicateOpcode(&'static str),

    /// Two opcodes were registered with the same numeric code.
    #[error("Opcode code {code:#x} registered for both {first} and {second}")]
    DuplicateOpcodeCode {
        code: u16,
        first: &'static str,
        second: &'static str,
    },

    /// The code's arity/param flag bits disagree with the opcode's kind.
    #[error("Opcode {name} code {code:#x} disagrees with its arity/parametricity flags")]
    OpcodeFlagMismatch { name: &'static str, code: u16 },

    /// The code does not fit in the layout's opcode field.
    #[error("Opcode {name} code {code:#x} does not fit the opcode field")]
    OpcodeOutOfRange { name: &'static str, code: u16 },

    // ── Codec ────────────────────────────────────────────────────────
    /// A command word carried an opcode value absent from the registry.
    #[error("Unrecognized opcode: {0:#x}")]
    UnrecognizedOpcode(u64),

    /// A registered opcode that the dispatcher cannot execute.
    #[error("{0} is not a recognised command")]
    UnrecognizedCommand(&'static str),

    // ── Bounds ───────────────────────────────────────────────────────
    /// A physical qubit index is outside the register.
    #[error("Qubit index {index} out of bounds for register size {size}")]
    QubitOutOfBounds { index: usize, size: usize },

    // ── Lifecycle ────────────────────────────────────────────────────
    /// Prepare-all issued while the register is allocated.
    #[error("Qubit register has already been initialised")]
    RegisterAlreadyAllocated,

    /// Single-qubit preparation of a qubit that is already prepared.
    #[error("Qubit {0} already prepared")]
    QubitAlreadyPrepared(usize),

    /// Gate or measurement on a qubit of an unallocated register.
    #[error("Qubit {0} has not been prepared")]
    QubitNotPrepared(usize),

    /// Measurement of a qubit that has already been measured.
    #[error("Qubit {0} already measured")]
    QubitAlreadyMeasured(usize),

    /// Gate on a measured qubit.
    #[error("Qubit {0} requires re-preparation")]
    RequiresPreparation(usize),

    /// The qubit is already staged as a control.
    #[error("Qubit {0} already set up as control qubit")]
    DuplicateControl(usize),

    /// Staging another control would leave no free target.
    #[error("Too many control qubits for register size {size}")]
    TooManyControls { size: usize },

    /// The gate target is one of the staged controls.
    #[error("Target qubit {0} already set up as control qubit")]
    ControlTargetCollision(usize),

    /// A two-qubit gate addressed the same physical qubit twice.
    #[error("Two-qubit gate addresses qubit {0} twice")]
    DuplicateOperand(usize),

    // ── Protocol ─────────────────────────────────────────────────────
    /// Metadata category outside 1–5.
    #[error("Unrecognized metadata request: category {0}")]
    UnrecognizedMetadataRequest(u64),

    /// Error-rate request for a native gate index that does not exist.
    #[error("Unknown native gate index {0}")]
    UnknownNativeGate(usize),

    // ── Config ───────────────────────────────────────────────────────
    /// Invalid layout, device metadata or configuration file.
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── Backend ──────────────────────────────────────────────────────
    /// Failure reported by a gate executor.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Coarse classification of [`HalError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Registry,
    Codec,
    Bounds,
    Lifecycle,
    Protocol,
    Configuration,
    Backend,
}

impl HalError {
    /// The category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownOpcodeName(_)
            | Self::DuplicateOpcode(_)
            | Self::DuplicateOpcodeCode { .. }
            | Self::OpcodeFlagMismatch { .. }
            | Self::OpcodeOutOfRange { .. } => ErrorCategory::Registry,
            Self::UnrecognizedOpcode(_) | Self::UnrecognizedCommand(_) => ErrorCategory::Codec,
            Self::QubitOutOfBounds { .. } => ErrorCategory::Bounds,
            Self::RegisterAlreadyAllocated
            | Self::QubitAlreadyPrepared(_)
            | Self::QubitNotPrepared(_)
            | Self::QubitAlreadyMeasured(_)
            | Self::RequiresPreparation(_)
            | Self::DuplicateControl(_)
            | Self::TooManyControls { .. }
            | Self::ControlTargetCollision(_)
            | Self::DuplicateOperand(_) => ErrorCategory::Lifecycle,
            Self::UnrecognizedMetadataRequest(_) | Self::UnknownNativeGate(_) => {
                ErrorCategory::Protocol
            }
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Backend(_) => ErrorCategory::Backend,
        }
    }

    /// Returns `true` for illegal state transitions of the qubit register.
    pub fn is_lifecycle(&self) -> bool {
        self.category() == ErrorCategory::Lifecycle
    }
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
