//! Gate executor trait.
//!
//! The lifecycle state machine validates every command and then hands the
//! physical operation to a [`GateExecutor`]:
//!
//! ```text
//!   allocate_or_reset() ──→ apply_*() ... ──→ measure()
//!        (prepare)            (gates)          (readout)
//! ```
//!
//! ## Contract
//!
//! | Method | Called for | Returns |
//! |--------|-----------|---------|
//! | `name()` | logging | `&str` |
//! | `allocate_or_reset()` | prepare-all, prepare on an empty register | `HalResult<()>` |
//! | `apply_single()` | single-qubit gate, X correction on re-prepare | `HalResult<()>` |
//! | `apply_controlled()` | single-qubit gate with staged controls | `HalResult<()>` |
//! | `apply_dual()` | two-qubit gate | `HalResult<()>` |
//! | `measure()` | measurement | `HalResult<bool>` |
//!
//! Every qubit index handed to an executor is physical and already
//! bounds-checked. Executors report their own failures as
//! [`HalError::Backend`](crate::error::HalError::Backend); a failing call
//! leaves the register state unchanged.

use crate::error::HalResult;
use crate::opcode::Opcode;

/// Performs the physical (or simulated) operations behind validated commands.
pub trait GateExecutor {
    /// Name used in log output.
    fn name(&self) -> &str {
        "executor"
    }

    /// Allocate `size` qubits in |0⟩, discarding any previous state.
    fn allocate_or_reset(&mut self, size: usize) -> HalResult<()>;

    /// Apply `gate` to `qubit`. `angle` is set for PARAM opcodes, in radians.
    fn apply_single(&mut self, gate: Opcode, qubit: usize, angle: Option<f64>) -> HalResult<()>;

    /// Apply `gate` to `target`, conditioned on all of `controls`.
    fn apply_controlled(
        &mut self,
        gate: Opcode,
        controls: &[usize],
        target: usize,
        angle: Option<f64>,
    ) -> HalResult<()>;

    /// Apply a two-qubit `gate`; `first` comes from slot 0 and `second` from
    /// slot 1 of the command.
    fn apply_dual(
        &mut self,
        gate: Opcode,
        first: usize,
        second: usize,
        angle: Option<f64>,
    ) -> HalResult<()>;

    /// Measure `qubit` in the computational basis.
    fn measure(&mut self, qubit: usize) -> HalResult<bool>;
}

impl<E: GateExecutor + ?Sized> GateExecutor for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn allocate_or_reset(&mut self, size: usize) -> HalResult<()> {
        (**self).allocate_or_reset(size)
    }

    fn apply_single(&mut self, gate: Opcode, qubit: usize, angle: Option<f64>) -> HalResult<()> {
        (**self).apply_single(gate, qubit, angle)
    }

    fn apply_controlled(
        &mut self,
        gate: Opcode,
        controls: &[usize],
        target: usize,
        angle: Option<f64>,
    ) -> HalResult<()> {
        (**self).apply_controlled(gate, controls, target, angle)
    }

    fn apply_dual(
        &mut self,
        gate: Opcode,
        first: usize,
        second: usize,
        angle: Option<f64>,
    ) -> HalResult<()> {
        (**self).apply_dual(gate, first, second, angle)
    }

    fn measure(&mut self, qubit: usize) -> HalResult<bool> {
        (**self).measure(qubit)
    }
}
