//! Classical basis-state executor shared by the integration tests.

#![allow(dead_code)]

use hal_protocol::{GateExecutor, HalError, HalResult, Opcode};

/// Tracks one classical bit per qubit. Only gates that map basis states to
/// basis states are supported.
#[derive(Debug, Default)]
pub struct BasisExecutor {
    pub bits: Vec<bool>,
    pub allocations: usize,
    pub gates: Vec<Opcode>,
}

impl BasisExecutor {
    fn apply(&mut self, gate: Opcode, qubit: usize) -> HalResult<()> {
        match gate {
            Opcode::X | Opcode::PauliX => self.bits[qubit] = !self.bits[qubit],
            Opcode::Z | Opcode::PauliZ | Opcode::S | Opcode::T | Opcode::InvS | Opcode::InvT => {}
            Opcode::Rz | Opcode::Phase => {}
            other => {
                return Err(HalError::Backend(format!(
                    "{other} is not a basis-state gate"
                )));
            }
        }
        self.gates.push(gate);
        Ok(())
    }
}

impl GateExecutor for BasisExecutor {
    fn name(&self) -> &str {
        "basis"
    }

    fn allocate_or_reset(&mut self, size: usize) -> HalResult<()> {
        self.bits = vec![false; size];
        self.allocations += 1;
        Ok(())
    }

    fn apply_single(&mut self, gate: Opcode, qubit: usize, _angle: Option<f64>) -> HalResult<()> {
        self.apply(gate, qubit)
    }

    fn apply_controlled(
        &mut self,
        gate: Opcode,
        controls: &[usize],
        target: usize,
        _angle: Option<f64>,
    ) -> HalResult<()> {
        if controls.iter().all(|&c| self.bits[c]) {
            self.apply(gate, target)
        } else {
            Ok(())
        }
    }

    fn apply_dual(
        &mut self,
        gate: Opcode,
        first: usize,
        second: usize,
        _angle: Option<f64>,
    ) -> HalResult<()> {
        match gate {
            // Slot 1 carries the control.
            Opcode::Cnot => {
                if self.bits[second] {
                    self.bits[first] = !self.bits[first];
                }
            }
            Opcode::Swap => self.bits.swap(first, second),
            other => {
                return Err(HalError::Backend(format!(
                    "{other} is not a basis-state gate"
                )));
            }
        }
        self.gates.push(gate);
        Ok(())
    }

    fn measure(&mut self, qubit: usize) -> HalResult<bool> {
        Ok(self.bits[qubit])
    }
}
