//! Qubit lifecycle state machine.
//!
//! ```text
//!   Unallocated ──prepare──→ Prepared ──measure──→ Measured
//!                               ↑                     │
//!                               └─────prepare─────────┘
//! ```
//!
//! Every check (bounds, state, control staging) runs before the executor is
//! called, and the executor is called before any state changes. A rejected
//! command therefore leaves the register exactly as it was.

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::command::Command;
use crate::error::{HalError, HalResult};
use crate::executor::GateExecutor;
use crate::layout::CommandLayout;
use crate::measurement::Measurement;
use crate::opcode::Opcode;

/// State of one qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QubitState {
    /// The register is not allocated.
    Unallocated,
    /// Usable by gates and measurement.
    Prepared,
    /// Measured with the recorded outcome; must be re-prepared.
    Measured(bool),
}

impl fmt::Display for QubitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QubitState::Unallocated => write!(f, "Unallocated"),
            QubitState::Prepared => write!(f, "Prepared"),
            QubitState::Measured(value) => write!(f, "Measured({})", u8::from(*value)),
        }
    }
}

/// Register bookkeeping owned by one lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QubitRegister {
    size: usize,
    allocated: bool,
    measured: FxHashMap<usize, bool>,
    offsets: [usize; 2],
    controls: Vec<usize>,
}

impl QubitRegister {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            allocated: false,
            measured: FxHashMap::default(),
            offsets: [0; 2],
            controls: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    pub fn state(&self, qubit: usize) -> QubitState {
        if !self.allocated {
            return QubitState::Unallocated;
        }
        match self.measured.get(&qubit) {
            Some(&value) => QubitState::Measured(value),
            None => QubitState::Prepared,
        }
    }

    /// Paging offset of slot 0 or 1.
    pub fn offset(&self, slot: usize) -> usize {
        self.offsets[slot]
    }

    /// Staged control qubits, in staging order.
    pub fn controls(&self) -> &[usize] {
        &self.controls
    }

    pub fn measured_count(&self) -> usize {
        self.measured.len()
    }

    fn physical(&self, slot: usize, qidx: u32) -> HalResult<usize> {
        let index = (qidx as usize).saturating_add(self.offsets[slot]);
        if index >= self.size {
            return Err(HalError::QubitOutOfBounds {
                index,
                size: self.size,
            });
        }
        Ok(index)
    }

    /// Fails unless `qubit` is prepared and not measured.
    fn check_usable(&self, qubit: usize) -> HalResult<()> {
        match self.state(qubit) {
            QubitState::Prepared => Ok(()),
            QubitState::Unallocated => Err(HalError::QubitNotPrepared(qubit)),
            QubitState::Measured(_) => Err(HalError::RequiresPreparation(qubit)),
        }
    }

    fn allocate(&mut self) {
        self.allocated = true;
        self.measured.clear();
    }

    fn release(&mut self) {
        self.allocated = false;
        self.measured.clear();
        self.controls.clear();
    }
}

/// Offsets beyond `usize` saturate, so every later access is out of bounds.
fn page_base(command: &Command) -> usize {
    usize::try_from(command.base_index()).unwrap_or(usize::MAX)
}

/// Validates commands against the register and drives a [`GateExecutor`].
#[derive(Debug, Clone)]
pub struct QubitLifecycle {
    register: QubitRegister,
    layout: CommandLayout,
}

impl QubitLifecycle {
    pub fn new(size: usize, layout: CommandLayout) -> Self {
        Self {
            register: QubitRegister::new(size),
            layout,
        }
    }

    pub fn register(&self) -> &QubitRegister {
        &self.register
    }

    /// Execute one decoded command.
    ///
    /// Returns a measurement for `QUBIT_MEASURE` and `None` otherwise.
    pub fn apply<E: GateExecutor>(
        &mut self,
        command: &Command,
        executor: &mut E,
    ) -> HalResult<Option<Measurement>> {
        let opcode = command.opcode();
        let first = command.first();
        match opcode {
            Opcode::Id | Opcode::Nop | Opcode::StartSession => {}
            Opcode::EndSession => self.end_session(),
            Opcode::PageSetQubit0 => self.register.offsets[0] = page_base(command),
            Opcode::PageSetQubit1 => self.register.offsets[1] = page_base(command),
            Opcode::StatePreparationAll => self.prepare_all(executor)?,
            Opcode::StatePreparation => self.prepare(first.qubit, executor)?,
            Opcode::QubitMeasure => return self.measure(first.qubit, executor).map(Some),
            Opcode::Control => self.stage_control(first.qubit)?,
            Opcode::Rx
            | Opcode::Ry
            | Opcode::Rz
            | Opcode::R
            | Opcode::PauliX
            | Opcode::PauliY
            | Opcode::PauliZ
            | Opcode::H
            | Opcode::Phase
            | Opcode::T
            | Opcode::S
            | Opcode::X
            | Opcode::Y
            | Opcode::Z
            | Opcode::InvT
            | Opcode::InvS
            | Opcode::Sx
            | Opcode::Sy
            | Opcode::PiXy
            | Opcode::PiYz
            | Opcode::PiZx
            | Opcode::SqrtX => self.single_gate(command, executor)?,
            Opcode::Cnot | Opcode::Swap | Opcode::Pswap | Opcode::Rzz | Opcode::Rxx => {
                self.dual_gate(command, executor)?
            }
            Opcode::ForStart
            | Opcode::ForEnd
            | Opcode::If
            | Opcode::While
            | Opcode::RequestMetadata => return Err(HalError::UnrecognizedCommand(opcode.name())),
        }
        Ok(None)
    }

    fn angle(&self, command: &Command) -> Option<f64> {
        command
            .opcode()
            .is_param()
            .then(|| self.layout.angle_from_argument(command.angle_argument()))
    }

    fn prepare_all<E: GateExecutor>(&mut self, executor: &mut E) -> HalResult<()> {
        if self.register.allocated {
            return Err(HalError::RegisterAlreadyAllocated);
        }
        executor.allocate_or_reset(self.register.size)?;
        self.register.allocate();
        info!(
            size = self.register.size,
            executor = executor.name(),
            "qubit register allocated"
        );
        Ok(())
    }

    fn prepare<E: GateExecutor>(&mut self, qidx: u32, executor: &mut E) -> HalResult<()> {
        let qubit = self.register.physical(0, qidx)?;
        match self.register.state(qubit) {
            QubitState::Unallocated => self.prepare_all(executor),
            QubitState::Prepared => Err(HalError::QubitAlreadyPrepared(qubit)),
            QubitState::Measured(outcome) => {
                if outcome {
                    executor.apply_single(Opcode::X, qubit, None)?;
                }
                self.register.measured.remove(&qubit);
                debug!(qubit, "qubit re-prepared");
                Ok(())
            }
        }
    }

    fn measure<E: GateExecutor>(&mut self, qidx: u32, executor: &mut E) -> HalResult<Measurement> {
        let qubit = self.register.physical(0, qidx)?;
        match self.register.state(qubit) {
            QubitState::Prepared => {}
            QubitState::Unallocated => return Err(HalError::QubitNotPrepared(qubit)),
            QubitState::Measured(_) => return Err(HalError::QubitAlreadyMeasured(qubit)),
        }

        let value = executor.measure(qubit)?;
        self.register.measured.insert(qubit, value);
        let measurement = Measurement::new(qubit as u32, self.register.offsets[0] as u64, value);

        if self.register.measured.len() == self.register.size {
            self.register.release();
            info!(size = self.register.size, "all qubits measured, register released");
        }
        Ok(measurement)
    }

    fn stage_control(&mut self, qidx: u32) -> HalResult<()> {
        let qubit = self.register.physical(0, qidx)?;
        let size = self.register.size;
        if self.register.controls.contains(&qubit) {
            return Err(HalError::DuplicateControl(qubit));
        }
        if self.register.controls.len() + 1 >= size {
            return Err(HalError::TooManyControls { size });
        }
        self.register.controls.push(qubit);
        Ok(())
    }

    fn single_gate<E: GateExecutor>(&mut self, command: &Command, executor: &mut E) -> HalResult<()> {
        let target = self.register.physical(0, command.first().qubit)?;
        self.register.check_usable(target)?;
        let angle = self.angle(command);

        if self.register.controls.is_empty() {
            return executor.apply_single(command.opcode(), target, angle);
        }

        if self.register.controls.contains(&target) {
            return Err(HalError::ControlTargetCollision(target));
        }
        for &control in &self.register.controls {
            self.register.check_usable(control)?;
        }
        executor.apply_controlled(command.opcode(), &self.register.controls, target, angle)?;
        self.register.controls.clear();
        Ok(())
    }

    fn dual_gate<E: GateExecutor>(&mut self, command: &Command, executor: &mut E) -> HalResult<()> {
        let first = self.register.physical(0, command.first().qubit)?;
        let second = self.register.physical(1, command.second().qubit)?;
        if first == second {
            return Err(HalError::DuplicateOperand(first));
        }
        self.register.check_usable(first)?;
        self.register.check_usable(second)?;
        executor.apply_dual(command.opcode(), first, second, self.angle(command))
    }

    fn end_session(&mut self) {
        if self.register.allocated {
            info!(size = self.register.size, "session ended, register released");
        }
        self.register.release();
    }
}
