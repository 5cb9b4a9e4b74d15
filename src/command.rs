//! Command word codec.
//!
//! Encoding places the opcode's registered code in the opcode field and
//! fills one (SINGLE) or two (DUAL) argument/qubit-index slots. Values wider
//! than their field wrap modulo the field width.
//!
//! Decoding resolves the opcode field through the registry first and then
//! extracts slots according to the descriptor's arity, never according to
//! the raw flag bits on their own.
//!
//! `PAGE_SET_QUBIT_0/1` are the exception: they carry a single base index in
//! the layout's wide `base_index` field, so registers larger than the 10-bit
//! qubit field can be paged.

use std::sync::Arc;

use crate::error::HalResult;
use crate::layout::{CommandLayout, SlotLayout};
use crate::opcode::{Arity, Opcode, OpcodeRegistry};

/// One argument / qubit-index pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Operand {
    pub arg: u32,
    pub qubit: u32,
}

/// A decoded (or to-be-encoded) instruction.
///
/// SINGLE opcodes keep their second slot zeroed, so a command built with
/// [`Command::new`] compares equal to its own decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    opcode: Opcode,
    slots: [Operand; 2],
    base: u64,
}

impl Command {
    /// Build a command from wire operands. For page-set opcodes `qidx0` is
    /// taken as the base index and the other operands are dropped.
    pub fn new(opcode: Opcode, arg0: u32, qidx0: u32, arg1: u32, qidx1: u32) -> Self {
        if opcode.is_page_set() {
            return Self::page_set(opcode, u64::from(qidx0));
        }
        let second = match opcode.arity() {
            Arity::Single => Operand::default(),
            Arity::Dual => Operand {
                arg: arg1,
                qubit: qidx1,
            },
        };
        Self {
            opcode,
            slots: [
                Operand {
                    arg: arg0,
                    qubit: qidx0,
                },
                second,
            ],
            base: 0,
        }
    }

    /// `PAGE_SET_QUBIT_0/1` with a base index wider than a qubit field.
    pub fn page_set(opcode: Opcode, base: u64) -> Self {
        Self {
            opcode,
            slots: [Operand::default(); 2],
            base,
        }
    }

    /// Command addressing a single slot.
    pub fn single(opcode: Opcode, arg: u32, qubit: u32) -> Self {
        Self::new(opcode, arg, qubit, 0, 0)
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn name(&self) -> &'static str {
        self.opcode.name()
    }

    pub fn arity(&self) -> Arity {
        self.opcode.arity()
    }

    /// The slots this command's arity actually carries.
    pub fn operands(&self) -> &[Operand] {
        &self.slots[..self.arity().slot_count()]
    }

    pub fn args(&self) -> Vec<u32> {
        self.operands().iter().map(|o| o.arg).collect()
    }

    pub fn qubits(&self) -> Vec<u32> {
        self.operands().iter().map(|o| o.qubit).collect()
    }

    /// Slot 0, present on every command.
    pub fn first(&self) -> Operand {
        self.slots[0]
    }

    /// Slot 1; zero for SINGLE commands.
    pub fn second(&self) -> Operand {
        self.slots[1]
    }

    /// Base index of a page-set command; zero for every other opcode.
    pub fn base_index(&self) -> u64 {
        self.base
    }

    /// Argument carrying the angle of a PARAM opcode (the last slot's).
    pub fn angle_argument(&self) -> u32 {
        self.operands().last().map_or(0, |o| o.arg)
    }
}

/// Packs and unpacks command words for one layout and opcode table.
#[derive(Debug, Clone)]
pub struct CommandCodec {
    layout: CommandLayout,
    registry: Arc<OpcodeRegistry>,
}

impl CommandCodec {
    /// Build a codec; the layout is validated here.
    pub fn new(layout: CommandLayout, registry: Arc<OpcodeRegistry>) -> HalResult<Self> {
        layout.validate()?;
        Ok(Self { layout, registry })
    }

    /// Codec for the revision 3 wire format.
    pub fn revision_3() -> Self {
        Self {
            layout: CommandLayout::REVISION_3,
            registry: OpcodeRegistry::revision_3(),
        }
    }

    pub fn layout(&self) -> &CommandLayout {
        &self.layout
    }

    pub fn registry(&self) -> &OpcodeRegistry {
        &self.registry
    }

    /// Encode by symbolic name.
    pub fn encode_named(
        &self,
        name: &str,
        arg0: u32,
        qidx0: u32,
        arg1: u32,
        qidx1: u32,
    ) -> HalResult<u64> {
        let opcode = self.registry.lookup_by_name(name)?.opcode;
        self.encode(&Command::new(opcode, arg0, qidx0, arg1, qidx1))
    }

    pub fn encode(&self, command: &Command) -> HalResult<u64> {
        let mut code = self.registry.code_of(command.opcode())?;
        match command.arity() {
            Arity::Single => {}
            Arity::Dual => code |= self.layout.dual_flag,
        }
        if command.opcode().is_param() {
            code |= self.layout.param_flag;
        }

        let opcode = self.layout.opcode.place(u64::from(code));
        if command.opcode().is_page_set() {
            return Ok(opcode | self.layout.base_index.place(command.base_index()));
        }

        let mut word = opcode | place_slot(&self.layout.slot0, command.first());
        if command.arity() == Arity::Dual {
            word |= place_slot(&self.layout.slot1, command.second());
        }
        Ok(word)
    }

    pub fn decode(&self, word: u64) -> HalResult<Command> {
        let descriptor = self
            .registry
            .lookup_by_code(self.layout.opcode.extract(word))?;
        if descriptor.opcode.is_page_set() {
            return Ok(Command::page_set(
                descriptor.opcode,
                self.layout.base_index.extract(word),
            ));
        }

        let first = extract_slot(&self.layout.slot0, word);
        let second = match descriptor.arity() {
            Arity::Single => Operand::default(),
            Arity::Dual => extract_slot(&self.layout.slot1, word),
        };

        Ok(Command::new(
            descriptor.opcode,
            first.arg,
            first.qubit,
            second.arg,
            second.qubit,
        ))
    }

    /// Opcode of a word without extracting operands.
    pub fn peek_opcode(&self, word: u64) -> HalResult<Opcode> {
        self.registry
            .lookup_by_code(self.layout.opcode.extract(word))
            .map(|d| d.opcode)
    }
}

fn place_slot(slot: &SlotLayout, operand: Operand) -> u64 {
    slot.arg.place(u64::from(operand.arg)) | slot.qubit.place(u64::from(operand.qubit))
}

#[allow(clippy::cast_possible_truncation)]
fn extract_slot(slot: &SlotLayout, word: u64) -> Operand {
    // Layout validation caps argument and index fields at 32 bits.
    Operand {
        arg: slot.arg.extract(word) as u32,
        qubit: slot.qubit.extract(word) as u32,
    }
}
