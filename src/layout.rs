//! Versioned bit layouts for command and measurement words.
//!
//! The protocol has gone through several incompatible field-width revisions.
//! Rather than hardcoding shifts in the codecs, each codec is built from a
//! layout value; [`ProtocolLayout::REVISION_3`] is the current wire format.
//!
//! # Revision 3
//!
//! Command word:
//!
//! ```text
//!  63      52 51      36 35      20 19     10 9       0
//! +----------+----------+----------+---------+---------+
//! |  OPCODE  |   ARG1   |   ARG0   |  QIDX1  |  QIDX0  |
//! +----------+----------+----------+---------+---------+
//!   DUAL only:  ARG1, QIDX1
//!
//! OPCODE = DUAL [11] | PARAM [10] | CODE [9-0]
//! ```
//!
//! Page-set commands replace the operand fields with one wide base index:
//!
//! ```text
//!  63      52 51      36 35                              0
//! +----------+----------+--------------------------------+
//! |  OPCODE  |   pad    |           BASE_QIDX            |
//! +----------+----------+--------------------------------+
//! ```
//!
//! Measurement word:
//!
//! ```text
//!  63      52 51                 12 11    7 6      1  0
//! +----------+---------------------+-------+--------+---+
//! |   QIDX   |       OFFSET        | STAT  |  pad   | V |
//! +----------+---------------------+-------+--------+---+
//! ```

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::error::{HalError, HalResult};

/// A contiguous run of bits inside a 64-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitField {
    /// Position of the least significant bit.
    pub shift: u32,
    /// Number of bits.
    pub width: u32,
}

impl BitField {
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Mask of `width` low bits.
    pub const fn mask(self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// Read the field out of `word`.
    #[inline]
    pub const fn extract(self, word: u64) -> u64 {
        (word >> self.shift) & self.mask()
    }

    /// Place `value` into the field position, wrapping modulo the width.
    #[inline]
    pub const fn place(self, value: u64) -> u64 {
        (value & self.mask()) << self.shift
    }

    fn end(self) -> u32 {
        self.shift + self.width
    }

    fn overlaps(self, other: BitField) -> bool {
        self.shift < other.end() && other.shift < self.end()
    }

    fn check(self, field: &str, max_width: u32) -> HalResult<()> {
        if self.width == 0 || self.width > max_width || self.end() > 64 {
            return Err(HalError::Configuration(format!(
                "{field} field {}..{} is not a valid {max_width}-bit-or-narrower field",
                self.shift,
                self.end()
            )));
        }
        Ok(())
    }
}

fn check_disjoint(fields: &[(&str, BitField)]) -> HalResult<()> {
    for (i, (name_a, a)) in fields.iter().enumerate() {
        for (name_b, b) in &fields[i + 1..] {
            if a.overlaps(*b) {
                return Err(HalError::Configuration(format!(
                    "{name_a} and {name_b} fields overlap"
                )));
            }
        }
    }
    Ok(())
}

/// Argument and qubit-index fields for one qubit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLayout {
    pub arg: BitField,
    pub qubit: BitField,
}

/// Field positions of a command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLayout {
    /// Whole opcode field, including the flag bits.
    pub opcode: BitField,
    /// Arity flag, relative to the opcode field.
    pub dual_flag: u16,
    /// Parametricity flag, relative to the opcode field.
    pub param_flag: u16,
    /// Slot used by every command.
    pub slot0: SlotLayout,
    /// Slot used only by DUAL commands.
    pub slot1: SlotLayout,
    /// Base qubit index of `PAGE_SET_QUBIT_0/1`, overlaying the operand
    /// fields.
    pub base_index: BitField,
}

impl CommandLayout {
    pub const REVISION_3: Self = Self {
        opcode: BitField::new(52, 12),
        dual_flag: 0x800,
        param_flag: 0x400,
        slot0: SlotLayout {
            arg: BitField::new(20, 16),
            qubit: BitField::new(0, 10),
        },
        slot1: SlotLayout {
            arg: BitField::new(36, 16),
            qubit: BitField::new(10, 10),
        },
        base_index: BitField::new(0, 36),
    };

    pub fn validate(&self) -> HalResult<()> {
        self.opcode.check("opcode", 16)?;
        self.slot0.arg.check("arg0", 32)?;
        self.slot0.qubit.check("qidx0", 32)?;
        self.slot1.arg.check("arg1", 32)?;
        self.slot1.qubit.check("qidx1", 32)?;
        check_disjoint(&[
            ("opcode", self.opcode),
            ("arg0", self.slot0.arg),
            ("qidx0", self.slot0.qubit),
            ("arg1", self.slot1.arg),
            ("qidx1", self.slot1.qubit),
        ])?;
        self.base_index.check("base index", 64)?;
        check_disjoint(&[("opcode", self.opcode), ("base index", self.base_index)])?;

        let opcode_mask = self.opcode.mask();
        for (name, flag) in [("dual", self.dual_flag), ("param", self.param_flag)] {
            if flag.count_ones() != 1 || u64::from(flag) & !opcode_mask != 0 {
                return Err(HalError::Configuration(format!(
                    "{name} flag {flag:#x} must be a single bit inside the opcode field"
                )));
            }
        }
        if self.dual_flag == self.param_flag {
            return Err(HalError::Configuration(
                "dual and param flags share a bit".into(),
            ));
        }
        Ok(())
    }

    /// Convert a raw argument to radians: `raw × 2π / 2^width`.
    pub fn angle_from_argument(&self, raw: u32) -> f64 {
        f64::from(raw) * TAU / 2f64.powi(self.slot0.arg.width as i32)
    }

    /// Nearest raw argument for `angle` radians.
    ///
    /// A full turn maps to `2^width`, which wraps to zero when encoded.
    /// Negative angles wrap into the field: -π/2 is three quarter turns.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn argument_from_angle(&self, angle: f64) -> u32 {
        let width = self.slot0.arg.width;
        let step = TAU / 2f64.powi(width as i32);
        let raw = (angle / step).round_ties_even() as i64;
        if raw < 0 {
            raw.rem_euclid(1i64 << width) as u32
        } else {
            raw as u32
        }
    }
}

impl Default for CommandLayout {
    fn default() -> Self {
        Self::REVISION_3
    }
}

/// Field positions of a measurement word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementLayout {
    pub qubit: BitField,
    pub offset: BitField,
    pub status: BitField,
    pub value: BitField,
}

impl MeasurementLayout {
    pub const REVISION_3: Self = Self {
        qubit: BitField::new(52, 12),
        offset: BitField::new(12, 40),
        status: BitField::new(7, 5),
        value: BitField::new(0, 1),
    };

    pub fn validate(&self) -> HalResult<()> {
        self.qubit.check("qubit", 32)?;
        self.offset.check("offset", 64)?;
        self.status.check("status", 8)?;
        self.value.check("value", 1)?;
        // High to low: qubit, offset, status, value.
        let ordered = [self.qubit, self.offset, self.status, self.value];
        if ordered.windows(2).any(|w| w[0].shift < w[1].end()) {
            return Err(HalError::Configuration(
                "measurement fields must be ordered qubit > offset > status > value".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MeasurementLayout {
    fn default() -> Self {
        Self::REVISION_3
    }
}

/// Complete wire layout of one protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtocolLayout {
    #[serde(default)]
    pub command: CommandLayout,
    #[serde(default)]
    pub measurement: MeasurementLayout,
}

impl ProtocolLayout {
    pub const REVISION_3: Self = Self {
        command: CommandLayout::REVISION_3,
        measurement: MeasurementLayout::REVISION_3,
    };

    pub fn validate(&self) -> HalResult<()> {
        self.command.validate()?;
        self.measurement.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    #[test]
    fn test_bitfield_wraps() {
        let field = BitField::new(10, 10);
        assert_eq!(field.place(3), 3 << 10);
        assert_eq!(field.place(1024 + 5), 5 << 10);
        assert_eq!(field.extract(field.place(1023)), 1023);
    }

    #[test]
    fn test_revision_3_is_valid() {
        ProtocolLayout::REVISION_3.validate().unwrap();
        assert_eq!(ProtocolLayout::default(), ProtocolLayout::REVISION_3);
    }

    #[test]
    fn test_overlapping_fields_rejected() {
        let mut layout = CommandLayout::REVISION_3;
        layout.slot1.qubit = BitField::new(5, 10);
        assert!(matches!(
            layout.validate(),
            Err(HalError::Configuration(_))
        ));
    }

    #[test]
    fn test_flag_outside_opcode_rejected() {
        let mut layout = CommandLayout::REVISION_3;
        layout.dual_flag = 0x1000;
        assert!(layout.validate().is_err());

        let mut layout = CommandLayout::REVISION_3;
        layout.param_flag = layout.dual_flag;
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_base_index_must_clear_opcode() {
        let mut layout = CommandLayout::REVISION_3;
        layout.base_index = BitField::new(0, 53);
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_negative_angle_encodes_as_rotation() {
        let layout = CommandLayout::REVISION_3;
        let raw = layout.argument_from_angle(-PI / 2.0);
        assert_ne!(raw, 0);
        assert!((layout.angle_from_argument(raw) - 3.0 * PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_measurement_order_enforced() {
        let mut layout = MeasurementLayout::REVISION_3;
        layout.value = BitField::new(63, 1);
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_angle_conversion() {
        let layout = CommandLayout::REVISION_3;
        let cases = [
            (0.0, 0),
            (PI / 4.0, 8192),
            (PI / 3.0, 10923),
            (PI / 2.0, 16384),
            (2.0 * PI / 3.0, 21845),
            (PI, 32768),
            (4.0 * PI / 3.0, 43691),
            (3.0 * PI / 2.0, 49152),
            (7.0 * PI / 4.0, 57344),
            (2.0 * PI, 65536),
            (-PI / 4.0, 57344),
            (-PI / 2.0, 49152),
            (-PI, 32768),
            (-2.0 * PI, 0),
        ];
        for (angle, raw) in cases {
            assert_eq!(layout.argument_from_angle(angle), raw, "angle {angle}");
        }
        assert!((layout.angle_from_argument(32768) - PI).abs() < 1e-12);
    }
}
