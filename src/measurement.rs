//! Measurement result codec.
//!
//! A measurement word reports the physical qubit index, the paging offset
//! that was active when the command was issued, a status field (reserved,
//! currently always zero) and the one-bit outcome.

use serde::{Deserialize, Serialize};

use crate::error::HalResult;
use crate::layout::MeasurementLayout;

/// Unpacked measurement word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measurement {
    pub qubit: u32,
    pub offset: u64,
    pub status: u8,
    pub value: bool,
}

impl Measurement {
    pub fn new(qubit: u32, offset: u64, value: bool) -> Self {
        Self {
            qubit,
            offset,
            status: 0,
            value,
        }
    }

    pub fn with_status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementCodec {
    layout: MeasurementLayout,
}

impl MeasurementCodec {
    pub fn new(layout: MeasurementLayout) -> HalResult<Self> {
        layout.validate()?;
        Ok(Self { layout })
    }

    pub const fn revision_3() -> Self {
        Self {
            layout: MeasurementLayout::REVISION_3,
        }
    }

    pub fn layout(&self) -> &MeasurementLayout {
        &self.layout
    }

    pub fn pack(&self, measurement: &Measurement) -> u64 {
        self.layout.qubit.place(u64::from(measurement.qubit))
            | self.layout.offset.place(measurement.offset)
            | self.layout.status.place(u64::from(measurement.status))
            | self.layout.value.place(u64::from(measurement.value))
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn unpack(&self, word: u64) -> Measurement {
        Measurement {
            qubit: self.layout.qubit.extract(word) as u32,
            offset: self.layout.offset.extract(word),
            status: self.layout.status.extract(word) as u8,
            value: self.layout.value.extract(word) == 1,
        }
    }
}

impl Default for MeasurementCodec {
    fn default() -> Self {
        Self::revision_3()
    }
}
