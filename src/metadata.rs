//! Chunked metadata sub-protocol.
//!
//! A host asks for device metadata with `REQUEST_METADATA` commands and gets
//! back one 64-bit chunk per command. Longer answers are split into a
//! sequence of chunks; the host keeps repeating the same request until it
//! receives a chunk with the final flag set.
//!
//! ```text
//!  63   61  60  59                                                  0
//! +-------+---+-----------------------------------------------------+
//! |  CAT  | F |                      payload                        |
//! +-------+---+-----------------------------------------------------+
//!
//! CAT 1, 2   payload = scalar (qubit count, max depth)
//! CAT 3      GATE [59-57] | OPCODE [56-45] | DURATION [44-0]
//! CAT 4      PAIR [59-40] | PAIR [39-20] | PAIR [19-0]        PAIR = ROW << 10 | COL
//! CAT 5      DIAG [59] | GATE [58-56] | RATE [55-42] | RATE [41-28] | RATE [27-14] | RATE [13-0]
//!                                                              RATE = MANTISSA << 4 | EXP
//! ```
//!
//! Request encoding: `arg0` is the category. Connectivity requests set bit
//! 15 of `arg1` to restrict the scan to one row. Error-rate requests carry
//! `gate << 13 | row_flag << 12` in `arg1`. The row of a row-scoped request
//! is `qidx0 + qidx1`.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::Command;
use crate::device::DeviceMetadata;
use crate::error::{HalError, HalResult};
use crate::layout::BitField;
use crate::opcode::{Opcode, OpcodeRegistry};

/// Most native gates a device can report (3-bit gate index).
pub const MAX_NATIVE_GATES: usize = 8;

const CATEGORY: BitField = BitField::new(61, 3);
const FINAL: BitField = BitField::new(60, 1);
const PAYLOAD: BitField = BitField::new(0, 60);

const GATE_INDEX: BitField = BitField::new(57, 3);
const GATE_OPCODE: BitField = BitField::new(45, 12);
const GATE_DURATION: BitField = BitField::new(0, 45);

const PAIR_SLOTS: [BitField; 3] = [
    BitField::new(40, 20),
    BitField::new(20, 20),
    BitField::new(0, 20),
];
const PAIR_INDEX: BitField = BitField::new(0, 10);

const RATE_DIAGONAL: BitField = BitField::new(59, 1);
const RATE_GATE: BitField = BitField::new(56, 3);
const RATE_SLOTS: [BitField; 4] = [
    BitField::new(42, 14),
    BitField::new(28, 14),
    BitField::new(14, 14),
    BitField::new(0, 14),
];

const CONNECTIVITY_ROW_FLAG: u32 = 1 << 15;
const ERROR_RATE_ROW_FLAG: u32 = 1 << 12;
const ERROR_RATE_GATE_SHIFT: u32 = 13;
const QIDX_MAX: usize = (1 << 10) - 1;

/// Kind of metadata carried by a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataCategory {
    QubitCount = 1,
    MaxDepth = 2,
    NativeGates = 3,
    Connectivity = 4,
    ErrorRates = 5,
}

impl MetadataCategory {
    pub const ALL: [MetadataCategory; 5] = [
        MetadataCategory::QubitCount,
        MetadataCategory::MaxDepth,
        MetadataCategory::NativeGates,
        MetadataCategory::Connectivity,
        MetadataCategory::ErrorRates,
    ];

    pub fn from_code(code: u64) -> HalResult<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or(HalError::UnrecognizedMetadataRequest(code))
    }

    pub const fn code(self) -> u64 {
        self as u64
    }
}

impl fmt::Display for MetadataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetadataCategory::QubitCount => "qubit-count",
            MetadataCategory::MaxDepth => "max-depth",
            MetadataCategory::NativeGates => "native-gates",
            MetadataCategory::Connectivity => "connectivity",
            MetadataCategory::ErrorRates => "error-rates",
        };
        write!(f, "{s}")
    }
}

/// A decoded `REQUEST_METADATA` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataRequest {
    QubitCount,
    MaxDepth,
    NativeGates,
    /// Whole upper triangle, or one row of it.
    Connectivity { row: Option<usize> },
    /// Error-rate table of native gate `gate`, or one row of it.
    ErrorRates { gate: usize, row: Option<usize> },
}

impl MetadataRequest {
    pub fn category(&self) -> MetadataCategory {
        match self {
            MetadataRequest::QubitCount => MetadataCategory::QubitCount,
            MetadataRequest::MaxDepth => MetadataCategory::MaxDepth,
            MetadataRequest::NativeGates => MetadataCategory::NativeGates,
            MetadataRequest::Connectivity { .. } => MetadataCategory::Connectivity,
            MetadataRequest::ErrorRates { .. } => MetadataCategory::ErrorRates,
        }
    }

    /// Interpret a `REQUEST_METADATA` command.
    pub fn from_command(command: &Command) -> HalResult<Self> {
        if command.opcode() != Opcode::RequestMetadata {
            return Err(HalError::UnrecognizedCommand(command.name()));
        }
        let (first, second) = (command.first(), command.second());
        let row = first.qubit as usize + second.qubit as usize;

        Ok(match MetadataCategory::from_code(u64::from(first.arg))? {
            MetadataCategory::QubitCount => MetadataRequest::QubitCount,
            MetadataCategory::MaxDepth => MetadataRequest::MaxDepth,
            MetadataCategory::NativeGates => MetadataRequest::NativeGates,
            MetadataCategory::Connectivity => MetadataRequest::Connectivity {
                row: (second.arg & CONNECTIVITY_ROW_FLAG != 0).then_some(row),
            },
            MetadataCategory::ErrorRates => MetadataRequest::ErrorRates {
                gate: (second.arg >> ERROR_RATE_GATE_SHIFT) as usize & (MAX_NATIVE_GATES - 1),
                row: (second.arg & ERROR_RATE_ROW_FLAG != 0).then_some(row),
            },
        })
    }

    /// Build the command a host sends for this request.
    ///
    /// Rows are split across both index fields, so rows up to 2046 are
    /// reachable.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_command(&self) -> Command {
        let (arg1, row) = match *self {
            MetadataRequest::Connectivity { row } => {
                (row.map_or(0, |_| CONNECTIVITY_ROW_FLAG), row.unwrap_or(0))
            }
            MetadataRequest::ErrorRates { gate, row } => {
                let mut arg1 = (gate as u32) << ERROR_RATE_GATE_SHIFT;
                if row.is_some() {
                    arg1 |= ERROR_RATE_ROW_FLAG;
                }
                (arg1, row.unwrap_or(0))
            }
            _ => (0, 0),
        };
        let qidx0 = row.min(QIDX_MAX);
        let qidx1 = row - qidx0;
        Command::new(
            Opcode::RequestMetadata,
            self.category().code() as u32,
            qidx0 as u32,
            arg1,
            qidx1 as u32,
        )
    }
}

/// Three-significant-digit fixed-point form of an error rate.
///
/// `value = mantissa / 10^digits(mantissa) / 10^exponent`, so the exponent
/// counts the zeros between the decimal point and the first significant
/// digit: 0.014 is `(14, 1)`, 0.5 is `(5, 0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ErrorRateCode {
    pub mantissa: u16,
    pub exponent: u8,
}

impl ErrorRateCode {
    pub const MAX_EXPONENT: u8 = 15;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn encode(value: f64) -> HalResult<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(HalError::Configuration(format!(
                "error rate {value} is not a non-negative number"
            )));
        }
        if value == 0.0 {
            return Ok(Self::default());
        }

        let mut e10 = value.log10().floor() as i32;
        if 10f64.powi(e10) > value {
            e10 -= 1;
        } else if 10f64.powi(e10 + 1) <= value {
            e10 += 1;
        }
        let mut mantissa = (value * 10f64.powi(2 - e10)).round() as u64;
        if mantissa >= 1000 {
            mantissa /= 10;
            e10 += 1;
        }
        while mantissa % 10 == 0 {
            mantissa /= 10;
        }

        let exponent = -e10 - 1;
        if exponent < 0 {
            return Err(HalError::Configuration(format!(
                "error rate {value} rounds to 1 or more"
            )));
        }
        if exponent > i32::from(Self::MAX_EXPONENT) {
            return Err(HalError::Configuration(format!(
                "error rate {value} is too small for a 4-bit exponent"
            )));
        }
        Ok(Self {
            mantissa: mantissa as u16,
            exponent: exponent as u8,
        })
    }

    pub fn value(&self) -> f64 {
        if self.mantissa == 0 {
            return 0.0;
        }
        let digits = self.mantissa.ilog10() as i32 + 1;
        f64::from(self.mantissa) / 10f64.powi(digits + i32::from(self.exponent))
    }

    /// 14-bit wire form.
    pub fn to_bits(self) -> u64 {
        (u64::from(self.mantissa) << 4) | u64::from(self.exponent & 0xf)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn from_bits(bits: u64) -> Self {
        Self {
            mantissa: ((bits >> 4) & 0x3ff) as u16,
            exponent: (bits & 0xf) as u8,
        }
    }
}

/// One native-gate descriptor as carried by a category-3 chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeGateEntry {
    pub index: usize,
    pub code: u16,
    pub duration: u64,
}

/// Host-side view of a metadata chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetadataChunk(pub u64);

impl MetadataChunk {
    pub fn word(self) -> u64 {
        self.0
    }

    pub fn category(self) -> HalResult<MetadataCategory> {
        MetadataCategory::from_code(CATEGORY.extract(self.0))
    }

    pub fn is_final(self) -> bool {
        FINAL.extract(self.0) == 1
    }

    pub fn payload(self) -> u64 {
        PAYLOAD.extract(self.0)
    }

    /// Empty chunk of an empty stream.
    pub fn is_empty(self) -> bool {
        self.payload() == 0
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn native_gate(self) -> NativeGateEntry {
        NativeGateEntry {
            index: GATE_INDEX.extract(self.0) as usize,
            code: GATE_OPCODE.extract(self.0) as u16,
            duration: GATE_DURATION.extract(self.0),
        }
    }

    /// Coupled pairs, skipping empty slots.
    #[allow(clippy::cast_possible_truncation)]
    pub fn connectivity_pairs(self) -> Vec<(usize, usize)> {
        PAIR_SLOTS
            .iter()
            .map(|slot| slot.extract(self.0))
            .filter(|&pair| pair != 0)
            .map(|pair| {
                (
                    (pair >> PAIR_INDEX.width) as usize,
                    PAIR_INDEX.extract(pair) as usize,
                )
            })
            .collect()
    }

    pub fn error_rate_gate(self) -> usize {
        RATE_GATE.extract(self.0) as usize
    }

    pub fn is_diagonal(self) -> bool {
        RATE_DIAGONAL.extract(self.0) == 1
    }

    /// Rate codes in slot order; trailing empty slots are dropped.
    ///
    /// A real 0.0 rate encodes the same as an empty slot, so a table ending
    /// in zeros decodes short. Hosts that know the table size should use
    /// [`MetadataChunk::error_rate_slots`].
    pub fn error_rate_codes(self) -> Vec<ErrorRateCode> {
        let mut codes = self.error_rate_slots(RATE_SLOTS.len());
        while codes.last().is_some_and(|c| c.to_bits() == 0) {
            codes.pop();
        }
        codes
    }

    /// The first `count` rate slots, zeros included.
    pub fn error_rate_slots(self, count: usize) -> Vec<ErrorRateCode> {
        RATE_SLOTS
            .iter()
            .take(count)
            .map(|slot| ErrorRateCode::from_bits(slot.extract(self.0)))
            .collect()
    }

    pub fn error_rates(self) -> Vec<f64> {
        self.error_rate_codes().iter().map(|c| c.value()).collect()
    }
}

fn header(category: MetadataCategory) -> u64 {
    CATEGORY.place(category.code())
}

/// Builds chunk streams from validated device metadata.
///
/// Streams are built on first request and cached; every cached stream is
/// non-empty and only its last chunk carries the final flag.
#[derive(Debug, Clone)]
pub struct MetadataEncoder {
    device: DeviceMetadata,
    registry: Arc<OpcodeRegistry>,
    streams: FxHashMap<MetadataRequest, Arc<[u64]>>,
}

impl MetadataEncoder {
    pub fn new(device: DeviceMetadata, registry: Arc<OpcodeRegistry>) -> HalResult<Self> {
        device.validate(&registry)?;
        Ok(Self {
            device,
            registry,
            streams: FxHashMap::default(),
        })
    }

    pub fn device(&self) -> &DeviceMetadata {
        &self.device
    }

    /// Complete chunk stream answering `request`.
    pub fn stream(&mut self, request: MetadataRequest) -> HalResult<Arc<[u64]>> {
        if let Some(stream) = self.streams.get(&request) {
            return Ok(Arc::clone(stream));
        }
        let stream: Arc<[u64]> = self.build(request)?.into();
        self.streams.insert(request, Arc::clone(&stream));
        Ok(stream)
    }

    fn build(&self, request: MetadataRequest) -> HalResult<Vec<u64>> {
        let category = request.category();
        let chunks = match request {
            MetadataRequest::QubitCount => {
                vec![header(category) | PAYLOAD.place(u64::from(self.device.num_qubits))]
            }
            MetadataRequest::MaxDepth => {
                vec![header(category) | PAYLOAD.place(self.device.max_depth)]
            }
            MetadataRequest::NativeGates => self.native_gate_chunks()?,
            MetadataRequest::Connectivity { row } => self.connectivity_chunks(row)?,
            MetadataRequest::ErrorRates { gate, row } => self.error_rate_chunks(gate, row)?,
        };
        Ok(finish(category, chunks))
    }

    fn native_gate_chunks(&self) -> HalResult<Vec<u64>> {
        self.device
            .native_gates
            .iter()
            .enumerate()
            .map(|(index, gate)| {
                let code = self.registry.code_of(gate.opcode)?;
                Ok(header(MetadataCategory::NativeGates)
                    | GATE_INDEX.place(index as u64)
                    | GATE_OPCODE.place(u64::from(code))
                    | GATE_DURATION.place(gate.duration))
            })
            .collect()
    }

    fn connectivity_chunks(&self, row: Option<usize>) -> HalResult<Vec<u64>> {
        let connectivity = &self.device.connectivity;
        if connectivity.is_empty() {
            return Ok(vec![]);
        }
        let edges = match row {
            Some(row) => connectivity.row_edges(row)?,
            None => connectivity.upper_edges(),
        };
        Ok(edges
            .chunks(PAIR_SLOTS.len())
            .map(|pairs| {
                pairs
                    .iter()
                    .zip(PAIR_SLOTS)
                    .fold(header(MetadataCategory::Connectivity), |word, (&(r, c), slot)| {
                        word | slot.place(((r as u64) << PAIR_INDEX.width) | PAIR_INDEX.place(c as u64))
                    })
            })
            .collect())
    }

    fn error_rate_chunks(&self, gate: usize, row: Option<usize>) -> HalResult<Vec<u64>> {
        let gates = &self.device.native_gates;
        if gates.is_empty() {
            return Ok(vec![]);
        }
        let native = gates.get(gate).ok_or(HalError::UnknownNativeGate(gate))?;
        let rates = &native.error_rates;
        let entries = match row {
            Some(row) => rates.row_entries(row)?,
            None => rates.entries(),
        };

        let base = header(MetadataCategory::ErrorRates)
            | RATE_DIAGONAL.place(u64::from(rates.is_diagonal()))
            | RATE_GATE.place(gate as u64);
        entries
            .chunks(RATE_SLOTS.len())
            .map(|values| {
                values.iter().zip(RATE_SLOTS).try_fold(base, |word, (&v, slot)| {
                    Ok(word | slot.place(ErrorRateCode::encode(v)?.to_bits()))
                })
            })
            .collect()
    }
}

fn finish(category: MetadataCategory, mut chunks: Vec<u64>) -> Vec<u64> {
    if chunks.is_empty() {
        chunks.push(header(category));
    }
    if let Some(last) = chunks.last_mut() {
        *last |= FINAL.place(1);
    }
    chunks
}

/// Position inside the stream of the last served selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataCursor {
    selection: Option<MetadataRequest>,
    position: usize,
}

impl MetadataCursor {
    pub fn selection(&self) -> Option<MetadataRequest> {
        self.selection
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Serve the next chunk of `stream` for `request`.
    ///
    /// A request differing from the previous one restarts at chunk zero;
    /// serving a final chunk rewinds to zero.
    pub fn advance(&mut self, request: MetadataRequest, stream: &[u64]) -> u64 {
        if self.selection != Some(request) {
            self.selection = Some(request);
            self.position = 0;
        }
        let index = self.position.min(stream.len().saturating_sub(1));
        let chunk = stream.get(index).copied().unwrap_or(header(request.category()) | FINAL.place(1));
        if MetadataChunk(chunk).is_final() {
            self.position = 0;
        } else {
            self.position = index + 1;
        }
        chunk
    }
}

/// Encoder plus cursor: the HAL side of the metadata protocol.
#[derive(Debug, Clone)]
pub struct MetadataService {
    encoder: MetadataEncoder,
    cursor: MetadataCursor,
}

impl MetadataService {
    pub fn new(encoder: MetadataEncoder) -> Self {
        Self {
            encoder,
            cursor: MetadataCursor::default(),
        }
    }

    pub fn encoder(&self) -> &MetadataEncoder {
        &self.encoder
    }

    pub fn cursor(&self) -> &MetadataCursor {
        &self.cursor
    }

    /// Answer one request. The cursor is left untouched on error.
    pub fn serve(&mut self, request: MetadataRequest) -> HalResult<u64> {
        let stream = self.encoder.stream(request)?;
        let chunk = self.cursor.advance(request, &stream);
        debug!(
            category = %request.category(),
            position = self.cursor.position(),
            chunks = stream.len(),
            chunk,
            "served metadata chunk"
        );
        Ok(chunk)
    }

    pub fn serve_command(&mut self, command: &Command) -> HalResult<u64> {
        self.serve(MetadataRequest::from_command(command)?)
    }

    /// Every chunk of `request`'s stream, polling until the final flag.
    pub fn collect(&mut self, request: MetadataRequest) -> HalResult<Vec<u64>> {
        let mut chunks = vec![];
        loop {
            let chunk = self.serve(request)?;
            chunks.push(chunk);
            if MetadataChunk(chunk).is_final() {
                return Ok(chunks);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Connectivity, ErrorRates, NativeGate};

    fn service(device: DeviceMetadata) -> MetadataService {
        MetadataService::new(MetadataEncoder::new(device, OpcodeRegistry::revision_3()).unwrap())
    }

    fn three_gates() -> DeviceMetadata {
        DeviceMetadata::new(2)
            .with_native_gate(NativeGate::new(Opcode::Rx, 10, ErrorRates::Diagonal(vec![0.01, 0.02])))
            .with_native_gate(NativeGate::new(Opcode::H, 20, ErrorRates::Diagonal(vec![0.01, 0.02])))
            .with_native_gate(NativeGate::new(
                Opcode::Cnot,
                30,
                ErrorRates::Matrix(vec![vec![0.0, 0.1], vec![0.2, 0.0]]),
            ))
    }

    #[test]
    fn test_error_rate_code_examples() {
        let cases = [
            (0.0, 0, 0),
            (0.014, 14, 1),
            (0.02, 2, 1),
            (0.5, 5, 0),
            (0.123, 123, 0),
            (0.0012345, 123, 2),
            (0.0999, 999, 1),
            (0.09996, 1, 0),
        ];
        for (value, mantissa, exponent) in cases {
            let code = ErrorRateCode::encode(value).unwrap();
            assert_eq!((code.mantissa, code.exponent), (mantissa, exponent), "{value}");
        }
    }

    #[test]
    fn test_error_rate_code_decodes() {
        for value in [0.014, 0.3, 0.00105, 0.999] {
            let code = ErrorRateCode::encode(value).unwrap();
            assert!((code.value() - value).abs() < 1e-12, "{value}");
            assert_eq!(ErrorRateCode::from_bits(code.to_bits()), code);
        }
    }

    #[test]
    fn test_error_rate_code_rejects() {
        assert!(ErrorRateCode::encode(1.0).is_err());
        assert!(ErrorRateCode::encode(0.9999).is_err());
        assert!(ErrorRateCode::encode(-0.1).is_err());
        assert!(ErrorRateCode::encode(f64::NAN).is_err());
        assert!(ErrorRateCode::encode(1e-20).is_err());
    }

    #[test]
    fn test_request_command_round_trip() {
        let requests = [
            MetadataRequest::QubitCount,
            MetadataRequest::MaxDepth,
            MetadataRequest::NativeGates,
            MetadataRequest::Connectivity { row: None },
            MetadataRequest::Connectivity { row: Some(1500) },
            MetadataRequest::ErrorRates { gate: 7, row: None },
            MetadataRequest::ErrorRates { gate: 2, row: Some(0) },
        ];
        for request in requests {
            assert_eq!(MetadataRequest::from_command(&request.to_command()).unwrap(), request);
        }
    }

    #[test]
    fn test_unknown_category() {
        for category in [0, 6, 0xffff] {
            let command = Command::new(Opcode::RequestMetadata, category, 0, 0, 0);
            assert_eq!(
                MetadataRequest::from_command(&command),
                Err(HalError::UnrecognizedMetadataRequest(u64::from(category)))
            );
        }
    }

    #[test]
    fn test_scalar_chunks_are_final() {
        let mut service = service(DeviceMetadata::new(5).with_max_depth(1000));
        let chunk = MetadataChunk(service.serve(MetadataRequest::QubitCount).unwrap());
        assert_eq!(chunk.category().unwrap(), MetadataCategory::QubitCount);
        assert!(chunk.is_final());
        assert_eq!(chunk.payload(), 5);

        let chunk = MetadataChunk(service.serve(MetadataRequest::MaxDepth).unwrap());
        assert!(chunk.is_final());
        assert_eq!(chunk.payload(), 1000);
    }

    #[test]
    fn test_native_gates_final_on_last_and_restart() {
        let mut service = service(three_gates());
        let chunks: Vec<_> = (0..4)
            .map(|_| MetadataChunk(service.serve(MetadataRequest::NativeGates).unwrap()))
            .collect();
        assert_eq!(
            chunks.iter().map(|c| c.is_final()).collect::<Vec<_>>(),
            vec![false, false, true, false]
        );
        assert_eq!(chunks[1].native_gate().index, 1);
        assert_eq!(chunks[2].native_gate().duration, 30);
        assert_eq!(chunks[3], chunks[0]);
    }

    #[test]
    fn test_selection_change_resets_cursor() {
        let mut service = service(three_gates());
        service.serve(MetadataRequest::NativeGates).unwrap();
        assert_eq!(service.cursor().position(), 1);

        service.serve(MetadataRequest::QubitCount).unwrap();
        assert_eq!(service.cursor().position(), 0);

        let first = MetadataChunk(service.serve(MetadataRequest::NativeGates).unwrap());
        assert_eq!(first.native_gate().index, 0);
    }

    #[test]
    fn test_error_keeps_cursor() {
        let mut service = service(three_gates());
        service.serve(MetadataRequest::NativeGates).unwrap();
        let err = service.serve(MetadataRequest::ErrorRates { gate: 5, row: None });
        assert_eq!(err, Err(HalError::UnknownNativeGate(5)));
        assert_eq!(service.cursor().position(), 1);
    }

    #[test]
    fn test_empty_streams_are_header_only() {
        let mut service = service(DeviceMetadata::default());
        for request in [
            MetadataRequest::QubitCount,
            MetadataRequest::MaxDepth,
            MetadataRequest::NativeGates,
            MetadataRequest::Connectivity { row: None },
            MetadataRequest::ErrorRates { gate: 3, row: Some(2) },
        ] {
            let word = service.serve(request).unwrap();
            assert_eq!(word, (request.category().code() << 61) | (1 << 60));
        }
    }

    #[test]
    fn test_connectivity_pairs() {
        let mut service = service(DeviceMetadata::new(4).with_connectivity(Connectivity::full(4)));
        let chunks = service.collect(MetadataRequest::Connectivity { row: None }).unwrap();
        assert_eq!(chunks.len(), 2);
        let pairs: Vec<_> = chunks
            .iter()
            .flat_map(|&w| MetadataChunk(w).connectivity_pairs())
            .collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);

        let row = service.collect(MetadataRequest::Connectivity { row: Some(2) }).unwrap();
        assert_eq!(MetadataChunk(row[0]).connectivity_pairs(), vec![(2, 3)]);

        assert!(matches!(
            service.serve(MetadataRequest::Connectivity { row: Some(4) }),
            Err(HalError::QubitOutOfBounds { index: 4, size: 4 })
        ));
    }

    #[test]
    fn test_error_rate_chunk_fields() {
        let mut service = service(three_gates());
        let chunk = MetadataChunk(
            service
                .serve(MetadataRequest::ErrorRates { gate: 2, row: None })
                .unwrap(),
        );
        assert!(chunk.is_final());
        assert!(!chunk.is_diagonal());
        assert_eq!(chunk.error_rate_gate(), 2);
        assert_eq!(chunk.error_rates(), vec![0.1, 0.2]);

        let chunk = MetadataChunk(
            service
                .serve(MetadataRequest::ErrorRates { gate: 1, row: Some(1) })
                .unwrap(),
        );
        assert!(chunk.is_diagonal());
        assert_eq!(chunk.error_rates(), vec![0.02]);
    }

    #[test]
    fn test_trailing_zero_rate_needs_slot_count() {
        let device = DeviceMetadata::new(2)
            .with_native_gate(NativeGate::new(Opcode::Rx, 10, ErrorRates::Diagonal(vec![0.01, 0.0])));
        let chunk = MetadataChunk(
            service(device)
                .serve(MetadataRequest::ErrorRates { gate: 0, row: None })
                .unwrap(),
        );
        assert_eq!(chunk.error_rates(), vec![0.01]);

        let rates: Vec<f64> = chunk.error_rate_slots(2).iter().map(|c| c.value()).collect();
        assert_eq!(rates, vec![0.01, 0.0]);
        assert_eq!(chunk.error_rate_slots(9).len(), 4);
    }
}
