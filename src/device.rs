//! Device description served through the metadata protocol.
//!
//! [`DeviceMetadata`] collects what a host may ask a HAL about: register
//! size, maximum circuit depth, native gates (with duration and error-rate
//! table) and the qubit connectivity matrix. It is validated once, before
//! any chunk is encoded, so the metadata stream itself never fails on
//! malformed device data.

use serde::{Deserialize, Serialize};

use crate::error::{HalError, HalResult};
use crate::metadata::{ErrorRateCode, MAX_NATIVE_GATES};
use crate::opcode::{Arity, Opcode, OpcodeRegistry};

/// Largest duration that fits the native-gate chunk.
pub const MAX_GATE_DURATION: u64 = (1 << 45) - 1;

/// Largest register the connectivity chunk can address (10-bit indices).
pub const MAX_CONNECTIVITY_QUBITS: usize = 1 << 10;

/// Static description of a quantum device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    /// Number of qubits reported to hosts.
    #[serde(default)]
    pub num_qubits: u32,
    /// Maximum circuit depth; zero when unknown.
    #[serde(default)]
    pub max_depth: u64,
    /// Native gates in index order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub native_gates: Vec<NativeGate>,
    /// Adjacency matrix; empty when not reported.
    #[serde(default, skip_serializing_if = "Connectivity::is_empty")]
    pub connectivity: Connectivity,
}

impl DeviceMetadata {
    pub fn new(num_qubits: u32) -> Self {
        Self {
            num_qubits,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: u64) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_native_gate(mut self, gate: NativeGate) -> Self {
        self.native_gates.push(gate);
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Check the items are consistent with each other and encodable.
    pub fn validate(&self, registry: &OpcodeRegistry) -> HalResult<()> {
        let num_qubits = self.num_qubits as usize;

        if self.max_depth > 0 && num_qubits == 0 {
            return Err(invalid("max_depth is set for a device with no qubits"));
        }
        if self.max_depth >= 1 << 60 || u64::from(self.num_qubits) >= 1 << 60 {
            return Err(invalid("scalar metadata does not fit a 60-bit payload"));
        }

        self.connectivity.validate(num_qubits)?;

        if self.native_gates.len() > MAX_NATIVE_GATES {
            return Err(invalid(format!(
                "{} native gates exceed the limit of {MAX_NATIVE_GATES}",
                self.native_gates.len()
            )));
        }
        for gate in &self.native_gates {
            gate.validate(registry, num_qubits)?;
        }
        Ok(())
    }
}

/// A gate the device executes natively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeGate {
    #[serde(rename = "gate")]
    pub opcode: Opcode,
    /// Execution time in device time units.
    pub duration: u64,
    pub error_rates: ErrorRates,
}

impl NativeGate {
    pub fn new(opcode: Opcode, duration: u64, error_rates: ErrorRates) -> Self {
        Self {
            opcode,
            duration,
            error_rates,
        }
    }

    fn validate(&self, registry: &OpcodeRegistry, num_qubits: usize) -> HalResult<()> {
        let name = self.opcode.name();
        registry.code_of(self.opcode)?;

        if self.duration > MAX_GATE_DURATION {
            return Err(invalid(format!("{name} duration does not fit 45 bits")));
        }

        match (self.opcode.arity(), &self.error_rates) {
            (Arity::Single, ErrorRates::Diagonal(_)) | (Arity::Dual, ErrorRates::Matrix(_)) => {}
            (Arity::Single, ErrorRates::Matrix(_)) => {
                return Err(invalid(format!(
                    "{name} is a single-qubit gate but has an error-rate matrix"
                )));
            }
            (Arity::Dual, ErrorRates::Diagonal(_)) => {
                return Err(invalid(format!(
                    "{name} is a two-qubit gate but has an error-rate vector"
                )));
            }
        }

        if let ErrorRates::Matrix(rows) = &self.error_rates {
            if rows.iter().any(|row| row.len() != rows.len()) {
                return Err(invalid(format!("{name} error-rate matrix is not square")));
            }
        }
        if self.error_rates.dimension() > num_qubits {
            return Err(invalid(format!(
                "{name} error-rate table is larger than the {num_qubits}-qubit register"
            )));
        }

        for &rate in self.error_rates.values() {
            ErrorRateCode::encode(rate)
                .map_err(|e| invalid(format!("{name} error rate {rate}: {e}")))?;
        }
        Ok(())
    }
}

/// Per-qubit error rates of a native gate.
///
/// Single-qubit gates carry one rate per qubit; two-qubit gates carry a
/// square matrix indexed by the qubit pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorRates {
    Diagonal(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl ErrorRates {
    pub fn is_diagonal(&self) -> bool {
        matches!(self, ErrorRates::Diagonal(_))
    }

    /// Number of qubits the table covers.
    pub fn dimension(&self) -> usize {
        match self {
            ErrorRates::Diagonal(rates) => rates.len(),
            ErrorRates::Matrix(rows) => rows.len(),
        }
    }

    fn values(&self) -> Box<dyn Iterator<Item = &f64> + '_> {
        match self {
            ErrorRates::Diagonal(rates) => Box::new(rates.iter()),
            ErrorRates::Matrix(rows) => Box::new(rows.iter().flatten()),
        }
    }

    /// Entries in stream order.
    ///
    /// For a matrix, each row of the upper triangle is followed by the same
    /// row of the transposed lower triangle, keeping non-zero entries only.
    pub fn entries(&self) -> Vec<f64> {
        match self {
            ErrorRates::Diagonal(rates) => rates.clone(),
            ErrorRates::Matrix(rows) => (0..rows.len())
                .flat_map(|r| merged_row(rows, r))
                .collect(),
        }
    }

    /// Entries of one row, or the single diagonal entry for a vector.
    pub fn row_entries(&self, row: usize) -> HalResult<Vec<f64>> {
        let size = self.dimension();
        if row >= size {
            return Err(HalError::QubitOutOfBounds { index: row, size });
        }
        Ok(match self {
            ErrorRates::Diagonal(rates) => vec![rates[row]],
            ErrorRates::Matrix(rows) => merged_row(rows, row),
        })
    }
}

fn merged_row(rows: &[Vec<f64>], r: usize) -> Vec<f64> {
    let n = rows.len();
    let upper = (0..n).map(|c| if c >= r { rows[r][c] } else { 0.0 });
    let lower_t = (0..n).map(|c| if c >= r { rows[c][r] } else { 0.0 });
    upper.chain(lower_t).filter(|&v| v != 0.0).collect()
}

/// Qubit connectivity as an adjacency matrix.
///
/// Any non-zero entry marks a coupling. Only the strict upper triangle is
/// streamed, so the matrix is expected to be symmetric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Connectivity {
    adjacency: Vec<Vec<u8>>,
}

impl Connectivity {
    pub fn from_adjacency(adjacency: Vec<Vec<u8>>) -> Self {
        Self { adjacency }
    }

    /// Symmetric matrix with the given coupling edges.
    pub fn from_edges(num_qubits: usize, edges: &[(usize, usize)]) -> Self {
        let mut adjacency = vec![vec![0; num_qubits]; num_qubits];
        for &(a, b) in edges {
            if a < num_qubits && b < num_qubits {
                adjacency[a][b] = 1;
                adjacency[b][a] = 1;
            }
        }
        Self { adjacency }
    }

    /// Linear chain.
    pub fn linear(n: usize) -> Self {
        let edges: Vec<_> = (0..n.saturating_sub(1)).map(|i| (i, i + 1)).collect();
        Self::from_edges(n, &edges)
    }

    /// Qubit 0 coupled to every other qubit.
    pub fn star(n: usize) -> Self {
        let edges: Vec<_> = (1..n).map(|i| (0, i)).collect();
        Self::from_edges(n, &edges)
    }

    /// All-to-all coupling.
    pub fn full(n: usize) -> Self {
        let edges: Vec<_> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        Self::from_edges(n, &edges)
    }

    /// 2D nearest-neighbour grid, row-major numbering.
    pub fn grid(rows: usize, cols: usize) -> Self {
        let mut edges = vec![];
        for r in 0..rows {
            for c in 0..cols {
                let idx = r * cols + c;
                if c + 1 < cols {
                    edges.push((idx, idx + 1));
                }
                if r + 1 < rows {
                    edges.push((idx, idx + cols));
                }
            }
        }
        Self::from_edges(rows * cols, &edges)
    }

    pub fn num_qubits(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn is_connected(&self, a: usize, b: usize) -> bool {
        let entry = |i: usize, j: usize| {
            self.adjacency
                .get(i)
                .and_then(|row| row.get(j))
                .is_some_and(|&v| v != 0)
        };
        entry(a, b) || entry(b, a)
    }

    /// Non-zero strict-upper-triangle entries, row-major.
    pub fn upper_edges(&self) -> Vec<(usize, usize)> {
        (0..self.num_qubits())
            .flat_map(|row| self.row_edges_unchecked(row))
            .collect()
    }

    /// Non-zero strict-upper-triangle entries of one row.
    pub fn row_edges(&self, row: usize) -> HalResult<Vec<(usize, usize)>> {
        let size = self.num_qubits();
        if row >= size {
            return Err(HalError::QubitOutOfBounds { index: row, size });
        }
        Ok(self.row_edges_unchecked(row).collect())
    }

    fn row_edges_unchecked(&self, row: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency[row]
            .iter()
            .enumerate()
            .skip(row + 1)
            .filter(|&(_, &v)| v != 0)
            .map(move |(col, _)| (row, col))
    }

    fn validate(&self, num_qubits: usize) -> HalResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        if self.num_qubits() != num_qubits
            || self.adjacency.iter().any(|row| row.len() != num_qubits)
        {
            return Err(invalid(format!(
                "connectivity matrix must be {num_qubits}x{num_qubits}"
            )));
        }
        if num_qubits > MAX_CONNECTIVITY_QUBITS {
            return Err(invalid(format!(
                "connectivity matrix exceeds {MAX_CONNECTIVITY_QUBITS} qubits"
            )));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> HalError {
    HalError::Configuration(msg.into())
}
