//! Drives a HAL dispatcher with a classical basis-state executor.
//!
//! Runs a small circuit (prepare, flip, CNOT, measure) as raw command words
//! and then streams the device metadata back, printing every response word.

use hal_protocol::{
    Connectivity, DeviceMetadata, ErrorRates, GateExecutor, HalConfig, HalDispatcher, HalError,
    HalResult, MetadataChunk, MetadataRequest, NativeGate, Opcode,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// One classical bit per qubit.
#[derive(Default)]
struct BasisSim {
    bits: Vec<bool>,
}

impl BasisSim {
    fn flip(&mut self, gate: Opcode, qubit: usize) -> HalResult<()> {
        match gate {
            Opcode::X | Opcode::PauliX => self.bits[qubit] = !self.bits[qubit],
            Opcode::Z | Opcode::PauliZ | Opcode::Rz => {}
            other => return Err(HalError::Backend(format!("unsupported gate {other}"))),
        }
        Ok(())
    }
}

impl GateExecutor for BasisSim {
    fn name(&self) -> &str {
        "basis-sim"
    }

    fn allocate_or_reset(&mut self, size: usize) -> HalResult<()> {
        self.bits = vec![false; size];
        Ok(())
    }

    fn apply_single(&mut self, gate: Opcode, qubit: usize, _angle: Option<f64>) -> HalResult<()> {
        self.flip(gate, qubit)
    }

    fn apply_controlled(
        &mut self,
        gate: Opcode,
        controls: &[usize],
        target: usize,
        _angle: Option<f64>,
    ) -> HalResult<()> {
        if controls.iter().all(|&c| self.bits[c]) {
            self.flip(gate, target)?;
        }
        Ok(())
    }

    fn apply_dual(
        &mut self,
        gate: Opcode,
        first: usize,
        second: usize,
        _angle: Option<f64>,
    ) -> HalResult<()> {
        match gate {
            Opcode::Cnot if self.bits[second] => self.bits[first] = !self.bits[first],
            Opcode::Cnot => {}
            Opcode::Swap => self.bits.swap(first, second),
            other => return Err(HalError::Backend(format!("unsupported gate {other}"))),
        }
        Ok(())
    }

    fn measure(&mut self, qubit: usize) -> HalResult<bool> {
        Ok(self.bits[qubit])
    }
}

fn device() -> DeviceMetadata {
    DeviceMetadata::new(3)
        .with_max_depth(100)
        .with_native_gate(NativeGate::new(
            Opcode::X,
            20,
            ErrorRates::Diagonal(vec![0.001, 0.0012, 0.0009]),
        ))
        .with_native_gate(NativeGate::new(
            Opcode::Cnot,
            300,
            ErrorRates::Matrix(vec![
                vec![0.0, 0.011, 0.0],
                vec![0.012, 0.0, 0.015],
                vec![0.0, 0.014, 0.0],
            ]),
        ))
        .with_connectivity(Connectivity::linear(3))
}

fn main() -> HalResult<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(true))
        .init();

    let config = HalConfig::new(3).with_metadata(device());
    let mut hal = HalDispatcher::new(config, BasisSim::default())?;
    let codec = hal.codec().clone();

    let program = [
        codec.encode_named("STATE_PREPARATION_ALL", 0, 0, 0, 0)?,
        codec.encode_named("X", 0, 1, 0, 0)?,
        codec.encode_named("CNOT", 0, 0, 0, 1)?,
        codec.encode_named("QUBIT_MEASURE", 0, 0, 0, 0)?,
        codec.encode_named("QUBIT_MEASURE", 0, 1, 0, 0)?,
        codec.encode_named("QUBIT_MEASURE", 0, 2, 0, 0)?,
    ];

    println!("circuit");
    for word in program {
        match hal.accept_command(word)? {
            Some(response) => {
                let m = hal.measurement_codec().unpack(response);
                println!("  {word:#018x} -> {response:#018x}  qubit {} = {}", m.qubit, u8::from(m.value));
            }
            None => println!("  {word:#018x}"),
        }
    }

    println!("metadata");
    let requests = [
        MetadataRequest::QubitCount,
        MetadataRequest::MaxDepth,
        MetadataRequest::NativeGates,
        MetadataRequest::Connectivity { row: None },
        MetadataRequest::ErrorRates { gate: 0, row: None },
        MetadataRequest::ErrorRates { gate: 1, row: None },
    ];
    for request in requests {
        for chunk in hal.collect_metadata(request)? {
            let view = MetadataChunk(chunk);
            println!(
                "  {:<13} {chunk:#018x}{}",
                view.category()?.to_string(),
                if view.is_final() { "  (final)" } else { "" }
            );
        }
    }
    Ok(())
}
