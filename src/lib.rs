//! HAL Protocol — wire protocol and qubit lifecycle for quantum hardware abstraction layers
//!
//! This crate implements the host-facing side of a quantum HAL: a host
//! streams 64-bit command words, the HAL validates them against the qubit
//! register, forwards the physical operations to a [`GateExecutor`] and
//! answers with 64-bit measurement or metadata words.
//!
//! # Overview
//!
//! - [`OpcodeRegistry`]: the opcode table, checked for code/flag consistency
//! - [`CommandCodec`] / [`Command`]: versioned command word encoding
//! - [`MeasurementCodec`] / [`Measurement`]: measurement result words
//! - [`MetadataService`]: chunked device-metadata streaming
//! - [`QubitLifecycle`]: per-qubit prepare / gate / measure state machine
//! - [`HalDispatcher`]: routes decoded commands to the above
//! - [`HalError`] with categorized error variants
//!
//! # Flow
//!
//! ```text
//!   u64 word ──→ CommandCodec::decode ──→ HalDispatcher
//!                                          ├─ REQUEST_METADATA ──→ MetadataService ──→ chunk
//!                                          └─ everything else  ──→ QubitLifecycle ──→ GateExecutor
//!                                                                        └─ QUBIT_MEASURE ──→ measurement word
//! ```
//!
//! # Example
//!
//! ```ignore
//! use hal_protocol::{HalConfig, HalDispatcher};
//!
//! let mut hal = HalDispatcher::new(HalConfig::new(1), my_executor)?;
//! let codec = hal.codec().clone();
//! hal.accept_command(codec.encode_named("STATE_PREPARATION_ALL", 0, 0, 0, 0)?)?;
//! hal.accept_command(codec.encode_named("X", 0, 0, 0, 0)?)?;
//! let word = hal.accept_command(codec.encode_named("QUBIT_MEASURE", 0, 0, 0, 0)?)?;
//! ```

pub mod command;
pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod layout;
pub mod lifecycle;
pub mod measurement;
pub mod metadata;
pub mod opcode;

pub use command::{Command, CommandCodec, Operand};
pub use config::HalConfig;
pub use device::{Connectivity, DeviceMetadata, ErrorRates, NativeGate};
pub use dispatcher::HalDispatcher;
pub use error::{ErrorCategory, HalError, HalResult};
pub use executor::GateExecutor;
pub use layout::{BitField, CommandLayout, MeasurementLayout, ProtocolLayout};
pub use lifecycle::{QubitLifecycle, QubitRegister, QubitState};
pub use measurement::{Measurement, MeasurementCodec};
pub use metadata::{
    ErrorRateCode, MetadataCategory, MetadataChunk, MetadataCursor, MetadataEncoder,
    MetadataRequest, MetadataService,
};
pub use opcode::{Arity, Opcode, OpcodeDescriptor, OpcodeRegistry, Parametricity};
