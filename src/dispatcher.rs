//! Command dispatcher.
//!
//! [`HalDispatcher`] is the HAL's single entry point: it takes raw command
//! words, decodes them and routes each one either to the metadata service
//! or to the qubit lifecycle.
//!
//! | Command | Routed to | Response |
//! |---------|-----------|----------|
//! | `REQUEST_METADATA` | [`MetadataService`] | `Some(chunk)` |
//! | `QUBIT_MEASURE` | [`QubitLifecycle`] | `Some(measurement word)` |
//! | everything else | [`QubitLifecycle`] | `None` |

use tracing::{debug, info, warn};

use crate::command::{Command, CommandCodec};
use crate::config::HalConfig;
use crate::error::HalResult;
use crate::executor::GateExecutor;
use crate::lifecycle::QubitLifecycle;
use crate::measurement::MeasurementCodec;
use crate::metadata::{MetadataEncoder, MetadataRequest, MetadataService};
use crate::opcode::Opcode;

/// One HAL instance bound to a gate executor.
#[derive(Debug)]
pub struct HalDispatcher<E> {
    codec: CommandCodec,
    measurements: MeasurementCodec,
    metadata: MetadataService,
    lifecycle: QubitLifecycle,
    executor: E,
}

impl<E: GateExecutor> HalDispatcher<E> {
    /// Validate `config` and build a dispatcher around `executor`.
    pub fn new(config: HalConfig, executor: E) -> HalResult<Self> {
        config.validate()?;
        let registry = config.registry()?;
        let codec = CommandCodec::new(config.layout.command, registry.clone())?;
        let measurements = MeasurementCodec::new(config.layout.measurement)?;
        let metadata = MetadataService::new(MetadataEncoder::new(config.metadata, registry)?);
        let lifecycle = QubitLifecycle::new(config.register_size, config.layout.command);

        info!(
            register_size = config.register_size,
            executor = executor.name(),
            "HAL dispatcher ready"
        );
        Ok(Self {
            codec,
            measurements,
            metadata,
            lifecycle,
            executor,
        })
    }

    pub fn codec(&self) -> &CommandCodec {
        &self.codec
    }

    pub fn measurement_codec(&self) -> &MeasurementCodec {
        &self.measurements
    }

    pub fn metadata(&self) -> &MetadataService {
        &self.metadata
    }

    pub fn lifecycle(&self) -> &QubitLifecycle {
        &self.lifecycle
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Decode and execute one command word.
    pub fn accept_command(&mut self, word: u64) -> HalResult<Option<u64>> {
        let command = self.codec.decode(word).inspect_err(|e| {
            warn!(word, error = %e, "undecodable command");
        })?;
        self.execute(&command)
    }

    /// Execute an already decoded command.
    pub fn execute(&mut self, command: &Command) -> HalResult<Option<u64>> {
        debug!(
            opcode = command.name(),
            args = ?command.args(),
            qubits = ?command.qubits(),
            base = command.base_index(),
            "dispatching command"
        );
        let response = if command.opcode() == Opcode::RequestMetadata {
            self.metadata.serve_command(command).map(Some)
        } else {
            self.lifecycle
                .apply(command, &mut self.executor)
                .map(|m| m.map(|m| self.measurements.pack(&m)))
        };
        response.inspect_err(|e| {
            warn!(opcode = command.name(), error = %e, "command rejected");
        })
    }

    /// Encode `request` as a command and serve the next chunk.
    pub fn request_metadata(&mut self, request: MetadataRequest) -> HalResult<u64> {
        let word = self.codec.encode(&request.to_command())?;
        self.metadata.serve_command(&self.codec.decode(word)?)
    }

    /// Every chunk answering `request`, polling until the final one.
    pub fn collect_metadata(&mut self, request: MetadataRequest) -> HalResult<Vec<u64>> {
        self.metadata.collect(request)
    }
}
