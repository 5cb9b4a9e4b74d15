//! HAL configuration.
//!
//! Loaded from JSON. Only `register_size` is required; the wire layout
//! defaults to revision 3 and the device metadata to an empty description.
//!
//! ```json
//! {
//!   "register_size": 5,
//!   "metadata": {
//!     "num_qubits": 5,
//!     "max_depth": 1000,
//!     "native_gates": [{"gate": "RX", "duration": 100, "error_rates": [0.01, 0.02]}],
//!     "connectivity": [[0, 1], [1, 0]]
//!   }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::device::DeviceMetadata;
use crate::error::{HalError, HalResult};
use crate::layout::ProtocolLayout;
use crate::opcode::{OpcodeRegistry, REVISION_3_OPCODES};

/// Largest register addressable by the measurement word's 12-bit index.
pub const MAX_REGISTER_SIZE: usize = 1 << 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalConfig {
    /// Number of qubits managed by the lifecycle.
    pub register_size: usize,
    #[serde(default)]
    pub layout: ProtocolLayout,
    #[serde(default)]
    pub metadata: DeviceMetadata,
}

impl HalConfig {
    /// Revision 3 layout, empty metadata.
    pub fn new(register_size: usize) -> Self {
        Self {
            register_size,
            layout: ProtocolLayout::REVISION_3,
            metadata: DeviceMetadata::default(),
        }
    }

    pub fn with_layout(mut self, layout: ProtocolLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_metadata(mut self, metadata: DeviceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn from_json_str(json: &str) -> HalResult<Self> {
        serde_json::from_str(json).map_err(|e| HalError::Configuration(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> HalResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| HalError::Configuration(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Opcode table bound to this configuration's command layout.
    pub fn registry(&self) -> HalResult<Arc<OpcodeRegistry>> {
        if self.layout.command == ProtocolLayout::REVISION_3.command {
            return Ok(OpcodeRegistry::revision_3());
        }
        OpcodeRegistry::new(REVISION_3_OPCODES, &self.layout.command).map(Arc::new)
    }

    pub fn validate(&self) -> HalResult<()> {
        if self.register_size == 0 || self.register_size > MAX_REGISTER_SIZE {
            return Err(HalError::Configuration(format!(
                "register_size must be 1..={MAX_REGISTER_SIZE}, got {}",
                self.register_size
            )));
        }
        let reported = self.metadata.num_qubits as usize;
        if reported != 0 && reported != self.register_size {
            return Err(HalError::Configuration(format!(
                "metadata reports {reported} qubits but register_size is {}",
                self.register_size
            )));
        }
        self.layout.validate()?;
        let registry = self.registry()?;
        self.metadata.validate(&registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BitField;

    #[test]
    fn test_minimal_json() {
        let config = HalConfig::from_json_str(r#"{"register_size": 3}"#).unwrap();
        assert_eq!(config, HalConfig::new(3));
        config.validate().unwrap();
    }

    #[test]
    fn test_metadata_section() {
        let json = r#"{
            "register_size": 2,
            "metadata": {
                "num_qubits": 2,
                "max_depth": 50,
                "native_gates": [{"gate": "CNOT", "duration": 7, "error_rates": [[0, 0.1], [0.2, 0]]}]
            }
        }"#;
        let config = HalConfig::from_json_str(json).unwrap();
        assert_eq!(config.metadata.max_depth, 50);
        config.validate().unwrap();
    }

    #[test]
    fn test_register_size_range() {
        assert!(HalConfig::new(0).validate().is_err());
        assert!(HalConfig::new(MAX_REGISTER_SIZE + 1).validate().is_err());
        HalConfig::new(MAX_REGISTER_SIZE).validate().unwrap();
    }

    #[test]
    fn test_metadata_qubit_count_must_match_register() {
        let config = HalConfig::new(2).with_metadata(DeviceMetadata::new(5));
        assert!(matches!(config.validate(), Err(HalError::Configuration(_))));
        HalConfig::new(5).with_metadata(DeviceMetadata::new(5)).validate().unwrap();
        HalConfig::new(2).with_metadata(DeviceMetadata::new(0)).validate().unwrap();
    }

    #[test]
    fn test_bad_json_is_configuration_error() {
        assert!(matches!(
            HalConfig::from_json_str(r#"{"register_size": "five"}"#),
            Err(HalError::Configuration(_))
        ));
        assert!(matches!(
            HalConfig::from_json_str(r#"{"metadata": {"native_gates": [{"gate": "CCX", "duration": 1, "error_rates": []}]}, "register_size": 1}"#),
            Err(HalError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            HalConfig::from_json_file("/nonexistent/hal.json"),
            Err(HalError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let mut layout = ProtocolLayout::REVISION_3;
        layout.command.slot1.arg = BitField::new(30, 16);
        assert!(HalConfig::new(1).with_layout(layout).validate().is_err());
    }
}
