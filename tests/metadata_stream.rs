mod common;

use common::BasisExecutor;
use hal_protocol::{
    Connectivity, DeviceMetadata, ErrorRates, HalConfig, HalDispatcher, MetadataCategory,
    MetadataChunk, MetadataRequest, NativeGate, Opcode,
};

fn reference_device() -> DeviceMetadata {
    let adjacency = (0..5usize)
        .map(|r| (0..5usize).map(|c| u8::from(r.abs_diff(c) <= 1)).collect())
        .collect::<Vec<Vec<u8>>>();
    DeviceMetadata::new(5)
        .with_max_depth(1000)
        .with_native_gate(NativeGate::new(
            Opcode::Rx,
            100,
            ErrorRates::Diagonal(vec![0.014, 0.015, 0.013, 0.014, 0.012]),
        ))
        .with_native_gate(NativeGate::new(
            Opcode::Ry,
            200,
            ErrorRates::Diagonal(vec![0.019, 0.017, 0.016, 0.018]),
        ))
        .with_native_gate(NativeGate::new(
            Opcode::Rz,
            200,
            ErrorRates::Diagonal(vec![0.015, 0.016, 0.016, 0.017]),
        ))
        .with_native_gate(NativeGate::new(
            Opcode::Cnot,
            1000,
            ErrorRates::Matrix(vec![
                vec![0.0, 0.02, 0.0, 0.0],
                vec![0.03, 0.0, 0.03, 0.0],
                vec![0.0, 0.05, 0.0, 0.04],
                vec![0.0, 0.0, 0.02, 0.0],
            ]),
        ))
        .with_connectivity(Connectivity::from_adjacency(adjacency))
}

fn reference_hal() -> HalDispatcher<BasisExecutor> {
    let config = HalConfig::new(5).with_metadata(reference_device());
    HalDispatcher::new(config, BasisExecutor::default()).unwrap()
}

fn request(hal: &mut HalDispatcher<BasisExecutor>, category: u32, qidx0: u32, arg1: u32) -> u64 {
    let word = hal
        .codec()
        .encode_named("REQUEST_METADATA", category, qidx0, arg1, 0)
        .unwrap();
    hal.accept_command(word).unwrap().unwrap()
}

#[test]
fn test_scalars() {
    let mut hal = reference_hal();
    assert_eq!(request(&mut hal, 1, 0, 0), 3458764513820540933);
    assert_eq!(request(&mut hal, 2, 0, 0), 5764607523034235880);
}

#[test]
fn test_native_gates() {
    let mut hal = reference_hal();
    let chunks: Vec<u64> = (0..4).map(|_| request(&mut hal, 3, 0, 0)).collect();
    assert_eq!(
        chunks,
        vec![
            6953909668380934244,
            7098060040828879048,
            7242210413276823752,
            8576964752838755304,
        ]
    );

    let codes: Vec<u16> = chunks
        .iter()
        .map(|&w| MetadataChunk(w).native_gate().code)
        .collect();
    assert_eq!(codes, vec![1034, 1035, 1036, 2108]);
}

#[test]
fn test_connectivity() {
    let mut hal = reference_hal();
    let chunks: Vec<u64> = (0..2).map(|_| request(&mut hal, 4, 0, 0)).collect();
    assert_eq!(chunks, vec![9223373137442244611, 10379675639228661760]);

    assert_eq!(request(&mut hal, 4, 1, 1 << 15), 10377421640391720960);
}

#[test]
fn test_error_rates() {
    let mut hal = reference_hal();
    let chunks: Vec<u64> = [0, 0, 1, 2, 3, 3]
        .into_iter()
        .map(|gate| request(&mut hal, 5, 0, gate << 13))
        .collect();
    assert_eq!(
        chunks,
        vec![
            12106665423533261025,
            13259446125955383296,
            13331996374489645345,
            13403772489255895313,
            11745532976871260241,
            12898595214670692352,
        ]
    );

    let rx: Vec<f64> = chunks[..2]
        .iter()
        .flat_map(|&w| MetadataChunk(w).error_rates())
        .collect();
    assert_eq!(rx, vec![0.014, 0.015, 0.013, 0.014, 0.012]);
}

#[test]
fn test_error_rate_rows() {
    let mut hal = reference_hal();
    let chunks: Vec<u64> = (0..4)
        .map(|gate| request(&mut hal, 5, 3 - gate, (gate << 13) + (1 << 12)))
        .collect();
    assert_eq!(
        chunks,
        vec![
            13259586863443738624,
            13331785194970021888,
            13403842789007949824,
            12898454481477304320,
        ]
    );
}

#[test]
fn test_empty_metadata() {
    let mut hal = HalDispatcher::new(HalConfig::new(1), BasisExecutor::default()).unwrap();
    for category in 1..=5u32 {
        assert_eq!(
            request(&mut hal, category, 0, 0),
            (u64::from(category) << 61) + (1 << 60)
        );
    }
}

#[test]
fn test_category_switch_restarts_stream() {
    let mut hal = reference_hal();
    let first = request(&mut hal, 3, 0, 0);
    request(&mut hal, 3, 0, 0);
    request(&mut hal, 1, 0, 0);
    assert_eq!(request(&mut hal, 3, 0, 0), first);
}

#[test]
fn test_collect_and_decode() {
    let mut hal = reference_hal();
    let chunks = hal
        .collect_metadata(MetadataRequest::Connectivity { row: None })
        .unwrap();
    let pairs: Vec<_> = chunks
        .iter()
        .flat_map(|&w| MetadataChunk(w).connectivity_pairs())
        .collect();
    assert_eq!(pairs, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);

    let chunks = hal
        .collect_metadata(MetadataRequest::ErrorRates { gate: 3, row: None })
        .unwrap();
    assert_eq!(chunks.len(), 2);
    let last = MetadataChunk(chunks[1]);
    assert!(last.is_final());
    assert_eq!(last.category().unwrap(), MetadataCategory::ErrorRates);
    assert_eq!(last.error_rate_gate(), 3);
    assert!(!last.is_diagonal());
}
