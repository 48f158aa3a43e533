#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests: boundary conditions, malformed input and closed handles

use lipc::config::MAX_SERVICE_NAME_LEN;
use lipc::core::codec::ValueCodec;
use lipc::core::hasharray::HASHARRAY_MAGIC;
use lipc::{
    HashArray, IntProperty, Lipc, LipcCode, LipcConfig, LipcError, LocalBus, Value, ValueKind,
};

fn open(bus: &LocalBus, name: Option<&str>) -> lipc::Result<Lipc> {
    Lipc::open_with_config(bus.shared(), name, LipcConfig::default())
}

// ============================================================================
// CONNECTION EDGE CASES
// ============================================================================

#[test]
fn test_service_name_length_boundary() {
    let bus = LocalBus::new();

    let longest = format!("com.{}", "x".repeat(MAX_SERVICE_NAME_LEN - 4));
    assert_eq!(longest.len(), MAX_SERVICE_NAME_LEN);
    assert!(open(&bus, Some(&longest)).is_ok());

    let too_long = format!("com.{}", "x".repeat(MAX_SERVICE_NAME_LEN - 3));
    let err = open(&bus, Some(&too_long)).unwrap_err();
    assert_eq!(err.code(), LipcCode::ServiceNameTooLong);
}

#[test]
fn test_malformed_service_names() {
    let bus = LocalBus::new();
    for name in ["example", "com..example", "com.example.", "9com.example", ""] {
        let err = open(&bus, Some(name)).unwrap_err();
        assert_eq!(err.code(), LipcCode::InvalidArg, "{name:?}");
    }
}

#[test]
fn test_duplicate_service_name() {
    let bus = LocalBus::new();
    let _first = open(&bus, Some("com.example")).unwrap();
    let err = open(&bus, Some("com.example")).unwrap_err();
    assert_eq!(err.code(), LipcCode::DuplicateServiceName);

    // Anonymous handles never collide
    let _a = open(&bus, None).unwrap();
    let _b = open(&bus, None).unwrap();
}

#[tokio::test]
async fn test_operations_after_close() {
    let bus = LocalBus::new();
    let lipc = open(&bus, Some("com.example")).unwrap();
    lipc.register_property("p", IntProperty::new().getter(|_| Ok(1)), None)
        .unwrap();
    lipc.close().unwrap();

    assert!(matches!(
        lipc.get_int_property("com.example", "p").await,
        Err(LipcError::InvalidHandle)
    ));
    assert!(matches!(
        lipc.register_property("q", IntProperty::new(), None),
        Err(LipcError::InvalidHandle)
    ));
    assert!(matches!(lipc.new_event("e"), Err(LipcError::InvalidHandle)));
    assert!(matches!(lipc.subscribe("com.other"), Err(LipcError::InvalidHandle)));
    assert!(matches!(lipc.dispatch_pending(), Err(LipcError::InvalidHandle)));
    assert!(matches!(lipc.run().await, Err(LipcError::InvalidHandle)));
}

#[tokio::test]
async fn test_property_without_callbacks() {
    let bus = LocalBus::new();
    let lipc = open(&bus, Some("com.example")).unwrap();
    lipc.register_property("inert", IntProperty::new(), None).unwrap();

    assert_eq!(lipc.get_properties("com.example").await.unwrap(), "inert Int - ");
    assert!(matches!(
        lipc.get_int_property("com.example", "inert").await,
        Err(LipcError::AccessNotAllowed)
    ));
    assert!(matches!(
        lipc.set_int_property("com.example", "inert", 1).await,
        Err(LipcError::AccessNotAllowed)
    ));
}

#[test]
fn test_invalid_property_names() {
    let bus = LocalBus::new();
    let lipc = open(&bus, Some("com.example")).unwrap();
    for name in ["", "_properties", "has space"] {
        assert!(matches!(
            lipc.register_property(name, IntProperty::new(), None),
            Err(LipcError::InvalidArg(_))
        ));
    }
}

#[test]
fn test_empty_event_name() {
    let bus = LocalBus::new();
    let lipc = open(&bus, Some("com.example")).unwrap();
    assert!(matches!(lipc.new_event(""), Err(LipcError::InvalidArg(_))));
}

// ============================================================================
// CODEC EDGE CASES
// ============================================================================

#[test]
fn test_codec_extremes() {
    for value in [
        Value::Integer(i32::MIN),
        Value::Integer(i32::MAX),
        Value::Text(String::new()),
        Value::Blob(Vec::new()),
        Value::Text("ünïcødé".to_string()),
    ] {
        let bytes = ValueCodec::encode(&value);
        assert_eq!(ValueCodec::decode(&bytes, value.kind()).unwrap(), value);
    }
}

#[test]
fn test_codec_truncated_input() {
    assert!(matches!(
        ValueCodec::decode(&[0, 0, 0], ValueKind::Integer),
        Err(LipcError::CorruptData(_))
    ));
    // Length prefix claims more than is present
    assert!(matches!(
        ValueCodec::decode(&[0, 0, 0, 9, b'a'], ValueKind::Text),
        Err(LipcError::CorruptData(_))
    ));
}

#[test]
fn test_codec_invalid_utf8() {
    assert!(matches!(
        ValueCodec::decode(&[0, 0, 0, 2, 0xC3, 0x28], ValueKind::Text),
        Err(LipcError::CorruptData(_))
    ));
}

// ============================================================================
// PERSISTENCE EDGE CASES
// ============================================================================

fn sample() -> Vec<u8> {
    let ha = HashArray::new();
    ha.add_hash().unwrap();
    ha.put_int(0, "n", 1).unwrap();
    ha.put_string(0, "s", "text").unwrap();
    ha.to_bytes().unwrap()
}

#[test]
fn test_restore_empty_input() {
    assert!(matches!(
        HashArray::from_bytes(&[]),
        Err(LipcError::CorruptData(_))
    ));
}

#[test]
fn test_restore_bad_magic() {
    let mut bytes = sample();
    bytes[0] ^= 0xFF;
    assert!(matches!(
        HashArray::from_bytes(&bytes),
        Err(LipcError::CorruptData(_))
    ));
}

#[test]
fn test_restore_bad_version() {
    let mut bytes = sample();
    bytes[HASHARRAY_MAGIC.len()] = 0xEE;
    assert!(matches!(
        HashArray::from_bytes(&bytes),
        Err(LipcError::CorruptData(_))
    ));
}

#[test]
fn test_restore_every_truncation() {
    let bytes = sample();
    for len in 0..bytes.len() {
        assert!(
            matches!(
                HashArray::from_bytes(&bytes[..len]),
                Err(LipcError::CorruptData(_))
            ),
            "truncation at {len} should be rejected"
        );
    }
}

#[test]
fn test_restore_trailing_bytes() {
    let mut bytes = sample();
    bytes.push(0);
    assert!(matches!(
        HashArray::from_bytes(&bytes),
        Err(LipcError::CorruptData(_))
    ));
}

#[test]
fn test_restore_huge_counts() {
    let mut bytes = HASHARRAY_MAGIC.to_vec();
    bytes.push(1);
    bytes.extend_from_slice(&0u32.to_be_bytes());
    bytes.extend_from_slice(&u32::MAX.to_be_bytes());
    assert!(matches!(
        HashArray::from_bytes(&bytes),
        Err(LipcError::CorruptData(_))
    ));
}

#[test]
fn test_restore_unknown_tag() {
    let mut bytes = HASHARRAY_MAGIC.to_vec();
    bytes.push(1);
    bytes.extend_from_slice(&0u32.to_be_bytes()); // empty identity
    bytes.extend_from_slice(&1u32.to_be_bytes()); // one map
    bytes.extend_from_slice(&1u32.to_be_bytes()); // one entry
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.push(b'k');
    bytes.push(9); // no such tag
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    assert!(matches!(
        HashArray::from_bytes(&bytes),
        Err(LipcError::CorruptData(_))
    ));
}

#[test]
fn test_restore_duplicate_key() {
    let mut bytes = HASHARRAY_MAGIC.to_vec();
    bytes.push(1);
    bytes.extend_from_slice(&0u32.to_be_bytes());
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.extend_from_slice(&2u32.to_be_bytes());
    for _ in 0..2 {
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.push(b'k');
        bytes.push(1);
        bytes.extend_from_slice(&7i32.to_be_bytes());
    }
    assert!(matches!(
        HashArray::from_bytes(&bytes),
        Err(LipcError::CorruptData(_))
    ));
}

#[test]
fn test_error_codes_and_strings() {
    assert_eq!(LipcCode::Ok.as_str(), "lipcErrNone");
    assert_eq!(LipcError::NoSuchParam.code().as_raw(), 7);
    assert_eq!(LipcError::PropInternal.code().as_raw(), 0x102);
    assert_eq!(LipcCode::from_raw(0xBAD), LipcCode::Unknown);
}
