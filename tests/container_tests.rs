//! Binary container codec: round trips, strict/lenient encoding and
//! malformed-input rejection.

use unkeyed::{
    encode_document, BinaryReader, BinaryWriter, CommonObjects, Plain, ResolveOptions, Resolver,
    UnkeyedError, Value,
};

/// Decodes container bytes and lowers them to a resolved tree. The input
/// trees here carry no references, so resolution is a pure type mapping.
fn reparse_plain(bytes: &[u8]) -> Plain {
    let value = BinaryReader::parse(bytes).expect("container should parse");
    let converter = CommonObjects;
    let resolver = Resolver::new(&[], &converter, &ResolveOptions::default());
    let (result, diagnostics) = resolver.resolve_root(&value);
    assert!(diagnostics.is_empty());
    result.expect("reference-free tree resolves")
}

#[test]
fn document_round_trips_through_binary() {
    let document = Plain::Dict(vec![
        ("title".into(), Plain::Text("a moderately long title string".into())),
        ("unicode".into(), Plain::Text("héllo wörld — ✓".into())),
        ("count".into(), Plain::Int(42)),
        ("negative".into(), Plain::Int(-7)),
        ("huge".into(), Plain::Int(0x1_0000_0001)),
        ("ratio".into(), Plain::Real(0.25)),
        ("flag".into(), Plain::Bool(true)),
        ("off".into(), Plain::Bool(false)),
        ("blob".into(), Plain::Bytes(vec![0, 1, 2, 254, 255])),
        ("when".into(), Plain::Date(694_224_000.5)),
        (
            "items".into(),
            // More than 15 elements so the count spills into an integer
            // object.
            Plain::Array((0..20).map(Plain::Int).collect()),
        ),
        ("empty".into(), Plain::Dict(vec![])),
    ]);

    let bytes = encode_document(&document).expect("document should encode");
    assert!(bytes.starts_with(b"bplist00"));
    assert_eq!(reparse_plain(&bytes), document);
}

#[test]
fn strict_writer_rejects_null() {
    let raw = Value::Dict(vec![(Value::Text("NS.base".into()), Value::Null)]);
    match BinaryWriter::strict().encode(&raw) {
        Err(UnkeyedError::Encode(_)) => {}
        other => panic!("expected Encode error, got {other:?}"),
    }
    BinaryWriter::lenient()
        .encode(&raw)
        .expect("lenient writer accepts null");
}

#[test]
fn encode_document_falls_back_for_null() {
    // A preserved NS.base null forces the strict encoder to refuse; the
    // lenient fallback must kick in transparently.
    let document = Plain::Dict(vec![("NS.base".into(), Plain::Null)]);
    let bytes = encode_document(&document).expect("fallback should succeed");
    let value = BinaryReader::parse(&bytes).expect("container should parse");
    assert_eq!(
        value,
        Value::Dict(vec![(Value::Text("NS.base".into()), Value::Null)])
    );
}

#[test]
fn uid_survives_a_raw_round_trip() {
    let raw = Value::Dict(vec![
        (Value::Text("$top".into()), Value::Uid(3)),
        (Value::Text("big".into()), Value::Uid(0x1_0000)),
    ]);
    let bytes = BinaryWriter::lenient().encode(&raw).expect("should encode");
    assert_eq!(BinaryReader::parse(&bytes).expect("should parse"), raw);
}

#[test]
fn garbage_input_is_a_format_error() {
    match BinaryReader::parse(b"definitely not a property list") {
        Err(UnkeyedError::Format(_)) => {}
        other => panic!("expected Format error, got {other:?}"),
    }
}

#[test]
fn truncated_container_is_a_format_error() {
    let bytes = encode_document(&Plain::Int(1)).expect("should encode");
    match BinaryReader::parse(&bytes[..bytes.len() - 16]) {
        Err(UnkeyedError::Format(_)) => {}
        other => panic!("expected Format error, got {other:?}"),
    }
}

#[test]
fn structural_cycle_in_container_is_rejected() {
    // Hand-build a container whose only object is an array containing
    // itself: offset table points object 0 at an array with a ref back to 0.
    let mut bytes = Vec::from(*b"bplist00");
    bytes.extend_from_slice(&[0xA1, 0x00]); // array of 1 element, ref -> object 0
    let offset_table_offset = bytes.len() as u64;
    bytes.push(8); // object 0 starts right after the magic
    let mut trailer = [0u8; 32];
    trailer[6] = 1; // offset int size
    trailer[7] = 1; // object ref size
    trailer[8..16].copy_from_slice(&1u64.to_be_bytes()); // num objects
    trailer[24..32].copy_from_slice(&offset_table_offset.to_be_bytes());
    bytes.extend_from_slice(&trailer);

    match BinaryReader::parse(&bytes) {
        Err(UnkeyedError::Format(message)) => {
            assert!(message.contains("cycle"), "got {message:?}");
        }
        other => panic!("expected Format error, got {other:?}"),
    }
}
