//! Root location, multi-root assembly, failure isolation and the archive
//! inspector.

use unkeyed::{
    inspect, locate_roots, CommonObjects, KeyedArchive, Plain, ResolveOptions, UnkeyedError, Value,
};

fn dict(entries: Vec<(&str, Value)>) -> Value {
    Value::Dict(
        entries
            .into_iter()
            .map(|(k, v)| (Value::Text(k.to_string()), v))
            .collect(),
    )
}

fn archive_with(objects: Vec<Value>, top: Vec<(&str, Value)>) -> Value {
    dict(vec![
        ("$archiver", Value::Text("NSKeyedArchiver".into())),
        ("$version", Value::Int(100_000)),
        ("$objects", Value::Array(objects)),
        ("$top", dict(top)),
    ])
}

fn resolve_all(top: &Value) -> unkeyed::Conversion {
    let archive = KeyedArchive::from_value(top).expect("valid archive");
    archive.resolve_all(&CommonObjects, &ResolveOptions::default())
}

#[test]
fn missing_top_entry_is_not_an_archive() {
    let top = dict(vec![("$objects", Value::Array(vec![]))]);
    match KeyedArchive::from_value(&top) {
        Err(UnkeyedError::NotAnArchive) => {}
        other => panic!("expected NotAnArchive, got {other:?}"),
    }
}

#[test]
fn locate_roots_preserves_discovery_order() {
    let top = archive_with(
        vec![Value::Text("$null".into())],
        vec![
            ("zeta", Value::Uid(0)),
            ("alpha", Value::Uid(0)),
            ("mid", Value::Uid(0)),
        ],
    );
    let names: Vec<String> = locate_roots(&top).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["zeta", "alpha", "mid"]);
}

#[test]
fn empty_top_yields_empty_document() {
    let top = archive_with(vec![Value::Text("$null".into())], vec![]);
    let conversion = resolve_all(&top);
    assert_eq!(conversion.document, Plain::Array(vec![]));
    assert!(conversion.roots.is_empty());
    assert!(conversion.is_clean());
}

#[test]
fn single_default_root_is_the_document() {
    let objects = vec![
        Value::Text("$null".into()),
        dict(vec![("greeting", Value::Uid(2))]),
        Value::Text("hello".into()),
    ];
    let top = archive_with(objects, vec![("root", Value::Uid(1))]);
    let conversion = resolve_all(&top);
    assert_eq!(
        conversion.document,
        Plain::Dict(vec![("greeting".into(), Plain::Text("hello".into()))])
    );
    assert!(conversion.is_clean());
}

#[test]
fn non_default_scalar_root_is_wrapped() {
    let objects = vec![Value::Text("$null".into()), Value::Int(42)];
    let top = archive_with(objects, vec![("Answer", Value::Uid(1))]);
    let conversion = resolve_all(&top);
    assert_eq!(
        conversion.document,
        Plain::Dict(vec![("Answer".into(), Plain::Int(42))])
    );
}

#[test]
fn default_named_scalar_root_stays_bare() {
    let objects = vec![Value::Text("$null".into()), Value::Int(42)];
    let top = archive_with(objects, vec![("root", Value::Uid(1))]);
    let conversion = resolve_all(&top);
    assert_eq!(conversion.document, Plain::Int(42));
}

#[test]
fn failed_root_does_not_poison_siblings() {
    let objects = vec![Value::Text("$null".into()), Value::Text("fine".into())];
    let top = archive_with(
        objects,
        vec![("good", Value::Uid(1)), ("bad", Value::Uid(99))],
    );
    let conversion = resolve_all(&top);

    let Plain::Array(parts) = &conversion.document else {
        panic!("multi-root document should be an array");
    };
    assert_eq!(parts.len(), 2);
    assert_eq!(
        parts[0],
        Plain::Dict(vec![("good".into(), Plain::Text("fine".into()))])
    );
    // The failed root contributes an explicit marker, not an empty value.
    let Plain::Dict(marker) = &parts[1] else {
        panic!("failure marker should be a dictionary");
    };
    assert_eq!(marker[0].0, "bad");
    let Plain::Text(message) = &marker[0].1 else {
        panic!("failure marker should carry a message");
    };
    assert!(message.contains("unresolved"), "got message {message:?}");

    assert!(conversion.roots[0].error.is_none());
    match conversion.roots[1].error {
        Some(UnkeyedError::UnresolvedReference { index: 99 }) => {}
        ref other => panic!("expected UnresolvedReference, got {other:?}"),
    }
    assert!(!conversion.is_clean());
}

#[test]
fn cyclic_root_reports_and_isolates() {
    let objects = vec![
        Value::Text("$null".into()),
        dict(vec![("self", Value::Uid(1))]),
        Value::Text("ok".into()),
    ];
    let top = archive_with(
        objects,
        vec![("loop", Value::Uid(1)), ("plain", Value::Uid(2))],
    );
    let conversion = resolve_all(&top);
    match conversion.roots[0].error {
        Some(UnkeyedError::CyclicReference { index: 1 }) => {}
        ref other => panic!("expected CyclicReference, got {other:?}"),
    }
    assert!(conversion.roots[1].error.is_none());
}

#[test]
fn inspector_summarizes_without_resolving() {
    let objects = vec![
        Value::Text("$null".into()),
        dict(vec![
            ("$class", Value::Uid(3)),
            ("NS.keys", Value::Array(vec![])),
            ("NS.objects", Value::Array(vec![])),
        ]),
        dict(vec![("$class", Value::Uid(3))]),
        dict(vec![("$classname", Value::Text("NSDictionary".into()))]),
    ];
    let top = archive_with(objects, vec![("root", Value::Uid(1))]);
    let archive = KeyedArchive::from_value(&top).expect("valid archive");

    let report = inspect(&archive);
    assert_eq!(report.archiver.as_deref(), Some("NSKeyedArchiver"));
    assert_eq!(report.version, Some(100_000));
    assert_eq!(report.object_count, 4);
    assert_eq!(report.roots, ["root"]);
    assert_eq!(report.classes.len(), 1);
    assert_eq!(report.classes[0].name, "NSDictionary");
    assert_eq!(report.classes[0].count, 2);
}
