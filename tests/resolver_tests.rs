//! Resolution semantics: reference chasing, class conversion, cycle and
//! depth guards, and the null/key normalizations.

use unkeyed::{
    CommonObjects, Diagnostic, Plain, ResolveOptions, Resolver, UnkeyedError, Value,
};

fn dict(entries: Vec<(&str, Value)>) -> Value {
    Value::Dict(
        entries
            .into_iter()
            .map(|(k, v)| (Value::Text(k.to_string()), v))
            .collect(),
    )
}

fn resolve(table: &[Value], value: &Value) -> (Result<Plain, UnkeyedError>, Vec<Diagnostic>) {
    let converter = CommonObjects;
    let resolver = Resolver::new(table, &converter, &ResolveOptions::default());
    resolver.resolve_root(value)
}

/// An archived dictionary: parallel key/object arrays behind references.
#[test]
fn ordered_collection_resolves_to_map() {
    let table = vec![
        Value::Text("$null".into()),
        dict(vec![
            ("$class", Value::Uid(5)),
            ("NS.keys", Value::Uid(2)),
            ("NS.objects", Value::Uid(3)),
        ]),
        Value::Array(vec![Value::Uid(4)]),
        Value::Array(vec![Value::Int(2)]),
        Value::Text("k".into()),
        dict(vec![("$classname", Value::Text("NSDictionary".into()))]),
    ];

    let (result, diagnostics) = resolve(&table, &Value::Uid(1));
    assert_eq!(
        result.expect("root should resolve"),
        Plain::Dict(vec![("k".into(), Plain::Int(2))])
    );
    assert!(diagnostics.is_empty());
}

#[test]
fn archived_array_and_string_unwrap() {
    let table = vec![
        Value::Text("$null".into()),
        dict(vec![
            ("$class", Value::Uid(3)),
            ("NS.objects", Value::Array(vec![Value::Uid(2), Value::Int(7)])),
        ]),
        dict(vec![
            ("$class", Value::Uid(4)),
            ("NS.string", Value::Text("hello".into())),
        ]),
        dict(vec![("$classname", Value::Text("NSMutableArray".into()))]),
        dict(vec![("$classname", Value::Text("NSMutableString".into()))]),
    ];

    let (result, _) = resolve(&table, &Value::Uid(1));
    assert_eq!(
        result.expect("root should resolve"),
        Plain::Array(vec![Plain::Text("hello".into()), Plain::Int(7)])
    );
}

#[test]
fn unknown_class_traverses_generically() {
    let table = vec![
        dict(vec![
            ("$class", Value::Uid(1)),
            ("custom", Value::Uid(2)),
        ]),
        dict(vec![("$classname", Value::Text("MyCustomThing".into()))]),
        Value::Text("payload".into()),
    ];

    let (result, _) = resolve(&table, &Value::Uid(0));
    // $class is dropped, the custom field is chased through the table.
    assert_eq!(
        result.expect("root should resolve"),
        Plain::Dict(vec![("custom".into(), Plain::Text("payload".into()))])
    );
}

#[test]
fn out_of_range_reference_fails() {
    let table = vec![Value::Text("$null".into())];
    let (result, _) = resolve(&table, &Value::Uid(99));
    match result {
        Err(UnkeyedError::UnresolvedReference { index: 99 }) => {}
        other => panic!("expected UnresolvedReference, got {other:?}"),
    }
}

#[test]
fn two_entry_cycle_is_detected() {
    let table = vec![
        dict(vec![("next", Value::Uid(1))]),
        dict(vec![("back", Value::Uid(0))]),
    ];
    let (result, _) = resolve(&table, &Value::Uid(0));
    match result {
        Err(UnkeyedError::CyclicReference { index: 0 }) => {}
        other => panic!("expected CyclicReference, got {other:?}"),
    }
}

#[test]
fn sibling_branches_may_share_an_entry() {
    let table = vec![Value::Text("shared".into())];
    let (result, _) = resolve(&table, &Value::Array(vec![Value::Uid(0), Value::Uid(0)]));
    assert_eq!(
        result.expect("shared entry is not a cycle"),
        Plain::Array(vec![
            Plain::Text("shared".into()),
            Plain::Text("shared".into())
        ])
    );
}

#[test]
fn acyclic_chain_hits_depth_ceiling() {
    // 0 -> 1 -> 2 -> ... -> 9 -> text, deeper than the configured ceiling.
    let mut table: Vec<Value> = (1..10).map(Value::Uid).collect();
    table.push(Value::Text("end".into()));

    let converter = CommonObjects;
    let resolver = Resolver::new(&table, &converter, &ResolveOptions { max_depth: 5 });
    let (result, _) = resolver.resolve_root(&Value::Uid(0));
    match result {
        Err(UnkeyedError::RecursionLimit(5)) => {}
        other => panic!("expected RecursionLimit, got {other:?}"),
    }
}

#[test]
fn null_map_value_becomes_empty_text_except_passthrough() {
    let table = vec![Value::Text("$null".into())];
    let root = dict(vec![("name", Value::Uid(0)), ("NS.base", Value::Uid(0))]);

    let (result, diagnostics) = resolve(&table, &root);
    assert_eq!(
        result.expect("root should resolve"),
        Plain::Dict(vec![
            ("name".into(), Plain::Text(String::new())),
            ("NS.base".into(), Plain::Null),
        ])
    );
    assert_eq!(
        diagnostics,
        vec![Diagnostic::NullCoerced {
            key: "name".into()
        }]
    );
}

#[test]
fn null_array_element_becomes_empty_text() {
    let table = vec![Value::Text("$null".into())];
    let (result, _) = resolve(&table, &Value::Array(vec![Value::Uid(0)]));
    assert_eq!(
        result.expect("root should resolve"),
        Plain::Array(vec![Plain::Text(String::new())])
    );
}

#[test]
fn top_level_null_is_preserved() {
    let table = vec![Value::Text("$null".into())];
    let (result, _) = resolve(&table, &Value::Uid(0));
    assert_eq!(result.expect("root should resolve"), Plain::Null);
}

#[test]
fn non_text_key_is_rendered_with_diagnostic() {
    let root = Value::Dict(vec![(Value::Int(5), Value::Text("five".into()))]);
    let (result, diagnostics) = resolve(&[], &root);
    assert_eq!(
        result.expect("root should resolve"),
        Plain::Dict(vec![("5".into(), Plain::Text("five".into()))])
    );
    assert_eq!(
        diagnostics,
        vec![Diagnostic::KeyCoerced {
            rendered: "5".into()
        }]
    );
}

#[test]
fn archived_date_and_data_unwrap() {
    let table = vec![
        dict(vec![
            ("$class", Value::Uid(1)),
            ("NS.time", Value::Real(694_224_000.0)),
        ]),
        dict(vec![("$classname", Value::Text("NSDate".into()))]),
        dict(vec![
            ("$class", Value::Uid(3)),
            ("NS.data", Value::Bytes(vec![1, 2, 3])),
        ]),
        dict(vec![("$classname", Value::Text("NSData".into()))]),
    ];

    let (date, _) = resolve(&table, &Value::Uid(0));
    assert_eq!(date.expect("date resolves"), Plain::Date(694_224_000.0));

    let (data, _) = resolve(&table, &Value::Uid(2));
    assert_eq!(data.expect("data resolves"), Plain::Bytes(vec![1, 2, 3]));
}
