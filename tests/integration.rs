use soia::registry::init_module;
use soia::schema::{
    constant, enum_def, field, field_with_mutable_getter, method, struct_def,
    struct_def_with_removed, value_variant, Module, RecordDef, TypeTerm,
};
use soia::serializer::{publish, Serializer};
use soia::value::{MutableValue, Value};

fn user_module() -> Module {
    Module {
        records: vec![
            RecordDef::Struct(struct_def(
                "example.User",
                vec![
                    field(1, "id", TypeTerm::Int64),
                    field(2, "name", TypeTerm::String),
                    field(3, "friends", TypeTerm::Array(Box::new(TypeTerm::Record("example.User".to_string())), Some(vec!["id".to_string()]))),
                    field(4, "status", TypeTerm::Record("example.Status".to_string())),
                ],
            )),
            RecordDef::Enum(enum_def(
                "example.Status",
                vec![constant(0, "?"), constant(1, "ACTIVE"), constant(2, "BANNED")],
                vec![value_variant(3, "SUSPENDED_FOR_DAYS", TypeTerm::Int32)],
            )),
        ],
        methods: vec![method(
            "GetUser",
            1,
            TypeTerm::Int64,
            TypeTerm::Record("example.User".to_string()),
        )],
        constants: vec![],
    }
}

#[test]
fn struct_with_keyed_recursive_array_and_enum_field_roundtrips_binary() {
    let initialized = init_module(&user_module()).unwrap();
    let user_adapter = initialized.registry.get_struct("example.User").unwrap();
    let status_adapter = initialized.registry.get_enum("example.Status").unwrap();

    let mut alice = user_adapter.new_mutable();
    alice.set("id", Value::Int64(1)).unwrap();
    alice.set("name", Value::String(std::sync::Arc::from("Alice"))).unwrap();
    alice
        .set("status", status_adapter.constant("ACTIVE").unwrap())
        .unwrap();

    let mut bob = user_adapter.new_mutable();
    bob.set("id", Value::Int64(2)).unwrap();
    bob.set("name", Value::String(std::sync::Arc::from("Bob"))).unwrap();
    bob.set(
        "status",
        status_adapter.value_variant("SUSPENDED_FOR_DAYS", Value::Int32(3)).unwrap(),
    )
    .unwrap();

    let bob_frozen = bob.to_frozen();
    alice
        .set(
            "friends",
            Value::Array(soia::array::FrozenArray::new(vec![bob_frozen.clone()], None)),
        )
        .unwrap();
    let alice_frozen = alice.to_frozen();

    let serializer = Serializer::new(user_adapter.clone());
    let bytes = serializer.to_bytes(&alice_frozen);
    let decoded = serializer.from_bytes(&bytes).unwrap();
    assert_eq!(decoded, alice_frozen);

    // Keyed lookup on the array field resolves Bob by id without a linear
    // scan the caller has to write themselves.
    if let Value::Array(friends) = decoded.get_attribute("friends").unwrap() {
        let found = friends.get_by_key(&soia::value::KeyValue::Int64(2)).unwrap();
        assert_eq!(found.get_attribute("name"), Some(Value::String(std::sync::Arc::from("Bob"))));
    } else {
        panic!("expected an array");
    }
}

#[test]
fn default_fields_are_elided_and_restored() {
    let initialized = init_module(&user_module()).unwrap();
    let user_adapter = initialized.registry.get_struct("example.User").unwrap();

    let mut user = user_adapter.new_mutable();
    user.set("id", Value::Int64(42)).unwrap();
    let frozen = user.to_frozen();

    let serializer = Serializer::new(user_adapter);
    let bytes = serializer.to_bytes(&frozen);
    // Only `id` (field 1) is non-default, so the wire array should be
    // exactly one element long: header byte + one encoded int64.
    assert_eq!(bytes.len(), 2);

    let decoded = serializer.from_bytes(&bytes).unwrap();
    assert_eq!(decoded.get_attribute("name"), Some(Value::String(std::sync::Arc::from(""))));
}

#[test]
fn json_roundtrips_in_both_flavors() {
    let initialized = init_module(&user_module()).unwrap();
    let user_adapter = initialized.registry.get_struct("example.User").unwrap();
    let status_adapter = initialized.registry.get_enum("example.Status").unwrap();

    let mut user = user_adapter.new_mutable();
    user.set("id", Value::Int64(7)).unwrap();
    user.set("name", Value::String(std::sync::Arc::from("Carol"))).unwrap();
    user.set("status", status_adapter.constant("BANNED").unwrap()).unwrap();
    let frozen = user.to_frozen();

    let serializer = Serializer::new(user_adapter);
    let dense = serializer.to_json(&frozen);
    assert_eq!(serializer.from_json(&dense).unwrap(), frozen);

    let readable = serializer.to_readable_json(&frozen);
    assert!(readable.is_object());
    assert_eq!(serializer.from_json(&readable).unwrap(), frozen);
}

#[test]
fn finalize_is_idempotent_across_repeated_init() {
    let module = user_module();
    let first = init_module(&module).unwrap();
    let second = init_module(&module).unwrap();
    assert!(first.registry.get_struct("example.User").is_some());
    assert!(second.registry.get_struct("example.User").is_some());
}

#[test]
fn methods_resolve_to_callable_serializers() {
    let initialized = init_module(&user_module()).unwrap();
    let (_, methods, _) = publish(initialized);
    let get_user = methods.iter().find(|m| m.name == "GetUser").unwrap();
    let request_bytes = get_user.request.to_bytes(&Value::Int64(5));
    assert_eq!(get_user.request.from_bytes(&request_bytes).unwrap(), Value::Int64(5));
}

#[test]
fn empty_arrays_always_encode_to_the_same_single_byte() {
    let initialized = init_module(&user_module()).unwrap();
    let user_adapter = initialized.registry.get_struct("example.User").unwrap();
    let mut a = user_adapter.new_mutable();
    a.set("id", Value::Int64(1)).unwrap();
    a.set("friends", Value::Array(soia::array::FrozenArray::new(vec![], None))).unwrap();
    let mut b = user_adapter.new_mutable();
    b.set("id", Value::Int64(1)).unwrap();
    let serializer = Serializer::new(user_adapter);
    assert_eq!(serializer.to_bytes(&a.to_frozen()), serializer.to_bytes(&b.to_frozen()));
}

#[test]
fn default_empty_arrays_share_one_process_lifetime_instance() {
    let initialized = init_module(&user_module()).unwrap();
    let user_adapter = initialized.registry.get_struct("example.User").unwrap();

    let mut alice = user_adapter.new_mutable();
    alice.set("id", Value::Int64(1)).unwrap();
    let mut bob = user_adapter.new_mutable();
    bob.set("id", Value::Int64(2)).unwrap();

    let alice_frozen = alice.to_frozen();
    let bob_frozen = bob.to_frozen();
    let (Some(Value::Array(a)), Some(Value::Array(b))) = (
        alice_frozen.get_attribute("friends"),
        bob_frozen.get_attribute("friends"),
    ) else {
        panic!("expected array attributes");
    };
    assert!(a.is_same_instance(&b));
}

#[test]
fn readable_json_elides_default_fields() {
    let initialized = init_module(&user_module()).unwrap();
    let user_adapter = initialized.registry.get_struct("example.User").unwrap();

    let mut user = user_adapter.new_mutable();
    user.set("id", Value::Int64(9)).unwrap();
    let frozen = user.to_frozen();

    let serializer = Serializer::new(user_adapter);
    let readable = serializer.to_readable_json(&frozen);
    let obj = readable.as_object().unwrap();
    assert!(obj.contains_key("id"));
    assert!(!obj.contains_key("name"), "default `name` should be elided");
    assert!(!obj.contains_key("friends"), "default `friends` should be elided");
    assert!(!obj.contains_key("status"), "default `status` should be elided");
}

#[test]
fn mutable_getter_lazily_upgrades_a_nested_array_field() {
    let module = Module {
        records: vec![RecordDef::Struct(struct_def(
            "example.Team",
            vec![field_with_mutable_getter(
                1,
                "members",
                TypeTerm::Array(Box::new(TypeTerm::String), None),
            )],
        ))],
        methods: vec![],
        constants: vec![],
    };
    let initialized = init_module(&module).unwrap();
    let team_adapter = initialized.registry.get_struct("example.Team").unwrap();

    let mut team = team_adapter.new_mutable();
    {
        let members = team.mutable("members").unwrap();
        let soia::record::struct_::MutableRef::Array(items) = members else {
            panic!("expected an array getter")
        };
        items.push(MutableValue::Frozen(Value::String(std::sync::Arc::from("alice"))));
    }
    let frozen = team.to_frozen();
    if let Some(Value::Array(members)) = frozen.get_attribute("members") {
        assert_eq!(members.items(), &[Value::String(std::sync::Arc::from("alice"))]);
    } else {
        panic!("expected an array");
    }
}

#[test]
fn removed_field_slot_round_trips_in_binary_and_dense_json() {
    // Point{x: float32#0, y: float32#2, removed: {1}}; x=1.5, y=2.5.
    let module = Module {
        records: vec![RecordDef::Struct(struct_def_with_removed(
            "example.Point",
            vec![field(0, "x", TypeTerm::Float32), field(2, "y", TypeTerm::Float32)],
            vec![1],
        ))],
        methods: vec![],
        constants: vec![],
    };
    let initialized = init_module(&module).unwrap();
    let point_adapter = initialized.registry.get_struct("example.Point").unwrap();

    let mut point = point_adapter.new_mutable();
    point.set("x", Value::Float32(1.5)).unwrap();
    point.set("y", Value::Float32(2.5)).unwrap();
    let frozen = point.to_frozen();

    let serializer = Serializer::new(point_adapter);
    let dense = serializer.to_json(&frozen);
    assert_eq!(dense, serde_json::json!([1.5, 0, 2.5]));
    let readable = serializer.to_readable_json(&frozen);
    assert_eq!(readable, serde_json::json!({"x": 1.5, "y": 2.5}));

    let bytes = serializer.to_bytes(&frozen);
    assert_eq!(bytes[0], soia::wire::TAG_ARRAY_3);
    assert_eq!(serializer.from_bytes(&bytes).unwrap(), frozen);
    assert_eq!(serializer.from_json(&dense).unwrap(), frozen);
}

#[test]
fn unknown_record_reference_is_rejected_eagerly() {
    let module = Module {
        records: vec![RecordDef::Struct(struct_def(
            "example.Broken",
            vec![field(1, "other", TypeTerm::Record("example.DoesNotExist".to_string()))],
        ))],
        methods: vec![],
        constants: vec![],
    };
    assert!(init_module(&module).is_err());
}
