//! Cross-module properties of attributes and components

use component_runtime::{
    AttributeSpec, ComponentError, ComponentType, ItemsSpec, Validator, ValidatorRegistry, Value,
};
use component_types::Exposure;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counter(register: impl FnOnce(Arc<dyn Fn() + Send + Sync>)) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&calls);
    register(Arc::new(move || {
        observed.fetch_add(1, Ordering::SeqCst);
    }));
    calls
}

#[test]
fn invalid_accessor_combinations_fail_for_every_owner_kind() {
    for value_type in ["string", "number?", "Movie[]", "any"] {
        let setter_only = ComponentType::builder("Movie")
            .attribute(AttributeSpec::new("x", value_type).setter(|_, _| Ok(())))
            .build();
        assert!(matches!(setter_only, Err(ComponentError::Configuration(_))));

        let class_getter_with_default = ComponentType::builder("Movie")
            .class_attribute(
                AttributeSpec::new("x", value_type)
                    .getter(|_| Ok(Value::Undefined))
                    .default_with(|| Value::Undefined),
            )
            .build();
        assert!(matches!(
            class_getter_with_default,
            Err(ComponentError::Configuration(_))
        ));
    }
}

#[test]
fn title_scenario() {
    let movie_type = ComponentType::builder("Movie")
        .attribute(AttributeSpec::new("title", "string").value("Inception"))
        .build()
        .unwrap();
    let movie = movie_type.instantiate();

    let err = movie.set("title", 123).unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot assign a value of type `number` to the attribute `Movie.title` \
         that has type `string`"
    );
    assert_eq!(movie.get("title").unwrap(), Value::from("Inception"));
}

#[test]
fn arrays_of_referenced_components_do_not_forward_item_changes() {
    let actor_type = ComponentType::builder("Actor")
        .attribute(AttributeSpec::new("name", "string"))
        .build()
        .unwrap();
    let movie_type = ComponentType::builder("Movie")
        .attribute(AttributeSpec::new("actors", "Actor[]").value(Vec::<Value>::new()))
        .build()
        .unwrap();

    let movie = movie_type.instantiate();
    let actor = actor_type.instantiate();
    let calls = counter(|observer| {
        movie.add_observer(move || observer());
    });

    let actors = movie.get("actors").unwrap();
    actors.as_array().unwrap().push(Value::from(actor.clone()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    actor.set("name", "Leonardo").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn embedded_items_in_arrays_forward_changes() {
    let note_type = ComponentType::builder("Note")
        .embedded()
        .attribute(AttributeSpec::new("text", "string"))
        .build()
        .unwrap();
    let movie_type = ComponentType::builder("Movie")
        .attribute(AttributeSpec::new("notes", "Note[]").value(Vec::<Value>::new()))
        .build()
        .unwrap();

    let movie = movie_type.instantiate();
    let note = note_type.instantiate();
    movie
        .get("notes")
        .unwrap()
        .as_array()
        .unwrap()
        .push(Value::from(note.clone()));

    let calls = counter(|observer| {
        movie.add_observer(move || observer());
    });
    note.set("text", "great").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn forked_embedded_components_are_isolated() {
    let address_type = ComponentType::builder("Address")
        .embedded()
        .attribute(AttributeSpec::new("city", "string"))
        .build()
        .unwrap();
    let person_type = ComponentType::builder("Person")
        .attribute(AttributeSpec::new("address", "Address"))
        .build()
        .unwrap();

    let person = person_type.instantiate();
    let address = address_type.instantiate();
    address.set("city", "Paris").unwrap();
    person.set("address", address.clone()).unwrap();

    let fork = person.fork();
    let forked_address = fork.get("address").unwrap().as_component().cloned().unwrap();
    assert!(!forked_address.ptr_eq(&address));
    assert_eq!(forked_address.get("city").unwrap(), Value::from("Paris"));

    forked_address.set("city", "Rome").unwrap();
    assert_eq!(address.get("city").unwrap(), Value::from("Paris"));
}

fn items_spec(flags: &[bool]) -> Option<ItemsSpec> {
    let (first, rest) = flags.split_first()?;
    let mut items = ItemsSpec::new();
    if *first {
        items = items.validator(Validator::max_length(3));
    }
    if let Some(nested) = items_spec(rest) {
        items = items.items(nested);
    }
    Some(items)
}

fn value_type_shape() -> impl Strategy<Value = (String, Vec<bool>, bool)> {
    let base = prop_oneof![
        Just("boolean"),
        Just("number"),
        Just("string"),
        Just("Date"),
        Just("any"),
        Just("Comment"),
    ];
    (
        base,
        any::<bool>(),
        prop::collection::vec((any::<bool>(), any::<bool>()), 0..3),
        any::<bool>(),
    )
        .prop_map(|(base, optional, levels, validators)| {
            let mut text = base.to_string();
            if optional {
                text.push('?');
            }
            for (level_optional, _) in &levels {
                text.push_str("[]");
                if *level_optional {
                    text.push('?');
                }
            }
            let item_flags = levels.iter().map(|(_, flag)| *flag).collect();
            (text, item_flags, validators)
        })
}

proptest! {
    #[test]
    fn introspection_round_trips((value_type, item_flags, validators) in value_type_shape()) {
        let mut spec =
            AttributeSpec::new("field", value_type.as_str()).exposure(Exposure::read_write());
        if validators {
            spec = spec.validator(Validator::not_empty()).validator(Validator::range(1.0, 5.0));
        }
        if let Some(items) = items_spec(&item_flags) {
            spec = spec.items(items);
        }

        let original = ComponentType::builder("Holder").attribute(spec).build().unwrap();
        let descriptor = original.introspect().unwrap();

        let registry = ValidatorRegistry::with_builtins();
        let rebuilt = ComponentType::unintrospect(&descriptor, &registry).unwrap();
        prop_assert_eq!(rebuilt.introspect().unwrap(), descriptor);
    }
}
