//! End-to-end layer scenarios over the in-memory store

use async_trait::async_trait;
use component_runtime::{AttributeSpec, ComponentRegistry, ComponentType, Validator, Value};
use component_types::FieldMask;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use storable_runtime::{
    Component, DeleteOptions, FindOptions, GetOptions, Layer, StorableConfig, StorableError,
    StorableHooks, StorableResult,
};
use storable_store::{Document, MemoryStore, StoreDriver};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("storable_runtime=debug")
        .with_test_writer()
        .try_init();
}

fn registry() -> ComponentRegistry {
    let registry = ComponentRegistry::new();
    registry
        .register(
            ComponentType::builder("Note")
                .embedded()
                .attribute(AttributeSpec::new("text", "string"))
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            ComponentType::builder("Director")
                .attribute(AttributeSpec::new("id", "string"))
                .attribute(AttributeSpec::new("name", "string"))
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            ComponentType::builder("Movie")
                .attribute(AttributeSpec::new("id", "string"))
                .attribute(AttributeSpec::new("title", "string").validator(Validator::not_empty()))
                .attribute(AttributeSpec::new("year", "number?"))
                .attribute(AttributeSpec::new("genre", "string").default("drama"))
                .attribute(AttributeSpec::new("director", "Director?"))
                .attribute(AttributeSpec::new("notes", "Note[]").default(Vec::<Value>::new()))
                .attribute(AttributeSpec::new("draft", "string?").transient())
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            ComponentType::builder("Settings")
                .attribute(AttributeSpec::new("theme", "string"))
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
}

fn document(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert(
            "Movie",
            document(json!({"id": "m1", "title": "Inception", "year": 2010, "genre": "thriller"})),
        )
        .unwrap();
    store
        .insert(
            "Movie",
            document(json!({
                "id": "m2",
                "title": "Memento",
                "year": 2000,
                "genre": "thriller",
                "director": {"__component": "Director", "id": "d1"}
            })),
        )
        .unwrap();
    store
        .insert("Movie", document(json!({"id": "m3", "title": "Amélie", "genre": "comedy"})))
        .unwrap();
    store
        .insert("Director", document(json!({"id": "d1", "name": "Christopher Nolan"})))
        .unwrap();
    store
}

fn layer(store: &Arc<MemoryStore>) -> Layer {
    Layer::new(Arc::clone(store) as Arc<dyn StoreDriver>, registry())
}

fn fields(names: &[&str]) -> FieldMask {
    names.iter().copied().collect()
}

#[tokio::test]
async fn same_layer_returns_the_same_instance() {
    init_tracing();
    let store = seeded_store();
    let layer = layer(&store);

    let first = layer.get("Movie", "m1", GetOptions::new()).await.unwrap();
    let second = layer.get("Movie", "m1", GetOptions::new()).await.unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(store.stats().gets, 1);
    assert!(layer.is_loaded("Movie", "m1"));
    assert_eq!(layer.loaded_count(), 1);

    let fork = layer.fork();
    assert_eq!(fork.parent_id(), Some(layer.id()));
    let other = fork.get("Movie", "m1", GetOptions::new()).await.unwrap();
    assert!(!other.ptr_eq(&first));
    assert!(!fork.is_loaded("Movie", "m2"));
}

#[tokio::test]
async fn partial_loads_merge_monotonically() {
    init_tracing();
    let store = seeded_store();
    let layer = layer(&store);

    let movie = layer
        .get("Movie", "m1", GetOptions::new().fields(fields(&["title"])))
        .await
        .unwrap();
    assert_eq!(movie.active_fields(), fields(&["id", "title"]));
    assert!(!movie.is_new());

    movie.set("title", "Inception (local)").unwrap();
    let again = layer
        .get("Movie", "m1", GetOptions::new().fields(fields(&["title", "year"])))
        .await
        .unwrap();
    assert!(again.ptr_eq(&movie));
    assert_eq!(movie.get("title").unwrap(), Value::from("Inception (local)"));
    assert_eq!(movie.get("year").unwrap(), Value::from(2010));
    assert_eq!(movie.active_fields(), fields(&["id", "title", "year"]));
}

#[tokio::test]
async fn missing_store_fields_are_still_activated() {
    let store = seeded_store();
    let layer = layer(&store);

    let movie = layer.get("Movie", "m3", GetOptions::new()).await.unwrap();
    assert!(movie.is_field_active("year"));
    assert!(movie.is_field_active("director"));
    assert_eq!(
        movie.get_with("year", Default::default()).unwrap_or(Value::Undefined),
        Value::Undefined
    );
    assert!(!movie.is_field_active("draft"));
}

#[tokio::test]
async fn referenced_components_resolve_through_the_identity_map() {
    let store = seeded_store();
    let layer = layer(&store);

    let movie = layer.get("Movie", "m2", GetOptions::new()).await.unwrap();
    let director = movie.get("director").unwrap().as_component().cloned().unwrap();
    assert!(layer.is_loaded("Director", "d1"));
    assert_eq!(director.active_fields(), fields(&["id"]));

    let loaded = layer.get("Director", "d1", GetOptions::new()).await.unwrap();
    assert!(loaded.ptr_eq(&director));
    assert_eq!(director.get("name").unwrap(), Value::from("Christopher Nolan"));
}

#[tokio::test]
async fn create_and_save_new_components() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let layer = layer(&store);

    let movie = layer.create("Movie").unwrap();
    assert!(movie.is_new());
    assert_eq!(movie.get("genre").unwrap(), Value::from("drama"));
    movie.set("title", "Tenet").unwrap();
    movie.set("draft", "unsaved notes").unwrap();
    layer.save(&movie).await.unwrap();

    let id = movie.id().unwrap().unwrap();
    assert!(!movie.is_new());
    assert!(layer.is_loaded("Movie", &id));
    let stored = store.document("Movie", &id).unwrap();
    assert_eq!(
        serde_json::Value::Object(stored),
        json!({"id": id, "title": "Tenet", "genre": "drama", "notes": []})
    );
}

#[tokio::test]
async fn saving_an_existing_component_writes_active_fields_only() {
    let store = seeded_store();
    let layer = layer(&store);

    let movie = layer
        .get("Movie", "m1", GetOptions::new().fields(fields(&["title"])))
        .await
        .unwrap();
    movie.set("title", "Inception (2010)").unwrap();
    layer.save(&movie).await.unwrap();

    assert_eq!(
        serde_json::Value::Object(store.document("Movie", "m1").unwrap()),
        json!({"id": "m1", "title": "Inception (2010)", "year": 2010, "genre": "thriller"})
    );
}

#[tokio::test]
async fn embedded_components_are_saved_inline() {
    let store = Arc::new(MemoryStore::new());
    let layer = layer(&store);
    let registry = layer.registry().clone();

    let movie = layer.create("Movie").unwrap();
    movie.set("title", "Heat").unwrap();
    let note = registry.get("Note").unwrap().instantiate();
    note.set("text", "classic").unwrap();
    movie.get("notes").unwrap().as_array().unwrap().push(Value::from(note));
    layer.save(&movie).await.unwrap();

    let id = movie.id().unwrap().unwrap();
    let stored = store.document("Movie", &id).unwrap();
    assert_eq!(stored["notes"], json!([{"__component": "Note", "text": "classic"}]));

    let fresh = layer.fork().get("Movie", &id, GetOptions::new()).await.unwrap();
    let notes = fresh.get("notes").unwrap();
    let loaded_note = notes.as_array().unwrap().get(0).unwrap();
    let loaded_note = loaded_note.as_component().unwrap();
    assert_eq!(loaded_note.get("text").unwrap(), Value::from("classic"));
    assert!(!loaded_note.is_new());
}

#[tokio::test]
async fn save_validates_when_configured() {
    let store = Arc::new(MemoryStore::new());
    let layer = layer(&store);

    let movie = layer.create("Movie").unwrap();
    movie.set("title", "").unwrap();
    let err = layer.save(&movie).await.unwrap_err();
    assert!(matches!(err, StorableError::Component(_)));
    assert_eq!(store.count("Movie"), 0);
    assert!(movie.is_new());

    let lenient = Layer::with_config(
        Arc::clone(&store) as Arc<dyn StoreDriver>,
        registry(),
        StorableConfig {
            validate_on_save: false,
            ..StorableConfig::default()
        },
    );
    let movie = lenient.create("Movie").unwrap();
    movie.set("title", "").unwrap();
    lenient.save(&movie).await.unwrap();
    assert_eq!(store.count("Movie"), 1);
}

#[tokio::test]
async fn conflicting_instances_cannot_be_saved() {
    let store = seeded_store();
    let layer = layer(&store);
    layer.get("Movie", "m1", GetOptions::new()).await.unwrap();

    let impostor = layer.registry().get("Movie").unwrap().instantiate();
    impostor.set("id", "m1").unwrap();
    impostor.set("title", "Not Inception").unwrap();
    let err = layer.save(&impostor).await.unwrap_err();
    assert!(matches!(err, StorableError::IdentityConflict { .. }));
    assert_eq!(store.document("Movie", "m1").unwrap()["title"], json!("Inception"));
}

#[tokio::test]
async fn delete_then_get() {
    init_tracing();
    let store = seeded_store();
    let layer = layer(&store);

    let movie = layer.get("Movie", "m1", GetOptions::new()).await.unwrap();
    layer.delete(&movie, DeleteOptions::default()).await.unwrap();
    assert!(!layer.is_loaded("Movie", "m1"));
    assert!(movie.is_new());
    assert!(movie.active_fields().is_empty());

    let err = layer.get("Movie", "m1", GetOptions::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "cannot find a `Movie` with id `m1`");

    let placeholder = layer
        .get("Movie", "m1", GetOptions::new().throw_if_not_found(false))
        .await
        .unwrap();
    assert_eq!(placeholder.id().unwrap().as_deref(), Some("m1"));
    assert!(placeholder.active_fields().is_empty());
    assert!(!layer.is_loaded("Movie", "m1"));

    let err = layer.delete(&movie, DeleteOptions::default()).await.unwrap_err();
    assert!(matches!(err, StorableError::NotFound { .. }));
    layer
        .delete(&movie, DeleteOptions { throw_if_missing: false })
        .await
        .unwrap();
}

#[tokio::test]
async fn find_keeps_store_order_and_identity() {
    let store = seeded_store();
    let layer = layer(&store);

    let loaded = layer.get("Movie", "m2", GetOptions::new()).await.unwrap();
    let thrillers = layer
        .find("Movie", FindOptions::new().filter("genre", "thriller"))
        .await
        .unwrap();
    let ids: Vec<String> = thrillers.iter().map(|m| m.id().unwrap().unwrap()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
    assert!(thrillers[1].ptr_eq(&loaded));

    let page = layer
        .find("Movie", FindOptions::new().skip(1).limit(1).fields(fields(&["title"])))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id().unwrap().as_deref(), Some("m2"));
}

#[tokio::test]
async fn find_limits_are_capped_by_config() {
    let store = seeded_store();
    let layer = Layer::with_config(
        Arc::clone(&store) as Arc<dyn StoreDriver>,
        registry(),
        StorableConfig {
            max_find_limit: Some(2),
            ..StorableConfig::default()
        },
    );
    let movies = layer.find("Movie", FindOptions::new().limit(10)).await.unwrap();
    assert_eq!(movies.len(), 2);
}

#[tokio::test]
async fn non_storable_types_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let layer = layer(&store);
    assert!(matches!(layer.create("Settings"), Err(StorableError::NotStorable(_))));
    assert!(matches!(
        layer.get("Unknown", "x", GetOptions::new()).await,
        Err(StorableError::Component(_))
    ));
}

struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl StorableHooks for Recorder {
    async fn before_save(&self, component: &Component, _layer: &Layer) -> StorableResult<()> {
        self.events.lock().unwrap().push(format!("before_save {}", component.type_name()));
        Ok(())
    }

    async fn after_save(&self, component: &Component, _layer: &Layer) -> StorableResult<()> {
        self.events.lock().unwrap().push(format!("after_save {}", component.type_name()));
        Ok(())
    }

    async fn after_load(&self, component: &Component, _layer: &Layer) -> StorableResult<()> {
        self.events.lock().unwrap().push(format!("after_load {}", component.type_name()));
        Ok(())
    }

    async fn before_delete(&self, component: &Component, _layer: &Layer) -> StorableResult<()> {
        if component.get("title")? == Value::from("Protected") {
            return Err(StorableError::Hook("protected movies cannot be deleted".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn hooks_run_for_the_component_and_its_embedded_values() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let layer = layer(&store);
    let events = Arc::new(Mutex::new(Vec::new()));
    for name in ["Movie", "Note"] {
        layer.register_hooks(
            name,
            Arc::new(Recorder {
                events: Arc::clone(&events),
            }),
        );
    }

    let movie = layer.create("Movie").unwrap();
    movie.set("title", "Protected").unwrap();
    let note = layer.registry().get("Note").unwrap().instantiate();
    note.set("text", "keep").unwrap();
    movie.get("notes").unwrap().as_array().unwrap().push(Value::from(note));
    layer.save(&movie).await.unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["before_save Movie", "before_save Note", "after_save Movie", "after_save Note"]
    );

    let err = layer.delete(&movie, DeleteOptions::default()).await.unwrap_err();
    assert!(matches!(err, StorableError::Hook(_)));
    assert_eq!(store.count("Movie"), 1);

    events.lock().unwrap().clear();
    let id = movie.id().unwrap().unwrap();
    layer.fork().get("Movie", &id, GetOptions::new()).await.unwrap();
    assert_eq!(*events.lock().unwrap(), vec!["after_load Movie", "after_load Note"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_gets_share_one_instance() {
    let store = seeded_store();
    let layer = layer(&store);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let layer = layer.clone();
            tokio::spawn(async move { layer.get("Movie", "m1", GetOptions::new()).await.unwrap() })
        })
        .collect();

    let mut instances = Vec::new();
    for task in tasks {
        instances.push(task.await.unwrap());
    }
    assert!(instances.iter().all(|movie| movie.ptr_eq(&instances[0])));
    assert_eq!(store.stats().gets, 1);
    assert_eq!(layer.identity_map().lock_count(), 0);
}

#[tokio::test]
async fn loaded_fields_notify_observers_once_per_write() {
    let store = seeded_store();
    let layer = layer(&store);
    let movie = layer
        .get("Movie", "m1", GetOptions::new().fields(fields(&["title"])))
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&calls);
    movie.add_observer(move || {
        observed.fetch_add(1, Ordering::SeqCst);
    });
    layer
        .get("Movie", "m1", GetOptions::new().fields(fields(&["year"])))
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

fn shipping_registry() -> ComponentRegistry {
    let registry = ComponentRegistry::new();
    registry
        .register(
            ComponentType::builder("Address")
                .embedded()
                .attribute(AttributeSpec::new("id", "string"))
                .attribute(AttributeSpec::new("city", "string"))
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            ComponentType::builder("Movie")
                .attribute(AttributeSpec::new("id", "string"))
                .attribute(AttributeSpec::new("title", "string").value("Untitled"))
                .attribute(AttributeSpec::new("address", "Address?"))
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
}

#[tokio::test]
async fn embedded_values_with_ids_stay_owned_by_their_holder() {
    let store = Arc::new(MemoryStore::new());
    for (id, city) in [("m1", "Paris"), ("m2", "Rome")] {
        store
            .insert(
                "Movie",
                document(json!({
                    "id": id,
                    "title": "Shot on location",
                    "address": {"__component": "Address", "id": "a1", "city": city}
                })),
            )
            .unwrap();
    }
    let layer = Layer::new(Arc::clone(&store) as Arc<dyn StoreDriver>, shipping_registry());

    let first = layer.get("Movie", "m1", GetOptions::new()).await.unwrap();
    let second = layer.get("Movie", "m2", GetOptions::new()).await.unwrap();
    let first_address = first.get("address").unwrap().as_component().cloned().unwrap();
    let second_address = second.get("address").unwrap().as_component().cloned().unwrap();

    assert!(!first_address.ptr_eq(&second_address));
    assert_eq!(first_address.get("city").unwrap(), Value::from("Paris"));
    assert_eq!(second_address.get("city").unwrap(), Value::from("Rome"));
    assert!(!layer.is_loaded("Address", "a1"));
    assert_eq!(layer.loaded_count(), 2);

    let calls = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&calls);
    first.add_observer(move || {
        observed.fetch_add(1, Ordering::SeqCst);
    });
    first_address.set("city", "Lyon").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(matches!(layer.create("Address"), Err(StorableError::NotStorable(_))));
    assert!(matches!(
        layer.get("Address", "a1", GetOptions::new()).await,
        Err(StorableError::NotStorable(_))
    ));
}

#[tokio::test]
async fn placeholders_know_only_their_id() {
    let store = Arc::new(MemoryStore::new());
    let layer = Layer::new(Arc::clone(&store) as Arc<dyn StoreDriver>, shipping_registry());

    let placeholder = layer
        .get("Movie", "movie1", GetOptions::new().throw_if_not_found(false))
        .await
        .unwrap();
    assert_eq!(placeholder.id().unwrap().as_deref(), Some("movie1"));
    assert!(!placeholder.attribute("title").unwrap().is_set());
    assert!(!placeholder.attribute("address").unwrap().is_set());
    assert!(placeholder.active_fields().is_empty());
    assert!(placeholder.is_new());

    let fresh = layer.create("Movie").unwrap();
    assert_eq!(fresh.get("title").unwrap(), Value::from("Untitled"));
}
