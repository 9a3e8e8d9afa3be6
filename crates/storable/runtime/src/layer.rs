//! Layers: identity-scoped views over a store
//!
//! A [`Layer`] owns an identity map and mediates every load and save between
//! live components and a [`StoreDriver`]. Forking a layer gives a fresh
//! identity scope over the same store, registry, hooks and configuration.

use crate::config::StorableConfig;
use crate::errors::{StorableError, StorableResult};
use crate::hooks::{HookEvent, StorableHooks};
use crate::identity_map::{IdentityKey, IdentityMap};
use component_runtime::{
    deserialize_into, serialize, Component, ComponentFactory, ComponentRegistry, ComponentResult,
    ComponentType, DeserializeOptions, GetValueOptions, SerializeOptions, Value,
};
use component_types::{wire, FieldMask, ValueSource};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use storable_store::{project, Document, Query, StoreDriver};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GetOptions {
    /// Fields to load; all storable fields when absent
    pub fields: Option<FieldMask>,
    pub throw_if_not_found: bool,
}

impl GetOptions {
    pub fn new() -> Self {
        Self {
            fields: None,
            throw_if_not_found: true,
        }
    }

    pub fn fields(mut self, fields: FieldMask) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn throw_if_not_found(mut self, throw: bool) -> Self {
        self.throw_if_not_found = throw;
        self
    }
}

impl Default for GetOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub filter: Document,
    pub skip: usize,
    pub limit: Option<usize>,
    pub fields: Option<FieldMask>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn fields(mut self, fields: FieldMask) -> Self {
        self.fields = Some(fields);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteOptions {
    pub throw_if_missing: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            throw_if_missing: true,
        }
    }
}

#[derive(Clone)]
pub struct Layer {
    inner: Arc<LayerInner>,
}

struct LayerInner {
    id: Uuid,
    parent_id: Option<Uuid>,
    store: Arc<dyn StoreDriver>,
    registry: ComponentRegistry,
    hooks: Arc<DashMap<String, Arc<dyn StorableHooks>>>,
    identity_map: IdentityMap,
    config: Arc<StorableConfig>,
}

impl Layer {
    pub fn new(store: Arc<dyn StoreDriver>, registry: ComponentRegistry) -> Self {
        Self::with_config(store, registry, StorableConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn StoreDriver>,
        registry: ComponentRegistry,
        config: StorableConfig,
    ) -> Self {
        let layer = Self::build(
            store,
            registry,
            Arc::new(DashMap::new()),
            Arc::new(config),
            None,
        );
        info!(layer = %layer.id(), "storable layer created");
        layer
    }

    fn build(
        store: Arc<dyn StoreDriver>,
        registry: ComponentRegistry,
        hooks: Arc<DashMap<String, Arc<dyn StorableHooks>>>,
        config: Arc<StorableConfig>,
        parent_id: Option<Uuid>,
    ) -> Self {
        Self {
            inner: Arc::new(LayerInner {
                id: Uuid::new_v4(),
                parent_id,
                store,
                registry,
                hooks,
                identity_map: IdentityMap::new(config.release_idle_locks),
                config,
            }),
        }
    }

    /// New identity scope sharing the store, registry, hooks and config
    pub fn fork(&self) -> Layer {
        let inner = &self.inner;
        let forked = Self::build(
            Arc::clone(&inner.store),
            inner.registry.clone(),
            Arc::clone(&inner.hooks),
            Arc::clone(&inner.config),
            Some(inner.id),
        );
        debug!(layer = %forked.id(), parent = %inner.id, "layer forked");
        forked
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.inner.parent_id
    }

    pub fn config(&self) -> &StorableConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    pub fn store(&self) -> &Arc<dyn StoreDriver> {
        &self.inner.store
    }

    /// Hooks apply to this layer, its ancestors and every fork
    pub fn register_hooks(&self, component: impl Into<String>, hooks: Arc<dyn StorableHooks>) {
        self.inner.hooks.insert(component.into(), hooks);
    }

    pub fn is_loaded(&self, component: &str, id: &str) -> bool {
        self.inner.identity_map.contains(&IdentityKey::new(component, id))
    }

    /// The instance this layer holds for an identity, if any
    pub fn loaded(&self, component: &str, id: &str) -> Option<Component> {
        self.inner.identity_map.get(&IdentityKey::new(component, id))
    }

    pub fn loaded_count(&self) -> usize {
        self.inner.identity_map.len()
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.inner.identity_map
    }

    // ── CRUD ─────────────────────────────────────────────────────────

    /// New unsaved instance with its defaults evaluated and a fresh id
    pub fn create(&self, component: &str) -> StorableResult<Component> {
        let component_type = self.storable_type(component)?;
        let instance = component_type.instantiate();
        for attribute in instance.attributes()? {
            if !attribute.is_computed() && !attribute.is_set() {
                attribute.get_value_with(GetValueOptions {
                    throw_if_unset: false,
                })?;
            }
        }
        if instance.id()?.is_none() {
            instance.set(wire::IDENTIFIER, Uuid::new_v4().to_string())?;
        }
        debug!(component, "component created");
        Ok(instance)
    }

    /// Load `fields` of one component. Fields already active on the layer's
    /// instance are kept as they are; only inactive ones are fetched.
    #[instrument(skip(self, options), fields(layer = %self.id()))]
    pub async fn get(
        &self,
        component: &str,
        id: &str,
        options: GetOptions,
    ) -> StorableResult<Component> {
        let component_type = self.storable_type(component)?;
        let target = target_fields(&component_type, options.fields.as_ref());
        let key = IdentityKey::new(component, id);
        let _guard = self.inner.identity_map.lock(&key).await;

        let existing = self.inner.identity_map.get(&key);
        let wanted = match &existing {
            Some(instance) => {
                let missing = instance.inactive_fields(&target);
                if missing.is_empty() {
                    debug!("identity map hit");
                    return Ok(instance.clone());
                }
                missing
            }
            None => target,
        };

        let Some(document) = self.inner.store.get(component, id, Some(&wanted)).await? else {
            if options.throw_if_not_found {
                return Err(StorableError::NotFound {
                    component: component.to_string(),
                    id: id.to_string(),
                });
            }
            return match existing {
                Some(instance) => Ok(instance),
                None => self.placeholder(&component_type, id),
            };
        };

        let instance = match existing {
            Some(instance) => instance,
            None => self
                .inner
                .identity_map
                .get_or_insert_with(key, || loaded_instance(&component_type)),
        };
        self.merge(&instance, document, &wanted).await?;
        self.run_hooks(HookEvent::AfterLoad, &instance).await?;
        debug!(fields = wanted.len(), "component loaded");
        Ok(instance)
    }

    /// Query a collection. Results come back in store order, each resolved
    /// through the identity map.
    #[instrument(skip(self, options), fields(layer = %self.id()))]
    pub async fn find(
        &self,
        component: &str,
        options: FindOptions,
    ) -> StorableResult<Vec<Component>> {
        let component_type = self.storable_type(component)?;
        let target = target_fields(&component_type, options.fields.as_ref());
        let mut query = Query::new().skip(options.skip).fields(target.clone());
        query.filter = options.filter;
        query.limit = self.inner.config.effective_limit(options.limit);

        let documents = self.inner.store.find(component, &query).await?;
        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document
                .get(wire::IDENTIFIER)
                .and_then(JsonValue::as_str)
                .ok_or_else(|| StorableError::MissingIdentifier(component.to_string()))?
                .to_string();
            let key = IdentityKey::new(component, &id);
            let _guard = self.inner.identity_map.lock(&key).await;

            let instance = self
                .inner
                .identity_map
                .get_or_insert_with(key, || loaded_instance(&component_type));
            let wanted = instance.inactive_fields(&target);
            if !wanted.is_empty() {
                self.merge(&instance, project(&document, &wanted), &wanted).await?;
                self.run_hooks(HookEvent::AfterLoad, &instance).await?;
            }
            results.push(instance);
        }
        debug!(results = results.len(), "find complete");
        Ok(results)
    }

    /// Persist a component. New components write every set storable field;
    /// existing ones write only their active storable fields.
    #[instrument(
        skip(self, component),
        fields(layer = %self.id(), component = %component.type_name())
    )]
    pub async fn save(&self, component: &Component) -> StorableResult<()> {
        let name = component.type_name().to_string();
        let component_type = self.storable_type(&name)?;
        let id = component
            .id()?
            .ok_or_else(|| StorableError::MissingIdentifier(name.clone()))?;
        let key = IdentityKey::new(&name, &id);
        let _guard = self.inner.identity_map.lock(&key).await;

        if let Some(existing) = self.inner.identity_map.get(&key) {
            if !existing.ptr_eq(component) {
                warn!(id = %id, "another instance with this identity is loaded");
                return Err(StorableError::IdentityConflict { component: name, id });
            }
        }

        self.run_hooks(HookEvent::BeforeSave, component).await?;
        if self.inner.config.validate_on_save {
            component.validate()?;
        }

        let mut mask = FieldMask::new();
        for field in component_type.storable_attribute_names() {
            let include = if component.is_new() {
                component.attribute(&field)?.is_set()
            } else {
                component.is_field_active(&field)
            };
            if include {
                mask.insert(field);
            }
        }
        mask.insert(wire::IDENTIFIER);

        let options = SerializeOptions::default().with_fields(mask.clone());
        let json = serialize(component, &options).await?;
        let document = to_document(json)?;
        self.inner.store.upsert(&name, &id, &mask, document).await?;

        let was_new = component.is_new();
        component.mark_as_not_new();
        component.activate_fields(&mask)?;
        self.inner.identity_map.register(key, component)?;
        self.run_hooks(HookEvent::AfterSave, component).await?;
        debug!(id = %id, fields = mask.len(), was_new, "component saved");
        Ok(())
    }

    /// Remove a component from the store and evict it from this layer.
    /// Afterwards it has no active fields and counts as new again.
    #[instrument(
        skip(self, component, options),
        fields(layer = %self.id(), component = %component.type_name())
    )]
    pub async fn delete(
        &self,
        component: &Component,
        options: DeleteOptions,
    ) -> StorableResult<()> {
        let name = component.type_name().to_string();
        self.storable_type(&name)?;
        let id = component
            .id()?
            .ok_or_else(|| StorableError::MissingIdentifier(name.clone()))?;
        let key = IdentityKey::new(&name, &id);
        let _guard = self.inner.identity_map.lock(&key).await;

        self.run_hooks(HookEvent::BeforeDelete, component).await?;
        let removed = self.inner.store.remove(&name, &id).await?;
        if !removed && options.throw_if_missing {
            return Err(StorableError::NotFound { component: name, id });
        }

        if self
            .inner
            .identity_map
            .get(&key)
            .is_some_and(|loaded| loaded.ptr_eq(component))
        {
            self.inner.identity_map.remove(&key);
        }
        component.deactivate_all()?;
        component.mark_as_new();
        self.run_hooks(HookEvent::AfterDelete, component).await?;
        debug!(id = %id, removed, "component deleted");
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn storable_type(&self, component: &str) -> StorableResult<ComponentType> {
        let component_type = self.inner.registry.get(component)?;
        if !is_storable(&component_type) {
            return Err(StorableError::NotStorable(component.to_string()));
        }
        Ok(component_type)
    }

    /// Not-found result when the caller opted out of errors: id known, no
    /// fields active, not registered
    fn placeholder(&self, component_type: &ComponentType, id: &str) -> StorableResult<Component> {
        let instance = component_type.instantiate_empty();
        instance.set(wire::IDENTIFIER, id)?;
        instance.deactivate_all()?;
        instance.mark_as_new();
        Ok(instance)
    }

    /// Write store values into inactive fields, then activate every wanted
    /// field, including those the store has no value for
    async fn merge(
        &self,
        instance: &Component,
        document: Document,
        wanted: &FieldMask,
    ) -> StorableResult<()> {
        let options = DeserializeOptions::new(self.inner.registry.clone())
            .with_factory(Arc::new(LayerFactory::new(self.clone())))
            .with_source(ValueSource::STORE)
            .preserve_active(true);
        deserialize_into(instance, &JsonValue::Object(document), &options).await?;
        instance.activate_fields(wanted)?;
        Ok(())
    }

    fn run_hooks<'a>(
        &'a self,
        event: HookEvent,
        component: &'a Component,
    ) -> BoxFuture<'a, StorableResult<()>> {
        async move {
            let hooks = self
                .inner
                .hooks
                .get(component.type_name())
                .map(|entry| Arc::clone(entry.value()));
            if let Some(hooks) = hooks {
                debug!(event = %event, component = %component.type_name(), "running hook");
                event.dispatch(hooks.as_ref(), component, self).await?;
            }
            for embedded in embedded_components(component)? {
                self.run_hooks(event, &embedded).await?;
            }
            Ok(())
        }
        .boxed()
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.inner.id)
            .field("parent_id", &self.inner.parent_id)
            .field("loaded", &self.inner.identity_map.len())
            .finish()
    }
}

/// Resolves component references met while loading through the layer's
/// identity map, so a referenced storable component is shared with direct
/// loads of the same identity
pub struct LayerFactory {
    layer: Layer,
}

impl LayerFactory {
    pub fn new(layer: Layer) -> Self {
        Self { layer }
    }
}

impl ComponentFactory for LayerFactory {
    fn instantiate(
        &self,
        component_type: &ComponentType,
        id: Option<&str>,
        is_new: bool,
    ) -> ComponentResult<Component> {
        match id {
            Some(id) if !is_new && is_storable(component_type) => Ok(self
                .layer
                .identity_map()
                .get_or_insert_with(IdentityKey::new(component_type.name(), id), || {
                    loaded_instance(component_type)
                })),
            _ => {
                let component = component_type.instantiate();
                if !is_new {
                    component.mark_as_not_new();
                }
                Ok(component)
            }
        }
    }
}

/// Storable types have their own collection: an identifier and no
/// embedding in a holder
fn is_storable(component_type: &ComponentType) -> bool {
    component_type.has_attribute(wire::IDENTIFIER) && !component_type.is_embedded()
}

fn loaded_instance(component_type: &ComponentType) -> Component {
    let instance = component_type.instantiate();
    instance.mark_as_not_new();
    instance
}

/// Requested fields (or every storable field) plus the identifier
fn target_fields(component_type: &ComponentType, fields: Option<&FieldMask>) -> FieldMask {
    let mut target = match fields {
        Some(fields) => fields.clone(),
        None => component_type.storable_attribute_names().into_iter().collect(),
    };
    target.insert(wire::IDENTIFIER);
    target
}

/// Store document for a serialized component: top-level markers and unset
/// fields are dropped, nested `__new` flags are cleared
fn to_document(json: JsonValue) -> StorableResult<Document> {
    let JsonValue::Object(mut object) = json else {
        return Err(StorableError::Component(component_runtime::ComponentError::Serialization(
            "serialized component is not an object".to_string(),
        )));
    };
    object.remove(wire::COMPONENT);
    object.remove(wire::NEW);
    object.retain(|_, value| !is_undefined_marker(value));
    for value in object.values_mut() {
        clear_new_flags(value);
    }
    Ok(object)
}

fn is_undefined_marker(value: &JsonValue) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.len() == 1 && object.contains_key(wire::UNDEFINED))
}

fn clear_new_flags(value: &mut JsonValue) {
    match value {
        JsonValue::Object(object) => {
            object.remove(wire::NEW);
            object.values_mut().for_each(clear_new_flags);
        }
        JsonValue::Array(items) => items.iter_mut().for_each(clear_new_flags),
        _ => {}
    }
}

/// Embedded components directly held by `component`'s set attributes
fn embedded_components(component: &Component) -> StorableResult<Vec<Component>> {
    let mut found = Vec::new();
    for attribute in component.attributes()? {
        if attribute.is_computed() || !attribute.is_set() {
            continue;
        }
        let value = attribute.get_value_with(GetValueOptions {
            throw_if_unset: false,
        })?;
        collect_embedded(&value, &mut found);
    }
    Ok(found)
}

fn collect_embedded(value: &Value, found: &mut Vec<Component>) {
    match value {
        Value::Component(component) if component.is_embedded() && !component.is_class() => {
            found.push(component.clone());
        }
        Value::Array(array) => {
            for item in array.items() {
                collect_embedded(&item, found);
            }
        }
        _ => {}
    }
}
