//! Entity schema registry.
//!
//! Schemas are typed, declarative data constructed at startup: which fields
//! an entity exposes, where each one lives (its own row, a version record,
//! or an association table), which fields reference other entities, and
//! what forms the natural key. The registry validates the whole graph
//! before a store will hand out accessors for it.

use std::collections::BTreeMap;
use std::sync::Arc;

use ledgerbase_storage::TableSpec;

use crate::error::{CoreError, CoreResult};
use crate::record::Record;

/// Column holding the active flag on version and versioned-association
/// tables.
pub const ACTIVE_COLUMN: &str = "is_active";
/// Column holding the instant a version became authoritative.
pub const EFFECTIVE_TIME_COLUMN: &str = "effective_time";
/// Column holding the instant a version was superseded, when recorded.
pub const EXPIRY_TIME_COLUMN: &str = "expiry_time";

/// Where a logical field resolves.
///
/// This is the explicit per-field dispatch table: the accessor consults it
/// once at its boundary, so nothing about field routing is implicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldBinding {
    /// Stored in the named column of the entity's own row.
    Column(String),
    /// Stored in the named column of the entity's active version record.
    Versioned(String),
    /// Resolved through a plain many-to-many association table.
    ManyToMany,
    /// Resolved through the entity's versioned association (a pointer to
    /// another entity that changes over time).
    Derived,
}

/// Declares an entity's versioned attribute group: the auxiliary table
/// holding one row per version, flagged active or inactive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGroup {
    /// The version table.
    pub table: String,
    /// Column of the version table holding the parent's row id.
    pub parent_column: String,
}

/// Declares a plain many-to-many field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManyToMany {
    /// The entity type on the other side.
    pub target: String,
    /// The association table.
    pub table: String,
    /// Association column holding this entity's row id.
    pub local_column: String,
    /// Association column holding the target entity's row id.
    pub remote_column: String,
}

/// Declares a derived relation: a versioned association whose value is a
/// pointer to another entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedRelation {
    /// The logical field exposing the relation.
    pub field: String,
    /// The entity type pointed at.
    pub target: String,
    /// The association table (one row per assignment version).
    pub table: String,
    /// Association column holding this entity's row id.
    pub parent_column: String,
    /// Association column holding the target entity's row id.
    pub target_column: String,
}

/// Per-entity hook invoked before generic create/update logic.
///
/// Policies are composition, not inheritance: an entity that needs a
/// field-specific rule implements one of these instead of overriding the
/// accessor. The default implementations do nothing.
pub trait FieldPolicy: Send + Sync {
    /// Adjusts or validates a record before `create` applies it.
    fn before_create(&self, record: &mut Record) -> CoreResult<()> {
        let _ = record;
        Ok(())
    }

    /// Adjusts or validates changes before `update` applies them.
    fn before_update(&self, changes: &mut Record) -> CoreResult<()> {
        let _ = changes;
        Ok(())
    }
}

/// Schema of one entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    table: String,
    keys: Vec<String>,
    fields: BTreeMap<String, FieldBinding>,
    fk_fields: BTreeMap<String, String>,
    m2m_fields: BTreeMap<String, ManyToMany>,
    version_group: Option<VersionGroup>,
    derived: Option<DerivedRelation>,
}

impl EntitySchema {
    /// Creates a schema for an entity stored in the given table.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            keys: Vec::new(),
            fields: BTreeMap::new(),
            fk_fields: BTreeMap::new(),
            m2m_fields: BTreeMap::new(),
            version_group: None,
            derived: None,
        }
    }

    /// Appends a field to the natural key, in declaration order.
    #[must_use]
    pub fn key(mut self, field: impl Into<String>) -> Self {
        self.keys.push(field.into());
        self
    }

    /// Declares a direct column field.
    #[must_use]
    pub fn column(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), FieldBinding::Column(column.into()));
        self
    }

    /// Declares a foreign-key field: stored in `column` as the referenced
    /// row's id, exposed as the referenced entity's natural key.
    #[must_use]
    pub fn reference(
        mut self,
        field: impl Into<String>,
        target: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        let field = field.into();
        self.fields
            .insert(field.clone(), FieldBinding::Column(column.into()));
        self.fk_fields.insert(field, target.into());
        self
    }

    /// Declares the entity's versioned attribute group.
    #[must_use]
    pub fn version_group(
        mut self,
        table: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        self.version_group = Some(VersionGroup {
            table: table.into(),
            parent_column: parent_column.into(),
        });
        self
    }

    /// Declares a field resolved through the version group's active record.
    #[must_use]
    pub fn versioned(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), FieldBinding::Versioned(column.into()));
        self
    }

    /// Declares a plain many-to-many field.
    #[must_use]
    pub fn many_to_many(mut self, field: impl Into<String>, m2m: ManyToMany) -> Self {
        let field = field.into();
        self.fields.insert(field.clone(), FieldBinding::ManyToMany);
        self.m2m_fields.insert(field, m2m);
        self
    }

    /// Declares the entity's derived relation field.
    #[must_use]
    pub fn derived_relation(mut self, relation: DerivedRelation) -> Self {
        self.fields
            .insert(relation.field.clone(), FieldBinding::Derived);
        self.derived = Some(relation);
        self
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the entity's table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the natural-key fields in order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns the binding of a field, if declared.
    #[must_use]
    pub fn binding(&self, field: &str) -> Option<&FieldBinding> {
        self.fields.get(field)
    }

    /// Iterates over `(field, binding)` pairs.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldBinding)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the referenced entity type of a foreign-key field.
    #[must_use]
    pub fn fk_target(&self, field: &str) -> Option<&str> {
        self.fk_fields.get(field).map(String::as_str)
    }

    /// Iterates over many-to-many fields.
    pub fn m2m_fields(&self) -> impl Iterator<Item = (&str, &ManyToMany)> {
        self.m2m_fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the version group, if the entity has one.
    #[must_use]
    pub fn version_group_ref(&self) -> Option<&VersionGroup> {
        self.version_group.as_ref()
    }

    /// Returns the derived relation, if the entity has one.
    #[must_use]
    pub fn derived_ref(&self) -> Option<&DerivedRelation> {
        self.derived.as_ref()
    }

    /// Returns the version-table columns of all versioned fields.
    pub fn versioned_columns(&self) -> impl Iterator<Item = &str> {
        self.fields.values().filter_map(|binding| match binding {
            FieldBinding::Versioned(column) => Some(column.as_str()),
            _ => None,
        })
    }
}

/// Registry of all entity schemas plus their field policies.
///
/// Registration is two-phase: `register` declares entities in any order that
/// satisfies plain forward references, and `patch_many_to_many` closes
/// genuine cycles (Node and Address each carry a many-to-many field naming
/// the other) after both sides exist. `validate` must pass before the
/// registry is used; [`crate::Store::open`] enforces this.
#[derive(Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, EntitySchema>,
    policies: BTreeMap<String, Arc<dyn FieldPolicy>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity schema.
    ///
    /// # Errors
    ///
    /// Fails if an entity with the same name is already registered.
    pub fn register(&mut self, schema: EntitySchema) -> CoreResult<()> {
        if self.entities.contains_key(schema.name()) {
            return Err(CoreError::invalid_schema(format!(
                "entity {} registered twice",
                schema.name()
            )));
        }
        self.entities.insert(schema.name().to_string(), schema);
        Ok(())
    }

    /// Adds a many-to-many field to an already-registered entity.
    ///
    /// This is the second phase of registration, for association cycles that
    /// cannot be declared in a single pass.
    pub fn patch_many_to_many(
        &mut self,
        entity: &str,
        field: impl Into<String>,
        m2m: ManyToMany,
    ) -> CoreResult<()> {
        let schema = self
            .entities
            .get_mut(entity)
            .ok_or_else(|| CoreError::unknown_entity(entity))?;
        let field = field.into();
        schema.fields.insert(field.clone(), FieldBinding::ManyToMany);
        schema.m2m_fields.insert(field, m2m);
        Ok(())
    }

    /// Attaches a field policy to an entity.
    pub fn set_policy(&mut self, entity: &str, policy: Arc<dyn FieldPolicy>) -> CoreResult<()> {
        if !self.entities.contains_key(entity) {
            return Err(CoreError::unknown_entity(entity));
        }
        self.policies.insert(entity.to_string(), policy);
        Ok(())
    }

    /// Returns an entity's schema.
    pub fn get(&self, name: &str) -> CoreResult<&EntitySchema> {
        self.entities
            .get(name)
            .ok_or_else(|| CoreError::unknown_entity(name))
    }

    /// Returns an entity's field policy, if one is attached.
    #[must_use]
    pub fn policy(&self, name: &str) -> Option<&Arc<dyn FieldPolicy>> {
        self.policies.get(name)
    }

    /// Iterates over registered schemas.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }

    /// Checks the whole schema graph for consistency.
    ///
    /// Verifies that every key field is a declared column, versioned fields
    /// have a version group, derived and many-to-many declarations are
    /// complete, and every referenced entity type exists and is addressable
    /// by a single-field key (composite-keyed entities cannot be referenced).
    pub fn validate(&self) -> CoreResult<()> {
        for schema in self.entities.values() {
            let name = schema.name();
            if schema.keys().is_empty() {
                return Err(CoreError::invalid_schema(format!(
                    "entity {name} declares no key fields"
                )));
            }
            for key_field in schema.keys() {
                match schema.binding(key_field) {
                    Some(FieldBinding::Column(_)) => {}
                    Some(_) => {
                        return Err(CoreError::invalid_schema(format!(
                            "key field {key_field} of {name} must be a direct column"
                        )));
                    }
                    None => {
                        return Err(CoreError::invalid_schema(format!(
                            "key field {key_field} of {name} is not declared"
                        )));
                    }
                }
            }

            if schema.fields.values().any(|b| matches!(b, FieldBinding::Versioned(_)))
                && schema.version_group.is_none()
            {
                return Err(CoreError::invalid_schema(format!(
                    "entity {name} has versioned fields but no version group"
                )));
            }

            for (field, target) in &schema.fk_fields {
                self.check_reference_target(name, field, target)?;
            }
            for (field, m2m) in &schema.m2m_fields {
                self.check_reference_target(name, field, &m2m.target)?;
            }
            if let Some(derived) = &schema.derived {
                self.check_reference_target(name, &derived.field, &derived.target)?;
            }
        }
        Ok(())
    }

    /// Validates that a referenced entity exists and has a single-field key.
    fn check_reference_target(&self, entity: &str, field: &str, target: &str) -> CoreResult<()> {
        let Some(target_schema) = self.entities.get(target) else {
            return Err(CoreError::invalid_schema(format!(
                "field {field} of {entity} references unknown entity {target}"
            )));
        };
        if target_schema.keys().len() != 1 {
            return Err(CoreError::invalid_schema(format!(
                "field {field} of {entity} references {target}, which has a composite key"
            )));
        }
        Ok(())
    }

    /// Derives the table specs the schema graph needs on its substrate:
    /// one table per entity, one per version group, one per association.
    #[must_use]
    pub fn table_specs(&self) -> Vec<TableSpec> {
        let mut specs: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for schema in self.entities.values() {
            let entity_columns = specs.entry(schema.table.clone()).or_default();
            for binding in schema.fields.values() {
                if let FieldBinding::Column(column) = binding {
                    if !entity_columns.contains(column) {
                        entity_columns.push(column.clone());
                    }
                }
            }

            if let Some(group) = &schema.version_group {
                let columns = specs.entry(group.table.clone()).or_default();
                for column in schema.versioned_columns().chain([
                    group.parent_column.as_str(),
                    ACTIVE_COLUMN,
                    EFFECTIVE_TIME_COLUMN,
                    EXPIRY_TIME_COLUMN,
                ]) {
                    if !columns.iter().any(|c| c == column) {
                        columns.push(column.to_string());
                    }
                }
            }

            for m2m in schema.m2m_fields.values() {
                let columns = specs.entry(m2m.table.clone()).or_default();
                for column in [&m2m.local_column, &m2m.remote_column] {
                    if !columns.contains(column) {
                        columns.push(column.clone());
                    }
                }
            }

            if let Some(derived) = &schema.derived {
                let columns = specs.entry(derived.table.clone()).or_default();
                for column in [
                    derived.parent_column.as_str(),
                    derived.target_column.as_str(),
                    ACTIVE_COLUMN,
                    EFFECTIVE_TIME_COLUMN,
                    EXPIRY_TIME_COLUMN,
                ] {
                    if !columns.iter().any(|c| c == column) {
                        columns.push(column.to_string());
                    }
                }
            }
        }

        specs
            .into_iter()
            .map(|(name, columns)| TableSpec::new(name, columns))
            .collect()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .field("policies", &self.policies.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> EntitySchema {
        EntitySchema::new("client", "clients")
            .key("name")
            .column("name", "name")
    }

    fn node() -> EntitySchema {
        EntitySchema::new("node", "nodes")
            .key("name")
            .column("name", "name")
            .reference("client", "client", "client_id")
    }

    #[test]
    fn register_and_get() {
        let mut registry = SchemaRegistry::new();
        registry.register(client()).unwrap();
        assert_eq!(registry.get("client").unwrap().table(), "clients");
        assert!(matches!(
            registry.get("nope"),
            Err(CoreError::UnknownEntity { .. })
        ));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = SchemaRegistry::new();
        registry.register(client()).unwrap();
        assert!(registry.register(client()).is_err());
    }

    #[test]
    fn validate_accepts_simple_graph() {
        let mut registry = SchemaRegistry::new();
        registry.register(client()).unwrap();
        registry.register(node()).unwrap();
        registry.validate().unwrap();
    }

    #[test]
    fn validate_rejects_unknown_reference() {
        let mut registry = SchemaRegistry::new();
        registry.register(node()).unwrap();
        let result = registry.validate();
        assert!(matches!(result, Err(CoreError::InvalidSchema { .. })));
    }

    #[test]
    fn validate_rejects_missing_key_declaration() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(EntitySchema::new("ghost", "ghosts").key("name"))
            .unwrap();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn validate_rejects_versioned_key() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                EntitySchema::new("odd", "odds")
                    .key("value")
                    .version_group("odd_values", "odd_id")
                    .versioned("value", "value"),
            )
            .unwrap();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn validate_rejects_versioned_fields_without_group() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                EntitySchema::new("odd", "odds")
                    .key("name")
                    .column("name", "name")
                    .versioned("value", "value"),
            )
            .unwrap();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn validate_rejects_composite_key_reference() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                EntitySchema::new("pair", "pairs")
                    .key("a")
                    .key("b")
                    .column("a", "a")
                    .column("b", "b"),
            )
            .unwrap();
        registry
            .register(
                EntitySchema::new("holder", "holders")
                    .key("name")
                    .column("name", "name")
                    .reference("pair", "pair", "pair_id"),
            )
            .unwrap();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn two_phase_registration_closes_cycle() {
        let mut registry = SchemaRegistry::new();
        registry.register(client()).unwrap();
        registry.register(node()).unwrap();
        registry
            .register(
                EntitySchema::new("address", "addresses")
                    .key("address")
                    .column("address", "address")
                    .reference("client", "client", "client_id")
                    .many_to_many(
                        "nodes",
                        ManyToMany {
                            target: "node".to_string(),
                            table: "node_addresses".to_string(),
                            local_column: "address_id".to_string(),
                            remote_column: "node_id".to_string(),
                        },
                    ),
            )
            .unwrap();
        registry
            .patch_many_to_many(
                "node",
                "addresses",
                ManyToMany {
                    target: "address".to_string(),
                    table: "node_addresses".to_string(),
                    local_column: "node_id".to_string(),
                    remote_column: "address_id".to_string(),
                },
            )
            .unwrap();

        registry.validate().unwrap();
        let node_schema = registry.get("node").unwrap();
        assert!(matches!(
            node_schema.binding("addresses"),
            Some(FieldBinding::ManyToMany)
        ));
    }

    #[test]
    fn patch_unknown_entity_fails() {
        let mut registry = SchemaRegistry::new();
        let result = registry.patch_many_to_many(
            "nope",
            "things",
            ManyToMany {
                target: "client".to_string(),
                table: "t".to_string(),
                local_column: "a".to_string(),
                remote_column: "b".to_string(),
            },
        );
        assert!(matches!(result, Err(CoreError::UnknownEntity { .. })));
    }

    #[test]
    fn table_specs_cover_version_and_association_tables() {
        let mut registry = SchemaRegistry::new();
        registry.register(client()).unwrap();
        registry
            .register(
                EntitySchema::new("rate", "rates")
                    .key("name")
                    .column("name", "name")
                    .version_group("rate_values", "rate_id")
                    .versioned("value", "value")
                    .versioned("effective_time", EFFECTIVE_TIME_COLUMN)
                    .versioned("expiry_time", EXPIRY_TIME_COLUMN),
            )
            .unwrap();

        let specs = registry.table_specs();
        let names: Vec<_> = specs.iter().map(|s| s.name().to_string()).collect();
        assert!(names.contains(&"clients".to_string()));
        assert!(names.contains(&"rates".to_string()));
        assert!(names.contains(&"rate_values".to_string()));

        let values = specs.iter().find(|s| s.name() == "rate_values").unwrap();
        assert!(values.has_column("value"));
        assert!(values.has_column(ACTIVE_COLUMN));
        assert!(values.has_column("rate_id"));
        assert!(values.has_column(EFFECTIVE_TIME_COLUMN));
    }
}
