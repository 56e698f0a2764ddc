//! Record accessors.
//!
//! An [`Accessor`] is the only interface surface an entity type exposes:
//! generic get/create/update/filter/delete driven entirely by the entity's
//! schema. Field routing is decided once, at this boundary, from the
//! schema's dispatch table - direct columns read and write the entity's own
//! row, versioned fields go through the version group, foreign-key and
//! many-to-many fields recursively use the accessor of the referenced
//! entity type.
//!
//! Every operation runs in a caller-supplied transaction; the surrounding
//! unit of work decides when to commit. [`crate::Store::transaction`] is
//! the convenience wrapper for single-operation work.

use std::collections::BTreeMap;

use ledgerbase_storage::{Predicate, Row, RowId, StoreBackend, Transaction, Value};
use tracing::debug;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::record::Record;
use crate::relation::RelationEngine;
use crate::schema::{EntitySchema, FieldBinding, ManyToMany, ACTIVE_COLUMN, EFFECTIVE_TIME_COLUMN};
use crate::store::Store;
use crate::version::{VersionEngine, VersionRef};

/// Record accessor for one entity type.
///
/// Obtained from [`Store::accessor`]. Cheap to create; borrows the store.
pub struct Accessor<'a> {
    store: &'a Store,
    schema: &'a EntitySchema,
}

impl<'a> Accessor<'a> {
    pub(crate) fn new(store: &'a Store, schema: &'a EntitySchema) -> Self {
        Self { store, schema }
    }

    /// Returns the schema this accessor operates on.
    #[must_use]
    pub fn schema(&self) -> &EntitySchema {
        self.schema
    }

    fn backend(&self) -> &dyn StoreBackend {
        self.store.backend()
    }

    fn clock(&self) -> &dyn Clock {
        self.store.clock()
    }

    fn versions_engine(&self) -> VersionEngine<'_> {
        VersionEngine::new(self.backend(), self.clock())
    }

    fn relation_engine(&self) -> RelationEngine<'_> {
        RelationEngine::new(self.backend(), self.clock())
    }

    fn entity(&self) -> &str {
        self.schema.name()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Looks up an entity by natural key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no entity has this key.
    pub fn get(&self, txn: &Transaction, key: &Key) -> CoreResult<Record> {
        let row = self.find_row(txn, key)?;
        self.build_record(txn, &row)
    }

    /// Returns `true` if an entity with this key exists.
    pub fn exists(&self, txn: &Transaction, key: &Key) -> CoreResult<bool> {
        Ok(self.find_row_opt(txn, key)?.is_some())
    }

    /// Selects entities matching equality criteria on direct and
    /// foreign-key fields.
    ///
    /// Criteria on versioned, derived, or many-to-many fields are rejected
    /// with [`CoreError::UnsupportedFilter`] for every input, including a
    /// null-valued criterion. Filtering through an active-version join is
    /// deliberately outside this layer's contract.
    pub fn filter(&self, txn: &Transaction, criteria: &Record) -> CoreResult<Vec<Record>> {
        let mut predicate = Predicate::new();
        for (field, value) in criteria.fields() {
            match self.schema.binding(field) {
                None => return Err(CoreError::unknown_field(self.entity(), field)),
                Some(FieldBinding::Versioned(_) | FieldBinding::Derived | FieldBinding::ManyToMany) => {
                    return Err(CoreError::unsupported_filter(self.entity(), field));
                }
                Some(FieldBinding::Column(column)) => {
                    if let Some(target) = self.schema.fk_target(field) {
                        if value.is_null() {
                            predicate = predicate.eq(column.as_str(), Value::Null);
                        } else {
                            let target_accessor = self.store.accessor(target)?;
                            match target_accessor
                                .find_row_opt(txn, &Key::from(value.clone()))?
                            {
                                Some(target_row) => {
                                    predicate = predicate.eq(column.as_str(), target_row.id());
                                }
                                // Nothing can reference a row that does not
                                // exist.
                                None => return Ok(Vec::new()),
                            }
                        }
                    } else {
                        predicate = predicate.eq(column.as_str(), value.clone());
                    }
                }
            }
        }

        let rows = self
            .backend()
            .select(txn, self.schema.table(), &predicate)?;
        rows.iter().map(|row| self.build_record(txn, row)).collect()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Creates an entity from the given fields and returns the stored
    /// record.
    ///
    /// All key fields must be present and non-null. Foreign-key fields are
    /// resolved through the referenced entity's accessor. Versioned fields
    /// create the first version record as part of the same logical create;
    /// a derived-relation field assigns the initial association.
    pub fn create(&self, txn: &mut Transaction, fields: Record) -> CoreResult<Record> {
        let mut fields = fields;
        self.check_known_fields(&fields)?;
        if let Some(policy) = self.store.registry().policy(self.entity()) {
            policy.before_create(&mut fields)?;
        }

        let key = self.key_from_record(&fields)?;
        if self.find_row_opt(txn, &key)?.is_some() {
            return Err(CoreError::duplicate_key(self.entity(), key));
        }

        let split = self.split_fields(txn, &fields)?;

        let row_id = self
            .backend()
            .insert(txn, self.schema.table(), split.columns)?;

        if !split.version_overrides.is_empty() {
            self.transition(txn, row_id, split.version_overrides)?;
        }

        if let Some(target_key) = split.derived_target {
            self.assign_relation(txn, row_id, &target_key)?;
        }

        for (field, m2m, keys) in split.m2m_sets {
            for target_key in keys {
                let target = self.resolve_reference(txn, &field, &m2m.target, &target_key)?;
                self.backend().insert(
                    txn,
                    &m2m.table,
                    [
                        (m2m.local_column.clone(), Value::from(row_id)),
                        (m2m.remote_column.clone(), Value::from(target)),
                    ]
                    .into(),
                )?;
            }
        }

        debug!(entity = %self.entity(), %key, "created");

        let row = self
            .backend()
            .fetch(txn, self.schema.table(), row_id)?
            .ok_or_else(|| {
                CoreError::invariant_violation("created row missing from its own transaction")
            })?;
        self.build_record(txn, &row)
    }

    /// Applies field changes to an existing entity.
    ///
    /// If any changed field belongs to the versioned set, exactly one new
    /// version record is created per update call - regardless of how many
    /// versioned fields the call sets - before any other field is applied.
    pub fn update(&self, txn: &mut Transaction, key: &Key, changes: Record) -> CoreResult<()> {
        let mut changes = changes;
        self.check_known_fields(&changes)?;
        if let Some(policy) = self.store.registry().policy(self.entity()) {
            policy.before_update(&mut changes)?;
        }

        let row = self.find_row(txn, key)?;
        self.check_key_change(txn, key, &changes, row.id())?;

        let split = self.split_fields(txn, &changes)?;

        if !split.version_overrides.is_empty() {
            self.transition(txn, row.id(), split.version_overrides)?;
        }

        if !split.columns.is_empty() {
            self.backend()
                .update(txn, self.schema.table(), row.id(), split.columns)?;
        }

        if let Some(target_key) = split.derived_target {
            self.assign_relation(txn, row.id(), &target_key)?;
        }

        for (field, m2m, keys) in split.m2m_sets {
            self.replace_associations(txn, row.id(), &field, &m2m, keys)?;
        }

        debug!(entity = %self.entity(), %key, "updated");
        Ok(())
    }

    /// Deletes an entity by natural key.
    ///
    /// Removes the entity's own row and its plain many-to-many association
    /// rows. Version records and derived-association history are retained
    /// for audit; cleaning them up is an explicit substrate-level task.
    pub fn delete(&self, txn: &mut Transaction, key: &Key) -> CoreResult<()> {
        let row = self.find_row(txn, key)?;

        for (_, m2m) in self.schema.m2m_fields() {
            let assoc_rows = self.backend().select(
                txn,
                &m2m.table,
                &Predicate::new().eq(m2m.local_column.as_str(), row.id()),
            )?;
            for assoc in assoc_rows {
                self.backend().delete(txn, &m2m.table, assoc.id())?;
            }
        }

        self.backend().delete(txn, self.schema.table(), row.id())?;
        debug!(entity = %self.entity(), %key, "deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Version access
    // ------------------------------------------------------------------

    /// Captures the identity of the entity's active version.
    ///
    /// Call this at the start of a logical operation that will read
    /// versioned fields; pass the returned ref to [`Self::read_at_version`]
    /// for every later read in that operation. A concurrent version
    /// transition then cannot change what the operation observes, because
    /// superseded rows are flagged inactive, never removed.
    ///
    /// Returns `None` if no version was ever created.
    pub fn capture(&self, txn: &Transaction, key: &Key) -> CoreResult<Option<VersionRef>> {
        let group = self.require_version_group()?;
        let row = self.find_row(txn, key)?;
        self.versions_engine().capture(txn, group, row.id())
    }

    /// Reads a versioned field through a previously captured version.
    pub fn read_at_version(
        &self,
        txn: &Transaction,
        vref: VersionRef,
        field: &str,
    ) -> CoreResult<Value> {
        match self.schema.binding(field) {
            Some(FieldBinding::Versioned(column)) => {
                let group = self.require_version_group()?;
                let row = self.versions_engine().row_for(txn, group, vref)?;
                Ok(row.get(column).clone())
            }
            Some(_) => Err(CoreError::invalid_field(
                self.entity(),
                field,
                "not a versioned field",
            )),
            None => Err(CoreError::unknown_field(self.entity(), field)),
        }
    }

    /// Returns the full version history of an entity in creation order.
    ///
    /// Each record carries the entity's versioned fields under their
    /// logical names plus the version's `is_active` flag.
    pub fn versions(&self, txn: &Transaction, key: &Key) -> CoreResult<Vec<Record>> {
        let group = self.require_version_group()?;
        let row = self.find_row(txn, key)?;
        let rows = self.versions_engine().history(txn, group, row.id())?;

        Ok(rows
            .iter()
            .map(|version| {
                let mut record = Record::new();
                for (field, binding) in self.schema.fields() {
                    if let FieldBinding::Versioned(column) = binding {
                        record.insert(field, version.get(column).clone());
                    }
                }
                record.insert(ACTIVE_COLUMN, version.get(ACTIVE_COLUMN).clone());
                record
            })
            .collect())
    }

    /// Returns the assignment history of the entity's derived relation in
    /// creation order.
    ///
    /// Each record carries the relation field (as the target's key), the
    /// `is_active` flag, and the assignment's effective time.
    pub fn assignments(&self, txn: &Transaction, key: &Key) -> CoreResult<Vec<Record>> {
        let relation = self.schema.derived_ref().ok_or_else(|| {
            CoreError::invalid_schema(format!("{} has no derived relation", self.entity()))
        })?;
        let row = self.find_row(txn, key)?;
        let rows = self.relation_engine().history(txn, relation, row.id())?;

        let target_accessor = self.store.accessor(&relation.target)?;
        let mut result = Vec::with_capacity(rows.len());
        for assoc in &rows {
            let target_key = match assoc.get(&relation.target_column).as_id() {
                Some(id) => target_accessor.key_value_of(txn, id)?,
                None => Value::Null,
            };
            let mut record = Record::new();
            record.insert(relation.field.as_str(), target_key);
            record.insert(ACTIVE_COLUMN, assoc.get(ACTIVE_COLUMN).clone());
            record.insert(
                EFFECTIVE_TIME_COLUMN,
                assoc.get(EFFECTIVE_TIME_COLUMN).clone(),
            );
            result.push(record);
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_version_group(&self) -> CoreResult<&crate::schema::VersionGroup> {
        self.schema.version_group_ref().ok_or_else(|| {
            CoreError::invalid_schema(format!("{} has no version group", self.entity()))
        })
    }

    /// Runs one version transition with the given column overrides.
    fn transition(
        &self,
        txn: &mut Transaction,
        parent: RowId,
        overrides: BTreeMap<String, Value>,
    ) -> CoreResult<()> {
        let group = self.require_version_group()?;
        let value_columns: Vec<String> = self
            .schema
            .versioned_columns()
            .map(str::to_string)
            .collect();
        self.versions_engine()
            .transition(txn, group, &value_columns, parent, overrides)?;
        Ok(())
    }

    /// Resolves and assigns the derived relation's target.
    fn assign_relation(
        &self,
        txn: &mut Transaction,
        parent: RowId,
        target_key: &Value,
    ) -> CoreResult<()> {
        let relation = self.schema.derived_ref().ok_or_else(|| {
            CoreError::invalid_schema(format!("{} has no derived relation", self.entity()))
        })?;
        let target =
            self.resolve_reference(txn, &relation.field, &relation.target, target_key)?;
        self.relation_engine()
            .reassign(txn, relation, parent, target)?;
        Ok(())
    }

    /// Replaces a many-to-many field's association set with the given keys.
    fn replace_associations(
        &self,
        txn: &mut Transaction,
        row_id: RowId,
        field: &str,
        m2m: &ManyToMany,
        keys: Vec<Value>,
    ) -> CoreResult<()> {
        let mut desired = Vec::with_capacity(keys.len());
        for target_key in &keys {
            desired.push(self.resolve_reference(txn, field, &m2m.target, target_key)?);
        }

        let existing = self.backend().select(
            txn,
            &m2m.table,
            &Predicate::new().eq(m2m.local_column.as_str(), row_id),
        )?;

        let mut present = Vec::with_capacity(existing.len());
        for assoc in &existing {
            let target = assoc.get(&m2m.remote_column).as_id().ok_or_else(|| {
                CoreError::invariant_violation(format!(
                    "association row {} in {} has no target id",
                    assoc.id(),
                    m2m.table
                ))
            })?;
            if desired.contains(&target) {
                present.push(target);
            } else {
                self.backend().delete(txn, &m2m.table, assoc.id())?;
            }
        }

        for target in desired {
            if !present.contains(&target) {
                self.backend().insert(
                    txn,
                    &m2m.table,
                    [
                        (m2m.local_column.clone(), Value::from(row_id)),
                        (m2m.remote_column.clone(), Value::from(target)),
                    ]
                    .into(),
                )?;
            }
        }
        Ok(())
    }

    /// Rejects records naming fields the schema does not declare.
    fn check_known_fields(&self, record: &Record) -> CoreResult<()> {
        for (field, _) in record.fields() {
            if self.schema.binding(field).is_none() {
                return Err(CoreError::unknown_field(self.entity(), field));
            }
        }
        Ok(())
    }

    /// Extracts the natural key from a record; all key fields must be
    /// present and non-null.
    fn key_from_record(&self, record: &Record) -> CoreResult<Key> {
        let mut values = Vec::with_capacity(self.schema.keys().len());
        for field in self.schema.keys() {
            let value = record.get(field);
            if value.is_null() {
                return Err(CoreError::missing_key(self.entity(), field));
            }
            values.push(value.clone());
        }
        Ok(Key::composite(values))
    }

    /// When an update touches key fields, verifies the new key is free.
    fn check_key_change(
        &self,
        txn: &Transaction,
        current_key: &Key,
        changes: &Record,
        row_id: RowId,
    ) -> CoreResult<()> {
        if !self.schema.keys().iter().any(|k| changes.contains(k)) {
            return Ok(());
        }
        let values: Vec<Value> = self
            .schema
            .keys()
            .iter()
            .zip(current_key.values())
            .map(|(field, current)| {
                if changes.contains(field) {
                    changes.get(field).clone()
                } else {
                    current.clone()
                }
            })
            .collect();
        let new_key = Key::composite(values);
        if new_key == *current_key {
            return Ok(());
        }
        if let Some(existing) = self.find_row_opt(txn, &new_key)? {
            if existing.id() != row_id {
                return Err(CoreError::duplicate_key(self.entity(), new_key));
            }
        }
        Ok(())
    }

    /// Splits a record's fields by binding kind, resolving foreign keys.
    fn split_fields(&self, txn: &Transaction, record: &Record) -> CoreResult<SplitFields> {
        let mut split = SplitFields::default();
        for (field, value) in record.fields() {
            let binding = self
                .schema
                .binding(field)
                .ok_or_else(|| CoreError::unknown_field(self.entity(), field))?;
            match binding {
                FieldBinding::Column(column) => {
                    let stored = if let Some(target) = self.schema.fk_target(field) {
                        if value.is_null() {
                            Value::Null
                        } else {
                            Value::from(self.resolve_reference(txn, field, target, value)?)
                        }
                    } else {
                        value.clone()
                    };
                    split.columns.insert(column.clone(), stored);
                }
                FieldBinding::Versioned(column) => {
                    split.version_overrides.insert(column.clone(), value.clone());
                }
                FieldBinding::ManyToMany => {
                    let keys = match value {
                        Value::Array(items) => items.clone(),
                        Value::Null => Vec::new(),
                        _ => {
                            return Err(CoreError::invalid_field(
                                self.entity(),
                                field,
                                "expects a list of keys",
                            ));
                        }
                    };
                    let m2m = self
                        .schema
                        .m2m_fields()
                        .find(|(f, _)| *f == field)
                        .map(|(_, m)| m.clone())
                        .expect("binding and descriptor declared together");
                    split.m2m_sets.push((field.to_string(), m2m, keys));
                }
                FieldBinding::Derived => {
                    split.derived_target = Some(value.clone());
                }
            }
        }
        Ok(split)
    }

    /// Resolves a referenced entity's key to its row id.
    fn resolve_reference(
        &self,
        txn: &Transaction,
        field: &str,
        target: &str,
        value: &Value,
    ) -> CoreResult<RowId> {
        let key = Key::from(value.clone());
        let target_accessor = self.store.accessor(target)?;
        match target_accessor.find_row_opt(txn, &key)? {
            Some(row) => Ok(row.id()),
            None => Err(CoreError::reference_not_found(target, field, key)),
        }
    }

    /// Builds the storage predicate addressing a natural key.
    ///
    /// Returns `None` when a foreign-key component of the key does not
    /// resolve - no row can match it.
    fn key_predicate(&self, txn: &Transaction, key: &Key) -> CoreResult<Option<Predicate>> {
        let key_fields = self.schema.keys();
        if key.len() != key_fields.len() {
            let field = key_fields
                .get(key.len())
                .or_else(|| key_fields.last())
                .map(String::as_str)
                .unwrap_or("key");
            return Err(CoreError::missing_key(self.entity(), field));
        }

        let mut predicate = Predicate::new();
        for (field, value) in key_fields.iter().zip(key.values()) {
            let column = self.column_of(field)?;
            if let Some(target) = self.schema.fk_target(field) {
                let target_accessor = self.store.accessor(target)?;
                match target_accessor.find_row_opt(txn, &Key::from(value.clone()))? {
                    Some(target_row) => {
                        predicate = predicate.eq(column, target_row.id());
                    }
                    None => return Ok(None),
                }
            } else {
                predicate = predicate.eq(column, value.clone());
            }
        }
        Ok(Some(predicate))
    }

    fn find_row_opt(&self, txn: &Transaction, key: &Key) -> CoreResult<Option<Row>> {
        let Some(predicate) = self.key_predicate(txn, key)? else {
            return Ok(None);
        };
        let mut rows = self
            .backend()
            .select(txn, self.schema.table(), &predicate)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(CoreError::invariant_violation(format!(
                "{n} rows share the {} key {key}",
                self.entity()
            ))),
        }
    }

    fn find_row(&self, txn: &Transaction, key: &Key) -> CoreResult<Row> {
        self.find_row_opt(txn, key)?
            .ok_or_else(|| CoreError::not_found(self.entity(), key.clone()))
    }

    fn column_of(&self, field: &str) -> CoreResult<&str> {
        match self.schema.binding(field) {
            Some(FieldBinding::Column(column)) => Ok(column),
            _ => Err(CoreError::invalid_schema(format!(
                "field {field} of {} is not a direct column",
                self.entity()
            ))),
        }
    }

    /// Projects a row's natural key, resolving foreign-key key fields to
    /// the referenced entity's key.
    fn key_of_row(&self, txn: &Transaction, row: &Row) -> CoreResult<Key> {
        let mut values = Vec::with_capacity(self.schema.keys().len());
        for field in self.schema.keys() {
            let column = self.column_of(field)?;
            let raw = row.get(column);
            if let Some(target) = self.schema.fk_target(field) {
                let id = raw.as_id().ok_or_else(|| {
                    CoreError::invariant_violation(format!(
                        "key field {field} of {} holds no reference id",
                        self.entity()
                    ))
                })?;
                values.push(self.store.accessor(target)?.key_value_of(txn, id)?);
            } else {
                values.push(raw.clone());
            }
        }
        Ok(Key::composite(values))
    }

    /// Returns the single key value of the row with the given id.
    ///
    /// Only entities with single-field keys can be referenced, which the
    /// registry validates up front.
    fn key_value_of(&self, txn: &Transaction, row_id: RowId) -> CoreResult<Value> {
        let row = self
            .backend()
            .fetch(txn, self.schema.table(), row_id)?
            .ok_or_else(|| {
                CoreError::invariant_violation(format!(
                    "dangling reference: {} row {row_id} is gone",
                    self.entity()
                ))
            })?;
        let key = self.key_of_row(txn, &row)?;
        Ok(key.values()[0].clone())
    }

    /// Materializes a storage row as a caller-facing record.
    fn build_record(&self, txn: &Transaction, row: &Row) -> CoreResult<Record> {
        let active_version = match self.schema.version_group_ref() {
            Some(group) => self.versions_engine().active_row(txn, group, row.id())?,
            None => None,
        };

        let mut record = Record::new();
        for (field, binding) in self.schema.fields() {
            let value = match binding {
                FieldBinding::Column(column) => {
                    if let Some(target) = self.schema.fk_target(field) {
                        match row.get(column).as_id() {
                            Some(id) => self.store.accessor(target)?.key_value_of(txn, id)?,
                            None => Value::Null,
                        }
                    } else {
                        row.get(column).clone()
                    }
                }
                FieldBinding::Versioned(column) => active_version
                    .as_ref()
                    .map(|v| v.get(column).clone())
                    .unwrap_or(Value::Null),
                FieldBinding::Derived => {
                    let relation = self
                        .schema
                        .derived_ref()
                        .expect("derived binding declared with relation");
                    match self
                        .relation_engine()
                        .current_target(txn, relation, row.id())?
                    {
                        Some(target_id) => self
                            .store
                            .accessor(&relation.target)?
                            .key_value_of(txn, target_id)?,
                        None => Value::Null,
                    }
                }
                FieldBinding::ManyToMany => {
                    let m2m = self
                        .schema
                        .m2m_fields()
                        .find(|(f, _)| *f == field)
                        .map(|(_, m)| m)
                        .expect("binding and descriptor declared together");
                    let assoc_rows = self.backend().select(
                        txn,
                        &m2m.table,
                        &Predicate::new().eq(m2m.local_column.as_str(), row.id()),
                    )?;
                    let target_accessor = self.store.accessor(&m2m.target)?;
                    let mut keys = Vec::with_capacity(assoc_rows.len());
                    for assoc in &assoc_rows {
                        let target_id =
                            assoc.get(&m2m.remote_column).as_id().ok_or_else(|| {
                                CoreError::invariant_violation(format!(
                                    "association row {} in {} has no target id",
                                    assoc.id(),
                                    m2m.table
                                ))
                            })?;
                        keys.push(target_accessor.key_value_of(txn, target_id)?);
                    }
                    Value::Array(keys)
                }
            };
            record.insert(field, value);
        }
        Ok(record)
    }
}

/// A record's fields, split by binding kind with references resolved.
#[derive(Default)]
struct SplitFields {
    columns: BTreeMap<String, Value>,
    version_overrides: BTreeMap<String, Value>,
    m2m_sets: Vec<(String, ManyToMany, Vec<Value>)>,
    derived_target: Option<Value>,
}
