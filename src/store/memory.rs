use crate::logic::keys::{build_key, key_attributes};
use crate::logic::PathResolver;
use crate::model::{
    join_path, AssociationPath, AttributeKind, ExpandResult, KeyPredicate, ProcessError,
    RequestError, Row, Schema, StructuredType, WriteContainer, WriteInstruction, WriteLeaf,
    PATH_SEPARATOR,
};
use crate::store::traits::{
    MetadataProvider, QueryProvider, Store, Transaction, TransactionProvider, WriteHandler,
};
use anyhow::{bail, Context, Result};
use axum::http::StatusCode;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

type Tables = HashMap<String, Vec<Row>>;

/// Rows per entity set, kept in memory.
///
/// The store answers queries with flat alias-keyed rows and applies write
/// instructions to them. Writes are serialized by a write gate: an open
/// [`MemoryTransaction`] holds the gate from `begin` until `commit` or
/// `rollback`, so a rollback only ever restores its own changes.
#[derive(Debug)]
pub struct MemoryStore {
    schema: Schema,
    tables: Arc<RwLock<Tables>>,
    write_gate: Arc<tokio::sync::Mutex<()>>,
    read_only: Arc<HashSet<String>>,
}

impl MemoryStore {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            tables: Arc::new(RwLock::new(HashMap::new())),
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
            read_only: Arc::new(HashSet::new()),
        }
    }

    /// Reject writes to an entity set with 501
    pub fn with_read_only(mut self, entity_set: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.read_only).insert(entity_set.into());
        self
    }

    pub fn insert_rows(&self, entity_set: &str, rows: Vec<Row>) -> Result<()> {
        if self.schema.entity_type_for_set(entity_set).is_none() {
            bail!(RequestError::UnknownEntitySet {
                name: entity_set.to_string()
            });
        }
        self.tables
            .write()
            .entry(entity_set.to_string())
            .or_default()
            .extend(rows);
        Ok(())
    }

    /// Copy of the rows of an entity set
    pub fn rows(&self, entity_set: &str) -> Vec<Row> {
        self.tables.read().get(entity_set).cloned().unwrap_or_default()
    }

    pub fn entity_sets(&self) -> Vec<String> {
        let mut sets: Vec<String> = self.tables.read().keys().cloned().collect();
        sets.sort();
        sets
    }

    fn entity_set_of(entity_type: &StructuredType) -> Result<&str> {
        entity_type
            .entity_set()
            .with_context(|| format!("type '{}' has no entity set", entity_type.fqn()))
    }

    /// Row alias for each key predicate; `ID` and, for embedded keys, both
    /// `Key/Code` and `Code` address the same column
    fn key_filter(
        entity_type: &StructuredType,
        keys: &[KeyPredicate],
    ) -> Result<Vec<(String, Value)>> {
        let key_columns = key_attributes(entity_type)?;
        keys.iter()
            .map(|predicate| {
                key_columns
                    .iter()
                    .find(|(alias, leaf)| {
                        *alias == predicate.name || leaf.external_name == predicate.name
                    })
                    .map(|(alias, _)| (alias.clone(), predicate.value.clone()))
                    .ok_or_else(|| {
                        RequestError::UnknownProperty {
                            type_name: entity_type.name().to_string(),
                            name: predicate.name.clone(),
                        }
                        .into()
                    })
            })
            .collect()
    }

    fn matches(row: &Row, filter: &[(String, Value)]) -> bool {
        filter.iter().all(|(alias, value)| row.get(alias) == Some(value))
    }

    /// Split an expand item into the association it starts with and the
    /// expansion to apply on its target, e.g. `Roles/Descriptions`
    fn split_expand<'e>(
        entity_type: &StructuredType,
        item: &'e str,
    ) -> Result<(AssociationPath, Option<&'e str>)> {
        let boundaries = item
            .match_indices(PATH_SEPARATOR)
            .map(|(index, _)| index)
            .chain(std::iter::once(item.len()));

        for end in boundaries {
            if let Ok(association) = PathResolver::association_path(entity_type, &item[..end]) {
                let rest = item[end..]
                    .strip_prefix(PATH_SEPARATOR)
                    .filter(|rest| !rest.is_empty());
                return Ok((association, rest));
            }
        }

        bail!(RequestError::UnknownProperty {
            type_name: entity_type.name().to_string(),
            name: item.to_string(),
        })
    }

    fn expand(
        tables: &Tables,
        entity_type: &StructuredType,
        parents: &[Row],
        expand: &[String],
    ) -> Result<BTreeMap<AssociationPath, ExpandResult>> {
        let mut plan: BTreeMap<AssociationPath, Vec<String>> = BTreeMap::new();
        for item in expand {
            let (association, rest) = Self::split_expand(entity_type, item)?;
            let nested = plan.entry(association).or_default();
            if let Some(rest) = rest {
                nested.push(rest.to_string());
            }
        }

        let mut children = BTreeMap::new();
        for (association, nested) in plan {
            let parent_keys = parents
                .iter()
                .map(|row| build_key(row, association.source_aliases()))
                .collect::<Result<HashSet<_>, _>>()?;

            let target = association.target();
            let matching: Vec<Row> = tables
                .get(Self::entity_set_of(target)?)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .filter(|row| {
                    build_key(row, association.target_aliases())
                        .map(|token| parent_keys.contains(&token))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();

            let grandchildren = Self::expand(tables, target, &matching, &nested)?;
            let mut result = ExpandResult::from_rows(&association, matching)?;
            for (child, child_result) in grandchildren {
                result.insert_child(child, child_result);
            }
            children.insert(association, result);
        }
        Ok(children)
    }

    /// Apply one instruction to the stored rows: read-only check, key lookup
    /// and the write itself, on a copy so a rejected instruction leaves the
    /// row untouched
    fn apply_instruction(
        tables: &RwLock<Tables>,
        read_only: &HashSet<String>,
        instruction: &WriteInstruction,
    ) -> Result<()> {
        let entity_type = &instruction.entity_type;
        let entity_set = Self::entity_set_of(entity_type)?;
        if read_only.contains(entity_set) {
            bail!(ProcessError::not_implemented(format!(
                "entity set '{}' is read-only",
                entity_set
            )));
        }

        let mut filter = Vec::new();
        for (alias, leaf) in key_attributes(entity_type)? {
            let value = instruction.keys.get(&leaf.internal_name).ok_or_else(|| {
                ProcessError::new(format!("key '{}' is missing", alias), StatusCode::BAD_REQUEST)
            })?;
            filter.push((alias, value.clone()));
        }

        let mut tables = tables.write();
        let row = tables
            .get_mut(entity_set)
            .and_then(|rows| rows.iter_mut().find(|row| Self::matches(row, &filter)))
            .ok_or_else(|| {
                ProcessError::not_found(format!("no entity in '{}' with the given key", entity_set))
            })?;

        let mut updated = row.clone();
        Self::apply(&mut updated, entity_type, "", &instruction.attributes)?;
        *row = updated;
        log::debug!("Updated entity in {}", entity_set);
        Ok(())
    }

    fn apply(
        row: &mut Row,
        structured_type: &StructuredType,
        prefix: &str,
        container: &WriteContainer,
    ) -> Result<()> {
        let lookup = |name: &str| {
            structured_type.attribute_by_internal_name(name).ok_or_else(|| {
                ProcessError::new(
                    format!("'{}' is not an attribute of {}", name, structured_type.name()),
                    StatusCode::BAD_REQUEST,
                )
            })
        };

        for (name, leaf) in &container.values {
            let attribute = lookup(name)?;
            let path = join_path(prefix, &attribute.external_name);
            match (&attribute.kind, leaf) {
                (AttributeKind::Primitive(_), WriteLeaf::Clear) => row.set(&path, Value::Null),
                (AttributeKind::Primitive(_), WriteLeaf::Set(value)) => {
                    row.set(&path, value.clone())
                }
                (AttributeKind::Complex(nested), WriteLeaf::Clear) => {
                    for leaf_path in PathResolver::leaf_paths(nested) {
                        row.set(&join_path(&path, &leaf_path), Value::Null);
                    }
                }
                _ => bail!(ProcessError::new(
                    format!("'{}' cannot be written", path),
                    StatusCode::BAD_REQUEST
                )),
            }
        }

        for (name, nested_container) in &container.nested {
            let attribute = lookup(name)?;
            let path = join_path(prefix, &attribute.external_name);
            let Some(nested) = attribute.structured_type() else {
                bail!(ProcessError::new(
                    format!("'{}' is not a complex attribute", path),
                    StatusCode::BAD_REQUEST
                ));
            };
            Self::apply(row, nested, &path, nested_container)?;
        }
        Ok(())
    }
}

impl MetadataProvider for MemoryStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait::async_trait]
impl QueryProvider for MemoryStore {
    async fn query(
        &self,
        entity_type: &Arc<StructuredType>,
        keys: &[KeyPredicate],
        expand: &[String],
    ) -> Result<ExpandResult> {
        let entity_set = Self::entity_set_of(entity_type)?;
        let filter = Self::key_filter(entity_type, keys)?;
        let tables = self.tables.read();

        let rows: Vec<Row> = tables
            .get(entity_set)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter(|row| Self::matches(row, &filter))
            .cloned()
            .collect();
        log::debug!("Query on {} matched {} rows", entity_set, rows.len());

        let children = Self::expand(&tables, entity_type, &rows, expand)?;
        let mut result = ExpandResult::root(rows);
        for (association, child) in children {
            result.insert_child(association, child);
        }
        Ok(result)
    }
}

#[async_trait::async_trait]
impl WriteHandler for MemoryStore {
    /// A write outside any transaction waits for the open one to finish
    async fn update_entity(&self, instruction: &WriteInstruction) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        Self::apply_instruction(&self.tables, &self.read_only, instruction)
    }
}

impl TransactionProvider for MemoryStore {
    type Transaction = MemoryTransaction;

    fn transaction(&self) -> MemoryTransaction {
        MemoryTransaction {
            tables: self.tables.clone(),
            write_gate: self.write_gate.clone(),
            read_only: self.read_only.clone(),
            open: Mutex::new(None),
        }
    }
}

impl Store for MemoryStore {}

struct OpenTransaction {
    gate: OwnedMutexGuard<()>,
    snapshot: Tables,
}

/// One request's transaction on a [`MemoryStore`].
///
/// `begin` waits for the write gate and snapshots every table, `rollback`
/// restores the snapshot. Writes through an idle handle take the gate for
/// the single write only. Dropping an open handle rolls it back.
pub struct MemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    write_gate: Arc<tokio::sync::Mutex<()>>,
    read_only: Arc<HashSet<String>>,
    open: Mutex<Option<OpenTransaction>>,
}

impl MemoryTransaction {
    fn take_open(&self, action: &str) -> Result<OpenTransaction> {
        self.open
            .lock()
            .take()
            .with_context(|| format!("no active transaction to {}", action))
    }
}

#[async_trait::async_trait]
impl Transaction for MemoryTransaction {
    async fn is_active(&self) -> bool {
        self.open.lock().is_some()
    }

    async fn begin(&self) -> Result<()> {
        if self.open.lock().is_some() {
            bail!("a transaction is already active");
        }
        let gate = self.write_gate.clone().lock_owned().await;
        let snapshot = self.tables.read().clone();
        *self.open.lock() = Some(OpenTransaction { gate, snapshot });
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.take_open("commit").map(drop)
    }

    async fn rollback(&self) -> Result<()> {
        let OpenTransaction { gate, snapshot } = self.take_open("roll back")?;
        *self.tables.write() = snapshot;
        drop(gate);
        Ok(())
    }
}

#[async_trait::async_trait]
impl WriteHandler for MemoryTransaction {
    async fn update_entity(&self, instruction: &WriteInstruction) -> Result<()> {
        let owned = self.open.lock().is_some();
        if owned {
            return MemoryStore::apply_instruction(&self.tables, &self.read_only, instruction);
        }
        let _gate = self.write_gate.lock().await;
        MemoryStore::apply_instruction(&self.tables, &self.read_only, instruction)
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if let Some(OpenTransaction { gate, snapshot }) = self.open.get_mut().take() {
            log::warn!("Transaction dropped while open, rolling back");
            *self.tables.write() = snapshot;
            drop(gate);
        }
    }
}
