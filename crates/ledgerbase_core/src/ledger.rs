//! The ledger entity graph.
//!
//! Declares the schemas this layer exists for: clients own nodes, addresses,
//! and exchange rates; relationships parent accounts and account requests;
//! accounts carry versioned credit limits; exchanges price transfers between
//! two accounts through a versioned assignment to an exchange rate.
//!
//! Node and Address reference each other through the same association
//! table, so registration is two-phase: Address declares its side inline
//! and Node's side is patched in afterwards.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use crate::schema::{
    DerivedRelation, EntitySchema, FieldPolicy, ManyToMany, SchemaRegistry,
    EFFECTIVE_TIME_COLUMN, EXPIRY_TIME_COLUMN,
};

/// Supplies a generated id when a relationship is created without one.
struct GeneratedRelationshipId;

impl FieldPolicy for GeneratedRelationshipId {
    fn before_create(&self, record: &mut Record) -> CoreResult<()> {
        if record.get("id").is_null() {
            record.insert("id", Uuid::new_v4().to_string());
        }
        Ok(())
    }
}

/// Fills in storage defaults for freshly created accounts.
struct AccountDefaults;

impl FieldPolicy for AccountDefaults {
    fn before_create(&self, record: &mut Record) -> CoreResult<()> {
        if record.get("balance").is_null() {
            record.insert("balance", Decimal::ZERO);
        }
        if record.get("is_active").is_null() {
            record.insert("is_active", true);
        }
        Ok(())
    }
}

/// Rejects exchanges from an account to itself.
struct DistinctExchangeEndpoints;

impl FieldPolicy for DistinctExchangeEndpoints {
    fn before_create(&self, record: &mut Record) -> CoreResult<()> {
        let source = record.get("source_account");
        if !source.is_null() && source == record.get("target_account") {
            return Err(CoreError::invalid_field(
                "exchange",
                "target_account",
                "source and target account must differ",
            ));
        }
        Ok(())
    }
}

/// Builds the validated schema registry for the ledger entity graph.
///
/// Entity names: `client`, `node`, `address`, `relationship`, `account`,
/// `account_request`, `exchange`, `exchange_rate`.
pub fn ledger_registry() -> CoreResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();

    registry.register(
        EntitySchema::new("client", "clients")
            .key("name")
            .column("name", "name"),
    )?;

    // Node names are unique across the whole server, not per client.
    registry.register(
        EntitySchema::new("node", "nodes")
            .key("name")
            .column("name", "name")
            .reference("client", "client", "client_id"),
    )?;

    registry.register(
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
    )?;

    // Second phase: Node's side of the Node<->Address cycle.
    registry.patch_many_to_many(
        "node",
        "addresses",
        ManyToMany {
            target: "address".to_string(),
            table: "node_addresses".to_string(),
            local_column: "node_id".to_string(),
            remote_column: "address_id".to_string(),
        },
    )?;

    registry.register(
        EntitySchema::new("relationship", "relationships")
            .key("id")
            .column("id", "id"),
    )?;

    registry.register(
        EntitySchema::new("account", "accounts")
            .key("name")
            .column("name", "name")
            .reference("relationship", "relationship", "relationship_id")
            .reference("node", "node", "node_id")
            .column("is_active", "is_active")
            .column("balance", "balance")
            .version_group("account_limits", "account_id")
            .versioned("upper_limit", "upper_limit")
            .versioned("lower_limit", "lower_limit")
            .versioned("limits_effective_time", EFFECTIVE_TIME_COLUMN)
            .versioned("limits_expiry_time", EXPIRY_TIME_COLUMN),
    )?;

    registry.register(
        EntitySchema::new("account_request", "account_requests")
            .key("relationship")
            .reference("relationship", "relationship", "relationship_id")
            .reference("source_address", "address", "source_address_id")
            .reference("dest_address", "address", "dest_address_id")
            .column("note", "note"),
    )?;

    registry.register(
        EntitySchema::new("exchange_rate", "exchange_rates")
            .key("name")
            .column("name", "name")
            .reference("client", "client", "client_id")
            .version_group("exchange_rate_values", "rate_id")
            .versioned("rate", "value")
            .versioned("effective_time", EFFECTIVE_TIME_COLUMN)
            .versioned("expiry_time", EXPIRY_TIME_COLUMN),
    )?;

    registry.register(
        EntitySchema::new("exchange", "exchanges")
            .key("source_account")
            .key("target_account")
            .reference("source_account", "account", "source_account_id")
            .reference("target_account", "account", "target_account_id")
            .derived_relation(DerivedRelation {
                field: "rate".to_string(),
                target: "exchange_rate".to_string(),
                table: "exchange_exchange_rates".to_string(),
                parent_column: "exchange_id".to_string(),
                target_column: "rate_id".to_string(),
            }),
    )?;

    registry.set_policy("relationship", Arc::new(GeneratedRelationshipId))?;
    registry.set_policy("account", Arc::new(AccountDefaults))?;
    registry.set_policy("exchange", Arc::new(DistinctExchangeEndpoints))?;

    registry.validate()?;
    Ok(registry)
}
