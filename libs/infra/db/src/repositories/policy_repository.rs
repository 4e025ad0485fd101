// [libs/infra/db/src/repositories/policy_repository.rs]
/*!
 * =================================================================
 * APARATO: SCOPE POLICY REPOSITORY (V3.1 - PERIMETER VAULT)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DE LISTA BLANCA Y POLÍTICAS DE OMISIÓN
 * =================================================================
 */

use crate::errors::StoreError;
use crate::StoreClient;
use libsql::params;
use neoscan_domain_models::policy::{SkipPolicy, WhitelistRule, WhitelistTargetType};
use tracing::instrument;

/// Repositorio de autoridad única para las políticas de alcance.
pub struct PolicyRepository {
    database_client: StoreClient,
}

impl PolicyRepository {
    pub fn new(client: StoreClient) -> Self {
        Self {
            database_client: client,
        }
    }

    /**
     * Reglas de lista blanca habilitadas, opcionalmente acotadas a un
     * ámbito. Orden estable por rule_id: la primera que bloquea gana.
     */
    #[instrument(skip(self))]
    pub async fn fetch_enabled_whitelist(
        &self,
        scope: Option<&str>,
    ) -> Result<Vec<WhitelistRule>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut rules_probe = database_connection
            .query(
                "SELECT rule_id, target_type, value, enabled, scope
                 FROM whitelist_rules
                 WHERE enabled = 1 AND (scope IS NULL OR ?1 IS NULL OR scope = ?1)
                 ORDER BY rule_id ASC",
                params![scope],
            )
            .await?;

        let mut enabled_rules = Vec::new();
        while let Some(rule_row) = rules_probe.next().await? {
            let type_label: String = rule_row.get(1)?;
            enabled_rules.push(WhitelistRule {
                rule_id: rule_row.get(0)?,
                target_type: WhitelistTargetType::parse(&type_label).ok_or_else(|| {
                    StoreError::MappingError(format!("target_type desconocido '{}'", type_label))
                })?,
                value: rule_row.get(2)?,
                enabled: rule_row.get::<i64>(3)? != 0,
                scope: rule_row.get(4)?,
            });
        }
        Ok(enabled_rules)
    }

    pub async fn insert_whitelist_rule(&self, rule: &WhitelistRule) -> Result<i64, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO whitelist_rules (target_type, value, enabled, scope)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    rule.target_type.as_str(),
                    rule.value.clone(),
                    rule.enabled as i64,
                    rule.scope.clone()
                ],
            )
            .await?;

        let mut created_probe = database_connection
            .query("SELECT last_insert_rowid()", ())
            .await?;
        let created_row = created_probe.next().await?.ok_or(StoreError::TransactionError)?;
        created_row.get::<i64>(0).map_err(StoreError::from)
    }

    /**
     * Políticas de omisión habilitadas con sus condiciones hidratadas.
     */
    #[instrument(skip(self))]
    pub async fn fetch_enabled_skip_policies(
        &self,
        scope: Option<&str>,
    ) -> Result<Vec<SkipPolicy>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut policies_probe = database_connection
            .query(
                "SELECT policy_id, name, enabled, scope, condition_rules
                 FROM skip_policies
                 WHERE enabled = 1 AND (scope IS NULL OR ?1 IS NULL OR scope = ?1)
                 ORDER BY policy_id ASC",
                params![scope],
            )
            .await?;

        let mut enabled_policies = Vec::new();
        while let Some(policy_row) = policies_probe.next().await? {
            let raw_conditions: String = policy_row.get(4)?;
            enabled_policies.push(SkipPolicy {
                policy_id: policy_row.get(0)?,
                name: policy_row.get(1)?,
                enabled: policy_row.get::<i64>(2)? != 0,
                scope: policy_row.get(3)?,
                condition_rules: serde_json::from_str(&raw_conditions).map_err(|parse_fault| {
                    StoreError::MappingError(format!(
                        "condition_rules corrupto en política: {}",
                        parse_fault
                    ))
                })?,
            });
        }
        Ok(enabled_policies)
    }

    pub async fn insert_skip_policy(&self, policy: &SkipPolicy) -> Result<i64, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO skip_policies (name, enabled, scope, condition_rules)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    policy.name.clone(),
                    policy.enabled as i64,
                    policy.scope.clone(),
                    serde_json::to_string(&policy.condition_rules)
                        .map_err(|fault| StoreError::MappingError(fault.to_string()))?
                ],
            )
            .await?;

        let mut created_probe = database_connection
            .query("SELECT last_insert_rowid()", ())
            .await?;
        let created_row = created_probe.next().await?.ok_or(StoreError::TransactionError)?;
        created_row.get::<i64>(0).map_err(StoreError::from)
    }
}
