// [libs/infra/db/src/repositories/rule_repository.rs]
/*!
 * =================================================================
 * APARATO: FINGERPRINT RULE REPOSITORY (V3.3 - ROLLBACK VERDADERO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: REGLAS DISTRIBUIBLES, BACKUPS Y ROLLBACK TOTAL
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CANONICAL ORDER: El listado habilitado se sirve siempre ordenado
 *    por (rule_file, content): es el orden del flujo canónico que
 *    sella el version_hash del snapshot.
 * 2. CUSTOM OVERWRITE: Una importación con source='custom' reemplaza
 *    íntegramente las filas custom previas y preserva las builtin.
 * 3. TRUE ROLLBACK: Restaurar un backup elimina TODAS las filas vivas
 *    (incluidas las sucias posteriores) y re-inserta el estado
 *    respaldado, dentro de una transacción.
 * =================================================================
 */

use crate::errors::StoreError;
use crate::StoreClient;
use libsql::params;
use neoscan_domain_models::fingerprint::FingerprintRule;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Repositorio de autoridad única para las reglas de huellas.
pub struct RuleRepository {
    database_client: StoreClient,
}

impl RuleRepository {
    pub fn new(client: StoreClient) -> Self {
        Self {
            database_client: client,
        }
    }

    /**
     * Reglas habilitadas en orden canónico (archivo, contenido).
     */
    pub async fn list_enabled_canonical(&self) -> Result<Vec<FingerprintRule>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut rules_probe = database_connection
            .query(
                "SELECT rule_id, rule_file, content, enabled, source
                 FROM fingerprint_rules WHERE enabled = 1
                 ORDER BY rule_file ASC, content ASC",
                (),
            )
            .await?;

        let mut canonical_rules = Vec::new();
        while let Some(rule_row) = rules_probe.next().await? {
            canonical_rules.push(FingerprintRule {
                rule_id: rule_row.get(0)?,
                rule_file: rule_row.get(1)?,
                content: rule_row.get(2)?,
                enabled: rule_row.get::<i64>(3)? != 0,
                source: rule_row.get(4)?,
            });
        }
        Ok(canonical_rules)
    }

    /// Cantidad de archivos lógicos habilitados del snapshot.
    pub async fn count_enabled_files(&self) -> Result<u32, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut count_probe = database_connection
            .query(
                "SELECT COUNT(DISTINCT rule_file) FROM fingerprint_rules WHERE enabled = 1",
                (),
            )
            .await?;
        let count_row = count_probe.next().await?.ok_or(StoreError::NotFound)?;
        Ok(count_row.get::<i64>(0)?.max(0) as u32)
    }

    /**
     * Importación mutante con backup previo automático.
     * source='custom' reescribe las filas custom; otras fuentes anexan.
     */
    #[instrument(skip(self, incoming_rules))]
    pub async fn import_rules(
        &self,
        incoming_rules: &[(String, String, bool)],
        source: &str,
    ) -> Result<String, StoreError> {
        let backup_identifier = self.create_backup().await?;

        let database_connection = self.database_client.get_connection()?;
        let import_transaction = database_connection.transaction().await?;

        if source == "custom" {
            let replaced_rows = import_transaction
                .execute("DELETE FROM fingerprint_rules WHERE source = 'custom'", ())
                .await?;
            if replaced_rows > 0 {
                warn!("♻️ [RULE_IMPORT]: {} custom rows overwritten.", replaced_rows);
            }
        }

        for (rule_file, content, enabled) in incoming_rules {
            import_transaction
                .execute(
                    "INSERT INTO fingerprint_rules (rule_file, content, enabled, source, updated_at)
                     VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)",
                    params![rule_file.clone(), content.clone(), *enabled as i64, source],
                )
                .await?;
        }

        import_transaction.commit().await?;
        info!("📦 [RULE_IMPORT]: {} rules imported (source '{}'); backup {}.",
            incoming_rules.len(), source, backup_identifier);
        Ok(backup_identifier)
    }

    /**
     * Backup con marca temporal del estado íntegro de las reglas.
     */
    #[instrument(skip(self))]
    pub async fn create_backup(&self) -> Result<String, StoreError> {
        let database_connection = self.database_client.get_connection()?;

        let mut snapshot_probe = database_connection
            .query(
                "SELECT rule_file, content, enabled, source FROM fingerprint_rules
                 ORDER BY rule_id ASC",
                (),
            )
            .await?;

        let mut snapshot_rows: Vec<serde_json::Value> = Vec::new();
        while let Some(snapshot_row) = snapshot_probe.next().await? {
            snapshot_rows.push(serde_json::json!({
                "rule_file": snapshot_row.get::<String>(0)?,
                "content": snapshot_row.get::<String>(1)?,
                "enabled": snapshot_row.get::<i64>(2)? != 0,
                "source": snapshot_row.get::<String>(3)?,
            }));
        }

        let backup_identifier = Uuid::new_v4().to_string();
        database_connection
            .execute(
                "INSERT INTO rule_backups (backup_id, rules_json) VALUES (?1, ?2)",
                params![
                    backup_identifier.clone(),
                    serde_json::Value::Array(snapshot_rows).to_string()
                ],
            )
            .await?;

        Ok(backup_identifier)
    }

    /**
     * Rollback verdadero: purga todas las filas vivas (incluidas las
     * sucias posteriores al backup) y restaura el estado respaldado.
     */
    #[instrument(skip(self))]
    pub async fn rollback_to_backup(&self, backup_id: &str) -> Result<u64, StoreError> {
        let database_connection = self.database_client.get_connection()?;

        let mut backup_probe = database_connection
            .query(
                "SELECT rules_json FROM rule_backups WHERE backup_id = ?1",
                params![backup_id],
            )
            .await?;
        let backup_row = backup_probe.next().await?.ok_or(StoreError::NotFound)?;
        let raw_backup: String = backup_row.get(0)?;
        let backup_rows: Vec<serde_json::Value> = serde_json::from_str(&raw_backup)
            .map_err(|parse_fault| StoreError::MappingError(parse_fault.to_string()))?;

        let rollback_transaction = database_connection.transaction().await?;

        rollback_transaction
            .execute("DELETE FROM fingerprint_rules", ())
            .await?;

        for backup_entry in &backup_rows {
            rollback_transaction
                .execute(
                    "INSERT INTO fingerprint_rules (rule_file, content, enabled, source, updated_at)
                     VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)",
                    params![
                        backup_entry["rule_file"].as_str().unwrap_or_default(),
                        backup_entry["content"].as_str().unwrap_or_default(),
                        backup_entry["enabled"].as_bool().unwrap_or(true) as i64,
                        backup_entry["source"].as_str().unwrap_or("builtin")
                    ],
                )
                .await?;
        }

        rollback_transaction.commit().await?;
        info!("⏪ [RULE_ROLLBACK]: State restored to backup {} ({} rows).", backup_id, backup_rows.len());
        Ok(backup_rows.len() as u64)
    }

    /**
     * Conmutador de habilitación de una regla individual.
     */
    pub async fn toggle_rule(&self, rule_id: i64, enabled: bool) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE fingerprint_rules
                 SET enabled = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE rule_id = ?1",
                params![rule_id, enabled as i64],
            )
            .await?;
        if affected_rows == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
