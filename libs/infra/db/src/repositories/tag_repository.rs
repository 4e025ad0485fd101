// [libs/infra/db/src/repositories/tag_repository.rs]
/*!
 * =================================================================
 * APARATO: TAG TREE REPOSITORY (V3.7 - MATERIALIZED PATH)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ÁRBOL JERÁRQUICO, SINCRONÍA POR PROVENANCE Y ACTIVOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CASCADE ATOMICITY: Mover un nodo reescribe path y level de TODO
 *    su subárbol dentro de una única transacción; un fallo revierte
 *    el árbol completo al estado previo.
 * 2. CYCLE SHIELD: El movimiento bajo un descendiente propio se
 *    rechaza ANTES de mutar, con veredicto CycleRejected.
 * 3. SOURCE ISOLATION: La sincronía de etiquetas de entidad opera
 *    exclusivamente dentro del provenance indicado; las filas de otros
 *    orígenes permanecen intactas bit-a-bit.
 * =================================================================
 */

use crate::errors::StoreError;
use crate::StoreClient;
use libsql::{params, Row};
use neoscan_domain_models::tag::{EntityTag, MatchOperator, MatchRule, Tag, TagSource};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Repositorio de autoridad única para el árbol de etiquetas.
pub struct TagRepository {
    database_client: StoreClient,
}

impl TagRepository {
    pub fn new(client: StoreClient) -> Self {
        Self {
            database_client: client,
        }
    }

    /**
     * Alta de un nodo: path y level se derivan del padre.
     * Un padre ausente produce un nodo raíz (path "/", level 0).
     */
    #[instrument(skip(self))]
    pub async fn create_tag(
        &self,
        name: &str,
        parent_id: Option<i64>,
        category: Option<&str>,
    ) -> Result<Tag, StoreError> {
        let database_connection = self.database_client.get_connection()?;

        let (computed_path, computed_level) = match parent_id {
            None => ("/".to_string(), 0u32),
            Some(parent_identifier) => {
                let parent_node = self.get_tag(parent_identifier).await?;
                (parent_node.subtree_prefix(), parent_node.level + 1)
            }
        };

        database_connection
            .execute(
                "INSERT INTO tags (name, parent_id, path, level, category)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    name,
                    parent_id,
                    computed_path.clone(),
                    computed_level as i64,
                    category
                ],
            )
            .await?;

        let mut created_probe = database_connection
            .query("SELECT last_insert_rowid()", ())
            .await?;
        let created_row = created_probe.next().await?.ok_or(StoreError::TransactionError)?;
        let created_tag_id: i64 = created_row.get(0)?;

        Ok(Tag {
            tag_id: created_tag_id,
            name: name.to_string(),
            parent_id,
            path: computed_path,
            level: computed_level,
            category: category.map(|label| label.to_string()),
        })
    }

    pub async fn get_tag(&self, tag_id: i64) -> Result<Tag, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut tag_probe = database_connection
            .query(
                "SELECT tag_id, name, parent_id, path, level, category FROM tags WHERE tag_id = ?1",
                params![tag_id],
            )
            .await?;

        match tag_probe.next().await? {
            Some(tag_row) => map_row_to_tag(&tag_row),
            None => Err(StoreError::NotFound),
        }
    }

    /**
     * Movimiento de un nodo bajo un nuevo padre con cascada de subárbol.
     *
     * # Errors:
     * - `StoreError::CycleRejected`: El nuevo padre pertenece al subárbol
     *   del nodo movido (o es el propio nodo). Sin mutación alguna.
     */
    #[instrument(skip(self))]
    pub async fn move_tag(&self, tag_id: i64, new_parent_id: Option<i64>) -> Result<(), StoreError> {
        let moving_node = self.get_tag(tag_id).await?;
        let old_subtree_prefix = moving_node.subtree_prefix();

        let (new_path, new_level) = match new_parent_id {
            None => ("/".to_string(), 0u32),
            Some(parent_identifier) => {
                if parent_identifier == tag_id {
                    return Err(StoreError::CycleRejected);
                }
                let destination_parent = self.get_tag(parent_identifier).await?;

                // Escudo de ciclos: el destino no puede vivir bajo el nodo movido.
                if destination_parent.path.starts_with(&old_subtree_prefix) {
                    warn!("🚫 [TAG_TREE]: Move of {} under descendant {} rejected.", tag_id, parent_identifier);
                    return Err(StoreError::CycleRejected);
                }
                (destination_parent.subtree_prefix(), destination_parent.level + 1)
            }
        };

        let new_subtree_prefix = format!("{}{}/", new_path, tag_id);
        let level_delta = new_level as i64 - moving_node.level as i64;

        let database_connection = self.database_client.get_connection()?;
        let tree_transaction = database_connection.transaction().await?;

        tree_transaction
            .execute(
                "UPDATE tags SET parent_id = ?2, path = ?3, level = ?4 WHERE tag_id = ?1",
                params![tag_id, new_parent_id, new_path.clone(), new_level as i64],
            )
            .await?;

        // Cascada: todo descendiente intercambia el prefijo antiguo por el
        // nuevo y desplaza su nivel por el delta del movimiento.
        tree_transaction
            .execute(
                "UPDATE tags
                 SET path = ?2 || substr(path, length(?1) + 1),
                     level = level + ?3
                 WHERE path LIKE ?1 || '%'",
                params![old_subtree_prefix.clone(), new_subtree_prefix, level_delta],
            )
            .await?;

        tree_transaction.commit().await?;
        info!("🌳 [TAG_TREE]: Tag {} relocated; subtree prefix '{}' rewritten.", tag_id, old_subtree_prefix);
        Ok(())
    }

    /// Descendencia completa de un nodo (por prefijo materializado).
    pub async fn fetch_subtree(&self, tag_id: i64) -> Result<Vec<Tag>, StoreError> {
        let root_node = self.get_tag(tag_id).await?;
        let database_connection = self.database_client.get_connection()?;
        let mut subtree_probe = database_connection
            .query(
                "SELECT tag_id, name, parent_id, path, level, category
                 FROM tags WHERE path LIKE ?1 || '%'
                 ORDER BY level ASC, tag_id ASC",
                params![root_node.subtree_prefix()],
            )
            .await?;

        let mut descendant_nodes = Vec::new();
        while let Some(subtree_row) = subtree_probe.next().await? {
            descendant_nodes.push(map_row_to_tag(&subtree_row)?);
        }
        Ok(descendant_nodes)
    }

    /**
     * Sincronía por diff dentro de un único provenance: inserta los
     * vínculos faltantes, elimina los sobrantes y jamás toca filas de
     * otros orígenes. Todo dentro de una transacción.
     */
    #[instrument(skip(self, desired_assignments), fields(entity = %entity_id, source = source.as_str()))]
    pub async fn sync_entity_tags(
        &self,
        entity_type: &str,
        entity_id: &str,
        desired_assignments: &[(i64, Option<i64>)],
        source: TagSource,
    ) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;

        let mut existing_probe = database_connection
            .query(
                "SELECT tag_id FROM entity_tags
                 WHERE entity_type = ?1 AND entity_id = ?2 AND source = ?3",
                params![entity_type, entity_id, source.as_str()],
            )
            .await?;

        let mut existing_tag_ids: Vec<i64> = Vec::new();
        while let Some(existing_row) = existing_probe.next().await? {
            existing_tag_ids.push(existing_row.get(0)?);
        }

        let sync_transaction = database_connection.transaction().await?;

        // Inserciones: vínculos deseados aún ausentes.
        for (desired_tag_id, producing_rule_id) in desired_assignments {
            if !existing_tag_ids.contains(desired_tag_id) {
                sync_transaction
                    .execute(
                        "INSERT OR IGNORE INTO entity_tags (entity_type, entity_id, tag_id, source, rule_id)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            entity_type,
                            entity_id,
                            *desired_tag_id,
                            source.as_str(),
                            *producing_rule_id
                        ],
                    )
                    .await?;
            }
        }

        // Eliminaciones: vínculos del MISMO origen que ya no se desean.
        for stale_tag_id in existing_tag_ids
            .iter()
            .filter(|existing| !desired_assignments.iter().any(|(desired, _)| desired == *existing))
        {
            sync_transaction
                .execute(
                    "DELETE FROM entity_tags
                     WHERE entity_type = ?1 AND entity_id = ?2 AND tag_id = ?3 AND source = ?4",
                    params![entity_type, entity_id, *stale_tag_id, source.as_str()],
                )
                .await?;
        }

        sync_transaction.commit().await?;
        debug!("🔄 [ENTITY_TAGS]: Source '{}' converged to {} links.", source.as_str(), desired_assignments.len());
        Ok(())
    }

    /// Vínculos completos de una entidad, todos los orígenes.
    pub async fn list_entity_tags(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<EntityTag>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut links_probe = database_connection
            .query(
                "SELECT entity_type, entity_id, tag_id, source, rule_id
                 FROM entity_tags WHERE entity_type = ?1 AND entity_id = ?2
                 ORDER BY tag_id ASC",
                params![entity_type, entity_id],
            )
            .await?;

        let mut entity_links = Vec::new();
        while let Some(link_row) = links_probe.next().await? {
            let source_label: String = link_row.get(3)?;
            entity_links.push(EntityTag {
                entity_type: link_row.get(0)?,
                entity_id: link_row.get(1)?,
                tag_id: link_row.get(2)?,
                source: TagSource::parse(&source_label).ok_or_else(|| {
                    StoreError::MappingError(format!("provenance desconocido '{}'", source_label))
                })?,
                rule_id: link_row.get(4)?,
            });
        }
        Ok(entity_links)
    }

    /// Reglas habilitadas de un tipo de entidad, por prioridad ascendente.
    pub async fn fetch_match_rules(&self, entity_type: &str) -> Result<Vec<MatchRule>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut rules_probe = database_connection
            .query(
                "SELECT rule_id, entity_type, field, operator, value, ignore_case, priority, enabled, tag_id
                 FROM match_rules WHERE entity_type = ?1 AND enabled = 1
                 ORDER BY priority ASC, rule_id ASC",
                params![entity_type],
            )
            .await?;

        let mut enabled_rules = Vec::new();
        while let Some(rule_row) = rules_probe.next().await? {
            let operator_label: String = rule_row.get(3)?;
            enabled_rules.push(MatchRule {
                rule_id: rule_row.get(0)?,
                entity_type: rule_row.get(1)?,
                field: rule_row.get(2)?,
                operator: MatchOperator::parse(&operator_label).ok_or_else(|| {
                    StoreError::MappingError(format!("operador desconocido '{}'", operator_label))
                })?,
                value: rule_row.get(4)?,
                ignore_case: rule_row.get::<i64>(5)? != 0,
                priority: rule_row.get(6)?,
                enabled: rule_row.get::<i64>(7)? != 0,
                tag_id: rule_row.get(8)?,
            });
        }
        Ok(enabled_rules)
    }

    pub async fn insert_match_rule(&self, rule: &MatchRule) -> Result<i64, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO match_rules (entity_type, field, operator, value, ignore_case, priority, enabled, tag_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    rule.entity_type.clone(),
                    rule.field.clone(),
                    rule.operator.as_str(),
                    rule.value.clone(),
                    rule.ignore_case as i64,
                    rule.priority,
                    rule.enabled as i64,
                    rule.tag_id
                ],
            )
            .await?;

        let mut created_probe = database_connection
            .query("SELECT last_insert_rowid()", ())
            .await?;
        let created_row = created_probe.next().await?.ok_or(StoreError::TransactionError)?;
        created_row.get::<i64>(0).map_err(StoreError::from)
    }

    // --- ESTRATO DE ACTIVOS (GRAFO DEDUPLICADO) ---

    /**
     * Registro idempotente de un activo descubierto con sus atributos.
     */
    pub async fn upsert_asset(
        &self,
        entity_type: &str,
        entity_id: &str,
        attributes: &Value,
    ) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO assets (entity_id, entity_type, attributes)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                        attributes = excluded.attributes",
                params![entity_id, entity_type, attributes.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Activos de un tipo con su mapa de atributos hidratado.
    pub async fn fetch_assets(
        &self,
        entity_type: &str,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut assets_probe = database_connection
            .query(
                "SELECT entity_id, attributes FROM assets WHERE entity_type = ?1
                 ORDER BY entity_id ASC",
                params![entity_type],
            )
            .await?;

        let mut hydrated_assets = Vec::new();
        while let Some(asset_row) = assets_probe.next().await? {
            let raw_attributes: String = asset_row.get(1)?;
            hydrated_assets.push((
                asset_row.get::<String>(0)?,
                serde_json::from_str(&raw_attributes).unwrap_or(Value::Null),
            ));
        }
        Ok(hydrated_assets)
    }

    /**
     * Baja definitiva de un activo con cascada de sus etiquetas.
     */
    #[instrument(skip(self))]
    pub async fn delete_asset(&self, entity_type: &str, entity_id: &str) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "DELETE FROM assets WHERE entity_type = ?1 AND entity_id = ?2",
                params![entity_type, entity_id],
            )
            .await?;
        if affected_rows == 0 {
            return Err(StoreError::NotFound);
        }
        database_connection
            .execute(
                "DELETE FROM entity_tags WHERE entity_type = ?1 AND entity_id = ?2",
                params![entity_type, entity_id],
            )
            .await?;
        info!("🗑️ [ASSETS]: Entity {}/{} purged with tag cascade.", entity_type, entity_id);
        Ok(())
    }
}

fn map_row_to_tag(tag_row: &Row) -> Result<Tag, StoreError> {
    Ok(Tag {
        tag_id: tag_row.get(0)?,
        name: tag_row.get(1)?,
        parent_id: tag_row.get(2)?,
        path: tag_row.get(3)?,
        level: tag_row.get::<i64>(4)?.max(0) as u32,
        category: tag_row.get(5)?,
    })
}
