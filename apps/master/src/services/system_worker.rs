// [apps/master/src/services/system_worker.rs]
/*!
 * =================================================================
 * APARATO: SYSTEM TASK WORKER (V4.3 - IN-PROCESS TOOLS)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EJECUCIÓN LOCAL DE HERRAMIENTAS 'sys_*'
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TABLE DISPATCH: Las herramientas de sistema viven en una tabla
 *    nominal nombre -> manejador; jamás reflexión, jamás strings
 *    mágicos dispersos.
 * 2. CATEGORY ISOLATION: El worker drena exclusivamente la cola
 *    'system'; las tareas de agente jamás se ejecutan en-proceso.
 * 3. VERDICT SEALING: Éxito sella 'completed'; cualquier error sella
 *    'failed' con su detalle; el daemon sobrevive a ambos.
 * =================================================================
 */

use crate::state::AppState;
use chrono::Utc;
use futures::future::BoxFuture;
use neoscan_domain_models::tag::TagSource;
use neoscan_domain_models::task::{AgentTask, TaskCategory, TaskResultReport, TaskStatus};
use neoscan_domain_rules::condition::{match_rule_applies, AttributeMap};
use neoscan_domain_models::tag::{MatchOperator, MatchRule};
use neoscan_infra_db::StoreError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};

/// Identidad con la que el worker local firma sus reportes.
const SYSTEM_WORKER_IDENTITY: &str = "system-worker";

/// Manejador de una herramienta de sistema (despacho por tabla).
type SystemToolHandler = fn(AppState, AgentTask) -> BoxFuture<'static, anyhow::Result<Value>>;

/// Worker local que drena y ejecuta la cola de tareas de sistema.
pub struct SystemTaskWorker {
    state: AppState,
    tool_table: HashMap<&'static str, SystemToolHandler>,
}

impl SystemTaskWorker {
    pub fn new(state: AppState) -> Self {
        let mut tool_table: HashMap<&'static str, SystemToolHandler> = HashMap::new();
        tool_table.insert("sys_tag_propagation", execute_tag_propagation);
        tool_table.insert("sys_asset_cleanup", execute_asset_cleanup);

        Self { state, tool_table }
    }

    /// Herramientas registradas (evidencia para diagnósticos).
    pub fn registered_tools(&self) -> Vec<&'static str> {
        let mut tool_names: Vec<&'static str> = self.tool_table.keys().copied().collect();
        tool_names.sort();
        tool_names
    }

    /**
     * Inicia el daemon del worker de sistema en el runtime de Tokio.
     */
    pub fn spawn_worker_daemon(self) {
        let poll_seconds = self.state.config.system_worker_interval_seconds.max(1);
        tokio::spawn(async move {
            let mut worker_ticker = interval(Duration::from_secs(poll_seconds));
            info!("🔧 [SYSTEM_WORKER_ACTIVE]: In-process tool daemon initiated ({}s poll).", poll_seconds);

            loop {
                worker_ticker.tick().await;
                if let Err(cycle_fault) = self.run_cycle(16).await {
                    error!("❌ [SYSTEM_WORKER_FAULT]: Cycle collapsed: {}", cycle_fault);
                }
            }
        });
    }

    /**
     * Un ciclo completo: drena pendientes de sistema y sella veredictos.
     * Retorna cuántas tareas procesó.
     */
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, batch_limit: u32) -> Result<u64, StoreError> {
        // El predicado de categoría es contractual: jamás cruzar colas.
        let system_batch = self
            .state
            .task_repository
            .fetch_pending(TaskCategory::System, batch_limit)
            .await?;

        let mut processed_count = 0u64;
        for system_task in system_batch {
            let task_id = system_task.task_id.clone();

            let execution_verdict = match self.tool_table.get(system_task.tool_name.as_str()) {
                Some(tool_handler) => tool_handler(self.state.clone(), system_task.clone()).await,
                None => Err(anyhow::anyhow!(
                    "unregistered system tool '{}'",
                    system_task.tool_name
                )),
            };

            let result_report = match execution_verdict {
                Ok(tool_output) => {
                    info!("✅ [SYSTEM_WORKER]: Task {} sealed as completed.", task_id);
                    TaskResultReport {
                        task_id: task_id.clone(),
                        agent_id: SYSTEM_WORKER_IDENTITY.to_string(),
                        status: TaskStatus::Completed,
                        results: tool_output,
                        error_detail: None,
                        reported_at: Utc::now(),
                    }
                }
                Err(tool_fault) => {
                    warn!("⚠️ [SYSTEM_WORKER]: Task {} sealed as failed: {}", task_id, tool_fault);
                    TaskResultReport {
                        task_id: task_id.clone(),
                        agent_id: SYSTEM_WORKER_IDENTITY.to_string(),
                        status: TaskStatus::Failed,
                        results: Value::Null,
                        error_detail: Some(tool_fault.to_string()),
                        reported_at: Utc::now(),
                    }
                }
            };

            self.state.task_repository.ingest_result(&result_report).await?;
            processed_count += 1;
        }

        Ok(processed_count)
    }
}

/// Hidrata la regla embebida en los parámetros de una herramienta.
fn hydrate_params_rule(raw_rule: &Value) -> anyhow::Result<MatchRule> {
    let field = raw_rule["field"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("rule.field absent"))?;
    let operator_label = raw_rule["operator"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("rule.operator absent"))?;
    let operator = MatchOperator::parse(operator_label)
        .ok_or_else(|| anyhow::anyhow!("unknown operator '{}'", operator_label))?;
    let value = raw_rule["value"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("rule.value absent"))?;

    Ok(MatchRule {
        rule_id: 0,
        entity_type: String::new(),
        field: field.to_string(),
        operator,
        value: value.to_string(),
        ignore_case: raw_rule["ignore_case"].as_bool().unwrap_or(true),
        priority: 0,
        enabled: true,
        tag_id: 0,
    })
}

fn params_entity_type(tool_params: &Value) -> String {
    tool_params["entity_type"]
        .as_str()
        .or_else(|| tool_params["target_type"].as_str())
        .unwrap_or("host")
        .to_string()
}

fn attributes_of(asset_attributes: &Value) -> AttributeMap {
    asset_attributes.as_object().cloned().unwrap_or_default()
}

/**
 * HERRAMIENTA: sys_tag_propagation
 * Aplica o remueve un conjunto de etiquetas (provenance 'auto') sobre
 * las entidades cuyo mapa de atributos satisface la regla embebida.
 */
fn execute_tag_propagation(
    state: AppState,
    system_task: AgentTask,
) -> BoxFuture<'static, anyhow::Result<Value>> {
    Box::pin(async move {
        let entity_type = params_entity_type(&system_task.tool_params);
        let embedded_rule = hydrate_params_rule(&system_task.tool_params["rule"])?;
        let action = system_task.tool_params["action"].as_str().unwrap_or("apply");
        let target_tag_ids: Vec<i64> = system_task.tool_params["tag_ids"]
            .as_array()
            .map(|ids| ids.iter().filter_map(|id| id.as_i64()).collect())
            .unwrap_or_default();

        if target_tag_ids.is_empty() {
            anyhow::bail!("tag_ids absent or empty");
        }

        let fleet_assets = state.tag_repository.fetch_assets(&entity_type).await?;
        let mut touched_entities = 0u64;

        for (entity_id, asset_attributes) in &fleet_assets {
            if !match_rule_applies(&embedded_rule, &attributes_of(asset_attributes)) {
                continue;
            }

            // Conjunto auto vigente -> aplicar/remover -> re-sincronizar.
            let current_links = state.tag_repository.list_entity_tags(&entity_type, entity_id).await?;
            let mut desired_auto: Vec<(i64, Option<i64>)> = current_links
                .iter()
                .filter(|link| link.source == TagSource::Auto)
                .map(|link| (link.tag_id, link.rule_id))
                .collect();

            match action {
                "remove" => {
                    desired_auto.retain(|(tag_id, _)| !target_tag_ids.contains(tag_id));
                }
                _ => {
                    for target_tag_id in &target_tag_ids {
                        if !desired_auto.iter().any(|(tag_id, _)| tag_id == target_tag_id) {
                            desired_auto.push((*target_tag_id, None));
                        }
                    }
                }
            }

            state
                .tag_repository
                .sync_entity_tags(&entity_type, entity_id, &desired_auto, TagSource::Auto)
                .await?;
            touched_entities += 1;
        }

        Ok(json!({
            "entity_type": entity_type,
            "action": action,
            "entities_touched": touched_entities,
        }))
    })
}

/**
 * HERRAMIENTA: sys_asset_cleanup
 * Elimina (con cascada de etiquetas) las entidades cuyo mapa de
 * atributos satisface la regla embebida.
 */
fn execute_asset_cleanup(
    state: AppState,
    system_task: AgentTask,
) -> BoxFuture<'static, anyhow::Result<Value>> {
    Box::pin(async move {
        let entity_type = params_entity_type(&system_task.tool_params);
        let embedded_rule = hydrate_params_rule(&system_task.tool_params["rule"])?;

        let fleet_assets = state.tag_repository.fetch_assets(&entity_type).await?;
        let mut purged_entities: Vec<String> = Vec::new();

        for (entity_id, asset_attributes) in &fleet_assets {
            if match_rule_applies(&embedded_rule, &attributes_of(asset_attributes)) {
                state.tag_repository.delete_asset(&entity_type, entity_id).await?;
                purged_entities.push(entity_id.clone());
            }
        }

        info!("🗑️ [SYS_CLEANUP]: {} entities purged.", purged_entities.len());
        Ok(json!({
            "entity_type": entity_type,
            "entities_purged": purged_entities,
        }))
    })
}
