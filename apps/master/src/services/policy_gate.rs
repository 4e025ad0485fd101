// [apps/master/src/services/policy_gate.rs]
/*!
 * =================================================================
 * APARATO: POLICY ENFORCEMENT GATE (V4.2 - PERIMETER GUARDIAN)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: VETO DE TAREAS ANTES DE TODO DESPACHO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ORDER DISCIPLINE: Lista blanca primero, políticas de omisión
 *    después; la primera regla que bloquea gana y su razón viaja al
 *    planificador.
 * 2. NORMAL OUTCOME: Un bloqueo NO es un error del sistema: es un
 *    veredicto que transiciona la tarea a 'skipped'.
 * =================================================================
 */

use crate::state::AppState;
use neoscan_domain_models::policy::PolicyBlock;
use neoscan_domain_models::project::Project;
use neoscan_domain_models::task::AgentTask;
use neoscan_domain_rules::condition::{skip_policy_applies, AttributeMap, REASON_PROJECT_SKIPPED};
use neoscan_domain_rules::target_match::evaluate_whitelist;
use neoscan_infra_db::StoreError;
use serde_json::json;
use tracing::{debug, instrument};

/// Ejecutor de políticas invocado una vez por tarea antes del despacho.
pub struct PolicyEnforcer {
    state: AppState,
}

impl PolicyEnforcer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /**
     * Veredicto de alcance para una tarea y su proyecto dueño.
     *
     * # Returns:
     * - `Ok(None)`: La tarea está autorizada para despacho.
     * - `Ok(Some(PolicyBlock))`: Bloqueada; la razón es estable.
     */
    #[instrument(skip(self, task_artifact, owning_project), fields(task = %task_artifact.task_id, target = %task_artifact.input_target))]
    pub async fn enforce(
        &self,
        task_artifact: &AgentTask,
        owning_project: &Project,
    ) -> Result<Option<PolicyBlock>, StoreError> {
        // 1. PERÍMETRO DE LISTA BLANCA (por objetivo)
        let whitelist_rules = self
            .state
            .policy_repository
            .fetch_enabled_whitelist(self.state.config.whitelist_scope.as_deref())
            .await?;

        if let Some(perimeter_block) = evaluate_whitelist(&whitelist_rules, &task_artifact.input_target)
        {
            debug!("⛔ [POLICY_GATE]: Target '{}' vetoed by rule {}.",
                task_artifact.input_target, perimeter_block.blocking_rule_id);
            return Ok(Some(perimeter_block));
        }

        // 2. POLÍTICAS DE OMISIÓN (por atributos del proyecto)
        let skip_policies = self
            .state
            .policy_repository
            .fetch_enabled_skip_policies(self.state.config.skip_policy_scope.as_deref())
            .await?;

        let project_attributes = project_attribute_map(owning_project);
        for skip_policy in &skip_policies {
            if skip_policy_applies(skip_policy, &project_attributes) {
                debug!("⛔ [POLICY_GATE]: Project '{}' vetoed by policy {}.",
                    owning_project.project_id, skip_policy.policy_id);
                return Ok(Some(PolicyBlock {
                    reason: REASON_PROJECT_SKIPPED.to_string(),
                    blocking_rule_id: skip_policy.policy_id,
                }));
            }
        }

        Ok(None)
    }
}

/// Proyección de un proyecto al mapa de atributos evaluable.
fn project_attribute_map(project: &Project) -> AttributeMap {
    json!({
        "project_id": project.project_id,
        "name": project.name,
        "environment": project.environment,
        "tags": project.tag_names,
        "status": project.status.as_str(),
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}
