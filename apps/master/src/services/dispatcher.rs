// [apps/master/src/services/dispatcher.rs]
/*!
 * =================================================================
 * APARATO: TASK DISPATCH SERVICE (V4.4 - LEAST LOADED)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: SELECCIÓN DE AGENTE, CAS DE DESPACHO Y PLAZOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ELIGIBILITY CONTRACT: Un agente es elegible si está online, posee
 *    la capacidad que exige la herramienta y su carga vive bajo el
 *    tope; menor carga primero, empate por latido más antiguo.
 * 2. BACKPRESSURE: Sin agente elegible la tarea permanece 'pending' y
 *    se reconsidera en el próximo tick; sin bucles calientes ni colas
 *    sin límite.
 * 3. CAS HUMILITY: Perder el CAS no es un fallo: otro daemon ganó la
 *    carrera y el despachador simplemente re-selecciona.
 * =================================================================
 */

use crate::state::AppState;
use neoscan_domain_models::task::{AgentTask, TaskCategory};
use neoscan_infra_db::StoreError;
use tracing::{debug, info, instrument, warn};

/// Despachador de tareas de categoría agente.
pub struct TaskDispatchService {
    state: AppState,
}

impl TaskDispatchService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /**
     * Despacha un lote de tareas pendientes de categoría agente.
     * Retorna la cantidad efectivamente despachada.
     */
    #[instrument(skip(self))]
    pub async fn dispatch_pending_batch(&self, batch_limit: u32) -> Result<u64, StoreError> {
        let pending_batch = self
            .state
            .task_repository
            .fetch_pending(TaskCategory::Agent, batch_limit)
            .await?;

        let mut dispatched_count = 0u64;
        for pending_task in &pending_batch {
            match self.dispatch_single_task(pending_task).await {
                Ok(true) => dispatched_count += 1,
                Ok(false) => {}
                Err(dispatch_fault) => {
                    warn!(
                        "⚠️ [DISPATCH]: Task {} iteration aborted: {}",
                        pending_task.task_id, dispatch_fault
                    );
                }
            }
        }
        Ok(dispatched_count)
    }

    /**
     * Selección y reclamo CAS de una tarea individual.
     */
    async fn dispatch_single_task(&self, pending_task: &AgentTask) -> Result<bool, StoreError> {
        let required_capability = self.resolve_required_capability(&pending_task.tool_name).await?;

        let eligible_candidates = self
            .state
            .agent_repository
            .find_eligible_agents(&required_capability, self.state.config.agent_capacity_limit)
            .await?;

        let Some(selected_agent) = eligible_candidates.first() else {
            // Backpressure: sin candidato la tarea espera al próximo tick.
            debug!(
                "💤 [DISPATCH]: No eligible unit for '{}' (capability '{}'); task {} held.",
                pending_task.tool_name, required_capability, pending_task.task_id
            );
            return Ok(false);
        };

        match self
            .state
            .task_repository
            .claim_for_dispatch(&pending_task.task_id, &selected_agent.agent_id)
            .await
        {
            Ok(()) => {
                info!(
                    "🚀 [DISPATCH]: Task {} -> unit {} (load {}).",
                    pending_task.task_id, selected_agent.agent_id, selected_agent.running_tasks
                );
                Ok(true)
            }
            Err(StoreError::CasConflict) => {
                // Otro despachador ganó la carrera: re-selección futura.
                debug!("🔁 [DISPATCH]: CAS lost for task {}; re-selecting next tick.", pending_task.task_id);
                Ok(false)
            }
            Err(other_fault) => Err(other_fault),
        }
    }

    /**
     * Resuelve la capacidad que exige una herramienta consultando el
     * catálogo; una herramienta no catalogada exige su propio nombre.
     */
    async fn resolve_required_capability(&self, tool_name: &str) -> Result<String, StoreError> {
        let capability_catalog = self.state.agent_repository.list_capability_catalog().await?;
        for catalog_entry in &capability_catalog {
            if catalog_entry.tool_names.iter().any(|owned| owned == tool_name) {
                return Ok(catalog_entry.name.clone());
            }
        }
        Ok(tool_name.to_string())
    }

    /**
     * Barrido de plazos de etapa y reintentos acotados: toda tarea
     * despachada con plazo vencido sella 'failed' y regresa a
     * 'pending' mientras conserve reintentos.
     */
    #[instrument(skip(self))]
    pub async fn sweep_timeouts_and_retries(&self) -> Result<u64, StoreError> {
        let expired_tasks = self.state.task_repository.sweep_expired_dispatches().await?;

        let mut requeued_count = 0u64;
        for expired_task_id in &expired_tasks {
            let expired_task = self.state.task_repository.get(expired_task_id).await?;
            let owning_stage = self
                .state
                .project_repository
                .get_stage(&expired_task.stage_id)
                .await?;

            if self
                .state
                .task_repository
                .requeue_for_retry(expired_task_id, owning_stage.execution_policy.retry_limit)
                .await?
            {
                requeued_count += 1;
            }
        }

        // Reintentos de fallos reportados (no solo plazos vencidos).
        // Recorre proyectos running para re-encolar fallos con crédito.
        let running_projects = self.state.project_repository.fetch_running_projects().await?;
        for running_project in &running_projects {
            for workflow in self
                .state
                .project_repository
                .fetch_workflows(&running_project.project_id)
                .await?
            {
                for scan_stage in self
                    .state
                    .project_repository
                    .fetch_stages(&workflow.workflow_id)
                    .await?
                {
                    let retryable_failures = self
                        .state
                        .task_repository
                        .fetch_retryable_failures(
                            &running_project.project_id,
                            &scan_stage.stage_id,
                            scan_stage.execution_policy.retry_limit,
                        )
                        .await?;
                    for failed_task_id in &retryable_failures {
                        if self
                            .state
                            .task_repository
                            .requeue_for_retry(
                                failed_task_id,
                                scan_stage.execution_policy.retry_limit,
                            )
                            .await?
                        {
                            requeued_count += 1;
                        }
                    }
                }
            }
        }

        Ok(requeued_count)
    }
}
