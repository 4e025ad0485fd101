// [apps/master/src/services/scheduler.rs]
/*!
 * =================================================================
 * APARATO: WORKFLOW SCHEDULER SERVICE (V4.5 - STAGE LADDER)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: MATERIALIZACIÓN, VETO Y AVANCE ESTRICTO DE ETAPAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. STRICT LADDER: La etapa N+1 jamás materializa antes de que la
 *    etapa N sea terminal para ese proyecto; el orden entre proyectos
 *    no está garantizado.
 * 2. DETERMINISTIC SPLIT: Los objetivos se ordenan antes de partir el
 *    ámbito; la clave (project, stage, target) des-duplica los ticks.
 * 3. LOOP SHIELD: Un fallo en un proyecto aborta SU iteración y deja
 *    el resto del tick intacto; el daemon jamás muere por un error.
 *
 * # Mathematical Proof (Tick Idempotence):
 * Re-ejecutar un tick sin cambios externos produce cero tareas nuevas:
 * la materialización está sellada por la clave única del Ledger y el
 * veto de políticas solo transiciona tareas aún 'pending'.
 * =================================================================
 */

use crate::services::dispatcher::TaskDispatchService;
use crate::services::policy_gate::PolicyEnforcer;
use crate::state::AppState;
use chrono::Utc;
use neoscan_domain_models::project::{Project, ProjectStatus, ScanStage, TargetSplitPolicy};
use neoscan_domain_models::task::{AgentTask, TaskStatus};
use neoscan_infra_db::StoreError;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Reporte agregado de un tick del planificador (evidencia de tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct SchedulerTickReport {
    pub tasks_materialized: u64,
    pub tasks_skipped_by_policy: u64,
    pub tasks_dispatched: u64,
    pub tasks_requeued: u64,
    pub projects_completed: u64,
}

/// Bucle cooperativo único que convierte proyectos en tareas concretas.
pub struct WorkflowSchedulerService {
    state: AppState,
    policy_gate: PolicyEnforcer,
    dispatcher: TaskDispatchService,
}

impl WorkflowSchedulerService {
    pub fn new(state: AppState) -> Self {
        Self {
            policy_gate: PolicyEnforcer::new(state.clone()),
            dispatcher: TaskDispatchService::new(state.clone()),
            state,
        }
    }

    /**
     * Inicia el daemon del planificador en el runtime de Tokio.
     */
    pub fn spawn_scheduler_daemon(self) {
        let tick_seconds = self.state.config.scheduler_interval_seconds.max(1);
        tokio::spawn(async move {
            let mut scheduler_ticker = interval(Duration::from_secs(tick_seconds));
            info!("🗓️ [SCHEDULER_ACTIVE]: Workflow ladder daemon initiated ({}s tick).", tick_seconds);

            loop {
                scheduler_ticker.tick().await;
                match self.run_tick().await {
                    Ok(tick_report) => {
                        if tick_report.tasks_materialized > 0 || tick_report.tasks_dispatched > 0 {
                            info!(
                                "🗓️ [SCHEDULER_TICK]: {} materialized, {} skipped, {} dispatched, {} requeued.",
                                tick_report.tasks_materialized,
                                tick_report.tasks_skipped_by_policy,
                                tick_report.tasks_dispatched,
                                tick_report.tasks_requeued
                            );
                        }
                    }
                    Err(tick_fault) => {
                        // El error aborta la iteración, jamás el proceso.
                        error!("❌ [SCHEDULER_FAULT]: Tick collapsed: {}", tick_fault);
                    }
                }
            }
        });
    }

    /**
     * Un tick completo: proyectos running -> escalera de etapas ->
     * materialización -> veto de políticas -> despacho.
     */
    #[instrument(skip(self))]
    pub async fn run_tick(&self) -> Result<SchedulerTickReport, StoreError> {
        let mut tick_report = SchedulerTickReport::default();

        let running_projects = self.state.project_repository.fetch_running_projects().await?;
        for running_project in &running_projects {
            if let Err(project_fault) = self
                .advance_project(running_project, &mut tick_report)
                .await
            {
                warn!(
                    "⚠️ [SCHEDULER]: Project {} iteration aborted: {}",
                    running_project.project_id, project_fault
                );
            }
        }

        // Barrido de plazos vencidos + reintentos acotados.
        tick_report.tasks_requeued += self.dispatcher.sweep_timeouts_and_retries().await?;

        // Despacho de pendientes de categoría agente.
        tick_report.tasks_dispatched += self.dispatcher.dispatch_pending_batch(64).await?;

        Ok(tick_report)
    }

    /**
     * Avanza la escalera de etapas de un proyecto: localiza la primera
     * etapa habilitada no terminal, la materializa si está virgen y
     * sella el proyecto cuando toda la escalera concluyó.
     */
    async fn advance_project(
        &self,
        running_project: &Project,
        tick_report: &mut SchedulerTickReport,
    ) -> Result<(), StoreError> {
        let ordered_workflows = self
            .state
            .project_repository
            .fetch_workflows(&running_project.project_id)
            .await?;

        let mut ladder_is_complete = true;

        'ladder: for workflow in &ordered_workflows {
            let ordered_stages = self
                .state
                .project_repository
                .fetch_stages(&workflow.workflow_id)
                .await?;

            for scan_stage in ordered_stages.iter().filter(|stage| stage.enabled) {
                let stage_progress = self
                    .state
                    .task_repository
                    .stage_progress(
                        &running_project.project_id,
                        &scan_stage.stage_id,
                        scan_stage.execution_policy.retry_limit,
                    )
                    .await?;

                if stage_progress.is_complete() {
                    continue;
                }

                ladder_is_complete = false;

                // Etapa virgen: materializar su frente de tareas.
                if stage_progress.total == 0 {
                    self.materialize_stage(running_project, scan_stage, tick_report)
                        .await?;
                }

                // Escalera estricta: jamás mirar más allá de la etapa viva.
                break 'ladder;
            }
        }

        if ladder_is_complete && !ordered_workflows.is_empty() {
            self.state
                .project_repository
                .update_project_status(&running_project.project_id, ProjectStatus::Completed)
                .await?;
            tick_report.projects_completed += 1;
            info!("🏁 [SCHEDULER]: Project {} ladder concluded.", running_project.project_id);
        }

        Ok(())
    }

    /**
     * Materializa las tareas de una etapa partiendo el ámbito según la
     * política de la etapa, con veto de políticas inmediato.
     */
    async fn materialize_stage(
        &self,
        owning_project: &Project,
        scan_stage: &ScanStage,
        tick_report: &mut SchedulerTickReport,
    ) -> Result<(), StoreError> {
        // Partición determinista: objetivos ordenados antes del split.
        let mut sorted_targets = owning_project.target_scope.clone();
        sorted_targets.sort();
        sorted_targets.dedup();

        let task_inputs: Vec<String> = match scan_stage.target_policy {
            TargetSplitPolicy::PerTarget => sorted_targets,
            TargetSplitPolicy::WholeScope => {
                if sorted_targets.is_empty() {
                    Vec::new()
                } else {
                    vec![sorted_targets.join(",")]
                }
            }
        };

        // Los parámetros opacos portan el plazo de la etapa: el agente
        // deriva su deadline local de esta copia.
        let mut stage_tool_params = scan_stage.performance_settings.clone();
        if let Some(params_object) = stage_tool_params.as_object_mut() {
            params_object.insert(
                "timeout_seconds".to_string(),
                serde_json::Value::from(scan_stage.execution_policy.timeout_seconds),
            );
        }

        for input_target in task_inputs {
            let task_artifact = AgentTask {
                task_id: Uuid::new_v4().to_string(),
                project_id: owning_project.project_id.clone(),
                stage_id: scan_stage.stage_id.clone(),
                tool_name: scan_stage.tool_name.clone(),
                task_category: scan_stage.task_category(),
                input_target,
                tool_params: stage_tool_params.clone(),
                assigned_agent_id: None,
                status: TaskStatus::Pending,
                skip_reason: None,
                retry_count: 0,
                created_at: Utc::now(),
                dispatched_at: None,
                completed_at: None,
            };

            let was_created = self.state.task_repository.materialize(&task_artifact).await?;
            if !was_created {
                continue;
            }
            tick_report.tasks_materialized += 1;

            // Veto inmediato: un bloqueo transiciona a 'skipped' antes
            // de cualquier posibilidad de despacho.
            match self.policy_gate.enforce(&task_artifact, owning_project).await? {
                Some(policy_block) => {
                    self.state
                        .task_repository
                        .mark_skipped(&task_artifact.task_id, &policy_block.reason)
                        .await?;
                    tick_report.tasks_skipped_by_policy += 1;
                }
                None => {}
            }
        }

        Ok(())
    }
}
