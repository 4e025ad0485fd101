// [libs/infra/db/src/repositories/task_repository.rs]
/*!
 * =================================================================
 * APARATO: TASK LEDGER REPOSITORY (V3.6 - CAS AUTHORITY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: MATERIALIZACIÓN IDEMPOTENTE Y TRANSICIONES SELLADAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. IDEMPOTENT MATERIALIZATION: La clave (project_id, stage_id,
 *    input_target) garantiza que re-ejecutar un tick del planificador
 *    jamás duplique tareas pendientes.
 * 2. CAS DISPATCH: El despacho fija agente y estado en un único UPDATE
 *    con precondición de estado; perder la carrera aflora CasConflict
 *    y el despachador re-selecciona en el siguiente tick.
 * 3. IDEMPOTENT RESULTS: La ingesta de resultados está sellada por
 *    task_id; un segundo reporte converge sin doble transición.
 *
 * # Mathematical Proof (State Machine Determinism):
 * pending -> dispatched -> running -> completed | failed; failed puede
 * regresar a pending solo mientras retry_count < retry_limit;
 * pending -> skipped es terminal. Cada flecha es un UPDATE con
 * predicado de estado excluyente.
 * =================================================================
 */

use crate::errors::StoreError;
use crate::repositories::parse_stored_timestamp;
use crate::StoreClient;
use chrono::Utc;
use libsql::{params, Row};
use neoscan_domain_models::task::{AgentTask, TaskCategory, TaskResultReport, TaskStatus};
use tracing::{debug, info, instrument, warn};

/// Conteo de progreso de una etapa para el veredicto de completitud.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageProgress {
    pub total: u64,
    pub open: u64,
    pub failed_retryable: u64,
}

impl StageProgress {
    /// Una etapa está completa cuando tiene tareas y ninguna sigue viva.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.open == 0 && self.failed_retryable == 0
    }
}

/// Repositorio de autoridad única para el Ledger de tareas.
pub struct TaskRepository {
    database_client: StoreClient,
}

impl TaskRepository {
    pub fn new(client: StoreClient) -> Self {
        Self {
            database_client: client,
        }
    }

    /**
     * Materializa una tarea pendiente. Retorna false cuando la clave de
     * idempotencia ya existe (tick repetido sin cambios externos).
     */
    #[instrument(skip(self, task_artifact), fields(task = %task_artifact.task_id, target = %task_artifact.input_target))]
    pub async fn materialize(&self, task_artifact: &AgentTask) -> Result<bool, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let inserted_rows = database_connection
            .execute(
                "INSERT OR IGNORE INTO agent_tasks
                    (task_id, project_id, stage_id, tool_name, task_category, input_target,
                     tool_params, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', CURRENT_TIMESTAMP)",
                params![
                    task_artifact.task_id.clone(),
                    task_artifact.project_id.clone(),
                    task_artifact.stage_id.clone(),
                    task_artifact.tool_name.clone(),
                    task_artifact.task_category.as_str(),
                    task_artifact.input_target.clone(),
                    task_artifact.tool_params.to_string()
                ],
            )
            .await?;

        if inserted_rows > 0 {
            debug!("🧱 [LEDGER]: Task {} materialized as pending.", task_artifact.task_id);
        }
        Ok(inserted_rows > 0)
    }

    /**
     * Cola de pendientes por categoría. Los workers jamás cruzan
     * categorías: el predicado es parte del contrato.
     */
    pub async fn fetch_pending(
        &self,
        category: TaskCategory,
        limit: u32,
    ) -> Result<Vec<AgentTask>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut pending_probe = database_connection
            .query(
                "SELECT task_id, project_id, stage_id, tool_name, task_category, input_target,
                        tool_params, assigned_agent_id, status, skip_reason, retry_count,
                        created_at, dispatched_at, completed_at
                 FROM agent_tasks
                 WHERE status = 'pending' AND task_category = ?1
                 ORDER BY created_at ASC, task_id ASC
                 LIMIT ?2",
                params![category.as_str(), limit as i64],
            )
            .await?;

        let mut pending_batch = Vec::new();
        while let Some(pending_row) = pending_probe.next().await? {
            pending_batch.push(map_row_to_task(&pending_row)?);
        }
        Ok(pending_batch)
    }

    /**
     * CAS de despacho: fija agente y estado 'dispatched' atómicamente.
     *
     * # Errors:
     * - `StoreError::CasConflict`: Otro daemon reclamó la tarea primero.
     * - `StoreError::NotFound`: La tarea no existe en el Ledger.
     */
    #[instrument(skip(self))]
    pub async fn claim_for_dispatch(
        &self,
        task_id: &str,
        agent_id: &str,
    ) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE agent_tasks
                 SET status = 'dispatched',
                     assigned_agent_id = ?2,
                     dispatched_at = CURRENT_TIMESTAMP,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE task_id = ?1 AND status = 'pending' AND assigned_agent_id IS NULL",
                params![task_id, agent_id],
            )
            .await?;

        if affected_rows == 0 {
            return self.diagnose_claim_failure(task_id).await;
        }
        info!("🚀 [DISPATCH]: Task {} assigned to unit {}.", task_id, agent_id);
        Ok(())
    }

    /**
     * El agente confirma la recepción: 'dispatched' -> 'running'.
     */
    pub async fn mark_running(&self, task_id: &str, agent_id: &str) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE agent_tasks
                 SET status = 'running', updated_at = CURRENT_TIMESTAMP
                 WHERE task_id = ?1 AND assigned_agent_id = ?2 AND status = 'dispatched'",
                params![task_id, agent_id],
            )
            .await?;
        if affected_rows == 0 {
            return Err(StoreError::InvalidState);
        }
        Ok(())
    }

    /**
     * Bloqueo por política: 'pending' -> 'skipped' con razón sellada.
     */
    #[instrument(skip(self))]
    pub async fn mark_skipped(&self, task_id: &str, reason: &str) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE agent_tasks
                 SET status = 'skipped', skip_reason = ?2,
                     completed_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
                 WHERE task_id = ?1 AND status = 'pending'",
                params![task_id, reason],
            )
            .await?;
        if affected_rows == 0 {
            return Err(StoreError::InvalidState);
        }
        warn!("⛔ [POLICY_SEAL]: Task {} skipped: {}", task_id, reason);
        Ok(())
    }

    /**
     * Ingesta idempotente de un reporte de resultado sellada por task_id.
     * Retorna false cuando el reporte ya había sido ingerido.
     */
    #[instrument(skip(self, result_report), fields(task = %result_report.task_id))]
    pub async fn ingest_result(
        &self,
        result_report: &TaskResultReport,
    ) -> Result<bool, StoreError> {
        let final_status = match result_report.status {
            TaskStatus::Completed => TaskStatus::Completed,
            TaskStatus::Failed => TaskStatus::Failed,
            _ => {
                return Err(StoreError::InvalidInput(
                    "un reporte de resultado solo sella completed o failed".to_string(),
                ))
            }
        };

        let database_connection = self.database_client.get_connection()?;

        // Evidencia sellada por task_id: el último reporte queda como
        // registro vigente (un reintento legítimo re-escribe la fila).
        database_connection
            .execute(
                "INSERT INTO task_results (task_id, agent_id, status, results, error_detail, reported_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(task_id) DO UPDATE SET
                        agent_id = excluded.agent_id,
                        status = excluded.status,
                        results = excluded.results,
                        error_detail = excluded.error_detail,
                        reported_at = excluded.reported_at",
                params![
                    result_report.task_id.clone(),
                    result_report.agent_id.clone(),
                    final_status.as_str(),
                    result_report.results.to_string(),
                    result_report.error_detail.clone(),
                    result_report.reported_at.to_rfc3339()
                ],
            )
            .await?;

        // La transición porta su propio candado de estado: un reporte
        // duplicado aterriza sobre una tarea ya terminal y converge.
        let affected_rows = database_connection
            .execute(
                "UPDATE agent_tasks
                 SET status = ?2, completed_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
                 WHERE task_id = ?1 AND status IN ('dispatched', 'running', 'pending')",
                params![result_report.task_id.clone(), final_status.as_str()],
            )
            .await?;

        if affected_rows == 0 {
            debug!("♻️ [LEDGER]: Duplicate result for task {} converged.", result_report.task_id);
            return Ok(false);
        }
        Ok(true)
    }

    /**
     * Reintento acotado: 'failed' regresa a 'pending' mientras el
     * contador no alcance el límite de la etapa.
     */
    #[instrument(skip(self))]
    pub async fn requeue_for_retry(
        &self,
        task_id: &str,
        retry_limit: u32,
    ) -> Result<bool, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE agent_tasks
                 SET status = 'pending', assigned_agent_id = NULL,
                     retry_count = retry_count + 1,
                     dispatched_at = NULL, completed_at = NULL,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE task_id = ?1 AND status = 'failed' AND retry_count < ?2",
                params![task_id, retry_limit as i64],
            )
            .await?;
        Ok(affected_rows > 0)
    }

    /**
     * Barrido de plazos: tareas despachadas cuyo plazo de etapa venció
     * transicionan a 'failed'. Retorna los identificadores sellados.
     */
    #[instrument(skip(self))]
    pub async fn sweep_expired_dispatches(&self) -> Result<Vec<String>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut sweep_results = database_connection
            .query(
                "UPDATE agent_tasks
                 SET status = 'failed', updated_at = CURRENT_TIMESTAMP
                 WHERE status IN ('dispatched', 'running')
                 AND task_id IN (
                     SELECT t.task_id FROM agent_tasks t
                     JOIN scan_stages s ON s.stage_id = t.stage_id
                     WHERE t.status IN ('dispatched', 'running')
                     AND t.dispatched_at IS NOT NULL
                     AND datetime(t.dispatched_at, '+' || s.timeout_seconds || ' seconds') < CURRENT_TIMESTAMP
                 )
                 RETURNING task_id",
                (),
            )
            .await?;

        let mut expired_tasks = Vec::new();
        while let Some(expired_row) = sweep_results.next().await? {
            expired_tasks.push(expired_row.get::<String>(0)?);
        }
        if !expired_tasks.is_empty() {
            warn!("⌛ [REAPER_LEDGER]: {} dispatched tasks expired.", expired_tasks.len());
        }
        Ok(expired_tasks)
    }

    /**
     * Cola de un agente: tareas 'dispatched' asignadas a él. Cada fila
     * entregada transiciona a 'running' en el mismo barrido.
     */
    pub async fn pull_agent_queue(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<AgentTask>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut queue_probe = database_connection
            .query(
                "SELECT task_id, project_id, stage_id, tool_name, task_category, input_target,
                        tool_params, assigned_agent_id, status, skip_reason, retry_count,
                        created_at, dispatched_at, completed_at
                 FROM agent_tasks
                 WHERE assigned_agent_id = ?1 AND status = 'dispatched'
                 ORDER BY dispatched_at ASC
                 LIMIT ?2",
                params![agent_id, limit as i64],
            )
            .await?;

        let mut agent_queue = Vec::new();
        while let Some(queue_row) = queue_probe.next().await? {
            agent_queue.push(map_row_to_task(&queue_row)?);
        }

        for queued_task in &agent_queue {
            // El pull confirma la recepción; un CAS perdido aquí solo
            // significa que otro barrido ya lo confirmó.
            let _ = self.mark_running(&queued_task.task_id, agent_id).await;
        }

        Ok(agent_queue)
    }

    /// Progreso agregado de una etapa para el veredicto de completitud.
    pub async fn stage_progress(
        &self,
        project_id: &str,
        stage_id: &str,
        retry_limit: u32,
    ) -> Result<StageProgress, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut progress_probe = database_connection
            .query(
                "SELECT
                    COUNT(*) AS total,
                    SUM(CASE WHEN status IN ('pending', 'dispatched', 'running') THEN 1 ELSE 0 END) AS open,
                    SUM(CASE WHEN status = 'failed' AND retry_count < ?3 THEN 1 ELSE 0 END) AS failed_retryable
                 FROM agent_tasks WHERE project_id = ?1 AND stage_id = ?2",
                params![project_id, stage_id, retry_limit as i64],
            )
            .await?;

        let progress_row = progress_probe.next().await?.ok_or(StoreError::NotFound)?;
        Ok(StageProgress {
            total: progress_row.get::<i64>(0)?.max(0) as u64,
            open: progress_row.get::<Option<i64>>(1)?.unwrap_or(0).max(0) as u64,
            failed_retryable: progress_row.get::<Option<i64>>(2)?.unwrap_or(0).max(0) as u64,
        })
    }

    /// Tareas 'failed' de una etapa con reintentos disponibles.
    pub async fn fetch_retryable_failures(
        &self,
        project_id: &str,
        stage_id: &str,
        retry_limit: u32,
    ) -> Result<Vec<String>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut failure_probe = database_connection
            .query(
                "SELECT task_id FROM agent_tasks
                 WHERE project_id = ?1 AND stage_id = ?2
                   AND status = 'failed' AND retry_count < ?3",
                params![project_id, stage_id, retry_limit as i64],
            )
            .await?;

        let mut retryable_tasks = Vec::new();
        while let Some(failure_row) = failure_probe.next().await? {
            retryable_tasks.push(failure_row.get::<String>(0)?);
        }
        Ok(retryable_tasks)
    }

    /// Recupera una tarea completa del Ledger.
    pub async fn get(&self, task_id: &str) -> Result<AgentTask, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut task_probe = database_connection
            .query(
                "SELECT task_id, project_id, stage_id, tool_name, task_category, input_target,
                        tool_params, assigned_agent_id, status, skip_reason, retry_count,
                        created_at, dispatched_at, completed_at
                 FROM agent_tasks WHERE task_id = ?1",
                params![task_id],
            )
            .await?;

        match task_probe.next().await? {
            Some(task_row) => map_row_to_task(&task_row),
            None => Err(StoreError::NotFound),
        }
    }

    /// Listado paginado de tareas de un proyecto.
    pub async fn list_by_project(
        &self,
        project_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<AgentTask>, u64), StoreError> {
        let database_connection = self.database_client.get_connection()?;

        let mut count_probe = database_connection
            .query(
                "SELECT COUNT(*) FROM agent_tasks WHERE project_id = ?1",
                params![project_id],
            )
            .await?;
        let total = count_probe
            .next()
            .await?
            .map(|count_row| count_row.get::<i64>(0))
            .transpose()?
            .unwrap_or(0)
            .max(0) as u64;

        let effective_page_size = page_size.max(1) as i64;
        let window_offset = (page.max(1) as i64 - 1) * effective_page_size;

        let mut page_probe = database_connection
            .query(
                "SELECT task_id, project_id, stage_id, tool_name, task_category, input_target,
                        tool_params, assigned_agent_id, status, skip_reason, retry_count,
                        created_at, dispatched_at, completed_at
                 FROM agent_tasks WHERE project_id = ?1
                 ORDER BY created_at ASC, task_id ASC
                 LIMIT ?2 OFFSET ?3",
                params![project_id, effective_page_size, window_offset],
            )
            .await?;

        let mut task_page = Vec::new();
        while let Some(task_row) = page_probe.next().await? {
            task_page.push(map_row_to_task(&task_row)?);
        }
        Ok((task_page, total))
    }

    /// Diagnóstico forense de un CAS de despacho perdido.
    async fn diagnose_claim_failure(&self, task_id: &str) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut diagnostic_probe = database_connection
            .query(
                "SELECT status FROM agent_tasks WHERE task_id = ?1",
                params![task_id],
            )
            .await?;

        match diagnostic_probe.next().await? {
            Some(diagnostic_row) => {
                let current_status: String = diagnostic_row.get(0)?;
                warn!("⚠️ [DISPATCH_CAS]: Task {} lost race (state '{}').", task_id, current_status);
                Err(StoreError::CasConflict)
            }
            None => Err(StoreError::NotFound),
        }
    }
}

/// Mapea una fila del Ledger a la Tarea de Dominio.
fn map_row_to_task(task_row: &Row) -> Result<AgentTask, StoreError> {
    let category_label: String = task_row.get(4)?;
    let status_label: String = task_row.get(8)?;
    let raw_params: String = task_row.get(6)?;
    let created_at_label: String = task_row.get(11)?;
    let dispatched_at_label: Option<String> = task_row.get(12)?;
    let completed_at_label: Option<String> = task_row.get(13)?;

    Ok(AgentTask {
        task_id: task_row.get(0)?,
        project_id: task_row.get(1)?,
        stage_id: task_row.get(2)?,
        tool_name: task_row.get(3)?,
        task_category: TaskCategory::parse(&category_label).ok_or_else(|| {
            StoreError::MappingError(format!("categoría desconocida '{}'", category_label))
        })?,
        input_target: task_row.get(5)?,
        tool_params: serde_json::from_str(&raw_params).unwrap_or(serde_json::Value::Null),
        assigned_agent_id: task_row.get(7)?,
        status: TaskStatus::parse(&status_label).ok_or_else(|| {
            StoreError::MappingError(format!("estado desconocido '{}'", status_label))
        })?,
        skip_reason: task_row.get(9)?,
        retry_count: task_row.get::<i64>(10)?.max(0) as u32,
        created_at: parse_stored_timestamp(&created_at_label).unwrap_or_else(Utc::now),
        dispatched_at: dispatched_at_label.as_deref().and_then(parse_stored_timestamp),
        completed_at: completed_at_label.as_deref().and_then(parse_stored_timestamp),
    })
}
