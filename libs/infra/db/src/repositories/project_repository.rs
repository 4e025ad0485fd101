// [libs/infra/db/src/repositories/project_repository.rs]
/*!
 * =================================================================
 * APARATO: PROJECT HIERARCHY REPOSITORY (V3.2 - WORKFLOW LADDER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DE PROYECTO -> WORKFLOW -> ETAPA
 *
 * # Logic:
 * Las listas ordenadas (workflows por proyecto, etapas por workflow)
 * se sirven siempre por 'sequence_index' ascendente: el planificador
 * depende de ese orden para el avance estricto de etapas.
 * =================================================================
 */

use crate::errors::StoreError;
use crate::StoreClient;
use libsql::{params, Row};
use neoscan_domain_models::project::{
    ExecutionPolicy, Project, ProjectStatus, ScanStage, TargetSplitPolicy, Workflow,
};
use tracing::{info, instrument};

/// Repositorio de autoridad única para la jerarquía de proyectos.
pub struct ProjectRepository {
    database_client: StoreClient,
}

impl ProjectRepository {
    pub fn new(client: StoreClient) -> Self {
        Self {
            database_client: client,
        }
    }

    /**
     * Alta o reemplazo administrativo de un proyecto completo.
     */
    #[instrument(skip(self, project_artifact), fields(project = %project_artifact.project_id))]
    pub async fn upsert_project(&self, project_artifact: &Project) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO projects (project_id, name, target_scope, status, environment,
                                       tag_names, notify_config, export_config)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(project_id) DO UPDATE SET
                        name = excluded.name,
                        target_scope = excluded.target_scope,
                        status = excluded.status,
                        environment = excluded.environment,
                        tag_names = excluded.tag_names,
                        notify_config = excluded.notify_config,
                        export_config = excluded.export_config,
                        updated_at = CURRENT_TIMESTAMP",
                params![
                    project_artifact.project_id.clone(),
                    project_artifact.name.clone(),
                    serde_json::to_string(&project_artifact.target_scope)
                        .map_err(|fault| StoreError::MappingError(fault.to_string()))?,
                    project_artifact.status.as_str(),
                    project_artifact.environment.clone(),
                    serde_json::to_string(&project_artifact.tag_names)
                        .map_err(|fault| StoreError::MappingError(fault.to_string()))?,
                    project_artifact.notify_config.to_string(),
                    project_artifact.export_config.to_string()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn upsert_workflow(&self, workflow_artifact: &Workflow) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO workflows (workflow_id, project_id, name, sequence_index)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(workflow_id) DO UPDATE SET
                        project_id = excluded.project_id,
                        name = excluded.name,
                        sequence_index = excluded.sequence_index",
                params![
                    workflow_artifact.workflow_id.clone(),
                    workflow_artifact.project_id.clone(),
                    workflow_artifact.name.clone(),
                    workflow_artifact.sequence_index as i64
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn upsert_stage(&self, stage_artifact: &ScanStage) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection
            .execute(
                "INSERT INTO scan_stages (stage_id, workflow_id, tool_name, target_policy,
                        timeout_seconds, retry_limit, performance_settings, output_config,
                        enabled, sequence_index)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(stage_id) DO UPDATE SET
                        workflow_id = excluded.workflow_id,
                        tool_name = excluded.tool_name,
                        target_policy = excluded.target_policy,
                        timeout_seconds = excluded.timeout_seconds,
                        retry_limit = excluded.retry_limit,
                        performance_settings = excluded.performance_settings,
                        output_config = excluded.output_config,
                        enabled = excluded.enabled,
                        sequence_index = excluded.sequence_index",
                params![
                    stage_artifact.stage_id.clone(),
                    stage_artifact.workflow_id.clone(),
                    stage_artifact.tool_name.clone(),
                    match stage_artifact.target_policy {
                        TargetSplitPolicy::PerTarget => "per_target",
                        TargetSplitPolicy::WholeScope => "whole_scope",
                    },
                    stage_artifact.execution_policy.timeout_seconds as i64,
                    stage_artifact.execution_policy.retry_limit as i64,
                    stage_artifact.performance_settings.to_string(),
                    stage_artifact.output_config.to_string(),
                    stage_artifact.enabled as i64,
                    stage_artifact.sequence_index as i64
                ],
            )
            .await?;
        Ok(())
    }

    /// Proyectos en estado 'running' para el tick del planificador.
    pub async fn fetch_running_projects(&self) -> Result<Vec<Project>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut project_probe = database_connection
            .query(
                "SELECT project_id, name, target_scope, status, environment, tag_names,
                        notify_config, export_config
                 FROM projects WHERE status = 'running'
                 ORDER BY created_at ASC",
                (),
            )
            .await?;

        let mut running_projects = Vec::new();
        while let Some(project_row) = project_probe.next().await? {
            running_projects.push(map_row_to_project(&project_row)?);
        }
        Ok(running_projects)
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut project_probe = database_connection
            .query(
                "SELECT project_id, name, target_scope, status, environment, tag_names,
                        notify_config, export_config
                 FROM projects WHERE project_id = ?1",
                params![project_id],
            )
            .await?;

        match project_probe.next().await? {
            Some(project_row) => map_row_to_project(&project_row),
            None => Err(StoreError::NotFound),
        }
    }

    /// Workflows del proyecto en orden de secuencia ascendente.
    pub async fn fetch_workflows(&self, project_id: &str) -> Result<Vec<Workflow>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut workflow_probe = database_connection
            .query(
                "SELECT workflow_id, project_id, name, sequence_index
                 FROM workflows WHERE project_id = ?1
                 ORDER BY sequence_index ASC, workflow_id ASC",
                params![project_id],
            )
            .await?;

        let mut ordered_workflows = Vec::new();
        while let Some(workflow_row) = workflow_probe.next().await? {
            ordered_workflows.push(Workflow {
                workflow_id: workflow_row.get(0)?,
                project_id: workflow_row.get(1)?,
                name: workflow_row.get(2)?,
                sequence_index: workflow_row.get::<i64>(3)?.max(0) as u32,
            });
        }
        Ok(ordered_workflows)
    }

    /// Etapas del workflow en orden de secuencia ascendente.
    pub async fn fetch_stages(&self, workflow_id: &str) -> Result<Vec<ScanStage>, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut stage_probe = database_connection
            .query(
                "SELECT stage_id, workflow_id, tool_name, target_policy, timeout_seconds,
                        retry_limit, performance_settings, output_config, enabled, sequence_index
                 FROM scan_stages WHERE workflow_id = ?1
                 ORDER BY sequence_index ASC, stage_id ASC",
                params![workflow_id],
            )
            .await?;

        let mut ordered_stages = Vec::new();
        while let Some(stage_row) = stage_probe.next().await? {
            ordered_stages.push(map_row_to_stage(&stage_row)?);
        }
        Ok(ordered_stages)
    }

    pub async fn get_stage(&self, stage_id: &str) -> Result<ScanStage, StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let mut stage_probe = database_connection
            .query(
                "SELECT stage_id, workflow_id, tool_name, target_policy, timeout_seconds,
                        retry_limit, performance_settings, output_config, enabled, sequence_index
                 FROM scan_stages WHERE stage_id = ?1",
                params![stage_id],
            )
            .await?;

        match stage_probe.next().await? {
            Some(stage_row) => map_row_to_stage(&stage_row),
            None => Err(StoreError::NotFound),
        }
    }

    /**
     * Transición de estado del proyecto (p.ej. running -> completed).
     */
    #[instrument(skip(self))]
    pub async fn update_project_status(
        &self,
        project_id: &str,
        next_status: ProjectStatus,
    ) -> Result<(), StoreError> {
        let database_connection = self.database_client.get_connection()?;
        let affected_rows = database_connection
            .execute(
                "UPDATE projects SET status = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE project_id = ?1",
                params![project_id, next_status.as_str()],
            )
            .await?;
        if affected_rows == 0 {
            return Err(StoreError::NotFound);
        }
        info!("🔄 [PROJECT]: {} transitioned to {}.", project_id, next_status.as_str());
        Ok(())
    }
}

fn map_row_to_project(project_row: &Row) -> Result<Project, StoreError> {
    let status_label: String = project_row.get(3)?;
    let raw_scope: String = project_row.get(2)?;
    let raw_tags: String = project_row.get(5)?;
    let raw_notify: String = project_row.get(6)?;
    let raw_export: String = project_row.get(7)?;

    Ok(Project {
        project_id: project_row.get(0)?,
        name: project_row.get(1)?,
        target_scope: serde_json::from_str(&raw_scope).unwrap_or_default(),
        status: ProjectStatus::parse(&status_label).ok_or_else(|| {
            StoreError::MappingError(format!("estado de proyecto desconocido '{}'", status_label))
        })?,
        environment: project_row.get(4)?,
        tag_names: serde_json::from_str(&raw_tags).unwrap_or_default(),
        notify_config: serde_json::from_str(&raw_notify).unwrap_or(serde_json::Value::Null),
        export_config: serde_json::from_str(&raw_export).unwrap_or(serde_json::Value::Null),
    })
}

fn map_row_to_stage(stage_row: &Row) -> Result<ScanStage, StoreError> {
    let policy_label: String = stage_row.get(3)?;
    let raw_performance: String = stage_row.get(6)?;
    let raw_output: String = stage_row.get(7)?;

    Ok(ScanStage {
        stage_id: stage_row.get(0)?,
        workflow_id: stage_row.get(1)?,
        tool_name: stage_row.get(2)?,
        target_policy: match policy_label.as_str() {
            "whole_scope" => TargetSplitPolicy::WholeScope,
            _ => TargetSplitPolicy::PerTarget,
        },
        execution_policy: ExecutionPolicy {
            timeout_seconds: stage_row.get::<i64>(4)?.max(0) as u64,
            retry_limit: stage_row.get::<i64>(5)?.max(0) as u32,
        },
        performance_settings: serde_json::from_str(&raw_performance)
            .unwrap_or(serde_json::Value::Null),
        output_config: serde_json::from_str(&raw_output).unwrap_or(serde_json::Value::Null),
        enabled: stage_row.get::<i64>(8)? != 0,
        sequence_index: stage_row.get::<i64>(9)?.max(0) as u32,
    })
}
