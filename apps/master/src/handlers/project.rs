// [apps/master/src/handlers/project.rs]
/*!
 * =================================================================
 * APARATO: PROJECT ADMINISTRATION HANDLER (V4.2 - HIERARCHY GATE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CRUD DE PROYECTO, WORKFLOW Y ETAPA
 *
 * # Logic:
 * La creación de TAREAS jamás pasa por este handler: las tareas las
 * materializa exclusivamente el planificador. Aquí solo vive la
 * administración de la jerarquía y su consulta.
 * =================================================================
 */

use crate::handlers::{envelope_ok, store_fault_response, QueryMatrix};
use crate::state::AppState;
use axum::extract::{Path, RawQuery, State};
use axum::response::Response;
use axum::Json;
use neoscan_domain_models::api::{Paginated, Pagination};
use neoscan_domain_models::project::{Project, ProjectStatus, ScanStage, Workflow};
use serde::Deserialize;
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
pub struct ProjectStatusPayload {
    pub status: ProjectStatus,
}

pub struct ProjectAdministrationHandler;

impl ProjectAdministrationHandler {
    /// Endpoint: POST /api/v1/project
    #[instrument(skip(application_state, project_artifact), fields(project = %project_artifact.project_id))]
    pub async fn handle_upsert_project(
        State(application_state): State<AppState>,
        Json(project_artifact): Json<Project>,
    ) -> Response {
        match application_state
            .project_repository
            .upsert_project(&project_artifact)
            .await
        {
            Ok(()) => {
                info!("📋 [PROJECT]: {} upserted.", project_artifact.project_id);
                envelope_ok("project upserted", project_artifact)
            }
            Err(hierarchy_fault) => store_fault_response(hierarchy_fault),
        }
    }

    /// Endpoint: GET /api/v1/project/:id
    pub async fn handle_get_project(
        State(application_state): State<AppState>,
        Path(project_id): Path<String>,
    ) -> Response {
        match application_state.project_repository.get_project(&project_id).await {
            Ok(project_artifact) => envelope_ok("project record", project_artifact),
            Err(hierarchy_fault) => store_fault_response(hierarchy_fault),
        }
    }

    /// Endpoint: PUT /api/v1/project/:id/status
    #[instrument(skip(application_state, status_payload))]
    pub async fn handle_update_project_status(
        State(application_state): State<AppState>,
        Path(project_id): Path<String>,
        Json(status_payload): Json<ProjectStatusPayload>,
    ) -> Response {
        match application_state
            .project_repository
            .update_project_status(&project_id, status_payload.status)
            .await
        {
            Ok(()) => envelope_ok(
                "project status updated",
                serde_json::json!({"project_id": project_id, "status": status_payload.status}),
            ),
            Err(hierarchy_fault) => store_fault_response(hierarchy_fault),
        }
    }

    /// Endpoint: POST /api/v1/workflow
    pub async fn handle_upsert_workflow(
        State(application_state): State<AppState>,
        Json(workflow_artifact): Json<Workflow>,
    ) -> Response {
        match application_state
            .project_repository
            .upsert_workflow(&workflow_artifact)
            .await
        {
            Ok(()) => envelope_ok("workflow upserted", workflow_artifact),
            Err(hierarchy_fault) => store_fault_response(hierarchy_fault),
        }
    }

    /// Endpoint: POST /api/v1/stage
    pub async fn handle_upsert_stage(
        State(application_state): State<AppState>,
        Json(stage_artifact): Json<ScanStage>,
    ) -> Response {
        match application_state
            .project_repository
            .upsert_stage(&stage_artifact)
            .await
        {
            Ok(()) => envelope_ok("stage upserted", stage_artifact),
            Err(hierarchy_fault) => store_fault_response(hierarchy_fault),
        }
    }

    /// Endpoint: GET /api/v1/project/:id/tasks
    pub async fn handle_list_project_tasks(
        State(application_state): State<AppState>,
        Path(project_id): Path<String>,
        RawQuery(raw_query): RawQuery,
    ) -> Response {
        let query_matrix = QueryMatrix::parse(raw_query.as_deref());
        let (page, page_size) = query_matrix.pagination_window();

        match application_state
            .task_repository
            .list_by_project(&project_id, page, page_size)
            .await
        {
            Ok((task_window, total_tasks)) => envelope_ok(
                "project task window",
                Paginated {
                    items: task_window,
                    pagination: Pagination::compute(total_tasks, page, page_size),
                },
            ),
            Err(ledger_fault) => store_fault_response(ledger_fault),
        }
    }
}
