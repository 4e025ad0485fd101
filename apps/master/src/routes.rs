// [apps/master/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V4.3 - FLEET TOPOLOGY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA DE RED DEL CENTRO DE MANDO
 *
 * VISION HIPER-HOLÍSTICA:
 * La topología separa tres estratos:
 * 1. REST de Flota (registro, latidos, gobernanza de agentes).
 * 2. REST de Jerarquía (proyecto/workflow/etapa y su ledger).
 * 3. Distribución de Huellas (versión, bundle firmado, import).
 * =================================================================
 */

use crate::handlers::agent::AgentFleetHandler;
use crate::handlers::fingerprint::FingerprintDistributionHandler;
use crate::handlers::project::ProjectAdministrationHandler;
use crate::handlers::task::TaskReportingHandler;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_master_router(application_shared_state: AppState) -> Router {
    // Escudo de Red: CORS para el panel de mando y herramientas de Ops.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO DE FLOTA: registro, latidos y gobernanza de agentes.
    let fleet_stratum = Router::new()
        .route("/register", post(AgentFleetHandler::handle_register))
        .route("/heartbeat", post(AgentFleetHandler::handle_heartbeat))
        .route("/list", get(AgentFleetHandler::handle_list))
        .route(
            "/:id",
            get(AgentFleetHandler::handle_get).delete(AgentFleetHandler::handle_delete),
        )
        .route("/:id/status", put(AgentFleetHandler::handle_update_status))
        .route(
            "/:id/metrics",
            get(AgentFleetHandler::handle_get_metrics)
                .post(AgentFleetHandler::handle_upsert_metrics)
                .put(AgentFleetHandler::handle_upsert_metrics),
        )
        .route("/:id/tags", put(AgentFleetHandler::handle_replace_capability_tags))
        // Cola de tareas del nodo (companion endpoint de resultados)
        .route("/:id/tasks", get(TaskReportingHandler::handle_pull_agent_queue));

    // ESTRATO DE JERARQUÍA: proyecto -> workflow -> etapa + ledger.
    let hierarchy_stratum = Router::new()
        .route("/project", post(ProjectAdministrationHandler::handle_upsert_project))
        .route("/project/:id", get(ProjectAdministrationHandler::handle_get_project))
        .route(
            "/project/:id/status",
            put(ProjectAdministrationHandler::handle_update_project_status),
        )
        .route(
            "/project/:id/tasks",
            get(ProjectAdministrationHandler::handle_list_project_tasks),
        )
        .route("/workflow", post(ProjectAdministrationHandler::handle_upsert_workflow))
        .route("/stage", post(ProjectAdministrationHandler::handle_upsert_stage))
        .route("/task/:task_id", get(TaskReportingHandler::handle_get_task))
        .route(
            "/task/:task_id/result",
            post(TaskReportingHandler::handle_report_result),
        );

    // ESTRATO DE DISTRIBUCIÓN DE HUELLAS: snapshot firmado.
    let fingerprint_stratum = Router::new()
        .route("/version", get(FingerprintDistributionHandler::handle_version))
        .route("/download", get(FingerprintDistributionHandler::handle_download))
        .route("/import", post(FingerprintDistributionHandler::handle_import))
        .route("/rollback", post(FingerprintDistributionHandler::handle_rollback));

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest(
            "/api/v1",
            Router::new()
                .nest("/agent", fleet_stratum)
                .merge(hierarchy_stratum),
        )
        .nest("/agent-update/fingerprint", fingerprint_stratum)
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
