// [apps/master/src/handlers/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT FLEET HANDLER (V4.4 - REGISTRY GATEWAY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO, LATIDOS, LISTADO Y GOBERNANZA DE NODOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. STATUS CODE PARITY: 200 en alta nueva, 409 en colisión física,
 *    400 en capacidad inválida, 404 en identidad desconocida.
 * 2. DUAL AXIS FILTERS: 'capabilities' filtra por entrada de catálogo;
 *    'task_support' filtra por herramienta soportada (la herramienta
 *    se resuelve a su capacidad requerida). Ejes deliberadamente
 *    distintos.
 * 3. WRITE-BEHIND TELEMETRY: El latido sella el motor durable y
 *    sincroniza el radar de RAM en la misma ráfaga.
 * =================================================================
 */

use crate::handlers::{envelope_failed, envelope_ok, store_fault_response, QueryMatrix};
use crate::state::AppState;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use neoscan_domain_models::agent::{
    AgentMetricsSnapshot, AgentRegistrationRequest, AgentStatus, HeartbeatSignal,
};
use neoscan_domain_models::api::{Paginated, Pagination};
use neoscan_domain_models::tag::TagSource;
use neoscan_infra_db::repositories::AgentListFilter;
use serde::Deserialize;
use tracing::{info, instrument, warn};

/// Payload de transición administrativa de estado.
#[derive(Debug, Deserialize)]
pub struct StatusTransitionPayload {
    pub status: AgentStatus,
}

/// Payload de reemplazo de etiquetas de capacidad.
#[derive(Debug, Deserialize)]
pub struct CapabilityTagsPayload {
    pub tag_ids: Vec<i64>,
}

pub struct AgentFleetHandler;

impl AgentFleetHandler {
    /**
     * Endpoint: POST /api/v1/agent/register
     */
    #[instrument(skip(application_state, registration_request), fields(hostname = %registration_request.hostname))]
    pub async fn handle_register(
        State(application_state): State<AppState>,
        Json(registration_request): Json<AgentRegistrationRequest>,
    ) -> Response {
        match application_state
            .agent_repository
            .register(&registration_request)
            .await
        {
            Ok(receipt) => {
                info!("🛰️ [FLEET]: Unit {} enlisted.", receipt.agent_id);
                envelope_ok("agent registered", receipt)
            }
            Err(registry_fault) => store_fault_response(registry_fault),
        }
    }

    /**
     * Endpoint: POST /api/v1/agent/heartbeat
     * Ingesta idempotente: motor durable + radar de RAM.
     */
    #[instrument(skip(application_state, heartbeat_signal), fields(agent = %heartbeat_signal.agent_id))]
    pub async fn handle_heartbeat(
        State(application_state): State<AppState>,
        Json(heartbeat_signal): Json<HeartbeatSignal>,
    ) -> Response {
        if let Err(contract_violation) = heartbeat_signal.validate() {
            warn!("⚠️ [FLEET]: Heartbeat rejected: {}", contract_violation);
            return envelope_failed(
                StatusCode::BAD_REQUEST,
                "invalid heartbeat payload",
                &contract_violation.to_string(),
            );
        }

        if let Err(vitality_fault) = application_state
            .agent_repository
            .touch_heartbeat(&heartbeat_signal.agent_id, heartbeat_signal.status)
            .await
        {
            return store_fault_response(vitality_fault);
        }

        if let Some(metrics_snapshot) = &heartbeat_signal.metrics {
            if let Err(metrics_fault) = application_state
                .agent_repository
                .upsert_metrics(metrics_snapshot)
                .await
            {
                return store_fault_response(metrics_fault);
            }
        }

        application_state
            .fleet_telemetry
            .synchronize_heartbeat(heartbeat_signal);

        envelope_ok("heartbeat ingested", serde_json::json!({}))
    }

    /**
     * Endpoint: GET /api/v1/agent/list
     * Filtros: status, keyword, tags, capabilities, task_support
     * (multi-valor por clave repetida o lista con comas).
     */
    #[instrument(skip(application_state, raw_query))]
    pub async fn handle_list(
        State(application_state): State<AppState>,
        RawQuery(raw_query): RawQuery,
    ) -> Response {
        let query_matrix = QueryMatrix::parse(raw_query.as_deref());
        let (page, page_size) = query_matrix.pagination_window();

        let status_filter = match query_matrix.scalar("status") {
            Some(status_label) => match AgentStatus::parse(status_label) {
                Some(parsed_status) => Some(parsed_status),
                None => {
                    return envelope_failed(
                        StatusCode::BAD_REQUEST,
                        "invalid status filter",
                        status_label,
                    )
                }
            },
            None => None,
        };

        let fleet_filter = AgentListFilter {
            status: status_filter,
            keyword: query_matrix.scalar("keyword").map(|keyword| keyword.to_string()),
            tag_ids: query_matrix
                .multi("tags")
                .iter()
                .filter_map(|raw_id| raw_id.parse::<i64>().ok())
                .collect(),
            capabilities: query_matrix.multi("capabilities"),
            task_support: query_matrix.multi("task_support"),
        };

        match application_state
            .agent_repository
            .list(&fleet_filter, page, page_size)
            .await
        {
            Ok((fleet_window, total_matches)) => envelope_ok(
                "agent fleet window",
                Paginated {
                    items: fleet_window,
                    pagination: Pagination::compute(total_matches, page, page_size),
                },
            ),
            Err(registry_fault) => store_fault_response(registry_fault),
        }
    }

    /// Endpoint: GET /api/v1/agent/:id
    pub async fn handle_get(
        State(application_state): State<AppState>,
        Path(agent_id): Path<String>,
    ) -> Response {
        match application_state.agent_repository.get(&agent_id).await {
            Ok(agent_record) => envelope_ok("agent record", agent_record),
            Err(registry_fault) => store_fault_response(registry_fault),
        }
    }

    /// Endpoint: DELETE /api/v1/agent/:id
    #[instrument(skip(application_state))]
    pub async fn handle_delete(
        State(application_state): State<AppState>,
        Path(agent_id): Path<String>,
    ) -> Response {
        match application_state.agent_repository.delete(&agent_id).await {
            Ok(()) => envelope_ok("agent decommissioned", serde_json::json!({"agent_id": agent_id})),
            Err(registry_fault) => store_fault_response(registry_fault),
        }
    }

    /// Endpoint: PUT /api/v1/agent/:id/status
    pub async fn handle_update_status(
        State(application_state): State<AppState>,
        Path(agent_id): Path<String>,
        Json(transition_payload): Json<StatusTransitionPayload>,
    ) -> Response {
        match application_state
            .agent_repository
            .update_status(&agent_id, transition_payload.status)
            .await
        {
            Ok(()) => envelope_ok(
                "agent status updated",
                serde_json::json!({"agent_id": agent_id, "status": transition_payload.status}),
            ),
            Err(registry_fault) => store_fault_response(registry_fault),
        }
    }

    /// Endpoint: GET /api/v1/agent/:id/metrics
    pub async fn handle_get_metrics(
        State(application_state): State<AppState>,
        Path(agent_id): Path<String>,
    ) -> Response {
        match application_state.agent_repository.get_metrics(&agent_id).await {
            Ok(metrics_snapshot) => envelope_ok("latest metrics snapshot", metrics_snapshot),
            Err(registry_fault) => store_fault_response(registry_fault),
        }
    }

    /// Endpoint: POST | PUT /api/v1/agent/:id/metrics
    pub async fn handle_upsert_metrics(
        State(application_state): State<AppState>,
        Path(agent_id): Path<String>,
        Json(mut metrics_snapshot): Json<AgentMetricsSnapshot>,
    ) -> Response {
        // La identidad de la ruta manda sobre la del payload.
        metrics_snapshot.agent_id = agent_id;

        match application_state
            .agent_repository
            .upsert_metrics(&metrics_snapshot)
            .await
        {
            Ok(()) => envelope_ok("metrics snapshot upserted", metrics_snapshot),
            Err(registry_fault) => store_fault_response(registry_fault),
        }
    }

    /**
     * Endpoint: PUT /api/v1/agent/:id/tags
     * Reemplaza exclusivamente los vínculos de provenance
     * 'agent_capability'; otros orígenes permanecen intactos.
     */
    #[instrument(skip(application_state, tags_payload))]
    pub async fn handle_replace_capability_tags(
        State(application_state): State<AppState>,
        Path(agent_id): Path<String>,
        Json(tags_payload): Json<CapabilityTagsPayload>,
    ) -> Response {
        if let Err(registry_fault) = application_state.agent_repository.get(&agent_id).await {
            return store_fault_response(registry_fault);
        }

        let desired_assignments: Vec<(i64, Option<i64>)> = tags_payload
            .tag_ids
            .iter()
            .map(|tag_id| (*tag_id, None))
            .collect();

        match application_state
            .tag_repository
            .sync_entity_tags(
                "agent",
                &agent_id,
                &desired_assignments,
                TagSource::AgentCapability,
            )
            .await
        {
            Ok(()) => envelope_ok(
                "capability tags replaced",
                serde_json::json!({"agent_id": agent_id, "tag_ids": tags_payload.tag_ids}),
            ),
            Err(sync_fault) => store_fault_response(sync_fault),
        }
    }
}
