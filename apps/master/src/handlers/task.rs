// [apps/master/src/handlers/task.rs]
/*!
 * =================================================================
 * APARATO: TASK REPORTING HANDLER (V4.3 - RESULT INGESTION)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: COLA DEL AGENTE E INGESTA IDEMPOTENTE DE RESULTADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPANION ENDPOINTS: El agente drena su cola y reporta por
 *    task_id; la ingesta es idempotente y un duplicado converge.
 * 2. ASSET SYNTHESIS: Un resultado de escaneo registra los activos
 *    descubiertos en el grafo y dispara el auto-etiquetado con
 *    provenance 'auto' sobre cada host tocado.
 * =================================================================
 */

use crate::handlers::{envelope_ok, store_fault_response};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use neoscan_domain_models::tag::TagSource;
use neoscan_domain_models::task::{TaskResultReport, TaskStatus};
use neoscan_domain_rules::condition::matching_tag_assignments;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

pub struct TaskReportingHandler;

impl TaskReportingHandler {
    /// Endpoint: GET /api/v1/agent/:id/tasks (drenado de cola)
    #[instrument(skip(application_state))]
    pub async fn handle_pull_agent_queue(
        State(application_state): State<AppState>,
        Path(agent_id): Path<String>,
    ) -> Response {
        if let Err(registry_fault) = application_state.agent_repository.get(&agent_id).await {
            return store_fault_response(registry_fault);
        }

        match application_state
            .task_repository
            .pull_agent_queue(&agent_id, 16)
            .await
        {
            Ok(agent_queue) => envelope_ok("agent task queue", agent_queue),
            Err(ledger_fault) => store_fault_response(ledger_fault),
        }
    }

    /// Endpoint: GET /api/v1/task/:task_id
    pub async fn handle_get_task(
        State(application_state): State<AppState>,
        Path(task_id): Path<String>,
    ) -> Response {
        match application_state.task_repository.get(&task_id).await {
            Ok(task_artifact) => envelope_ok("task record", task_artifact),
            Err(ledger_fault) => store_fault_response(ledger_fault),
        }
    }

    /**
     * Endpoint: POST /api/v1/task/:task_id/result
     * Ingesta idempotente sellada por task_id + síntesis de activos.
     */
    #[instrument(skip(application_state, result_report), fields(task = %task_id))]
    pub async fn handle_report_result(
        State(application_state): State<AppState>,
        Path(task_id): Path<String>,
        Json(mut result_report): Json<TaskResultReport>,
    ) -> Response {
        // La identidad de la ruta manda sobre la del payload.
        result_report.task_id = task_id.clone();

        let was_applied = match application_state
            .task_repository
            .ingest_result(&result_report)
            .await
        {
            Ok(applied) => applied,
            Err(ledger_fault) => return store_fault_response(ledger_fault),
        };

        // Síntesis de activos: solo sobre la primera ingesta efectiva
        // de un resultado exitoso.
        if was_applied && result_report.status == TaskStatus::Completed {
            if let Err(synthesis_fault) =
                synthesize_assets(&application_state, &result_report.results).await
            {
                warn!("⚠️ [RESULT_INGEST]: Asset synthesis incomplete: {}", synthesis_fault);
            }
        }

        envelope_ok(
            "task result ingested",
            json!({"task_id": task_id, "applied": was_applied}),
        )
    }
}

/**
 * Registra los hosts descubiertos en el grafo de activos y aplica el
 * auto-etiquetado por reglas (provenance 'auto').
 */
async fn synthesize_assets(
    application_state: &AppState,
    raw_results: &Value,
) -> anyhow::Result<()> {
    let Some(result_entries) = raw_results.as_array() else {
        return Ok(());
    };

    // Un host puede aparecer en múltiples entradas (un puerto por fila):
    // sus atributos se acumulan antes del upsert.
    let mut host_attribute_map: std::collections::BTreeMap<String, Vec<&Value>> =
        std::collections::BTreeMap::new();
    for result_entry in result_entries {
        if let Some(host_label) = result_entry["host"].as_str() {
            host_attribute_map
                .entry(host_label.to_string())
                .or_default()
                .push(result_entry);
        }
    }

    for (host_label, host_entries) in &host_attribute_map {
        let open_ports: Vec<Value> = host_entries
            .iter()
            .filter_map(|entry| entry["port"].as_u64())
            .map(Value::from)
            .collect();
        let observed_services: Vec<Value> = host_entries
            .iter()
            .filter_map(|entry| entry["fingerprint"]["service"].as_str())
            .map(|service| Value::from(service.to_string()))
            .collect();

        let asset_attributes = json!({
            "ip": host_label,
            "open_ports": open_ports,
            "services": observed_services,
        });

        application_state
            .tag_repository
            .upsert_asset("host", host_label, &asset_attributes)
            .await?;

        // AUTO-TAG: reglas habilitadas del tipo 'host' en prioridad.
        let host_rules = application_state.tag_repository.fetch_match_rules("host").await?;
        let attribute_map = asset_attributes.as_object().cloned().unwrap_or_default();
        let winning_assignments: Vec<(i64, Option<i64>)> =
            matching_tag_assignments(&host_rules, &attribute_map)
                .into_iter()
                .map(|(tag_id, rule_id)| (tag_id, Some(rule_id)))
                .collect();

        application_state
            .tag_repository
            .sync_entity_tags("host", host_label, &winning_assignments, TagSource::Auto)
            .await?;

        debug!(
            "🧬 [ASSET_SYNTH]: Host {} recorded with {} auto tags.",
            host_label,
            winning_assignments.len()
        );
    }

    Ok(())
}
