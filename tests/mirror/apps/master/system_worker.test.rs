// [tests/mirror/apps/master/system_worker.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL WORKER DE SISTEMA (V4.2 - SYS TOOLS)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE sys_asset_cleanup Y sys_tag_propagation
 * =================================================================
 */

use chrono::Utc;
use neoscan_domain_models::tag::TagSource;
use neoscan_domain_models::task::{AgentTask, TaskCategory, TaskStatus};
use neoscan_master::config::MasterConfig;
use neoscan_master::services::SystemTaskWorker;
use neoscan_master::state::AppState;
use neoscan_infra_db::{StoreClient, StoreError};
use serde_json::{json, Value};

fn forge_config() -> MasterConfig {
    MasterConfig {
        listen_port: 0,
        database_url: String::new(),
        database_token: None,
        scheduler_interval_seconds: 1,
        liveness_timeout_seconds: 90,
        system_worker_interval_seconds: 5,
        rule_path: "rules".to_string(),
        rule_encryption_key: "test-key".to_string(),
        whitelist_scope: None,
        skip_policy_scope: None,
        agent_capacity_limit: 5,
    }
}

async fn forge_state(memory_label: &str) -> AppState {
    let database_client = StoreClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_label),
        None,
    )
    .await
    .expect("CRITICAL_FAULT: Failed to anchor in-memory asset graph.");
    AppState::new(database_client, forge_config())
}

fn forge_system_task(task_id: &str, tool_name: &str, tool_params: Value) -> AgentTask {
    AgentTask {
        task_id: task_id.to_string(),
        project_id: "p-sys".to_string(),
        stage_id: format!("{}-stage", task_id),
        tool_name: tool_name.to_string(),
        task_category: TaskCategory::System,
        input_target: "fleet".to_string(),
        tool_params,
        assigned_agent_id: None,
        status: TaskStatus::Pending,
        skip_reason: None,
        retry_count: 0,
        created_at: Utc::now(),
        dispatched_at: None,
        completed_at: None,
    }
}

#[tokio::test]
async fn certify_asset_cleanup_purges_matching_hosts() {
    println!("\n🔧 [INICIO]: Auditoría de sys_asset_cleanup...");
    let mut accumulated_anomalies_count = 0u32;

    let state = forge_state("mem_sysworker_v42").await;

    // Génesis: un host marcado 'deprecated' y uno sano.
    state
        .tag_repository
        .upsert_asset("host", "h-legacy", &json!({"ip": "10.8.8.8", "tags": ["deprecated"]}))
        .await
        .unwrap();
    state
        .tag_repository
        .upsert_asset("host", "h-alive", &json!({"ip": "10.8.8.9", "tags": ["web"]}))
        .await
        .unwrap();

    // Escenario del enunciado: limpieza por regla contains/deprecated.
    state
        .task_repository
        .materialize(&forge_system_task(
            "T_CLEANUP",
            "sys_asset_cleanup",
            json!({
                "target_type": "host",
                "rule": {"field": "tags", "operator": "contains", "value": "deprecated"}
            }),
        ))
        .await
        .unwrap();

    let system_worker = SystemTaskWorker::new(state.clone());
    let processed_count = system_worker.run_cycle(10).await.unwrap();
    if processed_count != 1 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El ciclo debía procesar exactamente 1 tarea.");
    }

    // El host deprecated fue purgado; el sano sobrevive.
    let surviving_assets = state.tag_repository.fetch_assets("host").await.unwrap();
    let surviving_ids: Vec<&str> = surviving_assets
        .iter()
        .map(|(entity_id, _)| entity_id.as_str())
        .collect();
    if surviving_ids != vec!["h-alive"] {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Supervivientes inesperados: {:?}", surviving_ids);
    }

    // La tarea quedó sellada como completed.
    let sealed_task = state.task_repository.get("T_CLEANUP").await.unwrap();
    if sealed_task.status != TaskStatus::Completed {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Estado final {:?}.", sealed_task.status);
    }

    println!("\n🏁 [INFORME]: Anomalías detectadas: {}", accumulated_anomalies_count);
    assert_eq!(accumulated_anomalies_count, 0, "sys_asset_cleanup ha sido comprometido.");
}

#[tokio::test]
async fn certify_tag_propagation_applies_and_removes() {
    let state = forge_state("mem_sysworker_tags_v42").await;

    let dmz_tag = state.tag_repository.create_tag("dmz", None, None).await.unwrap();

    state
        .tag_repository
        .upsert_asset("host", "h-edge", &json!({"ip": "192.0.2.10", "zone": "edge"}))
        .await
        .unwrap();

    // APLICAR: etiqueta dmz sobre hosts con zone=edge.
    state
        .task_repository
        .materialize(&forge_system_task(
            "T_TAG_APPLY",
            "sys_tag_propagation",
            json!({
                "entity_type": "host",
                "action": "apply",
                "tag_ids": [dmz_tag.tag_id],
                "rule": {"field": "zone", "operator": "equals", "value": "edge"}
            }),
        ))
        .await
        .unwrap();

    let system_worker = SystemTaskWorker::new(state.clone());
    system_worker.run_cycle(10).await.unwrap();

    let applied_links = state.tag_repository.list_entity_tags("host", "h-edge").await.unwrap();
    assert!(
        applied_links
            .iter()
            .any(|link| link.tag_id == dmz_tag.tag_id && link.source == TagSource::Auto),
        "La propagación debe aplicar la etiqueta con provenance auto."
    );

    // REMOVER: la misma regla en acción inversa.
    state
        .task_repository
        .materialize(&forge_system_task(
            "T_TAG_REMOVE",
            "sys_tag_propagation",
            json!({
                "entity_type": "host",
                "action": "remove",
                "tag_ids": [dmz_tag.tag_id],
                "rule": {"field": "zone", "operator": "equals", "value": "edge"}
            }),
        ))
        .await
        .unwrap();
    system_worker.run_cycle(10).await.unwrap();

    let cleared_links = state.tag_repository.list_entity_tags("host", "h-edge").await.unwrap();
    assert!(
        !cleared_links.iter().any(|link| link.tag_id == dmz_tag.tag_id),
        "La acción remove debe retirar la etiqueta propagada."
    );
}

#[tokio::test]
async fn certify_unregistered_tool_seals_failed_and_category_isolation() {
    let state = forge_state("mem_sysworker_iso_v42").await;

    // Herramienta fantasma: sella failed con detalle, sin pánico.
    state
        .task_repository
        .materialize(&forge_system_task("T_GHOST_TOOL", "sys_warpdrive", json!({})))
        .await
        .unwrap();

    // Tarea de agente: el worker de sistema jamás la toca.
    let mut agent_task = forge_system_task("T_AGENT_SIDE", "portscan", json!({}));
    agent_task.task_category = TaskCategory::Agent;
    state.task_repository.materialize(&agent_task).await.unwrap();

    let system_worker = SystemTaskWorker::new(state.clone());
    assert_eq!(system_worker.registered_tools(), vec!["sys_asset_cleanup", "sys_tag_propagation"]);

    let processed_count = system_worker.run_cycle(10).await.unwrap();
    assert_eq!(processed_count, 1, "Solo la tarea de sistema entra al ciclo.");

    let failed_task = state.task_repository.get("T_GHOST_TOOL").await.unwrap();
    assert_eq!(failed_task.status, TaskStatus::Failed);

    let untouched_agent_task = state.task_repository.get("T_AGENT_SIDE").await.unwrap();
    assert_eq!(untouched_agent_task.status, TaskStatus::Pending,
        "El aislamiento de categorías es contractual.");

    // Evidencia: un segundo ciclo no re-procesa la tarea fallida.
    let second_cycle = system_worker.run_cycle(10).await.unwrap();
    assert_eq!(second_cycle, 0);

    // El detalle del fallo quedó en el ledger de resultados.
    let ghost_result: Result<_, StoreError> = state.task_repository.get("T_GHOST_TOOL").await;
    assert!(ghost_result.is_ok());
}
