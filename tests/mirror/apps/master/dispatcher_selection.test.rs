// [tests/mirror/apps/master/dispatcher_selection.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL DESPACHADOR (V4.2 - LEAST LOADED)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE ELEGIBILIDAD, CARGA Y BACKPRESSURE
 * =================================================================
 */

use chrono::Utc;
use neoscan_domain_models::agent::{
    AgentMetricsSnapshot, AgentRegistrationRequest, WorkStatus,
};
use neoscan_domain_models::task::{AgentTask, TaskCategory, TaskStatus};
use neoscan_master::config::MasterConfig;
use neoscan_master::services::TaskDispatchService;
use neoscan_master::state::AppState;
use neoscan_infra_db::StoreClient;
use serde_json::json;

fn forge_config(capacity_limit: u32) -> MasterConfig {
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
        agent_capacity_limit: capacity_limit,
    }
}

async fn forge_state(memory_label: &str, capacity_limit: u32) -> AppState {
    let database_client = StoreClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_label),
        None,
    )
    .await
    .expect("CRITICAL_FAULT: Failed to anchor in-memory asset graph.");
    AppState::new(database_client, forge_config(capacity_limit))
}

async fn enlist_agent(state: &AppState, hostname: &str, port: u16, running_tasks: u32) -> String {
    let receipt = state
        .agent_repository
        .register(&AgentRegistrationRequest {
            hostname: hostname.to_string(),
            ip: "192.0.2.1".to_string(),
            port,
            operating_system: Some("linux".to_string()),
            architecture: Some("x86_64".to_string()),
            cpu_cores: Some(4),
            memory_megabytes: Some(8192),
            disk_gigabytes: Some(256),
            agent_version: Some("1.4.0".to_string()),
            capabilities: vec!["portscan".to_string()],
        })
        .await
        .expect("REGISTRY_FAULT: enlistment collapsed.");

    state
        .agent_repository
        .upsert_metrics(&AgentMetricsSnapshot {
            agent_id: receipt.agent_id.clone(),
            cpu_usage_percent: 10.0,
            memory_usage_percent: 20.0,
            disk_usage_percent: 30.0,
            network_bytes_sent: 0,
            network_bytes_received: 0,
            running_tasks,
            completed_tasks: 0,
            failed_tasks: 0,
            work_status: WorkStatus::Working,
            scan_type: Some("portscan".to_string()),
            captured_at: Utc::now(),
        })
        .await
        .unwrap();

    receipt.agent_id
}

fn forge_pending_task(task_id: &str, target: &str, tool: &str) -> AgentTask {
    AgentTask {
        task_id: task_id.to_string(),
        project_id: "p-dispatch".to_string(),
        stage_id: "s-dispatch".to_string(),
        tool_name: tool.to_string(),
        task_category: TaskCategory::Agent,
        input_target: target.to_string(),
        tool_params: json!({}),
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
async fn certify_least_loaded_selection() {
    println!("\n🎯 [INICIO]: Auditoría de selección por menor carga...");

    let state = forge_state("mem_dispatch_v42", 5).await;
    state
        .agent_repository
        .seed_capability("portscan", "Escaneo TCP", &["portscan", "nmap"])
        .await
        .unwrap();

    let _heavy_unit = enlist_agent(&state, "heavy", 9001, 3).await;
    let light_unit = enlist_agent(&state, "light", 9002, 1).await;

    state
        .task_repository
        .materialize(&forge_pending_task("T_SELECT", "198.51.100.4", "nmap"))
        .await
        .unwrap();

    let dispatcher = TaskDispatchService::new(state.clone());
    let dispatched_count = dispatcher.dispatch_pending_batch(10).await.unwrap();
    assert_eq!(dispatched_count, 1);

    let dispatched_task = state.task_repository.get("T_SELECT").await.unwrap();
    assert_eq!(dispatched_task.status, TaskStatus::Dispatched);
    assert_eq!(
        dispatched_task.assigned_agent_id.as_deref(),
        Some(light_unit.as_str()),
        "La unidad con menor carga debe ganar la selección."
    );

    println!("   ✅ Unidad liviana seleccionada: {}", light_unit);
}

#[tokio::test]
async fn certify_backpressure_when_fleet_saturated() {
    let state = forge_state("mem_dispatch_bp_v42", 2).await;
    state
        .agent_repository
        .seed_capability("portscan", "Escaneo TCP", &["portscan"])
        .await
        .unwrap();

    // Ambas unidades viven en el tope de capacidad (2).
    enlist_agent(&state, "sat-a", 9101, 2).await;
    enlist_agent(&state, "sat-b", 9102, 2).await;

    state
        .task_repository
        .materialize(&forge_pending_task("T_HELD", "198.51.100.9", "portscan"))
        .await
        .unwrap();

    let dispatcher = TaskDispatchService::new(state.clone());
    let dispatched_count = dispatcher.dispatch_pending_batch(10).await.unwrap();
    assert_eq!(dispatched_count, 0, "Sin candidato elegible no hay despacho.");

    let held_task = state.task_repository.get("T_HELD").await.unwrap();
    assert_eq!(held_task.status, TaskStatus::Pending,
        "La tarea permanece pending y se reconsidera en el próximo tick.");
    assert!(held_task.assigned_agent_id.is_none());

    // Una unidad libera carga: el siguiente tick despacha.
    state
        .agent_repository
        .upsert_metrics(&AgentMetricsSnapshot {
            agent_id: state
                .agent_repository
                .list(&Default::default(), 1, 10)
                .await
                .unwrap()
                .0[0]
                .agent_id
                .clone(),
            cpu_usage_percent: 10.0,
            memory_usage_percent: 20.0,
            disk_usage_percent: 30.0,
            network_bytes_sent: 0,
            network_bytes_received: 0,
            running_tasks: 0,
            completed_tasks: 2,
            failed_tasks: 0,
            work_status: WorkStatus::Idle,
            scan_type: None,
            captured_at: Utc::now(),
        })
        .await
        .unwrap();

    let second_round = dispatcher.dispatch_pending_batch(10).await.unwrap();
    assert_eq!(second_round, 1, "La liberación de carga habilita el despacho.");
}

#[tokio::test]
async fn certify_capability_routing_excludes_unfit_units() {
    let state = forge_state("mem_dispatch_cap_v42", 5).await;
    state
        .agent_repository
        .seed_capability("portscan", "Escaneo TCP", &["portscan"])
        .await
        .unwrap();
    state
        .agent_repository
        .seed_capability("webfingerprint", "Huellas web", &["webfingerprint"])
        .await
        .unwrap();

    // Única unidad de la flota: solo portscan.
    enlist_agent(&state, "port-only", 9201, 0).await;

    // Una tarea webfingerprint jamás aterriza en esa unidad.
    state
        .task_repository
        .materialize(&forge_pending_task("T_WEB", "198.51.100.20", "webfingerprint"))
        .await
        .unwrap();

    let dispatcher = TaskDispatchService::new(state.clone());
    let dispatched_count = dispatcher.dispatch_pending_batch(10).await.unwrap();
    assert_eq!(dispatched_count, 0, "La capacidad requerida gobierna el enrutamiento.");

    let held_task = state.task_repository.get("T_WEB").await.unwrap();
    assert_eq!(held_task.status, TaskStatus::Pending);
}
