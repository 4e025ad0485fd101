// [tests/mirror/libs/infra/db/task_dispatch_cas.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CAS DE DESPACHO (V3.3 - LEDGER SEAL)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE TRANSICIONES SELLADAS DEL LEDGER
 *
 * # Mathematical Proof (Single Claimant):
 * El Ledger actúa como semáforo atómico: una tarea 'pending' solo
 * puede ser reclamada por un despachador; el perdedor de la carrera
 * recibe CasConflict y re-selecciona en el siguiente tick.
 * =================================================================
 */

use chrono::Utc;
use neoscan_domain_models::task::{AgentTask, TaskCategory, TaskResultReport, TaskStatus};
use neoscan_infra_db::repositories::TaskRepository;
use neoscan_infra_db::{StoreClient, StoreError};
use serde_json::json;

fn forge_task(task_id: &str, target: &str) -> AgentTask {
    AgentTask {
        task_id: task_id.to_string(),
        project_id: "p1".to_string(),
        stage_id: "s1".to_string(),
        tool_name: "portscan".to_string(),
        task_category: TaskCategory::Agent,
        input_target: target.to_string(),
        tool_params: json!({"ports": "22,80"}),
        assigned_agent_id: None,
        status: TaskStatus::Pending,
        skip_reason: None,
        retry_count: 0,
        created_at: Utc::now(),
        dispatched_at: None,
        completed_at: None,
    }
}

fn forge_result(task_id: &str, agent_id: &str, status: TaskStatus) -> TaskResultReport {
    TaskResultReport {
        task_id: task_id.to_string(),
        agent_id: agent_id.to_string(),
        status,
        results: json!([{"port": 22, "state": "open"}]),
        error_detail: None,
        reported_at: Utc::now(),
    }
}

#[tokio::test]
async fn certify_dispatch_cas_and_result_idempotence() {
    println!("\n🗄️  [INICIO]: Auditoría del CAS de despacho y resultados...");
    let mut accumulated_anomalies_count = 0u32;

    let database_client = StoreClient::connect("file:mem_ledger_v33?mode=memory&cache=shared", None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
    let task_repository = TaskRepository::new(database_client.clone());

    // FASE 1: Materialización idempotente
    println!("   🧪 Fase 1: Clave de idempotencia...");
    let task_artifact = forge_task("T_CAS_1", "10.1.1.1");
    let first_materialization = task_repository.materialize(&task_artifact).await.unwrap();
    let duplicate_materialization = task_repository.materialize(&task_artifact).await.unwrap();
    if !first_materialization || duplicate_materialization {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: La clave (project, stage, target) debe deduplicar.");
    }

    // Mismo objetivo con task_id distinto: sigue siendo duplicado.
    let shadow_task = forge_task("T_CAS_1_SHADOW", "10.1.1.1");
    if task_repository.materialize(&shadow_task).await.unwrap() {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Un task_id nuevo no debe burlar la clave de idempotencia.");
    }

    // FASE 2: CAS de despacho (Theft Protection)
    println!("   🧪 Fase 2: Protección contra robo de tarea...");
    task_repository.claim_for_dispatch("T_CAS_1", "AGENT_ALPHA").await
        .expect("DISPATCH_FAULT: Agent ALPHA failed to claim.");

    match task_repository.claim_for_dispatch("T_CAS_1", "AGENT_BETA").await {
        Err(StoreError::CasConflict) => {
            println!("      ✅ Exclusividad de propiedad certificada.");
        }
        other => {
            accumulated_anomalies_count += 1;
            println!("      ❌ FALLO: Robo de tarea no bloqueado: {:?}", other.is_ok());
        }
    }
    if !matches!(
        task_repository.claim_for_dispatch("T_GHOST", "AGENT_BETA").await,
        Err(StoreError::NotFound)
    ) {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Reclamo de tarea fantasma no diagnosticado.");
    }

    // FASE 3: Confirmación y sellado idempotente de resultado
    println!("   🧪 Fase 3: Ingesta idempotente de resultados...");
    task_repository.mark_running("T_CAS_1", "AGENT_ALPHA").await
        .expect("LEDGER_FAULT: running transition rejected.");

    let completion_report = forge_result("T_CAS_1", "AGENT_ALPHA", TaskStatus::Completed);
    let first_ingestion = task_repository.ingest_result(&completion_report).await.unwrap();
    let duplicate_ingestion = task_repository.ingest_result(&completion_report).await.unwrap();
    if !first_ingestion || duplicate_ingestion {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El reporte duplicado debe converger sin efecto.");
    }

    let sealed_task = task_repository.get("T_CAS_1").await.unwrap();
    if sealed_task.status != TaskStatus::Completed {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: La tarea no quedó sellada como completed.");
    }

    println!("\n🏁 [INFORME]: Anomalías detectadas: {}", accumulated_anomalies_count);
    assert_eq!(accumulated_anomalies_count, 0, "La integridad del Ledger de tareas ha sido comprometida.");
}

#[tokio::test]
async fn certify_skip_seal_and_bounded_retry() {
    let database_client = StoreClient::connect("file:mem_ledger_retry_v33?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let task_repository = TaskRepository::new(database_client.clone());

    // Bloqueo por política: pending -> skipped es terminal.
    let blocked_task = forge_task("T_BLOCKED", "10.9.9.9");
    task_repository.materialize(&blocked_task).await.unwrap();
    task_repository.mark_skipped("T_BLOCKED", "target whitelisted").await.unwrap();

    let skipped_task = task_repository.get("T_BLOCKED").await.unwrap();
    assert_eq!(skipped_task.status, TaskStatus::Skipped);
    assert_eq!(skipped_task.skip_reason.as_deref(), Some("target whitelisted"));

    // Una tarea skipped jamás vuelve a ser despachable.
    assert!(matches!(
        task_repository.claim_for_dispatch("T_BLOCKED", "AGENT_ALPHA").await,
        Err(StoreError::CasConflict)
    ));

    // Reintento acotado: failed -> pending mientras retry_count < límite.
    let fragile_task = forge_task("T_RETRY", "10.2.2.2");
    task_repository.materialize(&fragile_task).await.unwrap();
    task_repository.claim_for_dispatch("T_RETRY", "AGENT_ALPHA").await.unwrap();
    task_repository
        .ingest_result(&forge_result("T_RETRY", "AGENT_ALPHA", TaskStatus::Failed))
        .await
        .unwrap();

    let first_requeue = task_repository.requeue_for_retry("T_RETRY", 1).await.unwrap();
    assert!(first_requeue, "El primer reintento debe re-encolar.");

    let requeued_task = task_repository.get("T_RETRY").await.unwrap();
    assert_eq!(requeued_task.status, TaskStatus::Pending);
    assert_eq!(requeued_task.retry_count, 1);
    assert!(requeued_task.assigned_agent_id.is_none(), "pending jamás porta agente.");

    // Segundo fallo: el límite de 1 reintento ya está agotado.
    task_repository.claim_for_dispatch("T_RETRY", "AGENT_BETA").await.unwrap();
    let second_failure_applied = task_repository
        .ingest_result(&forge_result("T_RETRY", "AGENT_BETA", TaskStatus::Failed))
        .await
        .unwrap();
    assert!(second_failure_applied, "El reporte del reintento es legítimo, no un duplicado.");

    let exhausted_requeue = task_repository.requeue_for_retry("T_RETRY", 1).await.unwrap();
    assert!(!exhausted_requeue, "El límite de reintentos debe sellar la tarea.");
}

#[tokio::test]
async fn certify_category_isolation_in_pending_queue() {
    let database_client = StoreClient::connect("file:mem_ledger_cat_v33?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let task_repository = TaskRepository::new(database_client.clone());

    let mut system_task = forge_task("T_SYS", "host-fleet");
    system_task.tool_name = "sys_asset_cleanup".to_string();
    system_task.task_category = TaskCategory::System;
    task_repository.materialize(&system_task).await.unwrap();

    let agent_task = forge_task("T_AGENT", "10.3.3.3");
    task_repository.materialize(&agent_task).await.unwrap();

    let system_queue = task_repository.fetch_pending(TaskCategory::System, 10).await.unwrap();
    let agent_queue = task_repository.fetch_pending(TaskCategory::Agent, 10).await.unwrap();

    assert_eq!(system_queue.len(), 1);
    assert_eq!(system_queue[0].task_id, "T_SYS");
    assert_eq!(agent_queue.len(), 1);
    assert_eq!(agent_queue[0].task_id, "T_AGENT");
}
