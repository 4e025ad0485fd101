// [tests/mirror/apps/master/scheduler_materialization.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL PLANIFICADOR (V4.3 - STAGE LADDER)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE MATERIALIZACIÓN, IDEMPOTENCIA Y AVANCE
 *
 * # Mathematical Proof (Tick Idempotence):
 * Re-ejecutar el tick sin cambios externos produce cero tareas nuevas.
 * La etapa N+1 jamás materializa antes de que la etapa N sea terminal.
 * =================================================================
 */

use chrono::Utc;
use neoscan_domain_models::project::{
    ExecutionPolicy, Project, ProjectStatus, ScanStage, TargetSplitPolicy, Workflow,
};
use neoscan_domain_models::task::{TaskResultReport, TaskStatus};
use neoscan_master::config::MasterConfig;
use neoscan_master::services::WorkflowSchedulerService;
use neoscan_master::state::AppState;
use neoscan_infra_db::StoreClient;
use serde_json::json;

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

fn forge_project(project_id: &str, targets: &[&str]) -> Project {
    Project {
        project_id: project_id.to_string(),
        name: format!("project {}", project_id),
        target_scope: targets.iter().map(|target| target.to_string()).collect(),
        status: ProjectStatus::Running,
        environment: Some("staging".to_string()),
        tag_names: vec![],
        notify_config: json!({}),
        export_config: json!({}),
    }
}

fn forge_stage(stage_id: &str, workflow_id: &str, tool: &str, sequence: u32) -> ScanStage {
    ScanStage {
        stage_id: stage_id.to_string(),
        workflow_id: workflow_id.to_string(),
        tool_name: tool.to_string(),
        target_policy: TargetSplitPolicy::PerTarget,
        execution_policy: ExecutionPolicy {
            timeout_seconds: 3600,
            retry_limit: 0,
        },
        performance_settings: json!({"rate": 100}),
        output_config: json!({}),
        enabled: true,
        sequence_index: sequence,
    }
}

async fn seal_all_open_tasks(state: &AppState, project_id: &str) {
    let (open_tasks, _) = state
        .task_repository
        .list_by_project(project_id, 1, 200)
        .await
        .unwrap();
    for open_task in open_tasks {
        if !open_task.status.is_terminal() {
            state
                .task_repository
                .ingest_result(&TaskResultReport {
                    task_id: open_task.task_id.clone(),
                    agent_id: "unit-test".to_string(),
                    status: TaskStatus::Completed,
                    results: json!([]),
                    error_detail: None,
                    reported_at: Utc::now(),
                })
                .await
                .unwrap();
        }
    }
}

#[tokio::test]
async fn certify_deterministic_materialization_and_idempotence() {
    println!("\n🗓️  [INICIO]: Auditoría de materialización del planificador...");
    let mut accumulated_anomalies_count = 0u32;

    let state = forge_state("mem_sched_v43").await;

    // Génesis: proyecto running con dos objetivos desordenados.
    state
        .project_repository
        .upsert_project(&forge_project("p1", &["10.1.1.9", "10.1.1.2"]))
        .await
        .unwrap();
    state
        .project_repository
        .upsert_workflow(&Workflow {
            workflow_id: "w1".to_string(),
            project_id: "p1".to_string(),
            name: "discovery".to_string(),
            sequence_index: 0,
        })
        .await
        .unwrap();
    state
        .project_repository
        .upsert_stage(&forge_stage("s1", "w1", "portscan", 0))
        .await
        .unwrap();

    let scheduler = WorkflowSchedulerService::new(state.clone());

    // FASE 1: Primer tick materializa un frente determinista.
    println!("   🧪 Fase 1: Materialización determinista...");
    let first_tick = scheduler.run_tick().await.unwrap();
    if first_tick.tasks_materialized != 2 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Se esperaban 2 tareas, hubo {}.", first_tick.tasks_materialized);
    }

    let (materialized_tasks, _) = state.task_repository.list_by_project("p1", 1, 50).await.unwrap();
    let targets_in_order: Vec<&str> = materialized_tasks
        .iter()
        .map(|task| task.input_target.as_str())
        .collect();
    if targets_in_order != vec!["10.1.1.2", "10.1.1.9"] {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Los objetivos deben materializarse ordenados: {:?}", targets_in_order);
    }
    if materialized_tasks.iter().any(|task| task.assigned_agent_id.is_some()) {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Una tarea pending jamás porta agente.");
    }

    // FASE 2: Idempotencia del tick.
    println!("   🧪 Fase 2: Idempotencia del tick...");
    let repeated_tick = scheduler.run_tick().await.unwrap();
    if repeated_tick.tasks_materialized != 0 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El tick repetido materializó {} tareas.", repeated_tick.tasks_materialized);
    }

    // FASE 3: Sellado de etapa => proyecto completed.
    println!("   🧪 Fase 3: Avance a completed...");
    seal_all_open_tasks(&state, "p1").await;
    let closing_tick = scheduler.run_tick().await.unwrap();
    if closing_tick.projects_completed != 1 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El proyecto debía sellarse como completed.");
    }
    let sealed_project = state.project_repository.get_project("p1").await.unwrap();
    if sealed_project.status != ProjectStatus::Completed {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Estado final {:?}.", sealed_project.status);
    }

    println!("\n🏁 [INFORME]: Anomalías detectadas: {}", accumulated_anomalies_count);
    assert_eq!(accumulated_anomalies_count, 0, "La integridad del planificador ha sido comprometida.");
}

#[tokio::test]
async fn certify_strict_stage_ladder() {
    let state = forge_state("mem_sched_ladder_v43").await;

    state
        .project_repository
        .upsert_project(&forge_project("p2", &["192.168.1.1"]))
        .await
        .unwrap();
    state
        .project_repository
        .upsert_workflow(&Workflow {
            workflow_id: "w2".to_string(),
            project_id: "p2".to_string(),
            name: "two-step".to_string(),
            sequence_index: 0,
        })
        .await
        .unwrap();
    state
        .project_repository
        .upsert_stage(&forge_stage("s2a", "w2", "portscan", 0))
        .await
        .unwrap();
    state
        .project_repository
        .upsert_stage(&forge_stage("s2b", "w2", "webfingerprint", 1))
        .await
        .unwrap();

    let scheduler = WorkflowSchedulerService::new(state.clone());

    // Tick 1: solo la etapa 0 materializa.
    scheduler.run_tick().await.unwrap();
    let (after_first_tick, _) = state.task_repository.list_by_project("p2", 1, 50).await.unwrap();
    assert!(after_first_tick.iter().all(|task| task.stage_id == "s2a"),
        "La etapa N+1 jamás materializa antes de que la etapa N sea terminal.");

    // Tick 2 sin sellar etapa 0: sigue sin aparecer la etapa 1.
    scheduler.run_tick().await.unwrap();
    let (after_second_tick, _) = state.task_repository.list_by_project("p2", 1, 50).await.unwrap();
    assert_eq!(after_second_tick.len(), 1);

    // Sellar etapa 0 => el siguiente tick abre la etapa 1.
    seal_all_open_tasks(&state, "p2").await;
    scheduler.run_tick().await.unwrap();
    let (after_advance, _) = state.task_repository.list_by_project("p2", 1, 50).await.unwrap();
    assert!(
        after_advance.iter().any(|task| task.stage_id == "s2b"),
        "La escalera debe abrir la etapa siguiente tras sellar la previa."
    );
}
