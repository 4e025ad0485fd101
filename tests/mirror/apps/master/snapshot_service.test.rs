// [tests/mirror/apps/master/snapshot_service.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL SNAPSHOT FIRMADO (V4.2 - VERSION SEAL)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: ESTABILIDAD DE VERSIÓN, FIRMA Y HIDRATACIÓN
 *
 * # Mathematical Proof (Version Stability):
 * Con el conjunto de reglas inalterado, dos ensamblados consecutivos
 * sellan exactamente el mismo version_hash; conmutar el 'enabled' de
 * una sola regla produce un hash distinto.
 * =================================================================
 */

use neoscan_master::config::MasterConfig;
use neoscan_master::services::snapshot::{compute_bundle_signature, SnapshotAssemblyService};
use neoscan_master::state::AppState;
use neoscan_infra_db::StoreClient;

fn forge_config(rule_path: &str) -> MasterConfig {
    MasterConfig {
        listen_port: 0,
        database_url: String::new(),
        database_token: None,
        scheduler_interval_seconds: 1,
        liveness_timeout_seconds: 90,
        system_worker_interval_seconds: 5,
        rule_path: rule_path.to_string(),
        rule_encryption_key: "snapshot-proving-key".to_string(),
        whitelist_scope: None,
        skip_policy_scope: None,
        agent_capacity_limit: 5,
    }
}

async fn forge_state(memory_label: &str, rule_path: &str) -> AppState {
    let database_client = StoreClient::connect(
        &format!("file:{}?mode=memory&cache=shared", memory_label),
        None,
    )
    .await
    .expect("CRITICAL_FAULT: Failed to anchor in-memory asset graph.");
    AppState::new(database_client, forge_config(rule_path))
}

fn forge_rule_rows() -> Vec<(String, String, bool)> {
    vec![
        ("probes-core".to_string(), "match ssh m|^SSH-|".to_string(), true),
        ("probes-core".to_string(), "match http m|^HTTP/|".to_string(), true),
        ("probes-web".to_string(), "match nginx m|Server: nginx|".to_string(), true),
    ]
}

#[tokio::test]
async fn certify_version_stability_and_sensitivity() {
    println!("\n📦 [INICIO]: Auditoría de estabilidad del version_hash...");
    let mut accumulated_anomalies_count = 0u32;

    let state = forge_state("mem_snapshot_v42", "rules").await;
    state
        .rule_repository
        .import_rules(&forge_rule_rows(), "builtin")
        .await
        .unwrap();

    let assembly_service = SnapshotAssemblyService::new(state.clone());

    // FASE 1: Dos ensamblados consecutivos sellan el mismo hash.
    println!("   🧪 Fase 1: Estabilidad bit-a-bit...");
    let first_descriptor = assembly_service.rebuild_and_publish().await.unwrap();
    let second_descriptor = assembly_service.rebuild_and_publish().await.unwrap();

    if first_descriptor.version_hash != second_descriptor.version_hash {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El hash derivó sin cambio de reglas.");
    }
    if first_descriptor.file_count != 2 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: file_count esperado 2, observado {}.", first_descriptor.file_count);
    }

    // FASE 2: Conmutar una regla cambia el hash.
    println!("   🧪 Fase 2: Sensibilidad al conmutador enabled...");
    let canonical_rules = state.rule_repository.list_enabled_canonical().await.unwrap();
    state
        .rule_repository
        .toggle_rule(canonical_rules[0].rule_id, false)
        .await
        .unwrap();

    let toggled_descriptor = assembly_service.rebuild_and_publish().await.unwrap();
    if toggled_descriptor.version_hash == first_descriptor.version_hash {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El hash debe cambiar al conmutar una regla.");
    }

    // FASE 3: La firma publicada verifica contra los bytes canónicos.
    println!("   🧪 Fase 3: Paridad de firma HMAC...");
    let published_snapshot = state.current_snapshot().expect("SNAPSHOT_VOID");
    let recomputed_signature = compute_bundle_signature(
        &published_snapshot.canonical_bytes,
        "snapshot-proving-key",
    );
    if recomputed_signature != published_snapshot.signature_hex {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: La firma publicada no corresponde a los bytes.");
    }

    println!("\n🏁 [INFORME]: Anomalías detectadas: {}", accumulated_anomalies_count);
    assert_eq!(accumulated_anomalies_count, 0, "El sellado del snapshot ha sido comprometido.");
}

#[tokio::test]
async fn certify_disk_hydration_seeds_builtin_rows() {
    // Directorio efímero con dos archivos de reglas.
    let rule_directory = tempfile::tempdir().expect("IO_FAULT: tempdir rejected.");
    std::fs::write(
        rule_directory.path().join("alpha-probes"),
        "match ssh m|^SSH-|\n\nmatch ftp m|^220 |\n",
    )
    .unwrap();
    std::fs::write(
        rule_directory.path().join("beta-probes"),
        "match http m|^HTTP/|\n",
    )
    .unwrap();

    let rule_path_label = rule_directory.path().to_string_lossy().to_string();
    let state = forge_state("mem_snapshot_disk_v42", &rule_path_label).await;
    let assembly_service = SnapshotAssemblyService::new(state.clone());

    let hydrated_rows = assembly_service.hydrate_rules_from_disk().await.unwrap();
    assert_eq!(hydrated_rows, 3, "Las líneas vacías jamás siembran filas.");

    // Re-hidratar con tabla poblada es un no-op.
    let repeated_hydration = assembly_service.hydrate_rules_from_disk().await.unwrap();
    assert_eq!(repeated_hydration, 0);

    let descriptor = assembly_service.rebuild_and_publish().await.unwrap();
    assert_eq!(descriptor.file_count, 2);
    assert_eq!(descriptor.rule_path, rule_path_label);
}
