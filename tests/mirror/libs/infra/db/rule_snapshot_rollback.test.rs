// [tests/mirror/libs/infra/db/rule_snapshot_rollback.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE ROLLBACK VERDADERO (V3.2 - TIME SEAL)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE BACKUP, OVERWRITE CUSTOM Y ROLLBACK
 *
 * # Mathematical Proof (True Rollback):
 * Para cualquier backup B y cualquier estado S alcanzado por
 * mutaciones posteriores, Rollback(B) produce exactamente B: las
 * filas sucias se eliminan, jamás se fusionan aditivamente.
 * =================================================================
 */

use neoscan_infra_db::repositories::RuleRepository;
use neoscan_infra_db::StoreClient;

fn forge_builtin_rules() -> Vec<(String, String, bool)> {
    vec![
        (
            "nmap-service-probes".to_string(),
            "match ssh m|^SSH-| p/OpenSSH/".to_string(),
            true,
        ),
        (
            "nmap-service-probes".to_string(),
            "match http m|^HTTP/| p/httpd/".to_string(),
            true,
        ),
        (
            "web-fingerprints".to_string(),
            "match nginx m|Server: nginx|".to_string(),
            true,
        ),
    ]
}

#[tokio::test]
async fn certify_true_rollback_purges_dirty_rows() {
    println!("\n⏪ [INICIO]: Auditoría de rollback verdadero de reglas...");
    let mut accumulated_anomalies_count = 0u32;

    let database_client = StoreClient::connect("file:mem_rules_v32?mode=memory&cache=shared", None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory asset graph.");
    let rule_repository = RuleRepository::new(database_client.clone());

    // FASE 1: Importación builtin inicial (crea su propio backup vacío)
    println!("   🧪 Fase 1: Importación builtin...");
    rule_repository
        .import_rules(&forge_builtin_rules(), "builtin")
        .await
        .expect("IMPORT_FAULT: Builtin import collapsed.");

    let baseline_rules = rule_repository.list_enabled_canonical().await.unwrap();
    if baseline_rules.len() != 3 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Se esperaban 3 reglas base, hay {}.", baseline_rules.len());
    }

    // FASE 2: Backup del estado base (B)
    println!("   🧪 Fase 2: Sello del backup B...");
    let backup_identifier = rule_repository.create_backup().await.unwrap();

    // FASE 3: Mutaciones sucias posteriores a B
    println!("   🧪 Fase 3: Mutaciones sucias (custom + toggle)...");
    rule_repository
        .import_rules(
            &[("custom-rules".to_string(), "match exotic m|^EXOTIC|".to_string(), true)],
            "custom",
        )
        .await
        .unwrap();
    let first_rule_id = baseline_rules[0].rule_id;
    rule_repository.toggle_rule(first_rule_id, false).await.unwrap();

    let dirty_rules = rule_repository.list_enabled_canonical().await.unwrap();
    if dirty_rules.len() != 3 {
        // 3 base - 1 deshabilitada + 1 custom = 3 habilitadas
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El estado sucio esperado no se materializó.");
    }

    // FASE 4: Rollback(B) => exactamente B, sin residuos
    println!("   🧪 Fase 4: Rollback verdadero...");
    let restored_row_count = rule_repository.rollback_to_backup(&backup_identifier).await.unwrap();
    if restored_row_count != 3 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El backup B portaba 3 filas, se restauraron {}.", restored_row_count);
    }

    let restored_rules = rule_repository.list_enabled_canonical().await.unwrap();
    if restored_rules.len() != 3 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Tras el rollback deben vivir exactamente las 3 reglas de B.");
    }
    if restored_rules.iter().any(|rule| rule.source == "custom") {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Residuo custom sobrevivió al rollback (merge aditivo).");
    }

    println!("\n🏁 [INFORME]: Anomalías detectadas: {}", accumulated_anomalies_count);
    assert_eq!(accumulated_anomalies_count, 0, "El rollback verdadero ha sido comprometido.");
}

#[tokio::test]
async fn certify_custom_import_overwrites_only_custom() {
    let database_client = StoreClient::connect("file:mem_rules_custom_v32?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let rule_repository = RuleRepository::new(database_client.clone());

    rule_repository.import_rules(&forge_builtin_rules(), "builtin").await.unwrap();
    rule_repository
        .import_rules(
            &[("custom-rules".to_string(), "match legacy m|^OLD|".to_string(), true)],
            "custom",
        )
        .await
        .unwrap();

    // Segunda importación custom: reemplaza la custom previa, no anexa.
    rule_repository
        .import_rules(
            &[("custom-rules".to_string(), "match fresh m|^NEW|".to_string(), true)],
            "custom",
        )
        .await
        .unwrap();

    let surviving_rules = rule_repository.list_enabled_canonical().await.unwrap();
    let custom_rules: Vec<_> = surviving_rules
        .iter()
        .filter(|rule| rule.source == "custom")
        .collect();
    let builtin_count = surviving_rules
        .iter()
        .filter(|rule| rule.source == "builtin")
        .count();

    assert_eq!(custom_rules.len(), 1, "La importación custom reescribe, jamás anexa.");
    assert!(custom_rules[0].content.contains("NEW"));
    assert_eq!(builtin_count, 3, "Las filas builtin quedan intactas.");
}

#[tokio::test]
async fn certify_canonical_order_is_stable() {
    let database_client = StoreClient::connect("file:mem_rules_order_v32?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let rule_repository = RuleRepository::new(database_client.clone());

    // Inserción deliberadamente desordenada.
    rule_repository
        .import_rules(
            &[
                ("zeta-file".to_string(), "rule z".to_string(), true),
                ("alpha-file".to_string(), "rule b".to_string(), true),
                ("alpha-file".to_string(), "rule a".to_string(), true),
            ],
            "builtin",
        )
        .await
        .unwrap();

    let canonical_rules = rule_repository.list_enabled_canonical().await.unwrap();
    let canonical_projection: Vec<(String, String)> = canonical_rules
        .iter()
        .map(|rule| (rule.rule_file.clone(), rule.content.clone()))
        .collect();

    assert_eq!(
        canonical_projection,
        vec![
            ("alpha-file".to_string(), "rule a".to_string()),
            ("alpha-file".to_string(), "rule b".to_string()),
            ("zeta-file".to_string(), "rule z".to_string()),
        ],
        "El orden canónico (archivo, contenido) sella el version_hash."
    );
}
