// [tests/mirror/libs/infra/db/entity_tag_sync.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE SINCRONÍA POR PROVENANCE (V3.1 - DIFF)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL AISLAMIENTO DE ORÍGENES EN EL DIFF
 *
 * # Mathematical Proof (Source Isolation):
 * Tras SyncEntityTags(e, S, source=X), el conjunto de etiquetas de e
 * con origen X es exactamente S; las filas de cualquier otro origen
 * permanecen intactas bit-a-bit.
 * =================================================================
 */

use neoscan_domain_models::tag::TagSource;
use neoscan_infra_db::repositories::TagRepository;
use neoscan_infra_db::StoreClient;

#[tokio::test]
async fn certify_source_scoped_diff_sync() {
    println!("\n🏷️  [INICIO]: Auditoría de sincronía de etiquetas por provenance...");
    let mut accumulated_anomalies_count = 0u32;

    let database_client = StoreClient::connect("file:mem_tagsync_v31?mode=memory&cache=shared", None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory asset graph.");
    let tag_repository = TagRepository::new(database_client.clone());

    // FASE 1: Génesis de etiquetas y vínculo manual preexistente
    println!("   🧪 Fase 1: Génesis y vínculo manual...");
    let tag_alpha = tag_repository.create_tag("alpha", None, None).await.unwrap();
    let tag_beta = tag_repository.create_tag("beta", None, None).await.unwrap();
    let tag_gamma = tag_repository.create_tag("gamma", None, None).await.unwrap();

    // El operador fijó 'alpha' manualmente sobre el host h-7.
    tag_repository
        .sync_entity_tags("host", "h-7", &[(tag_alpha.tag_id, None)], TagSource::Manual)
        .await
        .unwrap();

    // FASE 2: El motor auto aplica {alpha, beta}
    println!("   🧪 Fase 2: Sincronía auto inicial...");
    tag_repository
        .sync_entity_tags(
            "host",
            "h-7",
            &[(tag_alpha.tag_id, Some(11)), (tag_beta.tag_id, Some(12))],
            TagSource::Auto,
        )
        .await
        .unwrap();

    // FASE 3: Re-sincronía auto a {beta, gamma}: alpha-auto cae,
    // alpha-manual sobrevive.
    println!("   🧪 Fase 3: Diff que preserva el origen manual...");
    tag_repository
        .sync_entity_tags(
            "host",
            "h-7",
            &[(tag_beta.tag_id, Some(12)), (tag_gamma.tag_id, Some(13))],
            TagSource::Auto,
        )
        .await
        .unwrap();

    let surviving_links = tag_repository.list_entity_tags("host", "h-7").await.unwrap();

    let auto_tag_ids: Vec<i64> = surviving_links
        .iter()
        .filter(|link| link.source == TagSource::Auto)
        .map(|link| link.tag_id)
        .collect();
    let manual_tag_ids: Vec<i64> = surviving_links
        .iter()
        .filter(|link| link.source == TagSource::Manual)
        .map(|link| link.tag_id)
        .collect();

    if auto_tag_ids != vec![tag_beta.tag_id, tag_gamma.tag_id] {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El conjunto auto debe ser exactamente {{beta, gamma}}: {:?}", auto_tag_ids);
    }
    if manual_tag_ids != vec![tag_alpha.tag_id] {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El vínculo manual alpha fue tocado por el diff auto.");
    }

    // FASE 4: Sincronía a conjunto vacío purga solo el origen indicado
    println!("   🧪 Fase 4: Sincronía a vacío...");
    tag_repository
        .sync_entity_tags("host", "h-7", &[], TagSource::Auto)
        .await
        .unwrap();

    let residual_links = tag_repository.list_entity_tags("host", "h-7").await.unwrap();
    if residual_links.len() != 1 || residual_links[0].source != TagSource::Manual {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: La purga auto arrastró vínculos de otros orígenes.");
    }

    // FASE 5: Idempotencia del diff (doble sincronía = mismo estado)
    println!("   🧪 Fase 5: Idempotencia del diff...");
    tag_repository
        .sync_entity_tags("host", "h-7", &[(tag_beta.tag_id, Some(12))], TagSource::Auto)
        .await
        .unwrap();
    tag_repository
        .sync_entity_tags("host", "h-7", &[(tag_beta.tag_id, Some(12))], TagSource::Auto)
        .await
        .unwrap();

    let converged_links = tag_repository.list_entity_tags("host", "h-7").await.unwrap();
    let converged_auto_count = converged_links
        .iter()
        .filter(|link| link.source == TagSource::Auto)
        .count();
    if converged_auto_count != 1 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: La doble sincronía duplicó vínculos auto.");
    }

    println!("\n🏁 [INFORME]: Anomalías detectadas: {}", accumulated_anomalies_count);
    assert_eq!(accumulated_anomalies_count, 0, "El aislamiento de provenance ha sido comprometido.");
}
