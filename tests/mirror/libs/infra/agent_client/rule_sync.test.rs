// [tests/mirror/libs/infra/agent_client/rule_sync.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE SINCRONÍA FIRMADA (V3.2 - SIGNED SWAP)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE POLL, FIRMA HMAC Y SWAP ATÓMICO
 *
 * # Logic:
 * Se levanta un Master simulado en loopback que sirve el descriptor
 * de versión y el bundle firmado. El sincronizador debe: descargar
 * solo ante cambio de hash, verificar la firma antes de tocar disco
 * y rechazar bundles adulterados preservando el caché local.
 * =================================================================
 */

use axum::http::header::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use neoscan_domain_models::api::ApiEnvelope;
use neoscan_domain_models::fingerprint::SnapshotDescriptor;
use neoscan_infra_agent_client::{
    verify_bundle_signature, MasterClient, RuleSnapshotSynchronizer, SnapshotRefresh, UplinkError,
};
use sha2::Sha256;
use std::sync::Arc;

const RULE_ENCRYPTION_KEY: &str = "proving-grounds-shared-key";
const BUNDLE_BODY: &[u8] = b"Probe TCP NULL q||\nmatch ssh m|^SSH-|\n";

fn compute_signature(bundle_bytes: &[u8], key: &str) -> String {
    let mut keyed_mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .expect("CRYPTO_FAULT: HMAC key rejected.");
    keyed_mac.update(bundle_bytes);
    hex::encode(keyed_mac.finalize().into_bytes())
}

/// Master simulado: descriptor + bundle firmado (o adulterado).
async fn spawn_mock_master(tampered_signature: bool) -> String {
    let version_handler = || async {
        Json(ApiEnvelope::success(
            200,
            "snapshot version",
            SnapshotDescriptor {
                version_hash: "hash-v1".to_string(),
                file_count: 1,
                rule_path: "rules".to_string(),
            },
        ))
    };

    let download_handler = move || async move {
        let signature = if tampered_signature {
            "deadbeef".to_string()
        } else {
            compute_signature(BUNDLE_BODY, RULE_ENCRYPTION_KEY)
        };
        let mut response_headers = HeaderMap::new();
        response_headers.insert("X-Content-Signature", signature.parse().unwrap());
        (response_headers, BUNDLE_BODY.to_vec())
    };

    let mock_router = Router::new()
        .route("/agent-update/fingerprint/version", get(version_handler))
        .route("/agent-update/fingerprint/download", get(download_handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("LOOPBACK_FAULT: bind rejected.");
    let bound_address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, mock_router).await;
    });

    format!("http://{}", bound_address)
}

#[tokio::test]
async fn certify_signed_refresh_and_version_gating() {
    println!("\n📦 [INICIO]: Auditoría de sincronía firmada del snapshot...");
    let mut accumulated_anomalies_count = 0u32;

    let master_endpoint = spawn_mock_master(false).await;
    let master_uplink = Arc::new(MasterClient::new(master_endpoint, "test"));

    let cache_directory = tempfile::tempdir().expect("IO_FAULT: tempdir rejected.");
    let cache_path = cache_directory.path().join("service-probes.cache");

    let synchronizer = RuleSnapshotSynchronizer::new(
        Arc::clone(&master_uplink),
        cache_path.clone(),
        RULE_ENCRYPTION_KEY.to_string(),
    );

    // FASE 1: Primer tick -> descarga, verificación y swap
    println!("   🧪 Fase 1: Primer refresco...");
    match synchronizer.refresh_once().await {
        Ok(SnapshotRefresh::Updated { version_hash, bundle_bytes }) => {
            if version_hash != "hash-v1" || bundle_bytes != BUNDLE_BODY {
                accumulated_anomalies_count += 1;
                println!("      ❌ FALLO: Bundle o hash corrupto tras la verificación.");
            }
        }
        other => {
            accumulated_anomalies_count += 1;
            println!("      ❌ FALLO: El primer tick debía actualizar: {:?}", other.is_ok());
        }
    }

    let crystallized_cache = std::fs::read(&cache_path)
        .expect("IO_FAULT: El caché local debe existir tras el swap.");
    if crystallized_cache != BUNDLE_BODY {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El caché local no es bit-perfecto.");
    }

    // FASE 2: Segundo tick -> gate por hash, sin descarga
    println!("   🧪 Fase 2: Gate por version_hash...");
    if !matches!(synchronizer.refresh_once().await, Ok(SnapshotRefresh::Unchanged)) {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Un hash sin cambio jamás re-descarga.");
    }

    println!("\n🏁 [INFORME]: Anomalías detectadas: {}", accumulated_anomalies_count);
    assert_eq!(accumulated_anomalies_count, 0, "La sincronía firmada ha sido comprometida.");
}

#[tokio::test]
async fn certify_tampered_bundle_preserves_local_cache() {
    let master_endpoint = spawn_mock_master(true).await;
    let master_uplink = Arc::new(MasterClient::new(master_endpoint, "test"));

    let cache_directory = tempfile::tempdir().unwrap();
    let cache_path = cache_directory.path().join("service-probes.cache");
    std::fs::write(&cache_path, b"previous trusted snapshot").unwrap();

    let synchronizer = RuleSnapshotSynchronizer::new(
        master_uplink,
        cache_path.clone(),
        RULE_ENCRYPTION_KEY.to_string(),
    );

    let verdict = synchronizer.refresh_once().await;
    assert!(
        matches!(verdict, Err(UplinkError::SignatureMismatch)),
        "Un bundle adulterado debe aflorar SignatureMismatch."
    );

    let untouched_cache = std::fs::read(&cache_path).unwrap();
    assert_eq!(
        untouched_cache, b"previous trusted snapshot",
        "El caché local confiable jamás se toca ante firma inválida."
    );
}

#[test]
fn certify_signature_primitive_parity() {
    let signature = compute_signature(BUNDLE_BODY, RULE_ENCRYPTION_KEY);
    assert!(verify_bundle_signature(BUNDLE_BODY, &signature, RULE_ENCRYPTION_KEY));

    // Cualquier perturbación de bytes, firma o clave rompe la paridad.
    assert!(!verify_bundle_signature(b"perturbed", &signature, RULE_ENCRYPTION_KEY));
    assert!(!verify_bundle_signature(BUNDLE_BODY, "00ff00ff", RULE_ENCRYPTION_KEY));
    assert!(!verify_bundle_signature(BUNDLE_BODY, &signature, "rotated-key"));
    assert!(!verify_bundle_signature(BUNDLE_BODY, "not-hex!!", RULE_ENCRYPTION_KEY));
}
