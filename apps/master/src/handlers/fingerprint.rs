// [apps/master/src/handlers/fingerprint.rs]
/*!
 * =================================================================
 * APARATO: FINGERPRINT DISTRIBUTION HANDLER (V4.2 - SIGNED GATE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: VERSIÓN, DESCARGA FIRMADA, IMPORT Y ROLLBACK
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. METADATA FIRST: /version entrega {version_hash, file_count,
 *    rule_path} sin transferir un solo byte del bundle.
 * 2. OUT-OF-BAND SIGNATURE: /download adjunta el bundle con la firma
 *    HMAC en la cabecera 'X-Content-Signature'.
 * 3. MUTATION DISCIPLINE: Toda importación crea backup previo y
 *    re-publica el snapshot; el rollback restaura exactamente el
 *    estado respaldado.
 * =================================================================
 */

use crate::handlers::{envelope_failed, envelope_ok, store_fault_response};
use crate::services::snapshot::SnapshotAssemblyService;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{info, instrument};

/// Cabecera fuera de banda que transporta la firma HMAC del bundle
/// (forma canónica en minúsculas para HeaderName::from_static).
pub const SIGNATURE_HEADER: &str = "x-content-signature";

#[derive(Debug, Deserialize)]
pub struct RuleImportPayload {
    /// Filas entrantes: (archivo lógico, contenido, habilitada).
    pub rules: Vec<RuleImportRow>,
    /// Origen de la importación: "builtin" o "custom".
    #[serde(default = "default_import_source")]
    pub source: String,
}

#[derive(Debug, Deserialize)]
pub struct RuleImportRow {
    pub rule_file: String,
    pub content: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RollbackPayload {
    pub backup_id: String,
}

fn default_import_source() -> String {
    "custom".to_string()
}

fn default_enabled() -> bool {
    true
}

pub struct FingerprintDistributionHandler;

impl FingerprintDistributionHandler {
    /// Endpoint: GET /agent-update/fingerprint/version
    pub async fn handle_version(State(application_state): State<AppState>) -> Response {
        match application_state.current_snapshot() {
            Some(signed_snapshot) => {
                envelope_ok("snapshot version", signed_snapshot.descriptor.clone())
            }
            None => envelope_failed(
                StatusCode::SERVICE_UNAVAILABLE,
                "snapshot not yet sealed",
                "SNAPSHOT_VOID",
            ),
        }
    }

    /// Endpoint: GET /agent-update/fingerprint/download
    #[instrument(skip(application_state))]
    pub async fn handle_download(State(application_state): State<AppState>) -> Response {
        let Some(signed_snapshot) = application_state.current_snapshot() else {
            return envelope_failed(
                StatusCode::SERVICE_UNAVAILABLE,
                "snapshot not yet sealed",
                "SNAPSHOT_VOID",
            );
        };

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!(
                        "attachment; filename=\"fingerprint-{}.bundle\"",
                        signed_snapshot.descriptor.version_hash
                    ),
                ),
                (
                    header::HeaderName::from_static(SIGNATURE_HEADER),
                    signed_snapshot.signature_hex.clone(),
                ),
            ],
            signed_snapshot.canonical_bytes.clone(),
        )
            .into_response()
    }

    /**
     * Endpoint: POST /agent-update/fingerprint/import
     * Importación mutante con backup automático y re-publicación.
     */
    #[instrument(skip(application_state, import_payload))]
    pub async fn handle_import(
        State(application_state): State<AppState>,
        Json(import_payload): Json<RuleImportPayload>,
    ) -> Response {
        let incoming_rows: Vec<(String, String, bool)> = import_payload
            .rules
            .iter()
            .map(|row| (row.rule_file.clone(), row.content.clone(), row.enabled))
            .collect();

        let backup_identifier = match application_state
            .rule_repository
            .import_rules(&incoming_rows, &import_payload.source)
            .await
        {
            Ok(backup_identifier) => backup_identifier,
            Err(import_fault) => return store_fault_response(import_fault),
        };

        let assembly_service = SnapshotAssemblyService::new(application_state.clone());
        match assembly_service.rebuild_and_publish().await {
            Ok(fresh_descriptor) => {
                info!("📦 [RULE_GATE]: Import sealed; new version {}.", fresh_descriptor.version_hash);
                envelope_ok(
                    "rules imported",
                    serde_json::json!({
                        "backup_id": backup_identifier,
                        "version_hash": fresh_descriptor.version_hash,
                        "imported": incoming_rows.len(),
                    }),
                )
            }
            Err(rebuild_fault) => store_fault_response(rebuild_fault),
        }
    }

    /**
     * Endpoint: POST /agent-update/fingerprint/rollback
     * Rollback verdadero al estado del backup indicado.
     */
    #[instrument(skip(application_state, rollback_payload))]
    pub async fn handle_rollback(
        State(application_state): State<AppState>,
        Json(rollback_payload): Json<RollbackPayload>,
    ) -> Response {
        let restored_rows = match application_state
            .rule_repository
            .rollback_to_backup(&rollback_payload.backup_id)
            .await
        {
            Ok(restored_rows) => restored_rows,
            Err(rollback_fault) => return store_fault_response(rollback_fault),
        };

        let assembly_service = SnapshotAssemblyService::new(application_state.clone());
        match assembly_service.rebuild_and_publish().await {
            Ok(fresh_descriptor) => envelope_ok(
                "rollback applied",
                serde_json::json!({
                    "backup_id": rollback_payload.backup_id,
                    "restored_rows": restored_rows,
                    "version_hash": fresh_descriptor.version_hash,
                }),
            ),
            Err(rebuild_fault) => store_fault_response(rebuild_fault),
        }
    }
}
