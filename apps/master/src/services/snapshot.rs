// [apps/master/src/services/snapshot.rs]
/*!
 * =================================================================
 * APARATO: SNAPSHOT ASSEMBLY SERVICE (V4.3 - SIGNED STRATA)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: FLUJO CANÓNICO, HASH DE VERSIÓN Y FIRMA HMAC
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CANONICAL DETERMINISM: El flujo de bytes se construye desde las
 *    reglas habilitadas en orden (archivo, contenido); dos conjuntos
 *    idénticos producen exactamente el mismo version_hash.
 * 2. OUT-OF-BAND SIGNATURE: La firma HMAC-SHA256 con la clave
 *    pre-compartida viaja en la cabecera, jamás dentro del bundle.
 * 3. DISK HYDRATION: En la ignición, un directorio de reglas en disco
 *    siembra la tabla si está vacía (archivos ordenados por ruta).
 * =================================================================
 */

use crate::state::AppState;
use hmac::{Hmac, Mac};
use neoscan_domain_models::fingerprint::SnapshotDescriptor;
use neoscan_infra_db::StoreError;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// Snapshot inmutable sellado: metadatos, bytes canónicos y firma.
#[derive(Debug, Clone)]
pub struct SignedSnapshot {
    pub descriptor: SnapshotDescriptor,
    pub canonical_bytes: Vec<u8>,
    pub signature_hex: String,
}

/// Servicio de ensamblado y publicación del snapshot firmado.
pub struct SnapshotAssemblyService {
    state: AppState,
}

impl SnapshotAssemblyService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /**
     * Hidratación de ignición: si la tabla de reglas está vacía y el
     * directorio configurado existe, sus archivos (ordenados por ruta)
     * siembran las filas builtin.
     */
    #[instrument(skip(self))]
    pub async fn hydrate_rules_from_disk(&self) -> Result<usize, StoreError> {
        let existing_rules = self.state.rule_repository.list_enabled_canonical().await?;
        if !existing_rules.is_empty() {
            return Ok(0);
        }

        let rule_directory = Path::new(&self.state.config.rule_path);
        if !rule_directory.is_dir() {
            warn!("📂 [SNAPSHOT]: Rule directory '{}' absent; starting empty.", self.state.config.rule_path);
            return Ok(0);
        }

        let mut rule_files: Vec<std::path::PathBuf> = std::fs::read_dir(rule_directory)
            .map_err(|io_fault| StoreError::ConfigurationError(io_fault.to_string()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        rule_files.sort();

        let mut seeded_rows: Vec<(String, String, bool)> = Vec::new();
        for rule_file_path in &rule_files {
            let file_label = rule_file_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unnamed")
                .to_string();
            let raw_content = std::fs::read_to_string(rule_file_path)
                .map_err(|io_fault| StoreError::ConfigurationError(io_fault.to_string()))?;

            for content_line in raw_content.lines() {
                let trimmed_line = content_line.trim();
                if trimmed_line.is_empty() {
                    continue;
                }
                seeded_rows.push((file_label.clone(), trimmed_line.to_string(), true));
            }
        }

        if seeded_rows.is_empty() {
            return Ok(0);
        }

        self.state
            .rule_repository
            .import_rules(&seeded_rows, "builtin")
            .await?;
        info!("🌱 [SNAPSHOT]: {} rule rows hydrated from disk.", seeded_rows.len());
        Ok(seeded_rows.len())
    }

    /**
     * Reconstruye el snapshot firmado desde el estado durable y lo
     * publica con swap atómico en el estado caliente.
     */
    #[instrument(skip(self))]
    pub async fn rebuild_and_publish(&self) -> Result<SnapshotDescriptor, StoreError> {
        let canonical_rules = self.state.rule_repository.list_enabled_canonical().await?;
        let file_count = self.state.rule_repository.count_enabled_files().await?;

        // Flujo canónico: las reglas viajan agrupadas bajo cabeceras de
        // archivo en forma de comentario, de modo que el bundle completo
        // sigue siendo una base de sondas parseable por el motor.
        let mut canonical_stream = Vec::with_capacity(canonical_rules.len() * 64);
        let mut current_file_label: Option<&str> = None;
        for canonical_rule in &canonical_rules {
            if current_file_label != Some(canonical_rule.rule_file.as_str()) {
                canonical_stream.extend_from_slice(b"# file: ");
                canonical_stream.extend_from_slice(canonical_rule.rule_file.as_bytes());
                canonical_stream.push(b'\n');
                current_file_label = Some(canonical_rule.rule_file.as_str());
            }
            canonical_stream.extend_from_slice(canonical_rule.content.as_bytes());
            canonical_stream.push(b'\n');
        }

        let version_hash = hex::encode(Sha256::digest(&canonical_stream));
        let signature_hex = compute_bundle_signature(
            &canonical_stream,
            &self.state.config.rule_encryption_key,
        );

        let descriptor = SnapshotDescriptor {
            version_hash: version_hash.clone(),
            file_count,
            rule_path: self.state.config.rule_path.clone(),
        };

        self.state.publish_snapshot(SignedSnapshot {
            descriptor: descriptor.clone(),
            canonical_bytes: canonical_stream,
            signature_hex,
        });

        info!(
            "📦 [SNAPSHOT]: Version {} sealed over {} rules ({} files).",
            version_hash,
            canonical_rules.len(),
            file_count
        );
        Ok(descriptor)
    }
}

/// Firma HMAC-SHA256 (hex) del flujo canónico con la clave compartida.
pub fn compute_bundle_signature(canonical_bytes: &[u8], rule_encryption_key: &str) -> String {
    let mut keyed_mac = HmacSha256::new_from_slice(rule_encryption_key.as_bytes())
        .expect("CRITICAL_FAULT: HMAC accepts keys of any length.");
    keyed_mac.update(canonical_bytes);
    hex::encode(keyed_mac.finalize().into_bytes())
}
