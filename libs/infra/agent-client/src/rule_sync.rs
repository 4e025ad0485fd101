// [libs/infra/agent-client/src/rule_sync.rs]
/*!
 * =================================================================
 * APARATO: RULE SNAPSHOT SYNCHRONIZER (V3.3 - SIGNED SWAP)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: POLL DE VERSIÓN, VERIFICACIÓN HMAC Y SWAP ATÓMICO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. VERSION GATING: Solo un cambio de version_hash dispara la
 *    descarga; ticks sin cambio no tocan la red más allá del poll.
 * 2. SIGNATURE SHIELD: Los bytes del bundle se verifican con
 *    HMAC-SHA256 sobre la clave pre-compartida ANTES de tocar disco;
 *    una firma inválida aborta sin alterar el caché local.
 * 3. ATOMIC REPLACE: El caché local se reemplaza con escritura a
 *    archivo temporal + rename, jamás con escritura en el lugar.
 * =================================================================
 */

use crate::client::MasterClient;
use crate::errors::UplinkError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// Resultado de un tick de sincronía del snapshot.
#[derive(Debug)]
pub enum SnapshotRefresh {
    /// El hash remoto coincide con el local: sin trabajo.
    Unchanged,
    /// Bundle verificado y caché reemplazado; el motor debe recargar.
    Updated {
        version_hash: String,
        bundle_bytes: Vec<u8>,
    },
}

/**
 * Verifica la firma HMAC-SHA256 (hex) de un bundle con la clave
 * pre-compartida. Comparación de longitud constante vía el verificador
 * del propio MAC.
 */
pub fn verify_bundle_signature(
    bundle_bytes: &[u8],
    signature_hex: &str,
    rule_encryption_key: &str,
) -> bool {
    let Ok(expected_signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut keyed_mac) = HmacSha256::new_from_slice(rule_encryption_key.as_bytes()) else {
        return false;
    };
    keyed_mac.update(bundle_bytes);
    keyed_mac.verify_slice(&expected_signature).is_ok()
}

/// Sincronizador perezoso del snapshot de reglas del nodo.
pub struct RuleSnapshotSynchronizer {
    master_uplink: Arc<MasterClient>,
    local_rule_cache_path: PathBuf,
    rule_encryption_key: String,
    cached_version_hash: Mutex<Option<String>>,
}

impl RuleSnapshotSynchronizer {
    pub fn new(
        master_uplink: Arc<MasterClient>,
        local_rule_cache_path: PathBuf,
        rule_encryption_key: String,
    ) -> Self {
        Self {
            master_uplink,
            local_rule_cache_path,
            rule_encryption_key,
            cached_version_hash: Mutex::new(None),
        }
    }

    /// Ruta del caché local vigente de reglas.
    pub fn cache_path(&self) -> &Path {
        &self.local_rule_cache_path
    }

    /**
     * Un tick completo de sincronía: poll, gate por hash, descarga,
     * verificación de firma y reemplazo atómico.
     *
     * # Errors:
     * - `UplinkError::SignatureMismatch`: Bundle adulterado; el caché
     *   local permanece intacto.
     */
    #[instrument(skip(self))]
    pub async fn refresh_once(&self) -> Result<SnapshotRefresh, UplinkError> {
        let remote_descriptor = self.master_uplink.fetch_snapshot_descriptor().await?;

        {
            let cached_hash_guard = self.cached_version_hash.lock().await;
            if cached_hash_guard.as_deref() == Some(remote_descriptor.version_hash.as_str()) {
                return Ok(SnapshotRefresh::Unchanged);
            }
        }

        let (bundle_bytes, bundle_signature) = self.master_uplink.download_snapshot_bundle().await?;

        if !verify_bundle_signature(&bundle_bytes, &bundle_signature, &self.rule_encryption_key) {
            warn!("🛡️ [RULE_SYNC]: Bundle signature mismatch; local cache preserved.");
            return Err(UplinkError::SignatureMismatch);
        }

        replace_cache_atomically(&self.local_rule_cache_path, &bundle_bytes).await?;

        let mut cached_hash_guard = self.cached_version_hash.lock().await;
        *cached_hash_guard = Some(remote_descriptor.version_hash.clone());

        info!(
            "♻️ [RULE_SYNC]: Snapshot {} crystallized ({} bytes, {} files).",
            remote_descriptor.version_hash,
            bundle_bytes.len(),
            remote_descriptor.file_count
        );

        Ok(SnapshotRefresh::Updated {
            version_hash: remote_descriptor.version_hash,
            bundle_bytes,
        })
    }
}

/**
 * Escritura a archivo hermano + rename: el lector jamás observa un
 * caché a medio escribir.
 */
async fn replace_cache_atomically(
    cache_path: &Path,
    bundle_bytes: &[u8],
) -> Result<(), UplinkError> {
    if let Some(parent_directory) = cache_path.parent() {
        if !parent_directory.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent_directory).await?;
        }
    }

    let staging_path = cache_path.with_extension("staging");
    tokio::fs::write(&staging_path, bundle_bytes).await?;
    tokio::fs::rename(&staging_path, cache_path).await?;
    Ok(())
}
