// [libs/core/probe-engine/src/cache.rs]
/*!
 * =================================================================
 * APARATO: GLOBAL PROBE DATABASE CACHE (V3.0 - SINGLE FLIGHT)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: CELDA PEREZOSA CON REEMPLAZO ATÓMICO DE LA BASE
 *
 * # Mathematical Proof (Publish-Then-Swap):
 * La base activa vive detrás de 'RwLock<Arc<ProbeDatabase>>'. Un
 * refresco de snapshot construye la base nueva completa fuera del
 * cerrojo y publica el puntero en una única escritura; los escaneos
 * en vuelo conservan su Arc antiguo hasta terminar, sin carreras.
 * =================================================================
 */

use crate::errors::ProbeError;
use crate::parser::parse_probe_database;
use crate::probe::ProbeDatabase;
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

static PROBE_DATABASE_CELL: OnceCell<RwLock<Arc<ProbeDatabase>>> = OnceCell::new();

/**
 * Carga perezosa de la base desde un archivo de reglas.
 * La primera invocación parsea y publica; las siguientes retornan el
 * puntero vigente sin tocar el disco (single-flight).
 */
pub fn database_from_file(rule_file_path: &Path) -> Result<Arc<ProbeDatabase>, ProbeError> {
    if let Some(populated_cell) = PROBE_DATABASE_CELL.get() {
        return Ok(populated_cell
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone());
    }

    let raw_content = std::fs::read_to_string(rule_file_path)?;
    let parsed_database = Arc::new(parse_probe_database(&raw_content)?);

    let resident_cell =
        PROBE_DATABASE_CELL.get_or_init(|| RwLock::new(Arc::clone(&parsed_database)));

    info!(
        "🧬 [PROBE_CACHE]: Database crystallized with {} probes.",
        resident_cell
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .probes
            .len()
    );

    Ok(resident_cell
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone())
}

/**
 * Publica una base recién parseada reemplazando atómicamente la activa.
 * Invocada por el sincronizador de snapshots tras verificar la firma.
 */
pub fn publish_database(fresh_database: ProbeDatabase) {
    let probe_count = fresh_database.probes.len();
    let shared_database = Arc::new(fresh_database);

    let resident_cell =
        PROBE_DATABASE_CELL.get_or_init(|| RwLock::new(Arc::clone(&shared_database)));

    let mut active_pointer = resident_cell
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *active_pointer = shared_database;

    info!("♻️ [PROBE_CACHE]: Database swapped; {} probes active.", probe_count);
}

/// Puntero a la base vigente, si ya fue cargada.
pub fn current_database() -> Option<Arc<ProbeDatabase>> {
    PROBE_DATABASE_CELL.get().map(|cell| {
        cell.read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    })
}
