// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY ACCESS MATRIX (V3.0 - TOPOLOGY MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ORQUESTACIÓN DE SUBSISTEMAS DE PERSISTENCIA
 *
 * # Mathematical Proof (Modular Encapsulation):
 * El barrel file actúa como una interfaz galvánica. Los sub-módulos
 * permanecen aislados, y solo las estructuras de autoridad
 * (Repositories) son expuestas al exterior, reduciendo el
 * acoplamiento sistémico.
 * =================================================================
 */

// --- ESTRATO 1: REGISTRO Y VITALIDAD DE LA FLOTA (C4/C5) ---

/// Registro de identidad, capacidades, latidos y métricas de agentes.
pub mod agent_repository;

// --- ESTRATO 2: PLANIFICACIÓN Y DESPACHO (C7/C8) ---

/// Ledger de tareas con CAS de despacho y clave de idempotencia.
pub mod task_repository;
/// Jerarquía Proyecto -> Workflow -> Etapa.
pub mod project_repository;

// --- ESTRATO 3: GOBERNANZA DE ALCANCE Y ETIQUETADO (C6/C9) ---

/// Reglas de lista blanca y políticas de omisión.
pub mod policy_repository;
/// Árbol de etiquetas, sincronía por provenance y activos.
pub mod tag_repository;

// --- ESTRATO 4: DISTRIBUCIÓN DE REGLAS (C3) ---

/// Reglas de huellas, backups con marca temporal y rollback verdadero.
pub mod rule_repository;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS) ---

pub use agent_repository::{AgentListFilter, AgentRepository};
pub use policy_repository::PolicyRepository;
pub use project_repository::ProjectRepository;
pub use rule_repository::RuleRepository;
pub use tag_repository::TagRepository;
pub use task_repository::TaskRepository;

use chrono::{DateTime, NaiveDateTime, Utc};

/**
 * Parser tolerante de marcas temporales persistidas: acepta RFC3339 y
 * el formato nativo de CURRENT_TIMESTAMP de SQLite.
 */
pub(crate) fn parse_stored_timestamp(raw_text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw_text) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw_text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
