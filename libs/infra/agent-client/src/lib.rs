// [libs/infra/agent-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: AGENT UPLINK LIBRARY ROOT (V3.0 - SOVEREIGN LINK)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TÚNEL ASÍNCRONO AGENTE -> MASTER
 *
 * VISION HIPER-HOLÍSTICA:
 * Implementa el túnel de comunicación entre el nodo de escaneo y el
 * centro de mando: registro, latidos, cola de tareas, reporte de
 * resultados y sincronía firmada del snapshot de reglas.
 * =================================================================
 */

/// Cliente HTTP tipado hacia los endpoints del Master.
pub mod client;
/// Catálogo semántico de fallos de enlace.
pub mod errors;
/// Sincronizador del snapshot de reglas con verificación HMAC.
pub mod rule_sync;

pub use client::MasterClient;
pub use errors::UplinkError;
pub use rule_sync::{verify_bundle_signature, RuleSnapshotSynchronizer, SnapshotRefresh};
