// [apps/agent/src/lib.rs]
/*!
 * =================================================================
 * APARATO: AGENT LIBRARY ROOT (V3.0 - SOLDIER SHELL)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: ÁRBOL DE MÓDULOS DEL NODO DE RECONOCIMIENTO
 * =================================================================
 */

/// Motor de ciclo de vida: registro, latidos, cola y sincronía.
pub mod engine;
/// Telemetría de silicio del nodo (procfs con fallbacks heurísticos).
pub mod monitor;
/// Registro de herramientas de escaneo (despacho por tabla).
pub mod tools;
