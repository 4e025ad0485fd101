// [apps/master/src/lib.rs]
/*!
 * =================================================================
 * APARATO: MASTER LIBRARY ROOT (V4.0 - SOVEREIGN AUTHORITY)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MODULE HIERARCHY HARDENING: Establece la autoridad única de
 *    módulos para que 'crate::' resuelva determinísticamente tanto en
 *    la librería como en el binario.
 * 2. PUBLIC INTERFACE: Expone 'prelude' para la ignición del Kernel
 *    desde 'main.rs' y desde los aparatos de certificación.
 * =================================================================
 */

// --- ESTRATO DE CONFIGURACIÓN Y ARRANQUE ---
/// Captura de configuración estratégica desde el entorno.
pub mod config;
/// Núcleo de mando y control para la ignición de servicios.
pub mod kernel;

// --- ESTRATO DE DATOS Y ESTADO (L1-APP) ---
/// Gestor del sistema nervioso central del Master.
pub mod state;

// --- ESTRATO DE TRANSPORTE Y ACCIÓN ---
/// Adaptadores de entrada para ráfagas HTTP.
pub mod handlers;
/// El túnel de mando: definición de rutas y topología de red.
pub mod routes;

// --- ESTRATO DE DAEMONS AUTÓNOMOS ---
/// Planificador, despachador, políticas, worker de sistema y vitalidad.
pub mod services;

/**
 * PRELUDIO DEL MASTER
 *
 * Re-exportación estratégica de los componentes necesarios para la
 * ignición mínima del sistema. Reduce el acoplamiento en 'main.rs'.
 */
pub mod prelude {
    pub use crate::config::MasterConfig;
    pub use crate::kernel::MasterKernel;
    pub use crate::state::AppState;
}
