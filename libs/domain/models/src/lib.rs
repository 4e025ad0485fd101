// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS LIBRARY ROOT (V2.0 - FLEET CONTRACTS)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: AUTORIDAD ÚNICA DE CONTRATOS ENTRE MASTER Y AGENTES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE SOURCE OF TRUTH: Todo payload que cruza la red (registro,
 *    latidos, tareas, resultados, reglas) nace en este estrato.
 * 2. NOMINAL PURITY: Nomenclatura nominal absoluta en entidades y campos.
 * 3. ZERO LOGIC: Los modelos son pasivos; la evaluación de reglas vive
 *    en 'neoscan-domain-rules' y la persistencia en 'neoscan-infra-db'.
 * =================================================================
 */

/// Identidad, estado y biometría de los nodos de la flota.
pub mod agent;
/// Sobre de respuesta uniforme y paginación del API.
pub mod api;
/// Huellas de servicio, resultados de escaneo y snapshots de reglas.
pub mod fingerprint;
/// Reglas de lista blanca y políticas de omisión de proyectos.
pub mod policy;
/// Jerarquía Proyecto -> Workflow -> Etapa de escaneo.
pub mod project;
/// Árbol de etiquetas, reglas de coincidencia y provenance.
pub mod tag;
/// Unidad de trabajo despachable y reportes de resultado.
pub mod task;
