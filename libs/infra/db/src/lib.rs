// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PERSISTENCE LIBRARY ROOT (V3.0 - ASSET GRAPH)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: AUTORIDAD ÚNICA DE PERSISTENCIA DEL MASTER
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE DURABLE TRUTH: El Master es la única fuente de verdad;
 *    este estrato sella cada transición de estado con predicados SQL
 *    excluyentes (CAS) para eliminar carreras entre daemons.
 * 2. REPOSITORY SOVEREIGNTY: Cada subsistema (flota, tareas, etiquetas,
 *    políticas, reglas) posee un repositorio de autoridad única.
 * =================================================================
 */

/// Cliente de conexión libSQL con ancla de memoria para tests.
pub mod client;
/// Catálogo semántico de fallos de persistencia.
pub mod errors;
/// Matriz de repositorios de autoridad única.
pub mod repositories;
/// Esquema estructural idempotente por estratos.
pub mod schema;

pub use client::StoreClient;
pub use errors::StoreError;
