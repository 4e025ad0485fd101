// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: PERSISTENCE ERROR CATALOG (V3.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAXONOMY PARITY: Los variantes proyectan el catálogo de fallos del
 *    sistema (NotFound, AlreadyExists, InvalidInput, Conflict, estado
 *    ilegal) para que los handlers mapeen HTTP sin inspección de texto.
 * 2. PANOPTICON COMPLIANCE: Mensajes con prefijos de estrato para su
 *    renderizado en los logs estructurados.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Error de enlace físico o de red con el motor libSQL.
    #[error("[L3_STORE_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo de configuración del entorno (variables vacías o malformadas).
    #[error("[L3_STORE_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_STORE_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_STORE_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    // --- ESTRATO DE REGISTRO DE FLOTA (C4/C5) ---

    /// La entidad solicitada no existe en las tablas activas.
    #[error("[L3_REGISTRY_FAULT]: IDENTIFIER_NOT_FOUND")]
    NotFound,

    /// Colisión de identidad física: el par (hostname, port) ya existe.
    #[error("[L3_REGISTRY_FAULT]: ALREADY_EXISTS")]
    AlreadyExists,

    /// Capacidad declarada ausente del catálogo soberano.
    #[error("[L3_REGISTRY_FAULT]: INVALID_CAPABILITY -> {0}")]
    InvalidCapability(String),

    /// Payload rechazado por validación semántica.
    #[error("[L3_REGISTRY_FAULT]: INVALID_INPUT -> {0}")]
    InvalidInput(String),

    // --- ESTRATO DE LEDGER DE TAREAS (C7/C8) ---

    /// El CAS de despacho perdió la carrera: otro daemon reclamó la tarea.
    #[error("[L3_LEDGER_FAULT]: DISPATCH_CAS_CONFLICT")]
    CasConflict,

    /// La tarea no se encuentra en un estado apto para la operación.
    #[error("[L3_LEDGER_FAULT]: INVALID_STATE_TRANSITION")]
    InvalidState,

    // --- ESTRATO DE ÁRBOL DE ETIQUETAS (C9) ---

    /// El movimiento crearía un ciclo: el nuevo padre es descendiente.
    #[error("[L3_TAG_FAULT]: CYCLE_REJECTED")]
    CycleRejected,

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_STORE_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,
}
