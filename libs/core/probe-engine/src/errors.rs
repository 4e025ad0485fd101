// [libs/core/probe-engine/src/errors.rs]
/*!
 * =================================================================
 * APARATO: PROBE ENGINE ERROR CATALOG (V3.0 - SOBERANO)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE SONDEO
 *
 * # Logic:
 * Los fallos de carga (reglas malformadas) afloran al cargar la base,
 * jamás como pánicos durante el escaneo. Los fallos de red distinguen
 * entre colapso de conexión, handshake de proxy y plazo agotado para
 * que el planificador decida reintentos con semántica correcta.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    /// Línea estructuralmente inválida en la base de sondas.
    #[error("[L1_PROBE_LOAD_FAULT]: MALFORMED_RULE_LINE {line} -> {detail}")]
    Malformed { line: usize, detail: String },

    /// Patrón rechazado por el motor de expresiones regulares.
    #[error("[L1_PROBE_LOAD_FAULT]: PATTERN_REJECTED_LINE {line} -> {detail}")]
    PatternRejected { line: usize, detail: String },

    /// La base de sondas aún no fue cargada en la celda global.
    #[error("[L1_PROBE_CACHE_FAULT]: DATABASE_UNLOADED")]
    DatabaseUnloaded,

    /// Fallo físico de E/S durante el sondeo o la carga.
    #[error("[L1_PROBE_IO_FAULT]: {0}")]
    Io(#[from] std::io::Error),

    /// El objetivo rechazó o colapsó la conexión.
    #[error("[L1_PROBE_NET_FAULT]: CONNECTION_COLLAPSED -> {0}")]
    ConnectionFault(String),

    /// El handshake SOCKS5 fue rechazado por el proxy.
    #[error("[L1_PROBE_NET_FAULT]: PROXY_HANDSHAKE_REJECTED -> {0}")]
    ProxyHandshakeFault(String),

    /// El plazo global de la operación se agotó.
    #[error("[L1_PROBE_NET_FAULT]: DEADLINE_EXCEEDED")]
    DeadlineExceeded,
}
