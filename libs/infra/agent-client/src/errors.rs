// [libs/infra/agent-client/src/errors.rs]
/*!
 * =================================================================
 * APARATO: UPLINK ERROR CATALOG (V3.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE ENLACE
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UplinkError {
    /// Fallo físico de red o de protocolo HTTP.
    #[error("[L3_UPLINK_NET_FAULT]: {0}")]
    Network(#[from] reqwest::Error),

    /// El Master rechazó la operación con un estado no exitoso.
    #[error("[L3_UPLINK_FAULT]: SERVER_REJECTION -> {0}")]
    ServerRejection(String),

    /// La identidad física (hostname, port) ya está registrada.
    #[error("[L3_UPLINK_FAULT]: IDENTITY_ALREADY_REGISTERED")]
    AlreadyRegistered,

    /// El Master no reconoce el agent_id de este nodo.
    #[error("[L3_UPLINK_FAULT]: UNKNOWN_AGENT_IDENTITY")]
    UnknownAgent,

    /// La firma del bundle no corresponde a los bytes recibidos.
    #[error("[L3_UPLINK_FAULT]: BUNDLE_SIGNATURE_MISMATCH")]
    SignatureMismatch,

    /// El sobre de respuesta llegó sin el campo de datos esperado.
    #[error("[L3_UPLINK_FAULT]: ENVELOPE_DATA_VOID -> {0}")]
    EnvelopeVoid(String),

    /// Fallo de E/S sobre el caché local de reglas.
    #[error("[L3_UPLINK_IO_FAULT]: {0}")]
    IoFault(#[from] std::io::Error),
}
