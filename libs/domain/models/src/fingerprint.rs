// [libs/domain/models/src/fingerprint.rs]
/*!
 * =================================================================
 * APARATO: FINGERPRINT & SCAN RESULT MODELS (V2.3 - SERVICE DNA)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE HUELLAS, RESULTADOS Y SNAPSHOTS DE REGLAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SNAPSHOT IMMUTABILITY: El 'version_hash' es un digest determinista
 *    sobre el flujo canónico de reglas habilitadas; dos conjuntos
 *    idénticos producen exactamente el mismo hash.
 * 2. SIGNATURE DISCIPLINE: La firma HMAC viaja fuera de banda en la
 *    cabecera 'X-Content-Signature' y se verifica antes del swap local.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Identificación estructurada de un servicio de red.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerPrint {
    /// Familia de servicio (ssh, http, smtp, ...).
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpe: Vec<String>,
}

/// Resultado de liveness + identificación para un puerto abierto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortServiceResult {
    pub host: String,
    pub port: u16,
    /// Protocolo de transporte sondeado ("tcp" | "udp").
    pub protocol: String,
    /// Estado observado; los puertos cerrados/filtrados no se emiten.
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<FingerPrint>,
}

/// Parámetros reconocidos por la herramienta de escaneo de puertos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortScanParams {
    /// Invocar el motor de huellas sobre cada puerto abierto.
    #[serde(default)]
    pub service_detect: bool,
    /// Conexiones TCP simultáneas permitidas (semáforo contable).
    #[serde(default)]
    pub rate: Option<u32>,
    /// Lista de puertos: elementos sueltos y rangos con guión ("22,80,8000-8100").
    #[serde(default)]
    pub ports: Option<String>,
}

/// Metadatos de versión del snapshot de reglas (sin transferir bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDescriptor {
    pub version_hash: String,
    pub file_count: u32,
    pub rule_path: String,
}

/// Fila persistida de una regla de huellas distribuible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRule {
    pub rule_id: i64,
    /// Archivo lógico de origen dentro del directorio de reglas.
    pub rule_file: String,
    /// Línea de regla en el formato compatible con Nmap.
    pub content: String,
    pub enabled: bool,
    /// Origen de la regla: "builtin" o "custom".
    pub source: String,
}
