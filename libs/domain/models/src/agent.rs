// [libs/domain/models/src/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT FLEET DOMAIN MODELS (V2.1 - REGISTRY MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE IDENTIDAD, ESTADO Y BIOMETRÍA DE NODOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. REGISTRY INTEGRITY: El par '(hostname, port)' identifica físicamente
 *    a un agente; 'agent_id' es asignado por el Master en el registro.
 * 2. METRIC SANITY: Los porcentajes de uso viven en [0,100] y los
 *    contadores son no-negativos; la validación vive junto al contrato.
 * 3. NOMINAL PRECISION: Nomenclatura nominal absoluta en todos los campos.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Estados de ciclo de vida de un agente en el registro de flota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// El agente emite latidos dentro de la ventana de vida.
    Online,
    /// El agente superó el umbral de silencio de latidos.
    Offline,
    /// El agente reportó una condición anómala en su último latido.
    Exception,
    /// El agente fue retirado administrativamente de la rotación.
    Maintenance,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
            AgentStatus::Exception => "exception",
            AgentStatus::Maintenance => "maintenance",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "online" => Some(AgentStatus::Online),
            "offline" => Some(AgentStatus::Offline),
            "exception" => Some(AgentStatus::Exception),
            "maintenance" => Some(AgentStatus::Maintenance),
            _ => None,
        }
    }
}

/// Estado de trabajo instantáneo reportado por el propio agente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Idle,
    Working,
    Exception,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Idle => "idle",
            WorkStatus::Working => "working",
            WorkStatus::Exception => "exception",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "idle" => Some(WorkStatus::Idle),
            "working" => Some(WorkStatus::Working),
            "exception" => Some(WorkStatus::Exception),
            _ => None,
        }
    }
}

/// Registro soberano de un agente en la flota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Identificador estable asignado por el Master en el primer registro.
    pub agent_id: String,
    pub hostname: String,
    pub ip: String,
    pub port: u16,
    pub operating_system: Option<String>,
    pub architecture: Option<String>,
    pub cpu_cores: Option<u32>,
    pub memory_megabytes: Option<u64>,
    pub disk_gigabytes: Option<u64>,
    pub agent_version: Option<String>,
    pub status: AgentStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub token_expiry: Option<DateTime<Utc>>,
    /// Capacidades declaradas (portscan, webfingerprint, ...).
    pub capabilities: Vec<String>,
    /// Etiquetas de enrutamiento asociadas al agente.
    pub tag_ids: Vec<i64>,
    pub group_name: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Última instantánea biométrica conocida de un agente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetricsSnapshot {
    pub agent_id: String,
    pub cpu_usage_percent: f64,
    pub memory_usage_percent: f64,
    pub disk_usage_percent: f64,
    pub network_bytes_sent: u64,
    pub network_bytes_received: u64,
    pub running_tasks: u32,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub work_status: WorkStatus,
    pub scan_type: Option<String>,
    pub captured_at: DateTime<Utc>,
}

/// Falla semántica de validación de contratos entrantes.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("[L2_CONTRACT_FAULT]: USAGE_OUT_OF_RANGE -> {field} = {observed}")]
    UsageOutOfRange { field: &'static str, observed: String },

    #[error("[L2_CONTRACT_FAULT]: UNKNOWN_ENUM_LABEL -> {field} = {observed}")]
    UnknownLabel { field: &'static str, observed: String },

    #[error("[L2_CONTRACT_FAULT]: EMPTY_REQUIRED_FIELD -> {field}")]
    EmptyField { field: &'static str },
}

impl AgentMetricsSnapshot {
    /**
     * Certifica que la instantánea respeta los rangos físicos del contrato.
     *
     * # Errors:
     * - `ContractViolation::UsageOutOfRange`: Porcentaje fuera de [0,100].
     */
    pub fn validate(&self) -> Result<(), ContractViolation> {
        let usage_gauges: [(&'static str, f64); 3] = [
            ("cpu_usage_percent", self.cpu_usage_percent),
            ("memory_usage_percent", self.memory_usage_percent),
            ("disk_usage_percent", self.disk_usage_percent),
        ];

        for (field_label, observed_value) in usage_gauges {
            if !(0.0..=100.0).contains(&observed_value) || observed_value.is_nan() {
                return Err(ContractViolation::UsageOutOfRange {
                    field: field_label,
                    observed: observed_value.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Payload de registro inicial de un agente (Handshake de Flota).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistrationRequest {
    pub hostname: String,
    pub ip: String,
    pub port: u16,
    pub operating_system: Option<String>,
    pub architecture: Option<String>,
    pub cpu_cores: Option<u32>,
    pub memory_megabytes: Option<u64>,
    pub disk_gigabytes: Option<u64>,
    pub agent_version: Option<String>,
    /// Nombres de capacidades del catálogo soberano.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AgentRegistrationRequest {
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.hostname.trim().is_empty() {
            return Err(ContractViolation::EmptyField { field: "hostname" });
        }
        if self.ip.trim().is_empty() {
            return Err(ContractViolation::EmptyField { field: "ip" });
        }
        Ok(())
    }
}

/// Recibo de registro emitido por el Master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistrationReceipt {
    pub agent_id: String,
    /// Siempre "registered" en un alta nueva.
    pub status: String,
}

/// Pulso de vida emitido periódicamente por cada agente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSignal {
    pub agent_id: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AgentMetricsSnapshot>,
}

impl HeartbeatSignal {
    /**
     * Valida el pulso completo: identidad, estado y métricas adjuntas.
     */
    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.agent_id.trim().is_empty() {
            return Err(ContractViolation::EmptyField { field: "agent_id" });
        }
        if let Some(metrics_snapshot) = &self.metrics {
            metrics_snapshot.validate()?;
        }
        Ok(())
    }
}

/// Entrada del catálogo soberano de capacidades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub capability_id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Herramientas cuyo despacho requiere esta capacidad.
    #[serde(default)]
    pub tool_names: Vec<String>,
}
