// [libs/domain/models/src/task.rs]
/*!
 * =================================================================
 * APARATO: TASK DOMAIN MODELS (V2.2 - DISPATCH CONTRACTS)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: MÁQUINA DE ESTADOS DE LA UNIDAD DE TRABAJO
 *
 * # Mathematical Proof (State Machine Determinism):
 * Una tarea en 'pending' no posee agente asignado. El despacho fija
 * 'assigned_agent_id' y el estado 'dispatched' en la misma transición
 * atómica; 'completed', 'failed' (sin reintentos) y 'skipped' son
 * terminales y nunca retroceden.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Estados legales de una tarea despachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Dispatched,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Dispatched => "dispatched",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(TaskStatus::Pending),
            "dispatched" => Some(TaskStatus::Dispatched),
            "running" => Some(TaskStatus::Running),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            "skipped" => Some(TaskStatus::Skipped),
            _ => None,
        }
    }

    /// Una tarea terminal jamás vuelve a entrar en rotación de despacho.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// Categoría de ejecución derivada del nombre de herramienta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    /// Ejecutada por un agente remoto de la flota.
    Agent,
    /// Ejecutada en-proceso por el worker de sistema del Master.
    System,
}

/// Prefijo reservado para herramientas de sistema in-process.
pub const SYSTEM_TOOL_PREFIX: &str = "sys_";

impl TaskCategory {
    /**
     * Deriva la categoría desde el nombre de herramienta de la etapa.
     * Las herramientas 'sys_*' jamás viajan a un agente remoto.
     */
    pub fn for_tool(tool_name: &str) -> Self {
        if tool_name.starts_with(SYSTEM_TOOL_PREFIX) {
            TaskCategory::System
        } else {
            TaskCategory::Agent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Agent => "agent",
            TaskCategory::System => "system",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "agent" => Some(TaskCategory::Agent),
            "system" => Some(TaskCategory::System),
            _ => None,
        }
    }
}

/// Unidad de trabajo materializada por el planificador de workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    /// Identificador globalmente único de la tarea.
    pub task_id: String,
    pub project_id: String,
    pub stage_id: String,
    pub tool_name: String,
    pub task_category: TaskCategory,
    /// Objetivo concreto (IP, CIDR, dominio o URL) asignado a esta tarea.
    pub input_target: String,
    /// Parámetros opacos de la herramienta (JSON tal cual de la etapa).
    pub tool_params: Value,
    pub assigned_agent_id: Option<String>,
    pub status: TaskStatus,
    /// Razón de bloqueo cuando la tarea fue transicionada a 'skipped'.
    pub skip_reason: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Reporte de resultado emitido por el ejecutor (agente o worker local).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultReport {
    pub task_id: String,
    pub agent_id: String,
    /// Estado final reclamado: 'completed' o 'failed'.
    pub status: TaskStatus,
    /// Estructura JSON específica de la herramienta ejecutada.
    pub results: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub reported_at: DateTime<Utc>,
}
