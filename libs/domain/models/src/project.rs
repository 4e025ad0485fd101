// [libs/domain/models/src/project.rs]
/*!
 * =================================================================
 * APARATO: PROJECT HIERARCHY MODELS (V2.0 - WORKFLOW STRATA)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: JERARQUÍA PROYECTO -> WORKFLOW -> ETAPA
 *
 * # Logic:
 * La jerarquía es estrictamente acíclica: un proyecto referencia una
 * lista ordenada de workflows y cada workflow una lista ordenada de
 * etapas. El planificador jamás materializa la etapa N+1 antes de que
 * la etapa N sea terminal para ese proyecto.
 * =================================================================
 */

use crate::task::TaskCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Estados de ciclo de vida de un proyecto de reconocimiento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::Running => "running",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(ProjectStatus::Pending),
            "running" => Some(ProjectStatus::Running),
            "paused" => Some(ProjectStatus::Paused),
            "completed" => Some(ProjectStatus::Completed),
            "failed" => Some(ProjectStatus::Failed),
            _ => None,
        }
    }
}

/// Proyecto soberano: ámbito de activos y configuración de salida.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub name: String,
    /// Lista de CIDRs, IPs y dominios dentro del alcance autorizado.
    pub target_scope: Vec<String>,
    pub status: ProjectStatus,
    /// Atributos de enrutamiento (p.ej. "production", "staging").
    pub environment: Option<String>,
    #[serde(default)]
    pub tag_names: Vec<String>,
    /// Configuración opaca de notificación (webhooks, canales).
    #[serde(default)]
    pub notify_config: Value,
    /// Configuración opaca de exportación de reportes.
    #[serde(default)]
    pub export_config: Value,
}

/// Workflow ordenado dentro de un proyecto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub project_id: String,
    pub name: String,
    /// Posición del workflow dentro del proyecto (ascendente).
    pub sequence_index: u32,
}

/// Política de partición del ámbito de objetivos en tareas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSplitPolicy {
    /// Una tarea por cada objetivo del ámbito (política por defecto).
    PerTarget,
    /// Una única tarea con el ámbito completo serializado.
    WholeScope,
}

impl Default for TargetSplitPolicy {
    fn default() -> Self {
        TargetSplitPolicy::PerTarget
    }
}

/// Política de ejecución y reintentos de una etapa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    /// Plazo máximo de ejecución de cada tarea materializada.
    pub timeout_seconds: u64,
    /// Reintentos permitidos tras una falla antes de sellar 'failed'.
    pub retry_limit: u32,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            timeout_seconds: 3600,
            retry_limit: 0,
        }
    }
}

/// Etapa de escaneo: una invocación de herramienta dentro de un workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStage {
    pub stage_id: String,
    pub workflow_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub target_policy: TargetSplitPolicy,
    #[serde(default)]
    pub execution_policy: ExecutionPolicy,
    /// Ajustes opacos de rendimiento entregados a la herramienta.
    #[serde(default)]
    pub performance_settings: Value,
    /// Configuración opaca de salida de la herramienta.
    #[serde(default)]
    pub output_config: Value,
    pub enabled: bool,
    /// Posición de la etapa dentro del workflow (ascendente).
    pub sequence_index: u32,
}

impl ScanStage {
    /// Categoría de despacho derivada del nombre de herramienta.
    pub fn task_category(&self) -> TaskCategory {
        TaskCategory::for_tool(&self.tool_name)
    }
}
