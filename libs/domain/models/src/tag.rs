// [libs/domain/models/src/tag.rs]
/*!
 * =================================================================
 * APARATO: TAG PROPAGATION MODELS (V2.1 - MATERIALIZED PATH)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: ÁRBOL JERÁRQUICO, REGLAS DE AUTO-ETIQUETADO Y PROVENANCE
 *
 * # Mathematical Proof (Path Invariant):
 * La raíz posee path="/" y level=0. Para todo nodo no-raíz:
 * path = parent.path + parent.id + "/" y level = parent.level + 1.
 * Mover un nodo bajo su propio descendiente crearía un ciclo y es
 * rechazado atómicamente por el repositorio.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Nodo del árbol jerárquico de etiquetas (ruta materializada).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub tag_id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    /// Ruta materializada de ancestros, p.ej. "/3/7/".
    pub path: String,
    pub level: u32,
    pub category: Option<String>,
}

impl Tag {
    /// Ruta de prefijo que heredan todos los descendientes de este nodo.
    pub fn subtree_prefix(&self) -> String {
        format!("{}{}/", self.path, self.tag_id)
    }
}

/// Provenance de la aplicación de una etiqueta a una entidad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSource {
    /// Aplicada manualmente por un operador.
    Manual,
    /// Aplicada por el motor de reglas de auto-etiquetado.
    Auto,
    /// Derivada de un resultado reportado por un agente.
    AgentReport,
    /// Derivada de las capacidades declaradas por el agente.
    AgentCapability,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagSource::Manual => "manual",
            TagSource::Auto => "auto",
            TagSource::AgentReport => "agent_report",
            TagSource::AgentCapability => "agent_capability",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "manual" => Some(TagSource::Manual),
            "auto" => Some(TagSource::Auto),
            "agent_report" => Some(TagSource::AgentReport),
            "agent_capability" => Some(TagSource::AgentCapability),
            _ => None,
        }
    }
}

/// Vínculo entidad <-> etiqueta con provenance.
/// La tupla (entity_type, entity_id, tag_id, source) es única.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTag {
    pub entity_type: String,
    pub entity_id: String,
    pub tag_id: i64,
    pub source: TagSource,
    /// Regla que produjo el vínculo cuando source = Auto.
    pub rule_id: Option<i64>,
}

/// Operadores de condición sobre el mapa de atributos de una entidad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
    Equals,
    Contains,
    Regex,
    In,
    ListContains,
    GreaterThan,
    Cidr,
}

impl MatchOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchOperator::Equals => "equals",
            MatchOperator::Contains => "contains",
            MatchOperator::Regex => "regex",
            MatchOperator::In => "in",
            MatchOperator::ListContains => "list_contains",
            MatchOperator::GreaterThan => "greater_than",
            MatchOperator::Cidr => "cidr",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "equals" => Some(MatchOperator::Equals),
            "contains" => Some(MatchOperator::Contains),
            "regex" => Some(MatchOperator::Regex),
            "in" => Some(MatchOperator::In),
            "list_contains" => Some(MatchOperator::ListContains),
            "greater_than" => Some(MatchOperator::GreaterThan),
            "cidr" => Some(MatchOperator::Cidr),
            _ => None,
        }
    }
}

/// Regla de auto-etiquetado: condición sobre atributos ligada a una etiqueta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRule {
    pub rule_id: i64,
    /// Tipo de entidad sobre la que aplica (host, service, agent, ...).
    pub entity_type: String,
    pub field: String,
    pub operator: MatchOperator,
    pub value: String,
    pub ignore_case: bool,
    /// Orden de evaluación: menor valor se evalúa primero.
    pub priority: i64,
    pub enabled: bool,
    pub tag_id: i64,
}
