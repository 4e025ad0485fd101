// [libs/domain/models/src/policy.rs]
/*!
 * =================================================================
 * APARATO: POLICY DOMAIN MODELS (V2.0 - SCOPE GUARDIAN)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE LISTA BLANCA Y POLÍTICAS DE OMISIÓN
 *
 * # Logic:
 * Las reglas de lista blanca bloquean objetivos concretos (IP, CIDR,
 * dominio, URL). Las políticas de omisión bloquean por atributos del
 * proyecto dueño de la tarea. La lista blanca se evalúa primero y la
 * primera regla que bloquea gana.
 * =================================================================
 */

use crate::tag::MatchOperator;
use serde::{Deserialize, Serialize};

/// Familias de objetivo reconocidas por el evaluador de lista blanca.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhitelistTargetType {
    /// IP exacta o rango inclusivo "a.b.c.d-e.f.g.h".
    Ip,
    /// Pertenencia a un bloque CIDR.
    Cidr,
    /// Igualdad exacta, o sufijo cuando el valor comienza con '.'.
    Domain,
    /// Comodines estilo shell (p.ej. "*.bad.com").
    DomainPattern,
    /// Prefijo de URL.
    Url,
    /// Subcadena sin distinción de mayúsculas.
    Keyword,
}

impl WhitelistTargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WhitelistTargetType::Ip => "ip",
            WhitelistTargetType::Cidr => "cidr",
            WhitelistTargetType::Domain => "domain",
            WhitelistTargetType::DomainPattern => "domain_pattern",
            WhitelistTargetType::Url => "url",
            WhitelistTargetType::Keyword => "keyword",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "ip" => Some(WhitelistTargetType::Ip),
            "cidr" => Some(WhitelistTargetType::Cidr),
            "domain" => Some(WhitelistTargetType::Domain),
            "domain_pattern" => Some(WhitelistTargetType::DomainPattern),
            "url" => Some(WhitelistTargetType::Url),
            "keyword" => Some(WhitelistTargetType::Keyword),
            _ => None,
        }
    }
}

/// Regla declarativa de lista blanca evaluada antes de cada despacho.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistRule {
    pub rule_id: i64,
    pub target_type: WhitelistTargetType,
    pub value: String,
    pub enabled: bool,
    /// Ámbito opcional de aplicación (global cuando es None).
    pub scope: Option<String>,
}

/// Condición individual de una política de omisión.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionRule {
    /// Atributo del proyecto a inspeccionar (p.ej. "tags", "environment").
    pub field: String,
    pub operator: MatchOperator,
    pub value: String,
    #[serde(default)]
    pub ignore_case: bool,
}

/// Política de omisión: bloquea proyectos completos por sus atributos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipPolicy {
    pub policy_id: i64,
    pub name: String,
    pub enabled: bool,
    pub scope: Option<String>,
    /// Todas las condiciones deben cumplirse para que la política bloquee.
    pub condition_rules: Vec<ConditionRule>,
}

/// Veredicto de bloqueo emitido por el ejecutor de políticas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBlock {
    /// Razón estable expuesta al planificador ("target whitelisted",
    /// "project skipped").
    pub reason: String,
    /// Identificador de la regla o política que produjo el bloqueo.
    pub blocking_rule_id: i64,
}
