// [libs/domain/rules/src/condition.rs]
/*!
 * =================================================================
 * APARATO: CONDITION OPERATOR ENGINE (V2.1 - ATTRIBUTE ORACLE)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: EVALUACIÓN DE OPERADORES SOBRE MAPAS DE ATRIBUTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SHARED KERNEL: El auto-etiquetado (C9), las políticas de omisión
 *    (C6) y las herramientas de sistema 'sys_*' consumen exactamente
 *    este conjunto de operadores; una sola semántica para toda la flota.
 * 2. FAIL-CLOSED: Campos ausentes, tipos incompatibles y expresiones
 *    regulares malformadas evalúan a 'no coincide', nunca a pánico.
 * =================================================================
 */

use neoscan_domain_models::policy::{ConditionRule, SkipPolicy};
use neoscan_domain_models::tag::{MatchOperator, MatchRule};
use ipnet::IpNet;
use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::net::IpAddr;
use tracing::warn;

/// Mapa de atributos de una entidad (JSON plano de la entidad evaluada).
pub type AttributeMap = Map<String, Value>;

/// Razón estable emitida cuando una política de omisión bloquea.
pub const REASON_PROJECT_SKIPPED: &str = "project skipped";

/**
 * Evalúa una regla de auto-etiquetado completa contra los atributos.
 */
pub fn match_rule_applies(rule: &MatchRule, attributes: &AttributeMap) -> bool {
    if !rule.enabled {
        return false;
    }
    operator_applies(
        attributes.get(&rule.field),
        rule.operator,
        &rule.value,
        rule.ignore_case,
    )
}

/**
 * Evalúa una política de omisión: TODAS sus condiciones deben cumplirse.
 * Una política sin condiciones jamás bloquea.
 */
pub fn skip_policy_applies(policy: &SkipPolicy, attributes: &AttributeMap) -> bool {
    if !policy.enabled || policy.condition_rules.is_empty() {
        return false;
    }
    policy
        .condition_rules
        .iter()
        .all(|condition| condition_applies(condition, attributes))
}

fn condition_applies(condition: &ConditionRule, attributes: &AttributeMap) -> bool {
    operator_applies(
        attributes.get(&condition.field),
        condition.operator,
        &condition.value,
        condition.ignore_case,
    )
}

/**
 * Computa el conjunto de etiquetas coincidentes para una entidad.
 * Las reglas se evalúan en orden de prioridad ascendente y el resultado
 * se deduplica por etiqueta preservando la primera regla ganadora.
 */
pub fn matching_tag_assignments(
    rules: &[MatchRule],
    attributes: &AttributeMap,
) -> Vec<(i64, i64)> {
    let mut prioritized_rules: Vec<&MatchRule> =
        rules.iter().filter(|rule| rule.enabled).collect();
    prioritized_rules.sort_by_key(|rule| (rule.priority, rule.rule_id));

    let mut winning_assignments: Vec<(i64, i64)> = Vec::new();
    for rule in prioritized_rules {
        if match_rule_applies(rule, attributes)
            && !winning_assignments
                .iter()
                .any(|(tag_id, _)| *tag_id == rule.tag_id)
        {
            winning_assignments.push((rule.tag_id, rule.rule_id));
        }
    }
    winning_assignments
}

/**
 * Núcleo de evaluación de un operador contra el valor de un campo.
 */
fn operator_applies(
    field_value: Option<&Value>,
    operator: MatchOperator,
    rule_value: &str,
    ignore_case: bool,
) -> bool {
    let Some(observed_value) = field_value else {
        return false;
    };

    match operator {
        MatchOperator::Equals => {
            scalar_text(observed_value).is_some_and(|text| fold_eq(&text, rule_value, ignore_case))
        }
        MatchOperator::Contains => match observed_value {
            // Sobre listas, 'contains' significa membresía del elemento.
            Value::Array(_) => list_items(observed_value)
                .iter()
                .any(|item| fold_eq(item, rule_value, ignore_case)),
            _ => scalar_text(observed_value)
                .is_some_and(|text| fold(&text, ignore_case).contains(&fold(rule_value, ignore_case))),
        },
        MatchOperator::Regex => {
            let Some(text) = scalar_text(observed_value) else {
                return false;
            };
            match RegexBuilder::new(rule_value)
                .case_insensitive(ignore_case)
                .build()
            {
                Ok(compiled_expression) => compiled_expression.is_match(&text),
                Err(compile_fault) => {
                    warn!("⚠️ [ORACLE]: Regex rule rejected: {}", compile_fault);
                    false
                }
            }
        }
        MatchOperator::In => {
            let Some(text) = scalar_text(observed_value) else {
                return false;
            };
            rule_value
                .split(',')
                .map(str::trim)
                .any(|candidate| fold_eq(&text, candidate, ignore_case))
        }
        MatchOperator::ListContains => list_items(observed_value)
            .iter()
            .any(|item| fold_eq(item, rule_value, ignore_case)),
        MatchOperator::GreaterThan => {
            let observed_number = observed_value
                .as_f64()
                .or_else(|| scalar_text(observed_value).and_then(|text| text.parse::<f64>().ok()));
            let rule_number = rule_value.parse::<f64>().ok();
            matches!(
                (observed_number, rule_number),
                (Some(observed), Some(threshold)) if observed > threshold
            )
        }
        MatchOperator::Cidr => {
            let parsed = (
                scalar_text(observed_value).and_then(|text| text.parse::<IpAddr>().ok()),
                rule_value.trim().parse::<IpNet>().ok(),
            );
            matches!(parsed, (Some(address), Some(block)) if block.contains(&address))
        }
    }
}

/// Proyección textual de un valor escalar (String, número o booleano).
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Proyección a lista: arreglo JSON o texto separado por comas.
fn list_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(elements) => elements.iter().filter_map(scalar_text).collect(),
        Value::String(joined) => joined.split(',').map(|item| item.trim().to_string()).collect(),
        _ => Vec::new(),
    }
}

fn fold(text: &str, ignore_case: bool) -> String {
    if ignore_case {
        text.to_ascii_lowercase()
    } else {
        text.to_string()
    }
}

fn fold_eq(left: &str, right: &str, ignore_case: bool) -> bool {
    if ignore_case {
        left.eq_ignore_ascii_case(right)
    } else {
        left == right
    }
}
