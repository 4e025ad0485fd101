// [tests/mirror/libs/domain/rules/condition_operators.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE OPERADORES DE CONDICIÓN (V2.0 - ORACLE)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL NÚCLEO COMPARTIDO DE COINCIDENCIA
 * =================================================================
 */

use neoscan_domain_models::policy::{ConditionRule, SkipPolicy};
use neoscan_domain_models::tag::{MatchOperator, MatchRule};
use neoscan_domain_rules::condition::{
    matching_tag_assignments, skip_policy_applies, AttributeMap,
};
use serde_json::json;

fn forge_attributes(value: serde_json::Value) -> AttributeMap {
    value.as_object().cloned().expect("FIXTURE_FAULT: attributes must be an object")
}

fn forge_match_rule(rule_id: i64, field: &str, operator: MatchOperator, value: &str, priority: i64, tag_id: i64) -> MatchRule {
    MatchRule {
        rule_id,
        entity_type: "host".to_string(),
        field: field.to_string(),
        operator,
        value: value.to_string(),
        ignore_case: true,
        priority,
        enabled: true,
        tag_id,
    }
}

#[test]
fn certify_priority_ordering_and_tag_deduplication() {
    println!("\n🏷️  [INICIO]: Auditoría de prioridad y deduplicación de auto-etiquetado...");

    let host_attributes = forge_attributes(json!({
        "service": "ssh",
        "ip": "10.4.4.4",
        "open_ports": [22, 80],
    }));

    // Dos reglas apuntan a la misma etiqueta: gana la de menor prioridad.
    let rules = vec![
        forge_match_rule(2, "service", MatchOperator::Equals, "SSH", 20, 7),
        forge_match_rule(1, "ip", MatchOperator::Cidr, "10.0.0.0/8", 10, 7),
        forge_match_rule(3, "service", MatchOperator::In, "ssh,telnet", 30, 9),
    ];

    let assignments = matching_tag_assignments(&rules, &host_attributes);

    assert_eq!(assignments.len(), 2, "Dos etiquetas distintas deben resultar.");
    assert_eq!(assignments[0], (7, 1), "La regla de prioridad 10 debe ganar la etiqueta 7.");
    assert_eq!(assignments[1], (9, 3));

    println!("   ✅ Prioridad y deduplicación certificadas.");
}

#[test]
fn certify_skip_policy_requires_all_conditions() {
    let production_policy = SkipPolicy {
        policy_id: 4,
        name: "skip-production".to_string(),
        enabled: true,
        scope: None,
        condition_rules: vec![
            ConditionRule {
                field: "environment".to_string(),
                operator: MatchOperator::Equals,
                value: "production".to_string(),
                ignore_case: true,
            },
            ConditionRule {
                field: "tags".to_string(),
                operator: MatchOperator::ListContains,
                value: "critical".to_string(),
                ignore_case: true,
            },
        ],
    };

    let blocking_attributes = forge_attributes(json!({
        "environment": "Production",
        "tags": ["critical", "finance"],
    }));
    assert!(skip_policy_applies(&production_policy, &blocking_attributes));

    let partial_attributes = forge_attributes(json!({
        "environment": "production",
        "tags": ["finance"],
    }));
    assert!(
        !skip_policy_applies(&production_policy, &partial_attributes),
        "Una condición insatisfecha jamás bloquea."
    );

    let mut disabled_policy = production_policy.clone();
    disabled_policy.enabled = false;
    assert!(!skip_policy_applies(&disabled_policy, &blocking_attributes));
}

#[test]
fn certify_numeric_and_regex_operators() {
    let service_attributes = forge_attributes(json!({
        "banner": "OpenSSH_8.9p1 Ubuntu",
        "port": 22,
    }));

    let regex_rule = forge_match_rule(5, "banner", MatchOperator::Regex, r"openssh_[\d.]+p\d", 1, 3);
    let threshold_rule = forge_match_rule(6, "port", MatchOperator::GreaterThan, "20", 2, 4);
    let failing_threshold_rule = forge_match_rule(7, "port", MatchOperator::GreaterThan, "22", 3, 5);

    let assignments = matching_tag_assignments(
        &[regex_rule, threshold_rule, failing_threshold_rule],
        &service_attributes,
    );

    assert_eq!(assignments, vec![(3, 5), (4, 6)]);
}
