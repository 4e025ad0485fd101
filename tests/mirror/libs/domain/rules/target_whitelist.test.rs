// [tests/mirror/libs/domain/rules/target_whitelist.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE PERÍMETRO DE LISTA BLANCA (V2.1 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE LA TABLA DE COINCIDENCIA DE OBJETIVOS
 *
 * # Mathematical Proof (Fail-Closed Perimeter):
 * El test certifica que cada familia de regla (ip, cidr, domain,
 * domain_pattern, url, keyword) bloquea exactamente los objetivos que
 * la tabla del perímetro declara, y que los objetivos URL exponen su
 * host embebido para re-evaluación.
 * =================================================================
 */

use neoscan_domain_models::policy::{WhitelistRule, WhitelistTargetType};
use neoscan_domain_rules::target_match::{
    evaluate_whitelist, whitelist_rule_matches, REASON_TARGET_WHITELISTED,
};
use proptest::prelude::*;

fn forge_rule(rule_id: i64, target_type: WhitelistTargetType, value: &str) -> WhitelistRule {
    WhitelistRule {
        rule_id,
        target_type,
        value: value.to_string(),
        enabled: true,
        scope: None,
    }
}

#[test]
fn certify_perimeter_match_table() {
    println!("\n🛡️  [INICIO]: Auditoría de la tabla de coincidencia del perímetro...");
    let mut accumulated_anomalies_count = 0u32;

    // FASE 1: Familia CIDR (Escenario del enunciado: 10.0.0.0/8)
    println!("   🧪 Fase 1: Pertenencia CIDR...");
    let cidr_rule = forge_rule(1, WhitelistTargetType::Cidr, "10.0.0.0/8");
    if !whitelist_rule_matches(&cidr_rule, "10.1.1.1") {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: 10.1.1.1 debería pertenecer a 10.0.0.0/8.");
    }
    if whitelist_rule_matches(&cidr_rule, "11.0.0.1") {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: 11.0.0.1 jamás pertenece a 10.0.0.0/8.");
    }

    // FASE 2: Familia dominio (exacto, sufijo y comodín)
    println!("   🧪 Fase 2: Dominios exactos, sufijos y comodines...");
    let exact_domain_rule = forge_rule(2, WhitelistTargetType::Domain, "safe.example");
    let suffix_domain_rule = forge_rule(3, WhitelistTargetType::Domain, ".bank.example");
    let wildcard_rule = forge_rule(4, WhitelistTargetType::DomainPattern, "*.bad.com");

    let domain_expectations: [(&WhitelistRule, &str, bool); 6] = [
        (&exact_domain_rule, "safe.example", true),
        (&exact_domain_rule, "sub.safe.example", false),
        (&suffix_domain_rule, "core.bank.example", true),
        (&suffix_domain_rule, "bank.example.evil", false),
        (&wildcard_rule, "login.bad.com", true),
        (&wildcard_rule, "bad.com.mirror", false),
    ];

    for (rule, target, expected_verdict) in domain_expectations {
        if whitelist_rule_matches(rule, target) != expected_verdict {
            accumulated_anomalies_count += 1;
            println!("      ❌ FALLO: Regla {} vs '{}' esperaba {}.", rule.rule_id, target, expected_verdict);
        }
    }

    // FASE 3: URL con re-evaluación de host embebido
    println!("   🧪 Fase 3: Re-evaluación de host para objetivos URL...");
    let perimeter_rules = vec![cidr_rule.clone()];
    let url_verdict = evaluate_whitelist(&perimeter_rules, "https://10.2.3.4:8443/panel");
    match url_verdict {
        Some(block) if block.reason == REASON_TARGET_WHITELISTED => {
            println!("      ✅ Host embebido 10.2.3.4 bloqueado por la familia CIDR.");
        }
        _ => {
            accumulated_anomalies_count += 1;
            println!("      ❌ FALLO: El host embebido de la URL no fue re-evaluado.");
        }
    }

    // FASE 4: Reglas deshabilitadas jamás bloquean
    println!("   🧪 Fase 4: Reglas deshabilitadas...");
    let mut disabled_rule = forge_rule(5, WhitelistTargetType::Keyword, "intranet");
    disabled_rule.enabled = false;
    if evaluate_whitelist(&[disabled_rule], "intranet.corp").is_some() {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Una regla deshabilitada produjo bloqueo.");
    }

    println!("\n🏁 [INFORME]: Anomalías detectadas: {}", accumulated_anomalies_count);
    assert_eq!(
        accumulated_anomalies_count, 0,
        "La integridad del perímetro de lista blanca ha sido comprometida."
    );
}

#[test]
fn certify_first_blocking_rule_wins() {
    let perimeter_rules = vec![
        forge_rule(10, WhitelistTargetType::Keyword, "corp"),
        forge_rule(11, WhitelistTargetType::Domain, "db.corp"),
    ];

    let verdict = evaluate_whitelist(&perimeter_rules, "db.corp")
        .expect("PERIMETER_FAULT: El objetivo debía ser bloqueado.");
    assert_eq!(verdict.blocking_rule_id, 10, "La primera regla en orden debe ganar.");
}

proptest! {
    /// Propiedad: todo octeto dentro de un rango IPv4 inclusivo coincide,
    /// y los vecinos inmediatos fuera del rango jamás coinciden.
    #[test]
    fn certify_ipv4_range_inclusivity(range_start in 1u8..=250, range_width in 0u8..=4, probe_offset in 0u8..=4) {
        let range_end = range_start.saturating_add(range_width);
        let range_rule = forge_rule(
            99,
            WhitelistTargetType::Ip,
            &format!("172.16.5.{}-172.16.5.{}", range_start, range_end),
        );

        let probe_octet = range_start.saturating_add(probe_offset.min(range_width));
        let probe_target = format!("172.16.5.{}", probe_octet);
        prop_assert!(whitelist_rule_matches(&range_rule, &probe_target));

        if range_start > 1 {
            let below_target = format!("172.16.5.{}", range_start - 1);
            prop_assert!(!whitelist_rule_matches(&range_rule, &below_target));
        }
        if range_end < 255 {
            let above_target = format!("172.16.5.{}", range_end + 1);
            prop_assert!(!whitelist_rule_matches(&range_rule, &above_target));
        }
    }
}
