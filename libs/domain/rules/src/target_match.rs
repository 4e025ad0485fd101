// [libs/domain/rules/src/target_match.rs]
/*!
 * =================================================================
 * APARATO: TARGET WHITELIST MATCHER (V2.2 - PERIMETER SEAL)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: COINCIDENCIA DE OBJETIVOS CONTRA REGLAS DE ALCANCE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TABLE FIDELITY: Implementa bit-a-bit la tabla de coincidencia del
 *    perímetro: ip (exacta y rango inclusivo), cidr, domain (exacta y
 *    sufijo), domain_pattern (comodines shell), url (prefijo) y
 *    keyword (subcadena sin mayúsculas).
 * 2. URL DOUBLE EVALUATION: Un objetivo URL también expone su host para
 *    re-evaluación contra las familias ip/cidr/domain/domain_pattern.
 * 3. FAIL-CLOSED PARSING: Una regla malformada jamás bloquea por error;
 *    se ignora con rastro de advertencia y la evaluación continúa.
 * =================================================================
 */

use neoscan_domain_models::policy::{PolicyBlock, WhitelistRule, WhitelistTargetType};
use ipnet::IpNet;
use regex::Regex;
use std::net::IpAddr;
use tracing::warn;

/// Razón estable emitida cuando una regla de lista blanca bloquea.
pub const REASON_TARGET_WHITELISTED: &str = "target whitelisted";

/**
 * Evalúa todas las reglas habilitadas contra un objetivo.
 * La primera regla que coincide produce el bloqueo (orden de definición).
 */
pub fn evaluate_whitelist(rules: &[WhitelistRule], target: &str) -> Option<PolicyBlock> {
    let extracted_host = extract_url_host(target);

    for rule in rules.iter().filter(|candidate| candidate.enabled) {
        if whitelist_rule_matches(rule, target) {
            return Some(PolicyBlock {
                reason: REASON_TARGET_WHITELISTED.to_string(),
                blocking_rule_id: rule.rule_id,
            });
        }

        // Re-evaluación del host embebido para objetivos URL.
        if let Some(host_candidate) = extracted_host.as_deref() {
            let is_host_family = matches!(
                rule.target_type,
                WhitelistTargetType::Ip
                    | WhitelistTargetType::Cidr
                    | WhitelistTargetType::Domain
                    | WhitelistTargetType::DomainPattern
            );
            if is_host_family && whitelist_rule_matches(rule, host_candidate) {
                return Some(PolicyBlock {
                    reason: REASON_TARGET_WHITELISTED.to_string(),
                    blocking_rule_id: rule.rule_id,
                });
            }
        }
    }

    None
}

/**
 * Decide si una única regla coincide con el objetivo dado.
 */
pub fn whitelist_rule_matches(rule: &WhitelistRule, target: &str) -> bool {
    let trimmed_target = target.trim();
    match rule.target_type {
        WhitelistTargetType::Ip => ip_rule_matches(&rule.value, trimmed_target),
        WhitelistTargetType::Cidr => cidr_rule_matches(&rule.value, trimmed_target),
        WhitelistTargetType::Domain => domain_rule_matches(&rule.value, trimmed_target),
        WhitelistTargetType::DomainPattern => wildcard_matches(&rule.value, trimmed_target),
        WhitelistTargetType::Url => trimmed_target.starts_with(rule.value.as_str()),
        WhitelistTargetType::Keyword => trimmed_target
            .to_ascii_lowercase()
            .contains(&rule.value.to_ascii_lowercase()),
    }
}

/// IP exacta o rango inclusivo "a.b.c.d-e.f.g.h".
fn ip_rule_matches(rule_value: &str, target: &str) -> bool {
    let Ok(target_address) = target.parse::<IpAddr>() else {
        return false;
    };

    if let Some((range_start_label, range_end_label)) = rule_value.split_once('-') {
        let boundaries = (
            range_start_label.trim().parse::<IpAddr>(),
            range_end_label.trim().parse::<IpAddr>(),
        );
        return match boundaries {
            (Ok(range_start), Ok(range_end)) => {
                address_ordinal(&target_address)
                    .zip(address_ordinal(&range_start))
                    .zip(address_ordinal(&range_end))
                    .map(|((target_ordinal, start_ordinal), end_ordinal)| {
                        start_ordinal <= target_ordinal && target_ordinal <= end_ordinal
                    })
                    .unwrap_or(false)
            }
            _ => {
                warn!("⚠️ [PERIMETER]: Malformed ip range rule ignored: {}", rule_value);
                false
            }
        };
    }

    rule_value
        .trim()
        .parse::<IpAddr>()
        .map(|rule_address| rule_address == target_address)
        .unwrap_or(false)
}

/// Proyección ordinal de una dirección para comparación de rangos.
/// IPv4 e IPv6 no son comparables entre sí.
fn address_ordinal(address: &IpAddr) -> Option<u128> {
    match address {
        IpAddr::V4(inner) => Some(u32::from(*inner) as u128),
        IpAddr::V6(inner) => Some(u128::from(*inner)),
    }
}

/// Pertenencia a bloque CIDR vía aritmética de ipnet.
fn cidr_rule_matches(rule_value: &str, target: &str) -> bool {
    let Ok(network_block) = rule_value.trim().parse::<IpNet>() else {
        warn!("⚠️ [PERIMETER]: Malformed cidr rule ignored: {}", rule_value);
        return false;
    };
    let Ok(target_address) = target.parse::<IpAddr>() else {
        return false;
    };

    // Un rango IPv4 jamás contiene un objetivo IPv6 y viceversa.
    match (&network_block, &target_address) {
        (IpNet::V4(_), IpAddr::V6(_)) | (IpNet::V6(_), IpAddr::V4(_)) => false,
        _ => network_block.contains(&target_address),
    }
}

/// Igualdad exacta, o sufijo cuando el valor de regla comienza con '.'.
fn domain_rule_matches(rule_value: &str, target: &str) -> bool {
    let normalized_rule = rule_value.trim().to_ascii_lowercase();
    let normalized_target = target.to_ascii_lowercase();

    if let Some(suffix) = normalized_rule.strip_prefix('.') {
        // ".bad.com" coincide con "x.bad.com" y también con "bad.com" exacto.
        return normalized_target.ends_with(&normalized_rule)
            || normalized_target == suffix;
    }

    normalized_target == normalized_rule
}

/**
 * Coincidencia de comodines estilo shell ('*' y '?') sin mayúsculas.
 * El patrón se compila a una expresión regular anclada.
 */
pub fn wildcard_matches(pattern: &str, target: &str) -> bool {
    let mut compiled_pattern = String::with_capacity(pattern.len() * 2 + 4);
    compiled_pattern.push_str("(?i)^");
    for pattern_char in pattern.chars() {
        match pattern_char {
            '*' => compiled_pattern.push_str(".*"),
            '?' => compiled_pattern.push('.'),
            literal => compiled_pattern.push_str(&regex::escape(&literal.to_string())),
        }
    }
    compiled_pattern.push('$');

    match Regex::new(&compiled_pattern) {
        Ok(anchored_expression) => anchored_expression.is_match(target),
        Err(compile_fault) => {
            warn!("⚠️ [PERIMETER]: Wildcard rule rejected by regex engine: {}", compile_fault);
            false
        }
    }
}

/**
 * Extrae el host embebido de un objetivo con forma de URL.
 * Retorna None cuando el objetivo no posee esquema "://".
 */
pub fn extract_url_host(target: &str) -> Option<String> {
    let (_, remainder) = target.split_once("://")?;

    let authority = remainder
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(remainder);

    // Descarta userinfo si está presente.
    let host_with_port = authority.rsplit('@').next().unwrap_or(authority);

    // Literal IPv6 entre corchetes: "[::1]:8080".
    if let Some(ipv6_body) = host_with_port.strip_prefix('[') {
        return ipv6_body.split(']').next().map(|inner| inner.to_string());
    }

    let bare_host = host_with_port
        .split(':')
        .next()
        .unwrap_or(host_with_port);

    if bare_host.is_empty() {
        None
    } else {
        Some(bare_host.to_string())
    }
}
