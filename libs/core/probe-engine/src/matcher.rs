// [libs/core/probe-engine/src/matcher.rs]
/*!
 * =================================================================
 * APARATO: RESPONSE MATCHER & TEMPLATE EXPANDER (V3.1 - DNA EXTRACT)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: APLICACIÓN DE PATRONES Y CRISTALIZACIÓN DE HUELLAS
 *
 * # Logic:
 * Las directivas se aplican en orden de definición (propias primero,
 * heredadas por fallback después). Un 'match' sella la huella y detiene
 * la secuencia; un 'softmatch' registra la familia de servicio y deja
 * que la secuencia continúe filtrada a esa familia.
 * =================================================================
 */

use crate::probe::MatchDirective;
use neoscan_domain_models::fingerprint::FingerPrint;
use regex::bytes::Captures;

/// Veredicto de la aplicación de directivas sobre una respuesta.
#[derive(Debug)]
pub enum MatchOutcome {
    /// Coincidencia dura: huella final cristalizada.
    Final(FingerPrint),
    /// Coincidencia blanda: familia registrada, la secuencia continúa.
    Soft { service: String },
    /// Ninguna directiva coincidió con la respuesta.
    None,
}

/**
 * Aplica las directivas en orden contra el banner acumulado.
 * Cuando hay familia blanda registrada, solo se consideran directivas
 * de esa familia (más las blandas que la confirman).
 */
pub fn apply_directives(
    directives: &[&MatchDirective],
    response_banner: &[u8],
    soft_service_filter: Option<&str>,
) -> MatchOutcome {
    for directive in directives {
        if let Some(family) = soft_service_filter {
            if directive.service != family {
                continue;
            }
        }

        let Some(capture_groups) = directive.pattern.captures(response_banner) else {
            continue;
        };

        if directive.is_soft {
            return MatchOutcome::Soft {
                service: directive.service.clone(),
            };
        }

        return MatchOutcome::Final(crystallize_fingerprint(directive, &capture_groups));
    }

    MatchOutcome::None
}

/// Construye la huella final expandiendo todas las plantillas de versión.
fn crystallize_fingerprint(directive: &MatchDirective, capture_groups: &Captures) -> FingerPrint {
    let expand = |template: &Option<String>| {
        template
            .as_ref()
            .map(|body| expand_template(body, capture_groups))
            .filter(|expanded| !expanded.is_empty())
    };

    FingerPrint {
        service: directive.service.clone(),
        product: expand(&directive.product_template),
        version: expand(&directive.version_template),
        extra_info: expand(&directive.info_template),
        hostname: expand(&directive.hostname_template),
        operating_system: expand(&directive.operating_system_template),
        device_type: expand(&directive.device_type_template),
        cpe: directive
            .cpe_templates
            .iter()
            .map(|template| expand_template(template, capture_groups))
            .filter(|expanded| !expanded.is_empty())
            .collect(),
    }
}

/**
 * Expande referencias $1..$9 con los grupos capturados, aplicando el
 * filtro de bytes imprimibles: todo byte de control se proyecta a '.'.
 */
pub fn expand_template(template: &str, capture_groups: &Captures) -> String {
    let mut expanded = String::with_capacity(template.len());
    let mut cursor = template.chars().peekable();

    while let Some(current) = cursor.next() {
        if current == '$' {
            if let Some(group_digit) = cursor.peek().copied().filter(|digit| digit.is_ascii_digit())
            {
                cursor.next();
                let group_index = group_digit.to_digit(10).unwrap_or(0) as usize;
                if let Some(captured_bytes) =
                    capture_groups.get(group_index).map(|group| group.as_bytes())
                {
                    expanded.push_str(&printable_projection(captured_bytes));
                }
                continue;
            }
        }
        expanded.push(current);
    }

    expanded
}

/// Proyección imprimible de bytes capturados (control -> '.').
fn printable_projection(captured_bytes: &[u8]) -> String {
    captured_bytes
        .iter()
        .map(|byte| {
            if byte.is_ascii_graphic() || *byte == b' ' {
                *byte as char
            } else {
                '.'
            }
        })
        .collect()
}
