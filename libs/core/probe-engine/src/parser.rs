// [libs/core/probe-engine/src/parser.rs]
/*!
 * =================================================================
 * APARATO: NMAP PROBE DATABASE PARSER (V3.2 - LOAD-TIME SEAL)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: PARSEO ÚNICO DEL FORMATO TEXTUAL DE SONDAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. LOAD-TIME SURFACING: Toda línea malformada aflora como error con
 *    número de línea en la carga; el motor jamás entra en pánico por
 *    entrada corrupta durante un escaneo.
 * 2. ESCAPE FIDELITY: Los payloads decodifican los escapes C del
 *    formato original (\0, \a, \b, \f, \n, \r, \t, \v, \xHH, \\).
 * 3. DIRECTIVE TOLERANCE: Directivas conocidas sin efecto en este motor
 *    (Exclude, totalwaitms, tcpwrappedms) se aceptan y descartan.
 * =================================================================
 */

use crate::errors::ProbeError;
use crate::probe::{MatchDirective, ProbeDatabase, ProbeProtocol, ServiceProbe};
use regex::bytes::RegexBuilder;
use tracing::debug;

/**
 * Parsea el contenido completo de una base de sondas.
 *
 * # Errors:
 * - `ProbeError::Malformed`: Estructura de línea inválida.
 * - `ProbeError::PatternRejected`: Patrón inaceptable para el motor regex.
 */
pub fn parse_probe_database(raw_content: &str) -> Result<ProbeDatabase, ProbeError> {
    let mut parsed_probes: Vec<ServiceProbe> = Vec::new();
    let mut active_probe: Option<ServiceProbe> = None;

    for (line_offset, raw_line) in raw_content.lines().enumerate() {
        let line_number = line_offset + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(probe_declaration) = line.strip_prefix("Probe ") {
            if let Some(finished_probe) = active_probe.take() {
                parsed_probes.push(finished_probe);
            }
            active_probe = Some(parse_probe_declaration(probe_declaration, line_number)?);
        } else if let Some(match_body) = line.strip_prefix("match ") {
            let probe = require_probe(&mut active_probe, line_number)?;
            probe
                .matches
                .push(parse_match_directive(match_body, false, line_number)?);
        } else if let Some(match_body) = line.strip_prefix("softmatch ") {
            let probe = require_probe(&mut active_probe, line_number)?;
            probe
                .matches
                .push(parse_match_directive(match_body, true, line_number)?);
        } else if let Some(port_list) = line.strip_prefix("ports ") {
            let probe = require_probe(&mut active_probe, line_number)?;
            probe.ports = parse_port_list(port_list, line_number)?;
        } else if let Some(port_list) = line.strip_prefix("sslports ") {
            let probe = require_probe(&mut active_probe, line_number)?;
            probe.ssl_ports = parse_port_list(port_list, line_number)?;
        } else if let Some(rarity_label) = line.strip_prefix("rarity ") {
            let probe = require_probe(&mut active_probe, line_number)?;
            probe.rarity = rarity_label.trim().parse::<u8>().map_err(|parse_fault| {
                ProbeError::Malformed {
                    line: line_number,
                    detail: format!("rarity no numérica: {}", parse_fault),
                }
            })?;
        } else if let Some(fallback_name) = line.strip_prefix("fallback ") {
            let probe = require_probe(&mut active_probe, line_number)?;
            probe.fallback = Some(fallback_name.trim().to_string());
        } else if line.starts_with("Exclude ")
            || line.starts_with("totalwaitms ")
            || line.starts_with("tcpwrappedms ")
        {
            // Directivas del formato original sin efecto en este motor.
            debug!("📜 [PROBE_PARSER]: Directive ignored at line {}.", line_number);
        } else {
            return Err(ProbeError::Malformed {
                line: line_number,
                detail: format!("directiva desconocida: '{}'", line),
            });
        }
    }

    if let Some(finished_probe) = active_probe.take() {
        parsed_probes.push(finished_probe);
    }

    Ok(ProbeDatabase::new(parsed_probes))
}

fn require_probe<'probe>(
    active_probe: &'probe mut Option<ServiceProbe>,
    line_number: usize,
) -> Result<&'probe mut ServiceProbe, ProbeError> {
    active_probe.as_mut().ok_or(ProbeError::Malformed {
        line: line_number,
        detail: "directiva fuera de un bloque Probe".to_string(),
    })
}

/// "TCP GetRequest q|GET / HTTP/1.0\r\n\r\n|"
fn parse_probe_declaration(
    declaration: &str,
    line_number: usize,
) -> Result<ServiceProbe, ProbeError> {
    let malformed = |detail: &str| ProbeError::Malformed {
        line: line_number,
        detail: detail.to_string(),
    };

    let mut tokens = declaration.splitn(3, ' ');
    let protocol = match tokens.next() {
        Some("TCP") => ProbeProtocol::Tcp,
        Some("UDP") => ProbeProtocol::Udp,
        _ => return Err(malformed("protocolo de sonda inválido (TCP|UDP)")),
    };
    let probe_name = tokens
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| malformed("nombre de sonda ausente"))?;
    let payload_section = tokens
        .next()
        .ok_or_else(|| malformed("sección de payload ausente"))?
        .trim_start();

    let mut payload_chars = payload_section.chars();
    if payload_chars.next() != Some('q') {
        return Err(malformed("la sección de payload debe comenzar con 'q'"));
    }
    let delimiter = payload_chars
        .next()
        .ok_or_else(|| malformed("delimitador de payload ausente"))?;
    let payload_body: String = payload_chars.take_while(|current| *current != delimiter).collect();

    if !payload_section[1..]
        .char_indices()
        .skip(1)
        .any(|(_, current)| current == delimiter)
    {
        return Err(malformed("payload sin delimitador de cierre"));
    }

    Ok(ServiceProbe {
        name: probe_name.to_string(),
        protocol,
        payload: decode_escaped_bytes(&payload_body, line_number)?,
        ports: Vec::new(),
        ssl_ports: Vec::new(),
        rarity: 5,
        fallback: None,
        matches: Vec::new(),
    })
}

/// "ssh m|^SSH-([\d.]+)| p/OpenSSH/ v/$2/ cpe:/a:openbsd:openssh:$2/a"
fn parse_match_directive(
    directive_body: &str,
    is_soft: bool,
    line_number: usize,
) -> Result<MatchDirective, ProbeError> {
    let malformed = |detail: String| ProbeError::Malformed {
        line: line_number,
        detail,
    };

    let (service_name, remainder) = directive_body
        .split_once(' ')
        .ok_or_else(|| malformed("directiva match sin patrón".to_string()))?;
    let remainder = remainder.trim_start();

    let mut remainder_chars = remainder.char_indices();
    match remainder_chars.next() {
        Some((_, 'm')) => {}
        _ => return Err(malformed("el patrón debe comenzar con 'm'".to_string())),
    }
    let (_, delimiter) = remainder_chars
        .next()
        .ok_or_else(|| malformed("delimitador de patrón ausente".to_string()))?;

    let pattern_start = 'm'.len_utf8() + delimiter.len_utf8();
    let pattern_end_relative = remainder[pattern_start..]
        .find(delimiter)
        .ok_or_else(|| malformed("patrón sin delimitador de cierre".to_string()))?;
    let pattern_body = &remainder[pattern_start..pattern_start + pattern_end_relative];

    let after_pattern = &remainder[pattern_start + pattern_end_relative + delimiter.len_utf8()..];
    let (pattern_flags, version_fields) = split_flags(after_pattern);

    let compiled_pattern = RegexBuilder::new(pattern_body)
        .case_insensitive(pattern_flags.contains('i'))
        .dot_matches_new_line(pattern_flags.contains('s'))
        .multi_line(true)
        .unicode(false)
        .build()
        .map_err(|compile_fault| ProbeError::PatternRejected {
            line: line_number,
            detail: compile_fault.to_string(),
        })?;

    let mut directive = MatchDirective {
        service: service_name.to_string(),
        pattern: compiled_pattern,
        is_soft,
        product_template: None,
        version_template: None,
        info_template: None,
        hostname_template: None,
        operating_system_template: None,
        device_type_template: None,
        cpe_templates: Vec::new(),
    };

    parse_version_fields(version_fields, &mut directive, line_number)?;
    Ok(directive)
}

/// Separa las banderas inmediatas del patrón ("is") de los campos de versión.
fn split_flags(after_pattern: &str) -> (String, &str) {
    let flag_length = after_pattern
        .chars()
        .take_while(|current| current.is_ascii_alphabetic())
        .count();
    (
        after_pattern[..flag_length].to_string(),
        after_pattern[flag_length..].trim_start(),
    )
}

/// Campos p/ v/ i/ h/ o/ d/ y cpe:/ con delimitador arbitrario.
fn parse_version_fields(
    mut remainder: &str,
    directive: &mut MatchDirective,
    line_number: usize,
) -> Result<(), ProbeError> {
    let malformed = |detail: String| ProbeError::Malformed {
        line: line_number,
        detail,
    };

    loop {
        remainder = remainder.trim_start();
        if remainder.is_empty() {
            return Ok(());
        }

        let (field_label, field_rest) = if let Some(cpe_rest) = remainder.strip_prefix("cpe:") {
            ("cpe".to_string(), cpe_rest)
        } else {
            let field_char = remainder
                .chars()
                .next()
                .ok_or_else(|| malformed("campo de versión truncado".to_string()))?;
            (
                field_char.to_string(),
                &remainder[field_char.len_utf8()..],
            )
        };

        let mut rest_chars = field_rest.chars();
        let delimiter = rest_chars
            .next()
            .ok_or_else(|| malformed(format!("campo '{}' sin delimitador", field_label)))?;
        let body_start = delimiter.len_utf8();
        let body_end_relative = field_rest[body_start..]
            .find(delimiter)
            .ok_or_else(|| malformed(format!("campo '{}' sin cierre", field_label)))?;
        let field_body = &field_rest[body_start..body_start + body_end_relative];
        let mut after_field = &field_rest[body_start + body_end_relative + delimiter.len_utf8()..];

        // El campo cpe admite el sufijo de parte 'a' (application).
        if let Some(stripped) = after_field.strip_prefix('a') {
            if field_label == "cpe" {
                after_field = stripped;
            }
        }

        match field_label.as_str() {
            "p" => directive.product_template = Some(field_body.to_string()),
            "v" => directive.version_template = Some(field_body.to_string()),
            "i" => directive.info_template = Some(field_body.to_string()),
            "h" => directive.hostname_template = Some(field_body.to_string()),
            "o" => directive.operating_system_template = Some(field_body.to_string()),
            "d" => directive.device_type_template = Some(field_body.to_string()),
            "cpe" => directive.cpe_templates.push(field_body.to_string()),
            unknown => {
                return Err(malformed(format!("campo de versión desconocido '{}'", unknown)))
            }
        }

        remainder = after_field;
    }
}

/// "21,43,110-113" -> lista expandida de puertos.
fn parse_port_list(raw_list: &str, line_number: usize) -> Result<Vec<u16>, ProbeError> {
    let mut expanded_ports = Vec::new();
    for fragment in raw_list.split(',') {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }
        if let Some((range_start, range_end)) = fragment.split_once('-') {
            let boundaries = (
                range_start.trim().parse::<u16>(),
                range_end.trim().parse::<u16>(),
            );
            match boundaries {
                (Ok(start_port), Ok(end_port)) if start_port <= end_port => {
                    expanded_ports.extend(start_port..=end_port);
                }
                _ => {
                    return Err(ProbeError::Malformed {
                        line: line_number,
                        detail: format!("rango de puertos inválido '{}'", fragment),
                    })
                }
            }
        } else {
            let single_port = fragment.parse::<u16>().map_err(|parse_fault| {
                ProbeError::Malformed {
                    line: line_number,
                    detail: format!("puerto inválido '{}': {}", fragment, parse_fault),
                }
            })?;
            expanded_ports.push(single_port);
        }
    }
    Ok(expanded_ports)
}

/**
 * Decodifica los escapes C del formato de sondas a bytes crudos.
 */
pub fn decode_escaped_bytes(raw_body: &str, line_number: usize) -> Result<Vec<u8>, ProbeError> {
    let mut decoded_bytes = Vec::with_capacity(raw_body.len());
    let mut cursor = raw_body.chars().peekable();

    while let Some(current) = cursor.next() {
        if current != '\\' {
            let mut utf8_buffer = [0u8; 4];
            decoded_bytes.extend_from_slice(current.encode_utf8(&mut utf8_buffer).as_bytes());
            continue;
        }

        let escape_kind = cursor.next().ok_or(ProbeError::Malformed {
            line: line_number,
            detail: "escape truncado al final del payload".to_string(),
        })?;

        match escape_kind {
            '0' => decoded_bytes.push(0x00),
            'a' => decoded_bytes.push(0x07),
            'b' => decoded_bytes.push(0x08),
            'f' => decoded_bytes.push(0x0c),
            'n' => decoded_bytes.push(b'\n'),
            'r' => decoded_bytes.push(b'\r'),
            't' => decoded_bytes.push(b'\t'),
            'v' => decoded_bytes.push(0x0b),
            '\\' => decoded_bytes.push(b'\\'),
            'x' => {
                // El escape hexadecimal exige exactamente dos dígitos.
                let (Some(high_nibble), Some(low_nibble)) = (cursor.next(), cursor.next()) else {
                    return Err(ProbeError::Malformed {
                        line: line_number,
                        detail: "escape hexadecimal truncado".to_string(),
                    });
                };
                let hex_pair: String = [high_nibble, low_nibble].iter().collect();
                let decoded_value =
                    u8::from_str_radix(&hex_pair, 16).map_err(|_| ProbeError::Malformed {
                        line: line_number,
                        detail: format!("escape hexadecimal inválido '\\x{}'", hex_pair),
                    })?;
                decoded_bytes.push(decoded_value);
            }
            literal => {
                // Escapes de delimitador (\| etc.) se preservan literales.
                let mut utf8_buffer = [0u8; 4];
                decoded_bytes.extend_from_slice(literal.encode_utf8(&mut utf8_buffer).as_bytes());
            }
        }
    }

    Ok(decoded_bytes)
}
