// [libs/core/probe-engine/src/selection.rs]
/*!
 * =================================================================
 * APARATO: PROBE SEQUENCE SELECTOR (V3.0 - RARITY STRATA)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: ORDEN DETERMINISTA DE SONDEO POR PUERTO
 *
 * # Logic:
 * Para un puerto dado, la secuencia es:
 *   (a) sondas que listan el puerto bajo 'ports',
 *   (b) sondas que lo listan bajo 'sslports' cuando el puerto es TLS común,
 *   (c) la sonda NULL (servicios TCP que hablan primero),
 *   (d) el resto de sondas TCP por rareza ascendente hasta el tope.
 * La deduplicación preserva la primera aparición; el orden es estable.
 * =================================================================
 */

use crate::probe::{ProbeDatabase, ProbeProtocol, ServiceProbe};

/// Puertos donde históricamente se espera TLS directo.
const COMMON_TLS_PORTS: &[u16] = &[443, 465, 563, 636, 853, 989, 990, 992, 993, 994, 995, 8443];

/// Tope de rareza por defecto cuando la configuración no lo fija.
pub const DEFAULT_RARITY_CAP: u8 = 7;

pub fn is_common_tls_port(port: u16) -> bool {
    COMMON_TLS_PORTS.contains(&port)
}

/**
 * Produce la secuencia ordenada de sondas TCP a ejecutar para un puerto.
 */
pub fn probe_sequence_for_port<'db>(
    database: &'db ProbeDatabase,
    port: u16,
    rarity_cap: u8,
) -> Vec<&'db ServiceProbe> {
    let tcp_probes: Vec<&ServiceProbe> = database
        .probes
        .iter()
        .filter(|candidate| candidate.protocol == ProbeProtocol::Tcp)
        .collect();

    let mut ordered_sequence: Vec<&ServiceProbe> = Vec::new();

    // (a) Prioridad absoluta: el puerto está listado bajo 'ports'.
    for candidate in &tcp_probes {
        if candidate.ports.contains(&port) {
            push_unique(&mut ordered_sequence, candidate);
        }
    }

    // (b) Prioridad TLS: puerto listado bajo 'sslports' en puertos TLS comunes.
    if is_common_tls_port(port) {
        for candidate in &tcp_probes {
            if candidate.ssl_ports.contains(&port) {
                push_unique(&mut ordered_sequence, candidate);
            }
        }
    }

    // (c) La sonda NULL escucha a los servicios que hablan primero.
    for candidate in &tcp_probes {
        if candidate.is_null_probe() {
            push_unique(&mut ordered_sequence, candidate);
        }
    }

    // (d) Resto por rareza ascendente bajo el tope; empate por orden de base.
    let mut remaining_by_rarity: Vec<&ServiceProbe> = tcp_probes
        .iter()
        .copied()
        .filter(|candidate| candidate.rarity <= rarity_cap)
        .collect();
    remaining_by_rarity.sort_by_key(|candidate| candidate.rarity);
    for candidate in remaining_by_rarity {
        push_unique(&mut ordered_sequence, candidate);
    }

    ordered_sequence
}

fn push_unique<'db>(sequence: &mut Vec<&'db ServiceProbe>, candidate: &'db ServiceProbe) {
    if !sequence
        .iter()
        .any(|existing| existing.name == candidate.name)
    {
        sequence.push(candidate);
    }
}
