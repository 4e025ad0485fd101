// [tests/mirror/libs/core/probe_engine/probe_selection.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE SECUENCIA DE SONDEO (V3.0 - RARITY ORDER)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL ORDEN (ports, sslports, NULL, rareza)
 * =================================================================
 */

use neoscan_core_probe::parser::parse_probe_database;
use neoscan_core_probe::selection::probe_sequence_for_port;

const FIXTURE_DATABASE: &str = r#"
Probe TCP NULL q||
rarity 1
match ssh m|^SSH-|
Probe TCP GetRequest q|GET / HTTP/1.0\r\n\r\n|
rarity 2
ports 80
sslports 443
match http m|^HTTP/|
Probe TCP TLSSessionReq q|\x16\x03\x00|
rarity 3
sslports 443
match ssl m|^\x16\x03|
Probe TCP RareScanner q|X|
rarity 9
match exotic m|^EXOTIC|
Probe UDP DNSStatusRequest q|\x00\x00\x10\x00|
rarity 2
match domain m|^\x00\x00|
"#;

#[test]
fn certify_port_priority_order() {
    println!("\n🎯 [INICIO]: Auditoría del orden de secuencia por puerto...");
    let database = parse_probe_database(FIXTURE_DATABASE)
        .expect("CRITICAL_FAULT: La base de certificación debe parsear.");

    // Puerto 80: GetRequest (ports) manda, luego NULL, luego rareza.
    let sequence_for_http = probe_sequence_for_port(&database, 80, 7);
    let sequence_names: Vec<&str> = sequence_for_http
        .iter()
        .map(|probe| probe.name.as_str())
        .collect();

    assert_eq!(
        sequence_names,
        vec!["GetRequest", "NULL", "TLSSessionReq"],
        "El puerto 80 debe priorizar 'ports', luego NULL, luego rareza bajo el tope."
    );

    // UDP jamás entra en la secuencia TCP.
    assert!(
        !sequence_names.contains(&"DNSStatusRequest"),
        "Las sondas UDP no pertenecen a la secuencia TCP."
    );
    println!("   ✅ Orden del puerto 80 certificado: {:?}", sequence_names);
}

#[test]
fn certify_ssl_stratum_on_tls_ports() {
    let database = parse_probe_database(FIXTURE_DATABASE).unwrap();

    // Puerto 443: el estrato sslports precede a NULL y a la rareza.
    let sequence_for_tls = probe_sequence_for_port(&database, 443, 7);
    let sequence_names: Vec<&str> = sequence_for_tls
        .iter()
        .map(|probe| probe.name.as_str())
        .collect();

    assert_eq!(
        sequence_names,
        vec!["GetRequest", "TLSSessionReq", "NULL"],
        "En un puerto TLS común el estrato sslports precede a la sonda NULL."
    );
}

#[test]
fn certify_rarity_cap_cuts_exotic_probes() {
    let database = parse_probe_database(FIXTURE_DATABASE).unwrap();

    let capped_sequence = probe_sequence_for_port(&database, 22, 7);
    assert!(
        !capped_sequence.iter().any(|probe| probe.name == "RareScanner"),
        "Una sonda de rareza 9 jamás entra bajo un tope de 7."
    );

    let uncapped_sequence = probe_sequence_for_port(&database, 22, 9);
    assert!(
        uncapped_sequence.iter().any(|probe| probe.name == "RareScanner"),
        "Elevar el tope a 9 debe habilitar la sonda exótica."
    );
}
