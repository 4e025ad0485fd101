// [tests/mirror/libs/core/probe_engine/probe_parser.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL PARSER DE SONDAS (V3.1 - NMAP PARITY)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE CARGA DEL FORMATO TEXTUAL DE SONDAS
 * =================================================================
 */

use neoscan_core_probe::errors::ProbeError;
use neoscan_core_probe::parser::parse_probe_database;
use neoscan_core_probe::probe::ProbeProtocol;

const FIXTURE_DATABASE: &str = r#"
# Base de certificación mínima
Exclude T:9100-9107
Probe TCP NULL q||
rarity 1
match ssh m|^SSH-([\d.]+)-OpenSSH[_-]([\w.]+)| p/OpenSSH/ v/$2/ i/protocol $1/ cpe:/a:openbsd:openssh:$2/a
softmatch ftp m|^220[ -]|
Probe TCP GetRequest q|GET / HTTP/1.0\r\n\r\n|
rarity 2
ports 80,8000-8002
sslports 443
match http m|^HTTP/1\.[01] \d\d\d| p/generic httpd/
Probe TCP GenericLines q|\r\n\r\n|
rarity 6
fallback GetRequest
"#;

#[test]
fn certify_full_fixture_crystallization() {
    println!("\n🧬 [INICIO]: Auditoría de cristalización de la base de sondas...");
    let mut accumulated_anomalies_count = 0u32;

    let database = parse_probe_database(FIXTURE_DATABASE)
        .expect("CRITICAL_FAULT: La base de certificación debe parsear.");

    // FASE 1: Conteo y protocolo
    println!("   🧪 Fase 1: Inventario de sondas...");
    if database.probes.len() != 3 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Se esperaban 3 sondas, hay {}.", database.probes.len());
    }

    // FASE 2: La sonda NULL no emite payload
    println!("   🧪 Fase 2: Payload de la sonda NULL...");
    let null_probe = database
        .probe_by_name("NULL")
        .expect("REGISTRY_FAULT: Sonda NULL ausente.");
    if !null_probe.is_null_probe() || null_probe.protocol != ProbeProtocol::Tcp {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: La sonda NULL debe ser TCP sin payload.");
    }
    if null_probe.rarity != 1 || null_probe.matches.len() != 2 {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Rareza o directivas de NULL corruptas.");
    }

    // FASE 3: Decodificación de escapes del payload HTTP
    println!("   🧪 Fase 3: Escapes C del payload GetRequest...");
    let get_request_probe = database
        .probe_by_name("GetRequest")
        .expect("REGISTRY_FAULT: Sonda GetRequest ausente.");
    if get_request_probe.payload != b"GET / HTTP/1.0\r\n\r\n" {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: El payload decodificado no es bit-perfecto.");
    }

    // FASE 4: Expansión de rangos de puertos y sslports
    println!("   🧪 Fase 4: Rangos de puertos...");
    if get_request_probe.ports != vec![80, 8000, 8001, 8002] {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Expansión de 'ports 80,8000-8002' corrupta.");
    }
    if get_request_probe.ssl_ports != vec![443] {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: sslports corrupto.");
    }

    // FASE 5: Plantillas de versión del match ssh
    println!("   🧪 Fase 5: Campos de versión y CPE...");
    let ssh_directive = &null_probe.matches[0];
    if ssh_directive.product_template.as_deref() != Some("OpenSSH")
        || ssh_directive.version_template.as_deref() != Some("$2")
        || ssh_directive.info_template.as_deref() != Some("protocol $1")
        || ssh_directive.cpe_templates != vec!["a:openbsd:openssh:$2".to_string()]
    {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: Plantillas de versión del match ssh corruptas.");
    }
    if !null_probe.matches[1].is_soft {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: La directiva ftp debe ser softmatch.");
    }

    // FASE 6: Cadena de fallback
    println!("   🧪 Fase 6: Herencia por fallback...");
    let generic_lines_probe = database
        .probe_by_name("GenericLines")
        .expect("REGISTRY_FAULT: Sonda GenericLines ausente.");
    let inherited_directives = database.directives_with_fallback(generic_lines_probe);
    if inherited_directives.len() != 1 || inherited_directives[0].service != "http" {
        accumulated_anomalies_count += 1;
        println!("      ❌ FALLO: GenericLines debe heredar el match http de GetRequest.");
    }

    println!("\n🏁 [INFORME]: Anomalías detectadas: {}", accumulated_anomalies_count);
    assert_eq!(accumulated_anomalies_count, 0, "La carga de la base de sondas ha sido comprometida.");
}

#[test]
fn certify_malformed_lines_surface_at_load() {
    // Directiva huérfana fuera de bloque Probe
    let orphan_verdict = parse_probe_database("match ssh m|^SSH|\n");
    assert!(matches!(orphan_verdict, Err(ProbeError::Malformed { line: 1, .. })));

    // Payload sin cierre
    let open_payload_verdict = parse_probe_database("Probe TCP Broken q|GET /\n");
    assert!(matches!(open_payload_verdict, Err(ProbeError::Malformed { .. })));

    // Directiva desconocida
    let unknown_verdict = parse_probe_database("Probe TCP X q||\nwarpdrive 9\n");
    assert!(matches!(unknown_verdict, Err(ProbeError::Malformed { line: 2, .. })));

    // Patrón inaceptable para el motor regex
    let rejected_pattern_verdict = parse_probe_database("Probe TCP X q||\nmatch x m|(unclosed|\n");
    assert!(matches!(
        rejected_pattern_verdict,
        Err(ProbeError::PatternRejected { line: 2, .. })
    ));
}
