// [tests/mirror/libs/core/probe_engine/template_expansion.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE EXPANSIÓN DE PLANTILLAS (V3.0 - DNA)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE $1..$9 Y FILTRO DE BYTES IMPRIMIBLES
 * =================================================================
 */

use neoscan_core_probe::matcher::{apply_directives, MatchOutcome};
use neoscan_core_probe::parser::parse_probe_database;

const FIXTURE_DATABASE: &str = r#"
Probe TCP NULL q||
rarity 1
match ssh m|^SSH-([\d.]+)-OpenSSH[_-]([\w.]+)[ -]*([^\r\n]*)| p/OpenSSH/ v/$2/ i/protocol $1; $3/ cpe:/a:openbsd:openssh:$2/a
softmatch smtp m|^220[ -]|
"#;

#[test]
fn certify_capture_group_expansion() {
    println!("\n🧪 [INICIO]: Auditoría de expansión de grupos capturados...");
    let database = parse_probe_database(FIXTURE_DATABASE).unwrap();
    let null_probe = database.probe_by_name("NULL").unwrap();
    let directives = database.directives_with_fallback(null_probe);

    let ssh_banner = b"SSH-2.0-OpenSSH_8.9p1 Ubuntu-3ubuntu0.1\r\n";
    let outcome = apply_directives(&directives, ssh_banner, None);

    let MatchOutcome::Final(fingerprint) = outcome else {
        panic!("MATCH_FAULT: El banner SSH debía producir una huella final.");
    };

    assert_eq!(fingerprint.service, "ssh");
    assert_eq!(fingerprint.product.as_deref(), Some("OpenSSH"));
    assert_eq!(fingerprint.version.as_deref(), Some("8.9p1"));
    assert_eq!(
        fingerprint.extra_info.as_deref(),
        Some("protocol 2.0; Ubuntu-3ubuntu0.1")
    );
    assert_eq!(fingerprint.cpe, vec!["a:openbsd:openssh:8.9p1".to_string()]);
    println!("   ✅ Huella cristalizada: {:?}", fingerprint);
}

#[test]
fn certify_printable_filter_projects_control_bytes() {
    let database = parse_probe_database(
        "Probe TCP NULL q||\nmatch raw m|^([\\x00-\\xff]{4})| p/$1/\n",
    )
    .unwrap();
    let null_probe = database.probe_by_name("NULL").unwrap();
    let directives = database.directives_with_fallback(null_probe);

    let binary_banner = [0x41u8, 0x00, 0x07, 0x42];
    let outcome = apply_directives(&directives, &binary_banner, None);

    let MatchOutcome::Final(fingerprint) = outcome else {
        panic!("MATCH_FAULT: El banner binario debía coincidir.");
    };

    // Los bytes de control se proyectan a '.': A..B
    assert_eq!(fingerprint.product.as_deref(), Some("A..B"));
}

#[test]
fn certify_softmatch_registers_family_without_sealing() {
    let database = parse_probe_database(FIXTURE_DATABASE).unwrap();
    let null_probe = database.probe_by_name("NULL").unwrap();
    let directives = database.directives_with_fallback(null_probe);

    let smtp_banner = b"220 mail.corp.example ESMTP ready\r\n";
    let outcome = apply_directives(&directives, smtp_banner, None);

    match outcome {
        MatchOutcome::Soft { service } => assert_eq!(service, "smtp"),
        other => panic!("MATCH_FAULT: Se esperaba softmatch, hubo {:?}", other),
    }
}

#[test]
fn certify_soft_family_filter_narrows_directives() {
    let database = parse_probe_database(FIXTURE_DATABASE).unwrap();
    let null_probe = database.probe_by_name("NULL").unwrap();
    let directives = database.directives_with_fallback(null_probe);

    // Con familia 'smtp' registrada, la directiva ssh queda excluida.
    let ssh_banner = b"SSH-2.0-OpenSSH_8.9p1\r\n";
    let outcome = apply_directives(&directives, ssh_banner, Some("smtp"));
    assert!(matches!(outcome, MatchOutcome::None));
}
