// [tests/mirror/libs/core/probe_engine/live_identification.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE IDENTIFICACIÓN VIVA (V3.1 - LOOPBACK)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: AUDITORÍA E2E DEL BUCLE SONDEAR-LEER-COINCIDIR
 *
 * # Logic:
 * Se levanta un servicio efímero en loopback que emite un banner SSH
 * al conectar (habla primero). El motor debe identificarlo vía la
 * sonda NULL y cristalizar producto y versión. Un segundo escenario
 * certifica el plazo global contra un servicio mudo.
 * =================================================================
 */

use neoscan_core_probe::dialer::{Dialer, DialerConfig};
use neoscan_core_probe::engine::{identify_service, ProbeEngineConfig, ScanVerdict};
use neoscan_core_probe::parser::parse_probe_database;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::time::Instant;

const FIXTURE_DATABASE: &str = r#"
Probe TCP NULL q||
rarity 1
match ssh m|^SSH-([\d.]+)-OpenSSH[_-]([\w.]+)| p/OpenSSH/ v/$2/ i/protocol $1/
Probe TCP GetRequest q|GET / HTTP/1.0\r\n\r\n|
rarity 2
ports 80
match http m|^HTTP/1\.[01] (\d\d\d)| p/generic httpd/ i/status $1/
"#;

/// Servicio efímero que emite un banner al aceptar la conexión.
async fn spawn_banner_service(banner: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("LOOPBACK_FAULT: bind efímero rechazado.");
    let bound_port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(banner).await;
            // Mantener el socket un instante para que el lector drene.
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    });

    bound_port
}

#[tokio::test]
async fn certify_ssh_identification_via_null_probe() {
    println!("\n📡 [INICIO]: Identificación viva de servicio SSH en loopback...");

    let database = parse_probe_database(FIXTURE_DATABASE).unwrap();
    let service_port = spawn_banner_service(b"SSH-2.0-OpenSSH_8.9p1 Ubuntu\r\n").await;

    let dialer = Dialer::new(DialerConfig::default());
    let engine_config = ProbeEngineConfig {
        read_timeout: Duration::from_millis(600),
        ..ProbeEngineConfig::default()
    };

    let verdict = identify_service(
        &dialer,
        &database,
        "127.0.0.1",
        service_port,
        &engine_config,
        Instant::now() + Duration::from_secs(10),
    )
    .await
    .expect("ENGINE_FAULT: El escaneo en loopback no debe fallar.");

    match verdict {
        ScanVerdict::Identified(fingerprint) => {
            assert_eq!(fingerprint.service, "ssh");
            assert_eq!(fingerprint.product.as_deref(), Some("OpenSSH"));
            assert_eq!(fingerprint.version.as_deref(), Some("8.9p1"));
            println!("   ✅ Servicio sellado: {:?}", fingerprint);
        }
        other => panic!("ENGINE_FAULT: Se esperaba huella final, hubo {:?}", other),
    }
}

#[tokio::test]
async fn certify_silent_service_exhausts_to_not_identified() {
    let database = parse_probe_database(FIXTURE_DATABASE).unwrap();

    // Servicio mudo: acepta y jamás escribe.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        }
    });

    let dialer = Dialer::new(DialerConfig::default());
    let engine_config = ProbeEngineConfig {
        read_timeout: Duration::from_millis(150),
        ..ProbeEngineConfig::default()
    };

    let verdict = identify_service(
        &dialer,
        &database,
        "127.0.0.1",
        silent_port,
        &engine_config,
        Instant::now() + Duration::from_secs(10),
    )
    .await
    .expect("ENGINE_FAULT: Un servicio mudo no es un error de red.");

    assert!(
        matches!(verdict, ScanVerdict::NotIdentified { .. }),
        "Un servicio mudo agota la secuencia sin huella."
    );
}

#[tokio::test]
async fn certify_global_deadline_aborts_immediately() {
    let database = parse_probe_database(FIXTURE_DATABASE).unwrap();
    let dialer = Dialer::new(DialerConfig::default());
    let engine_config = ProbeEngineConfig::default();

    // Plazo ya vencido: el motor debe retornar sin marcar nada.
    let verdict = identify_service(
        &dialer,
        &database,
        "127.0.0.1",
        1,
        &engine_config,
        Instant::now() - Duration::from_millis(1),
    )
    .await;

    assert!(verdict.is_err(), "Un plazo vencido debe abortar la secuencia.");
}
