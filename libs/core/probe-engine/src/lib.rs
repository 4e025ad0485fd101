// [libs/core/probe-engine/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PROBE ENGINE LIBRARY ROOT (V3.0 - SERVICE DNA)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: IDENTIFICACIÓN DE SERVICIOS POR SONDA/RESPUESTA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. NMAP PARITY: La base de sondas se parsea desde el formato textual
 *    compatible con Nmap (Probe, match, softmatch, ports, sslports,
 *    rarity, fallback) con errores aflorados en tiempo de carga.
 * 2. SINGLE-FLIGHT CACHE: La base vive en una celda global perezosa y
 *    se reemplaza atómicamente (publish-then-swap) cuando el snapshot
 *    de reglas cambia.
 * 3. DEADLINE DISCIPLINE: Todo dial y toda lectura respetan el plazo
 *    inyectado; la cancelación retorna de inmediato con trabajo parcial.
 * =================================================================
 */

/// Celda global perezosa de la base de sondas con swap atómico.
pub mod cache;
/// Marcador TCP con proxy SOCKS5, límite de ráfaga y plazos.
pub mod dialer;
/// Bucle de identificación: sondear, leer, coincidir, extraer huella.
pub mod engine;
/// Catálogo semántico de fallos del motor.
pub mod errors;
/// Aplicación de patrones y expansión de plantillas de versión.
pub mod matcher;
/// Parser del formato de base de sondas compatible con Nmap.
pub mod parser;
/// Modelo inmutable de sondas y directivas de coincidencia.
pub mod probe;
/// Secuenciación de sondas por puerto, TLS y rareza.
pub mod selection;

pub use cache::{current_database, database_from_file, publish_database};
pub use dialer::{Dialer, DialerConfig};
pub use engine::{identify_service, ProbeEngineConfig, ScanVerdict};
pub use errors::ProbeError;
pub use probe::{ProbeDatabase, ProbeProtocol, ServiceProbe};
