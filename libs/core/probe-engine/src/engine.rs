// [libs/core/probe-engine/src/engine.rs]
/*!
 * =================================================================
 * APARATO: SERVICE IDENTIFICATION ENGINE (V3.3 - SEQUENCE MASTER)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: BUCLE SONDEAR-LEER-COINCIDIR CON PLAZOS ESTRICTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SEQUENCE DISCIPLINE: Un 'match' sella la huella y detiene todo;
 *    un 'softmatch' registra la familia y filtra las sondas restantes;
 *    el agotamiento de la secuencia emite NotIdentified.
 * 2. PARTIAL READ MATCHING: El timeout por sonda cierra la lectura y
 *    los patrones se aplican sobre los bytes parciales acumulados.
 * 3. IMMEDIATE CANCELLATION: El plazo global y los fallos de conexión
 *    retornan de inmediato sin avanzar la secuencia.
 * =================================================================
 */

use crate::dialer::Dialer;
use crate::errors::ProbeError;
use crate::matcher::{apply_directives, MatchOutcome};
use crate::probe::{ProbeDatabase, ServiceProbe};
use crate::selection::{probe_sequence_for_port, DEFAULT_RARITY_CAP};
use neoscan_domain_models::fingerprint::FingerPrint;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, Instant};
use tracing::{debug, instrument, trace};

/// Configuración operativa del motor de identificación.
#[derive(Debug, Clone)]
pub struct ProbeEngineConfig {
    /// Tope de rareza de la secuencia de sondas.
    pub rarity_cap: u8,
    /// Ventana de lectura por sonda antes de aplicar patrones finales.
    pub read_timeout: Duration,
    /// Tope de bytes acumulados por sonda (cap de lectura).
    pub read_cap_bytes: usize,
}

impl Default for ProbeEngineConfig {
    fn default() -> Self {
        Self {
            rarity_cap: DEFAULT_RARITY_CAP,
            read_timeout: Duration::from_secs(5),
            read_cap_bytes: 4096,
        }
    }
}

/// Veredicto final del motor para un (objetivo, puerto).
#[derive(Debug)]
pub enum ScanVerdict {
    /// Huella final cristalizada por una coincidencia dura.
    Identified(FingerPrint),
    /// Secuencia agotada; la familia blanda queda como pista.
    NotIdentified { soft_service: Option<String> },
}

/**
 * Identifica el servicio detrás de un puerto abierto.
 *
 * # Errors:
 * - `ProbeError::ConnectionFault`: El objetivo colapsó la conexión.
 * - `ProbeError::DeadlineExceeded`: El plazo global expiró.
 */
#[instrument(skip(dialer, database, config), fields(target = %target_host, port = target_port))]
pub async fn identify_service(
    dialer: &Dialer,
    database: &ProbeDatabase,
    target_host: &str,
    target_port: u16,
    config: &ProbeEngineConfig,
    deadline: Instant,
) -> Result<ScanVerdict, ProbeError> {
    let probe_sequence = probe_sequence_for_port(database, target_port, config.rarity_cap);
    let mut soft_service_family: Option<String> = None;

    for service_probe in probe_sequence {
        if Instant::now() >= deadline {
            return Err(ProbeError::DeadlineExceeded);
        }

        // Con familia blanda registrada, solo avanzan sondas con directivas
        // de esa familia.
        if let Some(family) = soft_service_family.as_deref() {
            let probe_covers_family = database
                .directives_with_fallback(service_probe)
                .iter()
                .any(|directive| directive.service == family);
            if !probe_covers_family {
                continue;
            }
        }

        let probe_outcome = execute_single_probe(
            dialer,
            database,
            service_probe,
            target_host,
            target_port,
            config,
            deadline,
            soft_service_family.as_deref(),
        )
        .await?;

        match probe_outcome {
            MatchOutcome::Final(fingerprint) => {
                debug!(
                    "🧬 [PROBE_ENGINE]: Service sealed as '{}' via probe '{}'.",
                    fingerprint.service, service_probe.name
                );
                return Ok(ScanVerdict::Identified(fingerprint));
            }
            MatchOutcome::Soft { service } => {
                debug!(
                    "🔎 [PROBE_ENGINE]: Soft family '{}' registered; narrowing sequence.",
                    service
                );
                soft_service_family = Some(service);
            }
            MatchOutcome::None => {}
        }
    }

    Ok(ScanVerdict::NotIdentified {
        soft_service: soft_service_family,
    })
}

/**
 * Ejecuta una sonda individual: conectar, emitir payload, leer hasta
 * coincidencia, cap de lectura o timeout, y aplicar directivas.
 */
#[allow(clippy::too_many_arguments)]
async fn execute_single_probe(
    dialer: &Dialer,
    database: &ProbeDatabase,
    service_probe: &ServiceProbe,
    target_host: &str,
    target_port: u16,
    config: &ProbeEngineConfig,
    deadline: Instant,
    soft_service_filter: Option<&str>,
) -> Result<MatchOutcome, ProbeError> {
    let mut connection = dialer.dial(target_host, target_port, deadline).await?;

    if !service_probe.payload.is_empty() {
        connection
            .write_all(&service_probe.payload)
            .await
            .map_err(|write_fault| ProbeError::ConnectionFault(write_fault.to_string()))?;
    }

    let applicable_directives = database.directives_with_fallback(service_probe);
    let mut accumulated_banner: Vec<u8> = Vec::with_capacity(512);
    let mut read_chunk = [0u8; 1024];
    let probe_deadline = Instant::now() + config.read_timeout;

    loop {
        let now = Instant::now();
        if now >= deadline {
            // Plazo global: el trabajo parcial se abandona de inmediato.
            return Err(ProbeError::DeadlineExceeded);
        }
        if now >= probe_deadline || accumulated_banner.len() >= config.read_cap_bytes {
            break;
        }

        let read_window = probe_deadline.min(deadline) - now;
        match timeout(read_window, connection.read(&mut read_chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(bytes_received)) => {
                accumulated_banner.extend_from_slice(&read_chunk[..bytes_received]);
                trace!(
                    "📡 [PROBE_ENGINE]: {} bytes accumulated on probe '{}'.",
                    accumulated_banner.len(),
                    service_probe.name
                );

                // Coincidencia incremental: sellar apenas el patrón cierra.
                match apply_directives(&applicable_directives, &accumulated_banner, soft_service_filter) {
                    MatchOutcome::None => {}
                    conclusive_outcome => return Ok(conclusive_outcome),
                }
            }
            Ok(Err(read_fault)) => {
                // Lectura parcial previa todavía es evaluable.
                debug!(
                    "⚠️ [PROBE_ENGINE]: Read fault on probe '{}': {}.",
                    service_probe.name, read_fault
                );
                break;
            }
            Err(_elapsed) => break,
        }
    }

    Ok(apply_directives(
        &applicable_directives,
        &accumulated_banner,
        soft_service_filter,
    ))
}
