// [apps/agent/src/tools/port_service.rs]
/*!
 * =================================================================
 * APARATO: PORT SERVICE SCANNER (V3.4 - SEMAPHORE BOUND)
 * CLASIFICACIÓN: WORKER EXECUTION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: LIVENESS TCP + IDENTIFICACIÓN OPCIONAL DE SERVICIOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BOUNDED BURST: Un semáforo contable dimensionado por 'rate'
 *    acota los dials TCP simultáneos del barrido.
 * 2. SILENT CLOSED: Un puerto cerrado o filtrado no emite entrada ni
 *    error; solo los puertos abiertos cristalizan resultado.
 * 3. PARTIAL ON CANCEL: La cancelación aborta el trabajo pendiente y
 *    retorna los resultados parciales ya cristalizados.
 * =================================================================
 */

use crate::tools::ToolExecutionContext;
use futures::future::BoxFuture;
use neoscan_core_probe::cache::current_database;
use neoscan_core_probe::engine::{identify_service, ScanVerdict};
use neoscan_domain_models::fingerprint::{PortScanParams, PortServiceResult};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Rango de puertos por defecto cuando la tarea no lo fija.
const DEFAULT_PORT_RANGE: &str = "1-1024";

/**
 * Punto de entrada registrado en la tabla de herramientas.
 */
pub fn execute_port_service_scan(
    execution_context: ToolExecutionContext,
) -> BoxFuture<'static, anyhow::Result<Value>> {
    Box::pin(async move {
        let scan_results = run_port_scan(execution_context).await?;
        Ok(serde_json::to_value(scan_results)?)
    })
}

/**
 * Expande una lista de puertos con elementos sueltos y rangos con
 * guión ("22,80,8000-8100") a una lista ordenada y deduplicada.
 *
 * # Errors:
 * Fragmentos no numéricos o rangos invertidos abortan la expansión.
 */
pub fn expand_port_ranges(raw_port_list: &str) -> anyhow::Result<Vec<u16>> {
    let mut expanded_ports: Vec<u16> = Vec::new();

    for fragment in raw_port_list.split(',') {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }

        if let Some((range_start, range_end)) = fragment.split_once('-') {
            let start_port = range_start.trim().parse::<u16>()?;
            let end_port = range_end.trim().parse::<u16>()?;
            if start_port > end_port || start_port == 0 {
                anyhow::bail!("rango de puertos invertido o nulo: '{}'", fragment);
            }
            expanded_ports.extend(start_port..=end_port);
        } else {
            let single_port = fragment.parse::<u16>()?;
            if single_port == 0 {
                anyhow::bail!("el puerto 0 no es sondeable");
            }
            expanded_ports.push(single_port);
        }
    }

    expanded_ports.sort_unstable();
    expanded_ports.dedup();

    if expanded_ports.is_empty() {
        anyhow::bail!("lista de puertos vacía");
    }
    Ok(expanded_ports)
}

/**
 * Barrido completo: expansión, ráfaga acotada, liveness y huellas.
 */
#[instrument(skip(execution_context), fields(target = %execution_context.task.input_target))]
async fn run_port_scan(
    execution_context: ToolExecutionContext,
) -> anyhow::Result<Vec<PortServiceResult>> {
    let scan_params: PortScanParams =
        serde_json::from_value(execution_context.task.tool_params.clone())
            .unwrap_or(PortScanParams {
                service_detect: false,
                rate: None,
                ports: None,
            });

    let port_inventory = expand_port_ranges(
        scan_params
            .ports
            .as_deref()
            .unwrap_or(DEFAULT_PORT_RANGE),
    )?;

    let permit_count = scan_params
        .rate
        .unwrap_or(execution_context.default_rate)
        .max(1) as usize;
    let dial_semaphore = Arc::new(Semaphore::new(permit_count));

    info!(
        "🔭 [PORT_SCANNER]: Sweeping {} ports on {} ({} permits).",
        port_inventory.len(),
        execution_context.task.input_target,
        permit_count
    );

    let target_host = execution_context.task.input_target.clone();
    let mut probe_futures = Vec::with_capacity(port_inventory.len());

    for target_port in port_inventory {
        let semaphore_handle = Arc::clone(&dial_semaphore);
        let context_handle = execution_context.clone();
        let host_handle = target_host.clone();

        probe_futures.push(tokio::spawn(async move {
            // Cancelación cooperativa: el trabajo pendiente se abandona.
            if context_handle.termination_signal.load(Ordering::Relaxed)
                || Instant::now() >= context_handle.deadline
            {
                return None;
            }

            let Ok(_dial_permit) = semaphore_handle.acquire().await else {
                return None;
            };

            probe_single_port(&context_handle, &host_handle, target_port).await
        }));
    }

    let mut open_port_results: Vec<PortServiceResult> = Vec::new();
    for probe_future in probe_futures {
        if let Ok(Some(port_result)) = probe_future.await {
            open_port_results.push(port_result);
        }
    }

    open_port_results.sort_by_key(|result| result.port);
    info!(
        "🔭 [PORT_SCANNER]: {} open ports crystallized on {}.",
        open_port_results.len(),
        target_host
    );
    Ok(open_port_results)
}

/**
 * Liveness de un puerto individual con huella opcional.
 * Un fallo de conexión significa cerrado/filtrado: sin entrada.
 */
async fn probe_single_port(
    execution_context: &ToolExecutionContext,
    target_host: &str,
    target_port: u16,
) -> Option<PortServiceResult> {
    match execution_context
        .dialer
        .dial(target_host, target_port, execution_context.deadline)
        .await
    {
        Ok(established_stream) => {
            // El stream de liveness se descarta: la identificación abre
            // sus propias conexiones por sonda.
            drop(established_stream);
            debug!("🟢 [PORT_SCANNER]: {}:{} open.", target_host, target_port);
        }
        Err(_closed_or_filtered) => return None,
    }

    let service_detect_enabled = execution_context.task.tool_params["service_detect"]
        .as_bool()
        .unwrap_or(false);

    let crystallized_fingerprint = if service_detect_enabled {
        match current_database() {
            Some(probe_database) => {
                match identify_service(
                    &execution_context.dialer,
                    &probe_database,
                    target_host,
                    target_port,
                    &execution_context.probe_config,
                    execution_context.deadline,
                )
                .await
                {
                    Ok(ScanVerdict::Identified(fingerprint)) => Some(fingerprint),
                    Ok(ScanVerdict::NotIdentified { soft_service }) => {
                        if let Some(family) = soft_service {
                            debug!(
                                "🔎 [PORT_SCANNER]: {}:{} soft family '{}' without seal.",
                                target_host, target_port, family
                            );
                        }
                        None
                    }
                    Err(identification_fault) => {
                        debug!(
                            "⚠️ [PORT_SCANNER]: Identification aborted on {}:{}: {}",
                            target_host, target_port, identification_fault
                        );
                        None
                    }
                }
            }
            None => {
                warn!("⚠️ [PORT_SCANNER]: Probe database unloaded; liveness only.");
                None
            }
        }
    } else {
        None
    };

    Some(PortServiceResult {
        host: target_host.to_string(),
        port: target_port,
        protocol: "tcp".to_string(),
        state: "open".to_string(),
        fingerprint: crystallized_fingerprint,
    })
}
