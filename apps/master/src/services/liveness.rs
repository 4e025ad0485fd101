// [apps/master/src/services/liveness.rs]
/*!
 * =================================================================
 * APARATO: FLEET LIVENESS REAPER (V4.1 - VITALITY SWEEP)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: SELLADO 'offline' POR SILENCIO Y PURGA DE RADAR
 *
 * # Logic:
 * Cada tick evalúa now − last_heartbeat > umbral ⇒ offline; la
 * transición se registra en el rastro y no emite error visible al
 * usuario. El radar de RAM se purga con una ventana más generosa.
 * =================================================================
 */

use crate::state::AppState;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

/// Ventana extra del radar de RAM respecto del umbral durable.
const RADAR_RETENTION_MULTIPLIER: i64 = 3;

/**
 * Inicia el daemon de vitalidad de la flota en el runtime de Tokio.
 */
pub fn spawn_liveness_daemon(application_state: AppState) {
    let liveness_timeout = application_state.config.liveness_timeout_seconds.max(1);
    let sweep_interval = Duration::from_secs((liveness_timeout as u64 / 3).max(1));

    tokio::spawn(async move {
        let mut vitality_ticker = interval(sweep_interval);
        info!("💀 [REAPER_ACTIVE]: Fleet vitality daemon initiated ({}s threshold).", liveness_timeout);

        loop {
            vitality_ticker.tick().await;

            // 1. SELLADO DURABLE: silencio de latidos => offline.
            match application_state
                .agent_repository
                .mark_stale_offline(liveness_timeout)
                .await
            {
                Ok(silenced_units) if !silenced_units.is_empty() => {
                    warn!(
                        "💀 [REAPER_FLEET]: {} units sealed offline: {:?}",
                        silenced_units.len(),
                        silenced_units
                    );
                }
                Ok(_) => {}
                Err(sweep_fault) => {
                    // El fallo aborta la iteración, jamás el daemon.
                    error!("❌ [REAPER_FAULT]: Vitality sweep collapsed: {}", sweep_fault);
                }
            }

            // 2. PURGA DEL RADAR DE RAM (ventana generosa).
            let purged_pulses = application_state
                .fleet_telemetry
                .prune_stale(liveness_timeout * RADAR_RETENTION_MULTIPLIER);
            if purged_pulses > 0 {
                info!("💀 [REAPER_RADAR]: Evicted {} stale pulses from memory.", purged_pulses);
            }
        }
    });
}
