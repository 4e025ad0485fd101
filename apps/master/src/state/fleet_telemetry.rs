// [apps/master/src/state/fleet_telemetry.rs]
/*!
 * =================================================================
 * APARATO: FLEET TELEMETRY MANAGER (V4.0 - PANOPTICON STATE)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: MEMORIA A CORTO PLAZO DE LATIDOS DE LA FLOTA
 *
 * # Logic:
 * El radar retiene la última señal de cada nodo para consultas de
 * estado sin tocar el motor durable. El daemon de vitalidad purga
 * periódicamente las señales vencidas.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use neoscan_domain_models::agent::HeartbeatSignal;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Señal viva retenida en el radar con su marca de recepción.
#[derive(Debug, Clone)]
pub struct LivePulse {
    pub signal: HeartbeatSignal,
    pub received_at: DateTime<Utc>,
}

pub struct FleetTelemetryManager {
    live_pulses: RwLock<HashMap<String, LivePulse>>,
}

impl Default for FleetTelemetryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetTelemetryManager {
    pub fn new() -> Self {
        Self {
            live_pulses: RwLock::new(HashMap::with_capacity(256)),
        }
    }

    pub fn synchronize_heartbeat(&self, signal: HeartbeatSignal) {
        let mut radar_guard = self
            .live_pulses
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!("📡 [TELEMETRY]: Pulse sync for unit [{}].", signal.agent_id);
        radar_guard.insert(
            signal.agent_id.clone(),
            LivePulse {
                signal,
                received_at: Utc::now(),
            },
        );
    }

    /// Instantánea completa del radar para el panóptico de flota.
    pub fn fleet_snapshot(&self) -> Vec<LivePulse> {
        let radar_guard = self
            .live_pulses
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        radar_guard.values().cloned().collect()
    }

    /// Purga señales con silencio superior al umbral. Retorna purgadas.
    pub fn prune_stale(&self, expiration_seconds: i64) -> usize {
        let mut radar_guard = self
            .live_pulses
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let expiration_threshold = Utc::now() - chrono::Duration::seconds(expiration_seconds);
        let before_count = radar_guard.len();
        radar_guard.retain(|_, pulse| pulse.received_at > expiration_threshold);
        before_count - radar_guard.len()
    }
}
