// [libs/infra/agent-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN MASTER UPLINK (V3.4 - FLEET LINK)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: NEGOCIACIÓN DE REGISTRO, LATIDOS Y COLA DE TAREAS
 *
 * VISION HIPER-HOLÍSTICA:
 * Implementa el túnel de comunicación asíncrono entre el nodo de
 * escaneo y el centro de mando. Todos los payloads viajan en el sobre
 * uniforme del Master; los códigos de estado se proyectan al catálogo
 * semántico de fallos (409 -> AlreadyRegistered, 404 -> UnknownAgent).
 * =================================================================
 */

use crate::errors::UplinkError;
use neoscan_domain_models::agent::{
    AgentRegistrationReceipt, AgentRegistrationRequest, HeartbeatSignal,
};
use neoscan_domain_models::api::ApiEnvelope;
use neoscan_domain_models::fingerprint::SnapshotDescriptor;
use neoscan_domain_models::task::{AgentTask, TaskResultReport};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

/// Cabecera fuera de banda que transporta la firma HMAC del bundle.
pub const SIGNATURE_HEADER: &str = "X-Content-Signature";

pub struct MasterClient {
    network_session_client: Client,
    master_base_endpoint: String,
}

impl MasterClient {
    /**
     * Inicializa el cliente de red con identidad de agente y timeouts.
     *
     * @param base_url Endpoint raíz del Master.
     * @param agent_version Versión del nodo para el User-Agent.
     */
    pub fn new(base_url: String, agent_version: &str) -> Self {
        Self {
            network_session_client: Client::builder()
                .user_agent(format!("NeoScan-Agent/{}", agent_version))
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("FATAL: Client initialization failed."),
            master_base_endpoint: base_url.trim_end_matches('/').to_string(),
        }
    }

    /**
     * Alta del nodo en el registro de flota.
     *
     * # Errors:
     * - `UplinkError::AlreadyRegistered`: El par (hostname, port) ya existe.
     * - `UplinkError::ServerRejection`: Capacidad inválida u otro rechazo.
     */
    #[instrument(skip(self, registration_request), fields(hostname = %registration_request.hostname))]
    pub async fn register(
        &self,
        registration_request: &AgentRegistrationRequest,
    ) -> Result<AgentRegistrationReceipt, UplinkError> {
        let target_url = format!("{}/api/v1/agent/register", self.master_base_endpoint);
        let network_response = self
            .network_session_client
            .post(&target_url)
            .json(registration_request)
            .send()
            .await?;

        match network_response.status() {
            StatusCode::OK => {
                let receipt = unwrap_envelope::<AgentRegistrationReceipt>(network_response).await?;
                info!("🛰️ [UPLINK]: Node enlisted as {}.", receipt.agent_id);
                Ok(receipt)
            }
            StatusCode::CONFLICT => Err(UplinkError::AlreadyRegistered),
            other_status => Err(UplinkError::ServerRejection(format!("HTTP_{}", other_status))),
        }
    }

    /**
     * Emisión de un pulso de vida con métricas adjuntas.
     */
    #[instrument(skip(self, heartbeat_signal), fields(agent = %heartbeat_signal.agent_id))]
    pub async fn send_heartbeat(
        &self,
        heartbeat_signal: &HeartbeatSignal,
    ) -> Result<(), UplinkError> {
        let target_url = format!("{}/api/v1/agent/heartbeat", self.master_base_endpoint);
        let network_response = self
            .network_session_client
            .post(&target_url)
            .json(heartbeat_signal)
            .send()
            .await?;

        match network_response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(UplinkError::UnknownAgent),
            other_status => Err(UplinkError::ServerRejection(format!("HTTP_{}", other_status))),
        }
    }

    /**
     * Drena la cola de tareas despachadas a este nodo.
     */
    #[instrument(skip(self))]
    pub async fn pull_task_queue(&self, agent_id: &str) -> Result<Vec<AgentTask>, UplinkError> {
        let target_url = format!("{}/api/v1/agent/{}/tasks", self.master_base_endpoint, agent_id);
        let network_response = self.network_session_client.get(&target_url).send().await?;

        match network_response.status() {
            StatusCode::OK => {
                let task_queue = unwrap_envelope::<Vec<AgentTask>>(network_response).await?;
                if !task_queue.is_empty() {
                    debug!("📥 [UPLINK]: {} tasks drained from queue.", task_queue.len());
                }
                Ok(task_queue)
            }
            StatusCode::NOT_FOUND => Err(UplinkError::UnknownAgent),
            other_status => Err(UplinkError::ServerRejection(format!("HTTP_{}", other_status))),
        }
    }

    /**
     * Reporta el resultado final de una tarea ejecutada.
     */
    #[instrument(skip(self, result_report), fields(task = %result_report.task_id))]
    pub async fn report_task_result(
        &self,
        result_report: &TaskResultReport,
    ) -> Result<(), UplinkError> {
        let target_url = format!(
            "{}/api/v1/task/{}/result",
            self.master_base_endpoint, result_report.task_id
        );
        let network_response = self
            .network_session_client
            .post(&target_url)
            .json(result_report)
            .send()
            .await?;

        if network_response.status().is_success() {
            Ok(())
        } else {
            Err(UplinkError::ServerRejection(format!(
                "HTTP_{}",
                network_response.status()
            )))
        }
    }

    /**
     * Metadatos de versión del snapshot sin transferir bytes.
     */
    pub async fn fetch_snapshot_descriptor(&self) -> Result<SnapshotDescriptor, UplinkError> {
        let target_url = format!(
            "{}/agent-update/fingerprint/version",
            self.master_base_endpoint
        );
        let network_response = self.network_session_client.get(&target_url).send().await?;

        if network_response.status() == StatusCode::OK {
            unwrap_envelope::<SnapshotDescriptor>(network_response).await
        } else {
            Err(UplinkError::ServerRejection(format!(
                "HTTP_{}",
                network_response.status()
            )))
        }
    }

    /**
     * Descarga el bundle firmado: bytes + firma fuera de banda.
     */
    #[instrument(skip(self))]
    pub async fn download_snapshot_bundle(&self) -> Result<(Vec<u8>, String), UplinkError> {
        let target_url = format!(
            "{}/agent-update/fingerprint/download",
            self.master_base_endpoint
        );
        let network_response = self.network_session_client.get(&target_url).send().await?;

        if network_response.status() != StatusCode::OK {
            return Err(UplinkError::ServerRejection(format!(
                "HTTP_{}",
                network_response.status()
            )));
        }

        let bundle_signature = network_response
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|header_value| header_value.to_str().ok())
            .map(|signature| signature.to_string())
            .ok_or_else(|| {
                UplinkError::ServerRejection("SIGNATURE_HEADER_ABSENT".to_string())
            })?;

        let bundle_bytes = network_response.bytes().await?.to_vec();
        debug!("📦 [UPLINK]: Bundle of {} bytes received.", bundle_bytes.len());
        Ok((bundle_bytes, bundle_signature))
    }
}

/// Desempaqueta el sobre uniforme del Master extrayendo 'data'.
async fn unwrap_envelope<T: DeserializeOwned>(
    network_response: reqwest::Response,
) -> Result<T, UplinkError> {
    let envelope = network_response.json::<ApiEnvelope<T>>().await?;
    if envelope.status != "success" {
        return Err(UplinkError::ServerRejection(envelope.message));
    }
    envelope
        .data
        .ok_or_else(|| UplinkError::EnvelopeVoid(envelope.message))
}
