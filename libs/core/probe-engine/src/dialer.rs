// [libs/core/probe-engine/src/dialer.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN NETWORK DIALER (V3.2 - RATE SHIELD)
 * CLASIFICACIÓN: CORE ENGINE (ESTRATO L1)
 * RESPONSABILIDAD: APERTURA DE CONEXIONES CON PROXY, RÁFAGA Y PLAZOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TRANSPARENT PROXY: Cuando hay SOCKS5 configurado, el handshake
 *    CONNECT es transparente para el motor de sondas; el stream
 *    retornado es indistinguible de una conexión directa.
 * 2. GLOBAL RATE LIMITER: Un cubo de fichas compartido regula la tasa
 *    de aperturas de toda la flota de tareas del proceso.
 * 3. DEADLINE DISCIPLINE: Cada dial respeta el menor entre el timeout
 *    de conexión y el plazo global restante de la operación.
 * =================================================================
 */

use crate::errors::ProbeError;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, instrument};

/// Configuración inyectable del marcador de red.
#[derive(Debug, Clone)]
pub struct DialerConfig {
    /// Dirección "host:puerto" del proxy SOCKS5, si está configurado.
    pub socks5_proxy: Option<String>,
    /// Timeout de apertura de una conexión individual.
    pub connect_timeout: Duration,
    /// Aperturas de conexión por segundo permitidas (None = sin límite).
    pub rate_per_second: Option<u32>,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            socks5_proxy: None,
            connect_timeout: Duration::from_secs(5),
            rate_per_second: None,
        }
    }
}

/// Estado interno del cubo de fichas del limitador global.
struct TokenBucketState {
    available_tokens: f64,
    last_refill: Instant,
}

/// Limitador de ráfaga global por proceso.
struct TokenBucket {
    tokens_per_second: f64,
    state: Mutex<TokenBucketState>,
}

impl TokenBucket {
    fn new(tokens_per_second: u32) -> Self {
        Self {
            tokens_per_second: tokens_per_second.max(1) as f64,
            state: Mutex::new(TokenBucketState {
                available_tokens: tokens_per_second.max(1) as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /**
     * Adquiere una ficha, durmiendo lo mínimo necesario para respetar
     * la tasa configurada. El tope del cubo es un segundo de ráfaga.
     */
    async fn acquire(&self) {
        loop {
            let required_pause = {
                let mut bucket_state = self.state.lock().await;
                let elapsed_seconds = bucket_state.last_refill.elapsed().as_secs_f64();
                bucket_state.available_tokens = (bucket_state.available_tokens
                    + elapsed_seconds * self.tokens_per_second)
                    .min(self.tokens_per_second);
                bucket_state.last_refill = Instant::now();

                if bucket_state.available_tokens >= 1.0 {
                    bucket_state.available_tokens -= 1.0;
                    None
                } else {
                    let missing_tokens = 1.0 - bucket_state.available_tokens;
                    Some(Duration::from_secs_f64(
                        missing_tokens / self.tokens_per_second,
                    ))
                }
            };

            match required_pause {
                None => return,
                Some(pause_duration) => sleep(pause_duration).await,
            }
        }
    }
}

/// Marcador soberano compartido por todas las tareas de escaneo.
pub struct Dialer {
    configuration: DialerConfig,
    rate_limiter: Option<Arc<TokenBucket>>,
}

impl Dialer {
    pub fn new(configuration: DialerConfig) -> Self {
        let rate_limiter = configuration
            .rate_per_second
            .map(|tokens_per_second| Arc::new(TokenBucket::new(tokens_per_second)));
        Self {
            configuration,
            rate_limiter,
        }
    }

    /**
     * Abre una conexión TCP hacia el objetivo respetando el plazo global.
     *
     * # Errors:
     * - `ProbeError::DeadlineExceeded`: Plazo global agotado antes del dial.
     * - `ProbeError::ConnectionFault`: El objetivo rechazó la conexión.
     * - `ProbeError::ProxyHandshakeFault`: El proxy SOCKS5 negó el túnel.
     */
    #[instrument(skip(self), fields(target = %target_host, port = target_port))]
    pub async fn dial(
        &self,
        target_host: &str,
        target_port: u16,
        deadline: Instant,
    ) -> Result<TcpStream, ProbeError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let remaining_budget = deadline
            .checked_duration_since(Instant::now())
            .ok_or(ProbeError::DeadlineExceeded)?;
        let dial_budget = remaining_budget.min(self.configuration.connect_timeout);

        match &self.configuration.socks5_proxy {
            Some(proxy_address) => {
                self.dial_through_socks5(proxy_address, target_host, target_port, dial_budget)
                    .await
            }
            None => {
                let direct_endpoint = format!("{}:{}", target_host, target_port);
                timeout(dial_budget, TcpStream::connect(&direct_endpoint))
                    .await
                    .map_err(|_| ProbeError::DeadlineExceeded)?
                    .map_err(|connect_fault| {
                        ProbeError::ConnectionFault(connect_fault.to_string())
                    })
            }
        }
    }

    /**
     * Handshake SOCKS5 CONNECT (RFC 1928) sin autenticación.
     * El objetivo viaja como dominio (ATYP 0x03) para delegar el DNS
     * en el proxy, preservando el anonimato del nodo de escaneo.
     */
    async fn dial_through_socks5(
        &self,
        proxy_address: &str,
        target_host: &str,
        target_port: u16,
        dial_budget: Duration,
    ) -> Result<TcpStream, ProbeError> {
        let mut proxy_stream = timeout(dial_budget, TcpStream::connect(proxy_address))
            .await
            .map_err(|_| ProbeError::DeadlineExceeded)?
            .map_err(|connect_fault| ProbeError::ConnectionFault(connect_fault.to_string()))?;

        let handshake_exchange = async {
            // 1. Saludo: versión 5, un método, sin autenticación.
            proxy_stream.write_all(&[0x05, 0x01, 0x00]).await?;
            let mut greeting_reply = [0u8; 2];
            proxy_stream.read_exact(&mut greeting_reply).await?;
            if greeting_reply != [0x05, 0x00] {
                return Err(ProbeError::ProxyHandshakeFault(format!(
                    "método rechazado: {:02x?}",
                    greeting_reply
                )));
            }

            // 2. CONNECT con el objetivo como nombre de dominio.
            if target_host.len() > u8::MAX as usize {
                return Err(ProbeError::ProxyHandshakeFault(
                    "hostname excede 255 bytes".to_string(),
                ));
            }
            let mut connect_request =
                Vec::with_capacity(7 + target_host.len());
            connect_request.extend_from_slice(&[0x05, 0x01, 0x00, 0x03]);
            connect_request.push(target_host.len() as u8);
            connect_request.extend_from_slice(target_host.as_bytes());
            connect_request.extend_from_slice(&target_port.to_be_bytes());
            proxy_stream.write_all(&connect_request).await?;

            // 3. Respuesta: VER REP RSV ATYP + dirección de enlace variable.
            let mut reply_header = [0u8; 4];
            proxy_stream.read_exact(&mut reply_header).await?;
            if reply_header[1] != 0x00 {
                return Err(ProbeError::ProxyHandshakeFault(format!(
                    "CONNECT rechazado con código {:#04x}",
                    reply_header[1]
                )));
            }
            let bound_address_length = match reply_header[3] {
                0x01 => 4,
                0x03 => {
                    let mut domain_length = [0u8; 1];
                    proxy_stream.read_exact(&mut domain_length).await?;
                    domain_length[0] as usize
                }
                0x04 => 16,
                unknown_type => {
                    return Err(ProbeError::ProxyHandshakeFault(format!(
                        "ATYP desconocido {:#04x}",
                        unknown_type
                    )))
                }
            };
            let mut bound_address_discard = vec![0u8; bound_address_length + 2];
            proxy_stream.read_exact(&mut bound_address_discard).await?;

            Ok(())
        };

        timeout(dial_budget, handshake_exchange)
            .await
            .map_err(|_| ProbeError::DeadlineExceeded)??;

        debug!("🧦 [DIALER]: SOCKS5 tunnel sealed towards {}:{}.", target_host, target_port);
        Ok(proxy_stream)
    }
}
