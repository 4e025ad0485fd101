// [apps/master/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: HANDLER ACCESS MATRIX (V4.1 - ENVELOPE DISCIPLINE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: SOBRE UNIFORME, MAPEO DE FALLOS Y PARSER DE QUERY
 *
 * # Logic:
 * Todo fallo de persistencia proyecta su variante al par
 * (StatusCode, sobre uniforme); los detalles internos viajan al
 * rastro estructurado, jamás al cliente.
 * =================================================================
 */

pub mod agent;
pub mod fingerprint;
pub mod project;
pub mod task;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use neoscan_domain_models::api::ApiEnvelope;
use neoscan_infra_db::StoreError;
use serde::Serialize;
use tracing::error;

/// Respuesta exitosa en el sobre uniforme.
pub fn envelope_ok<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiEnvelope::success(200, message, data)),
    )
        .into_response()
}

/// Respuesta de fallo en el sobre uniforme con código explícito.
pub fn envelope_failed(status: StatusCode, message: &str, detail: &str) -> Response {
    (
        status,
        Json(ApiEnvelope::<serde_json::Value>::failed(
            status.as_u16(),
            message,
            detail,
        )),
    )
        .into_response()
}

/// Proyección del catálogo de fallos de persistencia a HTTP.
pub fn store_fault_response(fault: StoreError) -> Response {
    let (status, message) = match &fault {
        StoreError::NotFound => (StatusCode::NOT_FOUND, "resource not found"),
        StoreError::AlreadyExists => (StatusCode::CONFLICT, "already exists"),
        StoreError::InvalidCapability(_) => (StatusCode::BAD_REQUEST, "invalid capability"),
        StoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid input"),
        StoreError::CasConflict => (StatusCode::CONFLICT, "state transition conflict"),
        StoreError::InvalidState => (StatusCode::CONFLICT, "invalid state transition"),
        StoreError::CycleRejected => (StatusCode::BAD_REQUEST, "cycle rejected"),
        _ => {
            error!("💥 [HANDLER_FAULT]: {}", fault);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal fault")
        }
    };
    envelope_failed(status, message, &fault.to_string())
}

/**
 * Parser de query string con soporte de claves repetidas y listas
 * separadas por coma (?tags=1,2&tags=3 => [1, 2, 3]).
 */
#[derive(Debug, Default)]
pub struct QueryMatrix {
    pairs: Vec<(String, String)>,
}

impl QueryMatrix {
    pub fn parse(raw_query: Option<&str>) -> Self {
        let mut pairs = Vec::new();
        if let Some(query_body) = raw_query {
            for fragment in query_body.split('&').filter(|fragment| !fragment.is_empty()) {
                let (key, value) = fragment.split_once('=').unwrap_or((fragment, ""));
                pairs.push((
                    percent_decode(key),
                    percent_decode(value),
                ));
            }
        }
        Self { pairs }
    }

    /// Primer valor escalar de una clave.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// Valores multi: claves repetidas y fragmentos separados por coma.
    pub fn multi(&self, key: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(candidate, _)| candidate == key)
            .flat_map(|(_, value)| value.split(','))
            .map(|fragment| fragment.trim().to_string())
            .filter(|fragment| !fragment.is_empty())
            .collect()
    }

    /// Ventana de paginación (page, page_size) con defaults sanos.
    pub fn pagination_window(&self) -> (u32, u32) {
        let page = self
            .scalar("page")
            .and_then(|raw| raw.parse::<u32>().ok())
            .unwrap_or(1)
            .max(1);
        let page_size = self
            .scalar("page_size")
            .and_then(|raw| raw.parse::<u32>().ok())
            .unwrap_or(20)
            .clamp(1, 200);
        (page, page_size)
    }
}

/// Decodificación percent mínima (%XX y '+') para valores de query.
fn percent_decode(raw_value: &str) -> String {
    let mut decoded = String::with_capacity(raw_value.len());
    let raw_bytes = raw_value.as_bytes();
    let mut cursor = 0usize;

    while cursor < raw_bytes.len() {
        match raw_bytes[cursor] {
            b'%' if cursor + 3 <= raw_bytes.len() => {
                // El acceso tolerante evita cortar un carácter multibyte.
                let decoded_byte = raw_value
                    .get(cursor + 1..cursor + 3)
                    .and_then(|hex_pair| u8::from_str_radix(hex_pair, 16).ok());
                match decoded_byte {
                    Some(byte_value) => {
                        decoded.push(byte_value as char);
                        cursor += 3;
                    }
                    None => {
                        decoded.push('%');
                        cursor += 1;
                    }
                }
            }
            b'+' => {
                decoded.push(' ');
                cursor += 1;
            }
            other_byte => {
                decoded.push(other_byte as char);
                cursor += 1;
            }
        }
    }

    decoded
}
