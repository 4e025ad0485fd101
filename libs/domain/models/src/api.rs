// [libs/domain/models/src/api.rs]
/*!
 * =================================================================
 * APARATO: UNIFORM API ENVELOPE (V2.0 - PANOPTICON CONTRACT)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: SOBRE DE RESPUESTA UNIFORME Y MATEMÁTICA DE PAGINACIÓN
 *
 * # Logic:
 * Toda respuesta del Master viaja en el mismo sobre:
 * {code, status ∈ {"success","failed"}, message, data?, error?}.
 * Las listas incluyen además un objeto 'pagination' determinista.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Sobre de transporte uniforme de todas las respuestas del Master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Código estable legible por máquina (espejo del HTTP status).
    pub code: u16,
    /// "success" o "failed".
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn success(code: u16, message: impl Into<String>, data: T) -> Self {
        Self {
            code,
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(code: u16, message: impl Into<String>, error_detail: impl Into<String>) -> Self {
        Self {
            code,
            status: "failed".to_string(),
            message: message.into(),
            data: None,
            error: Some(error_detail.into()),
        }
    }
}

/// Objeto de paginación adjunto a toda respuesta de listado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    /**
     * Calcula el objeto de paginación para un total y una ventana dados.
     * Un page_size de 0 se normaliza a 1 para evitar división por cero.
     */
    pub fn compute(total: u64, page: u32, page_size: u32) -> Self {
        let effective_page_size = page_size.max(1);
        let effective_page = page.max(1);
        let total_pages = (total.div_ceil(effective_page_size as u64)).max(1) as u32;

        Self {
            page: effective_page,
            page_size: effective_page_size,
            total,
            total_pages,
            has_next: effective_page < total_pages,
            has_previous: effective_page > 1,
        }
    }

    /// Desplazamiento SQL (filas a saltar) para la ventana actual.
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }
}

/// Página de elementos con su objeto de paginación.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
