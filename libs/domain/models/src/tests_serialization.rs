// [libs/domain/models/src/tests_serialization.rs]
/**
 * =================================================================
 * APARATO: DOMAIN SERIALIZATION TEST (V2.0 - INTEGRATION LEVEL)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-MODELS)
 * RESPONSABILIDAD: CERTIFICACIÓN DE PARIDAD JSON DE CONTRATOS DE FLOTA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. WIRE PARITY: Los discriminadores serde de estados y categorías son
 *    parte del protocolo Master<->Agente; cualquier deriva rompe la flota.
 * 2. METRIC SANITY: La validación de rangos [0,100] se certifica junto
 *    al contrato para que los handlers hereden la garantía.
 * =================================================================
 */
