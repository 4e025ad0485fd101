// [libs/domain/rules/src/lib.rs]
/*!
 * =================================================================
 * APARATO: RULE EVALUATION LIBRARY ROOT (V2.0 - SCOPE GUARDIAN)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: EVALUACIÓN PURA DE POLÍTICAS Y REGLAS DE COINCIDENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PURE EVALUATION: Este estrato no toca red ni persistencia; recibe
 *    reglas hidratadas y objetivos, y emite veredictos deterministas.
 * 2. DUAL CONSUMERS: El ejecutor de políticas del Master (C6) y el motor
 *    de auto-etiquetado (C9) consumen los mismos operadores.
 * =================================================================
 */

/// Operadores de condición sobre mapas de atributos de entidades.
pub mod condition;
/// Coincidencia de objetivos contra reglas de lista blanca.
pub mod target_match;
