// [tests/mirror/apps/agent/port_expansion.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE EXPANSIÓN DE PUERTOS (V3.0 - RANGES)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL PARSER DE LISTAS Y RANGOS
 * =================================================================
 */

use neoscan_agent_lib::tools::port_service::expand_port_ranges;

#[test]
fn certify_mixed_list_and_range_expansion() {
    println!("\n🔢 [INICIO]: Auditoría de expansión de rangos de puertos...");

    let expanded = expand_port_ranges("22,80,8000-8003").unwrap();
    assert_eq!(expanded, vec![22, 80, 8000, 8001, 8002, 8003]);

    // Orden y deduplicación son deterministas.
    let unordered = expand_port_ranges("443,22,80,22,80-82").unwrap();
    assert_eq!(unordered, vec![22, 80, 81, 82, 443]);

    // Espacios y fragmentos vacíos se toleran.
    let padded = expand_port_ranges(" 22 , , 80 ").unwrap();
    assert_eq!(padded, vec![22, 80]);

    println!("   ✅ Expansión determinista certificada.");
}

#[test]
fn certify_degenerate_inputs_are_rejected() {
    // Rango invertido.
    assert!(expand_port_ranges("9000-8000").is_err());
    // Puerto 0 jamás es sondeable.
    assert!(expand_port_ranges("0").is_err());
    assert!(expand_port_ranges("0-10").is_err());
    // Fragmentos no numéricos.
    assert!(expand_port_ranges("http").is_err());
    assert!(expand_port_ranges("22,abc").is_err());
    // Lista efectivamente vacía.
    assert!(expand_port_ranges(" , ,").is_err());
    // Desborde de u16.
    assert!(expand_port_ranges("70000").is_err());
}

#[test]
fn certify_full_sweep_boundaries() {
    let full_sweep = expand_port_ranges("1-65535").unwrap();
    assert_eq!(full_sweep.len(), 65535);
    assert_eq!(full_sweep[0], 1);
    assert_eq!(*full_sweep.last().unwrap(), 65535);
}
