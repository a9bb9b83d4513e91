// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of Kubernetes resource quantity strings.
//!
//! CPU quantities normalize to millicores, memory to MiB. Unknown suffixes
//! yield `None` rather than guessing.

/// Parses a CPU quantity ("250m", "1", "0.5") into millicores.
pub fn cpu_millis(quantity: &str) -> Option<f64> {
    let q = quantity.trim();
    if q.is_empty() {
        return None;
    }
    if let Some(stripped) = q.strip_suffix('m') {
        return stripped.parse::<f64>().ok();
    }
    // Nano-core values appear in the metrics API ("123456789n").
    if let Some(stripped) = q.strip_suffix('n') {
        return stripped.parse::<f64>().ok().map(|n| n / 1_000_000.0);
    }
    q.parse::<f64>().ok().map(|cores| cores * 1000.0)
}

/// Parses a memory quantity ("128Mi", "1Gi", "512Ki", "1000000") into MiB.
pub fn memory_mib(quantity: &str) -> Option<f64> {
    let q = quantity.trim();
    if q.is_empty() {
        return None;
    }
    let suffixes: [(&str, f64); 6] = [
        ("Ki", 1.0 / 1024.0),
        ("Mi", 1.0),
        ("Gi", 1024.0),
        ("Ti", 1024.0 * 1024.0),
        ("M", 1_000_000.0 / (1024.0 * 1024.0)),
        ("G", 1_000_000_000.0 / (1024.0 * 1024.0)),
    ];
    for (suffix, factor) in suffixes {
        if let Some(stripped) = q.strip_suffix(suffix) {
            return stripped.parse::<f64>().ok().map(|v| v * factor);
        }
    }
    // Plain bytes.
    q.parse::<f64>().ok().map(|b| b / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_parses_millicores_and_cores() {
        assert_eq!(cpu_millis("250m"), Some(250.0));
        assert_eq!(cpu_millis("1"), Some(1000.0));
        assert_eq!(cpu_millis("0.5"), Some(500.0));
        assert_eq!(cpu_millis("500000000n"), Some(500.0));
        assert_eq!(cpu_millis(""), None);
        assert_eq!(cpu_millis("abc"), None);
    }

    #[test]
    fn memory_parses_binary_and_decimal_suffixes() {
        assert_eq!(memory_mib("128Mi"), Some(128.0));
        assert_eq!(memory_mib("1Gi"), Some(1024.0));
        assert_eq!(memory_mib("1024Ki"), Some(1.0));
        let m = memory_mib("512M").unwrap();
        assert!((m - 488.28).abs() < 0.01, "got {m}");
        let bytes = memory_mib("1048576").unwrap();
        assert!((bytes - 1.0).abs() < f64::EPSILON);
        assert_eq!(memory_mib("12Qx"), None);
    }
}
