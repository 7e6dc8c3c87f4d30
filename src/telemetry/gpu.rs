use std::process::Command;

use serde::Serialize;
use tracing::debug;

/// Point-in-time GPU state. Zeroed fields mean "sensor unavailable".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpuSnapshot {
    pub name: String,
    pub driver_version: String,
    pub temperature_c: u32,
    pub power_draw_w: f64,
    pub power_limit_w: f64,
    pub utilization_pct: u32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub graphics_clock_mhz: u32,
    pub memory_clock_mhz: u32,
}

const QUERY_FIELDS: &str = "name,driver_version,temperature.gpu,power.draw,power.limit,\
utilization.gpu,memory.used,memory.total,clocks.gr,clocks.mem";

/// Sample the first GPU via `nvidia-smi`.
///
/// A missing binary, a non-zero exit, or malformed output all yield a default
/// snapshot; telemetry is advisory and must not error.
pub fn sample() -> GpuSnapshot {
    let output = match Command::new("nvidia-smi")
        .arg(format!("--query-gpu={QUERY_FIELDS}"))
        .arg("--format=csv,noheader,nounits")
        .output()
    {
        Ok(o) if o.status.success() => o,
        Ok(o) => {
            debug!("nvidia-smi exited with {}", o.status);
            return GpuSnapshot::default();
        }
        Err(e) => {
            debug!("nvidia-smi unavailable: {}", e);
            return GpuSnapshot::default();
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .map(parse_query_line)
        .unwrap_or_default()
}

/// Parse one CSV row of the query above. Fields that fail to parse (for
/// example `[N/A]` on power readings) stay at their zero value.
fn parse_query_line(line: &str) -> GpuSnapshot {
    let fields: Vec<&str> = line.split(", ").map(str::trim).collect();
    let field = |i: usize| fields.get(i).copied().unwrap_or_default();

    GpuSnapshot {
        name: field(0).to_string(),
        driver_version: field(1).to_string(),
        temperature_c: field(2).parse().unwrap_or_default(),
        power_draw_w: field(3).parse().unwrap_or_default(),
        power_limit_w: field(4).parse().unwrap_or_default(),
        utilization_pct: field(5).parse().unwrap_or_default(),
        memory_used_mb: field(6).parse().unwrap_or_default(),
        memory_total_mb: field(7).parse().unwrap_or_default(),
        graphics_clock_mhz: field(8).parse().unwrap_or_default(),
        memory_clock_mhz: field(9).parse().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_row() {
        let snap = parse_query_line(
            "NVIDIA GeForce RTX 4080, 550.54.14, 62, 210.45, 320.00, 97, 9874, 16376, 2655, 11201",
        );
        assert_eq!(snap.name, "NVIDIA GeForce RTX 4080");
        assert_eq!(snap.driver_version, "550.54.14");
        assert_eq!(snap.temperature_c, 62);
        assert_eq!(snap.power_draw_w, 210.45);
        assert_eq!(snap.utilization_pct, 97);
        assert_eq!(snap.memory_total_mb, 16376);
        assert_eq!(snap.memory_clock_mhz, 11201);
    }

    #[test]
    fn unavailable_sensors_degrade_to_zero() {
        let snap = parse_query_line("NVIDIA T400, 535.104, [N/A], [N/A], [N/A], 3, 512, 2048, [N/A], [N/A]");
        assert_eq!(snap.name, "NVIDIA T400");
        assert_eq!(snap.temperature_c, 0);
        assert_eq!(snap.power_draw_w, 0.0);
        assert_eq!(snap.utilization_pct, 3);
        assert_eq!(snap.memory_used_mb, 512);
    }

    #[test]
    fn short_row_fills_defaults() {
        let snap = parse_query_line("Some GPU");
        assert_eq!(snap.name, "Some GPU");
        assert_eq!(snap.memory_total_mb, 0);
    }

    #[test]
    fn sample_never_panics_without_a_gpu() {
        // On machines without nvidia-smi this exercises the fallback path.
        let _ = sample();
    }
}
