use serde::Serialize;

/// Point-in-time CPU and memory state. Zeroed/empty fields mean "sensor
/// unavailable".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuSnapshot {
    pub model: String,
    pub cores: usize,
    pub average_frequency_mhz: u32,
    pub governor: String,
    pub smt_enabled: bool,
    pub utilization_pct: f64,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
}

/// Sample CPU state from procfs/sysfs. Every source degrades independently.
pub fn sample() -> CpuSnapshot {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let model = std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|s| parse_model_name(&s))
        .unwrap_or_default();

    let governor = read_trimmed("/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor");
    let smt_enabled = read_trimmed("/sys/devices/system/cpu/smt/active") == "1";

    let (memory_used_mb, memory_total_mb) = std::fs::read_to_string("/proc/meminfo")
        .ok()
        .map(|s| parse_meminfo(&s))
        .unwrap_or_default();

    let utilization_pct = std::fs::read_to_string("/proc/loadavg")
        .ok()
        .and_then(|s| parse_load_utilization(&s, cores))
        .unwrap_or_default();

    CpuSnapshot {
        model,
        cores,
        average_frequency_mhz: average_frequency(cores),
        governor,
        smt_enabled,
        utilization_pct,
        memory_used_mb,
        memory_total_mb,
    }
}

fn read_trimmed(path: &str) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Mean of the per-core `scaling_cur_freq` values (kHz in sysfs), in MHz.
fn average_frequency(cores: usize) -> u32 {
    let mut total: u64 = 0;
    let mut counted: u64 = 0;
    for i in 0..cores {
        let path = format!("/sys/devices/system/cpu/cpu{i}/cpufreq/scaling_cur_freq");
        if let Ok(khz) = std::fs::read_to_string(&path)
            .map(|s| s.trim().parse::<u64>().unwrap_or(0))
        {
            if khz > 0 {
                total += khz / 1000;
                counted += 1;
            }
        }
    }
    if counted == 0 {
        0
    } else {
        (total / counted) as u32
    }
}

/// First `model name` entry from `/proc/cpuinfo`.
fn parse_model_name(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|line| line.starts_with("model name"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string())
}

/// (used, total) in MiB from `/proc/meminfo`; used is total minus available.
fn parse_meminfo(meminfo: &str) -> (u64, u64) {
    let mut total_kb: u64 = 0;
    let mut available_kb: u64 = 0;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total_kb = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available_kb = parse_kb(rest);
        }
    }
    let total_mb = total_kb / 1024;
    let used_mb = total_mb.saturating_sub(available_kb / 1024);
    (used_mb, total_mb)
}

fn parse_kb(rest: &str) -> u64 {
    rest.trim()
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Load-average-based utilization approximation: one-minute load over core
/// count, as a percentage clamped to 100.
fn parse_load_utilization(loadavg: &str, cores: usize) -> Option<f64> {
    let load1: f64 = loadavg.split_whitespace().next()?.parse().ok()?;
    let pct = load1 / cores.max(1) as f64 * 100.0;
    Some(pct.min(100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPUINFO: &str = "processor\t: 0\nvendor_id\t: AuthenticAMD\n\
model name\t: AMD Ryzen 7 5800X3D 8-Core Processor\nflags\t: fpu vme\n\
processor\t: 1\nmodel name\t: AMD Ryzen 7 5800X3D 8-Core Processor\n";

    #[test]
    fn model_name_comes_from_first_entry() {
        assert_eq!(
            parse_model_name(CPUINFO).as_deref(),
            Some("AMD Ryzen 7 5800X3D 8-Core Processor")
        );
        assert!(parse_model_name("no such field\n").is_none());
    }

    #[test]
    fn meminfo_used_is_total_minus_available() {
        let meminfo = "MemTotal:       32768000 kB\nMemFree:         1024000 kB\n\
MemAvailable:   16384000 kB\nBuffers:          512000 kB\n";
        let (used, total) = parse_meminfo(meminfo);
        assert_eq!(total, 32000);
        assert_eq!(used, 16000);
    }

    #[test]
    fn meminfo_degrades_to_zero() {
        assert_eq!(parse_meminfo("garbage\n"), (0, 0));
    }

    #[test]
    fn load_utilization_is_normalized_and_clamped() {
        assert_eq!(parse_load_utilization("4.00 3.50 3.00 2/800 12345", 8), Some(50.0));
        assert_eq!(parse_load_utilization("32.0 30.0 28.0 5/900 999", 8), Some(100.0));
        assert!(parse_load_utilization("not-a-load", 8).is_none());
    }

    #[test]
    fn sample_is_total() {
        let snap = sample();
        assert!(snap.cores >= 1);
    }
}
