//! `/proc` sampling for resident memory and CPU time.

use appshare_common::DisplayError;
use std::time::Duration;

use crate::Result;

fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

fn clock_ticks() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as u64
    } else {
        100
    }
}

pub(crate) async fn resident_bytes(pid: u32) -> Result<u64> {
    let statm = tokio::fs::read_to_string(format!("/proc/{pid}/statm")).await?;
    parse_statm_resident(&statm)
        .map(|pages| pages * page_size())
        .ok_or_else(|| DisplayError::ToolFailed(format!("malformed /proc/{pid}/statm")))
}

pub(crate) async fn cpu_ticks(pid: u32) -> Result<u64> {
    let stat = tokio::fs::read_to_string(format!("/proc/{pid}/stat")).await?;
    parse_stat_cpu_ticks(&stat)
        .ok_or_else(|| DisplayError::ToolFailed(format!("malformed /proc/{pid}/stat")))
}

pub(crate) fn cpu_percent(prev_ticks: u64, ticks: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    let used = ticks.saturating_sub(prev_ticks) as f64 / clock_ticks() as f64;
    used / secs * 100.0
}

/// Second field of `statm`: resident pages.
fn parse_statm_resident(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

/// `utime + stime` from `stat`. The command name in field 2 may contain
/// spaces and parentheses, so fields are counted from the last `)`.
fn parse_stat_cpu_ticks(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // rest starts at field 3 (state); utime is field 14, stime field 15.
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statm_resident_field() {
        assert_eq!(parse_statm_resident("1000 250 30 1 0 100 0\n"), Some(250));
        assert_eq!(parse_statm_resident("garbage"), None);
    }

    #[test]
    fn stat_ticks_with_spaces_in_name() {
        let stat = "1234 (my (weird) app) S 1 1234 1234 0 -1 4194560 100 0 0 0 42 8 0 0 20 0 1 0 100 0 0";
        assert_eq!(parse_stat_cpu_ticks(stat), Some(50));
    }

    #[test]
    fn cpu_percent_of_one_core() {
        let hz = clock_ticks();
        let pct = cpu_percent(0, hz, Duration::from_secs(2));
        assert!((pct - 50.0).abs() < 1e-6);
        assert_eq!(cpu_percent(10, 5, Duration::from_secs(1)), 0.0);
    }

    #[tokio::test]
    async fn samples_own_process() {
        let pid = std::process::id();
        assert!(resident_bytes(pid).await.unwrap() > 0);
        assert!(cpu_ticks(pid).await.is_ok());
    }
}
