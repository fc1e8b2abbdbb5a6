//! Shared helpers that don't belong to any single component.

/// Parse a `host` or `host:port` inventory field, defaulting to port 161.
pub fn split_host_port(host: &str) -> anyhow::Result<(String, u16)> {
    match host.rsplit_once(':') {
        Some((h, p)) => {
            let port: u16 = p.parse().map_err(|_| anyhow::anyhow!("invalid port in '{}'", host))?;
            if port == 0 {
                anyhow::bail!("port 0 is not valid in '{}'", host);
            }
            Ok((h.to_string(), port))
        }
        None => Ok((host.to_string(), 161)),
    }
}

/// Format uptime ticks (hundredths of a second) into human-readable string.
pub fn format_uptime(ticks: i64) -> String {
    let seconds = ticks / 100;
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 365 {
        let years = days / 365;
        let remaining_days = days % 365;
        format!("{} year{} {} day{} {:02}:{:02}:{:02}",
            years, if years != 1 { "s" } else { "" },
            remaining_days, if remaining_days != 1 { "s" } else { "" },
            hours, minutes, secs)
    } else if days > 0 {
        format!("{} day{} {:02}:{:02}:{:02}",
            days, if days != 1 { "s" } else { "" },
            hours, minutes, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}
