//! Plain-text rendering of daemon replies for the terminal.

use chrono::{Local, TimeZone, Utc};
use rf_core::{BlockLogEntry, Millis, ScheduledRedirect, TimerStatus};
use rf_protocol::DaemonMessage;

/// `m:ss`, or `h:mm:ss` from one hour up. Negative input renders as zero.
pub fn duration_ms(ms: i64) -> String {
    let total = ms.max(0) / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

pub fn timer_line(status: &TimerStatus) -> String {
    let state = if status.paused { "paused" } else { "running" };
    format!(
        "{:<30} {:>9} left  {:>9} used of {:<9} {state}",
        status.domain.as_str(),
        duration_ms(status.remaining_ms),
        duration_ms(status.elapsed_ms),
        duration_ms(status.time_limit_ms),
    )
}

pub fn log_line(entry: &BlockLogEntry) -> String {
    let when = entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    let mut line = format!("{when}  {:<10} {}", entry.kind.label(), entry.url);
    if let Some(keyword) = &entry.keyword {
        line.push_str(&format!("  [{keyword}]"));
    }
    if let Some(secs) = entry.elapsed_secs {
        line.push_str(&format!("  ({} spent)", duration_ms(secs.saturating_mul(1000))));
    }
    line
}

/// Renders an epoch-millisecond instant in local time.
pub fn local_time(ms: Millis) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(at) => at.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}

pub fn scheduled_line(redirect: &ScheduledRedirect) -> String {
    let tab = redirect
        .tab_id
        .map(|t| format!("tab {t}"))
        .unwrap_or_else(|| "focused tab".to_string());
    format!(
        "#{:<5} {}  {:<12} -> {}",
        redirect.id,
        local_time(redirect.fire_at),
        tab,
        redirect.target
    )
}

/// One line per broadcast for `rf watch`. `None` for messages not worth showing.
pub fn broadcast_line(message: &DaemonMessage) -> Option<String> {
    match message {
        DaemonMessage::TimerExpired {
            domain,
            elapsed_secs,
            cooldown_until,
        } => Some(format!(
            "expired   {} after {}, cooling down until {}",
            domain,
            duration_ms(elapsed_secs.saturating_mul(1000)),
            local_time(*cooldown_until)
        )),
        DaemonMessage::Blocked { entry } => Some(format!("blocked   {}", log_line(entry))),
        DaemonMessage::RedirectTab { tab_id, url } => Some(format!("redirect  tab {tab_id} -> {url}")),
        DaemonMessage::SetBadge { text } if text.is_empty() => Some("badge     cleared".to_string()),
        DaemonMessage::SetBadge { text } => Some(format!("badge     {text}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::{BlockKind, Domain, TabId};

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(0), "0:00");
        assert_eq!(duration_ms(59_999), "0:59");
        assert_eq!(duration_ms(61_000), "1:01");
        assert_eq!(duration_ms(3_725_000), "1:02:05");
        assert_eq!(duration_ms(-5_000), "0:00");
    }

    #[test]
    fn test_timer_line() {
        let status = TimerStatus {
            domain: Domain::parse("example.com").unwrap(),
            remaining_ms: 30_000,
            elapsed_ms: 30_000,
            time_limit_ms: 60_000,
            paused: true,
        };
        let line = timer_line(&status);
        assert!(line.starts_with("example.com"));
        assert!(line.contains("0:30 left"));
        assert!(line.ends_with("paused"));
    }

    #[test]
    fn test_log_line_includes_time_spent() {
        let entry = BlockLogEntry::new("https://example.com/", BlockKind::TimeLimit, Utc::now())
            .with_elapsed_secs(90);
        let line = log_line(&entry);
        assert!(line.contains("https://example.com/"));
        assert!(line.contains("(1:30 spent)"));
    }

    #[test]
    fn test_log_line_names_keyword() {
        let entry = BlockLogEntry::new("https://www.google.com/search?q=x", BlockKind::Keyword, Utc::now())
            .with_keyword("celebrity");
        assert!(log_line(&entry).ends_with("[celebrity]"));
    }

    #[test]
    fn test_broadcast_lines() {
        let redirect = DaemonMessage::redirect_tab(TabId::new(3), "about:blank");
        assert_eq!(
            broadcast_line(&redirect).as_deref(),
            Some("redirect  tab 3 -> about:blank")
        );
        assert_eq!(
            broadcast_line(&DaemonMessage::set_badge("")).as_deref(),
            Some("badge     cleared")
        );
        assert!(broadcast_line(&DaemonMessage::pong(1)).is_none());
    }
}
