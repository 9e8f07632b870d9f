// src/chat/parser.rs
//! WhatsApp text-export parser.
//!
//! Handles the iOS (`[d/m/y, h:mm:ss] Name: text`) and Android
//! (`d/m/y, h:mm - Name: text`) layouts, 12h and 24h clocks, dotted Hebrew
//! dates, sender-less system lines and multi-line messages. Dates are always
//! read day-first.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyze::patterns::is_system_message;
use crate::chat::types::{DateRange, ExportStats, ParseResult, ParsedMessage, SenderCount};

/// At most this many "text outside of any message" errors are listed.
const MAX_ORPHAN_LINE_ERRORS: usize = 20;
const TOP_SENDERS: usize = 10;
/// `is_valid_chat_export` looks at this many leading lines.
const SNIFF_LINES: usize = 10;

pub const SYSTEM_SENDER: &str = "System";

/// Message header layouts, tried in this order. Groups: date, time, sender, content.
static HEADER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // iOS 24h
        r"^\[(\d{1,2}/\d{1,2}/\d{2,4}),?\s+(\d{1,2}:\d{2}(?::\d{2})?)\]\s*([^:]+):\s*(.*)$",
        // iOS 12h
        r"(?i)^\[(\d{1,2}/\d{1,2}/\d{2,4}),?\s+(\d{1,2}:\d{2}(?::\d{2})?\s*[AP]M)\]\s*([^:]+):\s*(.*)$",
        // Android
        r"(?i)^(\d{1,2}/\d{1,2}/\d{2,4}),?\s+(\d{1,2}:\d{2}(?:\s*[AP]M)?)\s*-\s*([^:]+):\s*(.*)$",
        // Hebrew locale, dotted date
        r"(?i)^(\d{1,2}\.\d{1,2}\.\d{2,4}),?\s+(\d{1,2}:\d{2}(?:\s*[AP]M)?)\s*-\s*([^:]+):\s*(.*)$",
    ]
    .iter()
    .map(|s| Regex::new(s).expect("valid header pattern"))
    .collect()
});

/// Timestamped lines without a sender. Groups: date, time, text.
static SYSTEM_LINE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^\[(\d{1,2}/\d{1,2}/\d{2,4}),?\s+(\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AP]M)?)\]\s*(.+)$",
        r"(?i)^(\d{1,2}[/.]\d{1,2}[/.]\d{2,4}),?\s+(\d{1,2}:\d{2}(?:\s*[AP]M)?)\s*-\s*(.+)$",
    ]
    .iter()
    .map(|s| Regex::new(s).expect("valid system line pattern"))
    .collect()
});

static GROUP_NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^WhatsApp Chat with (.+)$",
        r"^צ'אט וואטסאפ עם (.+)$",
        r"(?i)^Chat de WhatsApp con (.+)$",
    ]
    .iter()
    .map(|s| Regex::new(s).expect("valid group name pattern"))
    .collect()
});

static SENDER_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+]?[\d\s\-()]{10,}").expect("valid sender phone pattern"));

/// Direction marks and BOMs that exports sprinkle around timestamps.
fn is_invisible_mark(c: char) -> bool {
    matches!(
        c,
        '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
    )
}

fn clean_line(raw: &str) -> String {
    raw.chars()
        .filter(|c| !is_invisible_mark(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Day-first date plus a 12h or 24h clock. `None` for impossible values.
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let mut parts = date.split(['/', '.', '-']).map(|p| p.trim().parse::<u32>());
    let day = parts.next()?.ok()?;
    let month = parts.next()?.ok()?;
    let mut year = parts.next()?.ok()? as i32;
    if parts.next().is_some() {
        return None;
    }
    if year < 100 {
        year += if year > 50 { 1900 } else { 2000 };
    }

    let upper = time.trim().to_ascii_uppercase();
    let (clock, meridiem) = if let Some(c) = upper.strip_suffix("PM") {
        (c.trim(), Some(true))
    } else if let Some(c) = upper.strip_suffix("AM") {
        (c.trim(), Some(false))
    } else {
        (upper.as_str(), None)
    };

    let mut hms = clock.split(':').map(|p| p.trim().parse::<u32>());
    let mut hour = hms.next()?.ok()?;
    let minute = hms.next()?.ok()?;
    let second = match hms.next() {
        Some(s) => s.ok()?,
        None => 0,
    };

    match meridiem {
        Some(true) if hour < 12 => hour += 12,
        Some(false) if hour == 12 => hour = 0,
        _ => {}
    }

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

fn sender_phone(sender: &str) -> Option<String> {
    let m = SENDER_PHONE.find(sender)?;
    let phone: String = m
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();
    (phone.len() >= 10).then_some(phone)
}

/// Try to read `line` as the first line of a message.
fn parse_header(line: &str) -> Option<ParsedMessage> {
    for pattern in HEADER_PATTERNS.iter() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        let timestamp = parse_timestamp(&caps[1], &caps[2])?;
        let sender_name = caps[3].trim().to_string();
        let content = caps[4].trim().to_string();
        return Some(ParsedMessage {
            timestamp,
            sender_phone: sender_phone(&sender_name),
            sender_name,
            is_system_message: is_system_message(&content),
            content,
        });
    }

    for pattern in SYSTEM_LINE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        let text = caps[3].trim();
        if !is_system_message(text) {
            continue;
        }
        let timestamp = parse_timestamp(&caps[1], &caps[2])?;
        return Some(ParsedMessage {
            timestamp,
            sender_name: SYSTEM_SENDER.to_string(),
            sender_phone: None,
            content: text.to_string(),
            is_system_message: true,
        });
    }

    None
}

fn group_name(line: &str) -> Option<String> {
    GROUP_NAME_PATTERNS.iter().find_map(|p| {
        p.captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn flush(msg: Option<ParsedMessage>, out: &mut Vec<ParsedMessage>) {
    if let Some(m) = msg {
        if !m.content.trim().is_empty() {
            out.push(m);
        }
    }
}

fn date_range_of(messages: &[ParsedMessage]) -> DateRange {
    let start = messages.iter().map(|m| m.timestamp).min();
    let end = messages.iter().map(|m| m.timestamp).max();
    match (start, end) {
        (Some(start), Some(end)) => DateRange { start, end },
        _ => {
            let now = Utc::now().naive_utc();
            DateRange { start: now, end: now }
        }
    }
}

/// Parse a whole export. Never fails: problems are listed in `errors`, and
/// `success` is true as soon as one message was recovered.
pub fn parse_chat_export(content: &str) -> ParseResult {
    if content.trim().is_empty() {
        return ParseResult {
            success: false,
            messages: Vec::new(),
            group_name: None,
            date_range: date_range_of(&[]),
            errors: vec!["File is empty".to_string()],
        };
    }

    let mut messages: Vec<ParsedMessage> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    let mut group: Option<String> = None;
    let mut current: Option<ParsedMessage> = None;
    let mut first_line_seen = false;
    let mut orphan_lines = 0usize;

    for (idx, raw) in content.lines().enumerate() {
        let line = clean_line(raw);
        if line.is_empty() {
            continue;
        }

        if !first_line_seen {
            first_line_seen = true;
            if let Some(name) = group_name(&line) {
                group = Some(name);
                continue;
            }
        }

        if let Some(msg) = parse_header(&line) {
            flush(current.take(), &mut messages);
            current = Some(msg);
            continue;
        }

        match current.as_mut() {
            Some(msg) if msg.content.is_empty() => msg.content = line,
            Some(msg) => {
                msg.content.push('\n');
                msg.content.push_str(&line);
            }
            None => {
                orphan_lines += 1;
                if orphan_lines <= MAX_ORPHAN_LINE_ERRORS {
                    errors.push(format!("Line {}: text outside of any message", idx + 1));
                }
            }
        }
    }
    flush(current.take(), &mut messages);

    if orphan_lines > MAX_ORPHAN_LINE_ERRORS {
        errors.push(format!(
            "... and {} more lines outside of any message",
            orphan_lines - MAX_ORPHAN_LINE_ERRORS
        ));
    }
    if messages.is_empty() {
        errors.push("No messages could be parsed".to_string());
    }

    counter!("chat_messages_parsed_total").increment(messages.len() as u64);
    tracing::debug!(
        target: "chat",
        messages = messages.len(),
        errors = errors.len(),
        has_group_name = group.is_some(),
        "chat export parsed"
    );

    ParseResult {
        success: !messages.is_empty(),
        date_range: date_range_of(&messages),
        messages,
        group_name: group,
        errors,
    }
}

/// Cheap sniff: at least two of the first ten lines parse as messages,
/// sender-less system lines included.
pub fn is_valid_chat_export(content: &str) -> bool {
    content
        .lines()
        .take(SNIFF_LINES)
        .map(clean_line)
        .filter(|l| parse_header(l).is_some())
        .count()
        >= 2
}

/// Summary numbers for an already parsed export.
///
/// System messages count towards `total_messages` and `system_messages`
/// only. Top senders are ordered by count; ties keep first-appearance order.
pub fn get_export_stats(result: &ParseResult) -> ExportStats {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut system_messages = 0usize;

    for m in &result.messages {
        if m.is_system_message {
            system_messages += 1;
            continue;
        }
        let entry = counts.entry(m.sender_name.as_str()).or_insert_with(|| {
            order.push(m.sender_name.as_str());
            0
        });
        *entry += 1;
    }

    let mut top_senders: Vec<SenderCount> = order
        .iter()
        .map(|name| SenderCount {
            name: (*name).to_string(),
            count: counts.get(name).copied().unwrap_or(0),
        })
        .collect();
    // stable: ties stay in first-seen order
    top_senders.sort_by(|a, b| b.count.cmp(&a.count));
    top_senders.truncate(TOP_SENDERS);

    ExportStats {
        total_messages: result.messages.len(),
        unique_senders: order.len(),
        system_messages,
        date_range: result.date_range,
        top_senders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn timestamps_are_day_first() {
        assert_eq!(parse_timestamp("3/4/24", "10:30"), Some(ts(2024, 4, 3, 10, 30, 0)));
        assert_eq!(parse_timestamp("15.01.2024", "09:05:07"), Some(ts(2024, 1, 15, 9, 5, 7)));
    }

    #[test]
    fn two_digit_year_pivot() {
        assert_eq!(parse_timestamp("1/1/99", "00:00").map(|t| t.year()), Some(1999));
        assert_eq!(parse_timestamp("1/1/50", "00:00").map(|t| t.year()), Some(2050));
    }

    #[test]
    fn twelve_hour_clock() {
        assert_eq!(parse_timestamp("1/2/24", "12:15 AM"), Some(ts(2024, 2, 1, 0, 15, 0)));
        assert_eq!(parse_timestamp("1/2/24", "12:15 PM"), Some(ts(2024, 2, 1, 12, 15, 0)));
        assert_eq!(parse_timestamp("1/2/24", "3:45:10 pm"), Some(ts(2024, 2, 1, 15, 45, 10)));
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert_eq!(parse_timestamp("31/02/24", "10:00"), None);
        assert_eq!(parse_timestamp("1/13/24", "10:00"), None);
        assert_eq!(parse_timestamp("1/1/24", "25:00"), None);
    }

    #[test]
    fn malformed_header_becomes_continuation() {
        let text = "1/1/24, 10:00 - Dana: first\n31/02/24, 10:05 - Avi: bad date";
        let r = parse_chat_export(text);
        assert_eq!(r.messages.len(), 1);
        assert_eq!(r.messages[0].content, "first\n31/02/24, 10:05 - Avi: bad date");
    }

    #[test]
    fn sender_phone_drops_separators() {
        let r = parse_chat_export("1/1/24, 10:00 - +972 52-123-4567: hi there");
        assert_eq!(r.messages[0].sender_phone.as_deref(), Some("+972521234567"));
        let r = parse_chat_export("1/1/24, 10:00 - Avi (052) 123-4567: hi there");
        assert_eq!(r.messages[0].sender_phone.as_deref(), Some("0521234567"));
    }

    #[test]
    fn short_number_in_sender_name_is_not_a_phone() {
        // "(050) 12-34" is only seven digits once separators go
        let r = parse_chat_export("1/1/24, 10:00 - Dana (050) 12-34: hi there");
        assert_eq!(r.messages.len(), 1);
        assert_eq!(r.messages[0].sender_phone, None);
    }

    #[test]
    fn system_only_export_is_recognised() {
        let text = "1/1/24, 10:00 - Messages and calls are end-to-end encrypted.\n\
                    1/1/24, 10:01 - Dana added Avi\n\
                    1/1/24, 10:02 - Avi left";
        assert!(is_valid_chat_export(text));
    }

    #[test]
    fn bidi_marks_are_ignored() {
        let r = parse_chat_export("\u{feff}\u{200e}[1/1/24, 10:00:00] Dana: \u{200f}שלום");
        assert_eq!(r.messages.len(), 1);
        assert_eq!(r.messages[0].content, "שלום");
    }

    #[test]
    fn group_name_line_is_not_an_orphan() {
        let r = parse_chat_export("WhatsApp Chat with Parents RBS\n1/1/24, 10:00 - Dana: hi");
        assert_eq!(r.group_name.as_deref(), Some("Parents RBS"));
        assert!(r.errors.is_empty());
    }

    #[test]
    fn orphan_line_errors_are_capped() {
        let mut text = String::new();
        for i in 0..25 {
            text.push_str(&format!("junk {i}\n"));
        }
        text.push_str("1/1/24, 10:00 - Dana: hi");
        let r = parse_chat_export(&text);
        assert!(r.success);
        assert_eq!(r.errors.len(), MAX_ORPHAN_LINE_ERRORS + 1);
        assert_eq!(r.errors[0], "Line 1: text outside of any message");
        assert!(r.errors.last().unwrap().contains("5 more"));
    }

    #[test]
    fn empty_header_content_takes_next_line() {
        let r = parse_chat_export("1/1/24, 10:00 - Dana:\nsecond line");
        assert_eq!(r.messages[0].content, "second line");
    }

    #[test]
    fn sniff_needs_two_headers() {
        assert!(!is_valid_chat_export("1/1/24, 10:00 - Dana: hi\nsomething else"));
        assert!(is_valid_chat_export("1/1/24, 10:00 - Dana: hi\n1/1/24, 10:01 - Avi: yo"));
    }
}
