// tests/chat_parser.rs
//
// Chat export parsing against the public API: both fixture exports, message
// counts, continuation merging, system lines and the date-range invariant.

use chrono::{NaiveDate, NaiveDateTime};
use rbs_ingest::chat::{get_export_stats, is_valid_chat_export, parse_chat_export};

const ANDROID_HE: &str = include_str!("fixtures/android_he.txt");
const IOS_EN: &str = include_str!("fixtures/ios_en.txt");

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

#[test]
fn hebrew_android_export() {
    let r = parse_chat_export(ANDROID_HE);
    assert!(r.success);
    assert!(r.errors.is_empty(), "unexpected errors: {:?}", r.errors);
    assert_eq!(r.messages.len(), 6);

    let system: Vec<bool> = r.messages.iter().map(|m| m.is_system_message).collect();
    assert_eq!(system, vec![true, true, false, false, false, true]);
    assert!(r
        .messages
        .iter()
        .filter(|m| m.is_system_message)
        .all(|m| m.sender_name == "System"));

    let rec = &r.messages[3];
    assert_eq!(rec.content.lines().count(), 3);
    assert!(rec.content.ends_with("הטלפון שלהם 052-123-4567"));
    assert_eq!(rec.sender_phone.as_deref(), Some("+972525551234"));

    assert_eq!(r.date_range.start, at(2024, 3, 12, 9, 15, 0));
    assert_eq!(r.date_range.end, at(2024, 3, 12, 10, 5, 0));
}

#[test]
fn ios_export_with_group_header_and_twelve_hour_clock() {
    let r = parse_chat_export(IOS_EN);
    assert!(r.success);
    assert_eq!(r.group_name.as_deref(), Some("RBS Parents"));
    assert!(r.errors.is_empty(), "group header is not an orphan line");
    assert_eq!(r.messages.len(), 4);

    assert_eq!(r.messages[0].timestamp, at(2024, 4, 1, 20, 5, 12));
    assert_eq!(r.messages[1].sender_name, "Mike Levi");
    assert_eq!(
        r.messages[1].content,
        "We use Harmony Music Studio, highly recommend\nCall them at 052-987-6543 or www.harmonymusic.co.il"
    );
    assert!(r.messages[3].is_system_message);
    assert_eq!(r.messages[3].timestamp, at(2024, 4, 2, 7, 0, 0));
}

#[test]
fn n_headers_give_n_messages() {
    let text: String = (0..25)
        .map(|i| format!("05/06/2024, 10:{:02} - User{}: message number {}\n", i, i % 3, i))
        .collect();
    let r = parse_chat_export(&text);
    assert_eq!(r.messages.len(), 25);
    assert!(r.date_range.start <= r.date_range.end);
    let min = r.messages.iter().map(|m| m.timestamp).min().unwrap();
    let max = r.messages.iter().map(|m| m.timestamp).max().unwrap();
    assert_eq!((r.date_range.start, r.date_range.end), (min, max));
}

#[test]
fn continuation_lines_join_with_newline() {
    let text = "05/06/2024, 10:00 - Avi: first\nsecond\nthird\n\nfourth\n05/06/2024, 10:01 - Avi: next";
    let r = parse_chat_export(text);
    assert_eq!(r.messages.len(), 2);
    assert_eq!(r.messages[0].content, "first\nsecond\nthird\nfourth");
}

#[test]
fn malformed_header_becomes_body_text() {
    // 32/13 is not a date, so the line is kept as a continuation
    let text = "05/06/2024, 10:00 - Avi: hello\n32/13/2024, 10:01 - Ben: lost header";
    let r = parse_chat_export(text);
    assert_eq!(r.messages.len(), 1);
    assert!(r.messages[0].content.contains("Ben: lost header"));
}

#[test]
fn structural_failures() {
    let empty = parse_chat_export("");
    assert!(!empty.success);
    assert_eq!(empty.errors, vec!["File is empty"]);

    let prose = parse_chat_export("just some notes\nwith no timestamps");
    assert!(!prose.success);
    assert!(prose
        .errors
        .iter()
        .any(|e| e == "No messages could be parsed"));
    assert!(prose.errors.iter().any(|e| e.starts_with("Line 1:")));
}

#[test]
fn english_and_hebrew_system_lines() {
    let text = "\
05/06/2024, 10:00 - Messages and calls are end-to-end encrypted. No one outside of this chat can read them.
05/06/2024, 10:01 - Avi joined using this group's invite link
05/06/2024, 10:02 - Avi left
05.06.2024, 10:03 - דנה הצטרף/ה לקבוצה
05.06.2024, 10:04 - יוסי: הודעה זו נמחקה";
    let r = parse_chat_export(text);
    assert_eq!(r.messages.len(), 5);
    assert!(r.messages.iter().all(|m| m.is_system_message));
}

#[test]
fn sniffing_and_stats() {
    assert!(is_valid_chat_export(ANDROID_HE));
    assert!(is_valid_chat_export(IOS_EN));
    assert!(!is_valid_chat_export("title,price\nSoccer,100"));

    let stats = get_export_stats(&parse_chat_export(ANDROID_HE));
    assert_eq!(stats.total_messages, 6);
    assert_eq!(stats.system_messages, 3);
    assert_eq!(stats.unique_senders, 3);
    assert!(stats.top_senders.iter().all(|s| s.count == 1));
}
