//! Notification message formatting.

use courier_extract::OtpRecord;

/// Characters Telegram's MarkdownV2 parse mode requires escaping.
const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escapes text for MarkdownV2 so user-controlled SMS bodies cannot
/// break the message markup.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Direct notification for the lease holder, MarkdownV2 with the code
/// in a tappable inline-code span.
pub fn direct_notification(record: &OtpRecord) -> String {
    format!(
        "\u{1F510} *New OTP received\\!*\n\n\
         \u{1F4DE} Number: `{number}`\n\
         \u{1F30D} Country: {flag} {country}\n\
         \u{1F4AC} Service: {service}\n\
         \u{1F511} Code: `{code}`\n\n\
         \u{1F4E9} {body}",
        number = escape_markdown_v2(&record.number),
        flag = record.country_flag,
        country = escape_markdown_v2(&record.country_name),
        service = escape_markdown_v2(&record.service),
        code = escape_markdown_v2(&record.otp_code),
        body = escape_markdown_v2(&record.message_body),
    )
}

/// Broadcast entry for the announcement channel. The number is masked
/// so channel members cannot hijack someone else's lease.
pub fn broadcast_notification(record: &OtpRecord) -> String {
    format!(
        "{flag} *{country}* \\| {service}\n\
         \u{1F4DE} `{number}`\n\
         \u{1F511} Code: `{code}`",
        flag = record.country_flag,
        country = escape_markdown_v2(&record.country_name),
        service = escape_markdown_v2(&record.service),
        number = escape_markdown_v2(&mask_number(&record.number)),
        code = escape_markdown_v2(&record.otp_code),
    )
}

/// Plain-text fallback used when the markdown payload is rejected.
pub fn plain_notification(record: &OtpRecord) -> String {
    format!(
        "New OTP received\n\
         Number: {}\n\
         Country: {} {}\n\
         Service: {}\n\
         Code: {}\n\
         {}",
        record.number,
        record.country_flag,
        record.country_name,
        record.service,
        record.otp_code,
        record.message_body,
    )
}

/// Keeps the dialing prefix visible and hides the subscriber part.
pub fn mask_number(number: &str) -> String {
    let visible: String = number.chars().take(5).collect();
    if number.chars().count() <= 5 {
        return number.to_string();
    }
    format!("{visible}***")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> OtpRecord {
        OtpRecord {
            otp_code: "752637".to_string(),
            service: "WhatsApp".to_string(),
            number: "21612345678".to_string(),
            message_body: "Your code is 752-637. Don't share it!".to_string(),
            timestamp: "2025-03-01 10:15:00".to_string(),
            country_name: "Tunisia".to_string(),
            country_flag: "\u{1F1F9}\u{1F1F3}".to_string(),
        }
    }

    #[test]
    fn reserved_characters_are_escaped() {
        assert_eq!(
            escape_markdown_v2("code: 752-637. (do not share!)"),
            "code: 752\\-637\\. \\(do not share\\!\\)"
        );
    }

    #[test]
    fn direct_message_escapes_the_body() {
        let message = direct_notification(&record());
        assert!(message.contains("`752637`"));
        assert!(message.contains("752\\-637\\. Don't share it\\!"));
        assert!(message.contains("Tunisia"));
    }

    #[test]
    fn broadcast_masks_the_number() {
        let message = broadcast_notification(&record());
        assert!(message.contains("21612\\*\\*\\*"));
        assert!(!message.contains("21612345678"));
    }

    #[test]
    fn short_numbers_are_not_masked() {
        assert_eq!(mask_number("12345"), "12345");
        assert_eq!(mask_number("21612345678"), "21612***");
    }
}
