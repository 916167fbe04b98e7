//! Tagged console logging.
//!
//! One line per event: a dimmed clock, a colored subsystem tag, a colored
//! event type, then the message. Long messages wrap under the message
//! column so multi-line output stays scannable.

use chrono::Local;
use colored::{Color, Colorize};

/// Show the clock in every log line
const SHOW_TIME: bool = true;

/// Hard wrap column for the whole line
const WRAP_COLUMN: usize = 150;

/// Log tags for categorizing log messages.
#[derive(Debug)]
pub enum LogTag {
    Router,
    Pool,
    Rpc,
    Swap,
    Wallet,
    System,
    Other(String),
}

impl LogTag {
    fn label(&self) -> &str {
        match self {
            LogTag::Router => "ROUTER",
            LogTag::Pool => "POOL",
            LogTag::Rpc => "RPC",
            LogTag::Swap => "SWAP",
            LogTag::Wallet => "WALLET",
            LogTag::System => "SYSTEM",
            LogTag::Other(name) => name,
        }
    }

    fn color(&self) -> Color {
        match self {
            LogTag::Router => Color::BrightCyan,
            LogTag::Pool => Color::BrightGreen,
            LogTag::Rpc => Color::BrightMagenta,
            LogTag::Swap => Color::BrightBlue,
            LogTag::Wallet => Color::BrightYellow,
            LogTag::System | LogTag::Other(_) => Color::White,
        }
    }
}

fn type_color(log_type: &str) -> Color {
    match log_type.to_uppercase().as_str() {
        "ERROR" => Color::BrightRed,
        "WARN" | "WARNING" => Color::BrightYellow,
        "SUCCESS" => Color::BrightGreen,
        "INFO" => Color::BrightBlue,
        "DEBUG" => Color::BrightBlack,
        "QUOTE" => Color::BrightCyan,
        "SKIP" => Color::BrightMagenta,
        _ => Color::White,
    }
}

/// Logs a message under a subsystem tag and an event type.
pub fn log(tag: LogTag, log_type: &str, message: &str) {
    let clock = if SHOW_TIME {
        format!("{} ", Local::now().format("%H:%M:%S"))
    } else {
        String::new()
    };

    // Pad both columns to the widest labels this crate actually emits
    let tag_field = format!("{:<6}", tag.label());
    let type_field = format!("{:<7}", log_type);

    // Uncolored prefix width, so continuation lines align under the message
    let indent = clock.len() + tag_field.len() + type_field.len() + 4;

    let header = format!(
        "{}[{}] {} ",
        clock.dimmed(),
        tag_field.color(tag.color()).bold(),
        type_field.color(type_color(log_type)).bold(),
    );

    let width = WRAP_COLUMN.saturating_sub(indent).max(40);
    for (i, line) in wrap(message, width).iter().enumerate() {
        if i == 0 {
            println!("{}{}", header, line.bright_white());
        } else {
            println!("{}{}", " ".repeat(indent), line.bright_white());
        }
    }
}

/// Word wrap at `width` columns, hard-splitting words that are longer than
/// a whole line (base58 addresses routinely are).
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut line));
        }

        let mut rest = word;
        while rest.len() > width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let mut cut = width;
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            if cut == 0 {
                break;
            }
            let (head, tail) = rest.split_at(cut);
            lines.push(head.to_string());
            rest = tail;
        }

        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(rest);
    }

    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_short_message_is_single_line() {
        assert_eq!(wrap("quote ok", 40), vec!["quote ok"]);
        assert_eq!(wrap("", 40), vec![""]);
    }

    #[test]
    fn test_wrap_breaks_at_word_boundaries() {
        let lines = wrap("alpha beta gamma delta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn test_wrap_hard_splits_long_words() {
        let address = "a".repeat(25);
        let lines = wrap(&address, 10);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.len() <= 10));
        assert_eq!(lines.join(""), address);
    }
}
