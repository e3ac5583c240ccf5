//! Classification of request payloads into [`Command`]s.
//!
//! The grammar is a handful of literal tags, matched case-insensitively:
//!
//! ```text
//! <echo>TEXT</echo>
//! <loadavg/>
//! <shutdown/>
//! ```
//!
//! Anything else is [`Command::Unrecognized`]. Parsing never fails.

const ECHO_OPEN: &[u8] = b"<echo>";
const ECHO_CLOSE: &[u8] = b"</echo>";
const LOADAVG: &[u8] = b"<loadavg/>";
const SHUTDOWN: &[u8] = b"<shutdown/>";

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Text enclosed by `<echo>` and `</echo>`, tags removed.
    Echo(String),
    /// `<loadavg/>`.
    LoadAverageQuery,
    /// `<shutdown/>`.
    Shutdown,
    /// Any other input, including an `<echo>` missing its closing tag.
    Unrecognized(String),
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Echo(_) => "echo",
            Command::LoadAverageQuery => "loadavg",
            Command::Shutdown => "shutdown",
            Command::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Parses a raw request payload.
///
/// The payload ends at the first NUL byte, if any. A single trailing `\n`
/// is then removed; nothing else is trimmed, so `"<loadavg/> "` or
/// `"<loadavg/>\n\n"` are unrecognized.
///
/// Tags are tried in a fixed order: `<echo>` (prefix), `<loadavg/>`
/// (exact), `<shutdown/>` (exact).
pub fn parse(input: &[u8]) -> Command {
    let text = strip_newline(until_nul(input));

    if starts_with_ignore_case(text, ECHO_OPEN) {
        return match echo_payload(text) {
            Some(payload) => Command::Echo(String::from_utf8_lossy(payload).into_owned()),
            None => Command::Unrecognized(String::from_utf8_lossy(text).into_owned()),
        };
    }

    if text.eq_ignore_ascii_case(LOADAVG) {
        Command::LoadAverageQuery
    } else if text.eq_ignore_ascii_case(SHUTDOWN) {
        Command::Shutdown
    } else {
        Command::Unrecognized(String::from_utf8_lossy(text).into_owned())
    }
}

/// Cuts the payload at the first NUL, as C clients pad their buffers with zeros.
fn until_nul(input: &[u8]) -> &[u8] {
    match input.iter().position(|&b| b == 0) {
        Some(end) => &input[..end],
        None => input,
    }
}

/// Removes exactly one trailing `\n`.
fn strip_newline(input: &[u8]) -> &[u8] {
    input.strip_suffix(b"\n").unwrap_or(input)
}

fn starts_with_ignore_case(text: &[u8], prefix: &[u8]) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Returns the bytes between `<echo>` and `</echo>`, or `None` when the
/// closing tag is missing.
fn echo_payload(text: &[u8]) -> Option<&[u8]> {
    let body = text.get(ECHO_OPEN.len()..)?;
    let split = body.len().checked_sub(ECHO_CLOSE.len())?;
    let (payload, close) = body.split_at(split);
    close.eq_ignore_ascii_case(ECHO_CLOSE).then_some(payload)
}
