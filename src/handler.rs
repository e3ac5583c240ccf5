use std::fmt;

#[cfg(feature = "tracing")]
use tracing::warn;

use crate::{Command, LoadSource, MAX_DATAGRAM};

pub(crate) const UNKNOWN_FORMAT: &str = "<error>unknown format</error>";
pub(crate) const LOADAVG_UNAVAILABLE: &str = "<error>unable to obtain load average</error>";
pub(crate) const SHUTTING_DOWN: &str = "<replyShutDown>Server is shutting down</replyShutDown>";

/// Text sent back to the peer for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply(String);

impl Reply {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the dispatch loop keeps serving after the reply is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Shutdown,
}

/// The outcome of handling one [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub reply: Reply,
    pub control: Control,
}

impl Response {
    fn reply(reply: Reply) -> Self {
        Self {
            reply,
            control: Control::Continue,
        }
    }
}

/// Runs the handler matching `command`.
///
/// Every command produces exactly one reply. Only [`Command::Shutdown`]
/// asks the loop to stop.
pub fn handle<L>(command: &Command, load: &L) -> Response
where
    L: LoadSource + ?Sized,
{
    match command {
        Command::Echo(payload) => Response::reply(echo(payload)),
        Command::LoadAverageQuery => Response::reply(load_average(load)),
        Command::Shutdown => Response {
            reply: shutdown(),
            control: Control::Shutdown,
        },
        Command::Unrecognized(_) => Response::reply(unknown_format()),
    }
}

const REPLY_OPEN: &str = "<reply>";
const REPLY_CLOSE: &str = "</reply>";

/// `<reply>payload</reply>`
///
/// The payload is shortened, on a character boundary, so that the whole
/// reply fits in one datagram with its closing tag intact.
pub fn echo(payload: &str) -> Reply {
    let room = MAX_DATAGRAM - REPLY_OPEN.len() - REPLY_CLOSE.len();
    let mut end = payload.len().min(room);
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    Reply(format!("{REPLY_OPEN}{}{REPLY_CLOSE}", &payload[..end]))
}

/// `<replyLoadAvg>L1:L5:L15</replyLoadAvg>`, six decimals per sample.
pub fn load_average<L>(load: &L) -> Reply
where
    L: LoadSource + ?Sized,
{
    match load.load_average() {
        Ok(avg) => Reply(format!(
            "<replyLoadAvg>{:.6}:{:.6}:{:.6}</replyLoadAvg>",
            avg.one, avg.five, avg.fifteen
        )),
        Err(e) => {
            #[cfg(feature = "tracing")]
            warn!("Load average query failed: {}", e);

            #[cfg(not(feature = "tracing"))]
            let _ = e;

            Reply(LOADAVG_UNAVAILABLE.to_string())
        }
    }
}

pub fn shutdown() -> Reply {
    Reply(SHUTTING_DOWN.to_string())
}

pub fn unknown_format() -> Reply {
    Reply(UNKNOWN_FORMAT.to_string())
}
