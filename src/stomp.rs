//! Minimal STOMP 1.2 text-frame codec.
//!
//! The relay speaks STOMP over a plain WebSocket.  Each WebSocket text
//! message carries one or more frames, each terminated by a NUL byte.  A bare
//! end-of-line between frames is a heart-beat.
//!
//! We implement only the frames this client needs:
//!
//! | Direction        | Command                                  |
//! |------------------|------------------------------------------|
//! | Server → client  | `CONNECTED`, `MESSAGE`, `RECEIPT`, `ERROR` |
//! | Client → server  | `CONNECT`, `SUBSCRIBE`, `SEND`, `DISCONNECT` |
//!
//! Reference: <https://stomp.github.io/stomp-specification-1.2.html>

const NUL: char = '\0';

// ---------------------------------------------------------------------------
// Outbound frame builders
// ---------------------------------------------------------------------------

/// Build the `CONNECT` frame, advertising our heart-beat wishes.
pub fn connect_frame(host: &str, heartbeat_out_ms: u64, heartbeat_in_ms: u64) -> String {
    build_frame(
        "CONNECT",
        &[
            ("accept-version", "1.2"),
            ("host", host),
            (
                "heart-beat",
                &format!("{},{}", heartbeat_out_ms, heartbeat_in_ms),
            ),
        ],
        "",
    )
}

/// Build a `SUBSCRIBE` frame with automatic acknowledgement.
pub fn subscribe_frame(id: &str, destination: &str) -> String {
    build_frame(
        "SUBSCRIBE",
        &[("id", id), ("destination", destination), ("ack", "auto")],
        "",
    )
}

/// Build a `SEND` frame carrying a JSON body.
pub fn send_frame(destination: &str, body: &str) -> String {
    build_frame(
        "SEND",
        &[
            ("destination", destination),
            ("content-type", "application/json"),
            ("content-length", &body.len().to_string()),
        ],
        body,
    )
}

pub fn disconnect_frame(receipt: &str) -> String {
    build_frame("DISCONNECT", &[("receipt", receipt)], "")
}

/// A heart-beat is a single EOL outside any frame.
pub fn heartbeat_frame() -> String {
    "\n".into()
}

fn build_frame(command: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = String::with_capacity(command.len() + body.len() + 64);
    out.push_str(command);
    out.push('\n');
    for (k, v) in headers {
        // CONNECT headers are sent verbatim.
        if command == "CONNECT" {
            out.push_str(k);
            out.push(':');
            out.push_str(v);
        } else {
            out.push_str(&escape_header(k));
            out.push(':');
            out.push_str(&escape_header(v));
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(body);
    out.push(NUL);
    out
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some('\\') => out.push('\\'),
            // Undefined escape: keep it literally.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Inbound frame parsing
// ---------------------------------------------------------------------------

/// A single parsed STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StompFrame {
    /// First occurrence wins when a header repeats.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse every complete frame in a WebSocket text message.
///
/// Heart-beats (bare EOLs) are skipped; a trailing fragment without the
/// terminating NUL is dropped.
pub fn parse_frames(text: &str) -> Vec<StompFrame> {
    let mut frames = Vec::new();
    let mut rest = text;

    while let Some(end) = rest.find(NUL) {
        let raw = &rest[..end];
        rest = &rest[end + 1..];
        if let Some(frame) = parse_one(raw) {
            frames.push(frame);
        }
    }

    frames
}

fn parse_one(raw: &str) -> Option<StompFrame> {
    let raw = raw.trim_start_matches(['\r', '\n']);
    if raw.is_empty() {
        return None;
    }

    // Headers end at the first blank line, whichever EOL style it uses.
    let lf = raw.find("\n\n").map(|i| (i, 2));
    let crlf = raw.find("\r\n\r\n").map(|i| (i, 4));
    let (head, body) = match [lf, crlf].into_iter().flatten().min_by_key(|(i, _)| *i) {
        Some((i, eol)) => (&raw[..i], &raw[i + eol..]),
        None => (raw, ""),
    };

    let mut lines = head.lines();
    let command = lines.next()?.trim_end_matches('\r').to_string();
    let unescape = command != "CONNECTED";

    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        let Some((k, v)) = line.split_once(':') else {
            continue;
        };
        if unescape {
            headers.push((unescape_header(k), unescape_header(v)));
        } else {
            headers.push((k.to_string(), v.to_string()));
        }
    }

    let mut frame = StompFrame {
        command,
        headers,
        body: body.to_string(),
    };

    if let Some(len) = frame
        .header("content-length")
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        if len <= frame.body.len() && frame.body.is_char_boundary(len) {
            frame.body.truncate(len);
        }
    }

    Some(frame)
}

// ---------------------------------------------------------------------------
// Heart-beat negotiation
// ---------------------------------------------------------------------------

/// Parse a `heart-beat:<x>,<y>` header value.  Malformed means `0,0`.
pub fn parse_heartbeat(value: &str) -> (u64, u64) {
    let mut parts = value.split(',').map(|p| p.trim().parse::<u64>().ok());
    match (parts.next().flatten(), parts.next().flatten()) {
        (Some(x), Some(y)) => (x, y),
        _ => (0, 0),
    }
}

/// Effective `(outgoing, incoming)` intervals in ms.  `0` disables.
///
/// `client` is what we sent in `CONNECT` (`cx,cy`), `server` what came back
/// in `CONNECTED` (`sx,sy`).
pub fn negotiate_heartbeat(client: (u64, u64), server: (u64, u64)) -> (u64, u64) {
    let (cx, cy) = client;
    let (sx, sy) = server;
    let outgoing = if cx == 0 || sy == 0 { 0 } else { cx.max(sy) };
    let incoming = if sx == 0 || cy == 0 { 0 } else { sx.max(cy) };
    (outgoing, incoming)
}

/// `host` header value for a WebSocket URL.
pub fn host_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = without_scheme.split('/').next().unwrap_or(without_scheme);
    authority.rsplit_once(':').map(|(h, _)| h).unwrap_or(authority)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
