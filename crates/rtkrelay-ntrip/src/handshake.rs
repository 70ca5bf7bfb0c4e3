use crate::client::ClientConfig;

/// Longest status line kept for logs and error messages.
const MAX_STATUS_LINE: usize = 100;

const HEADER_END: &[u8] = b"\r\n\r\n";

/// Status tokens that mark an accepted mountpoint request. Casters speaking
/// protocol revision 1 answer `ICY 200 OK`; revision 2 casters answer with
/// a standard HTTP status line.
const ACCEPT_TOKENS: [&[u8]; 2] = [b"200", b"ICY"];

/// Outcome of the first response chunk from a caster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// True when the caster accepted the request.
    pub accepted: bool,
    /// First response line, lossily decoded and shortened.
    pub status_line: String,
    /// Correction bytes that arrived in the same chunk as the headers.
    pub body: Vec<u8>,
}

/// Build the mountpoint request.
///
/// Headers are emitted in a fixed order; `Authorization` only when
/// credentials are configured.
pub fn build_request(config: &ClientConfig) -> String {
    let mut request = format!(
        "GET /{} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nNtrip-Version: Ntrip/2.0\r\n",
        config.mountpoint, config.host, config.user_agent
    );
    if let Some(credentials) = &config.credentials {
        request.push_str("Authorization: ");
        request.push_str(&credentials.header_value());
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    request
}

/// Classify the first chunk a caster sent back.
///
/// Only a single chunk is inspected. Bytes after the header terminator are
/// returned as body so they reach the receiver.
pub fn parse_response(chunk: &[u8]) -> HandshakeResponse {
    let accepted = ACCEPT_TOKENS.iter().any(|token| contains(chunk, token));

    let line_end = find(chunk, b"\r\n").unwrap_or(chunk.len());
    let mut status_line = String::from_utf8_lossy(&chunk[..line_end]).into_owned();
    if status_line.len() > MAX_STATUS_LINE {
        let mut cut = MAX_STATUS_LINE;
        while !status_line.is_char_boundary(cut) {
            cut -= 1;
        }
        status_line.truncate(cut);
    }

    let body = if accepted {
        find(chunk, HEADER_END)
            .map(|pos| chunk[pos + HEADER_END.len()..].to_vec())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    HandshakeResponse {
        accepted,
        status_line,
        body,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}
