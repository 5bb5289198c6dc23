//! Incremental telnet framing.
//!
//! Embermud speaks plain newline-delimited text with a thin layer of
//! telnet on top, used for exactly one thing: negotiating and carrying
//! GMCP, the structured out-of-band channel. The decoder walks the byte
//! stream one byte at a time so it is indifferent to how the kernel
//! chunks reads — a GMCP block split across three `recv`s decodes the
//! same as one arriving whole.
//!
//! Recognized sequences (see RFC 854 for the IAC grammar):
//! - `IAC WILL GMCP` / `IAC WONT GMCP` — the client accepting or
//!   refusing the server's capability offer.
//! - `IAC SB GMCP … IAC SE` — a GMCP sub-negotiation block; the payload
//!   bytes are surfaced raw and parsed separately by [`GmcpFrame::parse`].
//! - Any other IAC sequence is consumed and ignored.
//! - Everything else is line data, emitted on `\n` with the trailing
//!   `\r` stripped.
//!
//! [`GmcpFrame::parse`]: crate::GmcpFrame::parse

// Telnet command bytes.
const IAC: u8 = 0xff;
const WILL: u8 = 0xfb;
const WONT: u8 = 0xfc;
const DO: u8 = 0xfd;
const DONT: u8 = 0xfe;
const SB: u8 = 0xfa;
const SE: u8 = 0xf0;

/// The GMCP telnet option byte.
pub const GMCP: u8 = 0xc9;

/// One decoded unit of client input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete text line, `\r\n` stripped. May be empty.
    Line(String),
    /// The client accepted the GMCP capability offer (`IAC WILL GMCP`).
    GmcpAccept,
    /// The client refused the GMCP capability offer (`IAC WONT GMCP`).
    GmcpRefuse,
    /// Raw payload bytes of a GMCP sub-negotiation block.
    Subneg(Vec<u8>),
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Data,
    Iac,
    Negotiate {
        cmd: u8,
    },
    Subneg {
        opt: Option<u8>,
        iac_seen: bool,
        buf: Vec<u8>,
    },
}

/// Incremental telnet/GMCP decoder, one per connection.
///
/// Feed it raw socket bytes with [`feed`](Self::feed); it returns every
/// frame completed by that chunk. Partial lines and partial
/// sub-negotiation blocks are buffered internally until the rest arrives.
#[derive(Debug, Default)]
pub struct TelnetDecoder {
    state: State,
    line: Vec<u8>,
}

impl TelnetDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a chunk of bytes, returning all frames it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();

        for &b in chunk {
            match &mut self.state {
                State::Data => match b {
                    IAC => self.state = State::Iac,
                    b'\n' => {
                        let mut raw = std::mem::take(&mut self.line);
                        if raw.last() == Some(&b'\r') {
                            raw.pop();
                        }
                        frames.push(Frame::Line(
                            String::from_utf8_lossy(&raw).into_owned(),
                        ));
                    }
                    _ => self.line.push(b),
                },
                State::Iac => match b {
                    // Escaped 0xff is a literal data byte.
                    IAC => {
                        self.line.push(IAC);
                        self.state = State::Data;
                    }
                    WILL | WONT | DO | DONT => {
                        self.state = State::Negotiate { cmd: b };
                    }
                    SB => {
                        self.state = State::Subneg {
                            opt: None,
                            iac_seen: false,
                            buf: Vec::new(),
                        };
                    }
                    // Two-byte IAC commands (NOP, GA, …) — ignore.
                    _ => self.state = State::Data,
                },
                State::Negotiate { cmd } => {
                    match (*cmd, b) {
                        (WILL, GMCP) => frames.push(Frame::GmcpAccept),
                        (WONT, GMCP) => frames.push(Frame::GmcpRefuse),
                        // Other options are not supported; swallow them.
                        _ => {}
                    }
                    self.state = State::Data;
                }
                State::Subneg { opt, iac_seen, buf } => {
                    if opt.is_none() {
                        *opt = Some(b);
                        continue;
                    }
                    if *iac_seen {
                        *iac_seen = false;
                        if b == SE {
                            // Block complete. Only GMCP blocks are surfaced.
                            let payload = std::mem::take(buf);
                            let is_gmcp = *opt == Some(GMCP);
                            self.state = State::Data;
                            if is_gmcp {
                                frames.push(Frame::Subneg(payload));
                            }
                            continue;
                        }
                        if b == IAC {
                            // IAC IAC inside a block is an escaped 0xff.
                            buf.push(IAC);
                            continue;
                        }
                        // IAC <other> inside a block: keep scanning.
                        continue;
                    }
                    if b == IAC {
                        *iac_seen = true;
                    } else {
                        buf.push(b);
                    }
                }
            }
        }

        frames
    }
}

/// The server's capability offer, sent once on accept: `IAC DO GMCP`.
pub fn gmcp_offer() -> [u8; 3] {
    [IAC, DO, GMCP]
}

/// Wraps a `Package.Message {json}` payload in GMCP sub-negotiation framing.
pub fn encode_gmcp(package: &str, message: &str, data: &serde_json::Value) -> Vec<u8> {
    let body = format!("{package}.{message} {data}");
    let mut out = Vec::with_capacity(body.len() + 5);
    out.extend_from_slice(&[IAC, SB, GMCP]);
    out.extend_from_slice(body.as_bytes());
    out.extend_from_slice(&[IAC, SE]);
    out
}
