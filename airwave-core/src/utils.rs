/// Public STUN hint used when no ICE servers are configured.
pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

/// Value the relay puts in the `sender` field of its own replies.
pub const SERVER_SENDER: &str = "server";

/// WebSocket close codes treated as an intentional disconnect.
pub const CLEAN_CLOSE_CODES: [u16; 2] = [1000, 1001];

pub fn is_clean_close(code: u16) -> bool {
    CLEAN_CLOSE_CODES.contains(&code)
}
