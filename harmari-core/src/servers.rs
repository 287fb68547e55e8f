//! Game server whitelist.
//!
//! Server names are user-supplied through a modal text input, so every
//! lookup validates against this list before anything touches the request
//! store or the remote API.

/// All live game servers, as typed by users (exact match, no trimming).
pub const GAME_SERVERS: [&str; 7] = [
    "데이안",
    "아이라",
    "던컨",
    "알리사",
    "메이븐",
    "라사",
    "칼릭스",
];

/// Whether `name` is a known game server.
pub fn is_known_server(name: &str) -> bool {
    GAME_SERVERS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_servers_are_accepted() {
        for server in GAME_SERVERS {
            assert!(is_known_server(server));
        }
    }

    #[test]
    fn unknown_servers_are_rejected() {
        assert!(!is_known_server("InvalidServer"));
        assert!(!is_known_server(""));
        // No trimming: whitespace-padded input is not a match
        assert!(!is_known_server(" 데이안"));
        assert!(!is_known_server("데이안 "));
    }
}
