//! Built-in output schemes

use serde::Serialize;

/// Every scheme resolvable without registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Stdout,
    Stderr,
    File,
    Http,
    Https,
    HttpListen,
    Tcp,
    TcpListen,
    Unix,
    UnixListen,
    Ws,
    Wss,
    WsListen,
}

impl Scheme {
    /// All built-ins in display order
    pub const ALL: [Scheme; 13] = [
        Scheme::Stdout,
        Scheme::Stderr,
        Scheme::File,
        Scheme::Http,
        Scheme::Https,
        Scheme::HttpListen,
        Scheme::Tcp,
        Scheme::TcpListen,
        Scheme::Unix,
        Scheme::UnixListen,
        Scheme::Ws,
        Scheme::Wss,
        Scheme::WsListen,
    ];

    /// Look up a scheme by name, `-server` aliases included
    pub fn from_name(name: &str) -> Option<Self> {
        let scheme = match name {
            "stdout" => Self::Stdout,
            "stderr" => Self::Stderr,
            "file" => Self::File,
            "http" => Self::Http,
            "https" => Self::Https,
            "http-listen" | "http-server" => Self::HttpListen,
            "tcp" => Self::Tcp,
            "tcp-listen" | "tcp-server" => Self::TcpListen,
            "unix" => Self::Unix,
            "unix-listen" | "unix-server" => Self::UnixListen,
            "ws" => Self::Ws,
            "wss" => Self::Wss,
            "ws-listen" | "ws-server" => Self::WsListen,
            _ => return None,
        };
        Some(scheme)
    }

    /// Canonical name (errors and sink names use this, never the alias)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::File => "file",
            Self::Http => "http",
            Self::Https => "https",
            Self::HttpListen => "http-listen",
            Self::Tcp => "tcp",
            Self::TcpListen => "tcp-listen",
            Self::Unix => "unix",
            Self::UnixListen => "unix-listen",
            Self::Ws => "ws",
            Self::Wss => "wss",
            Self::WsListen => "ws-listen",
        }
    }

    pub fn alias(&self) -> Option<&'static str> {
        match self {
            Self::HttpListen => Some("http-server"),
            Self::TcpListen => Some("tcp-server"),
            Self::UnixListen => Some("unix-server"),
            Self::WsListen => Some("ws-server"),
            _ => None,
        }
    }

    /// Only the process streams accept an empty argument
    pub fn requires_argument(&self) -> bool {
        !matches!(self, Self::Stdout | Self::Stderr)
    }

    /// Whether the scheme accepts subscribers instead of dialing out
    pub fn is_listener(&self) -> bool {
        matches!(
            self,
            Self::HttpListen | Self::TcpListen | Self::UnixListen | Self::WsListen
        )
    }

    /// Human-readable argument shape
    pub fn usage(&self) -> &'static str {
        match self {
            Self::Stdout | Self::Stderr => "",
            Self::File | Self::Unix | Self::UnixListen => "/path",
            Self::Http | Self::Https | Self::Ws | Self::Wss => "host[:port][/path]",
            Self::Tcp => "host:port",
            Self::TcpListen => "[host]:port",
            Self::HttpListen | Self::WsListen => "[host]:port[/path]",
        }
    }

    pub fn info(&self) -> SchemeInfo {
        SchemeInfo {
            name: self.name().to_string(),
            alias: self.alias().map(str::to_string),
            listener: self.is_listener(),
            requires_argument: self.requires_argument(),
            usage: self.usage().to_string(),
            builtin: true,
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Listing entry for `fanout schemes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemeInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub listener: bool,
    pub requires_argument: bool,
    pub usage: String,
    pub builtin: bool,
}
