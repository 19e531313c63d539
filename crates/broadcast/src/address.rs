//! Listen argument parsing
//!
//! `:9000` binds every interface, `host:port` binds one. HTTP-mounted
//! listeners accept an optional mount path after the port: `:8080/events`.

/// Parsed HTTP listen argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpListenAddress {
    /// Socket address to bind
    pub address: String,
    /// Mount path, `None` serves every path
    pub path: Option<String>,
}

/// Normalize a `host:port` / `:port` argument into a bindable address
pub fn socket_address(argument: &str) -> Result<String, String> {
    let (host, port) = argument
        .rsplit_once(':')
        .ok_or_else(|| "expected host:port or :port".to_string())?;

    port.parse::<u16>()
        .map_err(|e| format!("invalid port '{}': {}", port, e))?;

    let host = match host {
        "" => "0.0.0.0",
        h => h,
    };
    Ok(format!("{}:{}", host, port))
}

/// Split `[host]:port[/path]` into bind address and mount path
pub fn http_address(argument: &str) -> Result<HttpListenAddress, String> {
    let (authority, path) = match argument.find('/') {
        Some(idx) => (&argument[..idx], Some(&argument[idx..])),
        None => (argument, None),
    };

    let address = socket_address(authority)?;
    let path = path.filter(|p| *p != "/").map(str::to_string);

    Ok(HttpListenAddress { address, path })
}
