//! Registry - resolves `scheme://argument` strings to sinks
//!
//! Lookup order: registered constructors first (so a registration can
//! shadow a built-in), then the built-in schemes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use contracts::{BoxSink, ListenConfig, SinkError};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use crate::scheme::{Scheme, SchemeInfo};
use crate::sinks::{FileSink, HttpSink, StdioSink, StreamSink, WsSink};

/// Type-erased sink constructor
pub type Constructor =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<BoxSink, SinkError>> + Send + Sync>;

/// Split a resolution string on its first `://`
///
/// A string without a separator is all scheme with an empty argument.
pub fn split_spec(spec: &str) -> (&str, &str) {
    spec.split_once("://").unwrap_or((spec, ""))
}

/// Output registry
pub struct Registry {
    constructors: RwLock<HashMap<String, Constructor>>,
    listen: ListenConfig,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with built-ins only and default listener settings
    pub fn new() -> Self {
        Self::with_config(ListenConfig::default())
    }

    /// Registry whose listening sinks use `listen`
    pub fn with_config(listen: ListenConfig) -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
            listen,
        }
    }

    pub fn listen_config(&self) -> &ListenConfig {
        &self.listen
    }

    /// Register a constructor for `scheme`; the last registration wins
    pub fn register<F, Fut>(&self, scheme: impl Into<String>, constructor: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BoxSink, SinkError>> + Send + 'static,
    {
        let scheme = scheme.into();
        let constructor: Constructor = Arc::new(move |argument| constructor(argument).boxed());

        let replaced = self
            .constructors
            .write()
            .insert(scheme.clone(), constructor)
            .is_some();
        let shadows_builtin = Scheme::from_name(&scheme).is_some();
        info!(scheme = %scheme, replaced, shadows_builtin, "Output scheme registered");
    }

    /// Whether a constructor is registered for `scheme`
    pub fn is_registered(&self, scheme: &str) -> bool {
        self.constructors.read().contains_key(scheme)
    }

    /// Built-in schemes followed by registered ones
    pub fn schemes(&self) -> Vec<SchemeInfo> {
        let mut list: Vec<SchemeInfo> = Scheme::ALL.iter().map(Scheme::info).collect();

        let mut registered: Vec<String> = self.constructors.read().keys().cloned().collect();
        registered.sort();
        for name in registered {
            if Scheme::from_name(&name).is_some() {
                continue;
            }
            list.push(SchemeInfo {
                name,
                alias: None,
                listener: false,
                requires_argument: false,
                usage: String::new(),
                builtin: false,
            });
        }
        list
    }

    /// Resolve `scheme://argument` into a ready sink
    ///
    /// # Errors
    /// `UnknownScheme`, `MissingArgument`, or whatever the constructor
    /// reports (`InvalidArgument`, `Bind`, `Dial`).
    #[instrument(name = "registry_resolve", skip(self))]
    pub async fn resolve(&self, spec: &str) -> Result<BoxSink, SinkError> {
        let (scheme, argument) = split_spec(spec);

        // Clone out so the lock is not held across the constructor
        let registered = self.constructors.read().get(scheme).cloned();
        if let Some(constructor) = registered {
            debug!(scheme, "Using registered constructor");
            return constructor(argument.to_string()).await;
        }

        let builtin = Scheme::from_name(scheme).ok_or_else(|| SinkError::unknown_scheme(scheme))?;
        if builtin.requires_argument() && argument.is_empty() {
            return Err(SinkError::missing_argument(builtin.name()));
        }

        let sink = self.build(builtin, argument).await?;
        debug!(scheme = builtin.name(), "Output resolved");
        Ok(sink)
    }

    async fn build(&self, scheme: Scheme, argument: &str) -> Result<BoxSink, SinkError> {
        let sink: BoxSink = match scheme {
            Scheme::Stdout => Box::new(StdioSink::stdout()),
            Scheme::Stderr => Box::new(StdioSink::stderr()),
            Scheme::File => Box::new(FileSink::open(argument).await?),
            Scheme::Http => Box::new(HttpSink::post("http", &format!("http://{}", argument))?),
            Scheme::Https => Box::new(HttpSink::post("https", &format!("https://{}", argument))?),
            Scheme::Tcp => Box::new(StreamSink::tcp(argument).await?),
            Scheme::Unix => Box::new(StreamSink::unix(argument).await?),
            Scheme::Ws => Box::new(WsSink::connect("ws", &format!("ws://{}", argument)).await?),
            Scheme::Wss => Box::new(WsSink::connect("wss", &format!("wss://{}", argument)).await?),
            Scheme::TcpListen => Box::new(broadcast::tcp_listen(argument, &self.listen).await?),
            Scheme::UnixListen => Box::new(broadcast::unix_listen(argument, &self.listen).await?),
            Scheme::HttpListen => Box::new(broadcast::http_listen(argument, &self.listen).await?),
            Scheme::WsListen => Box::new(broadcast::ws_listen(argument, &self.listen).await?),
        };
        Ok(sink)
    }
}
