//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 解析入口 (Registry) 行为
//! - 监听类输出的端到端广播
//! - 配置 → 输出 的完整流程

#[cfg(test)]
mod registry_tests {
    use contracts::{BoxSink, Sink, SinkError};
    use outputs::{Registry, Scheme};

    /// 每个需要参数的内置 scheme，空参数都报 MissingArgument
    #[tokio::test]
    async fn test_missing_argument_for_every_builtin() {
        let registry = Registry::new();
        let mut checked = 0;
        for scheme in Scheme::ALL {
            if !scheme.requires_argument() {
                continue;
            }
            let err = registry
                .resolve(&format!("{}://", scheme.name()))
                .await
                .err()
                .unwrap();
            assert_eq!(err.to_string(), format!("{}: no address supplied", scheme.name()));
            checked += 1;
        }
        assert_eq!(checked, 11);
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let err = Registry::new()
            .resolve("unknown-scheme://x")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SinkError::UnknownScheme { .. }));
    }

    struct Discard;

    #[async_trait::async_trait]
    impl Sink for Discard {
        fn name(&self) -> &str {
            "discard"
        }

        async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
            Ok(buf.len())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    /// 注册同名 scheme 覆盖内置实现
    #[tokio::test]
    async fn test_register_overrides_builtin_listener() {
        let registry = Registry::new();
        registry.register("tcp-listen", |_| async { Ok(Box::new(Discard) as BoxSink) });

        let mut sink = registry.resolve("tcp-listen://:0").await.unwrap();
        assert_eq!(sink.name(), "discard");
        assert_eq!(sink.write(b"abc").await.unwrap(), 3);
        assert!(sink.local_addr().is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::{Duration, Instant};

    use broadcast::Broadcaster;
    use contracts::{ListenConfig, Sink, SinkError};
    use futures::StreamExt;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpStream, UnixStream};

    async fn wait_for_subscribers(sink: &Broadcaster, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.subscriber_count() != count {
            assert!(
                Instant::now() < deadline,
                "expected {} subscribers, have {}",
                count,
                sink.subscriber_count()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn read_all(mut client: TcpStream) -> Vec<u8> {
        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(10), client.read_to_end(&mut received))
            .await
            .expect("client did not see EOF")
            .expect("read failed");
        received
    }

    /// N 个客户端各收到一份完整、有序的副本
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_tcp_listen_every_client_gets_one_copy() {
        let mut sink = broadcast::tcp_listen("127.0.0.1:0", &ListenConfig::default())
            .await
            .unwrap();
        let addr = sink.local_addr().unwrap();

        let mut readers = Vec::new();
        for _ in 0..3 {
            let client = TcpStream::connect(&addr).await.unwrap();
            readers.push(tokio::spawn(read_all(client)));
        }
        wait_for_subscribers(&sink, 3).await;

        assert_eq!(sink.write(b"hello\n").await.unwrap(), 6);
        assert_eq!(sink.write(b"world\n").await.unwrap(), 6);
        sink.close().await.unwrap();

        for reader in readers {
            assert_eq!(reader.await.unwrap(), b"hello\nworld\n");
        }
        assert_eq!(sink.metrics().accepted_count(), 3);
    }

    /// 不读取的慢客户端被断开，快客户端不受影响
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slow_client_dropped_fast_client_unaffected() {
        const PAYLOAD_SIZE: usize = 512 * 1024;
        const PAYLOADS: usize = 60;

        let config = ListenConfig {
            shutdown_timeout_ms: 500,
            ..Default::default()
        };
        let mut sink = broadcast::tcp_listen("127.0.0.1:0", &config).await.unwrap();
        let addr = sink.local_addr().unwrap();

        let fast = tokio::spawn(read_all(TcpStream::connect(&addr).await.unwrap()));
        wait_for_subscribers(&sink, 1).await;
        let slow = TcpStream::connect(&addr).await.unwrap();
        wait_for_subscribers(&sink, 2).await;

        let started = Instant::now();
        for i in 0..PAYLOADS {
            let payload = vec![i as u8; PAYLOAD_SIZE];
            assert_eq!(sink.write(&payload).await.unwrap(), PAYLOAD_SIZE);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Producer never waited on the stalled client
        assert!(started.elapsed() < Duration::from_secs(10));

        assert_eq!(sink.subscriber_count(), 1);
        assert_eq!(sink.metrics().dropped_slow_count(), 1);

        // Dropped client sees a truncated stream followed by EOF
        let slow_received = read_all(slow).await;
        assert!(slow_received.len() < PAYLOAD_SIZE * PAYLOADS);

        sink.close().await.unwrap();
        let fast_received = fast.await.unwrap();
        assert_eq!(fast_received.len(), PAYLOAD_SIZE * PAYLOADS);
        for (i, chunk) in fast_received.chunks(PAYLOAD_SIZE).enumerate() {
            assert!(chunk.iter().all(|b| *b == i as u8), "payload {} corrupted", i);
        }
    }

    /// close 断开所有客户端；再次 close 无害；close 后 write 报 Closed
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_disconnects_and_rejects_writes() {
        let mut sink = broadcast::tcp_listen("127.0.0.1:0", &ListenConfig::default())
            .await
            .unwrap();
        let addr = sink.local_addr().unwrap();

        let a = tokio::spawn(read_all(TcpStream::connect(&addr).await.unwrap()));
        let b = tokio::spawn(read_all(TcpStream::connect(&addr).await.unwrap()));
        wait_for_subscribers(&sink, 2).await;

        sink.close().await.unwrap();
        assert!(a.await.unwrap().is_empty());
        assert!(b.await.unwrap().is_empty());

        sink.close().await.unwrap();
        let err = sink.write(b"late").await.unwrap_err();
        assert!(matches!(err, SinkError::Closed { .. }));
    }

    /// 后加入的客户端看不到之前的数据
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_late_subscriber_misses_earlier_writes() {
        let mut sink = broadcast::tcp_listen("127.0.0.1:0", &ListenConfig::default())
            .await
            .unwrap();
        let addr = sink.local_addr().unwrap();

        let early = tokio::spawn(read_all(TcpStream::connect(&addr).await.unwrap()));
        wait_for_subscribers(&sink, 1).await;
        sink.write(b"before ").await.unwrap();

        let late = tokio::spawn(read_all(TcpStream::connect(&addr).await.unwrap()));
        wait_for_subscribers(&sink, 2).await;
        sink.write(b"after").await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(early.await.unwrap(), b"before after");
        assert_eq!(late.await.unwrap(), b"after");
    }

    /// unix-listen 关闭时删除 socket 文件
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unix_listen_removes_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fanout.sock");

        let registry = outputs::Registry::new();
        let mut sink = registry
            .resolve(&format!("unix-listen://{}", path.display()))
            .await
            .unwrap();
        assert!(path.exists());

        let mut client = UnixStream::connect(&path).await.unwrap();
        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            client.read_to_end(&mut received).await.unwrap();
            received
        });

        // Boxed sink: keep writing until the subscriber has been attached
        for _ in 0..50 {
            sink.write(b"x").await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sink.close().await.unwrap();

        let received = reader.await.unwrap();
        assert!(!received.is_empty());
        assert!(received.iter().all(|b| *b == b'x'));
        assert!(!path.exists());
    }

    /// http-listen 向多个并发 GET 客户端流式输出，并遵守挂载路径
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_http_listen_streams_and_respects_mount_path() {
        let mut sink = broadcast::http_listen("127.0.0.1:0/events", &ListenConfig::default())
            .await
            .unwrap();
        let base = format!("http://{}", sink.local_addr().unwrap());

        let missing = reqwest::get(format!("{}/other", base)).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let mut clients = Vec::new();
        for _ in 0..3 {
            let response = reqwest::get(format!("{}/events", base)).await.unwrap();
            assert!(response.status().is_success());
            clients.push(tokio::spawn(async move { response.bytes().await.unwrap() }));
        }
        wait_for_subscribers(&sink, 3).await;

        for line in ["event: 1\n", "event: 2\n"] {
            sink.write(line.as_bytes()).await.unwrap();
        }
        sink.close().await.unwrap();

        for client in clients {
            assert_eq!(client.await.unwrap().as_ref(), b"event: 1\nevent: 2\n");
        }
    }

    /// "a","bb","ccc" 作为三个独立的 WebSocket 消息按序到达
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_ws_listen_delivers_distinct_messages() {
        let mut sink = broadcast::ws_listen("127.0.0.1:0", &ListenConfig::default())
            .await
            .unwrap();
        let url = format!("ws://{}/", sink.local_addr().unwrap());

        let (mut first, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        let (mut second, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
        wait_for_subscribers(&sink, 2).await;

        for payload in ["a", "bb", "ccc"] {
            sink.write(payload.as_bytes()).await.unwrap();
        }

        for client in [&mut first, &mut second] {
            for expected in ["a", "bb", "ccc"] {
                let message = client.next().await.unwrap().unwrap();
                assert!(message.is_binary());
                assert_eq!(message.into_data(), expected.as_bytes().to_vec());
            }
        }

        sink.close().await.unwrap();
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(Ok(message)) = first.next().await {
                if message.is_close() {
                    break;
                }
            }
        })
        .await;
        assert!(drained.is_ok(), "client never saw the close");
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::Sink;
    use outputs::Registry;

    /// 配置文件 → Registry → 输出
    #[tokio::test]
    async fn test_config_outputs_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let content = format!(
            r#"
[listen]
queue_capacity = 4

[[outputs]]
uri = "tcp-listen://127.0.0.1:0"

[[outputs]]
uri = "file://{}"
"#,
            log.display()
        );

        let config = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();
        let registry = Registry::with_config(config.listen.clone());
        assert_eq!(registry.listen_config().queue_capacity, 4);

        let mut sinks = Vec::new();
        for output in &config.outputs {
            sinks.push(registry.resolve(&output.uri).await.unwrap());
        }
        assert!(sinks[0].local_addr().is_some());

        for sink in sinks.iter_mut() {
            sink.write(b"line\n").await.unwrap();
        }
        for sink in sinks.iter_mut() {
            sink.close().await.unwrap();
        }

        assert_eq!(std::fs::read(&log).unwrap(), b"line\n");
    }
}
