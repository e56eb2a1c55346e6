//! Service-specific tests
//!
//! Each service has its own test file; the helpers below stand up a minimal
//! in-process WebSocket peer for them.


pub mod common {
    use std::future::Future;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_tungstenite::{accept_async, WebSocketStream};
    use url::Url;

    /// Standard timeout for async operations in tests
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await
    }

    /// Accept exactly one WebSocket session and hand it to `session`
    pub async fn serve_once<F, Fut>(session: F) -> (Url, JoinHandle<()>)
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept test connection");
            let ws = accept_async(stream).await.expect("server handshake");
            session(ws).await;
        });

        (ws_url(addr, "/runCase?case=1"), handle)
    }

    /// Address nothing listens on
    pub async fn refused_url() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        drop(listener);
        ws_url(addr, "/getCaseCount")
    }

    pub fn ws_url(addr: SocketAddr, path: &str) -> Url {
        Url::parse(&format!("ws://{addr}{path}")).expect("valid test url")
    }
}
