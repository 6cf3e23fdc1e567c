use anyhow::{Context, Result};
use axum::Router;
use flowarden_api::ApiClient;
use flowarden_core::{config::ApiConfig, models::RepoScope};
use tokio::{net::TcpListener, task::JoinHandle};

pub const SCOPE: RepoScope = RepoScope { installation_id: 55, repository_id: 7001 };

pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) { self.handle.abort(); }
}

/// Bind a throwaway server on an ephemeral port and serve `router` until the
/// guard drops.
pub async fn spawn(router: Router) -> Result<TestServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await.context("bind test server")?;
    let addr = listener.local_addr().context("test server addr")?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(TestServer { base_url: format!("http://{addr}"), handle })
}

pub fn client(server: &TestServer) -> ApiClient {
    ApiClient::new(&ApiConfig { base_url: server.base_url.clone() })
}
