/// HTTPサーバーモジュール
///
/// hyperで接続を受け付け、リクエストをブロッキングスレッド上のハンドラーに渡します。
pub mod request;
pub mod response;
pub mod router;

pub use request::ApiRequest;
pub use response::{error_reply, ApiReply};

use crate::shared::errors::{AppError, AppResult};
use crate::AppState;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};

/// バックオフィスAPIサーバー
pub struct HttpServer {
    state: Arc<AppState>,
}

impl HttpServer {
    /// 新しいサーバーを作成する
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// 設定されたアドレスで待ち受けを開始する
    ///
    /// Ctrl+Cを受け取るまで戻らない
    pub async fn serve(self) -> AppResult<()> {
        let bind_address = self.state.config.bind_address.clone();
        let listener = TcpListener::bind(&bind_address).await.map_err(|e| {
            log::error!("アドレスのバインドに失敗しました: {bind_address}, {e}");
            AppError::Io(e)
        })?;
        log::info!("HTTPサーバーを開始しました: http://{bind_address}");

        tokio::select! {
            result = self.serve_listener(listener) => result,
            _ = tokio::signal::ctrl_c() => {
                log::info!("終了シグナルを受信しました。サーバーを停止します");
                Ok(())
            }
        }
    }

    /// 既存のリスナーで接続を受け付ける
    pub async fn serve_listener(self, listener: TcpListener) -> AppResult<()> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    log::debug!("接続を受け付けました: {peer}");
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        handle_connection(stream, state).await;
                    });
                }
                Err(e) => {
                    // 一時的なエラー（ファイルディスクリプタ枯渇など）では止めない
                    log::error!("接続受け入れエラー: {e}");
                }
            }
        }
    }
}

/// TCP接続を処理する
async fn handle_connection(stream: TcpStream, state: Arc<AppState>) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));

    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
        log::error!("HTTP接続処理エラー: {err}");
    }
}

/// HTTPリクエストを処理する
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<String>, Infallible> {
    let started = Instant::now();

    let api_req = match ApiRequest::from_hyper(req).await {
        Ok(api_req) => api_req,
        Err(e) => return Ok(error_reply(&e, "-").into_response()),
    };
    let method = api_req.method.clone();
    let path = api_req.path.clone();
    let request_id = api_req.request_id.clone();

    // ハンドラーはデータベースを同期的に扱うため専用スレッドで実行する
    let reply = tokio::task::spawn_blocking(move || router::dispatch(&state, &api_req))
        .await
        .unwrap_or_else(|e| {
            error_reply(
                &AppError::internal(format!("ハンドラーの実行に失敗しました: {e}")),
                &request_id,
            )
        });

    log::info!(
        "{method} {path} -> {} ({}ms) request_id={request_id}",
        reply.status.as_u16(),
        started.elapsed().as_millis()
    );

    Ok(reply.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::ServerConfig;
    use crate::shared::database::create_in_memory_connection;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn send_raw(addr: std::net::SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_requests_over_tcp() {
        let state = Arc::new(AppState::new(
            create_in_memory_connection().unwrap(),
            ServerConfig::for_tests(),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(HttpServer::new(state).serve_listener(listener));

        let health = send_raw(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(health.starts_with("HTTP/1.1 200"));
        assert!(health.contains(r#"{"status":"ok"}"#));

        let unauthorized = send_raw(
            addr,
            "GET /api/admin/clients HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(unauthorized.starts_with("HTTP/1.1 401"));
        assert!(unauthorized.contains("application/json"));
    }
}
