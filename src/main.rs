#[tokio::main]
async fn main() {
    if let Err(e) = orano_backoffice_lib::run().await {
        log::error!("アプリケーションの実行中にエラーが発生しました: {}", e.details());
        eprintln!("起動に失敗しました: {e}");
        std::process::exit(1);
    }
}
