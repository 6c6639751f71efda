#[tokio::main]
async fn main() {
    if let Err(e) = subtrack_lib::run().await {
        log::error!("アプリケーションの実行中にエラーが発生しました: {e}");
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}
