#[tokio::main]
async fn main() {
    if let Err(e) = clicksight_lib::run().await {
        tracing::error!(error = %e, "ClickSight exited");
        eprintln!("clicksight: {e}");
        std::process::exit(1);
    }
}
