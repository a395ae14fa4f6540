#[tokio::main]
async fn main() {
    if let Err(e) = dosekeeper_lib::run().await {
        tracing::error!(error = %e, "Dosekeeper exited with an error");
        eprintln!("dosekeeper: {e}");
        std::process::exit(1);
    }
}
