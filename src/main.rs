#[tokio::main]
async fn main() {
    if let Err(error) = weatherhub::run().await {
        eprintln!("weatherhub failed to start: {error}");
        std::process::exit(1);
    }
}
