#[tokio::main]
async fn main() {
    if let Err(e) = pollgate_lib::run().await {
        eprintln!("fatal: {}", e);
        std::process::exit(1);
    }
}
