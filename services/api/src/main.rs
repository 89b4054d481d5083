use hopelink_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("hopelink error: {err}");
        std::process::exit(1);
    }
}
