#[tokio::main]
async fn main() {
    shul::start_server().await;
}
