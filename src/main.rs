#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gazeboard_lib::run(std::env::args().skip(1).collect()).await
}
