#[tokio::main]
async fn main() -> ontoscope::Result<()> {
    ontoscope::cli::main().await
}
