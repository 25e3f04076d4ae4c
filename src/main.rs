use image_sync::cli::{Args, Runner};

#[tokio::main]
async fn main() {
    let args = Args::parse_args();

    let runner = match Runner::new(args) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("❌ Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    match runner.run().await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            runner.output().error(&e.to_string());
            std::process::exit(1);
        }
    }
}
