#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up logging; RUST_LOG overrides the default level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("playbook_designer=info"))
        .init();

    // Run the command-line front end
    playbook_designer::run_cli().await
}
