use prompt_runner::{run_once, Credentials};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    // Relies on OPENAI_API_KEY and optionally OPENAI_BASE_URL, from the
    // environment or a `.env` file.
    let credentials = Credentials::from_env();
    log::debug!("using {credentials:?}");

    println!("{}", run_once(credentials).await);
}
