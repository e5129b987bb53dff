use std::net::TcpListener;

use env_logger::Env;
use scheme_scout::{configuration::get_configuration, services::Pipeline, startup::run};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    log::info!(
        "Listening on {}, webdriver at {}",
        address,
        configuration.browser.webdriver_url
    );

    let pipeline = Pipeline::from_settings(&configuration);

    run(listener, pipeline)?.await
}
