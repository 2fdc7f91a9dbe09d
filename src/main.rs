//! cage-packer: online 3D bin-packing decision service.
//!
//! Serves placement decisions for a robotic palletizing cell over HTTP.
//! Each decision picks an item from a small lookahead window and a
//! feasible position inside the cage, considering weight limits,
//! stacking stability, insertion paths and center-of-gravity balance.

use log::LevelFilter;

use cage_packer::api;
use cage_packer::config::AppConfig;

fn init_logger(level_filter: LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{:<5}] [{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level_filter)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("could not load .env: {}", err);
        }
    }

    let level = match cfg!(debug_assertions) {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };
    if let Err(err) = init_logger(level) {
        eprintln!("could not initialize logger: {}", err);
    }

    let config = AppConfig::from_env();
    api::start_api_server(config.api, config.solver, config.cage).await;
}
