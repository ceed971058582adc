use dotenvy::dotenv;
use snafu::ResultExt;

use speakon::config::Config;
use speakon::error::{ApplicationError, BackendSnafu};
use speakon::{logger, repl};

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::new()?;

    let _guard = logger::init(&config)?;

    let backend = config.backend().context(BackendSnafu)?;
    let mut repl = repl::Repl::new()?;

    repl::start(&mut repl, &config, backend).await?;

    Ok(())
}
