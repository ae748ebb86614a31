use clap::Parser;
use tracing::error;

use assumerole::app::{App, Args};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = args.settings()?;
    settings.init_logging()?;

    match App::try_from(args)?.run(&settings).await {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("error:{:#}", e);
            Err(e)
        }
    }
}
