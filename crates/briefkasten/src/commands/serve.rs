//! `briefkasten serve`

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::load;
use crate::cli::{GlobalOpts, ServeArgs};
use crate::error::CliError;

pub async fn handle(args: ServeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = load(global)?;
    let mut server = cfg.server_config()?;
    if let Some(bind) = args.bind {
        server.bind = bind;
    }
    if args.data_file.is_some() {
        server.data_file = args.data_file;
    }

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
        }
        trigger.cancel();
    });

    briefkasten_server::serve(&server, shutdown).await?;
    Ok(())
}
