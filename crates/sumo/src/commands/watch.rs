//! `sumo watch`: run the workers and print notifications until Ctrl-C.

use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use sumo_core::Manager;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(manager: &Manager, global: &GlobalOpts) -> Result<(), CliError> {
    let printer = super::printer(global);
    let mut rx = manager.notifications();
    manager.start().await;

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            msg = rx.recv() => match msg {
                Ok(note) => printer.print(&note),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notification output fell behind"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}
