//! `sumo wifi`: provision WiFi credentials.

use secrecy::SecretString;
use tracing::info;

use sumo_core::{ConnectionState, Manager, UpdateKind, WifiCredential};

use crate::cli::{GlobalOpts, WifiArgs};
use crate::error::CliError;

pub async fn handle(manager: &Manager, args: WifiArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password(format!("Password for {}: ", args.ssid))?,
    };
    // Reject bad input before waiting for hardware.
    let credential = WifiCredential::new(args.ssid, SecretString::from(password))?;

    let printer = super::printer(global);
    let mut rx = manager.notifications();
    manager.start().await;

    let port =
        super::wait_for_device(manager, &mut rx, &printer, args.wait.wait, ConnectionState::is_connected)
            .await?;
    info!(%port, ssid = %credential.ssid, "requesting WiFi provisioning");
    manager.request_config_update(credential.ssid, credential.password)?;

    let outcome = super::follow_update(manager, &mut rx, &printer, UpdateKind::Config).await?;
    super::outcome_result(UpdateKind::Config, outcome)
}
