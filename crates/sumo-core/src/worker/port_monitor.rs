// ── Port monitor ──
//
// Sole source of truth for device presence. Each poll compares the first
// managed port against the session binding and reacts to the edge only.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{BlockingHandle, WorkerContext, run_blocking, run_held};
use crate::device::select_managed_port;
use crate::error::CoreError;
use crate::model::{Dialog, PortEvent};
use crate::session::{ConnectionState, TransportHold, TransportOwner};

pub(crate) const LOADING_NETWORKS: &str = "Loading WiFi networks...";
pub(crate) const NETWORKS_LOADED: &str = "Successfully loaded WiFi networks";
pub(crate) const NETWORKS_FAILED: &str = "Error loading WiFi networks";
pub(crate) const CONNECT_PROMPT: &str = "Please connect your SumoRobot";

/// One poll of the OS port list.
pub(crate) async fn poll(ctx: &Arc<WorkerContext>) {
    let ports = Arc::clone(&ctx.backend.ports);
    let listed = run_blocking(ctx.config.serial_timeout, "port enumeration", move || {
        ports.list_ports()
    })
    .await;
    let ports = match listed {
        Ok(ports) => ports,
        Err(e) => {
            warn!(error = %e, "port enumeration failed, keeping current binding");
            return;
        }
    };

    let found = select_managed_port(&ports, &ctx.config.vendor_prefixes)
        .map(|p| p.device_path.clone());
    let current = ctx.session.connection();

    match (found, current) {
        (Some(port), ConnectionState::Probing(bound)) if port == bound => {
            // Transport was busy last time.
            probe(ctx, port).await;
        }
        (Some(port), current) if current.port() != Some(port.as_str()) => {
            arrive(ctx, port).await;
        }
        (None, ConnectionState::Disconnected) | (Some(_), _) => {}
        (None, _) => depart(ctx),
    }
}

async fn arrive(ctx: &Arc<WorkerContext>, port: String) {
    info!(%port, "SumoRobot connected");
    ctx.session
        .set_connection(ConnectionState::Probing(port.clone()));
    ctx.notifier.port(PortEvent::Connected(port.clone()));
    ctx.notifier.warning(LOADING_NETWORKS);
    probe(ctx, port).await;
}

fn depart(ctx: &WorkerContext) {
    info!("SumoRobot disconnected");
    ctx.session.set_connection(ConnectionState::Disconnected);
    ctx.notifier.port(PortEvent::Disconnected);
    ctx.notifier.warning(CONNECT_PROMPT);
}

/// Load the network list to confirm the firmware answers.
async fn probe(ctx: &Arc<WorkerContext>, port: String) {
    let Some(lease) = ctx.session.lease(TransportOwner::PortMonitor) else {
        debug!(%port, "transport busy, probe deferred");
        return;
    };

    let hold = Arc::new(lease);
    let result = load_networks(ctx, &port, &hold).await;
    drop(hold);

    match result {
        Ok(networks) => {
            info!(%port, count = networks.len(), "WiFi networks loaded");
            ctx.session
                .set_connection(ConnectionState::Connected(port));
            ctx.notifier.port(PortEvent::NetworksLoaded(networks));
            ctx.notifier.info(NETWORKS_LOADED);
        }
        Err(e) => {
            warn!(%port, error = %e, "network probe failed");
            ctx.session
                .set_connection(ConnectionState::Unresponsive(port));
            let mut hints = vec![
                "Try reconnecting the SumoRobot",
                "Try updating the firmware (close this dialog first)",
            ];
            hints.extend(e.hint());
            ctx.notifier
                .dialog(Dialog::error(NETWORKS_FAILED, &hints, format!("{e}\n\n{e:?}")));
            ctx.notifier.error(NETWORKS_FAILED);
        }
    }
}

async fn load_networks(
    ctx: &WorkerContext,
    port: &str,
    hold: &TransportHold,
) -> Result<Vec<String>, CoreError> {
    let timeout = ctx.config.serial_timeout;
    let transport = Arc::clone(&ctx.backend.transport);
    let path = port.to_owned();
    let channel = run_held(hold, timeout, "open channel", move || transport.open_channel(&path)).await?;
    let mut channel = BlockingHandle::new(channel, timeout, Arc::clone(hold));

    match channel.call("list networks", |c| c.list_networks()).await {
        Ok(networks) => {
            channel.close().await?;
            Ok(networks)
        }
        Err(e) => {
            channel.close_quietly().await;
            Err(e)
        }
    }
}
