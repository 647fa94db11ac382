// ── Config update worker ──
//
// Read-modify-write of the device configuration document over the remote
// file channel, followed by a reopen to reset the board.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use super::{BlockingHandle, WorkerContext, close_if_open, run_held};
use crate::device::RemoteFileChannel;
use crate::error::CoreError;
use crate::model::{Dialog, RemoteConfig, WifiCredential};
use crate::session::{Job, TransportHold, UpdateKind, UpdateOutcome};

pub(crate) const ADDING: &str = "Adding WiFi credentials...";
pub(crate) const ADDED: &str = "Successfully added WiFi credentials";
pub(crate) const ADD_FAILED: &str = "Error adding WiFi credentials";

const NEXT_STEPS: &str = "<p>Now turn the robot on and remove the USB cable. Wait for the blue LED \
    under the robot to be steady on and head over to the SumoRobot programming interface:</p>\
    <a href=\"http://sumo.robokoding.com\">sumo.robokoding.com</a>";

type Channel = BlockingHandle<dyn RemoteFileChannel>;

/// Run a pending config update, if any.
pub(crate) async fn process(ctx: &Arc<WorkerContext>) {
    let job = match ctx.session.begin(UpdateKind::Config) {
        Ok(Some(job)) => job,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "config update dropped");
            report_failure(ctx, &e);
            return;
        }
    };
    let outcome = match run(ctx, &job).await {
        Ok(()) => UpdateOutcome::Succeeded,
        Err(e) => {
            warn!(port = %job.port, error = %e, "config update failed");
            report_failure(ctx, &e);
            UpdateOutcome::Failed
        }
    };
    ctx.session.finish(job, outcome);
}

async fn run(ctx: &WorkerContext, job: &Job) -> Result<(), CoreError> {
    let credential = job
        .credential
        .clone()
        .ok_or_else(|| CoreError::Internal("config update without credential".into()))?;
    ctx.notifier.warning(ADDING);

    let mut channel: Option<Channel> = None;
    let result = provision(ctx, job, &credential, &mut channel).await;
    if result.is_err() {
        close_if_open(&mut channel).await;
    }
    result?;

    info!(port = %job.port, ssid = %credential.ssid, "WiFi credentials added");
    ctx.notifier.info(ADDED);
    ctx.notifier.dialog(Dialog {
        title: ADDED.into(),
        message: NEXT_STEPS.into(),
        details: String::new(),
        image: ctx.config.images.provisioned.clone(),
    });
    Ok(())
}

async fn provision(
    ctx: &WorkerContext,
    job: &Job,
    credential: &WifiCredential,
    channel: &mut Option<Channel>,
) -> Result<(), CoreError> {
    let file = ctx.config.config_file.clone();
    let hold = job.hold();

    let ch = channel.insert(open(ctx, &job.port, &hold).await?);
    let name = file.clone();
    let raw = ch.call("read config", move |c| c.get(&name)).await?;

    let mut config = RemoteConfig::parse(&raw)?;
    config.set_wifi(&credential.ssid, credential.password.expose_secret());
    debug!(stored = config.wifi_count(), "networks in device config");
    let doc = config.to_bytes()?;

    ch.call("write config", move |c| c.put(&file, &doc)).await?;
    ch.close().await?;
    *channel = None;

    // Reopening the port resets the board so it picks up the new networks.
    let ch = channel.insert(open(ctx, &job.port, &hold).await?);
    ch.close().await?;
    *channel = None;
    Ok(())
}

async fn open(ctx: &WorkerContext, port: &str, hold: &TransportHold) -> Result<Channel, CoreError> {
    let timeout = ctx.config.serial_timeout;
    let transport = Arc::clone(&ctx.backend.transport);
    let path = port.to_owned();
    let handle = run_held(hold, timeout, "open channel", move || transport.open_channel(&path)).await?;
    Ok(BlockingHandle::new(handle, timeout, Arc::clone(hold)))
}

fn report_failure(ctx: &WorkerContext, err: &CoreError) {
    let mut hints = vec![
        "Try reconnecting the SumoRobot",
        "Try adding WiFi credentials again",
        "When nothing helped, try updating the firmware",
    ];
    hints.extend(err.hint());
    ctx.notifier
        .dialog(Dialog::error(ADD_FAILED, &hints, format!("{err}\n\n{err:?}")));
    ctx.notifier.error(ADD_FAILED);
}
