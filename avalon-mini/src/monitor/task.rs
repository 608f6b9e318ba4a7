use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{MonitorCommand, MonitorHandle};
use crate::api_client::types::DeviceState;
use crate::entity::EntityStore;
use crate::normalize::{PowerDebouncer, PowerTransition, normalize_other};
use crate::protocol::{Ack, CommandRequest, Device, DeviceError};
use crate::tracing::prelude::*;

const COMMAND_QUEUE: usize = 8;

/// Polls one device and relays commands to it.
pub struct Monitor {
    device: Box<dyn Device>,
    poll_interval: Duration,
    debouncer: PowerDebouncer,
    store: EntityStore,
    state_tx: watch::Sender<DeviceState>,
    cmd_rx: mpsc::Receiver<MonitorCommand>,
    consecutive_failures: u32,
    last_poll: Option<Instant>,
}

impl Monitor {
    pub fn new(
        device: Box<dyn Device>,
        poll_interval: Duration,
        power_grace: Duration,
    ) -> (Self, MonitorHandle) {
        let store = EntityStore::new(device.endpoint());
        let (state_tx, state_rx) = watch::channel(store.snapshot());
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);

        let monitor = Self {
            device,
            poll_interval,
            debouncer: PowerDebouncer::new(power_grace),
            store,
            state_tx,
            cmd_rx,
            consecutive_failures: 0,
            last_poll: None,
        };
        (monitor, MonitorHandle { cmd_tx, state_rx })
    }

    /// Run until cancelled. An exchange in flight at cancellation is
    /// abandoned, which drops its connection.
    pub async fn run(mut self, cancellation: CancellationToken) {
        info!(
            endpoint = %self.device.endpoint(),
            interval = ?self.poll_interval,
            grace = ?self.debouncer.grace(),
            "Monitor started"
        );

        // Ticks that come due while a poll or command is running are
        // skipped, never queued up behind it.
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let commit_at = self.power_commit_due();

            tokio::select! {
                biased;

                _ = cancellation.cancelled() => {
                    break;
                }
                Some(command) = self.cmd_rx.recv() => {
                    self.handle_command(command, &cancellation).await;
                }
                _ = tokio::time::sleep_until(commit_at.unwrap_or_else(Instant::now)),
                    if commit_at.is_some() =>
                {
                    debug!(endpoint = %self.device.endpoint(), "Grace elapsed, polling power state");
                    self.poll(&cancellation).await;
                    interval.reset();
                }
                _ = interval.tick() => {
                    self.poll(&cancellation).await;
                }
            }
        }

        debug!(endpoint = %self.device.endpoint(), "Monitor stopped");
    }

    async fn handle_command(&mut self, command: MonitorCommand, cancellation: &CancellationToken) {
        match command {
            MonitorCommand::Send { command, reply } => {
                let result = tokio::select! {
                    result = self.device.send_command(command) => result,
                    _ = cancellation.cancelled() => return,
                };
                if let Ok(ack) = &result {
                    self.command_acknowledged(command, ack);
                }
                if let Err(e) = &result {
                    warn!(endpoint = %self.device.endpoint(), %command, error = %e, "Command failed");
                }
                // Caller may have given up waiting.
                let _ = reply.send(result);
            }
            MonitorCommand::Refresh { reply } => {
                let Some(result) = self.poll(cancellation).await else {
                    return;
                };
                let _ = reply.send(result);
            }
        }
    }

    fn command_acknowledged(&mut self, command: CommandRequest, ack: &Ack) {
        if !ack.is_accepted() {
            warn!(
                endpoint = %self.device.endpoint(),
                %command,
                status = %ack.status,
                message = %ack.message,
                "Command rejected"
            );
            return;
        }

        match command {
            CommandRequest::PowerOn | CommandRequest::PowerOff => {
                let on = command == CommandRequest::PowerOn;
                self.debouncer.assume(on, Instant::now());
                self.store.set_power(self.debouncer.reported_on());
            }
            other => self.store.apply_command(other),
        }
        self.publish();
    }

    /// When a pending power change will have held for the full grace
    /// interval, so the change is committed then rather than at the next
    /// tick. Not re-armed once a poll has run at or after that moment.
    fn power_commit_due(&self) -> Option<Instant> {
        let deadline = self.debouncer.commit_deadline()?;
        match self.last_poll {
            Some(last) if last >= deadline => None,
            _ => Some(deadline),
        }
    }

    /// Poll once. Returns `None` if cancelled mid-exchange.
    async fn poll(&mut self, cancellation: &CancellationToken) -> Option<Result<(), DeviceError>> {
        self.last_poll = Some(Instant::now());
        let result = tokio::select! {
            result = self.device.fetch_status() => result,
            _ = cancellation.cancelled() => return None,
        };

        let outcome = match result {
            Ok(parsed) => {
                if self.consecutive_failures > 0 {
                    info!(
                        endpoint = %self.device.endpoint(),
                        failures = self.consecutive_failures,
                        "Device reachable again"
                    );
                }
                self.consecutive_failures = 0;

                match self.debouncer.update(&parsed, Instant::now()) {
                    PowerTransition::Committed(on) => {
                        info!(endpoint = %self.device.endpoint(), power_on = on, "Power state");
                    }
                    PowerTransition::Pending => {
                        debug!(
                            endpoint = %self.device.endpoint(),
                            status = ?parsed.system_status,
                            "Power change pending"
                        );
                    }
                    PowerTransition::Steady | PowerTransition::NoSignal => {}
                }

                self.store
                    .apply(&normalize_other(&parsed), self.debouncer.reported_on());
                Ok(())
            }
            Err(e) => {
                self.consecutive_failures += 1;
                // Only the first failure of a run is worth a warning.
                if self.consecutive_failures == 1 {
                    warn!(endpoint = %self.device.endpoint(), error = %e, "Poll failed");
                } else {
                    debug!(
                        endpoint = %self.device.endpoint(),
                        error = %e,
                        failures = self.consecutive_failures,
                        "Poll failed"
                    );
                }
                self.store.mark_failed(&e);
                Err(e)
            }
        };

        self.publish();
        Some(outcome)
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.store.snapshot());
    }
}
