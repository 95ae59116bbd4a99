//! Control messages for the per-monitor scheduler task.

use std::time::Duration;

use tokio::sync::oneshot;

#[derive(Debug)]
pub enum MonitorCommand {
    /// Run a check immediately, bypassing the interval timer.
    CheckNow { respond_to: oneshot::Sender<()> },

    /// Change the interval used for future ticks; takes effect on the next
    /// scheduling decision, not mid-sleep.
    UpdateInterval { interval: Duration },

    /// Finish the in-flight check (if any) and exit.
    Shutdown,
}
