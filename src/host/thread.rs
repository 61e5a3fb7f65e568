use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use log::{debug, warn};

use crate::host::{
    driver::{Flow, HostCore, Outbox},
    protocol::{ControlMessage, HostMessage, HostOptions},
    SimulationHost,
};

/// Runs the simulation on its own OS thread, talking to it over channels.
pub struct ThreadHost {
    control: Sender<ControlMessage>,
    output: Receiver<HostMessage>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadHost {
    /// Spawns the layout thread. It announces itself with `ready`.
    pub fn spawn(options: HostOptions) -> Result<Self> {
        let (control, inbox) = mpsc::channel();
        let (outbox, output) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("flowlens-layout".into())
            .spawn(move || run(options, inbox, outbox))
            .context("failed to spawn the layout thread")?;

        Ok(Self {
            control,
            output,
            worker: Some(worker),
        })
    }

    /// Waits up to `timeout` for the next message.
    pub fn wait_message(&mut self, timeout: Duration) -> Option<HostMessage> {
        if self.worker.is_none() {
            return None;
        }
        match self.output.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

fn run(options: HostOptions, inbox: Receiver<ControlMessage>, mut outbox: Sender<HostMessage>) {
    let mut core = HostCore::new(options);
    let frame = options.frame_interval();
    if !outbox.deliver(HostMessage::Ready) {
        return;
    }

    loop {
        // Nothing scheduled: sleep until the next control message.
        if !core.is_active() {
            let Ok(message) = inbox.recv() else {
                break;
            };
            if core.handle(message, &mut outbox) == Flow::Terminate {
                break;
            }
        }

        // Control messages always go before the next step.
        let flow = loop {
            match inbox.try_recv() {
                Ok(message) => {
                    if core.handle(message, &mut outbox) == Flow::Terminate {
                        break Flow::Terminate;
                    }
                }
                Err(TryRecvError::Empty) => break Flow::Continue,
                Err(TryRecvError::Disconnected) => break Flow::Terminate,
            }
        };
        if flow == Flow::Terminate || core.step(&mut outbox) == Flow::Terminate {
            break;
        }

        if frame.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(frame);
        }
    }
    debug!("Layout thread exiting at epoch {}", core.epoch());
}

impl SimulationHost for ThreadHost {
    fn post(&mut self, message: ControlMessage) -> Result<()> {
        if self.worker.is_none() {
            bail!("layout thread already terminated");
        }
        self.control
            .send(message)
            .context("layout thread is no longer running")
    }

    fn next_message(&mut self) -> Option<HostMessage> {
        if self.worker.is_none() {
            return None;
        }
        self.output.try_recv().ok()
    }

    fn terminate(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.control.send(ControlMessage::Terminate);
        if worker.join().is_err() {
            warn!("Layout thread panicked during shutdown");
        }
        let discarded = self.output.try_iter().count();
        if discarded > 0 {
            debug!("Discarded {discarded} undelivered layout messages");
        }
    }
}

impl Drop for ThreadHost {
    fn drop(&mut self) {
        self.terminate();
    }
}
