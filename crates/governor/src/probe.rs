//! Background capability detection.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use renderer::GraphicsCapabilities;
use tracing::warn;

use crate::capabilities::{detect_capabilities, Capabilities, ProbeSettings};
use crate::error::GovernorError;
use crate::host::HostEnvironment;

/// One-shot detection running on its own thread. The result is delivered
/// exactly once, through [`CapabilityProbe::try_result`] or
/// [`CapabilityProbe::wait`].
#[derive(Debug)]
pub struct CapabilityProbe {
    receiver: Receiver<Capabilities>,
    worker: Option<JoinHandle<()>>,
    delivered: bool,
}

impl CapabilityProbe {
    pub fn spawn<H>(
        host: H,
        graphics: GraphicsCapabilities,
        settings: ProbeSettings,
    ) -> Result<Self, GovernorError>
    where
        H: HostEnvironment + Send + 'static,
    {
        let (sender, receiver) = bounded(1);
        let worker = thread::Builder::new()
            .name("capability-probe".to_string())
            .spawn(move || {
                let capabilities = detect_capabilities(&host, &graphics, &settings);
                if sender.send(capabilities).is_err() {
                    warn!("capability probe finished after its owner went away");
                }
            })
            .map_err(GovernorError::ProbeSpawn)?;
        Ok(Self {
            receiver,
            worker: Some(worker),
            delivered: false,
        })
    }

    /// Non-blocking poll for hosts that keep rendering meanwhile.
    pub fn try_result(&mut self) -> Option<Capabilities> {
        if self.delivered {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(capabilities) => Some(self.finish(capabilities)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.delivered = true;
                warn!("capability probe exited without a result");
                None
            }
        }
    }

    /// Blocks until the result arrives or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Result<Capabilities, GovernorError> {
        if self.delivered {
            return Err(GovernorError::ProbeDisconnected);
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(capabilities) => Ok(self.finish(capabilities)),
            Err(RecvTimeoutError::Timeout) => Err(GovernorError::ProbeTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                self.delivered = true;
                Err(GovernorError::ProbeDisconnected)
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.delivered
    }

    fn finish(&mut self, capabilities: Capabilities) -> Capabilities {
        self.delivered = true;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("capability probe thread panicked after reporting");
            }
        }
        capabilities
    }
}
