use crate::capture::{CaptureGate, CapturePermit};
use crate::controller::{PreviewController, PreviewSnapshot};
use crate::surface::SandboxSurface;
use crate::{Error, PreviewConfig, Result, Theme, ViewportMode};
use log::{debug, warn};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tokio::sync::{oneshot, watch};

enum Command {
    Render(String, Theme, oneshot::Sender<Result<PreviewSnapshot>>),
    Refresh(oneshot::Sender<Result<PreviewSnapshot>>),
    SetViewport(ViewportMode, oneshot::Sender<Result<PreviewSnapshot>>),
    DismissError(oneshot::Sender<Result<PreviewSnapshot>>),
    Snapshot(oneshot::Sender<PreviewSnapshot>),
    Capture(CapturePermit, oneshot::Sender<Result<Option<String>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly preview backed by a dedicated worker thread.
///
/// The worker owns the surface and its [`PreviewController`], executes
/// commands sent from async tasks, and drains sandbox messages every
/// `pump_interval_ms` while idle. Each change is published as a
/// [`PreviewSnapshot`] on a watch channel.
#[derive(Clone)]
pub struct Preview {
    cmd_tx: Sender<Command>,
    gate: CaptureGate,
    snapshots: watch::Receiver<PreviewSnapshot>,
}

impl Preview {
    /// Spawn the worker; `make_surface` runs on the worker thread, so the
    /// surface itself need not be `Send`.
    pub async fn spawn<S, M>(config: PreviewConfig, make_surface: M) -> Result<Self>
    where
        S: SandboxSurface + 'static,
        M: FnOnce(&PreviewConfig) -> Result<S> + Send + 'static,
    {
        config.validate()?;
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<CaptureGate>>();
        let (snap_tx, snap_rx) = watch::channel(PreviewSnapshot::default());

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = init_tx.send(Err(Error::Other(format!("Failed to start worker runtime: {}", e))));
                    return;
                }
            };
            let pump_every = Duration::from_millis(config.pump_interval_ms.max(1));
            let surface = match make_surface(&config) {
                Ok(s) => s,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let mut controller = match PreviewController::new(surface, config) {
                Ok(c) => c,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(controller.capture_gate().clone()));

            loop {
                match cmd_rx.recv_timeout(pump_every) {
                    Ok(Command::Render(source, theme, resp)) => {
                        let res = controller.render_preview(&source, theme).map(|_| controller.snapshot());
                        let _ = resp.send(res);
                    }
                    Ok(Command::Refresh(resp)) => {
                        let res = controller.refresh().map(|_| controller.snapshot());
                        let _ = resp.send(res);
                    }
                    Ok(Command::SetViewport(mode, resp)) => {
                        let res = controller.set_viewport(mode).map(|_| controller.snapshot());
                        let _ = resp.send(res);
                    }
                    Ok(Command::DismissError(resp)) => {
                        let res = controller.dismiss_error().map(|_| controller.snapshot());
                        let _ = resp.send(res);
                    }
                    Ok(Command::Snapshot(resp)) => {
                        if let Err(e) = controller.pump() {
                            debug!("pump before snapshot failed: {}", e);
                        }
                        let _ = resp.send(controller.snapshot());
                    }
                    Ok(Command::Capture(permit, resp)) => {
                        if let Err(e) = controller.pump() {
                            debug!("pump before capture failed: {}", e);
                        }
                        let res = runtime.block_on(controller.capture_with(&permit));
                        drop(permit);
                        let _ = resp.send(res);
                    }
                    Ok(Command::Close(resp)) => {
                        let res = controller.dispose();
                        publish(&snap_tx, controller.snapshot());
                        let _ = resp.send(res);
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = controller.pump() {
                            debug!("pump failed: {}", e);
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        if let Err(e) = controller.dispose() {
                            warn!("Failed to dispose preview: {}", e);
                        }
                        break;
                    }
                }
                publish(&snap_tx, controller.snapshot());
            }
        });

        let gate = init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self {
            cmd_tx,
            gate,
            snapshots: snap_rx,
        })
    }

    /// Spawn a preview rendering into headless Chrome.
    #[cfg(feature = "cdp")]
    pub async fn launch_cdp(config: PreviewConfig) -> Result<Self> {
        Self::spawn(config, crate::cdp::CdpSurface::launch).await
    }

    async fn request<T>(&self, what: &str, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(build(tx)).map_err(|_| Error::Disposed)?;
        rx.await.map_err(|e| {
            debug!("{} canceled: {}", what, e);
            Error::Disposed
        })
    }

    /// Render `source` under `theme`
    pub async fn render_preview(&self, source: &str, theme: Theme) -> Result<PreviewSnapshot> {
        let source = source.to_string();
        self.request("Render", move |tx| Command::Render(source, theme, tx)).await?
    }

    pub async fn refresh(&self) -> Result<PreviewSnapshot> {
        self.request("Refresh", Command::Refresh).await?
    }

    pub async fn set_viewport(&self, mode: ViewportMode) -> Result<PreviewSnapshot> {
        self.request("SetViewport", move |tx| Command::SetViewport(mode, tx)).await?
    }

    pub async fn dismiss_error(&self) -> Result<PreviewSnapshot> {
        self.request("DismissError", Command::DismissError).await?
    }

    /// Drain pending sandbox messages and return the resulting state
    pub async fn snapshot(&self) -> Result<PreviewSnapshot> {
        self.request("Snapshot", Command::Snapshot).await
    }

    /// Capture a thumbnail. A second call while one is running fails with
    /// [`Error::CaptureInProgress`].
    pub async fn capture(&self) -> Result<Option<String>> {
        let permit = self.gate.try_acquire()?;
        self.request("Capture", move |tx| Command::Capture(permit, tx)).await?
    }

    /// Receiver that sees every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<PreviewSnapshot> {
        self.snapshots.clone()
    }

    /// Dispose the controller and stop the worker.
    pub async fn close(self) -> Result<()> {
        self.request("Close", Command::Close).await?
    }
}

fn publish(tx: &watch::Sender<PreviewSnapshot>, snapshot: PreviewSnapshot) {
    tx.send_if_modified(|current| {
        if *current != snapshot {
            *current = snapshot;
            true
        } else {
            false
        }
    });
}
