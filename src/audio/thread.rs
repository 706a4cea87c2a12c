use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error};

use crate::error::{EngineError, Result};

use super::engine::{Engine, EngineParts, Inbox};
use super::render::RenderBackend;

/// How long the control loop waits for a message before running housekeeping.
const TICK: Duration = Duration::from_millis(200);

/// Start the control thread.
///
/// The backend is built on the new thread because output streams are not
/// always safe to move between threads. Returns once the backend is up, or
/// with the error that kept it from coming up.
pub(super) fn spawn_engine_thread<B, F>(
    make_backend: F,
    parts: EngineParts,
    rx: Receiver<Inbox>,
) -> Result<JoinHandle<()>>
where
    B: RenderBackend + 'static,
    F: FnOnce() -> Result<B> + Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

    let handle = thread::Builder::new()
        .name("cadenza-control".into())
        .spawn(move || {
            let backend = match make_backend() {
                Ok(backend) => backend,
                Err(e) => {
                    error!(error = %e, "audio output unavailable");
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let mut engine = Engine::new(backend, parts);
            let _ = ready_tx.send(Ok(()));
            drop(ready_tx);

            run_loop(&mut engine, &rx);
            debug!("control thread exiting");
        })
        .map_err(|source| EngineError::Spawn {
            what: "control",
            source,
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            let _ = handle.join();
            Err(EngineError::Disconnected)
        }
    }
}

fn run_loop<B: RenderBackend>(engine: &mut Engine<B>, rx: &Receiver<Inbox>) {
    loop {
        match rx.recv_timeout(TICK) {
            Ok(msg) => {
                if !engine.handle(msg) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                engine.shutdown();
                break;
            }
        }
        engine.tick();
    }
}
