use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tracing::debug;

use crate::error::{EngineError, Result};

use super::render::{RenderBackend, RenderNode, RenderRequest};

/// One `Sink` per render node, all on the default output mixer.
pub struct RodioBackend {
    stream: OutputStream,
}

impl RodioBackend {
    /// Open the system's default output device.
    pub fn open_default() -> Result<Self> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| EngineError::Output(e.to_string()))?;
        // rodio prints to stderr when the stream is dropped.
        stream.log_on_drop(false);
        Ok(Self { stream })
    }
}

impl RenderBackend for RodioBackend {
    fn start(&mut self, request: RenderRequest) -> Result<Box<dyn RenderNode>> {
        let RenderRequest {
            buffer,
            offset,
            rate,
            chain,
            completion,
        } = request;

        if !offset.is_finite() || offset < 0.0 || offset >= buffer.duration() {
            return Err(EngineError::RenderStart(format!(
                "offset {offset:.3}s outside a {:.3}s buffer",
                buffer.duration()
            )));
        }

        let source = chain.wrap(buffer.source_from(offset), completion);
        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_speed(rate as f32);
        sink.append(source);
        sink.play();
        debug!(offset, rate, "render node started");
        Ok(Box::new(SinkNode { sink }))
    }
}

struct SinkNode {
    sink: Sink,
}

impl RenderNode for SinkNode {
    fn stop(&mut self) {
        self.sink.stop();
    }
}
