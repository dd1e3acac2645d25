use std::sync::Arc;

use crate::render::buffers::{AudioBufferList, ChannelBuffers};

/// Function-style sample callback, invoked once per hardware buffer on the
/// render context.
///
/// Parameters:
/// - `channels`: per-channel sample regions holding input; overwrite in place to produce output.
/// - `sample_rate`: the session's current sample rate.
///
/// Must not block or allocate.
pub type SampleCallback = Box<dyn FnMut(&mut ChannelBuffers<'_>, f64) + Send + 'static>;

/// Called on the control context with the new output volume in `[0, 1]`.
pub type VolumeChangedCallback = Arc<dyn Fn(f64) + Send + Sync + 'static>;

/// Object-style sample callback for callers that want structured dispatch.
///
/// Receives the native buffer descriptor unchanged. Called from the render
/// context, so implementations must not block, allocate, or take locks that
/// the control context may hold.
pub trait SampleDelegate: Send + Sync {
    fn render_buffers(&self, buffers: &mut AudioBufferList<'_, '_>, frame_count: usize);
}
