use std::sync::Arc;

use crate::render::buffers::ChannelBuffers;
use crate::traits::sample_delegate::{SampleCallback, SampleDelegate, VolumeChangedCallback};

/// The active sample callback. Exactly one style can be bound at a time.
pub enum CallbackBinding {
    Function(SampleCallback),
    Delegate(Arc<dyn SampleDelegate>),
}

impl CallbackBinding {
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function(_))
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self, Self::Delegate(_))
    }
}

impl std::fmt::Debug for CallbackBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function(_) => f.write_str("CallbackBinding::Function"),
            Self::Delegate(_) => f.write_str("CallbackBinding::Delegate"),
        }
    }
}

/// Holds the sample callback binding and the volume-change binding.
///
/// Lives inside the render context; the render path only reads `sample`,
/// the volume binding is only touched on the control context.
#[derive(Default)]
pub struct CallbackRegistry {
    sample: Option<CallbackBinding>,
    volume_changed: Option<VolumeChangedCallback>,
}

impl CallbackRegistry {
    pub fn new(sample: Option<CallbackBinding>) -> Self {
        Self {
            sample,
            volume_changed: None,
        }
    }

    /// Bind a function callback, dropping any delegate.
    pub fn set_function<F>(&mut self, callback: F)
    where
        F: FnMut(&mut ChannelBuffers<'_>, f64) + Send + 'static,
    {
        self.sample = Some(CallbackBinding::Function(Box::new(callback)));
    }

    /// Bind a delegate, dropping any function callback.
    pub fn set_delegate(&mut self, delegate: Arc<dyn SampleDelegate>) {
        self.sample = Some(CallbackBinding::Delegate(delegate));
    }

    pub fn clear_sample(&mut self) -> Option<CallbackBinding> {
        self.sample.take()
    }

    pub fn sample(&self) -> Option<&CallbackBinding> {
        self.sample.as_ref()
    }

    pub(crate) fn sample_mut(&mut self) -> Option<&mut CallbackBinding> {
        self.sample.as_mut()
    }

    pub fn has_function(&self) -> bool {
        self.sample.as_ref().is_some_and(CallbackBinding::is_function)
    }

    pub fn has_delegate(&self) -> bool {
        self.sample.as_ref().is_some_and(CallbackBinding::is_delegate)
    }

    pub fn set_volume_changed(&mut self, callback: Option<VolumeChangedCallback>) {
        self.volume_changed = callback;
    }

    pub fn volume_changed(&self) -> Option<VolumeChangedCallback> {
        self.volume_changed.clone()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("sample", &self.sample)
            .field("volume_changed", &self.volume_changed.is_some())
            .finish()
    }
}
