//! Buffer descriptors exchanged with the hardware collaborator and user callbacks.

use std::marker::PhantomData;

/// Native multi-buffer descriptor: one non-interleaved `f32` region per channel.
///
/// On entry to the user callback the regions hold captured input; whatever
/// the callback leaves behind is played out.
pub struct AudioBufferList<'a, 'b> {
    channels: &'a mut [&'b mut [f32]],
}

impl<'a, 'b> AudioBufferList<'a, 'b> {
    pub fn new(channels: &'a mut [&'b mut [f32]]) -> Self {
        Self { channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames available in every channel (length of the shortest region).
    pub fn frame_capacity(&self) -> usize {
        self.channels.iter().map(|c| c.len()).min().unwrap_or(0)
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| &**c)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(index).map(|c| &mut **c)
    }

    /// Copy each channel's base pointer into `slots`, returning how many were written.
    pub(crate) fn copy_pointers(&mut self, slots: &mut [*mut f32]) -> usize {
        let mut count = 0;
        for (slot, channel) in slots.iter_mut().zip(self.channels.iter_mut()) {
            *slot = channel.as_mut_ptr();
            count += 1;
        }
        count
    }
}

/// Per-channel view handed to function callbacks, backed by the render
/// context's pointer array.
///
/// Borrowed for the duration of one render call only; the pointers it wraps
/// are invalid once the callback returns.
pub struct ChannelBuffers<'a> {
    pointers: &'a [*mut f32],
    frames: usize,
    _samples: PhantomData<&'a mut [f32]>,
}

impl<'a> ChannelBuffers<'a> {
    /// # Safety
    ///
    /// Every pointer must address at least `frames` valid `f32`s, the
    /// regions must not overlap, and nothing else may access them for `'a`.
    pub(crate) unsafe fn from_raw(pointers: &'a [*mut f32], frames: usize) -> Self {
        Self {
            pointers,
            frames,
            _samples: PhantomData,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.pointers.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        let ptr = self.pointers[index];
        // SAFETY: guaranteed by the `from_raw` contract; the shared borrow of
        // `self` prevents a concurrent `channel_mut`.
        unsafe { std::slice::from_raw_parts(ptr, self.frames) }
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        let ptr = self.pointers[index];
        // SAFETY: guaranteed by the `from_raw` contract; the exclusive borrow
        // of `self` makes this the only live slice.
        unsafe { std::slice::from_raw_parts_mut(ptr, self.frames) }
    }

    /// Apply `f` to every channel in index order.
    pub fn for_each_channel(&mut self, mut f: impl FnMut(usize, &mut [f32])) {
        for index in 0..self.pointers.len() {
            f(index, self.channel_mut(index));
        }
    }
}
