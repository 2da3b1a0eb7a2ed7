//! Per-session ownership of device buffers and their shadows
//!
//! Each [`BufferState`] bundles one device buffer with its layout and the
//! host shadow that mirrors every operation applied to it. A
//! [`BufferArena`] owns all buffers of one session and hands them out by
//! small integer index.

use crate::backend::DeviceBuffer;
use crate::error::{RectCheckError, RectResult};
use crate::region::BufferLayout;

/// One device buffer and its host mirror
#[derive(Debug, Clone)]
pub struct BufferState {
    layout: BufferLayout,
    shadow: Vec<u8>,
    device: DeviceBuffer,
}

impl BufferState {
    /// Bundle a device buffer with its shadow.
    ///
    /// # Errors
    /// `InvalidLayout` if the shadow is not exactly `layout.size_bytes()` long.
    pub fn new(layout: BufferLayout, shadow: Vec<u8>, device: DeviceBuffer) -> RectResult<Self> {
        layout.validate()?;
        if shadow.len() != layout.size_bytes() {
            return Err(crate::layout_error!(
                "shadow of {} bytes does not match layout size {}",
                shadow.len(),
                layout.size_bytes()
            ));
        }
        Ok(BufferState { layout, shadow, device })
    }

    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    pub fn shadow(&self) -> &[u8] {
        &self.shadow
    }

    pub fn shadow_mut(&mut self) -> &mut [u8] {
        &mut self.shadow
    }

    pub fn device(&self) -> DeviceBuffer {
        self.device
    }
}

/// Buffers owned by one session, indexed by insertion order
#[derive(Debug, Default)]
pub struct BufferArena {
    buffers: Vec<BufferState>,
}

impl BufferArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a buffer and return its index
    pub fn push(&mut self, state: BufferState) -> usize {
        self.buffers.push(state);
        self.buffers.len() - 1
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get(&self, index: usize) -> RectResult<&BufferState> {
        self.buffers.get(index).ok_or(RectCheckError::UnknownBuffer(index))
    }

    pub fn get_mut(&mut self, index: usize) -> RectResult<&mut BufferState> {
        self.buffers.get_mut(index).ok_or(RectCheckError::UnknownBuffer(index))
    }

    /// Borrow `src` shared and `dst` exclusively at the same time.
    ///
    /// # Errors
    /// `UnknownBuffer` for a missing index, `InternalError` if `src == dst`.
    pub fn pair_mut(&mut self, src: usize, dst: usize) -> RectResult<(&BufferState, &mut BufferState)> {
        if src == dst {
            return Err(RectCheckError::InternalError(format!(
                "buffer {} cannot be borrowed as both source and destination",
                src
            )));
        }
        let len = self.buffers.len();
        for index in [src, dst] {
            if index >= len {
                return Err(RectCheckError::UnknownBuffer(index));
            }
        }

        if src < dst {
            let (head, tail) = self.buffers.split_at_mut(dst);
            Ok((&head[src], &mut tail[0]))
        } else {
            let (head, tail) = self.buffers.split_at_mut(src);
            Ok((&tail[0], &mut head[dst]))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferState> {
        self.buffers.iter()
    }

    /// Size of the largest buffer in bytes
    pub fn max_size_bytes(&self) -> usize {
        self.buffers
            .iter()
            .map(|b| b.layout.size_bytes())
            .max()
            .unwrap_or(0)
    }

    /// Total bytes across all buffers
    pub fn total_bytes(&self) -> usize {
        self.buffers.iter().map(|b| b.layout.size_bytes()).sum()
    }

    /// Remove every buffer, handing back their device handles for release
    pub fn drain(&mut self) -> Vec<DeviceBuffer> {
        self.buffers.drain(..).map(|b| b.device).collect()
    }
}
