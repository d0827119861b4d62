//! Surface that hands frames to the ECS renderer.
//!
//! The render loop presents into a [`FrameSlot`]; the rendering systems take
//! the latest frame out of the same slot and mirror it onto mesh entities.

use std::sync::Arc;

use bevy::prelude::*;
use parking_lot::Mutex;

use crate::scene::{Frame, Surface, SurfaceError};

#[derive(Debug)]
struct SlotInner {
    frame: Option<Frame>,
    aspect: f32,
    released: bool,
}

/// Shared single-frame mailbox between the render loop and the renderer.
#[derive(Resource, Clone, Debug)]
pub struct FrameSlot {
    inner: Arc<Mutex<SlotInner>>,
}

impl FrameSlot {
    pub fn new(aspect: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotInner {
                frame: None,
                aspect,
                released: false,
            })),
        }
    }

    /// Takes the newest frame, leaving the slot empty.
    pub fn take(&self) -> Option<Frame> {
        self.inner.lock().frame.take()
    }

    pub fn set_aspect(&self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.inner.lock().aspect = aspect;
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    /// A surface writing into this slot.
    pub fn surface(&self) -> FrameSlotSurface {
        FrameSlotSurface { slot: self.clone() }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

pub struct FrameSlotSurface {
    slot: FrameSlot,
}

impl Surface for FrameSlotSurface {
    fn aspect(&self) -> f32 {
        self.slot.inner.lock().aspect
    }

    fn present(&mut self, frame: Frame) -> Result<(), SurfaceError> {
        let mut inner = self.slot.inner.lock();
        if inner.released {
            return Err(SurfaceError::Released);
        }
        // Unconsumed frames are overwritten.
        inner.frame = Some(frame);
        Ok(())
    }

    fn release(&mut self) {
        let mut inner = self.slot.inner.lock();
        inner.released = true;
        inner.frame = None;
    }
}
