//! Attachment state machine for the filter program.
//!
//! The controller moves from `Detached` to `Attached` once and back exactly
//! once. Detaching is best effort: by the time it runs the process is on its
//! way out, so failures are logged and swallowed.

use ddos_blacklist_common::{AttachmentState, Result};
use log::{debug, info, warn};

use crate::device::Device;

/// Something that can bind a program to a device's receive path.
pub trait AttachPoint {
    /// Handle identifying one successful attachment.
    type Link;

    fn attach(&mut self, device: &Device) -> Result<Self::Link>;

    fn detach(&mut self, link: Self::Link) -> Result<()>;
}

/// Owns the attach point and the current binding, if any.
pub struct AttachmentController<P: AttachPoint> {
    point: P,
    binding: Option<(Device, P::Link)>,
}

impl<P: AttachPoint> AttachmentController<P> {
    pub fn new(point: P) -> Self {
        Self {
            point,
            binding: None,
        }
    }

    /// Bind the program to `device`.
    ///
    /// Fails with `Error::Attach` if the kernel refuses the program, and
    /// refuses to rebind while a binding is already held.
    pub fn attach(&mut self, device: &Device) -> Result<()> {
        if let Some((current, _)) = &self.binding {
            return Err(ddos_blacklist_common::Error::Attach {
                device: device.name().to_string(),
                ifindex: device.ifindex(),
                reason: format!("already attached to {}", current),
            });
        }

        let link = self.point.attach(device)?;
        info!(
            "XDP program attached to device:{} ifindex:{}",
            device.name(),
            device.ifindex()
        );
        self.binding = Some((device.clone(), link));
        Ok(())
    }

    /// Unbind the program. A no-op when nothing is attached.
    pub fn detach(&mut self) {
        let Some((device, link)) = self.binding.take() else {
            debug!("Detach requested while already detached");
            return;
        };

        info!(
            "Removing XDP program on ifindex:{} device:{}",
            device.ifindex(),
            device.name()
        );
        if let Err(e) = self.point.detach(link) {
            warn!("Failed to detach from interface {}: {}", device, e);
        }
    }

    pub fn state(&self) -> AttachmentState {
        if self.binding.is_some() {
            AttachmentState::Attached
        } else {
            AttachmentState::Detached
        }
    }

    /// The device currently bound, if any.
    pub fn device(&self) -> Option<&Device> {
        self.binding.as_ref().map(|(device, _)| device)
    }
}

impl<P: AttachPoint> Drop for AttachmentController<P> {
    fn drop(&mut self) {
        if self.binding.is_some() {
            warn!("Attachment dropped while still attached");
            self.detach();
        }
    }
}
