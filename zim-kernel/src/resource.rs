//! Fixed-capacity hardware resource table.
//!
//! Platforms fill one of these during bring-up ("DISPLAY_REGS",
//! "DISPLAY_LFB", ...) and hand it to the kernel through the
//! `resource_manager` hook; tasks reach it through the kernel proxy's
//! hardware-info intercept.

use zim_common::resource::HardwareResource;

use crate::error::KernelError;
use crate::hooks::ResourceRegistry;

/// Name → resource table with `N` slots.
pub struct StaticResourceTable<const N: usize> {
    entries: [Option<(&'static str, HardwareResource)>; N],
}

impl<const N: usize> StaticResourceTable<N> {
    /// An empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: [None; N] }
    }

    /// Register `resource` under `name`. Re-registering a name replaces
    /// the previous entry.
    pub fn register(
        &mut self,
        name: &'static str,
        resource: HardwareResource,
    ) -> Result<(), KernelError> {
        // Replace first, so a full table can still be updated.
        for slot in self.entries.iter_mut().flatten() {
            if slot.0 == name {
                slot.1 = resource;
                return Ok(());
            }
        }
        for slot in self.entries.iter_mut() {
            if slot.is_none() {
                *slot = Some((name, resource));
                return Ok(());
            }
        }
        Err(KernelError::TableFull)
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for StaticResourceTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ResourceRegistry for StaticResourceTable<N> {
    fn query(&self, name: &str) -> Option<HardwareResource> {
        self.entries
            .iter()
            .flatten()
            .find(|(n, _)| *n == name)
            .map(|(_, r)| *r)
    }
}
