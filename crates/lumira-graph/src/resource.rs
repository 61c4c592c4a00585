use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use lumira_core::CoreError;

use crate::alternatives::{AlternativesRegistry, GroupId};
use crate::surface::Surface;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a cacheable resource.
///
/// Monotonically increasing, never reused. Purely an equality/debugging
/// key; carries no ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    fn next() -> Self {
        ResourceId(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// A concrete representation of rendered content.
///
/// Implementors are the payload types a [`Resource`] can carry, e.g. the
/// surface representations in [`crate::surface`].
pub trait ResourceData: fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;

    /// Cross-cast to the surface view when this representation holds
    /// pixel content.
    fn as_surface(&self) -> Option<&dyn Surface> {
        None
    }
}

/// A representation that can be constructed from another resource.
/// Drives [`Resource::get_alternative`].
pub trait ConvertFrom: ResourceData + Sized {
    fn convert_from(source: &Resource) -> Result<Self, ConvertError>;
}

/// Failure to obtain a representation. Always recoverable: the caller
/// treats it as "nothing to render/read", never as fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("source resource {0} is blank; nothing to convert")]
    BlankSource(ResourceId),

    #[error("no conversion from representation `{0}`")]
    UnsupportedSource(&'static str),

    #[error(transparent)]
    Core(#[from] CoreError),
}

struct ResourceInner {
    id: ResourceId,
    registry: Weak<AlternativesRegistry>,
    data: Arc<dyn ResourceData>,
    /// Type-keyed construct-once memo for `get_alternative`. The map's
    /// shard lock makes the find-or-construct step a single atomic
    /// check-then-insert, which is the exactly-once contract.
    conversions: DashMap<TypeId, Resource>,
}

/// Shared handle to one cacheable unit of rendered content.
///
/// Owns an immutable [`ResourceId`], carries one concrete representation,
/// and optionally participates in one alternatives group through the
/// registry it was created in. Cloning the handle shares the resource.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.inner.id)
            .field("data", &self.inner.data)
            .finish()
    }
}

impl Resource {
    pub fn new(registry: &Arc<AlternativesRegistry>, data: impl ResourceData) -> Resource {
        Self::from_weak(Arc::downgrade(registry), Arc::new(data))
    }

    fn from_weak(registry: Weak<AlternativesRegistry>, data: Arc<dyn ResourceData>) -> Resource {
        Resource {
            inner: Arc::new(ResourceInner {
                id: ResourceId::next(),
                registry,
                data,
                conversions: DashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.inner.id
    }

    pub fn data(&self) -> &dyn ResourceData {
        self.inner.data.as_ref()
    }

    pub fn is<T: ResourceData>(&self) -> bool {
        self.inner.data.as_any().is::<T>()
    }

    pub fn downcast<T: ResourceData>(&self) -> Option<&T> {
        self.inner.data.as_any().downcast_ref::<T>()
    }

    /// The registry this resource registers alternatives in, if it is
    /// still alive.
    pub fn registry(&self) -> Option<Arc<AlternativesRegistry>> {
        self.inner.registry.upgrade()
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.registry()?.group_of(self.id())
    }

    /// All other members of this resource's group. Empty when no group
    /// exists; never contains `self`.
    pub fn get_alternatives(&self) -> Vec<Resource> {
        match self.registry() {
            Some(registry) => registry.alternatives_of(self),
            None => Vec::new(),
        }
    }

    /// Declare that `self` and `other` represent the same logical content.
    /// Idempotent and associative; see [`AlternativesRegistry::link`].
    ///
    /// `other` must be a distinct resource; linking a resource to itself
    /// is a contract violation and is ignored.
    pub fn set_alternative(&self, other: &Resource) {
        debug_assert!(self.id() != other.id(), "a resource cannot be its own alternative");
        if self.id() == other.id() {
            return;
        }
        if let Some(registry) = self.registry() {
            registry.link(self, other);
        }
    }

    /// Remove `self` from its group, if any.
    pub fn unset_alternative(&self) {
        if let Some(registry) = self.registry() {
            registry.unlink(self);
        }
    }

    /// Scan the current alternatives for a member of concrete type `T`.
    /// Does not consider `self` and never constructs anything.
    pub fn find_alternative<T: ResourceData>(&self) -> Option<Resource> {
        self.get_alternatives().into_iter().find(|r| r.is::<T>())
    }

    /// Memoizing factory: return the `T` representation of this resource,
    /// constructing and registering it on first use. The returned
    /// resource is always reachable through [`Resource::get_alternatives`]
    /// afterwards, even when a group teardown unregistered it in between.
    ///
    /// Concurrent callers serialize on the conversion map entry, so the
    /// conversion runs exactly once per concrete type even under
    /// multi-thread access. On failure nothing is registered and a later
    /// call may retry.
    pub fn get_alternative<T: ConvertFrom>(&self) -> Result<Resource, ConvertError> {
        if self.is::<T>() {
            return Ok(self.clone());
        }
        let entry = self
            .inner
            .conversions
            .entry(TypeId::of::<T>())
            .or_try_insert_with(|| -> Result<Resource, ConvertError> {
                if let Some(found) = self.find_alternative::<T>() {
                    return Ok(found);
                }
                let built = T::convert_from(self)?;
                let alt = Resource::from_weak(self.inner.registry.clone(), Arc::new(built));
                self.set_alternative(&alt);
                tracing::debug!(
                    "constructed {} alternative {} for {}",
                    std::any::type_name::<T>(),
                    alt.id(),
                    self.id()
                );
                Ok(alt)
            })?;
        let alt = entry.value().clone();
        drop(entry);
        // Group teardown removes every membership but leaves this memo
        // intact. A hit must still satisfy the registration contract, so
        // re-link when the cached instance no longer shares our group.
        if alt.group_id().is_none() || alt.group_id() != self.group_id() {
            self.set_alternative(&alt);
        }
        Ok(alt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Marker(u32);

    impl ResourceData for Marker {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_ids_are_unique_and_monotonic() {
        let registry = AlternativesRegistry::new();
        let a = Resource::new(&registry, Marker(0));
        let b = Resource::new(&registry, Marker(1));
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_downcast() {
        let registry = AlternativesRegistry::new();
        let a = Resource::new(&registry, Marker(7));
        assert_eq!(a.downcast::<Marker>().map(|m| m.0), Some(7));
        assert!(a.is::<Marker>());
    }

    #[test]
    fn test_no_group_means_no_alternatives() {
        let registry = AlternativesRegistry::new();
        let a = Resource::new(&registry, Marker(0));
        assert!(a.get_alternatives().is_empty());
        assert!(a.group_id().is_none());
        assert!(a.find_alternative::<Marker>().is_none());
    }

    #[test]
    fn test_set_alternative_links_both_ways() {
        let registry = AlternativesRegistry::new();
        let a = Resource::new(&registry, Marker(0));
        let b = Resource::new(&registry, Marker(1));
        a.set_alternative(&b);
        assert_eq!(a.group_id(), b.group_id());
        assert_eq!(a.get_alternatives().len(), 1);
        assert_eq!(b.get_alternatives()[0].id(), a.id());
    }

    #[test]
    fn test_unset_alternative_removes_membership() {
        let registry = AlternativesRegistry::new();
        let a = Resource::new(&registry, Marker(0));
        let b = Resource::new(&registry, Marker(1));
        a.set_alternative(&b);
        a.unset_alternative();
        assert!(a.group_id().is_none());
        assert!(b.get_alternatives().is_empty());
    }

    #[test]
    fn test_dropped_registry_degrades_gracefully() {
        let registry = AlternativesRegistry::new();
        let a = Resource::new(&registry, Marker(0));
        let b = Resource::new(&registry, Marker(1));
        drop(registry);
        a.set_alternative(&b);
        assert!(a.get_alternatives().is_empty());
    }
}
