use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::resource::{Resource, ResourceId};

/// Identity of one alternatives group inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

#[derive(Debug)]
struct GroupEntry {
    /// Signed reference count. Each member implicitly holds one reference;
    /// external holders add on top of that.
    refs: i64,
    members: Vec<Resource>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    groups: HashMap<GroupId, GroupEntry>,
    membership: HashMap<ResourceId, GroupId>,
}

/// The owning arena of all alternatives groups.
///
/// A group is the set of resources known to represent the same logical
/// image in different concrete forms. The registry owns every group and
/// serializes all group/member mutation under one lock, which makes the
/// smaller-into-larger merge rule trivially free of lock-order problems.
///
/// A group survives iff at least one *external* holder remains: every
/// member contributes one implicit back-reference, so the teardown
/// threshold inside [`AlternativesRegistry::unref_group`] is
/// `refs <= members.len()`.
#[derive(Debug, Default)]
pub struct AlternativesRegistry {
    inner: Mutex<RegistryInner>,
    next_group: AtomicU64,
}

impl AlternativesRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The group a resource currently belongs to, if any.
    pub fn group_of(&self, id: ResourceId) -> Option<GroupId> {
        self.inner.lock().membership.get(&id).copied()
    }

    /// Snapshot of a resource's alternatives, excluding the resource itself.
    /// Empty when the resource has no group.
    pub fn alternatives_of(&self, res: &Resource) -> Vec<Resource> {
        let inner = self.inner.lock();
        let Some(gid) = inner.membership.get(&res.id()) else {
            return Vec::new();
        };
        match inner.groups.get(gid) {
            Some(entry) => entry
                .members
                .iter()
                .filter(|m| m.id() != res.id())
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of members in a group. Zero once the group is gone.
    pub fn member_count(&self, gid: GroupId) -> usize {
        self.inner
            .lock()
            .groups
            .get(&gid)
            .map(|e| e.members.len())
            .unwrap_or(0)
    }

    /// Current reference count, diagnostic only.
    pub fn count(&self, gid: GroupId) -> i64 {
        self.inner.lock().groups.get(&gid).map(|e| e.refs).unwrap_or(0)
    }

    pub fn is_alive(&self, gid: GroupId) -> bool {
        self.inner.lock().groups.contains_key(&gid)
    }

    /// Declare that `a` and `b` represent the same logical content.
    ///
    /// Symmetric merge: existing groups are merged smaller-into-larger
    /// (bounding the cost by the smaller group's size), a lone group
    /// absorbs the other resource, and two free resources get a fresh
    /// group. Linking two members of the same group is a no-op, so the
    /// operation is idempotent.
    pub fn link(&self, a: &Resource, b: &Resource) -> GroupId {
        let mut inner = self.inner.lock();
        let ga = inner.membership.get(&a.id()).copied();
        let gb = inner.membership.get(&b.id()).copied();
        match (ga, gb) {
            (Some(ga), Some(gb)) if ga == gb => ga,
            (Some(ga), Some(gb)) => {
                let len_a = inner.groups.get(&ga).map(|e| e.members.len()).unwrap_or(0);
                let len_b = inner.groups.get(&gb).map(|e| e.members.len()).unwrap_or(0);
                let (dst, src) = if len_a >= len_b { (ga, gb) } else { (gb, ga) };
                let Some(moved) = inner.groups.remove(&src) else {
                    return dst;
                };
                for m in &moved.members {
                    inner.membership.insert(m.id(), dst);
                }
                if let Some(entry) = inner.groups.get_mut(&dst) {
                    entry.members.extend(moved.members);
                    entry.refs += moved.refs;
                }
                tracing::debug!("merged {} into {}", src, dst);
                dst
            }
            (Some(g), None) => {
                inner.membership.insert(b.id(), g);
                if let Some(entry) = inner.groups.get_mut(&g) {
                    entry.members.push(b.clone());
                    entry.refs += 1;
                }
                g
            }
            (None, Some(g)) => {
                inner.membership.insert(a.id(), g);
                if let Some(entry) = inner.groups.get_mut(&g) {
                    entry.members.push(a.clone());
                    entry.refs += 1;
                }
                g
            }
            (None, None) => {
                let gid = GroupId(self.next_group.fetch_add(1, Ordering::Relaxed));
                inner.membership.insert(a.id(), gid);
                inner.membership.insert(b.id(), gid);
                inner.groups.insert(
                    gid,
                    GroupEntry { refs: 2, members: vec![a.clone(), b.clone()] },
                );
                tracing::debug!("created {} for resources {} and {}", gid, a.id(), b.id());
                gid
            }
        }
    }

    /// Remove one resource from its group. The member's implicit reference
    /// goes with it; an emptied group is dropped from the arena.
    pub fn unlink(&self, res: &Resource) {
        let mut inner = self.inner.lock();
        let Some(gid) = inner.membership.remove(&res.id()) else {
            return;
        };
        let remove = if let Some(entry) = inner.groups.get_mut(&gid) {
            entry.members.retain(|m| m.id() != res.id());
            entry.refs -= 1;
            entry.members.is_empty() || entry.refs <= 0
        } else {
            false
        };
        if remove {
            inner.groups.remove(&gid);
            tracing::debug!("dropped emptied {}", gid);
        }
    }

    /// Register one external holder of the group.
    pub fn ref_group(&self, gid: GroupId) {
        if let Some(entry) = self.inner.lock().groups.get_mut(&gid) {
            entry.refs += 1;
        }
    }

    /// Release one external holder. Returns whether the group is still
    /// alive afterwards.
    ///
    /// When the count falls to or below the member list size, only the
    /// members' implicit back-references remain, i.e. no external interest
    /// exists any more: the member list is cleared and the group removed.
    pub fn unref_group(&self, gid: GroupId) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.groups.get_mut(&gid) else {
            return false;
        };
        entry.refs -= 1;
        if entry.refs <= entry.members.len() as i64 {
            let Some(entry) = inner.groups.remove(&gid) else {
                return false;
            };
            for m in &entry.members {
                inner.membership.remove(&m.id());
            }
            tracing::debug!("tore down {} ({} members released)", gid, entry.members.len());
            return false;
        }
        true
    }

    /// Release a transient hold without ever tearing the group down.
    /// Used when a caller only pinned the group for the duration of a
    /// read, not as a signal of "last external use".
    pub fn unref_inactive(&self, gid: GroupId) {
        if let Some(entry) = self.inner.lock().groups.get_mut(&gid) {
            entry.refs -= 1;
        }
    }
}

/// RAII transient hold on a group: refs on acquire, releases with
/// [`AlternativesRegistry::unref_inactive`] on drop.
#[derive(Debug)]
pub struct GroupHold {
    registry: Arc<AlternativesRegistry>,
    gid: GroupId,
}

impl GroupHold {
    /// Pin the group a resource belongs to, if any.
    pub fn acquire(registry: &Arc<AlternativesRegistry>, res: &Resource) -> Option<GroupHold> {
        let gid = registry.group_of(res.id())?;
        registry.ref_group(gid);
        Some(GroupHold { registry: registry.clone(), gid })
    }

    pub fn group_id(&self) -> GroupId {
        self.gid
    }
}

impl Drop for GroupHold {
    fn drop(&mut self) {
        self.registry.unref_inactive(self.gid);
    }
}
