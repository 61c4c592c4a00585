use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lumira_graph::{
    AlternativesRegistry, ConvertError, ConvertFrom, GroupHold, Resource, ResourceData,
};

#[derive(Debug)]
struct Plain(u32);

impl ResourceData for Plain {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn plain(registry: &Arc<AlternativesRegistry>, n: u32) -> Resource {
    Resource::new(registry, Plain(n))
}

#[test]
fn test_merge_idempotence() {
    let registry = AlternativesRegistry::new();
    let a = plain(&registry, 0);
    let b = plain(&registry, 1);

    a.set_alternative(&b);
    a.set_alternative(&b);
    b.set_alternative(&a);

    let gid = a.group_id().unwrap();
    assert_eq!(registry.member_count(gid), 2);
    assert_eq!(a.get_alternatives().len(), 1);
}

#[test]
fn test_merge_associativity() {
    // {A,B} + {C,D} merged through B-C must equal the same four-member
    // group regardless of which pair formed first.
    let registry = AlternativesRegistry::new();
    let a = plain(&registry, 0);
    let b = plain(&registry, 1);
    let c = plain(&registry, 2);
    let d = plain(&registry, 3);

    a.set_alternative(&b);
    c.set_alternative(&d);
    b.set_alternative(&c);

    let gid = a.group_id().unwrap();
    assert_eq!(registry.member_count(gid), 4);
    for r in [&a, &b, &c, &d] {
        assert_eq!(r.group_id(), Some(gid));
        assert_eq!(r.get_alternatives().len(), 3);
    }

    // Other association order.
    let e = plain(&registry, 4);
    let f = plain(&registry, 5);
    let g = plain(&registry, 6);
    let h = plain(&registry, 7);
    f.set_alternative(&g);
    e.set_alternative(&f);
    g.set_alternative(&h);
    assert_eq!(registry.member_count(e.group_id().unwrap()), 4);
}

#[test]
fn test_refcount_teardown_at_member_threshold() {
    let registry = AlternativesRegistry::new();
    let a = plain(&registry, 0);
    let b = plain(&registry, 1);
    let c = plain(&registry, 2);
    a.set_alternative(&b);
    a.set_alternative(&c);

    let gid = a.group_id().unwrap();
    let members = registry.member_count(gid);
    assert_eq!(members, 3);
    assert_eq!(registry.count(gid), 3);

    let n = 5;
    for _ in 0..n {
        registry.ref_group(gid);
    }
    assert_eq!(registry.count(gid), 3 + n);

    for i in 0..n {
        let alive = registry.unref_group(gid);
        // Alive until the count falls back to the member threshold.
        assert_eq!(alive, i + 1 < n, "unexpected liveness after unref {}", i);
    }

    assert!(!registry.is_alive(gid));
    assert_eq!(registry.member_count(gid), 0);
    assert!(a.group_id().is_none());
    assert!(a.get_alternatives().is_empty());
}

#[test]
fn test_unref_inactive_never_tears_down() {
    let registry = AlternativesRegistry::new();
    let a = plain(&registry, 0);
    let b = plain(&registry, 1);
    a.set_alternative(&b);
    let gid = a.group_id().unwrap();

    registry.ref_group(gid);
    registry.unref_inactive(gid);
    assert!(registry.is_alive(gid));
    assert_eq!(registry.member_count(gid), 2);
}

#[test]
fn test_group_hold_is_transient() {
    let registry = AlternativesRegistry::new();
    let a = plain(&registry, 0);
    let b = plain(&registry, 1);
    a.set_alternative(&b);
    let gid = a.group_id().unwrap();

    {
        let hold = GroupHold::acquire(&registry, &a).unwrap();
        assert_eq!(hold.group_id(), gid);
        assert_eq!(registry.count(gid), 3);
    }
    assert_eq!(registry.count(gid), 2);
    assert!(registry.is_alive(gid));
}

static BUILDS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct Counted;

impl ResourceData for Counted {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ConvertFrom for Counted {
    fn convert_from(_source: &Resource) -> Result<Self, ConvertError> {
        BUILDS.fetch_add(1, Ordering::SeqCst);
        // Widen the race window a little.
        std::thread::yield_now();
        Ok(Counted)
    }
}

#[test]
fn test_exactly_once_construction_under_contention() {
    let registry = AlternativesRegistry::new();
    let res = plain(&registry, 0);

    let ids: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let res = res.clone();
                scope.spawn(move || res.get_alternative::<Counted>().unwrap().id())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
    // All 100 callers observed the same constructed instance.
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    // And it was registered as an alternative of the source.
    assert_eq!(res.find_alternative::<Counted>().map(|r| r.id()), Some(ids[0]));
}

#[test]
fn test_get_alternative_reregisters_after_group_teardown() {
    #[derive(Debug)]
    struct Derived;

    impl ResourceData for Derived {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl ConvertFrom for Derived {
        fn convert_from(_source: &Resource) -> Result<Self, ConvertError> {
            Ok(Derived)
        }
    }

    let registry = AlternativesRegistry::new();
    let res = plain(&registry, 0);
    let alt = res.get_alternative::<Derived>().unwrap();
    let gid = res.group_id().unwrap();

    // One external hold, released as "last use": the group tears down
    // and both memberships vanish, while the conversion memo remains.
    registry.ref_group(gid);
    assert!(!registry.unref_group(gid));
    assert!(res.group_id().is_none());
    assert!(res.find_alternative::<Derived>().is_none());

    // The memo hit hands back the same instance and links it again.
    let again = res.get_alternative::<Derived>().unwrap();
    assert_eq!(again.id(), alt.id());
    assert_eq!(res.find_alternative::<Derived>().map(|r| r.id()), Some(alt.id()));
    assert_eq!(res.group_id(), alt.group_id());
    assert!(res.group_id().is_some());
}

#[test]
fn test_failed_conversion_registers_nothing() {
    #[derive(Debug)]
    struct AlwaysFails;

    impl ResourceData for AlwaysFails {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl ConvertFrom for AlwaysFails {
        fn convert_from(source: &Resource) -> Result<Self, ConvertError> {
            Err(ConvertError::BlankSource(source.id()))
        }
    }

    let registry = AlternativesRegistry::new();
    let res = plain(&registry, 0);
    assert!(res.get_alternative::<AlwaysFails>().is_err());
    assert!(res.group_id().is_none());
    assert!(res.find_alternative::<AlwaysFails>().is_none());
    // The failure did not poison the memo; a retry fails cleanly again.
    assert!(res.get_alternative::<AlwaysFails>().is_err());
}
