// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::stamp::ManualClock;
use yare::parameterized;

const DAY_MS: u64 = 24 * 60 * 60 * 1000;
const T0: u64 = 1_700_000_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Organization {
    name: String,
}

fn org(name: &str) -> Organization {
    Organization {
        name: name.to_string(),
    }
}

fn setup() -> (EntityCache, Arc<ManualClock>, Arc<Store>) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(T0));
    let cache = EntityCache::with_clock(Arc::clone(&store), clock.clone());
    (cache, clock, store)
}

#[test]
fn hit_before_expiry() {
    let (cache, clock, _) = setup();
    cache
        .put(Partition::CachedOrganization, "org-1", &org("acme"))
        .unwrap();

    clock.advance(7 * DAY_MS - 1);
    let got: Option<Organization> = cache.get(Partition::CachedOrganization, "org-1").unwrap();
    assert_eq!(got, Some(org("acme")));
}

#[test]
fn miss_at_expiry_deletes_entry() {
    let (cache, clock, store) = setup();
    cache
        .put(Partition::CachedOrganization, "org-1", &org("acme"))
        .unwrap();

    clock.advance(7 * DAY_MS);
    let got: Option<Organization> = cache.get(Partition::CachedOrganization, "org-1").unwrap();
    assert!(got.is_none());
    assert_eq!(store.count(Partition::CachedOrganization).unwrap(), 0);
}

#[test]
fn entry_exposes_window() {
    let (cache, _, _) = setup();
    cache
        .put(Partition::CachedProfile, "me", &org("ada"))
        .unwrap();

    let entry: CachedEntity<Organization> = cache
        .get_entry(Partition::CachedProfile, "me")
        .unwrap()
        .unwrap();
    assert_eq!(entry.expires_at - entry.cached_at, Duration::days(7));
    assert_eq!(entry.cached_at.timestamp_millis(), T0 as i64);
}

#[test]
fn put_refreshes_ttl() {
    let (cache, clock, _) = setup();
    cache
        .put(Partition::CachedSession, "current", &org("s1"))
        .unwrap();
    clock.advance(6 * DAY_MS);
    cache
        .put(Partition::CachedSession, "current", &org("s2"))
        .unwrap();
    clock.advance(6 * DAY_MS);

    let got: Option<Organization> = cache.get(Partition::CachedSession, "current").unwrap();
    assert_eq!(got, Some(org("s2")));
}

#[test]
fn custom_ttl() {
    let (cache, clock, _) = setup();
    let cache = cache.with_ttl(Duration::seconds(10));
    cache
        .put(Partition::CachedSubscription, "plan", &org("pro"))
        .unwrap();

    clock.advance(10_000);
    let got: Option<Organization> = cache.get(Partition::CachedSubscription, "plan").unwrap();
    assert!(got.is_none());
}

#[test]
fn invalidate_removes_entry() {
    let (cache, _, _) = setup();
    cache
        .put(Partition::CachedProfile, "me", &org("ada"))
        .unwrap();
    assert!(cache.invalidate(Partition::CachedProfile, "me").unwrap());
    assert!(!cache.invalidate(Partition::CachedProfile, "me").unwrap());
}

#[test]
fn purge_expired_only_touches_stale_entries() {
    let (cache, clock, store) = setup();
    cache
        .put(Partition::CachedProfile, "old", &org("a"))
        .unwrap();
    cache
        .put(Partition::CachedOrganization, "old", &org("b"))
        .unwrap();
    clock.advance(3 * DAY_MS);
    cache
        .put(Partition::CachedProfile, "fresh", &org("c"))
        .unwrap();
    clock.advance(5 * DAY_MS);

    assert_eq!(cache.purge_expired().unwrap(), 2);
    assert_eq!(store.count(Partition::CachedProfile).unwrap(), 1);
    assert_eq!(store.count(Partition::CachedOrganization).unwrap(), 0);
}

#[parameterized(
    pending = { Partition::PendingActions },
    meta = { Partition::SyncMeta },
    dead = { Partition::DeadLetters },
    id_map = { Partition::IdMap },
)]
fn non_cache_partitions_are_rejected(partition: Partition) {
    let (cache, _, _) = setup();
    let err = cache.put(partition, "k", &org("x")).unwrap_err();
    assert!(matches!(err, Error::InvalidPartition(_)));
    assert!(matches!(
        cache.get::<Organization>(partition, "k"),
        Err(Error::InvalidPartition(_))
    ));
}
