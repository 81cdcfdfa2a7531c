//! Directory integration tests.
//!
//! These exercise the directory the way the coordinator drives it: many
//! request handlers sharing one `Arc<TabletDirectory>`, recovery marking a
//! failed server's tablets and reassigning them, and repeated splits that
//! must keep a table's key space exactly covered.

use rand::Rng;
use std::sync::Arc;
use tablets_common::{LogPosition, ServerId, MAX_KEY_HASH};
use tablets_directory::{
    DirectoryError, Snapshot, StaticServerRegistry, Tablet, TabletDirectory, TabletStatus,
};

fn whole_table(table_id: u64, server: ServerId) -> Tablet {
    Tablet::new(
        table_id,
        0,
        MAX_KEY_HASH,
        server,
        TabletStatus::Normal,
        LogPosition::new(0, 0),
    )
}

/// Assert that `tablets` cover `[0, MAX_KEY_HASH]` with no gaps or overlaps.
fn assert_tiles_key_space(mut tablets: Vec<Tablet>) {
    tablets.sort_by_key(|t| t.start_key_hash);
    assert_eq!(tablets.first().map(|t| t.start_key_hash), Some(0));
    assert_eq!(tablets.last().map(|t| t.end_key_hash), Some(MAX_KEY_HASH));
    for pair in tablets.windows(2) {
        assert!(pair[0].start_key_hash <= pair[0].end_key_hash);
        assert_eq!(
            pair[0].end_key_hash + 1,
            pair[1].start_key_hash,
            "gap or overlap between {} and {}",
            pair[0],
            pair[1]
        );
    }
}

// ────────────────────────── Splits ──────────────────────────

#[test]
fn test_random_splits_keep_table_tiled() {
    let d = TabletDirectory::new();
    let owner = ServerId::new(1, 0);
    d.add(whole_table(0, owner));
    d.add(whole_table(1, owner));

    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let tablets = d.list_for_table(0);
        let victim = &tablets[rng.gen_range(0..tablets.len())];
        if victim.start_key_hash == victim.end_key_hash {
            continue;
        }
        let split = rng.gen_range(victim.start_key_hash + 1..=victim.end_key_hash);
        d.split(0, victim.start_key_hash, victim.end_key_hash, split)
            .unwrap();

        // The split halves are reachable by exact match, the old range is not.
        assert!(d.lookup(0, victim.start_key_hash, split - 1).is_ok());
        assert!(d.lookup(0, split, victim.end_key_hash).is_ok());
        assert!(d
            .lookup(0, victim.start_key_hash, victim.end_key_hash)
            .is_err());
    }

    let table0 = d.list_for_table(0);
    assert!(table0.len() > 1);
    assert_tiles_key_space(table0.clone());

    // A random key hash lands in exactly one tablet.
    for _ in 0..100 {
        let probe: u64 = rng.gen();
        assert_eq!(table0.iter().filter(|t| t.contains(probe)).count(), 1);
    }

    // Table 1 never moved from its slot.
    assert_eq!(d.tablets()[1], whole_table(1, owner));
    assert_eq!(d.list_for_table(1).len(), 1);
}

#[test]
fn test_split_appends_at_global_end() {
    let d = TabletDirectory::new();
    let owner = ServerId::new(2, 0);
    d.add(Tablet::new(
        5,
        0,
        99,
        owner,
        TabletStatus::Normal,
        LogPosition::new(4, 4),
    ));
    d.add(Tablet::new(
        6,
        0,
        99,
        owner,
        TabletStatus::Normal,
        LogPosition::new(4, 4),
    ));

    d.split(5, 0, 99, 50).unwrap();
    let keys: Vec<_> = d.tablets().iter().map(Tablet::key).collect();
    assert_eq!(keys, vec![(5, 0, 49), (6, 0, 99), (5, 50, 99)]);

    let snapshot_keys: Vec<_> = d
        .serialize(&StaticServerRegistry::from_iter([(owner, "x".to_string())]))
        .unwrap()
        .iter()
        .map(|e| (e.table_id, e.start_key_hash, e.end_key_hash))
        .collect();
    assert_eq!(snapshot_keys, keys);
}

// ────────────────────────── Recovery flow ──────────────────────────

#[test]
fn test_recovery_reassigns_failed_server_tablets() {
    let failed = ServerId::new(1, 0);
    let healthy = ServerId::new(2, 0);
    let d = TabletDirectory::new();
    d.add(Tablet::new(0, 0, 99, failed, TabletStatus::Normal, LogPosition::new(1, 0)));
    d.add(Tablet::new(0, 100, 199, healthy, TabletStatus::Normal, LogPosition::new(1, 0)));
    d.add(Tablet::new(1, 0, 99, failed, TabletStatus::Normal, LogPosition::new(1, 0)));

    let recovering = d.set_status_for_server(failed, TabletStatus::Recovering);
    assert_eq!(recovering.len(), 2);
    assert_eq!(d.lookup(0, 100, 199).unwrap().status, TabletStatus::Normal);

    // Index reuse with a new generation is a different server.
    let replacement = ServerId::new(1, 1);
    for t in &recovering {
        d.modify(
            t.table_id,
            t.start_key_hash,
            t.end_key_hash,
            replacement,
            TabletStatus::Normal,
            LogPosition::new(7, 42),
        )
        .unwrap();
    }

    assert!(d
        .set_status_for_server(failed, TabletStatus::Recovering)
        .is_empty());
    let t = d.lookup(1, 0, 99).unwrap();
    assert_eq!(t.server_id, replacement);
    assert_eq!(t.status, TabletStatus::Normal);
    assert_eq!(t.ctime, LogPosition::new(7, 42));
}

#[test]
fn test_drop_table_then_lookup_fails() {
    let d = TabletDirectory::new();
    let owner = ServerId::new(3, 0);
    d.add(whole_table(0, owner));
    d.add(whole_table(1, owner));
    d.split(0, 0, MAX_KEY_HASH, 1 << 63).unwrap();
    d.split(0, 0, (1 << 63) - 1, 1 << 62).unwrap();

    let before = d.size();
    let removed = d.remove_for_table(0);
    assert_eq!(removed.len(), 3);
    assert_eq!(d.size(), before - 3);
    for t in &removed {
        assert!(matches!(
            d.lookup(t.table_id, t.start_key_hash, t.end_key_hash),
            Err(DirectoryError::NoSuchTablet { .. })
        ));
    }
    assert_eq!(d.tablets(), vec![whole_table(1, owner)]);
}

// ────────────────────────── Snapshot ──────────────────────────

#[test]
fn test_snapshot_json_round_trip() {
    let id1 = ServerId::new(1, 0);
    let id2 = ServerId::new(2, 3);
    let registry: StaticServerRegistry = [
        (id1, "tcp:host=one,port=11100".to_string()),
        (id2, "tcp:host=two,port=11100".to_string()),
    ]
    .into_iter()
    .collect();

    let d = TabletDirectory::new();
    d.add(Tablet::new(0, 1, 6, id1, TabletStatus::Normal, LogPosition::new(0, 5)));
    d.add(Tablet::new(1, 2, 7, id2, TabletStatus::Recovering, LogPosition::new(1, 6)));

    let snapshot = d.serialize(&registry).unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.tablets[0].service_locator, "tcp:host=one,port=11100");
    assert_eq!(snapshot.tablets[1].service_locator, "tcp:host=two,port=11100");
    assert_eq!(snapshot.tablets[1].server_id, id2.id());

    let decoded = Snapshot::from_json(&snapshot.to_json_pretty().unwrap()).unwrap();
    assert_eq!(decoded, snapshot);
    let rebuilt: Vec<Tablet> = decoded.iter().map(|e| e.to_tablet()).collect();
    assert_eq!(rebuilt, d.tablets());
}

// ────────────────────────── Concurrency ──────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_handlers_share_directory() {
    let d = Arc::new(TabletDirectory::new());
    let tables = 16u64;

    // One handler per table creates it and splits it into 8 tablets.
    let mut handles = Vec::new();
    for table_id in 0..tables {
        let d = d.clone();
        handles.push(tokio::spawn(async move {
            let owner = ServerId::new(table_id as u32 % 4, 0);
            d.add(whole_table(table_id, owner));
            let mut end = MAX_KEY_HASH;
            for i in 1..8u64 {
                let split = MAX_KEY_HASH - (MAX_KEY_HASH / 8) * i;
                d.split(table_id, 0, end, split).unwrap();
                end = split - 1;
            }
        }));
    }
    // Meanwhile a recovery handler flips server 0 to RECOVERING and back.
    let recovery = {
        let d = d.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                d.set_status_for_server(ServerId::new(0, 0), TabletStatus::Recovering);
                tokio::task::yield_now().await;
                d.set_status_for_server(ServerId::new(0, 0), TabletStatus::Normal);
            }
        })
    };

    for h in handles {
        h.await.unwrap();
    }
    recovery.await.unwrap();

    assert_eq!(d.size(), (tables * 8) as usize);
    for table_id in 0..tables {
        let tablets = d.list_for_table(table_id);
        assert_eq!(tablets.len(), 8);
        assert_tiles_key_space(tablets);
    }
    assert!(d
        .tablets()
        .iter()
        .all(|t| t.status == TabletStatus::Normal));
}

#[test]
fn test_concurrent_threads_remove_and_add() {
    let d = Arc::new(TabletDirectory::new());
    let owner = ServerId::new(1, 0);

    let writers: Vec<_> = (0..4u64)
        .map(|w| {
            let d = d.clone();
            std::thread::spawn(move || {
                for i in 0..100u64 {
                    let table_id = w * 1000 + i;
                    d.add(whole_table(table_id, owner));
                    if i % 2 == 0 {
                        assert_eq!(d.remove_for_table(table_id).len(), 1);
                    }
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    assert_eq!(d.size(), 4 * 50);
    for w in 0..4u64 {
        for i in (1..100u64).step_by(2) {
            assert!(d.lookup(w * 1000 + i, 0, MAX_KEY_HASH).is_ok());
        }
    }
}
