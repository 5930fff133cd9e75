//! Session-level tests for the handle cache and the same-row reader.
//!
//! Exercises the full path a statement takes:
//! - Registry opens the share, cache hands out or parks handles
//! - Rows written and re-read through handles and indexes
//! - DDL invalidation through share versions
//! - Index disable/enable while other sessions hold handles
//! - Many sessions sharing one cache

use bytes::Bytes;
use rand::Rng;
use std::sync::Arc;
use std::thread;

use heron_cache::HandleCache;
use heron_common::{HeronConfig, HeronError, IndexId, TableId};
use heron_storage::{ExecutionContext, IndexDef, Record, ShareRegistry, TableHandle};

// =============================================================================
// Helpers
// =============================================================================

fn orders() -> TableId {
    TableId::new("shop", "orders")
}

/// Table with two non-unique indexes: customer (column 0) and status (column 1).
fn setup(config: HeronConfig) -> (ShareRegistry, HandleCache) {
    let cache = HandleCache::new(&config);
    let registry = ShareRegistry::new(config);
    registry
        .create_table(
            orders(),
            vec![
                IndexDef::new("by_customer", vec![0]),
                IndexDef::new("by_status", vec![1]),
            ],
        )
        .unwrap();
    (registry, cache)
}

/// Takes an idle handle or opens a new one, as a session does per statement.
fn acquire(registry: &ShareRegistry, cache: &HandleCache, table: &TableId) -> TableHandle {
    match cache.take(table) {
        Some(handle) => handle,
        None => TableHandle::open(registry.open_share(table).unwrap()),
    }
}

fn row(customer: &str, status: &str, amount: u32) -> Record {
    Record::from_columns([
        Bytes::copy_from_slice(customer.as_bytes()),
        Bytes::copy_from_slice(status.as_bytes()),
        Bytes::from(amount.to_le_bytes().to_vec()),
    ])
}

fn key(customer: &str) -> Record {
    Record::from_columns([Bytes::copy_from_slice(customer.as_bytes())])
}

// =============================================================================
// Statement lifecycle
// =============================================================================

#[test]
fn test_handles_are_reused_across_statements() {
    let (registry, cache) = setup(HeronConfig::default());
    let table = orders();

    let mut handle = acquire(&registry, &cache, &table);
    handle.insert(&row("alice", "open", 10)).unwrap();
    handle.insert(&row("bob", "open", 20)).unwrap();
    assert!(cache.release(handle).is_some());

    let mut handle = acquire(&registry, &cache, &table);
    let mut record = Record::new();
    handle
        .index_read(IndexId(0), &key("bob"), &mut record)
        .unwrap();
    assert_eq!(record.column(0).unwrap().as_ref(), b"bob");
    handle.read_same(&mut record, Some(IndexId(0))).unwrap();
    assert_eq!(record.column(0).unwrap().as_ref(), b"bob");
    cache.release(handle);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.idle, 1);
    assert_eq!(registry.open_share(&table).unwrap().refcount(), 1);
}

#[test]
fn test_statement_runs_inside_execution_context() {
    let config = HeronConfig::default();
    let (registry, cache) = setup(config.clone());
    let table = orders();

    let amount = ExecutionContext::run(&config, |ctx| {
        let mut handle = acquire(&registry, &cache, &table);
        let mut record = row("carol", "paid", 99);
        handle.insert(&record)?;
        handle.read_same(&mut record, Some(IndexId(1)))?;
        let scratch = ctx.arena().memdup(record.column(2).unwrap())?;
        cache.release(handle);
        Ok(u32::from_le_bytes([scratch[0], scratch[1], scratch[2], scratch[3]]))
    })
    .unwrap();

    assert_eq!(amount, 99);
    assert_eq!(cache.idle_count_for(&table), 1);
}

// =============================================================================
// DDL invalidation
// =============================================================================

#[test]
fn test_dropped_table_handles_are_culled() {
    let (registry, cache) = setup(HeronConfig::default());
    let table = orders();

    let handles: Vec<_> = (0..3)
        .map(|_| acquire(&registry, &cache, &table))
        .collect();
    for handle in handles {
        cache.release(handle);
    }
    let share = registry.open_share(&table).unwrap();
    assert_eq!(share.refcount(), 3);

    registry.drop_table(&table).unwrap();
    assert_eq!(cache.cull_by_version(), 3);
    assert_eq!(share.refcount(), 0);
    assert_eq!(cache.idle_count(), 0);
    assert!(matches!(
        registry.open_share(&table),
        Err(HeronError::TableNotFound(_))
    ));
}

#[test]
fn test_stale_handle_is_never_handed_out() {
    let (registry, cache) = setup(HeronConfig::default());
    let table = orders();

    cache.release(acquire(&registry, &cache, &table));
    registry.open_share(&table).unwrap().bump_version();

    assert!(cache.take(&table).is_none());
    assert_eq!(cache.stats().evicted_stale, 1);
}

#[test]
fn test_unused_shares_flushed_after_cull() {
    let (registry, cache) = setup(HeronConfig::default());
    let table = orders();

    let mut handle = acquire(&registry, &cache, &table);
    handle.insert(&row("dave", "open", 5)).unwrap();
    cache.release(handle);

    assert_eq!(registry.flush_unused(), 0);
    assert_eq!(cache.cull(0), 1);
    assert_eq!(registry.flush_unused(), 1);
    assert_eq!(registry.share_count(), 0);

    // Reopening rebuilds the indexes from the stored rows.
    let mut handle = acquire(&registry, &cache, &table);
    let mut record = Record::new();
    handle
        .index_read(IndexId(0), &key("dave"), &mut record)
        .unwrap();
    assert_eq!(record.column(1).unwrap().as_ref(), b"open");
}

// =============================================================================
// Index availability
// =============================================================================

#[test]
fn test_disabled_index_rejects_reread_without_locking() {
    let (registry, cache) = setup(HeronConfig::default());
    let table = orders();

    let mut handle = acquire(&registry, &cache, &table);
    handle.insert(&row("erin", "open", 1)).unwrap();
    let mut record = Record::new();
    handle
        .index_read(IndexId(0), &key("erin"), &mut record)
        .unwrap();

    let share = Arc::clone(handle.share());
    assert_eq!(share.active_indexes().to_string(), "0b11");
    share.disable_index(IndexId(1)).unwrap();
    assert_eq!(share.active_indexes().to_string(), "0b1");

    let locks_before = share.index_lock_acquisitions();
    assert!(matches!(
        handle.read_same(&mut record, Some(IndexId(1))),
        Err(HeronError::WrongIndex { index: 1 })
    ));
    assert_eq!(share.index_lock_acquisitions(), locks_before);

    handle.read_same(&mut record, Some(IndexId(0))).unwrap();
    assert_eq!(record.column(0).unwrap().as_ref(), b"erin");

    share.enable_index(IndexId(1)).unwrap();
    handle.read_same(&mut record, Some(IndexId(1))).unwrap();
    cache.release(handle);
}

#[test]
fn test_other_session_delete_is_seen_by_reread() {
    let (registry, cache) = setup(HeronConfig::default());
    let table = orders();

    let mut writer = acquire(&registry, &cache, &table);
    for i in 0..10 {
        writer.insert(&row("frank", "open", i)).unwrap();
    }

    let mut reader = acquire(&registry, &cache, &table);
    let mut record = Record::new();
    reader.scan_init();
    reader.scan_next(&mut record).unwrap();
    reader.scan_next(&mut record).unwrap();
    let position = reader.last_position();
    assert!(reader.has_buffered_rows());

    writer.read_at(position, &mut record).unwrap();
    writer.delete_current().unwrap();

    assert!(matches!(
        reader.read_same(&mut record, Some(IndexId(0))),
        Err(HeronError::KeyNotFound)
    ));
    assert!(matches!(
        reader.read_same(&mut record, None),
        Err(HeronError::KeyNotFound)
    ));

    cache.release(writer);
    cache.release(reader);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_many_sessions_share_one_cache() {
    const SESSIONS: usize = 8;
    const STATEMENTS: u32 = 100;

    let config = HeronConfig {
        max_idle_handles: 4,
        ..HeronConfig::default()
    };
    let (registry, cache) = setup(config);
    let registry = Arc::new(registry);
    let cache = Arc::new(cache);
    let table = orders();
    registry
        .open_share(&table)
        .unwrap()
        .set_concurrent_insert(true);

    let workers: Vec<_> = (0..SESSIONS)
        .map(|s| {
            let registry = Arc::clone(&registry);
            let cache = Arc::clone(&cache);
            let table = table.clone();
            thread::spawn(move || {
                let customer = format!("session-{s}");
                for i in 0..STATEMENTS {
                    let mut handle = acquire(&registry, &cache, &table);
                    let mut record = row(&customer, "open", i);
                    handle.insert(&record).unwrap();
                    handle.read_same(&mut record, Some(IndexId(0))).unwrap();
                    assert_eq!(record.column(0).unwrap().as_ref(), customer.as_bytes());
                    assert_eq!(record.column(2).unwrap().as_ref(), &i.to_le_bytes());
                    cache.release(handle);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let share = registry.open_share(&table).unwrap();
    assert_eq!(share.rows().len(), SESSIONS as u64 * STATEMENTS as u64);
    assert!(cache.idle_count() <= 4);
    assert_eq!(share.refcount() as usize, cache.idle_count());

    cache.clear();
    assert_eq!(share.refcount(), 0);
}

#[test]
fn test_random_workload_keeps_bound_and_refcounts() {
    let config = HeronConfig::from_json_str(r#"{ "max_idle_handles": 5 }"#).unwrap();
    let cache = HandleCache::new(&config);
    let registry = ShareRegistry::new(config);
    let tables: Vec<_> = (0..4).map(|i| TableId::new("db", format!("t{i}"))).collect();
    for table in &tables {
        registry
            .create_table(table.clone(), vec![IndexDef::new("k", vec![0])])
            .unwrap();
    }

    let mut rng = rand::thread_rng();
    let mut held: Vec<TableHandle> = Vec::new();
    for _ in 0..2_000 {
        let table = &tables[rng.gen_range(0..tables.len())];
        match rng.gen_range(0..10) {
            0..=3 => held.push(acquire(&registry, &cache, table)),
            4..=7 if !held.is_empty() => {
                let handle = held.swap_remove(rng.gen_range(0..held.len()));
                cache.release(handle);
            }
            8 => {
                registry.open_share(table).unwrap().bump_version();
                cache.cull_by_version();
            }
            _ => {
                cache.cull(rng.gen_range(0..=5));
            }
        }
        assert!(cache.idle_count() <= 5);
        for handle in &held {
            assert_eq!(handle.last_position(), heron_common::RowPosition::NONE);
        }
    }

    let open: u32 = tables
        .iter()
        .map(|t| registry.open_share(t).unwrap().refcount())
        .sum();
    assert_eq!(open as usize, held.len() + cache.idle_count());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_round_trips_through_json() {
    let config = HeronConfig {
        max_idle_handles: 12,
        arena_limit_bytes: Some(64 * 1024),
        ..HeronConfig::default()
    };
    let text = serde_json::to_string(&config).unwrap();
    let parsed = HeronConfig::from_json_str(&text).unwrap();
    assert_eq!(parsed, config);
    assert_eq!(HandleCache::new(&parsed).max_idle(), 12);
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(matches!(
        HeronConfig::from_json_str(r#"{ "max_indexes": 0 }"#),
        Err(HeronError::InvalidParameter { .. })
    ));
    assert!(matches!(
        HeronConfig::from_json_str("not json"),
        Err(HeronError::ConfigError(_))
    ));
}
