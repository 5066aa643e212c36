//! Tailing a change log through the provider contract.

use sip_provider::{
    build_meta_provider, MetaInfo, MetaStores, ProviderConfig, SiProvider, StageType,
};
use sip_store::{
    ChangeLog, InMemoryChangeLog, InMemoryKeyspace, InMemoryLogSource, TimeRange, TrimOutcome,
};
use std::sync::Arc;

const PERIOD: &str = "e6a0c4d2-period";

fn setup(shards: u32) -> (Arc<InMemoryChangeLog>, Box<dyn SiProvider>) {
    let log = Arc::new(InMemoryChangeLog::new(shards).with_trim_batch(3));
    let logs = InMemoryLogSource::new();
    logs.insert(PERIOD, Arc::clone(&log));

    let stores = MetaStores {
        keyspace: Arc::new(InMemoryKeyspace::new()),
        logs: Arc::new(logs),
    };
    let config = ProviderConfig::new(PERIOD).with_log_max_shards(shards);
    let mut provider = build_meta_provider(StageType::Incremental, &stores, config);
    provider.init().unwrap();
    (log, provider)
}

#[test]
fn tailing_sees_every_entry_once_while_log_grows() {
    let (log, provider) = setup(4);
    let shard = 2;
    let mut marker = String::new();
    let mut seen = Vec::new();

    for round in 0..5 {
        for i in 0..7 {
            log.append(shard, "bucket", &format!("r{round}-{i}")).unwrap();
        }

        loop {
            let result = provider.fetch(shard, &marker, 4).unwrap();
            assert!(!result.done);
            assert!(result.entries.len() <= 4);

            for entry in &result.entries {
                assert!(entry.key > marker, "entries must move forward");
                marker = entry.key.clone();
                seen.push(MetaInfo::decode(&entry.data).unwrap().id);
            }
            if !result.more {
                break;
            }
        }
    }

    let expected: Vec<String> = (0..5)
        .flat_map(|round| (0..7).map(move |i| format!("r{round}-{i}")))
        .collect();
    assert_eq!(seen, expected);
}

#[test]
fn caught_up_fetch_is_empty_but_not_done() {
    let (log, provider) = setup(1);
    let id = log.append(0, "user", "alice").unwrap();

    let result = provider.fetch(0, &id, 10).unwrap();
    assert!(result.entries.is_empty());
    assert!(!result.done);
    assert!(!result.more);
}

#[test]
fn trim_converges_to_no_data() {
    let (log, provider) = setup(2);
    let mut last = String::new();
    for i in 0..20 {
        last = log.append(1, "user", &format!("u{i}")).unwrap();
    }

    for _ in 0..3 {
        provider.trim(1, &last).unwrap();
        assert!(log.is_empty(1).unwrap());
    }
    assert_eq!(
        log.trim(1, TimeRange::unbounded(), "", &last).unwrap(),
        TrimOutcome::NoData
    );

    // The head position outlives the trimmed records.
    assert_eq!(provider.get_current_state(1).unwrap().marker, last);
}

#[test]
fn fetch_after_trim_resumes_past_the_floor() {
    let (log, provider) = setup(1);
    let ids: Vec<_> = (0..6)
        .map(|i| log.append(0, "user", &format!("u{i}")).unwrap())
        .collect();

    provider.trim(0, &ids[2]).unwrap();

    let result = provider.fetch(0, "", 10).unwrap();
    let keys: Vec<_> = result.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec![ids[3].as_str(), ids[4].as_str(), ids[5].as_str()]);
}

#[test]
fn concurrent_fetches_on_one_shard() {
    let (log, provider) = setup(1);
    for i in 0..50 {
        log.append(0, "user", &format!("u{i}")).unwrap();
    }
    let provider: Arc<dyn SiProvider> = Arc::from(provider);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let provider = Arc::clone(&provider);
            scope.spawn(move || {
                let result = provider.fetch(0, "", 100).unwrap();
                assert_eq!(result.entries.len(), 50);
            });
        }
    });
    assert_eq!(log.open_handles(), 0);
}
