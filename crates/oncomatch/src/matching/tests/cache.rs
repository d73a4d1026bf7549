use std::cell::Cell;
use std::time::Duration;

use crate::matching::cache::TtlCache;

const TTL: Duration = Duration::from_secs(300);

#[tokio::test(start_paused = true)]
async fn refresh_runs_only_on_miss_or_expiry() {
    let cache: TtlCache<&'static str, u32> = TtlCache::new();
    let refreshes = Cell::new(0);
    let counter = &refreshes;

    for _ in 0..3 {
        let value = cache
            .get_or_refresh("nsclc", TTL, move || async move {
                counter.set(counter.get() + 1);
                Ok::<_, ()>(7)
            })
            .await
            .expect("refresh");
        assert_eq!(value, 7);
    }
    assert_eq!(refreshes.get(), 1);

    tokio::time::advance(TTL).await;
    cache
        .get_or_refresh("nsclc", TTL, move || async move {
            counter.set(counter.get() + 1);
            Ok::<_, ()>(8)
        })
        .await
        .expect("refresh");
    assert_eq!(refreshes.get(), 2);
    assert_eq!(cache.get(&"nsclc", TTL), Some(8));
}

#[tokio::test]
async fn failed_refresh_is_not_stored() {
    let cache: TtlCache<&'static str, u32> = TtlCache::new();

    let outcome = cache
        .get_or_refresh("crc", TTL, || async { Err::<u32, _>("unavailable") })
        .await;

    assert_eq!(outcome, Err("unavailable"));
    assert!(cache.is_empty());
}

#[test]
fn clear_drops_every_entry() {
    let cache = TtlCache::new();
    cache.insert("nsclc", 1);
    cache.insert("sclc", 2);
    assert_eq!(cache.len(), 2);

    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(cache.get(&"nsclc", TTL), None);
}
