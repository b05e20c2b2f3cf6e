use chrono::{DateTime, Duration, TimeZone, Utc};
use newsfeed_core::{
    CandidateItem, CycleCommit, NewsFilter, NewsListQuery, NewsRepository, NewsService,
    NewsServiceError, NewsStore, RepoError, RetentionPolicy, SqliteNewsRepository,
};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, hour, 0, 0).unwrap()
}

fn candidate(source: &str, title: &str) -> CandidateItem {
    CandidateItem {
        source: source.to_string(),
        title: title.to_string(),
        link: format!("https://{source}.example/{}", title.replace(' ', "-")),
        summary: None,
        published_at: at(0),
    }
}

fn commit(
    store: &NewsStore,
    candidates: &[CandidateItem],
    ingested_at: DateTime<Utc>,
    limit: u32,
) -> Result<CycleCommit, RepoError> {
    store.with_repo(|repo| repo.commit_cycle(candidates, ingested_at, &RetentionPolicy::new(limit)))
}

fn list(store: &NewsStore, filter: &NewsFilter) -> Vec<String> {
    store
        .with_conn(|conn| NewsService::new(SqliteNewsRepository::new(conn)).list_items(filter))
        .unwrap()
        .into_iter()
        .map(|item| item.title)
        .collect()
}

fn count(store: &NewsStore, favorite: Option<bool>) -> u64 {
    store.with_repo(|repo| repo.count_items(favorite)).unwrap()
}

fn id_of(store: &NewsStore, title: &str) -> i64 {
    store
        .with_repo(|repo| repo.list_items(&NewsListQuery::default()))
        .unwrap()
        .into_iter()
        .find(|item| item.title == title)
        .map(|item| item.id)
        .unwrap()
}

#[test]
fn first_write_wins_for_same_source_and_title() {
    let store = NewsStore::open_in_memory().unwrap();
    let original = candidate("alpha", "Rates rise");
    let mut changed = original.clone();
    changed.link = "https://alpha.example/changed".to_string();
    changed.summary = Some("rewritten".to_string());

    let first = commit(&store, &[original.clone()], at(1), 50).unwrap();
    let second = commit(&store, &[changed, candidate("beta", "Rates rise")], at(2), 50).unwrap();

    assert_eq!(first.inserted, 1);
    assert_eq!(second.inserted, 1);
    assert_eq!(count(&store, None), 2);

    let id = id_of(&store, "Rates rise");
    let stored = store
        .with_repo(|repo| repo.get_item(id))
        .unwrap()
        .unwrap();
    assert_eq!(stored.source, "alpha");
    assert_eq!(stored.link, original.link);
    assert_eq!(stored.summary, None);
    assert_eq!(stored.ingested_at, at(1));
}

#[test]
fn duplicates_inside_one_batch_insert_once() {
    let store = NewsStore::open_in_memory().unwrap();
    let batch = vec![candidate("alpha", "Same"), candidate("alpha", "Same")];

    let result = commit(&store, &batch, at(1), 50).unwrap();

    assert_eq!(result.inserted, 1);
    assert_eq!(count(&store, None), 1);
}

#[test]
fn trim_keeps_limit_and_spares_favorites() {
    let store = NewsStore::open_in_memory().unwrap();

    let favorites: Vec<_> = (0..5).map(|i| candidate("alpha", &format!("fav {i}"))).collect();
    commit(&store, &favorites, at(0), 50).unwrap();
    for i in 0..5 {
        let id = id_of(&store, &format!("fav {i}"));
        store.with_repo(|repo| repo.set_favorite(id, true)).unwrap();
    }

    let older: Vec<_> = (0..30).map(|i| candidate("alpha", &format!("old {i}"))).collect();
    let newer: Vec<_> = (0..30).map(|i| candidate("beta", &format!("new {i}"))).collect();
    commit(&store, &older, at(1), 1_000).unwrap();
    commit(&store, &newer, at(2), 1_000).unwrap();
    assert_eq!(count(&store, Some(false)), 60);

    // A cycle with no new entries still trims.
    let result = commit(&store, &[], at(3), 50).unwrap();

    assert_eq!(result.inserted, 0);
    assert_eq!(result.evicted, 10);
    assert_eq!(count(&store, Some(false)), 50);
    assert_eq!(count(&store, Some(true)), 5);

    let titles = list(&store, &NewsFilter::default());
    for i in 0..20 {
        assert!(titles.contains(&format!("old {i}")));
    }
    for i in 20..30 {
        assert!(!titles.contains(&format!("old {i}")), "old {i} should be evicted");
    }
    for i in 0..5 {
        assert!(titles.contains(&format!("fav {i}")));
    }
}

#[test]
fn failing_insert_rolls_back_whole_cycle() {
    let store = NewsStore::open_in_memory().unwrap();
    commit(
        &store,
        &(0..3).map(|i| candidate("alpha", &format!("kept {i}"))).collect::<Vec<_>>(),
        at(0),
        1,
    )
    .unwrap();
    assert_eq!(count(&store, None), 1);

    store
        .with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER fail_on_boom BEFORE INSERT ON news_items
                 WHEN NEW.title = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
            )
            .map_err(RepoError::from)
        })
        .unwrap();

    let batch = vec![
        candidate("alpha", "fresh"),
        candidate("alpha", "boom"),
        candidate("alpha", "later"),
    ];
    let err = commit(&store, &batch, at(1), 1).unwrap_err();

    assert!(matches!(err, RepoError::Db(_)));
    assert_eq!(list(&store, &NewsFilter::default()), vec!["kept 2".to_string()]);
}

#[test]
fn invalid_candidate_rejects_batch_before_writing() {
    let store = NewsStore::open_in_memory().unwrap();
    let mut broken = candidate("alpha", "broken");
    broken.link = "  ".to_string();

    let err = commit(&store, &[candidate("alpha", "fine"), broken], at(1), 50).unwrap_err();

    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(count(&store, None), 0);
}

#[test]
fn listing_is_newest_cycle_first_then_feed_order() {
    let store = NewsStore::open_in_memory().unwrap();
    commit(&store, &[candidate("alpha", "a1"), candidate("alpha", "a2")], at(1), 50).unwrap();
    commit(&store, &[candidate("beta", "b1"), candidate("beta", "b2")], at(2), 50).unwrap();

    assert_eq!(list(&store, &NewsFilter::default()), vec!["b1", "b2", "a1", "a2"]);

    let page = NewsFilter {
        limit: Some(2),
        offset: 1,
        ..NewsFilter::default()
    };
    assert_eq!(list(&store, &page), vec!["b2", "a1"]);
}

#[test]
fn filters_by_source_text_date_and_favorite() {
    let store = NewsStore::open_in_memory().unwrap();
    let mut economy = candidate("alpha", "Économie en hausse");
    economy.summary = Some("Les marchés progressent".to_string());
    economy.published_at = at(8);
    let mut sport = candidate("beta", "Match report");
    sport.summary = Some("A late goal decided the ÉCONOMIE derby".to_string());
    sport.published_at = at(8) - Duration::days(2);
    let mut weather = candidate("beta", "Weather");
    weather.published_at = at(8) + Duration::days(1);
    commit(&store, &[economy, sport, weather], at(9), 50).unwrap();

    let by_source = NewsFilter {
        source: Some("beta".to_string()),
        ..NewsFilter::default()
    };
    assert_eq!(list(&store, &by_source), vec!["Match report", "Weather"]);

    let by_text = NewsFilter {
        text_query: Some("économie".to_string()),
        ..NewsFilter::default()
    };
    assert_eq!(list(&store, &by_text), vec!["Économie en hausse", "Match report"]);

    let one_day = NewsFilter {
        date_from: Some(at(0).date_naive()),
        date_to: Some(at(0).date_naive()),
        ..NewsFilter::default()
    };
    assert_eq!(list(&store, &one_day), vec!["Économie en hausse"]);

    let open_start = NewsFilter {
        date_to: Some(at(0).date_naive()),
        ..NewsFilter::default()
    };
    assert_eq!(list(&store, &open_start), vec!["Économie en hausse", "Match report"]);

    let weather_id = id_of(&store, "Weather");
    store.with_repo(|repo| repo.set_favorite(weather_id, true)).unwrap();
    let favorites = NewsFilter {
        favorite_only: true,
        ..NewsFilter::default()
    };
    assert_eq!(list(&store, &favorites), vec!["Weather"]);
}

#[test]
fn flag_updates_persist_and_report_missing_items() {
    let store = NewsStore::open_in_memory().unwrap();
    commit(&store, &[candidate("alpha", "one")], at(1), 50).unwrap();
    let id = id_of(&store, "one");

    store
        .with_conn(|conn| {
            let service = NewsService::new(SqliteNewsRepository::new(conn));
            service.set_read(id, true)?;
            service.set_favorite(id, true)?;
            service.get_item(id)
        })
        .map(|item| {
            assert!(item.is_read);
            assert!(item.is_favorite);
            assert!(!item.is_evictable());
        })
        .unwrap();

    let missing = store.with_conn(|conn| {
        NewsService::new(SqliteNewsRepository::new(conn)).set_read(id + 100, true)
    });
    assert!(matches!(missing, Err(NewsServiceError::ItemNotFound(found)) if found == id + 100));

    let missing = store.with_conn(|conn| {
        NewsService::new(SqliteNewsRepository::new(conn)).set_favorite(id + 100, false)
    });
    assert!(matches!(missing, Err(NewsServiceError::ItemNotFound(_))));
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("news.db");

    let store = NewsStore::open(&path).unwrap();
    commit(&store, &[candidate("alpha", "persisted")], at(1), 50).unwrap();
    drop(store);

    let reopened = NewsStore::open(&path).unwrap();
    assert_eq!(list(&reopened, &NewsFilter::default()), vec!["persisted"]);
}
