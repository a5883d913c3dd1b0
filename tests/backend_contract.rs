//! One behavioral suite, run against every storage backend.

use std::collections::BTreeSet;
use tempfile::TempDir;
use tmstore::core::config::{BackendConfig, Config};
use tmstore::core::types::{Properties, Registry, SegmentText};
use tmstore::storage::backend::{open_backend, StorageBackend};

fn embedded(dir: &TempDir) -> BackendConfig {
    BackendConfig::Embedded {
        path: dir.path().join("tm"),
    }
}

fn relational(dir: &TempDir) -> BackendConfig {
    BackendConfig::Relational {
        database: dir.path().join("tm.db"),
    }
}

fn open(config: &BackendConfig) -> Box<dyn StorageBackend> {
    open_backend(config, &Config::default()).unwrap()
}

fn segment(plain: &str) -> SegmentText {
    SegmentText {
        plain: plain.to_string(),
        markup: format!("<hi>{}</hi>", plain),
    }
}

fn props(pairs: &[(&str, &str)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn keys(values: &[u32]) -> BTreeSet<u32> {
    values.iter().copied().collect()
}

fn units_round_trip(config: BackendConfig) {
    let backend = open(&config);
    assert!(backend.get_unit("1").unwrap().is_none());

    backend.put_unit("2", &props(&[("tuid", "2")])).unwrap();
    backend.put_unit("1", &props(&[("tuid", "1"), ("x-a", "a")])).unwrap();
    assert_eq!(backend.unit_ids().unwrap(), vec!["1", "2"]);
    assert_eq!(backend.get_unit("1").unwrap().unwrap()["x-a"], "a");

    // Upsert replaces the whole property map
    backend.put_unit("1", &props(&[("tuid", "1")])).unwrap();
    assert!(!backend.get_unit("1").unwrap().unwrap().contains_key("x-a"));

    let removed = backend.remove_unit("1").unwrap().unwrap();
    assert_eq!(removed["tuid"], "1");
    assert!(backend.remove_unit("1").unwrap().is_none());
    assert_eq!(backend.unit_ids().unwrap(), vec!["2"]);
}

fn empty_properties_still_make_a_unit(config: BackendConfig) {
    let backend = open(&config);
    backend.put_unit("u", &Properties::new()).unwrap();
    assert_eq!(backend.get_unit("u").unwrap(), Some(Properties::new()));
    assert_eq!(backend.unit_ids().unwrap(), vec!["u"]);
}

fn registries_are_sets(config: BackendConfig) {
    let backend = open(&config);
    backend.register(Registry::Languages, "fr").unwrap();
    backend.register(Registry::Languages, "en").unwrap();
    backend.register(Registry::Languages, "fr").unwrap();
    backend.register(Registry::Projects, "Apollo").unwrap();

    let languages: Vec<_> = backend.registry(Registry::Languages).unwrap().into_iter().collect();
    assert_eq!(languages, vec!["en", "fr"]);
    assert_eq!(backend.registry(Registry::Projects).unwrap().len(), 1);
    assert!(backend.registry(Registry::Subjects).unwrap().is_empty());
}

fn segments_per_language(config: BackendConfig) {
    let backend = open(&config);
    assert!(backend.get_segment("en", "1").unwrap().is_none());
    assert!(backend.remove_segment("en", "1").unwrap().is_none());

    backend.put_segment("en", "1", &segment("Hello world")).unwrap();
    backend.put_segment("fr", "1", &segment("Bonjour le monde")).unwrap();

    assert_eq!(backend.get_segment("en", "1").unwrap(), Some(segment("Hello world")));
    assert_eq!(backend.get_segment("fr", "1").unwrap(), Some(segment("Bonjour le monde")));
    assert!(backend.get_segment("de", "1").unwrap().is_none());

    assert_eq!(backend.remove_segment("en", "1").unwrap(), Some(segment("Hello world")));
    assert!(backend.get_segment("en", "1").unwrap().is_none());
    assert!(backend.get_segment("fr", "1").unwrap().is_some());
}

fn exact_buckets_ignore_case(config: BackendConfig) {
    let backend = open(&config);
    backend.put_segment("en", "1", &segment("Hello World")).unwrap();
    backend.put_segment("en", "2", &segment("hello world")).unwrap();
    backend.put_segment("en", "3", &segment("Something else")).unwrap();

    assert_eq!(backend.exact_candidates("en", "HELLO WORLD").unwrap(), vec!["1", "2"]);
    assert!(backend.exact_candidates("fr", "hello world").unwrap().is_empty());

    backend.remove_segment("en", "1").unwrap();
    assert_eq!(backend.exact_candidates("en", "hello world").unwrap(), vec!["2"]);
}

fn scans_follow_id_order(config: BackendConfig) {
    let backend = open(&config);
    for id in ["30", "10", "20"] {
        backend.put_segment("en", id, &segment(&format!("text {}", id))).unwrap();
    }
    assert_eq!(backend.segment_ids("en").unwrap(), vec!["10", "20", "30"]);
    assert!(backend.segment_ids("de").unwrap().is_empty());

    let mut seen = Vec::new();
    backend
        .scan_segments("en", &mut |id, segment| {
            seen.push((id.to_string(), segment.plain.clone()));
            seen.len() < 2
        })
        .unwrap();
    assert_eq!(
        seen,
        vec![
            ("10".to_string(), "text 10".to_string()),
            ("20".to_string(), "text 20".to_string()),
        ]
    );
}

fn postings_add_and_remove(config: BackendConfig) {
    let backend = open(&config);
    assert!(backend.postings("en", 7).unwrap().is_empty());
    backend.remove_postings("en", "1", &keys(&[7])).unwrap();

    backend.add_postings("en", "2", &keys(&[7, 8])).unwrap();
    backend.add_postings("en", "1", &keys(&[7])).unwrap();
    backend.add_postings("en", "1", &keys(&[7])).unwrap();
    backend.add_postings("fr", "1", &keys(&[7])).unwrap();

    assert_eq!(backend.postings("en", 7).unwrap(), vec!["1", "2"]);
    assert_eq!(backend.postings("en", 8).unwrap(), vec!["2"]);
    assert_eq!(backend.postings("fr", 7).unwrap(), vec!["1"]);

    backend.remove_postings("en", "2", &keys(&[7, 8])).unwrap();
    assert_eq!(backend.postings("en", 7).unwrap(), vec!["1"]);
    assert!(backend.postings("en", 8).unwrap().is_empty());
    assert_eq!(backend.postings("fr", 7).unwrap(), vec!["1"]);
}

fn committed_data_survives_reopen(config: BackendConfig) {
    {
        let backend = open(&config);
        backend.put_unit("1", &props(&[("tuid", "1")])).unwrap();
        backend.register(Registry::Languages, "en").unwrap();
        backend.put_segment("en", "1", &segment("Hello")).unwrap();
        backend.add_postings("en", "1", &keys(&[42])).unwrap();
        backend.commit().unwrap();
        backend.close().unwrap();
    }

    let backend = open(&config);
    assert_eq!(backend.unit_ids().unwrap(), vec!["1"]);
    assert!(backend.registry(Registry::Languages).unwrap().contains("en"));
    assert_eq!(backend.get_segment("en", "1").unwrap(), Some(segment("Hello")));
    assert_eq!(backend.exact_candidates("en", "hello").unwrap(), vec!["1"]);
    assert_eq!(backend.postings("en", 42).unwrap(), vec!["1"]);
}

fn uncommitted_writes_are_rolled_back(config: BackendConfig) {
    {
        let backend = open(&config);
        backend.put_unit("1", &Properties::new()).unwrap();
        backend.put_segment("en", "1", &segment("Hello")).unwrap();
        backend.commit().unwrap();

        backend.put_unit("2", &Properties::new()).unwrap();
        backend.register(Registry::Projects, "Draft").unwrap();
        backend.put_segment("en", "2", &segment("Hello again")).unwrap();
        backend.put_segment("de", "2", &segment("Hallo")).unwrap();
        backend.add_postings("en", "2", &keys(&[5])).unwrap();
        backend.remove_segment("en", "1").unwrap();
        // Dropped without commit or close
    }

    let backend = open(&config);
    assert_eq!(backend.unit_ids().unwrap(), vec!["1"]);
    assert!(backend.registry(Registry::Projects).unwrap().is_empty());
    assert_eq!(backend.get_segment("en", "1").unwrap(), Some(segment("Hello")));
    assert!(backend.get_segment("en", "2").unwrap().is_none());
    assert!(backend.get_segment("de", "2").unwrap().is_none());
    assert!(backend.exact_candidates("en", "hello again").unwrap().is_empty());
    assert!(backend.postings("en", 5).unwrap().is_empty());
}

fn close_then_operate_fails(config: BackendConfig) {
    let backend = open(&config);
    backend.close().unwrap();
    assert!(backend.put_unit("1", &Properties::new()).is_err());
    assert!(backend.postings("en", 1).is_err());
    assert!(backend.commit().is_err());
}

fn delete_all_wipes_storage(config: BackendConfig) {
    let backend = open(&config);
    backend.put_unit("1", &Properties::new()).unwrap();
    backend.put_segment("en", "1", &segment("Hello")).unwrap();
    backend.commit().unwrap();
    backend.delete_all().unwrap();
    drop(backend);

    let backend = open(&config);
    assert!(backend.unit_ids().unwrap().is_empty());
    assert!(backend.get_segment("en", "1").unwrap().is_none());
}

macro_rules! backend_contract {
    ($($backend:ident),+ $(,)?) => {
        $(
            mod $backend {
                use super::*;

                #[test]
                fn units_round_trip() {
                    let dir = TempDir::new().unwrap();
                    super::units_round_trip(super::$backend(&dir));
                }

                #[test]
                fn empty_properties_still_make_a_unit() {
                    let dir = TempDir::new().unwrap();
                    super::empty_properties_still_make_a_unit(super::$backend(&dir));
                }

                #[test]
                fn registries_are_sets() {
                    let dir = TempDir::new().unwrap();
                    super::registries_are_sets(super::$backend(&dir));
                }

                #[test]
                fn segments_per_language() {
                    let dir = TempDir::new().unwrap();
                    super::segments_per_language(super::$backend(&dir));
                }

                #[test]
                fn exact_buckets_ignore_case() {
                    let dir = TempDir::new().unwrap();
                    super::exact_buckets_ignore_case(super::$backend(&dir));
                }

                #[test]
                fn scans_follow_id_order() {
                    let dir = TempDir::new().unwrap();
                    super::scans_follow_id_order(super::$backend(&dir));
                }

                #[test]
                fn postings_add_and_remove() {
                    let dir = TempDir::new().unwrap();
                    super::postings_add_and_remove(super::$backend(&dir));
                }

                #[test]
                fn committed_data_survives_reopen() {
                    let dir = TempDir::new().unwrap();
                    super::committed_data_survives_reopen(super::$backend(&dir));
                }

                #[test]
                fn uncommitted_writes_are_rolled_back() {
                    let dir = TempDir::new().unwrap();
                    super::uncommitted_writes_are_rolled_back(super::$backend(&dir));
                }

                #[test]
                fn close_then_operate_fails() {
                    let dir = TempDir::new().unwrap();
                    super::close_then_operate_fails(super::$backend(&dir));
                }

                #[test]
                fn delete_all_wipes_storage() {
                    let dir = TempDir::new().unwrap();
                    super::delete_all_wipes_storage(super::$backend(&dir));
                }
            }
        )+
    };
}

backend_contract!(embedded, relational);
