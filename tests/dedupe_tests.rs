mod common;

use common::{facade_on, fresh_store};
use shared_dedupe_rs::{
    Category, DedupeError, ExactFingerprintSet, ProgressCounters,
    SessionRecord, SessionStore,
};
use std::{thread, time::Duration};

fn cookies(pairs: &[(&str, &str)]) -> SessionRecord {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod facade_tests {
    use super::*;

    #[test]
    fn test_post_end_to_end() {
        let facade = facade_on(fresh_store(), "2024-06-01");
        let fields = ["http://x/1", "2024-01-01"];

        assert!(!facade.exists(Category::Post, "siteA", &fields).unwrap());
        facade.add(Category::Post, "siteA", &fields).unwrap();
        assert!(facade.exists(Category::Post, "siteA", &fields).unwrap());
        assert!(
            facade
                .post_exists("siteA", "http://x/1", "2024-01-01")
                .unwrap()
        );

        // Timestamp is part of the key, there is no daily reset for posts
        assert!(
            !facade
                .post_exists("siteA", "http://x/1", "2024-01-02")
                .unwrap()
        );
        assert!(
            !facade
                .post_exists("siteB", "http://x/1", "2024-01-01")
                .unwrap()
        );
    }

    #[test]
    fn test_goods_reset_daily() {
        let store = fresh_store();
        let monday = facade_on(store.clone(), "2024-01-01");
        let tuesday = facade_on(store, "2024-01-02");

        monday.goods_add("shop", "http://shop/item/1").unwrap();
        assert!(monday.goods_exists("shop", "http://shop/item/1").unwrap());
        assert!(!tuesday.goods_exists("shop", "http://shop/item/1").unwrap());
    }

    #[test]
    fn test_goods_and_posts_use_separate_filters() {
        let facade = facade_on(fresh_store(), "2024-01-01");
        facade.goods_add("siteA", "http://x/1").unwrap();
        // Same tuple as the goods entry, but looked up in the post filter
        assert!(
            !facade
                .post_exists("siteA", "http://x/1", "2024-01-01")
                .unwrap()
        );
    }

    #[test]
    fn test_user_reset_daily() {
        let store = fresh_store();
        let today = facade_on(store.clone(), "2024-03-10");
        let tomorrow = facade_on(store, "2024-03-11");

        assert!(!today.user_exists("forum", "user_123").unwrap());
        today.user_add("forum", "user_123").unwrap();
        assert!(today.user_exists("forum", "user_123").unwrap());
        assert!(!tomorrow.user_exists("forum", "user_123").unwrap());
    }

    #[test]
    fn test_image_and_attachment() {
        let facade = facade_on(fresh_store(), "2024-01-01");

        facade.image_add("siteA", "http://x/a.png", "a.png").unwrap();
        assert!(
            facade
                .image_exists("siteA", "http://x/a.png", "a.png")
                .unwrap()
        );
        assert!(
            !facade
                .image_exists("siteA", "http://x/a.png", "b.png")
                .unwrap()
        );

        facade
            .attachment_add("siteA", "report.pdf", "http://x/report.pdf")
            .unwrap();
        assert!(
            facade
                .attachment_exists("siteA", "report.pdf", "http://x/report.pdf")
                .unwrap()
        );
        assert!(
            !facade
                .exists(
                    Category::Image,
                    "siteA",
                    &["report.pdf", "http://x/report.pdf"],
                )
                .unwrap()
        );
    }

    #[test]
    fn test_category_tags_resolve() {
        let facade = facade_on(fresh_store(), "2024-01-01");
        let category: Category = "attach".parse().unwrap();
        facade.add(category, "siteA", &["a.zip", "http://x/a.zip"]).unwrap();
        assert!(
            facade
                .attachment_exists("siteA", "a.zip", "http://x/a.zip")
                .unwrap()
        );
        assert!(matches!(
            "".parse::<Category>(),
            Err(DedupeError::InvalidInput(_))
        ));
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;

    #[test]
    fn test_set_then_get_exact_record() {
        let sessions = SessionStore::new(fresh_store());
        let record = cookies(&[("a", "1"), ("b", "2")]);
        assert!(sessions.set("siteA", &record, 0));
        assert_eq!(sessions.get("siteA").unwrap(), record);
    }

    #[test]
    fn test_record_expires_after_ttl() {
        let sessions = SessionStore::new(fresh_store());
        let record = cookies(&[("a", "1"), ("b", "2")]);
        assert!(sessions.set("siteA", &record, 1));
        assert_eq!(sessions.get("siteA").unwrap(), record);

        thread::sleep(Duration::from_secs(2));
        assert!(sessions.get("siteA").unwrap().is_empty());
    }

    #[test]
    fn test_overwrite_replaces_whole_record() {
        let sessions = SessionStore::new(fresh_store());
        sessions.set("siteA", &cookies(&[("a", "1"), ("b", "2")]), 0);
        sessions.set("siteA", &cookies(&[("c", "3")]), 0);
        assert_eq!(sessions.get("siteA").unwrap(), cookies(&[("c", "3")]));
    }
}

#[cfg(test)]
mod fingerprint_set_tests {
    use super::*;

    #[test]
    fn test_remove_enables_recrawl() {
        let set = ExactFingerprintSet::new(fresh_store());
        set.insert("siteA", "deadbeef").unwrap();
        assert!(set.contains("siteA", "deadbeef").unwrap());

        assert!(set.remove("siteA", "deadbeef").unwrap());
        assert!(!set.contains("siteA", "deadbeef").unwrap());
        // Second removal is a no-op, not an error
        assert!(!set.remove("siteA", "deadbeef").unwrap());
    }
}

#[cfg(test)]
mod counter_tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_per_site() {
        let counters = ProgressCounters::new(fresh_store());
        counters.set_total("siteA", 500).unwrap();
        counters.set_crawled("siteA", 20).unwrap();
        counters.set_total("siteB", 7).unwrap();

        assert_eq!(counters.get_total("siteA").unwrap(), Some(500));
        assert_eq!(counters.get_crawled("siteA").unwrap(), Some(20));
        assert_eq!(counters.get_total("siteB").unwrap(), Some(7));
        assert_eq!(counters.get_crawled("siteB").unwrap(), None);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(ProgressCounters::new(fresh_store()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..250 {
                        counters.incr_crawled("siteA", 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.get_crawled("siteA").unwrap(), Some(1000));
    }
}
