#[cfg(test)]
mod strategies_tests {
    use chrono::Utc;
    use nanite_core::models::SelectionPolicy;

    use crate::registry::WorkerRegistry;
    use crate::strategies::*;

    fn create_test_registry(workers: &[(&str, &[&str], f64)]) -> WorkerRegistry {
        let mut registry = WorkerRegistry::new();
        let now = Utc::now();
        for (identity, services, load) in workers {
            registry.register(
                identity,
                services.iter().map(|s| s.to_string()).collect(),
                *load,
                now,
            );
        }
        registry
    }

    fn ids(selected: &[&nanite_core::WorkerRecord]) -> Vec<String> {
        selected.iter().map(|r| r.identity.clone()).collect()
    }

    #[test]
    fn test_least_loaded_tie_break() {
        let registry = create_test_registry(&[
            ("a", &["/calc"], 5.0),
            ("b", &["/calc"], 2.0),
            ("c", &["/calc"], 2.0),
            ("d", &["/calc"], 9.0),
        ]);
        let mut selector = Selector::with_seed(1);

        let selected = selector.select(SelectionPolicy::LeastLoaded, "/calc", &registry);
        // 负载相同时取先遍历到的
        assert_eq!(ids(&selected), vec!["b"]);
    }

    #[test]
    fn test_all_strategy() {
        let registry = create_test_registry(&[
            ("a", &["/calc"], 1.0),
            ("b", &["/other"], 0.0),
            ("c", &["/calc", "/other"], 3.0),
        ]);
        let mut selector = Selector::with_seed(1);

        let selected = selector.select(SelectionPolicy::All, "/calc", &registry);
        assert_eq!(ids(&selected), vec!["a", "c"]);
    }

    #[test]
    fn test_random_strategy() {
        let registry = create_test_registry(&[
            ("a", &["/calc"], 1.0),
            ("b", &["/calc"], 1.0),
            ("c", &["/other"], 1.0),
        ]);
        let mut selector = Selector::with_seed(42);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            let selected = selector.select(SelectionPolicy::Random, "/calc", &registry);
            assert_eq!(selected.len(), 1);
            assert_ne!(selected[0].identity, "c");
            seen.insert(selected[0].identity.clone());
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_round_robin_cycles() {
        let registry = create_test_registry(&[
            ("a", &["/calc"], 0.0),
            ("b", &["/calc"], 0.0),
            ("c", &["/calc"], 0.0),
        ]);
        let mut selector = Selector::with_seed(1);

        let picks: Vec<String> = (0..4)
            .map(|_| {
                ids(&selector.select(SelectionPolicy::RoundRobin, "/calc", &registry)).remove(0)
            })
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_round_robin_clamps_after_shrink() {
        let mut registry = create_test_registry(&[
            ("a", &["/calc"], 0.0),
            ("b", &["/calc"], 0.0),
            ("c", &["/calc"], 0.0),
        ]);
        let mut selector = Selector::with_seed(1);

        for _ in 0..3 {
            selector.select(SelectionPolicy::RoundRobin, "/calc", &registry);
        }
        assert_eq!(selector.cursor("/calc"), Some(3));

        // 让 b 过期
        let now = Utc::now();
        registry.register("a", vec!["/calc".to_string()], 0.0, now + chrono::Duration::seconds(100));
        registry.register("c", vec!["/calc".to_string()], 0.0, now + chrono::Duration::seconds(100));
        let removed = registry.expire_stale(
            now + chrono::Duration::seconds(100),
            chrono::Duration::seconds(16),
        );
        assert_eq!(removed, vec!["b".to_string()]);

        let selected = selector.select(SelectionPolicy::RoundRobin, "/calc", &registry);
        assert_eq!(ids(&selected), vec!["a"]);
        assert_eq!(selector.cursor("/calc"), Some(1));
    }

    #[test]
    fn test_round_robin_cursor_per_service() {
        let registry = create_test_registry(&[
            ("a", &["/x", "/y"], 0.0),
            ("b", &["/x", "/y"], 0.0),
        ]);
        let mut selector = Selector::with_seed(1);

        selector.select(SelectionPolicy::RoundRobin, "/x", &registry);
        let y = selector.select(SelectionPolicy::RoundRobin, "/y", &registry);
        assert_eq!(ids(&y), vec!["a"]);

        selector.reset_cursor("/x");
        assert_eq!(selector.cursor("/x"), None);
        let x = selector.select(SelectionPolicy::RoundRobin, "/x", &registry);
        assert_eq!(ids(&x), vec!["a"]);
    }

    #[test]
    fn test_capability_filter_all_policies() {
        let registry = create_test_registry(&[
            ("a", &["/calc"], 0.0),
            ("b", &["/other"], 0.0),
        ]);
        let mut selector = Selector::with_seed(7);

        for policy in [
            SelectionPolicy::LeastLoaded,
            SelectionPolicy::All,
            SelectionPolicy::Random,
            SelectionPolicy::RoundRobin,
        ] {
            for _ in 0..5 {
                let selected = selector.select(policy, "/calc", &registry);
                assert!(selected.iter().all(|r| r.offers("/calc")));
                assert_eq!(ids(&selected), vec!["a"]);
            }
            assert!(selector.select(policy, "/missing", &registry).is_empty());
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = WorkerRegistry::new();
        let mut selector = Selector::new();

        assert!(selector
            .select(SelectionPolicy::RoundRobin, "/calc", &registry)
            .is_empty());
        // 空结果不会创建游标
        assert_eq!(selector.cursor("/calc"), None);
    }
}
