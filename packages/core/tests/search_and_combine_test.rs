//! Condition Search and Result Algebra Integration Tests
//!
//! Plain condition search over the in-memory store, followed by the
//! result-reference and set-combination steps that feed later searches.

#[cfg(test)]
mod search_and_combine_tests {
    use anyhow::Result;
    use outline_query_core::conditions::ConditionInput;
    use outline_query_core::db::{BackendError, ContentBackend, MemoryStore};
    use outline_query_core::services::{
        combine, resolve_result_reference, CombineOptions, InMemoryResultStore, ResultRecord,
        SearchContext, SearchService, SetOperation,
    };
    use outline_query_core::{
        CombineMode, ConditionGroup, EntityKind, ResultSet, SearchCondition, SearchConfig,
        SearchError, SearchScope,
    };
    use std::sync::Arc;

    fn pets_store() -> Result<MemoryStore> {
        let mut store = MemoryStore::new();
        store.add_page("journal", "Journal")?;
        store.add_page("vet", "Vet")?;
        store.add_node("n1", "journal", None, "Walked the dog")?;
        store.add_node("n2", "journal", None, "The cat slept all day")?;
        store.add_node("n3", "journal", None, "Cat and bird at the window")?;
        store.add_node("n4", "vet", None, "Dog vaccination, see [[Vet]]")?;
        store.add_node("n5", "vet", Some("n4"), "Bring the (cat) carrier? \"maybe\"")?;
        Ok(store)
    }

    fn sorted(nodes: &[outline_query_core::Node]) -> Vec<&str> {
        let mut ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn test_or_and_group_inputs() -> Result<()> {
        let service = SearchService::new(Arc::new(pets_store()?), SearchConfig::default())?;
        let mut ctx = SearchContext::new();

        let either = ConditionInput::list(
            vec![SearchCondition::text("dog"), SearchCondition::text("bird")],
            CombineMode::Or,
        );
        let nodes = service
            .find_nodes(&either, &SearchScope::default(), &mut ctx)
            .await?;
        assert_eq!(sorted(&nodes), vec!["n1", "n3", "n4"]);

        // (cat | dog) AND NOT bird
        let grouped = ConditionInput::groups(
            vec![
                ConditionGroup::new(
                    vec![SearchCondition::text("cat"), SearchCondition::text("dog")],
                    CombineMode::Or,
                ),
                ConditionGroup::new(
                    vec![SearchCondition::text("bird").negated()],
                    CombineMode::And,
                ),
            ],
            CombineMode::And,
        );
        let nodes = service
            .find_nodes(&grouped, &SearchScope::default(), &mut ctx)
            .await?;
        assert_eq!(sorted(&nodes), vec!["n1", "n2", "n4", "n5"]);
        assert_eq!(ctx.stats().queries_executed, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_collapse_alternatives_reads_positive_terms_as_alternatives() -> Result<()> {
        let input = ConditionInput::list(
            vec![
                SearchCondition::text("cat"),
                SearchCondition::text("dog"),
                SearchCondition::text("bird").negated(),
            ],
            CombineMode::And,
        );

        // (cat | dog) AND NOT bird
        let collapsing = SearchService::new(Arc::new(pets_store()?), SearchConfig::default())?;
        let mut ctx = SearchContext::new();
        let nodes = collapsing
            .find_nodes(&input, &SearchScope::default(), &mut ctx)
            .await?;
        assert_eq!(sorted(&nodes), vec!["n1", "n2", "n4", "n5"]);

        let config = SearchConfig {
            collapse_alternatives: false,
            ..SearchConfig::default()
        };
        let strict = SearchService::new(Arc::new(pets_store()?), config)?;
        let nodes = strict
            .find_nodes(&input, &SearchScope::default(), &mut ctx)
            .await?;
        assert!(nodes.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_literal_text_is_escaped_and_case_flag_configurable() -> Result<()> {
        let service = SearchService::new(Arc::new(pets_store()?), SearchConfig::default())?;
        let mut ctx = SearchContext::new();

        let punctuation = ConditionInput::single(SearchCondition::text("(cat) carrier? \"maybe\""));
        let nodes = service
            .find_nodes(&punctuation, &SearchScope::default(), &mut ctx)
            .await?;
        assert_eq!(sorted(&nodes), vec!["n5"]);

        let config = SearchConfig {
            case_insensitive: false,
            ..SearchConfig::default()
        };
        let sensitive = SearchService::new(Arc::new(pets_store()?), config)?;
        let nodes = sensitive
            .find_nodes(
                &ConditionInput::single(SearchCondition::text("Cat")),
                &SearchScope::default(),
                &mut ctx,
            )
            .await?;
        assert_eq!(sorted(&nodes), vec!["n3"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_backend_errors_carry_query_text() -> Result<()> {
        let store = Arc::new(pets_store()?);
        let err = store.execute("[:find ?x :where [?x :block/uid]").await.unwrap_err();
        assert!(matches!(err, BackendError::Parse { .. }));

        let service = SearchService::new(store, SearchConfig::default())?;
        let mut ctx = SearchContext::new();
        match service.execute("[:find ?x :where [(mystery ?x)]]", &mut ctx).await {
            Err(SearchError::BackendExecution { query, .. }) => {
                assert!(query.contains("mystery"));
            }
            other => panic!("expected backend error, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_stored_results_scope_a_follow_up_search() -> Result<()> {
        let service = SearchService::new(Arc::new(pets_store()?), SearchConfig::default())?;
        let mut ctx = SearchContext::new();

        let pages = service
            .find_pages(
                &ConditionInput::single(SearchCondition::page_ref("Vet")),
                &SearchScope::default(),
                &mut ctx,
            )
            .await?;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].matched_node_ids, vec!["n4"]);

        let mut store = InMemoryResultStore::new();
        store.insert(
            "find_pages_1",
            pages
                .iter()
                .map(|p| ResultRecord::page(p.id.clone(), p.title.clone()))
                .collect(),
        );

        let records = resolve_result_reference(&store, "find_pages_1")?;
        let scope = SearchScope::from_records(&records);
        let nodes = service
            .find_nodes(
                &ConditionInput::single(SearchCondition::text("cat")),
                &scope,
                &mut ctx,
            )
            .await?;
        assert_eq!(sorted(&nodes), vec!["n5"]);

        let missing = resolve_result_reference(&store, "find_pages_2").unwrap_err();
        assert!(missing.to_string().contains("Did you mean 'find_pages_1'?"));
        Ok(())
    }

    #[tokio::test]
    async fn test_combining_search_results() -> Result<()> {
        let service = SearchService::new(Arc::new(pets_store()?), SearchConfig::default())?;
        let mut ctx = SearchContext::new();
        let mut sets = Vec::new();
        for (name, term) in [("cats", "cat"), ("dogs", "dog"), ("vet", "vaccination")] {
            let nodes = service
                .find_nodes(
                    &ConditionInput::single(SearchCondition::text(term)),
                    &SearchScope::default(),
                    &mut ctx,
                )
                .await?;
            sets.push(ResultSet::new(
                name,
                nodes.iter().map(|n| n.id.clone()),
                EntityKind::Node,
            ));
        }

        let union = combine(&sets, SetOperation::Union, &CombineOptions::default())?;
        assert_eq!(union.stats.unique_input, 5);
        assert_eq!(union.stats.duplicates_removed, 1);

        let dogs_at_vet = combine(&sets[1..], SetOperation::Intersection, &CombineOptions::default())?;
        assert_eq!(dogs_at_vet.ids, vec!["n4"]);

        let only_cats = combine(
            &[sets[0].clone(), sets[2].clone()],
            SetOperation::Difference,
            &CombineOptions::default(),
        )?;
        let mut ids = only_cats.ids.clone();
        ids.sort();
        assert_eq!(ids, vec!["n2", "n3", "n5"]);

        let scope = SearchScope::from_result_sets([&dogs_at_vet.into_result_set("combined_1")]);
        assert_eq!(scope.node_ids, vec!["n4"]);
        Ok(())
    }
}
