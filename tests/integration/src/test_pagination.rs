//! Query and scan paging through a recording transport.

#[cfg(test)]
mod tests {
    use facetdb_core::{AttributeValue, ErrorCode, FacetConfig, Item, Key, Order, item};
    use facetdb_model::output::{QueryOutput, ScanOutput};

    use crate::{Call, RecordingTransport, task_entity};

    fn stored(task_id: &str) -> Item {
        item! {
            "pk" => format!("$taskapp#taskid_{task_id}"),
            "sk" => "$task_1#project_apollo",
            "gsi1pk" => "$taskapp#owner_ada",
            "gsi1sk" => format!("$task_1#project_apollo#taskid_{task_id}"),
            "taskId" => task_id,
            "project" => "Apollo",
            "owner" => "ada",
        }
    }

    fn resume_after(task_id: &str) -> Key {
        item! {
            "pk" => format!("$taskapp#taskid_{task_id}"),
            "sk" => "$task_1#project_apollo",
            "gsi1pk" => "$taskapp#owner_ada",
            "gsi1sk" => format!("$task_1#project_apollo#taskid_{task_id}"),
        }
    }

    fn page(ids: &[&str], last: Option<&str>) -> QueryOutput {
        QueryOutput {
            items: ids.iter().copied().map(stored).collect(),
            count: i32::try_from(ids.len()).unwrap_or(i32::MAX),
            scanned_count: i32::try_from(ids.len()).unwrap_or(i32::MAX),
            last_evaluated_key: last.map(resume_after).unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_should_return_cursor_and_resume_from_it() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0);
        transport.push_query(page(&["t1", "t2"], Some("t2")));
        transport.push_query(page(&["t3"], None));

        let first = tasks
            .query("byOwner", item! { "owner" => "ada" })
            .limit(2)
            .go()
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(!first.items[0].contains_key("gsi1pk"));
        let cursor = first.cursor.unwrap();

        let second = tasks
            .query("byOwner", item! { "owner" => "ada" })
            .limit(2)
            .cursor(cursor)
            .go()
            .await
            .unwrap();
        assert_eq!(second.items[0]["taskId"], AttributeValue::from("t3"));
        assert_eq!(second.cursor, None);

        let calls = transport.calls();
        let Call::Query(resumed) = &calls[1] else {
            panic!("expected a query, got {calls:?}");
        };
        assert_eq!(resumed.exclusive_start_key, resume_after("t2"));
        assert_eq!(resumed.index_name.as_deref(), Some("gsi1pk-gsi1sk-index"));
        assert_eq!(resumed.limit, Some(2));
    }

    #[tokio::test]
    async fn test_should_follow_pages_up_to_configured_bound() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0).with_config(FacetConfig {
            max_pages: 2,
            ..FacetConfig::default()
        });
        transport.push_query(page(&["t1"], Some("t1")));
        transport.push_query(page(&["t2"], Some("t2")));
        transport.push_query(page(&["t3"], None));

        let items = tasks
            .query("byOwner", item! { "owner" => "ada" })
            .begins(item! { "project" => "Apollo" })
            .order(Order::Desc)
            .pages()
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(transport.calls().len(), 2);

        let calls = transport.calls();
        let Call::Query(first) = &calls[0] else {
            panic!("expected a query, got {calls:?}");
        };
        assert_eq!(first.scan_index_forward, Some(false));
        assert_eq!(
            first.key_condition_expression.as_deref(),
            Some("#attr0 = :val0 AND begins_with(#attr1, :val1)")
        );
        assert_eq!(
            first.expression_attribute_values[":val1"],
            AttributeValue::from("$task_1#project_apollo")
        );
    }

    #[tokio::test]
    async fn test_should_follow_every_scan_page_when_unbounded() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0);
        for (ids, last) in [(&["t1"][..], Some("t1")), (&["t2"][..], Some("t2")), (&["t3"][..], None)] {
            let output = page(ids, last);
            transport.push_scan(ScanOutput {
                items: output.items,
                count: output.count,
                scanned_count: output.scanned_count,
                last_evaluated_key: output.last_evaluated_key,
            });
        }

        let items = tasks
            .scan()
            .filter(|c| c.attr("owner").eq("ada"))
            .pages()
            .await
            .unwrap();
        assert_eq!(items.len(), 3);

        let calls = transport.calls();
        let Call::Scan(first) = &calls[0] else {
            panic!("expected a scan, got {calls:?}");
        };
        assert!(
            first
                .filter_expression
                .as_deref()
                .unwrap()
                .starts_with("(begins_with(#attr0, :val0) AND begins_with(#attr1, :val1)) AND (")
        );
    }

    #[tokio::test]
    async fn test_should_let_call_page_bound_override_config() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0).with_config(FacetConfig {
            max_pages: 1,
            ..FacetConfig::default()
        });
        transport.push_query(page(&["t1"], Some("t1")));
        transport.push_query(page(&["t2"], Some("t2")));
        transport.push_query(page(&["t3"], None));

        let items = tasks
            .query("byOwner", item! { "owner" => "ada" })
            .max_pages(0)
            .pages()
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(transport.calls().len(), 3);

        transport.push_scan(ScanOutput {
            items: vec![stored("t4")],
            last_evaluated_key: resume_after("t4"),
            ..ScanOutput::default()
        });
        transport.push_scan(ScanOutput {
            items: vec![stored("t5")],
            ..ScanOutput::default()
        });
        let scanned = tasks.scan().max_pages(1).pages().await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(transport.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_should_return_raw_items_on_request() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0);
        transport.push_query(page(&["t1"], None));
        transport.push_query(page(&["t2"], None));

        let raw = tasks
            .query("byOwner", item! { "owner" => "ada" })
            .raw()
            .go()
            .await
            .unwrap();
        assert_eq!(raw.items, vec![stored("t1")]);

        let shaped = tasks
            .query("byOwner", item! { "owner" => "ada" })
            .go()
            .await
            .unwrap();
        assert!(!shaped.items[0].contains_key("gsi1sk"));
    }

    #[tokio::test]
    async fn test_should_start_over_when_cursor_is_ignored() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0);
        transport.push_query(page(&["t1"], None));

        tasks
            .query("byOwner", item! { "owner" => "ada" })
            .cursor("not base64!")
            .ignore_cursor()
            .go()
            .await
            .unwrap();
        let calls = transport.calls();
        let [Call::Query(input)] = calls.as_slice() else {
            panic!("expected one query, got {calls:?}");
        };
        assert!(input.exclusive_start_key.is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_malformed_cursors() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0);
        let err = tasks
            .query("byOwner", item! { "owner" => "ada" })
            .cursor("not base64!")
            .go()
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CursorDecodingError);
        assert!(transport.calls().is_empty());
    }
}
