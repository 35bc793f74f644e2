//! Single-item entity flows through a recording transport.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use facetdb_core::{AttributeValue, Entity, ErrorCode, FixedClock, Item, TransportError, item};
    use facetdb_model::output::{GetItemOutput, UpdateItemOutput};
    use facetdb_model::types::ReturnValue;

    use crate::{Call, RecordingTransport, task_entity, task_schema};

    fn task() -> Item {
        item! {
            "taskId" => "t1",
            "project" => "Apollo",
            "owner" => "ada",
            "title" => "Write docs",
            "status" => "open",
            "points" => 3_i64,
        }
    }

    fn stored_task() -> Item {
        let mut stored = task();
        stored.extend(item! {
            "pk" => "$taskapp#taskid_t1",
            "sk" => "$task_1#project_apollo",
            "gsi1pk" => "$taskapp#owner_ada",
            "gsi1sk" => "$task_1#project_apollo#taskid_t1",
            "createdAt" => 1_700_000_000_i64,
            "updatedAt" => 1_700_000_000_i64,
        });
        stored
    }

    #[tokio::test]
    async fn test_should_create_item_with_keys_and_timestamps() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 1_700_000_000);

        let written = tasks.create(task()).go().await.unwrap();
        assert!(!written.contains_key("pk"));
        assert_eq!(written["createdAt"], AttributeValue::from(1_700_000_000_i64));

        let calls = transport.calls();
        let [Call::Put(put)] = calls.as_slice() else {
            panic!("expected one put, got {calls:?}");
        };
        assert_eq!(put.table_name, "tasks");
        assert_eq!(put.item, stored_task());
        assert_eq!(
            put.condition_expression.as_deref(),
            Some("(attribute_not_exists(#attr0)) AND (attribute_not_exists(#attr1))")
        );
        assert_eq!(put.expression_attribute_names["#attr0"], "pk");
        assert_eq!(put.expression_attribute_names["#attr1"], "sk");
    }

    #[tokio::test]
    async fn test_should_shape_items_read_back() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0);
        transport.push_get(GetItemOutput {
            item: Some(stored_task()),
        });

        let found = tasks
            .get(item! { "taskId" => "t1", "project" => "Apollo" })
            .consistent()
            .go()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["title"], AttributeValue::from("Write docs"));
        assert!(!found.contains_key("gsi1sk"));
        assert_eq!(found.len(), 8);

        let missing = tasks
            .get(item! { "taskId" => "t2", "project" => "Apollo" })
            .go()
            .await
            .unwrap();
        assert_eq!(missing, None);

        let calls = transport.calls();
        let Call::Get(first) = &calls[0] else {
            panic!("expected a get, got {calls:?}");
        };
        assert_eq!(first.consistent_read, Some(true));
        assert_eq!(first.key["sk"], AttributeValue::from("$task_1#project_apollo"));
    }

    #[tokio::test]
    async fn test_should_patch_and_shape_new_values() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 1_700_000_500);
        let mut updated = stored_task();
        updated.insert("status".to_owned(), AttributeValue::from("closed"));
        transport.push_update(UpdateItemOutput { attributes: updated });

        let result = tasks
            .patch(item! { "taskId" => "t1", "project" => "Apollo" })
            .set("status", "closed")
            .add("points", 2_i64)
            .condition(|c| c.attr("status").ne("closed"))
            .go()
            .await
            .unwrap();
        assert_eq!(result["status"], AttributeValue::from("closed"));
        assert!(!result.contains_key("pk"));

        let calls = transport.calls();
        let [Call::Update(update)] = calls.as_slice() else {
            panic!("expected one update, got {calls:?}");
        };
        assert_eq!(
            update.update_expression.as_deref(),
            Some("SET #attr0 = :val0, #attr2 = :val2 ADD #attr1 :val1")
        );
        assert_eq!(update.expression_attribute_names["#attr2"], "updatedAt");
        assert_eq!(
            update.expression_attribute_values[":val2"],
            AttributeValue::from(1_700_000_500_i64)
        );
        let condition = update.condition_expression.as_deref().unwrap();
        assert!(condition.starts_with("(attribute_exists(#attr3)) AND (attribute_exists(#attr4)) AND ("));
        assert_eq!(update.return_values, Some(ReturnValue::AllNew));
    }

    #[tokio::test]
    async fn test_should_reject_invalid_writes_before_transport() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0);

        let mut bad_status = task();
        bad_status.insert("status".to_owned(), AttributeValue::from("blocked"));
        let err = tasks.put(bad_status).go().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidEnumValue);

        let mut no_owner = task();
        no_owner.remove("owner");
        let err = tasks.create(no_owner).go().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingAttribute);

        let err = tasks
            .update(item! { "taskId" => "t1", "project" => "Apollo" })
            .set("taskId", "t9")
            .go()
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ReadOnlyViolation);

        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_should_surface_conditional_failures_as_transport_errors() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 0);
        transport.fail_next(TransportError::service(
            "ConditionalCheckFailedException",
            "The conditional request failed",
        ));

        let err = tasks
            .remove(item! { "taskId" => "t1", "project" => "Apollo" })
            .go()
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TransportError);
        let source = std::error::Error::source(&err)
            .and_then(|s| s.downcast_ref::<TransportError>())
            .unwrap();
        assert!(source.is_conditional_check_failed());
    }

    #[tokio::test]
    async fn test_should_upsert_without_overwriting_creation_time() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 42);
        transport.push_update(UpdateItemOutput {
            attributes: stored_task(),
        });

        tasks.upsert(task()).go().await.unwrap();

        let calls = transport.calls();
        let [Call::Update(update)] = calls.as_slice() else {
            panic!("expected one update, got {calls:?}");
        };
        let text = update.update_expression.as_deref().unwrap();
        let created = update
            .expression_attribute_names
            .iter()
            .find(|(_, name)| *name == "createdAt")
            .map(|(placeholder, _)| placeholder.clone())
            .unwrap();
        assert!(text.contains(&format!("{created} = if_not_exists({created}, ")));
        assert_eq!(update.key.len(), 2);
    }

    fn expiring_tasks(transport: &Arc<RecordingTransport>, seconds: i64) -> Entity {
        Entity::new(task_schema().ttl("expiresAt"))
            .unwrap()
            .with_transport(transport.clone())
            .with_clock(Arc::new(FixedClock::at_unix(seconds)))
    }

    #[tokio::test]
    async fn test_should_write_and_clear_expiry() {
        let transport = RecordingTransport::new();
        let tasks = expiring_tasks(&transport, 1_000);

        let written = tasks.put(task()).ttl(Duration::hours(1)).go().await.unwrap();
        assert_eq!(written["expiresAt"], AttributeValue::from(4_600_i64));
        assert!(!tasks.is_expired(&written));
        assert_eq!(tasks.time_to_live(&written), Some(Duration::hours(1)));

        tasks
            .update(item! { "taskId" => "t1", "project" => "Apollo" })
            .ttl_at(2_000)
            .go()
            .await
            .unwrap();
        tasks
            .patch(item! { "taskId" => "t1", "project" => "Apollo" })
            .set("title", "Archived")
            .remove_ttl()
            .go()
            .await
            .unwrap();

        let calls = transport.calls();
        let [Call::Put(put), Call::Update(extend), Call::Update(clear)] = calls.as_slice() else {
            panic!("expected a put and two updates, got {calls:?}");
        };
        assert_eq!(put.item["expiresAt"], AttributeValue::from(4_600_i64));
        assert_eq!(extend.expression_attribute_names["#attr0"], "expiresAt");
        assert_eq!(extend.expression_attribute_values[":val0"], AttributeValue::from(2_000_i64));
        let text = clear.update_expression.as_deref().unwrap();
        assert!(text.ends_with("REMOVE #attr1"));
        assert_eq!(clear.expression_attribute_names["#attr1"], "expiresAt");

        let later = expiring_tasks(&transport, 5_000);
        assert!(later.is_expired(&written));
        assert!(!later.is_expired(&task()));
    }

    #[tokio::test]
    async fn test_should_ignore_expiry_without_ttl_attribute() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 1_000);
        tasks.put(task()).ttl(Duration::hours(1)).go().await.unwrap();
        let calls = transport.calls();
        let [Call::Put(put)] = calls.as_slice() else {
            panic!("expected one put, got {calls:?}");
        };
        assert!(!put.item.contains_key("expiresAt"));
    }

    #[tokio::test]
    async fn test_should_return_raw_write_results() {
        let transport = RecordingTransport::new();
        let tasks = task_entity(&transport, 1_700_000_000);
        transport.push_update(UpdateItemOutput {
            attributes: stored_task(),
        });
        let raw = tasks
            .update(item! { "taskId" => "t1", "project" => "Apollo" })
            .set("title", "Renamed")
            .raw()
            .go()
            .await
            .unwrap();
        assert_eq!(raw, stored_task());

        let put = tasks.create(task()).raw().go().await.unwrap();
        assert_eq!(put, stored_task());
    }
}
