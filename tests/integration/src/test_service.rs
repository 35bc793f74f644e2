//! Service level flows: collections, cross-entity batches and transactions.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use facetdb_core::{
        AttributeDefinition, AttributeValue, Entity, ErrorCode, FacetDefinition, IndexDefinition,
        Item, Schema, Service, item,
    };
    use facetdb_model::output::{
        BatchGetItemOutput, ItemResponse, QueryOutput, TransactGetItemsOutput,
    };
    use facetdb_model::types::KeysAndAttributes;

    use crate::{Call, RecordingTransport, init_tracing, task_entity, user_schema};

    fn service(transport: &Arc<RecordingTransport>) -> Service {
        init_tracing();
        let mut service = Service::new("TaskApp").with_transport(transport.clone());
        service.join(task_entity(transport, 100)).unwrap();
        service.join(Entity::new(user_schema()).unwrap()).unwrap();
        service
    }

    fn stored_task() -> Item {
        item! {
            "pk" => "$taskapp#taskid_t1",
            "sk" => "$task_1#project_apollo",
            "taskId" => "t1",
            "project" => "Apollo",
            "owner" => "ada",
        }
    }

    fn stored_user() -> Item {
        item! {
            "pk" => "$taskapp#owner_ada",
            "sk" => "$user_1",
            "owner" => "ada",
            "name" => "Ada",
        }
    }

    #[tokio::test]
    async fn test_should_query_collection_members_separately() {
        let transport = RecordingTransport::new();
        let service = service(&transport);
        transport.push_query(QueryOutput {
            items: vec![stored_task()],
            ..QueryOutput::default()
        });
        transport.push_query(QueryOutput {
            items: vec![stored_user()],
            ..QueryOutput::default()
        });

        let results = service
            .query("workspace", item! { "owner" => "ada" })
            .unwrap()
            .go()
            .await
            .unwrap();
        assert_eq!(results["Task"][0]["taskId"], AttributeValue::from("t1"));
        assert_eq!(results["User"][0]["name"], AttributeValue::from("Ada"));

        let calls = transport.calls();
        let prefixes: Vec<AttributeValue> = calls
            .iter()
            .filter_map(|call| match call {
                Call::Query(q) => Some(q.expression_attribute_values[":val1"].clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            prefixes,
            vec![
                AttributeValue::from("$task_1#project_"),
                AttributeValue::from("$user_1"),
            ]
        );
    }

    #[tokio::test]
    async fn test_should_attribute_batch_results_to_owning_entities() {
        let transport = RecordingTransport::new();
        let service = service(&transport);
        transport.push_batch_get(BatchGetItemOutput {
            responses: HashMap::from([("tasks".to_owned(), vec![stored_user(), stored_task()])]),
            unprocessed_keys: HashMap::from([(
                "tasks".to_owned(),
                KeysAndAttributes {
                    keys: vec![item! { "pk" => "$taskapp#taskid_t2", "sk" => "$task_1#project_apollo" }],
                    ..KeysAndAttributes::default()
                },
            )]),
        });

        let tasks = service.entity("Task").unwrap();
        let users = service.entity("User").unwrap();
        let result = service
            .batch_get(&[
                tasks.batch_get(vec![
                    item! { "taskId" => "t1", "project" => "Apollo" },
                    item! { "taskId" => "t2", "project" => "Apollo" },
                ]),
                users.batch_get(vec![item! { "owner" => "ada" }]),
            ])
            .await
            .unwrap();
        assert_eq!(result.items["Task"].len(), 1);
        assert_eq!(result.items["User"][0]["name"], AttributeValue::from("Ada"));
        assert!(!result.items["User"][0].contains_key("pk"));
        assert_eq!(result.unprocessed.len(), 1);

        let calls = transport.calls();
        let [Call::BatchGet(input)] = calls.as_slice() else {
            panic!("expected one batch get, got {calls:?}");
        };
        assert_eq!(input.request_items["tasks"].keys.len(), 3);
    }

    fn keyed_by_id(entity: &str) -> Entity {
        Entity::new(
            Schema::new("Catalog", entity, "catalog")
                .attribute("id", AttributeDefinition::string().required())
                .attribute("label", AttributeDefinition::string())
                .index(
                    "byId",
                    IndexDefinition::primary(FacetDefinition::new("pk", ["id"]), None),
                ),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_should_attribute_batch_results_by_requested_key_without_sort_keys() {
        init_tracing();
        let transport = RecordingTransport::new();
        let mut service = Service::new("Catalog").with_transport(transport.clone());
        service.join(keyed_by_id("Alpha")).unwrap();
        service.join(keyed_by_id("Beta")).unwrap();
        transport.push_batch_get(BatchGetItemOutput {
            responses: HashMap::from([(
                "catalog".to_owned(),
                vec![
                    item! { "pk" => "$catalog#id_b1", "id" => "b1", "label" => "beta" },
                    item! { "pk" => "$catalog#id_a1", "id" => "a1", "label" => "alpha" },
                    item! { "pk" => "$catalog#id_zz", "id" => "zz" },
                ],
            )]),
            ..BatchGetItemOutput::default()
        });

        let alpha = service.entity("Alpha").unwrap();
        let beta = service.entity("Beta").unwrap();
        let result = service
            .batch_get(&[
                alpha.batch_get(vec![item! { "id" => "a1" }]),
                beta.batch_get(vec![item! { "id" => "b1" }]),
            ])
            .await
            .unwrap();
        assert_eq!(result.items["Alpha"].len(), 1);
        assert_eq!(result.items["Alpha"][0]["label"], AttributeValue::from("alpha"));
        assert_eq!(result.items["Beta"].len(), 1);
        assert_eq!(result.items["Beta"][0]["label"], AttributeValue::from("beta"));
    }

    #[tokio::test]
    async fn test_should_write_across_entities_in_one_batch() {
        let transport = RecordingTransport::new();
        let service = service(&transport);
        let tasks = service.entity("Task").unwrap();
        let users = service.entity("User").unwrap();

        let unprocessed = service
            .batch_write(&[
                tasks.batch_write().put(vec![item! {
                    "taskId" => "t1",
                    "project" => "Apollo",
                    "owner" => "ada",
                }]),
                users.batch_write().delete(vec![item! { "owner" => "bob" }]),
            ])
            .await
            .unwrap();
        assert!(unprocessed.is_empty());

        let calls = transport.calls();
        let [Call::BatchWrite(input)] = calls.as_slice() else {
            panic!("expected one batch write, got {calls:?}");
        };
        let requests = &input.request_items["tasks"];
        assert_eq!(requests.len(), 2);
        let put = requests[0].put_request.as_ref().unwrap();
        assert_eq!(put.item["createdAt"], AttributeValue::from(100_i64));
        assert_eq!(
            requests[1].delete_request.as_ref().unwrap().key["pk"],
            AttributeValue::from("$taskapp#owner_bob")
        );
    }

    #[tokio::test]
    async fn test_should_execute_write_transaction_atomically() {
        let transport = RecordingTransport::new();
        let service = service(&transport);
        let tasks = service.entity("Task").unwrap();
        let users = service.entity("User").unwrap();

        let items = vec![
            tasks
                .create(item! { "taskId" => "t9", "project" => "Apollo", "owner" => "ada" })
                .commit()
                .unwrap(),
            tasks
                .patch(item! { "taskId" => "t1", "project" => "Apollo" })
                .set("status", "closed")
                .commit()
                .unwrap(),
            users
                .check(item! { "owner" => "ada" }, |c| c.exists("name"))
                .commit()
                .unwrap(),
        ];
        service.transact_write(items).token("req-1").go().await.unwrap();

        let calls = transport.calls();
        let [Call::TransactWrite(input)] = calls.as_slice() else {
            panic!("expected one transaction, got {calls:?}");
        };
        assert_eq!(input.transact_items.len(), 3);
        assert!(input.transact_items[0].put.is_some());
        assert!(input.transact_items[1].update.is_some());
        let check = input.transact_items[2].condition_check.as_ref().unwrap();
        assert_eq!(check.condition_expression, "attribute_exists(#attr0)");
        assert_eq!(input.client_request_token.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn test_should_shape_transaction_reads_per_entity() {
        let transport = RecordingTransport::new();
        let service = service(&transport);
        let tasks = service.entity("Task").unwrap();
        let users = service.entity("User").unwrap();
        transport.push_transact_get(TransactGetItemsOutput {
            responses: vec![
                ItemResponse {
                    item: Some(stored_task()),
                },
                ItemResponse { item: None },
            ],
        });

        let items = vec![
            tasks
                .get(item! { "taskId" => "t1", "project" => "Apollo" })
                .commit()
                .unwrap(),
            users.get(item! { "owner" => "zed" }).commit().unwrap(),
        ];
        let results = service.transact_get(items).go().await.unwrap();
        assert_eq!(results.len(), 2);
        let task = results[0].as_ref().unwrap();
        assert!(!task.contains_key("sk"));
        assert_eq!(results[1], None);
    }

    #[tokio::test]
    async fn test_should_reject_reads_inside_write_transactions() {
        let transport = RecordingTransport::new();
        let service = service(&transport);
        let tasks = service.entity("Task").unwrap();
        let get = tasks
            .get(item! { "taskId" => "t1", "project" => "Apollo" })
            .commit()
            .unwrap();
        let err = service.transact_write(vec![get]).go().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOperation);
        assert!(transport.calls().is_empty());
    }
}
