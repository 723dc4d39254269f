//! Integration tests for RegionBackend
//!
//! Runs every operation against a MemoryRegion:
//! - Select with filters, ordering and pagination
//! - Keyed inserts and identity checks
//! - Deletes by key, by query and of the whole region
//! - Unsupported operators and operations

mod common;

use common::{backend, ids, people, person, populated, Note, Person};
use criteria_core::{
    collect_entities, write_result, Backend, BackendError, ComparableMatcher, Criteria,
    LoggingConfig, ObjectMatcher, Operation, Operator, OptionalMatcher, Path, Query,
    StringMatcher, Value, WriteResult,
};
use criteria_region::{compile_select, MemoryRegion, Region, RegionBackend, RegionConfig};
use std::sync::Arc;

async fn select(backend: &RegionBackend<Person>, query: Query) -> Vec<Person> {
    collect_entities(backend.execute(Operation::select(query)))
        .await
        .unwrap()
}

// =========================================================================
// Select
// =========================================================================

#[tokio::test]
async fn test_select_adults() {
    let (_region, backend) = backend();
    let result = write_result(backend.execute(Operation::insert(people()))).await;
    assert_eq!(result.unwrap(), WriteResult::Unknown);

    let query = person().age.is_at_least(18).unwrap().to_query();
    let compiled = compile_select("/people", &query, true).unwrap();
    assert_eq!(compiled.oql(), "SELECT * FROM /people WHERE age >= $1");
    assert_eq!(compiled.variables(), &[Value::Int32(18)]);

    let adults = select(&backend, query).await;
    assert_eq!(ids(&adults), vec!["a", "c"]);
    assert_eq!(adults[0], people()[0]);
}

#[tokio::test]
async fn test_select_everything() {
    let (_region, backend) = populated();
    let all = select(&backend, Query::new()).await;
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_select_is_lazy() {
    let (region, backend) = populated();
    let stream = backend.execute(Operation::select(Query::new()));
    assert_eq!(region.queries_executed(), 0);

    collect_entities(stream).await.unwrap();
    assert_eq!(region.queries_executed(), 1);
}

#[tokio::test]
async fn test_select_with_ordering_and_pagination() {
    let (_region, backend) = populated();

    let oldest_first = select(&backend, Query::new().desc(Path::of("age"))).await;
    assert_eq!(ids(&oldest_first), vec!["c", "a", "b"]);

    let page = select(
        &backend,
        Query::new().asc(Path::of("age")).offset(1).limit(1),
    )
    .await;
    assert_eq!(ids(&page), vec!["a"]);
}

#[tokio::test]
async fn test_select_text_operators() {
    let (_region, backend) = populated();

    let found = select(&backend, person().name.starts_with("A").unwrap().to_query()).await;
    assert_eq!(ids(&found), vec!["a"]);

    let found = select(&backend, person().name.contains("i").unwrap().to_query()).await;
    assert_eq!(ids(&found), vec!["c"]);

    let found = select(&backend, person().name.ends_with("b").unwrap().to_query()).await;
    assert_eq!(ids(&found), vec!["b"]);
}

#[tokio::test]
async fn test_select_disjunction_and_negation() {
    let (_region, backend) = populated();

    let query = person()
        .age
        .is_less_than(18)
        .unwrap()
        .or()
        .name
        .is_equal_to("Cid")
        .unwrap()
        .to_query();
    assert_eq!(ids(&select(&backend, query).await), vec!["b", "c"]);

    // NOT scopes both predicates built inside it
    let query = person()
        .not(|p| p.age.is_at_least(18)?.name.starts_with("A"))
        .unwrap()
        .to_query();
    let compiled = compile_select("/people", &query, true).unwrap();
    assert_eq!(
        compiled.oql(),
        "SELECT * FROM /people WHERE NOT ((age >= $1 AND name LIKE $2))"
    );
    assert_eq!(ids(&select(&backend, query).await), vec!["b", "c"]);
}

#[tokio::test]
async fn test_select_membership() {
    let (_region, backend) = populated();

    let found = select(&backend, person().id.is_in(["a", "c"]).unwrap().to_query()).await;
    assert_eq!(ids(&found), vec!["a", "c"]);

    let found = select(&backend, person().id.is_not_in(["a", "c"]).unwrap().to_query()).await;
    assert_eq!(ids(&found), vec!["b"]);
}

#[tokio::test]
async fn test_select_optional_attribute() {
    let (_region, backend) = populated();

    let found = select(&backend, person().nickname.is_present().unwrap().to_query()).await;
    assert_eq!(ids(&found), vec!["a"]);

    let found = select(&backend, person().nickname.is_absent().unwrap().to_query()).await;
    assert_eq!(ids(&found), vec!["b", "c"]);

    let found = select(
        &backend,
        person().nickname.is_equal_to("Annie".to_string()).unwrap().to_query(),
    )
    .await;
    assert_eq!(ids(&found), vec!["a"]);
}

#[tokio::test]
async fn test_literal_mode_matches_bind_mode() {
    let region = MemoryRegion::new("people");
    let config = RegionConfig {
        bind_variables: false,
        ..RegionConfig::default()
    };
    let backend: RegionBackend<Person> =
        RegionBackend::with_config(Arc::new(region.clone()), config);
    write_result(backend.execute(Operation::insert(people())))
        .await
        .unwrap();

    let query = person()
        .age
        .is_between(18, 40)
        .unwrap()
        .name
        .starts_with("A")
        .unwrap()
        .to_query();
    assert_eq!(ids(&select(&backend, query).await), vec!["a"]);
}

#[tokio::test]
async fn test_matches_is_unsupported() {
    let (region, backend) = populated();
    let query = person().name.matches("^A.*").unwrap().to_query();

    let err = collect_entities(backend.execute(Operation::select(query)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BackendError::UnsupportedOperator {
            operator: Operator::Matches,
            backend: "RegionBackend"
        }
    ));
    assert_eq!(region.queries_executed(), 0);
}

#[tokio::test]
async fn test_slow_queries_are_recorded() {
    let region = MemoryRegion::new("people");
    let config = RegionConfig {
        logging: LoggingConfig {
            slow_query_logging: true,
            slow_query_threshold_ms: 0,
            ..LoggingConfig::default()
        },
        ..RegionConfig::default()
    };
    let backend: RegionBackend<Person> = RegionBackend::with_config(Arc::new(region), config);

    select(&backend, person().age.is_greater_than(1).unwrap().to_query()).await;

    let recorded = backend.slow_queries().get_slow_queries(10);
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].query, "SELECT * FROM /people WHERE age > $1");
    assert_eq!(recorded[0].region.as_deref(), Some("/people"));
    assert_eq!(recorded[0].variables, 1);
}

// =========================================================================
// Insert
// =========================================================================

#[tokio::test]
async fn test_insert_replaces_by_key() {
    let (region, backend) = populated();
    let older = Person::new("b", "Bob", 18);

    write_result(backend.execute(Operation::insert(vec![older.clone()])))
        .await
        .unwrap();

    assert_eq!(region.len(), 3);
    let stored = region.get(&Value::from("b")).unwrap();
    assert_eq!(criteria_core::entity::from_value::<Person>(stored).unwrap(), older);
}

#[tokio::test]
async fn test_insert_without_identity_fails() {
    let region = MemoryRegion::new("notes");
    let backend: RegionBackend<Note> = RegionBackend::new(Arc::new(region.clone()));

    let insert = Operation::insert(vec![Note {
        text: "hello".to_string(),
    }]);
    let err = write_result(backend.execute(insert)).await.unwrap_err();
    assert!(matches!(
        err,
        BackendError::MissingIdentity {
            entity: "Note",
            backend: "RegionBackend"
        }
    ));
    assert!(region.is_empty());
}

#[tokio::test]
async fn test_insert_is_lazy() {
    let (region, backend) = backend();
    let stream = backend.execute(Operation::insert(people()));
    assert!(region.is_empty());

    write_result(stream).await.unwrap();
    assert_eq!(region.len(), 3);
}

// =========================================================================
// Delete
// =========================================================================

#[tokio::test]
async fn test_delete_without_filter_clears_region() {
    let (region, backend) = populated();

    let result = write_result(backend.execute(Operation::delete(Query::new()))).await;
    assert_eq!(result.unwrap(), WriteResult::Unknown);
    assert!(region.is_empty());
    assert_eq!(region.queries_executed(), 0);
}

#[tokio::test]
async fn test_delete_by_key_skips_query() {
    let (region, backend) = populated();

    let query = person().id.is_in(["a", "b", "missing"]).unwrap().to_query();
    write_result(backend.execute(Operation::delete(query)))
        .await
        .unwrap();

    assert_eq!(region.keys(), vec![Value::from("c")]);
    assert_eq!(region.queries_executed(), 0);

    let query = person()
        .id
        .is_equal_to("c")
        .unwrap()
        .or()
        .id
        .is_equal_to("d")
        .unwrap()
        .to_query();
    write_result(backend.execute(Operation::delete(query)))
        .await
        .unwrap();
    assert!(region.is_empty());
    assert_eq!(region.queries_executed(), 0);
}

#[tokio::test]
async fn test_delete_by_filter_queries_keys() {
    let (region, backend) = populated();

    let query = person().age.is_greater_than(20).unwrap().to_query();
    write_result(backend.execute(Operation::delete(query)))
        .await
        .unwrap();

    assert_eq!(region.keys(), vec![Value::from("b")]);
    assert_eq!(region.queries_executed(), 1);
}

#[tokio::test]
async fn test_delete_mixed_filter_is_not_reduced() {
    let (region, backend) = populated();

    // key predicate combined with another attribute needs a query
    let query = person()
        .id
        .is_equal_to("a")
        .unwrap()
        .age
        .is_less_than(10)
        .unwrap()
        .to_query();
    write_result(backend.execute(Operation::delete(query)))
        .await
        .unwrap();

    assert_eq!(region.len(), 3);
    assert_eq!(region.queries_executed(), 1);
}

#[tokio::test]
async fn test_delete_with_unsupported_operator() {
    let (region, backend) = populated();
    let query = person().name.matches("A").unwrap().to_query();

    let err = write_result(backend.execute(Operation::delete(query)))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::UnsupportedOperator { .. }));
    assert_eq!(region.len(), 3);
}

// =========================================================================
// Update and native errors
// =========================================================================

#[tokio::test]
async fn test_update_is_unsupported() {
    let (region, backend) = populated();
    let update = Operation::update(
        person().id.is_equal_to("a").unwrap().to_query(),
        vec![(Path::of("age"), Value::Int32(31))],
    );

    let err = write_result(backend.execute(update)).await.unwrap_err();
    match err {
        BackendError::UnsupportedOperation { operation, backend } => {
            assert_eq!(operation, "Update");
            assert_eq!(backend, "RegionBackend");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(region.len(), 3);
}

#[tokio::test]
async fn test_backend_name() {
    let (_region, backend) = backend();
    assert_eq!(Backend::<Person>::name(&backend), "RegionBackend");
}

#[tokio::test]
async fn test_undecodable_rows_surface_as_errors() {
    let (region, backend) = backend();
    region
        .put_all(vec![(Value::from("x"), Value::from("not a person"))])
        .unwrap();

    let err = collect_entities(backend.execute(Operation::select(Query::new())))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Entity(_)));
}
