//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeMap;

use dimstore_core::{
  Config, ConfigError, DimensionConfig, DocumentStore, IdError, ListOptions, ParentRef,
  UpdateRequest,
};
use proptest::prelude::*;
use uuid::Uuid;

use crate::{Error, SqliteStore};

type CoreError = dimstore_core::Error;

fn status() -> DimensionConfig {
  DimensionConfig::enumerated("status", ["pending", "completed", "blocked"])
    .with_prefix("completed", 'c')
    .with_prefix("blocked", 'b')
    .with_default("pending")
}

fn parent() -> DimensionConfig { DimensionConfig::hierarchical("parent", "parent_uuid") }

fn priority() -> DimensionConfig {
  DimensionConfig::enumerated("priority", ["low", "high"])
    .with_prefix("high", 'h')
    .with_default("low")
}

fn store() -> SqliteStore {
  SqliteStore::open_in_memory(Config::new(vec![status(), parent()])).expect("in-memory store")
}

fn dims(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  pairs
    .iter()
    .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
    .collect()
}

/// The user-facing ID currently shown for `uuid`.
fn id_of(s: &SqliteStore, uuid: Uuid) -> String {
  s.list(&ListOptions::default())
    .unwrap()
    .into_iter()
    .find(|d| d.uuid == uuid)
    .map(|d| d.user_facing_id)
    .expect("document listed")
}

fn count(s: &SqliteStore) -> usize { s.list(&ListOptions::default()).unwrap().len() }

fn core(err: Error) -> CoreError {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a core error, got {other:?}"),
  }
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[test]
fn ids_follow_status_and_hierarchy() {
  let s = store();

  let root = s.add("Root", None).unwrap();
  assert_eq!(id_of(&s, root), "1");

  let child = s.add("Child", Some(root.to_string().as_str())).unwrap();
  assert_eq!(id_of(&s, child), "1.1");

  s.set_status(&root.to_string(), "completed").unwrap();
  assert_eq!(id_of(&s, root), "c1");
  assert_eq!(id_of(&s, child), "c1.1");

  assert_eq!(s.resolve_uuid("c1.1").unwrap(), child);
  assert_eq!(s.resolve_uuid("c1").unwrap(), root);
}

#[test]
fn parent_may_be_given_as_user_facing_id() {
  let s = store();
  let root = s.add("Root", None).unwrap();
  let first = s.add("First", Some("1")).unwrap();
  let second = s.add("Second", Some("1")).unwrap();

  assert_eq!(id_of(&s, first), "1.1");
  assert_eq!(id_of(&s, second), "1.2");
  assert_eq!(s.get(&second.to_string()).unwrap().parent(), Some(root));
}

#[test]
fn add_with_unknown_parent_is_not_found() {
  let s = store();
  let err = s.add("Orphan", Some(Uuid::new_v4().to_string().as_str())).unwrap_err();
  assert!(err.is_not_found());
  assert_eq!(count(&s), 0);
}

#[test]
fn get_returns_computed_id_and_fields() {
  let s = store();
  let uuid = s
    .add_with_dimensions("Buy milk", &dims(&[("status", "blocked")]))
    .unwrap();

  let doc = s.get("b1").unwrap();
  assert_eq!(doc.uuid, uuid);
  assert_eq!(doc.user_facing_id, "b1");
  assert_eq!(doc.title, "Buy milk");
  assert_eq!(doc.body, "");
  assert_eq!(doc.dimension("status"), Some("blocked"));
  assert_eq!(doc.parent(), None);
  assert!(doc.updated_at >= doc.created_at);

  assert!(s.get(&Uuid::new_v4().to_string()).unwrap_err().is_not_found());
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

#[test]
fn ranks_are_per_partition_in_creation_order() {
  let s = store();
  let mut pending = Vec::new();
  let mut completed = Vec::new();
  for i in 0..5 {
    pending.push(s.add(&format!("p{i}"), None).unwrap());
    if i < 3 {
      completed.push(
        s.add_with_dimensions(&format!("c{i}"), &dims(&[("status", "completed")]))
          .unwrap(),
      );
    }
  }

  for (i, uuid) in pending.iter().enumerate() {
    assert_eq!(id_of(&s, *uuid), format!("{}", i + 1));
    assert_eq!(s.resolve_uuid(&format!("{}", i + 1)).unwrap(), *uuid);
  }
  for (i, uuid) in completed.iter().enumerate() {
    assert_eq!(id_of(&s, *uuid), format!("c{}", i + 1));
    assert_eq!(s.resolve_uuid(&format!("c{}", i + 1)).unwrap(), *uuid);
  }
}

#[test]
fn children_are_ranked_under_their_own_parent() {
  let s = store();
  let a = s.add("A", None).unwrap();
  let b = s.add("B", None).unwrap();
  let a1 = s.add("A1", Some(a.to_string().as_str())).unwrap();
  let b1 = s.add("B1", Some(b.to_string().as_str())).unwrap();
  let a2 = s.add("A2", Some(a.to_string().as_str())).unwrap();

  assert_eq!(id_of(&s, a1), "1.1");
  assert_eq!(id_of(&s, a2), "1.2");
  assert_eq!(id_of(&s, b1), "2.1");

  // Hierarchical concatenation.
  for doc in s.list(&ListOptions::default()).unwrap() {
    if let Some(p) = doc.parent() {
      let prefix = format!("{}.", id_of(&s, p));
      assert!(doc.user_facing_id.starts_with(&prefix), "{}", doc.user_facing_id);
    }
  }
}

#[test]
fn prefix_order_does_not_matter_when_resolving() {
  let s = SqliteStore::open_in_memory(Config::new(vec![status(), priority(), parent()])).unwrap();
  let mut uuids = Vec::new();
  for i in 0..3 {
    uuids.push(
      s.add_with_dimensions(
        &format!("t{i}"),
        &dims(&[("status", "completed"), ("priority", "high")]),
      )
      .unwrap(),
    );
  }

  let hc = s.resolve_uuid("hc3").unwrap();
  let ch = s.resolve_uuid("ch3").unwrap();
  assert_eq!(hc, ch);
  assert_eq!(hc, uuids[2]);
}

#[test]
fn deep_ids_resolve_level_by_level() {
  let s = store();
  let mut chain = vec![s.add("L1", None).unwrap()];
  for depth in 2..=5 {
    let parent = chain.last().unwrap().to_string();
    chain.push(s.add(&format!("L{depth}"), Some(parent.as_str())).unwrap());
  }

  assert_eq!(s.resolve_uuid("1.1.1").unwrap(), chain[2]);
  assert_eq!(s.resolve_uuid("1.1.1.1").unwrap(), chain[3]);
  assert_eq!(s.resolve_uuid("1.1.1.1.1").unwrap(), chain[4]);
  assert_eq!(id_of(&s, chain[4]), "1.1.1.1.1");
  assert!(s.resolve_uuid("1.1.1.1.2").unwrap_err().is_not_found());
  assert!(s.resolve_uuid("1.2").unwrap_err().is_not_found());
}

// ─── Resolution errors ───────────────────────────────────────────────────────

#[test]
fn resolve_passes_uuids_through() {
  let s = store();
  let uuid = Uuid::new_v4();
  assert_eq!(s.resolve_uuid(&uuid.to_string()).unwrap(), uuid);
}

#[test]
fn resolve_rejects_bad_ids() {
  let s = store();
  s.add("Only", None).unwrap();

  assert!(s.resolve_uuid("2").unwrap_err().is_not_found());
  assert!(matches!(
    core(s.resolve_uuid("1'; DROP TABLE documents").unwrap_err()),
    CoreError::InvalidId(IdError::IllegalCharacters)
  ));
  assert!(matches!(
    core(s.resolve_uuid("x1").unwrap_err()),
    CoreError::InvalidId(IdError::UnknownPrefix('x'))
  ));
  assert!(matches!(
    core(s.resolve_uuid("0").unwrap_err()),
    CoreError::InvalidId(IdError::NonPositive(_))
  ));
  assert_eq!(count(&s), 1);
}

// ─── Validation ──────────────────────────────────────────────────────────────

#[test]
fn invalid_dimension_value_is_rejected_without_writing() {
  let s = store();
  let err = s
    .add_with_dimensions("Bad", &dims(&[("status", "archived")]))
    .unwrap_err();
  match core(err) {
    CoreError::InvalidDimensionValue { dimension, value } => {
      assert_eq!(dimension, "status");
      assert_eq!(value, "archived");
    }
    other => panic!("unexpected error: {other:?}"),
  }
  assert_eq!(count(&s), 0);

  let err = s.add_with_dimensions("Bad", &dims(&[("colour", "red")])).unwrap_err();
  assert!(matches!(core(err), CoreError::UnknownDimension(_)));
}

#[test]
fn set_status_validates_value() {
  let s = store();
  let uuid = s.add("Task", None).unwrap();
  let err = s.set_status(&uuid.to_string(), "archived").unwrap_err();
  assert!(matches!(core(err), CoreError::InvalidDimensionValue { .. }));
  assert_eq!(s.get("1").unwrap().dimension("status"), Some("pending"));
}

#[test]
fn set_status_needs_a_status_dimension() {
  let s = SqliteStore::open_in_memory(Config::new(vec![priority()])).unwrap();
  s.add("Task", None).unwrap();
  let err = s.set_status("1", "completed").unwrap_err();
  assert!(matches!(core(err), CoreError::UnknownDimension(_)));
}

#[test]
fn invalid_config_fails_before_touching_disk() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.db");
  let priority = DimensionConfig::enumerated("priority", ["low", "high"]).with_prefix("high", 'c');

  let err = SqliteStore::open(&path, Config::new(vec![status(), priority])).err().unwrap();
  assert!(matches!(core(err), CoreError::Config(_)));
  assert!(!path.exists());
}

#[test]
fn query_internal_names_cannot_be_dimensions() {
  for name in ["seq", "depth", "local_id", "rowid"] {
    let config = Config::new(vec![DimensionConfig::enumerated(name, ["alpha", "beta"]), parent()]);
    let err = SqliteStore::open_in_memory(config).err().unwrap();
    assert!(matches!(
      core(err),
      CoreError::Config(ConfigError::ReservedName(n)) if n == name
    ));
  }
}

#[test]
fn similar_names_still_list() {
  let config = Config::new(vec![
    DimensionConfig::enumerated("sequence", ["alpha", "beta"]).with_prefix("beta", 'b'),
    parent(),
  ]);
  let s = SqliteStore::open_in_memory(config).unwrap();
  let uuid = s.add_with_dimensions("One", &dims(&[("sequence", "beta")])).unwrap();

  assert_eq!(id_of(&s, uuid), "b1");
  assert_eq!(s.get(&uuid.to_string()).unwrap().dimension("sequence"), Some("beta"));
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[test]
fn update_changes_only_supplied_fields() {
  let s = store();
  let uuid = s.add("Draft", None).unwrap();

  s.update("1", UpdateRequest {
    body: Some("details".into()),
    ..Default::default()
  })
  .unwrap();

  let doc = s.get(&uuid.to_string()).unwrap();
  assert_eq!(doc.title, "Draft");
  assert_eq!(doc.body, "details");

  s.update(&uuid.to_string(), UpdateRequest {
    title:      Some("Final".into()),
    dimensions: dims(&[("status", "blocked")]),
    ..Default::default()
  })
  .unwrap();
  let doc = s.get("b1").unwrap();
  assert_eq!(doc.title, "Final");
  assert_eq!(doc.body, "details");
}

#[test]
fn update_errors() {
  let s = store();
  s.add("Task", None).unwrap();

  assert!(matches!(
    core(s.update("1", UpdateRequest::default()).unwrap_err()),
    CoreError::NoFieldsToUpdate
  ));

  let missing = s
    .update(&Uuid::new_v4().to_string(), UpdateRequest {
      title: Some("x".into()),
      ..Default::default()
    })
    .unwrap_err();
  assert!(missing.is_not_found());
}

#[test]
fn reparenting_moves_document_and_root_detaches() {
  let s = store();
  let a = s.add("A", None).unwrap();
  let b = s.add("B", None).unwrap();

  s.update(&b.to_string(), UpdateRequest {
    parent: Some(ParentRef::id("1")),
    ..Default::default()
  })
  .unwrap();
  assert_eq!(id_of(&s, b), "1.1");
  assert_eq!(s.get("1.1").unwrap().parent(), Some(a));

  s.update("1.1", UpdateRequest {
    parent: Some(ParentRef::Root),
    ..Default::default()
  })
  .unwrap();
  assert_eq!(id_of(&s, b), "2");

  // An empty ID also means root.
  s.update("2", UpdateRequest {
    parent: Some(ParentRef::id(a.to_string())),
    ..Default::default()
  })
  .unwrap();
  s.update("1.1", UpdateRequest {
    parent: Some(ParentRef::id("")),
    ..Default::default()
  })
  .unwrap();
  assert_eq!(s.get(&b.to_string()).unwrap().parent(), None);
}

#[test]
fn cycles_are_rejected() {
  let s = store();
  let a = s.add("A", None).unwrap();
  let b = s.add("B", Some(a.to_string().as_str())).unwrap();
  let c = s.add("C", Some(b.to_string().as_str())).unwrap();

  let to = |p: Uuid| UpdateRequest {
    parent: Some(ParentRef::id(p.to_string())),
    ..Default::default()
  };

  assert!(matches!(core(s.update(&a.to_string(), to(a)).unwrap_err()), CoreError::SelfParent));
  assert!(matches!(
    core(s.update(&a.to_string(), to(c)).unwrap_err()),
    CoreError::CircularReference
  ));
  assert!(matches!(
    core(s.update(&a.to_string(), to(b)).unwrap_err()),
    CoreError::CircularReference
  ));

  // Tree untouched.
  assert_eq!(id_of(&s, c), "1.1.1");

  // Moving a leaf up is fine.
  s.update(&c.to_string(), to(a)).unwrap();
  assert_eq!(id_of(&s, c), "1.2");
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[test]
fn delete_without_cascade_refuses_parents() {
  let s = store();
  let a = s.add("A", None).unwrap();
  let b = s.add("B", Some(a.to_string().as_str())).unwrap();

  match core(s.delete("1", false).unwrap_err()) {
    CoreError::HasChildren(uuid) => assert_eq!(uuid, a),
    other => panic!("unexpected error: {other:?}"),
  }
  assert_eq!(count(&s), 2);

  s.delete(&b.to_string(), false).unwrap();
  s.delete("1", false).unwrap();
  assert_eq!(count(&s), 0);
}

#[test]
fn cascade_removes_exactly_the_subtree() {
  let s = store();
  let a = s.add("A", None).unwrap();
  let b = s.add("B", Some(a.to_string().as_str())).unwrap();
  s.add("C", Some(b.to_string().as_str())).unwrap();
  s.add("A2", Some(a.to_string().as_str())).unwrap();
  let d = s.add("D", None).unwrap();
  let d1 = s.add("D1", Some(d.to_string().as_str())).unwrap();

  s.delete("1", true).unwrap();

  let left: Vec<Uuid> = s
    .list(&ListOptions::default())
    .unwrap()
    .into_iter()
    .map(|doc| doc.uuid)
    .collect();
  assert_eq!(left, vec![d, d1]);
  assert_eq!(id_of(&s, d), "1");
}

#[test]
fn delete_missing_is_not_found() {
  let s = store();
  assert!(s.delete(&Uuid::new_v4().to_string(), true).unwrap_err().is_not_found());
  assert!(s.delete("3", false).unwrap_err().is_not_found());
}

// ─── Bulk ────────────────────────────────────────────────────────────────────

#[test]
fn bulk_operations_by_dimension() {
  let s = store();
  for i in 0..3 {
    s.add(&format!("p{i}"), None).unwrap();
  }
  for i in 0..2 {
    s.add_with_dimensions(&format!("c{i}"), &dims(&[("status", "completed")]))
      .unwrap();
  }

  let updated = s
    .update_by_dimension(&dims(&[("status", "pending")]), UpdateRequest {
      body: Some("todo".into()),
      ..Default::default()
    })
    .unwrap();
  assert_eq!(updated, 3);

  let deleted = s.delete_by_dimension(&dims(&[("status", "completed")])).unwrap();
  assert_eq!(deleted, 2);

  let docs = s.list(&ListOptions::default()).unwrap();
  assert_eq!(docs.len(), 3);
  assert!(docs.iter().all(|d| d.body == "todo"));
}

#[test]
fn bulk_operations_validate_input() {
  let s = store();
  s.add("Task", None).unwrap();

  assert!(matches!(
    core(s.delete_by_dimension(&BTreeMap::new()).unwrap_err()),
    CoreError::NoFilters
  ));
  assert!(matches!(
    core(s.delete_by_dimension(&dims(&[("status", "gone")])).unwrap_err()),
    CoreError::InvalidDimensionValue { .. }
  ));
  assert!(matches!(
    core(
      s.update_by_dimension(&dims(&[("status", "pending")]), UpdateRequest {
        parent: Some(ParentRef::Root),
        ..Default::default()
      })
      .unwrap_err()
    ),
    CoreError::BulkReparent
  ));
  assert_eq!(count(&s), 1);
}

#[test]
fn bulk_delete_by_parent_takes_children() {
  let s = store();
  let a = s.add("A", None).unwrap();
  s.add("A1", Some(a.to_string().as_str())).unwrap();
  s.add("A2", Some(a.to_string().as_str())).unwrap();
  s.add("B", None).unwrap();

  assert_eq!(s.delete_by_dimension(&dims(&[("parent", "1")])).unwrap(), 2);
  assert_eq!(count(&s), 2);
}

// ─── List ────────────────────────────────────────────────────────────────────

#[test]
fn list_filters_keep_ids_stable() {
  let s = store();
  let a = s.add("Buy milk", None).unwrap();
  s.add("Walk dog", None).unwrap();
  let c = s.add("Milk the cow", Some(a.to_string().as_str())).unwrap();
  s.set_status(&c.to_string(), "completed").unwrap();

  let found = s
    .list(&ListOptions {
      search: Some("ilk".into()),
      ..Default::default()
    })
    .unwrap();
  let ids: Vec<&str> = found.iter().map(|d| d.user_facing_id.as_str()).collect();
  assert_eq!(ids, vec!["1", "1.c1"]);

  let completed = s
    .list(&ListOptions {
      status: vec!["completed".into()],
      ..Default::default()
    })
    .unwrap();
  assert_eq!(completed.len(), 1);
  assert_eq!(completed[0].user_facing_id, "1.c1");

  let roots = s
    .list(&ListOptions {
      parent: Some(ParentRef::Root),
      ..Default::default()
    })
    .unwrap();
  assert_eq!(roots.len(), 2);

  let children = s
    .list(&ListOptions {
      parent: Some(ParentRef::id("1")),
      ..Default::default()
    })
    .unwrap();
  assert_eq!(children.len(), 1);
  assert_eq!(children[0].uuid, c);

  let either = s
    .list(&ListOptions {
      dimensions: BTreeMap::from([(
        "status".to_owned(),
        vec!["pending".to_owned(), "completed".to_owned()],
      )]),
      ..Default::default()
    })
    .unwrap();
  assert_eq!(either.len(), 3);
}

#[test]
fn list_orders_roots_before_children() {
  let s = store();
  let a = s.add("A", None).unwrap();
  s.add("A1", Some(a.to_string().as_str())).unwrap();
  s.add("B", None).unwrap();

  let ids: Vec<String> = s
    .list(&ListOptions::default())
    .unwrap()
    .into_iter()
    .map(|d| d.user_facing_id)
    .collect();
  assert_eq!(ids, vec!["1", "2", "1.1"]);
}

// ─── Flat configuration ──────────────────────────────────────────────────────

#[test]
fn flat_store_has_no_hierarchy() {
  let s = SqliteStore::open_in_memory(Config::new(vec![status()])).unwrap();
  s.add("One", None).unwrap();
  s.add("Two", None).unwrap();

  assert!(matches!(core(s.add("Child", Some("1")).unwrap_err()), CoreError::UnknownDimension(_)));
  assert!(s.resolve_uuid("1.1").unwrap_err().is_not_found());
  assert_eq!(s.get("2").unwrap().title, "Two");
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[test]
fn reopening_adds_new_dimension_columns() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.db");

  let s = SqliteStore::open(&path, Config::new(vec![status()])).unwrap();
  let first = s.add("First", None).unwrap();
  s.close().unwrap();

  let s = SqliteStore::open(&path, Config::new(vec![status(), priority(), parent()])).unwrap();
  let doc = s.get("1").unwrap();
  assert_eq!(doc.uuid, first);
  assert_eq!(doc.dimension("priority"), Some("low"));

  let child = s.add("Child", Some("1")).unwrap();
  assert_eq!(id_of(&s, child), "1.1");
  s.close().unwrap();

  // Same configuration again: nothing to migrate.
  let s = SqliteStore::open(&path, Config::new(vec![status(), priority(), parent()])).unwrap();
  assert_eq!(count(&s), 2);
}

#[test]
fn incompatible_column_type_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("store.db");
  {
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn
      .execute_batch(
        "CREATE TABLE documents (
           uuid TEXT PRIMARY KEY, title TEXT NOT NULL, body TEXT DEFAULT '',
           created_at INTEGER NOT NULL, updated_at INTEGER NOT NULL,
           status INTEGER
         )",
      )
      .unwrap();
  }

  let err = SqliteStore::open(&path, Config::new(vec![status()])).err().unwrap();
  assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn re_adding_existing_columns_is_tolerated() {
  let s = SqliteStore::open_in_memory(Config::new(vec![status(), parent()])).unwrap();
  let uuid = s.add("Task", None).unwrap();

  for statement in s.schema().dimension_columns() {
    s.apply_ddl(&statement).unwrap();
  }
  assert_eq!(id_of(&s, uuid), "1");

  let err = s.apply_ddl("ALTER TABLE missing ADD COLUMN x TEXT").unwrap_err();
  assert!(matches!(err, Error::Database(_)));
}

// ─── Properties ──────────────────────────────────────────────────────────────

proptest! {
  #![proptest_config(ProptestConfig::with_cases(24))]

  #[test]
  fn partition_ranks_are_dense_and_ordered(statuses in prop::collection::vec(0usize..3, 1..12)) {
    let values = ["pending", "completed", "blocked"];
    let prefixes = ["", "c", "b"];
    let s = store();

    let mut by_status: Vec<Vec<Uuid>> = vec![Vec::new(); 3];
    for (i, status) in statuses.iter().enumerate() {
      let uuid = s
        .add_with_dimensions(&format!("doc {i}"), &dims(&[("status", values[*status])]))
        .unwrap();
      by_status[*status].push(uuid);
    }

    let docs = s.list(&ListOptions::default()).unwrap();
    prop_assert_eq!(docs.len(), statuses.len());

    for (status, uuids) in by_status.iter().enumerate() {
      for (rank, uuid) in uuids.iter().enumerate() {
        let expected = format!("{}{}", prefixes[status], rank + 1);
        let doc = docs.iter().find(|d| d.uuid == *uuid).unwrap();
        prop_assert_eq!(&doc.user_facing_id, &expected);
        prop_assert_eq!(s.resolve_uuid(&expected).unwrap(), *uuid);
      }
    }
  }
}
