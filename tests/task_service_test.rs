//! Integration tests for the task-tree engine.
//!
//! Tests cover:
//! - Creation order within sibling groups
//! - Completion propagation on toggle, create, delete and move
//! - Subtree deletion
//! - Reparenting, reordering and the drag compositions
//! - Gap-free sibling order after every structural change

use std::collections::HashMap;

use act::core::TaskService;
use act::db::schema;
use act::error::ActError;
use act::id::TaskId;
use act::types::{CreateTaskInput, Task};
use act::view;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;

fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    schema::init_schema(&conn).unwrap();
    conn
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
}

fn create(service: &TaskService, name: &str, parent: Option<&TaskId>) -> Task {
    service
        .create_at(
            &CreateTaskInput {
                name: name.to_string(),
                parent_id: parent.cloned(),
                due_date: None,
            },
            now(),
        )
        .unwrap()
}

fn names(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|t| t.name.clone()).collect()
}

fn children_names(service: &TaskService, parent: Option<&TaskId>) -> Vec<String> {
    names(&service.list_children(parent).unwrap())
}

/// Every parent with children agrees with them; every group is 0..n-1.
fn assert_tree_consistent(service: &TaskService) {
    let tasks = service.list_all().unwrap();

    for task in &tasks {
        let children = view::children_of(&tasks, Some(&task.id), true);
        if !children.is_empty() {
            let all_complete = children.iter().all(|c| c.completed);
            assert_eq!(
                task.completed, all_complete,
                "completion of {} disagrees with its children",
                task.name
            );
        }
        assert_eq!(task.completed, task.completed_at.is_some());
    }

    let mut groups: HashMap<Option<TaskId>, Vec<i64>> = HashMap::new();
    for task in &tasks {
        groups
            .entry(task.parent_id.clone())
            .or_default()
            .push(task.order);
    }
    for (group, mut orders) in groups {
        orders.sort();
        let expected: Vec<i64> = (0..orders.len() as i64).collect();
        assert_eq!(orders, expected, "order gap in group {:?}", group);
    }
}

// ==================== Creation ====================

#[test]
fn test_create_assigns_order_per_group() {
    let conn = setup_db();
    let service = TaskService::new(&conn);

    let a = create(&service, "A", None);
    let b = create(&service, "B", None);
    let c = create(&service, "C", Some(&a.id));
    let d = create(&service, "D", Some(&a.id));

    assert_eq!(a.order, 0);
    assert_eq!(b.order, 1);
    assert_eq!(c.order, 0);
    assert_eq!(d.order, 1);
    assert_eq!(c.parent_id, Some(a.id));
}

#[test]
fn test_get_nonexistent_task() {
    let conn = setup_db();
    let service = TaskService::new(&conn);

    let result = service.get(&TaskId::new());
    assert!(matches!(result, Err(ActError::TaskNotFound(_))));
}

#[test]
fn test_rename_keeps_completion() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let task = create(&service, "Old", None);
    service.toggle_at(&task.id, now()).unwrap();

    let renamed = service.rename(&task.id, "New").unwrap().unwrap();
    assert_eq!(renamed.name, "New");
    assert!(renamed.completed);

    assert!(matches!(
        service.rename(&task.id, "  "),
        Err(ActError::EmptyName)
    ));
}

// ==================== Completion propagation ====================

#[test]
fn test_parent_completion_scenario() {
    let conn = setup_db();
    let service = TaskService::new(&conn);

    let a = create(&service, "A", None);
    let b = create(&service, "B", None);
    let c = create(&service, "C", Some(&a.id));
    assert_eq!((a.order, b.order, c.order), (0, 1, 0));

    service.toggle_at(&c.id, now()).unwrap();
    let a_done = service.get(&a.id).unwrap();
    assert!(a_done.completed);
    assert!(a_done.completed_at.is_some());

    let d = create(&service, "D", Some(&a.id));
    assert_eq!(d.order, 1);
    let a_reopened = service.get(&a.id).unwrap();
    assert!(!a_reopened.completed);
    assert_eq!(a_reopened.completed_at, None);

    assert_tree_consistent(&service);
}

#[test]
fn test_toggle_child_back_reopens_ancestors() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let root = create(&service, "root", None);
    let mid = create(&service, "mid", Some(&root.id));
    let leaf = create(&service, "leaf", Some(&mid.id));

    service.toggle_at(&leaf.id, now()).unwrap();
    assert!(service.get(&root.id).unwrap().completed);

    service.toggle_at(&leaf.id, now()).unwrap();
    assert!(!service.get(&mid.id).unwrap().completed);
    assert!(!service.get(&root.id).unwrap().completed);
    assert_tree_consistent(&service);
}

#[test]
fn test_deleting_last_open_child_completes_parent() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let parent = create(&service, "parent", None);
    let done = create(&service, "done", Some(&parent.id));
    let open = create(&service, "open", Some(&parent.id));
    service.toggle_at(&done.id, now()).unwrap();
    assert!(!service.get(&parent.id).unwrap().completed);

    service.delete_at(&[open.id], now()).unwrap();

    assert!(service.get(&parent.id).unwrap().completed);
    assert_tree_consistent(&service);
}

#[test]
fn test_deleting_all_children_leaves_parent_flag() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let parent = create(&service, "parent", None);
    let only = create(&service, "only", Some(&parent.id));

    service.delete_at(&[only.id], now()).unwrap();

    let parent = service.get(&parent.id).unwrap();
    assert!(!parent.completed);
}

// ==================== Deletion ====================

#[test]
fn test_delete_removes_whole_subtree() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let a1 = create(&service, "A1", Some(&a.id));
    let a2 = create(&service, "A2", Some(&a.id));
    let a1x = create(&service, "A1x", Some(&a1.id));
    let b = create(&service, "B", None);

    let removed = service.delete(&[a.id.clone()]).unwrap();
    assert_eq!(removed, 4);

    for id in [&a.id, &a1.id, &a2.id, &a1x.id] {
        assert!(matches!(service.get(id), Err(ActError::TaskNotFound(_))));
    }
    let left = service.list_all().unwrap();
    assert_eq!(names(&left), ["B"]);
    assert_eq!(left[0].id, b.id);
    assert_eq!(left[0].order, 0);
    assert!(left.iter().all(|t| t.parent_id.is_none()));
}

#[test]
fn test_bulk_delete_skips_missing_and_nested_ids() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let a1 = create(&service, "A1", Some(&a.id));
    create(&service, "B", None);
    let c = create(&service, "C", None);

    let removed = service
        .delete(&[a.id.clone(), TaskId::new(), a1.id.clone(), c.id.clone()])
        .unwrap();
    assert_eq!(removed, 3);
    assert_eq!(children_names(&service, None), ["B"]);
    assert_tree_consistent(&service);
}

#[test]
fn test_delete_middle_sibling_closes_gap() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let parent = create(&service, "P", None);
    create(&service, "x", Some(&parent.id));
    let y = create(&service, "y", Some(&parent.id));
    create(&service, "z", Some(&parent.id));

    service.delete(&[y.id]).unwrap();

    let orders: Vec<i64> = service
        .list_children(Some(&parent.id))
        .unwrap()
        .iter()
        .map(|t| t.order)
        .collect();
    assert_eq!(orders, vec![0, 1]);
    let next = create(&service, "w", Some(&parent.id));
    assert_eq!(next.order, 2);
}

// ==================== Reordering ====================

#[test]
fn test_reorder_matches_given_list() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let b = create(&service, "B", None);
    let c = create(&service, "C", None);

    service
        .reorder(&[c.id.clone(), a.id.clone(), b.id.clone()], None)
        .unwrap();

    assert_eq!(service.get(&c.id).unwrap().order, 0);
    assert_eq!(service.get(&a.id).unwrap().order, 1);
    assert_eq!(service.get(&b.id).unwrap().order, 2);
    assert_eq!(children_names(&service, None), ["C", "A", "B"]);
}

#[test]
fn test_reorder_partial_list_appends_the_rest() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    create(&service, "B", None);
    let c = create(&service, "C", None);
    let foreign = create(&service, "child", Some(&a.id));

    service
        .reorder(&[c.id.clone(), foreign.id.clone()], None)
        .unwrap();

    assert_eq!(children_names(&service, None), ["C", "A", "B"]);
    assert_eq!(service.get(&foreign.id).unwrap().parent_id, Some(a.id));
    assert_tree_consistent(&service);
}

#[test]
fn test_reorder_within_drops_block_at_index() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let b = create(&service, "B", None);
    create(&service, "C", None);
    create(&service, "D", None);

    // Drag A and B below C: remaining [C, D], drop at 1
    service
        .reorder_within(None, &[b.id.clone(), a.id.clone()], 1)
        .unwrap();

    assert_eq!(children_names(&service, None), ["C", "A", "B", "D"]);
    assert_tree_consistent(&service);
}

#[test]
fn test_shift_clamps_to_group_bounds() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    create(&service, "B", None);
    let c = create(&service, "C", None);

    let moved = service.shift(&c.id, -1).unwrap().unwrap();
    assert_eq!(moved.order, 1);
    assert_eq!(children_names(&service, None), ["A", "C", "B"]);

    service.shift(&a.id, 10).unwrap();
    assert_eq!(children_names(&service, None), ["C", "B", "A"]);

    service.shift(&a.id, -10).unwrap();
    assert_eq!(children_names(&service, None), ["A", "C", "B"]);

    assert!(service.shift(&TaskId::new(), 1).unwrap().is_none());
}

// ==================== Reparenting ====================

#[test]
fn test_move_appends_and_renumbers_source() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let b = create(&service, "B", None);
    let c = create(&service, "C", None);
    create(&service, "B1", Some(&b.id));

    let moved = service
        .move_to_parent_at(&[c.id.clone(), a.id.clone()], Some(&b.id), now())
        .unwrap();
    assert_eq!(moved, vec![c.id.clone(), a.id.clone()]);

    assert_eq!(children_names(&service, Some(&b.id)), ["B1", "C", "A"]);
    assert_eq!(service.get(&b.id).unwrap().order, 0);
    assert_tree_consistent(&service);
}

#[test]
fn test_move_propagates_to_both_parents() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let source = create(&service, "source", None);
    let done = create(&service, "done", Some(&source.id));
    let open = create(&service, "open", Some(&source.id));
    let target = create(&service, "target", None);
    let target_child = create(&service, "target child", Some(&target.id));
    service.toggle_at(&done.id, now()).unwrap();
    service.toggle_at(&target_child.id, now()).unwrap();
    assert!(service.get(&target.id).unwrap().completed);

    service
        .move_to_parent_at(&[open.id.clone()], Some(&target.id), now())
        .unwrap();

    // Source lost its only open child; target gained one
    assert!(service.get(&source.id).unwrap().completed);
    assert!(!service.get(&target.id).unwrap().completed);
    assert_tree_consistent(&service);
}

#[test]
fn test_move_to_root() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let a1 = create(&service, "A1", Some(&a.id));

    service.validate_move(&[a1.id.clone()], None).unwrap();
    service.move_to_parent(&[a1.id.clone()], None).unwrap();

    let a1 = service.get(&a1.id).unwrap();
    assert_eq!(a1.parent_id, None);
    assert_eq!(a1.order, 1);
    assert_tree_consistent(&service);
}

#[test]
fn test_move_under_missing_parent_goes_to_root() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let a1 = create(&service, "A1", Some(&a.id));
    let a2 = create(&service, "A2", Some(&a.id));
    create(&service, "B", None);
    let ghost = TaskId::new();

    service.validate_move(&[a1.id.clone()], Some(&ghost)).unwrap();
    let moved = service
        .move_to_parent_at(&[a1.id.clone()], Some(&ghost), now())
        .unwrap();
    assert_eq!(moved, vec![a1.id.clone()]);
    assert_eq!(service.get(&a1.id).unwrap().parent_id, None);
    assert_eq!(children_names(&service, None), ["A", "B", "A1"]);

    service
        .move_to_position_at(&[a2.id.clone()], Some(&ghost), 0, now())
        .unwrap();
    assert_eq!(service.get(&a2.id).unwrap().parent_id, None);
    assert_eq!(children_names(&service, None), ["A2", "A", "B", "A1"]);
    assert!(service.list_children(Some(&a.id)).unwrap().is_empty());
    assert_tree_consistent(&service);
}

#[test]
fn test_validate_move_rejects_descendant_target() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let a1 = create(&service, "A1", Some(&a.id));
    let a2 = create(&service, "A2", Some(&a.id));
    let b = create(&service, "B", None);

    let tasks = service.list_all().unwrap();
    let subtree: Vec<TaskId> = view::subtree_of(&tasks, &a.id)
        .into_iter()
        .map(|t| t.id.clone())
        .collect();
    assert!(subtree.contains(&a1.id));
    assert!(subtree.contains(&a2.id));

    let result = service.validate_move(&[a.id.clone()], Some(&a1.id));
    assert!(matches!(result, Err(ActError::InvalidHierarchy { .. })));
    let result = service.validate_move(&[a.id.clone()], Some(&a.id));
    assert!(matches!(result, Err(ActError::InvalidHierarchy { .. })));

    service.validate_move(&[a.id.clone()], Some(&b.id)).unwrap();
}

#[test]
fn test_move_to_position_uses_pre_move_destination() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let left = create(&service, "left", None);
    let right = create(&service, "right", None);
    let l1 = create(&service, "l1", Some(&left.id));
    let l2 = create(&service, "l2", Some(&left.id));
    create(&service, "r1", Some(&right.id));
    create(&service, "r2", Some(&right.id));
    create(&service, "r3", Some(&right.id));

    service
        .move_to_position_at(&[l2.id.clone(), l1.id.clone()], Some(&right.id), 1, now())
        .unwrap();

    assert_eq!(
        children_names(&service, Some(&right.id)),
        ["r1", "l2", "l1", "r2", "r3"]
    );
    assert!(service.list_children(Some(&left.id)).unwrap().is_empty());
    assert_tree_consistent(&service);
}

#[test]
fn test_move_to_position_within_same_parent() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    create(&service, "A", None);
    create(&service, "B", None);
    let c = create(&service, "C", None);

    service
        .move_to_position_at(&[c.id.clone()], None, 0, now())
        .unwrap();

    assert_eq!(children_names(&service, None), ["C", "A", "B"]);
    assert_tree_consistent(&service);
}

#[test]
fn test_normalize_orders_repairs_gaps() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let b = create(&service, "B", None);
    conn.execute(
        "UPDATE tasks SET task_order = 7 WHERE id = ?1",
        [a.id.as_str()],
    )
    .unwrap();
    conn.execute(
        "UPDATE tasks SET task_order = 3 WHERE id = ?1",
        [b.id.as_str()],
    )
    .unwrap();

    service.normalize_orders().unwrap();

    assert_eq!(children_names(&service, None), ["B", "A"]);
    assert_tree_consistent(&service);
}

#[test]
fn test_mixed_operations_keep_tree_consistent() {
    let conn = setup_db();
    let service = TaskService::new(&conn);
    let a = create(&service, "A", None);
    let b = create(&service, "B", None);
    let a1 = create(&service, "A1", Some(&a.id));
    let a2 = create(&service, "A2", Some(&a.id));
    let b1 = create(&service, "B1", Some(&b.id));
    let a1x = create(&service, "A1x", Some(&a1.id));

    service.toggle_at(&a1x.id, now()).unwrap();
    assert_tree_consistent(&service);
    service.toggle_at(&a2.id, now()).unwrap();
    assert_tree_consistent(&service);
    assert!(service.get(&a.id).unwrap().completed);

    service.validate_move(&[b1.id.clone()], Some(&a1.id)).unwrap();
    service
        .move_to_parent_at(&[b1.id.clone()], Some(&a1.id), now())
        .unwrap();
    assert_tree_consistent(&service);
    assert!(!service.get(&a.id).unwrap().completed);

    service.delete_at(&[b1.id.clone()], now()).unwrap();
    assert_tree_consistent(&service);
    assert!(service.get(&a.id).unwrap().completed);

    service.reorder(&[a2.id.clone(), a1.id.clone()], Some(&a.id)).unwrap();
    assert_tree_consistent(&service);
    assert_eq!(children_names(&service, Some(&a.id)), ["A2", "A1"]);
}
