use rusqlite::Connection;
use std::sync::Arc;
use taskgraph_core::db::open_db_in_memory;
use taskgraph_core::service::hierarchy::{validate_parent_assignment, HierarchyNode};
use taskgraph_core::{
    HierarchyError, NewTask, NoopSink, ParentTarget, ProjectId, SqliteTaskRepository, TaskArena,
    TaskId, TaskService, TaskServiceError, TaskType,
};

fn service(conn: &Connection) -> TaskService<'_> {
    TaskService::new(conn, Arc::new(NoopSink))
}

fn project(service: &TaskService<'_>, name: &str) -> ProjectId {
    service.create_project(name, None).unwrap().id
}

fn create(
    service: &TaskService<'_>,
    project_id: ProjectId,
    name: &str,
    task_type: TaskType,
    parent_id: Option<TaskId>,
) -> Result<TaskId, TaskServiceError> {
    let mut new_task = NewTask::new(name, task_type).in_project(project_id);
    if let Some(parent_id) = parent_id {
        new_task = new_task.under(parent_id);
    }
    service.create(&new_task).map(|task| task.id)
}

#[test]
fn subtask_under_epic_is_rejected_then_accepted_under_story() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let p1 = project(&service, "P1");

    let e1 = create(&service, p1, "E1", TaskType::Epic, None).unwrap();
    let s1 = create(&service, p1, "S1", TaskType::UserStory, Some(e1)).unwrap();

    let err = create(&service, p1, "T1", TaskType::Subtask, Some(e1)).unwrap_err();
    match &err {
        TaskServiceError::Hierarchy(HierarchyError::InvalidParentType {
            task_type,
            parent_type,
        }) => {
            assert_eq!(*task_type, TaskType::Subtask);
            assert_eq!(*parent_type, TaskType::Epic);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err
        .to_string()
        .contains("Subtasks must have a User Story as a parent"));

    let t1 = create(&service, p1, "T1", TaskType::Subtask, Some(s1)).unwrap();
    let loaded = service.get_task(t1).unwrap();
    assert_eq!(loaded.parent_id, Some(s1));
    assert_eq!(loaded.task_type, TaskType::Subtask);
}

#[test]
fn subtask_without_parent_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let p1 = project(&service, "P1");

    let err = create(&service, p1, "loose", TaskType::Subtask, None).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Hierarchy(HierarchyError::SubtaskRequiresParent)
    ));
}

#[test]
fn epic_cannot_take_a_parent() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let p1 = project(&service, "P1");
    let e1 = create(&service, p1, "E1", TaskType::Epic, None).unwrap();
    let e2 = create(&service, p1, "E2", TaskType::Epic, None).unwrap();

    let err = service
        .reparent(e2, ParentTarget::Task(e1))
        .unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Hierarchy(HierarchyError::InvalidParentType {
            task_type: TaskType::Epic,
            parent_type: TaskType::Epic,
        })
    ));
}

#[test]
fn parent_must_exist_and_share_the_project() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let p1 = project(&service, "P1");
    let p2 = project(&service, "P2");
    let foreign_epic = create(&service, p2, "Elsewhere", TaskType::Epic, None).unwrap();

    let missing = create(&service, p1, "S", TaskType::UserStory, Some(9_999)).unwrap_err();
    assert!(matches!(
        missing,
        TaskServiceError::Hierarchy(HierarchyError::ParentNotFound(9_999))
    ));

    let cross = create(&service, p1, "S", TaskType::UserStory, Some(foreign_epic)).unwrap_err();
    assert!(matches!(
        cross,
        TaskServiceError::Hierarchy(HierarchyError::CrossProjectParent { .. })
    ));
}

#[test]
fn task_cannot_be_its_own_parent() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let p1 = project(&service, "P1");
    let e1 = create(&service, p1, "E1", TaskType::Epic, None).unwrap();
    let s1 = create(&service, p1, "S1", TaskType::UserStory, Some(e1)).unwrap();

    let err = service.reparent(s1, ParentTarget::Task(s1)).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Hierarchy(HierarchyError::SelfParent { task_id }) if task_id == s1
    ));
}

#[test]
fn ancestor_chain_reaching_the_task_is_a_circular_reference() {
    // Story 1 is about to hang under Epic 2, whose own chain leads back to
    // Story 1. Only corrupt data can look like this.
    let mut arena = TaskArena::new();
    arena.insert(HierarchyNode {
        id: 1,
        task_type: TaskType::UserStory,
        parent_id: None,
        project_id: 1,
    });
    arena.insert(HierarchyNode {
        id: 3,
        task_type: TaskType::Subtask,
        parent_id: Some(1),
        project_id: 1,
    });
    arena.insert(HierarchyNode {
        id: 2,
        task_type: TaskType::Epic,
        parent_id: Some(3),
        project_id: 1,
    });

    let err = validate_parent_assignment(&arena, Some(1), TaskType::UserStory, 1, Some(2))
        .unwrap_err();
    assert!(matches!(
        err,
        HierarchyError::CircularReference {
            task_id: 1,
            parent_id: 2
        }
    ));
}

#[test]
fn sqlite_lookup_validates_like_the_arena() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let p1 = project(&service, "P1");
    let e1 = create(&service, p1, "E1", TaskType::Epic, None).unwrap();
    let s1 = create(&service, p1, "S1", TaskType::UserStory, Some(e1)).unwrap();

    let repo = SqliteTaskRepository::new(&conn);
    validate_parent_assignment(&repo, None, TaskType::Subtask, p1, Some(s1)).unwrap();
    let err = validate_parent_assignment(&repo, None, TaskType::UserStory, p1, Some(s1))
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("User Stories must have an Epic as a parent"));
}

#[test]
fn type_change_keeps_parent_and_children_valid() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let p1 = project(&service, "P1");
    let e1 = create(&service, p1, "E1", TaskType::Epic, None).unwrap();
    let s1 = create(&service, p1, "S1", TaskType::UserStory, Some(e1)).unwrap();
    create(&service, p1, "T1", TaskType::Subtask, Some(s1)).unwrap();

    // Promoting S1 would leave it under an Epic.
    let err = service.update_task_type(s1, TaskType::Epic).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Hierarchy(HierarchyError::InvalidParentType { .. })
    ));

    // Demoting E1 would strand S1 under a Subtask.
    let err = service.update_task_type(e1, TaskType::Subtask).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Hierarchy(HierarchyError::SubtaskRequiresParent)
    ));

    let unchanged = service.update_task_type(s1, TaskType::UserStory).unwrap();
    assert!(!unchanged.changed);
}

#[test]
fn retype_with_children_reports_incompatible_child() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let p1 = project(&service, "P1");
    let e1 = create(&service, p1, "E1", TaskType::Epic, None).unwrap();
    let e2 = create(&service, p1, "E2", TaskType::Epic, None).unwrap();
    let s1 = create(&service, p1, "S1", TaskType::UserStory, Some(e1)).unwrap();
    let t1 = create(&service, p1, "T1", TaskType::Subtask, Some(s1)).unwrap();

    // S1 can become an Epic only if it leaves E1, and then its Subtask child
    // would hang under an Epic.
    let payload = taskgraph_core::TaskPayload {
        task_type: Some(TaskType::Epic),
        parent: Some(ParentTarget::Root),
        ..Default::default()
    };
    let err = service.apply_update(s1, &payload).unwrap_err();
    match err {
        TaskServiceError::Hierarchy(HierarchyError::IncompatibleChild {
            child_id,
            child_type,
            new_type,
        }) => {
            assert_eq!(child_id, t1);
            assert_eq!(child_type, TaskType::Subtask);
            assert_eq!(new_type, TaskType::Epic);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Nothing from the failed change set was written.
    let s1_after = service.get_task(s1).unwrap();
    assert_eq!(s1_after.task_type, TaskType::UserStory);
    assert_eq!(s1_after.parent_id, Some(e1));

    // A childless story moves between epics fine.
    let s2 = create(&service, p1, "S2", TaskType::UserStory, Some(e1)).unwrap();
    let moved = service.reparent(s2, ParentTarget::Task(e2)).unwrap();
    assert!(moved.changed);
    assert_eq!(moved.task.parent_id, Some(e2));
}

#[test]
fn combined_type_and_parent_change_promotes_story_to_epic() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let p1 = project(&service, "P1");
    let e1 = create(&service, p1, "E1", TaskType::Epic, None).unwrap();
    let s1 = create(&service, p1, "S1", TaskType::UserStory, Some(e1)).unwrap();

    let payload = taskgraph_core::TaskPayload::from_json(&serde_json::json!({
        "task_type": "Epic",
        "parent_id": null,
    }))
    .unwrap();
    let outcome = service.apply_update(s1, &payload).unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.task.task_type, TaskType::Epic);
    assert_eq!(outcome.task.parent_id, None);
    assert_eq!(outcome.task.priority, None);
    assert_eq!(
        outcome.task.epic_priority,
        Some(taskgraph_core::EpicPriority::Unset)
    );
}
