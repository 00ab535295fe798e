use serde_json::json;
use std::sync::Arc;
use taskgraph_core::db::open_db_in_memory;
use taskgraph_core::{
    generate_page_numbers, paginate, CompletionFilter, EstimateType, EventName, MemorySink,
    NewTask, PageWindow, Priority, TaskListQuery, TaskPayload, TaskService, TaskServiceError,
    TaskStatus, TaskType,
};

#[test]
fn payload_update_applies_coerced_fields_together() {
    let conn = open_db_in_memory().unwrap();
    let sink = Arc::new(MemorySink::new());
    let service = TaskService::new(&conn, sink.clone());
    let project_id = service.create_project("Atlas", None).unwrap().id;
    let epic = service
        .create(&NewTask::new("Map", TaskType::Epic).in_project(project_id))
        .unwrap();
    let story = service
        .create(&NewTask::new("Survey", TaskType::UserStory).in_project(project_id))
        .unwrap();
    let ada = service.create_contributor("Ada").unwrap();
    sink.drain();

    let payload = TaskPayload::from_json(&json!({
        "parent_id": epic.id.to_string(),
        "name": "Survey coast",
        "status": "Completed",
        "priority": "High",
        "story_points": "8",
        "contributor_id": ada.id.to_string(),
        "description": "",
    }))
    .unwrap();
    let outcome = service.apply_update(story.id, &payload).unwrap();

    assert!(outcome.changed);
    let task = outcome.task;
    assert_eq!(task.parent_id, Some(epic.id));
    assert_eq!(task.name, "Survey coast");
    assert!(task.completed);
    assert_eq!(task.priority, Some(Priority::High));
    assert_eq!(task.estimate_type, EstimateType::StoryPoints);
    assert_eq!(task.story_points, Some(8));
    assert_eq!(task.contributor_id, Some(ada.id));
    assert_eq!(task.description, None);

    let names = sink.names();
    assert_eq!(names[0], EventName::TaskParentUpdated);
    assert!(names.contains(&EventName::UpdateContributors));
}

#[test]
fn failing_payload_rolls_back_earlier_fields() {
    let conn = open_db_in_memory().unwrap();
    let sink = Arc::new(MemorySink::new());
    let service = TaskService::new(&conn, sink.clone());
    let project_id = service.create_project("Atlas", None).unwrap().id;
    let story = service
        .create(&NewTask::new("Survey", TaskType::UserStory).in_project(project_id))
        .unwrap();
    sink.drain();

    let payload = TaskPayload::from_json(&json!({
        "name": "Renamed",
        "status": "In Progress",
        "epic_priority": "P0",
    }))
    .unwrap();
    let err = service.apply_update(story.id, &payload).unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Validation {
            field: "epic_priority",
            ..
        }
    ));

    let unchanged = service.get_task(story.id).unwrap();
    assert_eq!(unchanged.name, "Survey");
    assert_eq!(unchanged.status, TaskStatus::NotStarted);
    assert!(sink.drain().is_empty());
}

#[test]
fn payload_estimate_switches_kind() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(&conn, Arc::new(MemorySink::new()));
    let project_id = service.create_project("Atlas", None).unwrap().id;
    let mut new_task = NewTask::new("Survey", TaskType::UserStory).in_project(project_id);
    new_task.story_points = Some(5);
    let story = service.create(&new_task).unwrap();

    let to_time = TaskPayload::from_json(&json!({
        "estimate_type": "time",
        "time_estimate": 120,
    }))
    .unwrap();
    let task = service.apply_update(story.id, &to_time).unwrap().task;
    assert_eq!(task.time_estimate, Some(120));
    assert_eq!(task.story_points, None);

    let empty = TaskPayload::from_json(&json!({ "story_points": "" })).unwrap();
    assert!(empty.is_empty());
    assert!(!service.apply_update(story.id, &empty).unwrap().changed);
}

#[test]
fn create_from_payload_requires_name_and_type() {
    let missing = TaskPayload::from_json(&json!({ "name": "Orphan" })).unwrap();
    assert!(matches!(
        NewTask::from_payload(&missing),
        Err(TaskServiceError::Validation {
            field: "task_type",
            ..
        })
    ));

    let payload = TaskPayload::from_json(&json!({
        "name": "Chart",
        "task_type": "Epic",
        "epic_priority": "P2",
        "project_id": "3",
    }))
    .unwrap();
    let new_task = NewTask::from_payload(&payload).unwrap();
    assert_eq!(new_task.task_type, TaskType::Epic);
    assert_eq!(new_task.project_id, Some(3));
}

#[test]
fn completion_percentage_counts_completed_points() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(&conn, Arc::new(MemorySink::new()));
    let project_id = service.create_project("Atlas", None).unwrap().id;

    let epic = service
        .create(&NewTask::new("Empty", TaskType::Epic).in_project(project_id))
        .unwrap();
    assert_eq!(service.completion_percentage(project_id).unwrap(), 0.0);

    let mut points = Vec::new();
    for (name, value) in [("a", 1), ("b", 2)] {
        let mut story = NewTask::new(name, TaskType::UserStory)
            .in_project(project_id)
            .under(epic.id);
        story.story_points = Some(value);
        points.push(service.create(&story).unwrap().id);
    }
    service
        .update_status(points[0], TaskStatus::Completed)
        .unwrap();
    assert_eq!(service.completion_percentage(project_id).unwrap(), 33.33);

    assert!(matches!(
        service.completion_percentage(404),
        Err(TaskServiceError::NotFound { .. })
    ));
}

#[test]
fn list_filters_and_views() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(&conn, Arc::new(MemorySink::new()));
    let project_id = service.create_project("Atlas", None).unwrap().id;
    let epic = service
        .create(&NewTask::new("Map", TaskType::Epic).in_project(project_id))
        .unwrap();
    let story = service
        .create(
            &NewTask::new("Survey", TaskType::UserStory)
                .in_project(project_id)
                .under(epic.id),
        )
        .unwrap();
    service
        .create(
            &NewTask::new("Measure", TaskType::Subtask)
                .in_project(project_id)
                .under(story.id),
        )
        .unwrap();
    service.update_status(story.id, TaskStatus::Completed).unwrap();

    let without_subtasks = service
        .list_tasks(&TaskListQuery {
            exclude_subtasks: true,
            ..TaskListQuery::for_project(project_id)
        })
        .unwrap();
    assert_eq!(without_subtasks.len(), 2);

    let completed = service
        .list_tasks(&TaskListQuery {
            completion: Some(CompletionFilter::Completed),
            ..TaskListQuery::for_project(project_id)
        })
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, story.id);

    let view = service.get_task_view(story.id).unwrap();
    assert_eq!(view.project.as_deref(), Some("Atlas"));
    assert_eq!(view.contributor_name, "Unassigned");
    assert_eq!(view.story_points, 0);
    assert!(view.completed_date.is_some());
    let epic_view = serde_json::to_value(service.get_task_view(epic.id).unwrap()).unwrap();
    assert_eq!(epic_view["priority"], serde_json::Value::Null);
    assert_eq!(epic_view["epic_priority"], "Unset");
}

#[test]
fn pagination_over_task_views() {
    let conn = open_db_in_memory().unwrap();
    let service = TaskService::new(&conn, Arc::new(MemorySink::new()));
    let project_id = service.create_project("Atlas", None).unwrap().id;
    for index in 0..23 {
        service
            .create(&NewTask::new(format!("Epic {index}"), TaskType::Epic).in_project(project_id))
            .unwrap();
    }

    let views = service
        .list_tasks(&TaskListQuery::for_project(project_id))
        .unwrap();
    let page = paginate(views, 3, 10);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.items[0].name, "Epic 20");

    assert_eq!(
        generate_page_numbers(page.page, page.total_pages, PageWindow::default()),
        vec![Some(1), Some(2), Some(3)]
    );
}
