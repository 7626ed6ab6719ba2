//! Sibling ordering through the content service.

#![allow(clippy::expect_used)] // Test code uses expect for clear failure messages

use kiwiscript_core::policy::Actor;
use kiwiscript_core::{CourseError, LessonId, SectionId};
use kiwiscript_runtime::{ContentService, UpdateLesson, UpdateSection};
use kiwiscript_testing::InMemoryCourseStore;
use kiwiscript_testing::fixtures::{AUTHOR, Course, CourseBuilder, LessonSpec, SectionSpec};
use kiwiscript_testing::invariants::{assert_course_consistent, check_course};
use kiwiscript_testing::properties::{Edit, edits};
use proptest::prelude::*;

fn author() -> Actor {
    Actor::user(AUTHOR)
}

async fn four_lessons(store: &InMemoryCourseStore) -> Course {
    let mut section = SectionSpec::published("Basics");
    for seconds in [60, 120, 180, 240] {
        section = section.lesson(LessonSpec::video(seconds));
    }
    CourseBuilder::new("rust", "ownership")
        .section(section)
        .build(store)
        .await
        .expect("build course")
}

fn lesson_ids(course: &Course, section: usize) -> Vec<LessonId> {
    course.sections[section].1.iter().map(|l| l.id).collect()
}

fn lesson_positions(course: &Course, section: usize) -> Vec<i32> {
    course.sections[section].1.iter().map(|l| l.position).collect()
}

#[tokio::test]
async fn appended_lessons_take_the_next_position() {
    let store = InMemoryCourseStore::new();
    let course = four_lessons(&store).await;
    assert_eq!(lesson_positions(&course, 0), vec![1, 2, 3, 4]);

    let content = ContentService::new(store.clone());
    let lesson = content
        .create_lesson(author(), &course.section_path(0), "Fifth")
        .await
        .expect("create lesson");
    assert_eq!(lesson.position, 5);
    assert!(!lesson.is_published);
}

#[tokio::test]
async fn moving_up_shifts_the_skipped_siblings_down() {
    let store = InMemoryCourseStore::new();
    let course = four_lessons(&store).await;
    let ids = lesson_ids(&course, 0);
    let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);

    let content = ContentService::new(store.clone());
    let moved = content
        .update_lesson(
            author(),
            &course.lesson_path(0, 3),
            UpdateLesson {
                title: "Moved".to_string(),
                position: 2,
            },
        )
        .await
        .expect("move lesson");
    assert_eq!(moved.position, 2);
    assert_eq!(moved.title, "Moved");

    let course = course.reload(&store).await.expect("reload");
    assert_eq!(lesson_ids(&course, 0), vec![a, d, b, c]);
    assert_eq!(lesson_positions(&course, 0), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn moving_down_shifts_the_skipped_siblings_up() {
    let store = InMemoryCourseStore::new();
    let course = four_lessons(&store).await;
    let ids = lesson_ids(&course, 0);
    let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);

    let content = ContentService::new(store.clone());
    content
        .update_lesson(
            author(),
            &course.lesson_path(0, 0),
            UpdateLesson {
                title: "First".to_string(),
                position: 3,
            },
        )
        .await
        .expect("move lesson");

    let course = course.reload(&store).await.expect("reload");
    assert_eq!(lesson_ids(&course, 0), vec![b, c, a, d]);
    assert_course_consistent(&store, course.series.id).await;
}

#[tokio::test]
async fn position_zero_or_current_only_updates_details() {
    let store = InMemoryCourseStore::new();
    let course = four_lessons(&store).await;
    let before = lesson_ids(&course, 0);
    let content = ContentService::new(store.clone());

    for position in [0, 2] {
        let lesson = content
            .update_lesson(
                author(),
                &course.lesson_path(0, 1),
                UpdateLesson {
                    title: format!("Renamed {position}"),
                    position,
                },
            )
            .await
            .expect("update lesson");
        assert_eq!(lesson.position, 2);
    }

    let course = course.reload(&store).await.expect("reload");
    assert_eq!(lesson_ids(&course, 0), before);
    assert_eq!(course.sections[0].1[1].title, "Renamed 2");
}

#[tokio::test]
async fn out_of_range_positions_are_rejected_without_changes() {
    let store = InMemoryCourseStore::new();
    let course = four_lessons(&store).await;
    let content = ContentService::new(store.clone());

    for position in [5, -1] {
        let result = content
            .update_lesson(
                author(),
                &course.lesson_path(0, 0),
                UpdateLesson {
                    title: "Nope".to_string(),
                    position,
                },
            )
            .await;
        assert_eq!(
            result,
            Err(CourseError::validation("Position is out of range"))
        );
    }

    let reloaded = course.reload(&store).await.expect("reload");
    assert_eq!(reloaded.sections, course.sections);
}

#[tokio::test]
async fn deleting_closes_the_gap() {
    let store = InMemoryCourseStore::new();
    let course = four_lessons(&store).await;
    let ids = lesson_ids(&course, 0);
    let (a, c, d) = (ids[0], ids[2], ids[3]);

    let content = ContentService::new(store.clone());
    content
        .delete_lesson(author(), &course.lesson_path(0, 1))
        .await
        .expect("delete lesson");

    let course = course.reload(&store).await.expect("reload");
    assert_eq!(lesson_ids(&course, 0), vec![a, c, d]);
    assert_eq!(lesson_positions(&course, 0), vec![1, 2, 3]);
    assert_course_consistent(&store, course.series.id).await;
}

#[tokio::test]
async fn sections_are_ordered_the_same_way() {
    let store = InMemoryCourseStore::new();
    let course = CourseBuilder::new("rust", "traits")
        .section(SectionSpec::published("One").lesson(LessonSpec::video(60)))
        .section(SectionSpec::published("Two").lesson(LessonSpec::video(60)))
        .section(SectionSpec::draft("Three").lesson(LessonSpec::video(60)))
        .build(&store)
        .await
        .expect("build course");
    let ids: Vec<SectionId> = course.sections.iter().map(|(s, _)| s.id).collect();

    let content = ContentService::new(store.clone());
    content
        .update_section(
            author(),
            &course.section_path(2),
            UpdateSection {
                title: "Three".to_string(),
                description: "Moved first".to_string(),
                position: 1,
            },
        )
        .await
        .expect("move section");
    let moved = course.reload(&store).await.expect("reload");
    let order: Vec<SectionId> = moved.sections.iter().map(|(s, _)| s.id).collect();
    assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
    assert_eq!(moved.sections[0].0.description, "Moved first");

    content
        .delete_section(author(), &moved.section_path(1))
        .await
        .expect("delete section");
    let after = course.reload(&store).await.expect("reload");
    let order: Vec<SectionId> = after.sections.iter().map(|(s, _)| s.id).collect();
    assert_eq!(order, vec![ids[2], ids[1]]);
    assert_course_consistent(&store, course.series.id).await;
}

#[tokio::test]
async fn paths_must_match_the_parent() {
    let store = InMemoryCourseStore::new();
    let course = CourseBuilder::new("rust", "paths")
        .section(SectionSpec::published("One").lesson(LessonSpec::video(60)))
        .section(SectionSpec::published("Two").lesson(LessonSpec::video(60)))
        .build(&store)
        .await
        .expect("build course");
    let content = ContentService::new(store.clone());

    let lesson_of_two = course.sections[1].1[0].id;
    let wrong = course.section_path(0).lesson(lesson_of_two);
    let result = content
        .update_lesson(
            author(),
            &wrong,
            UpdateLesson {
                title: "x".to_string(),
                position: 0,
            },
        )
        .await;
    assert_eq!(result, Err(CourseError::NotFound));
}

/// Apply `edit` to the first Section of `course`, ignoring rejected edits.
async fn apply(content: &ContentService<InMemoryCourseStore>, course: &Course, edit: &Edit) {
    let lessons = &course.sections[0].1;
    let count = lessons.len();
    let section_path = course.section_path(0);
    let result = match *edit {
        Edit::Add(seconds) => {
            let lesson = content
                .create_lesson(author(), &section_path, "Added")
                .await
                .expect("create lesson");
            content
                .create_video(author(), &section_path.lesson(lesson.id), "https://v", seconds)
                .await
                .map(drop)
        }
        _ if count == 0 => Ok(()),
        Edit::Move { index, target } => {
            let target = i32::try_from(target % (count + 1)).expect("small position");
            content
                .update_lesson(
                    author(),
                    &course.lesson_path(0, index % count),
                    UpdateLesson {
                        title: "Moved".to_string(),
                        position: target,
                    },
                )
                .await
                .map(drop)
        }
        Edit::Delete(index) => {
            content
                .delete_lesson(author(), &course.lesson_path(0, index % count))
                .await
        }
        Edit::TogglePublished(index) => {
            let lesson = &lessons[index % count];
            content
                .toggle_lesson_published(
                    author(),
                    &course.lesson_path(0, index % count),
                    !lesson.is_published,
                )
                .await
                .map(drop)
        }
        Edit::SetVideo { index, seconds } => {
            content
                .update_video(author(), &course.lesson_path(0, index % count), "https://v", seconds)
                .await
                .map(drop)
        }
    };
    result.expect("edit should be accepted");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn any_edit_sequence_keeps_positions_dense_and_aggregates_exact(sequence in edits(12)) {
        tokio_test::block_on(async {
            let store = InMemoryCourseStore::new();
            let mut course = CourseBuilder::new("rust", "fuzz")
                .section(SectionSpec::published("Only").lesson(LessonSpec::video(30)))
                .build(&store)
                .await
                .expect("build course");
            let content = ContentService::new(store.clone());

            for edit in &sequence {
                apply(&content, &course, edit).await;
                course = course.reload(&store).await.expect("reload");
                let violations = check_course(&store, course.series.id).await.expect("check");
                assert!(violations.is_empty(), "after {edit:?}: {violations:?}");
            }
        });
    }
}
