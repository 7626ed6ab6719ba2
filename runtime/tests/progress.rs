//! Progress cascade: views, completion, certificates and reversal.

#![allow(clippy::expect_used)] // Test code uses expect for clear failure messages

use chrono::Duration;
use futures::future::join_all;
use kiwiscript_core::CourseError;
use kiwiscript_core::environment::Clock;
use kiwiscript_core::policy::Actor;
use kiwiscript_core::progress::ProgressState;
use kiwiscript_core::store::{CourseStore, CourseTransaction};
use kiwiscript_runtime::{CompletedLesson, ContentService, LessonPath, ProgressService};
use kiwiscript_testing::fixtures::{AUTHOR, STUDENT, Course, CourseBuilder, LessonSpec, SectionSpec};
use kiwiscript_testing::invariants::{assert_progress_consistent, check_progress};
use kiwiscript_testing::mocks::epoch;
use kiwiscript_testing::properties::{completion_order, section_sizes};
use kiwiscript_testing::{InMemoryCourseStore, ManualClock, test_clock};
use proptest::prelude::*;

/// One Section with a 60s Article Lesson and a 120s Video Lesson.
async fn two_lesson_course(store: &InMemoryCourseStore) -> Course {
    CourseBuilder::new("rust", "basics")
        .section(
            SectionSpec::published("Intro")
                .lesson(LessonSpec::article(60))
                .lesson(LessonSpec::video(120)),
        )
        .build(store)
        .await
        .expect("build course")
}

async fn view_and_complete<C: Clock>(
    progress: &ProgressService<InMemoryCourseStore, C>,
    path: &LessonPath,
) -> CompletedLesson {
    progress
        .view_lesson(STUDENT, path)
        .await
        .expect("view lesson");
    progress
        .complete_lesson(STUDENT, path)
        .await
        .expect("complete lesson")
}

#[tokio::test]
async fn completing_every_lesson_completes_the_series_and_issues_a_certificate() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), test_clock());

    let first = view_and_complete(&progress, &course.lesson_path(0, 0)).await;
    assert_eq!(first.progress.completed_at, Some(epoch()));
    assert_eq!(first.certificate, None);

    let section = progress
        .find_section_progress(STUDENT, &course.section_path(0))
        .await
        .expect("section progress");
    assert_eq!(section.completed_lessons, 1);
    assert_eq!(section.state(), ProgressState::Viewed);
    let series = progress
        .find_series_progress(STUDENT, &course.path)
        .await
        .expect("series progress");
    assert_eq!(series.completed_lessons, 1);
    assert_eq!(series.completed_sections, 0);

    let second = view_and_complete(&progress, &course.lesson_path(0, 1)).await;
    let certificate = second.certificate.expect("certificate on completion");
    assert_eq!(certificate.user_id, STUDENT);
    assert_eq!(certificate.series_id, course.series.id);
    assert_eq!(certificate.series_slug, "basics");
    assert_eq!(certificate.language_slug, "rust");
    assert_eq!(certificate.lessons, 2);
    assert_eq!(certificate.read_time_seconds, 60);
    assert_eq!(certificate.watch_time_seconds, 120);
    assert_eq!(certificate.completed_at, epoch());

    let series = progress
        .find_series_progress(STUDENT, &course.path)
        .await
        .expect("series progress");
    assert_eq!(series.completed_sections, 1);
    assert_eq!(series.completed_lessons, 2);
    assert_eq!(series.state(), ProgressState::Completed);

    let language = progress
        .find_language_progress(STUDENT, "rust")
        .await
        .expect("language progress");
    assert_eq!(language.completed_series, 1);
    assert_progress_consistent(&store, STUDENT, course.series.id).await;
}

#[tokio::test]
async fn completing_twice_is_a_no_op() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), ManualClock::default());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;
    let done = view_and_complete(&progress, &course.lesson_path(0, 1)).await;
    assert!(done.certificate.is_some());

    let again = progress
        .complete_lesson(STUDENT, &course.lesson_path(0, 1))
        .await
        .expect("complete again");
    assert_eq!(again.certificate, None);
    assert_eq!(again.progress.completed_at, done.progress.completed_at);

    let series = progress
        .find_series_progress(STUDENT, &course.path)
        .await
        .expect("series progress");
    assert_eq!(series.completed_lessons, 2);
    assert_progress_consistent(&store, STUDENT, course.series.id).await;
}

#[tokio::test]
async fn completion_requires_a_prior_view() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), test_clock());

    let result = progress
        .complete_lesson(STUDENT, &course.lesson_path(0, 0))
        .await;
    assert_eq!(result, Err(CourseError::NotFound));
    assert_eq!(
        progress.find_series_progress(STUDENT, &course.path).await,
        Err(CourseError::NotFound)
    );
}

#[tokio::test]
async fn unpublished_content_is_invisible_to_students() {
    let store = InMemoryCourseStore::new();
    let course = CourseBuilder::new("rust", "drafts")
        .section(
            SectionSpec::published("Open")
                .lesson(LessonSpec::video(60))
                .lesson(LessonSpec::video(60).draft()),
        )
        .section(SectionSpec::draft("Closed").lesson(LessonSpec::video(60)))
        .build(&store)
        .await
        .expect("build course");
    let progress = ProgressService::new(store.clone(), test_clock());

    assert_eq!(
        progress
            .view_lesson(STUDENT, &course.lesson_path(0, 1))
            .await,
        Err(CourseError::NotFound)
    );
    assert_eq!(
        progress
            .view_lesson(STUDENT, &course.lesson_path(1, 0))
            .await,
        Err(CourseError::NotFound)
    );
    assert_eq!(
        progress
            .view_section(STUDENT, &course.section_path(1))
            .await,
        Err(CourseError::NotFound)
    );

    let draft_series = CourseBuilder::new("rust", "unreleased")
        .section(SectionSpec::published("Ready").lesson(LessonSpec::video(60)))
        .draft()
        .build(&store)
        .await
        .expect("build course");
    assert_eq!(
        progress.view_series(STUDENT, &draft_series.path).await,
        Err(CourseError::NotFound)
    );
    assert_eq!(
        progress
            .view_lesson(STUDENT, &draft_series.lesson_path(0, 0))
            .await,
        Err(CourseError::NotFound)
    );
}

#[tokio::test]
async fn views_create_ancestors_and_touch_existing_rows() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let clock = ManualClock::default();
    let progress = ProgressService::new(store.clone(), clock.clone());

    let (_, lesson) = progress
        .view_lesson(STUDENT, &course.lesson_path(0, 0))
        .await
        .expect("view lesson");
    assert_eq!(lesson.viewed_at, epoch());
    assert_eq!(lesson.state(), ProgressState::Viewed);
    let language = progress
        .find_language_progress(STUDENT, "rust")
        .await
        .expect("language progress created");
    assert_eq!(language.completed_series, 0);

    clock.advance(Duration::minutes(5));
    let (series, series_progress) = progress
        .view_series(STUDENT, &course.path)
        .await
        .expect("view series");
    assert_eq!(series.id, course.series.id);
    assert_eq!(series_progress.viewed_at, epoch() + Duration::minutes(5));
    assert_eq!(series_progress.language_progress_id, language.id);

    let (_, again) = progress
        .view_lesson(STUDENT, &course.lesson_path(0, 0))
        .await
        .expect("view lesson again");
    assert_eq!(again.id, lesson.id);
    assert_eq!(again.viewed_at, epoch() + Duration::minutes(5));

    let (language_row, language_progress) = progress
        .view_language(STUDENT, "rust")
        .await
        .expect("view language");
    assert_eq!(language_row.slug, "rust");
    assert_eq!(language_progress.id, language.id);
}

#[tokio::test]
async fn deleting_a_completed_lesson_reverses_the_cascade() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), test_clock());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;
    let done = view_and_complete(&progress, &course.lesson_path(0, 1)).await;
    let certificate = done.certificate.expect("certificate");

    progress
        .delete_lesson_progress(STUDENT, &course.lesson_path(0, 1))
        .await
        .expect("delete lesson progress");

    let section = progress
        .find_section_progress(STUDENT, &course.section_path(0))
        .await
        .expect("section progress");
    assert_eq!(section.completed_lessons, 1);
    assert_eq!(section.completed_at, None);
    let series = progress
        .find_series_progress(STUDENT, &course.path)
        .await
        .expect("series progress");
    assert_eq!(series.completed_lessons, 1);
    assert_eq!(series.completed_sections, 0);
    assert_eq!(series.completed_at, None);
    let language = progress
        .find_language_progress(STUDENT, "rust")
        .await
        .expect("language progress");
    assert_eq!(language.completed_series, 0);
    assert_progress_consistent(&store, STUDENT, course.series.id).await;

    // Certificates are never retracted, and completing again does not issue another.
    let mut tx = store.begin().await.expect("begin");
    assert_eq!(
        tx.find_certificate_for(STUDENT, course.series.id).await,
        Ok(Some(certificate.clone()))
    );
    tx.rollback().await.expect("rollback");

    let redone = view_and_complete(&progress, &course.lesson_path(0, 1)).await;
    assert_eq!(redone.certificate, Some(certificate));
    assert_progress_consistent(&store, STUDENT, course.series.id).await;
}

#[tokio::test]
async fn deleting_a_viewed_lesson_leaves_counters_alone() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), test_clock());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;
    progress
        .view_lesson(STUDENT, &course.lesson_path(0, 1))
        .await
        .expect("view lesson");
    progress
        .delete_lesson_progress(STUDENT, &course.lesson_path(0, 1))
        .await
        .expect("delete lesson progress");

    assert_eq!(
        progress
            .find_lesson_progress(STUDENT, &course.lesson_path(0, 1))
            .await,
        Err(CourseError::NotFound)
    );
    let series = progress
        .find_series_progress(STUDENT, &course.path)
        .await
        .expect("series progress");
    assert_eq!(series.completed_lessons, 1);
    assert_progress_consistent(&store, STUDENT, course.series.id).await;
}

#[tokio::test]
async fn deleting_section_and_series_progress_cascades_down_and_reverses_up() {
    let store = InMemoryCourseStore::new();
    let course = CourseBuilder::new("rust", "two-sections")
        .section(SectionSpec::published("One").lesson(LessonSpec::video(60)))
        .section(SectionSpec::published("Two").lesson(LessonSpec::video(60)))
        .build(&store)
        .await
        .expect("build course");
    let progress = ProgressService::new(store.clone(), test_clock());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;
    let done = view_and_complete(&progress, &course.lesson_path(1, 0)).await;
    assert!(done.certificate.is_some());

    progress
        .delete_section_progress(STUDENT, &course.section_path(0))
        .await
        .expect("delete section progress");
    assert_eq!(
        progress
            .find_lesson_progress(STUDENT, &course.lesson_path(0, 0))
            .await,
        Err(CourseError::NotFound)
    );
    let series = progress
        .find_series_progress(STUDENT, &course.path)
        .await
        .expect("series progress");
    assert_eq!(series.completed_sections, 1);
    assert_eq!(series.completed_lessons, 1);
    assert_eq!(series.completed_at, None);
    assert_eq!(
        progress
            .find_language_progress(STUDENT, "rust")
            .await
            .map(|language| language.completed_series),
        Ok(0)
    );
    assert_progress_consistent(&store, STUDENT, course.series.id).await;

    progress
        .delete_series_progress(STUDENT, &course.path)
        .await
        .expect("delete series progress");
    assert_eq!(
        progress
            .find_section_progress(STUDENT, &course.section_path(1))
            .await,
        Err(CourseError::NotFound)
    );

    progress
        .delete_language_progress(STUDENT, "rust")
        .await
        .expect("delete language progress");
    assert_eq!(
        progress.find_language_progress(STUDENT, "rust").await,
        Err(CourseError::NotFound)
    );
    assert_eq!(
        progress.delete_language_progress(STUDENT, "rust").await,
        Err(CourseError::NotFound)
    );
}

#[tokio::test]
async fn deleting_completed_series_progress_decrements_the_language() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), test_clock());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;
    view_and_complete(&progress, &course.lesson_path(0, 1)).await;
    progress
        .delete_series_progress(STUDENT, &course.path)
        .await
        .expect("delete series progress");

    let language = progress
        .find_language_progress(STUDENT, "rust")
        .await
        .expect("language progress survives");
    assert_eq!(language.completed_series, 0);
}

#[tokio::test]
async fn concurrent_completions_issue_exactly_one_certificate() {
    let store = InMemoryCourseStore::new();
    let mut section = SectionSpec::published("Many");
    for _ in 0..6 {
        section = section.lesson(LessonSpec::video(30));
    }
    let course = CourseBuilder::new("rust", "race")
        .section(section)
        .build(&store)
        .await
        .expect("build course");
    let progress = ProgressService::new(store.clone(), test_clock());

    for path in course.lesson_paths() {
        progress
            .view_lesson(STUDENT, &path)
            .await
            .expect("view lesson");
    }

    let handles = course.lesson_paths().into_iter().map(|path| {
        let progress = progress.clone();
        tokio::spawn(async move { progress.complete_lesson(STUDENT, &path).await })
    });
    let outcomes: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("complete lesson"))
        .collect();

    let certificates = outcomes
        .iter()
        .filter(|outcome| outcome.certificate.is_some())
        .count();
    assert_eq!(certificates, 1);

    let mut tx = store.begin().await.expect("begin");
    assert_eq!(tx.count_certificates(STUDENT).await, Ok(1));
    tx.rollback().await.expect("rollback");
    assert_progress_consistent(&store, STUDENT, course.series.id).await;
}

#[tokio::test]
async fn a_failed_cascade_rolls_everything_back() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), test_clock());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;
    progress
        .view_lesson(STUDENT, &course.lesson_path(0, 1))
        .await
        .expect("view lesson");

    store.fail_on("increment_series_progress").await;
    let result = progress
        .complete_lesson(STUDENT, &course.lesson_path(0, 1))
        .await;
    assert!(matches!(result, Err(CourseError::Unknown(_))));
    store.clear_failure().await;

    let lesson = progress
        .find_lesson_progress(STUDENT, &course.lesson_path(0, 1))
        .await
        .expect("lesson progress");
    assert_eq!(lesson.completed_at, None);
    let section = progress
        .find_section_progress(STUDENT, &course.section_path(0))
        .await
        .expect("section progress");
    assert_eq!(section.completed_lessons, 1);
    assert_eq!(section.completed_at, None);
    assert_progress_consistent(&store, STUDENT, course.series.id).await;

    let retried = progress
        .complete_lesson(STUDENT, &course.lesson_path(0, 1))
        .await
        .expect("retry");
    assert!(retried.certificate.is_some());
}

#[tokio::test]
async fn progress_on_one_series_does_not_leak_into_another() {
    let store = InMemoryCourseStore::new();
    let first = two_lesson_course(&store).await;
    let second = CourseBuilder::new("rust", "advanced")
        .section(SectionSpec::published("Deep").lesson(LessonSpec::video(60)))
        .build(&store)
        .await
        .expect("build course");
    let progress = ProgressService::new(store.clone(), test_clock());

    view_and_complete(&progress, &second.lesson_path(0, 0)).await;
    view_and_complete(&progress, &first.lesson_path(0, 0)).await;

    let first_series = progress
        .find_series_progress(STUDENT, &first.path)
        .await
        .expect("series progress");
    assert_eq!(first_series.completed_lessons, 1);
    assert_eq!(
        progress
            .find_language_progress(STUDENT, "rust")
            .await
            .map(|language| language.completed_series),
        Ok(1)
    );
    assert_progress_consistent(&store, STUDENT, first.series.id).await;
    assert_progress_consistent(&store, STUDENT, second.series.id).await;
}

#[tokio::test]
async fn lessons_published_after_completion_do_not_issue_again() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), test_clock());
    let content = ContentService::new(store.clone());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;
    view_and_complete(&progress, &course.lesson_path(0, 1)).await;

    let extra = content
        .create_lesson(Actor::user(AUTHOR), &course.section_path(0), "Bonus")
        .await
        .expect("create lesson");
    let extra_path = course.section_path(0).lesson(extra.id);
    content
        .create_video(Actor::user(AUTHOR), &extra_path, "https://v", 60)
        .await
        .expect("create video");
    content
        .toggle_lesson_published(Actor::user(AUTHOR), &extra_path, true)
        .await
        .expect("publish lesson");

    let completed = view_and_complete(&progress, &extra_path).await;
    assert_eq!(completed.certificate, None);
    let section = progress
        .find_section_progress(STUDENT, &course.section_path(0))
        .await
        .expect("section progress");
    assert_eq!(section.completed_lessons, 3);
    assert!(section.completed_at.is_some());
}

#[tokio::test]
async fn unviewed_lessons_stay_while_the_section_has_students() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), test_clock());
    let content = ContentService::new(store.clone());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;

    let unviewed = course.lesson_path(0, 1);
    assert_eq!(
        content
            .toggle_lesson_published(Actor::user(AUTHOR), &unviewed, false)
            .await,
        Err(CourseError::conflict("Section has students"))
    );
    assert_eq!(
        content.delete_lesson(Actor::user(AUTHOR), &unviewed).await,
        Err(CourseError::conflict("Section has students"))
    );
    let reloaded = course.reload(&store).await.expect("reload");
    assert_eq!(reloaded.sections, course.sections);

    let completed = view_and_complete(&progress, &unviewed).await;
    assert!(completed.certificate.is_some());
    let section = progress
        .find_section_progress(STUDENT, &course.section_path(0))
        .await
        .expect("section progress");
    assert!(section.completed_at.is_some());
    assert_progress_consistent(&store, STUDENT, course.series.id).await;
}

#[tokio::test]
async fn unviewed_sections_stay_while_the_series_has_students() {
    let store = InMemoryCourseStore::new();
    let course = CourseBuilder::new("rust", "chapters")
        .section(SectionSpec::published("One").lesson(LessonSpec::video(60)))
        .section(SectionSpec::published("Two").lesson(LessonSpec::video(90)))
        .build(&store)
        .await
        .expect("build course");
    let progress = ProgressService::new(store.clone(), test_clock());
    let content = ContentService::new(store.clone());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;

    let unviewed = course.section_path(1);
    assert_eq!(
        content
            .toggle_section_published(Actor::user(AUTHOR), &unviewed, false)
            .await,
        Err(CourseError::conflict("Series has students"))
    );
    assert_eq!(
        content.delete_section(Actor::user(AUTHOR), &unviewed).await,
        Err(CourseError::conflict("Series has students"))
    );
    // Its only Lesson would leave a published Section nobody can complete.
    assert_eq!(
        content
            .toggle_lesson_published(Actor::user(AUTHOR), &course.lesson_path(1, 0), false)
            .await,
        Err(CourseError::conflict("Series has students"))
    );
    assert_eq!(
        content
            .delete_lesson(Actor::user(AUTHOR), &course.lesson_path(1, 0))
            .await,
        Err(CourseError::conflict("Series has students"))
    );
    let reloaded = course.reload(&store).await.expect("reload");
    assert_eq!(reloaded.series, course.series);
    assert_eq!(reloaded.sections, course.sections);

    let completed = view_and_complete(&progress, &course.lesson_path(1, 0)).await;
    assert!(completed.certificate.is_some());
    let series = progress
        .find_series_progress(STUDENT, &course.path)
        .await
        .expect("series progress");
    assert_eq!(series.completed_sections, 2);
    assert!(series.completed_at.is_some());
    assert_progress_consistent(&store, STUDENT, course.series.id).await;
}

#[tokio::test]
async fn shrinking_is_allowed_again_once_progress_is_reset() {
    let store = InMemoryCourseStore::new();
    let course = two_lesson_course(&store).await;
    let progress = ProgressService::new(store.clone(), test_clock());
    let content = ContentService::new(store.clone());

    view_and_complete(&progress, &course.lesson_path(0, 0)).await;
    progress
        .delete_series_progress(STUDENT, &course.path)
        .await
        .expect("reset series");

    content
        .toggle_lesson_published(Actor::user(AUTHOR), &course.lesson_path(0, 1), false)
        .await
        .expect("unpublish lesson");
    let reloaded = course.reload(&store).await.expect("reload");
    assert_eq!(reloaded.sections[0].0.lessons_count, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn completing_then_resetting_restores_the_start(
        (sizes, order, resets) in section_sizes(3, 3).prop_flat_map(|sizes| {
            let total: usize = sizes.iter().sum();
            (Just(sizes), completion_order(total), completion_order(total))
        })
    ) {
        tokio_test::block_on(async {
            let store = InMemoryCourseStore::new();
            let mut builder = CourseBuilder::new("rust", "walk");
            for (index, size) in sizes.iter().enumerate() {
                let mut section = SectionSpec::published(&format!("Section {index}"));
                for _ in 0..*size {
                    section = section.lesson(LessonSpec::video(60));
                }
                builder = builder.section(section);
            }
            let course = builder.build(&store).await.expect("build course");
            let paths = course.lesson_paths();
            let progress = ProgressService::new(store.clone(), test_clock());

            let mut certificates = 0;
            for &index in &order {
                let outcome = view_and_complete(&progress, &paths[index]).await;
                certificates += usize::from(outcome.certificate.is_some());
                let violations = check_progress(&store, STUDENT, course.series.id)
                    .await
                    .expect("check");
                assert!(violations.is_empty(), "{violations:?}");
            }
            assert_eq!(certificates, 1);

            for &index in &resets {
                progress
                    .delete_lesson_progress(STUDENT, &paths[index])
                    .await
                    .expect("delete lesson progress");
                let violations = check_progress(&store, STUDENT, course.series.id)
                    .await
                    .expect("check");
                assert!(violations.is_empty(), "{violations:?}");
            }

            let series = progress
                .find_series_progress(STUDENT, &course.path)
                .await
                .expect("series progress");
            assert_eq!(series.completed_lessons, 0);
            assert_eq!(series.completed_sections, 0);
            assert_eq!(series.completed_at, None);
            let language = progress
                .find_language_progress(STUDENT, "rust")
                .await
                .expect("language progress");
            assert_eq!(language.completed_series, 0);
        });
    }
}
