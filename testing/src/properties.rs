//! Proptest strategies for content edits and progress walks.
//!
//! Indices in generated values are reduced modulo the current number of siblings when
//! applied, so any sequence is valid against any course shape.

use crate::fixtures::LessonSpec;
use proptest::prelude::*;

/// One edit to the Lessons of a Section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    /// Append a Lesson with a Video of the given duration
    Add(i32),
    /// Move the Lesson at `index` to `target` (`0` means stay)
    Move {
        /// Lesson to move, modulo the count
        index: usize,
        /// Target position, modulo `count + 1`
        target: usize,
    },
    /// Delete the Lesson at `index`
    Delete(usize),
    /// Flip publication of the Lesson at `index`
    TogglePublished(usize),
    /// Replace the Video of the Lesson at `index`
    SetVideo {
        /// Lesson to edit, modulo the count
        index: usize,
        /// New duration
        seconds: i32,
    },
}

/// Positive video durations, small enough to add up without overflow.
pub fn watch_seconds() -> impl Strategy<Value = i32> {
    1..=3_600i32
}

/// A single [`Edit`].
pub fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => watch_seconds().prop_map(Edit::Add),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(index, target)| Edit::Move { index, target }),
        1 => any::<usize>().prop_map(Edit::Delete),
        2 => any::<usize>().prop_map(Edit::TogglePublished),
        1 => (any::<usize>(), watch_seconds()).prop_map(|(index, seconds)| Edit::SetVideo { index, seconds }),
    ]
}

/// Up to `max_len` edits.
pub fn edits(max_len: usize) -> impl Strategy<Value = Vec<Edit>> {
    prop::collection::vec(edit(), 0..=max_len)
}

/// A Lesson with an Article, a Video or both, published or not.
pub fn lesson_spec() -> impl Strategy<Value = LessonSpec> {
    (
        prop::option::of((1..=60i32).prop_map(|minutes| minutes * 3)),
        prop::option::of(watch_seconds()),
        any::<bool>(),
    )
        .prop_map(|(read, watch, publish)| {
            let mut spec = match (read, watch) {
                (Some(read), watch) => LessonSpec {
                    video_seconds: watch,
                    ..LessonSpec::article(read)
                },
                (None, Some(watch)) => LessonSpec::video(watch),
                (None, None) => LessonSpec::video(60),
            };
            spec.publish = publish;
            spec
        })
}

/// Lesson counts for `sections` Sections, each between 1 and `max_lessons`.
pub fn section_sizes(sections: usize, max_lessons: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1..=max_lessons, 1..=sections)
}

/// A permutation of `0..len`, used as an order to complete Lessons in.
pub fn completion_order(len: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..len).collect::<Vec<_>>()).prop_shuffle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    proptest! {
        #[test]
        fn generated_lessons_have_content(spec in lesson_spec()) {
            prop_assert!(spec.article.is_some() || spec.video_seconds.is_some());
        }

        #[test]
        fn completion_order_is_a_permutation(order in (0..20usize).prop_flat_map(completion_order)) {
            let mut sorted = order.clone();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (0..order.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn edits_respect_max_len() {
        let mut runner = TestRunner::default();
        for _ in 0..32 {
            let tree = edits(5).new_tree(&mut runner);
            assert!(tree.is_ok_and(|tree| tree.current().len() <= 5));
        }
    }
}
