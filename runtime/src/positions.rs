//! Position Manager.
//!
//! Keeps the `position` of siblings under one parent a dense permutation of `1..=N`.
//! Planning is pure; [`apply_move`] and [`close_gap`] issue the resulting shifts inside the
//! caller's transaction, which must already hold the parent's row lock.

use crate::metrics::{POSITIONS_SHIFTED, counter};
use kiwiscript_core::content::{Sibling, SiblingScope};
use kiwiscript_core::store::CourseTransaction;
use kiwiscript_core::{CourseError, Result};

/// What a move request turns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovePlan {
    /// Target is unset (0) or the current position; only details change.
    Stay,
    /// Shift the siblings in `from..=to` by `delta`, then write `target`.
    Shift {
        /// First shifted position
        from: i32,
        /// Last shifted position
        to: i32,
        /// `-1` when moving down the list, `+1` when moving up
        delta: i32,
        /// Final position of the moved sibling
        target: i32,
    },
}

/// Position for a sibling appended after `count` existing ones.
#[must_use]
pub const fn append_position(count: i32) -> i32 {
    count + 1
}

/// Plan moving a sibling from `current` to `target` among `count` siblings.
///
/// # Errors
///
/// Returns [`CourseError::Validation`] if `target` is outside `0..=count`.
///
/// # Examples
///
/// ```
/// # use kiwiscript_runtime::positions::{plan_move, MovePlan};
/// assert_eq!(plan_move(4, 2, 4).ok(), Some(MovePlan::Shift { from: 2, to: 3, delta: 1, target: 2 }));
/// assert_eq!(plan_move(2, 0, 4).ok(), Some(MovePlan::Stay));
/// assert!(plan_move(2, 5, 4).is_err());
/// ```
pub fn plan_move(current: i32, target: i32, count: i32) -> Result<MovePlan> {
    if target < 0 || target > count {
        return Err(CourseError::validation("Position is out of range"));
    }
    if target == 0 || target == current {
        return Ok(MovePlan::Stay);
    }
    Ok(if current < target {
        MovePlan::Shift {
            from: current + 1,
            to: target,
            delta: -1,
            target,
        }
    } else {
        MovePlan::Shift {
            from: target,
            to: current - 1,
            delta: 1,
            target,
        }
    })
}

/// Execute `plan` for `sibling` under `scope`.
///
/// # Errors
///
/// Propagates store failures; the caller rolls the transaction back.
pub async fn apply_move<T: CourseTransaction>(
    tx: &mut T,
    scope: SiblingScope,
    sibling: Sibling,
    plan: MovePlan,
) -> Result<()> {
    let MovePlan::Shift {
        from,
        to,
        delta,
        target,
    } = plan
    else {
        return Ok(());
    };

    let shifted = tx.shift_positions(scope, from, to, delta).await?;
    tx.set_position(sibling, target).await?;
    counter!(POSITIONS_SHIFTED).increment(shifted);
    tracing::debug!(?scope, ?sibling, from, to, delta, target, shifted, "Moved sibling");
    Ok(())
}

/// Close the slot left by a deleted sibling at `position` among `count` siblings
/// (counted before the delete).
///
/// # Errors
///
/// Propagates store failures; the caller rolls the transaction back.
pub async fn close_gap<T: CourseTransaction>(
    tx: &mut T,
    scope: SiblingScope,
    position: i32,
    count: i32,
) -> Result<()> {
    if position >= count {
        return Ok(());
    }
    let shifted = tx.shift_positions(scope, position + 1, count, -1).await?;
    counter!(POSITIONS_SHIFTED).increment(shifted);
    tracing::debug!(?scope, position, shifted, "Closed position gap");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Apply a plan to a plain list of (id, position) pairs.
    fn simulate(positions: &mut [(usize, i32)], moved: usize, plan: MovePlan) {
        if let MovePlan::Shift {
            from,
            to,
            delta,
            target,
        } = plan
        {
            for (id, position) in positions.iter_mut() {
                if *id != moved && (from..=to).contains(position) {
                    *position += delta;
                }
            }
            positions[moved].1 = target;
        }
    }

    fn order(positions: &[(usize, i32)]) -> Vec<usize> {
        let mut sorted = positions.to_vec();
        sorted.sort_by_key(|(_, p)| *p);
        sorted.into_iter().map(|(id, _)| id).collect()
    }

    #[test]
    fn moving_last_to_second_shifts_middle_up() {
        // A, B, C, D
        let mut positions = vec![(0, 1), (1, 2), (2, 3), (3, 4)];
        let plan = plan_move(4, 2, 4).unwrap_or(MovePlan::Stay);
        simulate(&mut positions, 3, plan);
        assert_eq!(order(&positions), vec![0, 3, 1, 2]);
    }

    #[test]
    fn moving_first_to_last_shifts_rest_down() {
        let mut positions = vec![(0, 1), (1, 2), (2, 3)];
        let plan = plan_move(1, 3, 3).unwrap_or(MovePlan::Stay);
        assert_eq!(
            plan,
            MovePlan::Shift {
                from: 2,
                to: 3,
                delta: -1,
                target: 3
            }
        );
        simulate(&mut positions, 0, plan);
        assert_eq!(order(&positions), vec![1, 2, 0]);
    }

    #[test]
    fn rejects_out_of_range_targets() {
        assert_eq!(
            plan_move(1, 4, 3),
            Err(CourseError::validation("Position is out of range"))
        );
        assert!(plan_move(1, -1, 3).is_err());
    }

    proptest! {
        #[test]
        fn moves_keep_positions_dense(count in 1i32..20, moves in prop::collection::vec((0usize..20, 0i32..21), 0..30)) {
            let n = usize::try_from(count).unwrap_or(0);
            let mut positions: Vec<(usize, i32)> = (0..n).zip(1..=count).collect();
            for (moved, target) in moves {
                let moved = moved % n;
                match plan_move(positions[moved].1, target, count) {
                    Ok(plan) => simulate(&mut positions, moved, plan),
                    Err(_) => prop_assert!(target > count),
                }
                let mut seen: Vec<i32> = positions.iter().map(|(_, p)| *p).collect();
                seen.sort_unstable();
                prop_assert_eq!(seen, (1..=count).collect::<Vec<_>>());
            }
        }
    }
}
