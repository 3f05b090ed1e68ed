use std::cmp::Ordering;

use crate::models::Session;

pub fn compare_sessions(a: &Session, b: &Session) -> Ordering {
    b.solved
        .cmp(&a.solved)
        .then_with(|| a.penalty.cmp(&b.penalty))
        .then_with(|| a.id.cmp(&b.id))
}

/// Assigns ranks over an already sorted slice. Tied sessions share the rank
/// of the first session of their tie group.
pub fn assign_ranks(sessions: &mut [Session]) {
    let mut previous: Option<(u32, i64, usize)> = None;
    for (index, session) in sessions.iter_mut().enumerate() {
        session.rank = match previous {
            Some((solved, penalty, rank))
                if solved == session.solved && penalty == session.penalty =>
            {
                rank
            }
            _ => index + 1,
        };
        previous = Some((session.solved, session.penalty, session.rank));
    }
}

pub fn rank_sessions(sessions: &mut [Session]) {
    for session in sessions.iter_mut() {
        session.update();
    }
    sessions.sort_by(compare_sessions);
    assign_ranks(sessions);
}
