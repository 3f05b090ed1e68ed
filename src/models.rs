use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::services::ranking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub accepted: bool,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemHeader {
    pub alias: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemCell {
    Accepted { attempts: u32 },
    Rejected { attempts: u32 },
    /// Result still frozen; `submissions` runs are waiting to be revealed
    Pending { submissions: u32 },
    Untouched,
}

impl ProblemCell {
    pub fn label(&self) -> String {
        match self {
            ProblemCell::Accepted { attempts: 0 } => "+".to_string(),
            ProblemCell::Accepted { attempts } => format!("+{attempts}"),
            ProblemCell::Rejected { attempts } => format!("-{attempts}"),
            ProblemCell::Pending { submissions } => format!("?{submissions}"),
            ProblemCell::Untouched => ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub alias: String,
    pub name: Option<String>,
    /// Retained runs in submission order; anything after the first accepted run is dropped
    pub runs: Vec<Run>,
    pub accepted: bool,
    pub penalty: i64,
    /// Rejected attempts that count against the team
    pub attempts: u32,
    pub submissions: u32,
    pub time: i64,
    pub show: bool,
}

impl Problem {
    pub fn new(
        alias: String,
        name: Option<String>,
        accepted: bool,
        penalty: i64,
        reported_attempts: u32,
        mut runs: Vec<Run>,
        freeze_time: i64,
    ) -> Self {
        if accepted && let Some(first_accepted) = runs.iter().position(|run| run.accepted) {
            runs.truncate(first_accepted + 1);
        }

        let (attempts, submissions) = if runs.is_empty() {
            let attempts = if accepted {
                reported_attempts.saturating_sub(1)
            } else {
                reported_attempts
            };
            (attempts, reported_attempts)
        } else {
            let rejected = runs.iter().filter(|run| !run.accepted).count() as u32;
            (rejected, runs.len() as u32)
        };

        let time = runs.iter().map(|run| run.time).max().unwrap_or(0);
        let show = time <= freeze_time || submissions == 0;

        Self {
            alias,
            name,
            runs,
            accepted,
            penalty,
            attempts,
            submissions,
            time,
            show,
        }
    }

    pub fn cell(&self) -> ProblemCell {
        if !self.show {
            ProblemCell::Pending {
                submissions: self.submissions,
            }
        } else if self.accepted {
            ProblemCell::Accepted {
                attempts: self.attempts,
            }
        } else if self.submissions > 0 {
            ProblemCell::Rejected {
                attempts: self.attempts,
            }
        } else {
            ProblemCell::Untouched
        }
    }

    pub fn is_counted(&self) -> bool {
        self.show && self.accepted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub party: String,
    pub stop: bool,
    pub diploma: Option<Vec<String>>,
    pub problems: Vec<Problem>,
    /// Indices into `problems` of the results frozen at load time, in reveal order
    pub hidden: Vec<usize>,
    pub current_hidden: usize,
    pub solved: u32,
    pub penalty: i64,
    pub rank: usize,
}

impl Session {
    pub fn new(
        id: String,
        party: String,
        stop: bool,
        diploma: Option<Vec<String>>,
        problems: Vec<Problem>,
    ) -> Self {
        let mut hidden: Vec<usize> = problems
            .iter()
            .enumerate()
            .filter(|(_, problem)| !problem.show)
            .map(|(index, _)| index)
            .collect();
        hidden.sort_by_key(|&index| problems[index].time);

        let mut session = Self {
            id,
            party,
            stop,
            diploma,
            problems,
            hidden,
            current_hidden: 0,
            solved: 0,
            penalty: 0,
            rank: 0,
        };
        session.update();
        session
    }

    pub fn update(&mut self) {
        self.solved = 0;
        self.penalty = 0;
        for problem in self.problems.iter().filter(|problem| problem.is_counted()) {
            self.solved += 1;
            self.penalty += problem.penalty;
        }
    }

    pub fn fully_revealed(&self) -> bool {
        self.current_hidden >= self.hidden.len()
    }

    /// Unhides the next frozen problem and returns its index in `problems`.
    pub fn reveal_next(&mut self) -> Option<usize> {
        let problem_index = *self.hidden.get(self.current_hidden)?;
        self.problems[problem_index].show = true;
        self.current_hidden += 1;
        self.update();
        Some(problem_index)
    }

    pub fn conceal_last(&mut self) -> Option<usize> {
        let previous = self.current_hidden.checked_sub(1)?;
        let problem_index = self.hidden[previous];
        self.problems[problem_index].show = false;
        self.current_hidden = previous;
        self.update();
        Some(problem_index)
    }

    /// Team id without its contest prefix (`neerc.team42` -> `team42`).
    pub fn short_id(&self) -> &str {
        self.id
            .rsplit_once('.')
            .map(|(_, tail)| tail)
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEntry {
    Reveal(String),
    AdvanceTeam,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contest {
    pub name: String,
    pub problems: Vec<ProblemHeader>,
    pub freeze_time: i64,
    pub sessions: Vec<Session>,
    /// Index into `sessions` of the team being revealed; starts at the bottom
    pub current_session: usize,
    pub actions: Vec<ActionEntry>,
}

impl Contest {
    pub fn new(
        name: String,
        problems: Vec<ProblemHeader>,
        freeze_time: i64,
        sessions: Vec<Session>,
    ) -> Result<Self, SnapshotError> {
        if sessions.is_empty() {
            return Err(SnapshotError::NoSessions);
        }

        let mut contest = Self {
            name,
            problems,
            freeze_time,
            current_session: sessions.len() - 1,
            sessions,
            actions: Vec::new(),
        };
        contest.update();
        Ok(contest)
    }

    pub fn update(&mut self) {
        ranking::rank_sessions(&mut self.sessions);
    }

    pub fn current(&self) -> &Session {
        &self.sessions[self.current_session]
    }

    pub fn current_mut(&mut self) -> &mut Session {
        &mut self.sessions[self.current_session]
    }

    pub fn index_of(&self, session_id: &str) -> Option<usize> {
        self.sessions
            .iter()
            .position(|session| session.id == session_id)
    }

    pub fn hidden_remaining(&self) -> usize {
        self.sessions
            .iter()
            .map(|session| session.hidden.len() - session.current_hidden)
            .sum()
    }

    pub fn rows(&self) -> Vec<StandingsRow<'_>> {
        self.sessions
            .iter()
            .enumerate()
            .map(|(index, session)| StandingsRow {
                id: &session.id,
                party: &session.party,
                rank: session.rank,
                solved: session.solved,
                penalty: session.penalty,
                cells: session.problems.iter().map(Problem::cell).collect(),
                current: index == self.current_session,
            })
            .collect()
    }

    pub fn position(&self) -> ViewerPosition {
        let session = self.current();
        ViewerPosition {
            rank: session.rank,
            id: session.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingsRow<'a> {
    pub id: &'a str,
    pub party: &'a str,
    pub rank: usize,
    pub solved: u32,
    pub penalty: i64,
    pub cells: Vec<ProblemCell>,
    pub current: bool,
}

/// Bookmark of the reveal cursor, printed as `rank-id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerPosition {
    pub rank: usize,
    pub id: String,
}

impl ViewerPosition {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().trim_start_matches('#');
        let (rank, id) = token.split_once('-').unwrap_or((token, ""));
        let rank: usize = rank.trim().parse().ok()?;
        if rank == 0 {
            return None;
        }
        Some(Self {
            rank,
            id: id.trim().to_string(),
        })
    }
}

impl fmt::Display for ViewerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.rank, self.id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn run(accepted: bool, time: i64) -> Run {
        Run { accepted, time }
    }

    pub(crate) fn problem(
        alias: &str,
        accepted: bool,
        penalty: i64,
        runs: Vec<Run>,
        freeze: i64,
    ) -> Problem {
        Problem::new(alias.to_string(), None, accepted, penalty, 0, runs, freeze)
    }

    #[test]
    fn trailing_runs_after_acceptance_are_discarded() {
        let problem = problem(
            "A",
            true,
            50,
            vec![run(false, 10), run(false, 20), run(true, 30), run(false, 40)],
            180,
        );

        assert_eq!(problem.runs.len(), 3);
        assert_eq!(problem.attempts, 2);
        assert_eq!(problem.submissions, 3);
        assert_eq!(problem.time, 30);
        assert_eq!(problem.cell(), ProblemCell::Accepted { attempts: 2 });
    }

    #[test]
    fn rejected_problem_keeps_every_run() {
        let problem = problem("B", false, 0, vec![run(false, 10), run(false, 200)], 180);

        assert_eq!(problem.attempts, 2);
        assert_eq!(problem.time, 200);
        assert!(!problem.show);
        assert_eq!(problem.cell(), ProblemCell::Pending { submissions: 2 });
    }

    #[test]
    fn freeze_time_decides_initial_visibility() {
        let before = problem("A", true, 170, vec![run(true, 170)], 180);
        let at = problem("B", true, 180, vec![run(true, 180)], 180);
        let after = problem("C", true, 190, vec![run(true, 190)], 180);

        assert!(before.show);
        assert!(at.show);
        assert!(!after.show);
    }

    #[test]
    fn untouched_problem_is_always_shown() {
        let problem = Problem::new("D".to_string(), None, false, 0, 0, Vec::new(), 0);

        assert!(problem.show);
        assert_eq!(problem.cell(), ProblemCell::Untouched);
        assert_eq!(problem.cell().label(), ".");
    }

    #[test]
    fn reported_attempts_fill_in_for_missing_runs() {
        let problem = Problem::new("E".to_string(), None, true, 42, 3, Vec::new(), 180);

        assert_eq!(problem.attempts, 2);
        assert_eq!(problem.submissions, 3);
        assert!(problem.show);
        assert_eq!(problem.cell().label(), "+2");
    }

    #[test]
    fn hidden_problems_are_ordered_by_time() {
        let session = Session::new(
            "s.1".to_string(),
            "One".to_string(),
            false,
            None,
            vec![
                problem("A", true, 250, vec![run(true, 250)], 180),
                problem("B", false, 0, vec![run(false, 100)], 180),
                problem("C", true, 200, vec![run(true, 200)], 180),
            ],
        );

        assert_eq!(session.hidden, vec![2, 0]);
        assert_eq!(session.solved, 0);
        assert_eq!(session.short_id(), "1");
    }

    #[test]
    fn reveal_and_conceal_are_inverse() {
        let mut session = Session::new(
            "s.1".to_string(),
            "One".to_string(),
            false,
            None,
            vec![
                problem("A", true, 30, vec![run(true, 30)], 180),
                problem("B", true, 200, vec![run(true, 200)], 180),
            ],
        );
        let before = session.clone();

        assert_eq!(session.reveal_next(), Some(1));
        assert_eq!((session.solved, session.penalty), (2, 230));
        assert!(session.fully_revealed());
        assert_eq!(session.reveal_next(), None);

        assert_eq!(session.conceal_last(), Some(1));
        assert_eq!(session, before);
        assert_eq!(session.conceal_last(), None);
    }

    #[test]
    fn cell_labels_follow_standings_notation() {
        assert_eq!(ProblemCell::Accepted { attempts: 0 }.label(), "+");
        assert_eq!(ProblemCell::Accepted { attempts: 3 }.label(), "+3");
        assert_eq!(ProblemCell::Rejected { attempts: 2 }.label(), "-2");
        assert_eq!(ProblemCell::Pending { submissions: 4 }.label(), "?4");
    }

    #[test]
    fn viewer_position_round_trips_through_its_token() {
        let position = ViewerPosition::parse("#12-neerc.team-7").expect("valid token");

        assert_eq!(position.rank, 12);
        assert_eq!(position.id, "neerc.team-7");
        assert_eq!(position.to_string(), "12-neerc.team-7");
    }

    #[test]
    fn viewer_position_without_rank_is_rejected() {
        assert_eq!(ViewerPosition::parse(""), None);
        assert_eq!(ViewerPosition::parse("0-team"), None);
        assert_eq!(ViewerPosition::parse("abc-team"), None);
        assert_eq!(
            ViewerPosition::parse("4"),
            Some(ViewerPosition {
                rank: 4,
                id: String::new()
            })
        );
    }

    #[test]
    fn contest_requires_sessions() {
        let result = Contest::new("Empty".to_string(), Vec::new(), 180, Vec::new());

        assert!(matches!(result, Err(SnapshotError::NoSessions)));
    }
}
