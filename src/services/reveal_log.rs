use crate::models::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    /// Printed whenever the finished teams move to a different solved count
    SolvedHeader { solved: u32 },
    Reveal {
        alias: String,
        accepted: bool,
        old_rank: usize,
        new_rank: usize,
        solved: u32,
        penalty: i64,
        short_id: String,
        party: String,
    },
    TeamFinished {
        rank: usize,
        solved: u32,
        penalty: i64,
        short_id: String,
        party: String,
    },
}

impl LogLine {
    pub fn mark(&self) -> String {
        match self {
            LogLine::Reveal {
                alias, accepted, ..
            } => format!("{alias}{}", if *accepted { "+" } else { "-" }),
            LogLine::TeamFinished { .. } => "=".to_string(),
            LogLine::SolvedHeader { .. } => String::new(),
        }
    }

    pub fn rank_text(&self) -> String {
        match self {
            LogLine::Reveal {
                old_rank, new_rank, ..
            } if old_rank != new_rank => format!("{old_rank}→{new_rank}"),
            LogLine::Reveal { new_rank, .. } => new_rank.to_string(),
            LogLine::TeamFinished { rank, .. } => rank.to_string(),
            LogLine::SolvedHeader { .. } => String::new(),
        }
    }
}

/// Append-only transcript; undo does not erase what the audience has seen.
#[derive(Debug, Default, Clone)]
pub struct RevealLog {
    lines: Vec<LogLine>,
    last_solved: Option<u32>,
}

impl RevealLog {
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn record_reveal(&mut self, session: &Session, problem_index: usize, old_rank: usize) {
        let Some(problem) = session.problems.get(problem_index) else {
            return;
        };
        self.lines.push(LogLine::Reveal {
            alias: problem.alias.clone(),
            accepted: problem.accepted,
            old_rank,
            new_rank: session.rank,
            solved: session.solved,
            penalty: session.penalty,
            short_id: session.short_id().to_string(),
            party: session.party.clone(),
        });
    }

    pub fn record_team_finished(&mut self, session: &Session) {
        if self.last_solved != Some(session.solved) {
            self.lines.push(LogLine::SolvedHeader {
                solved: session.solved,
            });
        }
        self.last_solved = Some(session.solved);
        self.lines.push(LogLine::TeamFinished {
            rank: session.rank,
            solved: session.solved,
            penalty: session.penalty,
            short_id: session.short_id().to_string(),
            party: session.party.clone(),
        });
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.last_solved = None;
    }
}
