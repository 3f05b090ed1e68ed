use tracing::{debug, info, warn};

use crate::models::{ActionEntry, Contest, ViewerPosition};
use crate::services::reveal_log::RevealLog;

pub const MULTI_STEP_COUNT: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpeedMode {
    #[default]
    Animated,
    Fast,
    Instant,
}

impl SpeedMode {
    pub fn presents_transitions(self) -> bool {
        !matches!(self, SpeedMode::Instant)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationCommand {
    Advance {
        mode: SpeedMode,
        count: usize,
        solved_threshold: Option<u32>,
    },
    Retreat {
        mode: SpeedMode,
        count: usize,
        solved_threshold: Option<u32>,
    },
    Cancel,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    ProblemRevealed {
        session_id: String,
        problem_index: usize,
        accepted: bool,
        from_row: usize,
        to_row: usize,
        old_rank: usize,
        new_rank: usize,
    },
    DiplomaShown {
        session_id: String,
        citations: Vec<String>,
    },
    TeamAdvanced {
        from_row: usize,
        to_row: usize,
    },
    ProblemConcealed {
        session_id: String,
        problem_index: usize,
        from_row: usize,
        to_row: usize,
    },
    TeamRetreated {
        from_row: usize,
        to_row: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    Cancelled,
    CountExhausted,
    ThresholdReached,
    StopFlag,
    DiplomaPending,
    DiplomaShown,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub events: Vec<RevealEvent>,
    pub halt: Option<HaltReason>,
    pub awaiting_presentation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastChange {
    pub session_id: String,
    pub problem_index: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct PendingAdvance {
    mode: SpeedMode,
    remaining: usize,
    solved_threshold: Option<u32>,
    steps_taken: usize,
}

#[derive(Debug)]
pub struct RevealEngine {
    contest: Contest,
    log: RevealLog,
    transition_in_flight: bool,
    cancel_requested: bool,
    pending: Option<PendingAdvance>,
    displayed_diploma: Option<String>,
    last_change: Option<LastChange>,
}

impl RevealEngine {
    pub fn new(contest: Contest) -> Self {
        Self {
            contest,
            log: RevealLog::default(),
            transition_in_flight: false,
            cancel_requested: false,
            pending: None,
            displayed_diploma: None,
            last_change: None,
        }
    }

    pub fn contest(&self) -> &Contest {
        &self.contest
    }

    pub fn log(&self) -> &RevealLog {
        &self.log
    }

    pub fn is_locked(&self) -> bool {
        self.transition_in_flight
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn last_change(&self) -> Option<&LastChange> {
        self.last_change.as_ref()
    }

    pub fn position(&self) -> ViewerPosition {
        self.contest.position()
    }

    pub fn displayed_diploma(&self) -> Option<(&str, &[String])> {
        let session_id = self.displayed_diploma.as_deref()?;
        let index = self.contest.index_of(session_id)?;
        let citations = self.contest.sessions[index].diploma.as_deref()?;
        Some((session_id, citations))
    }

    pub fn is_finished(&self) -> bool {
        self.contest.current_session == 0 && self.contest.current().fully_revealed()
    }

    pub fn dispatch(&mut self, command: NavigationCommand) -> Option<CommandOutcome> {
        match command {
            NavigationCommand::Advance {
                mode,
                count,
                solved_threshold,
            } => self.advance(mode, count, solved_threshold),
            NavigationCommand::Retreat {
                mode,
                count,
                solved_threshold,
            } => self.retreat(mode, count, solved_threshold),
            NavigationCommand::Cancel => {
                self.cancel();
                Some(CommandOutcome::default())
            }
            NavigationCommand::Restart => self.restart(),
        }
    }

    /// Moves the reveal forward by up to `count` steps, pausing early once the
    /// current team has `solved_threshold` problems. Returns `None` when a
    /// transition is still being presented.
    pub fn advance(
        &mut self,
        mode: SpeedMode,
        count: usize,
        solved_threshold: Option<u32>,
    ) -> Option<CommandOutcome> {
        if self.transition_in_flight {
            debug!("Advance ignored: transition in flight");
            return None;
        }
        self.cancel_requested = false;
        self.pending = None;

        Some(self.run_advance(PendingAdvance {
            mode,
            remaining: count,
            solved_threshold,
            steps_taken: 0,
        }))
    }

    /// Called by the presentation surface once the effect of the last step is
    /// over. Releases the input lock and resumes a multi-step advance.
    pub fn finish_transition(&mut self) -> Option<CommandOutcome> {
        if !self.transition_in_flight {
            return None;
        }
        self.transition_in_flight = false;
        let pending = self.pending.take()?;
        Some(self.run_advance(pending))
    }

    pub fn cancel(&mut self) {
        if !self.cancel_requested {
            debug!("Cancel requested");
        }
        self.cancel_requested = true;
    }

    pub fn retreat(
        &mut self,
        mode: SpeedMode,
        count: usize,
        solved_threshold: Option<u32>,
    ) -> Option<CommandOutcome> {
        if self.transition_in_flight {
            debug!("Retreat ignored: transition in flight");
            return None;
        }
        self.cancel_requested = false;
        self.pending = None;
        self.displayed_diploma = None;

        let mut outcome = CommandOutcome::default();
        for _ in 0..count {
            let Some(action) = self.contest.actions.pop() else {
                break;
            };
            if let Some(event) = self.undo(action) {
                outcome.events.push(event);
            }
            let solved = self.contest.current().solved;
            if solved_threshold.is_some_and(|threshold| solved <= threshold) {
                outcome.halt = Some(HaltReason::ThresholdReached);
                break;
            }
        }
        if outcome.halt.is_none() {
            outcome.halt = Some(HaltReason::CountExhausted);
        }

        debug!(
            "Retreat mode={:?} undone={} remaining_actions={}",
            mode,
            outcome.events.len(),
            self.contest.actions.len()
        );
        Some(outcome)
    }

    /// Replays the reveal without presentation until the current team matches
    /// `target`, or until nothing is left to reveal. Returns the steps taken.
    pub fn rewind(&mut self, target: Option<&ViewerPosition>) -> usize {
        let Some(target) = target.filter(|target| target.rank > 0) else {
            return 0;
        };
        info!("Rewinding to rank={}, id='{}'", target.rank, target.id);

        let mut steps = 0;
        while !self.current_matches(target) {
            if self.step().is_none() {
                warn!(
                    "Rewind target {} not reached, reveal ran to completion",
                    target
                );
                break;
            }
            steps += 1;
        }
        self.displayed_diploma = None;
        info!("Rewind finished after {} steps at {}", steps, self.position());
        steps
    }

    pub fn restart(&mut self) -> Option<CommandOutcome> {
        let undone = self.contest.actions.len();
        let outcome = self.retreat(SpeedMode::Instant, undone, None)?;
        self.log.clear();
        self.last_change = None;
        self.displayed_diploma = None;
        info!("Reveal restarted, {} actions undone", undone);
        Some(outcome)
    }

    fn current_matches(&self, target: &ViewerPosition) -> bool {
        let session = self.contest.current();
        session.rank == target.rank && (target.id.is_empty() || session.id == target.id)
    }

    fn is_diploma_displayed(&self, session_id: &str) -> bool {
        self.displayed_diploma.as_deref() == Some(session_id)
    }

    fn halt_reason(&self, pending: &PendingAdvance) -> Option<HaltReason> {
        let session = self.contest.current();
        if self.cancel_requested {
            Some(HaltReason::Cancelled)
        } else if pending.remaining == 0 {
            Some(HaltReason::CountExhausted)
        } else if pending
            .solved_threshold
            .is_some_and(|threshold| session.solved >= threshold)
        {
            Some(HaltReason::ThresholdReached)
        } else if session.stop && session.fully_revealed() && pending.steps_taken > 0 {
            Some(HaltReason::StopFlag)
        } else if pending.remaining > 1
            && session.diploma.is_some()
            && session.fully_revealed()
            && !self.is_diploma_displayed(&session.id)
        {
            Some(HaltReason::DiplomaPending)
        } else {
            None
        }
    }

    fn run_advance(&mut self, mut pending: PendingAdvance) -> CommandOutcome {
        let mut outcome = CommandOutcome::default();
        loop {
            if let Some(reason) = self.halt_reason(&pending) {
                debug!("Advance halted: {:?}", reason);
                outcome.halt = Some(reason);
                return outcome;
            }

            let Some(event) = self.step() else {
                debug!("Advance halted: reveal finished");
                outcome.halt = Some(HaltReason::Done);
                return outcome;
            };
            pending.remaining -= 1;
            pending.steps_taken += 1;

            let diploma = matches!(event, RevealEvent::DiplomaShown { .. });
            outcome.events.push(event);
            if diploma {
                outcome.halt = Some(HaltReason::DiplomaShown);
                return outcome;
            }
            if pending.mode.presents_transitions() {
                self.transition_in_flight = true;
                self.pending = Some(pending);
                outcome.awaiting_presentation = true;
                return outcome;
            }
        }
    }

    /// Performs one forward transition. `None` means the reveal is over.
    fn step(&mut self) -> Option<RevealEvent> {
        let from_row = self.contest.current_session;
        let old_rank = self.contest.current().rank;
        if let Some(problem_index) = self.contest.current_mut().reveal_next() {
            self.displayed_diploma = None;
            return Some(self.commit_reveal(from_row, old_rank, problem_index));
        }

        let session = self.contest.current();
        if let Some(citations) = &session.diploma
            && !self.is_diploma_displayed(&session.id)
        {
            let event = RevealEvent::DiplomaShown {
                session_id: session.id.clone(),
                citations: citations.clone(),
            };
            debug!("Step: diploma for {}", session.id);
            self.displayed_diploma = Some(session.id.clone());
            return Some(event);
        }

        if self.contest.current_session > 0 {
            self.displayed_diploma = None;
            return Some(self.commit_team_advance());
        }

        None
    }

    fn commit_reveal(
        &mut self,
        from_row: usize,
        old_rank: usize,
        problem_index: usize,
    ) -> RevealEvent {
        let session_id = self.contest.sessions[from_row].id.clone();
        self.contest
            .actions
            .push(ActionEntry::Reveal(session_id.clone()));
        self.contest.update();

        let to_row = self.contest.index_of(&session_id).unwrap_or(from_row);
        let session = &self.contest.sessions[to_row];
        let accepted = session.problems[problem_index].accepted;
        let new_rank = session.rank;
        self.log.record_reveal(session, problem_index, old_rank);
        debug!(
            "Step: reveal {} problem {} accepted={} row {}->{} rank {}->{}",
            session_id,
            session.problems[problem_index].alias,
            accepted,
            from_row,
            to_row,
            old_rank,
            new_rank
        );

        self.last_change = Some(LastChange {
            session_id: session_id.clone(),
            problem_index: Some(problem_index),
        });
        RevealEvent::ProblemRevealed {
            session_id,
            problem_index,
            accepted,
            from_row,
            to_row,
            old_rank,
            new_rank,
        }
    }

    fn commit_team_advance(&mut self) -> RevealEvent {
        let from_row = self.contest.current_session;
        self.log.record_team_finished(self.contest.current());
        self.contest.actions.push(ActionEntry::AdvanceTeam);
        self.contest.current_session -= 1;
        self.contest.update();

        let to_row = self.contest.current_session;
        debug!("Step: advance team row {}->{}", from_row, to_row);
        self.last_change = Some(LastChange {
            session_id: self.contest.current().id.clone(),
            problem_index: None,
        });
        RevealEvent::TeamAdvanced { from_row, to_row }
    }

    fn undo(&mut self, action: ActionEntry) -> Option<RevealEvent> {
        let event = match action {
            ActionEntry::Reveal(session_id) => {
                let from_row = self.contest.index_of(&session_id)?;
                let problem_index = self.contest.sessions[from_row].conceal_last()?;
                self.contest.update();
                let to_row = self.contest.index_of(&session_id).unwrap_or(from_row);
                self.last_change = Some(LastChange {
                    session_id: session_id.clone(),
                    problem_index: Some(problem_index),
                });
                RevealEvent::ProblemConcealed {
                    session_id,
                    problem_index,
                    from_row,
                    to_row,
                }
            }
            ActionEntry::AdvanceTeam => {
                let from_row = self.contest.current_session;
                let last = self.contest.sessions.len() - 1;
                self.contest.current_session = (from_row + 1).min(last);
                self.contest.update();
                self.last_change = Some(LastChange {
                    session_id: self.contest.current().id.clone(),
                    problem_index: None,
                });
                RevealEvent::TeamRetreated {
                    from_row,
                    to_row: self.contest.current_session,
                }
            }
        };
        Some(event)
    }
}
