use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::mpsc::{self, Receiver};

use chrono::Duration;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{error, info};

use crate::error::SnapshotError;
use crate::models::{Contest, Problem, ProblemHeader, Run, Session};
use crate::services::config_loader::{FinalizerConfig, from_opt_duration_str};

#[derive(Debug)]
pub enum ParserEvent {
    Started,
    Finished {
        contest: Box<Contest>,
        session_count: usize,
        hidden_count: usize,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawStandings {
    contest: RawContest,
}

#[derive(Debug, Deserialize)]
struct RawContest {
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "from_opt_duration_str")]
    freeze_time: Option<Duration>,
    #[serde(default)]
    problems: Vec<ProblemHeader>,
    sessions: Vec<RawSession>,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    id: String,
    party: String,
    #[serde(default, deserialize_with = "from_flag")]
    stop: bool,
    #[serde(default)]
    diploma: Option<Vec<String>>,
    #[serde(default)]
    problems: Vec<RawProblem>,
}

#[derive(Debug, Deserialize)]
struct RawProblem {
    alias: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(deserialize_with = "from_flag")]
    accepted: bool,
    #[serde(default, deserialize_with = "from_opt_number")]
    penalty: Option<i64>,
    #[serde(default, deserialize_with = "from_opt_number")]
    attempts: Option<i64>,
    #[serde(default)]
    runs: Vec<RawRun>,
}

#[derive(Debug, Deserialize)]
struct RawRun {
    #[serde(deserialize_with = "from_flag")]
    accepted: bool,
    #[serde(deserialize_with = "from_time")]
    time: f64,
}

fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        },
        Value::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "1" | "true" => Some(true),
            "no" | "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn float_value(value: &Value) -> Option<f64> {
    let float = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(raw) => raw.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    float.is_finite().then_some(float)
}

fn whole_number(float: f64) -> Option<i64> {
    // f64 stops holding every integer past 2^53.
    (float.fract() == 0.0 && float.abs() < 9.0e15).then_some(float as i64)
}

fn number_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| whole_number(number.as_f64()?)),
        Value::String(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| whole_number(float_value(value)?)),
        _ => None,
    }
}

fn from_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    flag_value(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid flag: {value}")))
}

fn from_time<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    float_value(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid number: {value}")))
}

fn from_opt_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => number_value(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid number: {value}"))),
    }
}

fn build_problem(
    session_id: &str,
    raw: RawProblem,
    freeze_time: i64,
) -> Result<Problem, SnapshotError> {
    let penalty = match (raw.accepted, raw.penalty) {
        (true, None) => {
            return Err(SnapshotError::MissingPenalty {
                session: session_id.to_string(),
                alias: raw.alias,
            });
        }
        (_, penalty) => penalty.unwrap_or(0),
    };

    let reported_attempts = u32::try_from(raw.attempts.unwrap_or(0)).map_err(|_| {
        SnapshotError::InvalidValue {
            session: session_id.to_string(),
            alias: raw.alias.clone(),
            message: format!("attempts out of range: {:?}", raw.attempts),
        }
    })?;

    let runs = raw
        .runs
        .iter()
        .map(|run| match whole_number(run.time) {
            Some(time) => Ok(Run {
                accepted: run.accepted,
                time,
            }),
            None => Err(SnapshotError::InvalidValue {
                session: session_id.to_string(),
                alias: raw.alias.clone(),
                message: format!("run time {} is not a whole number", run.time),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Problem::new(
        raw.alias,
        raw.name,
        raw.accepted,
        penalty,
        reported_attempts,
        runs,
        freeze_time,
    ))
}

fn build_contest(raw: RawContest, config: &FinalizerConfig) -> Result<Contest, SnapshotError> {
    if raw.sessions.is_empty() {
        return Err(SnapshotError::NoSessions);
    }

    let freeze = raw.freeze_time.unwrap_or(config.freeze_time);
    let freeze_time = config.time_unit.from_duration(freeze);

    let header = if raw.problems.is_empty() {
        raw.sessions[0]
            .problems
            .iter()
            .map(|problem| ProblemHeader {
                alias: problem.alias.clone(),
                name: problem.name.clone(),
            })
            .collect()
    } else {
        raw.problems
    };

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut sessions = Vec::with_capacity(raw.sessions.len());
    for (position, raw_session) in raw.sessions.into_iter().enumerate() {
        if raw_session.id.trim().is_empty() {
            return Err(SnapshotError::EmptyField {
                position,
                field: "id",
            });
        }
        if raw_session.party.trim().is_empty() {
            return Err(SnapshotError::EmptyField {
                position,
                field: "party",
            });
        }
        if !seen_ids.insert(raw_session.id.clone()) {
            return Err(SnapshotError::DuplicateSession(raw_session.id));
        }
        if raw_session.problems.len() != header.len() {
            return Err(SnapshotError::ProblemCountMismatch {
                session: raw_session.id,
                expected: header.len(),
                found: raw_session.problems.len(),
            });
        }
        let misplaced = header
            .iter()
            .zip(&raw_session.problems)
            .position(|(column, problem)| column.alias != problem.alias);
        if let Some(position) = misplaced {
            return Err(SnapshotError::ProblemAliasMismatch {
                session: raw_session.id,
                position,
                expected: header[position].alias.clone(),
                found: raw_session.problems[position].alias.clone(),
            });
        }

        let problems = raw_session
            .problems
            .into_iter()
            .map(|problem| build_problem(&raw_session.id, problem, freeze_time))
            .collect::<Result<Vec<_>, _>>()?;

        sessions.push(Session::new(
            raw_session.id,
            raw_session.party,
            raw_session.stop,
            raw_session.diploma,
            problems,
        ));
    }

    Contest::new(raw.name, header, freeze_time, sessions)
}

/// Nothing of the contest is built unless the whole document is well formed.
pub fn parse_snapshot(raw: &str, config: &FinalizerConfig) -> Result<Contest, SnapshotError> {
    let standings: RawStandings = serde_json::from_str(raw)?;
    build_contest(standings.contest, config)
}

pub fn load_snapshot(path: &Path, config: &FinalizerConfig) -> Result<Contest, SnapshotError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_snapshot(&raw, config)
}

pub fn spawn_snapshot_parser(path: String, config: FinalizerConfig) -> Receiver<ParserEvent> {
    let (tx, rx) = mpsc::channel::<ParserEvent>();

    std::thread::spawn(move || {
        let _ = tx.send(ParserEvent::Started);

        match load_snapshot(Path::new(&path), &config) {
            Ok(contest) => {
                let session_count = contest.sessions.len();
                let hidden_count = contest.hidden_remaining();
                info!(
                    "Snapshot '{}' loaded: {} sessions, {} frozen results, freeze after {} min",
                    path,
                    session_count,
                    hidden_count,
                    config.time_unit.to_duration(contest.freeze_time).num_minutes()
                );
                for session in contest.sessions.iter() {
                    info!(
                        "Frozen Rank {:0>3} Solved {} Penalty {} Hidden {} Team: {}",
                        session.rank,
                        session.solved,
                        session.penalty,
                        session.hidden.len(),
                        session.party
                    );
                }
                let _ = tx.send(ParserEvent::Finished {
                    contest: Box::new(contest),
                    session_count,
                    hidden_count,
                });
            }
            Err(err) => {
                let message = err.to_string();
                error!("{message}");
                let _ = tx.send(ParserEvent::Failed { message });
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config_loader::TimeUnit;

    fn minutes_config() -> FinalizerConfig {
        FinalizerConfig {
            time_unit: TimeUnit::Minutes,
            ..FinalizerConfig::default()
        }
    }

    const SNAPSHOT: &str = r#"{
        "contest": {
            "name": "Test Contest",
            "problems": [ { "alias": "A", "name": "Apples" }, { "alias": "B" } ],
            "sessions": [
                { "id": "c.alpha", "party": "Alpha", "stop": "1", "diploma": ["Gold"],
                  "problems": [
                    { "alias": "A", "accepted": "yes", "penalty": 30,
                      "runs": [ { "accepted": "yes", "time": "30" } ] },
                    { "alias": "B", "accepted": "no",
                      "runs": [ { "accepted": "no", "time": 190 } ] }
                  ] },
                { "id": "c.beta", "party": "Beta",
                  "problems": [
                    { "alias": "A", "accepted": true, "penalty": 210, "attempts": 2,
                      "runs": [ { "accepted": false, "time": 150 },
                                { "accepted": true, "time": 190 },
                                { "accepted": false, "time": 200 } ] },
                    { "alias": "B", "accepted": 0 }
                  ] }
            ]
        }
    }"#;

    #[test]
    fn snapshot_builds_the_contest_graph() {
        let contest = parse_snapshot(SNAPSHOT, &minutes_config()).expect("valid snapshot");

        assert_eq!(contest.name, "Test Contest");
        assert_eq!(contest.freeze_time, 180);
        assert_eq!(contest.problems.len(), 2);
        assert_eq!(contest.sessions.len(), 2);
        assert_eq!(contest.current_session, 1);

        let alpha = &contest.sessions[contest.index_of("c.alpha").expect("alpha")];
        assert!(alpha.stop);
        assert_eq!(alpha.diploma.as_deref(), Some(&["Gold".to_string()][..]));
        assert_eq!(alpha.solved, 1);
        assert_eq!(alpha.hidden, vec![1]);

        let beta = &contest.sessions[contest.index_of("c.beta").expect("beta")];
        assert_eq!(beta.problems[0].runs.len(), 2);
        assert_eq!(beta.problems[0].attempts, 1);
        assert_eq!(beta.problems[0].time, 190);
        assert!(!beta.problems[0].show);
        assert!(beta.problems[1].show);
        assert_eq!(beta.solved, 0);
    }

    #[test]
    fn snapshot_freeze_time_overrides_config() {
        let raw = r#"{ "contest": { "freeze_time": "04:00:00", "sessions": [
            { "id": "a", "party": "A", "problems": [] } ] } }"#;

        let contest = parse_snapshot(raw, &minutes_config()).expect("valid snapshot");

        assert_eq!(contest.freeze_time, 240);
    }

    #[test]
    fn header_is_derived_from_first_session_when_absent() {
        let raw = r#"{ "contest": { "sessions": [
            { "id": "a", "party": "A", "problems": [ { "alias": "X", "accepted": "no" } ] } ] } }"#;

        let contest = parse_snapshot(raw, &FinalizerConfig::default()).expect("valid snapshot");

        assert_eq!(contest.problems[0].alias, "X");
    }

    #[test]
    fn unparseable_flag_is_fatal() {
        let raw = r#"{ "contest": { "sessions": [
            { "id": "a", "party": "A",
              "problems": [ { "alias": "X", "accepted": "maybe" } ] } ] } }"#;

        let err = parse_snapshot(raw, &FinalizerConfig::default()).unwrap_err();

        assert!(matches!(err, SnapshotError::Json(_)));
        assert!(err.to_string().contains("invalid flag"));
    }

    #[test]
    fn unparseable_time_is_fatal() {
        let raw = r#"{ "contest": { "sessions": [
            { "id": "a", "party": "A", "problems": [ { "alias": "X", "accepted": "no",
              "runs": [ { "accepted": "no", "time": "late" } ] } ] } ] } }"#;

        let err = parse_snapshot(raw, &FinalizerConfig::default()).unwrap_err();

        assert!(err.to_string().contains("invalid number"));
    }

    #[test]
    fn fractional_time_after_freeze_is_rejected() {
        let raw = r#"{ "contest": { "freeze_time": "03:00:00", "sessions": [
            { "id": "a", "party": "A", "problems": [ { "alias": "X", "accepted": "yes",
              "penalty": 181, "runs": [ { "accepted": "yes", "time": 180.5 } ] } ] } ] } }"#;

        let err = parse_snapshot(raw, &minutes_config()).unwrap_err();

        assert!(matches!(
            &err,
            SnapshotError::InvalidValue { session, alias, .. } if session == "a" && alias == "X"
        ));
        assert!(err.to_string().contains("180.5"));
    }

    #[test]
    fn whole_number_times_in_any_encoding_are_accepted() {
        let raw = r#"{ "contest": { "freeze_time": "03:00:00", "sessions": [
            { "id": "a", "party": "A", "problems": [
                { "alias": "X", "accepted": "yes", "penalty": "181.0",
                  "runs": [ { "accepted": "no", "time": "180" },
                            { "accepted": "yes", "time": 181.0 } ] }
            ] } ] } }"#;

        let contest = parse_snapshot(raw, &minutes_config()).expect("valid snapshot");
        let problem = &contest.sessions[0].problems[0];

        assert_eq!(problem.time, 181);
        assert_eq!(problem.penalty, 181);
        assert!(!problem.show);
    }

    #[test]
    fn fractional_penalty_is_fatal() {
        let raw = r#"{ "contest": { "sessions": [
            { "id": "a", "party": "A", "problems": [ { "alias": "X", "accepted": "yes",
              "penalty": 20.5 } ] } ] } }"#;

        let err = parse_snapshot(raw, &FinalizerConfig::default()).unwrap_err();

        assert!(err.to_string().contains("invalid number"));
    }

    #[test]
    fn missing_required_field_is_fatal() {
        let raw = r#"{ "contest": { "sessions": [ { "id": "a", "problems": [] } ] } }"#;

        let err = parse_snapshot(raw, &FinalizerConfig::default()).unwrap_err();

        assert!(err.to_string().contains("party"));
    }

    #[test]
    fn structural_problems_are_rejected() {
        let duplicate = r#"{ "contest": { "sessions": [
            { "id": "a", "party": "A" }, { "id": "a", "party": "B" } ] } }"#;
        let mismatch = r#"{ "contest": { "problems": [ { "alias": "A" } ], "sessions": [
            { "id": "a", "party": "A" } ] } }"#;
        let no_penalty = r#"{ "contest": { "sessions": [
            { "id": "a", "party": "A",
              "problems": [ { "alias": "A", "accepted": "yes" } ] } ] } }"#;
        let empty = r#"{ "contest": { "sessions": [] } }"#;
        let config = FinalizerConfig::default();

        assert!(matches!(
            parse_snapshot(duplicate, &config),
            Err(SnapshotError::DuplicateSession(id)) if id == "a"
        ));
        assert!(matches!(
            parse_snapshot(mismatch, &config),
            Err(SnapshotError::ProblemCountMismatch { expected: 1, found: 0, .. })
        ));
        assert!(matches!(
            parse_snapshot(no_penalty, &config),
            Err(SnapshotError::MissingPenalty { .. })
        ));
        assert!(matches!(parse_snapshot(empty, &config), Err(SnapshotError::NoSessions)));
    }

    #[test]
    fn problems_out_of_header_order_are_rejected() {
        let raw = r#"{ "contest": {
            "problems": [ { "alias": "A" }, { "alias": "B" } ],
            "sessions": [
            { "id": "a", "party": "A", "problems": [
                { "alias": "A", "accepted": "no" }, { "alias": "B", "accepted": "no" } ] },
            { "id": "b", "party": "B", "problems": [
                { "alias": "B", "accepted": "no" }, { "alias": "A", "accepted": "no" } ] } ] } }"#;

        let err = parse_snapshot(raw, &FinalizerConfig::default()).unwrap_err();

        match err {
            SnapshotError::ProblemAliasMismatch {
                session,
                position,
                expected,
                found,
            } => {
                assert_eq!(session, "b");
                assert_eq!(position, 0);
                assert_eq!(expected, "A");
                assert_eq!(found, "B");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parser_thread_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("missing.json").display().to_string();

        let rx = spawn_snapshot_parser(path, FinalizerConfig::default());

        assert!(matches!(rx.recv(), Ok(ParserEvent::Started)));
        match rx.recv() {
            Ok(ParserEvent::Failed { message }) => assert!(message.contains("missing.json")),
            other => panic!("unexpected parser event: {other:?}"),
        }
    }

    #[test]
    fn parser_thread_delivers_contest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("standings.json");
        std::fs::write(&path, SNAPSHOT).expect("write snapshot");

        let rx = spawn_snapshot_parser(path.display().to_string(), minutes_config());

        assert!(matches!(rx.recv(), Ok(ParserEvent::Started)));
        match rx.recv() {
            Ok(ParserEvent::Finished {
                session_count,
                hidden_count,
                ..
            }) => {
                assert_eq!(session_count, 2);
                assert_eq!(hidden_count, 2);
            }
            other => panic!("unexpected parser event: {other:?}"),
        }
    }
}
