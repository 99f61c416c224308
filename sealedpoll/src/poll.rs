use crate::*;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Poll identifier
///
/// Assigned from a strictly increasing sequence starting at zero.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PollId(pub u64);

impl std::fmt::Display for PollId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a poll
///
/// States only ever advance: Open -> Closed -> Revealed.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Open,
    Closed,
    Revealed,
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            PollState::Open => "open",
            PollState::Closed => "closed",
            PollState::Revealed => "revealed",
        };
        write!(f, "{}", name)
    }
}

/// A poll and its lifecycle state
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Poll {
    pub id: PollId,

    /// The only identity allowed to close the poll and reveal its results
    pub creator: Identity,

    pub question: String,

    /// Option labels. A ballot encrypts an index into this list.
    pub options: Vec<String>,

    pub created_at: Timestamp,
    pub end_time: Timestamp,

    pub state: PollState,

    /// Number of accepted ballots
    pub vote_count: u64,

    /// Per-option counts, aligned with `options`. Only present once revealed.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<u64>>,
}

impl Poll {
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    /// Whether a ballot submitted at `now` may be accepted
    pub fn is_open_at(&self, now: Timestamp) -> bool {
        self.state == PollState::Open && now < self.end_time
    }

    /// Revealed results keyed by option label, in option order
    pub fn labeled_results(&self) -> Option<IndexMap<String, u64>> {
        let results = self.results.as_ref()?;
        Some(
            self.options
                .iter()
                .cloned()
                .zip(results.iter().copied())
                .collect(),
        )
    }

    pub(crate) fn require_creator(&self, caller: &Identity) -> Result<(), Error> {
        if *caller != self.creator {
            return Err(Error::Unauthorized {
                poll_id: self.id,
                caller: *caller,
            });
        }
        Ok(())
    }

    pub(crate) fn require_state(&self, expected: PollState) -> Result<(), Error> {
        if self.state != expected {
            return Err(Error::InvalidState {
                poll_id: self.id,
                actual: self.state,
                expected,
            });
        }
        Ok(())
    }

    /// Open -> Closed
    pub(crate) fn close(&mut self) -> Result<(), Error> {
        self.require_state(PollState::Open)?;
        self.state = PollState::Closed;
        Ok(())
    }

    /// Closed -> Revealed, recording `counts` as the permanent results
    pub(crate) fn reveal(&mut self, counts: Vec<u64>) -> Result<(), Error> {
        self.require_state(PollState::Closed)?;

        if counts.len() != self.options.len() {
            return Err(Error::TallyMismatch {
                poll_id: self.id,
                reason: format!(
                    "{} counts for {} options",
                    counts.len(),
                    self.options.len()
                ),
            });
        }
        match checked_total(&counts) {
            Some(total) if total == self.vote_count => {}
            Some(total) => {
                return Err(Error::TallyMismatch {
                    poll_id: self.id,
                    reason: format!(
                        "counts sum to {} but {} ballots were accepted",
                        total, self.vote_count
                    ),
                });
            }
            None => {
                return Err(Error::TallyMismatch {
                    poll_id: self.id,
                    reason: "counts overflow".to_owned(),
                });
            }
        }

        self.results = Some(counts);
        self.state = PollState::Revealed;
        Ok(())
    }
}

/// Sum of `counts`, or `None` if it does not fit in a u64
pub(crate) fn checked_total(counts: &[u64]) -> Option<u64> {
    counts.iter().try_fold(0u64, |acc, count| acc.checked_add(*count))
}

/// Parameters for a new poll
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PollSpec {
    pub question: String,
    pub options: Vec<String>,

    /// Seconds from creation until voting ends
    pub duration: u64,
}

impl PollSpec {
    pub fn new<Q, O, S>(question: Q, options: O, duration: u64) -> Self
    where
        Q: Into<String>,
        O: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PollSpec {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            duration,
        }
    }

    /// Check the poll parameters against the configured limits
    pub fn validate(&self, settings: &Settings) -> Result<(), Error> {
        if self.question.trim().is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_owned()));
        }
        if self.question.len() > settings.max_question_len {
            return Err(Error::InvalidInput(format!(
                "question is longer than {} bytes",
                settings.max_question_len
            )));
        }

        if self.options.len() < 2 {
            return Err(Error::InvalidInput(
                "a poll needs at least 2 options".to_owned(),
            ));
        }
        if self.options.len() > settings.max_options {
            return Err(Error::InvalidInput(format!(
                "a poll may have at most {} options",
                settings.max_options
            )));
        }

        let mut seen = HashSet::with_capacity(self.options.len());
        for option in self.options.iter() {
            if option.trim().is_empty() {
                return Err(Error::InvalidInput(
                    "option labels must not be empty".to_owned(),
                ));
            }
            if !seen.insert(option.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate option label {:?}",
                    option
                )));
            }
        }

        if self.duration == 0 {
            return Err(Error::InvalidInput("duration must be positive".to_owned()));
        }
        if let Some(max) = settings.max_duration_secs {
            if self.duration > max {
                return Err(Error::InvalidInput(format!(
                    "duration may be at most {} seconds",
                    max
                )));
            }
        }

        Ok(())
    }
}
