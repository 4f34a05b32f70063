//! Polls: creation rules, one-vote-per-user voting, closure and result
//! visibility.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/* --------------------------------------------------------------------------
Constants
-------------------------------------------------------------------------- */

pub const MAX_QUESTION_LENGTH: usize = 500;
pub const MAX_OPTION_LENGTH: usize = 200;
pub const MAX_TEXT_RESPONSE_LENGTH: usize = 2000;
pub const MIN_CHOICE_OPTIONS: usize = 2;

/* --------------------------------------------------------------------------
Enumerations
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollType {
    SingleChoice,
    MultipleChoice,
    TextResponse,
    Rating,
    YesNo,
}

impl PollType {
    /// Every type except `text_response` is answered by picking an option.
    pub fn is_choice(&self) -> bool {
        !matches!(self, PollType::TextResponse)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowResults {
    Never,
    #[default]
    AfterVote,
    AfterClose,
    RealTime,
}

/* --------------------------------------------------------------------------
Entity
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub allow_change_vote: bool,
    pub show_results: ShowResults,
    pub require_login: bool,
    /// Seconds the poll stays open after creation.
    pub time_limit: Option<i64>,
    pub max_responses: Option<i32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            allow_change_vote: false,
            show_results: ShowResults::AfterVote,
            require_login: true,
            time_limit: None,
            max_responses: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voter {
    pub user_id: DbId,
    pub voted_at: Timestamp,
    /// Seconds the voter took to answer, as reported by the client.
    pub response_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    pub votes: i32,
    pub voters: Vec<Voter>,
}

impl PollOption {
    fn new(text: String) -> Self {
        Self {
            text,
            votes: 0,
            voters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResponse {
    pub user_id: DbId,
    pub response: String,
    pub submitted_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollResults {
    pub total_votes: i32,
    pub total_text_responses: i32,
    pub average_response_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: DbId,
    pub session_id: DbId,
    pub created_by: DbId,
    pub question: String,
    pub poll_type: PollType,
    pub options: Vec<PollOption>,
    pub text_responses: Vec<TextResponse>,
    pub settings: PollSettings,
    pub is_active: bool,
    pub is_anonymous: bool,
    pub expires_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub results: PollResults,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Fields supplied when creating a poll.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub question: String,
    pub poll_type: PollType,
    pub options: Vec<String>,
    pub settings: PollSettings,
    pub is_anonymous: bool,
    pub expires_at: Option<Timestamp>,
}

/// What a vote call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    /// `false` for a revote.
    pub first_participation: bool,
}

/* --------------------------------------------------------------------------
Validation
-------------------------------------------------------------------------- */

pub fn validate_question(question: &str) -> Result<(), CoreError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Poll question must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_QUESTION_LENGTH {
        return Err(CoreError::Validation(format!(
            "Poll question exceeds maximum length of {MAX_QUESTION_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Normalise the option list for a poll type.
fn normalise_options(poll_type: PollType, options: Vec<String>) -> Result<Vec<String>, CoreError> {
    if !poll_type.is_choice() {
        return Ok(Vec::new());
    }

    let options: Vec<String> = options
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if poll_type == PollType::YesNo && options.is_empty() {
        return Ok(vec!["Yes".to_string(), "No".to_string()]);
    }
    if options.len() < MIN_CHOICE_OPTIONS {
        return Err(CoreError::Validation(format!(
            "Choice polls need at least {MIN_CHOICE_OPTIONS} non-empty options"
        )));
    }
    if let Some(long) = options.iter().find(|o| o.chars().count() > MAX_OPTION_LENGTH) {
        return Err(CoreError::Validation(format!(
            "Option '{long}' exceeds maximum length of {MAX_OPTION_LENGTH} characters"
        )));
    }
    Ok(options)
}

/* --------------------------------------------------------------------------
Behaviour
-------------------------------------------------------------------------- */

impl Poll {
    /// Build an unsaved, active poll. The store assigns the id.
    pub fn new(
        input: NewPoll,
        session_id: DbId,
        created_by: DbId,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        validate_question(&input.question)?;
        if let Some(limit) = input.settings.time_limit {
            if limit <= 0 {
                return Err(CoreError::Validation("time_limit must be positive".into()));
            }
        }
        if let Some(max) = input.settings.max_responses {
            if max < 1 {
                return Err(CoreError::Validation("max_responses must be at least 1".into()));
            }
        }
        if let Some(expires_at) = input.expires_at {
            if expires_at <= now {
                return Err(CoreError::Validation("expires_at must be in the future".into()));
            }
        }

        let options = normalise_options(input.poll_type, input.options)?
            .into_iter()
            .map(PollOption::new)
            .collect();

        let expires_at = input.expires_at.or_else(|| {
            input
                .settings
                .time_limit
                .map(|secs| now + chrono::Duration::seconds(secs))
        });

        Ok(Self {
            id: 0,
            session_id,
            created_by,
            question: input.question.trim().to_string(),
            poll_type: input.poll_type,
            options,
            text_responses: Vec::new(),
            settings: input.settings,
            is_active: true,
            is_anonymous: input.is_anonymous,
            expires_at,
            closed_at: None,
            results: PollResults::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Expired means `expires_at` is strictly in the past.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Close an active poll whose expiry has passed. Returns `true` if closed.
    pub fn close_if_expired(&mut self, now: Timestamp) -> bool {
        if self.is_active && self.is_expired(now) {
            self.is_active = false;
            self.closed_at = Some(now);
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    pub fn ensure_open(&self, now: Timestamp) -> Result<(), CoreError> {
        if self.is_expired(now) {
            return Err(CoreError::PollExpired);
        }
        if !self.is_active {
            return Err(CoreError::PollInactive);
        }
        Ok(())
    }

    pub fn close(&mut self, now: Timestamp) -> Result<(), CoreError> {
        if !self.is_active {
            return Err(CoreError::AlreadyClosed);
        }
        self.is_active = false;
        self.closed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Index of the option the user voted for, if any.
    pub fn user_vote(&self, user_id: DbId) -> Option<usize> {
        self.options
            .iter()
            .position(|o| o.voters.iter().any(|v| v.user_id == user_id))
    }

    pub fn user_response(&self, user_id: DbId) -> Option<&TextResponse> {
        self.text_responses.iter().find(|r| r.user_id == user_id)
    }

    pub fn has_participated(&self, user_id: DbId) -> bool {
        self.user_vote(user_id).is_some() || self.user_response(user_id).is_some()
    }

    /// Distinct users that have voted or responded.
    pub fn participant_count(&self) -> usize {
        self.options.iter().map(|o| o.voters.len()).sum::<usize>() + self.text_responses.len()
    }

    fn ensure_capacity(&self) -> Result<(), CoreError> {
        if let Some(max) = self.settings.max_responses {
            if self.participant_count() >= max.max(0) as usize {
                return Err(CoreError::Conflict(format!(
                    "Poll has reached its maximum of {max} responses"
                )));
            }
        }
        Ok(())
    }

    /// Cast or move a vote on a choice poll.
    pub fn vote_choice(
        &mut self,
        user_id: DbId,
        option_index: i64,
        response_time: Option<f64>,
        now: Timestamp,
    ) -> Result<VoteOutcome, CoreError> {
        self.ensure_open(now)?;
        if !self.poll_type.is_choice() {
            return Err(CoreError::Validation(
                "This poll expects a text response".into(),
            ));
        }
        let len = self.options.len();
        let index = usize::try_from(option_index)
            .ok()
            .filter(|i| *i < len)
            .ok_or(CoreError::InvalidOption {
                index: option_index,
                len,
            })?;
        if let Some(rt) = response_time {
            if !rt.is_finite() || rt < 0.0 {
                return Err(CoreError::Validation(
                    "response_time must be a non-negative number".into(),
                ));
            }
        }

        let previous = self.user_vote(user_id);
        if previous.is_some() && !self.settings.allow_change_vote {
            return Err(CoreError::AlreadyVoted);
        }
        if previous.is_none() {
            self.ensure_capacity()?;
        }

        if let Some(prev) = previous {
            self.options[prev].voters.retain(|v| v.user_id != user_id);
        }
        self.options[index].voters.push(Voter {
            user_id,
            voted_at: now,
            response_time,
        });
        self.updated_at = now;
        self.recompute_results();
        Ok(VoteOutcome {
            first_participation: previous.is_none(),
        })
    }

    /// Submit or replace a text response.
    pub fn respond_text(
        &mut self,
        user_id: DbId,
        response: &str,
        now: Timestamp,
    ) -> Result<VoteOutcome, CoreError> {
        self.ensure_open(now)?;
        if self.poll_type != PollType::TextResponse {
            return Err(CoreError::Validation(
                "This poll expects an option_index".into(),
            ));
        }
        let text = response.trim();
        if text.is_empty() {
            return Err(CoreError::Validation("Text response must not be empty".into()));
        }
        if text.chars().count() > MAX_TEXT_RESPONSE_LENGTH {
            return Err(CoreError::Validation(format!(
                "Text response exceeds maximum length of {MAX_TEXT_RESPONSE_LENGTH} characters"
            )));
        }

        let existing = self
            .text_responses
            .iter()
            .position(|r| r.user_id == user_id);
        match existing {
            Some(_) if !self.settings.allow_change_vote => Err(CoreError::AlreadyResponded),
            Some(i) => {
                self.text_responses[i].response = text.to_string();
                self.text_responses[i].submitted_at = now;
                self.updated_at = now;
                self.recompute_results();
                Ok(VoteOutcome {
                    first_participation: false,
                })
            }
            None => {
                self.ensure_capacity()?;
                self.text_responses.push(TextResponse {
                    user_id,
                    response: text.to_string(),
                    submitted_at: now,
                });
                self.updated_at = now;
                self.recompute_results();
                Ok(VoteOutcome {
                    first_participation: true,
                })
            }
        }
    }

    /// Recompute vote counts and the results block from the voter lists.
    pub fn recompute_results(&mut self) {
        let mut total_votes = 0;
        let mut response_times = Vec::new();
        for option in self.options.iter_mut() {
            option.votes = option.voters.len() as i32;
            total_votes += option.votes;
            response_times.extend(option.voters.iter().filter_map(|v| v.response_time));
        }
        self.results = PollResults {
            total_votes,
            total_text_responses: self.text_responses.len() as i32,
            average_response_time: if response_times.is_empty() {
                None
            } else {
                Some(response_times.iter().sum::<f64>() / response_times.len() as f64)
            },
        };
    }

    /// Counts-only summary pushed to the session room.
    pub fn tally(&self) -> PollTally {
        PollTally {
            poll_id: self.id,
            options: self
                .options
                .iter()
                .map(|o| OptionTally {
                    text: o.text.clone(),
                    votes: o.votes,
                })
                .collect(),
            total_votes: self.results.total_votes,
            total_responses: self.results.total_text_responses,
        }
    }

    /// Whether a non-managing viewer may see counts right now.
    pub fn results_visible_to(&self, user_id: DbId) -> bool {
        match self.settings.show_results {
            ShowResults::RealTime => true,
            ShowResults::AfterVote => self.has_participated(user_id),
            ShowResults::AfterClose => !self.is_active,
            ShowResults::Never => false,
        }
    }

    /// Render the poll for a viewer, applying result visibility.
    pub fn view_for(&self, viewer: PollViewer) -> PollView {
        let (results_visible, show_identities, me) = match viewer {
            PollViewer::Manager => (true, !self.is_anonymous, None),
            PollViewer::Participant(user_id) => {
                (self.results_visible_to(user_id), false, Some(user_id))
            }
        };

        let options = self
            .options
            .iter()
            .map(|o| OptionView {
                text: o.text.clone(),
                votes: if results_visible { o.votes } else { 0 },
                voters: show_identities.then(|| o.voters.clone()),
            })
            .collect();

        let text_responses = if results_visible {
            self.text_responses
                .iter()
                .map(|r| TextResponseView {
                    user_id: show_identities.then_some(r.user_id),
                    response: r.response.clone(),
                    submitted_at: r.submitted_at,
                })
                .collect()
        } else {
            Vec::new()
        };

        PollView {
            id: self.id,
            session_id: self.session_id,
            created_by: self.created_by,
            question: self.question.clone(),
            poll_type: self.poll_type,
            options,
            text_responses,
            settings: self.settings.clone(),
            is_active: self.is_active,
            is_anonymous: self.is_anonymous,
            expires_at: self.expires_at,
            closed_at: self.closed_at,
            results: if results_visible {
                self.results.clone()
            } else {
                PollResults::default()
            },
            results_visible,
            my_vote: me.and_then(|id| self.user_vote(id)),
            my_response: me
                .and_then(|id| self.user_response(id))
                .map(|r| r.response.clone()),
            created_at: self.created_at,
        }
    }
}

/* --------------------------------------------------------------------------
Read models
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionTally {
    pub text: String,
    pub votes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollTally {
    pub poll_id: DbId,
    pub options: Vec<OptionTally>,
    pub total_votes: i32,
    pub total_responses: i32,
}

/// Who is looking at a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollViewer {
    /// Owning faculty or admin.
    Manager,
    Participant(DbId),
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub text: String,
    pub votes: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voters: Option<Vec<Voter>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextResponseView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<DbId>,
    pub response: String,
    pub submitted_at: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    pub id: DbId,
    pub session_id: DbId,
    pub created_by: DbId,
    pub question: String,
    pub poll_type: PollType,
    pub options: Vec<OptionView>,
    pub text_responses: Vec<TextResponseView>,
    pub settings: PollSettings,
    pub is_active: bool,
    pub is_anonymous: bool,
    pub expires_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub results: PollResults,
    pub results_visible: bool,
    pub my_vote: Option<usize>,
    pub my_response: Option<String>,
    pub created_at: Timestamp,
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn new_poll(poll_type: PollType, options: &[&str], settings: PollSettings) -> Poll {
        let mut poll = Poll::new(
            NewPoll {
                question: "  Which sorting algorithm is stable?  ".into(),
                poll_type,
                options: options.iter().map(|s| s.to_string()).collect(),
                settings,
                is_anonymous: false,
                expires_at: None,
            },
            1,
            10,
            t0(),
        )
        .unwrap();
        poll.id = 5;
        poll
    }

    fn choice_poll() -> Poll {
        new_poll(
            PollType::SingleChoice,
            &["Merge sort", "Quick sort", "Heap sort"],
            PollSettings::default(),
        )
    }

    fn revote_settings() -> PollSettings {
        PollSettings {
            allow_change_vote: true,
            ..Default::default()
        }
    }

    /// Every user appears at most once across all options and responses.
    fn assert_one_vote_per_user(poll: &Poll) {
        let mut seen = std::collections::HashSet::new();
        for option in &poll.options {
            assert_eq!(option.votes as usize, option.voters.len());
            for v in &option.voters {
                assert!(seen.insert(v.user_id), "user {} voted twice", v.user_id);
            }
        }
        for r in &poll.text_responses {
            assert!(seen.insert(r.user_id), "user {} responded twice", r.user_id);
        }
    }

    // -- Creation -----------------------------------------------------------

    #[test]
    fn create_trims_question_and_starts_active() {
        let poll = choice_poll();
        assert_eq!(poll.question, "Which sorting algorithm is stable?");
        assert!(poll.is_active);
        assert_eq!(poll.options.len(), 3);
        assert_eq!(poll.results, PollResults::default());
    }

    #[test]
    fn yes_no_autofills_options() {
        let poll = new_poll(PollType::YesNo, &[], PollSettings::default());
        let texts: Vec<_> = poll.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["Yes", "No"]);
    }

    #[test]
    fn choice_poll_needs_two_non_empty_options() {
        let err = Poll::new(
            NewPoll {
                question: "Q".into(),
                poll_type: PollType::SingleChoice,
                options: vec!["A".into(), "   ".into()],
                settings: PollSettings::default(),
                is_anonymous: false,
                expires_at: None,
            },
            1,
            10,
            t0(),
        )
        .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn text_response_ignores_options() {
        let poll = new_poll(PollType::TextResponse, &["ignored"], PollSettings::default());
        assert!(poll.options.is_empty());
    }

    #[test]
    fn empty_question_rejected() {
        assert!(validate_question("   ").is_err());
        assert!(validate_question(&"x".repeat(MAX_QUESTION_LENGTH + 1)).is_err());
        assert!(validate_question(&"x".repeat(MAX_QUESTION_LENGTH)).is_ok());
    }

    #[test]
    fn time_limit_sets_expiry() {
        let poll = new_poll(
            PollType::YesNo,
            &[],
            PollSettings {
                time_limit: Some(60),
                ..Default::default()
            },
        );
        assert_eq!(poll.expires_at, Some(t0() + Duration::seconds(60)));
    }

    // -- Voting -------------------------------------------------------------

    #[test]
    fn second_vote_without_revote_keeps_counts() {
        let mut poll = choice_poll();
        poll.vote_choice(100, 0, Some(4.0), t0()).unwrap();
        let err = poll.vote_choice(100, 1, None, t0()).unwrap_err();
        assert_matches!(err, CoreError::AlreadyVoted);
        assert_eq!(poll.options[0].votes, 1);
        assert_eq!(poll.options[1].votes, 0);
        assert_eq!(poll.results.total_votes, 1);
        assert_one_vote_per_user(&poll);
    }

    #[test]
    fn revote_moves_the_vote() {
        let mut poll = new_poll(PollType::SingleChoice, &["A", "B"], revote_settings());
        let first = poll.vote_choice(100, 0, None, t0()).unwrap();
        let second = poll.vote_choice(100, 1, None, t0()).unwrap();
        assert!(first.first_participation);
        assert!(!second.first_participation);
        assert_eq!(poll.options[0].votes, 0);
        assert_eq!(poll.options[1].votes, 1);
        assert_eq!(poll.results.total_votes, 1);
        assert_eq!(poll.user_vote(100), Some(1));
        assert_one_vote_per_user(&poll);
    }

    #[test]
    fn option_index_out_of_range() {
        let mut poll = choice_poll();
        assert_matches!(
            poll.vote_choice(100, 3, None, t0()),
            Err(CoreError::InvalidOption { index: 3, len: 3 })
        );
        assert_matches!(
            poll.vote_choice(100, -1, None, t0()),
            Err(CoreError::InvalidOption { .. })
        );
        assert_eq!(poll.participant_count(), 0);
    }

    #[test]
    fn inactive_poll_rejects_votes() {
        let mut poll = choice_poll();
        poll.close(t0()).unwrap();
        assert_matches!(poll.vote_choice(100, 0, None, t0()), Err(CoreError::PollInactive));
        assert_matches!(poll.close(t0()), Err(CoreError::AlreadyClosed));
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let mut poll = choice_poll();
        poll.expires_at = Some(t0());
        assert!(!poll.is_expired(t0()));
        assert!(poll.vote_choice(100, 0, None, t0()).is_ok());

        let later = t0() + Duration::milliseconds(1);
        assert!(poll.is_expired(later));
        assert_matches!(poll.vote_choice(101, 0, None, later), Err(CoreError::PollExpired));
        assert!(poll.close_if_expired(later));
        assert!(!poll.is_active);
        assert_eq!(poll.closed_at, Some(later));
        assert!(!poll.close_if_expired(later));
    }

    #[test]
    fn average_response_time() {
        let mut poll = choice_poll();
        poll.vote_choice(1, 0, Some(2.0), t0()).unwrap();
        poll.vote_choice(2, 1, Some(4.0), t0()).unwrap();
        poll.vote_choice(3, 1, None, t0()).unwrap();
        assert_eq!(poll.results.average_response_time, Some(3.0));
        assert_eq!(poll.results.total_votes, 3);
    }

    #[test]
    fn max_responses_caps_new_participants_only() {
        let mut poll = new_poll(
            PollType::SingleChoice,
            &["A", "B"],
            PollSettings {
                allow_change_vote: true,
                max_responses: Some(1),
                ..Default::default()
            },
        );
        poll.vote_choice(1, 0, None, t0()).unwrap();
        assert_matches!(poll.vote_choice(2, 0, None, t0()), Err(CoreError::Conflict(_)));
        assert!(poll.vote_choice(1, 1, None, t0()).is_ok());
    }

    #[test]
    fn text_responses_follow_revote_rules() {
        let mut poll = new_poll(PollType::TextResponse, &[], PollSettings::default());
        assert_matches!(
            poll.respond_text(1, "   ", t0()),
            Err(CoreError::Validation(_))
        );
        poll.respond_text(1, " Binary search ", t0()).unwrap();
        assert_eq!(poll.text_responses[0].response, "Binary search");
        assert_matches!(
            poll.respond_text(1, "Other", t0()),
            Err(CoreError::AlreadyResponded)
        );
        assert_eq!(poll.results.total_text_responses, 1);

        poll.settings.allow_change_vote = true;
        let outcome = poll.respond_text(1, "Other", t0()).unwrap();
        assert!(!outcome.first_participation);
        assert_eq!(poll.text_responses.len(), 1);
        assert_eq!(poll.user_response(1).unwrap().response, "Other");
        assert_one_vote_per_user(&poll);
    }

    #[test]
    fn wrong_answer_shape_is_rejected() {
        let mut text = new_poll(PollType::TextResponse, &[], PollSettings::default());
        assert_matches!(text.vote_choice(1, 0, None, t0()), Err(CoreError::Validation(_)));
        let mut choice = choice_poll();
        assert_matches!(choice.respond_text(1, "hi", t0()), Err(CoreError::Validation(_)));
    }

    // -- Visibility ---------------------------------------------------------

    #[test]
    fn after_vote_hides_counts_until_participation() {
        let mut poll = choice_poll();
        poll.vote_choice(1, 0, None, t0()).unwrap();

        let view = poll.view_for(PollViewer::Participant(2));
        assert!(!view.results_visible);
        assert!(view.options.iter().all(|o| o.votes == 0 && o.voters.is_none()));
        assert_eq!(view.results.total_votes, 0);

        let view = poll.view_for(PollViewer::Participant(1));
        assert!(view.results_visible);
        assert_eq!(view.options[0].votes, 1);
        assert!(view.options[0].voters.is_none());
        assert_eq!(view.my_vote, Some(0));
    }

    #[test]
    fn after_close_and_never() {
        let mut poll = new_poll(
            PollType::YesNo,
            &[],
            PollSettings {
                show_results: ShowResults::AfterClose,
                ..Default::default()
            },
        );
        poll.vote_choice(1, 0, None, t0()).unwrap();
        assert!(!poll.view_for(PollViewer::Participant(1)).results_visible);
        poll.close(t0()).unwrap();
        assert!(poll.view_for(PollViewer::Participant(1)).results_visible);

        poll.settings.show_results = ShowResults::Never;
        assert!(!poll.view_for(PollViewer::Participant(1)).results_visible);
        assert!(poll.view_for(PollViewer::Manager).results_visible);
    }

    #[test]
    fn manager_sees_voters_unless_anonymous() {
        let mut poll = choice_poll();
        poll.vote_choice(1, 2, None, t0()).unwrap();
        let view = poll.view_for(PollViewer::Manager);
        assert_eq!(view.options[2].voters.as_ref().unwrap()[0].user_id, 1);
        assert_eq!(view.my_vote, None);

        poll.is_anonymous = true;
        let view = poll.view_for(PollViewer::Manager);
        assert!(view.options[2].voters.is_none());
        assert_eq!(view.options[2].votes, 1);
    }

    #[test]
    fn tally_carries_counts_only() {
        let mut poll = choice_poll();
        poll.vote_choice(1, 1, None, t0()).unwrap();
        let tally = poll.tally();
        assert_eq!(tally.poll_id, 5);
        assert_eq!(tally.options[1], OptionTally { text: "Quick sort".into(), votes: 1 });
        assert_eq!(tally.total_votes, 1);
        assert_eq!(tally.total_responses, 0);
    }
}
