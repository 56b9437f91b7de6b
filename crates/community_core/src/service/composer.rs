//! Composer: draft fields, AI-assisted pre-fill and submit.
//!
//! # Invariants
//! - At most one AI-assist call is outstanding; extra calls return `Busy`.
//! - After an AI-assist call both draft fields are non-empty.
//! - Drafts are cleared only after a successful submit.

use crate::assist::{
    parse_suggestion, post_suggestion_request, GenerationError, GenerativeTextService,
    PostSuggestion,
};
use crate::model::post::PostId;
use crate::model::session::{author_label, Session};
use crate::service::feed::{FeedError, FeedSynchronizer};
use crate::store::DocumentStore;
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Title and rich-text body being composed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    /// HTML rich text.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistOutcome {
    /// Drafts now hold the generated suggestion.
    Generated,
    /// Generation failed; drafts hold the fixed fallback pair.
    Fallback(GenerationError),
    /// Another call is still outstanding; drafts untouched.
    Busy,
}

#[derive(Debug)]
pub enum SubmitError {
    /// Title is empty or an AI-assist call is in flight.
    NotReady,
    Feed(FeedError),
}

impl Display for SubmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady => write!(f, "draft is not ready to submit"),
            Self::Feed(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SubmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotReady => None,
            Self::Feed(err) => Some(err),
        }
    }
}

/// Clears the busy flag on drop, including when the call is cancelled.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Composer<G: GenerativeTextService + ?Sized> {
    generator: Arc<G>,
    draft: Mutex<Draft>,
    generating: AtomicBool,
    assist_timeout: Option<Duration>,
}

impl<G: GenerativeTextService + ?Sized> Composer<G> {
    pub fn new(generator: Arc<G>) -> Self {
        Self {
            generator,
            draft: Mutex::new(Draft::default()),
            generating: AtomicBool::new(false),
            assist_timeout: None,
        }
    }

    /// Bounds each AI-assist call; a timeout falls back like any failure.
    pub fn with_assist_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.assist_timeout = timeout;
        self
    }

    pub fn draft(&self) -> Draft {
        self.with_draft(|draft| draft.clone())
    }

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.with_draft(|draft| draft.title = title);
    }

    pub fn set_content(&self, content: impl Into<String>) {
        let content = content.into();
        self.with_draft(|draft| draft.content = content);
    }

    pub fn clear(&self) {
        self.with_draft(|draft| *draft = Draft::default());
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    /// Submit guard shown by the front end. The feed re-checks content.
    pub fn can_submit(&self) -> bool {
        !self.is_generating() && self.with_draft(|draft| !draft.title.trim().is_empty())
    }

    /// Pre-fills both draft fields from the generative text service.
    pub async fn ai_assist(&self) -> AssistOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.generating) else {
            debug!("event=ai_assist module=composer status=busy");
            return AssistOutcome::Busy;
        };
        info!("event=ai_assist module=composer status=start");

        let request = post_suggestion_request();
        let reply = match self.assist_timeout {
            Some(limit) => tokio::time::timeout(limit, self.generator.generate(&request))
                .await
                .unwrap_or(Err(GenerationError::Timeout(limit))),
            None => self.generator.generate(&request).await,
        };

        match reply.and_then(|value| parse_suggestion(&value)) {
            Ok(suggestion) => {
                self.fill(suggestion);
                info!("event=ai_assist module=composer status=ok");
                AssistOutcome::Generated
            }
            Err(err) => {
                error!("event=ai_assist module=composer status=fallback error={err}");
                self.fill(PostSuggestion::fallback());
                AssistOutcome::Fallback(err)
            }
        }
    }

    /// Sends the draft to `feed`, authored by `session`'s email.
    pub async fn submit<S: DocumentStore + ?Sized>(
        &self,
        feed: &FeedSynchronizer<S>,
        session: Option<&Session>,
    ) -> Result<PostId, SubmitError> {
        if !self.can_submit() {
            return Err(SubmitError::NotReady);
        }

        let Draft { title, content } = self.draft();
        let id = feed
            .create_post(&title, &content, &author_label(session))
            .await
            .map_err(SubmitError::Feed)?;
        self.clear();
        Ok(id)
    }

    fn fill(&self, suggestion: PostSuggestion) {
        self.with_draft(|draft| {
            draft.title = suggestion.title;
            draft.content = suggestion.content;
        });
    }

    fn with_draft<R>(&self, apply: impl FnOnce(&mut Draft) -> R) -> R {
        let mut draft = self.draft.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut draft)
    }
}
