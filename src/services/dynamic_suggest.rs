//! On-demand suggestion sources bound to keybindings.
//!
//! A producer is an async function returning partial completion items. When
//! its keybinding fires, the registry awaits the producer, registers a
//! one-shot completion source with the host and opens the suggestion popup.
//! The source delivers its list exactly once and is disposed on the next
//! [`DynamicSuggestRegistry::tick`], which leaves the editor time to expand
//! snippet placeholders in the accepted item.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::host::{EditorHost, SourceHandle};
use crate::model::tag::CompletionKind;
use crate::primitives::highlighter::PromptLanguage;
use crate::services::completion::{CompletionList, ReplaceRange, Suggestion, SuggestionOrigin};

/// Error reported by a suggestion producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestError {
    /// The producer could not fetch or build its items
    Producer(String),
    /// The producer gave up before finishing
    Cancelled,
}

impl fmt::Display for SuggestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer(msg) => write!(f, "Suggestion producer failed: {}", msg),
            Self::Cancelled => write!(f, "Suggestion producer was cancelled"),
        }
    }
}

impl std::error::Error for SuggestError {}

/// A completion item as returned by a producer; missing fields get defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSuggestion {
    pub label: String,
    /// Defaults to the label
    pub insert_text: Option<String>,
    /// Defaults to [`CompletionKind::Text`]
    pub kind: Option<CompletionKind>,
    pub detail: Option<String>,
    pub documentation: Option<String>,
}

impl PartialSuggestion {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Fill in defaults and anchor the item at `range`.
    pub fn complete(self, range: ReplaceRange) -> Suggestion {
        let insert_text = self.insert_text.unwrap_or_else(|| self.label.clone());
        Suggestion {
            label: self.label,
            detail: self.detail,
            description: None,
            documentation: self.documentation,
            insert_text,
            kind: self.kind.unwrap_or_default(),
            range,
            origin: SuggestionOrigin::Dynamic,
        }
    }
}

/// Source of dynamic suggestions
#[async_trait]
pub trait SuggestProducer: Send + Sync {
    async fn produce(&self) -> Result<Vec<PartialSuggestion>, SuggestError>;
}

/// Boxed future returned by closure producers
pub type ProduceFuture =
    Pin<Box<dyn Future<Output = Result<Vec<PartialSuggestion>, SuggestError>> + Send>>;

/// Producer backed by a closure returning a future
pub struct FnProducer<F> {
    f: F,
}

/// Wrap a closure as a [`SuggestProducer`].
pub fn producer_fn<F>(f: F) -> FnProducer<F>
where
    F: Fn() -> ProduceFuture + Send + Sync,
{
    FnProducer { f }
}

#[async_trait]
impl<F> SuggestProducer for FnProducer<F>
where
    F: Fn() -> ProduceFuture + Send + Sync,
{
    async fn produce(&self) -> Result<Vec<PartialSuggestion>, SuggestError> {
        (self.f)().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Pending,
    Delivered,
    Disposed,
}

/// One-shot completion source opened by a trigger.
#[derive(Debug)]
pub struct DynamicSuggestSession {
    id: String,
    handles: Vec<SourceHandle>,
    suggestions: Vec<Suggestion>,
    state: SessionState,
}

impl DynamicSuggestSession {
    pub fn new(id: &str, handles: Vec<SourceHandle>, suggestions: Vec<Suggestion>) -> Self {
        Self {
            id: id.to_string(),
            handles,
            suggestions,
            state: SessionState::Pending,
        }
    }

    /// Id of the registration that opened this session
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owns(&self, handle: SourceHandle) -> bool {
        self.handles.contains(&handle)
    }

    /// Deliver the suggestion list. Only the first call returns it.
    pub fn invoke(&mut self) -> Option<CompletionList> {
        if self.state != SessionState::Pending {
            return None;
        }
        self.state = SessionState::Delivered;
        Some(CompletionList {
            suggestions: std::mem::take(&mut self.suggestions),
        })
    }

    /// Unregister the session's completion sources. Safe to call repeatedly.
    pub fn dispose(&mut self, host: &mut dyn EditorHost) {
        if self.state == SessionState::Disposed {
            return;
        }
        for handle in self.handles.drain(..) {
            host.dispose_completion_source(handle);
        }
        self.suggestions.clear();
        self.state = SessionState::Disposed;
    }

    pub fn is_delivered(&self) -> bool {
        self.state == SessionState::Delivered
    }

    pub fn is_disposed(&self) -> bool {
        self.state == SessionState::Disposed
    }
}

/// Result of [`DynamicSuggestRegistry::trigger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A session was opened with this many suggestions
    Opened(usize),
    /// The producer failed; nothing was shown
    Failed,
    /// No producer is registered under the id
    Unknown,
}

struct Registration {
    id: String,
    keybinding: String,
    producer: Arc<dyn SuggestProducer>,
}

/// Registered producers and the currently open session.
pub struct DynamicSuggestRegistry {
    registrations: Vec<Registration>,
    session: Option<DynamicSuggestSession>,
    language_ids: Vec<String>,
}

impl Default for DynamicSuggestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicSuggestRegistry {
    /// Registry whose sessions are offered for both prompt languages.
    pub fn new() -> Self {
        Self::with_languages(PromptLanguage::ALL.iter().map(|lang| lang.id().to_string()).collect())
    }

    pub fn with_languages(language_ids: Vec<String>) -> Self {
        Self {
            registrations: Vec::new(),
            session: None,
            language_ids,
        }
    }

    /// Register a producer, replacing any existing one with the same id.
    pub fn register(&mut self, id: &str, keybinding: &str, producer: Arc<dyn SuggestProducer>) {
        self.unregister(id);
        tracing::debug!("Registered dynamic suggest \"{}\" on {}", id, keybinding);
        self.registrations.push(Registration {
            id: id.to_string(),
            keybinding: keybinding.to_string(),
            producer,
        });
    }

    /// Remove a producer. Returns whether it was registered.
    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }

    /// Id registered for a keybinding
    pub fn id_for_keybinding(&self, keybinding: &str) -> Option<&str> {
        self.registrations
            .iter()
            .find(|r| r.keybinding == keybinding)
            .map(|r| r.id.as_str())
    }

    /// Registered ids with their keybindings, in registration order
    pub fn bindings(&self) -> Vec<(&str, &str)> {
        self.registrations
            .iter()
            .map(|r| (r.id.as_str(), r.keybinding.as_str()))
            .collect()
    }

    /// The open session, if any
    pub fn session(&self) -> Option<&DynamicSuggestSession> {
        self.session.as_ref()
    }

    /// Run the producer registered under `id` and open a session for it.
    pub async fn trigger(&mut self, id: &str, host: &mut dyn EditorHost) -> TriggerOutcome {
        self.dispose_session(host);

        let Some(producer) = self
            .registrations
            .iter()
            .find(|r| r.id == id)
            .map(|r| Arc::clone(&r.producer))
        else {
            tracing::warn!("No dynamic suggest registered as \"{}\"", id);
            return TriggerOutcome::Unknown;
        };

        let items = match producer.produce().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Dynamic suggest \"{}\" failed: {}", id, e);
                return TriggerOutcome::Failed;
            }
        };

        let range = ReplaceRange::at(host.cursor().position);
        let suggestions: Vec<Suggestion> = items
            .into_iter()
            .map(|item| item.complete(range))
            .collect();
        let count = suggestions.len();

        let handles = self
            .language_ids
            .iter()
            .map(|language| host.register_completion_source(language))
            .collect();
        self.session = Some(DynamicSuggestSession::new(id, handles, suggestions));
        host.trigger_suggest();

        tracing::debug!("Dynamic suggest \"{}\" opened with {} items", id, count);
        TriggerOutcome::Opened(count)
    }

    /// Completion request routed to `handle`.
    ///
    /// `None` when the handle does not belong to the open session. The list
    /// is delivered once; later requests get an empty list.
    pub fn provide(&mut self, handle: SourceHandle) -> Option<CompletionList> {
        let session = self.session.as_mut().filter(|s| s.owns(handle))?;
        Some(session.invoke().unwrap_or_default())
    }

    /// Dispose a session whose list has been delivered.
    ///
    /// Returns whether a session was disposed.
    pub fn tick(&mut self, host: &mut dyn EditorHost) -> bool {
        if !self.session.as_ref().is_some_and(DynamicSuggestSession::is_delivered) {
            return false;
        }
        self.dispose_session(host);
        true
    }

    /// Dispose the open session, delivered or not.
    pub fn dispose_session(&mut self, host: &mut dyn EditorHost) {
        if let Some(mut session) = self.session.take() {
            session.dispose(host);
        }
    }
}
