//! Client side of the two-phase builder flow.
//!
//! A [`BuilderSession`] holds what the user entered (prompt, screenshot,
//! answers) plus a single [`SessionState`]. The state only moves through
//! [`transition`], a pure function of the current state and an event, so a
//! session can never be "processing" and "generated" at the same time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::constants::NO_CODE_GENERATED;
use crate::conversation::{lenient_string, Conversation, ConversationTurn};
use crate::error::{ClientError, ErrorResponse};
use crate::proxy::ChatRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Questions,
    Generation,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingQuestions,
    AwaitingAnswers {
        questions: Vec<String>,
    },
    Generating {
        questions: Vec<String>,
    },
    Generated {
        questions: Vec<String>,
        code: String,
    },
    Failed {
        stage: Stage,
        error: String,
        questions: Vec<String>,
    },
}

impl SessionState {
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingQuestions | SessionState::Generating { .. }
        )
    }

    pub fn questions(&self) -> &[String] {
        match self {
            SessionState::AwaitingAnswers { questions }
            | SessionState::Generating { questions }
            | SessionState::Generated { questions, .. }
            | SessionState::Failed { questions, .. } => questions,
            SessionState::Idle | SessionState::AwaitingQuestions => &[],
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            SessionState::Generated { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingQuestions => "awaiting-questions",
            SessionState::AwaitingAnswers { .. } => "awaiting-answers",
            SessionState::Generating { .. } => "generating",
            SessionState::Generated { .. } => "generated",
            SessionState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Submit,
    QuestionsReceived(Vec<String>),
    RequestGeneration,
    CodeReceived(String),
    RequestFailed(String),
    Reset,
}

/// Events that do not apply to `state` return it unchanged.
pub fn transition(state: SessionState, event: SessionEvent) -> SessionState {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        (S::Idle, E::Submit)
        | (
            S::Failed {
                stage: Stage::Questions,
                ..
            },
            E::Submit,
        ) => S::AwaitingQuestions,

        (S::AwaitingQuestions, E::QuestionsReceived(questions)) => S::AwaitingAnswers { questions },
        (S::AwaitingQuestions, E::RequestFailed(error)) => S::Failed {
            stage: Stage::Questions,
            error,
            questions: Vec::new(),
        },

        (S::AwaitingAnswers { questions }, E::RequestGeneration)
        | (S::Generated { questions, .. }, E::RequestGeneration)
        | (
            S::Failed {
                stage: Stage::Generation,
                questions,
                ..
            },
            E::RequestGeneration,
        ) => S::Generating { questions },

        (S::Generating { questions }, E::CodeReceived(code)) => S::Generated { questions, code },
        (S::Generating { questions }, E::RequestFailed(error)) => S::Failed {
            stage: Stage::Generation,
            error,
            questions,
        },

        // Also clears a processing state left behind by a dropped request.
        (_, E::Reset) => S::Idle,

        (state, _) => state,
    }
}

/// Answers keyed by question index. Unanswered questions are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSet {
    answers: BTreeMap<usize, String>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blank answers clear the entry.
    pub fn set(&mut self, index: usize, answer: impl Into<String>) {
        let answer = answer.into();
        if answer.trim().is_empty() {
            self.answers.remove(&index);
        } else {
            self.answers.insert(index, answer);
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn clear(&mut self) {
        self.answers.clear();
    }

    /// `Q:`/`A:` blocks for answered questions, in question order.
    pub fn render(&self, questions: &[String]) -> String {
        self.answers
            .iter()
            .filter_map(|(index, answer)| {
                questions
                    .get(*index)
                    .map(|question| format!("Q: {}\nA: {}", question, answer))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            media_type: media_type_for(path),
            file_name,
            bytes,
        })
    }
}

fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Proxy reply as the client sees it: both fields may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub questions: Option<Vec<String>>,
    /// Non-string values keep their JSON text; `null` reads as empty.
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: Client,
    endpoint: String,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn chat(&self, messages: Vec<ConversationTurn>) -> Result<ChatReply, ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&ChatRequest { messages })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let error = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(ClientError::Status {
                status: status.as_u16(),
                error,
            });
        }

        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

pub struct BuilderSession {
    client: ProxyClient,
    prompt: String,
    image: Option<ImageAttachment>,
    answers: AnswerSet,
    state: SessionState,
}

impl BuilderSession {
    pub fn new(client: ProxyClient) -> Self {
        Self {
            client,
            prompt: String::new(),
            image: None,
            answers: AnswerSet::new(),
            state: SessionState::Idle,
        }
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Kept locally; the chat contract only carries text.
    pub fn attach_image(&mut self, image: ImageAttachment) {
        self.image = Some(image);
    }

    pub fn image(&self) -> Option<&ImageAttachment> {
        self.image.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_processing(&self) -> bool {
        self.state.is_processing()
    }

    pub fn questions(&self) -> &[String] {
        self.state.questions()
    }

    pub fn code(&self) -> Option<&str> {
        self.state.code()
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn answer(&mut self, index: usize, answer: impl Into<String>) {
        self.answers.set(index, answer);
    }

    pub fn reset(&mut self) {
        self.apply(SessionEvent::Reset);
        if self.state == SessionState::Idle {
            self.answers.clear();
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        let previous = self.state.name();
        self.state = transition(std::mem::take(&mut self.state), event);
        debug!(from = previous, to = self.state.name(), "Session transition");
    }

    /// Phase one: send the prompt and store the clarifying questions.
    pub async fn start_building(&mut self) -> Result<&[String], ClientError> {
        if self.is_processing() {
            return Err(ClientError::Busy);
        }
        if self.prompt.trim().is_empty() {
            return Err(ClientError::EmptyPrompt);
        }
        self.apply(SessionEvent::Submit);
        if self.state != SessionState::AwaitingQuestions {
            return Err(ClientError::NotReady("questions"));
        }

        info!(has_image = self.image.is_some(), "Requesting clarifying questions");
        let turns = vec![ConversationTurn::user(self.prompt.clone())];
        match self.client.chat(turns).await {
            Ok(reply) => {
                self.answers.clear();
                let questions = reply.questions.unwrap_or_default();
                self.apply(SessionEvent::QuestionsReceived(questions));
                Ok(self.questions())
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch questions");
                self.apply(SessionEvent::RequestFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// The conversation sent for phase two.
    pub fn generation_conversation(&self) -> Conversation {
        let questions = self.questions();
        let mut conversation = Conversation::new();
        conversation.push(ConversationTurn::user(self.prompt.clone()));
        conversation.push(ConversationTurn::assistant(questions.join("\n")));
        conversation.push(ConversationTurn::user(self.answers.render(questions)));
        conversation
    }

    /// Phase two: send the answers and store the generated code.
    pub async fn generate_code(&mut self) -> Result<&str, ClientError> {
        if self.is_processing() {
            return Err(ClientError::Busy);
        }
        let conversation = self.generation_conversation();
        self.apply(SessionEvent::RequestGeneration);
        if !matches!(self.state, SessionState::Generating { .. }) {
            return Err(ClientError::NotReady("code generation"));
        }

        info!(answered = self.answers.len(), "Requesting code generation");
        match self.client.chat(conversation.turns().to_vec()).await {
            Ok(reply) => {
                let code = if reply.code.is_empty() {
                    NO_CODE_GENERATED.to_string()
                } else {
                    reply.code
                };
                self.apply(SessionEvent::CodeReceived(code));
                Ok(self.code().unwrap_or(NO_CODE_GENERATED))
            }
            Err(e) => {
                warn!(error = %e, "Failed to generate code");
                self.apply(SessionEvent::RequestFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Writes the generated code as a plain-text file.
    pub async fn save_code(&self, path: &Path) -> std::io::Result<PathBuf> {
        let code = self.code().unwrap_or(NO_CODE_GENERATED);
        tokio::fs::write(path, code).await?;
        Ok(path.to_path_buf())
    }
}
