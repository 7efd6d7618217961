pub mod client;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod error;
pub mod proxy;
pub mod upstream;
pub mod web_server;

pub use client::{AnswerSet, BuilderSession, ProxyClient, SessionEvent, SessionState};
pub use config::{HistoryPolicy, ProxyConfig};
pub use conversation::{flatten_prompt, Conversation, ConversationTurn, Role};
pub use error::{ClientError, ErrorResponse, ProxyError};
pub use proxy::{ChatProxy, ChatRequest, ProxyResponse};
pub use web_server::{build_app, build_router, start_web_server, AppState};
