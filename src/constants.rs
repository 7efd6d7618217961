// Defaults for the proxy and the client, overridable from the environment.

use std::env;

/// Questions returned when the upstream service does not provide any.
pub const FALLBACK_QUESTIONS: [&str; 3] = [
    "What framework do you want to use for this project?",
    "Do you want to add any database integration?",
    "Should the UI be responsive?",
];

/// Code returned by the proxy when the upstream service does not provide any.
pub const FALLBACK_CODE: &str = "Generated code based on the answers provided.";

/// Code the client shows when the proxy response carries none.
pub const NO_CODE_GENERATED: &str = "No code generated";

/// Error text used when a failure has no description of its own.
pub const UNKNOWN_ERROR: &str = "unknown error";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ARTIFACT_NAME: &str = "generated_code.txt";

lazy_static::lazy_static! {
    pub static ref UPSTREAM_URL: String = env::var("DESAAS_UPSTREAM_URL")
        .unwrap_or_else(|_| "https://mirxakamran893-LOGIQCURVECHATIQBOT.hf.space/chat".to_string());
    // Where the `build` subcommand finds a running proxy.
    pub static ref PROXY_URL: String = env::var("DESAAS_PROXY_URL")
        .unwrap_or_else(|_| format!("http://127.0.0.1:{}", DEFAULT_PORT));
}
