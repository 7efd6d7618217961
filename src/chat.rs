// Terminal rendition of the builder page: prompt, questions, answers, code.

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use desaas::client::{BuilderSession, ImageAttachment, ProxyClient};

pub struct BuildOptions {
    pub proxy_url: String,
    pub prompt: Option<String>,
    pub screenshot: Option<PathBuf>,
    pub answers: Vec<String>,
    pub output: PathBuf,
}

fn read_line(stdin: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    stdin.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub async fn run_build_session(options: BuildOptions) -> Result<PathBuf> {
    let client = ProxyClient::new(&options.proxy_url);
    info!(endpoint = client.endpoint(), "Starting build session");
    let mut session = BuilderSession::new(client);
    let mut stdin = io::stdin().lock();

    let prompt = match options.prompt {
        Some(prompt) => prompt,
        None => read_line(&mut stdin, "Describe the UI screen you want to create: ")?,
    };
    session.set_prompt(prompt);

    if let Some(path) = options.screenshot.as_deref() {
        let image = ImageAttachment::from_path(path)
            .await
            .with_context(|| format!("Failed to read screenshot {}", path.display()))?;
        println!("Attached {} ({} bytes)", image.file_name, image.bytes.len());
        session.attach_image(image);
    }

    let questions = session
        .start_building()
        .await
        .context("Failed to fetch clarifying questions")?
        .to_vec();

    let mut scripted = options.answers.into_iter();
    for (index, question) in questions.iter().enumerate() {
        let answer = match scripted.next() {
            Some(answer) => {
                println!("{}\n> {}", question, answer);
                answer
            }
            None => read_line(&mut stdin, &format!("{}\n> ", question))?,
        };
        session.answer(index, answer);
    }

    let code = session
        .generate_code()
        .await
        .context("Failed to generate code")?;
    println!("\n{}\n", code);

    let saved = session
        .save_code(Path::new(&options.output))
        .await
        .with_context(|| format!("Failed to write {}", options.output.display()))?;
    println!("Saved to {}", saved.display());
    Ok(saved)
}
