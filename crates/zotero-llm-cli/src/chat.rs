//! Terminal front end for the per-paper QA session.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

use zotero_llm_core::{format_count, Document, DocumentStore, GenerationBackend};
use zotero_llm_tasks::{search_papers, PromptLibrary, QaSession, ShutdownSignal};

const RULE: &str = "================================================================================";

struct Terminal {
    lines: Lines<BufReader<Stdin>>,
}

impl Terminal {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `prompt` and read one trimmed line. `None` on end of input.
    async fn read(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        let line = self.lines.next_line().await.context("failed to read input")?;
        Ok(line.map(|l| l.trim().to_string()))
    }

    /// Like [`read`](Self::read), but `None` as soon as shutdown is requested.
    async fn read_or_stop(
        &mut self,
        prompt: &str,
        shutdown: &ShutdownSignal,
    ) -> anyhow::Result<Option<String>> {
        if shutdown.is_triggered() {
            return Ok(None);
        }
        tokio::select! {
            line = self.read(prompt) => line,
            _ = shutdown.triggered() => Ok(None),
        }
    }
}

fn year_of(paper: &Document) -> Option<&str> {
    paper
        .extra
        .get("date")
        .and_then(|v| v.as_str())
        .and_then(|d| d.get(..4))
}

fn print_results(papers: &[Document]) {
    println!("\n{}\nSEARCH RESULTS:\n{}", RULE, RULE);
    for (idx, paper) in papers.iter().enumerate() {
        println!("\n{}. {}", idx + 1, paper.display_title());
        println!("   Authors: {}", paper.author_names());
        if let Some(year) = year_of(paper) {
            println!("   Year: {}", year);
        }
    }
    println!("\n{}", RULE);
}

async fn choose(terminal: &mut Terminal, papers: Vec<Document>) -> anyhow::Result<Option<Document>> {
    loop {
        let Some(choice) = terminal.read("\nEnter paper number (or 'q' to quit): ").await? else {
            return Ok(None);
        };
        if choice.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match choice.parse::<usize>() {
            Ok(n) if (1..=papers.len()).contains(&n) => {
                return Ok(papers.into_iter().nth(n - 1));
            }
            Ok(_) => println!("Please enter a number between 1 and {}", papers.len()),
            Err(_) => println!("Please enter a valid number or 'q' to quit"),
        }
    }
}

/// Search, pick a paper, converse, and optionally save the transcript.
pub async fn run(
    store: Arc<dyn DocumentStore>,
    backend: Arc<dyn GenerationBackend>,
    prompts: &PromptLibrary,
    shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    let mut terminal = Terminal::new();
    println!("\n{}\nZOTERO LLM Q&A SESSION\n{}", RULE, RULE);

    let query = match terminal.read("\nEnter paper title to search: ").await? {
        Some(q) if !q.is_empty() => q,
        _ => {
            println!("No title provided. Exiting...");
            return Ok(());
        }
    };

    let papers = search_papers(store.as_ref(), &query).await?;
    if papers.is_empty() {
        println!("\nNo papers found matching '{}'", query);
        return Ok(());
    }
    print_results(&papers);

    let Some(paper) = choose(&mut terminal, papers).await? else {
        println!("\nNo paper selected. Exiting...");
        return Ok(());
    };

    println!("\nLoading paper: {}", paper.display_title());
    let mut session = QaSession::load(store, backend, prompts, paper).await?;
    if session.has_fulltext() {
        println!(
            "Paper word count: {} words, ~{} tokens",
            format_count(session.word_count()),
            format_count(session.estimated_tokens())
        );
    } else {
        println!("\nWarning: Could not retrieve full text for this paper.");
        println!("The Q&A will be based on metadata and abstract only.");
    }

    println!("\n{}\nQ&A SESSION: {}\n{}", RULE, session.paper().display_title(), RULE);
    println!("\nAsk questions about this paper. Press Ctrl+C or Ctrl+D to end the conversation.");

    while let Some(question) = terminal.read_or_stop("\nYou: ", &shutdown).await? {
        if question.is_empty() {
            continue;
        }
        let answer = tokio::select! {
            answer = session.ask(&question) => answer,
            _ = shutdown.triggered() => break,
        };
        match answer {
            Ok(answer) => println!("\nAssistant: {}", answer),
            Err(e) => {
                warn!(error = %e, "Question failed");
                println!("\nError calling LLM: {}", e);
            }
        }
    }
    println!("\n\n[Conversation ended]");

    save_prompt(&mut terminal, &session).await?;
    println!("\n{}\nSession ended. Goodbye!\n{}", RULE, RULE);
    Ok(())
}

async fn save_prompt(terminal: &mut Terminal, session: &QaSession) -> anyhow::Result<()> {
    if session.history().is_empty() {
        println!("\nNo conversation to save.");
        return Ok(());
    }

    println!("\n{}", RULE);
    loop {
        let Some(choice) = terminal.read("Save this conversation as a note? (y/n): ").await? else {
            println!("\nConversation not saved.");
            return Ok(());
        };
        match choice.to_lowercase().as_str() {
            "y" | "yes" => break,
            "n" | "no" => {
                println!("Conversation not saved.");
                return Ok(());
            }
            _ => println!("Please enter 'y' or 'n'"),
        }
    }

    match session.save().await {
        Ok(outcome) if outcome.appended => println!("Conversation appended to existing 'LLM QA' note"),
        Ok(_) => println!("Conversation saved as new 'LLM QA' note"),
        Err(e) => {
            warn!(error = %e, "Failed to save conversation");
            println!("Error saving conversation: {}", e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_from_date_field() {
        let mut paper = Document::new("P1", "journalArticle");
        assert_eq!(year_of(&paper), None);
        paper
            .extra
            .insert("date".to_string(), serde_json::Value::String("2017-06-12".to_string()));
        assert_eq!(year_of(&paper), Some("2017"));
    }
}
