//! Interactive chat loop and terminal rendering

use crate::chat::{ChatSession, SendOptions, SendOutcome};
use crate::error::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Run the interactive chat loop until EOF or a quit command.
pub async fn run(session: &mut ChatSession, options: &SendOptions) -> Result<()> {
    println!();
    println!("============================================================");
    println!("GuardChat - guardrailed LLM chat");
    println!("============================================================");
    println!("Type your messages ('quit'/'exit' to end, 'reset' to clear history)");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input.to_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "reset" => {
                session.reset();
                println!("Conversation history cleared.");
                println!();
                continue;
            }
            _ => {}
        }

        let outcome = session.send(input, options).await;
        render_outcome(&outcome);
    }

    println!();
    println!("Goodbye!");
    Ok(())
}

/// Print a send outcome; rejections list every violation, not just the first.
pub fn render_outcome(outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Reply(content) => {
            println!();
            println!("Assistant:");
            println!("{}", content);
            println!();
        }
        SendOutcome::Rejected(violations) => {
            println!();
            println!("⚠ Content safety policy violation");
            println!("Detected policy violations:");
            for violation in violations {
                if violation.score > 0.0 {
                    println!(
                        "  • {} (confidence: {:.1}%)",
                        violation.display_name(),
                        violation.score * 100.0
                    );
                } else {
                    println!("  • {}", violation.display_name());
                }
            }
            println!("Please revise your message to comply with the content safety policy.");
            println!();
        }
        SendOutcome::Failed { status, detail } => {
            println!();
            match status {
                Some(status) => println!("✗ API error ({}): {}", status, detail),
                None => println!("✗ Transport error: {}", detail),
            }
            println!();
        }
    }
}

/// Process exit code for a single-message invocation
pub fn outcome_exit_code(outcome: &SendOutcome) -> u8 {
    match outcome {
        SendOutcome::Reply(_) => 0,
        // Rejections are reported distinctly from transport faults
        SendOutcome::Rejected(_) => 2,
        SendOutcome::Failed { .. } => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::GuardrailViolation;

    #[test]
    fn test_exit_codes_distinguish_outcomes() {
        assert_eq!(outcome_exit_code(&SendOutcome::Reply("ok".to_string())), 0);
        assert_eq!(
            outcome_exit_code(&SendOutcome::Rejected(vec![GuardrailViolation {
                category: "prompt_injection".to_string(),
                score: 0.9,
            }])),
            2
        );
        assert_eq!(
            outcome_exit_code(&SendOutcome::Failed {
                status: Some(500),
                detail: "boom".to_string(),
            }),
            1
        );
    }
}
