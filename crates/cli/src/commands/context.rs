//! `ragpilot context`: show what would be sent for a question.

use std::fmt::Write;

use ragpilot_context::{PrunedContext, SectionKind};

use crate::runtime::{self, CliResult};

pub async fn run(question: &str, full: bool) -> CliResult<()> {
    let config = runtime::load_config()?;
    let agent = runtime::build_agent(&config)?;
    let context = agent.prepare(question).await?;

    print!("{}", report(&context));
    if full {
        println!();
        println!("{}", context.render());
    }
    Ok(())
}

/// Budget split, sections and warnings as an aligned text report.
fn report(context: &PrunedContext) -> String {
    let budget = &context.budget;
    let mut out = String::new();

    let _ = writeln!(out, "Budget");
    let _ = writeln!(out, "  window      {:>8}", budget.total);
    let _ = writeln!(out, "  reserved    {:>8}", budget.reserved_for_response);
    let _ = writeln!(out, "  fixed       {:>8}", budget.allocated_fixed);
    let _ = writeln!(out, "  history     {:>8}", budget.allocated_history);
    let _ = writeln!(out, "  retrieval   {:>8}", budget.allocated_retrieval);
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "Sections ({} tokens of {} available)",
        context.total_token_cost,
        budget.available()
    );
    for section in &context.sections {
        let mut notes = Vec::new();
        if let Some(role) = section.role {
            notes.push(role.to_string());
        }
        if let Some(score) = section.relevance_score {
            notes.push(format!("score {score:.2}"));
        }
        if section.truncated {
            notes.push("truncated".into());
        }
        let label = if section.kind == SectionKind::History || section.kind == SectionKind::Retrieval {
            section.label.as_str()
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  {:<9} {:>6}  {}{}",
            section.kind.as_str(),
            section.token_cost,
            label,
            if notes.is_empty() {
                String::new()
            } else {
                format!(" ({})", notes.join(", "))
            }
        );
    }

    if !context.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Warnings");
        for warning in &context.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }
    out
}
