//! Subcommand implementations and the helpers they share.

pub mod chat;
pub mod config_cmd;
pub mod replay;

use chatkit_config::{AppConfig, BackendKind};
use chatkit_core::message::{ChatMessage, Role};
use chatkit_core::render::RenderBlock;
use chatkit_stream::{Assembler, BackendStrategy, CozeStrategy, DipStrategy, Transcript, Whitelist};
use chatkit_tools::SkillFilter;

/// The strategy that parses frames of `kind`.
pub fn strategy_for(kind: BackendKind) -> Box<dyn BackendStrategy> {
    match kind {
        BackendKind::Dip => Box::new(DipStrategy::new()),
        BackendKind::Coze => Box::new(CozeStrategy::new()),
    }
}

/// An assembler wired from the `[dispatch]` section.
pub fn build_assembler(config: &AppConfig, kind: BackendKind) -> Assembler {
    let dispatch = &config.dispatch;
    Assembler::new(
        strategy_for(kind),
        Whitelist::standard(dispatch.progress_roots.as_slice()),
        chatkit_tools::default_registry(),
        SkillFilter::new(dispatch.hidden_skills.as_slice(), dispatch.hidden_actions.as_slice()),
    )
}

pub fn print_transcript(transcript: &Transcript, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(transcript.messages())?);
        return Ok(());
    }
    for message in transcript.messages() {
        print_message(message)?;
    }
    Ok(())
}

fn print_message(message: &ChatMessage) -> Result<(), Box<dyn std::error::Error>> {
    let who = match message.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    };
    println!("── {who} [{}]", message.message_id);
    for block in &message.blocks {
        match &block.block {
            RenderBlock::Markdown { text } => println!("{text}"),
            RenderBlock::WebSearch { input, results } => {
                println!("🔎 {input}");
                for hit in results {
                    println!("   • {} <{}>", hit.title, hit.link);
                }
            }
            RenderBlock::Chart(chart) => {
                let title = chart.title.as_deref().unwrap_or("chart");
                println!("📊 {title} ({:?}, {} rows)", chart.chart_type, chart.rows.len());
            }
            RenderBlock::Tool(tool) => {
                let took = block
                    .consume_time_ms
                    .map(|ms| format!(" in {ms} ms"))
                    .unwrap_or_default();
                println!("🛠  {}: {}{took}", tool.name, tool.title);
                println!("{}", serde_json::to_string_pretty(&tool.output)?);
            }
        }
    }
    println!();
    Ok(())
}
