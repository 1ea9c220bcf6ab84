//! Attach to a debugger backend over WebSocket, list scripts and evaluate

use std::sync::Arc;

use async_trait::async_trait;
use debugger_agent::{AgentConfig, AgentObserver, DebuggerAgent, ObserverSet};
use debugger_protocol::{Event, ScriptId};

struct PrintScripts;

#[async_trait]
impl AgentObserver for PrintScripts {
    fn name(&self) -> &str {
        "print-scripts"
    }

    async fn on_script_parsed(&self, id: ScriptId, name: &str, source: &str, _line_offset: i64) {
        println!("  [{}] {} ({} bytes)", id, name, source.len());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9222".to_string());
    println!("Connecting to debugger at: {}", endpoint);

    let config = AgentConfig::default().with_endpoint(endpoint);
    let observers = ObserverSet::new().with(Arc::new(PrintScripts));
    let agent = DebuggerAgent::connect(config, observers).await?;
    println!("Connected!");

    agent.subscribe(
        "afterCompile",
        Arc::new(|event: &Event| println!("Script compiled: {:?}", event.body)),
    );

    println!("Scripts:");
    match agent.request_scripts().await? {
        Ok(scripts) => println!("{} script(s)", scripts.len()),
        Err(failure) => println!("scripts failed: {}", failure),
    }

    match agent.evaluate("1 + 2").await? {
        Ok(evaluation) => println!("1 + 2 = {}", evaluation.text().unwrap_or("?")),
        Err(failure) => println!("evaluate failed: {}", failure),
    }

    // Keep alive for a bit to see events
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    for diagnostic in agent.diagnostics() {
        println!("diagnostic: {}", diagnostic);
    }

    agent.close().await?;
    println!("Disconnected");

    Ok(())
}
