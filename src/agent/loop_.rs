use super::orchestrator::{Orchestrator, TurnOutcome};
use crate::config::{Config, LinkKind};
use crate::observability::{self, Observer, ObserverEvent};
use crate::{peripherals, pricing, providers, tools};
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Options taken from the command line. `None` means "use the config".
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    pub message: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub link: Option<LinkKind>,
    pub serial_port: Option<String>,
}

fn apply_options(config: &mut Config, options: &AgentOptions) {
    if let Some(model) = &options.model {
        config.default_model.clone_from(model);
    }
    if let Some(temperature) = options.temperature {
        config.default_temperature = temperature;
    }
    if let Some(link) = options.link {
        config.robot.link = link;
    }
    if let Some(port) = &options.serial_port {
        config.robot.serial_port = Some(port.clone());
    }
}

fn log_outcome(outcome: &TurnOutcome) {
    if outcome.tool_calls > 0 {
        tracing::info!(
            rounds = outcome.rounds,
            tool_calls = outcome.tool_calls,
            capped = outcome.capped,
            duration_ms = u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX),
            cost_usd = ?outcome.cost_usd,
            "turn completed with tool use"
        );
    }
}

pub async fn run(mut config: Config, options: AgentOptions) -> Result<()> {
    apply_options(&mut config, &options);
    if !pricing::is_known_model(&config.default_model) {
        tracing::warn!(
            model = %config.default_model,
            "model is not in the catalogue; cost estimates will be unavailable"
        );
    }

    // ── Wire up subsystems ───────────────────────────────────────
    let observer: Arc<dyn Observer> =
        Arc::from(observability::create_observer(&config.observability));
    let robot = peripherals::connect_robot(&config.robot)?;
    observer.record_event(&ObserverEvent::RobotLink {
        link: robot.session().link_name().to_string(),
        connected: robot.is_connected(),
    });

    let provider = providers::create_provider(&config);
    provider.warmup().await.ok();
    let dispatcher = tools::robot_dispatcher(&robot);
    let mut orchestrator =
        Orchestrator::from_config(&config, provider, dispatcher, Arc::clone(&observer));

    // ── Execute ──────────────────────────────────────────────────
    if let Some(message) = options.message {
        let outcome = orchestrator.handle_utterance(&message).await?;
        println!("{}", outcome.reply);
        log_outcome(&outcome);
    } else {
        println!("🤖 rootclaw interactive mode ({})", orchestrator.model());
        println!("Type /quit to exit, /clear to start over.\n");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let input = line.trim();
            match input {
                "" => continue,
                "/quit" | "/exit" => break,
                "/clear" => {
                    orchestrator.clear();
                    println!("Conversation cleared.\n");
                    continue;
                }
                _ => {}
            }

            match orchestrator.handle_utterance(input).await {
                Ok(outcome) => {
                    println!("\n{}\n", outcome.reply);
                    log_outcome(&outcome);
                }
                // The transcript is already rolled back; keep the session going.
                Err(e) => eprintln!("\nError: {e:#}\n"),
            }
        }
    }

    robot.disconnect().await;
    observer.record_event(&ObserverEvent::RobotLink {
        link: robot.session().link_name().to_string(),
        connected: false,
    });
    observer.flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_options_override_config() {
        let mut config = Config::default();
        apply_options(
            &mut config,
            &AgentOptions {
                model: Some("gpt-4.1".into()),
                temperature: Some(0.2),
                link: Some(LinkKind::Serial),
                serial_port: Some("/dev/ttyUSB1".into()),
                ..AgentOptions::default()
            },
        );
        assert_eq!(config.default_model, "gpt-4.1");
        assert!((config.default_temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.robot.link, LinkKind::Serial);
        assert_eq!(config.robot.serial_port.as_deref(), Some("/dev/ttyUSB1"));
    }

    #[test]
    fn empty_options_leave_config_untouched() {
        let mut config = Config::default();
        apply_options(&mut config, &AgentOptions::default());
        assert_eq!(config.default_model, crate::config::DEFAULT_MODEL);
        assert_eq!(config.robot.link, LinkKind::Simulated);
    }
}
