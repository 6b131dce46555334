//! Markdown transcript export

use super::state::ConversationState;
use std::fmt::Write;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl ConversationState {
    /// Render the whole conversation as a markdown document.
    ///
    /// Output depends only on the state, so exporting twice yields the same text.
    pub fn export_to_text(&self) -> String {
        let config = self.config();
        let finish = self.finished_at().map_or_else(
            || "Not finished".to_string(),
            |t| t.format(TIMESTAMP_FORMAT).to_string(),
        );
        let unlimited = if config.turn_limit_minutes == 0 {
            " (unlimited)"
        } else {
            ""
        };

        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = write!(
            out,
            "# Chat on Topic: {topic}\n\n\
             **Start Time:** {start}\n\
             **Finish Time:** {finish}\n\
             **Duration:** {duration}\n\n\
             **Agent 1 Model:** {m1}\n\
             **Agent 2 Model:** {m2}\n\
             **Turn Limit:** {limit} minutes{unlimited}\n",
            topic = config.topic,
            start = self.started_at().format(TIMESTAMP_FORMAT),
            duration = self.duration_display(),
            m1 = config.agent1_model,
            m2 = config.agent2_model,
            limit = config.turn_limit_minutes,
        );

        if config.agent1_system_prompt == config.agent2_system_prompt {
            let _ = writeln!(out, "**System Prompt:** {}", config.agent1_system_prompt);
        } else {
            let _ = writeln!(out, "**Agent 1 System Prompt:** {}", config.agent1_system_prompt);
            let _ = writeln!(out, "**Agent 2 System Prompt:** {}", config.agent2_system_prompt);
        }

        out.push_str("\n---\n\n");

        for message in self.history() {
            let _ = write!(
                out,
                "**{}** ({})\n{}\n\n",
                message.speaker,
                message.time_of_day(),
                message.content
            );
        }

        out
    }
}
