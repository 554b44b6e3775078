//! Prompt builders for debate rounds and synthesis

use crate::roster::AgentIdentity;
use std::collections::HashMap;

const RULE: &str = "\n\n---\n\n";

const RELAY_INSTRUCTIONS: &str = "Respond directly to their points. Challenge weak arguments, \
build on strong ones, and stay concise.";

const SYNTHESIS_INSTRUCTIONS: &str = "Produce exactly 3 decisions. For each decision give a short \
rationale and the first concrete test that would validate it. Be decisive: where the participants \
diverged, pick a direction and say why.";

/// Labeled responses of `agents`, in order, skipping agents with no entry
fn labeled_responses<'a>(
    agents: impl Iterator<Item = &'a AgentIdentity>,
    responses: &HashMap<String, String>,
) -> Vec<String> {
    agents
        .filter_map(|agent| {
            responses
                .get(&agent.id)
                .map(|text| format!("{}:\n{}", agent.label(), text.trim()))
        })
        .collect()
}

/// Prompt for `agent` in a rebuttal round: the question plus every other
/// participant's response from the previous round.
pub fn relay_prompt(
    question: &str,
    agent: &AgentIdentity,
    participants: &[AgentIdentity],
    previous: &HashMap<String, String>,
) -> String {
    let others = labeled_responses(participants.iter().filter(|p| p.id != agent.id), previous);
    let others = if others.is_empty() {
        "(The other participants did not respond last round.)".to_string()
    } else {
        others.join(RULE)
    };

    format!(
        "You are {label} in a structured debate.\n\n\
         Original question:\n{question}\n\n\
         Here is what the other participants said in the previous round:\n\n\
         {others}\n\n\
         {RELAY_INSTRUCTIONS}",
        label = agent.label(),
    )
}

/// Prompt for the moderator once all rounds are done
pub fn synthesis_prompt(
    question: &str,
    participants: &[AgentIdentity],
    final_responses: &HashMap<String, String>,
) -> String {
    let names: Vec<String> = participants.iter().map(AgentIdentity::label).collect();
    let positions = labeled_responses(participants.iter(), final_responses);
    let positions = if positions.is_empty() {
        "(No participant produced a final position.)".to_string()
    } else {
        positions.join(RULE)
    };

    format!(
        "You are moderating a debate between {names}.\n\n\
         Original question:\n{question}\n\n\
         Final positions:\n\n{positions}\n\n\
         {SYNTHESIS_INSTRUCTIONS}",
        names = names.join(", "),
    )
}
