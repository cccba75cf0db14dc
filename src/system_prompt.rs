//! System instructions for the built-in market analysis roster
//!
//! Each agent gets a role prompt plus a closing rule naming the phrase that
//! ends the conversation, so the phrase in the prompt always matches the one
//! the termination condition looks for.

use std::fmt::Write;

/// Phrase that ends the default conversation
pub const DEFAULT_STOP_PHRASE: &str = "thank you";

/// Opening request for the default conversation
pub const DEFAULT_TASK: &str = "I would like to learn about Bitcoin. Can you provide an overview and analyze its price trends over the last year?";

pub const MARKET_EXPERT_NAME: &str = "BitcoinExpert";
pub const PLOT_ASSISTANT_NAME: &str = "PlotAssistant";
pub const USER_NAME: &str = "User";

const MARKET_EXPERT_PROMPT: &str = r"You are a Bitcoin expert assistant. Give the user a clear, factual overview of Bitcoin and its recent market behaviour.

When price history is needed, call fetch_price_data with an ISO start_date and end_date. The tool saves the data to a CSV file and returns its path. Tell the user when the file is ready and what it contains.

Do not plot anything yourself. Ask PlotAssistant to plot the CSV file, naming the file it should use.";

const PLOT_ASSISTANT_PROMPT: &str = r"You are a plotting assistant. When the Bitcoin expert provides a CSV file of price data, call plot_price_data with that filename to chart the open and close prices.

Tell the expert when the chart is saved and where. Do not fetch data yourself.";

/// Prompt for the agent that fetches price data
pub fn market_expert_prompt(stop_phrase: &str) -> String {
    with_closing_rule(MARKET_EXPERT_PROMPT, stop_phrase)
}

/// Prompt for the agent that charts fetched data
pub fn plot_assistant_prompt(stop_phrase: &str) -> String {
    with_closing_rule(PLOT_ASSISTANT_PROMPT, stop_phrase)
}

fn with_closing_rule(base: &str, stop_phrase: &str) -> String {
    let mut prompt = base.to_string();
    if !stop_phrase.trim().is_empty() {
        let _ = write!(
            prompt,
            "\n\nIf the user says '{stop_phrase}', reply politely to conclude the conversation."
        );
    }
    prompt
}
