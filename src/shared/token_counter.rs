//! Character-based token estimation used to keep prompts inside a budget.
//!
//! Approximation: ~4 characters per token, close enough for every provider we talk to.

pub struct TokenCounter;

impl TokenCounter {
    /// Estimate token count for text.
    pub fn estimate_tokens(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        (text.chars().count() + 3) / 4
    }

    /// Estimate tokens for a system + user prompt pair, including message wrapper overhead.
    pub fn estimate_prompt_tokens(system: &str, user: &str) -> usize {
        8 + Self::estimate_tokens(system) + Self::estimate_tokens(user)
    }

    /// Cut `text` so that it fits in `token_budget`, on a char boundary.
    ///
    /// Returns the (possibly shortened) text and whether anything was dropped.
    pub fn truncate_to_budget(text: &str, token_budget: usize) -> (String, bool) {
        if Self::estimate_tokens(text) <= token_budget {
            return (text.to_string(), false);
        }
        let max_chars = token_budget.saturating_mul(4);
        let cut: String = text.chars().take(max_chars).collect();
        (cut, true)
    }

    /// Number of tokens left once `used_tokens` and the response reservation are taken out.
    pub fn estimate_remaining(
        used_tokens: usize,
        context_window: usize,
        reserved_for_response: usize,
    ) -> usize {
        context_window
            .saturating_sub(used_tokens)
            .saturating_sub(reserved_for_response)
    }
}
