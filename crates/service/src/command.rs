/// Slash commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reset progress and history, then greet.
    Start,
    /// Liveness check; answered without touching any session.
    Health,
    /// Ask for the summary again once it has been offered.
    Summary,
}

impl Command {
    /// Recognises `/start`, `/health` and `/summary`, also in the
    /// `/cmd@botname args` form. Unknown commands are `None` and are treated
    /// as ordinary text.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim_start().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "health" => Some(Self::Health),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }
}
