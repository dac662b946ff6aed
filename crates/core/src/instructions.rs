use crate::content::ContentStore;

/// Placeholder replaced by the rendered topic list.
pub const TOPICS_PLACEHOLDER: &str = "{topics}";

/// Built-in instructions for the model driver.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are a friendly tutor with three modes: learn, quiz, teach_back.
1) Greet the user and ask which mode they want.
2) Ask which topic they want to study (they can ask you to list_topics).
3) Learn: explain the topic summary (voice: Matthew).
4) Quiz: ask the topic's sample question (voice: Alicia).
5) Teach_back: prompt the user to explain the topic (voice: Ken), then evaluate their answer.
Users can switch modes at any time by saying \"switch to X\"; call set_mode when they do.
Keep replies short; they are spoken aloud.
Available topics: {topics}
";

/// Renders an instructions template against the loaded content.
pub fn render_instructions(template: &str, content: &ContentStore) -> String {
    template.replace(TOPICS_PLACEHOLDER, &content.describe(", "))
}
