//! Prompt loading.
//!
//! Operators can override the built-in tutor instructions by placing a
//! `tutor_instructions.md` file in the directory named by `PROMPTS_PATH`.

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path};
use tracing::info;
use tutor_core::{
    content::ContentStore,
    instructions::{DEFAULT_INSTRUCTIONS, render_instructions},
};

/// Key of the instructions override, the file stem of `tutor_instructions.md`.
pub const INSTRUCTIONS_PROMPT: &str = "tutor_instructions";

/// Loads every `.md` file in a directory, keyed by file stem.
pub fn load_prompts(prompts_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

/// Produces the instructions text for every session, with the topic list
/// substituted in.
pub fn resolve_instructions(prompts_path: Option<&Path>, content: &ContentStore) -> Result<String> {
    let override_template = match prompts_path {
        Some(path) => load_prompts(path)?.remove(INSTRUCTIONS_PROMPT),
        None => None,
    };
    let template = match override_template {
        Some(template) => {
            info!("Using tutor instructions from the prompts directory.");
            template
        }
        None => DEFAULT_INSTRUCTIONS.to_string(),
    };
    Ok(render_instructions(&template, content))
}
