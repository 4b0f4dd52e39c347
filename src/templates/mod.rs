//! Prompt rendering
//!
//! Uses MiniJinja templates to turn a context bundle into the prompt text
//! sent to text-based suggestion providers. Templates are embedded in the
//! binary.

use minijinja::{context, Environment};
use std::sync::OnceLock;

use crate::error::Result;
use crate::generate::bundle::ContextBundle;
use crate::model::TestType;

// Embedded templates (compiled into binary)
mod embedded {
    pub const SUGGESTION_PROMPT: &str = include_str!("../../templates/suggestion_prompt.jinja");
}

/// Template name of the suggestion prompt
pub const SUGGESTION_PROMPT: &str = "suggestion_prompt.jinja";

/// Template engine singleton
static ENGINE: OnceLock<Environment<'static>> = OnceLock::new();

/// Initialize the template engine with embedded templates
fn init_engine() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_template(SUGGESTION_PROMPT, embedded::SUGGESTION_PROMPT)
        .expect("Failed to load suggestion prompt template");
    env
}

/// Get the global template engine
pub fn engine() -> &'static Environment<'static> {
    ENGINE.get_or_init(init_engine)
}

/// Render the prompt for one bundle and the requested test types
pub fn render_suggestion_prompt(bundle: &ContextBundle, test_types: &[TestType]) -> Result<String> {
    let template = engine().get_template(SUGGESTION_PROMPT)?;
    let rendered = template.render(context! {
        scope => &bundle.scope,
        test_types => test_types,
        requirements => &bundle.requirements,
        components => &bundle.components,
        constraint_groups => &bundle.constraint_groups,
        flows => &bundle.flows,
        free_text => &bundle.free_text,
    })?;
    Ok(rendered)
}
