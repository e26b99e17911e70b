//! Plain-text views of the workflow for the interactive CLI.

use anyhow::{Context, Result};
use minijinja::Environment;

use crate::controller::WorkflowSnapshot;
use crate::core::step::Step;

const TEMPLATES: [(&str, &str); 8] = [
    ("header", include_str!("views/header.txt")),
    ("entry", include_str!("views/entry.txt")),
    ("loading", include_str!("views/loading.txt")),
    ("context", include_str!("views/context.txt")),
    ("compare", include_str!("views/compare.txt")),
    ("refine", include_str!("views/refine.txt")),
    ("confirm", include_str!("views/confirm.txt")),
    ("done", include_str!("views/done.txt")),
];

/// Template engine wrapper around minijinja.
pub struct ViewEngine {
    env: Environment<'static>,
}

impl ViewEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .with_context(|| format!("load view template '{name}'"))?;
        }
        Ok(Self { env })
    }

    /// Render the screen for the snapshot's current step.
    pub fn render(&self, snapshot: &WorkflowSnapshot) -> Result<String> {
        let name = view_name(snapshot.step);
        let template = self.env.get_template(name)?;
        let rendered = template
            .render(snapshot)
            .with_context(|| format!("render view '{name}'"))?;
        Ok(rendered)
    }
}

fn view_name(step: Step) -> &'static str {
    match step {
        Step::EnterInfo => "entry",
        Step::LoadingContext | Step::LoadingGeneration => "loading",
        Step::ReviewContext => "context",
        Step::CompareCandidates => "compare",
        Step::Refine => "refine",
        Step::Confirm => "confirm",
        Step::Done => "done",
    }
}
