use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docloops_agent::{Agent, AgentConfig, AgentError, AgentOutput};
use docloops_changes::DiffStructurer;
use docloops_critic::{QualityScore, ScoreSource};
use docloops_drafter::{
    AgentDrafter, Correction, DraftError, DraftGenerator, DraftRequest, TemplateDrafter,
};
use docloops_runner::{CodeSnippet, ExecutionResult, SnippetOrigin};

/// Agent returning queued replies in order and recording prompts.
struct ScriptedAgent {
    replies: Mutex<Vec<(String, i32)>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    fn new(replies: &[(&str, i32)]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .iter()
                    .rev()
                    .map(|(s, code)| (s.to_string(), *code))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, prompt: &str, _config: &AgentConfig) -> Result<AgentOutput, AgentError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let (stdout, code) = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| AgentError::ExecutionFailed("no reply queued".into()))?;
        Ok(AgentOutput::new(stdout, "boom".into(), code, Duration::ZERO))
    }

    async fn is_available(&self) -> bool {
        true
    }
}

const DIFF: &str = "diff --git a/greet.py b/greet.py\n--- a/greet.py\n+++ b/greet.py\n@@ -1 +1 @@\n-x\n+def greet(): pass\n";

#[tokio::test]
async fn test_initial_then_revision() {
    let agent = ScriptedAgent::new(&[
        ("```markdown\n# greet.py\n\n```python\ngreet()\n```\n```", 0),
        ("# greet.py\n\nFixed.", 0),
    ]);
    let drafter = AgentDrafter::new(agent.clone(), AgentConfig::default());
    let change = Arc::new(DiffStructurer::parse(DIFF));

    let first = drafter.draft(DraftRequest::initial(&change)).await.unwrap();
    assert_eq!(first.iteration, 1);
    assert!(!first.fallback);
    assert_eq!(first.content, "# greet.py\n\n```python\ngreet()\n```");

    let snippet = CodeSnippet::new("python", "greet()", SnippetOrigin { index: 0, line: 3 });
    let correction = Correction::new(
        QualityScore::new(0.2, 0.8, 0.8, vec!["Example fails".into()], ScoreSource::Agent),
        vec![ExecutionResult::failure(
            &snippet,
            String::new(),
            "NameError: name 'greet' is not defined".into(),
        )],
    );
    let second = drafter
        .draft(DraftRequest::revision(&change, &first, &correction))
        .await
        .unwrap();
    assert_eq!(second.iteration, 2);
    assert_eq!(second.content, "# greet.py\n\nFixed.");

    let prompts = agent.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("NameError: name 'greet' is not defined"));
    assert!(prompts[1].contains("- Example fails"));
    assert!(prompts[1].contains("```python\ngreet()\n```"));
}

#[tokio::test]
async fn test_nonzero_exit_and_empty_output_are_errors() {
    let agent = ScriptedAgent::new(&[("partial", 2), ("   \n", 0)]);
    let drafter = AgentDrafter::new(agent, AgentConfig::default());
    let change = Arc::new(DiffStructurer::parse(DIFF));

    let err = drafter.draft(DraftRequest::initial(&change)).await.unwrap_err();
    assert!(matches!(err, DraftError::AgentError(ref m) if m.contains("code 2") && m.contains("boom")));

    let err = drafter.draft(DraftRequest::initial(&change)).await.unwrap_err();
    assert!(matches!(err, DraftError::EmptyOutput));
}

#[tokio::test]
async fn test_agent_failure_surfaces_as_error() {
    let agent = ScriptedAgent::new(&[]);
    let drafter = AgentDrafter::new(agent, AgentConfig::default());
    let change = Arc::new(DiffStructurer::parse(DIFF));

    let err = drafter.draft(DraftRequest::initial(&change)).await.unwrap_err();
    assert!(matches!(err, DraftError::AgentError(_)));
}

#[tokio::test]
async fn test_template_drafter_through_trait() {
    let change = Arc::new(DiffStructurer::parse(DIFF));
    let drafter: Box<dyn DraftGenerator> = Box::new(TemplateDrafter::new());

    let draft = drafter.draft(DraftRequest::initial(&change)).await.unwrap();
    assert!(draft.fallback);
    assert!(draft.content.contains("## greet.py"));
    assert_eq!(drafter.name(), "template");
}
