use docloops_runner::{
    CodeSnippet, ExecutionOutcome, Interpreter, LocalRunner, SnippetOrigin, SnippetRunner,
};

fn snippet(language: &str, source: &str) -> CodeSnippet {
    CodeSnippet::new(language, source, SnippetOrigin { index: 0, line: 3 })
}

#[tokio::test]
async fn test_unsupported_language_is_skipped() {
    let runner = LocalRunner::new();
    let result = runner.run(&snippet("haskell", "main = print 1")).await;

    assert_eq!(result.outcome, ExecutionOutcome::Skipped);
    assert_eq!(result.error.as_deref(), Some("unsupported language: haskell"));
    assert_eq!(result.origin, SnippetOrigin { index: 0, line: 3 });
}

#[tokio::test]
async fn test_missing_interpreter_is_skipped_not_failed() {
    let runner = LocalRunner::empty().with_interpreter(
        "python",
        Interpreter::new("no-such-python-interpreter", "snippet.py"),
    );
    let result = runner.run(&snippet("python", "print('hi')")).await;

    assert!(result.is_skipped());
    assert!(result
        .error
        .unwrap()
        .contains("interpreter not available"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_successful_snippet_captures_stdout() {
    let runner = LocalRunner::new();
    let result = runner.run(&snippet("bash", "echo hello from docs")).await;

    assert_eq!(result.outcome, ExecutionOutcome::Success);
    assert_eq!(result.output.trim(), "hello from docs");
    assert!(result.error.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_snippet_keeps_error_verbatim() {
    let runner = LocalRunner::new();
    let result = runner
        .run(&snippet("sh", "echo partial\necho 'NameError: name x is not defined' >&2\nexit 1"))
        .await;

    assert!(result.is_failure());
    assert_eq!(result.output.trim(), "partial");
    assert_eq!(
        result.error.as_deref().map(str::trim),
        Some("NameError: name x is not defined")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_silent_failure_reports_exit_code() {
    let runner = LocalRunner::new();
    let result = runner.run(&snippet("Shell", "exit 7")).await;

    assert!(result.is_failure());
    assert_eq!(result.error.as_deref(), Some("exited with code 7"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_snippets_run_in_separate_scratch_dirs() {
    let runner = LocalRunner::new();
    let first = runner.run(&snippet("bash", "touch marker && pwd")).await;
    let second = runner.run(&snippet("bash", "test ! -e marker && pwd")).await;

    assert!(first.is_success());
    assert!(second.is_success());
    assert_ne!(first.output, second.output);
}

#[cfg(unix)]
#[tokio::test]
async fn test_snippet_environment_is_cleared() {
    std::env::set_var("DOCLOOPS_TEST_SECRET", "do-not-leak");
    let runner = LocalRunner::new();
    let result = runner
        .run(&snippet(
            "bash",
            "echo \"secret=${DOCLOOPS_TEST_SECRET:-unset}\"\n\
             [ \"$(cd \"$HOME\" && pwd -P)\" = \"$(pwd -P)\" ] && echo home-is-scratch\n\
             [ \"$TMPDIR\" = \"$HOME\" ] && echo tmp-is-scratch",
        ))
        .await;

    assert!(result.is_success(), "{:?}", result.error);
    assert!(result.output.contains("secret=unset"));
    assert!(!result.output.contains("do-not-leak"));
    assert!(result.output.contains("home-is-scratch"));
    assert!(result.output.contains("tmp-is-scratch"));
}

#[test]
fn test_default_language_table() {
    let runner = LocalRunner::new();
    assert!(runner.supports("python"));
    assert!(runner.supports("JavaScript"));
    assert!(runner.supports("sh"));
    assert!(!runner.supports("diff"));
    assert!(!runner.supports("text"));
}
