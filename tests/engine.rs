mod common;

use std::sync::Arc;

use relayflow::{
    ErrorKind, ExecutionStatus, FlowError, SubscribeOptions, ValidationError, Vars,
    events::{ExecutionEvent, LogLevel, NodeState},
};
use serde_json::json;

use common::*;

fn chat_workflow() -> relayflow::WorkflowModel {
    workflow(json!({
        "id": "chat",
        "name": "Chat",
        "entryPoint": "in",
        "nodes": [
            {"id": "in", "type": "input", "config": {"fields": [{"name": "userInput", "required": true}]}},
            {"id": "llm", "type": "llm", "config": {"prompt": "{{userInput}}"}},
            {"id": "out", "type": "output", "config": {"outputVariable": "llmResponse"}}
        ],
        "edges": [
            {"id": "e1", "source": "in", "target": "llm"},
            {"id": "e2", "source": "llm", "target": "out"}
        ]
    }))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_input_llm_output() {
    let engine = engine(Some(Arc::new(EchoLlm)));
    let events = record(&engine);

    let id = engine.execute_workflow(&chat_workflow(), Vars::new().with("userInput", "hi")).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.outputs, Vars::new().with("llmResponse", "hi"));
    assert_eq!(succeeded(&execution), vec!["in", "llm", "out"]);
    assert_eq!(execution.timeline.len(), 3);
    assert!(execution.completed_at.is_some());

    let types = event_types(&events, &id);
    assert_eq!(types.first(), Some(&"execution:started"));
    assert_eq!(types.last(), Some(&"execution:completed"));
    assert!(has_event(&events, &id, |e| matches!(e, ExecutionEvent::AgentMessage(m) if m.content == "hi")));
    assert!(has_event(&events, &id, |e| matches!(e, ExecutionEvent::VariableUpdated(v) if v.name == "llmResponse")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_execution_is_stable_after_completion() {
    let engine = engine(Some(Arc::new(EchoLlm)));
    let id = engine.execute_workflow(&chat_workflow(), Vars::new().with("userInput", "hi")).unwrap();
    let first = engine.wait_for(&id).await.unwrap();

    let again = engine.get_execution(&id).unwrap();
    assert_eq!(first, again);
    assert_eq!(engine.get_execution(&id).unwrap(), again);

    assert!(matches!(engine.cancel(&id), Err(FlowError::Execution(_))));
    assert!(matches!(engine.get_execution("nope"), Err(FlowError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_history_in_publish_order() {
    let engine = engine(Some(Arc::new(EchoLlm)));
    let events = record(&engine);
    let id = engine.execute_workflow(&chat_workflow(), Vars::new().with("userInput", "hi")).unwrap();
    engine.wait_for(&id).await.unwrap();

    let history: Vec<_> = engine.execution_history(&id).unwrap().into_iter().map(|e| e.event_type()).collect();
    assert_eq!(history, event_types(&events, &id));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_conditional_false_branch_runs_only_b() {
    let engine = engine(None);
    let wf = workflow(json!({
        "id": "branch",
        "entryPoint": "check",
        "nodes": [
            {"id": "check", "type": "conditional", "config": {"conditions": [{"variable": "score", "operator": "gt", "value": 50}]}},
            {"id": "a", "type": "output", "config": {"outputVariable": "verdict", "value": "pass"}},
            {"id": "b", "type": "output", "config": {"outputVariable": "verdict", "value": "fail"}}
        ],
        "edges": [
            {"id": "e1", "source": "check", "target": "a", "sourceHandle": "true"},
            {"id": "e2", "source": "check", "target": "b", "sourceHandle": "false"}
        ]
    }));

    let id = engine.execute_workflow(&wf, Vars::new().with("score", 10)).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(succeeded(&execution), vec!["check", "b"]);
    assert!(execution.node_events("a").is_empty());
    assert_eq!(execution.outputs, Vars::new().with("verdict", "fail"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_switch_routes_by_case() {
    let engine = engine(None);
    let wf = workflow(json!({
        "id": "router",
        "entryPoint": "route",
        "nodes": [
            {"id": "route", "type": "switch", "config": {"variable": "intent", "cases": [{"value": "refund", "handle": "billing"}]}},
            {"id": "billing", "type": "output", "config": {"outputVariable": "team", "value": "billing"}},
            {"id": "fallback", "type": "output", "config": {"outputVariable": "team", "value": "general"}}
        ],
        "edges": [
            {"id": "e1", "source": "route", "target": "billing", "sourceHandle": "billing"},
            {"id": "e2", "source": "route", "target": "fallback"}
        ]
    }));

    let id = engine.execute_workflow(&wf, Vars::new().with("intent", "refund")).unwrap();
    assert_eq!(engine.wait_for(&id).await.unwrap().outputs, Vars::new().with("team", "billing"));

    let id = engine.execute_workflow(&wf, Vars::new().with("intent", "hello")).unwrap();
    assert_eq!(engine.wait_for(&id).await.unwrap().outputs, Vars::new().with("team", "general"));
}

fn failing_workflow(on_error: serde_json::Value) -> relayflow::WorkflowModel {
    workflow(json!({
        "id": "failing",
        "entryPoint": "llm",
        "nodes": [
            {"id": "llm", "type": "llm", "config": {"prompt": "x", "outputVariable": "answer"}, "onError": on_error},
            {"id": "next", "type": "output", "config": {"outputVariable": "answer"}},
            {"id": "recover", "type": "output", "config": {"outputVariable": "recovered", "value": true}}
        ],
        "edges": [
            {"id": "e1", "source": "llm", "target": "next"}
        ]
    }))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fail_strategy_stops_at_first_failure() {
    let engine = engine(Some(Arc::new(BrokenLlm)));
    let id = engine.execute_workflow(&failing_workflow(json!({"strategy": "fail"})), Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error_kind, Some(ErrorKind::ProviderError));
    assert!(execution.error.as_deref().is_some_and(|e| e.contains("invalid api key")));
    assert!(execution.node_events("next").is_empty());
    assert_eq!(execution.timeline.len(), 1);
    assert_eq!(execution.timeline[0].status, NodeState::Error);
    // non-retryable: a single attempt
    assert_eq!(execution.timeline[0].attempts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_continue_strategy_never_fails() {
    let engine = engine(Some(Arc::new(BrokenLlm)));
    let id = engine.execute_workflow(&failing_workflow(json!({"strategy": "continue"})), Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(succeeded(&execution), vec!["llm", "next"]);
    assert_eq!(execution.node_events("llm")[0].output, Some(json!({})));
    assert!(execution.logs.iter().any(|l| l.level == LogLevel::Warn && l.node_id.as_deref() == Some("llm")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fallback_strategy_uses_value() {
    let engine = engine(Some(Arc::new(BrokenLlm)));
    let wf = failing_workflow(json!({"strategy": "fallback", "fallbackValue": "sorry"}));
    let id = engine.execute_workflow(&wf, Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.outputs, Vars::new().with("answer", "sorry"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_goto_strategy_jumps() {
    let engine = engine(Some(Arc::new(BrokenLlm)));
    let id = engine.execute_workflow(&failing_workflow(json!({"strategy": "goto", "gotoNode": "recover"})), Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.node_events("llm")[0].status, NodeState::Error);
    assert_eq!(succeeded(&execution), vec!["recover"]);
    assert_eq!(execution.outputs, Vars::new().with("recovered", true));

    let id = engine.execute_workflow(&failing_workflow(json!({"strategy": "goto", "gotoNode": "ghost"})), Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error_kind, Some(ErrorKind::ConfigError));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_retry_until_success() {
    let llm = Arc::new(FlakyLlm::new(2));
    let engine = engine(Some(llm.clone()));
    let wf = workflow(json!({
        "id": "retry",
        "entryPoint": "llm",
        "nodes": [{"id": "llm", "type": "llm", "config": {"prompt": "ok"}, "retry": {"times": 3, "intervalMs": 1}}]
    }));

    let id = engine.execute_workflow(&wf, Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(llm.calls(), 3);
    assert_eq!(execution.timeline[0].attempts, 3);
    let retries = execution.logs.iter().filter(|l| l.metadata.as_ref().is_some_and(|m| m["event"] == "node:retrying")).count();
    assert_eq!(retries, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_retries_exhausted() {
    let llm = Arc::new(FlakyLlm::new(10));
    let engine = engine(Some(llm.clone()));
    let wf = workflow(json!({
        "id": "retry",
        "entryPoint": "llm",
        "nodes": [{"id": "llm", "type": "llm", "config": {"prompt": "ok"}, "retry": {"times": 1}}]
    }));

    let id = engine.execute_workflow(&wf, Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(llm.calls(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_node_timeout() {
    let engine = engine(Some(Arc::new(SlowLlm)));
    let wf = workflow(json!({
        "id": "slow",
        "entryPoint": "llm",
        "nodes": [{"id": "llm", "type": "llm", "config": {"prompt": "ok"}, "timeoutMs": 50, "retry": {"times": 0}}]
    }));

    let id = engine.execute_workflow(&wf, Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error_kind, Some(ErrorKind::TimeoutError));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loop_limit_exceeded_on_fourth_entry() {
    let engine = engine(None);
    let wf = workflow(json!({
        "id": "spin",
        "entryPoint": "loop",
        "nodes": [
            {"id": "loop", "type": "loop", "config": {"untilVariable": "done", "maxIterations": 3}},
            {"id": "body", "type": "output", "config": {"outputVariable": "tick", "value": "{{currentItem}}"}},
            {"id": "end", "type": "output", "config": {"outputVariable": "done"}}
        ],
        "edges": [
            {"id": "e1", "source": "loop", "target": "body", "sourceHandle": "body"},
            {"id": "e2", "source": "body", "target": "loop"},
            {"id": "e3", "source": "loop", "target": "end", "sourceHandle": "done"}
        ]
    }));

    let id = engine.execute_workflow(&wf, Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error_kind, Some(ErrorKind::LoopLimitExceeded));
    let loop_events = execution.node_events("loop");
    assert_eq!(loop_events.len(), 4);
    assert_eq!(loop_events.iter().filter(|e| e.status == NodeState::Success).count(), 3);
    assert_eq!(loop_events[3].status, NodeState::Error);
    assert_eq!(execution.node_events("body").len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loop_over_items() {
    let engine = engine(None);
    let wf = workflow(json!({
        "id": "sum",
        "entryPoint": "loop",
        "nodes": [
            {"id": "loop", "type": "loop", "config": {"items": "numbers", "itemVariable": "n"}},
            {
                "id": "add",
                "type": "code",
                "config": {
                    "language": "javascript",
                    "code": "function main({acc, n}) { return acc + n }",
                    "inputs": {"acc": "{{acc}}", "n": "{{n}}"},
                    "outputVariable": "acc"
                }
            },
            {"id": "out", "type": "output", "config": {"outputVariable": "acc"}}
        ],
        "edges": [
            {"id": "e1", "source": "loop", "target": "add", "sourceHandle": "body"},
            {"id": "e2", "source": "add", "target": "loop"},
            {"id": "e3", "source": "loop", "target": "out", "sourceHandle": "done"}
        ]
    }));

    let id = engine.execute_workflow(&wf, Vars::new().with("numbers", json!([1, 2, 3])).with("acc", 0)).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.outputs, Vars::new().with("acc", 6));
    assert_eq!(execution.node_events("add").len(), 3);
    assert_eq!(execution.node_events("loop").len(), 4);
}

fn listen_workflow() -> relayflow::WorkflowModel {
    workflow(json!({
        "id": "listen",
        "entryPoint": "in",
        "nodes": [
            {"id": "in", "type": "input"},
            {"id": "ask", "type": "voice_listen", "config": {"prompt": "What is your name?", "outputVariable": "name"}},
            {"id": "out", "type": "output", "config": {"outputVariable": "name"}}
        ],
        "edges": [
            {"id": "e1", "source": "in", "target": "ask"},
            {"id": "e2", "source": "ask", "target": "out"}
        ]
    }))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_after_first_node() {
    let engine = engine(None);
    let events = record(&engine);
    let id = engine.execute_workflow(&listen_workflow(), Vars::new()).unwrap();

    wait_until(|| has_event(&events, &id, |e| matches!(e, ExecutionEvent::NodeWaiting(_)))).await;
    engine.cancel(&id).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Cancelled);
    assert_eq!(succeeded(&execution), vec!["in"]);
    assert_eq!(execution.timeline.len(), 1);
    assert!(execution.error_kind.is_none());
    assert_eq!(event_types(&events, &id).last(), Some(&"execution:cancelled"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_user_input_resumes_waiting_node() {
    let engine = engine(None);
    let events = record(&engine);
    let id = engine.execute_workflow(&listen_workflow(), Vars::new()).unwrap();

    assert!(engine.submit_user_input("missing", json!("x"), None).is_err());
    wait_until(|| has_event(&events, &id, |e| matches!(e, ExecutionEvent::NodeWaiting(_)))).await;
    assert!(engine.submit_user_input(&id, json!("x"), Some("in")).is_err());
    engine.submit_user_input(&id, json!("ada"), None).unwrap();

    let execution = engine.wait_for(&id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.outputs, Vars::new().with("name", "ada"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unresolved_template_renders_empty_and_warns() {
    let engine = engine(Some(Arc::new(EchoLlm)));
    let wf = workflow(json!({
        "id": "tpl",
        "entryPoint": "llm",
        "nodes": [{"id": "llm", "type": "llm", "config": {"prompt": "[{{missing}}] {{env.GREETING}}"}}],
        "env": {"GREETING": "hello"}
    }));

    let id = engine.execute_workflow(&wf, Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.variables.get_value("llmResponse"), Some(&json!("[] hello")));
    assert!(execution.logs.iter().any(|l| l.level == LogLevel::Warn && l.message.contains("missing")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_executor_is_fatal() {
    let engine = engine(None);
    let wf = workflow(json!({
        "id": "no-llm",
        "entryPoint": "llm",
        "nodes": [{"id": "llm", "type": "llm", "config": {"prompt": "x"}, "onError": {"strategy": "continue"}}]
    }));

    let id = engine.execute_workflow(&wf, Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error_kind, Some(ErrorKind::UnknownNodeType));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validation() {
    let engine = engine(None);

    let missing_entry = workflow(json!({"id": "w", "entryPoint": "x", "nodes": [{"id": "a", "type": "input"}]}));
    assert!(matches!(engine.validate(&missing_entry), Err(FlowError::Validation(ValidationError::MissingEntryPoint))));
    assert_eq!(relayflow::validate(&missing_entry), Err(ValidationError::MissingEntryPoint));

    let dangling = workflow(json!({
        "id": "w", "entryPoint": "a",
        "nodes": [{"id": "a", "type": "input"}],
        "edges": [{"id": "e1", "source": "a", "target": "ghost"}]
    }));
    assert!(matches!(engine.validate(&dangling), Err(FlowError::Validation(ValidationError::DanglingEdge(e))) if e == "e1"));

    let unknown = workflow(json!({"id": "w", "entryPoint": "a", "nodes": [{"id": "a", "type": "teleport"}]}));
    assert!(matches!(engine.validate(&unknown), Err(FlowError::Validation(ValidationError::UnknownNodeType(_)))));

    let cycle = workflow(json!({
        "id": "w", "entryPoint": "a",
        "nodes": [{"id": "a", "type": "input"}, {"id": "b", "type": "output", "config": {"outputVariable": "x"}}],
        "edges": [{"id": "e1", "source": "a", "target": "b"}, {"id": "e2", "source": "b", "target": "a"}]
    }));
    assert!(matches!(engine.validate(&cycle), Err(FlowError::Validation(ValidationError::IllegalCycle(_)))));
    assert!(engine.execute_workflow(&cycle, Vars::new()).is_err());

    assert!(engine.validate(&chat_workflow()).is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_trigger_execution() {
    let engine = engine(Some(Arc::new(EchoLlm)));
    assert!(matches!(engine.register_trigger("t1", "chat"), Err(FlowError::NotFound(_))));

    assert!(engine.deploy(&chat_workflow()).unwrap());
    engine.register_trigger("t1", "chat").unwrap();

    let (id, status) = engine.execute_trigger("t1", Vars::new().with("userInput", "yo")).unwrap();
    assert!(matches!(status, ExecutionStatus::Pending | ExecutionStatus::Running | ExecutionStatus::Completed));
    let execution = engine.wait_for(&id).await.unwrap();
    assert_eq!(execution.workflow_id, "chat");
    assert_eq!(execution.outputs, Vars::new().with("llmResponse", "yo"));

    assert!(engine.execute_trigger("unknown", Vars::new()).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_subscription_filters_by_execution() {
    let engine = engine(Some(Arc::new(EchoLlm)));
    let first = engine.execute_workflow(&chat_workflow(), Vars::new().with("userInput", "a")).unwrap();
    engine.wait_for(&first).await.unwrap();

    // a late subscriber only sees what is published after it subscribed
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handle = engine.subscribe(SubscribeOptions::new("*", "out"), move |e| sink.lock().unwrap().push(e.clone())).unwrap();

    let second = engine.execute_workflow(&chat_workflow(), Vars::new().with("userInput", "b")).unwrap();
    engine.wait_for(&second).await.unwrap();

    let seen_events = seen.lock().unwrap().clone();
    assert!(!seen_events.is_empty());
    assert!(seen_events.iter().all(|e| e.execution_id == second && e.node_id.as_deref() == Some("out")));
    assert!(engine.unsubscribe(handle));
    assert!(!engine.unsubscribe(handle));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_engine_must_be_launched() {
    let engine = relayflow::EngineBuilder::new().config(config()).build().unwrap();
    assert!(engine.execute_workflow(&chat_workflow(), Vars::new()).is_err());
    engine.launch().unwrap();
    assert!(engine.is_running());
    engine.shutdown();
    assert!(!engine.is_running());
}

fn fan_out_workflow(
    first: &str,
    second: serde_json::Value,
) -> relayflow::WorkflowModel {
    workflow(json!({
        "id": "fan-out",
        "entryPoint": "in",
        "nodes": [
            {"id": "in", "type": "input"},
            {"id": "first", "type": "llm", "config": {"prompt": first, "outputVariable": "first"}},
            second
        ],
        "edges": [
            {"id": "e1", "source": "in", "target": "first"},
            {"id": "e2", "source": "in", "target": "second"}
        ]
    }))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeline_follows_completion_order() {
    let engine = engine(Some(Arc::new(ScriptedLlm)));
    // the slow branch is launched first
    let second = json!({"id": "second", "type": "llm", "config": {"prompt": "1", "outputVariable": "second"}});
    let id = engine.execute_workflow(&fan_out_workflow("200", second), Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(succeeded(&execution), vec!["in", "second", "first"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failing_branch_cancels_siblings() {
    let engine = engine(Some(Arc::new(ScriptedLlm)));
    let events = record(&engine);

    // a sibling waiting for input
    let ask = json!({"id": "second", "type": "voice_listen", "config": {"prompt": "name?"}});
    let id = engine.execute_workflow(&fan_out_workflow("fail", ask), Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error_kind, Some(ErrorKind::ProviderError));
    assert_eq!(execution.node_events("first")[0].status, NodeState::Error);
    assert_eq!(succeeded(&execution), vec!["in"]);
    assert!(execution.node_events("second").is_empty());
    assert_eq!(event_types(&events, &id).last(), Some(&"execution:failed"));

    // a sibling that finishes after the failure has its result discarded
    let slow = json!({"id": "second", "type": "llm", "config": {"prompt": "100", "outputVariable": "second"}});
    let mut wf = fan_out_workflow("fail", slow);
    wf.edges.reverse();
    let id = engine.execute_workflow(&wf, Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.node_events("second").is_empty());
    assert!(!execution.variables.contains("second"));
    assert!(!has_event(&events, &id, |e| matches!(e, ExecutionEvent::NodeCompleted(t) if t.node_id == "second")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_goto_back_along_path_is_a_cycle() {
    let engine = engine(Some(Arc::new(ScriptedLlm)));
    let wf = workflow(json!({
        "id": "cycle",
        "entryPoint": "in",
        "nodes": [
            {"id": "in", "type": "input"},
            {"id": "a", "type": "output", "config": {"outputVariable": "seen", "value": true}},
            {"id": "b", "type": "llm", "config": {"prompt": "fail"}, "onError": {"strategy": "goto", "gotoNode": "a"}}
        ],
        "edges": [
            {"id": "e1", "source": "in", "target": "a"},
            {"id": "e2", "source": "a", "target": "b"}
        ]
    }));
    assert!(engine.validate(&wf).is_ok());

    let id = engine.execute_workflow(&wf, Vars::new()).unwrap();
    let execution = engine.wait_for(&id).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.error_kind, Some(ErrorKind::CycleDetected));
    assert!(execution.error.as_deref().is_some_and(|e| e.contains("a -> b -> a")));
    assert_eq!(succeeded(&execution), vec!["in", "a"]);
    assert_eq!(execution.node_events("b")[0].status, NodeState::Error);
    assert_eq!(execution.node_events("a").len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_running_executions_are_capped() {
    let mut config = config();
    config.execution.max_running_executions = 1;
    let engine = relayflow::EngineBuilder::new().config(config).build().unwrap();
    engine.launch().unwrap();

    let first = engine.execute_workflow(&listen_workflow(), Vars::new()).unwrap();
    assert!(matches!(engine.execute_workflow(&listen_workflow(), Vars::new()), Err(FlowError::Engine(_))));
    // the waiting execution is still reachable
    assert_eq!(engine.running_executions(), vec![first.clone()]);

    engine.cancel(&first).unwrap();
    engine.wait_for(&first).await.unwrap();
    let mut second = None;
    wait_until(|| {
        second = engine.execute_workflow(&listen_workflow(), Vars::new()).ok();
        second.is_some()
    })
    .await;
    assert!(second.is_some_and(|id| id != first));
}
