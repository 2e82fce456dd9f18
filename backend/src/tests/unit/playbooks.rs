use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::playbooks::defaults;
use crate::playbooks::model::{
    Action, ActionOutcome, CreateTaskConfig, OutcomeStatus, SendEmailConfig, SendSlackConfig,
    Trigger, TriggerWebhookConfig,
};
use crate::playbooks::ExecutionResult;
use crate::tests::fixtures::{
    customer, engine_with, fake_gateways, playbook, GatewayLog, MemoryPlaybookStore,
    MemoryRecorder,
};

fn churn_playbook(priority: i32) -> crate::playbooks::model::Playbook {
    playbook(
        "Churn watch",
        priority,
        Trigger::ChurnRiskHigh {},
        vec![Action::CreateTask(CreateTaskConfig {
            title: Some("Check on customer".to_string()),
            ..Default::default()
        })],
    )
}

#[tokio::test]
async fn test_disabled_playbooks_never_execute() {
    let mut disabled = churn_playbook(1);
    disabled.enabled = false;

    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![disabled]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store.clone(), recorder.clone(), log.clone());

    let results = engine.check_triggers(&customer(30, "Active", None)).await;

    assert!(results.is_empty());
    assert!(recorder.executions.lock().unwrap().is_empty());
    assert!(log.tasks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_churn_trigger_executes_exactly_once_per_check() {
    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![churn_playbook(1)]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store.clone(), recorder.clone(), log.clone());

    let results = engine.check_triggers(&customer(30, "Active", None)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(recorder.executions.lock().unwrap().len(), 1);
    assert_eq!(log.tasks.lock().unwrap().len(), 1);

    // A healthy customer fires nothing.
    let results = engine.check_triggers(&customer(90, "Active", None)).await;
    assert!(results.is_empty());
    assert_eq!(recorder.executions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failing_action_does_not_abort_remaining_actions() {
    let three_step = playbook(
        "Escalation",
        1,
        Trigger::ChurnRiskHigh {},
        vec![
            Action::CreateTask(CreateTaskConfig::default()),
            Action::SendEmail(SendEmailConfig::default()),
            Action::SendSlack(SendSlackConfig::default()),
        ],
    );

    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![three_step]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    log.fail_email.store(true, Ordering::SeqCst);
    let engine = engine_with(store.clone(), recorder.clone(), log.clone());

    let results = engine.check_triggers(&customer(20, "Active", None)).await;

    assert_eq!(results.len(), 1);
    let outcomes = &results[0].outcomes;
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].status, OutcomeStatus::Success);
    assert_eq!(outcomes[1].status, OutcomeStatus::Failed);
    assert!(outcomes[1].error.is_some());
    assert_eq!(outcomes[2].status, OutcomeStatus::Success);
    assert_eq!(results[0].failed_count(), 1);

    // Task and chat gateways were still reached despite the email failure.
    assert_eq!(log.tasks.lock().unwrap().len(), 1);
    assert_eq!(log.chat_messages.lock().unwrap().len(), 1);

    let executions = recorder.executions.lock().unwrap();
    assert!(executions[0].completed);
    assert_eq!(executions[0].outcomes.len(), 3);
}

#[tokio::test]
async fn test_completed_run_updates_trigger_stats() {
    let playbook = churn_playbook(1);
    let playbook_id = playbook.id;
    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![playbook]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store.clone(), recorder, log);

    let before = Utc::now();
    engine.check_triggers(&customer(10, "Active", None)).await;

    assert_eq!(store.execution_count(playbook_id), 1);
    let triggered_at = store.last_triggered_at(playbook_id).unwrap();
    assert!(triggered_at >= before);

    engine.check_triggers(&customer(10, "Active", None)).await;
    assert_eq!(store.execution_count(playbook_id), 2);
}

#[tokio::test]
async fn test_install_defaults_is_idempotent() {
    let store = Arc::new(MemoryPlaybookStore::default());
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store.clone(), recorder, log);

    engine.install_defaults().await.unwrap();
    let after_first = store.playbooks.lock().unwrap().len();
    assert_eq!(after_first, defaults::default_playbooks().len());

    engine.install_defaults().await.unwrap();
    assert_eq!(store.playbooks.lock().unwrap().len(), after_first);
}

#[tokio::test]
async fn test_onboarding_scenario() {
    let onboarding = playbook(
        "New Customer Onboarding",
        2,
        Trigger::StatusChanged {
            status: "Active".to_string(),
        },
        vec![
            Action::CreateTask(CreateTaskConfig {
                title: Some("Schedule kickoff call".to_string()),
                ..Default::default()
            }),
            Action::SendEmail(SendEmailConfig {
                template: Some("welcome_email".to_string()),
                subject: None,
            }),
        ],
    );

    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![onboarding]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store, recorder.clone(), log.clone());

    let results = engine.check_triggers(&customer(90, "Active", None)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcomes.len(), 2);
    assert!(results[0]
        .outcomes
        .iter()
        .all(|o| o.status == OutcomeStatus::Success));

    let tasks = log.tasks.lock().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Schedule kickoff call");
    assert_eq!(tasks[0].created_by, "system");

    // The welcome email went to the primary contact and was logged as
    // an activity.
    let emails = log.emails.lock().unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].0, "bill@initech.example");
    let activities = log.activities.lock().unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].activity_type, "email_sent");
}

#[tokio::test]
async fn test_higher_priority_playbook_runs_first() {
    let low = playbook(
        "Low priority",
        1,
        Trigger::ChurnRiskHigh {},
        vec![Action::SendSlack(SendSlackConfig::default())],
    );
    let high = playbook(
        "High priority",
        2,
        Trigger::ChurnRiskHigh {},
        vec![Action::SendSlack(SendSlackConfig::default())],
    );
    let low_id = low.id;
    let high_id = high.id;

    // Inserted low first so ordering must come from priority, not age.
    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![low, high]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store, recorder.clone(), log);

    engine.check_triggers(&customer(10, "Active", None)).await;

    let executions = recorder.executions.lock().unwrap();
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[0].playbook_id, high_id);
    assert_eq!(executions[1].playbook_id, low_id);
}

#[tokio::test]
async fn test_store_outage_aborts_cycle_quietly() {
    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![churn_playbook(1)]));
    store.fail_list.store(true, Ordering::SeqCst);
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store, recorder.clone(), log);

    let results = engine.check_triggers(&customer(10, "Active", None)).await;

    assert!(results.is_empty());
    assert!(recorder.executions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_trigger_stat_write_failure_counts_playbook_as_failed() {
    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![churn_playbook(1)]));
    store.fail_record_trigger.store(true, Ordering::SeqCst);
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store, recorder.clone(), log.clone());

    let results = engine.check_triggers(&customer(10, "Active", None)).await;

    // The run itself completed and was audited, but the playbook is not
    // reported as a success.
    assert!(results.is_empty());
    let executions = recorder.executions.lock().unwrap();
    assert_eq!(executions.len(), 1);
    assert!(executions[0].completed);
    assert_eq!(log.tasks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_recipient_fails_email_action_only() {
    let mailer = playbook(
        "Welcome mail",
        1,
        Trigger::StatusChanged {
            status: "Active".to_string(),
        },
        vec![
            Action::SendEmail(SendEmailConfig::default()),
            Action::SendSlack(SendSlackConfig::default()),
        ],
    );

    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![mailer]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store, recorder, log.clone());

    let mut no_email = customer(90, "Active", None);
    no_email.primary_contact_email = None;

    let results = engine.check_triggers(&no_email).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(results[0].outcomes[1].status, OutcomeStatus::Success);
    assert!(log.emails.lock().unwrap().is_empty());
    assert_eq!(log.chat_messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_failure_is_recorded_not_fatal() {
    let hooked = playbook(
        "Webhook notify",
        1,
        Trigger::ChurnRiskHigh {},
        vec![
            Action::TriggerWebhook(TriggerWebhookConfig {
                event: Some("customer.churn_risk.high".to_string()),
                ..Default::default()
            }),
            Action::CreateTask(CreateTaskConfig::default()),
        ],
    );

    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![hooked]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    log.fail_webhooks.store(true, Ordering::SeqCst);
    let engine = engine_with(store, recorder, log.clone());

    let results = engine.check_triggers(&customer(10, "Active", None)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcomes[0].status, OutcomeStatus::Failed);
    assert_eq!(results[0].outcomes[1].status, OutcomeStatus::Success);
    assert_eq!(log.tasks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_action_kind_is_skipped() {
    let future_proof = playbook(
        "Future features",
        1,
        Trigger::ChurnRiskHigh {},
        vec![
            Action::Unknown,
            Action::CreateTask(CreateTaskConfig::default()),
        ],
    );

    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![future_proof]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store, recorder, log.clone());

    let results = engine.check_triggers(&customer(10, "Active", None)).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcomes[0].status, OutcomeStatus::Success);
    assert_eq!(results[0].outcomes[0].action, "unknown");
    assert_eq!(log.tasks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_payload_includes_customer_identity() {
    let hooked = playbook(
        "Webhook notify",
        1,
        Trigger::ChurnRiskHigh {},
        vec![Action::TriggerWebhook(TriggerWebhookConfig {
            event: Some("customer.churn_risk.high".to_string()),
            url: None,
            data: serde_json::json!({ "severity": "high" }),
        })],
    );

    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![hooked]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store, recorder, log.clone());

    let target = customer(10, "Active", None);
    engine.check_triggers(&target).await;

    let webhooks = log.webhooks.lock().unwrap();
    assert_eq!(webhooks.len(), 1);
    assert_eq!(webhooks[0].0, "customer.churn_risk.high");
    assert_eq!(webhooks[0].1["customer_name"], "Initech");
    assert_eq!(webhooks[0].1["severity"], "high");
}

#[tokio::test]
async fn test_status_update_action_broadcasts_change() {
    let reactivate = playbook(
        "Flag at-risk",
        1,
        Trigger::HealthScoreDrop { threshold: 40 },
        vec![Action::UpdateStatus(
            crate::playbooks::model::UpdateStatusConfig {
                new_status: "At Risk".to_string(),
            },
        )],
    );

    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![reactivate]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store, recorder, log.clone());

    let target = customer(35, "Active", None);
    engine.check_triggers(&target).await;

    let updates = log.status_updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0], (target.id, "At Risk".to_string()));
    assert!(log
        .broadcast_events
        .lock()
        .unwrap()
        .contains(&"customer:updated".to_string()));
}

#[test]
fn test_failed_count_follows_outcome_status() {
    // A failed outcome counts even if its error message is missing.
    let mut failed = ActionOutcome::failed("send_email", "smtp down");
    failed.error = None;

    let result = ExecutionResult {
        execution_id: uuid::Uuid::new_v4(),
        playbook_id: uuid::Uuid::new_v4(),
        outcomes: vec![ActionOutcome::success("create_task"), failed],
    };

    assert_eq!(result.failed_count(), 1);
}

#[tokio::test]
async fn test_assign_csm_action_reassigns_owner() {
    let csm_id = uuid::Uuid::new_v4();
    let reassign = playbook(
        "Escalate to senior CSM",
        1,
        Trigger::ChurnRiskHigh {},
        vec![Action::AssignCsm(crate::playbooks::model::AssignCsmConfig {
            csm_id,
        })],
    );

    let store = Arc::new(MemoryPlaybookStore::with_playbooks(vec![reassign]));
    let recorder = Arc::new(MemoryRecorder::default());
    let log = Arc::new(GatewayLog::default());
    let engine = engine_with(store, recorder, log.clone());

    let target = customer(10, "Active", None);
    engine.check_triggers(&target).await;

    let updates = log.owner_updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0], (target.id, csm_id));
}

#[tokio::test]
async fn test_gateways_bundle_is_cloneable() {
    // The executor and handlers share one bundle.
    let log = Arc::new(GatewayLog::default());
    let gateways = fake_gateways(log);
    let _copy = gateways.clone();
}
