//! Pipeline FSM tests

use deployer::deploy::fsm::{PipelineEvent, PipelineFsm, PipelinePhase};

fn at_polling() -> PipelineFsm {
    let mut fsm = PipelineFsm::new();
    fsm.process(PipelineEvent::Start).unwrap();
    fsm.process(PipelineEvent::BuildSucceeded).unwrap();
    fsm.process(PipelineEvent::Upload).unwrap();
    fsm.process(PipelineEvent::Uploaded).unwrap();
    fsm
}

#[test]
fn test_fsm_initial_state() {
    let fsm = PipelineFsm::new();
    assert_eq!(fsm.phase(), PipelinePhase::Idle);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.attempts(), 0);
}

#[test]
fn test_fsm_build_failure() {
    let mut fsm = PipelineFsm::new();
    fsm.process(PipelineEvent::Start).unwrap();
    fsm.process(PipelineEvent::BuildFailed("Build failed".to_string()))
        .unwrap();

    assert_eq!(fsm.phase(), PipelinePhase::BuildFailed);
    assert_eq!(fsm.error(), Some("Build failed"));
    assert!(fsm.phase().is_terminal());
}

#[test]
fn test_fsm_upload_failure_skips_polling() {
    let mut fsm = PipelineFsm::new();
    fsm.process(PipelineEvent::Start).unwrap();
    fsm.process(PipelineEvent::BuildSucceeded).unwrap();
    fsm.process(PipelineEvent::Upload).unwrap();
    fsm.process(PipelineEvent::DeployFailed("Invalid deployment response".to_string()))
        .unwrap();

    assert_eq!(fsm.phase(), PipelinePhase::DeployFailed);
}

#[test]
fn test_fsm_remote_error_and_timeout() {
    let mut fsm = at_polling();
    fsm.process(PipelineEvent::DeployFailed("quota exceeded".to_string()))
        .unwrap();
    assert_eq!(fsm.phase(), PipelinePhase::DeployFailed);
    assert_eq!(fsm.error(), Some("quota exceeded"));

    let mut fsm = at_polling();
    fsm.process(PipelineEvent::TimedOut).unwrap();
    assert_eq!(fsm.phase(), PipelinePhase::TimedOut);
    assert_eq!(fsm.error(), Some("Deployment timed out"));
}

#[test]
fn test_fsm_cancel_only_while_active() {
    let mut fsm = PipelineFsm::new();
    assert!(fsm.process(PipelineEvent::Cancel).is_err());

    fsm.process(PipelineEvent::Start).unwrap();
    fsm.process(PipelineEvent::Cancel).unwrap();
    assert_eq!(fsm.phase(), PipelinePhase::Cancelled);
    assert!(fsm.error().is_none());

    // Already at rest
    assert!(fsm.process(PipelineEvent::Cancel).is_err());
}

#[test]
fn test_fsm_no_start_while_active() {
    let mut fsm = at_polling();
    assert!(fsm.process(PipelineEvent::Start).is_err());
    assert_eq!(fsm.phase(), PipelinePhase::Polling);
}

#[test]
fn test_fsm_retry_after_failure_clears_error() {
    let mut fsm = at_polling();
    fsm.process(PipelineEvent::TimedOut).unwrap();
    assert_eq!(fsm.attempts(), 1);

    fsm.process(PipelineEvent::Start).unwrap();
    assert_eq!(fsm.phase(), PipelinePhase::Building);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.attempts(), 2);
}

#[test]
fn test_fsm_rejects_skipped_phases() {
    let mut fsm = PipelineFsm::new();
    fsm.process(PipelineEvent::Start).unwrap();

    assert!(fsm.process(PipelineEvent::Upload).is_err());
    assert!(fsm.process(PipelineEvent::Ready).is_err());
    assert!(fsm.process(PipelineEvent::TimedOut).is_err());
    assert_eq!(fsm.phase(), PipelinePhase::Building);
}

#[test]
fn test_phase_serializes_snake_case() {
    let json = serde_json::to_string(&PipelinePhase::BuildFailed).unwrap();
    assert_eq!(json, "\"build_failed\"");
}
