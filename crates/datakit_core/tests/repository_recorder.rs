mod common;

use common::{text, TestModel};
use datakit_core::{
    Arg, ArgMatcher, CallRecorder, Condition, Context, DbError, Method, RecordedCall,
    RecordingSession, Repository, SessionRepository,
};
use rusqlite::types::Value;

fn recorder_with_context() -> CallRecorder {
    let recorder = CallRecorder::new();
    recorder.expect(Method::WithContext);
    recorder
}

#[test]
fn create_succeeds_when_recorded_slot_stays_empty() {
    let recorder = recorder_with_context();
    recorder.expect(Method::Create);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let result = repo.create(&Context::background(), TestModel::named("x"));

    assert_eq!(result, Ok(()));
    recorder.assert_expectations().unwrap();
}

#[test]
fn create_returns_the_recorded_error_verbatim() {
    let fake_error = DbError::other("create error");
    let recorder = recorder_with_context();
    recorder.expect(Method::Create).fails_with(fake_error.clone());
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let err = repo
        .create(&Context::background(), TestModel::named("x"))
        .unwrap_err();

    assert_eq!(err, fake_error);
    recorder.assert_expectations().unwrap();
}

#[test]
fn create_records_the_entity_it_was_given() {
    for name in ["", "x", "Test Name", "名前"] {
        let recorder = recorder_with_context();
        recorder.expect(Method::Create).once();
        let mut session = RecordingSession::new(recorder.clone());
        let model = TestModel::with_id(7, name);

        SessionRepository::<TestModel, _>::new(&mut session)
            .create(&Context::background(), model.clone())
            .unwrap();

        let calls = recorder.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, Method::WithContext);
        assert_eq!(
            calls[1],
            RecordedCall {
                method: Method::Create,
                args: vec![Arg::entity(&model)],
            }
        );
        recorder.assert_expectations().unwrap();
    }
}

#[test]
fn find_forwards_conditions_and_returns_empty_results() {
    let recorder = recorder_with_context();
    recorder.expect(Method::Find);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);
    let conditions = vec![Condition::sql("name = ?", [text("Test Name")])];

    let results = repo.find(&Context::background(), &conditions).unwrap();

    assert!(results.is_empty());
    let find_call = &recorder.calls()[1];
    assert_eq!(find_call.method, Method::Find);
    assert_eq!(find_call.args[1], Arg::Conditions(conditions));
    recorder.assert_expectations().unwrap();
}

#[test]
fn find_returns_programmed_rows() {
    let recorder = recorder_with_context();
    recorder.expect(Method::Find).returning_rows(vec![
        vec![Value::Integer(1), text("a")],
        vec![Value::Integer(2), text("b")],
    ]);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let results = repo.find(&Context::background(), &[]).unwrap();

    assert_eq!(
        results,
        vec![TestModel::with_id(1, "a"), TestModel::with_id(2, "b")]
    );
}

#[test]
fn find_returns_the_recorded_error() {
    let fake_error = DbError::other("find error");
    let recorder = recorder_with_context();
    recorder.expect(Method::Find).fails_with(fake_error.clone());
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let err = repo
        .find(&Context::background(), &[Condition::sql("id = ?", [Value::Integer(-1)])])
        .unwrap_err();

    assert_eq!(err, fake_error);
    recorder.assert_expectations().unwrap();
}

#[test]
fn find_into_keeps_rows_decoded_before_a_bad_one() {
    let recorder = recorder_with_context();
    recorder.expect(Method::Find).returning_rows(vec![
        vec![Value::Integer(1), text("a")],
        vec![text("not an id"), text("b")],
    ]);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);
    let mut out = Vec::new();

    let err = repo
        .find_into(&Context::background(), &mut out, &[])
        .unwrap_err();

    assert!(matches!(err, DbError::InvalidData(_)));
    assert_eq!(out, vec![TestModel::with_id(1, "a")]);
}

#[test]
fn first_returns_zero_value_when_nothing_is_programmed() {
    let recorder = recorder_with_context();
    recorder.expect(Method::First);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let result = repo
        .first(&Context::background(), &[Condition::eq("name", text("Test Name"))])
        .unwrap();

    assert_eq!(result, TestModel::default());
    recorder.assert_expectations().unwrap();
}

#[test]
fn first_forwards_conditions_unchanged() {
    let conditions = vec![
        Condition::eq("name", text("Test Name")),
        Condition::primary_key(5_i64),
    ];
    let recorder = recorder_with_context();
    recorder
        .expect(Method::First)
        .once()
        .with_args(vec![
            ArgMatcher::Any,
            ArgMatcher::Exactly(Arg::Conditions(conditions.clone())),
        ])
        .returning_rows(vec![vec![Value::Integer(5), text("Test Name")]]);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let result = repo.first(&Context::background(), &conditions).unwrap();

    assert_eq!(result, TestModel::with_id(5, "Test Name"));
    assert_eq!(
        recorder.calls()[1],
        RecordedCall {
            method: Method::First,
            args: vec![Arg::output::<TestModel>(), Arg::Conditions(conditions)],
        }
    );
    recorder.assert_expectations().unwrap();
}

#[test]
fn first_with_different_conditions_misses_the_expectation() {
    let recorder = recorder_with_context();
    recorder.expect(Method::First).with_args(vec![
        ArgMatcher::Any,
        ArgMatcher::Exactly(Arg::Conditions(vec![Condition::primary_key(1_i64)])),
    ]);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let err = repo
        .first(&Context::background(), &[Condition::primary_key(2_i64)])
        .unwrap_err();

    assert_eq!(err, DbError::UnexpectedCall(Method::First));
    assert!(recorder.assert_expectations().is_err());
}

#[test]
fn first_decodes_the_first_programmed_row() {
    let recorder = recorder_with_context();
    recorder
        .expect(Method::First)
        .returning_rows(vec![vec![Value::Integer(4), text("found")]]);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let result = repo.first(&Context::background(), &[]).unwrap();

    assert_eq!(result, TestModel::with_id(4, "found"));
}

#[test]
fn first_reports_not_found_for_empty_programmed_rows() {
    let recorder = recorder_with_context();
    recorder.expect(Method::First).returning_rows(Vec::new());
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let err = repo.first(&Context::background(), &[]).unwrap_err();

    assert!(err.is_not_found());
}

#[test]
fn first_returns_the_recorded_error() {
    let fake_error = DbError::other("first error");
    let recorder = recorder_with_context();
    recorder.expect(Method::First).fails_with(fake_error.clone());
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let err = repo
        .first(&Context::background(), &[Condition::primary_key(-1_i64)])
        .unwrap_err();

    assert_eq!(err, fake_error);
    recorder.assert_expectations().unwrap();
}

#[test]
fn save_succeeds_and_fails_as_recorded() {
    let recorder = recorder_with_context();
    recorder.expect(Method::Save).once();
    recorder
        .expect(Method::Save)
        .once()
        .fails_with(DbError::other("save error"));
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);
    let model = TestModel::with_id(1, "Updated Name");

    assert_eq!(repo.save(&Context::background(), model.clone()), Ok(()));
    assert_eq!(
        repo.save(&Context::background(), model),
        Err(DbError::other("save error"))
    );
    recorder.assert_expectations().unwrap();
}

#[test]
fn delete_records_entity_and_empty_conditions() {
    let recorder = recorder_with_context();
    recorder.expect(Method::Delete);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);
    let model = TestModel::with_id(1, "");

    repo.delete(&Context::background(), model.clone()).unwrap();

    assert_eq!(
        recorder.calls()[1].args,
        vec![Arg::entity(&model), Arg::Conditions(Vec::new())]
    );
    recorder.assert_expectations().unwrap();
}

#[test]
fn delete_returns_the_recorded_error() {
    let fake_error = DbError::other("delete error");
    let recorder = recorder_with_context();
    recorder.expect(Method::Delete).fails_with(fake_error.clone());
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    let err = repo
        .delete(&Context::background(), TestModel::with_id(1, ""))
        .unwrap_err();

    assert_eq!(err, fake_error);
    recorder.assert_expectations().unwrap();
}

#[test]
fn context_failure_is_overwritten_by_the_following_call() {
    // Each call replaces the slot, so only the last outcome is returned.
    let recorder = CallRecorder::new();
    recorder
        .expect(Method::WithContext)
        .fails_with(DbError::DeadlineExceeded);
    recorder.expect(Method::Create);
    let mut session = RecordingSession::new(recorder.clone());
    let mut repo = SessionRepository::<TestModel, _>::new(&mut session);

    assert_eq!(
        repo.create(&Context::background(), TestModel::named("x")),
        Ok(())
    );
}
