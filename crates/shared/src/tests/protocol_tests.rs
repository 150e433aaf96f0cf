use serde_json::json;

use crate::{
    domain::{ChatId, Role, SessionKey, UserId},
    protocol::{Ack, Mutation, RematchState, RoundSnapshot},
};

fn live_payload() -> serde_json::Value {
    json!({
        "ok": true,
        "ended": false,
        "role": "admin",
        "rev": 7,
        "timer_seconds": 30,
        "rounds_total": 10,
        "round": {
            "started_at": 100.0,
            "question_at": 103.0,
            "deadline": 133.0,
            "finished": false,
            "countdown_sec": 3
        },
        "question": {
            "question": "Which studio?",
            "options": ["A", "B", "C", "D"],
            "image": "https://img.example/cover.jpg"
        },
        "players": {
            "42": { "name": "Ann", "answered": true },
            "43": { "name": "Bob", "answered": false }
        }
    })
}

#[test]
fn parses_live_snapshot() {
    let snapshot: RoundSnapshot = serde_json::from_value(live_payload()).expect("parse");

    assert_eq!(snapshot.revision, 7);
    assert_eq!(snapshot.role, Role::Admin);
    assert_eq!(snapshot.started_at(), Some(100.0));
    assert_eq!(snapshot.pending_deadline(), Some(133.0));
    assert!(snapshot.has_answered(UserId(42)));
    assert!(!snapshot.has_answered(UserId(43)));
    assert!(!snapshot.has_answered(UserId(99)));
    assert_eq!(snapshot.answered_count(), 1);
    assert_eq!(snapshot.revealed_answer(), None);

    let round = snapshot.round.as_ref().expect("round");
    assert_eq!(round.countdown_end(5.0), 103.0);
    assert!(!round.question_live(102.5));
    assert!(round.question_live(103.0));
}

#[test]
fn ended_envelope_needs_no_revision() {
    let snapshot: RoundSnapshot =
        serde_json::from_value(json!({ "ok": true, "ended": true })).expect("parse");
    assert!(snapshot.ended);
    assert_eq!(snapshot.revision, 0);
    assert!(snapshot.round.is_none());
}

#[test]
fn not_found_envelope_parses() {
    let snapshot: RoundSnapshot =
        serde_json::from_value(json!({ "ok": false, "error": "no_game" })).expect("parse");
    assert!(!snapshot.ok);
}

#[test]
fn live_snapshot_without_revision_is_malformed() {
    let mut payload = live_payload();
    payload.as_object_mut().expect("object").remove("rev");
    let err = serde_json::from_value::<RoundSnapshot>(payload).expect_err("must fail");
    assert!(err.to_string().contains("rev"), "unexpected error: {err}");
}

#[test]
fn rejects_out_of_range_answer() {
    let mut payload = live_payload();
    payload["question"]["answer"] = json!(9);
    assert!(serde_json::from_value::<RoundSnapshot>(payload).is_err());
}

#[test]
fn rejects_question_without_options() {
    let mut payload = live_payload();
    payload["question"]["options"] = json!([]);
    assert!(serde_json::from_value::<RoundSnapshot>(payload).is_err());
}

#[test]
fn rejects_negative_countdown() {
    let mut payload = live_payload();
    payload["round"]["countdown_sec"] = json!(-1.0);
    assert!(serde_json::from_value::<RoundSnapshot>(payload).is_err());
}

#[test]
fn missing_countdown_falls_back_to_client_default() {
    let mut payload = live_payload();
    payload["round"]
        .as_object_mut()
        .expect("round")
        .remove("countdown_sec");
    let snapshot: RoundSnapshot = serde_json::from_value(payload).expect("parse");
    let round = snapshot.round.expect("round");
    assert_eq!(round.countdown_or(3.0), 3.0);
    assert_eq!(round.countdown_end(3.0), 103.0);
}

#[test]
fn revealed_answer_requires_finished_round() {
    let mut payload = live_payload();
    payload["question"]["answer"] = json!(2);
    let snapshot: RoundSnapshot = serde_json::from_value(payload.clone()).expect("parse");
    assert_eq!(snapshot.revealed_answer(), None);

    payload["round"]["finished"] = json!(true);
    let snapshot: RoundSnapshot = serde_json::from_value(payload).expect("parse");
    assert_eq!(snapshot.revealed_answer(), Some(2));
    assert_eq!(snapshot.pending_deadline(), None);
}

#[test]
fn serialized_snapshot_parses_back() {
    let snapshot: RoundSnapshot = serde_json::from_value(live_payload()).expect("parse");
    let value = serde_json::to_value(&snapshot).expect("serialize");
    assert_eq!(value["rev"], json!(7));
    assert_eq!(value["question"]["question"], json!("Which studio?"));
}

#[test]
fn submit_answer_body_nests_user() {
    let key = SessionKey::new(ChatId(-100), UserId(42));
    let body = serde_json::to_value(Mutation::SubmitAnswer { option: 2 }.request(key))
        .expect("serialize");
    assert_eq!(
        body,
        json!({ "chat_id": -100, "user": { "id": 42 }, "given": 2 })
    );
}

#[test]
fn admin_bodies_carry_session_identity() {
    let key = SessionKey::new(ChatId(5), UserId(6));
    let config = serde_json::to_value(
        Mutation::Configure {
            timer_seconds: 45,
            rounds_total: 15,
        }
        .request(key),
    )
    .expect("serialize");
    assert_eq!(
        config,
        json!({ "chat_id": 5, "user_id": 6, "timer_seconds": 45, "rounds_total": 15 })
    );

    let next = serde_json::to_value(Mutation::Next.request(key)).expect("serialize");
    assert_eq!(next, json!({ "chat_id": 5, "user_id": 6 }));
    assert_eq!(Mutation::Next.path(), "api/admin/next");

    let join = serde_json::to_value(
        Mutation::RematchJoin {
            name: "Ann".into(),
        }
        .request(key),
    )
    .expect("serialize");
    assert_eq!(join, json!({ "chat_id": 5, "user_id": 6, "name": "Ann" }));
}

#[test]
fn rematch_state_lookups() {
    let state: RematchState = serde_json::from_value(json!({
        "ok": true,
        "confirmed": { "42": "Ann" },
        "admin_id": 7,
        "leaderboard": [{ "name": "Ann", "score": 4, "total_time": 12.5 }]
    }))
    .expect("parse");

    assert!(state.is_confirmed(UserId(42)));
    assert!(!state.is_confirmed(UserId(7)));
    assert!(state.is_admin(UserId(7)));
    assert!(state.can_start());
    assert_eq!(state.confirmed_names(), vec!["Ann"]);
    assert_eq!(state.leaderboard[0].score, 4);
}

#[test]
fn ack_defaults() {
    let ack: Ack = serde_json::from_value(json!({ "ok": false, "error": "not_admin" }))
        .expect("parse");
    assert_eq!(ack, Ack::rejected("not_admin"));
    assert!(Ack::ok().ok);
}
