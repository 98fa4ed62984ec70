//! Scripted interview scenarios: bootstrap, limits, closure and navigation.
//!
//! These run against a `ScriptedGenerator`, so no API key is needed.

use memoir_core::anchor::AnchorSet;
use memoir_core::config::{EngineConfig, QuestionMode};
use memoir_core::{
    AuthorMode, EngineError, IdentityChoice, InterviewHarness, LifeStage, LimitChoice, Prompt,
    QuestionKind,
};

fn question_text(prompt: &Prompt) -> String {
    match prompt {
        Prompt::Question { text, .. } => text.clone(),
        other => panic!("expected a question, got {other:?}"),
    }
}

fn question_kind(prompt: &Prompt) -> QuestionKind {
    match prompt {
        Prompt::Question { kind, .. } => *kind,
        other => panic!("expected a question, got {other:?}"),
    }
}

// =============================================================================
// BOOTSTRAP
// =============================================================================

#[tokio::test]
async fn test_bootstrap_other_person() {
    let harness = InterviewHarness::new();

    let prompt = harness.engine.start(&harness.writer).await.unwrap();
    assert!(matches!(prompt, Prompt::Identity { .. }));

    let prompt = harness
        .engine
        .answer_identity(&harness.writer, IdentityChoice::SomeoneElse)
        .await
        .unwrap();
    assert!(matches!(prompt, Prompt::Relation { .. }));

    let err = harness.engine.answer_relation(&harness.writer, "   ").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRelation));

    let prompt = harness.engine.answer_relation(&harness.writer, "Mother").await.unwrap();
    let text = question_text(&prompt);
    assert!(text.contains("your mother's"), "kickoff should name the subject: {text}");
    assert_eq!(question_kind(&prompt), QuestionKind::Kickoff);

    let author = harness.author().await.unwrap();
    assert_eq!(author.mode, Some(AuthorMode::Other));
    assert_eq!(author.relation_term(), Some("mother"));
    assert_eq!(harness.generator.call_count(), 0);
}

#[tokio::test]
async fn test_unclear_identity_is_asked_again() {
    let harness = InterviewHarness::new();
    harness.engine.start(&harness.writer).await.unwrap();

    let prompt = harness
        .engine
        .answer_identity_text(&harness.writer, "hmm, hard to say")
        .await
        .unwrap();
    assert!(matches!(prompt, Prompt::Identity { .. }));

    let prompt = harness
        .engine
        .answer_identity_text(&harness.writer, "myself")
        .await
        .unwrap();
    assert_eq!(question_kind(&prompt), QuestionKind::Kickoff);
}

#[tokio::test]
async fn test_other_mode_questions_name_the_relation() {
    let harness = InterviewHarness::new();
    harness.bootstrap_other("mother").await.unwrap();
    harness.generator.push_reply("Where did she go to school?");

    let prompt = harness.answer("She grew up in a village near Annecy.").await.unwrap();
    let text = question_text(&prompt);
    assert_eq!(text, "Where did your mother go to school?");
    assert!(!text.contains(" she "));
}

// =============================================================================
// QUESTIONS
// =============================================================================

#[tokio::test]
async fn test_consecutive_questions_never_repeat() {
    let harness = InterviewHarness::new();
    let mut shown = vec![question_text(&harness.bootstrap_self().await.unwrap())];
    for _ in 0..5 {
        harness.generator.push_reply("Who cooked dinner at home?");
    }

    for answer in ["In Lyon.", "My grandmother.", "Soup, mostly.", "On Sundays.", "Yes."] {
        let prompt = harness.answer(answer).await.unwrap();
        shown.push(question_text(&prompt));
    }

    for pair in shown.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
    assert!(shown.iter().all(|q| q.contains('?')));
}

#[tokio::test]
async fn test_generated_question_is_cleaned_up() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness
        .generator
        .push_reply("Question: \"What cherished smells filled the kitchen?\" I hope that helps!");

    let prompt = harness.answer("My father baked bread every night.").await.unwrap();
    assert_eq!(question_text(&prompt), "What smells filled the kitchen?");
    assert_eq!(question_kind(&prompt), QuestionKind::Generated);
}

#[tokio::test]
async fn test_reply_without_question_mark_gets_one_follow_up() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness.generator.push_reply("That sounds like a busy home.");
    harness.generator.push_reply("Who else lived there?");

    let prompt = harness.answer("Six of us in two rooms.").await.unwrap();
    let text = question_text(&prompt);
    assert!(text.ends_with('?'));
    assert_eq!(harness.generator.call_count(), 2);
}

#[tokio::test]
async fn test_generation_failure_uses_stage_fallback() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness
        .generator
        .push_error(memoir_core::GenerationError::Unauthorized("bad key".into()));

    let prompt = harness.answer("By the river.").await.unwrap();
    let author = harness.author().await.unwrap();
    assert_eq!(question_text(&prompt), LifeStage::Childhood.fallback_question(&author));
    assert_eq!(question_kind(&prompt), QuestionKind::Fallback);
}

#[tokio::test]
async fn test_no_recall_answer_steers_away() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness.generator.push_reply("What games did you play outside?");

    harness.answer("I don't remember much of the house.").await.unwrap();
    let request = &harness.generator.requests()[0];
    let user = request.last_user_message().unwrap();
    assert!(user.contains("do not remember that"));
}

// =============================================================================
// LIMITS
// =============================================================================

#[tokio::test]
async fn test_soft_limit_offer_then_hard_close() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();

    let long_answer = "We lived by the river and fished every morning. ".repeat(170);
    let prompt = harness.answer(&long_answer).await.unwrap();
    assert!(matches!(prompt, Prompt::LimitOffer { stage: LifeStage::Childhood, .. }));
    assert_eq!(harness.generator.call_count(), 0);

    let err = harness.answer("More, please.").await.unwrap_err();
    assert!(matches!(err, EngineError::ChoicePending { .. }));
    let err = harness
        .engine
        .choose_text(&harness.writer, "maybe")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnclearChoice));

    harness.generator.push_reply("What did the river look like in winter?");
    let prompt = harness
        .engine
        .choose(&harness.writer, LimitChoice::Continue)
        .await
        .unwrap();
    assert_eq!(question_text(&prompt), "What did the river look like in winter?");

    // The offer is shown only once.
    harness.generator.push_reply("Who taught you to fish?");
    let prompt = harness.answer("It froze at the edges.").await.unwrap();
    assert_eq!(question_kind(&prompt), QuestionKind::Generated);

    let calls = harness.generator.call_count();
    let prompt = harness.answer(&"My uncle did. ".repeat(60)).await.unwrap();
    match prompt {
        Prompt::StageClosed {
            stage,
            next_stage,
            forced,
            notice,
        } => {
            assert_eq!(stage, LifeStage::Childhood);
            assert_eq!(next_stage, LifeStage::Adolescence);
            assert!(forced);
            assert!(notice.contains("length limit"));
        }
        other => panic!("expected the stage to close, got {other:?}"),
    }
    assert_eq!(harness.generator.call_count(), calls);

    let progress = harness.engine.progress(&harness.writer).await.unwrap();
    assert_eq!(progress.active_stage, LifeStage::Adolescence);
    let childhood = harness
        .engine
        .session(&harness.writer, LifeStage::Childhood)
        .await
        .unwrap();
    assert!(childhood.done);
    assert!(childhood.transcript_chars() >= 9000);
}

#[tokio::test]
async fn test_continue_without_offer_is_rejected() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness.generator.push_reply("Who lived next door?");
    harness.answer("A small flat in Lyon.").await.unwrap();

    let err = harness
        .engine
        .choose(&harness.writer, LimitChoice::Continue)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoLimitOffer { stage: LifeStage::Childhood }));

    let session = harness.session().await.unwrap();
    assert!(!session.soft_limit_shown);
    assert!(!session.beyond_limit_allowed);
    assert_eq!(session.pending_question.as_ref().map(|p| p.text.as_str()), Some("Who lived next door?"));
}

#[tokio::test]
async fn test_soft_limit_by_turn_count() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    for i in 0..7 {
        harness.generator.push_reply(format!("Which neighbor number {i} do you recall?"));
    }

    for i in 0..7 {
        let prompt = harness.answer(&format!("Answer {i}.")).await.unwrap();
        assert!(matches!(prompt, Prompt::Question { .. }));
    }
    let prompt = harness.answer("Answer 7.").await.unwrap();
    assert!(matches!(prompt, Prompt::LimitOffer { .. }));
    assert_eq!(harness.session().await.unwrap().turn_count(), 8);
}

// =============================================================================
// CLOSURE
// =============================================================================

#[tokio::test]
async fn test_summarize_asks_anchored_closure() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness.generator.push_reply("Who ran the bakery?");
    harness.answer("We lived above the bakery on Rue Mercière.").await.unwrap();

    harness.generator.push_reply("What does the bakery mean to you now?");
    let prompt = harness
        .engine
        .choose(&harness.writer, LimitChoice::Summarize)
        .await
        .unwrap();
    assert_eq!(question_kind(&prompt), QuestionKind::Closure);
    assert_eq!(question_text(&prompt), "What does the bakery mean to you now?");

    let prompt = harness.answer("It still smells like home.").await.unwrap();
    assert!(matches!(
        prompt,
        Prompt::StageClosed {
            stage: LifeStage::Childhood,
            forced: false,
            ..
        }
    ));

    let session = harness
        .engine
        .session(&harness.writer, LifeStage::Childhood)
        .await
        .unwrap();
    assert_eq!(session.turn_count(), 2);
    assert!(!session.section_text().contains("Who ran the bakery?"));
}

#[tokio::test]
async fn test_inducing_closure_falls_back_to_template() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    let answer = "My brother Paul taught me to swim in the lake.";
    harness.generator.push_reply("How old were you?");
    harness.answer(answer).await.unwrap();

    harness
        .generator
        .push_reply("Is there anything else you would like to add?");
    let prompt = harness
        .engine
        .choose(&harness.writer, LimitChoice::Summarize)
        .await
        .unwrap();

    let anchors = AnchorSet::extract(&[answer], harness.engine.config().anchors.max_anchors);
    let text = question_text(&prompt);
    assert!(text.contains(anchors.first().unwrap()), "closure must use an anchor: {text}");
    assert!(!text.to_lowercase().contains("anything else"));
    assert!(text.chars().count() <= harness.engine.config().anchors.closure_max_chars);
}

#[tokio::test]
async fn test_closure_never_repeats_previous_question() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    let answer = "We lived above the bakery on Rue Mercière.";
    harness.generator.push_reply("What did the bakery smell like?");
    let previous = question_text(&harness.answer(answer).await.unwrap());
    assert_eq!(previous, "What did the bakery smell like?");

    harness.generator.push_reply("What did the bakery smell like?");
    let prompt = harness
        .engine
        .choose(&harness.writer, LimitChoice::Summarize)
        .await
        .unwrap();

    assert_eq!(question_kind(&prompt), QuestionKind::Closure);
    let closure = question_text(&prompt);
    assert!(!closure.trim().eq_ignore_ascii_case(previous.trim()), "closure repeated: {closure}");
    let anchors = AnchorSet::extract(&[answer], harness.engine.config().anchors.max_anchors);
    assert!(anchors.matched_in(&closure).is_some(), "closure must use an anchor: {closure}");
}

#[tokio::test]
async fn test_overlong_closure_candidate_is_replaced() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness.generator.push_reply("Who ran the bakery?");
    harness.answer("We lived above the bakery on Rue Mercière.").await.unwrap();

    let long = "When you think back on the bakery on Rue Mercière today, what single smell comes first?";
    harness.generator.push_reply(long);
    let prompt = harness
        .engine
        .choose(&harness.writer, LimitChoice::Summarize)
        .await
        .unwrap();

    assert_eq!(harness.engine.config().anchors.closure_max_chars, 50);
    let closure = question_text(&prompt);
    assert_ne!(closure, long);
    assert!(closure.chars().count() <= 50, "closure too long: {closure}");
}

#[tokio::test]
async fn test_skipping_closure_closes_stage() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness.generator.push_reply("What did the garden grow?");
    harness.answer("We had a garden behind the house.").await.unwrap();
    harness.generator.push_reply("What does the garden mean to you now?");
    harness
        .engine
        .choose(&harness.writer, LimitChoice::Summarize)
        .await
        .unwrap();

    let prompt = harness.engine.skip(&harness.writer).await.unwrap();
    assert!(matches!(prompt, Prompt::StageClosed { forced: false, .. }));
}

// =============================================================================
// NAVIGATION
// =============================================================================

#[tokio::test]
async fn test_reopen_done_stage() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness.answer(&"Long days in the orchard. ".repeat(360)).await.unwrap();

    harness
        .engine
        .switch_stage(&harness.writer, LifeStage::Childhood)
        .await
        .unwrap();
    let err = harness.engine.ask_next(&harness.writer).await.unwrap_err();
    assert!(matches!(err, EngineError::StageDone { stage: LifeStage::Childhood }));

    harness
        .engine
        .reopen_stage(&harness.writer, LifeStage::Childhood)
        .await
        .unwrap();
    harness.generator.push_reply("Which tree did you climb?");
    let prompt = harness.engine.ask_next(&harness.writer).await.unwrap();
    assert_eq!(question_text(&prompt), "Which tree did you climb?");
    assert_eq!(harness.session().await.unwrap().turn_count(), 1);
}

#[tokio::test]
async fn test_switching_stages_keeps_each_transcript() {
    let harness = InterviewHarness::new();
    harness.bootstrap_self().await.unwrap();
    harness.generator.push_reply("Who was your best friend?");
    harness.answer("A small flat in Lyon.").await.unwrap();

    harness
        .engine
        .switch_stage(&harness.writer, LifeStage::Present)
        .await
        .unwrap();
    let prompt = harness.engine.start(&harness.writer).await.unwrap();
    assert_eq!(question_kind(&prompt), QuestionKind::Kickoff);
    harness.generator.push_reply("Who visits you most often?");
    harness.answer("I garden and read.").await.unwrap();

    let overview = harness.engine.overview(&harness.writer).await.unwrap();
    let childhood = &overview[LifeStage::Childhood.index()];
    let present = &overview[LifeStage::Present.index()];
    assert_eq!(childhood.turns, 1);
    assert_eq!(present.turns, 1);
    assert!(present.active && !childhood.active);
}

// =============================================================================
// FIXED POOL
// =============================================================================

#[tokio::test]
async fn test_fixed_pool_mode_makes_no_calls() {
    let config = EngineConfig::default().with_question_mode(QuestionMode::FixedPool);
    let harness = InterviewHarness::with_config(config);
    let mut shown = vec![question_text(&harness.bootstrap_self().await.unwrap())];

    for answer in ["The harbor.", "My aunt Rosa.", "Fishing boats."] {
        let prompt = harness.answer(answer).await.unwrap();
        assert_eq!(question_kind(&prompt), QuestionKind::Canned);
        shown.push(question_text(&prompt));
    }
    for pair in shown.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }

    let prompt = harness
        .engine
        .choose(&harness.writer, LimitChoice::Summarize)
        .await
        .unwrap();
    assert_eq!(question_kind(&prompt), QuestionKind::Closure);
    assert!(question_text(&prompt).contains("boats") || question_text(&prompt).contains("Fishing"));
    assert_eq!(harness.generator.call_count(), 0);
}
