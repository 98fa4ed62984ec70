//! Message construction for question, follow-up and closure requests.

use super::QuestionContext;
use crate::anchor::AnchorSet;
use crate::generation::ChatMessage;

fn role_description(ctx: &QuestionContext<'_>) -> String {
    match ctx.author.relation_term() {
        Some(relation) => format!(
            "You are a neutral, attentive interviewer helping someone record the life of their {relation}. \
             Address the writer as \"you\" and always refer to the person whose life is recorded as \"your {relation}\". \
             Never ask the writer about their own life unless it concerns their {relation}."
        ),
        None => "You are a warm, patient companion helping someone write down their own life story. \
                 Address the writer as \"you\"."
            .to_string(),
    }
}

/// System message shared by all question requests.
pub fn system_message(ctx: &QuestionContext<'_>) -> ChatMessage {
    let mut system = role_description(ctx);

    system.push_str(&format!(
        "\n\n## Current life stage\n{} ({})\n",
        ctx.stage.label(),
        ctx.stage.span_hint()
    ));

    system.push_str("\n## What we know about the person\n");
    system.push_str(&ctx.author.subject.fact_sheet());

    if !ctx.themes.is_empty() {
        let themes: Vec<&str> = ctx.themes.iter().map(String::as_str).collect();
        system.push_str(&format!(
            "\n## Themes the writer would like to explore\n{}\nLean toward these when it fits; they are not a checklist.\n",
            themes.join(", ")
        ));
    }

    system.push_str(&format!(
        "\n## Rules\n\
         - {}\n\
         - Ask exactly one question about one concrete thing: a place, a person, an event or a feeling.\n\
         - Build on the writer's latest answer when possible.\n\
         - Keep it under {} characters and end it with a question mark.\n\
         - Plain, everyday words. No flattery, no ornate adjectives.\n\
         - Reply with the question only.\n",
        ctx.style.strictness.question_rule(),
        ctx.max_question_chars
    ));

    ChatMessage::system(system)
}

fn history_block(ctx: &QuestionContext<'_>) -> String {
    if ctx.history.is_empty() {
        return "(No answers yet in this stage.)\n".to_string();
    }
    ctx.history
        .iter()
        .map(|turn| format!("Guide: {}\nWriter: {}\n", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Request for the next question.
pub fn question_messages(ctx: &QuestionContext<'_>) -> Vec<ChatMessage> {
    let mut user = format!("Conversation so far in this stage:\n\n{}\n", history_block(ctx));
    if ctx.avoid_recalled_angle {
        user.push_str(
            "The writer said they do not remember that. Do not press on it; move to a different angle of the same stage.\n",
        );
    }
    if let Some(previous) = ctx.previous_question {
        user.push_str(&format!("Do not repeat this question: \"{previous}\"\n"));
    }
    user.push_str("\nAsk the next question.");

    vec![system_message(ctx), ChatMessage::user(user)]
}

/// Request to turn a reply without a question mark into one question.
pub fn follow_up_messages(ctx: &QuestionContext<'_>, previous_reply: &str) -> Vec<ChatMessage> {
    let mut messages = question_messages(ctx);
    messages.push(ChatMessage::assistant(previous_reply));
    messages.push(ChatMessage::user(
        "That was not a question. Reply with a single question sentence that ends with a question mark.",
    ));
    messages
}

/// Request for the single wrap-up question of a stage.
pub fn closure_messages(
    ctx: &QuestionContext<'_>,
    anchors: &AnchorSet,
    max_chars: usize,
) -> Vec<ChatMessage> {
    let words = anchors.as_slice().join(", ");
    let user = format!(
        "Conversation so far in this stage:\n\n{}\n\
         The writer wants to wrap up this stage. Ask exactly one closing question that \
         uses at least one of these words from their latest answers: {words}.\n\
         Do not invite new stories or new details. Do not ask whether there is anything else.\n\
         Keep it under {max_chars} characters and end it with a question mark. Reply with the question only.",
        history_block(ctx)
    );
    vec![system_message(ctx), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::{AuthorContext, IdentityChoice};
    use crate::generation::ChatRole;
    use crate::interview::Turn;
    use crate::stage::LifeStage;
    use crate::store::WriterId;
    use crate::style::{StyleProfile, Strictness};
    use std::collections::BTreeSet;

    #[test]
    fn test_other_mode_prompt_names_relation_and_rules() {
        let writer = WriterId::new("w");
        let mut author = AuthorContext::default();
        author.apply_identity(IdentityChoice::SomeoneElse);
        author.set_relation("mother");
        author.subject.name = Some("Marie".into());
        let style = StyleProfile::default().with_strictness(Strictness::Strict);
        let themes: BTreeSet<String> = ["food".to_string()].into_iter().collect();
        let history = vec![Turn {
            question: "Where did your mother grow up?".into(),
            answer: "I don't remember the village name.".into(),
        }];
        let ctx = QuestionContext {
            writer: &writer,
            stage: LifeStage::Childhood,
            author: &author,
            style: &style,
            themes: &themes,
            history: &history,
            previous_question: Some("Where did your mother grow up?"),
            avoid_recalled_angle: true,
            turn_count: 1,
            pool_cursor: 0,
            max_question_chars: 160,
        };

        let messages = question_messages(&ctx);
        assert_eq!(messages[0].role, ChatRole::System);
        let system = &messages[0].content;
        assert!(system.contains("neutral"));
        assert!(system.contains("your mother"));
        assert!(system.contains("- Name: Marie"));
        assert!(system.contains("- Born: unspecified"));
        assert!(system.contains("food"));
        assert!(system.contains(Strictness::Strict.question_rule()));

        let user = &messages[1].content;
        assert!(user.contains("Writer: I don't remember the village name."));
        assert!(user.contains("different angle"));
        assert!(user.contains("Do not repeat"));
    }

    #[test]
    fn test_self_mode_prompt_is_warm() {
        let writer = WriterId::new("w");
        let author = AuthorContext::default();
        let style = StyleProfile::default();
        let themes = BTreeSet::new();
        let ctx = QuestionContext {
            writer: &writer,
            stage: LifeStage::Present,
            author: &author,
            style: &style,
            themes: &themes,
            history: &[],
            previous_question: None,
            avoid_recalled_angle: false,
            turn_count: 0,
            pool_cursor: 0,
            max_question_chars: 160,
        };
        let messages = question_messages(&ctx);
        assert!(messages[0].content.contains("warm"));
        assert!(!messages[0].content.contains("Themes"));
        assert!(messages[1].content.contains("No answers yet"));

        let anchors = AnchorSet::extract(&["We grew tomatoes on the balcony."], 6);
        let closure = closure_messages(&ctx, &anchors, 50);
        assert!(closure[1].content.contains("tomatoes"));
    }
}
