//! The canned question bank: ten prompts per stage, used in fixed-pool mode
//! and as the last resort against repeats.

use crate::author::AuthorContext;
use crate::stage::LifeStage;

pub const POOL_SIZE: usize = 10;

const CHILDHOOD: [&str; POOL_SIZE] = [
    "What is the earliest memory from {whose} childhood?",
    "What did the house look like where {whose} childhood was spent?",
    "Who looked after the children in {whose} family, and how?",
    "What games filled {whose} childhood afternoons?",
    "What did a typical family meal look like in {whose} childhood?",
    "Which neighbor or relative stood out in {whose} childhood, and why?",
    "What was the first school like in {whose} childhood?",
    "What rule at home do you remember from {whose} childhood?",
    "Which holiday or celebration stands out from {whose} childhood?",
    "What was frightening or difficult in {whose} childhood?",
];

const ADOLESCENCE: [&str; POOL_SIZE] = [
    "Which friend mattered most during {whose} teenage years?",
    "What subject or teacher shaped {whose} school years?",
    "What did weekends look like in {whose} teenage years?",
    "What music, books or films marked {whose} teenage years?",
    "What was the first job or chore that earned money in {whose} teenage years?",
    "Where did young people gather in {whose} teenage years?",
    "What argument with the family do you remember from {whose} teenage years?",
    "What did {whose} teenage self want to become?",
    "Which trip or move changed {whose} teenage years?",
    "What was the biggest worry of {whose} teenage years?",
];

const YOUTH: [&str; POOL_SIZE] = [
    "Where did {whose} life take place after leaving school?",
    "What was the first real job in {whose} young adult years?",
    "Who was the first great love of {whose} young adult years?",
    "What did leaving home look like in {whose} young adult years?",
    "Which friend from {whose} young adult years is still remembered today?",
    "What risk was taken in {whose} young adult years?",
    "How was money handled in {whose} young adult years?",
    "What city or place shaped {whose} young adult years?",
    "What did {whose} parents think of the choices made in those years?",
    "What was a proud moment in {whose} young adult years?",
];

const ADULTHOOD: [&str; POOL_SIZE] = [
    "How did {whose} career develop during the adult years?",
    "How did {whose} partnership or marriage begin?",
    "What was the home like during {whose} adult years?",
    "What was it like when children arrived in {whose} life?",
    "Which colleague or friend mattered in {whose} adult years?",
    "What was the hardest decision of {whose} adult years?",
    "How were holidays spent in {whose} adult years?",
    "What routine defined a weekday in {whose} adult years?",
    "What achievement from {whose} adult years is remembered best?",
    "Which loss or setback marked {whose} adult years?",
];

const MIDDLE_AGE: [&str; POOL_SIZE] = [
    "What changed in {whose} work during middle age?",
    "Who needed care in {whose} middle age, and who gave it?",
    "What new interest appeared in {whose} middle age?",
    "How did {whose} family change during middle age?",
    "What place did {whose} middle age revolve around?",
    "What health event shaped {whose} middle age?",
    "What was let go of in {whose} middle age?",
    "Which friendship deepened in {whose} middle age?",
    "What was celebrated in {whose} middle age?",
    "What lesson did {whose} middle age teach?",
];

const PRESENT: [&str; POOL_SIZE] = [
    "Where is home in {whose} life today?",
    "Who visits most often in {whose} life now?",
    "What hobby fills the hours in {whose} life now?",
    "What small pleasure brightens {whose} days now?",
    "What worries occupy {whose} life these days?",
    "What does a Sunday look like in {whose} life now?",
    "What has changed most about {whose} life in recent years?",
    "What object at home matters most in {whose} life now?",
    "Which recent event made {whose} life feel full?",
    "What is still being learned in {whose} life today?",
];

const FUTURE_WISHES: [&str; POOL_SIZE] = [
    "What place does {whose} heart still want to visit?",
    "What should the grandchildren know about {whose} life?",
    "What unfinished plan remains in {whose} life?",
    "What family tradition should continue after {whose} time?",
    "What would {whose} advice be to a young person today?",
    "Which relationship in {whose} life deserves more time?",
    "What should be remembered about {whose} life?",
    "What object from {whose} life should be passed on, and to whom?",
    "What does a good day in the coming years look like for {whose} life?",
    "What message would {whose} life leave for the family?",
];

fn templates(stage: LifeStage) -> &'static [&'static str; POOL_SIZE] {
    match stage {
        LifeStage::Childhood => &CHILDHOOD,
        LifeStage::Adolescence => &ADOLESCENCE,
        LifeStage::Youth => &YOUTH,
        LifeStage::Adulthood => &ADULTHOOD,
        LifeStage::MiddleAge => &MIDDLE_AGE,
        LifeStage::Present => &PRESENT,
        LifeStage::FutureWishes => &FUTURE_WISHES,
    }
}

/// The canned question at `cursor`, rotating through the pool.
pub fn question(stage: LifeStage, cursor: usize, author: &AuthorContext) -> String {
    author.render(templates(stage)[cursor % POOL_SIZE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::IdentityChoice;
    use std::collections::HashSet;

    #[test]
    fn test_pool_rotates() {
        let author = AuthorContext::default();
        assert_eq!(
            question(LifeStage::Youth, 0, &author),
            question(LifeStage::Youth, POOL_SIZE, &author)
        );
        assert_ne!(
            question(LifeStage::Youth, 0, &author),
            question(LifeStage::Youth, 1, &author)
        );
    }

    #[test]
    fn test_every_pool_entry_is_a_distinct_question() {
        let mut author = AuthorContext::default();
        author.apply_identity(IdentityChoice::SomeoneElse);
        author.set_relation("grandfather");
        for stage in LifeStage::ALL {
            let texts: HashSet<_> = (0..POOL_SIZE).map(|i| question(stage, i, &author)).collect();
            assert_eq!(texts.len(), POOL_SIZE);
            for text in texts {
                assert!(text.ends_with('?'));
                assert!(text.contains("your grandfather"), "{text}");
            }
        }
    }
}
