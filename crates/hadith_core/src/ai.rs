//! crates/hadith_core/src/ai.rs
//!
//! The AI gateway: turns hadiths and user input into prompts, sends them to the
//! completion service and decodes the JSON-bearing replies into typed values.
//!
//! Decoding is strict. Surrounding whitespace and a single Markdown code fence
//! are removed; anything else that is not the requested JSON shape is reported
//! as [`PortError::MalformedResponse`]. Nothing is retried.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{ChatHadith, ChatMessage, DailyChallenge, Hadith, QuizQuestion};
use crate::ports::{CompletionRequest, CompletionService, PortError, PortResult, TextStream};

pub const DEFAULT_QUIZ_COUNT: usize = 3;
pub const DEFAULT_RECOMMENDATION_COUNT: usize = 5;
const OPTIONS_PER_QUESTION: usize = 4;

const EXPLAIN_SYSTEM: &str =
    "You are a knowledgeable Islamic scholar specializing in Hadith explanation.";
const QUIZ_SYSTEM: &str =
    "You are an expert in creating educational assessments for Islamic studies.";
const RECOMMEND_SYSTEM: &str =
    "You are an expert in Islamic education and personalized learning.";
const ANSWER_SYSTEM: &str =
    "You are a knowledgeable Islamic scholar providing guidance based on authentic sources.";
const CHALLENGE_SYSTEM: &str =
    "You are an expert in creating engaging educational content for Islamic studies.";
const CHAT_SYSTEM: &str = "You are a knowledgeable Islamic scholar who provides thoughtful, accurate explanations of Hadiths and Islamic topics.";

//=========================================================================================
// Prompt Builders
//=========================================================================================

pub fn explain_prompt(hadith: &Hadith) -> String {
    format!(
        "As a knowledgeable Islamic scholar, please provide a clear and concise explanation of the following Hadith:

Arabic Text: {arabic}
English Translation: {english}
Narrator: {narrator}

Please include:
1. Context and background (if relevant)
2. Main lessons and benefits
3. Practical applications in modern life

Keep the explanation clear and accessible for learners.",
        arabic = hadith.arabic_text,
        english = hadith.english_text,
        narrator = hadith.narrated_by,
    )
}

pub fn quiz_prompt(hadith: &Hadith, count: usize) -> String {
    format!(
        r#"Based on the following Hadith, generate {count} multiple-choice questions:

Hadith: {english}

For each question, provide:
1. The question text
2. Four possible options
3. The correct answer, copied exactly from the options
4. A brief explanation of why it's correct

Respond with ONLY a JSON array of objects of the form:
{{
  "question": "question text",
  "options": ["first", "second", "third", "fourth"],
  "correctAnswer": "the correct option",
  "explanation": "explanation text"
}}"#,
        count = count,
        english = hadith.english_text,
    )
}

pub fn recommend_prompt(recent: &[Hadith], count: usize) -> String {
    let topics: Vec<&str> = recent
        .iter()
        .flat_map(|h| h.topics.iter())
        .map(String::as_str)
        .filter(|t| !t.is_empty())
        .collect();
    format!(
        "Based on the user's recent learning history focusing on topics: {topics}

Please recommend {count} related topics or subjects they might be interested in studying next.
Consider:
1. Natural progression of learning
2. Related themes and concepts
3. Increasing complexity

Respond with ONLY a JSON array of topic strings.",
        topics = topics.join(", "),
        count = count,
    )
}

pub fn answer_prompt(question: &str, related: &[Hadith]) -> String {
    let context: Vec<String> = related
        .iter()
        .map(|h| {
            format!(
                "Hadith from {}:\n{}\nNarrated by: {}",
                h.book_name, h.english_text, h.narrated_by
            )
        })
        .collect();
    format!(
        "Please answer the following question about Islam:
\"{question}\"

Based on these relevant Hadiths:
{context}

Provide a clear, accurate answer that:
1. Directly addresses the question
2. References the relevant Hadiths
3. Explains the reasoning
4. Notes any scholarly consensus or differences of opinion (if relevant)",
        question = question,
        context = context.join("\n\n"),
    )
}

pub fn challenge_prompt(topics: &[String]) -> String {
    format!(
        r#"Generate a daily challenge question about the following Islamic topics: {topics}

The challenge should:
1. Test understanding and application
2. Be engaging and thought-provoking
3. Include a helpful hint
4. Have an assigned difficulty level

Respond with ONLY a JSON object of the form:
{{
  "question": "challenge question",
  "hint": "helpful hint",
  "difficulty": "easy|medium|hard"
}}"#,
        topics = topics.join(", "),
    )
}

pub fn chat_prompt(message: &str, hadith: Option<&ChatHadith>) -> String {
    match hadith {
        None => format!(
            "As an Islamic scholar, help me understand and discuss Islamic topics. The user's question is: {}",
            message
        ),
        Some(h) => format!(
            "As an Islamic scholar, help me understand this Hadith:

{text}
Narrated by: {narrator}
From: {book}

The user asks: {message}

Please provide a thoughtful explanation, focusing on:
1. The meaning and context of the Hadith
2. Its relevance to daily life
3. Any specific guidance it offers
4. Related verses from the Quran if applicable",
            text = h.text,
            narrator = h.narrator,
            book = h.book,
            message = message,
        ),
    }
}

//=========================================================================================
// Response Decoding
//=========================================================================================

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?\s*```$").expect("code fence pattern is valid")
    })
}

/// Strips whitespace and one surrounding Markdown code fence.
fn unwrap_payload(raw: &str) -> &str {
    let trimmed = raw.trim();
    match code_fence().captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

fn decode_json<T: DeserializeOwned>(raw: &str, what: &str) -> PortResult<T> {
    serde_json::from_str(unwrap_payload(raw)).map_err(|e| {
        error!("Failed to decode {} from completion: {}", what, e);
        PortError::MalformedResponse(format!("{} was not valid JSON: {}", what, e))
    })
}

#[derive(Deserialize)]
struct RawQuizQuestion {
    question: String,
    options: Vec<String>,
    #[serde(rename = "correctAnswer", alias = "correct_answer")]
    correct_answer: String,
    explanation: String,
}

/// Decodes and validates a quiz reply. All-or-nothing: one bad question fails the batch.
pub fn decode_quiz(raw: &str, count: usize) -> PortResult<Vec<QuizQuestion>> {
    let items: Vec<RawQuizQuestion> = decode_json(raw, "quiz")?;
    if items.len() != count {
        return Err(PortError::MalformedResponse(format!(
            "expected {} quiz questions, got {}",
            count,
            items.len()
        )));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| validate_question(i + 1, item))
        .collect()
}

fn validate_question(n: usize, item: RawQuizQuestion) -> PortResult<QuizQuestion> {
    let malformed = |why: &str| PortError::MalformedResponse(format!("quiz question {}: {}", n, why));

    if item.question.trim().is_empty() {
        return Err(malformed("empty question"));
    }
    if item.options.len() != OPTIONS_PER_QUESTION {
        return Err(malformed(&format!(
            "expected {} options, got {}",
            OPTIONS_PER_QUESTION,
            item.options.len()
        )));
    }
    if item.explanation.trim().is_empty() {
        return Err(malformed("empty explanation"));
    }
    let correct_answer = resolve_answer(&item.options, item.correct_answer.trim())
        .ok_or_else(|| malformed("correct answer is not one of the options"))?;

    Ok(QuizQuestion {
        question: item.question,
        options: item.options,
        correct_answer,
        explanation: item.explanation,
    })
}

/// Finds the option the answer refers to, either verbatim or by letter (`A`..`D`).
fn resolve_answer(options: &[String], answer: &str) -> Option<String> {
    if let Some(option) = options.iter().find(|o| o.trim() == answer) {
        return Some(option.clone());
    }
    let letter = answer.trim_end_matches(['.', ')']);
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            let index = (c.to_ascii_uppercase() as u8).checked_sub(b'A')? as usize;
            options.get(index).cloned()
        }
        _ => None,
    }
}

pub fn decode_recommendations(raw: &str) -> PortResult<Vec<String>> {
    let topics: Vec<String> = decode_json(raw, "recommendations")?;
    if topics.iter().any(|t| t.trim().is_empty()) {
        return Err(PortError::MalformedResponse(
            "recommendations contained an empty topic".to_string(),
        ));
    }
    Ok(topics)
}

pub fn decode_challenge(raw: &str) -> PortResult<DailyChallenge> {
    let challenge: DailyChallenge = decode_json(raw, "daily challenge")?;
    if challenge.question.trim().is_empty() {
        return Err(PortError::MalformedResponse(
            "daily challenge has an empty question".to_string(),
        ));
    }
    Ok(challenge)
}

//=========================================================================================
// The Gateway
//=========================================================================================

/// Builds prompts and decodes replies around a single [`CompletionService`].
#[derive(Clone)]
pub struct AiGateway {
    completion: Arc<dyn CompletionService>,
}

impl AiGateway {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    async fn ask(&self, system: &str, prompt: String) -> PortResult<String> {
        self.completion
            .complete(CompletionRequest::new(system, prompt))
            .await
    }

    pub async fn explain(&self, hadith: &Hadith) -> PortResult<String> {
        info!(hadith_id = %hadith.id, "Generating explanation");
        self.ask(EXPLAIN_SYSTEM, explain_prompt(hadith)).await
    }

    pub async fn generate_quiz(&self, hadith: &Hadith, count: usize) -> PortResult<Vec<QuizQuestion>> {
        if count == 0 {
            return Err(PortError::Validation("count must be at least 1".to_string()));
        }
        info!(hadith_id = %hadith.id, count, "Generating quiz");
        let raw = self.ask(QUIZ_SYSTEM, quiz_prompt(hadith, count)).await?;
        decode_quiz(&raw, count)
    }

    pub async fn recommend(
        &self,
        user_id: &str,
        recent: &[Hadith],
        count: usize,
    ) -> PortResult<Vec<String>> {
        info!(user_id, recent = recent.len(), count, "Generating recommendations");
        let raw = self.ask(RECOMMEND_SYSTEM, recommend_prompt(recent, count)).await?;
        decode_recommendations(&raw)
    }

    pub async fn answer_question(&self, question: &str, related: &[Hadith]) -> PortResult<String> {
        info!(related = related.len(), "Answering question");
        self.ask(ANSWER_SYSTEM, answer_prompt(question, related)).await
    }

    pub async fn daily_challenge(&self, topics: &[String]) -> PortResult<DailyChallenge> {
        let raw = self.ask(CHALLENGE_SYSTEM, challenge_prompt(topics)).await?;
        decode_challenge(&raw)
    }

    pub async fn chat(
        &self,
        message: &str,
        history: Vec<ChatMessage>,
        hadith: Option<&ChatHadith>,
    ) -> PortResult<String> {
        let request = CompletionRequest::new(CHAT_SYSTEM, chat_prompt(message, hadith))
            .with_history(history);
        self.completion.complete(request).await
    }

    pub async fn chat_stream(
        &self,
        message: &str,
        history: Vec<ChatMessage>,
        hadith: Option<&ChatHadith>,
    ) -> PortResult<TextStream> {
        let request = CompletionRequest::new(CHAT_SYSTEM, chat_prompt(message, hadith))
            .with_history(history);
        self.completion.complete_streaming(request).await
    }
}
