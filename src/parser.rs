use crate::ir::RawWord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

static INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%\{\s*init\s*:\s*(\{.*\})\s*\}%%").unwrap());
static WORD_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<text>.+?)(?:\s+(?P<weight>[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?))?$",
    )
    .unwrap()
});

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid word list: {0}")]
    Json(#[from] json5::Error),
    #[error("word list document has no words")]
    MissingWords,
}

#[derive(Debug, Default)]
pub struct ParsedWords {
    pub words: Vec<RawWord>,
    pub init_config: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WordDocument {
    List(Vec<RawWord>),
    Object {
        words: Option<Vec<RawWord>>,
        config: Option<serde_json::Value>,
    },
}

/// Parses a word list: a JSON5 array of words, a JSON5 object with `words`
/// and optional `config`, or one `text [weight]` entry per line.
pub fn parse_words(input: &str) -> Result<ParsedWords, ParseError> {
    let (lines, directive) = preprocess_input(input);
    if looks_like_json(&lines) {
        let body = lines.join("\n");
        let (words, config) = match json5::from_str::<WordDocument>(&body)? {
            WordDocument::List(words) => (words, None),
            WordDocument::Object { words, config } => {
                (words.ok_or(ParseError::MissingWords)?, config)
            }
        };
        return Ok(ParsedWords {
            words,
            init_config: merge_objects(config, directive),
        });
    }

    let words = lines.iter().map(|line| parse_word_line(line)).collect();
    Ok(ParsedWords {
        words,
        init_config: directive,
    })
}

fn preprocess_input(input: &str) -> (Vec<String>, Option<serde_json::Value>) {
    let mut init_config: Option<serde_json::Value> = None;
    let mut lines = Vec::new();

    for raw_line in input.lines() {
        let trimmed_line = raw_line.trim();
        if trimmed_line.is_empty() {
            continue;
        }
        if let Some(caps) = INIT_RE.captures(trimmed_line) {
            if let Some(json_str) = caps.get(1).map(|m| m.as_str()) {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else if let Ok(value) = json5::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else {
                    tracing::warn!(directive = json_str, "ignoring unparsable init directive");
                }
            }
            continue;
        }
        if trimmed_line.starts_with("%%") || trimmed_line.starts_with('#') {
            continue;
        }
        lines.push(trimmed_line.to_string());
    }

    (lines, init_config)
}

// JSON5 documents may open with `//` comments.
fn looks_like_json(lines: &[String]) -> bool {
    lines
        .iter()
        .find(|line| !line.starts_with("//"))
        .is_some_and(|line| line.starts_with('[') || line.starts_with('{'))
}

fn parse_word_line(line: &str) -> RawWord {
    let Some(caps) = WORD_LINE_RE.captures(line) else {
        return RawWord::from(line);
    };
    let text = caps.name("text").map(|m| m.as_str()).unwrap_or(line);
    match caps
        .name("weight")
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        Some(weight) => RawWord::weighted(text, weight),
        None => RawWord::from(text),
    }
}

// Keys of `overlay` replace those of `base`.
fn merge_objects(
    base: Option<serde_json::Value>,
    overlay: Option<serde_json::Value>,
) -> Option<serde_json::Value> {
    match (base, overlay) {
        (Some(serde_json::Value::Object(mut base)), Some(serde_json::Value::Object(overlay))) => {
            base.extend(overlay);
            Some(serde_json::Value::Object(base))
        }
        (base, None) => base,
        (_, overlay) => overlay,
    }
}
