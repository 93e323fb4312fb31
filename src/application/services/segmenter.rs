use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{Segment, SegmentLabel, Transcript};

const MAX_EXCERPT_CHARS: usize = 280;

/// Keyword lexicon, English and Portuguese. Order is the order labels are
/// emitted for a unit matching several of them.
static LEXICON: LazyLock<Vec<(SegmentLabel, Regex)>> = LazyLock::new(|| {
    [
        (
            SegmentLabel::Greeting,
            r"(?i)\b(hello|hi there|good (morning|afternoon|evening)|thanks for (calling|taking)|olá|ola|bom dia|boa tarde|boa noite)\b",
        ),
        (
            SegmentLabel::Discovery,
            r"(?i)\b(what (are|is) your|how do you (currently|handle|manage)|tell me (about|more)|challenges?|pain points?|currently using|como vocês|qual é o seu|qual e o seu|desafios?|dificuldades?)\b",
        ),
        (
            SegmentLabel::Pricing,
            r"(?i)(\b(price|pricing|cost|costs|budget|discount|quote|per (month|seat|user)|preço|preco|custo|orçamento|orcamento|desconto|mensalidade)\b|[$€£]\s?\d)",
        ),
        (
            SegmentLabel::Objection,
            r"(?i)\b(too expensive|not interested|no budget|not a priority|not sure|concerns?|concerned|can't afford|cannot afford|muito caro|não tenho interesse|nao tenho interesse|sem orçamento|sem orcamento)\b",
        ),
        (
            SegmentLabel::Competitor,
            r"(?i)\b(competitors?|alternatives?|other vendors?|switch(ing)? from|already (use|using|have)|concorrentes?|concorrência|concorrencia)\b",
        ),
        (
            SegmentLabel::NextSteps,
            r"(?i)\b(follow[- ]up|next steps?|schedule|send (you|over)|demo|trial|call (you )?back|próximos? passos?|proximos? passos?|agendar|retorno)\b",
        ),
        (
            SegmentLabel::Closing,
            r"(?i)\b(goodbye|bye|have a (great|good|nice) day|talk (to you )?soon|tchau|até logo|ate logo|até mais|ate mais)\b",
        ),
    ]
    .into_iter()
    .filter_map(|(label, pattern)| match Regex::new(pattern) {
        Ok(regex) => Some((label, regex)),
        Err(e) => {
            tracing::error!(label = %label, error = %e, "Invalid segment lexicon pattern");
            None
        }
    })
    .collect()
});

struct Unit {
    start_char: usize,
    end_char: usize,
    start_ms: Option<u64>,
    end_ms: Option<u64>,
    text: String,
}

/// Labels spans of a transcript by keyword.
///
/// Diarized utterances are the units when present, sentences otherwise. A
/// unit matching several labels yields one segment per label. The output is
/// a pure function of the transcript, so recomputation is byte-identical.
pub fn segment_transcript(transcript: &Transcript) -> Vec<Segment> {
    if transcript.is_empty() {
        return Vec::new();
    }

    let units = if transcript.utterances.is_empty() {
        sentence_units(&transcript.text)
    } else {
        utterance_units(transcript)
    };

    let mut segments = Vec::new();
    for unit in units {
        for (label, regex) in LEXICON.iter() {
            if regex.is_match(&unit.text) {
                segments.push(Segment {
                    call_id: transcript.call_id,
                    ordinal: segments.len() as u32,
                    label: *label,
                    start_char: unit.start_char,
                    end_char: unit.end_char,
                    start_ms: unit.start_ms,
                    end_ms: unit.end_ms,
                    excerpt: excerpt(&unit.text),
                });
            }
        }
    }
    segments
}

fn utterance_units(transcript: &Transcript) -> Vec<Unit> {
    let text = &transcript.text;
    let mut cursor = 0usize;

    transcript
        .utterances
        .iter()
        .filter(|u| !u.text.trim().is_empty())
        .map(|utterance| {
            let needle = utterance.text.trim();
            let (start_byte, end_byte) = match text[cursor..].find(needle) {
                Some(offset) => {
                    let start = cursor + offset;
                    (start, start + needle.len())
                }
                None => (cursor, cursor),
            };
            cursor = end_byte;
            Unit {
                start_char: char_offset(text, start_byte),
                end_char: char_offset(text, end_byte),
                start_ms: Some(utterance.start_ms),
                end_ms: Some(utterance.end_ms),
                text: needle.to_string(),
            }
        })
        .collect()
}

fn sentence_units(text: &str) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut start = 0usize;

    for (index, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?' | '\n') {
            let end = index + ch.len_utf8();
            push_sentence(text, start, end, &mut units);
            start = end;
        }
    }
    push_sentence(text, start, text.len(), &mut units);
    units
}

fn push_sentence(text: &str, start: usize, end: usize, units: &mut Vec<Unit>) {
    let raw = &text[start..end];
    let leading = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| !c.is_alphanumeric()) {
        return;
    }
    let start_byte = start + leading;
    let end_byte = start_byte + trimmed.len();
    units.push(Unit {
        start_char: char_offset(text, start_byte),
        end_char: char_offset(text, end_byte),
        start_ms: None,
        end_ms: None,
        text: trimmed.to_string(),
    });
}

fn char_offset(text: &str, byte_index: usize) -> usize {
    text[..byte_index].chars().count()
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= MAX_EXCERPT_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
    cut.push('…');
    cut
}
