use std::sync::LazyLock;
use tiktoken_rs::CoreBPE;

static TOKENIZER: LazyLock<CoreBPE> = LazyLock::new(|| {
    tiktoken_rs::cl100k_base().expect("Failed to initialize cl100k_base tokenizer")
});

pub fn count_tokens(text: &str) -> usize {
    TOKENIZER.encode_with_special_tokens(text).len()
}

/// Longest char-aligned prefix of `text` that fits in `max_tokens`.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> &str {
    if count_tokens(text) <= max_tokens {
        return text;
    }

    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    // Invariant: prefix at boundaries[lo] fits, prefix at boundaries[hi] does not.
    let mut lo = 0;
    let mut hi = boundaries.len() - 1;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if count_tokens(&text[..boundaries[mid]]) <= max_tokens {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    &text[..boundaries[lo]]
}

/// Longest char-aligned suffix of `text` that fits in `max_tokens`.
pub fn truncate_to_last_tokens(text: &str, max_tokens: usize) -> &str {
    if count_tokens(text) <= max_tokens {
        return text;
    }

    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    // Invariant: suffix from boundaries[lo] does not fit, suffix from boundaries[hi] does.
    let mut lo = 0;
    let mut hi = boundaries.len() - 1;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if count_tokens(&text[boundaries[mid]..]) <= max_tokens {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    &text[boundaries[hi]..]
}
